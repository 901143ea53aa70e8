// Wire types for the n8n REST API
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Start node used when none is configured.
pub const DEFAULT_START_NODE: &str = "Schedule Trigger";
/// Destination node used when none is configured.
pub const DEFAULT_DESTINATION_NODE: &str = "AWS S3";

/// Unwrap the `{ "data": ... }` envelope n8n puts around most payloads.
///
/// Some endpoints and server versions return the payload at the top level
/// instead. `marker` names a field that only the payload itself carries: if
/// it is already present at the top level the body is returned untouched.
pub fn normalize_envelope(body: Value, marker: &str) -> Value {
    match body {
        Value::Object(mut map) if !map.contains_key(marker) => match map.remove("data") {
            Some(inner) => inner,
            None => Value::Object(map),
        },
        other => other,
    }
}

/// A workflow definition exactly as the server returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowDefinition(Value);

impl WorkflowDefinition {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    pub fn node_count(&self) -> usize {
        self.0
            .get("nodes")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Fixed parameters sent with every manual run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionParams {
    pub start_nodes: Vec<String>,
    pub destination_node: String,
}

impl Default for ExecutionParams {
    fn default() -> Self {
        Self {
            start_nodes: vec![DEFAULT_START_NODE.to_string()],
            destination_node: DEFAULT_DESTINATION_NODE.to_string(),
        }
    }
}

/// Body of `POST /workflows/{id}/run`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest<'a> {
    pub workflow_data: &'a WorkflowDefinition,
    pub data: RunData<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunData<'a> {
    pub start_nodes: &'a [String],
    pub destination_node: &'a str,
    pub run_data: Map<String, Value>,
}

impl<'a> ExecutionRequest<'a> {
    pub fn new(workflow: &'a WorkflowDefinition, params: &'a ExecutionParams) -> Self {
        Self {
            workflow_data: workflow,
            data: RunData {
                start_nodes: &params.start_nodes,
                destination_node: &params.destination_node,
                run_data: Map::new(),
            },
        }
    }
}

/// Read an execution id that may be sent as a string or a number.
pub fn id_field(payload: &Value, field: &str) -> Option<String> {
    match payload.get(field)? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Coarse state of an execution as seen by the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecutionStatus {
    NotFinished,
    Success,
    Failure,
}

impl ExecutionStatus {
    /// Classify the `finished` flag and `status` string of an execution.
    pub fn classify(finished: bool, status: Option<&str>) -> Self {
        match status {
            Some("success") if finished => ExecutionStatus::Success,
            Some("error" | "failed" | "crashed" | "canceled") => ExecutionStatus::Failure,
            _ => ExecutionStatus::NotFinished,
        }
    }
}

/// Result of a single status read.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub id: String,
    pub finished: bool,
    pub status: ExecutionStatus,
    /// Status string as sent by the server.
    pub raw_status: Option<String>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
    /// Build a record from a normalised `GET /executions/{id}` payload.
    pub fn from_payload(execution_id: &str, payload: &Value) -> Self {
        let finished = payload
            .get("finished")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let raw_status = payload
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_string);
        let status = ExecutionStatus::classify(finished, raw_status.as_deref());

        Self {
            id: id_field(payload, "id").unwrap_or_else(|| execution_id.to_string()),
            finished,
            status,
            raw_status,
            error: payload.get("data").and_then(extract_error_message),
            started_at: timestamp(payload, "startedAt"),
            stopped_at: timestamp(payload, "stoppedAt"),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.stopped_at? - self.started_at?)
    }
}

fn timestamp(payload: &Value, field: &str) -> Option<DateTime<Utc>> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|ts| ts.with_timezone(&Utc))
}

/// Find an error message inside the embedded execution data.
///
/// n8n sends the run data either as an object or as a flattened JSON string
/// where nested values are string indexes into one top-level array.
pub fn extract_error_message(data: &Value) -> Option<String> {
    match data {
        Value::String(raw) => {
            let parsed: Value = serde_json::from_str(raw).ok()?;
            let items = parsed.as_array()?;
            let root = items.first()?;
            let error = root
                .get("error")
                .or_else(|| {
                    resolve_ref(items, root.get("resultData")?).get("error")
                })
                .map(|err| resolve_ref(items, err))?;
            describe_error(items, error)
        }
        Value::Object(_) => {
            let error = data.pointer("/resultData/error")?;
            if error.is_null() {
                return None;
            }
            Some(
                error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown error")
                    .to_string(),
            )
        }
        _ => None,
    }
}

fn resolve_ref<'a>(items: &'a [Value], value: &'a Value) -> &'a Value {
    value
        .as_str()
        .and_then(|idx| idx.parse::<usize>().ok())
        .and_then(|idx| items.get(idx))
        .unwrap_or(value)
}

fn describe_error(items: &[Value], error: &Value) -> Option<String> {
    match error {
        Value::Null => None,
        Value::String(message) => Some(message.clone()),
        Value::Object(fields) => fields
            .get("message")
            .map(|message| resolve_ref(items, message))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(error.to_string())),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_unwraps_data_envelope() {
        let body = json!({"data": {"executionId": "17"}});
        assert_eq!(normalize_envelope(body, "executionId"), json!({"executionId": "17"}));
    }

    #[test]
    fn test_normalize_keeps_top_level_payload() {
        // The execution payload has its own "data" member which must survive.
        let body = json!({"finished": true, "status": "success", "data": "[]"});
        assert_eq!(normalize_envelope(body.clone(), "finished"), body);

        let bare = json!({"executionId": 9});
        assert_eq!(normalize_envelope(bare.clone(), "executionId"), bare);
    }

    #[test]
    fn test_classification_table() {
        assert_eq!(ExecutionStatus::classify(true, Some("success")), ExecutionStatus::Success);
        assert_eq!(ExecutionStatus::classify(false, Some("success")), ExecutionStatus::NotFinished);
        assert_eq!(ExecutionStatus::classify(false, Some("running")), ExecutionStatus::NotFinished);
        assert_eq!(ExecutionStatus::classify(true, Some("waiting")), ExecutionStatus::NotFinished);
        assert_eq!(ExecutionStatus::classify(true, None), ExecutionStatus::NotFinished);
        assert_eq!(ExecutionStatus::classify(false, Some("error")), ExecutionStatus::Failure);
        assert_eq!(ExecutionStatus::classify(true, Some("crashed")), ExecutionStatus::Failure);
    }

    #[test]
    fn test_execution_request_shape() {
        let workflow = WorkflowDefinition::new(json!({"id": "42", "name": "Nightly", "nodes": []}));
        let params = ExecutionParams::default();
        let body = serde_json::to_value(ExecutionRequest::new(&workflow, &params)).unwrap();

        assert_eq!(
            body,
            json!({
                "workflowData": {"id": "42", "name": "Nightly", "nodes": []},
                "data": {
                    "startNodes": ["Schedule Trigger"],
                    "destinationNode": "AWS S3",
                    "runData": {}
                }
            })
        );
    }

    #[test]
    fn test_id_field_accepts_strings_and_numbers() {
        assert_eq!(id_field(&json!({"executionId": "abc"}), "executionId").as_deref(), Some("abc"));
        assert_eq!(id_field(&json!({"executionId": 118}), "executionId").as_deref(), Some("118"));
        assert_eq!(id_field(&json!({"executionId": ""}), "executionId"), None);
        assert_eq!(id_field(&json!({}), "executionId"), None);
    }

    #[test]
    fn test_record_from_successful_payload() {
        let payload = json!({
            "id": "55",
            "finished": true,
            "status": "success",
            "startedAt": "2026-10-15T08:00:00.000Z",
            "stoppedAt": "2026-10-15T08:00:03.500Z",
            "data": "[{\"resultData\":\"1\"},{\"runData\":\"2\"},{}]"
        });
        let record = ExecutionRecord::from_payload("55", &payload);

        assert!(record.is_success());
        assert_eq!(record.raw_status.as_deref(), Some("success"));
        assert_eq!(record.error, None);
        assert_eq!(record.duration().unwrap().num_milliseconds(), 3500);
    }

    #[test]
    fn test_error_from_flattened_string() {
        let data = json!(
            "[{\"startData\":\"1\",\"resultData\":\"2\"},{},{\"error\":\"3\"},{\"message\":\"4\"},\"Access Denied\"]"
        );
        assert_eq!(extract_error_message(&data).as_deref(), Some("Access Denied"));
    }

    #[test]
    fn test_error_from_first_list_entry() {
        let data = json!("[{\"error\":{\"message\":\"Node failed\"}}]");
        assert_eq!(extract_error_message(&data).as_deref(), Some("Node failed"));
    }

    #[test]
    fn test_error_from_result_data_object() {
        let data = json!({"resultData": {"error": {"message": "Bucket missing"}}});
        assert_eq!(extract_error_message(&data).as_deref(), Some("Bucket missing"));

        let no_message = json!({"resultData": {"error": {"name": "NodeApiError"}}});
        assert_eq!(extract_error_message(&no_message).as_deref(), Some("Unknown error"));
    }

    #[test]
    fn test_unparseable_data_has_no_error() {
        assert_eq!(extract_error_message(&json!("not json")), None);
        assert_eq!(extract_error_message(&json!("[]")), None);
        assert_eq!(extract_error_message(&json!({"resultData": {}})), None);
        assert_eq!(extract_error_message(&json!(7)), None);
    }
}
