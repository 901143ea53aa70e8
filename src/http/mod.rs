pub mod client;

pub use client::{HttpClient, BROWSER_ID_HEADER, DEFAULT_BROWSER_ID};
