use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Decoded body of a query response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub results: Vec<Map<String, Value>>,
    #[serde(default)]
    pub facets: Vec<Map<String, Value>>,
    #[serde(default)]
    pub metadata: QueryMetadata,
}

/// Query metadata as reported by the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryMetadata {
    pub contents: Value,
    pub event_type: String,
    pub open_ended: bool,
    /// RFC 3339 timestamp, kept as sent.
    pub begin_time: Option<String>,
    pub end_time: Option<String>,
    pub begin_time_millis: i64,
    pub end_time_millis: i64,
    pub raw_since: String,
    pub raw_until: String,
    pub raw_compare_with: String,
}
