//! API types and parameters for HTTP handlers.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::{Deserialize, Serialize};

use crate::cache::{AttributeSeries, DataFormat, DataType};
use crate::error::ArchivingError;
use crate::reader::SampleValue;

/// Parameters for the `/api/v1/names` endpoint.
#[derive(Debug, Deserialize)]
pub struct NameParams {
    /// Name to resolve
    pub name: String,
    /// `authority`, `device` or `attribute` (default)
    pub kind: Option<String>,
    /// Whether to include the fragment
    pub fragment: Option<bool>,
}

/// Parameters naming one archived attribute.
#[derive(Debug, Deserialize)]
pub struct AttributeParams {
    pub name: String,
}

/// Parameters for the `/api/v1/attributes` endpoint.
#[derive(Debug, Deserialize)]
pub struct AttributesParams {
    /// Only list attributes currently being archived
    pub active: Option<bool>,
}

/// JSON envelope shared by all API responses.
#[derive(Debug, Serialize)]
pub struct ApiResponse<'a> {
    /// Response status ("success" | "error")
    pub status: &'a str,
    /// Response data payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Error type
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "errorType")]
    pub error_type: Option<&'a str>,
    /// Error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse<'_> {
    /// Successful response carrying `data`.
    pub fn success(data: serde_json::Value) -> Response {
        let body = ApiResponse { status: "success", data: Some(data), error_type: None, error: None };
        (StatusCode::OK, Json(body)).into_response()
    }

    /// Error response with the status code matching `err`.
    pub fn failure(err: &ArchivingError) -> Response {
        tracing::warn!(error = %err, "request rejected");
        let body = ApiResponse {
            status: "error",
            data: None,
            error_type: Some(err.kind()),
            error: Some(err.to_string()),
        };
        (status_for(err), Json(body)).into_response()
    }
}

/// HTTP status for each error kind.
pub const fn status_for(err: &ArchivingError) -> StatusCode {
    match err {
        ArchivingError::InvalidName { .. } => StatusCode::BAD_REQUEST,
        ArchivingError::ReadOnly { .. } => StatusCode::FORBIDDEN,
        ArchivingError::UnsupportedShape { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ArchivingError::BackendUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// One attribute view as returned by the read endpoints.
#[derive(Debug, Serialize)]
pub struct SeriesView<'a> {
    pub name: &'a str,
    pub label: String,
    pub format: DataFormat,
    #[serde(rename = "type")]
    pub data_type: DataType,
    /// `[timestamp, value]` pairs
    pub values: Vec<(f64, &'a SampleValue)>,
}

impl<'a> SeriesView<'a> {
    pub fn new(name: &'a str, label: String, series: &'a AttributeSeries) -> Self {
        Self {
            name,
            label,
            format: series.format,
            data_type: series.data_type,
            values: series.samples.iter().map(|s| (s.timestamp, &s.value)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test NameParams deserialization.
    #[test]
    fn test_name_params_deserialization() {
        let json = r#"{"name": "tgarch:/a/b/c/d", "kind": "attribute"}"#;
        let params: NameParams = serde_json::from_str(json).expect("valid JSON");
        assert_eq!(params.name, "tgarch:/a/b/c/d");
        assert_eq!(params.kind.as_deref(), Some("attribute"));
        assert_eq!(params.fragment, None);
    }

    /// Test ApiResponse serialization with error status.
    #[test]
    fn test_api_response_error() {
        let response = ApiResponse {
            status: "error",
            data: None,
            error_type: Some("read_only"),
            error: Some("archived attribute 'x' is read-only".to_string()),
        };

        let json = serde_json::to_string(&response).expect("valid structure");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");

        assert_eq!(parsed["status"], "error");
        assert_eq!(parsed["errorType"], "read_only");
        assert!(parsed.get("data").is_none());
    }

    /// Test status codes for every error kind.
    #[test]
    fn test_status_for() {
        let cases = [
            (ArchivingError::invalid_name("x", "bad"), StatusCode::BAD_REQUEST),
            (ArchivingError::ReadOnly { name: "x".into() }, StatusCode::FORBIDDEN),
            (ArchivingError::UnsupportedShape { reason: "3-D".into() }, StatusCode::UNPROCESSABLE_ENTITY),
            (ArchivingError::BackendUnavailable { reason: "down".into() }, StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(status_for(&err), status);
        }
    }

    /// Test series view serialization.
    #[test]
    fn test_series_view() {
        let series = AttributeSeries {
            format: DataFormat::OneD,
            data_type: DataType::Integer,
            samples: vec![crate::cache::Sample {
                timestamp: 10.0,
                value: SampleValue::from(vec![1.0, 2.0]),
            }],
        };
        let view = SeriesView::new("n", "a/b/c/d (archiving)".to_string(), &series);
        let json = serde_json::to_value(&view).expect("serialize");
        assert_eq!(json["format"], "1d");
        assert_eq!(json["type"], "integer");
        assert_eq!(json["values"], serde_json::json!([[10.0, [1.0, 2.0]]]));
    }
}
