//! Archived attribute read, refresh and write handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};

use crate::attribute::ArchivedAttribute;
use crate::cache::AttributeSeries;
use crate::error::{ArchivingError, Result};
use crate::http::state::AppState;
use crate::http::types::{ApiResponse, AttributeParams, AttributesParams, SeriesView};
use crate::reader::SampleValue;

/// Read the view selected by the name, fetching it on first use.
///
/// # Parameters
///
/// - `state` - Application state holding the registry
/// - `params` - Attribute name
///
/// # Returns
///
/// Returns the label, format, type and `[timestamp, value]` pairs.
pub async fn read(
    State(state): State<AppState>,
    Query(params): Query<AttributeParams>,
) -> impl IntoResponse {
    with_attribute(&state, &params.name, |attribute| attribute.read()).await
}

/// Force a fetch of the named attribute and return the new view.
///
/// # Parameters
///
/// - `state` - Application state holding the registry
/// - `params` - Attribute name
///
/// # Returns
///
/// Returns the refreshed view, or the error that left the previous one cached.
pub async fn refresh(
    State(state): State<AppState>,
    Query(params): Query<AttributeParams>,
) -> impl IntoResponse {
    with_attribute(&state, &params.name, |attribute| attribute.refresh()).await
}

/// Attempt a write. Archived attributes are read-only, so this always fails.
///
/// # Parameters
///
/// - `state` - Application state holding the registry
/// - `params` - Attribute name
/// - `body` - JSON value to write (ignored beyond parsing)
///
/// # Returns
///
/// Returns `read_only` (403) for a valid name, `bad_data` (400) otherwise.
pub async fn write(
    State(state): State<AppState>,
    Query(params): Query<AttributeParams>,
    body: String,
) -> impl IntoResponse {
    let value = serde_json::from_str(&body).unwrap_or(SampleValue::Text(body));
    let result = state
        .registry
        .descriptor(&params.name, state.now())
        .and_then(|descriptor| state.registry.cache().write(&descriptor, &value));

    match result {
        Ok(()) => ApiResponse::success(serde_json::Value::Null),
        Err(e) => ApiResponse::failure(&e),
    }
}

/// List the attribute paths archived by the backend.
///
/// # Parameters
///
/// - `state` - Application state holding the registry
/// - `params` - Whether to list only actively archived attributes
///
/// # Returns
///
/// Returns the attribute paths, or `unavailable` (503) if the backend fails.
pub async fn attributes(
    State(state): State<AppState>,
    Query(params): Query<AttributesParams>,
) -> impl IntoResponse {
    let active = params.active.unwrap_or(false);
    let registry = Arc::clone(&state.registry);
    let listed = tokio::task::spawn_blocking(move || registry.archived_attributes(active))
        .await
        .unwrap_or_else(|e| Err(ArchivingError::BackendUnavailable { reason: e.to_string() }));

    match listed {
        Ok(names) => ApiResponse::success(serde_json::json!(names)),
        Err(e) => ApiResponse::failure(&e),
    }
}

/// Resolve `name` and run `op` off the async workers; readers may block.
async fn with_attribute<F>(state: &AppState, name: &str, op: F) -> Response
where
    F: FnOnce(&ArchivedAttribute) -> Result<Arc<AttributeSeries>> + Send + 'static,
{
    let attribute = match state.registry.attribute(name, state.now()) {
        Ok(attribute) => attribute,
        Err(e) => return ApiResponse::failure(&e),
    };

    let handle = Arc::clone(&attribute);
    let series = tokio::task::spawn_blocking(move || op(&handle))
        .await
        .unwrap_or_else(|e| Err(ArchivingError::BackendUnavailable { reason: e.to_string() }));
    state.registry.release(&attribute);

    match series {
        Ok(series) => {
            let view = SeriesView::new(attribute.full_name(), attribute.label(), &series);
            match serde_json::to_value(&view) {
                Ok(data) => ApiResponse::success(data),
                Err(e) => ApiResponse::failure(&ArchivingError::UnsupportedShape {
                    reason: e.to_string(),
                }),
            }
        }
        Err(e) => ApiResponse::failure(&e),
    }
}

#[cfg(test)]
mod tests {
    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use time::macros::datetime;

    use super::*;
    use crate::reader::{FixtureReader, RawSample};
    use crate::settings::ArchivingSettings;

    const NOW: f64 = 1_641_038_400.0;

    fn create_test_state(reader: Arc<FixtureReader>) -> AppState {
        let settings = ArchivingSettings {
            default_authority: Some("foo:1234".into()),
            ..ArchivingSettings::default()
        };
        AppState::builder()
            .with_reader(reader)
            .with_settings(settings)
            .with_fixed_now(datetime!(2022-01-01 12:00:00 UTC))
            .build()
            .expect("valid configuration")
    }

    fn create_reader() -> Arc<FixtureReader> {
        let reader = Arc::new(FixtureReader::new());
        reader.add_attribute(
            "sys/tg_test/1/ampli",
            Some("DevDouble"),
            vec![RawSample::new(NOW - 120.0, 1.5), RawSample::new(NOW - 60.0, 2.5)],
        );
        reader
    }

    fn params(name: &str) -> Query<AttributeParams> {
        Query(AttributeParams { name: name.to_string() })
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let (_, body) = response.into_parts();
        let body_bytes = axum::body::to_bytes(body, usize::MAX).await.expect("read body");
        serde_json::from_slice(&body_bytes).expect("parse JSON")
    }

    /// Test reading the value view.
    #[tokio::test]
    async fn test_read_values() {
        let state = create_test_state(create_reader());

        let response = read(State(state), params("tgarch:/sys/tg_test/1/ampli")).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"]["label"], "sys/tg_test/1/ampli (archiving)");
        assert_eq!(json["data"]["format"], "scalar");
        assert_eq!(json["data"]["type"], "float");
        assert_eq!(
            json["data"]["values"],
            serde_json::json!([[NOW - 120.0, 1.5], [NOW - 60.0, 2.5]])
        );
    }

    /// Test reading the timestamp view.
    #[tokio::test]
    async fn test_read_timestamps() {
        let state = create_test_state(create_reader());

        let response =
            read(State(state), params("tgarch:/sys/tg_test/1/ampli?ts")).await.into_response();
        let json = body_json(response).await;
        assert_eq!(json["data"]["label"], "sys/tg_test/1/ampli (archiving ts)");
        assert_eq!(json["data"]["values"][1], serde_json::json!([NOW - 60.0, NOW - 60.0]));
    }

    /// Test that a failed refresh reports the backend as unavailable.
    #[tokio::test]
    async fn test_refresh_backend_unavailable() {
        let reader = create_reader();
        let state = create_test_state(reader.clone());
        let name = "tgarch:/sys/tg_test/1/ampli";

        let response = refresh(State(state.clone()), params(name)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        reader.set_online(false);
        let response = refresh(State(state.clone()), params(name)).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["errorType"], "unavailable");

        let response = read(State(state.clone()), params(name)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.registry.len(), 1);
    }

    /// Test that writes are refused.
    #[tokio::test]
    async fn test_write_read_only() {
        let state = create_test_state(create_reader());

        let response =
            write(State(state.clone()), params("tgarch:/sys/tg_test/1/ampli"), "1.0".to_string())
                .await
                .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["errorType"], "read_only");
        assert!(state.registry.is_empty());

        let response = write(State(state), params("tgarch:/sys/tg_test/1"), String::new())
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    /// Test listing archived attributes.
    #[tokio::test]
    async fn test_attributes() {
        let state = create_test_state(create_reader());

        let response = attributes(State(state), Query(AttributesParams { active: Some(true) }))
            .await
            .into_response();
        let json = body_json(response).await;
        assert_eq!(json["data"], serde_json::json!(["sys/tg_test/1/ampli"]));
    }
}
