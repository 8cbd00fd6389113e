//! Name resolution handler.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
};

use crate::error::ArchivingError;
use crate::http::state::AppState;
use crate::http::types::{ApiResponse, NameParams};
use crate::names::ElementKind;

/// Resolve a name into its complete, normal and short forms.
///
/// # Parameters
///
/// - `state` - Application state holding the registry
/// - `params` - Name, element kind and fragment flag
///
/// # Returns
///
/// Returns the canonical forms, or `bad_data` for an invalid name or kind.
pub async fn names(
    State(state): State<AppState>,
    Query(params): Query<NameParams>,
) -> impl IntoResponse {
    let kind = match params.kind.as_deref().map(str::parse::<ElementKind>) {
        None => ElementKind::Attribute,
        Some(Ok(kind)) => kind,
        Some(Err(reason)) => {
            return ApiResponse::failure(&ArchivingError::invalid_name(&params.name, reason))
        }
    };
    let with_fragment = params.fragment.unwrap_or(false);

    match state.registry.resolve(&params.name, kind, state.now(), with_fragment) {
        Ok(resolved) => {
            let names = resolved.names;
            let mut data = serde_json::json!({
                "kind": kind.to_string(),
                "complete": names.complete,
                "normal": names.normal,
                "short": names.short,
            });
            if with_fragment {
                data["fragment"] = serde_json::json!(names.fragment);
            }
            ApiResponse::success(data)
        }
        Err(e) => ApiResponse::failure(&e),
    }
}
