// [apps/query-api/src/handlers.rs]
//!
//! A single read endpoint answering "what nodes exist under address X"
//! for zero or more requested addresses, root nodes when none are
//! given. Presentation, auth, and pagination are out of scope — this
//! exists only to prove the pipeline's tables are queryable.

use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{info, instrument};

#[derive(Debug, Deserialize)]
pub struct NodesQuery {
    address: Option<String>,
}

/// `GET /nodes?address=10.0.0.0,20.0.0.0` — maps each requested address
/// to its immediate children, or `"_"` to the root nodes when no
/// address is given.
#[instrument(skip(state))]
pub async fn get_nodes(State(state): State<AppState>, Query(params): Query<NodesQuery>) -> Response {
    let addresses: Vec<String> = params
        .address
        .as_deref()
        .map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect())
        .unwrap_or_default();

    info!(count = addresses.len(), "serving node query");

    let mut result = BTreeMap::new();

    if addresses.is_empty() {
        match state.editor.get_root_nodes().await {
            Ok(nodes) => {
                result.insert("_".to_string(), nodes);
            }
            Err(err) => return error_response(err),
        }
    } else {
        for address in addresses {
            match state.editor.get_children(&address).await {
                Ok(nodes) => {
                    result.insert(address, nodes);
                }
                Err(err) => return error_response(err),
            }
        }
    }

    Json(result).into_response()
}

fn error_response(err: flowmap_domain_metadata::MetadataError) -> Response {
    (StatusCode::BAD_REQUEST, err.to_string()).into_response()
}

pub async fn health() -> &'static str {
    "ok"
}
