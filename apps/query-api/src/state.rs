// [apps/query-api/src/state.rs]
use flowmap_domain_metadata::MetadataEditor;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub editor: Arc<MetadataEditor>,
}
