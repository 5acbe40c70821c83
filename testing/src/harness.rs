use std::path::Path;
use std::sync::Arc;

use odoo_model_index::config::{Config, FieldsConfig, IndexConfig};
use odoo_model_index::Workspace;

/// Opens `root` with timeouts generous enough that no query degrades to a partial answer.
pub async fn open_workspace(root: &Path) -> Arc<Workspace> {
	let config = Config {
		index: Some(IndexConfig {
			ready_timeout_ms: Some(5000),
			workers: Some(2),
			..Default::default()
		}),
		fields: Some(FieldsConfig { wait_ms: Some(5000) }),
	};
	let workspace = Workspace::open(root, Some(config)).await;
	assert!(workspace.ready().await, "{} was not indexed in time", root.display());
	workspace
}
