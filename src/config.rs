use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use smart_default::SmartDefault;
use tracing::{debug, warn};

use crate::error::{IndexError, Result};

/// Name of the optional per-project configuration file.
pub const CONFIG_FILE: &str = ".odoo_index.json";

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Config {
	pub index: Option<IndexConfig>,
	pub fields: Option<FieldsConfig>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct IndexConfig {
	/// Extra directories scanned alongside the workspace root, relative to it.
	pub roots: Option<Vec<String>>,
	pub ready_timeout_ms: Option<u64>,
	pub workers: Option<usize>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct FieldsConfig {
	pub wait_ms: Option<u64>,
}

impl Config {
	pub fn from_json(value: serde_json::Value) -> Result<Self> {
		Ok(serde_json::from_value(value)?)
	}

	/// Reads [`CONFIG_FILE`] from `root`, falling back to the defaults when it is absent or malformed.
	pub async fn load(root: &Path) -> Self {
		let path = root.join(CONFIG_FILE);
		let contents = match tokio::fs::read(&path).await {
			Ok(contents) => contents,
			Err(err) => {
				debug!("no config at {}: {err}", path.display());
				return Self::default();
			}
		};
		serde_json::from_slice(&contents)
			.map_err(IndexError::from)
			.inspect_err(|err| warn!("ignoring {}: {err}", path.display()))
			.unwrap_or_default()
	}
}

/// [`Config`] with every default filled in.
#[derive(Debug, Clone, SmartDefault)]
pub struct Settings {
	/// Upper bound on how long index reads wait for the first full scan.
	#[default(Duration::from_secs(5))]
	pub ready_timeout: Duration,
	/// Upper bound on how long field resolution blocks the caller.
	#[default(Duration::from_millis(50))]
	pub field_wait: Duration,
	#[default(2)]
	pub workers: usize,
	pub roots: Vec<PathBuf>,
}

impl Settings {
	pub fn resolve(config: &Config, root: &Path) -> Self {
		let mut settings = Self {
			roots: vec![root.to_path_buf()],
			..Default::default()
		};
		if let Some(index) = &config.index {
			if let Some(ms) = index.ready_timeout_ms {
				settings.ready_timeout = Duration::from_millis(ms);
			}
			if let Some(workers) = index.workers {
				settings.workers = workers.max(1);
			}
			for extra in index.roots.iter().flatten() {
				let extra = root.join(extra);
				if !settings.roots.contains(&extra) {
					settings.roots.push(extra);
				}
			}
		}
		if let Some(ms) = config.fields.as_ref().and_then(|fields| fields.wait_ms) {
			settings.field_wait = Duration::from_millis(ms);
		}
		settings
	}
}
