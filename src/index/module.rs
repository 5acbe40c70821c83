use std::path::{Path, PathBuf};

use dashmap::DashMap;
use derive_more::Deref;
use serde::Serialize;
use tracing::{debug, warn};

use crate::syntax::{Expr, SourceFile};
use crate::utils::normalize_path;
use crate::{errloc, ImStr};

pub const MANIFEST_FILE: &str = "__manifest__.py";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ManifestInfo {
	/// The human-readable `name` entry, which differs from the directory name.
	pub display_name: Option<String>,
	pub version: Option<String>,
	pub depends: Vec<ImStr>,
	pub auto_install: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleEntry {
	/// Technical name, i.e. the directory holding the manifest.
	pub name: ImStr,
	pub path: PathBuf,
	#[serde(flatten)]
	pub manifest: ManifestInfo,
}

/// Modules found under the workspace roots, keyed by technical name.
#[derive(Default, Deref)]
pub struct ModuleIndex {
	#[deref]
	modules: DashMap<ImStr, ModuleEntry>,
}

pub fn parse_manifest(file: &SourceFile) -> anyhow::Result<ManifestInfo> {
	let entries = file.manifest_entries();
	if entries.is_empty() {
		return Err(errloc!("{} is not a manifest dictionary", file.path));
	}
	let mut info = ManifestInfo::default();
	for (key, value) in entries {
		match key.as_ref() {
			"name" => info.display_name = value.as_str().map(String::from),
			"version" => info.version = value.as_str().map(String::from),
			"depends" => {
				info.depends = value
					.elements()
					.unwrap_or_default()
					.iter()
					.filter_map(Expr::as_str)
					.map(ImStr::from)
					.collect()
			}
			// A list means "install when these are installed", which is still auto-install.
			"auto_install" => info.auto_install = matches!(value, Expr::Bool(true) | Expr::List(_)),
			_ => {}
		}
	}
	Ok(info)
}

impl ModuleIndex {
	/// Scans `root` for manifests, returning how many modules were added.
	pub async fn discover(&self, root: &Path) -> anyhow::Result<usize> {
		let manifests = super::discover(root, &format!("**/{MANIFEST_FILE}"))?;
		let mut added = 0;
		for manifest in manifests {
			let Some(module_dir) = manifest.parent() else {
				continue;
			};
			let Some(name) = module_dir.file_name().map(|name| ImStr::from(name.to_string_lossy().as_ref())) else {
				continue;
			};
			if self.modules.contains_key(&name) {
				debug!("duplicate module {name} at {}", module_dir.display());
				continue;
			}
			let manifest_info = match SourceFile::read(&manifest).await {
				Ok(file) => parse_manifest(&file)
					.inspect_err(|err| warn!("could not parse manifest for {name}: {err}"))
					.unwrap_or_default(),
				Err(err) => {
					warn!("{err}");
					continue;
				}
			};
			self.modules.insert(
				name.clone(),
				ModuleEntry {
					name,
					path: module_dir.to_path_buf(),
					manifest: manifest_info,
				},
			);
			added += 1;
		}
		Ok(added)
	}

	/// The innermost module whose directory contains `path`.
	pub fn find_module_of(&self, path: &Path) -> Option<ImStr> {
		let path = normalize_path(path);
		self.modules
			.iter()
			.filter(|entry| path.starts_with(&entry.path))
			.max_by_key(|entry| entry.path.components().count())
			.map(|entry| entry.key().clone())
	}

	/// Every module, ordered by name.
	pub fn all(&self) -> Vec<ModuleEntry> {
		let mut modules = self.modules.iter().map(|entry| entry.value().clone()).collect::<Vec<_>>();
		modules.sort_unstable_by(|lhs, rhs| lhs.name.cmp(&rhs.name));
		modules
	}
}
