//! One open project: settings, the model index, member resolvers and the module index.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::config::{Config, Settings};
use crate::index::{IndexState, ModelIndex, ModuleEntry, ModuleIndex, MANIFEST_FILE};
use crate::inspect::{inspect_file, inspect_parents, Diagnostic};
use crate::model::{FieldKind, FieldRecord, FrameworkMethod, MethodRecord, ModelRecord, FIELD_ATTRIBUTES, FRAMEWORK_METHODS};
use crate::resolve::{FieldResolver, MethodResolver};
use crate::syntax::SourceFile;
use crate::utils::{MinLoc, WorkerPool};
use crate::ImStr;

const SUMMARY_FIELDS: usize = 10;
const SUMMARY_CHILDREN: usize = 5;

/// Plain data behind a model's hover documentation.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
	pub identifier: ImStr,
	pub description: ImStr,
	pub parents: Vec<ImStr>,
	/// The first few merged fields.
	pub fields: Vec<FieldRecord>,
	pub field_count: usize,
	/// The first few models inheriting from this one.
	pub children: Vec<ImStr>,
	pub child_count: usize,
	pub module: Option<ImStr>,
	pub location: MinLoc,
}

impl ModelSummary {
	pub fn to_markdown(&self) -> String {
		let mut out = format!("**{}**", self.identifier);
		if let Some(module) = &self.module {
			_ = write!(out, " ({module})");
		}
		if !self.description.is_empty() {
			_ = write!(out, "\n\n{}", self.description);
		}
		if !self.parents.is_empty() {
			let parents = self.parents.iter().map(ImStr::as_str).collect::<Vec<_>>();
			_ = write!(out, "\n\n*Inherits:* {}", parents.join(", "));
		}
		if !self.fields.is_empty() {
			_ = write!(out, "\n\n*Fields ({}):*", self.field_count);
			for field in &self.fields {
				_ = write!(out, "\n- `{}`: {}", field.name, field.kind);
				if field.required {
					out.push_str(" (required)");
				}
			}
			if self.field_count > self.fields.len() {
				_ = write!(out, "\n- ... and {} more", self.field_count - self.fields.len());
			}
		}
		if !self.children.is_empty() {
			let children = self.children.iter().map(ImStr::as_str).collect::<Vec<_>>();
			_ = write!(out, "\n\n*Inherited by:* {}", children.join(", "));
			if self.child_count > self.children.len() {
				_ = write!(out, " and {} more", self.child_count - self.children.len());
			}
		}
		out
	}
}

pub struct Workspace {
	root: PathBuf,
	settings: Settings,
	index: Arc<ModelIndex>,
	modules: RwLock<Arc<ModuleIndex>>,
	fields: FieldResolver,
	methods: MethodResolver,
	pool: WorkerPool,
	started: AtomicBool,
}

impl Workspace {
	/// Opens `root` and starts the initial scan in the background.
	///
	/// Without an explicit `config`, `.odoo_index.json` at the root is used if present.
	pub async fn open(root: impl Into<PathBuf>, config: Option<Config>) -> Arc<Self> {
		let root = root.into();
		let config = match config {
			Some(config) => config,
			None => Config::load(&root).await,
		};
		let settings = Settings::resolve(&config, &root);
		let workspace = Arc::new(Self::new(root, settings));
		workspace.ensure_started();
		workspace
	}

	fn new(root: PathBuf, settings: Settings) -> Self {
		let index = Arc::new(ModelIndex::new(settings.ready_timeout));
		let pool = WorkerPool::new(settings.workers);
		Self {
			fields: FieldResolver::new(index.clone(), pool.clone(), settings.field_wait),
			methods: MethodResolver::new(index.clone()),
			modules: Default::default(),
			index,
			pool,
			root,
			settings,
			started: AtomicBool::new(false),
		}
	}

	#[inline]
	pub fn root(&self) -> &Path {
		&self.root
	}

	#[inline]
	pub fn settings(&self) -> &Settings {
		&self.settings
	}

	pub fn state(&self) -> IndexState {
		self.index.state()
	}

	/// Starts a full scan unless one has already been started.
	pub fn ensure_started(self: &Arc<Self>) {
		if self.started.swap(true, Ordering::AcqRel) {
			return;
		}
		let this = self.clone();
		_ = self.pool.spawn(async move { this.rebuild().await });
	}

	/// Rescans manifests and sources from scratch. Returns `None` if a rebuild was already running.
	#[instrument(skip_all, fields(root = %self.root.display()))]
	pub async fn rebuild(&self) -> Option<usize> {
		self.rediscover_modules().await;
		let count = self.index.rebuild_all(&self.settings.roots).await?;
		self.fields.clear();
		self.methods.clear();
		info!("workspace ready with {count} models");
		Some(count)
	}

	/// Scans every root for manifests into a fresh module index, then swaps it in.
	async fn rediscover_modules(&self) {
		let modules = ModuleIndex::default();
		for root in &self.settings.roots {
			match modules.discover(root).await {
				Ok(count) => debug!("{count} modules under {}", root.display()),
				Err(err) => warn!("{err:#}"),
			}
		}
		*self.modules.write().await = Arc::new(modules);
	}

	async fn module_index(&self) -> Arc<ModuleIndex> {
		self.modules.read().await.clone()
	}

	/// Waits for the initial scan, up to the configured timeout.
	pub async fn ready(&self) -> bool {
		self.index.wait_ready().await
	}

	/// Applies on-disk changes of `paths`, then drops cached members of every
	/// changed model and everything inheriting from it.
	#[instrument(skip_all, fields(files = paths.len()))]
	pub async fn files_changed(&self, paths: &[PathBuf]) -> HashSet<ImStr> {
		if paths
			.iter()
			.any(|path| path.file_name().is_some_and(|name| name == MANIFEST_FILE))
		{
			self.rediscover_modules().await;
		}
		let sources = paths
			.iter()
			.filter(|path| path.extension().is_some_and(|ext| ext == "py"))
			.cloned()
			.collect::<Vec<_>>();
		if sources.is_empty() {
			return HashSet::new();
		}
		let changed = self.index.update_for_files(&sources).await;
		let affected = self.index.descendants(&changed).await;
		self.fields.invalidate(&affected);
		self.methods.invalidate(&affected);
		debug!("{} models changed, {} invalidated", changed.len(), affected.len());
		changed
	}

	/// Waits for background jobs to drain and drops every cache.
	pub async fn close(&self) {
		self.pool.close().await;
		self.fields.clear();
		self.methods.clear();
	}

	/// Whether the workspace contains at least one framework module.
	pub async fn is_framework_project(&self) -> bool {
		self.index.wait_ready().await;
		!self.module_index().await.is_empty()
	}

	pub async fn find_model(&self, identifier: &str) -> Option<Arc<ModelRecord>> {
		self.index.get_model(identifier).await
	}

	pub async fn all_models(&self) -> Vec<Arc<ModelRecord>> {
		self.index.get_all_models().await
	}

	/// Models that directly list `identifier` as a parent.
	pub async fn models_inheriting(&self, identifier: &str) -> Vec<Arc<ModelRecord>> {
		let graph = self.index.read().await;
		graph
			.children(identifier)
			.iter()
			.filter_map(|child| graph.get(child).cloned())
			.collect()
	}

	pub async fn models_with_prefix(&self, prefix: &str) -> Vec<ImStr> {
		self.index.models_with_prefix(prefix).await
	}

	/// Abstract models, plus models whose class name marks them as a mixin.
	pub async fn mixins(&self) -> Vec<Arc<ModelRecord>> {
		let mut models = self.all_models().await;
		models.retain(|model| model.is_mixin());
		models
	}

	pub async fn fields_of(&self, identifier: &str) -> Arc<[FieldRecord]> {
		self.fields.resolve(identifier).await
	}

	pub async fn methods_of(&self, identifier: &str) -> Arc<[MethodRecord]> {
		self.methods.resolve(identifier).await
	}

	/// The model a relational field points to.
	pub async fn related_model_of(&self, field: &FieldRecord) -> Option<Arc<ModelRecord>> {
		if !field.kind.is_relational() {
			return None;
		}
		self.find_model(field.comodel.as_deref()?).await
	}

	/// The field a dotted path like `partner_id.country_id` ends at.
	pub async fn resolve_related(&self, identifier: &str, path: &str) -> Option<FieldRecord> {
		self.fields.resolve_path(identifier, path).await
	}

	pub fn framework_methods(&self) -> &'static [FrameworkMethod] {
		FRAMEWORK_METHODS
	}

	/// Keyword arguments `kind` accepts.
	pub fn field_attributes(&self, kind: FieldKind) -> Vec<&'static str> {
		FIELD_ATTRIBUTES.iter().chain(kind.attributes()).copied().collect()
	}

	pub async fn modules(&self) -> Vec<ModuleEntry> {
		self.module_index().await.all()
	}

	pub async fn module_of(&self, identifier: &str) -> Option<ModuleEntry> {
		let record = self.find_model(identifier).await?;
		let modules = self.module_index().await;
		let name = modules.find_module_of(Path::new(record.path()))?;
		modules.get(&name).map(|entry| entry.value().clone())
	}

	pub async fn describe(&self, identifier: &str) -> Option<ModelSummary> {
		let record = self.find_model(identifier).await?;
		let fields = self.fields.resolve_complete(identifier).await;
		let children = self.index.get_children(identifier).await;
		let module = self.module_index().await.find_module_of(Path::new(record.path()));
		Some(ModelSummary {
			identifier: record.identifier.clone(),
			description: record.description.clone(),
			parents: record.parents.clone(),
			fields: fields.iter().take(SUMMARY_FIELDS).cloned().collect(),
			field_count: fields.len(),
			child_count: children.len(),
			children: children.into_iter().take(SUMMARY_CHILDREN).collect(),
			module,
			location: record.declaration.location.clone(),
		})
	}

	/// Diagnostics for the file at `path` as it is on disk. Unknown parents are
	/// only reported once the index has completed a scan.
	pub async fn inspect(&self, path: &Path) -> anyhow::Result<Vec<Diagnostic>> {
		let file = SourceFile::read(path).await?;
		let mut diagnostics = inspect_file(&file);
		if self.index.is_ready() {
			let graph = self.index.read().await;
			for class in file.classes() {
				diagnostics.extend(inspect_parents(&class, |parent| graph.get(parent).is_some()));
			}
		}
		Ok(diagnostics)
	}
}

#[cfg(test)]
mod tests;
