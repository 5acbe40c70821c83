//! The inheritance index over every framework model in the workspace.

use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use globwalk::FileType;
use ignore::gitignore::Gitignore;
use ignore::Match;
use tokio::sync::{watch, Mutex, RwLock, RwLockReadGuard};
use tracing::{debug, info, instrument, warn};

use crate::error::IndexError;
use crate::model::{extract_models, ModelRecord};
use crate::syntax::SourceFile;
use crate::utils::normalize_path;
use crate::{ok, ImStr};

mod graph;
mod module;

pub use graph::{Graph, ModelPrefixTrie};
pub use module::{parse_manifest, ManifestInfo, ModuleEntry, ModuleIndex, MANIFEST_FILE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
	/// No full scan has completed yet and none is running.
	Empty,
	/// A rebuild or an update batch is in flight.
	Indexing,
	Ready,
}

#[derive(Debug, Clone, Copy, Default)]
struct Status {
	active: usize,
	ready_once: bool,
}

impl Status {
	fn state(&self) -> IndexState {
		match (self.active, self.ready_once) {
			(0, false) => IndexState::Empty,
			(0, true) => IndexState::Ready,
			_ => IndexState::Indexing,
		}
	}
}

/// Marks the index busy until dropped.
struct Activity<'a>(&'a watch::Sender<Status>);

impl Drop for Activity<'_> {
	fn drop(&mut self) {
		self.0.send_modify(|status| status.active -= 1);
	}
}

struct RebuildGuard<'a>(&'a AtomicBool);

impl Drop for RebuildGuard<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}

pub struct ModelIndex {
	graph: RwLock<Graph>,
	status: watch::Sender<Status>,
	rebuilding: AtomicBool,
	generations: DashMap<ImStr, u64>,
	file_locks: DashMap<ImStr, Arc<Mutex<()>>>,
	ready_timeout: Duration,
}

impl ModelIndex {
	pub fn new(ready_timeout: Duration) -> Self {
		let (status, _) = watch::channel(Status::default());
		Self {
			graph: Default::default(),
			status,
			rebuilding: AtomicBool::new(false),
			generations: DashMap::with_shard_amount(4),
			file_locks: DashMap::with_shard_amount(4),
			ready_timeout,
		}
	}

	pub fn state(&self) -> IndexState {
		self.status.borrow().state()
	}

	/// Whether a full scan has completed at least once.
	pub fn is_ready(&self) -> bool {
		self.status.borrow().ready_once
	}

	fn begin(&self) -> Activity<'_> {
		self.status.send_modify(|status| status.active += 1);
		Activity(&self.status)
	}

	/// Waits for the first full scan, up to the configured timeout.
	/// Returns whether the index was ready in time; callers proceed either way.
	pub async fn wait_ready(&self) -> bool {
		let mut status = self.status.subscribe();
		let ready = tokio::time::timeout(self.ready_timeout, status.wait_for(|status| status.ready_once)).await;
		match ready {
			Ok(Ok(_)) => true,
			_ => {
				debug!("index not ready after {:?}, serving a partial view", self.ready_timeout);
				false
			}
		}
	}

	/// Read access after [`wait_ready`](Self::wait_ready).
	pub async fn read(&self) -> RwLockReadGuard<'_, Graph> {
		self.wait_ready().await;
		self.graph.read().await
	}

	/// Replaces the whole index with a fresh scan of `roots`.
	///
	/// Returns `None` when another rebuild is already running; that one wins.
	#[instrument(skip_all, fields(roots = roots.len()))]
	pub async fn rebuild_all(&self, roots: &[PathBuf]) -> Option<usize> {
		if self.rebuilding.swap(true, Ordering::AcqRel) {
			debug!("rebuild already in progress");
			return None;
		}
		let _rebuild = RebuildGuard(&self.rebuilding);
		let _activity = self.begin();

		let before = self.generation_snapshot();
		let graph = scan_roots(roots).await;
		let count = self.install(graph, &before).await;
		self.status.send_modify(|status| status.ready_once = true);
		info!("indexed {count} models");
		Some(count)
	}

	fn generation_snapshot(&self) -> HashMap<ImStr, u64> {
		self.generations
			.iter()
			.map(|entry| (entry.key().clone(), *entry.value()))
			.collect()
	}

	/// Swaps in a freshly scanned `graph`. Files updated since `before` was taken
	/// may have been read by the scan before they changed, so they are re-read
	/// under the write lock first.
	async fn install(&self, mut graph: Graph, before: &HashMap<ImStr, u64>) -> usize {
		let mut current = self.graph.write().await;
		let touched = self
			.generations
			.iter()
			.filter(|entry| before.get(entry.key()) != Some(entry.value()))
			.map(|entry| entry.key().clone())
			.collect::<Vec<_>>();
		for key in touched {
			debug!("{key} changed during rebuild");
			let records = scan_file(Path::new(key.as_str())).await;
			graph.remove_file(&key);
			for record in records {
				graph.add_record(record);
			}
		}
		let count = graph.len();
		*current = graph;
		count
	}

	/// Re-scans each of `paths`, returning the identifiers whose records were
	/// removed, replaced or added.
	#[instrument(skip_all, fields(files = paths.len()))]
	pub async fn update_for_files(&self, paths: &[PathBuf]) -> HashSet<ImStr> {
		let _activity = self.begin();
		let mut updates = paths
			.iter()
			.map(|path| self.update_file(path))
			.collect::<FuturesUnordered<_>>();
		let mut changed = HashSet::new();
		while let Some(ids) = updates.next().await {
			changed.extend(ids);
		}
		changed
	}

	async fn update_file(&self, path: &Path) -> Vec<ImStr> {
		let path = normalize_path(path);
		let key = ImStr::from(path.to_string_lossy().as_ref());
		let generation = {
			let mut current = self.generations.entry(key.clone()).or_insert(0);
			*current += 1;
			*current
		};
		let lock = self.file_locks.entry(key.clone()).or_default().clone();
		let _serial = lock.lock().await;
		if self.generations.get(&key).map(|current| *current) != Some(generation) {
			debug!("{key} superseded by a newer update");
			return vec![];
		}

		let records = scan_file(&path).await;
		let mut graph = self.graph.write().await;
		let mut changed = graph.remove_file(&key);
		for record in records {
			changed.push(record.identifier.clone());
			graph.add_record(record);
		}
		changed
	}

	/// Inserts or replaces a single record.
	pub async fn add_record(&self, record: ModelRecord) {
		self.graph.write().await.add_record(record);
	}

	pub async fn remove_record(&self, identifier: &str) -> Option<Arc<ModelRecord>> {
		self.graph.write().await.remove_record(identifier)
	}

	pub async fn get_model(&self, identifier: &str) -> Option<Arc<ModelRecord>> {
		self.read().await.get(identifier).cloned()
	}

	/// Every stored record, ordered by identifier.
	pub async fn get_all_models(&self) -> Vec<Arc<ModelRecord>> {
		let mut records = self.read().await.records().cloned().collect::<Vec<_>>();
		records.sort_unstable_by(|lhs, rhs| lhs.identifier.cmp(&rhs.identifier));
		records
	}

	pub async fn get_children(&self, identifier: &str) -> Vec<ImStr> {
		self.read().await.children(identifier)
	}

	pub async fn get_parents(&self, identifier: &str) -> Vec<ImStr> {
		self.read().await.parents(identifier)
	}

	pub async fn models_with_prefix(&self, prefix: &str) -> Vec<ImStr> {
		let mut models = self.read().await.models_with_prefix(prefix);
		models.sort_unstable();
		models
	}

	pub async fn lineage(&self, identifier: &str) -> Vec<Arc<ModelRecord>> {
		self.read().await.lineage(identifier)
	}

	pub async fn descendants(&self, ids: &HashSet<ImStr>) -> HashSet<ImStr> {
		self.graph.read().await.descendants(ids)
	}
}

async fn scan_roots(roots: &[PathBuf]) -> Graph {
	let mut paths = vec![];
	for root in roots {
		match discover(root, "**/*.py") {
			Ok(found) => paths.extend(found),
			Err(err) => warn!("{err:#}"),
		}
	}

	let mut graph = Graph::default();
	let mut files = paths
		.into_iter()
		.map(|path| async move {
			let file = SourceFile::read(&path).await;
			(path, file)
		})
		.collect::<FuturesUnordered<_>>();
	while let Some((path, file)) = files.next().await {
		match file {
			Ok(file) => {
				for record in extract_models(&Arc::new(file)) {
					graph.add_record(record);
				}
			}
			Err(err) => warn!("skipping {}: {err}", path.display()),
		}
	}
	graph
}

/// Records declared in `path` as it is on disk. A missing or unreadable file declares none.
async fn scan_file(path: &Path) -> Vec<ModelRecord> {
	match SourceFile::read(path).await {
		Ok(file) => extract_models(&Arc::new(file)),
		Err(IndexError::Read { source, .. }) if source.kind() == ErrorKind::NotFound => {
			debug!("{} was removed", path.display());
			vec![]
		}
		Err(err) => {
			warn!("{err}");
			vec![]
		}
	}
}

fn matched_top_to_bottom(gitignore: &Gitignore, path: &Path) -> bool {
	path.ancestors()
		.collect::<Vec<_>>()
		.into_iter()
		.rev()
		.any(|ancestor| matches!(gitignore.matched(ancestor, true), Match::Ignore(_)))
}

/// Files under `root` matching `pattern`, minus anything the root `.gitignore` excludes.
/// Paths are reported under the normalized root.
pub fn discover(root: &Path, pattern: &str) -> anyhow::Result<Vec<PathBuf>> {
	let root = &normalize_path(root);
	let walker = ok!(
		globwalk::glob_builder(root.join(pattern).to_string_lossy())
			.file_type(FileType::FILE | FileType::SYMLINK)
			.follow_links(true)
			.build(),
		"Could not glob into {:?}",
		root
	);
	let mut gitignore = ignore::gitignore::GitignoreBuilder::new(root);
	if let Some(err) = gitignore.add(root.join(".gitignore")) {
		debug!("no usable .gitignore in {root:?}: {err}");
	}
	let gitignore = gitignore
		.build()
		.inspect_err(|err| warn!("gitignore error for {root:?}: {err:?}"))
		.ok();

	let mut found = vec![];
	for entry in walker {
		let Ok(entry) = entry else { continue };
		let path = entry.path();
		let ignored = match (&gitignore, path.strip_prefix(root)) {
			(Some(gitignore), Ok(relative)) => matched_top_to_bottom(gitignore, relative),
			_ => false,
		};
		if !ignored {
			found.push(path.to_path_buf());
		}
	}
	found.sort();
	Ok(found)
}
