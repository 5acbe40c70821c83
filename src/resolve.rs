//! Inherited member resolution: fields and methods merged over the inheritance graph.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tracing::{debug, instrument, trace};

use crate::index::ModelIndex;
use crate::model::{FieldRecord, MethodRecord, ModelRecord};
use crate::utils::WorkerPool;
use crate::ImStr;


/// Merges the members of every record in `lineage`, keeping the first
/// occurrence of each name. `lineage` is expected in merge order, see
/// [`Graph::lineage`](crate::index::Graph::lineage).
pub fn merge_members<T, M, N>(lineage: &[Arc<ModelRecord>], mut members: M, name: N) -> Vec<T>
where
	M: FnMut(&ModelRecord) -> Vec<T>,
	N: Fn(&T) -> &ImStr,
{
	let mut seen = HashSet::new();
	let mut out = vec![];
	for record in lineage {
		for member in members(record) {
			if seen.insert(name(&member).clone()) {
				out.push(member);
			}
		}
	}
	out
}

type FieldList = Arc<[FieldRecord]>;
type PendingFields = Shared<BoxFuture<'static, FieldList>>;

/// Resolves the full field list of a model, cached per identifier.
///
/// Computations run on the worker pool. [`resolve`](Self::resolve) only waits a
/// short while for them and returns an empty list on timeout; the computation
/// keeps going and fills the cache for the next caller.
#[derive(Clone)]
pub struct FieldResolver {
	index: Arc<ModelIndex>,
	pool: WorkerPool,
	wait: Duration,
	cache: Arc<DashMap<ImStr, FieldList>>,
	/// In-flight computations, tagged with the job that owns the entry.
	loading: Arc<DashMap<ImStr, (u64, PendingFields)>>,
	/// Bumped on every invalidation; computations started under an older epoch never populate the cache.
	epoch: Arc<AtomicU64>,
	jobs: Arc<AtomicU64>,
}

impl FieldResolver {
	pub fn new(index: Arc<ModelIndex>, pool: WorkerPool, wait: Duration) -> Self {
		Self {
			index,
			pool,
			wait,
			cache: Arc::new(DashMap::with_shard_amount(4)),
			loading: Arc::new(DashMap::with_shard_amount(4)),
			epoch: Arc::new(AtomicU64::new(0)),
			jobs: Arc::new(AtomicU64::new(0)),
		}
	}

	pub fn cached(&self, identifier: &str) -> Option<FieldList> {
		self.cache.get(identifier).map(|fields| fields.value().clone())
	}

	#[instrument(skip(self))]
	pub async fn resolve(&self, identifier: &str) -> FieldList {
		if let Some(fields) = self.cached(identifier) {
			return fields;
		}
		let pending = self.load(identifier);
		match tokio::time::timeout(self.wait, pending).await {
			Ok(fields) => fields,
			Err(_) => {
				debug!("fields of {identifier} not ready within {:?}", self.wait);
				Arc::from([])
			}
		}
	}

	/// Like [`resolve`](Self::resolve), but waits for the computation to finish.
	pub async fn resolve_complete(&self, identifier: &str) -> FieldList {
		if let Some(fields) = self.cached(identifier) {
			return fields;
		}
		self.load(identifier).await
	}

	fn load(&self, identifier: &str) -> PendingFields {
		let key = ImStr::from(identifier);
		self.loading
			.entry(key.clone())
			.or_insert_with(|| {
				let epoch = self.epoch.load(Ordering::Acquire);
				let job_id = self.jobs.fetch_add(1, Ordering::Relaxed);
				let index = self.index.clone();
				let cache = self.cache.clone();
				let loading = self.loading.clone();
				let current_epoch = self.epoch.clone();
				let job = self.pool.spawn(async move {
					let lineage = index.lineage(&key).await;
					let fields: FieldList = merge_members(&lineage, |record| record.fields(), |field| &field.name).into();
					if current_epoch.load(Ordering::Acquire) == epoch {
						trace!("caching {} fields for {key}", fields.len());
						cache.insert(key.clone(), fields.clone());
					}
					loading.remove_if(&key, |_, (owner, _)| *owner == job_id);
					fields
				});
				let pending = async move { job.await.ok().flatten().unwrap_or_else(|| Arc::from([])) }
					.boxed()
					.shared();
				(job_id, pending)
			})
			.1
			.clone()
	}

	/// Follows a dotted path of relational fields starting at `identifier`
	/// and returns the last field, e.g. `partner_id.country_id.code`.
	pub async fn resolve_path(&self, identifier: &str, path: &str) -> Option<FieldRecord> {
		let mut model = ImStr::from(identifier);
		let mut segments = path.split('.').peekable();
		while let Some(segment) = segments.next() {
			let fields = self.resolve_complete(&model).await;
			let field = fields.iter().find(|field| field.name == segment)?.clone();
			if segments.peek().is_none() {
				return Some(field);
			}
			model = field.comodel.clone()?;
		}
		None
	}

	pub fn invalidate<'a>(&self, identifiers: impl IntoIterator<Item = &'a ImStr>) {
		self.epoch.fetch_add(1, Ordering::AcqRel);
		for identifier in identifiers {
			self.cache.remove(identifier);
			self.loading.remove(identifier);
		}
	}

	pub fn clear(&self) {
		self.epoch.fetch_add(1, Ordering::AcqRel);
		self.cache.clear();
		self.loading.clear();
	}
}

/// Resolves the full method list of a model, cached per identifier.
pub struct MethodResolver {
	index: Arc<ModelIndex>,
	cache: DashMap<ImStr, Arc<[MethodRecord]>>,
	epoch: AtomicU64,
}

impl MethodResolver {
	pub fn new(index: Arc<ModelIndex>) -> Self {
		Self {
			index,
			cache: DashMap::with_shard_amount(4),
			epoch: AtomicU64::new(0),
		}
	}

	#[instrument(skip(self))]
	pub async fn resolve(&self, identifier: &str) -> Arc<[MethodRecord]> {
		if let Some(methods) = self.cache.get(identifier) {
			return methods.value().clone();
		}
		let epoch = self.epoch.load(Ordering::Acquire);
		let lineage = self.index.lineage(identifier).await;
		let methods: Arc<[MethodRecord]> =
			merge_members(&lineage, |record| record.methods(), |method| &method.name).into();
		if self.epoch.load(Ordering::Acquire) == epoch {
			self.cache.insert(identifier.into(), methods.clone());
		}
		methods
	}

	pub fn invalidate<'a>(&self, identifiers: impl IntoIterator<Item = &'a ImStr>) {
		self.epoch.fetch_add(1, Ordering::AcqRel);
		for identifier in identifiers {
			self.cache.remove(identifier);
		}
	}

	pub fn clear(&self) {
		self.epoch.fetch_add(1, Ordering::AcqRel);
		self.cache.clear();
	}
}
