use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use qp_trie::{wrapper::BString, Trie};

use crate::model::ModelRecord;
use crate::ImStr;

pub type ModelPrefixTrie = Trie<BString, ImStr>;

/// Records plus both directions of the inheritance relation.
///
/// Every `p` listed in `parents[c]` has `c` either in `children[p]` or, once
/// the record of `p` has been removed, in `detached[p]`. Parents that were
/// never indexed keep their children as forward references.
#[derive(Default)]
pub struct Graph {
	models: HashMap<ImStr, Arc<ModelRecord>>,
	by_file: HashMap<ImStr, HashSet<ImStr>>,
	children: HashMap<ImStr, BTreeSet<ImStr>>,
	parents: HashMap<ImStr, Vec<ImStr>>,
	/// Children of removed records, reattached if the record comes back.
	detached: HashMap<ImStr, BTreeSet<ImStr>>,
	by_prefix: ModelPrefixTrie,
}

impl Graph {
	/// Inserts `record`, replacing any record already stored under its identifier.
	pub fn add_record(&mut self, record: ModelRecord) {
		let id = record.identifier.clone();
		if self.models.contains_key(&id) {
			self.remove_record(&id);
		}
		self.by_file
			.entry(record.declaration.location.path.clone())
			.or_default()
			.insert(id.clone());
		for parent in &record.parents {
			let edges = match self.detached.get_mut(parent) {
				Some(detached) => detached,
				None => self.children.entry(parent.clone()).or_default(),
			};
			edges.insert(id.clone());
		}
		if let Some(children) = self.detached.remove(&id) {
			self.children.entry(id.clone()).or_default().extend(children);
		}
		self.parents.insert(id.clone(), record.parents.clone());
		self.by_prefix.insert_str(&id, id.clone());
		self.models.insert(id, Arc::new(record));
	}

	/// Removes the record stored under `id` along with the edges it declared.
	/// `id` also stops being a key of the children map; the records inheriting
	/// from it keep their parent lists and are linked again if `id` is re-added.
	pub fn remove_record(&mut self, id: &str) -> Option<Arc<ModelRecord>> {
		let record = self.models.remove(id)?;
		if let Some(ids) = self.by_file.get_mut(record.path()) {
			ids.remove(id);
			if ids.is_empty() {
				self.by_file.remove(record.path());
			}
		}
		for parent in self.parents.remove(id).unwrap_or_default() {
			for edges in [&mut self.children, &mut self.detached] {
				if let Some(children) = edges.get_mut(&parent) {
					children.remove(id);
					if children.is_empty() {
						edges.remove(&parent);
					}
				}
			}
		}
		if let Some(children) = self.children.remove(id) {
			self.detached.entry(record.identifier.clone()).or_default().extend(children);
		}
		self.by_prefix.remove(id.as_bytes());
		Some(record)
	}

	/// Removes every record `path` still owns, returning their identifiers.
	pub fn remove_file(&mut self, path: &str) -> Vec<ImStr> {
		let Some(ids) = self.by_file.remove(path) else {
			return vec![];
		};
		let mut removed = vec![];
		for id in ids {
			let owned = self.models.get(&id).is_some_and(|record| record.path() == path);
			if owned && self.remove_record(&id).is_some() {
				removed.push(id);
			}
		}
		removed
	}

	#[inline]
	pub fn get(&self, id: &str) -> Option<&Arc<ModelRecord>> {
		self.models.get(id)
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.models.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.models.is_empty()
	}

	pub fn records(&self) -> impl Iterator<Item = &Arc<ModelRecord>> {
		self.models.values()
	}

	pub fn children(&self, id: &str) -> Vec<ImStr> {
		self.children
			.get(id)
			.map(|children| children.iter().cloned().collect())
			.unwrap_or_default()
	}

	pub fn parents(&self, id: &str) -> Vec<ImStr> {
		self.parents.get(id).cloned().unwrap_or_default()
	}

	pub fn models_with_prefix(&self, prefix: &str) -> Vec<ImStr> {
		self.by_prefix
			.iter_prefix(prefix.as_bytes())
			.map(|(_, id)| id.clone())
			.collect()
	}

	/// Records reachable from `id` through declared parents, in merge order:
	/// depth-first, parents visited in declaration order, each identifier once.
	pub fn lineage(&self, id: &str) -> Vec<Arc<ModelRecord>> {
		let mut visited = HashSet::new();
		let mut stack = vec![ImStr::from(id)];
		let mut out = vec![];
		while let Some(id) = stack.pop() {
			if !visited.insert(id.clone()) {
				continue;
			}
			let Some(record) = self.models.get(&id) else {
				continue;
			};
			out.push(record.clone());
			stack.extend(record.parents.iter().rev().cloned());
		}
		out
	}

	/// `ids` plus everything that transitively inherits from them, including
	/// records whose parent has just been removed.
	pub fn descendants<'a>(&self, ids: impl IntoIterator<Item = &'a ImStr>) -> HashSet<ImStr> {
		let mut out = HashSet::new();
		let mut stack = ids.into_iter().cloned().collect::<Vec<_>>();
		while let Some(id) = stack.pop() {
			if !out.insert(id.clone()) {
				continue;
			}
			for edges in [&self.children, &self.detached] {
				if let Some(children) = edges.get(&id) {
					stack.extend(children.iter().cloned());
				}
			}
		}
		out
	}

	/// Checks that the adjacency maps agree with each other and with the stored records.
	#[cfg(test)]
	pub fn assert_consistent(&self) {
		let linked = |edges: &HashMap<ImStr, BTreeSet<ImStr>>, parent: &ImStr, child: &ImStr| {
			edges.get(parent).is_some_and(|children| children.contains(child))
		};
		for (child, parents) in &self.parents {
			let record = self.models.get(child).expect("parents entry without record");
			assert_eq!(&record.parents, parents, "stale parent list for {child}");
			for parent in parents {
				let attached = linked(&self.children, parent, child);
				let detached = linked(&self.detached, parent, child);
				assert!(attached != detached, "{parent} -> {child} must be in exactly one of children or detached");
			}
		}
		for (parent, children) in self.children.iter().chain(&self.detached) {
			assert!(!children.is_empty(), "empty children entry for {parent}");
			for child in children {
				assert!(
					self.parents.get(child).is_some_and(|parents| parents.contains(parent)),
					"{child} -> {parent} missing from parents"
				);
			}
		}
		for parent in self.detached.keys() {
			assert!(!self.models.contains_key(parent), "{parent} is indexed but its children are detached");
		}
		for (path, ids) in &self.by_file {
			for id in ids {
				let record = self.models.get(id).expect("file entry without record");
				assert_eq!(record.path(), path.as_str());
			}
		}
		assert_eq!(self.models.len(), self.parents.len());
	}
}
