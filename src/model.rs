//! Framework model declarations and their members.

use std::fmt::Display;
use std::sync::Arc;

use serde::Serialize;

use crate::syntax::{BaseShape, ClassDecl, Expr, SourceFile};
use crate::utils::{ByteRange, MinLoc};
use crate::ImStr;

mod field;
mod method;

pub use field::{extract_fields, FieldCategory, FieldKind, FieldRecord, FIELD_ATTRIBUTES};
pub use method::{extract_methods, FrameworkMethod, MethodKind, MethodRecord, FRAMEWORK_METHODS};

/// Module alias under which the framework exposes its base classes, as in `models.Model`.
pub const FRAMEWORK_ALIAS: &str = "models";

static MODEL_BASES: phf::Map<&'static str, ModelKind> = phf::phf_map! {
	"Model" => ModelKind::Regular,
	"TransientModel" => ModelKind::Transient,
	"AbstractModel" => ModelKind::Abstract,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
	Regular,
	Transient,
	Abstract,
}

/// Which framework base a class derives from, if any.
pub fn model_kind(bases: &[BaseShape]) -> Option<ModelKind> {
	bases.iter().find_map(|base| match *base {
		BaseShape::Name(name) => MODEL_BASES.get(name).copied(),
		BaseShape::Qualified { namespace, name } | BaseShape::QualifiedCall { namespace, name } => {
			if namespace == FRAMEWORK_ALIAS {
				MODEL_BASES.get(name).copied()
			} else {
				None
			}
		}
		BaseShape::Other => None,
	})
}

/// Where a model was declared. Shares the parsed file it came from so members
/// can be extracted lazily without re-reading the disk.
#[derive(Clone)]
pub struct Declaration {
	pub file: Arc<SourceFile>,
	pub byte_range: ByteRange,
	pub location: MinLoc,
}

impl std::fmt::Debug for Declaration {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		Display::fmt(&self.location, f)
	}
}

impl Declaration {
	pub fn class(&self) -> Option<ClassDecl<'_>> {
		self.file.class_at(&self.byte_range)
	}
}

#[derive(Debug, Clone)]
pub struct ModelRecord {
	pub identifier: ImStr,
	/// Name of the declaring Python class.
	pub type_name: ImStr,
	/// Empty when `_description` is absent or not a literal.
	pub description: ImStr,
	/// Declared parents in order, never including `identifier` itself.
	pub parents: Vec<ImStr>,
	pub kind: ModelKind,
	pub declaration: Declaration,
}

impl ModelRecord {
	#[inline]
	pub fn path(&self) -> &str {
		&self.declaration.location.path
	}

	pub fn fields(&self) -> Vec<FieldRecord> {
		self.declaration.class().map(|class| extract_fields(&class)).unwrap_or_default()
	}

	pub fn methods(&self) -> Vec<MethodRecord> {
		self.declaration.class().map(|class| extract_methods(&class)).unwrap_or_default()
	}

	pub fn is_mixin(&self) -> bool {
		self.kind == ModelKind::Abstract || self.type_name.contains("Mixin")
	}
}

/// Parent identifiers declared by `_inherit`: one for a string, every string element
/// for a list or tuple, nothing for any other shape.
pub fn declared_parents(value: &Expr) -> Vec<ImStr> {
	match value {
		Expr::Str(parent) if !parent.is_empty() => vec![ImStr::from(&**parent)],
		Expr::List(items) | Expr::Tuple(items) => items
			.iter()
			.filter_map(|item| item.as_str())
			.filter(|parent| !parent.is_empty())
			.map(ImStr::from)
			.collect(),
		_ => vec![],
	}
}

/// Builds a [`ModelRecord`] out of `class` if it is a framework model with a literal `_name`.
///
/// A malformed `_inherit` degrades to no parents rather than dropping the model.
pub fn extract_model(file: &Arc<SourceFile>, class: &ClassDecl) -> Option<ModelRecord> {
	let kind = model_kind(&class.bases())?;
	let name = class.attribute("_name")?;
	let identifier = ImStr::from(name.value.as_str()?);
	if identifier.is_empty() {
		return None;
	}
	let description = class
		.attribute("_description")
		.and_then(|attr| attr.value.as_str().map(ImStr::from))
		.unwrap_or_default();
	let mut parents = class
		.attribute("_inherit")
		.map(|attr| declared_parents(&attr.value))
		.unwrap_or_default();
	parents.retain(|parent| *parent != identifier);
	let mut seen = std::collections::HashSet::new();
	parents.retain(|parent| seen.insert(parent.clone()));

	Some(ModelRecord {
		identifier,
		type_name: class.name().into(),
		description,
		parents,
		kind,
		declaration: Declaration {
			file: file.clone(),
			byte_range: class.byte_range(),
			location: class.location(),
		},
	})
}

/// Every model declared in `file`, in source order.
pub fn extract_models(file: &Arc<SourceFile>) -> Vec<ModelRecord> {
	file.classes()
		.iter()
		.filter_map(|class| extract_model(file, class))
		.collect()
}
