use serde::Serialize;

use crate::syntax::ClassDecl;
use crate::utils::MinLoc;
use crate::ImStr;

static CRUD_METHODS: phf::Set<&'static str> = phf::phf_set!("create", "write", "unlink", "read");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
	Crud,
	Compute,
	Onchange,
	Inverse,
	Search,
	BusinessLogic,
}

impl MethodKind {
	/// Classifies a method by naming convention alone.
	pub fn of(name: &str) -> Self {
		if name.starts_with("_compute_") {
			MethodKind::Compute
		} else if name.starts_with("_onchange_") {
			MethodKind::Onchange
		} else if name.starts_with("_inverse_") {
			MethodKind::Inverse
		} else if name.starts_with("_search_") {
			MethodKind::Search
		} else if CRUD_METHODS.contains(name) {
			MethodKind::Crud
		} else {
			MethodKind::BusinessLogic
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodRecord {
	pub name: ImStr,
	pub kind: MethodKind,
	/// Declared parameters, receiver excluded.
	pub parameters: Vec<ImStr>,
	pub decorators: Vec<ImStr>,
	pub doc: Option<String>,
	pub location: MinLoc,
}

/// Method definitions of `class` in source order. A redefinition replaces the earlier one.
pub fn extract_methods(class: &ClassDecl) -> Vec<MethodRecord> {
	let mut methods: Vec<MethodRecord> = vec![];
	for decl in class.methods() {
		let is_static = decl.decorators.iter().any(|deco| *deco == "staticmethod");
		let mut parameters = decl.parameters.as_slice();
		if let [receiver, rest @ ..] = parameters {
			if !is_static && matches!(*receiver, "self" | "cls") {
				parameters = rest;
			}
		}
		let method = MethodRecord {
			name: decl.name.into(),
			kind: MethodKind::of(decl.name),
			parameters: parameters.iter().map(|param| ImStr::from(*param)).collect(),
			decorators: decl.decorators.iter().map(|deco| ImStr::from(*deco)).collect(),
			doc: decl.docstring.map(|doc| doc.into_owned()),
			location: class.file.location(decl.node),
		};
		match methods.iter_mut().find(|existing| existing.name == method.name) {
			Some(existing) => *existing = method,
			None => methods.push(method),
		}
	}
	methods
}

/// A method every model inherits from the framework base class.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FrameworkMethod {
	pub name: &'static str,
	pub kind: MethodKind,
	pub parameters: &'static [&'static str],
	pub description: &'static str,
}

macro_rules! framework_methods {
	($($name:literal => $kind:ident($($param:literal),*) $desc:literal;)*) => {
		&[$(FrameworkMethod {
			name: $name,
			kind: MethodKind::$kind,
			parameters: &[$($param),*],
			description: $desc,
		}),*]
	};
}

/// ORM methods available on every recordset.
pub static FRAMEWORK_METHODS: &[FrameworkMethod] = framework_methods! {
	"create" => Crud("vals_list") "Create new records from a list of value dictionaries.";
	"write" => Crud("vals") "Update every record in the set with the given values.";
	"unlink" => Crud() "Delete the records in the set.";
	"read" => Crud("fields", "load") "Read the requested fields of the records.";
	"browse" => Crud("ids") "Return a recordset for the given ids.";
	"exists" => Crud() "Return the subset of records that still exist.";
	"ensure_one" => Crud() "Raise unless the set holds exactly one record.";
	"copy" => Crud("default") "Duplicate the record, applying the given overrides.";
	"search" => Search("domain", "offset", "limit", "order") "Return records matching the domain.";
	"search_count" => Search("domain", "limit") "Count records matching the domain.";
	"search_read" => Search("domain", "fields", "offset", "limit", "order") "Search, then read the given fields.";
	"name_search" => Search("name", "args", "operator", "limit") "Search records by display name.";
	"filtered" => BusinessLogic("func") "Return the records satisfying a predicate or field path.";
	"filtered_domain" => BusinessLogic("domain") "Return the records satisfying a domain.";
	"mapped" => BusinessLogic("func") "Apply a function or field path to every record.";
	"sorted" => BusinessLogic("key", "reverse") "Return the set ordered by key.";
	"sudo" => BusinessLogic("flag") "Return the set in superuser mode.";
	"with_context" => BusinessLogic("*args", "**kwargs") "Return the set with an extended context.";
	"with_user" => BusinessLogic("user") "Return the set attached to another user.";
	"with_company" => BusinessLogic("company") "Return the set with another current company.";
	"default_get" => BusinessLogic("fields_list") "Return default values for the given fields.";
	"fields_get" => BusinessLogic("allfields", "attributes") "Return the definition of each field.";
	"name_create" => BusinessLogic("name") "Create a record from its display name only.";
	"action_archive" => BusinessLogic() "Set active to False on the records.";
	"action_unarchive" => BusinessLogic() "Set active to True on the records.";
};
