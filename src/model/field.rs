use std::collections::HashMap;

use serde::Serialize;

use crate::syntax::{Call, Callee, ClassDecl, Expr};
use crate::utils::MinLoc;
use crate::ImStr;

/// Module alias under which field constructors live, as in `fields.Char(...)`.
pub const FIELDS_ALIAS: &str = "fields";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FieldKind {
	Char,
	Text,
	Html,
	Boolean,
	Integer,
	Float,
	Monetary,
	Date,
	Datetime,
	Selection,
	Many2one,
	One2many,
	Many2many,
	Binary,
	Image,
	Json,
	Properties,
}

static FIELD_KINDS: phf::Map<&'static str, FieldKind> = phf::phf_map! {
	"Char" => FieldKind::Char,
	"Text" => FieldKind::Text,
	"Html" => FieldKind::Html,
	"Boolean" => FieldKind::Boolean,
	"Integer" => FieldKind::Integer,
	"Float" => FieldKind::Float,
	"Monetary" => FieldKind::Monetary,
	"Date" => FieldKind::Date,
	"Datetime" => FieldKind::Datetime,
	"Selection" => FieldKind::Selection,
	"Many2one" => FieldKind::Many2one,
	"One2many" => FieldKind::One2many,
	"Many2many" => FieldKind::Many2many,
	"Binary" => FieldKind::Binary,
	"Image" => FieldKind::Image,
	"Json" => FieldKind::Json,
	"Properties" => FieldKind::Properties,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldCategory {
	Text,
	Boolean,
	Numeric,
	Temporal,
	Selection,
	Relational,
	Binary,
	Structured,
}

/// Keyword arguments accepted by every field constructor.
pub const FIELD_ATTRIBUTES: &[&str] = &[
	"string",
	"help",
	"required",
	"readonly",
	"index",
	"default",
	"compute",
	"inverse",
	"search",
	"store",
	"related",
	"copy",
	"groups",
	"company_dependent",
	"tracking",
];

impl FieldKind {
	pub fn from_name(name: &str) -> Option<Self> {
		FIELD_KINDS.get(name).copied()
	}

	pub fn as_str(self) -> &'static str {
		match self {
			FieldKind::Char => "Char",
			FieldKind::Text => "Text",
			FieldKind::Html => "Html",
			FieldKind::Boolean => "Boolean",
			FieldKind::Integer => "Integer",
			FieldKind::Float => "Float",
			FieldKind::Monetary => "Monetary",
			FieldKind::Date => "Date",
			FieldKind::Datetime => "Datetime",
			FieldKind::Selection => "Selection",
			FieldKind::Many2one => "Many2one",
			FieldKind::One2many => "One2many",
			FieldKind::Many2many => "Many2many",
			FieldKind::Binary => "Binary",
			FieldKind::Image => "Image",
			FieldKind::Json => "Json",
			FieldKind::Properties => "Properties",
		}
	}

	pub fn category(self) -> FieldCategory {
		match self {
			FieldKind::Char | FieldKind::Text | FieldKind::Html => FieldCategory::Text,
			FieldKind::Boolean => FieldCategory::Boolean,
			FieldKind::Integer | FieldKind::Float | FieldKind::Monetary => FieldCategory::Numeric,
			FieldKind::Date | FieldKind::Datetime => FieldCategory::Temporal,
			FieldKind::Selection => FieldCategory::Selection,
			FieldKind::Many2one | FieldKind::One2many | FieldKind::Many2many => FieldCategory::Relational,
			FieldKind::Binary | FieldKind::Image => FieldCategory::Binary,
			FieldKind::Json | FieldKind::Properties => FieldCategory::Structured,
		}
	}

	#[inline]
	pub fn is_relational(self) -> bool {
		self.category() == FieldCategory::Relational
	}

	/// Keyword attributes specific to this kind, on top of [`FIELD_ATTRIBUTES`].
	pub fn attributes(self) -> &'static [&'static str] {
		match self {
			FieldKind::Char => &["size", "trim", "translate"],
			FieldKind::Text => &["translate"],
			FieldKind::Html => &["translate", "sanitize", "strip_style"],
			FieldKind::Float => &["digits"],
			FieldKind::Monetary => &["currency_field"],
			FieldKind::Selection => &["selection", "selection_add", "ondelete"],
			FieldKind::Many2one => &["comodel_name", "domain", "context", "ondelete", "auto_join", "check_company"],
			FieldKind::One2many => &["comodel_name", "inverse_name", "domain", "context", "auto_join"],
			FieldKind::Many2many => &["comodel_name", "relation", "column1", "column2", "domain", "context"],
			FieldKind::Binary => &["attachment"],
			FieldKind::Image => &["attachment", "max_width", "max_height", "verify_resolution"],
			FieldKind::Boolean
			| FieldKind::Integer
			| FieldKind::Date
			| FieldKind::Datetime
			| FieldKind::Json
			| FieldKind::Properties => &[],
		}
	}

	/// Position of the label among positional arguments.
	fn label_position(self) -> usize {
		match self {
			FieldKind::Selection | FieldKind::Many2one => 1,
			FieldKind::One2many => 2,
			FieldKind::Many2many => 4,
			_ => 0,
		}
	}
}

impl std::fmt::Display for FieldKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldRecord {
	pub name: ImStr,
	pub kind: FieldKind,
	pub required: bool,
	pub readonly: bool,
	/// A `compute=` keyword is present, whatever its shape.
	pub computed: bool,
	pub compute: Option<ImStr>,
	pub related: Option<ImStr>,
	/// Source text of `default=`.
	pub default: Option<String>,
	pub help: Option<String>,
	pub label: Option<String>,
	/// Source text of `domain=`; relational kinds only.
	pub domain: Option<String>,
	/// Target model; relational kinds only.
	pub comodel: Option<ImStr>,
	/// `(key, label)` pairs; selections with a literal list only.
	pub selection: Option<Vec<(ImStr, ImStr)>>,
	pub location: MinLoc,
}

impl FieldRecord {
	fn from_call(name: &str, kind: FieldKind, call: &Call, location: MinLoc) -> Self {
		let keyword_str = |key: &str| call.keyword(key).and_then(|kw| kw.value.as_str()).map(String::from);
		let keyword_bool = |key: &str| {
			call.keyword(key)
				.and_then(|kw| kw.value.as_bool())
				.unwrap_or(false)
		};
		let compute = call.keyword("compute");
		let relational = kind.is_relational();

		let comodel = relational
			.then(|| {
				call.keyword("comodel_name")
					.and_then(|kw| kw.value.as_str())
					.or_else(|| call.positional.first().and_then(Expr::as_str))
					.map(ImStr::from)
			})
			.flatten();
		let selection = (kind == FieldKind::Selection)
			.then(|| {
				call.keyword("selection")
					.map(|kw| &kw.value)
					.or_else(|| call.positional.first())
					.and_then(selection_pairs)
			})
			.flatten();
		let label = keyword_str("string").or_else(|| {
			call.positional
				.get(kind.label_position())
				.and_then(Expr::as_str)
				.map(String::from)
		});

		FieldRecord {
			name: name.into(),
			kind,
			required: keyword_bool("required"),
			readonly: keyword_bool("readonly"),
			computed: compute.is_some(),
			compute: compute.and_then(|kw| match &kw.value {
				Expr::Str(method) => Some(ImStr::from(&**method)),
				Expr::Other(ident) if is_identifier(ident) => Some(ImStr::from(*ident)),
				_ => None,
			}),
			related: call.keyword("related").and_then(|kw| kw.value.as_str()).map(ImStr::from),
			default: call.keyword("default").map(|kw| kw.text.to_string()),
			help: keyword_str("help"),
			label,
			domain: relational
				.then(|| call.keyword("domain").map(|kw| kw.text.to_string()))
				.flatten(),
			comodel,
			selection,
			location,
		}
	}
}

fn is_identifier(text: &str) -> bool {
	let mut chars = text.chars();
	matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_') && chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn selection_pairs(value: &Expr) -> Option<Vec<(ImStr, ImStr)>> {
	let Expr::List(items) = value else {
		return None;
	};
	let pairs = items
		.iter()
		.filter_map(|item| match item.elements()? {
			[key, label] => Some((ImStr::from(key.as_str()?), ImStr::from(label.as_str()?))),
			_ => None,
		})
		.collect();
	Some(pairs)
}

/// Field declarations of `class` in source order. A name assigned twice keeps
/// its first position with the last definition.
pub fn extract_fields(class: &ClassDecl) -> Vec<FieldRecord> {
	let mut fields: Vec<FieldRecord> = vec![];
	let mut positions = HashMap::new();
	for attr in class.attributes() {
		let Expr::Call(call) = &attr.value else {
			continue;
		};
		let Callee::Qualified {
			namespace: FIELDS_ALIAS,
			name: kind,
		} = call.callee
		else {
			continue;
		};
		let Some(kind) = FieldKind::from_name(kind) else {
			continue;
		};
		let field = FieldRecord::from_call(attr.name, kind, call, class.file.location(attr.node));
		match positions.get(attr.name) {
			Some(&idx) => fields[idx] = field,
			None => {
				positions.insert(attr.name, fields.len());
				fields.push(field);
			}
		}
	}
	fields
}
