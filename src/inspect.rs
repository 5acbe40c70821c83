//! Structural checks over model declarations.

use serde::Serialize;

use crate::model::{declared_parents, model_kind};
use crate::syntax::{ClassDecl, Expr, SourceFile};
use crate::utils::{span_conv, Range};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
	Error,
	Warning,
	WeakWarning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
	pub range: Range,
	pub severity: Severity,
	pub message: String,
}

impl Diagnostic {
	fn new(range: Range, severity: Severity, message: impl Into<String>) -> Self {
		Self {
			range,
			severity,
			message: message.into(),
		}
	}
}

fn is_string_list(value: &Expr) -> bool {
	value
		.elements()
		.is_some_and(|items| items.iter().all(|item| item.as_str().is_some()))
}

/// Declaration-shape diagnostics for one class. Classes that do not derive
/// from a framework base produce none.
pub fn inspect_class(class: &ClassDecl) -> Vec<Diagnostic> {
	if model_kind(&class.bases()).is_none() {
		return vec![];
	}
	let mut diagnostics = vec![];
	let name_range = class
		.node()
		.child_by_field_name("name")
		.map(|name| span_conv(name.range()))
		.unwrap_or_else(|| class.range());
	let name = class.attribute("_name");
	let inherit = class.attribute("_inherit");

	match &name {
		None if inherit.is_none() => diagnostics.push(Diagnostic::new(
			name_range,
			Severity::Warning,
			"Model class declares neither `_name` nor `_inherit`",
		)),
		None => {}
		Some(attr) => match attr.value.as_str() {
			Some(value) if !value.is_empty() => {
				if class.attribute("_description").is_none() {
					diagnostics.push(Diagnostic::new(
						name_range,
						Severity::WeakWarning,
						format!("Model `{value}` has no `_description`"),
					));
				}
			}
			_ => diagnostics.push(Diagnostic::new(
				span_conv(attr.node.range()),
				Severity::Warning,
				"`_name` should be a non-empty string literal",
			)),
		},
	}

	if let Some(attr) = &inherit {
		let well_formed = matches!(attr.value, Expr::Str(_)) || is_string_list(&attr.value);
		if !well_formed {
			diagnostics.push(Diagnostic::new(
				span_conv(attr.node.range()),
				Severity::Warning,
				"`_inherit` should be a string or a list of strings",
			));
		}
	}
	diagnostics
}

/// Flags every declared parent for which `is_known` returns false.
pub fn inspect_parents(class: &ClassDecl, mut is_known: impl FnMut(&str) -> bool) -> Vec<Diagnostic> {
	if model_kind(&class.bases()).is_none() {
		return vec![];
	}
	let Some(inherit) = class.attribute("_inherit") else {
		return vec![];
	};
	let own = class.attribute("_name");
	let own = own.as_ref().and_then(|attr| attr.value.as_str());
	declared_parents(&inherit.value)
		.into_iter()
		.filter(|parent| Some(parent.as_str()) != own && !is_known(parent))
		.map(|parent| {
			Diagnostic::new(
				span_conv(inherit.node.range()),
				Severity::Error,
				format!("Unknown parent model `{parent}`"),
			)
		})
		.collect()
}

/// Structural diagnostics for every class in `file`, in source order.
pub fn inspect_file(file: &SourceFile) -> Vec<Diagnostic> {
	file.classes().iter().flat_map(inspect_class).collect()
}
