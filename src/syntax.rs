//! Typed view over tree-sitter-python trees.
//!
//! This is the only module that walks raw [`Node`]s. Everything downstream sees
//! [`ClassDecl`], [`FunctionDecl`], [`BaseShape`] and [`Expr`].

use std::borrow::Cow;
use std::path::Path;

use tree_sitter::{Node, Parser, QueryCursor, StreamingIterator, Tree};
use ts_macros::query;

use crate::error::{IndexError, Result};
use crate::utils::{python_named_children, span_conv, ByteOffset, ByteRange, MinLoc, Range, RangeExt};
use crate::ImStr;

#[cfg(test)]
mod tests;

#[rustfmt::skip]
query! {
	ClassQuery(Class);
r#"
(module [
  (class_definition) @CLASS
  (decorated_definition
    definition: (class_definition) @CLASS) ])"#
}

#[rustfmt::skip]
query! {
	ManifestQuery(Key, Value);
r#"
(module
  (expression_statement
    (dictionary
      (pair
        key: (string) @KEY
        value: (_) @VALUE))))"#
}

/// One parsed Python file. Cheap to share behind an [`Arc`](std::sync::Arc);
/// records keep one alive for lazy member extraction.
pub struct SourceFile {
	pub path: ImStr,
	contents: String,
	tree: Tree,
}

impl std::fmt::Debug for SourceFile {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SourceFile").field("path", &self.path).finish_non_exhaustive()
	}
}

impl SourceFile {
	pub fn parse(path: impl Into<ImStr>, contents: impl Into<String>) -> Result<Self> {
		let path = path.into();
		let contents = contents.into();
		let mut parser = Parser::new();
		parser.set_language(&tree_sitter_python::LANGUAGE.into())?;
		let tree = parser
			.parse(&contents, None)
			.ok_or_else(|| IndexError::Parse(path.as_str().into()))?;
		Ok(Self { path, contents, tree })
	}

	pub async fn read(path: &Path) -> Result<Self> {
		let bytes = tokio::fs::read(path).await.map_err(|source| IndexError::Read {
			path: path.to_path_buf(),
			source,
		})?;
		let contents = match String::from_utf8(bytes) {
			Ok(contents) => contents,
			Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
		};
		Self::parse(path.to_string_lossy().as_ref(), contents)
	}

	#[inline]
	pub fn text(&self, node: Node) -> &str {
		&self.contents[node.byte_range()]
	}

	pub fn location(&self, node: Node) -> MinLoc {
		MinLoc {
			path: self.path.clone(),
			range: span_conv(node.range()),
		}
	}

	/// Top-level class declarations in source order, decorated or not.
	pub fn classes(&self) -> Vec<ClassDecl<'_>> {
		let mut cursor = QueryCursor::new();
		let mut classes = vec![];
		let mut matches = cursor.matches(ClassQuery::query(), self.tree.root_node(), self.contents.as_bytes());
		while let Some(match_) = matches.next() {
			for node in match_.nodes_for_capture_index(ClassQuery::Class as _) {
				classes.push(ClassDecl { file: self, node });
			}
		}
		classes
	}

	/// Entries of the dictionary literal a manifest file consists of, in source order.
	/// Keys that are not plain string literals are skipped.
	pub fn manifest_entries(&self) -> Vec<(Cow<'_, str>, Expr<'_>)> {
		let mut cursor = QueryCursor::new();
		let mut entries = vec![];
		let mut matches = cursor.matches(ManifestQuery::query(), self.tree.root_node(), self.contents.as_bytes());
		while let Some(match_) = matches.next() {
			let key = match_.nodes_for_capture_index(ManifestQuery::Key as _).next();
			let value = match_.nodes_for_capture_index(ManifestQuery::Value as _).next();
			let (Some(key), Some(value)) = (key, value) else {
				continue;
			};
			if let Some(key) = string_value(self, key) {
				entries.push((key, Expr::from_node(self, value)));
			}
		}
		entries
	}

	/// Finds the class declared exactly at `range`.
	pub fn class_at(&self, range: &ByteRange) -> Option<ClassDecl<'_>> {
		self.classes()
			.into_iter()
			.find(|class| class.byte_range() == *range)
	}
}

/// How a class names one of its bases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseShape<'a> {
	/// `class Foo(Model)`
	Name(&'a str),
	/// `class Foo(models.Model)`
	Qualified { namespace: &'a str, name: &'a str },
	/// `class Foo(models.Model.with_meta(...))` or any call whose callee is `namespace.name`
	QualifiedCall { namespace: &'a str, name: &'a str },
	Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callee<'a> {
	Name(&'a str),
	Qualified { namespace: &'a str, name: &'a str },
	Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Keyword<'a> {
	pub name: &'a str,
	pub value: Expr<'a>,
	/// Source text of the value.
	pub text: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call<'a> {
	pub callee: Callee<'a>,
	pub positional: Vec<Expr<'a>>,
	pub keywords: Vec<Keyword<'a>>,
}

impl<'a> Call<'a> {
	pub fn keyword(&self, name: &str) -> Option<&Keyword<'a>> {
		self.keywords.iter().find(|kw| kw.name == name)
	}
}

/// The closed set of expression shapes the extractors care about.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<'a> {
	/// A string literal, quotes removed. Adjacent literals are joined.
	Str(Cow<'a, str>),
	List(Vec<Expr<'a>>),
	Tuple(Vec<Expr<'a>>),
	Bool(bool),
	Call(Call<'a>),
	/// Anything else, as source text.
	Other(&'a str),
}

impl<'a> Expr<'a> {
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Expr::Str(value) => Some(value),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Expr::Bool(value) => Some(*value),
			_ => None,
		}
	}

	/// Elements of a list or tuple.
	pub fn elements(&self) -> Option<&[Expr<'a>]> {
		match self {
			Expr::List(items) | Expr::Tuple(items) => Some(items),
			_ => None,
		}
	}

	fn from_node(file: &'a SourceFile, node: Node<'a>) -> Self {
		match node.kind() {
			"string" => string_value(file, node).map(Expr::Str).unwrap_or(Expr::Other(file.text(node))),
			"concatenated_string" => {
				let mut joined = String::new();
				for part in python_named_children(node) {
					match string_value(file, part) {
						Some(value) => joined.push_str(&value),
						None => return Expr::Other(file.text(node)),
					}
				}
				Expr::Str(Cow::Owned(joined))
			}
			"parenthesized_expression" => match python_named_children(node).next() {
				Some(inner) => Expr::from_node(file, inner),
				None => Expr::Other(file.text(node)),
			},
			"list" => Expr::List(python_named_children(node).map(|child| Expr::from_node(file, child)).collect()),
			"tuple" => Expr::Tuple(python_named_children(node).map(|child| Expr::from_node(file, child)).collect()),
			"true" => Expr::Bool(true),
			"false" => Expr::Bool(false),
			"call" => Expr::Call(Call::from_node(file, node)),
			_ => Expr::Other(file.text(node)),
		}
	}
}

/// Literal content of a `string` node, or `None` for f-strings.
fn string_value<'a>(file: &'a SourceFile, node: Node<'a>) -> Option<Cow<'a, str>> {
	if node.kind() != "string" {
		return None;
	}
	let mut parts = vec![];
	let mut cursor = node.walk();
	for child in node.children(&mut cursor) {
		match child.kind() {
			"string_start" => {
				if file.text(child).contains(|ch| ch == 'f' || ch == 'F') {
					return None;
				}
			}
			"string_content" => parts.push(file.text(child)),
			"interpolation" => return None,
			_ => {}
		}
	}
	match parts.as_slice() {
		[] => Some(Cow::Borrowed("")),
		[single] => Some(Cow::Borrowed(*single)),
		_ => Some(Cow::Owned(parts.concat())),
	}
}

impl<'a> Call<'a> {
	fn from_node(file: &'a SourceFile, node: Node<'a>) -> Self {
		let callee = match node.child_by_field_name("function") {
			Some(function) => match dotted(file, function) {
				Some((None, name)) => Callee::Name(name),
				Some((Some(namespace), name)) => Callee::Qualified { namespace, name },
				None => Callee::Other,
			},
			None => Callee::Other,
		};
		let mut positional = vec![];
		let mut keywords = vec![];
		if let Some(arguments) = node.child_by_field_name("arguments") {
			if arguments.kind() == "argument_list" {
				for arg in python_named_children(arguments) {
					match arg.kind() {
						"keyword_argument" => {
							let (Some(name), Some(value)) =
								(arg.child_by_field_name("name"), arg.child_by_field_name("value"))
							else {
								continue;
							};
							keywords.push(Keyword {
								name: file.text(name),
								value: Expr::from_node(file, value),
								text: file.text(value),
							});
						}
						"list_splat" | "dictionary_splat" => {}
						_ => positional.push(Expr::from_node(file, arg)),
					}
				}
			}
		}
		Call {
			callee,
			positional,
			keywords,
		}
	}
}

/// `name` or `namespace.name`, where both sides are plain identifiers.
fn dotted<'a>(file: &'a SourceFile, node: Node<'a>) -> Option<(Option<&'a str>, &'a str)> {
	match node.kind() {
		"identifier" => Some((None, file.text(node))),
		"attribute" => {
			let object = node.child_by_field_name("object")?;
			let attribute = node.child_by_field_name("attribute")?;
			if object.kind() != "identifier" {
				return None;
			}
			Some((Some(file.text(object)), file.text(attribute)))
		}
		_ => None,
	}
}

/// A class-level `name = value` assignment.
#[derive(Debug, Clone)]
pub struct Attribute<'a> {
	pub name: &'a str,
	pub value: Expr<'a>,
	pub node: Node<'a>,
}

#[derive(Clone, Copy)]
pub struct ClassDecl<'a> {
	pub file: &'a SourceFile,
	node: Node<'a>,
}

impl std::fmt::Debug for ClassDecl<'_> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ClassDecl")
			.field("name", &self.name())
			.field("file", &self.file.path)
			.finish()
	}
}

impl<'a> ClassDecl<'a> {
	pub fn name(&self) -> &'a str {
		self.node
			.child_by_field_name("name")
			.map(|name| self.file.text(name))
			.unwrap_or_default()
	}

	#[inline]
	pub fn node(&self) -> Node<'a> {
		self.node
	}

	pub fn byte_range(&self) -> ByteRange {
		self.node.byte_range().map_unit(ByteOffset)
	}

	pub fn range(&self) -> Range {
		span_conv(self.node.range())
	}

	pub fn location(&self) -> MinLoc {
		self.file.location(self.node)
	}

	pub fn bases(&self) -> Vec<BaseShape<'a>> {
		let Some(superclasses) = self.node.child_by_field_name("superclasses") else {
			return vec![];
		};
		python_named_children(superclasses)
			.filter(|base| base.kind() != "keyword_argument")
			.map(|base| match base.kind() {
				"identifier" => BaseShape::Name(self.file.text(base)),
				"attribute" => match dotted(self.file, base) {
					Some((Some(namespace), name)) => BaseShape::Qualified { namespace, name },
					_ => BaseShape::Other,
				},
				"call" => {
					let function = base.child_by_field_name("function");
					match function.and_then(|function| qualified_head(self.file, function)) {
						Some((namespace, name)) => BaseShape::QualifiedCall { namespace, name },
						None => BaseShape::Other,
					}
				}
				_ => BaseShape::Other,
			})
			.collect()
	}

	fn body(&self) -> Option<Node<'a>> {
		self.node.child_by_field_name("body")
	}

	/// Class-level assignments in source order. Annotated declarations without a value are skipped.
	pub fn attributes(&self) -> Vec<Attribute<'a>> {
		let Some(body) = self.body() else {
			return vec![];
		};
		let mut attributes = vec![];
		for stmt in python_named_children(body) {
			if stmt.kind() != "expression_statement" {
				continue;
			}
			let Some(assignment) = stmt.named_child(0) else {
				continue;
			};
			if assignment.kind() != "assignment" {
				continue;
			}
			let (Some(left), Some(right)) = (
				assignment.child_by_field_name("left"),
				assignment.child_by_field_name("right"),
			) else {
				continue;
			};
			if left.kind() != "identifier" {
				continue;
			}
			attributes.push(Attribute {
				name: self.file.text(left),
				value: Expr::from_node(self.file, right),
				node: assignment,
			});
		}
		attributes
	}

	/// The last assignment to `name`, which is the one Python keeps.
	pub fn attribute(&self, name: &str) -> Option<Attribute<'a>> {
		self.attributes().into_iter().rev().find(|attr| attr.name == name)
	}

	pub fn docstring(&self) -> Option<Cow<'a, str>> {
		docstring(self.file, self.body()?)
	}

	pub fn methods(&self) -> Vec<FunctionDecl<'a>> {
		let Some(body) = self.body() else {
			return vec![];
		};
		let mut methods = vec![];
		for stmt in python_named_children(body) {
			match stmt.kind() {
				"function_definition" => methods.push(FunctionDecl::new(self.file, stmt, vec![])),
				"decorated_definition" => {
					let Some(definition) = stmt.child_by_field_name("definition") else {
						continue;
					};
					if definition.kind() != "function_definition" {
						continue;
					}
					let decorators = python_named_children(stmt)
						.filter(|child| child.kind() == "decorator")
						.filter_map(|decorator| decorator.named_child(0))
						.map(|expr| self.file.text(expr))
						.collect();
					methods.push(FunctionDecl::new(self.file, definition, decorators));
				}
				_ => {}
			}
		}
		methods
	}
}

/// `namespace.name` at the head of a call chain, e.g. `models.Model` in `models.Model.with_meta(x)`.
fn qualified_head<'a>(file: &'a SourceFile, node: Node<'a>) -> Option<(&'a str, &'a str)> {
	match dotted(file, node) {
		Some((Some(namespace), name)) => Some((namespace, name)),
		Some((None, _)) => None,
		None if node.kind() == "attribute" => qualified_head(file, node.child_by_field_name("object")?),
		None => None,
	}
}

fn docstring<'a>(file: &'a SourceFile, body: Node<'a>) -> Option<Cow<'a, str>> {
	let first = python_named_children(body).next()?;
	if first.kind() != "expression_statement" {
		return None;
	}
	let string = first.named_child(0)?;
	match Expr::from_node(file, string) {
		Expr::Str(Cow::Borrowed(value)) => Some(Cow::Borrowed(value.trim())),
		Expr::Str(Cow::Owned(value)) => Some(Cow::Owned(value.trim().to_string())),
		_ => None,
	}
}

#[derive(Debug, Clone)]
pub struct FunctionDecl<'a> {
	pub name: &'a str,
	/// Every declared parameter, receiver included, as written minus annotations and defaults.
	pub parameters: Vec<&'a str>,
	/// Decorator expressions without the leading `@`.
	pub decorators: Vec<&'a str>,
	pub docstring: Option<Cow<'a, str>>,
	pub node: Node<'a>,
}

impl<'a> FunctionDecl<'a> {
	fn new(file: &'a SourceFile, node: Node<'a>, decorators: Vec<&'a str>) -> Self {
		let name = node
			.child_by_field_name("name")
			.map(|name| file.text(name))
			.unwrap_or_default();
		let parameters = node
			.child_by_field_name("parameters")
			.map(|params| {
				python_named_children(params)
					.filter_map(|param| parameter_name(file, param))
					.collect()
			})
			.unwrap_or_default();
		let docstring = node.child_by_field_name("body").and_then(|body| docstring(file, body));
		Self {
			name,
			parameters,
			decorators,
			docstring,
			node,
		}
	}
}

fn parameter_name<'a>(file: &'a SourceFile, param: Node<'a>) -> Option<&'a str> {
	match param.kind() {
		"identifier" | "list_splat_pattern" | "dictionary_splat_pattern" => Some(file.text(param)),
		"typed_parameter" => {
			let inner = param.named_child(0)?;
			Some(file.text(inner))
		}
		"default_parameter" | "typed_default_parameter" => Some(file.text(param.child_by_field_name("name")?)),
		_ => None,
	}
}
