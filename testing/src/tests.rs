use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Once;
use std::time::Duration;

use futures::{stream::FuturesUnordered, StreamExt};
use odoo_model_index::utils::Position;
use pretty_assertions::Comparison;
use rstest::*;
use tree_sitter::{Parser, QueryCursor, StreamingIterator};
use ts_macros::query;

use crate::harness;

static TRACING_INIT: Once = Once::new();

fn init_tracing() {
	TRACING_INIT.call_once(|| {
		tracing_subscriber::fmt()
			.with_env_filter(tracing_subscriber::EnvFilter::builder().parse_lossy("warn,odoo_model_index=debug"))
			.with_test_writer()
			.init();
	});
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test(flavor = "current_thread")]
async fn fixture_test(#[files("fixtures/*")] root: PathBuf) {
	init_tracing();
	let workspace = harness::open_workspace(&root).await;

	// <!> collect expected samples
	let mut expected = gather_expected(&root);
	expected.retain(|_, expected| !expected.is_empty());
	assert!(!expected.is_empty(), "{} has no expectations", root.display());

	// <!> compare and run
	let mut expected: FuturesUnordered<_> = expected
		.into_iter()
		.map(|(path, expected)| {
			let workspace = workspace.clone();
			async move {
				let mut diffs = vec![];

				match workspace.inspect(&path).await {
					Ok(diagnostics) => {
						let actual = diagnostics
							.into_iter()
							.map(|diag| (diag.range.start, diag.message))
							.collect::<Vec<_>>();
						if expected.diag[..] != actual[..] {
							diffs.push(format!(
								"[diag] {}\n{}",
								path.display(),
								Comparison::new(&expected.diag[..], &actual[..]),
							));
						}
					}
					Err(err) => diffs.push(format!("[diag] failed to inspect: {err:#}\n\tat {}", path.display())),
				}

				for (model, expected) in &expected.fields {
					let fields = workspace.fields_of(model).await;
					let actual = fields.iter().map(|field| field.name.to_string()).collect::<Vec<_>>();
					if expected[..] != actual[..] {
						diffs.push(format!(
							"[fields] of {model} in {}\n{}",
							path.display(),
							Comparison::new(&expected[..], &actual[..]),
						));
					}
				}

				for (model, expected) in &expected.methods {
					let methods = workspace.methods_of(model).await;
					let actual = methods.iter().map(|method| method.name.to_string()).collect::<Vec<_>>();
					if expected[..] != actual[..] {
						diffs.push(format!(
							"[methods] of {model} in {}\n{}",
							path.display(),
							Comparison::new(&expected[..], &actual[..]),
						));
					}
				}

				for (model, expected) in &expected.children {
					let children = workspace.models_inheriting(model).await;
					let actual = children
						.iter()
						.map(|child| child.identifier.to_string())
						.collect::<Vec<_>>();
					if expected[..] != actual[..] {
						diffs.push(format!(
							"[children] of {model} in {}\n{}",
							path.display(),
							Comparison::new(&expected[..], &actual[..]),
						));
					}
				}

				diffs
			}
		})
		.collect();

	let mut messages = vec![];
	while let Some(diffs) = expected.next().await {
		messages.extend(diffs);
	}

	workspace.close().await;

	let message = messages.join("\n");
	let message = message.trim_ascii();
	assert!(message.is_empty(), "{message}");
}

query! {
	PyExpected(Diag, Fields, Methods, Children);
	r#"
	((comment) @diag
	(#match? @diag "\\^diag "))

	((comment) @fields
	(#match? @fields "\\^fields "))

	((comment) @methods
	(#match? @methods "\\^methods "))

	((comment) @children
	(#match? @children "\\^children "))"#
}

/// Expectations embedded in fixture comments.
///
/// `^diag` points its caret at the start of a diagnostic on the line above. The
/// member markers name a model followed by the expected names, in order.
#[derive(Default)]
struct Expected {
	diag: Vec<(Position, String)>,
	fields: Vec<(String, Vec<String>)>,
	methods: Vec<(String, Vec<String>)>,
	children: Vec<(String, Vec<String>)>,
}

impl Expected {
	fn is_empty(&self) -> bool {
		self.diag.is_empty() && self.fields.is_empty() && self.methods.is_empty() && self.children.is_empty()
	}
}

fn model_and_names(text: &[u8]) -> (String, Vec<String>) {
	let text = String::from_utf8_lossy(text);
	let mut words = text.split_ascii_whitespace().map(String::from);
	let model = words.next().unwrap_or_default();
	(model, words.collect())
}

fn gather_expected(root: &Path) -> HashMap<PathBuf, Expected> {
	let path = root.join("**/*.py").to_string_lossy().into_owned();
	let mut expected = HashMap::<_, Expected>::new();

	for file in globwalk::glob(&path).unwrap() {
		let Ok(file) = file else { continue };
		let contents = std::fs::read_to_string(file.path()).unwrap().into_bytes();
		let expected = expected.entry(file.into_path()).or_default();
		let mut parser = Parser::new();
		parser.set_language(&tree_sitter_python::LANGUAGE.into()).unwrap();
		let ast = parser.parse(&contents, None).unwrap();
		let mut cursor = QueryCursor::new();
		let mut captures = cursor.captures(PyExpected::query(), ast.root_node(), &contents[..]);

		while let Some((match_, _)) = captures.next() {
			for capture in match_.captures {
				let text = &contents[capture.node.byte_range()][1..];
				let Some(idx) = text.iter().position(|ch| *ch == b'^') else {
					continue;
				};
				let text = text.trim_ascii();
				let range = capture.node.range();
				let position = Position {
					line: range.start_point.row as u32 - 1,
					character: (range.start_point.column + idx + 1) as u32,
				};
				if let Some(diag) = text.strip_prefix(b"^diag ") {
					(expected.diag).push((position, String::from_utf8_lossy(diag).to_string()));
				} else if let Some(fields) = text.strip_prefix(b"^fields ") {
					(expected.fields).push(model_and_names(fields));
				} else if let Some(methods) = text.strip_prefix(b"^methods ") {
					(expected.methods).push(model_and_names(methods));
				} else if let Some(children) = text.strip_prefix(b"^children ") {
					(expected.children).push(model_and_names(children));
				}
			}
		}
	}

	expected
}
