use core::fmt::Display;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tree_sitter::Node;

use crate::ImStr;

mod pool;
pub use pool::WorkerPool;

/// Early return, with optional message passed to [`format_loc`](crate::format_loc!).
#[macro_export]
macro_rules! ok {
	($res:expr $(,)?) => {
		anyhow::Context::context($res, concat!($crate::loc!(), " ", stringify!($res)))?
	};
	($res:expr, $($tt:tt)+) => {
		anyhow::Context::with_context($res, || $crate::format_loc!($($tt)+))?
	};
}

#[macro_export]
macro_rules! loc {
	() => {
		concat!("[", file!(), ":", line!(), ":", column!(), "]")
	};
}

#[macro_export]
macro_rules! errloc {
	($msg:literal $(, $($tt:tt)* )?) => {
		::anyhow::anyhow!(concat!($crate::loc!(), " ", $msg) $(, $($tt)* )?)
	}
}

/// [format] preceded with file location information.
/// If no arguments are passed, a string literal is returned.
#[macro_export]
macro_rules! format_loc {
	($tpl:literal) => {
		concat!($crate::loc!(), " ", $tpl)
	};
	($tpl:literal $($tt:tt)*) => {
		format!($crate::format_loc!($tpl) $($tt)*)
	};
}

/// Zero-based line/column pair, columns counted in bytes as tree-sitter reports them.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Position {
	pub line: u32,
	pub character: u32,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Range {
	pub start: Position,
	pub end: Position,
}

/// A file path plus the range of the declaration inside it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MinLoc {
	pub path: ImStr,
	pub range: Range,
}

impl Display for MinLoc {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_fmt(format_args!(
			"{}:{}:{}",
			self.path,
			self.range.start.line + 1,
			self.range.start.character + 1
		))
	}
}

pub struct SpanAdapter<T>(T);

/// Infallible conversion between tree-sitter spans and crate spans.
/// Available conversions:
/// - [tree_sitter::Point] -> [Position]
/// - [tree_sitter::Range] -> [Range]
#[inline]
pub fn span_conv<T, U>(src: T) -> U
where
	U: From<SpanAdapter<T>>,
{
	SpanAdapter(src).into()
}

impl From<SpanAdapter<tree_sitter::Point>> for Position {
	#[inline]
	fn from(value: SpanAdapter<tree_sitter::Point>) -> Self {
		let SpanAdapter(point) = value;
		Position {
			line: point.row as u32,
			character: point.column as u32,
		}
	}
}

impl From<SpanAdapter<tree_sitter::Range>> for Range {
	#[inline]
	fn from(value: SpanAdapter<tree_sitter::Range>) -> Self {
		let SpanAdapter(range) = value;
		Range {
			start: span_conv(range.start_point),
			end: span_conv(range.end_point),
		}
	}
}

/// Named children of `node`, with comments filtered out.
pub fn python_named_children<'node>(node: Node<'node>) -> impl Iterator<Item = Node<'node>> {
	let mut cursor = node.walk();
	let children = node.named_children(&mut cursor).collect::<Vec<_>>();
	children.into_iter().filter(|child| child.kind() != "comment")
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ByteOffset(pub usize);
pub type ByteRange = core::ops::Range<ByteOffset>;

impl From<usize> for ByteOffset {
	#[inline]
	fn from(value: usize) -> Self {
		ByteOffset(value as _)
	}
}

pub trait RangeExt {
	type Unit;
	fn map_unit<F, V>(self, op: F) -> std::ops::Range<V>
	where
		F: FnMut(Self::Unit) -> V;
}

impl<T> RangeExt for core::ops::Range<T> {
	type Unit = T;

	#[inline]
	fn map_unit<F, V>(self, mut op: F) -> core::ops::Range<V>
	where
		F: FnMut(Self::Unit) -> V,
	{
		op(self.start)..op(self.end)
	}
}

/// The spelling of `path` every file is keyed by: `.` and `..` resolved, and
/// symlinks in the longest existing prefix followed, so a deleted file still
/// normalizes the same way as when it was indexed.
pub fn normalize_path(path: &Path) -> PathBuf {
	let mut lexical = PathBuf::new();
	for component in path.components() {
		match component {
			Component::CurDir => {}
			Component::ParentDir if matches!(lexical.components().next_back(), Some(Component::Normal(_))) => {
				lexical.pop();
			}
			other => lexical.push(other),
		}
	}
	let mut missing = vec![];
	let mut existing = lexical.as_path();
	loop {
		if let Ok(canonical) = dunce::canonicalize(existing) {
			return missing
				.into_iter()
				.rev()
				.fold(canonical, |path: PathBuf, part| path.join(part));
		}
		match (existing.parent(), existing.file_name()) {
			(Some(parent), Some(name)) => {
				missing.push(name);
				existing = parent;
			}
			_ => return lexical.clone(),
		}
	}
}

#[cfg(test)]
pub fn init_for_test() {
	use std::sync::Once;
	use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

	static INIT: Once = Once::new();
	INIT.call_once(|| {
		tracing_subscriber::registry()
			.with(tracing_subscriber::fmt::layer().with_test_writer())
			.with(EnvFilter::from("info,odoo_model_index=trace"))
			.init();
	});
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn test_minloc_display_is_one_based() {
		let loc = MinLoc {
			path: "addons/sale/models/order.py".into(),
			range: Range {
				start: Position { line: 4, character: 0 },
				end: Position { line: 9, character: 12 },
			},
		};
		assert_eq!(loc.to_string(), "addons/sale/models/order.py:5:1");
	}

	#[test]
	fn test_normalize_path() {
		let dir = tempfile::tempdir().unwrap();
		let real = dunce::canonicalize(dir.path()).unwrap().join("real");
		std::fs::create_dir_all(real.join("models")).unwrap();
		std::fs::write(real.join("models/order.py"), "").unwrap();
		assert_eq!(
			normalize_path(&real.join("models/./../models/order.py")),
			real.join("models/order.py")
		);
		assert_eq!(normalize_path(&real.join("models/gone.py")), real.join("models/gone.py"));
		assert_eq!(normalize_path(&real.join("missing/../models/x.py")), real.join("models/x.py"));

		#[cfg(unix)]
		{
			let link = dir.path().join("link");
			std::os::unix::fs::symlink(&real, &link).unwrap();
			assert_eq!(normalize_path(&link.join("models/order.py")), real.join("models/order.py"));
			assert_eq!(normalize_path(&link.join("models/gone.py")), real.join("models/gone.py"));
		}
	}
}
