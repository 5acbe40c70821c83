use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced while loading configuration or indexing a file.
///
/// None of these cross the query API; they are logged per file and the pass
/// continues with the next one.
#[derive(Debug, Error)]
pub enum IndexError {
	#[error("could not read {}: {source}", path.display())]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("could not parse {}", .0.display())]
	Parse(PathBuf),

	#[error("invalid configuration: {0}")]
	Config(#[from] serde_json::Error),

	#[error(transparent)]
	Syntax(#[from] tree_sitter::LanguageError),
}

pub type Result<T, E = IndexError> = core::result::Result<T, E>;
