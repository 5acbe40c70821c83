use std::fmt::{Debug, Display};
use std::ops::Deref;
use std::sync::Arc;

use serde::{Serialize, Serializer};

/// Immutable, [String]-sized clone-friendly string.
///
/// Model names, field names and parent lists are cloned into every record and
/// every resolved view, so short names are stored inline and longer ones share
/// a single allocation.
#[derive(Clone)]
pub struct ImStr(Repr);

const INLINE_BYTES: usize = 22;
#[derive(Clone)]
enum Repr {
	Arc(Arc<str>),
	Inline(u8, [u8; INLINE_BYTES]),
}

impl Default for ImStr {
	#[inline]
	fn default() -> Self {
		Self(Repr::Inline(0, [0u8; INLINE_BYTES]))
	}
}

impl Deref for ImStr {
	type Target = str;
	#[inline]
	fn deref(&self) -> &Self::Target {
		match &self.0 {
			Repr::Arc(inner) => inner,
			Repr::Inline(len, bytes) => {
				let slice = &bytes[..(*len as usize)];
				// SAFETY: inline bytes are only ever copied from a &str.
				unsafe { std::str::from_utf8_unchecked(slice) }
			}
		}
	}
}

impl From<&str> for ImStr {
	fn from(value: &str) -> Self {
		let src = value.as_bytes();
		if src.len() <= INLINE_BYTES {
			let mut bytes = [0u8; INLINE_BYTES];
			bytes[..src.len()].copy_from_slice(src);
			Self(Repr::Inline(src.len() as u8, bytes))
		} else {
			Self(Repr::Arc(Arc::from(value)))
		}
	}
}

impl From<String> for ImStr {
	#[inline]
	fn from(value: String) -> Self {
		value.as_str().into()
	}
}

impl From<&String> for ImStr {
	#[inline]
	fn from(value: &String) -> Self {
		value.as_str().into()
	}
}

impl std::borrow::Borrow<str> for ImStr {
	#[inline]
	fn borrow(&self) -> &str {
		self.deref()
	}
}

impl AsRef<str> for ImStr {
	#[inline]
	fn as_ref(&self) -> &str {
		self.deref()
	}
}

impl Display for ImStr {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		Display::fmt(self.deref(), f)
	}
}

impl Debug for ImStr {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		Debug::fmt(self.deref(), f)
	}
}

impl Serialize for ImStr {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(self)
	}
}

impl<T> PartialEq<T> for ImStr
where
	T: AsRef<str>,
{
	#[inline]
	fn eq(&self, other: &T) -> bool {
		self.deref() == other.as_ref()
	}
}

impl PartialEq<ImStr> for str {
	fn eq(&self, other: &ImStr) -> bool {
		self == other.deref()
	}
}

impl PartialEq<ImStr> for &str {
	fn eq(&self, other: &ImStr) -> bool {
		*self == other.deref()
	}
}

impl Eq for ImStr {}

impl<T> PartialOrd<T> for ImStr
where
	T: AsRef<str>,
{
	#[inline]
	fn partial_cmp(&self, other: &T) -> Option<std::cmp::Ordering> {
		self.deref().partial_cmp(other.as_ref())
	}
}

impl Ord for ImStr {
	#[inline]
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self.deref().cmp(other.deref())
	}
}

impl std::hash::Hash for ImStr {
	#[inline]
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.deref().hash(state)
	}
}

impl ImStr {
	#[inline]
	pub fn as_str(&self) -> &str {
		self.deref()
	}
}

#[cfg(test)]
mod tests {
	use super::{ImStr, Repr};
	use std::collections::HashSet;

	#[test]
	fn test_inline_threshold() {
		let short = ImStr::from("res.partner");
		let long = ImStr::from("mail.activity.mixin.with.a.long.name");
		assert!(matches!(short.0, Repr::Inline(..)));
		assert!(!matches!(long.0, Repr::Inline(..)));
		assert_eq!(short, "res.partner");
		assert_eq!(long.as_str(), "mail.activity.mixin.with.a.long.name");
	}

	#[test]
	fn test_hash_matches_str() {
		let mut set = HashSet::new();
		set.insert(ImStr::from("sale.order"));
		assert!(set.contains("sale.order"));
		assert!(ImStr::default().is_empty());
	}
}
