//! Extract named scalar values from large JSON documents in a single pass.
//!
//! Queries are compiled into a [`PathTree`] once. An [`Extractor`] then scans a
//! document, descending only into branches that may hold a requested value,
//! and stops as soon as every query is satisfied. Values are returned as raw
//! text borrowed from the input.
//!
//! # Usage
//!
//! ```rust
//! use json_extract::PathTree;
//!
//! let tree = PathTree::compile([
//!     ("id", "user.id"),
//!     ("tags", "user.tags[*]"),
//!     ("first", "items[0].name"),
//! ]);
//! let json = r#"{"user": {"id": 7, "tags": ["a", "b"]}, "items": [{"name": "x"}]}"#;
//!
//! let results = json_extract::extract(json, &tree).unwrap();
//! assert_eq!(results.get("id"), ["7"]);
//! assert_eq!(results.get("tags"), ["a", "b"]);
//! assert_eq!(results.get("first"), ["x"]);
//! ```

mod extract;
mod path;
mod scanner;

pub use extract::{Error, Extractor, Options, Result, Results};
pub use path::{Filter, Index, PathNode, PathTree};
pub use scanner::{Scanner, Token, TokenKind};

/// Extracts the values addressed by `tree` from `json` with default options.
pub fn extract<'a, J>(json: &'a J, tree: &PathTree) -> Result<Results<'a>>
where
    J: AsRef<[u8]> + ?Sized,
{
    Extractor::new(json, tree).extract()
}
