// Copyright 2023 RisingWave Labs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Compiling path queries into a shared traversal tree.
//!
//! A path is a dot-separated list of segments. Each segment is a field name,
//! optionally followed by an array specifier in brackets:
//!
//! - `items[*]` visits every element of `items`.
//! - `items[2]` visits only the third element.
//! - `items[?kind=book]` visits the elements whose `kind` field is `book`.

use std::fmt::{Display, Formatter};

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till},
    character::complete::{char, u64},
    combinator::{all_consuming, map, opt, rest, value},
    sequence::{pair, preceded, separated_pair},
    IResult,
};

/// The array position addressed by a path node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Index {
    /// The 0-based position of a single element.
    At(usize),
    /// Every element.
    Wildcard,
}

impl Default for Index {
    fn default() -> Self {
        Self::At(0)
    }
}

/// A `[?key=value]` element filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub key: String,
    pub value: String,
}

/// One node of a compiled [`PathTree`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathNode {
    /// The segment as written in the query, including any bracket suffix.
    pub(crate) segment: String,
    /// The field name matched against object keys.
    pub(crate) key: Vec<u8>,
    /// Names of the queries ending at this node.
    pub(crate) names: Vec<String>,
    pub(crate) children: Vec<PathNode>,
    pub(crate) index: Index,
    pub(crate) filter: Option<Filter>,
    pub(crate) is_array: bool,
}

impl PathNode {
    fn new(segment: &str) -> Self {
        let mut node = PathNode {
            segment: segment.to_string(),
            ..Default::default()
        };
        let (field, selector) = match parse_segment(segment) {
            Ok((_, parsed)) => parsed,
            Err(_) => (segment, None),
        };
        node.key = field.as_bytes().to_vec();
        if let Some(selector) = selector {
            node.is_array = true;
            match parse_selector(selector) {
                Selector::Wildcard => node.index = Index::Wildcard,
                Selector::Index(i) => node.index = Index::At(i),
                Selector::Filter(key, value) => {
                    node.index = Index::Wildcard;
                    node.filter = Some(Filter {
                        key: key.to_string(),
                        value: value.to_string(),
                    });
                }
            }
        }
        node
    }

    /// Returns the field name this node matches.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Returns the names of the queries that end at this node.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Returns the child nodes in creation order.
    pub fn children(&self) -> &[PathNode] {
        &self.children
    }

    pub fn index(&self) -> Index {
        self.index
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Returns true if the segment addressed array elements.
    pub fn is_array(&self) -> bool {
        self.is_array
    }

    /// Returns true if at least one query ends at this node.
    pub fn is_terminal(&self) -> bool {
        !self.names.is_empty()
    }

    /// Returns true if this node collects from more than one array element.
    pub(crate) fn is_open_ended(&self) -> bool {
        self.is_array && (self.index == Index::Wildcard || self.filter.is_some())
    }

    /// Returns the position of the first child whose key equals `key`.
    ///
    /// Siblings that share a key but differ in their bracket suffix are
    /// shadowed by the first one created.
    pub(crate) fn find_child(&self, key: &[u8]) -> Option<usize> {
        self.children.iter().position(|child| child.key == key)
    }

    fn child_mut(&mut self, segment: &str) -> &mut PathNode {
        let pos = match self.children.iter().position(|c| c.segment == segment) {
            Some(pos) => pos,
            None => {
                self.children.push(PathNode::new(segment));
                self.children.len() - 1
            }
        };
        &mut self.children[pos]
    }

    fn count(&self) -> usize {
        1 + self.children.iter().map(PathNode::count).sum::<usize>()
    }

    fn fmt_indented(&self, f: &mut Formatter<'_>, depth: usize) -> std::fmt::Result {
        write!(f, "{:width$}{}", "", self, width = depth * 2)?;
        if self.is_terminal() {
            write!(f, " -> {}", self.names.join(", "))?;
        }
        writeln!(f)?;
        for child in &self.children {
            child.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

/// A set of path queries compiled into one tree.
///
/// Queries sharing a prefix share the nodes of that prefix, so the document
/// is walked once no matter how many queries are declared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathTree {
    root: PathNode,
    queries: usize,
}

impl PathTree {
    /// Compiles a mapping from query name to path.
    ///
    /// # Example
    ///
    /// ```rust
    /// use json_extract::PathTree;
    ///
    /// let tree = PathTree::compile([("x", "a.b"), ("y", "a.c")]);
    /// assert_eq!(tree.queries(), 2);
    /// assert_eq!(tree.node_count(), 3);
    /// ```
    pub fn compile<I, K, V>(queries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut tree = PathTree::default();
        for (name, path) in queries {
            let mut current = &mut tree.root;
            for segment in path.as_ref().split('.') {
                current = current.child_mut(segment);
            }
            let name = name.as_ref();
            if !current.names.iter().any(|n| n == name) {
                current.names.push(name.to_string());
            }
            tree.queries += 1;
        }
        tracing::debug!(
            queries = tree.queries,
            nodes = tree.node_count(),
            "compiled path tree"
        );
        tree
    }

    /// Returns the root node. It matches the document itself and has no key.
    pub fn root(&self) -> &PathNode {
        &self.root
    }

    /// Returns the number of queries compiled into the tree.
    pub fn queries(&self) -> usize {
        self.queries
    }

    /// Returns the number of nodes below the root.
    pub fn node_count(&self) -> usize {
        self.root.count() - 1
    }
}

impl Display for PathNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.key))?;
        if self.is_array {
            match (&self.filter, self.index) {
                (Some(filter), _) => write!(f, "[?{}={}]", filter.key, filter.value)?,
                (None, Index::Wildcard) => write!(f, "[*]")?,
                (None, Index::At(i)) => write!(f, "[{i}]")?,
            }
        }
        Ok(())
    }
}

impl Display for PathTree {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "$")?;
        for child in &self.root.children {
            child.fmt_indented(f, 1)?;
        }
        Ok(())
    }
}

/// A parsed bracket selector.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Selector<'a> {
    Wildcard,
    Index(usize),
    Filter(&'a str, &'a str),
}

/// Splits a segment into its field name and the text inside the brackets.
fn parse_segment(input: &str) -> IResult<&str, (&str, Option<&str>)> {
    pair(
        take_till(|c: char| c == '['),
        opt(preceded(char('['), take_till(|c: char| c == ']'))),
    )(input)
}

/// Parses the text inside the brackets.
///
/// Anything that is not a wildcard, a filter or a non-negative integer
/// falls back to a wildcard.
fn parse_selector(input: &str) -> Selector<'_> {
    all_consuming(selector)(input)
        .map(|(_, selector)| selector)
        .unwrap_or(Selector::Wildcard)
}

fn selector(input: &str) -> IResult<&str, Selector<'_>> {
    alt((
        value(Selector::Wildcard, tag("*")),
        map(
            preceded(
                char('?'),
                separated_pair(take_till(|c: char| c == '='), char('='), rest),
            ),
            |(key, value)| Selector::Filter(key, value),
        ),
        map(u64, |i| {
            usize::try_from(i).map_or(Selector::Wildcard, Selector::Index)
        }),
    ))(input)
}
