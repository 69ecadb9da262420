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

use std::collections::HashMap;

use crate::{
    path::{Filter, Index, PathNode, PathTree},
    scanner::{Scanner, Token, TokenKind},
};

pub type Result<T> = std::result::Result<T, Error>;

/// The error type returned when extracting values from a JSON document.
#[non_exhaustive]
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("unexpected token {found} at start of document")]
    UnexpectedStart { found: TokenKind },
    #[error("expected {expected} token, got {found} at position {position}")]
    UnexpectedToken {
        expected: TokenKind,
        found: TokenKind,
        position: usize,
    },
    #[error("document nesting exceeds the limit of {limit}")]
    DepthLimitExceeded { limit: usize },
}

/// Options controlling an extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Maximum nesting depth followed along the path tree. `None` is unbounded.
    pub max_depth: Option<usize>,
    /// Whether `[?key=value]` filters are checked against array elements.
    /// When disabled, filtered segments behave like `[*]`.
    pub evaluate_filters: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_depth: Some(1024),
            evaluate_filters: true,
        }
    }
}

impl Options {
    pub fn with_max_depth(self, max_depth: Option<usize>) -> Self {
        Self { max_depth, ..self }
    }

    pub fn with_evaluate_filters(self, evaluate_filters: bool) -> Self {
        Self {
            evaluate_filters,
            ..self
        }
    }
}

/// Values extracted from a document, keyed by query name.
///
/// Values borrow from the input buffer and keep the order in which they
/// appear in the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Results<'a> {
    values: HashMap<String, Vec<&'a str>>,
}

impl<'a> Results<'a> {
    /// Returns the values matched by the query `name`.
    ///
    /// Unknown names and queries without matches yield an empty slice.
    pub fn get(&self, name: &str) -> &[&'a str] {
        self.values
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Iterates over the queries that matched at least one value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[&'a str])> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Returns the number of queries with at least one value.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_map(self) -> HashMap<String, Vec<&'a str>> {
        self.values
    }

    fn push(&mut self, names: &[String], value: &'a str) {
        for name in names {
            match self.values.get_mut(name.as_str()) {
                Some(values) => values.push(value),
                None => {
                    self.values.insert(name.clone(), vec![value]);
                }
            }
        }
    }
}

/// Completion marks mirroring the shape of a [`PathTree`].
///
/// Nodes live in a flat vector so the whole tree can be inspected while a
/// branch of it is being walked. Index 0 is the root.
#[derive(Debug)]
struct Satisfaction {
    marks: Vec<Mark>,
}

#[derive(Debug)]
struct Mark {
    complete: bool,
    /// Wildcard and filtered arrays only count as done once their array closes.
    open_ended: bool,
    /// Aligned with the children of the path node.
    children: Vec<usize>,
}

impl Satisfaction {
    const ROOT: usize = 0;

    fn new(root: &PathNode) -> Self {
        let mut this = Satisfaction { marks: vec![] };
        this.build(root);
        this
    }

    fn build(&mut self, node: &PathNode) -> usize {
        let id = self.marks.len();
        self.marks.push(Mark {
            complete: false,
            open_ended: node.is_open_ended(),
            children: Vec::with_capacity(node.children().len()),
        });
        for child in node.children() {
            let child = self.build(child);
            self.marks[id].children.push(child);
        }
        id
    }

    fn child(&self, id: usize, pos: usize) -> usize {
        self.marks[id].children[pos]
    }

    fn mark(&mut self, id: usize) {
        self.marks[id].complete = true;
    }

    /// Returns true if the branch rooted at `id` needs no more values.
    fn is_satisfied(&self, id: usize) -> bool {
        let mark = &self.marks[id];
        mark.complete
            || (!mark.open_ended
                && !mark.children.is_empty()
                && mark.children.iter().all(|&c| self.is_satisfied(c)))
    }

    /// Returns true if every query is satisfied.
    fn all_satisfied(&self) -> bool {
        self.marks[Self::ROOT]
            .children
            .iter()
            .all(|&c| self.is_satisfied(c))
    }
}

/// Walks a JSON document once, collecting the values addressed by a [`PathTree`].
///
/// An extractor is bound to a single document. It stops reading as soon as
/// every query has been satisfied.
#[derive(Debug)]
pub struct Extractor<'a, 't> {
    scanner: Scanner<'a>,
    tree: &'t PathTree,
    progress: Satisfaction,
    results: Results<'a>,
    options: Options,
    complete: bool,
}

impl<'a, 't> Extractor<'a, 't> {
    /// Creates an extractor over `json` with default options.
    pub fn new<J>(json: &'a J, tree: &'t PathTree) -> Self
    where
        J: AsRef<[u8]> + ?Sized,
    {
        Self::with_options(json, tree, Options::default())
    }

    pub fn with_options<J>(json: &'a J, tree: &'t PathTree, options: Options) -> Self
    where
        J: AsRef<[u8]> + ?Sized,
    {
        Extractor {
            scanner: Scanner::new(json.as_ref()),
            tree,
            progress: Satisfaction::new(tree.root()),
            results: Results::default(),
            options,
            complete: false,
        }
    }

    /// Runs the extraction and returns the collected values.
    pub fn extract(mut self) -> Result<Results<'a>> {
        self.run()?;
        Ok(self.results)
    }

    /// Runs the extraction, keeping the extractor around for inspection.
    ///
    /// On error, the values recorded before the failure remain available
    /// through [`results`](Self::results).
    pub fn run(&mut self) -> Result<()> {
        let tree = self.tree;
        let root = tree.root();
        let token = self.scanner.token();
        let result = match token.kind {
            TokenKind::StartObject => self.extract_object(root, Satisfaction::ROOT, 1),
            TokenKind::StartArray => self.extract_array(root, Satisfaction::ROOT, 1),
            found => Err(Error::UnexpectedStart { found }),
        };
        if let Err(err) = &result {
            tracing::debug!(%err, position = self.scanner.position(), "extraction failed");
        }
        result
    }

    /// Returns the values recorded so far.
    pub fn results(&self) -> &Results<'a> {
        &self.results
    }

    pub fn into_results(self) -> Results<'a> {
        self.results
    }

    /// Returns the byte offset the scan has reached.
    pub fn position(&self) -> usize {
        self.scanner.position()
    }

    /// Returns true if every query was satisfied before the end of the document.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    fn check_depth(&self, depth: usize) -> Result<()> {
        match self.options.max_depth {
            Some(limit) if depth > limit => Err(Error::DepthLimitExceeded { limit }),
            _ => Ok(()),
        }
    }

    fn extract_object(&mut self, node: &'t PathNode, sat: usize, depth: usize) -> Result<()> {
        self.check_depth(depth)?;
        while self.scanner.more() {
            let key = self.scanner.expect_string()?;
            let Some(pos) = node.find_child(key.raw) else {
                self.scanner.skip_value();
                continue;
            };
            let child = &node.children()[pos];
            let child_sat = self.progress.child(sat, pos);
            if self.rejects_field(child) {
                self.scanner.skip_value();
                continue;
            }

            let token = self.scanner.token();
            match token.kind {
                TokenKind::StartObject => self.extract_object(child, child_sat, depth + 1)?,
                TokenKind::StartArray => self.extract_array(child, child_sat, depth + 1)?,
                kind if kind.is_scalar() && child.is_terminal() => {
                    // an array segment is not settled by a plain field value
                    self.record(child, child_sat, token, !child.is_array())
                }
                // a scalar where a deeper path was expected
                _ => {}
            }

            if self.complete {
                return Ok(());
            }
        }
        self.scanner.expect_end_object()
    }

    fn extract_array(&mut self, node: &'t PathNode, sat: usize, depth: usize) -> Result<()> {
        self.extract_elements(node, sat, depth)?;
        if self.complete {
            return Ok(());
        }
        self.progress.mark(sat);
        self.check_complete();
        self.scanner.expect_end_array()
    }

    /// Visits the elements of an array, leaving the closing bracket unread.
    ///
    /// Nested arrays are elements of the same node and don't settle it.
    fn extract_elements(&mut self, node: &'t PathNode, sat: usize, depth: usize) -> Result<()> {
        self.check_depth(depth)?;
        let mut idx = 0;
        while self.scanner.more() {
            if !self.selects(node, idx) {
                self.scanner.skip_value();
                idx += 1;
                continue;
            }

            let token = self.scanner.token();
            match token.kind {
                TokenKind::StartObject => self.extract_object(node, sat, depth + 1)?,
                TokenKind::StartArray => {
                    self.extract_elements(node, sat, depth + 1)?;
                    if !self.complete {
                        self.scanner.expect_end_array()?;
                    }
                }
                kind if kind.is_scalar() && node.is_terminal() => {
                    self.record(node, sat, token, !node.is_open_ended())
                }
                _ => {}
            }

            if self.complete {
                return Ok(());
            }
            idx += 1;
        }
        Ok(())
    }

    /// Returns true if the element at `idx`, which starts at the cursor, is
    /// addressed by `node`.
    fn selects(&self, node: &PathNode, idx: usize) -> bool {
        match node.filter() {
            Some(filter) if self.options.evaluate_filters => self.matches_filter(filter),
            Some(_) => true,
            None => match node.index() {
                Index::At(i) => i == idx,
                Index::Wildcard => true,
            },
        }
    }

    /// Returns true if the field value at the cursor fails the filter of
    /// `child`. Arrays are left to [`selects`](Self::selects), which checks
    /// each element instead.
    fn rejects_field(&self, child: &PathNode) -> bool {
        let Some(filter) = child.filter() else {
            return false;
        };
        self.options.evaluate_filters
            && self.scanner.clone().token().kind != TokenKind::StartArray
            && !self.matches_filter(filter)
    }

    /// Looks ahead through the object at the cursor for a top-level field
    /// equal to the filter. Non-objects never match.
    fn matches_filter(&self, filter: &Filter) -> bool {
        let mut lookahead = self.scanner.clone();
        if lookahead.token().kind != TokenKind::StartObject {
            return false;
        }
        while lookahead.more() {
            let Ok(key) = lookahead.expect_string() else {
                return false;
            };
            if key.raw == filter.key.as_bytes() {
                let value = lookahead.token();
                return value.kind.is_scalar() && value.raw == filter.value.as_bytes();
            }
            lookahead.skip_value();
        }
        false
    }

    /// Records a matched scalar. Values that are not valid UTF-8 are dropped
    /// and leave the node unsettled.
    fn record(&mut self, node: &PathNode, sat: usize, token: Token<'a>, settles: bool) {
        let Ok(value) = std::str::from_utf8(token.raw) else {
            tracing::debug!(
                names = ?node.names(),
                position = token.position,
                "dropping value that is not valid UTF-8"
            );
            return;
        };
        tracing::trace!(names = ?node.names(), value, "matched value");
        self.results.push(node.names(), value);
        if settles {
            self.progress.mark(sat);
        }
        self.check_complete();
    }

    fn check_complete(&mut self) {
        if self.progress.all_satisfied() {
            self.complete = true;
            tracing::debug!(
                position = self.scanner.position(),
                unread = self.scanner.remaining(),
                "all queries satisfied"
            );
        }
    }
}
