//! Process-wide class hierarchy, built incrementally as packages load.
//!
//! The index is an explicit context object: created empty, handed to the
//! loader, growing monotonically as class-definition exports are linked.
//! It never shrinks and is never precomputed from a schema. Tests get
//! isolation by constructing a fresh index.

use std::collections::{HashMap, HashSet};

use crate::package::ClassEdge;
use crate::Error;

/// Single-inheritance parent map over class fullnames.
#[derive(Debug, Default, Clone)]
pub struct ClassHierarchy {
    /// `Some(parent)` for a registered edge, `None` for a known root
    /// (script classes whose packages are never loaded).
    parents: HashMap<String, Option<String>>,
}

impl ClassHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class edge, overwriting any previous parent for the
    /// class. Script-package parents are implicitly registered as roots so
    /// chains ending in engine classes terminate instead of erroring.
    pub fn register(&mut self, class: &str, parent: &str) {
        self.parents
            .insert(class.to_owned(), Some(parent.to_owned()));
        if parent.starts_with("/Script/") && !self.parents.contains_key(parent) {
            self.parents.insert(parent.to_owned(), None);
        }
    }

    /// Registers a class with no parent, terminating walks that reach it.
    pub fn register_root(&mut self, class: &str) {
        self.parents.entry(class.to_owned()).or_insert(None);
    }

    pub fn register_edges(&mut self, edges: &[ClassEdge]) {
        for edge in edges {
            self.register(&edge.class, &edge.parent);
        }
    }

    pub fn contains(&self, class: &str) -> bool {
        self.parents.contains_key(class)
    }

    pub fn parent_of(&self, class: &str) -> Option<&str> {
        self.parents.get(class).and_then(|p| p.as_deref())
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Whether `candidate` is `ancestor` or inherits from it.
    ///
    /// Walks parent edges until `ancestor` is found (true) or a known root
    /// is reached (false). An unrecorded class fails with
    /// [`Error::UnknownClass`] unless `safe` is set, in which case partial
    /// loads (mods, optional content) degrade to "no match". A revisited
    /// class means malformed input and is a format violation.
    pub fn inherits_from(&self, candidate: &str, ancestor: &str, safe: bool) -> Result<bool, Error> {
        if candidate == ancestor {
            return Ok(true);
        }
        let mut seen = HashSet::new();
        let mut current = candidate;
        loop {
            if !seen.insert(current) {
                return Err(Error::Format(format!(
                    "circular class hierarchy at '{current}'"
                )));
            }
            match self.parents.get(current) {
                Some(Some(parent)) if parent == ancestor => return Ok(true),
                Some(Some(parent)) => current = parent,
                Some(None) => return Ok(false),
                None if safe => return Ok(false),
                None => return Err(Error::UnknownClass(current.to_owned())),
            }
        }
    }

    /// Ancestor classes of `class`, nearest first, excluding `class`
    /// itself. The walk stops at the first unrecorded class; partial
    /// hierarchies are expected mid-discovery.
    pub fn ancestors(&self, class: &str) -> Result<Vec<String>, Error> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = class.to_owned();
        while let Some(parent) = self.parent_of(&current) {
            if !seen.insert(current.clone()) {
                return Err(Error::Format(format!(
                    "circular class hierarchy at '{current}'"
                )));
            }
            chain.push(parent.to_owned());
            current = parent.to_owned();
        }
        Ok(chain)
    }
}
