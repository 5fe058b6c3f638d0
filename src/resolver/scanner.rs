//! Discovery of build references inside document trees.

use std::collections::BTreeMap;

use crate::document::{Document, Node, NodeHandle, NodeId, SourceFile};

/// Lazy depth-first walk over one document yielding string scalars that start
/// with a recognised `scheme://` prefix.
///
/// Every node is visited, mapping keys included; aliases are not followed, so
/// an anchored reference is reported once. The walk never mutates the
/// document and can be restarted by creating a new scanner.
pub struct ReferenceScanner<'a> {
    document: &'a Document,
    prefixes: &'a [String],
    stack: Vec<NodeId>,
}

impl<'a> ReferenceScanner<'a> {
    /// `prefixes` are full prefixes such as `dockerfile://`.
    pub fn new(document: &'a Document, prefixes: &'a [String]) -> Self {
        Self {
            document,
            prefixes,
            stack: vec![document.root()],
        }
    }
}

impl<'a> Iterator for ReferenceScanner<'a> {
    type Item = (NodeId, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let document: &'a Document = self.document;
        while let Some(id) = self.stack.pop() {
            match document.node(id) {
                Node::Sequence(children) => self.stack.extend(children.iter().rev()),
                Node::Mapping(entries) => {
                    for (key, value) in entries.iter().rev() {
                        self.stack.push(*value);
                        self.stack.push(*key);
                    }
                }
                Node::Alias => {}
                Node::Scalar(_) => {
                    let Some(text) = document.scalar_str(id) else {
                        continue;
                    };
                    let trimmed = text.trim();
                    if self.prefixes.iter().any(|p| trimmed.starts_with(p.as_str())) {
                        return Some((id, trimmed));
                    }
                }
            }
        }
        None
    }
}

/// Every distinct reference string mapped to the nodes holding it.
#[derive(Debug, Default, Clone)]
pub struct OccurrenceSet {
    occurrences: BTreeMap<String, Vec<NodeHandle>>,
}

impl OccurrenceSet {
    /// Scans all documents of all files, merging identical references.
    pub fn collect(files: &[SourceFile], prefixes: &[String]) -> Self {
        let mut set = Self::default();
        for (file_index, file) in files.iter().enumerate() {
            for (doc_index, document) in file.documents.iter().enumerate() {
                for (node, reference) in ReferenceScanner::new(document, prefixes) {
                    set.insert(
                        reference,
                        NodeHandle {
                            file: file_index,
                            document: doc_index,
                            node,
                        },
                    );
                }
            }
        }
        set
    }

    pub fn insert(&mut self, reference: &str, handle: NodeHandle) {
        self.occurrences.entry(reference.to_string()).or_default().push(handle);
    }

    /// Distinct references in sorted order.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.occurrences.keys().map(String::as_str)
    }

    pub fn handles(&self, reference: &str) -> &[NodeHandle] {
        self.occurrences.get(reference).map_or(&[], Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[NodeHandle])> {
        self.occurrences.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of distinct references.
    pub fn len(&self) -> usize {
        self.occurrences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty()
    }

    /// Total number of nodes across all references.
    pub fn occurrence_count(&self) -> usize {
        self.occurrences.values().map(Vec::len).sum()
    }
}
