//! Parsed configuration documents held as node arenas.
//!
//! Every input file is decoded into a [`SourceFile`]: its designator, its text
//! and the ordered list of YAML documents it contained. Each [`Document`]
//! stores its tree as a flat vector of [`Node`]s addressed by [`NodeId`], so
//! the reference scanner can hand out plain indices ([`NodeHandle`]) and
//! substitution can rewrite exactly those slots after all builds have
//! finished.
//!
//! Scalars remember the byte [`Span`] they occupy in the file. Rendering a
//! file copies its text and re-encodes only the rewritten scalars, so
//! comments, anchors, aliases, document markers and the spelling of every
//! other scalar (`0x1F`, `~`, quoting) come out exactly as they went in.
//!
//! JSON inputs are read through the same YAML parser.

pub mod loader;
pub mod parser;
pub mod writer;

use anyhow::Result;
use serde_yaml::Value;

use crate::core::BuildrefError;

pub use loader::{FileDesignator, enumerate_files, load_file, load_files};
pub use writer::{OutputOptions, write_documents};

/// Index of a node within its [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

/// Byte range in a file's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// How a scalar was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
    /// `|` block scalar.
    Literal,
    /// `>` block scalar.
    Folded,
}

/// A scalar leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct Scalar {
    /// Value after unquoting and folding.
    pub value: String,
    pub style: ScalarStyle,
    /// Carries an explicit tag such as `!Ref` or `!!str`.
    pub tagged: bool,
    /// Source text of the scalar, quotes and block header included. `None`
    /// when the parser's position could not be matched against the text.
    pub span: Option<Span>,
    /// Set by substitution.
    pub rewritten: bool,
}

impl Scalar {
    /// Untagged plain scalars resolve through the YAML core schema; quoted,
    /// block and tagged scalars are always strings.
    fn is_string(&self) -> bool {
        if self.style != ScalarStyle::Plain || self.tagged {
            return true;
        }
        if self.value.is_empty() {
            return false;
        }
        !matches!(
            serde_yaml::from_str::<Value>(&self.value),
            Ok(Value::Null | Value::Bool(_) | Value::Number(_))
        )
    }
}

/// One node of a document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Scalar(Scalar),
    Sequence(Vec<NodeId>),
    /// Key/value pairs in document order. Keys are nodes too.
    Mapping(Vec<(NodeId, NodeId)>),
    /// `*name`. Not followed: whatever the anchor holds is visited once, at
    /// the anchor.
    Alias,
}

/// One parsed document stored as a node arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Document {
    pub const fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The value of a string scalar node.
    pub fn scalar_str(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0] {
            Node::Scalar(scalar) if scalar.is_string() => Some(&scalar.value),
            _ => None,
        }
    }

    /// Replaces the value of the scalar at `id`.
    ///
    /// # Errors
    ///
    /// Fails when `id` is not a scalar or its source text was not located.
    pub fn set_string(&mut self, id: NodeId, value: impl Into<String>) -> Result<(), String> {
        match &mut self.nodes[id.0] {
            Node::Scalar(scalar) if scalar.span.is_some() => {
                scalar.value = value.into();
                scalar.rewritten = true;
                Ok(())
            }
            Node::Scalar(_) => Err("the value could not be located in the source text".to_string()),
            _ => Err("the node is not a scalar".to_string()),
        }
    }

    /// Replacement text for every rewritten scalar.
    fn edits(&self) -> impl Iterator<Item = (Span, String)> + '_ {
        self.nodes.iter().filter_map(|node| match node {
            Node::Scalar(Scalar {
                value,
                style,
                span: Some(span),
                rewritten: true,
                ..
            }) => Some((*span, encode_scalar(value, *style))),
            _ => None,
        })
    }

    /// A rewritten mapping key that now equals one of its sibling keys.
    pub fn rewritten_key_collision(&self) -> Option<&str> {
        let key_of = |id: &NodeId| match &self.nodes[id.0] {
            Node::Scalar(scalar) => Some(scalar),
            _ => None,
        };

        for node in &self.nodes {
            let Node::Mapping(entries) = node else {
                continue;
            };
            for (i, (key, _)) in entries.iter().enumerate() {
                let Some(key) = key_of(key).filter(|k| k.rewritten) else {
                    continue;
                };
                let clash = entries
                    .iter()
                    .enumerate()
                    .any(|(j, (other, _))| j != i && key_of(other).is_some_and(|o| o.value == key.value));
                if clash {
                    return Some(&key.value);
                }
            }
        }
        None
    }
}

/// Encodes `value` in the style the replaced scalar was written in.
///
/// Plain scalars stay plain while the new value reads back as the same
/// string; block scalars and anything else become double-quoted.
pub fn encode_scalar(value: &str, style: ScalarStyle) -> String {
    match style {
        ScalarStyle::SingleQuoted if !value.contains('\n') => {
            format!("'{}'", value.replace('\'', "''"))
        }
        ScalarStyle::Plain if is_plain_safe(value) => value.to_string(),
        _ => double_quoted(value),
    }
}

fn is_plain_safe(value: &str) -> bool {
    value.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
        && value.chars().all(|c| c.is_ascii_alphanumeric() || "._/:@+-".contains(c))
        && matches!(serde_yaml::from_str::<Value>(value), Ok(Value::String(s)) if s == value)
}

fn double_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// An input file and the documents decoded from it, in file order.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub designator: FileDesignator,
    /// The file as read.
    pub text: String,
    pub documents: Vec<Document>,
}

impl SourceFile {
    /// Parses every document in `text`.
    ///
    /// # Errors
    ///
    /// [`BuildrefError::ParseError`] naming `designator` when the text is
    /// not valid YAML.
    pub fn parse(designator: FileDesignator, text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        let documents = parser::parse_documents(&text).map_err(|e| BuildrefError::ParseError {
            file: designator.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            designator,
            text,
            documents,
        })
    }

    /// The file's text with every rewritten scalar replaced.
    pub fn render(&self) -> String {
        let mut edits: Vec<(Span, String)> =
            self.documents.iter().flat_map(Document::edits).collect();
        if edits.is_empty() {
            return self.text.clone();
        }
        edits.sort_by_key(|(span, _)| span.start);

        let mut out = String::with_capacity(self.text.len());
        let mut cursor = 0;
        for (span, replacement) in edits {
            out.push_str(&self.text[cursor..span.start]);
            out.push_str(&replacement);
            cursor = span.end;
        }
        out.push_str(&self.text[cursor..]);
        out
    }
}

/// Location of one node across a whole run: file, document and node index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeHandle {
    pub file: usize,
    pub document: usize,
    pub node: NodeId,
}
