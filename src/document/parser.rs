//! Builds document arenas from YAML parser events.
//!
//! The parser reports where each scalar token starts; the end of the token is
//! found by reading the source text according to the scalar's style.

use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::{Marker, ScanError, TScalarStyle};

use super::{Document, Node, NodeId, Scalar, ScalarStyle, Span};

/// Parses every document in `text`. Empty and comment-only input has none.
pub fn parse_documents(text: &str) -> Result<Vec<Document>, ScanError> {
    let mut builder = ArenaBuilder::new(text);
    let mut parser = Parser::new_from_str(text);
    parser.load(&mut builder, true)?;
    Ok(builder.documents)
}

impl From<TScalarStyle> for ScalarStyle {
    fn from(style: TScalarStyle) -> Self {
        match style {
            TScalarStyle::Plain => Self::Plain,
            TScalarStyle::SingleQuoted => Self::SingleQuoted,
            TScalarStyle::DoubleQuoted => Self::DoubleQuoted,
            TScalarStyle::Literal => Self::Literal,
            _ => Self::Folded,
        }
    }
}

/// A collection whose end event has not arrived yet.
enum Open {
    Sequence(Vec<NodeId>),
    Mapping {
        entries: Vec<(NodeId, NodeId)>,
        key: Option<NodeId>,
    },
}

struct ArenaBuilder<'a> {
    text: &'a str,
    /// Byte offset of each character, plus the text length.
    offsets: Vec<usize>,
    nodes: Vec<Node>,
    stack: Vec<Open>,
    documents: Vec<Document>,
}

impl<'a> ArenaBuilder<'a> {
    fn new(text: &'a str) -> Self {
        let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        offsets.push(text.len());
        Self {
            text,
            offsets,
            nodes: Vec::new(),
            stack: Vec::new(),
            documents: Vec::new(),
        }
    }

    /// Adds a finished node to its parent; a node without one is a document root.
    fn complete(&mut self, node: Node) {
        self.nodes.push(node);
        let id = NodeId(self.nodes.len() - 1);

        match self.stack.last_mut() {
            None => self.documents.push(Document {
                nodes: std::mem::take(&mut self.nodes),
                root: id,
            }),
            Some(Open::Sequence(items)) => items.push(id),
            Some(Open::Mapping {
                entries,
                key,
            }) => match key.take() {
                Some(key) => entries.push((key, id)),
                None => *key = Some(id),
            },
        }
    }

    /// Markers count characters; a byte reading of the index is tried as well
    /// before giving up.
    fn scalar_span(&self, marker: &Marker, style: ScalarStyle, value: &str) -> Option<Span> {
        let by_char = self.offsets.get(marker.index()).copied();
        let by_byte = Some(marker.index()).filter(|i| self.text.is_char_boundary(*i));

        [by_char, by_byte].into_iter().flatten().find_map(|start| {
            let source = &self.text[start..];
            let len = match style {
                ScalarStyle::Plain => plain_len(source, value),
                ScalarStyle::SingleQuoted => quoted_len(source, '\''),
                ScalarStyle::DoubleQuoted => quoted_len(source, '"'),
                ScalarStyle::Literal | ScalarStyle::Folded => block_len(self.text, start),
            }?;
            Some(Span {
                start,
                end: start + len,
            })
        })
    }
}

impl MarkedEventReceiver for ArenaBuilder<'_> {
    fn on_event(&mut self, ev: Event, marker: Marker) {
        match ev {
            Event::Scalar(value, style, _anchor_id, tag) => {
                let style = ScalarStyle::from(style);
                let span = self.scalar_span(&marker, style, &value);
                if span.is_none() {
                    tracing::trace!("No source span for scalar {:?}", value);
                }
                self.complete(Node::Scalar(Scalar {
                    value,
                    style,
                    tagged: tag.is_some(),
                    span,
                    rewritten: false,
                }));
            }
            Event::SequenceStart(_anchor_id, _tag) => self.stack.push(Open::Sequence(Vec::new())),
            Event::MappingStart(_anchor_id, _tag) => self.stack.push(Open::Mapping {
                entries: Vec::new(),
                key: None,
            }),
            Event::SequenceEnd | Event::MappingEnd => {
                let node = match self.stack.pop() {
                    Some(Open::Sequence(items)) => Node::Sequence(items),
                    Some(Open::Mapping {
                        entries,
                        ..
                    }) => Node::Mapping(entries),
                    None => return,
                };
                self.complete(node);
            }
            Event::Alias(_anchor_id) => self.complete(Node::Alias),
            _ => {}
        }
    }
}

/// Length of a plain scalar whose folded value is `value`. Line breaks and
/// indentation in the source fold to single spaces in the value.
fn plain_len(source: &str, value: &str) -> Option<usize> {
    let mut src = source.char_indices().peekable();
    let mut val = value.chars().peekable();

    while let Some(expected) = val.next() {
        let &(_, actual) = src.peek()?;
        if actual == expected {
            src.next();
        } else if actual.is_whitespace() && expected.is_whitespace() {
            while src.next_if(|(_, c)| c.is_whitespace()).is_some() {}
            while val.next_if(|c| c.is_whitespace()).is_some() {}
        } else {
            return None;
        }
    }
    Some(src.peek().map_or(source.len(), |(i, _)| *i))
}

/// Length of a quoted scalar including both quotes. `''` escapes a single
/// quote; a backslash escapes the next character in double quotes.
fn quoted_len(source: &str, quote: char) -> Option<usize> {
    let mut chars = source.char_indices().peekable();
    if chars.next()?.1 != quote {
        return None;
    }
    while let Some((i, c)) = chars.next() {
        if quote == '"' && c == '\\' {
            chars.next();
        } else if c == quote {
            if quote == '\'' && chars.next_if(|(_, c)| *c == '\'').is_some() {
                continue;
            }
            return Some(i + c.len_utf8());
        }
    }
    None
}

/// Length of a block scalar starting at its `|` / `>` indicator, up to the
/// end of its last non-blank content line.
fn block_len(text: &str, start: usize) -> Option<usize> {
    let rest = &text[start..];
    if !rest.starts_with(['|', '>']) {
        return None;
    }

    // Content must be indented past the line holding the indicator, unless
    // the indicator starts that line (a document root).
    let line_start = text[..start].rfind('\n').map_or(0, |i| i + 1);
    let header = &text[line_start..];
    let header_indent = header.len() - header.trim_start_matches(' ').len();
    let header_body = header.trim_start_matches(' ');
    let min_indent = if header_body.starts_with(['|', '>']) || header_body.starts_with("---") {
        header_indent
    } else {
        header_indent + 1
    };

    let mut end = rest.find('\n').unwrap_or(rest.len());
    let mut cursor = end;
    let mut content_indent = None;
    while cursor < rest.len() {
        let line_start = cursor + 1;
        let line_end = rest[line_start..].find('\n').map_or(rest.len(), |i| line_start + i);
        let line = &rest[line_start..line_end];
        let line = line.strip_suffix('\r').unwrap_or(line);
        cursor = line_end;

        let body = line.trim_start_matches(' ');
        if body.is_empty() {
            continue;
        }
        let indent = line.len() - body.len();
        let required = *content_indent.get_or_insert(indent);
        if indent < required || indent < min_indent {
            break;
        }
        end = line_start + line.len();
    }
    Some(end)
}
