//! Structural device paths and their textual representation.
//!
//! A device path names a hardware or firmware node as a sequence of nodes,
//! written `PciRoot(0x0)/Pci(0x1,0x0)` in text form. The parser here is
//! purely structural: it validates the node/argument grammar and normalizes
//! numeric arguments, but it does not know which keywords exist or what
//! their arguments mean. That keeps the type usable as a database key
//! (`Ord`/`Hash` over the parsed structure, so `Pci(0x1,0x0)` and
//! `Pci(1,0)` collapse to the same key) without dragging in a hardware
//! vocabulary.

use std::fmt;
use std::str::FromStr;

use crate::ucs2::Ucs2String;

/// A parsed device path: one or more nodes, root first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DevicePath {
    nodes: Vec<DevicePathNode>,
}

/// One node of a device path: a keyword and its argument list.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DevicePathNode {
    keyword: String,
    args: Vec<NodeArg>,
}

/// A node argument. Integers (hex or decimal in the text form) are
/// normalized; anything else (GUIDs, labels) is kept as opaque text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeArg {
    Number(u64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty device path")]
    Empty,
    #[error("empty node in device path")]
    EmptyNode,
    #[error("node {0:?} does not start with a keyword")]
    MissingKeyword(String),
    #[error("node keyword {0:?} is not followed by an argument list")]
    MissingArgumentList(String),
    #[error("unbalanced parentheses in {0:?}")]
    UnbalancedParens(String),
    #[error("unexpected characters after the argument list of node {0:?}")]
    TrailingCharacters(String),
}

impl DevicePath {
    /// Parse the database-native (wide) form of a device path text.
    pub fn parse_wide(text: &Ucs2String) -> Result<DevicePath, ParseError> {
        let narrow: String = text.chars().collect();
        narrow.parse()
    }

    pub fn nodes(&self) -> &[DevicePathNode] {
        &self.nodes
    }
}

impl DevicePathNode {
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn args(&self) -> &[NodeArg] {
        &self.args
    }
}

impl FromStr for DevicePath {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<DevicePath, ParseError> {
        let text = s.trim();
        if text.is_empty() {
            return Err(ParseError::Empty);
        }
        let mut nodes = Vec::new();
        for segment in split_nodes(text)? {
            nodes.push(parse_node(segment)?);
        }
        Ok(DevicePath { nodes })
    }
}

/// Split a path into node segments at `/` separators, ignoring separators
/// inside parentheses (GUID-style arguments may contain them).
fn split_nodes(text: &str) -> Result<Vec<&str>, ParseError> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| ParseError::UnbalancedParens(text[start..].to_string()))?;
            }
            '/' if depth == 0 => {
                segments.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(ParseError::UnbalancedParens(text[start..].to_string()));
    }
    segments.push(&text[start..]);
    Ok(segments)
}

fn parse_node(segment: &str) -> Result<DevicePathNode, ParseError> {
    let segment = segment.trim();
    if segment.is_empty() {
        return Err(ParseError::EmptyNode);
    }

    let keyword_len = keyword_prefix_len(segment);
    if keyword_len == 0 {
        return Err(ParseError::MissingKeyword(segment.to_string()));
    }
    let keyword = &segment[..keyword_len];
    let rest = &segment[keyword_len..];
    if !rest.starts_with('(') {
        return Err(ParseError::MissingArgumentList(keyword.to_string()));
    }

    // split_nodes guarantees overall balance; find where this node's
    // argument list closes and reject anything after it.
    let mut depth = 0usize;
    let mut close = None;
    for (i, c) in rest.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }
    let close = close.ok_or_else(|| ParseError::UnbalancedParens(segment.to_string()))?;
    if close != rest.len() - 1 {
        return Err(ParseError::TrailingCharacters(keyword.to_string()));
    }

    let inner = &rest[1..close];
    let args = if inner.trim().is_empty() {
        Vec::new()
    } else {
        split_args(inner).map(parse_arg).collect()
    };

    Ok(DevicePathNode {
        keyword: keyword.to_string(),
        args,
    })
}

/// Length of the leading keyword: one ASCII letter followed by
/// letters/digits.
fn keyword_prefix_len(s: &str) -> usize {
    let mut len = 0;
    for (i, c) in s.char_indices() {
        let ok = if i == 0 {
            c.is_ascii_alphabetic()
        } else {
            c.is_ascii_alphanumeric()
        };
        if !ok {
            break;
        }
        len = i + c.len_utf8();
    }
    len
}

/// Split an argument list on top-level commas.
fn split_args(inner: &str) -> impl Iterator<Item = &str> {
    let mut depth = 0usize;
    inner.split(move |c| match c {
        '(' => {
            depth += 1;
            false
        }
        ')' => {
            depth = depth.saturating_sub(1);
            false
        }
        ',' => depth == 0,
        _ => false,
    })
}

fn parse_arg(arg: &str) -> NodeArg {
    let arg = arg.trim();
    if let Some(hex) = arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X")) {
        if !hex.is_empty() {
            if let Ok(n) = u64::from_str_radix(hex, 16) {
                return NodeArg::Number(n);
            }
        }
    } else if arg.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        if let Ok(n) = arg.parse() {
            return NodeArg::Number(n);
        }
    }
    NodeArg::Text(arg.to_string())
}

impl fmt::Display for DevicePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", node)?;
        }
        Ok(())
    }
}

impl fmt::Display for DevicePathNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.keyword)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for NodeArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeArg::Number(n) => write!(f, "0x{:x}", n),
            NodeArg::Text(t) => write!(f, "{}", t),
        }
    }
}
