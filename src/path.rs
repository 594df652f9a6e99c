use std::fmt;
use std::str::FromStr;

use crate::Error;


/// A compiled path.
///
/// A list of [`Segment`]s, one per `/`-separated part of the source text.
///
/// # Examples
///
/// ```
/// let path = xmlpick::Path::parse("feed/entry[1]/link@href").unwrap();
///
/// assert_eq!(path.segments().len(), 3);
/// assert_eq!(path.segments()[1].index(), Some(1));
/// assert_eq!(path.segments()[2].attribute(), Some("href"));
/// ```
///
/// [`Segment`]: struct.Segment.html
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// Parses a path.
    ///
    /// Parsing never consults a document. Parts that don't look like an indexed
    /// or an attribute-selected name are kept as plain names, even if no element
    /// can have such a name. This includes the empty part after a trailing `/`.
    ///
    /// The only error is an index that doesn't fit into `usize`.
    pub fn parse(text: &str) -> Result<Path, Error> {
        let segments = text.split('/').map(Segment::parse).collect::<Result<_, _>>()?;
        Ok(Path { segments })
    }

    /// Returns path's segments.
    ///
    /// Never empty.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

impl FromStr for Path {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Path::parse(text)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i != 0 {
                write!(f, "/")?;
            }

            write!(f, "{}", segment)?;
        }

        Ok(())
    }
}


/// A single path step.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Segment {
    name: String,
    index: Option<usize>,
    tail: String,
    target: String,
    attribute: Option<String>,
}

impl Segment {
    fn parse(text: &str) -> Result<Segment, Error> {
        if let Some((name, digits, tail)) = split_index(text) {
            let index = digits.parse().map_err(|_| Error::InvalidPathIndex(text.to_string()))?;

            // Once the index is reached, the name and the tail are matched together.
            let (target, attribute) = split_attribute(&format!("{}{}", name, tail));

            return Ok(Segment {
                name: name.to_string(),
                index: Some(index),
                tail: tail.to_string(),
                target,
                attribute,
            });
        }

        let (target, attribute) = split_attribute(text);
        Ok(Segment {
            name: target.clone(),
            index: None,
            tail: String::new(),
            target,
            attribute,
        })
    }

    /// Returns an element name this segment matches.
    ///
    /// For an indexed segment, this is the name the index counts.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a zero-based index among same-named elements.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Returns an element name a final match is tested against.
    ///
    /// Same as [`name()`] unless an indexed segment has text after `]`.
    /// In that case, it's the name followed by that text,
    /// with the attribute selector removed.
    ///
    /// [`name()`]: #method.name
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns an attribute selector.
    ///
    /// Honored only on the last segment.
    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    /// Checks that the segment is a bare element name.
    pub fn is_plain(&self) -> bool {
        self.index.is_none() && self.attribute.is_none()
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(index) = self.index {
            return write!(f, "{}[{}]{}", self.name, index, self.tail);
        }

        write!(f, "{}", self.name)?;

        if let Some(ref attr) = self.attribute {
            write!(f, "@{}", attr)?;
        }

        Ok(())
    }
}

/// Splits `name@attr` on the last `@`, if `attr` is not empty.
fn split_attribute(text: &str) -> (String, Option<String>) {
    match text.rsplit_once('@') {
        Some((name, attr)) if !attr.is_empty() => (name.to_string(), Some(attr.to_string())),
        _ => (text.to_string(), None),
    }
}

/// Splits `name[digits]rest` at the rightmost bracket group made of digits only.
fn split_index(text: &str) -> Option<(&str, &str, &str)> {
    text.rmatch_indices('[').find_map(|(start, _)| {
        let tail = &text[start + 1..];
        let len = tail.bytes().take_while(u8::is_ascii_digit).count();
        if len == 0 || tail.as_bytes().get(len) != Some(&b']') {
            return None;
        }

        Some((&text[..start], &tail[..len], &tail[len + 1..]))
    })
}
