/*!
Pull text and attribute values out of an [XML 1.0](https://www.w3.org/TR/xml/) document
using a slash-separated path.

The entry points are [`extract`] and [`extract_recursive`].

A path is a list of element names separated by `/`. Each name can be followed by
a zero-based index (`entry[1]`) to pick one of several same-named elements and
the last one can be followed by an attribute selector (`link@href`).

```
let data = b"<feed><entry><title>a</title></entry><entry><title>b</title></entry></feed>";
assert_eq!(xmlpick::extract("feed/entry[1]/title", data).unwrap(), vec!["b"]);
```

The document is decoded into a small read-only tree first, see [`Document::parse`].

[`extract`]: fn.extract.html
[`extract_recursive`]: fn.extract_recursive.html
[`Document::parse`]: struct.Document.html#method.parse
*/

#![doc(html_root_url = "https://docs.rs/xmlpick/0.1.0")]

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::borrow::Cow;
use std::fmt;
use std::slice;
use std::str;

use log::debug;

pub use xmlparser::TextPos;

mod parse;
mod path;
mod select;


pub use parse::*;
pub use path::*;
pub use select::*;


/// Extracts values found at `path` inside the XML `data`.
///
/// Returns the text of the first matched element if it has no child elements,
/// otherwise the text of each of its immediate childless children.
/// An attribute selector returns attribute values instead.
///
/// Nothing matched is an empty list, not an error.
///
/// # Examples
///
/// ```
/// let data = b"<root><baz><p>0</p><p>1</p></baz></root>";
/// assert_eq!(xmlpick::extract("root/baz", data).unwrap(), vec!["0", "1"]);
/// assert!(xmlpick::extract("root/qux", data).unwrap().is_empty());
/// ```
pub fn extract(path: &str, data: &[u8]) -> Result<Vec<String>, Error> {
    extract_with(path, data, Mode::Shallow, ParsingOptions::default())
}

/// Like [`extract`], but collects the text of every childless descendant
/// of the matched element.
///
/// # Examples
///
/// ```
/// let data = b"<root><p>a</p><foo><bar><p>b</p></bar></foo></root>";
/// assert_eq!(xmlpick::extract_recursive("root", data).unwrap(), vec!["a", "b"]);
/// ```
///
/// [`extract`]: fn.extract.html
pub fn extract_recursive(path: &str, data: &[u8]) -> Result<Vec<String>, Error> {
    extract_with(path, data, Mode::Recursive, ParsingOptions::default())
}

/// Extracts values with an explicit extraction mode and parsing options.
pub fn extract_with(
    path: &str,
    data: &[u8],
    mode: Mode,
    opt: ParsingOptions,
) -> Result<Vec<String>, Error> {
    let path = Path::parse(path)?;
    debug!("compiled '{}' into {} segment(s)", path, path.segments().len());

    let text = str::from_utf8(data)?;
    let doc = Document::parse_with_options(text, opt)?;

    let values = path.select(doc.root_element(), mode);
    Ok(values.into_iter().map(str::to_string).collect())
}


/// A decoded XML document.
///
/// Holds exactly one root element. Only elements are represented as nodes:
/// text, comments, CDATA and processing instructions stay inside
/// the raw [`Node::text()`] of their parent.
///
/// [`Node::text()`]: struct.Node.html#method.text
pub struct Document<'d> {
    /// An original data.
    ///
    /// Required for `text_pos_at`.
    text: &'d str,
    root: Node<'d>,
}

impl<'d> Document<'d> {
    /// Returns the root element of the document.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = xmlpick::Document::parse("<!-- comment --><e/>").unwrap();
    /// assert_eq!(doc.root_element().name(), "e");
    /// ```
    pub fn root_element(&self) -> &Node<'d> {
        &self.root
    }

    /// Returns an iterator over the root element and all its descendants
    /// in document order.
    ///
    /// Shorthand for `doc.root_element().descendants()`.
    pub fn descendants(&self) -> Descendants<'_, 'd> {
        self.root.descendants()
    }

    /// Calculates `TextPos` in the original document from position in bytes.
    ///
    /// **Note:** this operation is expensive.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = xmlpick::Document::parse("\
    /// <!-- comment -->
    /// <e/>"
    /// ).unwrap();
    ///
    /// assert_eq!(doc.text_pos_at(10), xmlpick::TextPos::new(1, 11));
    /// assert_eq!(doc.text_pos_at(9999), xmlpick::TextPos::new(2, 5));
    /// ```
    pub fn text_pos_at(&self, pos: usize) -> TextPos {
        parse::text_pos_at(self.text, pos)
    }
}

impl<'d> fmt::Debug for Document<'d> {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        macro_rules! writeln_indented {
            ($depth:expr, $f:expr, $fmt:expr) => {
                for _ in 0..$depth { write!($f, "    ")?; }
                writeln!($f, $fmt)?;
            };
            ($depth:expr, $f:expr, $fmt:expr, $($arg:tt)*) => {
                for _ in 0..$depth { write!($f, "    ")?; }
                writeln!($f, $fmt, $($arg)*)?;
            };
        }

        fn print_node(node: &Node, depth: usize, f: &mut fmt::Formatter)
            -> Result<(), fmt::Error>
        {
            writeln_indented!(depth, f, "Element {{");
            writeln_indented!(depth, f, "    name: {:?}", node.name());

            if !node.attributes().is_empty() {
                writeln_indented!(depth, f, "    attributes: [");
                for attr in node.attributes() {
                    writeln_indented!(depth + 2, f, "{:?}", attr);
                }
                writeln_indented!(depth, f, "    ]");
            }

            if node.is_leaf() {
                writeln_indented!(depth, f, "    text: {:?}", node.text());
            } else {
                writeln_indented!(depth, f, "    children: [");
                for child in node.children() {
                    print_node(child, depth + 2, f)?;
                }
                writeln_indented!(depth, f, "    ]");
            }

            writeln_indented!(depth, f, "}}");
            Ok(())
        }

        writeln!(f, "Document [")?;
        print_node(&self.root, 1, f)?;
        writeln!(f, "]")?;

        Ok(())
    }
}


/// An attribute.
#[derive(Clone, PartialEq)]
pub struct Attribute<'d> {
    name: &'d str,
    value: Cow<'d, str>,
}

impl<'d> Attribute<'d> {
    /// Returns attribute's local name.
    ///
    /// The namespace prefix is stripped.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = xmlpick::Document::parse(
    ///     "<e xmlns:n='http://www.w3.org' a='b' n:c='d'/>"
    /// ).unwrap();
    ///
    /// assert_eq!(doc.root_element().attributes()[1].name(), "a");
    /// assert_eq!(doc.root_element().attributes()[2].name(), "c");
    /// ```
    pub fn name(&self) -> &str {
        self.name
    }

    /// Returns attribute's value with all references resolved.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = xmlpick::Document::parse("<e a='b &amp; c'/>").unwrap();
    ///
    /// assert_eq!(doc.root_element().attributes()[0].value(), "b & c");
    /// ```
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl<'d> fmt::Debug for Attribute<'d> {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "Attribute {{ name: {:?}, value: {:?} }}", self.name, self.value)
    }
}


/// An element node.
///
/// A node without child elements is a *leaf*. The raw text of a leaf
/// is what the path engine treats as a value.
#[derive(Clone, PartialEq, Debug)]
pub struct Node<'d> {
    name: &'d str,
    text: &'d str,
    attributes: Vec<Attribute<'d>>,
    children: Vec<Node<'d>>,
    pos: usize,
}

impl<'d> Node<'d> {
    /// Returns element's local name.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = xmlpick::Document::parse("<n:e xmlns:n='http://www.w3.org'/>").unwrap();
    ///
    /// assert_eq!(doc.root_element().name(), "e");
    /// ```
    pub fn name(&self) -> &'d str {
        self.name
    }

    /// Returns element's inner markup exactly as it appears in the document.
    ///
    /// References are not resolved and nested markup is kept as is.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = xmlpick::Document::parse("<p>a &amp; <b>c</b></p>").unwrap();
    ///
    /// assert_eq!(doc.root_element().text(), "a &amp; <b>c</b>");
    /// ```
    pub fn text(&self) -> &'d str {
        self.text
    }

    /// Returns element's attributes in document order.
    pub fn attributes(&self) -> &[Attribute<'d>] {
        &self.attributes
    }

    /// Returns the value of the first attribute with the specified local name.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = xmlpick::Document::parse("<e a='b'/>").unwrap();
    ///
    /// assert_eq!(doc.root_element().attribute("a"), Some("b"));
    /// assert_eq!(doc.root_element().attribute("c"), None);
    /// ```
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|a| a.name == name).map(|a| a.value())
    }

    /// Returns an iterator over child elements.
    pub fn children(&self) -> slice::Iter<'_, Node<'d>> {
        self.children.iter()
    }

    /// Returns true if this node has child elements.
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Returns true if this node has no child elements.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns an iterator over this node and its descendants in document order.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = xmlpick::Document::parse("<a><b><c/></b><d/></a>").unwrap();
    ///
    /// let names: Vec<_> = doc.descendants().map(|n| n.name()).collect();
    /// assert_eq!(names, ["a", "b", "c", "d"]);
    /// ```
    pub fn descendants(&self) -> Descendants<'_, 'd> {
        Descendants { stack: vec![slice::from_ref(self).iter()] }
    }

    /// Returns node's position in bytes in the original document.
    ///
    /// Points to the `<` of the start tag.
    pub fn pos(&self) -> usize {
        self.pos
    }
}


/// Iterator over a node and its descendants.
#[derive(Clone)]
pub struct Descendants<'a, 'd: 'a> {
    stack: Vec<slice::Iter<'a, Node<'d>>>,
}

impl<'a, 'd: 'a> Iterator for Descendants<'a, 'd> {
    type Item = &'a Node<'d>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let iter = self.stack.last_mut()?;
            match iter.next() {
                Some(node) => {
                    self.stack.push(node.children.iter());
                    return Some(node);
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}
