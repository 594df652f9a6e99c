use log::{debug, trace};

use crate::{Node, Path, Segment};


/// A value extraction mode.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Mode {
    /// Text of the matched element if it's a leaf,
    /// otherwise text of its immediate leaf children.
    #[default]
    Shallow,
    /// Text of every leaf descendant of the matched element, in document order.
    Recursive,
}


/// A walk position inside the segment list.
#[derive(Clone, Copy, PartialEq, Debug)]
struct Cursor {
    /// Current segment.
    pos: usize,
    /// Same-named elements the current indexed segment still has to skip.
    ///
    /// `None` for plain segments and for the last indexed segment
    /// once its element was reached.
    skip: Option<usize>,
}

impl Cursor {
    fn new(segments: &[Segment]) -> Self {
        Cursor { pos: 0, skip: segments[0].index() }
    }

    fn advance(self, segments: &[Segment]) -> Self {
        let pos = self.pos + 1;
        Cursor { pos, skip: segments[pos].index() }
    }

    fn is_last(&self, segments: &[Segment]) -> bool {
        self.pos + 1 == segments.len()
    }
}


/// A subtree walk result.
enum Walk<'a> {
    Found(Vec<&'a str>),
    NotFound(Cursor),
}


impl Path {
    /// Finds the first element matching the path and extracts its values.
    ///
    /// Elements are visited depth-first in document order, starting from `root`.
    /// The walk stops at the first match.
    ///
    /// # Examples
    ///
    /// ```
    /// use xmlpick::{Document, Mode, Path};
    ///
    /// let doc = Document::parse("<a><b><c>1</c><d><e>2</e></d></b></a>").unwrap();
    /// let path = Path::parse("a/b").unwrap();
    ///
    /// assert_eq!(path.select(doc.root_element(), Mode::Shallow), ["1"]);
    /// assert_eq!(path.select(doc.root_element(), Mode::Recursive), ["1", "2"]);
    /// ```
    pub fn select<'a>(&self, root: &'a Node, mode: Mode) -> Vec<&'a str> {
        let walker = Walker { segments: self.segments(), mode };
        match walker.visit(root, Cursor::new(walker.segments)) {
            Walk::Found(values) => values,
            Walk::NotFound(_) => Vec::new(),
        }
    }
}


struct Walker<'p> {
    segments: &'p [Segment],
    mode: Mode,
}

impl<'p> Walker<'p> {
    fn visit<'a>(&self, node: &'a Node, mut cursor: Cursor) -> Walk<'a> {
        let segment = &self.segments[cursor.pos];

        match cursor.skip {
            Some(skip) if node.name() == segment.name() => {
                if skip != 0 {
                    trace!("skipped <{}>, {} more to go", node.name(), skip - 1);
                    cursor.skip = Some(skip - 1);
                } else if cursor.is_last(self.segments) {
                    // Reached, but the node itself still has to pass the terminal test,
                    // which also takes the text after `]` into account.
                    cursor.skip = None;
                } else {
                    trace!("descended into <{}> via '{}'", node.name(), segment);
                    cursor = cursor.advance(self.segments);
                }
            }
            Some(_) => {}
            None => {
                if !cursor.is_last(self.segments)
                    && segment.is_plain()
                    && node.name() == segment.name()
                {
                    trace!("descended into <{}>", node.name());
                    cursor = cursor.advance(self.segments);
                }
            }
        }

        let segment = &self.segments[cursor.pos];
        if cursor.skip.is_none()
            && cursor.is_last(self.segments)
            && node.name() == segment.target()
        {
            debug!("matched <{}> at byte {}", node.name(), node.pos());
            let values = match segment.attribute() {
                Some(attr) => attribute_values(node, attr),
                None => match self.mode {
                    Mode::Shallow => shallow_values(node),
                    Mode::Recursive => recursive_values(node),
                },
            };

            return Walk::Found(values);
        }

        for child in node.children() {
            match self.visit(child, cursor) {
                Walk::Found(values) => return Walk::Found(values),
                Walk::NotFound(c) => cursor = c,
            }
        }

        Walk::NotFound(cursor)
    }
}


fn shallow_values<'a>(node: &'a Node) -> Vec<&'a str> {
    if node.is_leaf() {
        return vec![node.text()];
    }

    node.children().filter(|n| n.is_leaf()).map(|n| n.text()).collect()
}

fn recursive_values<'a>(node: &'a Node) -> Vec<&'a str> {
    node.descendants().filter(|n| n.is_leaf()).map(|n| n.text()).collect()
}

// The attribute is always looked up on the matched node, even when
// it's repeated once per leaf child.
fn attribute_values<'a>(node: &'a Node, attr: &str) -> Vec<&'a str> {
    let value = node.attribute(attr).unwrap_or("");

    if node.is_leaf() {
        return vec![value];
    }

    node.children().filter(|n| n.is_leaf()).map(|_| value).collect()
}
