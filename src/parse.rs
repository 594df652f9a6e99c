use std::borrow::Cow;
use std::mem;
use std::str;

use log::trace;
use thiserror::Error;
use xmlparser::{
    self,
    ElementEnd,
    EntityDefinition,
    Reference,
    Stream,
    StreamError,
    StrSpan,
    TextPos,
    Token,
};

use crate::{
    Attribute,
    Document,
    Node,
};

const ENTITY_DEPTH: u8 = 10;


/// A list of all possible errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The input is not a valid UTF-8 text.
    #[error("the input is not a valid UTF-8 text: {0}")]
    InvalidUtf8(#[from] str::Utf8Error),

    /// Incorrect tree structure.
    #[allow(missing_docs)]
    #[error("expected '{expected}' tag, not '{actual}' at {pos}")]
    UnexpectedCloseTag { expected: String, actual: String, pos: TextPos },

    /// A reference to an entity that was not defined in the DTD.
    #[error("unknown entity reference '{0}' at {1}")]
    UnknownEntityReference(String, TextPos),

    /// A possible entity reference loop.
    #[error("a possible entity reference loop is detected at {0}")]
    EntityReferenceLoop(TextPos),

    /// The document has a DTD, but [`ParsingOptions::allow_dtd`] is not set.
    ///
    /// [`ParsingOptions::allow_dtd`]: struct.ParsingOptions.html#structfield.allow_dtd
    #[error("a DTD is not allowed")]
    DtdDetected,

    /// Elements are nested deeper than [`ParsingOptions::max_depth`].
    ///
    /// [`ParsingOptions::max_depth`]: struct.ParsingOptions.html#structfield.max_depth
    #[error("element nesting is deeper than {0} at {1}")]
    DepthLimitReached(u32, TextPos),

    /// The root element was opened but never closed.
    #[error("the root element was opened but never closed")]
    UnclosedRootNode,

    /// The XML document must have at least one element.
    #[error("the document does not have a root node")]
    NoRootNode,

    /// A path segment has an index that doesn't fit into `usize`.
    #[error("invalid index in path segment '{0}'")]
    InvalidPathIndex(String),

    /// Errors detected by the `xmlparser` crate.
    #[error("{0}")]
    ParserError(#[from] xmlparser::Error),
}


/// Parsing options.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ParsingOptions {
    /// Allow DTD parsing.
    ///
    /// Internal entities declared in the DTD are used to resolve
    /// references in attribute values.
    ///
    /// Default: true
    pub allow_dtd: bool,

    /// The maximum element nesting depth.
    ///
    /// Both decoding and path matching recurse per nesting level.
    ///
    /// Default: 256
    pub max_depth: u32,
}

impl Default for ParsingOptions {
    fn default() -> Self {
        ParsingOptions {
            allow_dtd: true,
            max_depth: 256,
        }
    }
}


impl<'d> Document<'d> {
    /// Parses the input XML string.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = xmlpick::Document::parse("<e><a/></e>").unwrap();
    /// assert_eq!(doc.descendants().count(), 2);
    /// ```
    pub fn parse(text: &str) -> Result<Document, Error> {
        parse(text, ParsingOptions::default())
    }

    /// Parses the input XML string using the specified options.
    pub fn parse_with_options(text: &str, opt: ParsingOptions) -> Result<Document, Error> {
        parse(text, opt)
    }

    /// Parses the input XML bytes.
    ///
    /// The data must be a valid UTF-8 text.
    pub fn from_bytes(data: &[u8]) -> Result<Document, Error> {
        parse(str::from_utf8(data)?, ParsingOptions::default())
    }
}

struct Entity<'d> {
    name: &'d str,
    value: StrSpan<'d>,
}

struct OpenElement<'d> {
    prefix: &'d str,
    node: Node<'d>,
    content_start: usize,
}

#[derive(Clone, Copy)]
struct TagNameSpan<'d> {
    prefix: StrSpan<'d>,
    name: StrSpan<'d>,
}

/// Maps positions inside the tokenized text back to the whole document.
#[derive(Clone, Copy)]
struct Origin<'d> {
    text: &'d str,
    offset: usize,
}

impl<'d> Origin<'d> {
    fn body(&self) -> &'d str {
        &self.text[self.offset..]
    }

    fn text_pos(&self, pos: usize) -> TextPos {
        text_pos_at(self.text, self.offset + pos)
    }

    /// Moves a position reported by the tokenizer, which only sees `body()`,
    /// past the skipped whitespace.
    fn shift_pos(&self, pos: TextPos) -> TextPos {
        let skipped = &self.text[..self.offset];
        let rows = skipped.bytes().filter(|c| *c == b'\n').count() as u32;

        if pos.row != 1 {
            return TextPos::new(pos.row + rows, pos.col);
        }

        let last_line = match skipped.rfind('\n') {
            Some(idx) => &skipped[idx + 1..],
            None => skipped,
        };

        TextPos::new(pos.row + rows, pos.col + last_line.chars().count() as u32)
    }

    fn shift_stream_error(&self, e: StreamError) -> StreamError {
        match e {
            StreamError::NonXmlChar(c, pos) => {
                StreamError::NonXmlChar(c, self.shift_pos(pos))
            }
            StreamError::InvalidChar(actual, expected, pos) => {
                StreamError::InvalidChar(actual, expected, self.shift_pos(pos))
            }
            StreamError::InvalidCharMultiple(actual, expected, pos) => {
                StreamError::InvalidCharMultiple(actual, expected, self.shift_pos(pos))
            }
            StreamError::InvalidQuote(c, pos) => {
                StreamError::InvalidQuote(c, self.shift_pos(pos))
            }
            StreamError::InvalidSpace(c, pos) => {
                StreamError::InvalidSpace(c, self.shift_pos(pos))
            }
            StreamError::InvalidString(expected, pos) => {
                StreamError::InvalidString(expected, self.shift_pos(pos))
            }
            _ => e,
        }
    }

    fn shift_error(&self, e: xmlparser::Error) -> Error {
        if self.offset == 0 {
            return Error::ParserError(e);
        }

        use xmlparser::Error as E;
        let e = match e {
            E::InvalidDeclaration(c, pos) => {
                E::InvalidDeclaration(self.shift_stream_error(c), self.shift_pos(pos))
            }
            E::InvalidComment(c, pos) => {
                E::InvalidComment(self.shift_stream_error(c), self.shift_pos(pos))
            }
            E::InvalidPI(c, pos) => {
                E::InvalidPI(self.shift_stream_error(c), self.shift_pos(pos))
            }
            E::InvalidDoctype(c, pos) => {
                E::InvalidDoctype(self.shift_stream_error(c), self.shift_pos(pos))
            }
            E::InvalidEntity(c, pos) => {
                E::InvalidEntity(self.shift_stream_error(c), self.shift_pos(pos))
            }
            E::InvalidElement(c, pos) => {
                E::InvalidElement(self.shift_stream_error(c), self.shift_pos(pos))
            }
            E::InvalidAttribute(c, pos) => {
                E::InvalidAttribute(self.shift_stream_error(c), self.shift_pos(pos))
            }
            E::InvalidCdata(c, pos) => {
                E::InvalidCdata(self.shift_stream_error(c), self.shift_pos(pos))
            }
            E::InvalidCharData(c, pos) => {
                E::InvalidCharData(self.shift_stream_error(c), self.shift_pos(pos))
            }
            E::UnknownToken(pos) => E::UnknownToken(self.shift_pos(pos)),
        };

        Error::ParserError(e)
    }
}

struct ParserData<'d> {
    opt: ParsingOptions,
    origin: Origin<'d>,
    tag_name: Option<TagNameSpan<'d>>,
    tmp_attrs: Vec<Attribute<'d>>,
    entities: Vec<Entity<'d>>,
    buffer: TextBuffer,
    stack: Vec<OpenElement<'d>>,
    root: Option<Node<'d>>,
}

fn parse(text: &str, opt: ParsingOptions) -> Result<Document, Error> {
    // Leading whitespace before the XML declaration is tolerated.
    let body = text.trim_start_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r'));
    let offset = text.len() - body.len();

    let mut pd = ParserData {
        opt,
        origin: Origin { text, offset },
        tag_name: None,
        tmp_attrs: Vec::new(),
        entities: Vec::new(),
        buffer: TextBuffer::new(),
        stack: Vec::new(),
        root: None,
    };

    process_tokens(&mut pd)?;

    if !pd.stack.is_empty() {
        return Err(Error::UnclosedRootNode);
    }

    match pd.root {
        Some(root) => Ok(Document { text, root }),
        None => Err(Error::NoRootNode),
    }
}

fn process_tokens<'d>(pd: &mut ParserData<'d>) -> Result<(), Error> {
    for token in xmlparser::Tokenizer::from(pd.origin.body()) {
        let origin = pd.origin;
        match token.map_err(|e| origin.shift_error(e))? {
            Token::DtdStart { .. } | Token::EmptyDtd { .. } => {
                if !pd.opt.allow_dtd {
                    return Err(Error::DtdDetected);
                }
            }
            Token::EntityDeclaration { name, definition, .. } => {
                if let EntityDefinition::EntityValue(value) = definition {
                    trace!("declared entity '{}'", name.as_str());
                    pd.entities.push(Entity { name: name.as_str(), value });
                }
            }
            Token::ElementStart { prefix, local, span } => {
                if pd.stack.len() as u32 >= pd.opt.max_depth {
                    let pos = pd.origin.text_pos(span.start());
                    return Err(Error::DepthLimitReached(pd.opt.max_depth, pos));
                }

                pd.tag_name = Some(TagNameSpan { prefix, name: local });
            }
            Token::Attribute { local, value, .. } => {
                let value = normalize_attribute(value, &pd.entities, pd.origin, &mut pd.buffer)?;
                pd.tmp_attrs.push(Attribute { name: local.as_str(), value });
            }
            Token::ElementEnd { end, span } => {
                process_element(end, span, pd)?;

                // Only the first root element is decoded.
                if pd.root.is_some() {
                    break;
                }
            }
            Token::Text { text } => {
                if !pd.stack.is_empty() {
                    check_references(text, pd)?;
                }
            }
            _ => {}
        }
    }

    Ok(())
}

fn process_element<'d>(
    end: ElementEnd<'d>,
    span: StrSpan<'d>,
    pd: &mut ParserData<'d>,
) -> Result<(), Error> {
    match end {
        ElementEnd::Empty => {
            let tag_name = take_tag_name(pd, span)?;
            let node = new_node(tag_name, "", pd);
            append_node(node, pd);
        }
        ElementEnd::Open => {
            let tag_name = take_tag_name(pd, span)?;
            let node = new_node(tag_name, "", pd);
            pd.stack.push(OpenElement {
                prefix: tag_name.prefix.as_str(),
                node,
                content_start: span.end(),
            });
        }
        ElementEnd::Close(prefix, local) => {
            let pos = pd.origin.text_pos(span.start());
            let mut open = match pd.stack.pop() {
                Some(v) => v,
                None => {
                    return Err(Error::UnexpectedCloseTag {
                        expected: String::new(),
                        actual: gen_qname_string(prefix.as_str(), local.as_str()),
                        pos,
                    });
                }
            };

            if prefix.as_str() != open.prefix || local.as_str() != open.node.name {
                return Err(Error::UnexpectedCloseTag {
                    expected: gen_qname_string(open.prefix, open.node.name),
                    actual: gen_qname_string(prefix.as_str(), local.as_str()),
                    pos,
                });
            }

            // `span` starts at `</`, so the slice is the raw inner markup.
            open.node.text = &pd.origin.body()[open.content_start..span.start()];
            append_node(open.node, pd);
        }
    }

    Ok(())
}

fn take_tag_name<'d>(
    pd: &mut ParserData<'d>,
    span: StrSpan<'d>,
) -> Result<TagNameSpan<'d>, Error> {
    match pd.tag_name.take() {
        Some(v) => Ok(v),
        None => {
            // Should be already checked by the xmlparser.
            let pos = pd.origin.text_pos(span.start());
            Err(Error::UnexpectedCloseTag {
                expected: String::new(),
                actual: span.as_str().to_string(),
                pos,
            })
        }
    }
}

fn new_node<'d>(tag_name: TagNameSpan<'d>, text: &'d str, pd: &mut ParserData<'d>) -> Node<'d> {
    Node {
        name: tag_name.name.as_str(),
        text,
        attributes: mem::take(&mut pd.tmp_attrs),
        children: Vec::new(),
        pos: pd.origin.offset + orig_pos_from_tag_name(&tag_name),
    }
}

fn append_node<'d>(node: Node<'d>, pd: &mut ParserData<'d>) {
    match pd.stack.last_mut() {
        Some(parent) => parent.node.children.push(node),
        None => pd.root = Some(node),
    }
}

/// Makes sure that all references inside an element text can be resolved.
///
/// The text itself is kept raw.
fn check_references(text: StrSpan, pd: &ParserData) -> Result<(), Error> {
    if !text.as_str().contains('&') {
        return Ok(());
    }

    let mut s = Stream::from(text.as_str());
    while !s.at_end() {
        if s.curr_byte_unchecked() != b'&' {
            s.advance(1);
            continue;
        }

        let start = text.start() + s.pos();
        match s.try_consume_reference() {
            Some(Reference::Entity(name)) => {
                if !pd.entities.iter().any(|e| e.name == name) {
                    let pos = pd.origin.text_pos(start);
                    return Err(Error::UnknownEntityReference(name.into(), pos));
                }
            }
            Some(Reference::Char(_)) => {}
            None => s.advance(1),
        }
    }

    Ok(())
}

// https://www.w3.org/TR/REC-xml/#AVNormalize
fn normalize_attribute<'d>(
    text: StrSpan<'d>,
    entities: &[Entity<'d>],
    origin: Origin<'d>,
    buffer: &mut TextBuffer,
) -> Result<Cow<'d, str>, Error> {
    if is_normalization_required(&text) {
        buffer.clear();
        _normalize_attribute(text, entities, 0, origin, buffer)?;
        Ok(Cow::Owned(buffer.to_str().to_owned()))
    } else {
        Ok(Cow::Borrowed(text.as_str()))
    }
}

fn is_normalization_required(text: &StrSpan) -> bool {
    // We assume that `&` indicates an entity or a character reference.
    // But in rare cases it can be just an another character.

    fn check(c: u8) -> bool {
        matches!(c, b'&' | b'\t' | b'\n' | b'\r')
    }

    text.as_str().bytes().any(check)
}

fn _normalize_attribute(
    text: StrSpan,
    entities: &[Entity],
    entity_depth: u8,
    origin: Origin,
    buffer: &mut TextBuffer,
) -> Result<(), Error> {
    let mut s = Stream::from(text.as_str());
    while !s.at_end() {
        // Safe, because we already checked that the stream is not at the end.
        let c = s.curr_byte_unchecked();

        if c != b'&' {
            s.advance(1);
            buffer.push_from_attr(c, s.curr_byte().ok());
            continue;
        }

        // Check for character/entity references.
        let start = text.start() + s.pos();
        match s.try_consume_reference() {
            Some(Reference::Char(ch)) => {
                let mut buf = [0; 4];
                for &b in ch.encode_utf8(&mut buf).as_bytes() {
                    if entity_depth > 0 {
                        buffer.push_from_attr(b, None);
                    } else {
                        // Characters not from entity should be added as is.
                        buffer.push_raw(b);
                    }
                }
            }
            Some(Reference::Entity(name)) => {
                if entity_depth > ENTITY_DEPTH {
                    return Err(Error::EntityReferenceLoop(origin.text_pos(start)));
                }

                match entities.iter().find(|e| e.name == name) {
                    Some(entity) => {
                        _normalize_attribute(entity.value, entities, entity_depth + 1,
                                             origin, buffer)?;
                    }
                    None => {
                        let pos = origin.text_pos(start);
                        return Err(Error::UnknownEntityReference(name.into(), pos));
                    }
                }
            }
            None => {
                s.advance(1);
                buffer.push_from_attr(c, s.curr_byte().ok());
            }
        }
    }

    Ok(())
}

fn gen_qname_string(prefix: &str, local: &str) -> String {
    if prefix.is_empty() {
        local.to_string()
    } else {
        format!("{}:{}", prefix, local)
    }
}

fn orig_pos_from_tag_name(tag_name: &TagNameSpan) -> usize {
    let span = if tag_name.prefix.is_empty() { tag_name.name } else { tag_name.prefix };
    span.start() - 1 // jump before '<'
}

pub(crate) fn text_pos_at(text: &str, pos: usize) -> TextPos {
    Stream::from(text).gen_text_pos_from(pos)
}


mod internals {
    pub struct TextBuffer {
        buf: Vec<u8>,
    }

    impl TextBuffer {
        pub fn new() -> Self {
            TextBuffer {
                buf: Vec::with_capacity(32),
            }
        }

        pub fn push_raw(&mut self, c: u8) {
            self.buf.push(c);
        }

        pub fn push_from_attr(&mut self, mut c: u8, c2: Option<u8>) {
            // \r in \r\n should be ignored.
            if c == b'\r' && c2 == Some(b'\n') {
                return;
            }

            // \n, \r and \t should be converted into spaces.
            c = match c {
                b'\n' | b'\r' | b'\t' => b' ',
                _ => c,
            };

            self.buf.push(c);
        }

        pub fn clear(&mut self) {
            self.buf.clear();
        }

        pub fn to_str(&self) -> &str {
            // The buffer always holds whole characters of a valid UTF-8 string.
            std::str::from_utf8(&self.buf).unwrap_or_default()
        }
    }
}

use self::internals::*;
