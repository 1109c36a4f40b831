//! Markup codec for GMP commands and responses.
//!
//! Commands and responses share one generic tree, [`Element`]. A command is
//! written as a single document whose root is the verb; a response is read as
//! a single document and ends when its root element closes, which is the only
//! framing the protocol has.
//!
//! Command parameters are given as `(key, Value)` pairs. Keys starting with
//! `@` become attributes of the enclosing element, the key `#text` becomes its
//! text content, and any other key becomes a child element.

use std::io::BufRead;

use quick_xml::{
    events::{BytesEnd, BytesStart, BytesText, Event},
    Reader, Writer,
};

use crate::error::{Fault, GmpError};

/// Reserved parameter key for text content
pub const TEXT_KEY: &str = "#text";

/// Prefix marking a parameter key as an attribute
pub const ATTRIBUTE_PREFIX: char = '@';

/// A node of a markup document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name:       String,
    /// Attributes in document order
    pub attributes: Vec<(String, String)>,
    pub text:       Option<String>,
    pub children:   Vec<Element>,
}

impl Element {
    /// An element with no attributes, text or children
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds an attribute, replacing an existing one with the same name
    pub fn with_attribute<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.set_attribute(key.into(), value.into());
        self
    }

    /// Sets the text content
    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Appends a child element
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    fn set_attribute(&mut self, key: String, value: String) {
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Value of the attribute named `key`
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Text content, if any
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// First child named `name`
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children named `name`, in document order
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text of the first child named `name`
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(Element::text)
    }
}

/// A parameter value of a [`Command`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Text content of a child element, or an attribute value
    Text(String),
    /// A child element built from nested parameters
    Map(Vec<(String, Value)>),
    /// Repeated sibling elements sharing one key
    List(Vec<Value>),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<(String, Value)>> for Value {
    fn from(entries: Vec<(String, Value)>) -> Self {
        Value::Map(entries)
    }
}

/// Builds a [`Value::Map`] from `(key, value)` pairs
pub fn map<K, V, I>(entries: I) -> Value
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
}

/// An immutable protocol request: a verb plus its parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    root: Element,
}

impl Command {
    /// Builds a command from `verb` and its parameters.
    ///
    /// Fails when a key is not a usable element or attribute name, or when an
    /// attribute or text key carries a nested value.
    pub fn new<I, K, V>(verb: &str, params: I) -> Result<Self, GmpError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        check_name(verb)?;
        let mut root = Element::new(verb);
        for (key, value) in params {
            apply_param(&mut root, key.into(), value.into())?;
        }
        Ok(Self { root })
    }

    /// A command with no parameters
    pub fn bare(verb: &str) -> Result<Self, GmpError> {
        Self::new(verb, std::iter::empty::<(String, Value)>())
    }

    /// Name of the root element
    pub fn verb(&self) -> &str {
        &self.root.name
    }

    /// The root element as it will be encoded
    pub fn root(&self) -> &Element {
        &self.root
    }
}

impl TryFrom<Element> for Command {
    type Error = GmpError;

    /// Wraps a prebuilt tree once every element and attribute name in it is
    /// valid
    fn try_from(root: Element) -> Result<Self, Self::Error> {
        check_tree(&root)?;
        Ok(Self { root })
    }
}

fn check_tree(element: &Element) -> Result<(), GmpError> {
    check_name(&element.name)?;
    for (key, _) in &element.attributes {
        check_name(key)?;
    }
    element.children.iter().try_for_each(check_tree)
}

fn apply_param(element: &mut Element, key: String, value: Value) -> Result<(), GmpError> {
    if key == TEXT_KEY {
        let Value::Text(text) = value else {
            return Err(GmpError::Protocol(format!(
                "{TEXT_KEY} of <{}> must be text",
                element.name
            )));
        };
        element.text = Some(text);
        return Ok(());
    }

    if let Some(attr) = key.strip_prefix(ATTRIBUTE_PREFIX) {
        check_name(attr)?;
        let Value::Text(text) = value else {
            return Err(GmpError::Protocol(format!(
                "attribute {attr} of <{}> must be text",
                element.name
            )));
        };
        element.set_attribute(attr.to_string(), text);
        return Ok(());
    }

    check_name(&key)?;
    match value {
        Value::Text(text) => element.children.push(Element::new(key).with_text(text)),
        Value::Map(entries) => {
            let mut child = Element::new(key);
            for (k, v) in entries {
                apply_param(&mut child, k, v)?;
            }
            element.children.push(child);
        }
        Value::List(items) => {
            for item in items {
                apply_param(element, key.clone(), item)?;
            }
        }
    }
    Ok(())
}

fn check_name(name: &str) -> Result<(), GmpError> {
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(GmpError::Protocol(format!("invalid element name: {name:?}")))
    }
}

/// Serializes a command into a markup document
pub fn encode(command: &Command) -> Result<Vec<u8>, GmpError> {
    let mut writer = Writer::new(Vec::new());
    write_element(&mut writer, &command.root)
        .map_err(|e| GmpError::Protocol(format!("failed to encode <{}>: {e}", command.verb())))?;
    Ok(writer.into_inner())
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> quick_xml::Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    let text = element.text.as_deref().filter(|t| !t.is_empty());
    if text.is_none() && element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    if let Some(text) = text {
        writer.write_event(Event::Text(BytesText::new(text)))?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}

/// A decoded response: exactly one of payload or fault
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Root element of a 2xx response
    Success(Element),
    /// Classified non-success status
    Fault(Fault),
}

impl Response {
    /// Classifies a parsed document by its root `status` attribute.
    ///
    /// A root without a status is treated as success.
    pub fn from_element(root: Element) -> Result<Self, GmpError> {
        let Some(status) = root.attribute("status") else {
            return Ok(Response::Success(root));
        };
        let status: u16 = status.trim().parse().map_err(|_| {
            GmpError::MalformedResponse(format!("invalid status {status:?} on <{}>", root.name))
        })?;
        if (200..300).contains(&status) {
            return Ok(Response::Success(root));
        }
        Ok(Response::Fault(Fault {
            status,
            status_text: root.attribute("status_text").unwrap_or_default().to_string(),
            message:     root.text.clone(),
        }))
    }

    /// True for a non-success response
    pub fn is_fault(&self) -> bool {
        matches!(self, Response::Fault(_))
    }

    /// Splits into the success payload or the fault
    pub fn into_result(self) -> Result<Element, Fault> {
        match self {
            Response::Success(root) => Ok(root),
            Response::Fault(fault) => Err(fault),
        }
    }
}

/// Reads exactly one response document from `reader`
pub fn decode<R: BufRead>(reader: R) -> Result<Response, GmpError> {
    let root = read_document(reader)?;
    Response::from_element(root)
}

/// Decodes a response held in memory
pub fn decode_slice(bytes: &[u8]) -> Result<Response, GmpError> {
    decode(bytes)
}

/// Parses one document into an [`Element`] tree, stopping after the root closes
pub fn read_document<R: BufRead>(reader: R) -> Result<Element, GmpError> {
    let mut reader = Reader::from_reader(reader);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| match e {
            quick_xml::Error::Io(io) => GmpError::Transport(format!("read failed: {io}")),
            other => GmpError::MalformedResponse(format!(
                "at byte {}: {other}",
                reader.buffer_position()
            )),
        })?;

        match event {
            Event::Start(start) => stack.push(open_element(&start)?),
            Event::Empty(start) => {
                let element = open_element(&start)?;
                if let Some(done) = close_element(&mut stack, element) {
                    return Ok(done);
                }
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| {
                    GmpError::MalformedResponse("unexpected closing tag".into())
                })?;
                if let Some(done) = close_element(&mut stack, element) {
                    return Ok(done);
                }
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| GmpError::MalformedResponse(format!("bad text: {e}")))?;
                append_text(&mut stack, &text)?;
            }
            Event::CData(data) => {
                let text = std::str::from_utf8(&data)
                    .map_err(|e| GmpError::MalformedResponse(format!("bad CDATA: {e}")))?
                    .to_string();
                append_text(&mut stack, &text)?;
            }
            Event::Eof => {
                return Err(GmpError::MalformedResponse(if stack.is_empty() {
                    "no root element".into()
                } else {
                    format!("document truncated inside <{}>", stack[stack.len() - 1].name)
                }));
            }
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
        }
        buf.clear();
    }
}

fn open_element(start: &BytesStart<'_>) -> Result<Element, GmpError> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| GmpError::MalformedResponse(format!("bad element name: {e}")))?
        .to_string();
    let mut element = Element::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| GmpError::MalformedResponse(format!("bad attribute: {e}")))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| GmpError::MalformedResponse(format!("bad attribute name: {e}")))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| GmpError::MalformedResponse(format!("bad attribute value: {e}")))?
            .into_owned();
        element.set_attribute(key, value);
    }
    Ok(element)
}

/// Attaches `element` to its parent, or returns it when it is the root
fn close_element(stack: &mut [Element], element: Element) -> Option<Element> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            None
        }
        None => Some(element),
    }
}

fn append_text(stack: &mut [Element], text: &str) -> Result<(), GmpError> {
    if text.is_empty() {
        return Ok(());
    }
    let current = stack
        .last_mut()
        .ok_or_else(|| GmpError::MalformedResponse("text outside the root element".into()))?;
    current.text.get_or_insert_with(String::new).push_str(text);
    Ok(())
}
