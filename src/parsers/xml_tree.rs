//! A small element tree over quick-xml events
//!
//! KML and GML readers walk the document by local name, ignoring namespace
//! prefixes. Text and CDATA are concatenated per element.

use log::trace;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::errors::{GeoError, GeoResult};

/// One XML element with its attributes, text and children
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    /// Local name, without namespace prefix
    pub name: String,
    /// Attributes keyed by local name
    pub attributes: Vec<(String, String)>,
    /// Concatenated text content of this element only
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    fn from_start(start: &BytesStart, format: &'static str) -> GeoResult<XmlElement> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| GeoError::document(format, format!("bad attribute on <{}>: {}", name, e)))?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.unescape_value()
                .map_err(|e| GeoError::document(format, format!("bad attribute value on <{}>: {}", name, e)))?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(XmlElement { name, attributes, text: String::new(), children: Vec::new() })
    }

    /// Parse a document and return its root element
    ///
    /// # Arguments
    /// * `xml` - The document text
    /// * `format` - Format name reported in errors ("kml", "gml")
    pub fn parse(xml: &str, format: &'static str) -> GeoResult<XmlElement> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => stack.push(Self::from_start(&e, format)?),
                Ok(Event::Empty(e)) => {
                    let element = Self::from_start(&e, format)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => root = Some(element),
                    }
                }
                Ok(Event::Text(e)) => {
                    let text = e.unescape()
                        .map_err(|err| GeoError::document(format, format!("bad text: {}", err)))?;
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text);
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&e));
                    }
                }
                Ok(Event::End(_)) => {
                    let finished = stack.pop()
                        .ok_or_else(|| GeoError::document(format, "unbalanced closing tag"))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(finished),
                        None => root = Some(finished),
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(GeoError::document(
                        format,
                        format!("malformed XML at position {}: {}", reader.buffer_position(), e),
                    ));
                }
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(GeoError::document(format, format!("unclosed element <{}>", stack[stack.len() - 1].name)));
        }
        let root = root.ok_or_else(|| GeoError::document(format, "document has no root element"))?;
        trace!("Parsed {} tree rooted at <{}>", format, root.name);
        Ok(root)
    }

    /// Attribute value by local name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    /// First direct child with this local name
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Direct children with this local name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First descendant (depth-first, self excluded) with this local name
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    /// All descendants with this local name, in document order
    ///
    /// Matching elements are not searched further, so nested placemarks
    /// inside a matched element are not returned twice.
    pub fn find_all(&self, name: &str) -> Vec<&XmlElement> {
        let mut out = Vec::new();
        self.collect(name, &mut out);
        out
    }

    fn collect<'a>(&'a self, name: &str, out: &mut Vec<&'a XmlElement>) {
        for child in &self.children {
            if child.name == name {
                out.push(child);
            } else {
                child.collect(name, out);
            }
        }
    }

    /// Trimmed text of this element
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// Trimmed text of the first direct child with this name
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text()).filter(|t| !t.is_empty())
    }
}
