//! In-memory XML element tree.
//!
//! A document is an unnamed [`XmlNode`] whose children are the top-level
//! elements, so files with several sibling roots (as settings files have)
//! round-trip unchanged.

use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::{Error, Result};

/// An XML element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    /// Tag name of the element (empty for a document).
    pub name: String,
    /// Text content.
    pub text: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    /// Child elements.
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// Create a new element with the given tag name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Create an empty document.
    pub fn document() -> Self {
        Self::default()
    }

    /// Add an attribute.
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Add a child element.
    pub fn child(mut self, child: XmlNode) -> Self {
        self.children.push(child);
        self
    }

    /// Set the text content.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Get an attribute value.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing an existing one with the same key.
    pub fn set_attribute(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, slot)) => *slot = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    /// First child with the given name.
    pub fn find_child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// First child with the given name, appended if missing.
    pub fn child_or_insert(&mut self, name: &str) -> &mut XmlNode {
        match self.children.iter().position(|c| c.name == name) {
            Some(index) => &mut self.children[index],
            None => {
                self.children.push(XmlNode::new(name));
                let last = self.children.len() - 1;
                &mut self.children[last]
            }
        }
    }

    /// Parse XML text into a document node.
    pub fn parse_document(xml: &str) -> Result<XmlNode> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack = vec![XmlNode::document()];

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => stack.push(element(&e)?),
                Ok(Event::Empty(e)) => {
                    let node = element(&e)?;
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(node);
                    }
                }
                Ok(Event::End(_)) => {
                    if stack.len() > 1 {
                        if let Some(node) = stack.pop() {
                            if let Some(parent) = stack.last_mut() {
                                parent.children.push(node);
                            }
                        }
                    }
                }
                Ok(Event::Text(e)) => {
                    let text = e.unescape().map_err(|e| Error::Xml(e.to_string()))?;
                    if let Some(node) = stack.last_mut() {
                        node.text.push_str(text.trim());
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(node) = stack.last_mut() {
                        node.text.push_str(&String::from_utf8_lossy(&e));
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(Error::Xml(format!("XML parse error: {e}"))),
            }
        }

        if stack.len() != 1 {
            return Err(Error::Xml("unclosed element at end of input".to_string()));
        }
        stack
            .pop()
            .ok_or_else(|| Error::Xml("empty document stack".to_string()))
    }

    /// Parse XML text and return its first top-level element.
    pub fn parse(xml: &str) -> Result<XmlNode> {
        Self::parse_document(xml)?
            .children
            .into_iter()
            .next()
            .ok_or_else(|| Error::Xml("no root element found in XML".to_string()))
    }

    /// Write as XML with a declaration.
    ///
    /// A document node writes its children as siblings; an element writes
    /// itself.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut xml_writer = Writer::new_with_indent(writer, b' ', 2);
        xml_writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(|e| Error::Xml(e.to_string()))?;

        if self.name.is_empty() {
            for child in &self.children {
                write_element(&mut xml_writer, child)?;
            }
        } else {
            write_element(&mut xml_writer, self)?;
        }
        Ok(())
    }

    /// Write as an XML string.
    pub fn to_xml_string(&self) -> Result<String> {
        let mut output = Vec::new();
        self.write_to(&mut output)?;
        String::from_utf8(output).map_err(|e| Error::Xml(e.to_string()))
    }
}

fn element(start: &BytesStart<'_>) -> Result<XmlNode> {
    let mut node = XmlNode::new(String::from_utf8_lossy(start.name().as_ref()));

    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::Xml(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::Xml(e.to_string()))?
            .into_owned();
        node.attributes.push((key, value));
    }
    Ok(node)
}

fn write_element<W: Write>(writer: &mut Writer<W>, node: &XmlNode) -> Result<()> {
    let mut elem = BytesStart::new(node.name.as_str());
    for (key, value) in &node.attributes {
        elem.push_attribute((key.as_str(), value.as_str()));
    }

    if node.children.is_empty() && node.text.is_empty() {
        return writer
            .write_event(Event::Empty(elem))
            .map_err(|e| Error::Xml(e.to_string()));
    }

    writer
        .write_event(Event::Start(elem))
        .map_err(|e| Error::Xml(e.to_string()))?;

    if !node.text.is_empty() {
        writer
            .write_event(Event::Text(BytesText::new(&node.text)))
            .map_err(|e| Error::Xml(e.to_string()))?;
    }

    for child in &node.children {
        write_element(writer, child)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new(node.name.as_str())))
        .map_err(|e| Error::Xml(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested() {
        let xml = r#"<A>
            <B attr="1">
                <C/>
                <D attr="a &amp; b"/>
            </B>
            <E>text</E>
        </A>"#;

        let root = XmlNode::parse(xml).unwrap();
        assert_eq!(root.name, "A");
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].attribute("attr"), Some("1"));
        assert_eq!(root.children[0].children[1].attribute("attr"), Some("a & b"));
        assert_eq!(root.find_child("E").unwrap().text, "text");
    }

    #[test]
    fn test_multiple_top_level_elements() {
        let xml = "<?xml version=\"1.0\"?><!-- help --><common a=\"1\"/><zip b=\"2\"/>";
        let doc = XmlNode::parse_document(xml).unwrap();
        assert_eq!(doc.children.len(), 2);
        assert_eq!(doc.find_child("zip").unwrap().attribute("b"), Some("2"));
    }

    #[test]
    fn test_write_round_trip() {
        let mut root = XmlNode::new("Root").attr("version", "2");
        root.child_or_insert("Item").set_attribute("v", "<1>");
        root.child_or_insert("Item").set_attribute("v", "2");
        root.children.push(XmlNode::new("Text").with_text("a < b"));

        let xml = root.to_xml_string().unwrap();
        let parsed = XmlNode::parse(&xml).unwrap();
        assert_eq!(parsed, root);
        assert_eq!(parsed.children[0].attribute("v"), Some("2"));
    }

    #[test]
    fn test_parse_empty() {
        assert!(XmlNode::parse("").is_err());
        assert!(XmlNode::parse("<open>").is_err());
    }
}
