use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::tiles::{TileError, TileResult};

/// Small wrapper around [`Writer`] producing indented UTF-8 documents.
pub(crate) struct XmlBuilder {
    writer: Writer<Vec<u8>>,
}

impl XmlBuilder {
    /// Starts a document with an XML declaration.
    pub fn new() -> TileResult<Self> {
        let mut builder = Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        };
        builder.write(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        Ok(builder)
    }

    fn write(&mut self, event: Event<'_>) -> TileResult<()> {
        self.writer
            .write_event(event)
            .map_err(|e| TileError::XmlError(e.to_string()))
    }

    fn start_tag<'a>(name: &'a str, attrs: &[(&'a str, &'a str)]) -> BytesStart<'a> {
        let mut tag = BytesStart::new(name);
        for attr in attrs {
            tag.push_attribute(*attr);
        }
        tag
    }

    /// Writes `<name attrs>`, the children added by `children`, and `</name>`.
    pub fn element<F>(&mut self, name: &str, attrs: &[(&str, &str)], children: F) -> TileResult<()>
    where
        F: FnOnce(&mut Self) -> TileResult<()>,
    {
        self.write(Event::Start(Self::start_tag(name, attrs)))?;
        children(self)?;
        self.write(Event::End(BytesEnd::new(name)))
    }

    /// Writes `<name attrs>text</name>`, escaping `text`.
    pub fn text_element(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) -> TileResult<()> {
        self.write(Event::Start(Self::start_tag(name, attrs)))?;
        if !text.is_empty() {
            self.write(Event::Text(BytesText::new(text)))?;
        }
        self.write(Event::End(BytesEnd::new(name)))
    }

    /// Writes `<name attrs/>`.
    pub fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> TileResult<()> {
        self.write(Event::Empty(Self::start_tag(name, attrs)))
    }

    /// Returns the document text.
    pub fn finish(self) -> TileResult<String> {
        String::from_utf8(self.writer.into_inner()).map_err(|e| TileError::XmlError(e.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    use super::*;

    /// A parsed element, enough to assert on document structure.
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Node {
        pub name: String,
        pub attrs: Vec<(String, String)>,
        pub text: String,
        pub children: Vec<Node>,
    }

    impl Node {
        pub fn attr(&self, key: &str) -> Option<&str> {
            self.attrs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        }

        pub fn child(&self, name: &str) -> Option<&Node> {
            self.children.iter().find(|c| c.name == name)
        }

        pub fn all(&self, name: &str) -> Vec<&Node> {
            self.children.iter().filter(|c| c.name == name).collect()
        }

        /// Follows a `/` separated path of child names.
        pub fn path(&self, path: &str) -> Option<&Node> {
            path.split('/').try_fold(self, |node, name| node.child(name))
        }
    }

    fn node_from(e: &quick_xml::events::BytesStart<'_>) -> Node {
        Node {
            name: String::from_utf8_lossy(e.name().as_ref()).to_string(),
            attrs: e
                .attributes()
                .map(|a| {
                    let a = a.unwrap();
                    (
                        String::from_utf8_lossy(a.key.as_ref()).to_string(),
                        a.unescape_value().unwrap().to_string(),
                    )
                })
                .collect(),
            ..Default::default()
        }
    }

    /// Parses a document into a tree of qualified element names.
    pub fn parse(xml: &str) -> Node {
        let mut reader = Reader::from_str(xml);
        let mut stack = vec![Node::default()];
        loop {
            match reader.read_event().unwrap() {
                Event::Start(e) => stack.push(node_from(&e)),
                Event::Empty(e) => stack.last_mut().unwrap().children.push(node_from(&e)),
                Event::Text(t) => {
                    let text = t.unescape().unwrap();
                    stack.last_mut().unwrap().text.push_str(text.trim());
                }
                Event::End(_) => {
                    let node = stack.pop().unwrap();
                    stack.last_mut().unwrap().children.push(node);
                }
                Event::Eof => break,
                _ => {}
            }
        }
        stack.pop().unwrap().children.pop().unwrap()
    }

    #[test]
    fn nested_document() {
        let mut xml = XmlBuilder::new().unwrap();
        xml.element("Root", &[("version", "1.0")], |x| {
            x.text_element("Title", &[], "A & B")?;
            x.empty("Link", &[("href", "http://h/?a=1&b=2")])
        })
        .unwrap();
        let text = xml.finish().unwrap();
        assert!(text.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(text.contains("<Title>A &amp; B</Title>"));

        let root = parse(&text);
        assert_eq!(root.name, "Root");
        assert_eq!(root.attr("version"), Some("1.0"));
        assert_eq!(root.path("Title").unwrap().text, "A & B");
        assert_eq!(
            root.child("Link").unwrap().attr("href"),
            Some("http://h/?a=1&b=2")
        );
    }
}
