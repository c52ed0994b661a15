//! Owned XML element tree used for GPF graph documents.
//!
//! GPF graphs are small documents that get built up node by node, mutated in
//! place (sources wired after the fact, model attributes stamped onto
//! parameter elements) and finally pretty-printed, so an owned tree with
//! explicit `text`/`tail` slots fits better than streaming (de)serialization.
//! quick-xml does the actual reading and writing; `indent` reproduces the
//! whitespace layout that SNAP's own graph files use, byte for byte, since
//! persisted graphs are read and diffed by external tools.
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use thiserror::Error;

/// Errors encountered while reading or writing graph XML
#[derive(Debug, Error)]
pub enum XmlError {
    #[error("XML parse error: {0}")]
    Parse(#[from] quick_xml::Error),
    #[error("malformed attribute: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid UTF-8 in document: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("unexpected closing tag")]
    UnbalancedTag,
    #[error("document contains no root element")]
    NoRoot,
}

/// One XML element. `text` is the content before the first child, `tail` the
/// content between this element's closing tag and the next sibling; both are
/// whitespace-only in practice and owned by the indenter.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub text: Option<String>,
    pub tail: Option<String>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Element {
            tag: tag.into(),
            ..Element::default()
        }
    }

    pub fn with_text(tag: impl Into<String>, text: impl Into<String>) -> Self {
        let mut el = Element::new(tag);
        el.text = Some(text.into());
        el
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Sets an attribute, replacing any existing value for the same key.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.attrs.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.attrs.push((key, value));
        }
    }

    /// Appends a child and returns a mutable reference to it.
    pub fn push_child(&mut self, child: Element) -> &mut Element {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// First direct child with the given tag.
    pub fn find(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.tag == tag)
    }

    pub fn find_mut(&mut self, tag: &str) -> Option<&mut Element> {
        self.children.iter_mut().find(|c| c.tag == tag)
    }

    pub fn find_all<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    /// First direct child carrying the given attribute value.
    pub fn find_by_attr(&self, tag: &str, key: &str, value: &str) -> Option<&Element> {
        self.children
            .iter()
            .find(|c| c.tag == tag && c.attr(key) == Some(value))
    }

    pub fn find_by_attr_mut(&mut self, tag: &str, key: &str, value: &str) -> Option<&mut Element> {
        self.children
            .iter_mut()
            .find(|c| c.tag == tag && c.attr(key) == Some(value))
    }

    /// Descends through a `/`-separated path of tag names, first match at
    /// every step.
    pub fn find_path(&self, path: &str) -> Option<&Element> {
        let mut cur = self;
        for tag in path.split('/') {
            cur = cur.find(tag)?;
        }
        Some(cur)
    }

    pub fn find_path_mut(&mut self, path: &str) -> Option<&mut Element> {
        let mut cur = self;
        for tag in path.split('/') {
            cur = cur.find_mut(tag)?;
        }
        Some(cur)
    }

    /// Depth-first search for a descendant with the given tag.
    pub fn find_descendant_mut(&mut self, tag: &str) -> Option<&mut Element> {
        for child in &mut self.children {
            if child.tag == tag {
                return Some(child);
            }
            if let Some(found) = child.find_descendant_mut(tag) {
                return Some(found);
            }
        }
        None
    }

    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

/// Parses a complete document into an element tree. Whitespace-only text is
/// dropped; the indenter recreates it on output.
pub fn parse(xml: &str) -> Result<Element, XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(element_from_start(&start)?),
            Event::Empty(start) => {
                let el = element_from_start(&start)?;
                attach(&mut stack, &mut root, el);
            }
            Event::End(_) => {
                let el = stack.pop().ok_or(XmlError::UnbalancedTag)?;
                attach(&mut stack, &mut root, el);
            }
            Event::Text(t) => {
                if let Some(cur) = stack.last_mut() {
                    let piece = t.unescape()?;
                    match &mut cur.text {
                        Some(text) => text.push_str(&piece),
                        None => cur.text = Some(piece.into_owned()),
                    }
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions and CDATA do
            // not occur in GPF graphs and carry no graph semantics.
            _ => {}
        }
    }
    root.ok_or(XmlError::NoRoot)
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element, XmlError> {
    let mut el = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes() {
        let attr = attr?;
        el.attrs.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            attr.unescape_value()?.into_owned(),
        ));
    }
    Ok(el)
}

fn attach(stack: &mut Vec<Element>, root: &mut Option<Element>, el: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None => {
            if root.is_none() {
                *root = Some(el);
            }
        }
    }
}

/// Serializes the tree. `text` and `tail` are written literally, so the
/// output layout is exactly what `indent` produced.
pub fn to_string(root: &Element) -> Result<String, XmlError> {
    let mut writer = Writer::new(Vec::new());
    write_element(&mut writer, root)?;
    Ok(String::from_utf8(writer.into_inner())?)
}

fn write_element(writer: &mut Writer<Vec<u8>>, el: &Element) -> Result<(), XmlError> {
    let mut start = BytesStart::new(el.tag.as_str());
    for (key, value) in &el.attrs {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    let no_text = el.text.as_deref().is_none_or(str::is_empty);
    if el.children.is_empty() && no_text {
        writer.write_event(Event::Empty(start))?;
    } else {
        writer.write_event(Event::Start(start))?;
        if let Some(text) = &el.text {
            writer.write_event(Event::Text(BytesText::new(text)))?;
        }
        for child in &el.children {
            write_element(writer, child)?;
        }
        writer.write_event(Event::End(BytesEnd::new(el.tag.as_str())))?;
    }
    if let Some(tail) = &el.tail {
        writer.write_event(Event::Text(BytesText::new(tail)))?;
    }
    Ok(())
}

/// In-place two-space pretty indentation. Only whitespace-only `text`/`tail`
/// slots are touched, which makes the operation idempotent.
pub fn indent(el: &mut Element) {
    indent_level(el, 0);
}

fn is_blank(slot: &Option<String>) -> bool {
    slot.as_deref().is_none_or(|s| s.trim().is_empty())
}

fn indent_level(el: &mut Element, level: usize) {
    let pad = format!("\n{}", "  ".repeat(level));
    if !el.children.is_empty() {
        if is_blank(&el.text) {
            el.text = Some(format!("{pad}  "));
        }
        if is_blank(&el.tail) {
            el.tail = Some(pad.clone());
        }
        for child in &mut el.children {
            indent_level(child, level + 1);
        }
        // the closing tag sits at this element's own depth, so the last
        // child's tail steps back out one level
        if let Some(last) = el.children.last_mut() {
            if is_blank(&last.tail) {
                last.tail = Some(pad);
            }
        }
    } else if level > 0 && is_blank(&el.tail) {
        el.tail = Some(pad);
    }
}

/// Indent followed by serialization, the form every graph leaves the crate in.
pub fn to_pretty_string(root: &Element) -> Result<String, XmlError> {
    let mut copy = root.clone();
    indent(&mut copy);
    to_string(&copy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Element {
        let mut graph = Element::new("graph");
        graph.set_attr("id", "Graph");
        graph.push_child(Element::with_text("version", "1.0"));
        let node = graph.push_child(Element::new("node"));
        node.set_attr("id", "Read_0");
        node.push_child(Element::with_text("operator", "Read"));
        node.push_child(Element::new("sources"));
        graph
    }

    #[test]
    fn parse_round_trips_structure() {
        let xml = to_pretty_string(&sample()).unwrap();
        let reparsed = parse(&xml).unwrap();
        assert_eq!(reparsed.tag, "graph");
        assert_eq!(reparsed.attr("id"), Some("Graph"));
        assert_eq!(reparsed.find("version").unwrap().text_or_empty(), "1.0");
        let node = reparsed.find("node").unwrap();
        assert_eq!(node.attr("id"), Some("Read_0"));
        assert_eq!(node.find("operator").unwrap().text_or_empty(), "Read");
    }

    #[test]
    fn indent_layout_is_exact() {
        let mut graph = sample();
        indent(&mut graph);
        let xml = to_string(&graph).unwrap();
        let expected = "<graph id=\"Graph\">\n  <version>1.0</version>\n  <node id=\"Read_0\">\n    <operator>Read</operator>\n    <sources/>\n  </node>\n</graph>\n";
        assert_eq!(xml, expected);
    }

    #[test]
    fn indent_is_idempotent() {
        let mut once = sample();
        indent(&mut once);
        let mut twice = once.clone();
        indent(&mut twice);
        assert_eq!(once, twice);
        assert_eq!(to_string(&once).unwrap(), to_string(&twice).unwrap());
    }

    #[test]
    fn text_is_escaped_on_write() {
        let el = Element::with_text("expression", "a > b && c < d");
        let xml = to_string(&el).unwrap();
        assert_eq!(xml, "<expression>a &gt; b &amp;&amp; c &lt; d</expression>");
        let back = parse(&xml).unwrap();
        assert_eq!(back.text_or_empty(), "a > b && c < d");
    }

    #[test]
    fn attributes_are_escaped_and_recovered() {
        let mut el = Element::new("node");
        el.set_attr("id", "a \"quoted\" & <id>");
        let xml = to_string(&el).unwrap();
        let back = parse(&xml).unwrap();
        assert_eq!(back.attr("id"), Some("a \"quoted\" & <id>"));
    }

    #[test]
    fn set_attr_replaces_existing_value() {
        let mut el = Element::new("node");
        el.set_attr("id", "one");
        el.set_attr("id", "two");
        assert_eq!(el.attrs.len(), 1);
        assert_eq!(el.attr("id"), Some("two"));
    }

    #[test]
    fn leaf_at_depth_zero_keeps_tail_untouched() {
        let mut el = Element::with_text("version", "1.0");
        indent(&mut el);
        assert_eq!(el.tail, None);
    }
}
