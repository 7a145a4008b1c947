use kuchiki::traits::TendrilSink;
use kuchiki::{NodeData, NodeRef};

pub fn parse_document(html: &str) -> NodeRef {
    kuchiki::parse_html().one(html)
}

pub fn tag_name(node: &NodeRef) -> Option<String> {
    node.as_element()
        .map(|element| element.name.local.as_ref().to_ascii_lowercase())
}

pub fn is_tag(node: &NodeRef, tag: &str) -> bool {
    node.as_element()
        .map(|element| element.name.local.as_ref().eq_ignore_ascii_case(tag))
        .unwrap_or(false)
}

/// Descendant elements named `tag`, in document order. `node` itself is excluded.
pub fn find_all(node: &NodeRef, tag: &str) -> Vec<NodeRef> {
    node.descendants().filter(|n| is_tag(n, tag)).collect()
}

pub fn find_first(node: &NodeRef, tag: &str) -> Option<NodeRef> {
    node.descendants().find(|n| is_tag(n, tag))
}

/// Direct element children named `tag`, in document order.
pub fn child_elements(node: &NodeRef, tag: &str) -> Vec<NodeRef> {
    node.children().filter(|n| is_tag(n, tag)).collect()
}

pub fn has_element_children(node: &NodeRef) -> bool {
    node.children().any(|n| n.as_element().is_some())
}

/// Nearest strict ancestor named `tag`.
pub fn closest_ancestor(node: &NodeRef, tag: &str) -> Option<NodeRef> {
    node.ancestors().find(|n| is_tag(n, tag))
}

pub fn attribute(node: &NodeRef, name: &str) -> Option<String> {
    let element = node.as_element()?;
    let attrs = element.attributes.borrow();
    attrs.get(name).map(str::to_string)
}

pub fn set_attribute(node: &NodeRef, name: &str, value: String) {
    if let Some(element) = node.as_element() {
        element.attributes.borrow_mut().insert(name, value);
    }
}

/// Whitespace-separated tokens of the `class` attribute.
pub fn class_tokens(node: &NodeRef) -> Vec<String> {
    attribute(node, "class")
        .map(|raw| raw.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Positive integer attribute such as `colspan`; anything else reads as 1.
pub fn span_attribute(node: &NodeRef, name: &str) -> u32 {
    attribute(node, name)
        .and_then(|raw| raw.trim().parse::<u32>().ok())
        .filter(|value| *value >= 1)
        .unwrap_or(1)
}

/// How text content is flattened.
///
/// Text is split into segments at `<br>` and at block-level element boundaries.
/// Inside a segment whitespace runs collapse to one space. Segments are joined
/// with `separator`; with `trim` each segment is trimmed and empty ones dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPolicy {
    pub separator: String,
    pub trim: bool,
}

impl TextPolicy {
    pub fn new(separator: impl Into<String>, trim: bool) -> Self {
        Self {
            separator: separator.into(),
            trim,
        }
    }

    /// Newline-joined, trimmed segments. Used for cell values.
    pub fn cell() -> Self {
        Self::new("\n", true)
    }
}

impl Default for TextPolicy {
    fn default() -> Self {
        Self::cell()
    }
}

pub fn text_content(node: &NodeRef, policy: &TextPolicy) -> String {
    let mut collector = TextCollector {
        policy,
        segments: Vec::new(),
        current: String::new(),
    };
    for child in node.children() {
        collector.walk(&child);
    }
    collector.flush();
    collector.segments.join(&policy.separator)
}

struct TextCollector<'a> {
    policy: &'a TextPolicy,
    segments: Vec<String>,
    current: String,
}

impl TextCollector<'_> {
    fn walk(&mut self, node: &NodeRef) {
        match node.data() {
            NodeData::Text(text) => self.current.push_str(&text.borrow()),
            NodeData::Element(element) => {
                let tag = element.name.local.as_ref().to_ascii_lowercase();
                if tag == "br" {
                    self.flush();
                    return;
                }
                if tag == "script" || tag == "style" {
                    return;
                }
                let block = is_block_tag(&tag);
                if block {
                    self.flush();
                }
                for child in node.children() {
                    self.walk(&child);
                }
                if block {
                    self.flush();
                }
            }
            _ => {}
        }
    }

    fn flush(&mut self) {
        let segment = collapse_whitespace(&self.current, self.policy.trim);
        self.current.clear();
        if self.policy.trim && segment.is_empty() {
            return;
        }
        self.segments.push(segment);
    }
}

fn is_block_tag(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "div"
            | "li"
            | "ul"
            | "ol"
            | "dl"
            | "dt"
            | "dd"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "pre"
            | "blockquote"
            | "section"
            | "article"
            | "header"
            | "footer"
            | "address"
            | "table"
            | "tr"
    )
}

fn collapse_whitespace(text: &str, trim: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() || ch == '\u{00A0}' {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    if trim {
        out.trim_matches(' ').to_string()
    } else {
        out
    }
}
