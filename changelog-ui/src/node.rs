//! Typed view tree produced by the view functions.
//!
//! Text and attribute values are escaped when serialized, so view code never
//! handles raw markup. Platform adapters may also walk the tree and build
//! native nodes directly.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Fragment(Vec<Node>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: &'static str,
    pub attrs: Vec<(&'static str, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn class(self, class: &str) -> Self {
        self.attr("class", class)
    }

    pub fn attr(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.attrs.push((name, value.into()));
        self
    }

    pub fn attr_opt(self, name: &'static str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.attr(name, value),
            None => self,
        }
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn children(mut self, nodes: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(nodes);
        self
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.child(Node::Text(text.into()))
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(attr, _)| *attr == name)
            .map(|(_, value)| value.as_str())
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl Node {
    pub fn empty() -> Self {
        Node::Fragment(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Node::Fragment(children) => children.iter().all(Node::is_empty),
            Node::Text(text) => text.is_empty(),
            Node::Element(_) => false,
        }
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(&escape_html(text)),
            Node::Fragment(children) => children.iter().for_each(|child| child.write_html(out)),
            Node::Element(element) => {
                out.push('<');
                out.push_str(element.tag);
                for (name, value) in &element.attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_html(value));
                    out.push('"');
                }
                out.push('>');
                for child in &element.children {
                    child.write_html(out);
                }
                out.push_str("</");
                out.push_str(element.tag);
                out.push('>');
            }
        }
    }

    /// Concatenated text of the subtree.
    pub fn text_content(&self) -> String {
        match self {
            Node::Text(text) => text.clone(),
            Node::Fragment(children) => children.iter().map(Node::text_content).collect(),
            Node::Element(element) => element.children.iter().map(Node::text_content).collect(),
        }
    }

    /// Depth-first search for the first element matching `predicate`.
    pub fn find(&self, predicate: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        match self {
            Node::Text(_) => None,
            Node::Fragment(children) => children.iter().find_map(|child| child.find(predicate)),
            Node::Element(element) if predicate(element) => Some(element),
            Node::Element(element) => element
                .children
                .iter()
                .find_map(|child| child.find(predicate)),
        }
    }

    pub fn find_all<'a>(&'a self, predicate: &dyn Fn(&Element) -> bool, out: &mut Vec<&'a Element>) {
        match self {
            Node::Text(_) => {}
            Node::Fragment(children) => children.iter().for_each(|child| child.find_all(predicate, out)),
            Node::Element(element) => {
                if predicate(element) {
                    out.push(element);
                }
                element
                    .children
                    .iter()
                    .for_each(|child| child.find_all(predicate, out));
            }
        }
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
