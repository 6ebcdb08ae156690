//! The stack of open elements.
//!
//! [§ 13.2.4.2 The stack of open elements](https://html.spec.whatwg.org/multipage/parsing.html#the-stack-of-open-elements)
//!
//! Scope queries scan from the top of the stack down until either the
//! requested local name is found or a scope marker (a per-query fixed
//! set of element types) is hit first.

use wombat_dom::{Attribute, HTML_NAMESPACE, MATHML_NAMESPACE, SVG_NAMESPACE};

/// [§ 13.2.6.2 Special elements](https://html.spec.whatwg.org/multipage/parsing.html#special)
const SPECIAL_HTML: &[&str] = &[
    "address",
    "applet",
    "area",
    "article",
    "aside",
    "base",
    "basefont",
    "bgsound",
    "blockquote",
    "body",
    "br",
    "button",
    "caption",
    "center",
    "col",
    "colgroup",
    "dd",
    "details",
    "dir",
    "div",
    "dl",
    "dt",
    "embed",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "frame",
    "frameset",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "head",
    "header",
    "hgroup",
    "hr",
    "html",
    "iframe",
    "img",
    "input",
    "isindex",
    "li",
    "link",
    "listing",
    "main",
    "marquee",
    "menu",
    "menuitem",
    "meta",
    "nav",
    "noembed",
    "noframes",
    "noscript",
    "object",
    "ol",
    "p",
    "param",
    "plaintext",
    "pre",
    "script",
    "section",
    "select",
    "source",
    "style",
    "summary",
    "table",
    "tbody",
    "td",
    "textarea",
    "tfoot",
    "th",
    "thead",
    "title",
    "tr",
    "track",
    "ul",
    "wbr",
    "xmp",
];

const SPECIAL_MATHML: &[&str] = &["mi", "mo", "mn", "ms", "mtext", "annotation-xml"];
const SPECIAL_SVG: &[&str] = &["foreignObject", "desc", "title"];

/// One entry of the open-element stack: the element's namespace, local
/// name and attributes plus the handle of its live node in the tree.
///
/// The category predicates are pure functions of namespace + local name
/// (plus one attribute lookup for the MathML annotation-xml case).
#[derive(Debug, Clone)]
pub struct StackItem<H> {
    /// The element's namespace URI.
    pub namespace_uri: String,
    /// The element's local name.
    pub local_name: String,
    /// The element's attributes (after foreign-content adjustment).
    pub attributes: Vec<Attribute>,
    /// The live node in the output tree.
    pub node: H,
}

impl<H: Copy> StackItem<H> {
    /// Create a stack item.
    #[must_use]
    pub const fn new(
        namespace_uri: String,
        local_name: String,
        attributes: Vec<Attribute>,
        node: H,
    ) -> Self {
        Self {
            namespace_uri,
            local_name,
            attributes,
            node,
        }
    }

    fn is_html(&self) -> bool {
        self.namespace_uri == HTML_NAMESPACE
    }

    /// Whether the element is named by the given HTML local name.
    #[must_use]
    pub fn is_html_named(&self, local_name: &str) -> bool {
        self.is_html() && self.local_name == local_name
    }

    /// [§ 13.2.6.2 Special](https://html.spec.whatwg.org/multipage/parsing.html#special)
    #[must_use]
    pub fn is_special(&self) -> bool {
        match self.namespace_uri.as_str() {
            HTML_NAMESPACE => SPECIAL_HTML.contains(&self.local_name.as_str()),
            MATHML_NAMESPACE => SPECIAL_MATHML.contains(&self.local_name.as_str()),
            SVG_NAMESPACE => SPECIAL_SVG.contains(&self.local_name.as_str()),
            _ => false,
        }
    }

    /// Whether an insertion while this element is the current node is
    /// subject to the foster-parenting redirect.
    #[must_use]
    pub fn is_foster_parenting(&self) -> bool {
        self.is_html()
            && matches!(
                self.local_name.as_str(),
                "table" | "tbody" | "tfoot" | "thead" | "tr"
            )
    }

    /// h1 through h6.
    #[must_use]
    pub fn is_numbered_header(&self) -> bool {
        self.is_html()
            && matches!(
                self.local_name.as_str(),
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
            )
    }

    /// Whether the element is outside the HTML namespace.
    #[must_use]
    pub fn is_foreign(&self) -> bool {
        !self.is_html()
    }

    /// Look up an attribute value by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// [§ 13.2.6.5 HTML integration point](https://html.spec.whatwg.org/multipage/parsing.html#html-integration-point)
    ///
    /// annotation-xml with an `encoding` of text/html or
    /// application/xhtml+xml, or svg foreignObject/desc/title.
    #[must_use]
    pub fn is_html_integration_point(&self) -> bool {
        match self.namespace_uri.as_str() {
            MATHML_NAMESPACE => {
                if self.local_name != "annotation-xml" {
                    return false;
                }
                self.attribute("encoding").is_some_and(|encoding| {
                    encoding.eq_ignore_ascii_case("text/html")
                        || encoding.eq_ignore_ascii_case("application/xhtml+xml")
                })
            }
            SVG_NAMESPACE => matches!(self.local_name.as_str(), "foreignObject" | "desc" | "title"),
            _ => false,
        }
    }

    /// [§ 13.2.6.5 MathML text integration point](https://html.spec.whatwg.org/multipage/parsing.html#mathml-text-integration-point)
    #[must_use]
    pub fn is_mathml_text_integration_point(&self) -> bool {
        self.namespace_uri == MATHML_NAMESPACE
            && matches!(self.local_name.as_str(), "mi" | "mo" | "mn" | "ms" | "mtext")
    }
}

fn is_scope_marker<H: Copy>(item: &StackItem<H>) -> bool {
    match item.namespace_uri.as_str() {
        HTML_NAMESPACE => matches!(
            item.local_name.as_str(),
            "applet" | "caption" | "marquee" | "object" | "table" | "td" | "th" | "html"
        ),
        MATHML_NAMESPACE => matches!(
            item.local_name.as_str(),
            "mi" | "mo" | "mn" | "ms" | "mtext" | "annotation-xml"
        ),
        SVG_NAMESPACE => matches!(item.local_name.as_str(), "foreignObject" | "desc" | "title"),
        _ => false,
    }
}

fn is_list_item_scope_marker<H: Copy>(item: &StackItem<H>) -> bool {
    is_scope_marker(item) || item.is_html_named("ol") || item.is_html_named("ul")
}

fn is_table_scope_marker<H: Copy>(item: &StackItem<H>) -> bool {
    item.is_html_named("table") || item.is_html_named("html")
}

fn is_table_body_scope_marker<H: Copy>(item: &StackItem<H>) -> bool {
    item.is_html_named("tbody")
        || item.is_html_named("tfoot")
        || item.is_html_named("thead")
        || item.is_html_named("html")
}

fn is_table_row_scope_marker<H: Copy>(item: &StackItem<H>) -> bool {
    item.is_html_named("tr") || item.is_html_named("html")
}

fn is_button_scope_marker<H: Copy>(item: &StackItem<H>) -> bool {
    is_scope_marker(item) || item.is_html_named("button")
}

fn is_select_scope_marker<H: Copy>(item: &StackItem<H>) -> bool {
    !item.is_html_named("optgroup") && !item.is_html_named("option")
}

/// The stack of currently-open elements.
///
/// Also tracks the root `<html>`, `<head>` and `<body>` nodes as they
/// are pushed, since several modes need them after they leave the
/// stack top.
#[derive(Debug)]
pub struct ElementStack<H> {
    elements: Vec<StackItem<H>>,
    /// The root `<html>` element's node.
    pub root_node: Option<H>,
    /// The `<head>` element's node.
    pub head_element: Option<H>,
    /// The `<body>` element's node.
    pub body_element: Option<H>,
}

impl<H: Copy + PartialEq> ElementStack<H> {
    /// Create an empty stack.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            elements: Vec::new(),
            root_node: None,
            head_element: None,
            body_element: None,
        }
    }

    /// Push an item.
    pub fn push(&mut self, item: StackItem<H>) {
        self.elements.push(item);
    }

    /// Push the root `<html>` element's item.
    pub fn push_html_element(&mut self, item: StackItem<H>) {
        self.root_node = Some(item.node);
        self.push(item);
    }

    /// Push the `<head>` element's item.
    pub fn push_head_element(&mut self, item: StackItem<H>) {
        self.head_element = Some(item.node);
        self.push(item);
    }

    /// Push the `<body>` element's item.
    pub fn push_body_element(&mut self, item: StackItem<H>) {
        self.body_element = Some(item.node);
        self.push(item);
    }

    /// Pop the topmost item.
    ///
    /// # Panics
    ///
    /// Panics if the stack is empty; popping an empty open-element
    /// stack is a tree-construction bug, never a consequence of
    /// malformed input.
    pub fn pop(&mut self) -> StackItem<H> {
        self.elements.pop().expect("popped an empty element stack")
    }

    /// Remove the item owning `node`, wherever it sits.
    pub fn remove(&mut self, node: H) {
        self.elements.retain(|item| item.node != node);
    }

    /// Pop until an element with the given local name has been popped.
    pub fn pop_until_popped(&mut self, local_name: &str) {
        while self.pop().local_name != local_name {}
    }

    /// Pop until a numbered header (h1–h6) has been popped.
    pub fn pop_until_numbered_header_popped(&mut self) {
        while !self.pop().is_numbered_header() {}
    }

    /// Pop to the nearest table scope boundary (`table`/`html` stays).
    pub fn pop_until_table_scope_marker(&mut self) {
        while !is_table_scope_marker(self.top()) {
            let _ = self.pop();
        }
    }

    /// Pop to the nearest table-body scope boundary.
    pub fn pop_until_table_body_scope_marker(&mut self) {
        while !is_table_body_scope_marker(self.top()) {
            let _ = self.pop();
        }
    }

    /// Pop to the nearest table-row scope boundary.
    pub fn pop_until_table_row_scope_marker(&mut self) {
        while !is_table_row_scope_marker(self.top()) {
            let _ = self.pop();
        }
    }

    /// The number of open elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the stack is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Indexed access, bottom is 0.
    #[must_use]
    pub fn item(&self, index: usize) -> &StackItem<H> {
        &self.elements[index]
    }

    /// The current node.
    ///
    /// # Panics
    ///
    /// Panics on an empty stack (tree-construction bug).
    #[must_use]
    pub fn top(&self) -> &StackItem<H> {
        self.elements.last().expect("element stack is empty")
    }

    /// The current node, or `None` when nothing is open.
    #[must_use]
    pub fn try_top(&self) -> Option<&StackItem<H>> {
        self.elements.last()
    }

    /// Whether `node` is on the stack.
    #[must_use]
    pub fn contains(&self, node: H) -> bool {
        self.elements.iter().any(|item| item.node == node)
    }

    /// The stack index of the item owning `node`.
    #[must_use]
    pub fn index_of(&self, node: H) -> Option<usize> {
        self.elements.iter().position(|item| item.node == node)
    }

    /// Topmost index of an element with the given local name.
    #[must_use]
    pub fn find_index(&self, local_name: &str) -> Option<usize> {
        self.elements
            .iter()
            .rposition(|item| item.local_name == local_name)
    }

    /// Replace the item at `index`.
    pub fn replace(&mut self, index: usize, item: StackItem<H>) {
        self.elements[index] = item;
    }

    /// Insert an item at `index`.
    pub fn insert(&mut self, index: usize, item: StackItem<H>) {
        self.elements.insert(index, item);
    }

    fn in_scope_with(&self, local_name: &str, is_marker: impl Fn(&StackItem<H>) -> bool) -> bool {
        for item in self.elements.iter().rev() {
            if item.local_name == local_name {
                return true;
            }
            if is_marker(item) {
                return false;
            }
        }
        false
    }

    /// "has an element in scope".
    #[must_use]
    pub fn in_scope(&self, local_name: &str) -> bool {
        self.in_scope_with(local_name, is_scope_marker)
    }

    /// "has an element in list item scope".
    #[must_use]
    pub fn in_list_item_scope(&self, local_name: &str) -> bool {
        self.in_scope_with(local_name, is_list_item_scope_marker)
    }

    /// "has an element in table scope".
    #[must_use]
    pub fn in_table_scope(&self, local_name: &str) -> bool {
        self.in_scope_with(local_name, is_table_scope_marker)
    }

    /// "has an element in button scope".
    #[must_use]
    pub fn in_button_scope(&self, local_name: &str) -> bool {
        self.in_scope_with(local_name, is_button_scope_marker)
    }

    /// "has an element in select scope".
    #[must_use]
    pub fn in_select_scope(&self, local_name: &str) -> bool {
        self.in_scope_with(local_name, is_select_scope_marker)
    }

    /// Whether any h1–h6 element is in scope.
    #[must_use]
    pub fn has_numbered_header_in_scope(&self) -> bool {
        for item in self.elements.iter().rev() {
            if item.is_numbered_header() {
                return true;
            }
            if is_scope_marker(item) {
                return false;
            }
        }
        false
    }

    /// The first `is_special` item above the given formatting element,
    /// scanning from the top down (the adoption agency's "furthest
    /// block"). `None` when nothing special sits above it.
    #[must_use]
    pub fn furthest_block_for_formatting_element(&self, element: H) -> Option<(usize, StackItem<H>)>
    where
        StackItem<H>: Clone,
    {
        let mut furthest_block = None;
        for (index, item) in self.elements.iter().enumerate().rev() {
            if item.node == element {
                break;
            }
            if item.is_special() {
                furthest_block = Some((index, item.clone()));
            }
        }
        furthest_block
    }

    /// Whether any open element is outside the HTML namespace.
    #[must_use]
    pub fn has_foreign_element(&self) -> bool {
        self.elements.iter().any(StackItem::is_foreign)
    }
}

impl<H: Copy + PartialEq> Default for ElementStack<H> {
    fn default() -> Self {
        Self::new()
    }
}
