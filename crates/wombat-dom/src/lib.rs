//! Owned node tree produced by the Wombat HTML parser.
//!
//! The tree uses arena allocation with [`NodeId`] indices for all
//! relationships, providing O(1) access and traversal without borrow
//! checker issues. Ownership lives in the arena; `parent` back-pointers
//! are plain indices used only for traversal.
//!
//! Every node records the source [`Location`] at which it was created;
//! container nodes additionally record an end location once closed, so
//! downstream diagnostics can point at both edges of an element.

/// The XHTML namespace URI.
pub const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";
/// The MathML namespace URI.
pub const MATHML_NAMESPACE: &str = "http://www.w3.org/1998/Math/MathML";
/// The SVG namespace URI.
pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";
/// The XLink namespace URI.
pub const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";
/// The XML namespace URI.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
/// The XMLNS namespace URI.
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// A position in the source text, zero-based.
///
/// Captured from the input stream when the corresponding markup was
/// consumed. Both fields count Unicode scalar values, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    /// Zero-based line number.
    pub line: usize,
    /// Zero-based column number.
    pub column: usize,
}

impl Location {
    /// Create a location from a line/column pair.
    #[must_use]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// An attribute on an element.
///
/// `name` is the qualified name as written (after case adjustment for
/// foreign content). For attributes bound to a namespace by the foreign
/// attribute table (`xlink:href`, `xml:lang`, `xmlns`, ...), `prefix`,
/// `local_name` and `namespace_uri` carry the binding; for ordinary HTML
/// attributes they are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Qualified attribute name.
    pub name: String,
    /// Attribute value.
    pub value: String,
    /// Namespace prefix, when the attribute is namespaced.
    pub prefix: Option<String>,
    /// Local name, when the attribute is namespaced.
    pub local_name: Option<String>,
    /// Namespace URI, when the attribute is namespaced.
    pub namespace_uri: Option<String>,
}

impl Attribute {
    /// Create an un-namespaced attribute.
    #[must_use]
    pub const fn new(name: String, value: String) -> Self {
        Self {
            name,
            value,
            prefix: None,
            local_name: None,
            namespace_uri: None,
        }
    }
}

/// Element-specific data.
///
/// [§ 4.9 Interface Element](https://dom.spec.whatwg.org/#interface-element)
/// "Elements have an associated namespace, namespace prefix, local name ...
/// and an associated attribute list."
#[derive(Debug, Clone)]
pub struct ElementData {
    /// The element's namespace URI.
    pub namespace_uri: String,
    /// The element's local name.
    pub local_name: String,
    /// The element's qualified name (equal to the local name for HTML).
    pub qualified_name: String,
    /// Ordered attribute list. The first occurrence of a name wins;
    /// duplicates are never stored.
    pub attributes: Vec<Attribute>,
    /// Namespace prefix mappings declared on this element via `xmlns:*`
    /// attributes, as (prefix, uri) pairs.
    pub prefix_mappings: Vec<(String, String)>,
}

impl ElementData {
    /// Look up an attribute value by qualified name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }
}

/// The closed set of node kinds this tree can hold.
///
/// Mirrors the SAX view of a document: beyond the four kinds the HTML
/// parser itself produces (document, element, characters, comment,
/// doctype) the set carries the remaining SAX node categories so the
/// traverser surface is total.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// The document root.
    Document,
    /// A document fragment root (fragment parsing output).
    DocumentFragment,
    /// A doctype declaration.
    DocumentType {
        /// The doctype name, e.g. `html`.
        name: String,
        /// The public identifier, when present.
        public_id: Option<String>,
        /// The system identifier, when present.
        system_id: Option<String>,
    },
    /// An element.
    Element(ElementData),
    /// A run of character data.
    Characters(String),
    /// A comment.
    Comment(String),
    /// A parsed entity boundary (unused by the HTML parser, kept for a
    /// total SAX surface).
    Entity(String),
    /// A run of ignorable whitespace.
    IgnorableWhitespace(String),
    /// A processing instruction.
    ProcessingInstruction {
        /// The PI target.
        target: String,
        /// The PI data.
        data: String,
    },
    /// A skipped entity reference.
    SkippedEntity(String),
}

impl NodeKind {
    /// Whether nodes of this kind may own children.
    #[must_use]
    pub const fn is_parent(&self) -> bool {
        matches!(
            self,
            Self::Document | Self::DocumentFragment | Self::Element(_)
        )
    }
}

/// A type-safe index into the node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

impl NodeId {
    /// The root node is always at index 0.
    pub const ROOT: Self = Self(0);
}

/// A node in the arena.
///
/// Stores indices for parent/child/sibling relationships, enabling O(1)
/// traversal in any direction.
#[derive(Debug, Clone)]
pub struct Node {
    /// What this node is.
    pub kind: NodeKind,
    /// The owning parent, if attached.
    pub parent: Option<NodeId>,
    /// Ordered children.
    pub children: Vec<NodeId>,
    /// The sibling immediately after this node.
    pub next_sibling: Option<NodeId>,
    /// The sibling immediately before this node.
    pub prev_sibling: Option<NodeId>,
    /// Where this node's markup started.
    pub location: Location,
    /// Where this node's markup ended, once known (containers only).
    pub end_location: Option<Location>,
}

/// Arena-based node tree with O(1) node access and traversal.
///
/// The node at [`NodeId::ROOT`] is created by the constructor and is a
/// [`NodeKind::Document`] (or [`NodeKind::DocumentFragment`] for
/// fragment parses).
#[derive(Debug, Clone)]
pub struct DomTree {
    nodes: Vec<Node>,
}

impl DomTree {
    /// Create a tree with just the document node.
    #[must_use]
    pub fn new() -> Self {
        Self::with_root(NodeKind::Document, Location::default())
    }

    /// Create a tree whose root is the given kind.
    ///
    /// # Panics
    ///
    /// Panics if `kind` cannot own children; that is a caller bug.
    #[must_use]
    pub fn with_root(kind: NodeKind, location: Location) -> Self {
        assert!(kind.is_parent(), "tree root must be a container kind");
        Self {
            nodes: vec![Node {
                kind,
                parent: None,
                children: Vec::new(),
                next_sibling: None,
                prev_sibling: None,
                location,
                end_location: None,
            }],
        }
    }

    /// Get the root node ID.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Get a node by its ID.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Get a mutable reference to a node by its ID.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// The number of nodes allocated in the arena (attached or not).
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty (never true: the root always exists).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate a new node and return its ID.
    /// The node is not yet attached to the tree.
    pub fn alloc(&mut self, kind: NodeKind, location: Location) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
            next_sibling: None,
            prev_sibling: None,
            location,
            end_location: None,
        });
        id
    }

    /// Record the end location of a container node.
    pub fn set_end_location(&mut self, id: NodeId, location: Location) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.end_location = Some(location);
        }
    }

    /// [§ 4.2.2 Append](https://dom.spec.whatwg.org/#concept-node-append)
    ///
    /// Appends `child` as the last child of `parent`, detaching it from
    /// any previous parent first and updating all sibling links.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        let prev_last = self.nodes[parent.0].children.last().copied();
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);
        if let Some(prev_id) = prev_last {
            self.nodes[prev_id.0].next_sibling = Some(child);
            self.nodes[child.0].prev_sibling = Some(prev_id);
        }
    }

    /// [§ 4.2.3 Insert](https://dom.spec.whatwg.org/#concept-node-insert)
    ///
    /// Insert `child` into `parent` immediately before `before`. When
    /// `before` is `None` this is an append.
    ///
    /// # Panics
    ///
    /// Panics if `before` is given but is not a child of `parent`; that
    /// indicates a tree-construction bug, not bad input.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, before: Option<NodeId>) {
        let Some(before) = before else {
            self.append_child(parent, child);
            return;
        };
        self.detach(child);
        let index = self.nodes[parent.0]
            .children
            .iter()
            .position(|&c| c == before)
            .expect("insert_before target must be a child of parent");
        self.nodes[parent.0].children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);

        let prev = self.nodes[before.0].prev_sibling;
        self.nodes[child.0].prev_sibling = prev;
        self.nodes[child.0].next_sibling = Some(before);
        self.nodes[before.0].prev_sibling = Some(child);
        if let Some(prev_id) = prev {
            self.nodes[prev_id.0].next_sibling = Some(child);
        }
    }

    /// Detach a node from its parent, if attached. The node (and its
    /// subtree) stays alive in the arena and can be re-attached.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.nodes[id.0].parent.take() else {
            return;
        };
        let prev = self.nodes[id.0].prev_sibling.take();
        let next = self.nodes[id.0].next_sibling.take();
        if let Some(prev_id) = prev {
            self.nodes[prev_id.0].next_sibling = next;
        }
        if let Some(next_id) = next {
            self.nodes[next_id.0].prev_sibling = prev;
        }
        self.nodes[parent.0].children.retain(|&c| c != id);
    }

    /// Move all children of `old_parent` to the end of `new_parent`'s
    /// child list, preserving order.
    pub fn reparent_children(&mut self, old_parent: NodeId, new_parent: NodeId) {
        let children = std::mem::take(&mut self.nodes[old_parent.0].children);
        for child in children {
            // detach() has nothing left to unlink for these nodes once the
            // child list is taken, so fix the links directly.
            self.nodes[child.0].parent = None;
            self.nodes[child.0].prev_sibling = None;
            self.nodes[child.0].next_sibling = None;
            self.append_child(new_parent, child);
        }
    }

    /// Get the parent of a node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    /// Get all children of a node.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map_or(&[], |n| n.children.as_slice())
    }

    /// Get the first child of a node.
    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.children.first().copied())
    }

    /// Get the last child of a node.
    #[must_use]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.children.last().copied())
    }

    /// Get the next sibling of a node.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.next_sibling)
    }

    /// Get the previous sibling of a node.
    #[must_use]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.prev_sibling)
    }

    /// Get element data if this node is an element.
    #[must_use]
    pub fn as_element(&self, id: NodeId) -> Option<&ElementData> {
        self.get(id).and_then(|n| match &n.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        })
    }

    /// Get character data if this node is a characters node.
    #[must_use]
    pub fn as_characters(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.kind {
            NodeKind::Characters(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Append character data to the node if it is a characters node.
    /// Used to coalesce adjacent text runs.
    pub fn push_characters(&mut self, id: NodeId, data: &str) {
        if let Some(node) = self.nodes.get_mut(id.0)
            && let NodeKind::Characters(s) = &mut node.kind
        {
            s.push_str(data);
        }
    }

    /// [§ 3.1.1 The document element](https://html.spec.whatwg.org/multipage/dom.html#the-html-element-2)
    ///
    /// The first element child of the root, if any.
    #[must_use]
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(NodeId::ROOT)
            .iter()
            .find(|&&id| matches!(self.get(id).map(|n| &n.kind), Some(NodeKind::Element(_))))
            .copied()
    }

    /// Check if `descendant` is a descendant of `ancestor`.
    #[must_use]
    pub fn is_descendant_of(&self, descendant: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.parent(descendant);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}
