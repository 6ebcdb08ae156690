//! The concrete tree builder: binds [`TreeSink`] to the `wombat-dom`
//! node family.
//!
//! Every node is stamped with the tokenizer's current source location
//! at creation time. Duplicate attributes on a start tag keep only the
//! first occurrence of each name; `xmlns`/`xmlns:*` attributes are
//! additionally collected as prefix mappings so the traverser can
//! bracket the element with prefix-mapping callbacks.

use wombat_dom::{Attribute, DomTree, ElementData, Location, NodeId, NodeKind};

use crate::treebuilder::TreeSink;

/// [`TreeSink`] implementation producing an owned [`DomTree`].
#[derive(Debug, Default)]
pub struct SaxTreeBuilder {
    tree: DomTree,
}

impl SaxTreeBuilder {
    /// Create a builder with an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: DomTree::new(),
        }
    }

    /// The tree built so far.
    #[must_use]
    pub const fn tree(&self) -> &DomTree {
        &self.tree
    }

    /// Consume the builder, returning the finished tree.
    #[must_use]
    pub fn into_tree(self) -> DomTree {
        self.tree
    }

    /// Extract a fragment: allocate a fragment root and move the
    /// synthetic root element's children under it.
    pub fn extract_fragment(&mut self, root_element: NodeId) -> NodeId {
        let fragment = self
            .tree
            .alloc(NodeKind::DocumentFragment, Location::default());
        self.tree.reparent_children(root_element, fragment);
        fragment
    }
}

/// Keep the first occurrence of each attribute name.
fn dedupe_attributes(attributes: &[Attribute]) -> Vec<Attribute> {
    let mut deduped: Vec<Attribute> = Vec::with_capacity(attributes.len());
    for attribute in attributes {
        if !deduped.iter().any(|a| a.name == attribute.name) {
            deduped.push(attribute.clone());
        }
    }
    deduped
}

/// Collect (prefix, uri) pairs from xmlns declarations.
fn prefix_mappings(attributes: &[Attribute]) -> Vec<(String, String)> {
    let mut mappings = Vec::new();
    for attribute in attributes {
        if attribute.name == "xmlns" {
            mappings.push((String::new(), attribute.value.clone()));
        } else if let Some(prefix) = attribute.name.strip_prefix("xmlns:") {
            mappings.push((prefix.to_string(), attribute.value.clone()));
        }
    }
    mappings
}

impl TreeSink for SaxTreeBuilder {
    type Handle = NodeId;

    fn document(&self) -> NodeId {
        self.tree.root()
    }

    fn create_element(
        &mut self,
        namespace_uri: &str,
        local_name: &str,
        qualified_name: &str,
        attributes: &[Attribute],
        location: Location,
    ) -> NodeId {
        let attributes = dedupe_attributes(attributes);
        let prefix_mappings = prefix_mappings(&attributes);
        self.tree.alloc(
            NodeKind::Element(ElementData {
                namespace_uri: namespace_uri.to_string(),
                local_name: local_name.to_string(),
                qualified_name: qualified_name.to_string(),
                attributes,
                prefix_mappings,
            }),
            location,
        )
    }

    fn insert_doctype(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
        location: Location,
    ) {
        let doctype = self.tree.alloc(
            NodeKind::DocumentType {
                name: name.to_string(),
                public_id: public_id.map(ToString::to_string),
                system_id: system_id.map(ToString::to_string),
            },
            location,
        );
        self.tree.set_end_location(doctype, location);
        self.tree.append_child(self.tree.root(), doctype);
    }

    fn insert_comment(&mut self, parent: NodeId, data: &str, location: Location) {
        let comment = self
            .tree
            .alloc(NodeKind::Comment(data.to_string()), location);
        self.tree.append_child(parent, comment);
    }

    fn append_characters(&mut self, parent: NodeId, data: &str, location: Location) {
        // Adjacent character runs coalesce into one node, as DOM text
        // insertion does.
        if let Some(last) = self.tree.last_child(parent)
            && self.tree.as_characters(last).is_some()
        {
            self.tree.push_characters(last, data);
            return;
        }
        let text = self
            .tree
            .alloc(NodeKind::Characters(data.to_string()), location);
        self.tree.append_child(parent, text);
    }

    fn insert_characters_to_foster_parent(
        &mut self,
        table: NodeId,
        stack_parent: NodeId,
        data: &str,
        location: Location,
    ) {
        let Some(parent) = self.tree.parent(table) else {
            self.append_characters(stack_parent, data, location);
            return;
        };
        if let Some(prev) = self.tree.prev_sibling(table)
            && self.tree.as_characters(prev).is_some()
        {
            self.tree.push_characters(prev, data);
            return;
        }
        let text = self
            .tree
            .alloc(NodeKind::Characters(data.to_string()), location);
        self.tree.insert_before(parent, text, Some(table));
    }

    fn attach_node(&mut self, child: NodeId, parent: NodeId) {
        self.tree.append_child(parent, child);
    }

    fn attach_node_to_foster_parent(
        &mut self,
        child: NodeId,
        table: NodeId,
        stack_parent: NodeId,
    ) {
        match self.tree.parent(table) {
            Some(parent) => self.tree.insert_before(parent, child, Some(table)),
            None => self.tree.append_child(stack_parent, child),
        }
    }

    fn detach_from_parent(&mut self, node: NodeId) {
        self.tree.detach(node);
    }

    fn reparent_children(&mut self, old_parent: NodeId, new_parent: NodeId) {
        self.tree.reparent_children(old_parent, new_parent);
    }

    fn add_attributes_to_element(&mut self, element: NodeId, attributes: &[Attribute]) {
        if let Some(node) = self.tree.get_mut(element)
            && let NodeKind::Element(data) = &mut node.kind
        {
            for attribute in attributes {
                if !data.attributes.iter().any(|a| a.name == attribute.name) {
                    data.attributes.push(attribute.clone());
                }
            }
        }
    }

    fn mark_end(&mut self, node: NodeId, location: Location) {
        self.tree.set_end_location(node, location);
    }
}
