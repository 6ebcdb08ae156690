//! Depth-first tree traversal emitting a SAX-style callback stream.
//!
//! The walk uses the tree's first-child/next-sibling/parent links, so
//! it needs no auxiliary stack and composes with streaming consumers:
//! `visit` fires on node entry, `revisit` on exit, and elements that
//! declared namespace prefixes are bracketed with prefix-mapping
//! callbacks.

use wombat_dom::{Attribute, DomTree, Location, NodeId, NodeKind};

/// Receiver for the traversal callback stream.
///
/// All methods default to no-ops so consumers implement only what they
/// need. For every parse, `start_document`/`end_document` fire exactly
/// once and `start_element`/`end_element` calls are balanced.
pub trait ContentHandler {
    /// The document (or fragment) walk begins.
    fn start_document(&mut self) {}
    /// The walk is complete.
    fn end_document(&mut self, _location: Location) {}
    /// An element opens.
    fn start_element(
        &mut self,
        _uri: &str,
        _local_name: &str,
        _qname: &str,
        _attributes: &[Attribute],
        _location: Location,
    ) {
    }
    /// An element closes.
    fn end_element(&mut self, _uri: &str, _local_name: &str, _qname: &str, _location: Location) {}
    /// A run of character data.
    fn characters(&mut self, _data: &str, _location: Location) {}
    /// A run of ignorable whitespace.
    fn ignorable_whitespace(&mut self, _data: &str, _location: Location) {}
    /// A comment.
    fn comment(&mut self, _data: &str, _location: Location) {}
    /// A doctype opens.
    fn start_dtd(
        &mut self,
        _name: &str,
        _public_id: Option<&str>,
        _system_id: Option<&str>,
        _location: Location,
    ) {
    }
    /// The doctype closes.
    fn end_dtd(&mut self) {}
    /// A namespace prefix mapping comes into scope.
    fn start_prefix_mapping(&mut self, _prefix: &str, _uri: &str) {}
    /// A namespace prefix mapping goes out of scope.
    fn end_prefix_mapping(&mut self, _prefix: &str) {}
    /// A processing instruction.
    fn processing_instruction(&mut self, _target: &str, _data: &str, _location: Location) {}
    /// A skipped entity reference.
    fn skipped_entity(&mut self, _name: &str, _location: Location) {}
}

/// Depth-first visit/revisit walker over a finished [`DomTree`].
#[derive(Debug)]
pub struct TreeParser<'t> {
    tree: &'t DomTree,
}

impl<'t> TreeParser<'t> {
    /// Create a walker over the given tree.
    #[must_use]
    pub const fn new(tree: &'t DomTree) -> Self {
        Self { tree }
    }

    /// Walk the subtree rooted at `root`, delivering callbacks.
    pub fn parse(&self, root: NodeId, handler: &mut dyn ContentHandler) {
        let mut current = root;
        loop {
            self.visit(current, handler);
            if let Some(child) = self.tree.first_child(current) {
                current = child;
                continue;
            }
            loop {
                self.revisit(current, handler);
                if current == root {
                    return;
                }
                if let Some(next) = self.tree.next_sibling(current) {
                    current = next;
                    break;
                }
                let Some(parent) = self.tree.parent(current) else {
                    return;
                };
                current = parent;
            }
        }
    }

    fn visit(&self, id: NodeId, handler: &mut dyn ContentHandler) {
        let Some(node) = self.tree.get(id) else {
            return;
        };
        match &node.kind {
            NodeKind::Document | NodeKind::DocumentFragment => handler.start_document(),
            NodeKind::DocumentType {
                name,
                public_id,
                system_id,
            } => handler.start_dtd(
                name,
                public_id.as_deref(),
                system_id.as_deref(),
                node.location,
            ),
            NodeKind::Element(data) => {
                for (prefix, uri) in &data.prefix_mappings {
                    handler.start_prefix_mapping(prefix, uri);
                }
                handler.start_element(
                    &data.namespace_uri,
                    &data.local_name,
                    &data.qualified_name,
                    &data.attributes,
                    node.location,
                );
            }
            NodeKind::Characters(data) => handler.characters(data, node.location),
            NodeKind::IgnorableWhitespace(data) => {
                handler.ignorable_whitespace(data, node.location);
            }
            NodeKind::Comment(data) => handler.comment(data, node.location),
            NodeKind::ProcessingInstruction { target, data } => {
                handler.processing_instruction(target, data, node.location);
            }
            NodeKind::SkippedEntity(name) => handler.skipped_entity(name, node.location),
            // Entity boundaries are traversed transparently; their
            // children surface as ordinary content.
            NodeKind::Entity(_) => {}
        }
    }

    fn revisit(&self, id: NodeId, handler: &mut dyn ContentHandler) {
        let Some(node) = self.tree.get(id) else {
            return;
        };
        let end = node.end_location.unwrap_or(node.location);
        match &node.kind {
            NodeKind::Document | NodeKind::DocumentFragment => handler.end_document(end),
            NodeKind::DocumentType { .. } => handler.end_dtd(),
            NodeKind::Element(data) => {
                handler.end_element(
                    &data.namespace_uri,
                    &data.local_name,
                    &data.qualified_name,
                    end,
                );
                for (prefix, _) in data.prefix_mappings.iter().rev() {
                    handler.end_prefix_mapping(prefix);
                }
            }
            _ => {}
        }
    }
}
