//! Tests for node tree mutation: detach, insert_before, reparent_children.

use wombat_dom::{Attribute, DomTree, ElementData, Location, NodeId, NodeKind};

/// Helper to create an HTML element node and return its NodeId.
fn alloc_element(tree: &mut DomTree, tag: &str) -> NodeId {
    tree.alloc(
        NodeKind::Element(ElementData {
            namespace_uri: wombat_dom::HTML_NAMESPACE.to_string(),
            local_name: tag.to_string(),
            qualified_name: tag.to_string(),
            attributes: Vec::new(),
            prefix_mappings: Vec::new(),
        }),
        Location::default(),
    )
}

// ========== detach ==========

#[test]
fn test_detach_single_child() {
    let mut tree = DomTree::new();
    let parent = alloc_element(&mut tree, "div");
    tree.append_child(NodeId::ROOT, parent);

    let child = alloc_element(&mut tree, "p");
    tree.append_child(parent, child);

    assert_eq!(tree.children(parent).len(), 1);

    tree.detach(child);

    assert_eq!(tree.children(parent).len(), 0);
    assert_eq!(tree.parent(child), None);
    assert_eq!(tree.prev_sibling(child), None);
    assert_eq!(tree.next_sibling(child), None);
}

#[test]
fn test_detach_middle_of_three() {
    let mut tree = DomTree::new();
    let parent = alloc_element(&mut tree, "div");
    tree.append_child(NodeId::ROOT, parent);

    let a = alloc_element(&mut tree, "a");
    let b = alloc_element(&mut tree, "b");
    let c = alloc_element(&mut tree, "c");
    tree.append_child(parent, a);
    tree.append_child(parent, b);
    tree.append_child(parent, c);

    tree.detach(b);

    // a and c are siblings now
    assert_eq!(tree.children(parent), &[a, c]);
    assert_eq!(tree.next_sibling(a), Some(c));
    assert_eq!(tree.prev_sibling(c), Some(a));
}

#[test]
fn test_detach_unattached_is_noop() {
    let mut tree = DomTree::new();
    let loose = alloc_element(&mut tree, "span");
    tree.detach(loose);
    assert_eq!(tree.parent(loose), None);
}

// ========== insert_before ==========

#[test]
fn test_insert_before_first_child() {
    let mut tree = DomTree::new();
    let parent = alloc_element(&mut tree, "div");
    tree.append_child(NodeId::ROOT, parent);

    let b = alloc_element(&mut tree, "b");
    tree.append_child(parent, b);

    let a = alloc_element(&mut tree, "a");
    tree.insert_before(parent, a, Some(b));

    assert_eq!(tree.children(parent), &[a, b]);
    assert_eq!(tree.first_child(parent), Some(a));
    assert_eq!(tree.next_sibling(a), Some(b));
    assert_eq!(tree.prev_sibling(b), Some(a));
    assert_eq!(tree.prev_sibling(a), None);
}

#[test]
fn test_insert_before_middle() {
    let mut tree = DomTree::new();
    let parent = alloc_element(&mut tree, "div");
    tree.append_child(NodeId::ROOT, parent);

    let a = alloc_element(&mut tree, "a");
    let c = alloc_element(&mut tree, "c");
    tree.append_child(parent, a);
    tree.append_child(parent, c);

    let b = alloc_element(&mut tree, "b");
    tree.insert_before(parent, b, Some(c));

    assert_eq!(tree.children(parent), &[a, b, c]);
    assert_eq!(tree.next_sibling(a), Some(b));
    assert_eq!(tree.next_sibling(b), Some(c));
    assert_eq!(tree.prev_sibling(c), Some(b));
}

#[test]
fn test_insert_before_none_appends() {
    let mut tree = DomTree::new();
    let parent = alloc_element(&mut tree, "div");
    tree.append_child(NodeId::ROOT, parent);

    let a = alloc_element(&mut tree, "a");
    tree.append_child(parent, a);
    let b = alloc_element(&mut tree, "b");
    tree.insert_before(parent, b, None);

    assert_eq!(tree.children(parent), &[a, b]);
    assert_eq!(tree.last_child(parent), Some(b));
}

#[test]
fn test_insert_before_moves_between_parents() {
    let mut tree = DomTree::new();
    let old_parent = alloc_element(&mut tree, "ul");
    let new_parent = alloc_element(&mut tree, "ol");
    tree.append_child(NodeId::ROOT, old_parent);
    tree.append_child(NodeId::ROOT, new_parent);

    let item = alloc_element(&mut tree, "li");
    tree.append_child(old_parent, item);
    let anchor = alloc_element(&mut tree, "li");
    tree.append_child(new_parent, anchor);

    tree.insert_before(new_parent, item, Some(anchor));

    assert_eq!(tree.children(old_parent), &[]);
    assert_eq!(tree.children(new_parent), &[item, anchor]);
    assert_eq!(tree.parent(item), Some(new_parent));
}

// ========== reparent_children ==========

#[test]
fn test_reparent_children_preserves_order() {
    let mut tree = DomTree::new();
    let old_parent = alloc_element(&mut tree, "i");
    let new_parent = alloc_element(&mut tree, "em");
    tree.append_child(NodeId::ROOT, old_parent);
    tree.append_child(NodeId::ROOT, new_parent);

    let a = alloc_element(&mut tree, "a");
    let b = alloc_element(&mut tree, "b");
    tree.append_child(old_parent, a);
    tree.append_child(old_parent, b);

    tree.reparent_children(old_parent, new_parent);

    assert_eq!(tree.children(old_parent), &[]);
    assert_eq!(tree.children(new_parent), &[a, b]);
    assert_eq!(tree.parent(a), Some(new_parent));
    assert_eq!(tree.parent(b), Some(new_parent));
    assert_eq!(tree.next_sibling(a), Some(b));
}

#[test]
fn test_reparent_children_appends_after_existing() {
    let mut tree = DomTree::new();
    let old_parent = alloc_element(&mut tree, "i");
    let new_parent = alloc_element(&mut tree, "em");
    tree.append_child(NodeId::ROOT, old_parent);
    tree.append_child(NodeId::ROOT, new_parent);

    let existing = alloc_element(&mut tree, "u");
    tree.append_child(new_parent, existing);
    let moved = alloc_element(&mut tree, "s");
    tree.append_child(old_parent, moved);

    tree.reparent_children(old_parent, new_parent);

    assert_eq!(tree.children(new_parent), &[existing, moved]);
    assert_eq!(tree.prev_sibling(moved), Some(existing));
}

// ========== element data ==========

#[test]
fn test_attribute_lookup() {
    let mut tree = DomTree::new();
    let id = tree.alloc(
        NodeKind::Element(ElementData {
            namespace_uri: wombat_dom::HTML_NAMESPACE.to_string(),
            local_name: "div".to_string(),
            qualified_name: "div".to_string(),
            attributes: vec![Attribute::new("id".to_string(), "main".to_string())],
            prefix_mappings: Vec::new(),
        }),
        Location::new(2, 5),
    );
    let data = tree.as_element(id).unwrap();
    assert_eq!(data.attribute("id"), Some("main"));
    assert_eq!(data.attribute("class"), None);
    assert_eq!(tree.get(id).unwrap().location, Location::new(2, 5));
}

#[test]
fn test_characters_coalescing() {
    let mut tree = DomTree::new();
    let text = tree.alloc(NodeKind::Characters("foo".to_string()), Location::default());
    tree.append_child(NodeId::ROOT, text);
    tree.push_characters(text, "bar");
    assert_eq!(tree.as_characters(text), Some("foobar"));
}
