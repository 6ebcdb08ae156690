//! Integration tests for tree construction.

use wombat_dom::{DomTree, HTML_NAMESPACE, NodeId, NodeKind, SVG_NAMESPACE, XLINK_NAMESPACE};
use wombat_html::SaxParser;

/// Parse a document and return the tree.
fn parse(html: &str) -> DomTree {
    SaxParser::new().parse_to_tree(html).0
}

/// Parse a document and return the tree plus the error codes.
fn parse_with_errors(html: &str) -> (DomTree, Vec<&'static str>) {
    let (tree, errors) = SaxParser::new().parse_to_tree(html);
    (tree, errors.into_iter().map(|e| e.code).collect())
}

/// First element with the given local name, depth-first.
fn find_element(tree: &DomTree, from: NodeId, local_name: &str) -> Option<NodeId> {
    if tree
        .as_element(from)
        .is_some_and(|data| data.local_name == local_name)
    {
        return Some(from);
    }
    for &child in tree.children(from) {
        if let Some(found) = find_element(tree, child, local_name) {
            return Some(found);
        }
    }
    None
}

/// Concatenated text content of a subtree.
fn text_content(tree: &DomTree, id: NodeId) -> String {
    let mut result = String::new();
    match tree.get(id).map(|n| &n.kind) {
        Some(NodeKind::Characters(data)) => result.push_str(data),
        _ => {
            for &child in tree.children(id) {
                result.push_str(&text_content(tree, child));
            }
        }
    }
    result
}

/// Local names of the element children of a node.
fn child_element_names(tree: &DomTree, id: NodeId) -> Vec<String> {
    tree.children(id)
        .iter()
        .filter_map(|&c| tree.as_element(c).map(|d| d.local_name.clone()))
        .collect()
}

#[test]
fn document_structure() {
    let tree = parse("<!DOCTYPE html><html><head></head><body></body></html>");
    let root = tree.root();
    assert!(matches!(tree.get(root).unwrap().kind, NodeKind::Document));
    assert!(
        tree.children(root)
            .iter()
            .any(|&c| matches!(tree.get(c).unwrap().kind, NodeKind::DocumentType { .. }))
    );
    let html = find_element(&tree, root, "html").unwrap();
    assert_eq!(child_element_names(&tree, html), vec!["head", "body"]);
}

#[test]
fn implied_structure_is_synthesized() {
    let tree = parse("hello");
    let html = find_element(&tree, tree.root(), "html").unwrap();
    assert_eq!(child_element_names(&tree, html), vec!["head", "body"]);
    let body = find_element(&tree, tree.root(), "body").unwrap();
    assert_eq!(text_content(&tree, body), "hello");
}

#[test]
fn missing_doctype_is_reported() {
    let (_, errors) = parse_with_errors("<html></html>");
    assert!(errors.contains(&"expected-doctype-but-got-start-tag"));
}

#[test]
fn plain_doctype_is_clean() {
    let (_, errors) = parse_with_errors("<!DOCTYPE html><p>x</p>");
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
}

#[test]
fn quirky_doctype_is_reported() {
    let (_, errors) =
        parse_with_errors(r#"<!DOCTYPE html PUBLIC "-//W3C//DTD HTML 3.2 Final//EN"><p>x"#);
    assert!(errors.contains(&"quirky-doctype"));
}

#[test]
fn element_attributes_first_occurrence_wins() {
    let tree = parse(r#"<!DOCTYPE html><div id="main" class="a b"></div>"#);
    let div = find_element(&tree, tree.root(), "div").unwrap();
    let data = tree.as_element(div).unwrap();
    assert_eq!(data.attribute("id"), Some("main"));
    assert_eq!(data.attribute("class"), Some("a b"));
    assert_eq!(data.namespace_uri, HTML_NAMESPACE);
}

#[test]
fn comment_nodes_are_preserved() {
    let tree = parse("<!DOCTYPE html><body><!-- note --></body>");
    let body = find_element(&tree, tree.root(), "body").unwrap();
    let has_comment = tree
        .children(body)
        .iter()
        .any(|&c| matches!(&tree.get(c).unwrap().kind, NodeKind::Comment(data) if data == " note "));
    assert!(has_comment);
}

#[test]
fn paragraph_closes_implicitly_and_formatting_reconstructs() {
    // "<p>a<b>b</p>c": the open <b> survives the </p> and is
    // reconstructed around "c".
    let tree = parse("<p>a<b>b</p>c");
    let body = find_element(&tree, tree.root(), "body").unwrap();
    assert_eq!(child_element_names(&tree, body), vec!["p", "b"]);

    let p = tree.children(body)[0];
    assert_eq!(text_content(&tree, p), "ab");
    let b_in_p = find_element(&tree, p, "b").unwrap();
    assert_eq!(text_content(&tree, b_in_p), "b");

    let reconstructed = tree.children(body)[1];
    assert_eq!(text_content(&tree, reconstructed), "c");
}

#[test]
fn adoption_agency_reparents_block_content() {
    // The spec's canonical example: "<b>1<p>2</b>3</p>" becomes
    // <b>1</b><p><b>2</b>3</p>.
    let tree = parse("<b>1<p>2</b>3</p>");
    let body = find_element(&tree, tree.root(), "body").unwrap();
    assert_eq!(child_element_names(&tree, body), vec!["b", "p"]);

    let b = tree.children(body)[0];
    assert_eq!(text_content(&tree, b), "1");

    let p = tree.children(body)[1];
    let children = tree.children(p);
    assert_eq!(children.len(), 2);
    let inner_b = children[0];
    assert_eq!(
        tree.as_element(inner_b).unwrap().local_name,
        "b",
        "the formatting element is cloned into the block"
    );
    assert_eq!(text_content(&tree, inner_b), "2");
    assert_eq!(tree.as_characters(children[1]), Some("3"));
}

#[test]
fn adoption_agency_formatting_run_with_nested_block() {
    let tree = parse("<b>1<i>2<p>3</p>4</i>5</b>");
    let body = find_element(&tree, tree.root(), "body").unwrap();
    let b = tree.children(body)[0];
    assert_eq!(tree.as_element(b).unwrap().local_name, "b");
    assert_eq!(text_content(&tree, b), "12345");
    let i = find_element(&tree, b, "i").unwrap();
    assert_eq!(text_content(&tree, i), "234");
    let p = find_element(&tree, i, "p").unwrap();
    assert_eq!(text_content(&tree, p), "3");
}

/// Depth of the chain of `b` elements wrapping the text node that
/// carries `marker`.
fn bold_depth_around(tree: &DomTree, from: NodeId, marker: &str) -> usize {
    fn walk(tree: &DomTree, id: NodeId, marker: &str, depth: usize) -> Option<usize> {
        if let Some(NodeKind::Characters(data)) = tree.get(id).map(|n| &n.kind)
            && data.contains(marker)
        {
            return Some(depth);
        }
        let next_depth = if tree.as_element(id).is_some_and(|d| d.local_name == "b") {
            depth + 1
        } else {
            depth
        };
        for &child in tree.children(id) {
            if let Some(found) = walk(tree, child, marker, next_depth) {
                return Some(found);
            }
        }
        None
    }
    walk(tree, from, marker, 0).expect("marker text not found")
}

#[test]
fn noahs_ark_caps_identical_formatting_entries_at_three() {
    // Four identical <b> entries: the oldest is evicted from the
    // active list, so only three are reconstructed around "y".
    let tree = parse("<p><b><b><b><b>x</p>y");
    let body = find_element(&tree, tree.root(), "body").unwrap();
    assert_eq!(bold_depth_around(&tree, body, "x"), 4, "the stack is untouched");
    assert_eq!(bold_depth_around(&tree, body, "y"), 3, "the oldest entry was evicted");
}

#[test]
fn noahs_ark_distinguishes_attribute_sets() {
    // Distinct attribute sets never trip the Noah's Ark clause.
    let tree = parse(r#"<p><b a="1"><b a="2"><b a="3"><b a="4">x</p>y"#);
    let body = find_element(&tree, tree.root(), "body").unwrap();
    assert_eq!(bold_depth_around(&tree, body, "y"), 4);
}

#[test]
fn table_text_is_foster_parented_before_the_table() {
    let tree = parse("<!DOCTYPE html><table>foo<tr><td>bar</td></tr></table>");
    let body = find_element(&tree, tree.root(), "body").unwrap();
    let children = tree.children(body);
    assert_eq!(tree.as_characters(children[0]), Some("foo"));
    assert_eq!(tree.as_element(children[1]).unwrap().local_name, "table");

    let td = find_element(&tree, tree.root(), "td").unwrap();
    assert_eq!(text_content(&tree, td), "bar");
}

#[test]
fn whitespace_only_table_text_stays_in_the_table() {
    let tree = parse("<!DOCTYPE html><table>  <tr><td>x</td></tr></table>");
    let body = find_element(&tree, tree.root(), "body").unwrap();
    let table = tree.children(body)[0];
    assert_eq!(tree.as_element(table).unwrap().local_name, "table");
}

#[test]
fn table_structure_is_implied() {
    let tree = parse("<!DOCTYPE html><table><td>cell</td></table>");
    let table = find_element(&tree, tree.root(), "table").unwrap();
    let tbody = find_element(&tree, table, "tbody").unwrap();
    let tr = find_element(&tree, tbody, "tr").unwrap();
    let td = find_element(&tree, tr, "td").unwrap();
    assert_eq!(text_content(&tree, td), "cell");
}

#[test]
fn list_items_close_each_other() {
    let tree = parse("<!DOCTYPE html><ul><li>one<li>two</ul>");
    let ul = find_element(&tree, tree.root(), "ul").unwrap();
    assert_eq!(child_element_names(&tree, ul), vec!["li", "li"]);
    let first = tree.children(ul)[0];
    assert_eq!(text_content(&tree, first), "one");
}

#[test]
fn headers_do_not_nest() {
    let (tree, errors) = parse_with_errors("<!DOCTYPE html><h1>a<h2>b</h2>");
    let body = find_element(&tree, tree.root(), "body").unwrap();
    assert_eq!(child_element_names(&tree, body), vec!["h1", "h2"]);
    assert!(errors.contains(&"unexpected-start-tag"));
}

#[test]
fn select_in_table_gets_its_own_mode() {
    let tree = parse("<!DOCTYPE html><table><tr><td><select><table>");
    // The inner table start tag forces the select closed and the table
    // cell machinery keeps going.
    let select = find_element(&tree, tree.root(), "select").unwrap();
    assert!(tree.as_element(select).is_some());
}

#[test]
fn frameset_document() {
    let tree = parse("<!DOCTYPE html><frameset><frame></frameset>");
    let html = find_element(&tree, tree.root(), "html").unwrap();
    assert_eq!(child_element_names(&tree, html), vec!["head", "frameset"]);
    let frameset = find_element(&tree, html, "frameset").unwrap();
    assert_eq!(child_element_names(&tree, frameset), vec!["frame"]);
}

#[test]
fn svg_tag_names_are_case_adjusted() {
    let tree = parse("<!DOCTYPE html><svg><clippath></clippath></svg>");
    let svg = find_element(&tree, tree.root(), "svg").unwrap();
    assert_eq!(tree.as_element(svg).unwrap().namespace_uri, SVG_NAMESPACE);
    let clip = tree.children(svg)[0];
    let data = tree.as_element(clip).unwrap();
    assert_eq!(data.local_name, "clipPath");
    assert_eq!(data.namespace_uri, SVG_NAMESPACE);
}

#[test]
fn foreign_attributes_are_namespace_bound() {
    let tree = parse(r##"<!DOCTYPE html><svg xlink:href="#a"></svg>"##);
    let svg = find_element(&tree, tree.root(), "svg").unwrap();
    let attr = &tree.as_element(svg).unwrap().attributes[0];
    assert_eq!(attr.name, "xlink:href");
    assert_eq!(attr.local_name.as_deref(), Some("href"));
    assert_eq!(attr.namespace_uri.as_deref(), Some(XLINK_NAMESPACE));
}

#[test]
fn html_integration_point_resumes_html_rules() {
    let tree = parse("<!DOCTYPE html><svg><foreignObject><p>text</p></foreignObject></svg>");
    let fo = find_element(&tree, tree.root(), "foreignObject").unwrap();
    assert_eq!(tree.as_element(fo).unwrap().namespace_uri, SVG_NAMESPACE);
    let p = find_element(&tree, fo, "p").unwrap();
    assert_eq!(tree.as_element(p).unwrap().namespace_uri, HTML_NAMESPACE);
    assert_eq!(text_content(&tree, p), "text");
}

#[test]
fn html_breakout_tag_leaves_foreign_content() {
    let (tree, errors) = parse_with_errors("<!DOCTYPE html><svg><circle></circle><div>x</div>");
    assert!(errors.contains(&"unexpected-html-element-in-foreign-content"));
    let body = find_element(&tree, tree.root(), "body").unwrap();
    // The div is a sibling of the svg, back in the HTML namespace.
    assert_eq!(child_element_names(&tree, body), vec!["svg", "div"]);
    let div = find_element(&tree, body, "div").unwrap();
    assert_eq!(tree.as_element(div).unwrap().namespace_uri, HTML_NAMESPACE);
}

#[test]
fn rawtext_style_content_is_not_parsed() {
    let tree = parse("<!DOCTYPE html><style>p > a { color: red; }</style>");
    let style = find_element(&tree, tree.root(), "style").unwrap();
    assert_eq!(text_content(&tree, style), "p > a { color: red; }");
    assert!(find_element(&tree, style, "a").is_none());
}

#[test]
fn textarea_swallows_leading_newline() {
    let tree = parse("<!DOCTYPE html><textarea>\nkeep</textarea>");
    let textarea = find_element(&tree, tree.root(), "textarea").unwrap();
    assert_eq!(text_content(&tree, textarea), "keep");
}

#[test]
fn self_closing_div_reports_trailing_solidus() {
    let (_, errors) = parse_with_errors("<!DOCTYPE html><div/>x");
    assert!(errors.contains(&"non-void-element-with-trailing-solidus"));
}

#[test]
fn self_closing_void_element_is_acknowledged() {
    let (_, errors) = parse_with_errors("<!DOCTYPE html><br/>");
    assert!(!errors.contains(&"non-void-element-with-trailing-solidus"));
}

#[test]
fn unclosed_elements_survive_to_eof() {
    let (tree, errors) = parse_with_errors("<!DOCTYPE html><div><p>text");
    assert!(errors.contains(&"expected-closing-tag-but-got-eof"));
    let div = find_element(&tree, tree.root(), "div").unwrap();
    let p = find_element(&tree, div, "p").unwrap();
    assert_eq!(text_content(&tree, p), "text");
}

#[test]
fn cdata_in_foreign_content_is_text() {
    let tree = parse("<!DOCTYPE html><svg><![CDATA[a < b]]></svg>");
    let svg = find_element(&tree, tree.root(), "svg").unwrap();
    assert_eq!(text_content(&tree, svg), "a < b");
}

#[test]
fn cdata_outside_foreign_content_is_a_bogus_comment() {
    let (tree, errors) = parse_with_errors("<!DOCTYPE html><body><![CDATA[x]]></body>");
    assert!(errors.contains(&"expected-dashes-or-doctype"));
    let body = find_element(&tree, tree.root(), "body").unwrap();
    let has_comment = tree
        .children(body)
        .iter()
        .any(|&c| matches!(&tree.get(c).unwrap().kind, NodeKind::Comment(_)));
    assert!(has_comment);
}

#[test]
fn source_locations_advance() {
    let tree = parse("<!DOCTYPE html>\n<p>x</p>");
    let p = find_element(&tree, tree.root(), "p").unwrap();
    assert!(tree.get(p).unwrap().location.line >= 1);
}
