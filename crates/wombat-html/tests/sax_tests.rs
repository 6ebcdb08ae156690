//! Integration tests for the SAX facade: callback stream shape,
//! fragment parsing, error delivery.

use wombat_dom::{Attribute, Location, NodeKind};
use wombat_html::{ContentHandler, ErrorCollector, SaxParser};

/// Records the callback stream for assertions.
#[derive(Default)]
struct Recorder {
    start_documents: usize,
    end_documents: usize,
    start_elements: Vec<String>,
    end_elements: Vec<String>,
    text: String,
    comments: Vec<String>,
    dtd: Option<String>,
    prefix_mappings: Vec<(String, String)>,
}

impl ContentHandler for Recorder {
    fn start_document(&mut self) {
        self.start_documents += 1;
    }
    fn end_document(&mut self, _location: Location) {
        self.end_documents += 1;
    }
    fn start_element(
        &mut self,
        _uri: &str,
        local_name: &str,
        _qname: &str,
        _attributes: &[Attribute],
        _location: Location,
    ) {
        self.start_elements.push(local_name.to_string());
    }
    fn end_element(&mut self, _uri: &str, local_name: &str, _qname: &str, _location: Location) {
        self.end_elements.push(local_name.to_string());
    }
    fn characters(&mut self, data: &str, _location: Location) {
        self.text.push_str(data);
    }
    fn comment(&mut self, data: &str, _location: Location) {
        self.comments.push(data.to_string());
    }
    fn start_dtd(
        &mut self,
        name: &str,
        _public_id: Option<&str>,
        _system_id: Option<&str>,
        _location: Location,
    ) {
        self.dtd = Some(name.to_string());
    }
    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) {
        self.prefix_mappings.push((prefix.to_string(), uri.to_string()));
    }
}

fn record(html: &str) -> (Recorder, ErrorCollector) {
    let parser = SaxParser::new();
    let mut recorder = Recorder::default();
    let mut errors = ErrorCollector::new();
    parser.parse(html, &mut recorder, &mut errors);
    (recorder, errors)
}

#[test]
fn document_events_fire_exactly_once() {
    let (recorder, _) = record("<!DOCTYPE html><p>hello</p>");
    assert_eq!(recorder.start_documents, 1);
    assert_eq!(recorder.end_documents, 1);
}

#[test]
fn element_events_are_balanced() {
    let (recorder, _) = record("<!DOCTYPE html><div><p>a<b>b</p>c");
    assert_eq!(recorder.start_elements.len(), recorder.end_elements.len());
}

#[test]
fn element_events_are_balanced_on_garbage() {
    let (recorder, errors) = record("</p><table><td>x</b></caption><b><b><i>y");
    assert_eq!(recorder.start_elements.len(), recorder.end_elements.len());
    assert_eq!(recorder.start_documents, 1);
    assert_eq!(recorder.end_documents, 1);
    assert!(!errors.errors.is_empty());
}

#[test]
fn callback_stream_carries_content() {
    let (recorder, _) = record("<!DOCTYPE html><body><!-- c --><p>text</p></body>");
    assert_eq!(recorder.dtd.as_deref(), Some("html"));
    assert_eq!(recorder.comments, vec![" c ".to_string()]);
    assert_eq!(recorder.text, "text");
    assert!(recorder.start_elements.contains(&"p".to_string()));
}

#[test]
fn errors_are_delivered_with_locations() {
    let parser = SaxParser::new();
    let mut recorder = Recorder::default();
    let mut errors = ErrorCollector::new();
    parser.parse("<p>\n<b></p>", &mut recorder, &mut errors);
    assert!(
        errors
            .errors
            .iter()
            .any(|e| e.code == "expected-doctype-but-got-start-tag")
    );
    let late = errors
        .errors
        .iter()
        .find(|e| e.code == "unexpected-implied-end-tag")
        .expect("implied end tag error for the open <b>");
    assert_eq!(late.location.line, 1);
    assert!(!late.message.is_empty());
}

#[test]
fn prefix_mappings_bracket_elements() {
    let (recorder, _) = record(r#"<!DOCTYPE html><svg xmlns:xlink="http://www.w3.org/1999/xlink"></svg>"#);
    assert_eq!(
        recorder.prefix_mappings,
        vec![(
            "xlink".to_string(),
            "http://www.w3.org/1999/xlink".to_string()
        )]
    );
}

#[test]
fn fragment_parse_emits_content_without_document_chrome() {
    let parser = SaxParser::new();
    let mut recorder = Recorder::default();
    let mut errors = ErrorCollector::new();
    parser.parse_fragment("a<b>c</b>", "div", &mut recorder, &mut errors);
    assert_eq!(recorder.start_documents, 1);
    assert_eq!(recorder.end_documents, 1);
    assert_eq!(recorder.start_elements, vec!["b".to_string()]);
    assert_eq!(recorder.text, "ac");
}

#[test]
fn fragment_context_td_bootstraps_cell_mode() {
    // Inside a cell, bare text must not be subject to foster parenting.
    let parser = SaxParser::new();
    let (tree, fragment, _) = parser.parse_fragment_to_tree("bare text", "td");
    let children = tree.children(fragment);
    assert_eq!(children.len(), 1);
    assert_eq!(tree.as_characters(children[0]), Some("bare text"));
}

#[test]
fn fragment_context_tr_builds_cells() {
    let parser = SaxParser::new();
    let (tree, fragment, _) = parser.parse_fragment_to_tree("<td>x</td><td>y</td>", "tr");
    let names: Vec<_> = tree
        .children(fragment)
        .iter()
        .filter_map(|&c| tree.as_element(c).map(|d| d.local_name.clone()))
        .collect();
    assert_eq!(names, vec!["td", "td"]);
}

#[test]
fn fragment_context_title_is_rcdata() {
    let parser = SaxParser::new();
    let (tree, fragment, _) = parser.parse_fragment_to_tree("<b>not markup</b>", "title");
    let children = tree.children(fragment);
    assert_eq!(children.len(), 1);
    assert!(matches!(
        tree.get(children[0]).map(|n| &n.kind),
        Some(NodeKind::Characters(data)) if data == "<b>not markup</b>"
    ));
}

#[test]
fn scripting_flag_changes_noscript_handling() {
    let mut parser = SaxParser::new();
    parser.set_scripting_enabled(true);
    let (tree, _) = parser.parse_to_tree("<!DOCTYPE html><head><noscript><p>x</p></noscript></head>");
    let mut found_p = false;
    for i in 0..tree.len() {
        if tree
            .as_element(wombat_dom::NodeId(i))
            .is_some_and(|d| d.local_name == "p")
        {
            found_p = true;
        }
    }
    assert!(!found_p, "with scripting on, noscript content is raw text");

    parser.set_scripting_enabled(false);
    let (tree, _) = parser.parse_to_tree("<!DOCTYPE html><head><noscript><p>x</p></noscript></head>");
    let mut found_p = false;
    for i in 0..tree.len() {
        if tree
            .as_element(wombat_dom::NodeId(i))
            .is_some_and(|d| d.local_name == "p")
        {
            found_p = true;
        }
    }
    assert!(found_p, "with scripting off, noscript content is parsed");
}
