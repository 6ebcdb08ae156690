//! Error-recovering WHATWG HTML parser with a SAX event surface.
//!
//! # Scope
//!
//! This crate implements:
//! - **HTML Tokenizer** ([WHATWG § 13.2.5](https://html.spec.whatwg.org/multipage/parsing.html#tokenization))
//!   over an incrementally-fed input stream with checkpoint/rollback,
//!   including RCDATA/RAWTEXT/script-data states, character references,
//!   DOCTYPE, comment and CDATA handling
//! - **HTML Tree Builder** ([WHATWG § 13.2.6](https://html.spec.whatwg.org/multipage/parsing.html#tree-construction))
//!   with the full insertion-mode set, the adoption-agency algorithm,
//!   foster parenting, the Noah's Ark clause, and SVG/MathML foreign
//!   content with integration points
//! - A SAX-style traversal ([`TreeParser`]) and facade ([`SaxParser`])
//!   delivering a push callback stream plus a machine-readable parse
//!   error list
//!
//! Malformed input never aborts a parse: every malformation maps to a
//! catalog error code and a defined recovery, and parsing always
//! yields a best-effort tree.

/// The concrete tree builder binding tree construction to `wombat-dom`.
pub mod builder;
/// Character reference decoding.
pub mod entities;
/// Parse-error catalog and reporting surface.
pub mod errors;
/// The parser facade.
pub mod sax;
/// Buffered incremental input stream.
pub mod stream;
/// The tokenizer.
pub mod tokenizer;
/// SAX-style tree traversal.
pub mod traverse;
/// Tree construction.
pub mod treebuilder;

pub use builder::SaxTreeBuilder;
pub use errors::{ErrorCollector, ErrorHandler, ParseError};
pub use sax::SaxParser;
pub use stream::{InputStream, ReadResult};
pub use tokenizer::{Token, Tokenizer, TokenizerState};
pub use traverse::{ContentHandler, TreeParser};
pub use treebuilder::{CompatMode, InsertionMode, TreeBuilder, TreeSink};

use wombat_dom::{DomTree, NodeId, NodeKind};

/// Print an indented dump of a subtree to stdout, for debugging.
pub fn print_tree(tree: &DomTree, id: NodeId, depth: usize) {
    let Some(node) = tree.get(id) else {
        return;
    };
    let indent = "  ".repeat(depth);
    match &node.kind {
        NodeKind::Document => println!("{indent}#document"),
        NodeKind::DocumentFragment => println!("{indent}#document-fragment"),
        NodeKind::DocumentType { name, .. } => println!("{indent}<!DOCTYPE {name}>"),
        NodeKind::Element(data) => {
            let mut attrs = String::new();
            for attr in &data.attributes {
                attrs.push_str(&format!(" {}=\"{}\"", attr.name, attr.value));
            }
            println!("{indent}<{}{attrs}>", data.qualified_name);
        }
        NodeKind::Characters(data) => println!("{indent}\"{}\"", data.escape_debug()),
        NodeKind::Comment(data) => println!("{indent}<!--{data}-->"),
        NodeKind::Entity(name) => println!("{indent}&{name};"),
        NodeKind::IgnorableWhitespace(_) => println!("{indent}#whitespace"),
        NodeKind::ProcessingInstruction { target, .. } => println!("{indent}<?{target}?>"),
        NodeKind::SkippedEntity(name) => println!("{indent}&{name}; (skipped)"),
    }
    for &child in tree.children(id) {
        print_tree(tree, child, depth + 1);
    }
}
