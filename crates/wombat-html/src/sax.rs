//! The parser facade.
//!
//! Orchestrates Tokenizer → TreeBuilder → SaxTreeBuilder → TreeParser
//! for whole-document and fragment parsing. The pump forwards each
//! token to the tree stage, then applies the tree stage's tokenizer
//! feedback (raw-text state switches, CDATA permission, self-closing
//! acknowledgment) before lexing the next token, mirroring the
//! synchronous coupling the parsing algorithm assumes.

use wombat_dom::{DomTree, NodeId};

use crate::builder::SaxTreeBuilder;
use crate::errors::{ErrorHandler, ParseError, format_message};
use crate::stream::ReadResult;
use crate::tokenizer::{Token, Tokenizer};
use crate::traverse::{ContentHandler, TreeParser};
use crate::treebuilder::{TreeBuilder, TreeSink};

/// Whole-document and fragment HTML parser with a SAX event surface.
///
/// Each parse call owns an independent tokenizer/tree-builder/stack
/// instance; the parser itself carries only configuration.
#[derive(Debug, Default, Clone)]
pub struct SaxParser {
    scripting_enabled: bool,
}

impl SaxParser {
    /// Create a parser with scripting disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `<noscript>` content is treated as raw text.
    #[must_use]
    pub const fn scripting_enabled(&self) -> bool {
        self.scripting_enabled
    }

    /// Toggle the scripting flag for subsequent parses.
    pub const fn set_scripting_enabled(&mut self, enabled: bool) {
        self.scripting_enabled = enabled;
    }

    /// Parse a whole document, delivering the traversal callback
    /// stream to `content` and every parse error to `errors`.
    pub fn parse(
        &self,
        source: &str,
        content: &mut dyn ContentHandler,
        errors: &mut dyn ErrorHandler,
    ) {
        let (tree, parse_errors) = self.parse_to_tree(source);
        TreeParser::new(&tree).parse(tree.root(), content);
        for error in parse_errors {
            errors.error(error);
        }
    }

    /// Parse a fragment against a context element name, delivering
    /// callbacks for the fragment's content.
    pub fn parse_fragment(
        &self,
        source: &str,
        context: &str,
        content: &mut dyn ContentHandler,
        errors: &mut dyn ErrorHandler,
    ) {
        let (tree, fragment, parse_errors) = self.parse_fragment_to_tree(source, context);
        TreeParser::new(&tree).parse(fragment, content);
        for error in parse_errors {
            errors.error(error);
        }
    }

    /// Parse a whole document and return the node tree plus the error
    /// list.
    #[must_use]
    pub fn parse_to_tree(&self, source: &str) -> (DomTree, Vec<ParseError>) {
        let (builder, errors) = self.run(source, None);
        (builder.into_sink().into_tree(), errors)
    }

    /// Parse a fragment and return the node tree, the fragment root
    /// node, and the error list.
    ///
    /// The context element name seeds the starting insertion mode (and
    /// the tokenizer state for raw-text contexts like `title` or
    /// `script`), so e.g. context `"td"` parses as if already inside a
    /// table cell.
    ///
    /// # Panics
    ///
    /// Panics if the fragment bootstrap failed to seed its synthetic
    /// root, which would be a parser bug rather than bad input.
    #[must_use]
    pub fn parse_fragment_to_tree(
        &self,
        source: &str,
        context: &str,
    ) -> (DomTree, NodeId, Vec<ParseError>) {
        let (mut builder, errors) = self.run(source, Some(context));
        let root_element = builder
            .root_node()
            .expect("fragment parsing always seeds a synthetic root");
        let fragment = builder.sink_mut().extract_fragment(root_element);
        (builder.into_sink().into_tree(), fragment, errors)
    }

    /// The pump: feed the whole source, then shuttle tokens into the
    /// tree stage until the end-of-file token has been processed.
    fn run(
        &self,
        source: &str,
        context: Option<&str>,
    ) -> (TreeBuilder<SaxTreeBuilder>, Vec<ParseError>) {
        let mut tokenizer = Tokenizer::new();
        let mut builder = TreeBuilder::new(SaxTreeBuilder::new(), self.scripting_enabled);
        if let Some(context) = context {
            builder.set_fragment_context(context);
            if let Some(kind) = builder.fragment_raw_text_kind() {
                tokenizer.switch_to_raw(kind);
            }
        }
        builder.start();

        tokenizer.feed(source);
        tokenizer.end();

        let mut errors = Vec::new();
        loop {
            match tokenizer.next_token() {
                ReadResult::Ready((token, location)) => {
                    errors.append(&mut tokenizer.take_errors());
                    let self_closing_start =
                        matches!(token, Token::StartTag { self_closing: true, .. });
                    let tag_name = token.tag_name().map(ToString::to_string);
                    let done = token.is_eof();

                    builder.process_token(&token, location);
                    errors.append(&mut builder.take_errors());

                    if let Some(kind) = builder.take_raw_switch() {
                        tokenizer.switch_to_raw(kind);
                    }
                    tokenizer.set_cdata_allowed(builder.is_cdata_allowed());
                    if self_closing_start && !builder.take_self_closing_acknowledged() {
                        let name = tag_name.unwrap_or_default();
                        errors.push(ParseError {
                            code: "non-void-element-with-trailing-solidus",
                            message: format_message("non-void-element-with-trailing-solidus", &[(
                                "name", &name,
                            )]),
                            location,
                        });
                    }
                    if done {
                        break;
                    }
                }
                // The stream was closed up front, so the tokenizer can
                // only finish or run out of tokens.
                ReadResult::Eof | ReadResult::NeedsData => break,
            }
        }
        errors.append(&mut tokenizer.take_errors());

        let document = builder.sink().document();
        let end = tokenizer.location();
        builder.sink_mut().mark_end(document, end);
        (builder, errors)
    }
}
