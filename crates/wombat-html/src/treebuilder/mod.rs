//! Tree construction: the insertion-mode state machine.
//!
//! [§ 13.2.6 Tree construction](https://html.spec.whatwg.org/multipage/parsing.html#tree-construction)
//!
//! Consumes tokens from the tokenizer, maintains the stack of open
//! elements and the list of active formatting elements, and drives all
//! tree mutation through the abstract [`TreeSink`] interface. Rule
//! matching within each insertion mode is first-match-wins and
//! order-sensitive; the ordering below preserves the spec's ordering,
//! which is what makes behavior correct on adversarial input.
//!
//! Every malformed shape reports a catalog error code and performs the
//! defined recovery; no input aborts tree construction.

pub mod foreign;
pub mod stack;

use strum_macros::Display;
use wombat_dom::{Attribute, HTML_NAMESPACE, Location, MATHML_NAMESPACE, SVG_NAMESPACE};

use crate::errors::{ParseError, format_message};
use crate::tokenizer::{RawTextKind, Token};

use self::foreign::{
    adjust_foreign_attributes, adjust_mathml_attributes, adjust_svg_attributes,
    adjust_svg_tag_name,
};
use self::stack::{ElementStack, StackItem};

/// Abstract tree-mutation interface.
///
/// The tree builder never touches nodes directly; a concrete
/// implementation (see `crate::builder::SaxTreeBuilder`) binds these
/// calls to an actual node family and stamps source locations.
pub trait TreeSink {
    /// Opaque handle to a live node.
    type Handle: Copy + PartialEq + std::fmt::Debug;

    /// The document (or fragment) root.
    fn document(&self) -> Self::Handle;

    /// Create a detached element.
    fn create_element(
        &mut self,
        namespace_uri: &str,
        local_name: &str,
        qualified_name: &str,
        attributes: &[Attribute],
        location: Location,
    ) -> Self::Handle;

    /// Append a doctype node to the document.
    fn insert_doctype(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
        location: Location,
    );

    /// Append a comment under `parent`.
    fn insert_comment(&mut self, parent: Self::Handle, data: &str, location: Location);

    /// Append character data under `parent`.
    fn append_characters(&mut self, parent: Self::Handle, data: &str, location: Location);

    /// Insert character data immediately before `table` when the table
    /// has a parent, otherwise append it to `stack_parent`
    /// (foster-parented table text).
    fn insert_characters_to_foster_parent(
        &mut self,
        table: Self::Handle,
        stack_parent: Self::Handle,
        data: &str,
        location: Location,
    );

    /// Append `child` under `parent`, detaching it first if needed.
    fn attach_node(&mut self, child: Self::Handle, parent: Self::Handle);

    /// Attach `child` immediately before `table` when the table has a
    /// parent, otherwise append it to `stack_parent`.
    fn attach_node_to_foster_parent(
        &mut self,
        child: Self::Handle,
        table: Self::Handle,
        stack_parent: Self::Handle,
    );

    /// Detach a node from its parent.
    fn detach_from_parent(&mut self, node: Self::Handle);

    /// Move all children of `old_parent` under `new_parent`.
    fn reparent_children(&mut self, old_parent: Self::Handle, new_parent: Self::Handle);

    /// Add the attributes that `element` does not already carry
    /// (first occurrence wins).
    fn add_attributes_to_element(&mut self, element: Self::Handle, attributes: &[Attribute]);

    /// Record where the element's markup ended.
    fn mark_end(&mut self, node: Self::Handle, location: Location);
}

/// [§ 13.2.4.1 The insertion mode](https://html.spec.whatwg.org/multipage/parsing.html#the-insertion-mode)
///
/// "The insertion mode is a state variable that controls the primary
/// operation of the tree construction stage."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum InsertionMode {
    /// The "initial" insertion mode.
    Initial,
    /// The "before html" insertion mode.
    BeforeHtml,
    /// The "before head" insertion mode.
    BeforeHead,
    /// The "in head" insertion mode.
    InHead,
    /// The "in head noscript" insertion mode.
    InHeadNoscript,
    /// The "after head" insertion mode.
    AfterHead,
    /// The "in body" insertion mode.
    InBody,
    /// The "text" insertion mode (RCDATA/RAWTEXT/script interludes).
    Text,
    /// The "in table" insertion mode.
    InTable,
    /// The "in table text" insertion mode.
    InTableText,
    /// The "in caption" insertion mode.
    InCaption,
    /// The "in column group" insertion mode.
    InColumnGroup,
    /// The "in table body" insertion mode.
    InTableBody,
    /// The "in row" insertion mode.
    InRow,
    /// The "in cell" insertion mode.
    InCell,
    /// The "in select" insertion mode.
    InSelect,
    /// The "in select in table" insertion mode.
    InSelectInTable,
    /// The foreign-content (SVG/MathML) insertion mode.
    InForeignContent,
    /// The "after body" insertion mode.
    AfterBody,
    /// The "in frameset" insertion mode.
    InFrameset,
    /// The "after frameset" insertion mode.
    AfterFrameset,
    /// The "after after body" insertion mode.
    AfterAfterBody,
    /// The "after after frameset" insertion mode.
    AfterAfterFrameset,
}

/// Document compatibility mode derived from the doctype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum CompatMode {
    /// Standards mode.
    #[default]
    NoQuirks,
    /// Almost-standards mode.
    LimitedQuirks,
    /// Quirks mode.
    Quirks,
}

/// [§ 13.2.4.3 The list of active formatting elements](https://html.spec.whatwg.org/multipage/parsing.html#the-list-of-active-formatting-elements)
///
/// "The list contains elements in the formatting category, and
/// markers."
#[derive(Debug, Clone)]
pub enum FormattingEntry<H> {
    /// A marker, pushed when entering applet, object, marquee, td, th
    /// and caption. It scopes the list so formatting from outside
    /// those elements does not leak inside.
    Marker,
    /// A formatting element entry, carrying everything needed to
    /// recreate the element during reconstruction.
    Element(StackItem<H>),
}

/// Public-identifier prefixes that force quirks mode.
static QUIRKY_PUBLIC_PREFIXES: &[&str] = &[
    "+//silmaril//dtd html pro v0r11 19970101//",
    "-//advasoft ltd//dtd html 3.0 aswedit + extensions//",
    "-//as//dtd html 3.0 aswedit + extensions//",
    "-//ietf//dtd html 2.0 level 1//",
    "-//ietf//dtd html 2.0 level 2//",
    "-//ietf//dtd html 2.0 strict level 1//",
    "-//ietf//dtd html 2.0 strict level 2//",
    "-//ietf//dtd html 2.0 strict//",
    "-//ietf//dtd html 2.0//",
    "-//ietf//dtd html 2.1e//",
    "-//ietf//dtd html 3.0//",
    "-//ietf//dtd html 3.2 final//",
    "-//ietf//dtd html 3.2//",
    "-//ietf//dtd html 3//",
    "-//ietf//dtd html level 0//",
    "-//ietf//dtd html level 1//",
    "-//ietf//dtd html level 2//",
    "-//ietf//dtd html level 3//",
    "-//ietf//dtd html strict level 0//",
    "-//ietf//dtd html strict level 1//",
    "-//ietf//dtd html strict level 2//",
    "-//ietf//dtd html strict level 3//",
    "-//ietf//dtd html strict//",
    "-//ietf//dtd html//",
    "-//metrius//dtd metrius presentational//",
    "-//microsoft//dtd internet explorer 2.0 html strict//",
    "-//microsoft//dtd internet explorer 2.0 html//",
    "-//microsoft//dtd internet explorer 2.0 tables//",
    "-//microsoft//dtd internet explorer 3.0 html strict//",
    "-//microsoft//dtd internet explorer 3.0 html//",
    "-//microsoft//dtd internet explorer 3.0 tables//",
    "-//netscape comm. corp.//dtd html//",
    "-//netscape comm. corp.//dtd strict html//",
    "-//o'reilly and associates//dtd html 2.0//",
    "-//o'reilly and associates//dtd html extended 1.0//",
    "-//o'reilly and associates//dtd html extended relaxed 1.0//",
    "-//softquad software//dtd hotmetal pro 6.0::19990601::extensions to html 4.0//",
    "-//softquad//dtd hotmetal pro 4.0::19971010::extensions to html 4.0//",
    "-//spyglass//dtd html 2.0 extended//",
    "-//sq//dtd html 2.0 hotmetal + extensions//",
    "-//sun microsystems corp.//dtd hotjava html//",
    "-//sun microsystems corp.//dtd hotjava strict html//",
    "-//w3c//dtd html 3 1995-03-24//",
    "-//w3c//dtd html 3.2 draft//",
    "-//w3c//dtd html 3.2 final//",
    "-//w3c//dtd html 3.2//",
    "-//w3c//dtd html 3.2s draft//",
    "-//w3c//dtd html 4.0 frameset//",
    "-//w3c//dtd html 4.0 transitional//",
    "-//w3c//dtd html experimental 19960712//",
    "-//w3c//dtd html experimental 970421//",
    "-//w3c//dtd w3 html//",
    "-//w3o//dtd w3 html 3.0//",
    "-//webtechs//dtd mozilla html 2.0//",
    "-//webtechs//dtd mozilla html//",
];

/// Public identifiers that force quirks mode on exact match.
static QUIRKY_PUBLIC_MATCHES: &[&str] = &[
    "-//w3o//dtd w3 html strict 3.0//en//",
    "-/w3c/dtd html 4.0 transitional/en",
    "html",
];

/// The one system identifier that forces quirks mode.
static QUIRKY_SYSTEM_MATCH: &str = "http://www.ibm.com/data/dtd/v11/ibmxhtml1-transitional.dtd";

/// Start tags that break out of foreign content back into HTML rules.
static FOREIGN_BREAKOUT_TAGS: &[&str] = &[
    "b",
    "big",
    "blockquote",
    "body",
    "br",
    "center",
    "code",
    "dd",
    "div",
    "dl",
    "dt",
    "em",
    "embed",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "head",
    "hr",
    "i",
    "img",
    "li",
    "listing",
    "menu",
    "meta",
    "nobr",
    "ol",
    "p",
    "pre",
    "ruby",
    "s",
    "small",
    "span",
    "strong",
    "strike",
    "sub",
    "sup",
    "table",
    "tt",
    "u",
    "ul",
    "var",
];

/// [§ 13.2.6.3 Closing elements that have implied end tags](https://html.spec.whatwg.org/multipage/parsing.html#generate-implied-end-tags)
static IMPLIED_END_TAGS: &[&str] = &["dd", "dt", "li", "option", "optgroup", "p", "rp", "rt"];

const fn is_all_whitespace(data: &str) -> bool {
    let bytes = data.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if !matches!(bytes[i], b'\t' | b'\n' | b'\x0C' | b'\r' | b' ') {
            return false;
        }
        i += 1;
    }
    true
}

fn split_leading_whitespace(data: &str) -> (&str, &str) {
    let rest = data.trim_start_matches(['\t', '\n', '\x0C', '\r', ' ']);
    let ws_len = data.len() - rest.len();
    (&data[..ws_len], rest)
}

fn to_dom_attributes(attributes: &[crate::tokenizer::Attribute]) -> Vec<Attribute> {
    attributes
        .iter()
        .map(|a| Attribute::new(a.name.clone(), a.value.clone()))
        .collect()
}

/// The tree-construction state machine, generic over the concrete tree
/// it mutates.
pub struct TreeBuilder<S: TreeSink> {
    sink: S,
    mode: InsertionMode,
    /// Saved mode restored when a "text" interlude ends.
    original_mode: InsertionMode,
    /// Saved mode restored when the last foreign element closes (the
    /// historical "secondary insertion mode").
    secondary_mode: InsertionMode,
    open_elements: ElementStack<S::Handle>,
    active_formatting: Vec<FormattingEntry<S::Handle>>,
    /// The saved `<head>` item, re-pushed for stray head-only tags
    /// seen after the head was closed.
    head_item: Option<StackItem<S::Handle>>,
    /// [§ 13.2.4.4 The element pointers](https://html.spec.whatwg.org/multipage/parsing.html#form-element-pointer)
    form: Option<S::Handle>,
    frameset_ok: bool,
    /// While set, insertions with a foster-parenting current node
    /// redirect to just before the nearest open table.
    redirect_attach_to_foster_parent: bool,
    pending_table_characters: Vec<String>,
    should_skip_leading_newline: bool,
    self_closing_acknowledged: bool,
    /// Fragment-parsing context element name, if any.
    context: Option<String>,
    scripting_enabled: bool,
    compat_mode: CompatMode,
    raw_switch: Option<RawTextKind>,
    errors: Vec<ParseError>,
    current_location: Location,
    finished: bool,
}

impl<S: TreeSink> TreeBuilder<S> {
    /// Create a tree builder over the given sink.
    pub fn new(sink: S, scripting_enabled: bool) -> Self {
        Self {
            sink,
            mode: InsertionMode::Initial,
            original_mode: InsertionMode::Initial,
            secondary_mode: InsertionMode::InBody,
            open_elements: ElementStack::new(),
            active_formatting: Vec::new(),
            head_item: None,
            form: None,
            frameset_ok: true,
            redirect_attach_to_foster_parent: false,
            pending_table_characters: Vec::new(),
            should_skip_leading_newline: false,
            self_closing_acknowledged: false,
            context: None,
            scripting_enabled,
            compat_mode: CompatMode::NoQuirks,
            raw_switch: None,
            errors: Vec::new(),
            current_location: Location::default(),
            finished: false,
        }
    }

    /// The concrete sink, for extracting the finished tree.
    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// The concrete sink, mutably.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Consume the builder, returning the sink.
    #[must_use]
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// The derived compatibility mode.
    #[must_use]
    pub const fn compat_mode(&self) -> CompatMode {
        self.compat_mode
    }

    /// Whether an end-of-file token has been processed.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// The root `<html>` element's node, once inserted (for fragment
    /// parses, the synthetic root).
    #[must_use]
    pub const fn root_node(&self) -> Option<S::Handle> {
        self.open_elements.root_node
    }

    /// Drain errors reported since the last call.
    pub fn take_errors(&mut self) -> Vec<ParseError> {
        std::mem::take(&mut self.errors)
    }

    /// A raw-text tokenizer switch requested by the last token, if any.
    pub fn take_raw_switch(&mut self) -> Option<RawTextKind> {
        self.raw_switch.take()
    }

    /// Whether the last self-closing start tag was acknowledged.
    pub fn take_self_closing_acknowledged(&mut self) -> bool {
        let acknowledged = self.self_closing_acknowledged;
        self.self_closing_acknowledged = false;
        acknowledged
    }

    /// "A CDATA section may only be placed in foreign content."
    #[must_use]
    pub fn is_cdata_allowed(&self) -> bool {
        self.open_elements.try_top().is_some_and(StackItem::is_foreign)
    }

    /// [§ 13.2.4 Parsing HTML fragments](https://html.spec.whatwg.org/multipage/parsing.html#parsing-html-fragments)
    ///
    /// Remember the context element name; [`Self::start`] seeds the
    /// synthetic root and derives the starting insertion mode from it.
    pub fn set_fragment_context(&mut self, context: &str) {
        self.context = Some(context.to_string());
    }

    /// The fragment context's raw-text flavor, used to bootstrap the
    /// tokenizer before any token flows.
    #[must_use]
    pub fn fragment_raw_text_kind(&self) -> Option<RawTextKind> {
        match self.context.as_deref() {
            Some("title" | "textarea") => Some(RawTextKind::Rcdata),
            Some("style" | "xmp" | "iframe" | "noembed" | "noframes") => Some(RawTextKind::Rawtext),
            Some("noscript") if self.scripting_enabled => Some(RawTextKind::Rawtext),
            Some("script") => Some(RawTextKind::ScriptData),
            Some("plaintext") => Some(RawTextKind::Plaintext),
            _ => None,
        }
    }

    /// Begin tree construction. For fragment parses this seeds the
    /// synthetic `<html>` root and resets the insertion mode against
    /// the context element.
    pub fn start(&mut self) {
        if self.context.is_some() {
            self.insert_html_element(Vec::new());
            self.reset_insertion_mode();
        }
    }

    fn parse_error(&mut self, code: &'static str, args: &[(&str, &str)]) {
        self.errors.push(ParseError {
            code,
            message: format_message(code, args),
            location: self.current_location,
        });
    }

    // ==== token entry ========================================================

    /// Process one token against the current insertion mode.
    pub fn process_token(&mut self, token: &Token, location: Location) {
        self.current_location = location;

        // The newline immediately after <pre>, <listing> or <textarea>
        // is dropped.
        let mut stripped = None;
        if self.should_skip_leading_newline {
            self.should_skip_leading_newline = false;
            if let Token::Characters { data } = token
                && let Some(rest) = data.strip_prefix('\n')
            {
                if rest.is_empty() {
                    return;
                }
                stripped = Some(Token::Characters {
                    data: rest.to_string(),
                });
            }
        }

        self.reprocess(stripped.as_ref().unwrap_or(token));
    }

    /// "Reprocess the token" in the (possibly changed) current mode.
    fn reprocess(&mut self, token: &Token) {
        if self.mode == InsertionMode::InForeignContent {
            self.handle_in_foreign_content(token);
            if self.mode == InsertionMode::InForeignContent
                && !self.open_elements.has_foreign_element()
            {
                self.mode = self.secondary_mode;
            }
        } else {
            self.process_with_mode(self.mode, token);
        }
    }

    /// "Process the token using the rules for" the given mode.
    fn process_with_mode(&mut self, mode: InsertionMode, token: &Token) {
        use InsertionMode as M;
        match mode {
            M::Initial => self.handle_initial(token),
            M::BeforeHtml => self.handle_before_html(token),
            M::BeforeHead => self.handle_before_head(token),
            M::InHead => self.handle_in_head(token),
            M::InHeadNoscript => self.handle_in_head_noscript(token),
            M::AfterHead => self.handle_after_head(token),
            M::InBody => self.handle_in_body(token),
            M::Text => self.handle_text(token),
            M::InTable => self.handle_in_table(token),
            M::InTableText => self.handle_in_table_text(token),
            M::InCaption => self.handle_in_caption(token),
            M::InColumnGroup => self.handle_in_column_group(token),
            M::InTableBody => self.handle_in_table_body(token),
            M::InRow => self.handle_in_row(token),
            M::InCell => self.handle_in_cell(token),
            M::InSelect => self.handle_in_select(token),
            M::InSelectInTable => self.handle_in_select_in_table(token),
            M::InForeignContent => self.handle_in_foreign_content(token),
            M::AfterBody => self.handle_after_body(token),
            M::InFrameset => self.handle_in_frameset(token),
            M::AfterFrameset => self.handle_after_frameset(token),
            M::AfterAfterBody => self.handle_after_after_body(token),
            M::AfterAfterFrameset => self.handle_after_after_frameset(token),
        }
    }

    // ==== insertion helpers ==================================================

    fn current_node(&self) -> S::Handle {
        self.open_elements.top().node
    }

    /// "Returns true if the redirect is required and the current open
    /// element causes foster parenting."
    fn should_foster_parent(&self) -> bool {
        self.redirect_attach_to_foster_parent
            && self
                .open_elements
                .try_top()
                .is_some_and(StackItem::is_foster_parenting)
    }

    fn create_element_item(
        &mut self,
        namespace_uri: &str,
        local_name: &str,
        qualified_name: &str,
        attributes: Vec<Attribute>,
    ) -> StackItem<S::Handle> {
        let node = self.sink.create_element(
            namespace_uri,
            local_name,
            qualified_name,
            &attributes,
            self.current_location,
        );
        StackItem::new(
            namespace_uri.to_string(),
            local_name.to_string(),
            attributes,
            node,
        )
    }

    /// Attach a node at the current insertion point, honoring the
    /// foster-parenting redirect.
    fn attach_at_insertion_point(&mut self, node: S::Handle) {
        if self.should_foster_parent() {
            self.insert_into_foster_parent(node);
        } else {
            let parent = self.current_node();
            self.sink.attach_node(node, parent);
        }
    }

    /// [§ 13.2.6.1 Foster parenting](https://html.spec.whatwg.org/multipage/parsing.html#foster-parent)
    fn insert_into_foster_parent(&mut self, node: S::Handle) {
        match self.open_elements.find_index("table") {
            Some(0) | None => {
                let root = self.open_elements.item(0).node;
                self.sink.attach_node(node, root);
            }
            Some(index) => {
                let table = self.open_elements.item(index).node;
                let stack_parent = self.open_elements.item(index - 1).node;
                self.sink.attach_node_to_foster_parent(node, table, stack_parent);
            }
        }
    }

    fn insert_element_returning(
        &mut self,
        name: &str,
        attributes: Vec<Attribute>,
    ) -> StackItem<S::Handle> {
        let item = self.create_element_item(HTML_NAMESPACE, name, name, attributes);
        self.attach_at_insertion_point(item.node);
        self.open_elements.push(item.clone());
        item
    }

    fn insert_element(&mut self, name: &str, attributes: Vec<Attribute>) {
        let _ = self.insert_element_returning(name, attributes);
    }

    fn insert_html_element(&mut self, attributes: Vec<Attribute>) {
        let item = self.create_element_item(HTML_NAMESPACE, "html", "html", attributes);
        let document = self.sink.document();
        self.sink.attach_node(item.node, document);
        self.open_elements.push_html_element(item);
    }

    fn insert_head_element(&mut self, attributes: Vec<Attribute>) {
        let item = self.create_element_item(HTML_NAMESPACE, "head", "head", attributes);
        let parent = self.current_node();
        self.sink.attach_node(item.node, parent);
        self.head_item = Some(item.clone());
        self.open_elements.push_head_element(item);
    }

    fn insert_body_element(&mut self, attributes: Vec<Attribute>) {
        let item = self.create_element_item(HTML_NAMESPACE, "body", "body", attributes);
        let parent = self.current_node();
        self.sink.attach_node(item.node, parent);
        self.open_elements.push_body_element(item);
    }

    fn insert_formatting_element(&mut self, name: &str, attributes: Vec<Attribute>) {
        let item = self.insert_element_returning(name, attributes);
        self.append_to_active_formatting(item);
    }

    /// Void elements: inserted, never pushed, self-closing flag
    /// acknowledged.
    fn insert_self_closing_element(&mut self, name: &str, attributes: Vec<Attribute>) {
        let item = self.create_element_item(HTML_NAMESPACE, name, name, attributes);
        self.attach_at_insertion_point(item.node);
        self.sink.mark_end(item.node, self.current_location);
        self.self_closing_acknowledged = true;
    }

    fn insert_foreign_element(
        &mut self,
        namespace_uri: &str,
        name: &str,
        attributes: Vec<Attribute>,
        self_closing: bool,
    ) {
        let item = self.create_element_item(namespace_uri, name, name, attributes);
        self.attach_at_insertion_point(item.node);
        if self_closing {
            self.sink.mark_end(item.node, self.current_location);
            self.self_closing_acknowledged = true;
        } else {
            self.open_elements.push(item);
        }
    }

    fn insert_comment(&mut self, data: &str) {
        let parent = self.current_node();
        self.sink.insert_comment(parent, data, self.current_location);
    }

    fn insert_comment_on_document(&mut self, data: &str) {
        let document = self.sink.document();
        self.sink.insert_comment(document, data, self.current_location);
    }

    fn insert_comment_on_root(&mut self, data: &str) {
        let root = self
            .open_elements
            .root_node
            .unwrap_or_else(|| self.sink.document());
        self.sink.insert_comment(root, data, self.current_location);
    }

    fn insert_text(&mut self, data: &str) {
        if self.should_foster_parent() {
            match self.open_elements.find_index("table") {
                Some(0) | None => {
                    let root = self.open_elements.item(0).node;
                    self.sink.append_characters(root, data, self.current_location);
                }
                Some(index) => {
                    let table = self.open_elements.item(index).node;
                    let stack_parent = self.open_elements.item(index - 1).node;
                    self.sink.insert_characters_to_foster_parent(
                        table,
                        stack_parent,
                        data,
                        self.current_location,
                    );
                }
            }
            return;
        }
        let parent = self.current_node();
        self.sink.append_characters(parent, data, self.current_location);
    }

    fn pop_element(&mut self) -> StackItem<S::Handle> {
        let item = self.open_elements.pop();
        self.sink.mark_end(item.node, self.current_location);
        item
    }

    /// [§ 13.2.6.3 Closing elements that have implied end tags](https://html.spec.whatwg.org/multipage/parsing.html#generate-implied-end-tags)
    fn generate_implied_end_tags(&mut self, exclude: Option<&str>) {
        loop {
            let top = self.open_elements.top();
            let name = top.local_name.clone();
            if !IMPLIED_END_TAGS.contains(&name.as_str()) || exclude == Some(name.as_str()) {
                break;
            }
            let _ = self.pop_element();
        }
    }

    // ==== active formatting elements =========================================

    fn formatting_index_of(&self, node: S::Handle) -> Option<usize> {
        self.active_formatting.iter().position(|entry| {
            matches!(entry, FormattingEntry::Element(item) if item.node == node)
        })
    }

    /// Topmost (most recent) entry with the given name since the last
    /// marker.
    fn element_in_active_formatting_elements(&self, name: &str) -> Option<usize> {
        for (index, entry) in self.active_formatting.iter().enumerate().rev() {
            match entry {
                FormattingEntry::Marker => return None,
                FormattingEntry::Element(item) if item.local_name == name => return Some(index),
                FormattingEntry::Element(_) => {}
            }
        }
        None
    }

    fn remove_from_active_formatting(&mut self, node: S::Handle) {
        if let Some(index) = self.formatting_index_of(node) {
            let _ = self.active_formatting.remove(index);
        }
    }

    fn push_formatting_marker(&mut self) {
        self.active_formatting.push(FormattingEntry::Marker);
    }

    /// "Clear the list of active formatting elements up to the last
    /// marker."
    fn clear_active_formatting_to_marker(&mut self) {
        while let Some(entry) = self.active_formatting.pop() {
            if matches!(entry, FormattingEntry::Marker) {
                break;
            }
        }
    }

    fn append_to_active_formatting(&mut self, item: StackItem<S::Handle>) {
        self.ensure_noahs_ark_condition(&item);
        self.active_formatting.push(FormattingEntry::Element(item));
    }

    /// The Noah's Ark clause: at most three entries per (namespace,
    /// tag, exact attribute set) since the last marker; a fourth evicts
    /// the oldest. Only the active list is touched, never the stack.
    fn ensure_noahs_ark_condition(&mut self, item: &StackItem<S::Handle>) {
        const CAPACITY: usize = 3;
        let mut matches: Vec<usize> = Vec::new();
        for (index, entry) in self.active_formatting.iter().enumerate().rev() {
            let candidate = match entry {
                FormattingEntry::Marker => break,
                FormattingEntry::Element(candidate) => candidate,
            };
            if candidate.local_name != item.local_name
                || candidate.namespace_uri != item.namespace_uri
                || candidate.attributes.len() != item.attributes.len()
            {
                continue;
            }
            let same_attributes = item.attributes.iter().all(|attr| {
                candidate.attribute(&attr.name) == Some(attr.value.as_str())
            });
            if same_attributes {
                matches.push(index);
            }
        }
        if matches.len() >= CAPACITY {
            // `matches` was collected newest-first; the last one is the
            // oldest duplicate.
            let oldest = *matches.last().expect("capacity check guarantees entries");
            let _ = self.active_formatting.remove(oldest);
        }
    }

    /// [§ 13.2.6.3 Reconstruct the active formatting elements](https://html.spec.whatwg.org/multipage/parsing.html#reconstruct-the-active-formatting-elements)
    fn reconstruct_active_formatting_elements(&mut self) {
        let Some(last) = self.active_formatting.last() else {
            return;
        };
        match last {
            FormattingEntry::Marker => return,
            FormattingEntry::Element(item) if self.open_elements.contains(item.node) => return,
            FormattingEntry::Element(_) => {}
        }

        // Rewind to the entry after the last marker or the last entry
        // still on the stack.
        let mut index = self.active_formatting.len() - 1;
        while index > 0 {
            match &self.active_formatting[index - 1] {
                FormattingEntry::Marker => break,
                FormattingEntry::Element(item) if self.open_elements.contains(item.node) => break,
                FormattingEntry::Element(_) => index -= 1,
            }
        }

        // Replay forward, re-creating each missing element.
        while index < self.active_formatting.len() {
            let (name, attributes) = match &self.active_formatting[index] {
                FormattingEntry::Element(item) => {
                    (item.local_name.clone(), item.attributes.clone())
                }
                FormattingEntry::Marker => unreachable!("markers were excluded by the rewind"),
            };
            let new_item = self.insert_element_returning(&name, attributes);
            self.active_formatting[index] = FormattingEntry::Element(new_item);
            index += 1;
        }
    }

    // ==== the adoption agency ================================================

    /// [The adoption agency algorithm](https://html.spec.whatwg.org/multipage/parsing.html#adoption-agency-algorithm)
    ///
    /// Bounded at 8 outer iterations. Returns `false` when no matching
    /// formatting element exists, in which case the caller falls back
    /// to the generic end-tag handling.
    fn adoption_agency_end_tag(&mut self, name: &str) -> bool {
        // Fast path: the subject is the current node and not in the
        // active list.
        {
            let top = self.open_elements.top();
            if top.is_html_named(name) && self.formatting_index_of(top.node).is_none() {
                let _ = self.pop_element();
                return true;
            }
        }

        for _ in 0..8 {
            let Some(fmt_index) = self.element_in_active_formatting_elements(name) else {
                return false;
            };
            let fmt_item = match &self.active_formatting[fmt_index] {
                FormattingEntry::Element(item) => item.clone(),
                FormattingEntry::Marker => unreachable!("lookup never returns a marker"),
            };

            if !self.open_elements.contains(fmt_item.node) {
                self.parse_error("adoption-agency-1.2", &[("name", name)]);
                let _ = self.active_formatting.remove(fmt_index);
                return true;
            }
            if !self.open_elements.in_scope(&fmt_item.local_name) {
                self.parse_error("adoption-agency-4.4", &[("name", name)]);
                return true;
            }
            if self.open_elements.top().node != fmt_item.node {
                self.parse_error("adoption-agency-1.3", &[("name", name)]);
            }

            let Some((fb_index, fb_item)) = self
                .open_elements
                .furthest_block_for_formatting_element(fmt_item.node)
            else {
                // No furthest block: pop through the formatting element
                // and drop it from the list.
                while self.open_elements.pop().node != fmt_item.node {}
                self.sink.mark_end(fmt_item.node, self.current_location);
                self.remove_from_active_formatting(fmt_item.node);
                return true;
            };

            let fmt_stack_index = self
                .open_elements
                .index_of(fmt_item.node)
                .expect("formatting element verified on the stack");
            let common_ancestor = self.open_elements.item(fmt_stack_index - 1).node;
            let common_ancestor_fosters = self
                .open_elements
                .item(fmt_stack_index - 1)
                .is_foster_parenting();

            let mut bookmark = fmt_index;
            let mut node_index = fb_index;
            let mut last_node = fb_item.node;
            let mut inner = 0usize;
            loop {
                inner += 1;
                node_index -= 1;
                let node_item = self.open_elements.item(node_index).clone();
                if node_item.node == fmt_item.node {
                    break;
                }
                if inner > 3
                    && let Some(list_index) = self.formatting_index_of(node_item.node)
                {
                    let _ = self.active_formatting.remove(list_index);
                    if list_index < bookmark {
                        bookmark -= 1;
                    }
                }
                let Some(list_index) = self.formatting_index_of(node_item.node) else {
                    self.open_elements.remove(node_item.node);
                    continue;
                };

                let clone = self.create_element_item(
                    &node_item.namespace_uri,
                    &node_item.local_name,
                    &node_item.local_name,
                    node_item.attributes.clone(),
                );
                self.active_formatting[list_index] = FormattingEntry::Element(clone.clone());
                self.open_elements.replace(node_index, clone.clone());
                if last_node == fb_item.node {
                    bookmark = list_index + 1;
                }
                self.sink.detach_from_parent(last_node);
                self.sink.attach_node(last_node, clone.node);
                last_node = clone.node;
            }

            self.sink.detach_from_parent(last_node);
            if common_ancestor_fosters {
                self.insert_into_foster_parent(last_node);
            } else {
                self.sink.attach_node(last_node, common_ancestor);
            }

            // Clone the formatting element, move the furthest block's
            // children under the clone, hang the clone off the block.
            let fmt_clone = self.create_element_item(
                &fmt_item.namespace_uri,
                &fmt_item.local_name,
                &fmt_item.local_name,
                fmt_item.attributes.clone(),
            );
            self.sink.reparent_children(fb_item.node, fmt_clone.node);
            self.sink.attach_node(fmt_clone.node, fb_item.node);

            if let Some(old_index) = self.formatting_index_of(fmt_item.node) {
                let _ = self.active_formatting.remove(old_index);
                if old_index < bookmark {
                    bookmark -= 1;
                }
            }
            let bookmark = bookmark.min(self.active_formatting.len());
            self.active_formatting
                .insert(bookmark, FormattingEntry::Element(fmt_clone.clone()));

            // The clone sits below the furthest block on the stack; the
            // next outer iteration finds no furthest block above it and
            // retires it, leaving the block as the insertion point.
            self.open_elements.remove(fmt_item.node);
            if let Some(fb_pos) = self.open_elements.index_of(fb_item.node) {
                self.open_elements.insert(fb_pos + 1, fmt_clone);
            }
        }
        true
    }

    // ==== mode bookkeeping ===================================================

    /// [§ 13.2.4.1 Reset the insertion mode appropriately](https://html.spec.whatwg.org/multipage/parsing.html#reset-the-insertion-mode-appropriately)
    fn reset_insertion_mode(&mut self) {
        let len = self.open_elements.len();
        for i in (0..len).rev() {
            let last = i == 0;
            let name = if last && self.context.is_some() {
                self.context.clone().unwrap_or_default()
            } else {
                self.open_elements.item(i).local_name.clone()
            };
            self.mode = match name.as_str() {
                "select" => {
                    // A select nested in a table resumes in the
                    // combined mode.
                    let mut mode = InsertionMode::InSelect;
                    for j in (0..i).rev() {
                        if self.open_elements.item(j).is_html_named("table") {
                            mode = InsertionMode::InSelectInTable;
                            break;
                        }
                    }
                    mode
                }
                "td" | "th" if !last => InsertionMode::InCell,
                "tr" => InsertionMode::InRow,
                "tbody" | "thead" | "tfoot" => InsertionMode::InTableBody,
                "caption" => InsertionMode::InCaption,
                "colgroup" => InsertionMode::InColumnGroup,
                "table" => InsertionMode::InTable,
                "head" | "body" => InsertionMode::InBody,
                "frameset" => InsertionMode::InFrameset,
                "html" => InsertionMode::BeforeHead,
                _ if last => InsertionMode::InBody,
                _ => continue,
            };
            return;
        }
        self.mode = InsertionMode::InBody;
    }

    /// [§ 13.2.6.2 Generic raw text / RCDATA parsing](https://html.spec.whatwg.org/multipage/parsing.html#generic-raw-text-element-parsing-algorithm)
    fn parse_generic_text(&mut self, name: &str, attributes: Vec<Attribute>, kind: RawTextKind) {
        self.insert_element(name, attributes);
        self.raw_switch = Some(kind);
        self.original_mode = self.mode;
        self.mode = InsertionMode::Text;
    }

    fn enter_foreign_content(&mut self) {
        if self.mode != InsertionMode::InForeignContent {
            self.secondary_mode = self.mode;
            self.mode = InsertionMode::InForeignContent;
        }
    }

    fn stop_parsing(&mut self) {
        self.finished = true;
    }

    // ==== the "initial" insertion mode =======================================

    fn handle_initial(&mut self, token: &Token) {
        match token {
            Token::Characters { data } => {
                let (_, rest) = split_leading_whitespace(data);
                if rest.is_empty() {
                    return;
                }
                self.parse_error("expected-doctype-but-got-chars", &[]);
                self.missing_doctype();
                let rest_token = Token::Characters {
                    data: rest.to_string(),
                };
                self.reprocess(&rest_token);
            }
            Token::Comment { data } => self.insert_comment_on_document(data),
            Token::Doctype {
                name,
                public_id,
                system_id,
                force_quirks,
            } => {
                self.analyze_doctype(
                    name.as_deref(),
                    public_id.as_deref(),
                    system_id.as_deref(),
                    *force_quirks,
                );
                self.sink.insert_doctype(
                    name.as_deref().unwrap_or(""),
                    public_id.as_deref(),
                    system_id.as_deref(),
                    self.current_location,
                );
                self.mode = InsertionMode::BeforeHtml;
            }
            Token::StartTag { .. } => {
                self.parse_error("expected-doctype-but-got-start-tag", &[]);
                self.missing_doctype();
                self.reprocess(token);
            }
            Token::EndTag { .. } => {
                self.parse_error("expected-doctype-but-got-end-tag", &[]);
                self.missing_doctype();
                self.reprocess(token);
            }
            Token::EndOfFile => {
                self.parse_error("expected-doctype-but-got-eof", &[]);
                self.missing_doctype();
                self.reprocess(token);
            }
        }
    }

    fn missing_doctype(&mut self) {
        self.compat_mode = CompatMode::Quirks;
        self.mode = InsertionMode::BeforeHtml;
    }

    /// Derive the compatibility mode from the doctype and report the
    /// matching error, if any.
    fn analyze_doctype(
        &mut self,
        name: Option<&str>,
        public_id: Option<&str>,
        system_id: Option<&str>,
        force_quirks: bool,
    ) {
        let public_lower = public_id.map(str::to_ascii_lowercase);
        let system_lower = system_id.map(str::to_ascii_lowercase);

        if name != Some("html") {
            self.parse_error("unknown-doctype", &[]);
            self.compat_mode = CompatMode::Quirks;
            return;
        }
        if force_quirks {
            self.parse_error("quirky-doctype", &[]);
            self.compat_mode = CompatMode::Quirks;
            return;
        }
        if let Some(public) = public_lower.as_deref() {
            let quirky = QUIRKY_PUBLIC_MATCHES.contains(&public)
                || QUIRKY_PUBLIC_PREFIXES
                    .iter()
                    .any(|prefix| public.starts_with(prefix))
                || (system_id.is_none()
                    && (public.starts_with("-//w3c//dtd html 4.01 frameset//")
                        || public.starts_with("-//w3c//dtd html 4.01 transitional//")));
            if quirky {
                self.parse_error("quirky-doctype", &[]);
                self.compat_mode = CompatMode::Quirks;
                return;
            }
            let limited = public.starts_with("-//w3c//dtd xhtml 1.0 frameset//")
                || public.starts_with("-//w3c//dtd xhtml 1.0 transitional//")
                || (system_id.is_some()
                    && (public.starts_with("-//w3c//dtd html 4.01 frameset//")
                        || public.starts_with("-//w3c//dtd html 4.01 transitional//")));
            if limited {
                self.parse_error("almost-standards-doctype", &[]);
                self.compat_mode = CompatMode::LimitedQuirks;
                return;
            }
        }
        if system_lower.as_deref() == Some(QUIRKY_SYSTEM_MATCH) {
            self.parse_error("quirky-doctype", &[]);
            self.compat_mode = CompatMode::Quirks;
            return;
        }
        if public_id.is_some()
            || system_id.is_some_and(|s| !s.eq_ignore_ascii_case("about:legacy-compat"))
        {
            self.parse_error("obsolete-doctype", &[]);
        }
    }

    // ==== "before html" / "before head" ======================================

    fn handle_before_html(&mut self, token: &Token) {
        match token {
            Token::Doctype { .. } => self.parse_error("unexpected-doctype", &[]),
            Token::Comment { data } => self.insert_comment_on_document(data),
            Token::Characters { data } => {
                let (_, rest) = split_leading_whitespace(data);
                if rest.is_empty() {
                    return;
                }
                self.before_html_anything_else();
                let rest_token = Token::Characters {
                    data: rest.to_string(),
                };
                self.reprocess(&rest_token);
            }
            Token::StartTag {
                name, attributes, ..
            } if name == "html" => {
                self.insert_html_element(to_dom_attributes(attributes));
                self.mode = InsertionMode::BeforeHead;
            }
            Token::EndTag { name, .. }
                if !matches!(name.as_str(), "head" | "body" | "html" | "br") =>
            {
                self.parse_error("unexpected-end-tag", &[("name", name)]);
            }
            _ => {
                self.before_html_anything_else();
                self.reprocess(token);
            }
        }
    }

    fn before_html_anything_else(&mut self) {
        self.insert_html_element(Vec::new());
        self.mode = InsertionMode::BeforeHead;
    }

    fn handle_before_head(&mut self, token: &Token) {
        match token {
            Token::Characters { data } => {
                let (_, rest) = split_leading_whitespace(data);
                if rest.is_empty() {
                    return;
                }
                self.insert_head_element(Vec::new());
                self.mode = InsertionMode::InHead;
                let rest_token = Token::Characters {
                    data: rest.to_string(),
                };
                self.reprocess(&rest_token);
            }
            Token::Comment { data } => self.insert_comment(data),
            Token::Doctype { .. } => self.parse_error("unexpected-doctype", &[]),
            Token::StartTag { name, .. } if name == "html" => {
                self.process_with_mode(InsertionMode::InBody, token);
            }
            Token::StartTag {
                name, attributes, ..
            } if name == "head" => {
                self.insert_head_element(to_dom_attributes(attributes));
                self.mode = InsertionMode::InHead;
            }
            Token::EndTag { name, .. }
                if !matches!(name.as_str(), "head" | "body" | "html" | "br") =>
            {
                self.parse_error("unexpected-end-tag", &[("name", name)]);
            }
            _ => {
                self.insert_head_element(Vec::new());
                self.mode = InsertionMode::InHead;
                self.reprocess(token);
            }
        }
    }

    // ==== "in head" family ===================================================

    fn handle_in_head(&mut self, token: &Token) {
        match token {
            Token::Characters { data } => {
                let (ws, rest) = split_leading_whitespace(data);
                if !ws.is_empty() {
                    self.insert_text(ws);
                }
                if rest.is_empty() {
                    return;
                }
                self.in_head_anything_else();
                let rest_token = Token::Characters {
                    data: rest.to_string(),
                };
                self.reprocess(&rest_token);
            }
            Token::Comment { data } => self.insert_comment(data),
            Token::Doctype { .. } => self.parse_error("unexpected-doctype", &[]),
            Token::StartTag {
                name, attributes, ..
            } => match name.as_str() {
                "html" => self.process_with_mode(InsertionMode::InBody, token),
                "base" | "basefont" | "bgsound" | "link" | "meta" => {
                    self.insert_self_closing_element(name, to_dom_attributes(attributes));
                }
                "title" => {
                    self.parse_generic_text(name, to_dom_attributes(attributes), RawTextKind::Rcdata);
                }
                "noscript" if self.scripting_enabled => {
                    self.parse_generic_text(name, to_dom_attributes(attributes), RawTextKind::Rawtext);
                }
                "noscript" => {
                    self.insert_element(name, to_dom_attributes(attributes));
                    self.mode = InsertionMode::InHeadNoscript;
                }
                "noframes" | "style" => {
                    self.parse_generic_text(name, to_dom_attributes(attributes), RawTextKind::Rawtext);
                }
                "script" => {
                    self.parse_generic_text(
                        name,
                        to_dom_attributes(attributes),
                        RawTextKind::ScriptData,
                    );
                }
                "head" => self.parse_error("two-heads-are-not-better-than-one", &[]),
                _ => {
                    self.in_head_anything_else();
                    self.reprocess(token);
                }
            },
            Token::EndTag { name, .. } => match name.as_str() {
                "head" => {
                    let _ = self.pop_element();
                    self.mode = InsertionMode::AfterHead;
                }
                "html" | "body" | "br" => {
                    self.in_head_anything_else();
                    self.reprocess(token);
                }
                _ => self.parse_error("unexpected-end-tag", &[("name", name)]),
            },
            Token::EndOfFile => {
                self.in_head_anything_else();
                self.reprocess(token);
            }
        }
    }

    fn in_head_anything_else(&mut self) {
        let _ = self.pop_element();
        self.mode = InsertionMode::AfterHead;
    }

    fn handle_in_head_noscript(&mut self, token: &Token) {
        match token {
            Token::Doctype { .. } => self.parse_error("unexpected-doctype", &[]),
            Token::Characters { data } => {
                let (ws, rest) = split_leading_whitespace(data);
                if !ws.is_empty() {
                    let ws_token = Token::Characters {
                        data: ws.to_string(),
                    };
                    self.process_with_mode(InsertionMode::InHead, &ws_token);
                }
                if rest.is_empty() {
                    return;
                }
                self.in_head_noscript_anything_else();
                let rest_token = Token::Characters {
                    data: rest.to_string(),
                };
                self.reprocess(&rest_token);
            }
            Token::Comment { .. } => self.process_with_mode(InsertionMode::InHead, token),
            Token::StartTag { name, .. } => match name.as_str() {
                "html" => self.process_with_mode(InsertionMode::InBody, token),
                "basefont" | "bgsound" | "link" | "meta" | "noframes" | "style" => {
                    self.process_with_mode(InsertionMode::InHead, token);
                }
                "head" | "noscript" => {
                    self.parse_error("unexpected-start-tag", &[("name", name)]);
                }
                _ => {
                    self.parse_error("unexpected-start-tag", &[("name", name)]);
                    self.in_head_noscript_anything_else();
                    self.reprocess(token);
                }
            },
            Token::EndTag { name, .. } => match name.as_str() {
                "noscript" => {
                    let _ = self.pop_element();
                    self.mode = InsertionMode::InHead;
                }
                "br" => {
                    self.parse_error("unexpected-end-tag", &[("name", name)]);
                    self.in_head_noscript_anything_else();
                    self.reprocess(token);
                }
                _ => self.parse_error("unexpected-end-tag", &[("name", name)]),
            },
            Token::EndOfFile => {
                self.in_head_noscript_anything_else();
                self.reprocess(token);
            }
        }
    }

    fn in_head_noscript_anything_else(&mut self) {
        let _ = self.pop_element();
        self.mode = InsertionMode::InHead;
    }

    fn handle_after_head(&mut self, token: &Token) {
        match token {
            Token::Characters { data } => {
                let (ws, rest) = split_leading_whitespace(data);
                if !ws.is_empty() {
                    self.insert_text(ws);
                }
                if rest.is_empty() {
                    return;
                }
                self.after_head_anything_else();
                let rest_token = Token::Characters {
                    data: rest.to_string(),
                };
                self.reprocess(&rest_token);
            }
            Token::Comment { data } => self.insert_comment(data),
            Token::Doctype { .. } => self.parse_error("unexpected-doctype", &[]),
            Token::StartTag {
                name, attributes, ..
            } => match name.as_str() {
                "html" => self.process_with_mode(InsertionMode::InBody, token),
                "body" => {
                    self.insert_body_element(to_dom_attributes(attributes));
                    self.frameset_ok = false;
                    self.mode = InsertionMode::InBody;
                }
                "frameset" => {
                    self.insert_element(name, to_dom_attributes(attributes));
                    self.mode = InsertionMode::InFrameset;
                }
                "base" | "basefont" | "bgsound" | "link" | "meta" | "noframes" | "script"
                | "style" | "title" => {
                    self.parse_error("unexpected-start-tag-out-of-my-head", &[("name", name)]);
                    if let Some(head) = self.head_item.clone() {
                        self.open_elements.push(head.clone());
                        self.process_with_mode(InsertionMode::InHead, token);
                        self.open_elements.remove(head.node);
                    } else {
                        self.process_with_mode(InsertionMode::InHead, token);
                    }
                }
                "head" => self.parse_error("unexpected-start-tag", &[("name", name)]),
                _ => {
                    self.after_head_anything_else();
                    self.reprocess(token);
                }
            },
            Token::EndTag { name, .. } => match name.as_str() {
                "body" | "html" | "br" => {
                    self.after_head_anything_else();
                    self.reprocess(token);
                }
                _ => self.parse_error("unexpected-end-tag", &[("name", name)]),
            },
            Token::EndOfFile => {
                self.after_head_anything_else();
                self.reprocess(token);
            }
        }
    }

    fn after_head_anything_else(&mut self) {
        self.insert_body_element(Vec::new());
        self.mode = InsertionMode::InBody;
    }

    // ==== "in body" ==========================================================

    fn handle_in_body(&mut self, token: &Token) {
        match token {
            Token::Characters { data } => {
                self.reconstruct_active_formatting_elements();
                self.insert_text(data);
                if !is_all_whitespace(data) {
                    self.frameset_ok = false;
                }
            }
            Token::Comment { data } => self.insert_comment(data),
            Token::Doctype { .. } => self.parse_error("unexpected-doctype", &[]),
            Token::StartTag {
                name,
                attributes,
                self_closing,
            } => self.in_body_start_tag(name, attributes, *self_closing, token),
            Token::EndTag { name, .. } => self.in_body_end_tag(name, token),
            Token::EndOfFile => {
                for i in (0..self.open_elements.len()).rev() {
                    let name = self.open_elements.item(i).local_name.clone();
                    if !matches!(
                        name.as_str(),
                        "dd" | "dt"
                            | "li"
                            | "p"
                            | "tbody"
                            | "td"
                            | "tfoot"
                            | "th"
                            | "thead"
                            | "tr"
                            | "body"
                            | "html"
                    ) {
                        self.parse_error("expected-closing-tag-but-got-eof", &[]);
                        break;
                    }
                }
                self.stop_parsing();
            }
        }
    }

    #[allow(clippy::too_many_lines)]
    fn in_body_start_tag(
        &mut self,
        name: &str,
        attributes: &[crate::tokenizer::Attribute],
        self_closing: bool,
        token: &Token,
    ) {
        match name {
            "html" => {
                self.parse_error("non-html-root", &[]);
                if let Some(root) = self.open_elements.root_node {
                    self.sink
                        .add_attributes_to_element(root, &to_dom_attributes(attributes));
                }
            }
            "base" | "basefont" | "bgsound" | "link" | "meta" | "noframes" | "script" | "style"
            | "title" => self.process_with_mode(InsertionMode::InHead, token),
            "body" => {
                self.parse_error("unexpected-start-tag", &[("name", name)]);
                if self.open_elements.len() > 1
                    && self.open_elements.item(1).is_html_named("body")
                {
                    self.frameset_ok = false;
                    let body = self.open_elements.item(1).node;
                    self.sink
                        .add_attributes_to_element(body, &to_dom_attributes(attributes));
                }
            }
            "frameset" => {
                self.parse_error("unexpected-start-tag", &[("name", name)]);
                if self.frameset_ok
                    && self.open_elements.len() > 1
                    && self.open_elements.item(1).is_html_named("body")
                {
                    let body = self.open_elements.item(1).node;
                    self.sink.detach_from_parent(body);
                    while self.open_elements.len() > 1 {
                        let _ = self.open_elements.pop();
                    }
                    self.insert_element(name, to_dom_attributes(attributes));
                    self.mode = InsertionMode::InFrameset;
                }
            }
            "address" | "article" | "aside" | "blockquote" | "center" | "details" | "dir"
            | "div" | "dl" | "fieldset" | "figcaption" | "figure" | "footer" | "header"
            | "hgroup" | "main" | "menu" | "nav" | "ol" | "p" | "section" | "summary" | "ul" => {
                self.close_p_if_in_button_scope();
                self.insert_element(name, to_dom_attributes(attributes));
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.close_p_if_in_button_scope();
                if self.open_elements.top().is_numbered_header() {
                    self.parse_error("unexpected-start-tag", &[("name", name)]);
                    let _ = self.pop_element();
                }
                self.insert_element(name, to_dom_attributes(attributes));
            }
            "pre" | "listing" => {
                self.close_p_if_in_button_scope();
                self.insert_element(name, to_dom_attributes(attributes));
                self.should_skip_leading_newline = true;
                self.frameset_ok = false;
            }
            "form" => {
                if self.form.is_some() {
                    self.parse_error("unexpected-start-tag", &[("name", name)]);
                } else {
                    self.close_p_if_in_button_scope();
                    let item = self.insert_element_returning(name, to_dom_attributes(attributes));
                    self.form = Some(item.node);
                }
            }
            "li" => {
                self.frameset_ok = false;
                for i in (0..self.open_elements.len()).rev() {
                    let item = self.open_elements.item(i);
                    if item.is_html_named("li") {
                        let li_token = Token::EndTag {
                            name: "li".to_string(),
                            attributes: Vec::new(),
                            self_closing: false,
                        };
                        self.in_body_end_tag("li", &li_token);
                        break;
                    }
                    if item.is_special()
                        && !item.is_html_named("address")
                        && !item.is_html_named("div")
                        && !item.is_html_named("p")
                    {
                        break;
                    }
                }
                self.close_p_if_in_button_scope();
                self.insert_element(name, to_dom_attributes(attributes));
            }
            "dd" | "dt" => {
                self.frameset_ok = false;
                for i in (0..self.open_elements.len()).rev() {
                    let item = self.open_elements.item(i);
                    if item.is_html_named("dd") || item.is_html_named("dt") {
                        let item_name = item.local_name.clone();
                        let dd_token = Token::EndTag {
                            name: item_name.clone(),
                            attributes: Vec::new(),
                            self_closing: false,
                        };
                        self.in_body_end_tag(&item_name, &dd_token);
                        break;
                    }
                    if item.is_special()
                        && !item.is_html_named("address")
                        && !item.is_html_named("div")
                        && !item.is_html_named("p")
                    {
                        break;
                    }
                }
                self.close_p_if_in_button_scope();
                self.insert_element(name, to_dom_attributes(attributes));
            }
            "plaintext" => {
                self.close_p_if_in_button_scope();
                self.insert_element(name, to_dom_attributes(attributes));
                self.raw_switch = Some(RawTextKind::Plaintext);
            }
            "button" => {
                if self.open_elements.in_scope("button") {
                    self.parse_error("unexpected-start-tag-implies-end-tag", &[
                        ("startName", name),
                        ("endName", "button"),
                    ]);
                    let end = Token::EndTag {
                        name: "button".to_string(),
                        attributes: Vec::new(),
                        self_closing: false,
                    };
                    self.in_body_end_tag("button", &end);
                    self.reprocess(token);
                } else {
                    self.reconstruct_active_formatting_elements();
                    self.insert_element(name, to_dom_attributes(attributes));
                    self.frameset_ok = false;
                }
            }
            "a" => {
                if self.element_in_active_formatting_elements("a").is_some() {
                    self.parse_error("unexpected-start-tag-implies-end-tag", &[
                        ("startName", "a"),
                        ("endName", "a"),
                    ]);
                    let _ = self.adoption_agency_end_tag("a");
                    if let Some(index) = self.element_in_active_formatting_elements("a") {
                        let entry = self.active_formatting.remove(index);
                        if let FormattingEntry::Element(item) = entry {
                            self.open_elements.remove(item.node);
                        }
                    }
                }
                self.reconstruct_active_formatting_elements();
                self.insert_formatting_element(name, to_dom_attributes(attributes));
            }
            "b" | "big" | "code" | "em" | "font" | "i" | "s" | "small" | "strike" | "strong"
            | "tt" | "u" => {
                self.reconstruct_active_formatting_elements();
                self.insert_formatting_element(name, to_dom_attributes(attributes));
            }
            "nobr" => {
                self.reconstruct_active_formatting_elements();
                if self.open_elements.in_scope("nobr") {
                    self.parse_error("unexpected-start-tag-implies-end-tag", &[
                        ("startName", "nobr"),
                        ("endName", "nobr"),
                    ]);
                    let end = Token::EndTag {
                        name: "nobr".to_string(),
                        attributes: Vec::new(),
                        self_closing: false,
                    };
                    self.in_body_end_tag("nobr", &end);
                    self.reconstruct_active_formatting_elements();
                }
                self.insert_formatting_element(name, to_dom_attributes(attributes));
            }
            "applet" | "marquee" | "object" => {
                self.reconstruct_active_formatting_elements();
                self.insert_element(name, to_dom_attributes(attributes));
                self.push_formatting_marker();
                self.frameset_ok = false;
            }
            "table" => {
                if self.compat_mode != CompatMode::Quirks {
                    self.close_p_if_in_button_scope();
                }
                self.insert_element(name, to_dom_attributes(attributes));
                self.frameset_ok = false;
                self.mode = InsertionMode::InTable;
            }
            "area" | "br" | "embed" | "img" | "keygen" | "wbr" => {
                self.reconstruct_active_formatting_elements();
                self.insert_self_closing_element(name, to_dom_attributes(attributes));
                self.frameset_ok = false;
            }
            "input" => {
                self.reconstruct_active_formatting_elements();
                let attrs = to_dom_attributes(attributes);
                let hidden = attrs
                    .iter()
                    .find(|a| a.name == "type")
                    .is_some_and(|a| a.value.eq_ignore_ascii_case("hidden"));
                self.insert_self_closing_element(name, attrs);
                if !hidden {
                    self.frameset_ok = false;
                }
            }
            "param" | "source" | "track" => {
                self.insert_self_closing_element(name, to_dom_attributes(attributes));
            }
            "hr" => {
                self.close_p_if_in_button_scope();
                self.insert_self_closing_element(name, to_dom_attributes(attributes));
                self.frameset_ok = false;
            }
            "image" => {
                self.parse_error("unexpected-start-tag-treated-as", &[
                    ("originalName", "image"),
                    ("newName", "img"),
                ]);
                self.in_body_start_tag("img", attributes, self_closing, token);
            }
            "isindex" => self.in_body_isindex(attributes),
            "textarea" => {
                self.insert_element(name, to_dom_attributes(attributes));
                self.raw_switch = Some(RawTextKind::Rcdata);
                self.should_skip_leading_newline = true;
                self.frameset_ok = false;
                self.original_mode = self.mode;
                self.mode = InsertionMode::Text;
            }
            "xmp" => {
                self.close_p_if_in_button_scope();
                self.reconstruct_active_formatting_elements();
                self.frameset_ok = false;
                self.parse_generic_text(name, to_dom_attributes(attributes), RawTextKind::Rawtext);
            }
            "iframe" => {
                self.frameset_ok = false;
                self.parse_generic_text(name, to_dom_attributes(attributes), RawTextKind::Rawtext);
            }
            "noembed" => {
                self.parse_generic_text(name, to_dom_attributes(attributes), RawTextKind::Rawtext);
            }
            "noscript" if self.scripting_enabled => {
                self.parse_generic_text(name, to_dom_attributes(attributes), RawTextKind::Rawtext);
            }
            "select" => {
                self.reconstruct_active_formatting_elements();
                self.insert_element(name, to_dom_attributes(attributes));
                self.frameset_ok = false;
                self.mode = if matches!(
                    self.mode,
                    InsertionMode::InTable
                        | InsertionMode::InCaption
                        | InsertionMode::InColumnGroup
                        | InsertionMode::InTableBody
                        | InsertionMode::InRow
                        | InsertionMode::InCell
                ) {
                    InsertionMode::InSelectInTable
                } else {
                    InsertionMode::InSelect
                };
            }
            "option" | "optgroup" => {
                if self.open_elements.top().is_html_named("option") {
                    let _ = self.pop_element();
                }
                self.reconstruct_active_formatting_elements();
                self.insert_element(name, to_dom_attributes(attributes));
            }
            "rp" | "rt" => {
                if self.open_elements.in_scope("ruby") {
                    self.generate_implied_end_tags(None);
                    if !self.open_elements.top().is_html_named("ruby") {
                        self.parse_error("unexpected-start-tag", &[("name", name)]);
                    }
                }
                self.insert_element(name, to_dom_attributes(attributes));
            }
            "math" => {
                self.reconstruct_active_formatting_elements();
                let mut attrs = to_dom_attributes(attributes);
                adjust_mathml_attributes(&mut attrs);
                adjust_foreign_attributes(&mut attrs);
                self.insert_foreign_element(MATHML_NAMESPACE, name, attrs, self_closing);
                if !self_closing {
                    self.enter_foreign_content();
                }
            }
            "svg" => {
                self.reconstruct_active_formatting_elements();
                let mut attrs = to_dom_attributes(attributes);
                adjust_svg_attributes(&mut attrs);
                adjust_foreign_attributes(&mut attrs);
                self.insert_foreign_element(SVG_NAMESPACE, name, attrs, self_closing);
                if !self_closing {
                    self.enter_foreign_content();
                }
            }
            "caption" | "col" | "colgroup" | "frame" | "head" | "tbody" | "td" | "tfoot" | "th"
            | "thead" | "tr" => {
                self.parse_error("unexpected-start-tag-ignored", &[("name", name)]);
            }
            _ => {
                self.reconstruct_active_formatting_elements();
                self.insert_element(name, to_dom_attributes(attributes));
            }
        }
    }

    /// The legacy `<isindex>` expansion: a form with an hr/label/input
    /// sandwich, unless a form is already open.
    fn in_body_isindex(&mut self, attributes: &[crate::tokenizer::Attribute]) {
        self.parse_error("deprecated-tag", &[("name", "isindex")]);
        if self.form.is_some() {
            return;
        }
        self.self_closing_acknowledged = true;
        let attrs = to_dom_attributes(attributes);
        let action: Vec<Attribute> = attrs.iter().filter(|a| a.name == "action").cloned().collect();
        let form_item = self.insert_element_returning("form", action);
        self.form = Some(form_item.node);
        self.insert_self_closing_element("hr", Vec::new());
        self.reconstruct_active_formatting_elements();
        self.insert_element("label", Vec::new());
        let prompt = attrs
            .iter()
            .find(|a| a.name == "prompt")
            .map_or_else(
                || "This is a searchable index. Enter search keywords: ".to_string(),
                |a| a.value.clone(),
            );
        self.insert_text(&prompt);
        let mut input_attrs: Vec<Attribute> = attrs
            .into_iter()
            .filter(|a| !matches!(a.name.as_str(), "action" | "prompt" | "name"))
            .collect();
        input_attrs.push(Attribute::new("name".to_string(), "isindex".to_string()));
        self.insert_self_closing_element("input", input_attrs);
        self.pop_until_popped_marking("label");
        self.insert_self_closing_element("hr", Vec::new());
        self.pop_until_popped_marking("form");
        self.form = None;
    }

    fn pop_until_popped_marking(&mut self, name: &str) {
        loop {
            let item = self.pop_element();
            if item.local_name == name {
                break;
            }
        }
    }

    #[allow(clippy::too_many_lines)]
    fn in_body_end_tag(&mut self, name: &str, token: &Token) {
        match name {
            "body" => {
                if !self.open_elements.in_scope("body") {
                    self.parse_error("unexpected-end-tag", &[("name", name)]);
                    return;
                }
                if !self.open_elements.top().is_html_named("body") {
                    let current = self.open_elements.top().local_name.clone();
                    self.parse_error("expected-one-end-tag-but-got-another", &[
                        ("gotName", "body"),
                        ("expectedName", &current),
                    ]);
                }
                if let Some(body) = self.open_elements.body_element {
                    self.sink.mark_end(body, self.current_location);
                }
                self.mode = InsertionMode::AfterBody;
            }
            "html" => {
                let end_body = Token::EndTag {
                    name: "body".to_string(),
                    attributes: Vec::new(),
                    self_closing: false,
                };
                let in_scope = self.open_elements.in_scope("body");
                self.in_body_end_tag("body", &end_body);
                if in_scope {
                    self.reprocess(token);
                }
            }
            "address" | "article" | "aside" | "blockquote" | "button" | "center" | "details"
            | "dir" | "div" | "dl" | "fieldset" | "figcaption" | "figure" | "footer" | "header"
            | "hgroup" | "listing" | "main" | "menu" | "nav" | "ol" | "pre" | "section"
            | "summary" | "ul" => {
                if self.open_elements.in_scope(name) {
                    self.generate_implied_end_tags(None);
                    if !self.open_elements.top().is_html_named(name) {
                        self.parse_error("end-tag-too-early", &[("name", name)]);
                    }
                    self.pop_until_popped_marking(name);
                } else {
                    self.parse_error("unexpected-end-tag", &[("name", name)]);
                }
            }
            "form" => {
                let node = self.form.take();
                if let Some(node) = node
                    && self.open_elements.contains(node)
                {
                    self.generate_implied_end_tags(None);
                    if self.current_node() != node {
                        self.parse_error("end-tag-too-early-ignored", &[("name", name)]);
                    }
                    self.sink.mark_end(node, self.current_location);
                    self.open_elements.remove(node);
                } else {
                    self.parse_error("unexpected-end-tag", &[("name", name)]);
                }
            }
            "p" => {
                if self.open_elements.in_button_scope("p") {
                    self.close_p_element();
                } else {
                    self.parse_error("unexpected-end-tag", &[("name", name)]);
                    self.insert_element("p", Vec::new());
                    self.close_p_element();
                }
            }
            "li" => {
                if self.open_elements.in_list_item_scope("li") {
                    self.generate_implied_end_tags(Some("li"));
                    if !self.open_elements.top().is_html_named("li") {
                        self.parse_error("end-tag-too-early", &[("name", name)]);
                    }
                    self.pop_until_popped_marking("li");
                } else {
                    self.parse_error("unexpected-end-tag", &[("name", name)]);
                }
            }
            "dd" | "dt" => {
                if self.open_elements.in_scope(name) {
                    self.generate_implied_end_tags(Some(name));
                    if !self.open_elements.top().is_html_named(name) {
                        self.parse_error("end-tag-too-early", &[("name", name)]);
                    }
                    self.pop_until_popped_marking(name);
                } else {
                    self.parse_error("unexpected-end-tag", &[("name", name)]);
                }
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                if self.open_elements.has_numbered_header_in_scope() {
                    self.generate_implied_end_tags(None);
                    if !self.open_elements.top().is_html_named(name) {
                        self.parse_error("end-tag-too-early", &[("name", name)]);
                    }
                    self.open_elements.pop_until_numbered_header_popped();
                } else {
                    self.parse_error("unexpected-end-tag", &[("name", name)]);
                }
            }
            "a" | "b" | "big" | "code" | "em" | "font" | "i" | "nobr" | "s" | "small"
            | "strike" | "strong" | "tt" | "u" => {
                if !self.adoption_agency_end_tag(name) {
                    self.any_other_end_tag(name);
                }
            }
            "applet" | "marquee" | "object" => {
                if self.open_elements.in_scope(name) {
                    self.generate_implied_end_tags(None);
                    if !self.open_elements.top().is_html_named(name) {
                        self.parse_error("end-tag-too-early", &[("name", name)]);
                    }
                    self.pop_until_popped_marking(name);
                    self.clear_active_formatting_to_marker();
                } else {
                    self.parse_error("unexpected-end-tag", &[("name", name)]);
                }
            }
            "br" => {
                self.parse_error("unexpected-end-tag-treated-as", &[
                    ("originalName", "br"),
                    ("newName", "br element"),
                ]);
                self.reconstruct_active_formatting_elements();
                self.insert_self_closing_element("br", Vec::new());
                self.frameset_ok = false;
            }
            _ => self.any_other_end_tag(name),
        }
    }

    /// "Any other end tag" in the in-body mode.
    fn any_other_end_tag(&mut self, name: &str) {
        for i in (0..self.open_elements.len()).rev() {
            let item = self.open_elements.item(i);
            if item.is_html_named(name) {
                self.generate_implied_end_tags(Some(name));
                if !self.open_elements.top().is_html_named(name) {
                    self.parse_error("unexpected-end-tag", &[("name", name)]);
                }
                while self.open_elements.len() > i {
                    let _ = self.pop_element();
                }
                return;
            }
            if item.is_special() {
                self.parse_error("unexpected-end-tag", &[("name", name)]);
                return;
            }
        }
    }

    /// [End tag `p` steps](https://html.spec.whatwg.org/multipage/parsing.html#close-a-p-element)
    fn close_p_element(&mut self) {
        self.generate_implied_end_tags(Some("p"));
        if !self.open_elements.top().is_html_named("p") {
            self.parse_error("unexpected-implied-end-tag", &[("name", "p")]);
        }
        self.pop_until_popped_marking("p");
    }

    fn close_p_if_in_button_scope(&mut self) {
        if self.open_elements.in_button_scope("p") {
            self.close_p_element();
        }
    }

    // ==== "text" =============================================================

    fn handle_text(&mut self, token: &Token) {
        match token {
            Token::Characters { data } => self.insert_text(data),
            Token::EndOfFile => {
                let name = self.open_elements.top().local_name.clone();
                self.parse_error("expected-named-closing-tag-but-got-eof", &[("name", &name)]);
                let _ = self.pop_element();
                self.mode = self.original_mode;
                self.reprocess(token);
            }
            Token::EndTag { .. } => {
                let _ = self.pop_element();
                self.mode = self.original_mode;
            }
            _ => unreachable!("the tokenizer only feeds text and end tags to the text mode"),
        }
    }

    // ==== table modes ========================================================

    fn handle_in_table(&mut self, token: &Token) {
        match token {
            Token::Characters { .. }
                if self
                    .open_elements
                    .try_top()
                    .is_some_and(StackItem::is_foster_parenting) =>
            {
                self.original_mode = self.mode;
                self.pending_table_characters.clear();
                self.mode = InsertionMode::InTableText;
                self.reprocess(token);
            }
            Token::Characters { .. } => self.in_table_anything_else(token),
            Token::Comment { data } => self.insert_comment(data),
            Token::Doctype { .. } => self.parse_error("unexpected-doctype", &[]),
            Token::StartTag {
                name, attributes, ..
            } => match name.as_str() {
                "caption" => {
                    self.open_elements.pop_until_table_scope_marker();
                    self.push_formatting_marker();
                    self.insert_element(name, to_dom_attributes(attributes));
                    self.mode = InsertionMode::InCaption;
                }
                "colgroup" => {
                    self.open_elements.pop_until_table_scope_marker();
                    self.insert_element(name, to_dom_attributes(attributes));
                    self.mode = InsertionMode::InColumnGroup;
                }
                "col" => {
                    self.open_elements.pop_until_table_scope_marker();
                    self.insert_element("colgroup", Vec::new());
                    self.mode = InsertionMode::InColumnGroup;
                    self.reprocess(token);
                }
                "tbody" | "tfoot" | "thead" => {
                    self.open_elements.pop_until_table_scope_marker();
                    self.insert_element(name, to_dom_attributes(attributes));
                    self.mode = InsertionMode::InTableBody;
                }
                "td" | "th" | "tr" => {
                    self.open_elements.pop_until_table_scope_marker();
                    self.insert_element("tbody", Vec::new());
                    self.mode = InsertionMode::InTableBody;
                    self.reprocess(token);
                }
                "table" => {
                    self.parse_error("unexpected-start-tag-implies-end-tag", &[
                        ("startName", "table"),
                        ("endName", "table"),
                    ]);
                    let in_scope = self.open_elements.in_table_scope("table");
                    let end = Token::EndTag {
                        name: "table".to_string(),
                        attributes: Vec::new(),
                        self_closing: false,
                    };
                    self.handle_in_table(&end);
                    if in_scope {
                        self.reprocess(token);
                    }
                }
                "style" | "script" => self.process_with_mode(InsertionMode::InHead, token),
                "input" => {
                    let hidden = attributes
                        .iter()
                        .find(|a| a.name == "type")
                        .is_some_and(|a| a.value.eq_ignore_ascii_case("hidden"));
                    if hidden {
                        self.parse_error("unexpected-hidden-input-in-table", &[]);
                        self.insert_self_closing_element("input", to_dom_attributes(attributes));
                    } else {
                        self.in_table_anything_else(token);
                    }
                }
                "form" => {
                    self.parse_error("unexpected-form-in-table", &[]);
                    if self.form.is_none() {
                        let item =
                            self.insert_element_returning("form", to_dom_attributes(attributes));
                        self.form = Some(item.node);
                        let _ = self.pop_element();
                    }
                }
                _ => self.in_table_anything_else(token),
            },
            Token::EndTag { name, .. } => match name.as_str() {
                "table" => {
                    if self.open_elements.in_table_scope("table") {
                        self.pop_until_popped_marking("table");
                        self.reset_insertion_mode();
                    } else {
                        self.parse_error("unexpected-end-tag", &[("name", name)]);
                    }
                }
                "body" | "caption" | "col" | "colgroup" | "html" | "tbody" | "td" | "tfoot"
                | "th" | "thead" | "tr" => {
                    self.parse_error("unexpected-end-tag", &[("name", name)]);
                }
                _ => self.in_table_anything_else(token),
            },
            Token::EndOfFile => {
                if self.open_elements.len() > 1 {
                    self.parse_error("eof-in-table", &[]);
                }
                self.stop_parsing();
            }
        }
    }

    /// "Anything else" in a table context: table voodoo. Insertions are
    /// redirected to the foster parent while the token is processed
    /// with the in-body rules.
    fn in_table_anything_else(&mut self, token: &Token) {
        match token {
            Token::Characters { .. } => {
                self.parse_error("unexpected-char-implies-table-voodoo", &[]);
            }
            Token::StartTag { name, .. } => {
                self.parse_error("unexpected-start-tag-implies-table-voodoo", &[("name", name)]);
            }
            Token::EndTag { name, .. } => {
                self.parse_error("unexpected-end-tag-implies-table-voodoo", &[("name", name)]);
            }
            _ => {}
        }
        self.redirect_attach_to_foster_parent = true;
        self.process_with_mode(InsertionMode::InBody, token);
        self.redirect_attach_to_foster_parent = false;
    }

    fn handle_in_table_text(&mut self, token: &Token) {
        if let Token::Characters { data } = token {
            self.pending_table_characters.push(data.clone());
            return;
        }
        let pending = std::mem::take(&mut self.pending_table_characters).concat();
        if !pending.is_empty() {
            if is_all_whitespace(&pending) {
                self.insert_text(&pending);
            } else {
                self.parse_error("unexpected-char-implies-table-voodoo", &[]);
                self.redirect_attach_to_foster_parent = true;
                self.reconstruct_active_formatting_elements();
                self.insert_text(&pending);
                self.frameset_ok = false;
                self.redirect_attach_to_foster_parent = false;
            }
        }
        self.mode = self.original_mode;
        self.reprocess(token);
    }

    fn handle_in_caption(&mut self, token: &Token) {
        match token {
            Token::StartTag { name, .. }
                if matches!(
                    name.as_str(),
                    "caption" | "col" | "colgroup" | "tbody" | "td" | "tfoot" | "th" | "thead"
                        | "tr"
                ) =>
            {
                self.parse_error("unexpected-start-tag", &[("name", name)]);
                if self.close_caption() {
                    self.reprocess(token);
                }
            }
            Token::EndTag { name, .. } => match name.as_str() {
                "caption" => {
                    if !self.close_caption() {
                        self.parse_error("unexpected-end-tag", &[("name", name)]);
                    }
                }
                "table" => {
                    self.parse_error("unexpected-end-table-in-caption", &[]);
                    if self.close_caption() {
                        self.reprocess(token);
                    }
                }
                "body" | "col" | "colgroup" | "html" | "tbody" | "td" | "tfoot" | "th"
                | "thead" | "tr" => {
                    self.parse_error("unexpected-end-tag", &[("name", name)]);
                }
                _ => self.process_with_mode(InsertionMode::InBody, token),
            },
            _ => self.process_with_mode(InsertionMode::InBody, token),
        }
    }

    fn close_caption(&mut self) -> bool {
        if !self.open_elements.in_table_scope("caption") {
            return false;
        }
        self.generate_implied_end_tags(None);
        if !self.open_elements.top().is_html_named("caption") {
            let current = self.open_elements.top().local_name.clone();
            self.parse_error("expected-one-end-tag-but-got-another", &[
                ("gotName", "caption"),
                ("expectedName", &current),
            ]);
        }
        self.pop_until_popped_marking("caption");
        self.clear_active_formatting_to_marker();
        self.mode = InsertionMode::InTable;
        true
    }

    fn handle_in_column_group(&mut self, token: &Token) {
        match token {
            Token::Characters { data } => {
                let (ws, rest) = split_leading_whitespace(data);
                if !ws.is_empty() {
                    self.insert_text(ws);
                }
                if rest.is_empty() {
                    return;
                }
                if self.close_colgroup() {
                    let rest_token = Token::Characters {
                        data: rest.to_string(),
                    };
                    self.reprocess(&rest_token);
                }
            }
            Token::Comment { data } => self.insert_comment(data),
            Token::Doctype { .. } => self.parse_error("unexpected-doctype", &[]),
            Token::StartTag {
                name, attributes, ..
            } => match name.as_str() {
                "html" => self.process_with_mode(InsertionMode::InBody, token),
                "col" => self.insert_self_closing_element(name, to_dom_attributes(attributes)),
                _ => {
                    if self.close_colgroup() {
                        self.reprocess(token);
                    }
                }
            },
            Token::EndTag { name, .. } => match name.as_str() {
                "colgroup" => {
                    if !self.close_colgroup() {
                        self.parse_error("unexpected-end-tag", &[("name", name)]);
                    }
                }
                "col" => self.parse_error("unexpected-end-tag", &[("name", name)]),
                _ => {
                    if self.close_colgroup() {
                        self.reprocess(token);
                    }
                }
            },
            Token::EndOfFile => {
                if self.open_elements.len() == 1 {
                    self.stop_parsing();
                } else if self.close_colgroup() {
                    self.reprocess(token);
                }
            }
        }
    }

    fn close_colgroup(&mut self) -> bool {
        if self.open_elements.top().is_html_named("html") {
            // Fragment parsing with a colgroup context.
            return false;
        }
        let _ = self.pop_element();
        self.mode = InsertionMode::InTable;
        true
    }

    fn handle_in_table_body(&mut self, token: &Token) {
        match token {
            Token::StartTag {
                name, attributes, ..
            } => match name.as_str() {
                "tr" => {
                    self.open_elements.pop_until_table_body_scope_marker();
                    self.insert_element(name, to_dom_attributes(attributes));
                    self.mode = InsertionMode::InRow;
                }
                "th" | "td" => {
                    self.parse_error("unexpected-cell-in-table-body", &[("name", name)]);
                    self.open_elements.pop_until_table_body_scope_marker();
                    self.insert_element("tr", Vec::new());
                    self.mode = InsertionMode::InRow;
                    self.reprocess(token);
                }
                "caption" | "col" | "colgroup" | "tbody" | "tfoot" | "thead" => {
                    if self.close_table_body() {
                        self.reprocess(token);
                    } else {
                        self.parse_error("unexpected-start-tag", &[("name", name)]);
                    }
                }
                _ => self.process_with_mode(InsertionMode::InTable, token),
            },
            Token::EndTag { name, .. } => match name.as_str() {
                "tbody" | "tfoot" | "thead" => {
                    if self.open_elements.in_table_scope(name) {
                        self.open_elements.pop_until_table_body_scope_marker();
                        let _ = self.pop_element();
                        self.mode = InsertionMode::InTable;
                    } else {
                        self.parse_error("unexpected-end-tag-in-table-body", &[("name", name)]);
                    }
                }
                "table" => {
                    if self.close_table_body() {
                        self.reprocess(token);
                    } else {
                        self.parse_error("unexpected-end-tag", &[("name", name)]);
                    }
                }
                "body" | "caption" | "col" | "colgroup" | "html" | "td" | "th" | "tr" => {
                    self.parse_error("unexpected-end-tag-in-table-body", &[("name", name)]);
                }
                _ => self.process_with_mode(InsertionMode::InTable, token),
            },
            _ => self.process_with_mode(InsertionMode::InTable, token),
        }
    }

    fn close_table_body(&mut self) -> bool {
        if self.open_elements.in_table_scope("tbody")
            || self.open_elements.in_table_scope("thead")
            || self.open_elements.in_table_scope("tfoot")
        {
            self.open_elements.pop_until_table_body_scope_marker();
            let _ = self.pop_element();
            self.mode = InsertionMode::InTable;
            true
        } else {
            false
        }
    }

    fn handle_in_row(&mut self, token: &Token) {
        match token {
            Token::StartTag {
                name, attributes, ..
            } => match name.as_str() {
                "td" | "th" => {
                    self.open_elements.pop_until_table_row_scope_marker();
                    self.insert_element(name, to_dom_attributes(attributes));
                    self.mode = InsertionMode::InCell;
                    self.push_formatting_marker();
                }
                "caption" | "col" | "colgroup" | "tbody" | "tfoot" | "thead" | "tr" => {
                    if self.close_table_row() {
                        self.reprocess(token);
                    } else {
                        self.parse_error("unexpected-start-tag", &[("name", name)]);
                    }
                }
                _ => self.process_with_mode(InsertionMode::InTable, token),
            },
            Token::EndTag { name, .. } => match name.as_str() {
                "tr" => {
                    if !self.close_table_row() {
                        self.parse_error("unexpected-end-tag-in-table-row", &[("name", name)]);
                    }
                }
                "table" => {
                    if self.close_table_row() {
                        self.reprocess(token);
                    } else {
                        self.parse_error("unexpected-end-tag", &[("name", name)]);
                    }
                }
                "tbody" | "tfoot" | "thead" => {
                    if self.open_elements.in_table_scope(name) {
                        if self.close_table_row() {
                            self.reprocess(token);
                        }
                    } else {
                        self.parse_error("unexpected-end-tag-in-table-row", &[("name", name)]);
                    }
                }
                "body" | "caption" | "col" | "colgroup" | "html" | "td" | "th" => {
                    self.parse_error("unexpected-end-tag-in-table-row", &[("name", name)]);
                }
                _ => self.process_with_mode(InsertionMode::InTable, token),
            },
            _ => self.process_with_mode(InsertionMode::InTable, token),
        }
    }

    fn close_table_row(&mut self) -> bool {
        if self.open_elements.in_table_scope("tr") {
            self.open_elements.pop_until_table_row_scope_marker();
            let _ = self.pop_element();
            self.mode = InsertionMode::InTableBody;
            true
        } else {
            false
        }
    }

    fn handle_in_cell(&mut self, token: &Token) {
        match token {
            Token::StartTag { name, .. }
                if matches!(
                    name.as_str(),
                    "caption" | "col" | "colgroup" | "tbody" | "td" | "tfoot" | "th" | "thead"
                        | "tr"
                ) =>
            {
                if self.open_elements.in_table_scope("td")
                    || self.open_elements.in_table_scope("th")
                {
                    self.close_cell();
                    self.reprocess(token);
                } else {
                    self.parse_error("unexpected-start-tag", &[("name", name)]);
                }
            }
            Token::EndTag { name, .. } => match name.as_str() {
                "td" | "th" => {
                    if self.open_elements.in_table_scope(name) {
                        self.generate_implied_end_tags(None);
                        if !self.open_elements.top().is_html_named(name) {
                            self.parse_error("unexpected-cell-end-tag", &[("name", name)]);
                        }
                        self.pop_until_popped_marking(name);
                        self.clear_active_formatting_to_marker();
                        self.mode = InsertionMode::InRow;
                    } else {
                        self.parse_error("unexpected-end-tag", &[("name", name)]);
                    }
                }
                "body" | "caption" | "col" | "colgroup" | "html" => {
                    self.parse_error("unexpected-end-tag", &[("name", name)]);
                }
                "table" | "tbody" | "tfoot" | "thead" | "tr" => {
                    if self.open_elements.in_table_scope(name) {
                        self.close_cell();
                        self.reprocess(token);
                    } else {
                        self.parse_error("unexpected-end-tag", &[("name", name)]);
                    }
                }
                _ => self.process_with_mode(InsertionMode::InBody, token),
            },
            _ => self.process_with_mode(InsertionMode::InBody, token),
        }
    }

    /// "Close the cell": close whichever of td/th is in table scope.
    fn close_cell(&mut self) {
        let name = if self.open_elements.in_table_scope("td") {
            "td"
        } else {
            "th"
        };
        let end = Token::EndTag {
            name: name.to_string(),
            attributes: Vec::new(),
            self_closing: false,
        };
        self.handle_in_cell(&end);
    }

    // ==== select modes =======================================================

    fn handle_in_select(&mut self, token: &Token) {
        match token {
            Token::Characters { data } => self.insert_text(data),
            Token::Comment { data } => self.insert_comment(data),
            Token::Doctype { .. } => self.parse_error("unexpected-doctype", &[]),
            Token::StartTag {
                name, attributes, ..
            } => match name.as_str() {
                "html" => self.process_with_mode(InsertionMode::InBody, token),
                "option" => {
                    if self.open_elements.top().is_html_named("option") {
                        let _ = self.pop_element();
                    }
                    self.insert_element(name, to_dom_attributes(attributes));
                }
                "optgroup" => {
                    if self.open_elements.top().is_html_named("option") {
                        let _ = self.pop_element();
                    }
                    if self.open_elements.top().is_html_named("optgroup") {
                        let _ = self.pop_element();
                    }
                    self.insert_element(name, to_dom_attributes(attributes));
                }
                "select" => {
                    self.parse_error("unexpected-select-in-select", &[]);
                    self.close_select();
                }
                "input" | "keygen" | "textarea" => {
                    self.parse_error("unexpected-input-in-select", &[]);
                    if self.open_elements.in_select_scope("select") {
                        self.close_select();
                        self.reprocess(token);
                    }
                }
                "script" => self.process_with_mode(InsertionMode::InHead, token),
                _ => self.parse_error("unexpected-start-tag-in-select", &[("name", name)]),
            },
            Token::EndTag { name, .. } => match name.as_str() {
                "option" => {
                    if self.open_elements.top().is_html_named("option") {
                        let _ = self.pop_element();
                    } else {
                        self.parse_error("unexpected-end-tag-in-select", &[("name", name)]);
                    }
                }
                "optgroup" => {
                    if self.open_elements.top().is_html_named("option")
                        && self.open_elements.len() >= 2
                        && self
                            .open_elements
                            .item(self.open_elements.len() - 2)
                            .is_html_named("optgroup")
                    {
                        let _ = self.pop_element();
                    }
                    if self.open_elements.top().is_html_named("optgroup") {
                        let _ = self.pop_element();
                    } else {
                        self.parse_error("unexpected-end-tag-in-select", &[("name", name)]);
                    }
                }
                "select" => {
                    if self.open_elements.in_select_scope("select") {
                        self.close_select();
                    } else {
                        self.parse_error("unexpected-end-tag-in-select", &[("name", name)]);
                    }
                }
                _ => self.parse_error("unexpected-end-tag-in-select", &[("name", name)]),
            },
            Token::EndOfFile => {
                if self.open_elements.len() > 1 {
                    self.parse_error("expected-closing-tag-but-got-eof", &[]);
                }
                self.stop_parsing();
            }
        }
    }

    fn close_select(&mut self) {
        self.pop_until_popped_marking("select");
        self.reset_insertion_mode();
    }

    fn handle_in_select_in_table(&mut self, token: &Token) {
        match token {
            Token::StartTag { name, .. }
                if matches!(
                    name.as_str(),
                    "caption" | "table" | "tbody" | "tfoot" | "thead" | "tr" | "td" | "th"
                ) =>
            {
                self.parse_error("unexpected-table-element-start-tag-in-select-in-table", &[(
                    "name", name,
                )]);
                self.close_select();
                self.reprocess(token);
            }
            Token::EndTag { name, .. }
                if matches!(
                    name.as_str(),
                    "caption" | "table" | "tbody" | "tfoot" | "thead" | "tr" | "td" | "th"
                ) =>
            {
                self.parse_error("unexpected-table-element-end-tag-in-select-in-table", &[(
                    "name", name,
                )]);
                if self.open_elements.in_table_scope(name) {
                    self.close_select();
                    self.reprocess(token);
                }
            }
            _ => self.handle_in_select(token),
        }
    }

    // ==== foreign content ====================================================

    fn handle_in_foreign_content(&mut self, token: &Token) {
        // At an integration point (or with no foreign current node) the
        // ordinary HTML rules apply.
        if self.foreign_delegates_to_html(token) {
            self.process_with_mode(self.secondary_mode, token);
            return;
        }
        match token {
            Token::Characters { data } => {
                self.insert_text(data);
                if !is_all_whitespace(data) {
                    self.frameset_ok = false;
                }
            }
            Token::Comment { data } => self.insert_comment(data),
            Token::Doctype { .. } => self.parse_error("unexpected-doctype", &[]),
            Token::StartTag {
                name,
                attributes,
                self_closing,
            } => {
                let breakout = FOREIGN_BREAKOUT_TAGS.contains(&name.as_str())
                    || (name == "font"
                        && attributes
                            .iter()
                            .any(|a| matches!(a.name.as_str(), "color" | "face" | "size")));
                if breakout {
                    self.parse_error("unexpected-html-element-in-foreign-content", &[(
                        "name", name,
                    )]);
                    self.pop_foreign_until_html_level();
                    self.reprocess(token);
                    return;
                }
                let namespace = self.open_elements.top().namespace_uri.clone();
                let mut attrs = to_dom_attributes(attributes);
                let adjusted_name = if namespace == SVG_NAMESPACE {
                    adjust_svg_attributes(&mut attrs);
                    adjust_svg_tag_name(name).to_string()
                } else {
                    adjust_mathml_attributes(&mut attrs);
                    name.clone()
                };
                adjust_foreign_attributes(&mut attrs);
                self.insert_foreign_element(&namespace, &adjusted_name, attrs, *self_closing);
            }
            Token::EndTag { name, .. } => {
                // SVG embeds HTML-cased names; compare case-folded.
                if self.open_elements.top().local_name.to_ascii_lowercase() != *name {
                    self.parse_error("unexpected-end-tag", &[("name", name)]);
                }
                for i in (1..self.open_elements.len()).rev() {
                    let item = self.open_elements.item(i);
                    if item.local_name.to_ascii_lowercase() == *name {
                        while self.open_elements.len() > i {
                            let _ = self.pop_element();
                        }
                        return;
                    }
                    if !item.is_foreign() {
                        self.process_with_mode(self.secondary_mode, token);
                        return;
                    }
                }
            }
            Token::EndOfFile => self.process_with_mode(self.secondary_mode, token),
        }
    }

    /// The tree-construction dispatcher's integration-point checks.
    fn foreign_delegates_to_html(&self, token: &Token) -> bool {
        let Some(current) = self.open_elements.try_top() else {
            return true;
        };
        if !current.is_foreign() {
            return true;
        }
        if current.is_mathml_text_integration_point() {
            match token {
                Token::StartTag { name, .. } if !matches!(name.as_str(), "mglyph" | "malignmark") => {
                    return true;
                }
                Token::Characters { .. } => return true,
                _ => {}
            }
        }
        if current.namespace_uri == MATHML_NAMESPACE
            && current.local_name == "annotation-xml"
            && matches!(token, Token::StartTag { name, .. } if name == "svg")
        {
            return true;
        }
        if current.is_html_integration_point()
            && matches!(token, Token::StartTag { .. } | Token::Characters { .. })
        {
            return true;
        }
        matches!(token, Token::EndOfFile)
    }

    /// Pop foreign elements until the current node is an HTML element
    /// or an integration point.
    fn pop_foreign_until_html_level(&mut self) {
        loop {
            let top = self.open_elements.top();
            if !top.is_foreign()
                || top.is_html_integration_point()
                || top.is_mathml_text_integration_point()
            {
                break;
            }
            let _ = self.pop_element();
        }
        if !self.open_elements.has_foreign_element() {
            self.mode = self.secondary_mode;
        }
    }

    // ==== after body / frameset tails ========================================

    fn handle_after_body(&mut self, token: &Token) {
        match token {
            Token::Characters { data } if is_all_whitespace(data) => {
                self.process_with_mode(InsertionMode::InBody, token);
            }
            Token::Comment { data } => self.insert_comment_on_root(data),
            Token::Doctype { .. } => self.parse_error("unexpected-doctype", &[]),
            Token::StartTag { name, .. } if name == "html" => {
                self.process_with_mode(InsertionMode::InBody, token);
            }
            Token::EndTag { name, .. } if name == "html" => {
                if self.context.is_some() {
                    self.parse_error("end-html-in-innerhtml", &[]);
                } else {
                    if let Some(root) = self.open_elements.root_node {
                        self.sink.mark_end(root, self.current_location);
                    }
                    self.mode = InsertionMode::AfterAfterBody;
                }
            }
            Token::EndOfFile => self.stop_parsing(),
            Token::Characters { .. } => {
                self.parse_error("unexpected-char-after-body", &[]);
                self.mode = InsertionMode::InBody;
                self.reprocess(token);
            }
            Token::StartTag { name, .. } => {
                self.parse_error("unexpected-start-tag-after-body", &[("name", name)]);
                self.mode = InsertionMode::InBody;
                self.reprocess(token);
            }
            Token::EndTag { name, .. } => {
                self.parse_error("unexpected-end-tag-after-body", &[("name", name)]);
                self.mode = InsertionMode::InBody;
                self.reprocess(token);
            }
        }
    }

    fn handle_in_frameset(&mut self, token: &Token) {
        match token {
            Token::Characters { data } => {
                let (ws, _) = split_leading_whitespace(data);
                if !ws.is_empty() {
                    self.insert_text(ws);
                }
                if !is_all_whitespace(data) {
                    self.parse_error("unexpected-char-in-frameset", &[]);
                }
            }
            Token::Comment { data } => self.insert_comment(data),
            Token::Doctype { .. } => self.parse_error("unexpected-doctype", &[]),
            Token::StartTag {
                name, attributes, ..
            } => match name.as_str() {
                "html" => self.process_with_mode(InsertionMode::InBody, token),
                "frameset" => self.insert_element(name, to_dom_attributes(attributes)),
                "frame" => self.insert_self_closing_element(name, to_dom_attributes(attributes)),
                "noframes" => self.process_with_mode(InsertionMode::InHead, token),
                _ => self.parse_error("unexpected-start-tag-in-frameset", &[("name", name)]),
            },
            Token::EndTag { name, .. } => match name.as_str() {
                "frameset" => {
                    if self.open_elements.top().is_html_named("html") {
                        self.parse_error("unexpected-frameset-in-frameset-innerhtml", &[]);
                    } else {
                        let _ = self.pop_element();
                        if self.context.is_none()
                            && !self.open_elements.top().is_html_named("frameset")
                        {
                            self.mode = InsertionMode::AfterFrameset;
                        }
                    }
                }
                _ => self.parse_error("unexpected-end-tag-in-frameset", &[("name", name)]),
            },
            Token::EndOfFile => {
                if self.open_elements.len() > 1 {
                    self.parse_error("expected-closing-tag-but-got-eof", &[]);
                }
                self.stop_parsing();
            }
        }
    }

    fn handle_after_frameset(&mut self, token: &Token) {
        match token {
            Token::Characters { data } => {
                let (ws, _) = split_leading_whitespace(data);
                if !ws.is_empty() {
                    self.insert_text(ws);
                }
                if !is_all_whitespace(data) {
                    self.parse_error("unexpected-char-after-frameset", &[]);
                }
            }
            Token::Comment { data } => self.insert_comment(data),
            Token::Doctype { .. } => self.parse_error("unexpected-doctype", &[]),
            Token::StartTag { name, .. } => match name.as_str() {
                "html" => self.process_with_mode(InsertionMode::InBody, token),
                "noframes" => self.process_with_mode(InsertionMode::InHead, token),
                _ => self.parse_error("unexpected-start-tag-after-frameset", &[("name", name)]),
            },
            Token::EndTag { name, .. } => match name.as_str() {
                "html" => self.mode = InsertionMode::AfterAfterFrameset,
                _ => self.parse_error("unexpected-end-tag-after-frameset", &[("name", name)]),
            },
            Token::EndOfFile => self.stop_parsing(),
        }
    }

    fn handle_after_after_body(&mut self, token: &Token) {
        match token {
            Token::Comment { data } => self.insert_comment_on_document(data),
            Token::Characters { data } if is_all_whitespace(data) => {
                self.process_with_mode(InsertionMode::InBody, token);
            }
            Token::Doctype { .. } => self.process_with_mode(InsertionMode::InBody, token),
            Token::StartTag { name, .. } if name == "html" => {
                self.process_with_mode(InsertionMode::InBody, token);
            }
            Token::EndOfFile => self.stop_parsing(),
            Token::Characters { .. } => {
                self.parse_error("expected-eof-but-got-char", &[]);
                self.mode = InsertionMode::InBody;
                self.reprocess(token);
            }
            Token::StartTag { name, .. } => {
                self.parse_error("expected-eof-but-got-start-tag", &[("name", name)]);
                self.mode = InsertionMode::InBody;
                self.reprocess(token);
            }
            Token::EndTag { name, .. } => {
                self.parse_error("expected-eof-but-got-end-tag", &[("name", name)]);
                self.mode = InsertionMode::InBody;
                self.reprocess(token);
            }
        }
    }

    fn handle_after_after_frameset(&mut self, token: &Token) {
        match token {
            Token::Comment { data } => self.insert_comment_on_document(data),
            Token::Characters { data } if is_all_whitespace(data) => {
                self.process_with_mode(InsertionMode::InBody, token);
            }
            Token::Doctype { .. } => self.parse_error("unexpected-doctype", &[]),
            Token::StartTag { name, .. } => match name.as_str() {
                "html" => self.process_with_mode(InsertionMode::InBody, token),
                "noframes" => self.process_with_mode(InsertionMode::InHead, token),
                _ => self.parse_error("expected-eof-but-got-start-tag", &[("name", name)]),
            },
            Token::EndTag { name, .. } => {
                self.parse_error("expected-eof-but-got-end-tag", &[("name", name)]);
            }
            Token::Characters { .. } => self.parse_error("expected-eof-but-got-char", &[]),
            Token::EndOfFile => self.stop_parsing(),
        }
    }
}
