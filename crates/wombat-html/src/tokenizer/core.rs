//! The tokenizer state machine.
//!
//! [§ 13.2.5 Tokenization](https://html.spec.whatwg.org/multipage/parsing.html#tokenization)
//!
//! "Implementations must act as if they used the following state machine
//! to tokenize HTML." One enum variant per state; dispatch is a `match`.
//!
//! The machine pulls characters from an [`InputStream`] and surfaces
//! completed tokens one at a time through [`Tokenizer::next_token`], so
//! the tree-construction stage can process each token (and possibly
//! switch the tokenizer into a raw-text state) before the next one is
//! lexed. When the stream runs dry mid-construct the cursor is rolled
//! back to the last checkpoint and `NeedsData` is surfaced; feeding more
//! input and calling `next_token` again re-lexes the suspended construct.

use std::collections::VecDeque;

use strum_macros::Display;
use wombat_dom::Location;

use crate::entities;
use crate::errors::{ParseError, format_message};
use crate::stream::{InputStream, ReadResult};

use super::token::Token;

/// [§ 13.2.5 Tokenization](https://html.spec.whatwg.org/multipage/parsing.html#tokenization)
///
/// The tokenizer state machine. Each variant corresponds to a state
/// subsection of § 13.2.5; character references are decoded by a
/// subroutine rather than dedicated states, so the three
/// `CharacterReferenceIn*` variants cover the spec's reference states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TokenizerState {
    /// Data state.
    Data,
    /// Character reference in data state.
    CharacterReferenceInData,
    /// RCDATA state.
    RCDATA,
    /// Character reference in RCDATA state.
    CharacterReferenceInRCDATA,
    /// RCDATA less-than sign state.
    RCDATALessThanSign,
    /// RCDATA end tag open state.
    RCDATAEndTagOpen,
    /// RCDATA end tag name state.
    RCDATAEndTagName,
    /// RAWTEXT state.
    RAWTEXT,
    /// RAWTEXT less-than sign state.
    RAWTEXTLessThanSign,
    /// RAWTEXT end tag open state.
    RAWTEXTEndTagOpen,
    /// RAWTEXT end tag name state.
    RAWTEXTEndTagName,
    /// Script data state.
    ScriptData,
    /// Script data less-than sign state.
    ScriptDataLessThanSign,
    /// Script data end tag open state.
    ScriptDataEndTagOpen,
    /// Script data end tag name state.
    ScriptDataEndTagName,
    /// Script data escape start state.
    ScriptDataEscapeStart,
    /// Script data escape start dash state.
    ScriptDataEscapeStartDash,
    /// Script data escaped state.
    ScriptDataEscaped,
    /// Script data escaped dash state.
    ScriptDataEscapedDash,
    /// Script data escaped dash dash state.
    ScriptDataEscapedDashDash,
    /// Script data escaped less-than sign state.
    ScriptDataEscapedLessThanSign,
    /// Script data escaped end tag open state.
    ScriptDataEscapedEndTagOpen,
    /// Script data escaped end tag name state.
    ScriptDataEscapedEndTagName,
    /// Script data double escape start state.
    ScriptDataDoubleEscapeStart,
    /// Script data double escaped state.
    ScriptDataDoubleEscaped,
    /// Script data double escaped dash state.
    ScriptDataDoubleEscapedDash,
    /// Script data double escaped dash dash state.
    ScriptDataDoubleEscapedDashDash,
    /// Script data double escaped less-than sign state.
    ScriptDataDoubleEscapedLessThanSign,
    /// Script data double escape end state.
    ScriptDataDoubleEscapeEnd,
    /// PLAINTEXT state.
    PLAINTEXT,
    /// Tag open state.
    TagOpen,
    /// End tag open state.
    CloseTagOpen,
    /// Tag name state.
    TagName,
    /// Before attribute name state.
    BeforeAttributeName,
    /// Attribute name state.
    AttributeName,
    /// After attribute name state.
    AfterAttributeName,
    /// Before attribute value state.
    BeforeAttributeValue,
    /// Attribute value (double-quoted) state.
    AttributeValueDoubleQuoted,
    /// Attribute value (single-quoted) state.
    AttributeValueSingleQuoted,
    /// Attribute value (unquoted) state.
    AttributeValueUnquoted,
    /// Character reference in attribute value state.
    CharacterReferenceInAttributeValue,
    /// After attribute value (quoted) state.
    AfterAttributeValueQuoted,
    /// Self-closing start tag state.
    SelfClosingStartTag,
    /// Bogus comment state.
    BogusComment,
    /// Markup declaration open state.
    MarkupDeclarationOpen,
    /// Comment start state.
    CommentStart,
    /// Comment start dash state.
    CommentStartDash,
    /// Comment state.
    Comment,
    /// Comment end dash state.
    CommentEndDash,
    /// Comment end state.
    CommentEnd,
    /// Comment end bang state.
    CommentEndBang,
    /// DOCTYPE state.
    DOCTYPE,
    /// Before DOCTYPE name state.
    BeforeDOCTYPEName,
    /// DOCTYPE name state.
    DOCTYPEName,
    /// After DOCTYPE name state.
    AfterDOCTYPEName,
    /// After DOCTYPE public keyword state.
    AfterDOCTYPEPublicKeyword,
    /// Before DOCTYPE public identifier state.
    BeforeDOCTYPEPublicIdentifier,
    /// DOCTYPE public identifier (double-quoted) state.
    DOCTYPEPublicIdentifierDoubleQuoted,
    /// DOCTYPE public identifier (single-quoted) state.
    DOCTYPEPublicIdentifierSingleQuoted,
    /// After DOCTYPE public identifier state.
    AfterDOCTYPEPublicIdentifier,
    /// Between DOCTYPE public and system identifiers state.
    BetweenDOCTYPEPublicAndSystemIdentifiers,
    /// After DOCTYPE system keyword state.
    AfterDOCTYPESystemKeyword,
    /// Before DOCTYPE system identifier state.
    BeforeDOCTYPESystemIdentifier,
    /// DOCTYPE system identifier (double-quoted) state.
    DOCTYPESystemIdentifierDoubleQuoted,
    /// DOCTYPE system identifier (single-quoted) state.
    DOCTYPESystemIdentifierSingleQuoted,
    /// After DOCTYPE system identifier state.
    AfterDOCTYPESystemIdentifier,
    /// Bogus DOCTYPE state.
    BogusDOCTYPE,
    /// CDATA section state.
    CDATASection,
}

/// The raw-text lexing flavors the tree stage can switch the tokenizer
/// into after processing a start tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawTextKind {
    /// RCDATA: character references decode, markup does not (title,
    /// textarea).
    Rcdata,
    /// RAWTEXT: nothing decodes (style, xmp, iframe, noembed,
    /// noframes, noscript-with-scripting).
    Rawtext,
    /// Script data, with its escape dance.
    ScriptData,
    /// PLAINTEXT: the rest of the input is text.
    Plaintext,
}

/// Result of running one state handler.
enum Step {
    /// The handler completed; loop again.
    Continue,
    /// The stream ran dry mid-construct; roll back and surface
    /// `NeedsData`.
    Suspend,
}

/// Outcome of the DOCTYPE PUBLIC/SYSTEM keyword lookahead.
enum KeywordTail {
    /// Every remaining letter matched case-insensitively.
    Matched,
    /// A character mismatched (carried here; earlier matched letters
    /// stay consumed) or the stream ended (`None`).
    Failed(Option<char>),
    /// The stream suspended mid-keyword.
    Suspend,
}

/// Read one character; `None` is end of input. Suspends the pump when
/// the stream needs more data.
macro_rules! next_char {
    ($self:ident) => {
        match $self.stream.char() {
            ReadResult::Ready(c) => Some(c),
            ReadResult::Eof => None,
            ReadResult::NeedsData => return Step::Suspend,
        }
    };
}

/// Unwrap a `match_until`/`match_while` result, suspending on drain.
/// An exhausted closed stream yields the empty string.
macro_rules! next_run {
    ($expr:expr) => {
        match $expr {
            ReadResult::Ready(s) => s,
            ReadResult::Eof => String::new(),
            ReadResult::NeedsData => return Step::Suspend,
        }
    };
}

const fn is_whitespace(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\x0B' | '\x0C' | ' ')
}

/// The tokenizer: owns the input stream and the token under
/// construction, queues completed tokens for the pump.
pub struct Tokenizer {
    state: TokenizerState,
    return_state: TokenizerState,
    stream: InputStream,
    current: Option<Token>,
    temporary_buffer: String,
    additional_allowed: Option<char>,
    /// "An appropriate end tag token is an end tag token whose tag name
    /// matches the tag name of the last start tag to have been emitted
    /// from this tokenizer."
    last_start_tag: Option<String>,
    /// Indices of attributes flagged `duplicate-attribute`, removed
    /// from the token at emission.
    duplicate_attributes: Vec<usize>,
    pending: VecDeque<(Token, Location)>,
    errors: Vec<ParseError>,
    /// Whether `<![CDATA[` opens a CDATA section here (true while the
    /// tree stage's current node is foreign).
    cdata_allowed: bool,
    emitted_eof: bool,
}

impl Tokenizer {
    /// Create a tokenizer over an empty input stream, in the data
    /// state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: TokenizerState::Data,
            return_state: TokenizerState::Data,
            stream: InputStream::new(),
            current: None,
            temporary_buffer: String::new(),
            additional_allowed: None,
            last_start_tag: None,
            duplicate_attributes: Vec::new(),
            pending: VecDeque::new(),
            errors: Vec::new(),
            cdata_allowed: false,
            emitted_eof: false,
        }
    }

    /// Feed more source text.
    pub fn feed(&mut self, text: &str) {
        self.stream.append(text);
    }

    /// Flag the input complete; the next exhaustion of the buffer is a
    /// real end of file.
    pub fn end(&mut self) {
        self.stream.close();
    }

    /// The source location of the last checkpoint, used to stamp nodes
    /// and errors.
    #[must_use]
    pub const fn location(&self) -> Location {
        self.stream.location()
    }

    /// Permit or forbid `<![CDATA[` sections (the tree stage allows
    /// them only in foreign content).
    pub const fn set_cdata_allowed(&mut self, allowed: bool) {
        self.cdata_allowed = allowed;
    }

    /// Switch into a raw-text state. Called by the facade on behalf of
    /// the tree stage after a start tag like `<title>` or `<script>`.
    pub fn switch_to_raw(&mut self, kind: RawTextKind) {
        self.state = match kind {
            RawTextKind::Rcdata => TokenizerState::RCDATA,
            RawTextKind::Rawtext => TokenizerState::RAWTEXT,
            RawTextKind::ScriptData => TokenizerState::ScriptData,
            RawTextKind::Plaintext => TokenizerState::PLAINTEXT,
        };
    }

    /// Drain errors reported since the last call.
    pub fn take_errors(&mut self) -> Vec<ParseError> {
        std::mem::take(&mut self.errors)
    }

    /// Lex until one complete token is available.
    ///
    /// Returns `Eof` after the end-of-file token has been delivered,
    /// and `NeedsData` (with the stream rolled back to the last
    /// checkpoint) when more input is required.
    pub fn next_token(&mut self) -> ReadResult<(Token, Location)> {
        loop {
            if let Some(entry) = self.pending.pop_front() {
                return ReadResult::Ready(entry);
            }
            if self.emitted_eof {
                return ReadResult::Eof;
            }
            let error_mark = self.errors.len();
            match self.run_state() {
                Step::Continue => self.stream.commit(),
                Step::Suspend => {
                    // The suspended construct re-lexes from the last
                    // checkpoint; drop anything it half-reported.
                    self.errors.truncate(error_mark);
                    self.stream.undo();
                    return ReadResult::NeedsData;
                }
            }
        }
    }

    fn run_state(&mut self) -> Step {
        use TokenizerState as S;
        match self.state {
            S::Data => self.data_state(),
            S::CharacterReferenceInData => self.character_reference_in_data_state(),
            S::RCDATA => self.rcdata_state(),
            S::CharacterReferenceInRCDATA => self.character_reference_in_rcdata_state(),
            S::RCDATALessThanSign => self.rcdata_less_than_sign_state(),
            S::RCDATAEndTagOpen => self.rcdata_end_tag_open_state(),
            S::RCDATAEndTagName => self.rcdata_end_tag_name_state(),
            S::RAWTEXT => self.rawtext_state(),
            S::RAWTEXTLessThanSign => self.rawtext_less_than_sign_state(),
            S::RAWTEXTEndTagOpen => self.rawtext_end_tag_open_state(),
            S::RAWTEXTEndTagName => self.rawtext_end_tag_name_state(),
            S::ScriptData => self.script_data_state(),
            S::ScriptDataLessThanSign => self.script_data_less_than_sign_state(),
            S::ScriptDataEndTagOpen => self.script_data_end_tag_open_state(),
            S::ScriptDataEndTagName => self.script_data_end_tag_name_state(),
            S::ScriptDataEscapeStart => self.script_data_escape_start_state(),
            S::ScriptDataEscapeStartDash => self.script_data_escape_start_dash_state(),
            S::ScriptDataEscaped => self.script_data_escaped_state(),
            S::ScriptDataEscapedDash => self.script_data_escaped_dash_state(),
            S::ScriptDataEscapedDashDash => self.script_data_escaped_dash_dash_state(),
            S::ScriptDataEscapedLessThanSign => self.script_data_escaped_less_than_sign_state(),
            S::ScriptDataEscapedEndTagOpen => self.script_data_escaped_end_tag_open_state(),
            S::ScriptDataEscapedEndTagName => self.script_data_escaped_end_tag_name_state(),
            S::ScriptDataDoubleEscapeStart => self.script_data_double_escape_start_state(),
            S::ScriptDataDoubleEscaped => self.script_data_double_escaped_state(),
            S::ScriptDataDoubleEscapedDash => self.script_data_double_escaped_dash_state(),
            S::ScriptDataDoubleEscapedDashDash => {
                self.script_data_double_escaped_dash_dash_state()
            }
            S::ScriptDataDoubleEscapedLessThanSign => {
                self.script_data_double_escaped_less_than_sign_state()
            }
            S::ScriptDataDoubleEscapeEnd => self.script_data_double_escape_end_state(),
            S::PLAINTEXT => self.plaintext_state(),
            S::TagOpen => self.tag_open_state(),
            S::CloseTagOpen => self.close_tag_open_state(),
            S::TagName => self.tag_name_state(),
            S::BeforeAttributeName => self.before_attribute_name_state(),
            S::AttributeName => self.attribute_name_state(),
            S::AfterAttributeName => self.after_attribute_name_state(),
            S::BeforeAttributeValue => self.before_attribute_value_state(),
            S::AttributeValueDoubleQuoted => self.attribute_value_double_quoted_state(),
            S::AttributeValueSingleQuoted => self.attribute_value_single_quoted_state(),
            S::AttributeValueUnquoted => self.attribute_value_unquoted_state(),
            S::CharacterReferenceInAttributeValue => {
                self.character_reference_in_attribute_value_state()
            }
            S::AfterAttributeValueQuoted => self.after_attribute_value_quoted_state(),
            S::SelfClosingStartTag => self.self_closing_start_tag_state(),
            S::BogusComment => self.bogus_comment_state(),
            S::MarkupDeclarationOpen => self.markup_declaration_open_state(),
            S::CommentStart => self.comment_start_state(),
            S::CommentStartDash => self.comment_start_dash_state(),
            S::Comment => self.comment_state(),
            S::CommentEndDash => self.comment_end_dash_state(),
            S::CommentEnd => self.comment_end_state(),
            S::CommentEndBang => self.comment_end_bang_state(),
            S::DOCTYPE => self.doctype_state(),
            S::BeforeDOCTYPEName => self.before_doctype_name_state(),
            S::DOCTYPEName => self.doctype_name_state(),
            S::AfterDOCTYPEName => self.after_doctype_name_state(),
            S::AfterDOCTYPEPublicKeyword => self.after_doctype_public_keyword_state(),
            S::BeforeDOCTYPEPublicIdentifier => self.before_doctype_public_identifier_state(),
            S::DOCTYPEPublicIdentifierDoubleQuoted => self.doctype_public_identifier_state('"'),
            S::DOCTYPEPublicIdentifierSingleQuoted => self.doctype_public_identifier_state('\''),
            S::AfterDOCTYPEPublicIdentifier => self.after_doctype_public_identifier_state(),
            S::BetweenDOCTYPEPublicAndSystemIdentifiers => {
                self.between_doctype_public_and_system_identifiers_state()
            }
            S::AfterDOCTYPESystemKeyword => self.after_doctype_system_keyword_state(),
            S::BeforeDOCTYPESystemIdentifier => self.before_doctype_system_identifier_state(),
            S::DOCTYPESystemIdentifierDoubleQuoted => self.doctype_system_identifier_state('"'),
            S::DOCTYPESystemIdentifierSingleQuoted => self.doctype_system_identifier_state('\''),
            S::AfterDOCTYPESystemIdentifier => self.after_doctype_system_identifier_state(),
            S::BogusDOCTYPE => self.bogus_doctype_state(),
            S::CDATASection => self.cdata_section_state(),
        }
    }

    // ==== shared plumbing ====================================================

    fn parse_error(&mut self, code: &'static str) {
        self.parse_error_args(code, &[]);
    }

    fn parse_error_args(&mut self, code: &'static str, args: &[(&str, &str)]) {
        self.errors.push(ParseError {
            code,
            message: format_message(code, args),
            location: self.stream.location(),
        });
    }

    /// The token under construction.
    ///
    /// # Panics
    ///
    /// Panics when no token is being built, which is a state-machine
    /// bug, not malformed input.
    fn current(&mut self) -> &mut Token {
        self.current.as_mut().expect("no token under construction")
    }

    fn emit_characters(&mut self, data: String) {
        if !data.is_empty() {
            let location = self.stream.location();
            self.pending.push_back((Token::Characters { data }, location));
        }
    }

    fn emit_eof(&mut self) {
        let location = self.stream.location();
        self.pending.push_back((Token::EndOfFile, location));
        self.emitted_eof = true;
    }

    /// "Emit the current token" — switches to the data state first, as
    /// every tag-closing transition does.
    fn emit_current(&mut self) {
        self.state = TokenizerState::Data;
        let token = self.current.take().expect("no token to emit");
        self.emit_token(token);
    }

    fn emit_token(&mut self, mut token: Token) {
        match &token {
            Token::StartTag { name, .. } => {
                self.last_start_tag = Some(name.clone());
                if !self.duplicate_attributes.is_empty() {
                    let dupes = std::mem::take(&mut self.duplicate_attributes);
                    token.remove_attributes(&dupes);
                }
            }
            Token::EndTag {
                attributes,
                self_closing,
                ..
            } => {
                if *self_closing {
                    self.parse_error("self-closing-flag-on-end-tag");
                }
                if !attributes.is_empty() {
                    self.parse_error("attributes-in-end-tag");
                }
                self.duplicate_attributes.clear();
            }
            _ => {}
        }
        let location = self.stream.location();
        self.pending.push_back((token, location));
    }

    /// "An appropriate end tag token is an end tag token whose tag name
    /// matches the tag name of the last start tag to have been emitted
    /// from this tokenizer, if any."
    fn is_appropriate_end_tag(&self) -> bool {
        self.last_start_tag.as_deref() == Some(self.temporary_buffer.to_lowercase().as_str())
    }

    /// Run the character-reference decoder, forwarding its errors.
    fn consume_reference(&mut self, additional: Option<char>) -> ReadResult<Option<String>> {
        let mut codes: Vec<&'static str> = Vec::new();
        let result = entities::consume_entity(&mut self.stream, additional, &mut |c| {
            codes.push(c);
        });
        for code in codes {
            self.parse_error(code);
        }
        result
    }

    /// On leaving the attribute name state: "if there is already an
    /// attribute on the token with the exact same name, then this is a
    /// duplicate-attribute parse error and the new attribute must be
    /// removed from the token." Removal is deferred to emission so the
    /// doomed attribute can keep absorbing its value characters.
    fn check_duplicate_attribute(&mut self) {
        if self.current().current_attribute_is_duplicate() {
            let name = self
                .current()
                .current_attribute_name()
                .unwrap_or_default()
                .to_string();
            self.parse_error_args("duplicate-attribute", &[("name", &name)]);
            let index = match self.current() {
                Token::StartTag { attributes, .. } | Token::EndTag { attributes, .. } => {
                    attributes.len() - 1
                }
                _ => return,
            };
            self.duplicate_attributes.push(index);
        }
    }

    // ==== data, RCDATA, RAWTEXT, PLAINTEXT ===================================

    fn data_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.emit_eof();
            }
            Some('&') => self.state = TokenizerState::CharacterReferenceInData,
            Some('<') => self.state = TokenizerState::TagOpen,
            Some('\0') => {
                self.emit_characters(String::from('\0'));
                self.stream.commit();
            }
            Some(c) => {
                let chars = next_run!(self.stream.match_until(&['&', '<', '\0']));
                let mut data = String::from(c);
                data.push_str(&chars);
                self.emit_characters(data);
                self.stream.commit();
            }
        }
        Step::Continue
    }

    fn character_reference_in_data_state(&mut self) -> Step {
        let decoded = match self.consume_reference(None) {
            ReadResult::Ready(d) => d,
            ReadResult::Eof => None,
            ReadResult::NeedsData => return Step::Suspend,
        };
        self.state = TokenizerState::Data;
        self.emit_characters(decoded.unwrap_or_else(|| String::from('&')));
        Step::Continue
    }

    fn rcdata_state(&mut self) -> Step {
        match next_char!(self) {
            None => self.emit_eof(),
            Some('&') => self.state = TokenizerState::CharacterReferenceInRCDATA,
            Some('<') => self.state = TokenizerState::RCDATALessThanSign,
            Some('\0') => {
                self.parse_error("invalid-codepoint");
                self.emit_characters(String::from('\u{FFFD}'));
                self.stream.commit();
            }
            Some(c) => {
                let chars = next_run!(self.stream.match_until(&['&', '<', '\0']));
                let mut data = String::from(c);
                data.push_str(&chars);
                self.emit_characters(data);
                self.stream.commit();
            }
        }
        Step::Continue
    }

    fn character_reference_in_rcdata_state(&mut self) -> Step {
        let decoded = match self.consume_reference(None) {
            ReadResult::Ready(d) => d,
            ReadResult::Eof => None,
            ReadResult::NeedsData => return Step::Suspend,
        };
        self.state = TokenizerState::RCDATA;
        self.emit_characters(decoded.unwrap_or_else(|| String::from('&')));
        Step::Continue
    }

    fn rawtext_state(&mut self) -> Step {
        match next_char!(self) {
            None => self.emit_eof(),
            Some('<') => self.state = TokenizerState::RAWTEXTLessThanSign,
            Some('\0') => {
                self.parse_error("invalid-codepoint");
                self.emit_characters(String::from('\u{FFFD}'));
            }
            Some(c) => {
                let chars = next_run!(self.stream.match_until(&['<', '\0']));
                let mut data = String::from(c);
                data.push_str(&chars);
                self.emit_characters(data);
            }
        }
        Step::Continue
    }

    fn plaintext_state(&mut self) -> Step {
        match next_char!(self) {
            None => self.emit_eof(),
            Some('\0') => {
                self.parse_error("invalid-codepoint");
                self.emit_characters(String::from('\u{FFFD}'));
            }
            Some(c) => {
                let chars = next_run!(self.stream.match_until(&['\0']));
                let mut data = String::from(c);
                data.push_str(&chars);
                self.emit_characters(data);
            }
        }
        Step::Continue
    }

    fn rcdata_less_than_sign_state(&mut self) -> Step {
        match next_char!(self) {
            Some('/') => {
                self.temporary_buffer.clear();
                self.state = TokenizerState::RCDATAEndTagOpen;
            }
            other => {
                self.emit_characters(String::from('<'));
                if let Some(c) = other {
                    self.stream.unget(&c.to_string());
                }
                self.state = TokenizerState::RCDATA;
            }
        }
        Step::Continue
    }

    fn rcdata_end_tag_open_state(&mut self) -> Step {
        match next_char!(self) {
            Some(c) if c.is_ascii_alphabetic() => {
                self.temporary_buffer.push(c);
                self.state = TokenizerState::RCDATAEndTagName;
            }
            other => {
                self.emit_characters("</".to_string());
                if let Some(c) = other {
                    self.stream.unget(&c.to_string());
                }
                self.state = TokenizerState::RCDATA;
            }
        }
        Step::Continue
    }

    fn rcdata_end_tag_name_state(&mut self) -> Step {
        self.raw_end_tag_name_state(TokenizerState::RCDATA)
    }

    fn rawtext_less_than_sign_state(&mut self) -> Step {
        match next_char!(self) {
            Some('/') => {
                self.temporary_buffer.clear();
                self.state = TokenizerState::RAWTEXTEndTagOpen;
            }
            other => {
                self.emit_characters(String::from('<'));
                if let Some(c) = other {
                    self.stream.unget(&c.to_string());
                }
                self.state = TokenizerState::RAWTEXT;
            }
        }
        Step::Continue
    }

    fn rawtext_end_tag_open_state(&mut self) -> Step {
        match next_char!(self) {
            Some(c) if c.is_ascii_alphabetic() => {
                self.temporary_buffer.push(c);
                self.state = TokenizerState::RAWTEXTEndTagName;
            }
            other => {
                self.emit_characters("</".to_string());
                if let Some(c) = other {
                    self.stream.unget(&c.to_string());
                }
                self.state = TokenizerState::RAWTEXT;
            }
        }
        Step::Continue
    }

    fn rawtext_end_tag_name_state(&mut self) -> Step {
        self.raw_end_tag_name_state(TokenizerState::RAWTEXT)
    }

    /// Shared RCDATA/RAWTEXT end tag name handling: only "an
    /// appropriate end tag token" closes the raw element; anything else
    /// replays the lookahead as characters.
    fn raw_end_tag_name_state(&mut self, text_state: TokenizerState) -> Step {
        let appropriate = self.is_appropriate_end_tag();
        match next_char!(self) {
            Some(c) if is_whitespace(c) && appropriate => {
                self.current = Some(Token::new_named_end_tag(self.temporary_buffer.to_lowercase()));
                self.state = TokenizerState::BeforeAttributeName;
            }
            Some('/') if appropriate => {
                self.current = Some(Token::new_named_end_tag(self.temporary_buffer.to_lowercase()));
                self.state = TokenizerState::SelfClosingStartTag;
            }
            Some('>') if appropriate => {
                self.current = Some(Token::new_named_end_tag(self.temporary_buffer.to_lowercase()));
                self.emit_current();
            }
            Some(c) if c.is_ascii_alphabetic() => {
                self.temporary_buffer.push(c);
                self.stream.commit();
            }
            other => {
                let mut data = "</".to_string();
                data.push_str(&self.temporary_buffer);
                self.emit_characters(data);
                if let Some(c) = other {
                    self.stream.unget(&c.to_string());
                }
                self.state = text_state;
            }
        }
        Step::Continue
    }

    // ==== script data ========================================================

    fn script_data_state(&mut self) -> Step {
        match next_char!(self) {
            None => self.emit_eof(),
            Some('<') => self.state = TokenizerState::ScriptDataLessThanSign,
            Some('\0') => {
                self.parse_error("invalid-codepoint");
                self.emit_characters(String::from('\u{FFFD}'));
            }
            Some(c) => {
                let chars = next_run!(self.stream.match_until(&['<', '\0']));
                let mut data = String::from(c);
                data.push_str(&chars);
                self.emit_characters(data);
            }
        }
        Step::Continue
    }

    fn script_data_less_than_sign_state(&mut self) -> Step {
        match next_char!(self) {
            Some('/') => {
                self.temporary_buffer.clear();
                self.state = TokenizerState::ScriptDataEndTagOpen;
            }
            Some('!') => {
                self.emit_characters("<!".to_string());
                self.state = TokenizerState::ScriptDataEscapeStart;
            }
            other => {
                self.emit_characters(String::from('<'));
                if let Some(c) = other {
                    self.stream.unget(&c.to_string());
                }
                self.state = TokenizerState::ScriptData;
            }
        }
        Step::Continue
    }

    fn script_data_end_tag_open_state(&mut self) -> Step {
        match next_char!(self) {
            Some(c) if c.is_ascii_alphabetic() => {
                self.temporary_buffer.push(c);
                self.state = TokenizerState::ScriptDataEndTagName;
            }
            other => {
                self.emit_characters("</".to_string());
                if let Some(c) = other {
                    self.stream.unget(&c.to_string());
                }
                self.state = TokenizerState::ScriptData;
            }
        }
        Step::Continue
    }

    fn script_data_end_tag_name_state(&mut self) -> Step {
        let appropriate = self.is_appropriate_end_tag();
        match next_char!(self) {
            Some(c) if is_whitespace(c) && appropriate => {
                self.current = Some(Token::new_named_end_tag("script".to_string()));
                self.state = TokenizerState::BeforeAttributeName;
            }
            Some('/') if appropriate => {
                self.current = Some(Token::new_named_end_tag("script".to_string()));
                self.state = TokenizerState::SelfClosingStartTag;
            }
            Some('>') if appropriate => {
                self.current = Some(Token::new_named_end_tag("script".to_string()));
                self.emit_current();
            }
            Some(c) if c.is_ascii_alphabetic() => {
                self.temporary_buffer.push(c);
                self.stream.commit();
            }
            other => {
                let mut data = "</".to_string();
                data.push_str(&self.temporary_buffer);
                self.emit_characters(data);
                if let Some(c) = other {
                    self.stream.unget(&c.to_string());
                }
                self.state = TokenizerState::ScriptData;
            }
        }
        Step::Continue
    }

    fn script_data_escape_start_state(&mut self) -> Step {
        match next_char!(self) {
            Some('-') => {
                self.emit_characters(String::from('-'));
                self.state = TokenizerState::ScriptDataEscapeStartDash;
            }
            other => {
                if let Some(c) = other {
                    self.stream.unget(&c.to_string());
                }
                self.state = TokenizerState::ScriptData;
            }
        }
        Step::Continue
    }

    fn script_data_escape_start_dash_state(&mut self) -> Step {
        match next_char!(self) {
            Some('-') => {
                self.emit_characters(String::from('-'));
                self.state = TokenizerState::ScriptDataEscapedDashDash;
            }
            other => {
                if let Some(c) = other {
                    self.stream.unget(&c.to_string());
                }
                self.state = TokenizerState::ScriptData;
            }
        }
        Step::Continue
    }

    fn script_data_escaped_state(&mut self) -> Step {
        match next_char!(self) {
            None => self.state = TokenizerState::Data,
            Some('-') => {
                self.emit_characters(String::from('-'));
                self.state = TokenizerState::ScriptDataEscapedDash;
            }
            Some('<') => self.state = TokenizerState::ScriptDataEscapedLessThanSign,
            Some('\0') => {
                self.parse_error("invalid-codepoint");
                self.emit_characters(String::from('\u{FFFD}'));
                self.stream.commit();
            }
            Some(c) => {
                let chars = next_run!(self.stream.match_until(&['<', '-', '\0']));
                let mut data = String::from(c);
                data.push_str(&chars);
                self.emit_characters(data);
            }
        }
        Step::Continue
    }

    fn script_data_escaped_dash_state(&mut self) -> Step {
        match next_char!(self) {
            None => self.state = TokenizerState::Data,
            Some('-') => {
                self.emit_characters(String::from('-'));
                self.state = TokenizerState::ScriptDataEscapedDashDash;
            }
            Some('<') => self.state = TokenizerState::ScriptDataEscapedLessThanSign,
            Some('\0') => {
                self.parse_error("invalid-codepoint");
                self.emit_characters(String::from('\u{FFFD}'));
                self.state = TokenizerState::ScriptDataEscaped;
            }
            Some(c) => {
                self.emit_characters(String::from(c));
                self.state = TokenizerState::ScriptDataEscaped;
            }
        }
        Step::Continue
    }

    fn script_data_escaped_dash_dash_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("eof-in-script");
                self.state = TokenizerState::Data;
            }
            Some('<') => self.state = TokenizerState::ScriptDataEscapedLessThanSign,
            Some('>') => {
                self.emit_characters(String::from('>'));
                self.state = TokenizerState::ScriptData;
            }
            Some('\0') => {
                self.parse_error("invalid-codepoint");
                self.emit_characters(String::from('\u{FFFD}'));
                self.state = TokenizerState::ScriptDataEscaped;
            }
            Some(c) => {
                self.emit_characters(String::from(c));
                self.state = TokenizerState::ScriptDataEscaped;
            }
        }
        Step::Continue
    }

    fn script_data_escaped_less_than_sign_state(&mut self) -> Step {
        match next_char!(self) {
            Some('/') => {
                self.temporary_buffer.clear();
                self.state = TokenizerState::ScriptDataEscapedEndTagOpen;
            }
            Some(c) if c.is_ascii_alphabetic() => {
                let mut data = String::from('<');
                data.push(c);
                self.emit_characters(data);
                self.temporary_buffer.clear();
                self.temporary_buffer.push(c);
                self.state = TokenizerState::ScriptDataDoubleEscapeStart;
            }
            other => {
                self.emit_characters(String::from('<'));
                if let Some(c) = other {
                    self.stream.unget(&c.to_string());
                }
                self.state = TokenizerState::ScriptDataEscaped;
            }
        }
        Step::Continue
    }

    fn script_data_escaped_end_tag_open_state(&mut self) -> Step {
        match next_char!(self) {
            Some(c) if c.is_ascii_alphabetic() => {
                self.temporary_buffer.clear();
                self.temporary_buffer.push(c);
                self.state = TokenizerState::ScriptDataEscapedEndTagName;
            }
            other => {
                self.emit_characters("</".to_string());
                if let Some(c) = other {
                    self.stream.unget(&c.to_string());
                }
                self.state = TokenizerState::ScriptDataEscaped;
            }
        }
        Step::Continue
    }

    fn script_data_escaped_end_tag_name_state(&mut self) -> Step {
        let appropriate = self.is_appropriate_end_tag();
        match next_char!(self) {
            Some(c) if is_whitespace(c) && appropriate => {
                self.current = Some(Token::new_named_end_tag("script".to_string()));
                self.state = TokenizerState::BeforeAttributeName;
            }
            Some('/') if appropriate => {
                self.current = Some(Token::new_named_end_tag("script".to_string()));
                self.state = TokenizerState::SelfClosingStartTag;
            }
            Some('>') if appropriate => {
                self.current = Some(Token::new_named_end_tag("script".to_string()));
                self.emit_current();
            }
            Some(c) if c.is_ascii_alphabetic() => {
                self.temporary_buffer.push(c);
                self.stream.commit();
            }
            other => {
                let mut data = "</".to_string();
                data.push_str(&self.temporary_buffer);
                self.emit_characters(data);
                if let Some(c) = other {
                    self.stream.unget(&c.to_string());
                }
                self.state = TokenizerState::ScriptDataEscaped;
            }
        }
        Step::Continue
    }

    fn script_data_double_escape_start_state(&mut self) -> Step {
        match next_char!(self) {
            Some(c) if is_whitespace(c) || c == '/' || c == '>' => {
                self.emit_characters(String::from(c));
                self.state = if self.temporary_buffer.to_lowercase() == "script" {
                    TokenizerState::ScriptDataDoubleEscaped
                } else {
                    TokenizerState::ScriptDataEscaped
                };
            }
            Some(c) if c.is_ascii_alphabetic() => {
                self.emit_characters(String::from(c));
                self.temporary_buffer.push(c);
                self.stream.commit();
            }
            other => {
                if let Some(c) = other {
                    self.stream.unget(&c.to_string());
                }
                self.state = TokenizerState::ScriptDataEscaped;
            }
        }
        Step::Continue
    }

    fn script_data_double_escaped_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("eof-in-script");
                self.state = TokenizerState::Data;
            }
            Some('-') => {
                self.emit_characters(String::from('-'));
                self.state = TokenizerState::ScriptDataDoubleEscapedDash;
            }
            Some('<') => {
                self.emit_characters(String::from('<'));
                self.state = TokenizerState::ScriptDataDoubleEscapedLessThanSign;
            }
            Some('\0') => {
                self.parse_error("invalid-codepoint");
                self.emit_characters(String::from('\u{FFFD}'));
                self.stream.commit();
            }
            Some(c) => {
                self.emit_characters(String::from(c));
                self.stream.commit();
            }
        }
        Step::Continue
    }

    fn script_data_double_escaped_dash_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("eof-in-script");
                self.state = TokenizerState::Data;
            }
            Some('-') => {
                self.emit_characters(String::from('-'));
                self.state = TokenizerState::ScriptDataDoubleEscapedDashDash;
            }
            Some('<') => {
                self.emit_characters(String::from('<'));
                self.state = TokenizerState::ScriptDataDoubleEscapedLessThanSign;
            }
            Some('\0') => {
                self.parse_error("invalid-codepoint");
                self.emit_characters(String::from('\u{FFFD}'));
                self.state = TokenizerState::ScriptDataDoubleEscaped;
            }
            Some(c) => {
                self.emit_characters(String::from(c));
                self.state = TokenizerState::ScriptDataDoubleEscaped;
            }
        }
        Step::Continue
    }

    fn script_data_double_escaped_dash_dash_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("eof-in-script");
                self.state = TokenizerState::Data;
            }
            Some('-') => {
                self.emit_characters(String::from('-'));
                self.stream.commit();
            }
            Some('<') => {
                self.emit_characters(String::from('<'));
                self.state = TokenizerState::ScriptDataDoubleEscapedLessThanSign;
            }
            Some('>') => {
                self.emit_characters(String::from('>'));
                self.state = TokenizerState::ScriptData;
            }
            Some('\0') => {
                self.parse_error("invalid-codepoint");
                self.emit_characters(String::from('\u{FFFD}'));
                self.state = TokenizerState::ScriptDataDoubleEscaped;
            }
            Some(c) => {
                self.emit_characters(String::from(c));
                self.state = TokenizerState::ScriptDataDoubleEscaped;
            }
        }
        Step::Continue
    }

    fn script_data_double_escaped_less_than_sign_state(&mut self) -> Step {
        match next_char!(self) {
            Some('/') => {
                self.emit_characters(String::from('/'));
                self.temporary_buffer.clear();
                self.state = TokenizerState::ScriptDataDoubleEscapeEnd;
            }
            other => {
                if let Some(c) = other {
                    self.stream.unget(&c.to_string());
                }
                self.state = TokenizerState::ScriptDataDoubleEscaped;
            }
        }
        Step::Continue
    }

    fn script_data_double_escape_end_state(&mut self) -> Step {
        match next_char!(self) {
            Some(c) if is_whitespace(c) || c == '/' || c == '>' => {
                self.emit_characters(String::from(c));
                self.state = if self.temporary_buffer.to_lowercase() == "script" {
                    TokenizerState::ScriptDataEscaped
                } else {
                    TokenizerState::ScriptDataDoubleEscaped
                };
            }
            Some(c) if c.is_ascii_alphabetic() => {
                self.emit_characters(String::from(c));
                self.temporary_buffer.push(c);
                self.stream.commit();
            }
            other => {
                if let Some(c) = other {
                    self.stream.unget(&c.to_string());
                }
                self.state = TokenizerState::ScriptDataDoubleEscaped;
            }
        }
        Step::Continue
    }

    // ==== tags ===============================================================

    fn tag_open_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("bare-less-than-sign-at-eof");
                self.emit_characters(String::from('<'));
                self.state = TokenizerState::Data;
            }
            Some(c) if c.is_ascii_alphabetic() => {
                self.current = Some(Token::new_start_tag(c.to_ascii_lowercase()));
                self.state = TokenizerState::TagName;
            }
            Some('!') => self.state = TokenizerState::MarkupDeclarationOpen,
            Some('/') => self.state = TokenizerState::CloseTagOpen,
            Some('>') => {
                self.parse_error("expected-tag-name-but-got-right-bracket");
                self.emit_characters("<>".to_string());
                self.state = TokenizerState::Data;
            }
            Some('?') => {
                self.parse_error("expected-tag-name-but-got-question-mark");
                self.stream.unget("?");
                self.state = TokenizerState::BogusComment;
            }
            Some(c) => {
                self.parse_error("expected-tag-name");
                self.emit_characters(String::from('<'));
                self.stream.unget(&c.to_string());
                self.state = TokenizerState::Data;
            }
        }
        Step::Continue
    }

    fn close_tag_open_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("expected-closing-tag-but-got-eof");
                self.emit_characters("</".to_string());
                self.state = TokenizerState::Data;
            }
            Some(c) if c.is_ascii_alphabetic() => {
                self.current = Some(Token::new_end_tag(c.to_ascii_lowercase()));
                self.state = TokenizerState::TagName;
            }
            Some('>') => {
                self.parse_error("expected-closing-tag-but-got-right-bracket");
                self.state = TokenizerState::Data;
            }
            Some(c) => {
                self.parse_error_args("expected-closing-tag-but-got-char", &[(
                    "data",
                    &c.to_string(),
                )]);
                self.stream.unget(&c.to_string());
                self.state = TokenizerState::BogusComment;
            }
        }
        Step::Continue
    }

    fn tag_name_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("eof-in-tag-name");
                self.state = TokenizerState::Data;
            }
            Some(c) if is_whitespace(c) => self.state = TokenizerState::BeforeAttributeName,
            Some(c) if c.is_ascii_alphabetic() => {
                self.current().append_to_tag_name(c.to_ascii_lowercase());
            }
            Some('>') => self.emit_current(),
            Some('/') => self.state = TokenizerState::SelfClosingStartTag,
            Some('\0') => {
                self.parse_error("invalid-codepoint");
                self.current().append_to_tag_name('\u{FFFD}');
            }
            Some(c) => self.current().append_to_tag_name(c),
        }
        Step::Continue
    }

    // ==== attributes =========================================================

    fn before_attribute_name_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("expected-attribute-name-but-got-eof");
                self.state = TokenizerState::Data;
            }
            Some(c) if is_whitespace(c) => {}
            Some(c) if c.is_ascii_alphabetic() => {
                self.current()
                    .start_new_attribute(c.to_ascii_lowercase().to_string());
                self.state = TokenizerState::AttributeName;
            }
            Some('>') => self.emit_current(),
            Some('/') => self.state = TokenizerState::SelfClosingStartTag,
            Some(c @ ('\'' | '"' | '=' | '<')) => {
                self.parse_error("invalid-character-in-attribute-name");
                self.current().start_new_attribute(c.to_string());
                self.state = TokenizerState::AttributeName;
            }
            Some('\0') => {
                self.parse_error("invalid-codepoint");
                self.current().start_new_attribute("\u{FFFD}".to_string());
            }
            Some(c) => {
                self.current().start_new_attribute(c.to_string());
                self.state = TokenizerState::AttributeName;
            }
        }
        Step::Continue
    }

    fn attribute_name_state(&mut self) -> Step {
        let mut leaving = true;
        let mut should_emit = false;
        match next_char!(self) {
            None => {
                self.parse_error("eof-in-attribute-name");
                self.state = TokenizerState::Data;
                should_emit = true;
            }
            Some('=') => self.state = TokenizerState::BeforeAttributeValue,
            Some(c) if c.is_ascii_alphabetic() => {
                self.current()
                    .append_to_attribute_name(c.to_ascii_lowercase());
                leaving = false;
            }
            Some('>') => should_emit = true,
            Some(c) if is_whitespace(c) => self.state = TokenizerState::AfterAttributeName,
            Some('/') => self.state = TokenizerState::SelfClosingStartTag,
            Some(c @ ('\'' | '"')) => {
                self.parse_error("invalid-character-in-attribute-name");
                self.current().append_to_attribute_name(c);
                leaving = false;
            }
            Some('\0') => {
                self.parse_error("invalid-codepoint");
                self.current().append_to_attribute_name('\u{FFFD}');
            }
            Some(c) => {
                self.current().append_to_attribute_name(c);
                leaving = false;
            }
        }
        if leaving {
            self.check_duplicate_attribute();
            if should_emit {
                self.emit_current();
            }
        } else {
            self.stream.commit();
        }
        Step::Continue
    }

    fn after_attribute_name_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("expected-end-of-tag-but-got-eof");
                self.state = TokenizerState::Data;
            }
            Some(c) if is_whitespace(c) => {}
            Some('=') => self.state = TokenizerState::BeforeAttributeValue,
            Some('>') => self.emit_current(),
            Some(c) if c.is_ascii_alphabetic() => {
                self.current().start_new_attribute(c.to_string());
                self.state = TokenizerState::AttributeName;
            }
            Some('/') => self.state = TokenizerState::SelfClosingStartTag,
            Some(c @ ('\'' | '"' | '<')) => {
                self.parse_error("invalid-character-after-attribute-name");
                self.current().start_new_attribute(c.to_string());
                self.state = TokenizerState::AttributeName;
            }
            Some('\0') => {
                self.parse_error("invalid-codepoint");
                self.current().start_new_attribute("\u{FFFD}".to_string());
            }
            Some(c) => {
                self.current().start_new_attribute(c.to_string());
                self.state = TokenizerState::AttributeName;
            }
        }
        Step::Continue
    }

    fn before_attribute_value_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("expected-attribute-value-but-got-eof");
                self.state = TokenizerState::Data;
            }
            Some(c) if is_whitespace(c) => {}
            Some('"') => self.state = TokenizerState::AttributeValueDoubleQuoted,
            Some('&') => {
                self.state = TokenizerState::AttributeValueUnquoted;
                self.stream.unget("&");
            }
            Some('\'') => self.state = TokenizerState::AttributeValueSingleQuoted,
            Some('>') => {
                self.parse_error("expected-attribute-value-but-got-right-bracket");
                self.emit_current();
            }
            Some(c @ ('=' | '<' | '`')) => {
                self.parse_error("unexpected-character-in-unquoted-attribute-value");
                self.current().append_to_attribute_value(&c.to_string());
                self.state = TokenizerState::AttributeValueUnquoted;
            }
            Some('\0') => {
                self.parse_error("invalid-codepoint");
                self.current().append_to_attribute_value("\u{FFFD}");
            }
            Some(c) => {
                self.current().append_to_attribute_value(&c.to_string());
                self.state = TokenizerState::AttributeValueUnquoted;
            }
        }
        Step::Continue
    }

    fn attribute_value_double_quoted_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("eof-in-attribute-value-double-quote");
                self.state = TokenizerState::Data;
            }
            Some('"') => self.state = TokenizerState::AfterAttributeValueQuoted,
            Some('&') => {
                self.additional_allowed = Some('"');
                self.return_state = TokenizerState::AttributeValueDoubleQuoted;
                self.state = TokenizerState::CharacterReferenceInAttributeValue;
            }
            Some('\0') => {
                self.parse_error("invalid-codepoint");
                self.current().append_to_attribute_value("\u{FFFD}");
            }
            Some(c) => {
                let chars = next_run!(self.stream.match_until(&['\0', '"', '&']));
                let mut data = String::from(c);
                data.push_str(&chars);
                self.current().append_to_attribute_value(&data);
            }
        }
        Step::Continue
    }

    fn attribute_value_single_quoted_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("eof-in-attribute-value-single-quote");
                self.state = TokenizerState::Data;
            }
            Some('\'') => self.state = TokenizerState::AfterAttributeValueQuoted,
            Some('&') => {
                self.additional_allowed = Some('\'');
                self.return_state = TokenizerState::AttributeValueSingleQuoted;
                self.state = TokenizerState::CharacterReferenceInAttributeValue;
            }
            Some('\0') => {
                self.parse_error("invalid-codepoint");
                self.current().append_to_attribute_value("\u{FFFD}");
            }
            Some(c) => {
                let chars = next_run!(self.stream.match_until(&['\0', '\'', '&']));
                let mut data = String::from(c);
                data.push_str(&chars);
                self.current().append_to_attribute_value(&data);
            }
        }
        Step::Continue
    }

    fn attribute_value_unquoted_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("eof-after-attribute-value");
                self.state = TokenizerState::Data;
            }
            Some(c) if is_whitespace(c) => self.state = TokenizerState::BeforeAttributeName,
            Some('&') => {
                self.additional_allowed = Some('>');
                self.return_state = TokenizerState::AttributeValueUnquoted;
                self.state = TokenizerState::CharacterReferenceInAttributeValue;
            }
            Some('>') => self.emit_current(),
            Some(c @ ('"' | '\'' | '=' | '`' | '<')) => {
                self.parse_error("unexpected-character-in-unquoted-attribute-value");
                self.current().append_to_attribute_value(&c.to_string());
                self.stream.commit();
            }
            Some('\0') => {
                self.parse_error("invalid-codepoint");
                self.current().append_to_attribute_value("\u{FFFD}");
            }
            Some(c) => {
                let chars = next_run!(self.stream.match_until(&[
                    '\0', '\t', '\n', '\x0B', '\x0C', ' ', '&', '<', '>', '"', '\'', '=', '`',
                ]));
                let mut data = String::from(c);
                data.push_str(&chars);
                self.current().append_to_attribute_value(&data);
                self.stream.commit();
            }
        }
        Step::Continue
    }

    fn character_reference_in_attribute_value_state(&mut self) -> Step {
        let decoded = match self.consume_reference(self.additional_allowed) {
            ReadResult::Ready(d) => d,
            ReadResult::Eof => None,
            ReadResult::NeedsData => return Step::Suspend,
        };
        let text = decoded.unwrap_or_else(|| String::from('&'));
        self.current().append_to_attribute_value(&text);
        self.state = self.return_state;
        Step::Continue
    }

    fn after_attribute_value_quoted_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("eof-after-attribute-value");
                self.state = TokenizerState::Data;
            }
            Some(c) if is_whitespace(c) => self.state = TokenizerState::BeforeAttributeName,
            Some('>') => self.emit_current(),
            Some('/') => self.state = TokenizerState::SelfClosingStartTag,
            Some(c) => {
                self.parse_error("unexpected-character-after-attribute-value");
                self.stream.unget(&c.to_string());
                self.state = TokenizerState::BeforeAttributeName;
            }
        }
        Step::Continue
    }

    fn self_closing_start_tag_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("unexpected-eof-after-solidus-in-tag");
                self.state = TokenizerState::Data;
            }
            Some('>') => {
                self.current().set_self_closing();
                self.emit_current();
            }
            Some(c) => {
                self.parse_error("unexpected-character-after-solidus-in-tag");
                self.stream.unget(&c.to_string());
                self.state = TokenizerState::BeforeAttributeName;
            }
        }
        Step::Continue
    }

    // ==== comments, CDATA, bogus constructs ==================================

    fn bogus_comment_state(&mut self) -> Step {
        let data = next_run!(self.stream.match_until(&['>']));
        let _ = self.stream.char();
        let data = data.replace('\0', "\u{FFFD}");
        self.emit_token(Token::Comment { data });
        self.state = TokenizerState::Data;
        Step::Continue
    }

    fn markup_declaration_open_state(&mut self) -> Step {
        let two = match self.stream.shift(2) {
            ReadResult::Ready(s) => s,
            ReadResult::Eof => {
                self.parse_error("expected-dashes-or-doctype");
                self.state = TokenizerState::BogusComment;
                return Step::Continue;
            }
            ReadResult::NeedsData => return Step::Suspend,
        };
        if two == "--" {
            self.current = Some(Token::new_comment());
            self.state = TokenizerState::CommentStart;
            return Step::Continue;
        }
        let five = match self.stream.shift(5) {
            ReadResult::Ready(s) => s,
            ReadResult::Eof => {
                self.parse_error("expected-dashes-or-doctype");
                self.stream.unget(&two);
                self.state = TokenizerState::BogusComment;
                return Step::Continue;
            }
            ReadResult::NeedsData => return Step::Suspend,
        };
        let mut all = two;
        all.push_str(&five);
        if all.eq_ignore_ascii_case("doctype") {
            self.current = Some(Token::new_doctype());
            self.state = TokenizerState::DOCTYPE;
        } else if self.cdata_allowed && all == "[CDATA[" {
            self.state = TokenizerState::CDATASection;
        } else {
            self.parse_error("expected-dashes-or-doctype");
            self.stream.unget(&all);
            self.state = TokenizerState::BogusComment;
        }
        Step::Continue
    }

    fn cdata_section_state(&mut self) -> Step {
        let mut data = String::new();
        loop {
            let chunk = next_run!(self.stream.match_until(&[']']));
            data.push_str(&chunk);
            match self.stream.peek(3) {
                ReadResult::Ready(ahead) if ahead == "]]>" => {
                    let _ = self.stream.shift(3);
                    break;
                }
                ReadResult::Ready(_) => {
                    // A lone `]`: part of the section data.
                    if let ReadResult::Ready(c) = self.stream.char() {
                        data.push(c);
                    }
                }
                ReadResult::Eof => break,
                ReadResult::NeedsData => return Step::Suspend,
            }
        }
        self.emit_characters(data);
        self.state = TokenizerState::Data;
        Step::Continue
    }

    fn comment_start_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("eof-in-comment");
                self.emit_current_comment_and_return_to_data();
            }
            Some('-') => self.state = TokenizerState::CommentStartDash,
            Some('>') => {
                self.parse_error("incorrect-comment");
                self.emit_current_comment_and_return_to_data();
            }
            Some('\0') => {
                self.parse_error("invalid-codepoint");
                self.current().append_to_comment("\u{FFFD}");
                self.state = TokenizerState::Comment;
            }
            Some(c) => {
                self.current().append_to_comment(&c.to_string());
                self.state = TokenizerState::Comment;
            }
        }
        Step::Continue
    }

    fn comment_start_dash_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("eof-in-comment");
                self.emit_current_comment_and_return_to_data();
            }
            Some('-') => self.state = TokenizerState::CommentEnd,
            Some('>') => {
                self.parse_error("incorrect-comment");
                self.emit_current_comment_and_return_to_data();
            }
            Some('\0') => {
                self.parse_error("invalid-codepoint");
                self.current().append_to_comment("-\u{FFFD}");
                self.state = TokenizerState::Comment;
            }
            Some(c) => {
                let mut s = String::from('-');
                s.push(c);
                self.current().append_to_comment(&s);
                self.state = TokenizerState::Comment;
            }
        }
        Step::Continue
    }

    fn comment_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("eof-in-comment");
                self.emit_current_comment_and_return_to_data();
            }
            Some('-') => self.state = TokenizerState::CommentEndDash,
            Some('\0') => {
                self.parse_error("invalid-codepoint");
                self.current().append_to_comment("\u{FFFD}");
            }
            Some(c) => {
                let chars = next_run!(self.stream.match_until(&['-', '\0']));
                let mut s = String::from(c);
                s.push_str(&chars);
                self.current().append_to_comment(&s);
                self.stream.commit();
            }
        }
        Step::Continue
    }

    fn comment_end_dash_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("eof-in-comment-end-dash");
                self.emit_current_comment_and_return_to_data();
            }
            Some('-') => self.state = TokenizerState::CommentEnd,
            Some('\0') => {
                self.parse_error("invalid-codepoint");
                self.current().append_to_comment("-\u{FFFD}");
                self.state = TokenizerState::Comment;
            }
            Some(c) => {
                // Batch the run up to the next dash, then absorb that
                // dash so this state sees what follows it.
                let chars = next_run!(self.stream.match_until(&['\0', '-']));
                let _ = self.stream.char();
                let mut s = String::from('-');
                s.push(c);
                s.push_str(&chars);
                self.current().append_to_comment(&s);
            }
        }
        Step::Continue
    }

    fn comment_end_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("eof-in-comment-double-dash");
                self.emit_current_comment_and_return_to_data();
            }
            Some('>') => self.emit_current_comment_and_return_to_data(),
            Some('!') => {
                self.parse_error("unexpected-bang-after-double-dash-in-comment");
                self.state = TokenizerState::CommentEndBang;
            }
            Some('-') => {
                self.parse_error("unexpected-dash-after-double-dash-in-comment");
                self.current().append_to_comment("-");
            }
            Some('\0') => {
                self.parse_error("invalid-codepoint");
                self.current().append_to_comment("--\u{FFFD}");
                self.state = TokenizerState::Comment;
            }
            Some(c) => {
                self.parse_error("unexpected-char-in-comment");
                let mut s = "--".to_string();
                s.push(c);
                self.current().append_to_comment(&s);
                self.state = TokenizerState::Comment;
            }
        }
        Step::Continue
    }

    fn comment_end_bang_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("eof-in-comment-end-bang-state");
                self.emit_current_comment_and_return_to_data();
            }
            Some('>') => self.emit_current_comment_and_return_to_data(),
            Some('-') => {
                self.current().append_to_comment("--!");
                self.state = TokenizerState::CommentEndDash;
            }
            Some(c) => {
                let mut s = "--!".to_string();
                s.push(c);
                self.current().append_to_comment(&s);
                self.state = TokenizerState::Comment;
            }
        }
        Step::Continue
    }

    fn emit_current_comment_and_return_to_data(&mut self) {
        let token = self.current.take().expect("no comment to emit");
        self.emit_token(token);
        self.state = TokenizerState::Data;
    }

    // ==== DOCTYPE ============================================================

    fn doctype_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("expected-doctype-name-but-got-eof");
                self.current().set_force_quirks();
                self.emit_current();
            }
            Some(c) if is_whitespace(c) => self.state = TokenizerState::BeforeDOCTYPEName,
            Some(c) => {
                self.parse_error("need-space-after-doctype");
                self.stream.unget(&c.to_string());
                self.state = TokenizerState::BeforeDOCTYPEName;
            }
        }
        Step::Continue
    }

    fn before_doctype_name_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("expected-doctype-name-but-got-eof");
                self.current().set_force_quirks();
                self.emit_current();
            }
            Some(c) if is_whitespace(c) => {}
            Some('>') => {
                self.parse_error("expected-doctype-name-but-got-right-bracket");
                self.current().set_force_quirks();
                self.emit_current();
            }
            Some(c) => {
                self.current()
                    .append_to_doctype_name(c.to_ascii_lowercase());
                self.state = TokenizerState::DOCTYPEName;
            }
        }
        Step::Continue
    }

    fn doctype_name_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("eof-in-doctype-name");
                self.current().set_force_quirks();
                self.emit_current();
            }
            Some(c) if is_whitespace(c) => self.state = TokenizerState::AfterDOCTYPEName,
            Some('>') => self.emit_current(),
            Some(c) => {
                self.current()
                    .append_to_doctype_name(c.to_ascii_lowercase());
                self.stream.commit();
            }
        }
        Step::Continue
    }

    fn after_doctype_name_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("eof-in-doctype");
                self.current().set_force_quirks();
                self.emit_current();
            }
            Some(c) if is_whitespace(c) => {}
            Some('>') => self.emit_current(),
            Some('p' | 'P') => match self.match_keyword_tail("ublic") {
                KeywordTail::Matched => self.state = TokenizerState::AfterDOCTYPEPublicKeyword,
                KeywordTail::Failed(last) => self.fail_after_doctype_name(last),
                KeywordTail::Suspend => return Step::Suspend,
            },
            Some('s' | 'S') => match self.match_keyword_tail("ystem") {
                KeywordTail::Matched => self.state = TokenizerState::AfterDOCTYPESystemKeyword,
                KeywordTail::Failed(last) => self.fail_after_doctype_name(last),
                KeywordTail::Suspend => return Step::Suspend,
            },
            Some(c) => self.fail_after_doctype_name(Some(c)),
        }
        Step::Continue
    }

    /// Read the tail of the PUBLIC/SYSTEM keyword case-insensitively.
    /// Matched letters stay consumed on failure; only the first
    /// mismatching character is carried back.
    fn match_keyword_tail(&mut self, tail: &str) -> KeywordTail {
        for expected in tail.chars() {
            match self.stream.char() {
                ReadResult::Ready(c) if c.eq_ignore_ascii_case(&expected) => {}
                ReadResult::Ready(c) => return KeywordTail::Failed(Some(c)),
                ReadResult::Eof => return KeywordTail::Failed(None),
                ReadResult::NeedsData => return KeywordTail::Suspend,
            }
        }
        KeywordTail::Matched
    }

    fn fail_after_doctype_name(&mut self, last: Option<char>) {
        if let Some(c) = last {
            self.stream.unget(&c.to_string());
        }
        self.current().set_force_quirks();
        match last {
            None => {
                self.parse_error("eof-in-doctype");
                self.emit_current();
            }
            Some(c) => {
                self.parse_error_args("expected-space-or-right-bracket-in-doctype", &[(
                    "data",
                    &c.to_string(),
                )]);
                self.state = TokenizerState::BogusDOCTYPE;
            }
        }
    }

    fn after_doctype_public_keyword_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("eof-in-doctype");
                self.current().set_force_quirks();
                self.emit_current();
            }
            Some(c) if is_whitespace(c) => {
                self.state = TokenizerState::BeforeDOCTYPEPublicIdentifier;
            }
            Some(c @ ('\'' | '"')) => {
                self.parse_error("unexpected-char-in-doctype");
                self.stream.unget(&c.to_string());
                self.state = TokenizerState::BeforeDOCTYPEPublicIdentifier;
            }
            Some(c) => {
                self.stream.unget(&c.to_string());
                self.state = TokenizerState::BeforeDOCTYPEPublicIdentifier;
            }
        }
        Step::Continue
    }

    fn before_doctype_public_identifier_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("eof-in-doctype");
                self.current().set_force_quirks();
                self.emit_current();
            }
            Some(c) if is_whitespace(c) => {}
            Some('"') => {
                self.current().clear_public_id();
                self.state = TokenizerState::DOCTYPEPublicIdentifierDoubleQuoted;
            }
            Some('\'') => {
                self.current().clear_public_id();
                self.state = TokenizerState::DOCTYPEPublicIdentifierSingleQuoted;
            }
            Some('>') => {
                self.parse_error("unexpected-end-of-doctype");
                self.current().set_force_quirks();
                self.emit_current();
            }
            Some(_) => {
                self.parse_error("unexpected-char-in-doctype");
                self.current().set_force_quirks();
                self.state = TokenizerState::BogusDOCTYPE;
            }
        }
        Step::Continue
    }

    fn doctype_public_identifier_state(&mut self, quote: char) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("eof-in-doctype");
                self.current().set_force_quirks();
                self.emit_current();
            }
            Some(c) if c == quote => self.state = TokenizerState::AfterDOCTYPEPublicIdentifier,
            Some('>') => {
                self.parse_error("unexpected-end-of-doctype");
                self.current().set_force_quirks();
                self.emit_current();
            }
            Some(c) => {
                self.current().append_to_public_id(c);
                self.stream.commit();
            }
        }
        Step::Continue
    }

    fn after_doctype_public_identifier_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("eof-in-doctype");
                self.current().set_force_quirks();
                self.emit_current();
            }
            Some(c) if is_whitespace(c) => {
                self.state = TokenizerState::BetweenDOCTYPEPublicAndSystemIdentifiers;
            }
            Some('>') => self.emit_current(),
            Some('"') => {
                self.parse_error("unexpected-char-in-doctype");
                self.current().clear_system_id();
                self.state = TokenizerState::DOCTYPESystemIdentifierDoubleQuoted;
            }
            Some('\'') => {
                self.parse_error("unexpected-char-in-doctype");
                self.current().clear_system_id();
                self.state = TokenizerState::DOCTYPESystemIdentifierSingleQuoted;
            }
            Some(_) => {
                self.parse_error("unexpected-char-in-doctype");
                self.current().set_force_quirks();
                self.state = TokenizerState::BogusDOCTYPE;
            }
        }
        Step::Continue
    }

    fn between_doctype_public_and_system_identifiers_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("eof-in-doctype");
                self.current().set_force_quirks();
                self.emit_current();
            }
            Some(c) if is_whitespace(c) => {}
            Some('>') => self.emit_current(),
            Some('"') => {
                self.current().clear_system_id();
                self.state = TokenizerState::DOCTYPESystemIdentifierDoubleQuoted;
            }
            Some('\'') => {
                self.current().clear_system_id();
                self.state = TokenizerState::DOCTYPESystemIdentifierSingleQuoted;
            }
            Some(_) => {
                self.parse_error("unexpected-char-in-doctype");
                self.current().set_force_quirks();
                self.state = TokenizerState::BogusDOCTYPE;
            }
        }
        Step::Continue
    }

    fn after_doctype_system_keyword_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("eof-in-doctype");
                self.current().set_force_quirks();
                self.emit_current();
            }
            Some(c) if is_whitespace(c) => {
                self.state = TokenizerState::BeforeDOCTYPESystemIdentifier;
            }
            Some(c @ ('\'' | '"')) => {
                self.parse_error("unexpected-char-in-doctype");
                self.stream.unget(&c.to_string());
                self.state = TokenizerState::BeforeDOCTYPESystemIdentifier;
            }
            Some(c) => {
                self.stream.unget(&c.to_string());
                self.state = TokenizerState::BeforeDOCTYPESystemIdentifier;
            }
        }
        Step::Continue
    }

    fn before_doctype_system_identifier_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("eof-in-doctype");
                self.current().set_force_quirks();
                self.emit_current();
            }
            Some(c) if is_whitespace(c) => {}
            Some('"') => {
                self.current().clear_system_id();
                self.state = TokenizerState::DOCTYPESystemIdentifierDoubleQuoted;
            }
            Some('\'') => {
                self.current().clear_system_id();
                self.state = TokenizerState::DOCTYPESystemIdentifierSingleQuoted;
            }
            Some('>') => {
                self.parse_error("unexpected-end-of-doctype");
                self.current().set_force_quirks();
                self.emit_current();
            }
            Some(_) => {
                self.parse_error("unexpected-char-in-doctype");
                self.current().set_force_quirks();
                self.state = TokenizerState::BogusDOCTYPE;
            }
        }
        Step::Continue
    }

    fn doctype_system_identifier_state(&mut self, quote: char) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("eof-in-doctype");
                self.current().set_force_quirks();
                self.emit_current();
            }
            Some(c) if c == quote => self.state = TokenizerState::AfterDOCTYPESystemIdentifier,
            Some('>') => {
                self.parse_error("unexpected-end-of-doctype");
                self.current().set_force_quirks();
                self.emit_current();
            }
            Some(c) => {
                self.current().append_to_system_id(c);
                self.stream.commit();
            }
        }
        Step::Continue
    }

    fn after_doctype_system_identifier_state(&mut self) -> Step {
        match next_char!(self) {
            None => {
                self.parse_error("eof-in-doctype");
                self.current().set_force_quirks();
                self.emit_current();
            }
            Some(c) if is_whitespace(c) => {}
            Some('>') => self.emit_current(),
            Some(_) => {
                self.parse_error("unexpected-char-in-doctype");
                self.state = TokenizerState::BogusDOCTYPE;
            }
        }
        Step::Continue
    }

    fn bogus_doctype_state(&mut self) -> Step {
        match next_char!(self) {
            None | Some('>') => self.emit_current(),
            Some(_) => {}
        }
        Step::Continue
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}
