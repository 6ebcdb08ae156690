//! Token types produced by the tokenizer.

use core::fmt;

/// [§ 13.2.5 Tokenization](https://html.spec.whatwg.org/multipage/parsing.html#tokenization)
///
/// An attribute on a start or end tag token, as written in the source
/// (names case-folded to lower case, values after reference decoding).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// The attribute name.
    pub name: String,
    /// The attribute value.
    pub value: String,
}

impl Attribute {
    /// Create a new attribute with the given name and value.
    #[must_use]
    pub const fn new(name: String, value: String) -> Self {
        Self { name, value }
    }
}

/// [§ 13.2.5 Tokenization](https://html.spec.whatwg.org/multipage/parsing.html#tokenization)
///
/// "The output of the tokenization step is a series of zero or more of
/// the following tokens: DOCTYPE, start tag, end tag, comment,
/// character, end-of-file."
///
/// Character data is batched into runs rather than emitted one scalar
/// at a time. End tags carry attributes and a self-closing flag only so
/// the tree stage can report them (`attributes-in-end-tag`,
/// `self-closing-flag-on-end-tag`) before discarding them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// "DOCTYPE tokens have a name, a public identifier, a system
    /// identifier, and a force-quirks flag." Name and identifiers are
    /// "missing" (`None`) until their first character arrives.
    Doctype {
        /// The doctype name.
        name: Option<String>,
        /// The public identifier.
        public_id: Option<String>,
        /// The system identifier.
        system_id: Option<String>,
        /// The force-quirks flag.
        force_quirks: bool,
    },

    /// A start tag with its attribute list and self-closing flag.
    StartTag {
        /// The tag name, lower-cased.
        name: String,
        /// The attribute list, in source order, duplicates removed.
        attributes: Vec<Attribute>,
        /// The self-closing flag.
        self_closing: bool,
    },

    /// An end tag.
    EndTag {
        /// The tag name, lower-cased.
        name: String,
        /// Attributes found on the end tag (a parse error, reported and
        /// then ignored by tree construction).
        attributes: Vec<Attribute>,
        /// Self-closing flag found on the end tag (also a parse error).
        self_closing: bool,
    },

    /// A comment.
    Comment {
        /// The comment data.
        data: String,
    },

    /// A run of character data.
    Characters {
        /// The text.
        data: String,
    },

    /// End-of-file token, emitted exactly once per tokenization.
    EndOfFile,
}

impl Token {
    /// Create a DOCTYPE token with everything missing and quirks off.
    #[must_use]
    pub const fn new_doctype() -> Self {
        Self::Doctype {
            name: None,
            public_id: None,
            system_id: None,
            force_quirks: false,
        }
    }

    /// Create a start tag token with the given (already lower-cased)
    /// first name character.
    #[must_use]
    pub fn new_start_tag(first: char) -> Self {
        Self::StartTag {
            name: String::from(first),
            attributes: Vec::new(),
            self_closing: false,
        }
    }

    /// Create an end tag token with the given first name character.
    #[must_use]
    pub fn new_end_tag(first: char) -> Self {
        Self::EndTag {
            name: String::from(first),
            attributes: Vec::new(),
            self_closing: false,
        }
    }

    /// Create an end tag token with a complete name (raw-text end tag
    /// recognition builds the name in the temporary buffer first).
    #[must_use]
    pub const fn new_named_end_tag(name: String) -> Self {
        Self::EndTag {
            name,
            attributes: Vec::new(),
            self_closing: false,
        }
    }

    /// Create a comment token with empty data.
    #[must_use]
    pub const fn new_comment() -> Self {
        Self::Comment {
            data: String::new(),
        }
    }

    /// The tag name, for tag tokens.
    #[must_use]
    pub fn tag_name(&self) -> Option<&str> {
        match self {
            Self::StartTag { name, .. } | Self::EndTag { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }

    /// Returns true if this is an end-of-file token.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::EndOfFile)
    }

    // Mutation helpers for use during tokenization. These panic if
    // called on the wrong token variant, which indicates a bug in the
    // tokenizer state machine rather than bad input.

    /// Append a character to the current tag token's name.
    ///
    /// # Panics
    ///
    /// Panics if called on a non-tag token, indicating a tokenizer bug.
    pub fn append_to_tag_name(&mut self, c: char) {
        match self {
            Self::StartTag { name, .. } | Self::EndTag { name, .. } => name.push(c),
            _ => panic!("append_to_tag_name called on non-tag token"),
        }
    }

    /// "Set the self-closing flag of the current tag token."
    ///
    /// # Panics
    ///
    /// Panics if called on a non-tag token, indicating a tokenizer bug.
    pub fn set_self_closing(&mut self) {
        match self {
            Self::StartTag { self_closing, .. } | Self::EndTag { self_closing, .. } => {
                *self_closing = true;
            }
            _ => panic!("set_self_closing called on non-tag token"),
        }
    }

    /// "Start a new attribute in the current tag token."
    ///
    /// # Panics
    ///
    /// Panics if called on a non-tag token, indicating a tokenizer bug.
    pub fn start_new_attribute(&mut self, name: String) {
        match self {
            Self::StartTag { attributes, .. } | Self::EndTag { attributes, .. } => {
                attributes.push(Attribute::new(name, String::new()));
            }
            _ => panic!("start_new_attribute called on non-tag token"),
        }
    }

    /// "Append the current input character to the current attribute's
    /// name."
    ///
    /// # Panics
    ///
    /// Panics if called on a non-tag token, indicating a tokenizer bug.
    pub fn append_to_attribute_name(&mut self, c: char) {
        match self {
            Self::StartTag { attributes, .. } | Self::EndTag { attributes, .. } => {
                if let Some(attr) = attributes.last_mut() {
                    attr.name.push(c);
                }
            }
            _ => panic!("append_to_attribute_name called on non-tag token"),
        }
    }

    /// "Append the current input character to the current attribute's
    /// value."
    ///
    /// # Panics
    ///
    /// Panics if called on a non-tag token, indicating a tokenizer bug.
    pub fn append_to_attribute_value(&mut self, s: &str) {
        match self {
            Self::StartTag { attributes, .. } | Self::EndTag { attributes, .. } => {
                if let Some(attr) = attributes.last_mut() {
                    attr.value.push_str(s);
                }
            }
            _ => panic!("append_to_attribute_value called on non-tag token"),
        }
    }

    /// The name of the current (last) attribute.
    #[must_use]
    pub fn current_attribute_name(&self) -> Option<&str> {
        match self {
            Self::StartTag { attributes, .. } | Self::EndTag { attributes, .. } => {
                attributes.last().map(|a| a.name.as_str())
            }
            _ => None,
        }
    }

    /// Whether an earlier attribute already uses the current (last)
    /// attribute's name. Checked when the tokenizer leaves the
    /// attribute-name state ("duplicate-attribute").
    #[must_use]
    pub fn current_attribute_is_duplicate(&self) -> bool {
        match self {
            Self::StartTag { attributes, .. } | Self::EndTag { attributes, .. } => attributes
                .last()
                .is_some_and(|current| {
                    attributes[..attributes.len() - 1]
                        .iter()
                        .any(|attr| attr.name == current.name)
                }),
            _ => false,
        }
    }

    /// Remove the attributes at the given indices (duplicates detected
    /// during lexing), highest index first.
    pub fn remove_attributes(&mut self, indices: &[usize]) {
        if let Self::StartTag { attributes, .. } | Self::EndTag { attributes, .. } = self {
            for &i in indices.iter().rev() {
                let _ = attributes.remove(i);
            }
        }
    }

    /// Append a character to the comment token's data.
    ///
    /// # Panics
    ///
    /// Panics if called on a non-comment token, indicating a tokenizer
    /// bug.
    pub fn append_to_comment(&mut self, s: &str) {
        match self {
            Self::Comment { data } => data.push_str(s),
            _ => panic!("append_to_comment called on non-comment token"),
        }
    }

    /// Append a character to the DOCTYPE token's name, creating it from
    /// its missing state if needed.
    ///
    /// # Panics
    ///
    /// Panics if called on a non-DOCTYPE token, indicating a tokenizer
    /// bug.
    pub fn append_to_doctype_name(&mut self, c: char) {
        match self {
            Self::Doctype { name, .. } => match name {
                Some(n) => n.push(c),
                None => *name = Some(String::from(c)),
            },
            _ => panic!("append_to_doctype_name called on non-DOCTYPE token"),
        }
    }

    /// Set the DOCTYPE public identifier to the empty string (leaving
    /// its missing state).
    ///
    /// # Panics
    ///
    /// Panics if called on a non-DOCTYPE token, indicating a tokenizer
    /// bug.
    pub fn clear_public_id(&mut self) {
        match self {
            Self::Doctype { public_id, .. } => *public_id = Some(String::new()),
            _ => panic!("clear_public_id called on non-DOCTYPE token"),
        }
    }

    /// Append a character to the DOCTYPE public identifier.
    ///
    /// # Panics
    ///
    /// Panics if called on a non-DOCTYPE token, indicating a tokenizer
    /// bug.
    pub fn append_to_public_id(&mut self, c: char) {
        match self {
            Self::Doctype {
                public_id: Some(id),
                ..
            } => id.push(c),
            _ => panic!("append_to_public_id called without a public id"),
        }
    }

    /// Set the DOCTYPE system identifier to the empty string (leaving
    /// its missing state).
    ///
    /// # Panics
    ///
    /// Panics if called on a non-DOCTYPE token, indicating a tokenizer
    /// bug.
    pub fn clear_system_id(&mut self) {
        match self {
            Self::Doctype { system_id, .. } => *system_id = Some(String::new()),
            _ => panic!("clear_system_id called on non-DOCTYPE token"),
        }
    }

    /// Append a character to the DOCTYPE system identifier.
    ///
    /// # Panics
    ///
    /// Panics if called on a non-DOCTYPE token, indicating a tokenizer
    /// bug.
    pub fn append_to_system_id(&mut self, c: char) {
        match self {
            Self::Doctype {
                system_id: Some(id),
                ..
            } => id.push(c),
            _ => panic!("append_to_system_id called without a system id"),
        }
    }

    /// "Set the current DOCTYPE token's force-quirks flag to on."
    ///
    /// # Panics
    ///
    /// Panics if called on a non-DOCTYPE token, indicating a tokenizer
    /// bug.
    pub fn set_force_quirks(&mut self) {
        match self {
            Self::Doctype { force_quirks, .. } => *force_quirks = true,
            _ => panic!("set_force_quirks called on non-DOCTYPE token"),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Doctype {
                name,
                public_id,
                system_id,
                force_quirks,
            } => {
                write!(f, "DOCTYPE")?;
                if let Some(n) = name {
                    write!(f, " {n}")?;
                }
                if let Some(p) = public_id {
                    write!(f, " PUBLIC \"{p}\"")?;
                }
                if let Some(s) = system_id {
                    write!(f, " SYSTEM \"{s}\"")?;
                }
                if *force_quirks {
                    write!(f, " (force-quirks)")?;
                }
                Ok(())
            }
            Self::StartTag {
                name,
                attributes,
                self_closing,
            } => {
                write!(f, "<{name}")?;
                for attr in attributes {
                    write!(f, " {}=\"{}\"", attr.name, attr.value)?;
                }
                if *self_closing {
                    write!(f, " /")?;
                }
                write!(f, ">")
            }
            Self::EndTag { name, .. } => write!(f, "</{name}>"),
            Self::Comment { data } => write!(f, "<!--{data}-->"),
            Self::Characters { data } => write!(f, "Characters({})", data.escape_debug()),
            Self::EndOfFile => write!(f, "EOF"),
        }
    }
}
