//! HTML tokenizer module.
//!
//! Implements [§ 13.2.5 Tokenization](https://html.spec.whatwg.org/multipage/parsing.html#tokenization)
//! of the WHATWG HTML Living Standard over the incremental
//! [`InputStream`](crate::stream::InputStream).

/// The tokenizer state machine.
pub mod core;
/// Token types produced by the tokenizer.
pub mod token;

pub use core::{RawTextKind, Tokenizer, TokenizerState};
pub use token::{Attribute, Token};
