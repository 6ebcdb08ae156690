//! Character reference decoding.
//!
//! [§ 13.2.5.72 Character reference state](https://html.spec.whatwg.org/multipage/parsing.html#character-reference-state)
//!
//! Decodes exactly one reference (named or numeric) following a consumed
//! `&`. On any shape that is not a legal reference the consumed
//! lookahead is pushed back and `Ready(None)` is returned, so the caller
//! treats the ampersand as literal text. All malformations are reported
//! through the error callback and never abort the decode.

pub mod named;

use crate::stream::{InputStream, ReadResult};

/// Characters that immediately stop reference decoding in any context.
const REFERENCE_STOPPERS: [char; 6] = ['\t', '\n', '\u{0B}', ' ', '<', '&'];

/// Propagate `Eof`/`NeedsData` from a stream read, binding the value.
macro_rules! try_read {
    ($expr:expr) => {
        match $expr {
            ReadResult::Ready(v) => v,
            ReadResult::Eof => return DecodeStep::Eof,
            ReadResult::NeedsData => return DecodeStep::NeedsData,
        }
    };
}

enum DecodeStep {
    Done(Option<String>),
    Eof,
    NeedsData,
}

/// Decode one character reference from `stream`.
///
/// The leading `&` must already be consumed. `additional_allowed` is the
/// extra terminator excluded in attribute-value context (the quote
/// character, or `>` for unquoted values); when set, the legacy
/// no-semicolon rule also refuses matches followed by an alphanumeric or
/// `=`. `report` receives catalog error codes for malformed references.
///
/// Returns `Ready(Some(text))` for a decoded reference,
/// `Ready(None)` with the lookahead unconsumed when no reference is
/// present, and propagates `NeedsData` when the stream suspends
/// mid-reference (the caller rolls back and retries).
pub fn consume_entity(
    stream: &mut InputStream,
    additional_allowed: Option<char>,
    report: &mut dyn FnMut(&'static str),
) -> ReadResult<Option<String>> {
    match decode(stream, additional_allowed, report) {
        DecodeStep::Done(result) => ReadResult::Ready(result),
        // A bare trailing `&` at end of input is literal text.
        DecodeStep::Eof => ReadResult::Ready(None),
        DecodeStep::NeedsData => ReadResult::NeedsData,
    }
}

fn decode(
    stream: &mut InputStream,
    additional_allowed: Option<char>,
    report: &mut dyn FnMut(&'static str),
) -> DecodeStep {
    let first = try_read!(stream.char());
    let mut consumed = String::from(first);

    if REFERENCE_STOPPERS.contains(&first) || additional_allowed == Some(first) {
        stream.unget(&consumed);
        return DecodeStep::Done(None);
    }
    if first == '#' {
        return decode_numeric(stream, consumed, report);
    }
    if first.is_ascii_alphabetic() {
        return decode_named(stream, first, consumed, additional_allowed, report);
    }
    stream.unget(&consumed);
    DecodeStep::Done(None)
}

/// [§ 13.2.5.75 Numeric character reference state](https://html.spec.whatwg.org/multipage/parsing.html#numeric-character-reference-state)
fn decode_numeric(
    stream: &mut InputStream,
    mut consumed: String,
    report: &mut dyn FnMut(&'static str),
) -> DecodeStep {
    let mut radix = 10;
    let mut ch = match stream.char() {
        ReadResult::Ready(c) => c,
        ReadResult::Eof => {
            report("expected-numeric-entity-but-got-eof");
            stream.unget(&consumed);
            return DecodeStep::Done(None);
        }
        ReadResult::NeedsData => return DecodeStep::NeedsData,
    };
    consumed.push(ch);
    if ch == 'x' || ch == 'X' {
        radix = 16;
        ch = match stream.char() {
            ReadResult::Ready(c) => c,
            ReadResult::Eof => {
                report("expected-numeric-entity-but-got-eof");
                stream.unget(&consumed);
                return DecodeStep::Done(None);
            }
            ReadResult::NeedsData => return DecodeStep::NeedsData,
        };
        consumed.push(ch);
    }

    if !ch.is_digit(radix) {
        stream.unget(&consumed);
        report("expected-numeric-entity");
        return DecodeStep::Done(None);
    }

    // Accumulate digits; saturation is enough since anything above
    // U+10FFFF is remapped to U+FFFD below.
    let mut code: u32 = 0;
    let mut terminator = None;
    loop {
        code = code
            .saturating_mul(radix)
            .saturating_add(ch.to_digit(radix).unwrap_or(0));
        match stream.char() {
            ReadResult::Ready(c) if c.is_digit(radix) => ch = c,
            ReadResult::Ready(c) => {
                terminator = Some(c);
                break;
            }
            ReadResult::Eof => break,
            ReadResult::NeedsData => return DecodeStep::NeedsData,
        }
    }

    if let Some(replacement) = replace_entity_number(code) {
        report("invalid-numeric-entity-replaced");
        code = replacement;
    }
    let decoded = char::from_u32(code).map_or_else(|| String::from('\u{FFFD}'), String::from);

    if terminator == Some(';') {
        return DecodeStep::Done(Some(decoded));
    }
    report("numeric-entity-without-semicolon");
    if let Some(t) = terminator {
        stream.unget(&t.to_string());
    }
    DecodeStep::Done(Some(decoded))
}

/// [§ 13.2.5.73 Named character reference state](https://html.spec.whatwg.org/multipage/parsing.html#named-character-reference-state)
///
/// Longest-prefix match against the fixed table, with the legacy
/// attribute-value restriction for names missing their semicolon.
fn decode_named(
    stream: &mut InputStream,
    first: char,
    mut consumed: String,
    additional_allowed: Option<char>,
    report: &mut dyn FnMut(&'static str),
) -> DecodeStep {
    let mut most_recent_match = String::new();
    let mut last = Some(first);
    while named::is_entity_prefix(&consumed) {
        if named::lookup(&consumed).is_some() {
            most_recent_match.clone_from(&consumed);
        }
        if last == Some(';') {
            break;
        }
        match stream.char() {
            ReadResult::Ready(c) => {
                last = Some(c);
                consumed.push(c);
            }
            ReadResult::Eof => {
                last = None;
                break;
            }
            ReadResult::NeedsData => return DecodeStep::NeedsData,
        }
    }

    if most_recent_match.is_empty() {
        report("expected-named-entity");
        stream.unget(&consumed);
        return DecodeStep::Done(None);
    }

    let semicolon_terminated = most_recent_match.ends_with(';');
    // Legacy rule: inside an attribute value a semicolon-less match
    // followed by an alphanumeric or `=` is left as literal text.
    let blocked = !semicolon_terminated
        && additional_allowed.is_some()
        && last.is_some_and(|c| c.is_ascii_alphanumeric() || c == '=');
    if blocked {
        stream.unget(&consumed);
        return DecodeStep::Done(None);
    }

    if consumed.len() > most_recent_match.len() {
        stream.unget(&consumed[most_recent_match.len()..]);
    }
    if !semicolon_terminated {
        report("named-entity-without-semicolon");
    }
    DecodeStep::Done(Some(
        named::lookup(&most_recent_match)
            .expect("matched name must be in the table")
            .to_string(),
    ))
}

/// [§ 13.2.5.80 Numeric character reference end state](https://html.spec.whatwg.org/multipage/parsing.html#numeric-character-reference-end-state)
///
/// The fixed legacy remap: Windows-1252 positions in 0x80–0x9F get
/// their intended characters, NUL/surrogates/out-of-range become
/// U+FFFD. Returns `None` when the code point stands as-is.
const fn replace_entity_number(c: u32) -> Option<u32> {
    match c {
        0x00 => Some(0xFFFD),
        0x13 => Some(0x0010),
        0x80 => Some(0x20AC),
        0x81 => Some(0x0081),
        0x82 => Some(0x201A),
        0x83 => Some(0x0192),
        0x84 => Some(0x201E),
        0x85 => Some(0x2026),
        0x86 => Some(0x2020),
        0x87 => Some(0x2021),
        0x88 => Some(0x02C6),
        0x89 => Some(0x2030),
        0x8A => Some(0x0160),
        0x8B => Some(0x2039),
        0x8C => Some(0x0152),
        0x8D => Some(0x008D),
        0x8E => Some(0x017D),
        0x8F => Some(0x008F),
        0x90 => Some(0x0090),
        0x91 => Some(0x2018),
        0x92 => Some(0x2019),
        0x93 => Some(0x201C),
        0x94 => Some(0x201D),
        0x95 => Some(0x2022),
        0x96 => Some(0x2013),
        0x97 => Some(0x2014),
        0x98 => Some(0x02DC),
        0x99 => Some(0x2122),
        0x9A => Some(0x0161),
        0x9B => Some(0x203A),
        0x9C => Some(0x0153),
        0x9D => Some(0x009D),
        0x9E => Some(0x017E),
        0x9F => Some(0x0178),
        0xD800..=0xDFFF => Some(0xFFFD),
        c if c > 0x0010_FFFF => Some(0xFFFD),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{ReadResult, consume_entity};
    use crate::stream::InputStream;

    fn decode(input: &str, additional: Option<char>) -> (Option<String>, Vec<&'static str>) {
        let mut stream = InputStream::new();
        stream.append(input);
        stream.close();
        let mut errors = Vec::new();
        let result = consume_entity(&mut stream, additional, &mut |code| errors.push(code));
        match result {
            ReadResult::Ready(decoded) => (decoded, errors),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn named_with_semicolon() {
        let (decoded, errors) = decode("amp;rest", None);
        assert_eq!(decoded.as_deref(), Some("&"));
        assert!(errors.is_empty());
    }

    #[test]
    fn named_without_semicolon_reports() {
        let (decoded, errors) = decode("amp next", None);
        assert_eq!(decoded.as_deref(), Some("&"));
        assert_eq!(errors, vec!["named-entity-without-semicolon"]);
    }

    #[test]
    fn longest_prefix_wins() {
        // "not" is a legal legacy name; "notit" is not a name, so the
        // trailing "it;" must be pushed back.
        let mut stream = InputStream::new();
        stream.append("notit;x");
        stream.close();
        let mut errors = Vec::new();
        let result = consume_entity(&mut stream, None, &mut |code| errors.push(code));
        assert_eq!(result, ReadResult::Ready(Some("\u{00AC}".to_string())));
        assert_eq!(stream.match_until(&['<']), ReadResult::Ready("it;x".to_string()));
    }

    #[test]
    fn unknown_name_is_not_consumed() {
        let mut stream = InputStream::new();
        stream.append("zzqq;");
        stream.close();
        let mut errors = Vec::new();
        let result = consume_entity(&mut stream, None, &mut |code| errors.push(code));
        assert_eq!(result, ReadResult::Ready(None));
        assert_eq!(errors, vec!["expected-named-entity"]);
        assert_eq!(stream.char(), ReadResult::Ready('z'));
    }

    #[test]
    fn numeric_null_becomes_replacement_character() {
        let (decoded, errors) = decode("#0;", None);
        assert_eq!(decoded.as_deref(), Some("\u{FFFD}"));
        assert_eq!(errors, vec!["invalid-numeric-entity-replaced"]);
    }

    #[test]
    fn astral_hex_reference_decodes_cleanly() {
        let (decoded, errors) = decode("#x1F600;", None);
        assert_eq!(decoded.as_deref(), Some("\u{1F600}"));
        assert!(errors.is_empty());
    }

    #[test]
    fn windows_1252_remap() {
        let (decoded, errors) = decode("#x80;", None);
        assert_eq!(decoded.as_deref(), Some("\u{20AC}"));
        assert_eq!(errors, vec!["invalid-numeric-entity-replaced"]);
    }

    #[test]
    fn out_of_range_becomes_replacement_character() {
        let (decoded, errors) = decode("#x110000;", None);
        assert_eq!(decoded.as_deref(), Some("\u{FFFD}"));
        assert_eq!(errors, vec!["invalid-numeric-entity-replaced"]);
    }

    #[test]
    fn legacy_name_blocked_before_equals_in_attribute() {
        let (decoded, _) = decode("amp=x", Some('"'));
        assert_eq!(decoded, None);
    }

    #[test]
    fn additional_allowed_character_stops_decode() {
        let (decoded, errors) = decode("\"", Some('"'));
        assert_eq!(decoded, None);
        assert!(errors.is_empty());
    }

    #[test]
    fn suspends_mid_reference_on_open_stream() {
        let mut stream = InputStream::new();
        stream.append("am");
        let mut errors = Vec::new();
        let result = consume_entity(&mut stream, None, &mut |code| errors.push(code));
        assert_eq!(result, ReadResult::NeedsData);
    }
}
