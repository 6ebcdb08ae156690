//! Parse-error catalog and reporting surface.
//!
//! [§ 13.2.2 Parse errors](https://html.spec.whatwg.org/multipage/parsing.html#parse-errors)
//!
//! "The error handling for parse errors is well-defined ... user agents,
//! while parsing an HTML document, must act as described" — every
//! malformed shape maps to one machine-readable code from the fixed
//! catalog below plus a defined recovery action; none of them abort the
//! parse.
//!
//! Codes are `&'static str` keys into a sorted constant table of
//! human-readable templates. Templates substitute `{name}`-style
//! placeholders from the arguments supplied at the report site.

use wombat_dom::Location;

/// A reported parse error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Machine-readable code from the catalog.
    pub code: &'static str,
    /// Human-readable message with placeholders substituted.
    pub message: String,
    /// Where in the source the malformation was detected.
    pub location: Location,
}

/// Receiver for parse errors.
///
/// Implementations must treat every call as non-fatal: the parser has
/// already recovered by the time the error is delivered.
pub trait ErrorHandler {
    /// Called once per detected malformation.
    fn error(&mut self, error: ParseError);
}

/// An [`ErrorHandler`] that collects every report into a vector.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    /// The errors reported so far, in detection order.
    pub errors: Vec<ParseError>,
}

impl ErrorCollector {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ErrorHandler for ErrorCollector {
    fn error(&mut self, error: ParseError) {
        self.errors.push(error);
    }
}

/// Render the message template for `code`, substituting `{key}`
/// placeholders from `args`.
///
/// Unknown codes fall back to the code itself, so a missing catalog
/// entry degrades to something still readable.
#[must_use]
pub fn format_message(code: &str, args: &[(&str, &str)]) -> String {
    let template = MESSAGES
        .binary_search_by_key(&code, |(c, _)| *c)
        .map_or(code, |i| MESSAGES[i].1);
    let mut message = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        message.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        if let Some(close) = after.find('}') {
            let key = &after[..close];
            match args.iter().find(|(k, _)| *k == key) {
                Some((_, value)) => message.push_str(value),
                None => {
                    message.push('{');
                    message.push_str(key);
                    message.push('}');
                }
            }
            rest = &after[close + 1..];
        } else {
            message.push('{');
            rest = after;
        }
    }
    message.push_str(rest);
    message
}

/// The fixed catalog: (code, template), sorted by code for binary
/// search. Texts follow the reference wording, typos included, so
/// downstream tooling keyed on them keeps working.
static MESSAGES: &[(&str, &str)] = &[
    ("adoption-agency-1.1", "End tag ({name}) violates step 1, paragraph 1 of the adoption agency algorithm."),
    ("adoption-agency-1.2", "End tag ({name}) violates step 1, paragraph 2 of the adoption agency algorithm."),
    ("adoption-agency-1.3", "End tag ({name}) violates step 1, paragraph 3 of the adoption agency algorithm."),
    ("adoption-agency-4.4", "End tag ({name}) violates step 4, paragraph 4 of the adoption agency algorithm."),
    ("almost-standards-doctype", "Almost standards mode doctype. Expected <!DOCTYPE html>."),
    ("attributes-in-end-tag", "End tag contains unexpected attributes."),
    ("bare-less-than-sign-at-eof", "End of file after <."),
    ("cant-convert-numeric-entity", "Numeric entity couldn't be converted to character (codepoint U+{charAsInt})."),
    ("deprecated-tag", "Unexpected start tag {name}. Don't use it!"),
    ("duplicate-attribute", "Dropped duplicate attribute '{name}' on tag."),
    ("end-html-in-innerhtml", "Unexpected html end tag in inner html mode."),
    ("end-tag-after-implied-root", "Unexpected end tag ({name}) after the (implied) root element."),
    ("end-tag-too-early", "End tag ({name}) seen too early. Expected other end tag."),
    ("end-tag-too-early-ignored", "End tag ({name}) seen too early. Ignored."),
    ("end-tag-too-early-named", "Unexpected end tag ({gotName}). Expected end tag ({expectedName}."),
    ("eof-after-attribute-value", "Unexpected end of file after attribute value."),
    ("eof-in-attribute-name", "Unexpected end of file in attribute name."),
    ("eof-in-attribute-value-double-quote", "Unexpected end of file in attribute value (\")."),
    ("eof-in-attribute-value-no-quotes", "Unexpected end of file in attribute value."),
    ("eof-in-attribute-value-single-quote", "Unexpected end of file in attribute value (')."),
    ("eof-in-bogus-doctype", "Unexpected end of file in bogus doctype."),
    ("eof-in-comment", "Unexpected end of file in comment."),
    ("eof-in-comment-double-dash", "Unexpected end of file in comment (--)."),
    ("eof-in-comment-end-bang-state", "Unexpected end of file in comment."),
    ("eof-in-comment-end-dash", "Unexpected end of file in comment (-)."),
    ("eof-in-doctype", "Unexpected end of file in DOCTYPE."),
    ("eof-in-doctype-name", "Unexpected end of file in DOCTYPE name."),
    ("eof-in-innerhtml", "Unexpected EOF in inner html mode."),
    ("eof-in-script", "Unexpected end of file. Expected script content."),
    ("eof-in-table", "Unexpected end of file. Expected table content."),
    ("eof-in-tag-name", "Unexpected end of file in the tag name."),
    ("expected-attribute-name-but-got-eof", "Unexpected end of file. Expected attribute name instead."),
    ("expected-attribute-value-but-got-eof", "Unexpected end of file. Expected attribute value."),
    ("expected-attribute-value-but-got-right-bracket", "Expected attribute value. Got '>' instead."),
    ("expected-closing-tag-but-got-char", "Expected closing tag. Unexpected character '{data}' found."),
    ("expected-closing-tag-but-got-eof", "Expected closing tag. Unexpected end of file."),
    ("expected-closing-tag-but-got-right-bracket", "Expected closing tag. Got '>' instead. Ignoring '</>'."),
    ("expected-dashes-or-doctype", "Expected '--' or 'DOCTYPE'. Not found."),
    ("expected-doctype-but-got-chars", "Non-space characters found without seeing a doctype first. Expected e.g. <!DOCTYPE html>."),
    ("expected-doctype-but-got-end-tag", "End tag seen without seeing a doctype first. Expected e.g. <!DOCTYPE html>."),
    ("expected-doctype-but-got-eof", "Unexpected End of file. Expected DOCTYPE."),
    ("expected-doctype-but-got-start-tag", "Start tag seen without seeing a doctype first. Expected e.g. <!DOCTYPE html>."),
    ("expected-doctype-name-but-got-eof", "Unexpected end of file. Expected DOCTYPE name."),
    ("expected-doctype-name-but-got-right-bracket", "Unexpected > character. Expected DOCTYPE name."),
    ("expected-end-of-tag-but-got-eof", "Unexpected end of file. Expected = or end of tag."),
    ("expected-eof-but-got-char", "Unexpected non-space characters. Expected end of file."),
    ("expected-eof-but-got-end-tag", "Unexpected end tag ({name}). Expected end of file."),
    ("expected-eof-but-got-start-tag", "Unexpected start tag ({name}). Expected end of file."),
    ("expected-named-closing-tag-but-got-eof", "Unexpected end of file. Expected end tag ({name})."),
    ("expected-named-entity", "Named entity expected. Got none."),
    ("expected-numeric-entity", "Numeric entity expected but none found."),
    ("expected-numeric-entity-but-got-eof", "Numeric entity expected. Got end of file instead."),
    ("expected-one-end-tag-but-got-another", "Unexpected end tag ({gotName}). Missing end tag ({expectedName})."),
    ("expected-space-or-right-bracket-in-doctype", "Expected space or '>'. Got '{data}'."),
    ("expected-tag-name", "Expected tag name. Got something else instead."),
    ("expected-tag-name-but-got-question-mark", "Expected tag name. Got '?' instead. (HTML doesn't support processing instructions.)"),
    ("expected-tag-name-but-got-right-bracket", "Expected tag name. Got '>' instead."),
    ("illegal-windows-1252-entity", "Entity used with illegal number (windows-1252 reference)."),
    ("incorrect-comment", "Incorrect comment."),
    ("incorrect-cr-newline-entity", "Incorrect CR newline entity, replaced with LF."),
    ("incorrectly-placed-solidus", "Solidus (/) incorrectly placed in tag."),
    ("invalid-character-after-attribute-name", "Unexpected character after attribute name."),
    ("invalid-character-in-attribute-name", "Invalid character in attribute name."),
    ("invalid-codepoint", "Invalid codepoint in stream"),
    ("invalid-numeric-entity-replaced", "Numeric entity represents an illegal codepoint. Expanded to the C1 controls range."),
    ("missing-end-tag", "Missing end tag ({name})."),
    ("missing-end-tags", "Missing end tags ({name})."),
    ("named-entity-without-semicolon", "Named entity didn't end with ';'."),
    ("need-space-after-doctype", "No space after literal string 'DOCTYPE'."),
    ("no-end-tag", "This element ({name}) has no end tag."),
    ("non-html-root", "html needs to be the first start tag."),
    ("non-void-element-with-trailing-solidus", "Trailing solidus not allowed on element {name}."),
    ("null-character", "Null character in input stream, replaced with U+FFFD."),
    ("numeric-entity-without-semicolon", "Numeric entity didn't end with ';'."),
    ("obsolete-doctype", "Obsolete doctype. Expected <!DOCTYPE html>."),
    ("quirky-doctype", "Quirky doctype. Expected <!DOCTYPE html>."),
    ("self-closing-flag-on-end-tag", "End tag contains unexpected self-closing flag."),
    ("two-heads-are-not-better-than-one", "Unexpected start tag head in existing head. Ignored."),
    ("unexpected-bang-after-double-dash-in-comment", "Unexpected ! after -- in comment."),
    ("unexpected-cell-end-tag", "Got table cell end tag ({name}) while required end tags are missing."),
    ("unexpected-cell-in-table-body", "Unexpected table cell start tag ({name}) in the table body phase."),
    ("unexpected-char-after-body", "Unexpected non-space characters in the after body phase."),
    ("unexpected-char-after-frameset", "Unexpected non-space characters in the after frameset phase. Ignored."),
    ("unexpected-char-implies-table-voodoo", "Unexpected non-space characters in table context caused voodoo mode."),
    ("unexpected-char-in-comment", "Unexpected character in comment found."),
    ("unexpected-char-in-doctype", "Unexpected character in DOCTYPE."),
    ("unexpected-char-in-frameset", "Unepxected characters in the frameset phase. Characters ignored."),
    ("unexpected-character-after-attribute-value", "Unexpected character after attribute value."),
    ("unexpected-character-after-solidus-in-tag", "Unexpected character after / in tag. Expected >."),
    ("unexpected-character-in-unquoted-attribute-value", "Unexpected character in unquoted attribute"),
    ("unexpected-dash-after-double-dash-in-comment", "Unexpected '-' after '--' found in comment."),
    ("unexpected-doctype", "Unexpected DOCTYPE. Ignored."),
    ("unexpected-end-of-doctype", "Unexpected end of DOCTYPE."),
    ("unexpected-end-table-in-caption", "Unexpected end table tag in caption. Generates implied end caption."),
    ("unexpected-end-tag", "Unexpected end tag ({name}). Ignored."),
    ("unexpected-end-tag-after-body", "Unexpected end tag token ({name}) in the after body phase."),
    ("unexpected-end-tag-after-frameset", "Unexpected end tag ({name}) in the after frameset phase. Ignored."),
    ("unexpected-end-tag-implies-table-voodoo", "Unexpected end tag ({name}) in table context caused voodoo mode."),
    ("unexpected-end-tag-in-frameset", "Unexpected end tag token ({name}) in the frameset phase. Ignored."),
    ("unexpected-end-tag-in-select", "Unexpected end tag ({name}) in the select phase. Ignored."),
    ("unexpected-end-tag-in-table-body", "Unexpected end tag ({name}) in the table body phase. Ignored."),
    ("unexpected-end-tag-in-table-row", "Unexpected end tag ({name}) in the table row phase. Ignored."),
    ("unexpected-end-tag-treated-as", "Unexpected end tag ({originalName}). Treated as {newName}."),
    ("unexpected-eof-after-solidus-in-tag", "Unexpected end of file in tag. Expected >."),
    ("unexpected-form-in-table", "Unexpected form in table context."),
    ("unexpected-frameset-in-frameset-innerhtml", "Unexpected end tag token (frameset in the frameset phase (innerHTML)."),
    ("unexpected-hidden-input-in-table", "Unexpected input with type hidden in table context."),
    ("unexpected-html-element-in-foreign-content", "HTML start tag \"{name}\" in a foreign namespace context."),
    ("unexpected-implied-end-tag", "End tag {name} implied, but there were open elements."),
    ("unexpected-implied-end-tag-in-table", "Unexpected implied end tag ({name}) in the table phase."),
    ("unexpected-implied-end-tag-in-table-body", "Unexpected implied end tag ({name}) in the table body phase."),
    ("unexpected-implied-end-tag-in-table-row", "Unexpected implied end tag ({name}) in the table row phase."),
    ("unexpected-input-in-select", "Unexpected input start tag in the select phase."),
    ("unexpected-select-in-select", "Unexpected select start tag in the select phase treated as select end tag."),
    ("unexpected-start-tag", "Unexpected start tag ({name})."),
    ("unexpected-start-tag-after-body", "Unexpected start tag token ({name}) in the after body phase."),
    ("unexpected-start-tag-after-frameset", "Unexpected start tag ({name}) in the after frameset phase. Ignored."),
    ("unexpected-start-tag-ignored", "Unexpected start tag {name}. Ignored."),
    ("unexpected-start-tag-implies-end-tag", "Unexpected start tag ({startName}) implies end tag ({endName})."),
    ("unexpected-start-tag-implies-table-voodoo", "Unexpected start tag ({name}) in table context caused voodoo mode."),
    ("unexpected-start-tag-in-frameset", "Unexpected start tag token ({name}) in the frameset phase. Ignored."),
    ("unexpected-start-tag-in-select", "Unexpected start tag token ({name}) in the select phase. Ignored."),
    ("unexpected-start-tag-in-table", "Unexpected {name}. Expected table content."),
    ("unexpected-start-tag-out-of-my-head", "Unexpected start tag ({name}) that can be in head. Moved."),
    ("unexpected-start-tag-treated-as", "Unexpected start tag ({originalName}). Treated as {newName}."),
    ("unexpected-table-element-end-tag-in-select-in-table", "Unexpected table element end tag ({name}) in the select in table phase."),
    ("unexpected-table-element-start-tag-in-select-in-table", "Unexpected table element start tag ({name}) in the select in table phase."),
    ("unknown-doctype", "Erroneous DOCTYPE. Expected <!DOCTYPE html>."),
];

#[cfg(test)]
mod tests {
    use super::format_message;

    #[test]
    fn formats_template_with_args() {
        assert_eq!(
            format_message("unexpected-end-tag", &[("name", "b")]),
            "Unexpected end tag (b). Ignored."
        );
    }

    #[test]
    fn unknown_code_falls_back_to_code() {
        assert_eq!(format_message("no-such-code", &[]), "no-such-code");
    }

    #[test]
    fn missing_arg_keeps_placeholder() {
        assert_eq!(
            format_message("unexpected-end-tag", &[]),
            "Unexpected end tag ({name}). Ignored."
        );
    }

    #[test]
    fn catalog_is_sorted() {
        for pair in super::MESSAGES.windows(2) {
            assert!(pair[0].0 < pair[1].0, "{} >= {}", pair[0].0, pair[1].0);
        }
    }
}
