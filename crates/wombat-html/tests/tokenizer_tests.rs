//! Integration tests for the HTML tokenizer.

use wombat_html::stream::ReadResult;
use wombat_html::tokenizer::{RawTextKind, Token, Tokenizer};

/// Pump a complete input through the tokenizer and collect all tokens.
fn tokenize(input: &str) -> (Vec<Token>, Vec<&'static str>) {
    let mut tokenizer = Tokenizer::new();
    tokenizer.feed(input);
    tokenizer.end();
    drain(&mut tokenizer)
}

fn drain(tokenizer: &mut Tokenizer) -> (Vec<Token>, Vec<&'static str>) {
    let mut tokens = Vec::new();
    loop {
        match tokenizer.next_token() {
            ReadResult::Ready((token, _)) => {
                let eof = token.is_eof();
                tokens.push(token);
                if eof {
                    break;
                }
            }
            ReadResult::Eof => break,
            ReadResult::NeedsData => panic!("closed stream reported NeedsData"),
        }
    }
    let codes = tokenizer.take_errors().into_iter().map(|e| e.code).collect();
    (tokens, codes)
}

/// Concatenate all character tokens.
fn text_of(tokens: &[Token]) -> String {
    tokens
        .iter()
        .filter_map(|t| match t {
            Token::Characters { data } => Some(data.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn simple_start_and_end_tag() {
    let (tokens, errors) = tokenize("<div>hi</div>");
    assert!(errors.is_empty());
    assert_eq!(tokens.len(), 4);
    assert!(matches!(&tokens[0], Token::StartTag { name, .. } if name == "div"));
    assert_eq!(text_of(&tokens), "hi");
    assert!(matches!(&tokens[2], Token::EndTag { name, .. } if name == "div"));
    assert!(tokens[3].is_eof());
}

#[test]
fn tag_names_are_case_folded() {
    let (tokens, _) = tokenize("<DIV CLASS=x></DIV>");
    match &tokens[0] {
        Token::StartTag {
            name, attributes, ..
        } => {
            assert_eq!(name, "div");
            assert_eq!(attributes[0].name, "class");
            assert_eq!(attributes[0].value, "x");
        }
        other => panic!("expected start tag, got {other}"),
    }
    assert!(matches!(&tokens[1], Token::EndTag { name, .. } if name == "div"));
}

#[test]
fn quoted_attribute_values() {
    let (tokens, errors) = tokenize(r#"<a href="x y" title='q'>"#);
    assert!(errors.is_empty());
    match &tokens[0] {
        Token::StartTag { attributes, .. } => {
            assert_eq!(attributes.len(), 2);
            assert_eq!(attributes[0].value, "x y");
            assert_eq!(attributes[1].value, "q");
        }
        other => panic!("expected start tag, got {other}"),
    }
}

#[test]
fn duplicate_attribute_is_dropped_with_error() {
    let (tokens, errors) = tokenize(r#"<a id="first" id="second">"#);
    assert_eq!(errors, vec!["duplicate-attribute"]);
    match &tokens[0] {
        Token::StartTag { attributes, .. } => {
            assert_eq!(attributes.len(), 1);
            assert_eq!(attributes[0].value, "first");
        }
        other => panic!("expected start tag, got {other}"),
    }
}

#[test]
fn self_closing_flag() {
    let (tokens, _) = tokenize("<br/>");
    assert!(matches!(
        &tokens[0],
        Token::StartTag {
            self_closing: true,
            ..
        }
    ));
}

#[test]
fn character_reference_in_data() {
    let (tokens, errors) = tokenize("a&amp;b");
    assert!(errors.is_empty());
    assert_eq!(text_of(&tokens), "a&b");
}

#[test]
fn bare_ampersand_is_literal() {
    // An ampersand before whitespace is not even a reference attempt.
    let (tokens, errors) = tokenize("fish & chips");
    assert!(errors.is_empty());
    assert_eq!(text_of(&tokens), "fish & chips");
}

#[test]
fn unknown_named_reference_is_literal_with_error() {
    let (tokens, errors) = tokenize("&zzqq; end");
    assert_eq!(errors, vec!["expected-named-entity"]);
    assert_eq!(text_of(&tokens), "&zzqq; end");
}

#[test]
fn character_reference_in_attribute_value() {
    let (tokens, _) = tokenize(r#"<a href="?a=1&amp;b=2">"#);
    match &tokens[0] {
        Token::StartTag { attributes, .. } => assert_eq!(attributes[0].value, "?a=1&b=2"),
        other => panic!("expected start tag, got {other}"),
    }
}

#[test]
fn legacy_reference_without_semicolon_in_url_is_preserved() {
    // &copy followed by '=' must not decode inside an attribute value.
    let (tokens, _) = tokenize(r#"<a href="?&copy=1">"#);
    match &tokens[0] {
        Token::StartTag { attributes, .. } => assert_eq!(attributes[0].value, "?&copy=1"),
        other => panic!("expected start tag, got {other}"),
    }
}

#[test]
fn comment_token() {
    let (tokens, errors) = tokenize("<!-- hello -->");
    assert!(errors.is_empty());
    assert!(matches!(&tokens[0], Token::Comment { data } if data == " hello "));
}

#[test]
fn unterminated_comment_reports_and_recovers() {
    let (tokens, errors) = tokenize("<!-- oops");
    assert_eq!(errors, vec!["eof-in-comment"]);
    assert!(matches!(&tokens[0], Token::Comment { data } if data == " oops"));
    assert!(tokens[1].is_eof());
}

#[test]
fn bogus_comment_from_question_mark() {
    let (tokens, errors) = tokenize("<?php echo ?>");
    assert_eq!(errors, vec!["expected-tag-name-but-got-question-mark"]);
    assert!(matches!(&tokens[0], Token::Comment { data } if data == "?php echo ?"));
}

#[test]
fn doctype_with_identifiers() {
    let (tokens, _) = tokenize(
        r#"<!DOCTYPE html PUBLIC "-//W3C//DTD HTML 4.01//EN" "http://www.w3.org/TR/html4/strict.dtd">"#,
    );
    match &tokens[0] {
        Token::Doctype {
            name,
            public_id,
            system_id,
            force_quirks,
        } => {
            assert_eq!(name.as_deref(), Some("html"));
            assert_eq!(public_id.as_deref(), Some("-//W3C//DTD HTML 4.01//EN"));
            assert_eq!(
                system_id.as_deref(),
                Some("http://www.w3.org/TR/html4/strict.dtd")
            );
            assert!(!force_quirks);
        }
        other => panic!("expected doctype, got {other}"),
    }
}

#[test]
fn truncated_doctype_forces_quirks() {
    let (tokens, errors) = tokenize("<!DOCTYPE");
    assert_eq!(errors, vec!["expected-doctype-name-but-got-eof"]);
    assert!(matches!(
        &tokens[0],
        Token::Doctype {
            force_quirks: true,
            ..
        }
    ));
}

#[test]
fn stray_less_than_is_character_data() {
    let (tokens, errors) = tokenize("1 < 2");
    assert_eq!(errors, vec!["expected-tag-name"]);
    assert_eq!(text_of(&tokens), "1 < 2");
}

#[test]
fn rcdata_keeps_markup_literal_but_decodes_references() {
    let mut tokenizer = Tokenizer::new();
    tokenizer.feed("<title>a <b> &amp; c</title>after");
    tokenizer.end();

    // First token is the title start tag; the tree stage would switch
    // the tokenizer to RCDATA here.
    let first = match tokenizer.next_token() {
        ReadResult::Ready((token, _)) => token,
        other => panic!("unexpected {other:?}"),
    };
    assert!(matches!(&first, Token::StartTag { name, .. } if name == "title"));
    tokenizer.switch_to_raw(RawTextKind::Rcdata);

    let (tokens, errors) = drain(&mut tokenizer);
    assert!(errors.is_empty());
    assert_eq!(text_of(&tokens), "a <b> & cafter");
    assert!(
        tokens
            .iter()
            .any(|t| matches!(t, Token::EndTag { name, .. } if name == "title"))
    );
}

#[test]
fn script_data_swallows_tags_until_matching_end_tag() {
    let mut tokenizer = Tokenizer::new();
    tokenizer.feed("<script>if (a < b) { x(); }</script>");
    tokenizer.end();
    let first = match tokenizer.next_token() {
        ReadResult::Ready((token, _)) => token,
        other => panic!("unexpected {other:?}"),
    };
    assert!(matches!(&first, Token::StartTag { name, .. } if name == "script"));
    tokenizer.switch_to_raw(RawTextKind::ScriptData);

    let (tokens, _) = drain(&mut tokenizer);
    assert_eq!(text_of(&tokens), "if (a < b) { x(); }");
}

#[test]
fn incremental_feeding_suspends_and_resumes() {
    let mut tokenizer = Tokenizer::new();
    tokenizer.feed("<di");
    assert!(matches!(tokenizer.next_token(), ReadResult::NeedsData));

    tokenizer.feed("v class=");
    assert!(matches!(tokenizer.next_token(), ReadResult::NeedsData));

    tokenizer.feed("x>hello");
    let token = match tokenizer.next_token() {
        ReadResult::Ready((token, _)) => token,
        other => panic!("unexpected {other:?}"),
    };
    match &token {
        Token::StartTag {
            name, attributes, ..
        } => {
            assert_eq!(name, "div");
            assert_eq!(attributes[0].name, "class");
            assert_eq!(attributes[0].value, "x");
        }
        other => panic!("expected start tag, got {other}"),
    }
    // The text run cannot complete until more input or end of input.
    assert!(matches!(tokenizer.next_token(), ReadResult::NeedsData));

    tokenizer.end();
    let (tokens, errors) = drain(&mut tokenizer);
    assert!(errors.is_empty());
    assert_eq!(text_of(&tokens), "hello");
}

#[test]
fn end_tag_with_attributes_reports() {
    let (_, errors) = tokenize("<div></div id=x>");
    assert_eq!(errors, vec!["attributes-in-end-tag"]);
}

#[test]
fn null_in_rcdata_becomes_replacement_character() {
    let mut tokenizer = Tokenizer::new();
    tokenizer.feed("<title>a\0b</title>");
    tokenizer.end();
    let _ = tokenizer.next_token();
    tokenizer.switch_to_raw(RawTextKind::Rcdata);
    let (tokens, errors) = drain(&mut tokenizer);
    assert_eq!(errors, vec!["invalid-codepoint"]);
    assert_eq!(text_of(&tokens), "a\u{FFFD}b");
}
