// tests/lexer_tests.rs
use brine::lexer::{tokenize_with_errors, Lexer};
use brine::tokens::token_kind::TokenKind;

fn kinds(source: &str) -> Vec<TokenKind> {
    let mut lexer = Lexer::new("test.c", source);
    let (tokens, errors) = tokenize_with_errors(&mut lexer);
    assert!(errors.is_empty(), "{errors:?}");
    tokens.into_iter().map(|t| t.kind).collect()
}

#[test]
fn keywords_identifiers_and_punctuation() {
    let tokens = kinds("int main() { return x1; }");
    assert_eq!(
        tokens,
        vec![
            TokenKind::KeywordInt,
            TokenKind::Identifier("main".to_string()),
            TokenKind::OpenParen,
            TokenKind::CloseParen,
            TokenKind::OpenBrace,
            TokenKind::KeywordReturn,
            TokenKind::Identifier("x1".to_string()),
            TokenKind::Semicolon,
            TokenKind::CloseBrace,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn keywords_do_not_swallow_identifiers() {
    let tokens = kinds("intx if_ whileVar");
    assert_eq!(
        tokens,
        vec![
            TokenKind::Identifier("intx".to_string()),
            TokenKind::Identifier("if_".to_string()),
            TokenKind::Identifier("whileVar".to_string()),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn integers_lex_by_value() {
    let tokens = kinds("0 42 4294967295");
    assert_eq!(
        tokens,
        vec![
            TokenKind::Integer(0),
            TokenKind::Integer(42),
            TokenKind::Integer(4_294_967_295),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn comments_are_skipped() {
    let tokens = kinds("1 // the rest of this line vanishes + 2\n3");
    assert_eq!(tokens, vec![TokenKind::Integer(1), TokenKind::Integer(3), TokenKind::Eof]);
}

#[test]
fn operators_lex_individually() {
    let tokens = kinds("a = b + c - d * e / f;");
    let operators: Vec<&TokenKind> = tokens
        .iter()
        .filter(|k| {
            matches!(
                k,
                TokenKind::Equal
                    | TokenKind::Plus
                    | TokenKind::Minus
                    | TokenKind::Star
                    | TokenKind::Slash
            )
        })
        .collect();
    assert_eq!(operators.len(), 5);
}

#[test]
fn invalid_character_is_reported_with_its_span() {
    let mut lexer = Lexer::new("test.c", "int x @ y;");
    let (tokens, errors) = tokenize_with_errors(&mut lexer);

    assert_eq!(errors.len(), 1);
    let span = errors[0].span().expect("lexer errors carry spans");
    assert_eq!(span.start.line, 1);
    assert_eq!(span.start.column, 7);

    // Lexing continues past the error.
    assert!(tokens.iter().any(|t| t.kind == TokenKind::Identifier("y".to_string())));
}

#[test]
fn errors_on_later_lines_have_correct_positions() {
    let mut lexer = Lexer::new("test.c", "int a;\nint b;\n  $\n");
    let (_, errors) = tokenize_with_errors(&mut lexer);

    assert_eq!(errors.len(), 1);
    let span = errors[0].span().expect("span");
    assert_eq!(span.start.line, 3);
    assert_eq!(span.start.column, 3);
}

#[test]
fn integer_overflow_is_a_lex_error() {
    let mut lexer = Lexer::new("test.c", "99999999999999999999999999");
    let (_, errors) = tokenize_with_errors(&mut lexer);
    assert_eq!(errors.len(), 1);
}

#[test]
fn eof_token_is_always_last() {
    for source in ["", "   ", "// only a comment", "int"] {
        let mut lexer = Lexer::new("test.c", source);
        let (tokens, _) = tokenize_with_errors(&mut lexer);
        assert_eq!(tokens.last().map(|t| t.kind.clone()), Some(TokenKind::Eof), "{source:?}");
    }
}
