//! Template tokenizer using logos.
//!
//! Only the tokens that matter for parameter binding and projection
//! inference are recognized; everything else is passed through as text.

use logos::Logos;
use std::ops::Range;

/// Token types for query templates.
#[derive(Logos, Debug, Clone, PartialEq)]
pub enum Token {
    /// `$name` input placeholder.
    #[regex(r"\$[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice()[1..].to_string())]
    Placeholder(String),

    /// `?name` result variable.
    #[regex(r"\?[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice()[1..].to_string())]
    Variable(String),

    #[token("select", ignore(ascii_case))]
    Select,
    #[token("where", ignore(ascii_case))]
    Where,
    #[token("as", ignore(ascii_case))]
    As,

    #[token("*")]
    Star,
    #[token("{")]
    LBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    // Bare words, so keywords are only matched as whole words.
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Word,
}

/// A token with its byte range in the template.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Range<usize>,
}

/// Tokenize a template, skipping unrecognized input.
pub fn tokenize(source: &str) -> Vec<SpannedToken> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        if let Ok(token) = result {
            tokens.push(SpannedToken {
                token,
                span: lexer.span(),
            });
        }
    }
    tokens
}
