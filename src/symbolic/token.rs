//! Tokens and a tokenizer for assembly source.

use logos::{Lexer, Logos};

use std::fmt;

use crate::token::{parse_number, Number};

/// Enumeration of all tokens of the assembly source format.
#[derive(Logos, Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Errorneous token that could not be interpreted as any of the other variants.
    ///
    /// Whitespace, commas, `;` comments and `#` section headers are skipped.
    #[error]
    #[regex(r"[ \t\n\r\f,]+", logos::skip)]
    #[regex(r";[^\n]*", logos::skip)]
    #[regex(r"#[^\n]*", logos::skip)]
    Error,

    /// A number literal, optionally signed and prefixed with `0b`, `0o` or `0x`.
    #[regex(r"[+-]?(0[bB][01]+|0[oO][0-7]+|0[xX][0-9a-fA-F]+|[0-9]+)", number_callback)]
    Number(Number),

    /// A double quoted string. Escapes have been processed.
    #[regex(r#""([^"\\\n]|\\.)*""#, string_callback)]
    String(String),

    /// A subroutine label definition. (`name:`)
    #[regex("[A-Za-z_][A-Za-z0-9_]*:", strip_suffix)]
    Label(&'a str),

    /// A subroutine label reference. (`:name`)
    #[regex(":[A-Za-z_][A-Za-z0-9_]*", strip_prefix)]
    Reference(&'a str),

    /// A direct location. (`$10`, `$counter`, `$a`)
    #[regex(r"\$([A-Za-z_][A-Za-z0-9_]*|[0-9]+|0[xX][0-9a-fA-F]+)", strip_prefix)]
    Direct(&'a str),

    /// An indirect location. (`@10`, `@counter`, `@a`)
    #[regex(r"@([A-Za-z_][A-Za-z0-9_]*|[0-9]+|0[xX][0-9a-fA-F]+)", strip_prefix)]
    Indirect(&'a str),

    /// A command, a register or a variable name.
    #[regex("[A-Za-z_][A-Za-z0-9_]*", Lexer::slice)]
    Word(&'a str),

    #[token("[")]
    ListBegin,

    #[token("]")]
    ListEnd,

    /// Separates the name of a list element from its value.
    #[token("=")]
    Assign,
}

fn number_callback<'a>(lex: &mut Lexer<'a, Token<'a>>) -> Option<Number> {
    parse_number(lex.slice())
}

fn strip_prefix<'a>(lex: &mut Lexer<'a, Token<'a>>) -> &'a str {
    &lex.slice()[1..]
}

fn strip_suffix<'a>(lex: &mut Lexer<'a, Token<'a>>) -> &'a str {
    let slice = lex.slice();
    &slice[..slice.len() - 1]
}

fn string_callback<'a>(lex: &mut Lexer<'a, Token<'a>>) -> Option<String> {
    let slice = lex.slice();
    unescape(&slice[1..slice.len() - 1])
}

/// Processes the escapes `\n`, `\t`, `\0`, `\"` and `\\`.
fn unescape(input: &str) -> Option<String> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            output.push(c);
            continue;
        }

        output.push(match chars.next()? {
            'n' => '\n',
            't' => '\t',
            '0' => '\0',
            '"' => '"',
            '\\' => '\\',
            _ => return None,
        });
    }

    Some(output)
}

impl<'t> fmt::Display for Token<'t> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::Error => write!(f, "<error>"),
            Token::Number(number) => write!(f, "{}", crate::token::Token::Number(*number)),
            Token::String(text) => write!(f, "{:?}", text),
            Token::Label(name) => write!(f, "{}:", name),
            Token::Reference(name) => write!(f, ":{}", name),
            Token::Direct(location) => write!(f, "${}", location),
            Token::Indirect(location) => write!(f, "@{}", location),
            Token::Word(word) => write!(f, "{}", word),
            Token::ListBegin => write!(f, "["),
            Token::ListEnd => write!(f, "]"),
            Token::Assign => write!(f, "="),
        }
    }
}

#[test]
fn test_tokenize_instruction_forms() {
    let tokens = Token::lexer("# LOGIC\nmain: add -0x2, @counter ; note\n jgt :main $10 \"a\\tb\"")
        .collect::<Vec<_>>();

    assert_eq!(tokens, vec![
        Token::Label("main"),
        Token::Word("add"),
        Token::Number(Number::signed(-2)),
        Token::Indirect("counter"),
        Token::Word("jgt"),
        Token::Reference("main"),
        Token::Direct("10"),
        Token::String("a\tb".to_string()),
    ]);
}

#[test]
fn test_tokenize_list() {
    let tokens = Token::lexer("list $20 [greeting = \"hi\" 0b11]").collect::<Vec<_>>();

    assert_eq!(tokens, vec![
        Token::Word("list"),
        Token::Direct("20"),
        Token::ListBegin,
        Token::Word("greeting"),
        Token::Assign,
        Token::String("hi".to_string()),
        Token::Number(Number::natural(3)),
        Token::ListEnd,
    ]);
}

#[test]
fn test_invalid_tokens() {
    assert!(Token::lexer("add 1 a ?").any(|token| token == Token::Error));
    assert!(Token::lexer("\"bad \\q escape\"").any(|token| token == Token::Error));
}
