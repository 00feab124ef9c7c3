//! Attribute tokenizer
//!
//! Tokenizes attribute text for the trigger and conditional parsers.
//! Identifiers start with a letter, underscore or `$`; quoted and
//! slash-delimited strings use backslash escaping; digit runs (with a
//! trailing unit, as in `500ms`) form number tokens; everything else is a
//! single-character symbol. Whitespace separates tokens.

use crate::ExprError;

/// One token of attribute text
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifier (letter/underscore/`$` start)
    Ident(String),
    /// Digit-led run, unit suffix included (`2`, `0.5`, `500ms`)
    Number(String),
    /// Quoted or slash-delimited string, delimiters stripped
    Str(String),
    /// Any other single character
    Sym(char),
}

impl Token {
    /// Identifier text, if this is an identifier
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Token::Ident(s) => Some(s),
            _ => None,
        }
    }

    /// Is this the given symbol?
    pub fn is_sym(&self, c: char) -> bool {
        matches!(self, Token::Sym(s) if *s == c)
    }

    /// Raw text of the token (for error reporting)
    pub fn text(&self) -> String {
        match self {
            Token::Ident(s) | Token::Number(s) | Token::Str(s) => s.clone(),
            Token::Sym(c) => c.to_string(),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '-'
}

/// Attribute tokenizer
pub struct Tokenizer<'src> {
    chars: std::iter::Peekable<std::str::CharIndices<'src>>,
}

impl<'src> Tokenizer<'src> {
    /// Create a tokenizer over attribute text
    pub fn new(source: &'src str) -> Self {
        Self { chars: source.char_indices().peekable() }
    }

    /// Tokenize the whole input
    pub fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
        let mut lexer = Tokenizer::new(source);
        let mut tokens = Vec::new();
        while let Some(token) = lexer.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        self.chars.next()
    }

    /// Get the next token, skipping whitespace
    pub fn next_token(&mut self) -> Result<Option<Token>, ExprError> {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
        let Some((pos, c)) = self.advance() else { return Ok(None) };

        if is_ident_start(c) {
            let mut ident = c.to_string();
            while matches!(self.peek(), Some(n) if is_ident_char(n)) {
                ident.push(self.advance().map(|(_, n)| n).unwrap_or_default());
            }
            return Ok(Some(Token::Ident(ident)));
        }

        if c.is_ascii_digit() {
            let mut num = c.to_string();
            while matches!(self.peek(), Some(n) if n.is_alphanumeric() || n == '.') {
                num.push(self.advance().map(|(_, n)| n).unwrap_or_default());
            }
            return Ok(Some(Token::Number(num)));
        }

        if c == '"' || c == '\'' || c == '/' {
            let delim = c;
            let mut value = String::new();
            loop {
                match self.advance() {
                    Some((_, n)) if n == delim => return Ok(Some(Token::Str(value))),
                    Some((_, '\\')) => {
                        if let Some((_, escaped)) = self.advance() {
                            value.push(escaped);
                        }
                    }
                    Some((_, n)) => value.push(n),
                    None => return Err(ExprError::UnterminatedString(pos)),
                }
            }
        }

        Ok(Some(Token::Sym(c)))
    }
}
