// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lexer and recursive-descent parser for extraction expressions.
//!
//! Grammar (lowest precedence first):
//!
//! ```text
//! pipe     := compare ('|' compare)*
//! compare  := postfix (('==' | '!=') postfix)?
//! postfix  := primary ( '.ident' | '."str"' | '[' ']' | '[' int ']' | '[' "str" ']' | '?' )*
//! primary  := '.' | '.ident' | '(' pipe ')' | '{' fields '}' | literal
//!           | 'select' '(' pipe ')' | 'not' | 'length' | 'keys' | 'empty'
//! fields   := field (',' field)*
//! field    := ident | "str" | (ident | "str") ':' compare
//! ```

use serde_json::Value;

use crate::error::ExpressionError;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    Ne,
}

/// Parsed filter tree.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Filter {
    Identity,
    Field(String),
    Index(i64),
    Iterate,
    Literal(Value),
    Pipe(Box<Filter>, Box<Filter>),
    Try(Box<Filter>),
    Object(Vec<(String, Filter)>),
    Select(Box<Filter>),
    Compare(Box<Filter>, CmpOp, Box<Filter>),
    Not,
    Length,
    Keys,
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Dot,
    Field(String),
    Ident(String),
    Str(String),
    Num(f64),
    LBracket,
    RBracket,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Colon,
    Comma,
    Pipe,
    Question,
    EqEq,
    NotEq,
    Eof,
}

fn syntax(position: usize, message: impl Into<String>) -> ExpressionError {
    ExpressionError::Syntax {
        position,
        message: message.into(),
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Splits an expression into positioned tokens.
fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, ExpressionError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        match c {
            c if c.is_whitespace() => {
                i += 1;
            }
            '.' => {
                match chars.get(i + 1) {
                    Some(&(_, next)) if is_ident_start(next) => {
                        let (name, end) = read_ident(&chars, i + 1);
                        tokens.push((pos, Token::Field(name)));
                        i = end;
                    }
                    Some(&(_, '"')) => {
                        let (text, end) = read_string(&chars, i + 1)?;
                        tokens.push((pos, Token::Field(text)));
                        i = end;
                    }
                    _ => {
                        tokens.push((pos, Token::Dot));
                        i += 1;
                    }
                }
            }
            '"' => {
                let (text, end) = read_string(&chars, i)?;
                tokens.push((pos, Token::Str(text)));
                i = end;
            }
            '=' | '!' => {
                if chars.get(i + 1).map(|&(_, n)| n) == Some('=') {
                    let token = if c == '=' { Token::EqEq } else { Token::NotEq };
                    tokens.push((pos, token));
                    i += 2;
                } else {
                    return Err(syntax(pos, format!("unexpected character {c:?}")));
                }
            }
            c if c.is_ascii_digit() || (c == '-' && next_is_digit(&chars, i)) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().map(|&(_, c)| c).collect();
                let number = text
                    .parse::<f64>()
                    .map_err(|_| syntax(pos, format!("invalid number {text:?}")))?;
                tokens.push((pos, Token::Num(number)));
            }
            c if is_ident_start(c) => {
                let (name, end) = read_ident(&chars, i);
                tokens.push((pos, Token::Ident(name)));
                i = end;
            }
            _ => {
                let token = match c {
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '{' => Token::LBrace,
                    '}' => Token::RBrace,
                    ':' => Token::Colon,
                    ',' => Token::Comma,
                    '|' => Token::Pipe,
                    '?' => Token::Question,
                    other => return Err(syntax(pos, format!("unexpected character {other:?}"))),
                };
                tokens.push((pos, token));
                i += 1;
            }
        }
    }

    tokens.push((source.len(), Token::Eof));
    Ok(tokens)
}

fn next_is_digit(chars: &[(usize, char)], i: usize) -> bool {
    chars.get(i + 1).is_some_and(|&(_, c)| c.is_ascii_digit())
}

fn read_ident(chars: &[(usize, char)], start: usize) -> (String, usize) {
    let mut end = start;
    while end < chars.len() && is_ident_continue(chars[end].1) {
        end += 1;
    }
    (chars[start..end].iter().map(|&(_, c)| c).collect(), end)
}

/// Reads a double-quoted string starting at `start` (the opening quote).
fn read_string(chars: &[(usize, char)], start: usize) -> Result<(String, usize), ExpressionError> {
    let mut text = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i].1 {
            '"' => return Ok((text, i + 1)),
            '\\' => {
                let Some(&(pos, escaped)) = chars.get(i + 1) else {
                    break;
                };
                text.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    '"' | '\\' | '/' => escaped,
                    other => return Err(syntax(pos, format!("unsupported escape \\{other}"))),
                });
                i += 2;
            }
            c => {
                text.push(c);
                i += 1;
            }
        }
    }
    Err(syntax(chars[start].0, "unterminated string"))
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    cursor: usize,
}

/// Parses an expression into a filter tree.
pub(crate) fn parse(source: &str) -> Result<Filter, ExpressionError> {
    let mut parser = Parser {
        tokens: tokenize(source)?,
        cursor: 0,
    };
    let filter = parser.parse_pipe()?;
    match parser.peek() {
        Token::Eof => Ok(filter),
        other => Err(syntax(
            parser.position(),
            format!("unexpected trailing token {other:?}"),
        )),
    }
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.cursor].1
    }

    fn position(&self) -> usize {
        self.tokens[self.cursor].0
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.cursor].1.clone();
        if token != Token::Eof {
            self.cursor += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ExpressionError> {
        if self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(syntax(
                self.position(),
                format!("expected {expected:?}, found {:?}", self.peek()),
            ))
        }
    }

    fn parse_pipe(&mut self) -> Result<Filter, ExpressionError> {
        let mut left = self.parse_compare()?;
        while *self.peek() == Token::Pipe {
            self.advance();
            let right = self.parse_compare()?;
            left = Filter::Pipe(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_compare(&mut self) -> Result<Filter, ExpressionError> {
        let left = self.parse_postfix()?;
        let op = match self.peek() {
            Token::EqEq => CmpOp::Eq,
            Token::NotEq => CmpOp::Ne,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_postfix()?;
        Ok(Filter::Compare(Box::new(left), op, Box::new(right)))
    }

    fn parse_postfix(&mut self) -> Result<Filter, ExpressionError> {
        let mut term = self.parse_primary()?;
        loop {
            match self.peek().clone() {
                Token::Field(name) => {
                    self.advance();
                    term = chain(term, Filter::Field(name));
                }
                Token::LBracket => {
                    self.advance();
                    let suffix = self.parse_bracket()?;
                    term = chain(term, suffix);
                }
                Token::Question => {
                    self.advance();
                    term = Filter::Try(Box::new(term));
                }
                _ => return Ok(term),
            }
        }
    }

    /// Parses the inside of `[...]`; the opening bracket is already consumed.
    fn parse_bracket(&mut self) -> Result<Filter, ExpressionError> {
        let position = self.position();
        let filter = match self.advance() {
            Token::RBracket => return Ok(Filter::Iterate),
            #[allow(clippy::cast_possible_truncation)]
            Token::Num(n) if n.fract() == 0.0 => Filter::Index(n as i64),
            Token::Str(key) => Filter::Field(key),
            other => {
                return Err(syntax(
                    position,
                    format!("unsupported index {other:?}"),
                ));
            }
        };
        self.expect(&Token::RBracket)?;
        Ok(filter)
    }

    fn parse_primary(&mut self) -> Result<Filter, ExpressionError> {
        let position = self.position();
        match self.advance() {
            Token::Dot => Ok(Filter::Identity),
            Token::Field(name) => Ok(Filter::Field(name)),
            Token::LParen => {
                let inner = self.parse_pipe()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::LBrace => self.parse_object(),
            Token::Str(text) => Ok(Filter::Literal(Value::String(text))),
            Token::Num(n) => Ok(Filter::Literal(number_literal(n))),
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Filter::Literal(Value::Bool(true))),
                "false" => Ok(Filter::Literal(Value::Bool(false))),
                "null" => Ok(Filter::Literal(Value::Null)),
                "not" => Ok(Filter::Not),
                "length" => Ok(Filter::Length),
                "keys" => Ok(Filter::Keys),
                "empty" => Ok(Filter::Empty),
                "select" => {
                    self.expect(&Token::LParen)?;
                    let condition = self.parse_pipe()?;
                    self.expect(&Token::RParen)?;
                    Ok(Filter::Select(Box::new(condition)))
                }
                other => Err(syntax(position, format!("unknown function {other:?}"))),
            },
            other => Err(syntax(position, format!("unexpected token {other:?}"))),
        }
    }

    /// Parses `{...}`; the opening brace is already consumed.
    fn parse_object(&mut self) -> Result<Filter, ExpressionError> {
        let mut fields = Vec::new();
        if *self.peek() == Token::RBrace {
            self.advance();
            return Ok(Filter::Object(fields));
        }
        loop {
            let position = self.position();
            let key = match self.advance() {
                Token::Ident(key) | Token::Str(key) => key,
                other => {
                    return Err(syntax(position, format!("invalid object key {other:?}")));
                }
            };
            let value = if *self.peek() == Token::Colon {
                self.advance();
                self.parse_compare()?
            } else {
                Filter::Field(key.clone())
            };
            fields.push((key, value));

            match self.advance() {
                Token::Comma => {}
                Token::RBrace => return Ok(Filter::Object(fields)),
                other => {
                    return Err(syntax(
                        self.position(),
                        format!("expected ',' or '}}', found {other:?}"),
                    ));
                }
            }
        }
    }
}

/// Appends `next` to `term`, dropping a leading identity.
fn chain(term: Filter, next: Filter) -> Filter {
    match term {
        Filter::Identity => next,
        term => Filter::Pipe(Box::new(term), Box::new(next)),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn number_literal(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str) -> Filter {
        Filter::Field(name.to_string())
    }

    fn pipe(a: Filter, b: Filter) -> Filter {
        Filter::Pipe(Box::new(a), Box::new(b))
    }

    #[test]
    fn parses_identity() {
        assert_eq!(parse(".").unwrap(), Filter::Identity);
    }

    #[test]
    fn parses_single_field() {
        assert_eq!(parse(".away_status").unwrap(), field("away_status"));
        assert_eq!(parse(" .data ").unwrap(), field("data"));
    }

    #[test]
    fn parses_quoted_field() {
        assert_eq!(parse(".\"with space\"").unwrap(), field("with space"));
    }

    #[test]
    fn parses_nested_fields() {
        assert_eq!(
            parse(".htr_system.setup.power_limit").unwrap(),
            pipe(pipe(field("htr_system"), field("setup")), field("power_limit"))
        );
    }

    #[test]
    fn parses_iteration_and_index() {
        assert_eq!(parse(".[]").unwrap(), Filter::Iterate);
        assert_eq!(parse(".nodes[]").unwrap(), pipe(field("nodes"), Filter::Iterate));
        assert_eq!(parse(".nodes[-1]").unwrap(), pipe(field("nodes"), Filter::Index(-1)));
        assert_eq!(parse(".[\"k\"]").unwrap(), field("k"));
    }

    #[test]
    fn parses_pipe_and_try() {
        assert_eq!(
            parse("(.nodes[] | .status)?").unwrap(),
            Filter::Try(Box::new(pipe(
                pipe(field("nodes"), Filter::Iterate),
                field("status")
            )))
        );
    }

    #[test]
    fn parses_object_shorthand_and_explicit() {
        assert_eq!(
            parse("{addr, kind: .type}").unwrap(),
            Filter::Object(vec![
                ("addr".to_string(), field("addr")),
                ("kind".to_string(), field("type")),
            ])
        );
    }

    #[test]
    fn parses_select_comparison() {
        assert_eq!(
            parse("select(.status != null)").unwrap(),
            Filter::Select(Box::new(Filter::Compare(
                Box::new(field("status")),
                CmpOp::Ne,
                Box::new(Filter::Literal(Value::Null))
            )))
        );
    }

    #[test]
    fn rejects_trailing_tokens() {
        let err = parse(".a )").unwrap_err();
        assert!(matches!(err, ExpressionError::Syntax { position: 3, .. }));
    }

    #[test]
    fn rejects_unknown_function() {
        assert!(matches!(
            parse("frobnicate"),
            Err(ExpressionError::Syntax { .. })
        ));
    }

    #[test]
    fn rejects_unterminated_string() {
        assert!(parse(".\"open").is_err());
    }

    #[test]
    fn rejects_empty_expression() {
        assert!(parse("").is_err());
    }
}
