//! Safe literal evaluator for textual values.
//!
//! Environment variables and command-line tokens arrive as strings. Before
//! they are cast into a declared type they are parsed as literals: numbers,
//! booleans, `None`, quoted strings, bracketed or parenthesized sequences and
//! brace mappings. Nothing is ever executed; anything outside this grammar
//! yields `None` so callers can fall back to the raw string.

use std::collections::BTreeMap;

use crate::Value;

/// Deepest bracket nesting accepted before the input stops being a literal.
const MAX_DEPTH: usize = 128;

/// Parses a literal, returning `None` when the input is not a complete literal.
///
/// # Examples
///
/// ```
/// use config_tree_core::{Value, parse_literal};
///
/// assert_eq!(parse_literal("36"), Some(Value::Int(36)));
/// assert_eq!(parse_literal("[1, 2.5]"), Some(Value::from(vec![Value::Int(1), Value::Float(2.5)])));
/// assert_eq!(parse_literal("'quoted'"), Some(Value::from("quoted")));
/// assert_eq!(parse_literal("remainder"), None);
/// ```
pub fn parse_literal(input: &str) -> Option<Value> {
    let mut parser = LiteralParser {
        src: input,
        pos: 0,
        depth: 0,
    };
    let value = parser.value()?;
    parser.skip_ws();
    parser.at_end().then_some(value)
}

struct LiteralParser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl LiteralParser<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn value(&mut self) -> Option<Value> {
        self.skip_ws();
        match self.peek()? {
            open @ ('[' | '(' | '{') => {
                if self.depth >= MAX_DEPTH {
                    return None;
                }
                self.bump();
                self.depth += 1;
                let value = match open {
                    '[' => self.sequence(']').map(Value::List),
                    '(' => self.parenthesized(),
                    _ => self.mapping(),
                };
                self.depth -= 1;
                value
            }
            '\'' | '"' => self.string().map(Value::Str),
            c if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => self.number(),
            c if c.is_alphabetic() || c == '_' => self.keyword(),
            _ => None,
        }
    }

    fn sequence(&mut self, close: char) -> Option<Vec<Value>> {
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.eat(close) {
                return Some(items);
            }
            items.push(self.value()?);
            self.skip_ws();
            if self.eat(',') {
                continue;
            }
            if self.eat(close) {
                return Some(items);
            }
            return None;
        }
    }

    /// `()` and `(a,)` are sequences; `(a)` is just `a`.
    fn parenthesized(&mut self) -> Option<Value> {
        self.skip_ws();
        if self.eat(')') {
            return Some(Value::List(Vec::new()));
        }
        let first = self.value()?;
        self.skip_ws();
        if self.eat(')') {
            return Some(first);
        }
        if !self.eat(',') {
            return None;
        }
        let mut items = vec![first];
        items.extend(self.sequence(')')?);
        Some(Value::List(items))
    }

    fn mapping(&mut self) -> Option<Value> {
        let mut map = BTreeMap::new();
        loop {
            self.skip_ws();
            if self.eat('}') {
                return Some(Value::Map(map));
            }
            let key = self.string()?;
            self.skip_ws();
            if !self.eat(':') {
                return None;
            }
            let value = self.value()?;
            map.insert(key, value);
            self.skip_ws();
            if self.eat(',') {
                continue;
            }
            if self.eat('}') {
                return Some(Value::Map(map));
            }
            return None;
        }
    }

    fn string(&mut self) -> Option<String> {
        self.skip_ws();
        let quote = self.bump()?;
        if quote != '\'' && quote != '"' {
            return None;
        }
        let mut out = String::new();
        loop {
            match self.bump()? {
                '\\' => match self.bump()? {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    '0' => out.push('\0'),
                    c @ ('\\' | '\'' | '"') => out.push(c),
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                },
                c if c == quote => return Some(out),
                c => out.push(c),
            }
        }
    }

    fn number(&mut self) -> Option<Value> {
        let start = self.pos;
        let mut prev: Option<char> = None;
        while let Some(c) = self.peek() {
            let sign_ok = matches!(c, '+' | '-')
                && (prev.is_none() || matches!(prev, Some('e' | 'E')));
            if c.is_ascii_digit() || matches!(c, '.' | '_' | 'e' | 'E') || sign_ok {
                prev = Some(c);
                self.bump();
            } else {
                break;
            }
        }
        let raw = &self.src[start..self.pos];
        let bytes = raw.as_bytes();
        let stray_underscore = bytes.iter().enumerate().any(|(i, b)| {
            *b == b'_'
                && !(i > 0
                    && bytes[i - 1].is_ascii_digit()
                    && bytes.get(i + 1).is_some_and(u8::is_ascii_digit))
        });
        if stray_underscore {
            return None;
        }
        let text: String = raw.chars().filter(|c| *c != '_').collect();
        if !text.chars().any(|c| c.is_ascii_digit()) {
            return None;
        }
        if text.contains(['.', 'e', 'E']) {
            text.parse::<f64>().ok().map(Value::Float)
        } else {
            text.parse::<i64>().ok().map(Value::Int)
        }
    }

    fn keyword(&mut self) -> Option<Value> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        match &self.src[start..self.pos] {
            "True" | "true" => Some(Value::Bool(true)),
            "False" | "false" => Some(Value::Bool(false)),
            "None" | "null" => Some(Value::Null),
            _ => None,
        }
    }
}
