//! Restricted literal reader used when a payload is not strict JSON.
//!
//! Accepts dict-literal syntax as people paste it from a REPL:
//!
//! ```text
//! {0: {0: 11, 1: 22,}, 1: {'0': 11, '1': 22}}   # trailing commas, bare keys
//! ```
//!
//! Only numbers, quoted strings, lists and mappings are understood. There are
//! no identifiers, so nothing in the input can name or call anything.

use std::fmt;

const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Literal>),
    /// Entries in source order; duplicate keys are kept.
    Map(Vec<(Literal, Literal)>),
}

impl Literal {
    pub fn kind(&self) -> &'static str {
        match self {
            Literal::Int(_) => "integer",
            Literal::Float(_) => "float",
            Literal::Str(_) => "string",
            Literal::List(_) => "list",
            Literal::Map(_) => "mapping",
        }
    }
}

impl From<serde_json::Value> for Literal {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Literal::Str("null".to_string()),
            Value::Bool(b) => Literal::Str(b.to_string()),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Literal::Int(i),
                None => Literal::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Literal::Str(s),
            Value::Array(items) => Literal::List(items.into_iter().map(Literal::from).collect()),
            Value::Object(obj) => Literal::Map(
                obj.into_iter()
                    .map(|(k, v)| (Literal::Str(k), Literal::from(v)))
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl fmt::Display for LiteralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at line {} column {}",
            self.message, self.line, self.column
        )
    }
}

impl std::error::Error for LiteralError {}

pub fn parse_literal(input: &str) -> Result<Literal, LiteralError> {
    let mut reader = Reader {
        chars: input.chars().collect(),
        pos: 0,
    };
    let value = reader.value(0)?;
    reader.skip_trivia();
    if reader.peek().is_some() {
        return Err(reader.error("unexpected trailing characters"));
    }
    Ok(value)
}

struct Reader {
    chars: Vec<char>,
    pos: usize,
}

impl Reader {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> LiteralError {
        let consumed = &self.chars[..self.pos.min(self.chars.len())];
        let line = consumed.iter().filter(|c| **c == '\n').count() + 1;
        let column = consumed.iter().rev().take_while(|c| **c != '\n').count() + 1;
        LiteralError {
            line,
            column,
            message: message.into(),
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
            } else if c == '#' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, wanted: char) -> Result<(), LiteralError> {
        self.skip_trivia();
        match self.peek() {
            Some(c) if c == wanted => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", wanted, c))),
            None => Err(self.error(format!("expected '{}', found end of input", wanted))),
        }
    }

    fn value(&mut self, depth: usize) -> Result<Literal, LiteralError> {
        if depth > MAX_DEPTH {
            return Err(self.error("literal nested too deeply"));
        }
        self.skip_trivia();
        match self.peek() {
            Some('{') => self.mapping(depth),
            Some('[') => self.list(depth),
            Some(q @ ('"' | '\'')) => self.string(q).map(Literal::Str),
            Some(c) if c.is_ascii_digit() || matches!(c, '+' | '-' | '.') => self.number(),
            Some(c) => Err(self.error(format!("unsupported token starting with '{}'", c))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn mapping(&mut self, depth: usize) -> Result<Literal, LiteralError> {
        self.expect('{')?;
        let mut entries = Vec::new();
        loop {
            self.skip_trivia();
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(Literal::Map(entries));
            }
            let key = self.value(depth + 1)?;
            self.expect(':')?;
            let value = self.value(depth + 1)?;
            entries.push((key, value));

            self.skip_trivia();
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(Literal::Map(entries)),
                Some(c) => {
                    self.pos -= 1;
                    return Err(self.error(format!("expected ',' or '}}', found '{}'", c)));
                }
                None => return Err(self.error("unterminated mapping")),
            }
        }
    }

    fn list(&mut self, depth: usize) -> Result<Literal, LiteralError> {
        self.expect('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            if self.peek() == Some(']') {
                self.pos += 1;
                return Ok(Literal::List(items));
            }
            items.push(self.value(depth + 1)?);

            self.skip_trivia();
            match self.bump() {
                Some(',') => continue,
                Some(']') => return Ok(Literal::List(items)),
                Some(c) => {
                    self.pos -= 1;
                    return Err(self.error(format!("expected ',' or ']', found '{}'", c)));
                }
                None => return Err(self.error("unterminated list")),
            }
        }
    }

    fn string(&mut self, quote: char) -> Result<String, LiteralError> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => {
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some('\\') => '\\',
                        Some('\'') => '\'',
                        Some('"') => '"',
                        Some('u') => self.unicode_escape()?,
                        Some(c) => return Err(self.error(format!("unknown escape '\\{}'", c))),
                        None => return Err(self.error("unterminated string")),
                    };
                    out.push(escaped);
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn unicode_escape(&mut self) -> Result<char, LiteralError> {
        let mut code = 0u32;
        for _ in 0..4 {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("invalid \\u escape"))?;
            code = code * 16 + digit;
        }
        char::from_u32(code).ok_or_else(|| self.error("invalid \\u escape"))
    }

    fn number(&mut self) -> Result<Literal, LiteralError> {
        let start = self.pos;
        if matches!(self.peek(), Some('+' | '-')) {
            self.pos += 1;
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' | '_' => {}
                '.' => is_float = true,
                'e' | 'E' => {
                    is_float = true;
                    if matches!(self.chars.get(self.pos + 1), Some('+' | '-')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
            self.pos += 1;
        }

        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        let text = text.strip_prefix('+').unwrap_or(&text);

        if !is_float {
            if let Ok(i) = text.parse::<i64>() {
                return Ok(Literal::Int(i));
            }
        }
        // 超出 i64 的整數也以浮點數保存
        match text.parse::<f64>() {
            Ok(f) => Ok(Literal::Float(f)),
            Err(_) => {
                self.pos = start;
                Err(self.error(format!(
                    "invalid number '{}'",
                    self.chars[start..].iter().take(24).collect::<String>()
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_keys_and_trailing_commas() {
        let lit = parse_literal("{0: {0: 11, 1: 22,}, 1: {'0': 1.5, '1': -2e1},}").unwrap();
        let Literal::Map(entries) = lit else {
            panic!("expected mapping");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, Literal::Int(0));
        assert_eq!(
            entries[1].1,
            Literal::Map(vec![
                (Literal::Str("0".into()), Literal::Float(1.5)),
                (Literal::Str("1".into()), Literal::Float(-20.0)),
            ])
        );
    }

    #[test]
    fn test_lists_strings_and_comments() {
        let lit = parse_literal("# pasted\n[1, \"two\\n\", [3.0], {}]").unwrap();
        assert_eq!(
            lit,
            Literal::List(vec![
                Literal::Int(1),
                Literal::Str("two\n".into()),
                Literal::List(vec![Literal::Float(3.0)]),
                Literal::Map(vec![]),
            ])
        );
    }

    #[test]
    fn test_rejects_identifiers_and_calls() {
        for input in [
            "__import__('os').system('ls')",
            "{0: open('x')}",
            "{0: {0: True}}",
            "lambda: 1",
        ] {
            assert!(parse_literal(input).is_err(), "accepted {input}");
        }
    }

    #[test]
    fn test_reports_position() {
        let err = parse_literal("{0: 1\n 1: 2}").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("expected ','"));
    }

    #[test]
    fn test_depth_limit() {
        let deep = "[".repeat(MAX_DEPTH + 2) + &"]".repeat(MAX_DEPTH + 2);
        let err = parse_literal(&deep).unwrap_err();
        assert!(err.message.contains("nested too deeply"));
    }

    #[test]
    fn test_trailing_garbage() {
        assert!(parse_literal("{} {}").is_err());
        assert!(parse_literal("").is_err());
    }
}
