//! Restricted literal parser for the `-p` argument bindings. Accepts a
//! Python/JSON-style map from register name to integer, float, boolean,
//! string or null literals and nothing else; there is no expression
//! evaluation.

use std::fmt::Display;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Null,
}

#[derive(Debug)]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at offset {}", self.message, self.position)
    }
}

impl std::error::Error for ParseError {}

struct Scanner<'a> {
    chars: Vec<char>,
    position: usize,
    text: &'a str,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Scanner {
            chars: text.chars().collect(),
            position: 0,
            text,
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            position: self.position,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.position += 1;
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.position += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            other => Err(self.error(format!("expected '{}', found {:?}", expected, other))),
        }
    }

    fn quoted(&mut self, quote: char) -> Result<String, ParseError> {
        let mut result = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string literal")),
                Some(c) if c == quote => return Ok(result),
                Some('\\') => match self.bump() {
                    Some('n') => result.push('\n'),
                    Some('t') => result.push('\t'),
                    Some('r') => result.push('\r'),
                    Some('\\') => result.push('\\'),
                    Some('\'') => result.push('\''),
                    Some('"') => result.push('"'),
                    other => {
                        return Err(self.error(format!("bad escape {:?}", other)));
                    }
                },
                Some(c) => result.push(c),
            }
        }
    }

    fn bare_word(&mut self) -> String {
        let start = self.position;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || "+-._xXabcdefABCDEF".contains(c))
        {
            self.position += 1;
        }
        self.chars[start..self.position].iter().collect()
    }

    fn value(&mut self) -> Result<Literal, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(quote @ ('\'' | '"')) => {
                self.bump();
                Ok(Literal::Str(self.quoted(quote)?))
            }
            Some(_) => {
                let word = self.bare_word();
                if word.is_empty() {
                    return Err(self.error("expected a literal"));
                }
                match word.as_str() {
                    "true" | "True" => Ok(Literal::Bool(true)),
                    "false" | "False" => Ok(Literal::Bool(false)),
                    "null" | "None" => Ok(Literal::Null),
                    _ => self.number(&word),
                }
            }
            None => Err(self.error("expected a literal")),
        }
    }

    fn number(&mut self, word: &str) -> Result<Literal, ParseError> {
        let (negative, digits) = match word.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, word.strip_prefix('+').unwrap_or(word)),
        };
        if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
            let magnitude = u64::from_str_radix(hex, 16)
                .map_err(|_| self.error(format!("bad hex literal '{}'", word)))?;
            let value = magnitude as i64;
            return Ok(Literal::Int(if negative { value.wrapping_neg() } else { value }));
        }
        if digits.contains('.') || digits.contains('e') || digits.contains('E') {
            return word
                .parse::<f64>()
                .map(Literal::Float)
                .map_err(|_| self.error(format!("bad float literal '{}'", word)));
        }
        word.parse::<i64>()
            .map(Literal::Int)
            .map_err(|_| self.error(format!("bad integer literal '{}'", word)))
    }

    fn key(&mut self) -> Result<String, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(quote @ ('\'' | '"')) => {
                self.bump();
                self.quoted(quote)
            }
            _ => {
                let word = self.bare_word();
                if word.is_empty() {
                    Err(self.error("expected a register name"))
                } else {
                    Ok(word)
                }
            }
        }
    }

    fn bindings(&mut self) -> Result<Vec<(String, Literal)>, ParseError> {
        self.expect('{')?;
        let mut result = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some('}') {
                self.bump();
                break;
            }
            let key = self.key()?;
            self.expect(':')?;
            result.push((key, self.value()?));
            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some('}') => {}
                other => {
                    return Err(self.error(format!("expected ',' or '}}', found {:?}", other)));
                }
            }
        }
        self.skip_whitespace();
        if self.position != self.chars.len() {
            return Err(self.error(format!("trailing input in '{}'", self.text)));
        }
        Ok(result)
    }
}

/// Parses `{'p0': 1, 'p1': "ab", 'p2': true}` into register bindings.
pub fn parse_bindings(text: &str) -> Result<Vec<(String, Literal)>, ParseError> {
    Scanner::new(text).bindings()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn parses_a_mixed_binding_map() {
        let bindings =
            parse_bindings("{'p0': 1, 'p1': -0x10, 'p2': \"ab\", 'p3': true, 'p4': 1.5}").unwrap();
        assert_eq!(
            bindings,
            vec![
                ("p0".to_string(), Literal::Int(1)),
                ("p1".to_string(), Literal::Int(-16)),
                ("p2".to_string(), Literal::Str("ab".to_string())),
                ("p3".to_string(), Literal::Bool(true)),
                ("p4".to_string(), Literal::Float(1.5)),
            ]
        );
    }

    #[rstest]
    #[case("{}")]
    #[case("{ }")]
    #[case("{'p0': null}")]
    #[case("{p0: 3}")]
    #[case("{'p0': 1,}")]
    fn accepts_minor_variations(#[case] text: &str) {
        assert!(parse_bindings(text).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("{'p0': }")]
    #[case("{'p0' 1}")]
    #[case("{'p0': 1} extra")]
    #[case("{'p0': 1 + 2}")]
    #[case("{'p0': __import__}")]
    fn rejects_everything_that_is_not_a_literal_map(#[case] text: &str) {
        assert!(parse_bindings(text).is_err());
    }
}
