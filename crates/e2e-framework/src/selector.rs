//! Label selector expressions.
//!
//! Grammar:
//!
//! ```text
//! selector    := group ( "||" group )*
//! group       := requirement ( "," requirement )*
//! requirement := key ( "=" | "==" | "!=" ) value
//!              | key ( "in" | "notin" ) "(" value ( "," value )* ")"
//!              | key
//!              | "!" key
//! ```
//!
//! Requirements in a group are ANDed, groups are ORed. Values are compared
//! with exact string equality. A key missing from the labels fails every
//! requirement except `!key`.

use crate::labels::Labels;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Selector parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("Invalid character '{ch}' at position {position}")]
    InvalidCharacter { ch: char, position: usize },

    #[error("Unexpected '{token}' at position {position}, expected {expected}")]
    UnexpectedToken {
        token: String,
        position: usize,
        expected: &'static str,
    },

    #[error("Unexpected end of selector, expected {expected}")]
    UnexpectedEnd { expected: &'static str },

    #[error("Empty value set for key '{key}'")]
    EmptySet { key: String },
}

/// A single predicate over one label key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// `key=value` or `key==value`
    Equals { key: String, value: String },
    /// `key!=value`
    NotEquals { key: String, value: String },
    /// `key in (a,b)`
    In { key: String, values: BTreeSet<String> },
    /// `key notin (a,b)`
    NotIn { key: String, values: BTreeSet<String> },
    /// `key`
    Exists { key: String },
    /// `!key`
    DoesNotExist { key: String },
}

impl Requirement {
    /// Evaluate against a label set.
    #[must_use]
    pub fn matches(&self, labels: &Labels) -> bool {
        match self {
            Requirement::Equals { key, value } => labels.matches(key, value),
            Requirement::NotEquals { key, value } => labels.get(key).is_some_and(|v| v != value),
            Requirement::In { key, values } => labels.get(key).is_some_and(|v| values.contains(v)),
            Requirement::NotIn { key, values } => {
                labels.get(key).is_some_and(|v| !values.contains(v))
            }
            Requirement::Exists { key } => labels.contains_key(key),
            Requirement::DoesNotExist { key } => !labels.contains_key(key),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(values: &BTreeSet<String>) -> String {
            values.iter().cloned().collect::<Vec<_>>().join(",")
        }

        match self {
            Requirement::Equals { key, value } => write!(f, "{key}={value}"),
            Requirement::NotEquals { key, value } => write!(f, "{key}!={value}"),
            Requirement::In { key, values } => write!(f, "{key} in ({})", join(values)),
            Requirement::NotIn { key, values } => write!(f, "{key} notin ({})", join(values)),
            Requirement::Exists { key } => write!(f, "{key}"),
            Requirement::DoesNotExist { key } => write!(f, "!{key}"),
        }
    }
}

/// Parsed selector: a disjunction of requirement groups.
///
/// The empty selector has no groups and matches every label set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    groups: Vec<Vec<Requirement>>,
}

impl Selector {
    /// Selector that matches everything.
    #[must_use]
    pub fn everything() -> Self {
        Self::default()
    }

    /// Parse an expression. Blank input yields the empty selector.
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Ok(Self::default());
        }
        Parser { tokens, pos: 0 }.selector()
    }

    /// Selector with a single group of `key=value` requirements.
    pub fn from_labels<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let group: Vec<Requirement> = pairs
            .into_iter()
            .map(|(key, value)| Requirement::Equals {
                key: key.to_string(),
                value: value.to_string(),
            })
            .collect();
        if group.is_empty() {
            Self::default()
        } else {
            Self {
                groups: vec![group],
            }
        }
    }

    /// Whether the selector has no requirements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Requirement groups (ORed; requirements within a group are ANDed).
    #[must_use]
    pub fn groups(&self) -> &[Vec<Requirement>] {
        &self.groups
    }

    /// Evaluate against a label set. The empty selector matches everything.
    #[must_use]
    pub fn matches(&self, labels: &Labels) -> bool {
        self.is_empty()
            || self
                .groups
                .iter()
                .any(|group| group.iter().all(|r| r.matches(labels)))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .groups
            .iter()
            .map(|group| {
                group
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .collect();
        f.write_str(&rendered.join(" || "))
    }
}

impl std::str::FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// =============================================================================
// Tokenizer
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Eq,
    DoubleEq,
    NotEq,
    Bang,
    Comma,
    Or,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(w) => f.write_str(w),
            Token::Eq => f.write_str("="),
            Token::DoubleEq => f.write_str("=="),
            Token::NotEq => f.write_str("!="),
            Token::Bang => f.write_str("!"),
            Token::Comma => f.write_str(","),
            Token::Or => f.write_str("||"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/')
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, SelectorError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((position, c)) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            ',' => Token::Comma,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '=' => {
                if chars.next_if(|&(_, n)| n == '=').is_some() {
                    Token::DoubleEq
                } else {
                    Token::Eq
                }
            }
            '!' => {
                if chars.next_if(|&(_, n)| n == '=').is_some() {
                    Token::NotEq
                } else {
                    Token::Bang
                }
            }
            '|' => {
                if chars.next_if(|&(_, n)| n == '|').is_some() {
                    Token::Or
                } else {
                    return Err(SelectorError::InvalidCharacter { ch: c, position });
                }
            }
            c if is_word_char(c) => {
                let mut word = String::from(c);
                while let Some((_, n)) = chars.next_if(|&(_, n)| is_word_char(n)) {
                    word.push(n);
                }
                Token::Word(word)
            }
            ch => return Err(SelectorError::InvalidCharacter { ch, position }),
        };
        tokens.push((token, position));
    }

    Ok(tokens)
}

// =============================================================================
// Parser
// =============================================================================

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self, expected: &'static str) -> Result<(Token, usize), SelectorError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(SelectorError::UnexpectedEnd { expected })?;
        self.pos += 1;
        Ok(token)
    }

    fn unexpected(token: &Token, position: usize, expected: &'static str) -> SelectorError {
        SelectorError::UnexpectedToken {
            token: token.to_string(),
            position,
            expected,
        }
    }

    fn word(&mut self, expected: &'static str) -> Result<String, SelectorError> {
        match self.next(expected)? {
            (Token::Word(w), _) => Ok(w),
            (token, position) => Err(Self::unexpected(&token, position, expected)),
        }
    }

    fn selector(mut self) -> Result<Selector, SelectorError> {
        let mut groups = vec![self.group()?];
        while self.peek().is_some() {
            match self.next("'||'")? {
                (Token::Or, _) => groups.push(self.group()?),
                (token, position) => return Err(Self::unexpected(&token, position, "',' or '||'")),
            }
        }
        Ok(Selector { groups })
    }

    fn group(&mut self) -> Result<Vec<Requirement>, SelectorError> {
        let mut group = vec![self.requirement()?];
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            group.push(self.requirement()?);
        }
        Ok(group)
    }

    fn requirement(&mut self) -> Result<Requirement, SelectorError> {
        if self.peek() == Some(&Token::Bang) {
            self.pos += 1;
            let key = self.word("label key")?;
            return Ok(Requirement::DoesNotExist { key });
        }

        let key = self.word("label key")?;
        let requirement = match self.peek() {
            Some(Token::Eq | Token::DoubleEq) => {
                self.pos += 1;
                Requirement::Equals {
                    value: self.value()?,
                    key,
                }
            }
            Some(Token::NotEq) => {
                self.pos += 1;
                Requirement::NotEquals {
                    value: self.value()?,
                    key,
                }
            }
            Some(Token::Word(op)) if op == "in" || op == "notin" => {
                let negated = op == "notin";
                self.pos += 1;
                let values = self.value_set(&key)?;
                if negated {
                    Requirement::NotIn { key, values }
                } else {
                    Requirement::In { key, values }
                }
            }
            _ => Requirement::Exists { key },
        };
        Ok(requirement)
    }

    /// A value may be empty (`key=`), in which case the next token is a
    /// separator or the end of input.
    fn value(&mut self) -> Result<String, SelectorError> {
        match self.peek() {
            Some(Token::Word(_)) => self.word("label value"),
            None | Some(Token::Comma | Token::Or) => Ok(String::new()),
            Some(_) => {
                let (token, position) = self.next("label value")?;
                Err(Self::unexpected(&token, position, "label value"))
            }
        }
    }

    fn value_set(&mut self, key: &str) -> Result<BTreeSet<String>, SelectorError> {
        match self.next("'('")? {
            (Token::LParen, _) => {}
            (token, position) => return Err(Self::unexpected(&token, position, "'('")),
        }

        let mut values = BTreeSet::new();
        loop {
            match self.next("label value or ')'")? {
                (Token::RParen, _) => break,
                (Token::Word(w), _) => {
                    values.insert(w);
                    match self.next("',' or ')'")? {
                        (Token::Comma, _) => {}
                        (Token::RParen, _) => break,
                        (token, position) => {
                            return Err(Self::unexpected(&token, position, "',' or ')'"))
                        }
                    }
                }
                (token, position) => {
                    return Err(Self::unexpected(&token, position, "label value or ')'"))
                }
            }
        }

        if values.is_empty() {
            return Err(SelectorError::EmptySet {
                key: key.to_string(),
            });
        }
        Ok(values)
    }
}
