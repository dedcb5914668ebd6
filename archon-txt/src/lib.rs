//! A tokenizer and recursive-descent parser for Paradox-style key/value data.
//!
//! The format is loosely `KEY = VALUE`, braces `{ }` for nested blocks and lists,
//! `#` line comments, quoted strings, and bare `YYYY.M.D` dates used for historical
//! sub-blocks. Source files are typically encoded in `WINDOWS_1252`.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use std::vec::Vec;

use encoding_rs::WINDOWS_1252;
use encoding_rs_io::DecodeReaderBytesBuilder;

pub mod de;
pub use de::from_node;

pub mod error;
pub use error::ParseError;

/// A calendar date as it appears literally in a data file (`1444.11.11`).
///
/// This is a raw year/month/day triple with no calendar validation; callers
/// that need a real Gregorian calendar convert it downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RawDate {
    pub year: i32,
    pub month: u8,
    pub day: u8,
}

impl std::fmt::Display for RawDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.year, self.month, self.day)
    }
}

/// Attempts to parse a bare token as a `YYYY.M.D` date literal.
fn try_parse_date(s: &str) -> Option<RawDate> {
    let mut parts = s.split('.');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u8 = parts.next()?.parse().ok()?;
    let day: u8 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    Some(RawDate { year, month, day })
}

/// A token scanned from a key/value text file.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// An alphanumeric identifier (keys, bareword values).
    Identifier(String),
    /// A quoted string value.
    StringValue(String),
    /// A floating point number.
    FloatValue(f32),
    /// An integer number.
    IntValue(i32),
    /// A `yes`/`no` boolean literal.
    BoolValue(bool),
    /// A bare `YYYY.M.D` date literal.
    DateValue(RawDate),
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `=`
    Equals,
}

/// An item in the parse tree.
#[derive(Debug, Clone, PartialEq)]
pub enum AstItem {
    /// An empty brace pair `{}` or container helper.
    Brace,
    /// A `key = value` assignment.
    Assignment,
    /// A list of assignments or values (usually enclosed in braces).
    AssignmentList,
    /// An identifier value.
    Identifier(String),
    /// A string value.
    StringValue(String),
    /// A float value.
    FloatValue(f32),
    /// An integer value.
    IntValue(i32),
    /// A boolean value.
    BoolValue(bool),
    /// A date value.
    DateValue(RawDate),
}

/// A node in the parse tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseNode {
    /// Child nodes (for lists or assignments).
    pub children: Vec<ParseNode>,
    /// The type of item and its data.
    pub entry: AstItem,
}

impl Default for ParseNode {
    fn default() -> Self {
        Self::new()
    }
}

impl ParseNode {
    /// Creates a new empty node with `Brace` type.
    pub fn new() -> ParseNode {
        ParseNode {
            children: Vec::new(),
            entry: AstItem::Brace,
        }
    }

    /// Counts the total number of nodes in this subtree (inclusive).
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.node_count()).sum::<usize>()
    }

    /// Returns the children of this node whose key (LHS of an `Assignment`)
    /// equals `key`, in document order. Only meaningful on `AssignmentList` nodes.
    pub fn assignments_with_key<'a>(&'a self, key: &str) -> Vec<&'a ParseNode> {
        self.children
            .iter()
            .filter(|child| {
                matches!(&child.entry, AstItem::Assignment)
                    && matches!(child.children.first().map(|n| &n.entry), Some(AstItem::Identifier(k)) if k == key)
            })
            .collect()
    }

    /// Returns all children whose assignment key parses as a `YYYY.M.D` date,
    /// paired with that date, in document order.
    pub fn dated_blocks(&self) -> Vec<(RawDate, &ParseNode)> {
        self.children
            .iter()
            .filter_map(|child| {
                if !matches!(&child.entry, AstItem::Assignment) {
                    return None;
                }
                let key = child.children.first()?;
                let date = match &key.entry {
                    AstItem::DateValue(d) => Some(*d),
                    AstItem::Identifier(s) => try_parse_date(s),
                    _ => None,
                }?;
                let value = child.children.get(1)?;
                Some((date, value))
            })
            .collect()
    }
}

pub trait ParadoxText {
    fn tokenize(path: &str) -> std::io::Result<Vec<Token>> {
        let path = PathBuf::from(path);
        let file = File::open(path)?;
        let mut buf_reader = BufReader::new(
            DecodeReaderBytesBuilder::new()
                .encoding(Some(WINDOWS_1252))
                .build(file),
        );
        let mut contents = String::new();
        buf_reader.read_to_string(&mut contents)?;
        Ok(Self::tokenize_str(&contents))
    }

    /// Tokenizes an already-decoded string (used for localisation and tests).
    fn tokenize_str(contents: &str) -> Vec<Token> {
        let mut tokens: Vec<Token> = Vec::new();
        let mut chars = contents.chars().peekable();

        while let Some(&c) = chars.peek() {
            match c {
                c if c.is_whitespace() => {
                    chars.next();
                }
                '#' => {
                    chars.next(); // consume #
                    while let Some(&nc) = chars.peek() {
                        if nc == '\n' || nc == '\r' {
                            break;
                        }
                        chars.next();
                    }
                }
                '{' => {
                    tokens.push(Token::LeftBrace);
                    chars.next();
                }
                '}' => {
                    tokens.push(Token::RightBrace);
                    chars.next();
                }
                '=' => {
                    tokens.push(Token::Equals);
                    chars.next();
                }
                '"' => {
                    chars.next(); // consume opening "
                    let mut s = String::new();
                    while let Some(&nc) = chars.peek() {
                        if nc == '"' {
                            chars.next(); // consume closing "
                            break;
                        }
                        s.push(chars.next().unwrap());
                    }
                    tokens.push(Token::StringValue(s));
                }
                _ => {
                    let mut s = String::new();
                    while let Some(&nc) = chars.peek() {
                        if nc.is_whitespace()
                            || nc == '='
                            || nc == '{'
                            || nc == '}'
                            || nc == '#'
                            || nc == '"'
                        {
                            break;
                        }
                        s.push(chars.next().unwrap());
                    }

                    if s == "yes" {
                        tokens.push(Token::BoolValue(true));
                    } else if s == "no" {
                        tokens.push(Token::BoolValue(false));
                    } else if let Some(date) = try_parse_date(&s) {
                        tokens.push(Token::DateValue(date));
                    } else if let Ok(i) = s.parse::<i32>() {
                        tokens.push(Token::IntValue(i));
                    } else if let Ok(f) = s.parse::<f32>() {
                        if f.is_nan() && s != "nan" && s != "NaN" {
                            // A bareword that merely looks numeric-ish (e.g. "Nan" the
                            // name) but isn't a real NaN literal: keep it as text.
                            tokens.push(Token::StringValue(s));
                        } else {
                            tokens.push(Token::FloatValue(f));
                        }
                    } else {
                        tokens.push(Token::Identifier(s));
                    }
                }
            }
        }
        tokens
    }

    fn parse_terminal(tokens: &[Token], pos: usize) -> Result<(ParseNode, usize), ParseError> {
        let tok: &Token = tokens
            .get(pos)
            .ok_or(ParseError::UnexpectedEof { position: pos })?;
        match tok {
            Token::Identifier(s) => Ok((
                ParseNode {
                    entry: AstItem::Identifier(s.to_string()),
                    ..ParseNode::new()
                },
                pos + 1,
            )),
            Token::IntValue(i) => Ok((
                ParseNode {
                    entry: AstItem::IntValue(*i),
                    ..ParseNode::new()
                },
                pos + 1,
            )),
            Token::FloatValue(f) => Ok((
                ParseNode {
                    entry: AstItem::FloatValue(*f),
                    ..ParseNode::new()
                },
                pos + 1,
            )),
            Token::StringValue(s) => Ok((
                ParseNode {
                    entry: AstItem::StringValue(s.to_string()),
                    ..ParseNode::new()
                },
                pos + 1,
            )),
            Token::BoolValue(b) => Ok((
                ParseNode {
                    entry: AstItem::BoolValue(*b),
                    ..ParseNode::new()
                },
                pos + 1,
            )),
            Token::DateValue(d) => Ok((
                ParseNode {
                    entry: AstItem::DateValue(*d),
                    ..ParseNode::new()
                },
                pos + 1,
            )),
            _ => Err(ParseError::UnexpectedToken {
                position: pos,
                token: format!("{:?}", tok),
                expected: "identifier, number, date, or string".to_string(),
            }),
        }
    }

    fn parse_assignment_list(
        tokens: &[Token],
        pos: usize,
    ) -> Result<(ParseNode, usize), ParseError> {
        let mut assignment_list = ParseNode {
            entry: AstItem::AssignmentList,
            ..ParseNode::new()
        };
        let mut loop_pos = pos;
        loop {
            if loop_pos == tokens.len() {
                break;
            }
            let lhs_tok = tokens
                .get(loop_pos)
                .ok_or(ParseError::UnexpectedEof { position: loop_pos })?;
            if let Token::RightBrace = lhs_tok {
                loop_pos += 1;
                break;
            }
            let (node_lhs, eq_pos) = Self::parse_terminal(tokens, loop_pos)?;

            match &node_lhs.entry {
                AstItem::Identifier(_) | AstItem::StringValue(_) | AstItem::DateValue(_) => {}
                _ => {
                    if let Some(Token::Equals) = tokens.get(eq_pos) {
                        return Err(ParseError::InvalidLhs {
                            position: loop_pos,
                            found: format!("{:?}", node_lhs.entry),
                        });
                    }
                }
            }

            let eq = tokens.get(eq_pos);
            if eq.is_none() {
                assignment_list.children.push(node_lhs);
                loop_pos += 1;
                continue;
            }
            match eq.unwrap() {
                Token::Equals => {
                    let rhs_tok = tokens.get(eq_pos + 1).ok_or(ParseError::MissingRhs {
                        position: eq_pos + 1,
                    })?;
                    let node_rhs: ParseNode;
                    let next_pos: usize;
                    match rhs_tok {
                        Token::LeftBrace => {
                            (node_rhs, next_pos) = Self::parse_assignment_list(tokens, eq_pos + 2)?;
                        }
                        _ => {
                            (node_rhs, next_pos) = Self::parse_terminal(tokens, eq_pos + 1)?;
                        }
                    }
                    let assignment = ParseNode {
                        entry: AstItem::Assignment,
                        children: vec![node_lhs, node_rhs],
                    };
                    assignment_list.children.push(assignment);
                    loop_pos = next_pos;
                }
                _ => {
                    // Not an assignment (key=val); it's a loose value in a list.
                    assignment_list.children.push(node_lhs);
                    loop_pos = eq_pos;
                }
            }
        }
        Ok((assignment_list, loop_pos))
    }

    fn parse(tokens: Vec<Token>) -> Result<ParseNode, ParseError> {
        if tokens.is_empty() {
            return Err(ParseError::EmptyInput);
        }
        Self::parse_assignment_list(&tokens, 0).and_then(|(n, i)| {
            if i == tokens.len() {
                Ok(n)
            } else {
                Err(ParseError::UnconsumedTokens {
                    position: i,
                    remaining: tokens.len() - i,
                })
            }
        })
    }
}

pub struct DefaultParadoxText {}
impl ParadoxText for DefaultParadoxText {}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    #[test]
    fn nonexistent() {
        let r = DefaultParadoxText::tokenize("path/to/nowhere");
        assert!(r.is_err());
    }

    #[test]
    fn exists() {
        let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        write!(file, "key = value").expect("Failed to write");
        let path = file.path().to_str().unwrap();

        let r = DefaultParadoxText::tokenize(path);
        assert!(r.is_ok());
    }

    #[test]
    fn parse_simple_assignment() {
        let tokens = DefaultParadoxText::tokenize_str("key = value");
        let ast = DefaultParadoxText::parse(tokens).unwrap();
        assert_eq!(ast.children.len(), 1);
    }

    #[test]
    fn parse_bool_literal() {
        let tokens = DefaultParadoxText::tokenize_str("hre = yes");
        let ast = DefaultParadoxText::parse(tokens).unwrap();
        let assignment = &ast.children[0];
        let value = &assignment.children[1];
        assert_eq!(value.entry, AstItem::BoolValue(true));
    }

    #[test]
    fn parse_date_key() {
        let tokens = DefaultParadoxText::tokenize_str("1444.11.11 = { owner = AAA }");
        let ast = DefaultParadoxText::parse(tokens).unwrap();
        let dated = ast.dated_blocks();
        assert_eq!(dated.len(), 1);
        assert_eq!(
            dated[0].0,
            RawDate {
                year: 1444,
                month: 11,
                day: 11
            }
        );
    }

    #[test]
    fn test_empty_input() {
        let tokens = vec![];
        let result = DefaultParadoxText::parse(tokens);
        assert!(matches!(result, Err(ParseError::EmptyInput)));
    }

    #[test]
    fn test_missing_rhs() {
        let tokens = DefaultParadoxText::tokenize_str("key =");
        let result = DefaultParadoxText::parse(tokens);
        assert!(matches!(result, Err(ParseError::MissingRhs { .. })));
    }

    #[test]
    fn test_invalid_lhs() {
        let tokens = DefaultParadoxText::tokenize_str("123 = value");
        let result = DefaultParadoxText::parse(tokens);
        assert!(matches!(result, Err(ParseError::InvalidLhs { .. })));
    }

    #[test]
    fn test_unconsumed_tokens() {
        let tokens = vec![
            Token::Identifier("key".to_string()),
            Token::Equals,
            Token::LeftBrace,
            Token::Identifier("nested".to_string()),
            Token::RightBrace,
            Token::RightBrace,
            Token::Identifier("extra".to_string()),
        ];
        let result = DefaultParadoxText::parse(tokens);
        assert!(matches!(
            result,
            Err(ParseError::UnconsumedTokens {
                position: 6,
                remaining: 1
            })
        ));
    }

    #[test]
    fn test_error_display() {
        let err = ParseError::UnexpectedEof { position: 5 };
        assert_eq!(err.to_string(), "Unexpected end of file at position 5");

        let err = ParseError::EmptyInput;
        assert_eq!(err.to_string(), "Cannot parse empty input");
    }
}
