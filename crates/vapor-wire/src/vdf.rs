//! Key-values parsing for product-info and stats-schema buffers
//!
//! Product-info responses carry two flavors of the same tree format:
//! packages use the binary encoding, apps use the text encoding with a
//! trailing NUL. Both parse into [`KeyValues`].

use std::str;

use crate::error::{Error, Result};

/// One node of a key-values tree
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValues {
    /// Ordered child entries; duplicate keys are preserved
    Table(Vec<(String, KeyValues)>),
    String(String),
    Int(i64),
}

impl KeyValues {
    /// Looks up a direct child by key, ASCII case-insensitive.
    pub fn get(&self, key: &str) -> Option<&KeyValues> {
        match self {
            Self::Table(entries) => entries
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Walks a chain of child keys.
    pub fn get_path(&self, path: &[&str]) -> Option<&KeyValues> {
        path.iter().try_fold(self, |node, key| node.get(key))
    }

    /// Child entries of a table node, empty for leaves.
    pub fn entries(&self) -> &[(String, KeyValues)] {
        match self {
            Self::Table(entries) => entries,
            _ => &[],
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

const BIN_NODE: u8 = 0x00;
const BIN_STRING: u8 = 0x01;
const BIN_INT32: u8 = 0x02;
const BIN_UINT64: u8 = 0x07;
const BIN_END: u8 = 0x08;

/// Parses the binary key-values encoding.
pub fn parse_binary(input: &[u8]) -> Result<KeyValues> {
    let mut cursor = Cursor { buf: input, pos: 0 };
    let root = parse_binary_table(&mut cursor, true)?;
    Ok(root)
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn byte(&mut self) -> Result<u8> {
        let b = *self
            .buf
            .get(self.pos)
            .ok_or_else(|| Error::KeyValues("unexpected end of binary buffer".to_string()))?;
        self.pos += 1;
        Ok(b)
    }

    fn cstring(&mut self) -> Result<String> {
        let start = self.pos;
        while self.byte()? != 0 {}
        let raw = &self.buf[start..self.pos - 1];
        Ok(String::from_utf8_lossy(raw).into_owned())
    }

    fn take(&mut self, n: usize) -> Result<&[u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| Error::KeyValues("unexpected end of binary buffer".to_string()))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }
}

fn parse_binary_table(cursor: &mut Cursor<'_>, root: bool) -> Result<KeyValues> {
    let mut entries = Vec::new();
    loop {
        if root && cursor.at_end() {
            break;
        }
        let field_type = cursor.byte()?;
        if field_type == BIN_END {
            break;
        }
        let key = cursor.cstring()?;
        let value = match field_type {
            BIN_NODE => parse_binary_table(cursor, false)?,
            BIN_STRING => KeyValues::String(cursor.cstring()?),
            BIN_INT32 => {
                let raw: [u8; 4] = cursor.take(4)?.try_into().unwrap_or_default();
                KeyValues::Int(i64::from(i32::from_le_bytes(raw)))
            }
            BIN_UINT64 => {
                let raw: [u8; 8] = cursor.take(8)?.try_into().unwrap_or_default();
                KeyValues::Int(u64::from_le_bytes(raw) as i64)
            }
            other => {
                return Err(Error::KeyValues(format!(
                    "unsupported binary field type {other:#x} for key {key:?}"
                )));
            }
        };
        entries.push((key, value));
    }
    Ok(KeyValues::Table(entries))
}

/// Parses the text key-values encoding.
pub fn parse_text(input: &str) -> Result<KeyValues> {
    let mut tokens = Tokenizer { rest: input };
    let mut entries = Vec::new();
    while let Some(token) = tokens.next_token()? {
        match token {
            Token::Value(key) => {
                let value = parse_text_value(&mut tokens, &key)?;
                entries.push((key, value));
            }
            Token::Open | Token::Close => {
                return Err(Error::KeyValues("brace without preceding key".to_string()));
            }
        }
    }
    Ok(KeyValues::Table(entries))
}

fn parse_text_value(tokens: &mut Tokenizer<'_>, key: &str) -> Result<KeyValues> {
    match tokens.next_token()? {
        Some(Token::Value(value)) => Ok(KeyValues::String(value)),
        Some(Token::Open) => {
            let mut entries = Vec::new();
            loop {
                match tokens.next_token()? {
                    Some(Token::Close) => break,
                    Some(Token::Value(child_key)) => {
                        let value = parse_text_value(tokens, &child_key)?;
                        entries.push((child_key, value));
                    }
                    Some(Token::Open) => {
                        return Err(Error::KeyValues(
                            "brace without preceding key".to_string(),
                        ));
                    }
                    None => {
                        return Err(Error::KeyValues(format!(
                            "unterminated table for key {key:?}"
                        )));
                    }
                }
            }
            Ok(KeyValues::Table(entries))
        }
        _ => Err(Error::KeyValues(format!("missing value for key {key:?}"))),
    }
}

enum Token {
    Value(String),
    Open,
    Close,
}

struct Tokenizer<'a> {
    rest: &'a str,
}

impl Tokenizer<'_> {
    fn next_token(&mut self) -> Result<Option<Token>> {
        loop {
            self.rest = self.rest.trim_start();
            if let Some(stripped) = self.rest.strip_prefix("//") {
                self.rest = stripped
                    .split_once('\n')
                    .map_or("", |(_, after)| after);
                continue;
            }
            break;
        }
        let mut chars = self.rest.char_indices();
        let Some((_, first)) = chars.next() else {
            return Ok(None);
        };
        match first {
            '{' => {
                self.rest = &self.rest[1..];
                Ok(Some(Token::Open))
            }
            '}' => {
                self.rest = &self.rest[1..];
                Ok(Some(Token::Close))
            }
            '"' => {
                let mut value = String::new();
                let mut escaped = false;
                for (idx, ch) in chars {
                    if escaped {
                        value.push(match ch {
                            'n' => '\n',
                            't' => '\t',
                            other => other,
                        });
                        escaped = false;
                    } else if ch == '\\' {
                        escaped = true;
                    } else if ch == '"' {
                        self.rest = &self.rest[idx + 1..];
                        return Ok(Some(Token::Value(value)));
                    } else {
                        value.push(ch);
                    }
                }
                Err(Error::KeyValues("unterminated quoted string".to_string()))
            }
            _ => {
                let end = self
                    .rest
                    .find(|c: char| c.is_whitespace() || c == '{' || c == '}')
                    .unwrap_or(self.rest.len());
                let value = self.rest[..end].to_string();
                self.rest = &self.rest[end..];
                Ok(Some(Token::Value(value)))
            }
        }
    }
}
