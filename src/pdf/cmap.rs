//! Minimal CMap parser for `ToUnicode` streams.
//!
//! Only the parts needed to turn character codes into text are read:
//! `codespacerange` (for the code width), `bfchar` and `bfrange`.

use std::collections::HashMap;

/// Character code to Unicode mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CMap {
    map: HashMap<u32, String>,
    /// Bytes per character code
    code_len: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Hex(Vec<u8>),
    ArrayStart,
    ArrayEnd,
    Word(String),
}

impl CMap {
    /// Parse a CMap program. Unknown sections are skipped.
    pub fn parse(data: &[u8]) -> Self {
        let tokens = tokenize(data);
        let mut cmap = CMap {
            map: HashMap::new(),
            code_len: 0,
        };

        let mut i = 0;
        while i < tokens.len() {
            match &tokens[i] {
                Token::Word(w) if w == "begincodespacerange" => {
                    if let Some(Token::Hex(lo)) = tokens.get(i + 1) {
                        if cmap.code_len == 0 {
                            cmap.code_len = lo.len();
                        }
                    }
                    i = skip_to(&tokens, i, "endcodespacerange");
                }
                Token::Word(w) if w == "beginbfchar" => {
                    i += 1;
                    while let (Some(Token::Hex(src)), Some(Token::Hex(dst))) =
                        (tokens.get(i), tokens.get(i + 1))
                    {
                        cmap.insert(src, utf16be(dst));
                        i += 2;
                    }
                }
                Token::Word(w) if w == "beginbfrange" => {
                    i += 1;
                    loop {
                        match (tokens.get(i), tokens.get(i + 1), tokens.get(i + 2)) {
                            (Some(Token::Hex(lo)), Some(Token::Hex(hi)), Some(Token::Hex(dst))) => {
                                cmap.insert_range(lo, hi, dst);
                                i += 3;
                            }
                            (Some(Token::Hex(lo)), Some(Token::Hex(hi)), Some(Token::ArrayStart)) => {
                                let start = be_u32(lo);
                                let end = be_u32(hi);
                                i += 3;
                                let mut code = start;
                                while let Some(Token::Hex(dst)) = tokens.get(i) {
                                    if code <= end {
                                        cmap.map.insert(code, utf16be(dst));
                                    }
                                    code = code.saturating_add(1);
                                    i += 1;
                                }
                                if let Some(Token::ArrayEnd) = tokens.get(i) {
                                    i += 1;
                                }
                            }
                            _ => break,
                        }
                    }
                }
                _ => i += 1,
            }
        }

        if cmap.code_len == 0 {
            cmap.code_len = 1;
        }
        cmap
    }

    /// Bytes per character code
    pub fn code_len(&self) -> usize {
        self.code_len
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Look up a code
    pub fn get(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }

    fn insert(&mut self, src: &[u8], dst: String) {
        if self.code_len == 0 {
            self.code_len = src.len();
        }
        self.map.insert(be_u32(src), dst);
    }

    fn insert_range(&mut self, lo: &[u8], hi: &[u8], dst: &[u8]) {
        if self.code_len == 0 {
            self.code_len = lo.len();
        }
        let start = be_u32(lo);
        let end = be_u32(hi);
        if end < start || end - start > 0xFFFF {
            return;
        }

        // Successive codes increment the last UTF-16 unit of the destination
        let mut units = to_units(dst);
        for code in start..=end {
            self.map.insert(code, String::from_utf16_lossy(&units));
            if let Some(last) = units.last_mut() {
                *last = last.wrapping_add(1);
            }
        }
    }
}

fn skip_to(tokens: &[Token], from: usize, end: &str) -> usize {
    tokens[from..]
        .iter()
        .position(|t| matches!(t, Token::Word(w) if w == end))
        .map(|p| from + p + 1)
        .unwrap_or(tokens.len())
}

fn be_u32(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take(4)
        .fold(0u32, |acc, b| (acc << 8) | u32::from(*b))
}

fn to_units(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => (u16::from(*hi) << 8) | u16::from(*lo),
            [single] => u16::from(*single),
            _ => 0,
        })
        .collect()
}

/// Decode UTF-16BE bytes, replacing unpaired surrogates
pub(crate) fn utf16be(bytes: &[u8]) -> String {
    String::from_utf16_lossy(&to_units(bytes))
}

fn tokenize(data: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        match b {
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b'<' if data.get(i + 1) == Some(&b'<') => i += 2,
            b'>' if data.get(i + 1) == Some(&b'>') => i += 2,
            b'<' => {
                let start = i + 1;
                let end = data[start..]
                    .iter()
                    .position(|&c| c == b'>')
                    .map(|p| start + p)
                    .unwrap_or(data.len());
                tokens.push(Token::Hex(hex_bytes(&data[start..end])));
                i = end + 1;
            }
            b'[' => {
                tokens.push(Token::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(Token::ArrayEnd);
                i += 1;
            }
            b'(' => {
                // Literal strings carry nothing we map; skip balanced parens
                let mut depth = 0usize;
                while i < data.len() {
                    match data[i] {
                        b'\\' => i += 1,
                        b'(' => depth += 1,
                        b')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
                i += 1;
            }
            c if c.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < data.len() && !is_delimiter(data[i]) {
                    i += 1;
                }
                if i == start {
                    i += 1;
                    continue;
                }
                tokens.push(Token::Word(String::from_utf8_lossy(&data[start..i]).into_owned()));
            }
        }
    }
    tokens
}

fn is_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'<' | b'>' | b'[' | b']' | b'(' | b')' | b'%')
}

fn hex_bytes(digits: &[u8]) -> Vec<u8> {
    let nibbles: Vec<u8> = digits
        .iter()
        .filter_map(|&c| (c as char).to_digit(16).map(|d| d as u8))
        .collect();
    nibbles
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => (hi << 4) | lo,
            [hi] => hi << 4,
            _ => 0,
        })
        .collect()
}
