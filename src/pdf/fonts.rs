//! Font dictionaries: code-to-text decoding and glyph widths.

use lopdf::{Dictionary, Document, Object};
use std::collections::HashMap;

use super::cmap::{utf16be, CMap};
use crate::utils::ResourceCache;

/// Glyph width used when a font carries no metrics, in 1/1000 em
const FALLBACK_WIDTH: f32 = 500.0;

/// Follow a reference to its target object
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Look up a dictionary key, following references
pub(crate) fn lookup<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().map(|obj| resolve(doc, obj))
}

pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn name_of(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    match lookup(doc, dict, key)? {
        Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
        _ => None,
    }
}

fn stream_bytes(obj: &Object) -> Option<Vec<u8>> {
    match obj {
        Object::Stream(stream) => Some(
            stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone()),
        ),
        _ => None,
    }
}

/// Document-wide font family indices, assigned in order of first use
#[derive(Debug, Default)]
pub(crate) struct FontFamilies {
    indices: HashMap<String, u32>,
}

impl FontFamilies {
    fn index_of(&mut self, family: String) -> u32 {
        let next = self.indices.len() as u32;
        *self.indices.entry(family).or_insert(next)
    }
}

/// A font ready to decode shown strings
#[derive(Debug, Clone)]
pub(crate) struct Font {
    pub family_index: u32,
    code_len: usize,
    to_unicode: Option<CMap>,
    ucs2: bool,
    differences: HashMap<u32, String>,
    widths: HashMap<u32, f32>,
    default_width: f32,
}

impl Font {
    /// Build a font from its dictionary
    pub fn load(
        doc: &Document,
        dict: &Dictionary,
        families: &mut FontFamilies,
        resources: &ResourceCache,
    ) -> Self {
        let base = name_of(doc, dict, b"BaseFont").unwrap_or_default();
        // Drop the six-letter subset tag, e.g. "ABCDEF+Times-Roman"
        let family = match base.split_once('+') {
            Some((tag, rest)) if tag.len() == 6 => rest.to_string(),
            _ => base,
        };
        let family_index = families.index_of(family);

        let composite = name_of(doc, dict, b"Subtype").as_deref() == Some("Type0");
        let to_unicode = lookup(doc, dict, b"ToUnicode")
            .and_then(stream_bytes)
            .map(|data| CMap::parse(&data))
            .filter(|cmap| !cmap.is_empty());

        let mut encoding_name = None;
        let mut differences = HashMap::new();
        match lookup(doc, dict, b"Encoding") {
            Some(Object::Name(n)) => encoding_name = Some(String::from_utf8_lossy(n).into_owned()),
            Some(Object::Dictionary(enc)) => {
                if let Some(Object::Array(items)) = lookup(doc, enc, b"Differences") {
                    differences = parse_differences(doc, items);
                }
            }
            _ => {}
        }

        let ucs2 = composite
            && encoding_name
                .as_deref()
                .is_some_and(|n| n.contains("UCS2") || n.contains("UTF16"));

        // Non-identity predefined CMaps are looked up among the bundled resources
        let to_unicode = to_unicode.or_else(|| match encoding_name.as_deref() {
            Some(name) if composite && !ucs2 && !name.starts_with("Identity") => resources
                .get(&format!("cmaps/{}", name))
                .ok()
                .flatten()
                .map(|bytes| CMap::parse(&bytes))
                .filter(|cmap| !cmap.is_empty()),
            _ => None,
        });

        let code_len = if composite {
            2
        } else {
            to_unicode.as_ref().map_or(1, |c| c.code_len().clamp(1, 2))
        };

        let (widths, default_width) = if composite {
            composite_widths(doc, dict)
        } else {
            (simple_widths(doc, dict), FALLBACK_WIDTH)
        };

        Self {
            family_index,
            code_len,
            to_unicode,
            ucs2,
            differences,
            widths,
            default_width,
        }
    }

    /// Whether this is a single-byte font (word spacing applies to code 32)
    pub fn single_byte(&self) -> bool {
        self.code_len == 1
    }

    /// Split a shown string into `(code, text)` glyphs
    pub fn decode(&self, bytes: &[u8]) -> Vec<(u32, String)> {
        bytes
            .chunks(self.code_len)
            .map(|chunk| {
                let code = chunk.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
                (code, self.text_for(code, chunk))
            })
            .collect()
    }

    fn text_for(&self, code: u32, raw: &[u8]) -> String {
        if let Some(text) = self.to_unicode.as_ref().and_then(|c| c.get(code)) {
            return text.to_string();
        }
        if self.ucs2 {
            return utf16be(raw);
        }
        if let Some(text) = self.differences.get(&code) {
            return text.clone();
        }
        if self.code_len == 1 {
            return win_ansi(code).map(String::from).unwrap_or_default();
        }
        String::new()
    }

    /// Glyph advance in 1/1000 em
    pub fn width(&self, code: u32) -> f32 {
        self.widths.get(&code).copied().unwrap_or(self.default_width)
    }
}

fn simple_widths(doc: &Document, dict: &Dictionary) -> HashMap<u32, f32> {
    let first = lookup(doc, dict, b"FirstChar").and_then(number).unwrap_or(0.0) as u32;
    match lookup(doc, dict, b"Widths") {
        Some(Object::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(i, w)| {
                let code = u32::try_from(i).ok().and_then(|i| first.checked_add(i))?;
                number(resolve(doc, w)).map(|w| (code, w))
            })
            .collect(),
        _ => HashMap::new(),
    }
}

fn composite_widths(doc: &Document, dict: &Dictionary) -> (HashMap<u32, f32>, f32) {
    let descendant = match lookup(doc, dict, b"DescendantFonts") {
        Some(Object::Array(items)) => items.first().map(|d| resolve(doc, d)),
        _ => None,
    };
    let Some(Object::Dictionary(cid_font)) = descendant else {
        return (HashMap::new(), 1000.0);
    };

    let default_width = lookup(doc, cid_font, b"DW").and_then(number).unwrap_or(1000.0);
    let mut widths = HashMap::new();
    if let Some(Object::Array(items)) = lookup(doc, cid_font, b"W") {
        let items: Vec<&Object> = items.iter().map(|o| resolve(doc, o)).collect();
        let mut i = 0;
        while i < items.len() {
            let Some(start) = number(items[i]) else {
                break;
            };
            match items.get(i + 1) {
                // c [w1 w2 ...]
                Some(Object::Array(ws)) => {
                    for (offset, w) in ws.iter().enumerate() {
                        let code = u32::try_from(offset)
                            .ok()
                            .and_then(|offset| (start as u32).checked_add(offset));
                        if let (Some(code), Some(w)) = (code, number(resolve(doc, w))) {
                            widths.insert(code, w);
                        }
                    }
                    i += 2;
                }
                // c_first c_last w
                Some(end) => {
                    let (Some(end), Some(w)) = (number(end), items.get(i + 2).and_then(|w| number(w)))
                    else {
                        break;
                    };
                    let (start, end) = (start as u32, end as u32);
                    if end >= start && end - start <= 0xFFFF {
                        for code in start..=end {
                            widths.insert(code, w);
                        }
                    }
                    i += 3;
                }
                None => break,
            }
        }
    }
    (widths, default_width)
}

fn parse_differences(doc: &Document, items: &[Object]) -> HashMap<u32, String> {
    let mut map = HashMap::new();
    // None once a run walks past the last code
    let mut code = Some(0u32);
    for item in items {
        match resolve(doc, item) {
            Object::Integer(i) => code = u32::try_from((*i).max(0)).ok(),
            Object::Name(name) => {
                let Some(current) = code else {
                    continue;
                };
                if let Some(text) = glyph_text(&String::from_utf8_lossy(name)) {
                    map.insert(current, text);
                }
                code = current.checked_add(1);
            }
            _ => {}
        }
    }
    map
}

/// Text for a glyph name from an encoding's Differences array
fn glyph_text(name: &str) -> Option<String> {
    if let Some(hex) = name.strip_prefix("uni") {
        if hex.len() == 4 {
            return u32::from_str_radix(hex, 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from);
        }
    }
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphabetic() {
            return Some(c.to_string());
        }
    }
    let text = match name {
        "space" => " ",
        "zero" => "0",
        "one" => "1",
        "two" => "2",
        "three" => "3",
        "four" => "4",
        "five" => "5",
        "six" => "6",
        "seven" => "7",
        "eight" => "8",
        "nine" => "9",
        "comma" => ",",
        "period" => ".",
        "colon" => ":",
        "semicolon" => ";",
        "hyphen" | "minus" => "-",
        "endash" => "\u{2013}",
        "emdash" => "\u{2014}",
        "slash" => "/",
        "parenleft" => "(",
        "parenright" => ")",
        "bracketleft" => "[",
        "bracketright" => "]",
        "question" => "?",
        "exclam" => "!",
        "ampersand" => "&",
        "at" => "@",
        "quoteright" => "\u{2019}",
        "quoteleft" => "\u{2018}",
        "quotedblleft" => "\u{201c}",
        "quotedblright" => "\u{201d}",
        "quotesingle" => "'",
        "ff" => "ff",
        "fi" => "fi",
        "fl" => "fl",
        "ffi" => "ffi",
        "ffl" => "ffl",
        "bullet" => "\u{2022}",
        _ => return None,
    };
    Some(text.to_string())
}

/// WinAnsi approximation for single-byte fonts without a usable mapping.
///
/// Codes 0x0B-0x0F follow the TeX OT1 ligature slots.
fn win_ansi(code: u32) -> Option<&'static str> {
    static LATIN1: once_cell::sync::Lazy<Vec<String>> = once_cell::sync::Lazy::new(|| {
        (0u32..=255)
            .map(|c| char::from_u32(c).map(String::from).unwrap_or_default())
            .collect()
    });

    let text = match code {
        0x0B => "ff",
        0x0C => "fi",
        0x0D => "fl",
        0x0E => "ffi",
        0x0F => "ffl",
        0x20..=0x7E | 0xA0..=0xFF => return LATIN1.get(code as usize).map(String::as_str),
        0x80 => "\u{20ac}",
        0x82 => "\u{201a}",
        0x84 => "\u{201e}",
        0x85 => "\u{2026}",
        0x91 => "\u{2018}",
        0x92 => "\u{2019}",
        0x93 => "\u{201c}",
        0x94 => "\u{201d}",
        0x95 => "\u{2022}",
        0x96 => "\u{2013}",
        0x97 => "\u{2014}",
        0x99 => "\u{2122}",
        _ => return None,
    };
    Some(text)
}
