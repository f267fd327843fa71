//! Recognition document: the positional token stream of a PDF's first pages.

use serde::{Deserialize, Serialize};

/// A single word token with its geometry and font attributes.
///
/// Coordinates use a top-left origin in PDF points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub text: String,
    pub font_size: f32,
    /// Number of spaces that followed this word in the source text
    pub space_after: u32,
    /// Set for any text not laid out left-to-right horizontally
    pub rotated: bool,
    /// Index of the font family, in order of first use on the document
    pub font_index: u32,
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
    pub baseline: f32,
}

impl Word {
    /// Word text followed by its trailing-space run
    pub fn text_with_spacing(&self) -> String {
        let mut s = self.text.clone();
        for _ in 0..self.space_after {
            s.push(' ');
        }
        s
    }
}

/// A line of words as grouped by the tokenizer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub words: Vec<Word>,
}

/// A block of lines
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub lines: Vec<Line>,
}

/// One page of recognized text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub width: f32,
    pub height: f32,
    pub blocks: Vec<Block>,
}

impl Page {
    /// All lines of the page in reading order
    pub fn lines(&self) -> impl Iterator<Item = &Line> {
        self.blocks.iter().flat_map(|b| b.lines.iter())
    }

    /// All words of the page in reading order
    pub fn words(&self) -> impl Iterator<Item = &Word> {
        self.lines().flat_map(|l| l.words.iter())
    }
}

/// Positional token stream of a PDF, as produced by a tokenizer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionDocument {
    pub file_name: String,
    /// Page count of the whole file, not just the recognized pages
    pub total_pages: usize,
    pub pages: Vec<Page>,
}

impl RecognitionDocument {
    /// The first page, if any text was recognized
    pub fn first_page(&self) -> Option<&Page> {
        self.pages.first()
    }

    /// Keep at most `count` pages
    pub fn truncate_pages(&mut self, count: usize) {
        self.pages.truncate(count);
    }
}
