//! Title and identifier heuristics over a recognized first page.
//!
//! Lines are clustered by font size. Text set in the largest size is the
//! title candidate, text in the next size down is the runner-up used when the
//! largest text is clearly not a title (a lone page number, a journal banner,
//! an arXiv stamp).

use crate::models::{Page, RecognitionDocument};
use crate::utils::collapse_whitespace;

use super::identifiers::{extract_arxiv, extract_doi};

/// Two positions closer than this (in points) count as aligned
const ALIGN_TOLERANCE: f32 = 1.0;

/// Candidates starting with these (lower-cased) are banners, not titles
const NON_TITLE_PREFIXES: [&str; 3] = ["arxiv", "journal of", "proceedings of"];

const ICLR_MARKER: &str = "ICLR";
/// ICLR titles are set in small caps: capitals at one size, the rest smaller
const ICLR_TITLE_SIZE: f32 = 17.2;
const ICLR_SMALL_CAPS_SIZE: f32 = 13.8;
const ICLR_SIZE_TOLERANCE: f32 = 0.3;

/// Fields recovered from page geometry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutExtraction {
    pub title: Option<String>,
    pub arxiv: Option<String>,
    pub doi: Option<String>,
}

/// One tokenizer line reduced to what clustering needs
#[derive(Debug, Clone)]
struct Sentence {
    text: String,
    size: f32,
    font_index: u32,
    top_y: f32,
    right_x: f32,
    line_index: usize,
}

/// How consecutive same-size lines relate on the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    /// Same top edge: one visual line split by the tokenizer
    Row,
    /// Same right edge: stacked lines
    Column,
    Unknown,
}

/// Run the heuristic over the first page of a document
pub fn extract_layout(document: &RecognitionDocument) -> LayoutExtraction {
    let Some(page) = document.first_page() else {
        return LayoutExtraction::default();
    };

    let fulltext = page_fulltext(page);
    let title = if has_iclr_marker(page) {
        iclr_title(page).or_else(|| ranked_title(page))
    } else {
        ranked_title(page)
    };

    LayoutExtraction {
        title,
        arxiv: extract_arxiv(&fulltext),
        doi: extract_doi(&fulltext),
    }
}

/// Plain text of a page, one tokenizer line per text line, rotated text included
pub fn page_fulltext(page: &Page) -> String {
    page.lines()
        .map(|line| {
            line.words
                .iter()
                .map(|w| w.text_with_spacing())
                .collect::<String>()
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn sentences(page: &Page) -> Vec<Sentence> {
    let mut out = Vec::new();
    for (line_index, line) in page.lines().enumerate() {
        let words: Vec<_> = line.words.iter().filter(|w| !w.rotated).collect();
        let Some(largest) = words
            .iter()
            .copied()
            .reduce(|best, w| if w.font_size > best.font_size { w } else { best })
        else {
            continue;
        };

        out.push(Sentence {
            text: words.iter().map(|w| w.text_with_spacing()).collect(),
            size: largest.font_size,
            font_index: largest.font_index,
            top_y: words.iter().map(|w| w.y_min).fold(f32::INFINITY, f32::min),
            right_x: words.iter().map(|w| w.x_max).fold(f32::NEG_INFINITY, f32::max),
            line_index,
        });
    }
    out
}

/// Font sizes compared at 0.1pt resolution
fn size_key(size: f32) -> i32 {
    (size * 10.0).round() as i32
}

fn ranked_title(page: &Page) -> Option<String> {
    let sentences = sentences(page);

    let mut keys: Vec<i32> = sentences.iter().map(|s| size_key(s.size)).collect();
    keys.sort_unstable_by(|a, b| b.cmp(a));
    keys.dedup();

    let largest = keys.first().and_then(|k| accumulate(&sentences, *k));
    let second = keys.get(1).and_then(|k| accumulate(&sentences, *k));
    select_title(largest, second)
        .map(|title| collapse_whitespace(&title))
        .filter(|title| !title.is_empty())
}

/// Concatenate every sentence of one size class in encounter order.
///
/// A sentence extends the previous one with a space only when it is the very
/// next line, uses the same font, and the flow is row-aligned. Anything else
/// starts a new line in the candidate.
fn accumulate(sentences: &[Sentence], key: i32) -> Option<String> {
    let mut text = String::new();
    let mut prev: Option<&Sentence> = None;
    let mut flow = Flow::Unknown;

    for sentence in sentences.iter().filter(|s| size_key(s.size) == key) {
        let fragment = collapse_whitespace(&sentence.text);
        if fragment.is_empty() {
            continue;
        }

        if let Some(p) = prev {
            let contiguous =
                sentence.line_index == p.line_index + 1 && sentence.font_index == p.font_index;
            let joined_as_row = contiguous && {
                let observed = if (sentence.top_y - p.top_y).abs() <= ALIGN_TOLERANCE {
                    Flow::Row
                } else if (sentence.right_x - p.right_x).abs() <= ALIGN_TOLERANCE {
                    Flow::Column
                } else {
                    Flow::Unknown
                };
                if observed != Flow::Unknown {
                    flow = observed;
                }
                flow == Flow::Row
            };

            text.push(if joined_as_row { ' ' } else { '\n' });
        }
        text.push_str(&fragment);
        prev = Some(sentence);
    }

    (!text.is_empty()).then_some(text)
}

/// Choose between the largest and second-largest candidates.
///
/// Candidates may span several lines; a line break separates words just like
/// a space does.
pub fn select_title(largest: Option<String>, second: Option<String>) -> Option<String> {
    let largest = largest.filter(|t| !t.is_empty())?;
    if is_implausible_title(&largest) {
        second.filter(|t| !t.is_empty())
    } else {
        Some(largest)
    }
}

fn is_implausible_title(candidate: &str) -> bool {
    let lower = candidate.to_lowercase();
    candidate.chars().count() == 1
        || (!is_cjk(candidate) && !candidate.contains(char::is_whitespace))
        || NON_TITLE_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Whether most letters of `text` are Chinese, Japanese or Korean
pub fn is_cjk(text: &str) -> bool {
    let (letters, cjk) = text
        .chars()
        .filter(|c| c.is_alphabetic())
        .fold((0usize, 0usize), |(letters, cjk), c| {
            (letters + 1, cjk + usize::from(is_cjk_char(c)))
        });
    letters > 0 && cjk * 2 >= letters
}

fn is_cjk_char(c: char) -> bool {
    matches!(
        c as u32,
        0x4E00..=0x9FFF      // CJK unified ideographs
            | 0x3400..=0x4DBF
            | 0x20000..=0x2A6DF
            | 0xF900..=0xFAFF
            | 0x3040..=0x309F // hiragana
            | 0x30A0..=0x30FF // katakana
            | 0x1100..=0x11FF // hangul jamo
            | 0xAC00..=0xD7AF
    )
}

fn has_iclr_marker(page: &Page) -> bool {
    page.words().any(|w| w.text.contains(ICLR_MARKER))
}

fn near(size: f32, target: f32) -> bool {
    (size - target).abs() <= ICLR_SIZE_TOLERANCE
}

/// Lower-case a small-caps run; a letter right after a hyphen keeps its case
fn small_caps_to_lower(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut after_hyphen = false;
    for c in text.chars() {
        if after_hyphen {
            out.push(c);
        } else {
            out.extend(c.to_lowercase());
        }
        after_hyphen = c == '-';
    }
    out
}

fn iclr_title(page: &Page) -> Option<String> {
    let mut out = String::new();
    let mut last_line = None;

    for (line_index, line) in page.lines().enumerate() {
        for word in line.words.iter().filter(|w| !w.rotated) {
            let capital = near(word.font_size, ICLR_TITLE_SIZE);
            let small = near(word.font_size, ICLR_SMALL_CAPS_SIZE);
            if !capital && !small {
                continue;
            }

            if last_line.is_some_and(|l| l != line_index) {
                out.truncate(out.trim_end().len());
                // Hyphenated line ends continue without a space
                if !out.ends_with('-') {
                    out.push(' ');
                }
            }
            last_line = Some(line_index);

            if small {
                out.push_str(&small_caps_to_lower(&word.text));
            } else {
                out.push_str(&word.text);
            }
            out.extend(std::iter::repeat(' ').take(word.space_after as usize));
        }
    }

    let title = collapse_whitespace(&out);
    (!title.is_empty()).then_some(title)
}
