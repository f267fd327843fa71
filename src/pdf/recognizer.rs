//! Local PDF tokenizer producing a [`RecognitionDocument`].
//!
//! Page content streams are interpreted with `lopdf`. Only the text and
//! matrix operators matter here; paths, images and colors are ignored.

use async_trait::async_trait;
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::fonts::{lookup, number, resolve, Font, FontFamilies};
use crate::models::{Block, Line, Page, RecognitionDocument, Word};
use crate::scrapers::ScrapeError;
use crate::utils::ResourceCache;

/// Nesting limit for form XObjects
const MAX_FORM_DEPTH: usize = 4;

/// TJ adjustments beyond this many 1/1000 em read as a word break
const KERN_SPACE_THRESHOLD: f32 = 180.0;

/// Produces the positional token stream of a PDF's first pages
#[async_trait]
pub trait DocumentRecognizer: Send + Sync + std::fmt::Debug {
    /// Tokenize at most `max_pages` leading pages of the file at `path`
    async fn recognize(
        &self,
        path: &Path,
        max_pages: usize,
    ) -> Result<RecognitionDocument, ScrapeError>;
}

/// Tokenizer built on lopdf
#[derive(Debug, Clone)]
pub struct LopdfRecognizer {
    resources: Arc<ResourceCache>,
}

impl LopdfRecognizer {
    pub fn new(resources: Arc<ResourceCache>) -> Self {
        Self { resources }
    }

    /// Tokenize an in-memory PDF
    pub fn recognize_bytes(
        &self,
        bytes: &[u8],
        file_name: &str,
        max_pages: usize,
    ) -> Result<RecognitionDocument, ScrapeError> {
        let doc = Document::load_mem(bytes)?;
        let pages = doc.get_pages();

        let mut families = FontFamilies::default();
        let mut recognized = Vec::new();
        for page_id in pages.values().take(max_pages.max(1)) {
            recognized.push(tokenize_page(&doc, *page_id, &mut families, &self.resources)?);
        }

        Ok(RecognitionDocument {
            file_name: file_name.to_string(),
            total_pages: pages.len(),
            pages: recognized,
        })
    }
}

#[async_trait]
impl DocumentRecognizer for LopdfRecognizer {
    async fn recognize(
        &self,
        path: &Path,
        max_pages: usize,
    ) -> Result<RecognitionDocument, ScrapeError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let recognizer = self.clone();
        tokio::task::spawn_blocking(move || recognizer.recognize_bytes(&bytes, &file_name, max_pages))
            .await
            .map_err(|e| ScrapeError::Other(format!("PDF tokenizer task failed: {}", e)))?
    }
}

/// Affine matrix `[a b c d e f]`, row-vector convention as in PDF
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn from_operands(ops: &[f32]) -> Option<Self> {
        match ops {
            [a, b, c, d, e, f] => Some(Matrix {
                a: *a,
                b: *b,
                c: *c,
                d: *d,
                e: *e,
                f: *f,
            }),
            _ => None,
        }
    }

    fn translate(tx: f32, ty: f32) -> Self {
        Matrix {
            e: tx,
            f: ty,
            ..Self::IDENTITY
        }
    }

    /// `self × other`
    fn then(&self, o: &Matrix) -> Matrix {
        Matrix {
            a: self.a * o.a + self.b * o.c,
            b: self.a * o.b + self.b * o.d,
            c: self.c * o.a + self.d * o.c,
            d: self.c * o.b + self.d * o.d,
            e: self.e * o.a + self.f * o.c + o.e,
            f: self.e * o.b + self.f * o.d + o.f,
        }
    }
}

#[derive(Debug, Clone)]
struct TextState {
    font: Option<Arc<Font>>,
    size: f32,
    char_spacing: f32,
    word_spacing: f32,
    scaling: f32,
    leading: f32,
    rise: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            scaling: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    text: TextState,
}

/// A word being assembled from glyphs
#[derive(Debug)]
struct PendingWord {
    text: String,
    font_index: u32,
    size: f32,
    rotated: bool,
    x_min: f32,
    x_max: f32,
    baseline: f32,
}

struct PageTokenizer<'a> {
    doc: &'a Document,
    families: &'a mut FontFamilies,
    resources: &'a ResourceCache,
    fonts: HashMap<FontKey, Arc<Font>>,
    /// Page origin offset and top edge in user space
    origin_x: f32,
    top: f32,
    words: Vec<Word>,
    pending: Option<PendingWord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum FontKey {
    Ref(ObjectId),
    Name(Vec<u8>),
}

/// Walk the page tree upwards for an inheritable attribute
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut dict = doc.get_dictionary(page_id).ok()?;
    for _ in 0..32 {
        if let Some(value) = lookup(doc, dict, key) {
            return Some(value);
        }
        let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
        dict = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn tokenize_page(
    doc: &Document,
    page_id: ObjectId,
    families: &mut FontFamilies,
    resources: &ResourceCache,
) -> Result<Page, ScrapeError> {
    let media_box = match inherited(doc, page_id, b"MediaBox") {
        Some(Object::Array(items)) => items
            .iter()
            .filter_map(|o| number(resolve(doc, o)))
            .collect::<Vec<_>>(),
        _ => Vec::new(),
    };
    let [llx, lly, urx, ury] = match media_box.as_slice() {
        [a, b, c, d] => [a.min(*c), b.min(*d), a.max(*c), b.max(*d)],
        _ => [0.0, 0.0, 612.0, 792.0],
    };

    let page_resources = match inherited(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };

    let content = doc.get_page_content(page_id)?;

    let mut tokenizer = PageTokenizer {
        doc,
        families,
        resources,
        fonts: HashMap::new(),
        origin_x: llx,
        top: ury,
        words: Vec::new(),
        pending: None,
    };
    let state = GraphicsState {
        ctm: Matrix::IDENTITY,
        text: TextState::default(),
    };
    tokenizer.run(&content, page_resources, state, 0)?;
    tokenizer.flush();

    Ok(Page {
        width: urx - llx,
        height: ury - lly,
        blocks: group_blocks(group_lines(tokenizer.words)),
    })
}

impl<'a> PageTokenizer<'a> {
    fn run(
        &mut self,
        content: &[u8],
        resources: Option<&'a Dictionary>,
        mut gs: GraphicsState,
        depth: usize,
    ) -> Result<(), ScrapeError> {
        let content = Content::decode(content)?;
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut tm = Matrix::IDENTITY;
        let mut tlm = Matrix::IDENTITY;

        for op in &content.operations {
            let nums: Vec<f32> = op.operands.iter().filter_map(number).collect();
            match op.operator.as_str() {
                "q" => stack.push(gs.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        gs = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(&nums) {
                        gs.ctm = m.then(&gs.ctm);
                    }
                }
                "BT" => {
                    tm = Matrix::IDENTITY;
                    tlm = Matrix::IDENTITY;
                }
                "Tf" => {
                    if let Some(Object::Name(name)) = op.operands.first() {
                        gs.text.font = self.font(resources, name);
                    }
                    if let Some(size) = op.operands.get(1).and_then(number) {
                        gs.text.size = size;
                    }
                }
                "Tc" => gs.text.char_spacing = nums.first().copied().unwrap_or(0.0),
                "Tw" => gs.text.word_spacing = nums.first().copied().unwrap_or(0.0),
                "Tz" => gs.text.scaling = nums.first().copied().unwrap_or(100.0) / 100.0,
                "TL" => gs.text.leading = nums.first().copied().unwrap_or(0.0),
                "Ts" => gs.text.rise = nums.first().copied().unwrap_or(0.0),
                "Td" | "TD" => {
                    if let [tx, ty] = nums[..] {
                        if op.operator == "TD" {
                            gs.text.leading = -ty;
                        }
                        tlm = Matrix::translate(tx, ty).then(&tlm);
                        tm = tlm;
                    }
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(&nums) {
                        tlm = m;
                        tm = m;
                    }
                }
                "T*" => {
                    tlm = Matrix::translate(0.0, -gs.text.leading).then(&tlm);
                    tm = tlm;
                }
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = op.operands.first() {
                        self.show(bytes, &gs, &mut tm);
                    }
                }
                "'" | "\"" => {
                    if op.operator == "\"" {
                        if let [aw, ac, ..] = nums[..] {
                            gs.text.word_spacing = aw;
                            gs.text.char_spacing = ac;
                        }
                    }
                    tlm = Matrix::translate(0.0, -gs.text.leading).then(&tlm);
                    tm = tlm;
                    if let Some(Object::String(bytes, _)) = op.operands.last() {
                        self.show(bytes, &gs, &mut tm);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = op.operands.first() {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => self.show(bytes, &gs, &mut tm),
                                other => {
                                    if let Some(adjust) = number(other) {
                                        let tx = -adjust / 1000.0 * gs.text.size * gs.text.scaling;
                                        tm = Matrix::translate(tx, 0.0).then(&tm);
                                        if adjust < -KERN_SPACE_THRESHOLD {
                                            self.break_word(true);
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
                "Do" if depth < MAX_FORM_DEPTH => {
                    if let Some(Object::Name(name)) = op.operands.first() {
                        self.run_form(resources, name, &gs, depth)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn run_form(
        &mut self,
        resources: Option<&'a Dictionary>,
        name: &[u8],
        gs: &GraphicsState,
        depth: usize,
    ) -> Result<(), ScrapeError> {
        let doc = self.doc;
        let form = resources
            .and_then(|r| lookup(doc, r, b"XObject"))
            .and_then(|x| x.as_dict().ok())
            .and_then(|x| lookup(doc, x, name));
        let Some(Object::Stream(stream)) = form else {
            return Ok(());
        };
        if !matches!(lookup(doc, &stream.dict, b"Subtype"), Some(Object::Name(n)) if n == b"Form") {
            return Ok(());
        }

        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        let mut inner = gs.clone();
        if let Some(Object::Array(items)) = lookup(doc, &stream.dict, b"Matrix") {
            let nums: Vec<f32> = items.iter().filter_map(number).collect();
            if let Some(m) = Matrix::from_operands(&nums) {
                inner.ctm = m.then(&gs.ctm);
            }
        }
        let form_resources = match lookup(doc, &stream.dict, b"Resources") {
            Some(Object::Dictionary(dict)) => Some(dict),
            _ => resources,
        };

        // A broken form should not lose the rest of the page
        if let Err(e) = self.run(&data, form_resources, inner, depth + 1) {
            tracing::debug!(error = %e, "Skipping unreadable form XObject");
        }
        Ok(())
    }

    fn font(&mut self, resources: Option<&Dictionary>, name: &[u8]) -> Option<Arc<Font>> {
        let doc = self.doc;
        let fonts = resources
            .and_then(|r| lookup(doc, r, b"Font"))
            .and_then(|f| f.as_dict().ok())?;
        let raw = fonts.get(name).ok()?;
        let key = match raw {
            Object::Reference(id) => FontKey::Ref(*id),
            _ => FontKey::Name(name.to_vec()),
        };
        if let Some(font) = self.fonts.get(&key) {
            return Some(Arc::clone(font));
        }

        let dict = resolve(doc, raw).as_dict().ok()?;
        let font = Arc::new(Font::load(doc, dict, self.families, self.resources));
        self.fonts.insert(key, Arc::clone(&font));
        Some(font)
    }

    fn show(&mut self, bytes: &[u8], gs: &GraphicsState, tm: &mut Matrix) {
        let Some(font) = gs.text.font.clone() else {
            return;
        };
        let ts = &gs.text;

        for (code, text) in font.decode(bytes) {
            let render = Matrix {
                a: ts.size * ts.scaling,
                b: 0.0,
                c: 0.0,
                d: ts.size,
                e: 0.0,
                f: ts.rise,
            }
            .then(tm)
            .then(&gs.ctm);
            let size = (render.c * render.c + render.d * render.d).sqrt();
            let rotated = render.b.abs() > 1e-3 || render.c.abs() > 1e-3 || render.a < 0.0;

            let is_space = font.single_byte() && code == 32;
            let advance = (font.width(code) / 1000.0 * ts.size
                + ts.char_spacing
                + if is_space { ts.word_spacing } else { 0.0 })
                * ts.scaling;

            let device = tm.then(&gs.ctm);
            let x0 = render.e;
            let x1 = render.e + advance * device.a;
            self.push_glyph(&text, font.family_index, size, x0, x1, render.f, rotated);

            *tm = Matrix::translate(advance, 0.0).then(tm);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn push_glyph(
        &mut self,
        text: &str,
        font_index: u32,
        size: f32,
        x0: f32,
        x1: f32,
        y: f32,
        rotated: bool,
    ) {
        if text.is_empty() {
            return;
        }
        let (x0, x1) = (x0 - self.origin_x, x1 - self.origin_x);
        let baseline = self.top - y;

        if text.chars().all(char::is_whitespace) {
            self.break_word(true);
            return;
        }

        if let Some(current) = &self.pending {
            let same_style = current.font_index == font_index
                && (current.size - size).abs() < 0.05
                && current.rotated == rotated;
            let gap = x0.min(x1) - current.x_max;
            let same_line = (current.baseline - baseline).abs() < size * 0.3;
            let continues = if rotated {
                same_style
            } else {
                same_style && same_line && gap > -size * 0.5 && gap < size * 0.15
            };
            if !continues {
                let spaced = !rotated && same_line && gap >= size * 0.15;
                self.break_word(spaced);
            }
        }

        match &mut self.pending {
            Some(current) => {
                current.text.push_str(text);
                current.x_min = current.x_min.min(x0.min(x1));
                current.x_max = current.x_max.max(x0.max(x1));
            }
            None => {
                self.pending = Some(PendingWord {
                    text: text.to_string(),
                    font_index,
                    size,
                    rotated,
                    x_min: x0.min(x1),
                    x_max: x0.max(x1),
                    baseline,
                });
            }
        }
    }

    /// End the current word; `spaced` records a following space
    fn break_word(&mut self, spaced: bool) {
        let had_pending = self.pending.is_some();
        self.flush();
        if spaced && had_pending {
            if let Some(last) = self.words.last_mut() {
                last.space_after = last.space_after.max(1);
            }
        } else if spaced {
            // Extra spaces after an already finished word
            if let Some(last) = self.words.last_mut() {
                last.space_after += 1;
            }
        }
    }

    fn flush(&mut self) {
        if let Some(word) = self.pending.take() {
            self.words.push(Word {
                text: word.text,
                font_size: word.size,
                space_after: 0,
                rotated: word.rotated,
                font_index: word.font_index,
                x_min: word.x_min,
                y_min: word.baseline - word.size * 0.8,
                x_max: word.x_max,
                y_max: word.baseline + word.size * 0.2,
                baseline: word.baseline,
            });
        }
    }
}

/// Group words into lines in stream order
fn group_lines(words: Vec<Word>) -> Vec<Line> {
    let mut lines: Vec<Line> = Vec::new();
    for word in words {
        let continues = lines
            .last()
            .and_then(|l| l.words.last())
            .is_some_and(|prev| same_line(prev, &word));
        match lines.last_mut() {
            Some(line) if continues => line.words.push(word),
            _ => lines.push(Line { words: vec![word] }),
        }
    }
    lines
}

fn same_line(prev: &Word, word: &Word) -> bool {
    if prev.rotated != word.rotated {
        return false;
    }
    let size = prev.font_size.min(word.font_size).max(1.0);
    if word.rotated {
        (prev.x_min - word.x_min).abs() < size * 0.5
    } else {
        (prev.baseline - word.baseline).abs() < size * 0.5 && word.x_min >= prev.x_max - size
    }
}

/// Split lines into blocks at large vertical gaps
fn group_blocks(lines: Vec<Line>) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    let mut prev: Option<(f32, f32, bool)> = None;
    for line in lines {
        let Some(first) = line.words.first() else {
            continue;
        };
        let key = (first.baseline, first.font_size, first.rotated);
        let new_block = match prev {
            Some((baseline, size, rotated)) => {
                rotated != key.2 || (key.0 - baseline).abs() > size.max(key.1) * 2.0
            }
            None => true,
        };
        prev = Some(key);

        match blocks.last_mut() {
            Some(block) if !new_block => block.lines.push(line),
            _ => blocks.push(Block { lines: vec![line] }),
        }
    }
    blocks
}
