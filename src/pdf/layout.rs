use std::collections::BTreeMap;

use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use tracing::debug;

use crate::error::{PriceError, Result};
use crate::models::PositionedToken;

// ── Layout seam ───────────────────────────────────────────────────────────────

/// Turns document bytes into something that can be read page by page.
pub trait LayoutEngine: Send + Sync {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn PageLayout>>;
}

/// An opened document. Page numbers are 1-based.
pub trait PageLayout {
    fn page_count(&self) -> usize;
    fn page_tokens(&self, page_number: u32) -> Result<Vec<PositionedToken>>;
}

// ── lopdf implementation ──────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfLayout;

impl LayoutEngine for LopdfLayout {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn PageLayout>> {
        let document = Document::load_mem(bytes)
            .map_err(|e| PriceError::MalformedDocument(format!("failed to load PDF: {e}")))?;
        Ok(Box::new(LopdfDocument { document }))
    }
}

struct LopdfDocument {
    document: Document,
}

impl PageLayout for LopdfDocument {
    fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    fn page_tokens(&self, page_number: u32) -> Result<Vec<PositionedToken>> {
        let pages = self.document.get_pages();
        let page_id = pages.get(&page_number).copied().ok_or_else(|| {
            PriceError::MalformedDocument(format!("PDF has no page {page_number}"))
        })?;
        let tokens = extract_tokens(&self.document, page_id)?;
        debug!("Page {}: {} tokens", page_number, tokens.len());
        Ok(tokens)
    }
}

// ── Content stream interpretation ─────────────────────────────────────────────

/// Affine matrix `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 };

    fn translate(tx: f64, ty: f64) -> Self {
        Matrix { e: tx, f: ty, ..Matrix::IDENTITY }
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        let v: Vec<f64> = operands.iter().map(number).collect::<Option<_>>()?;
        match v.as_slice() {
            [a, b, c, d, e, f] => Some(Matrix { a: *a, b: *b, c: *c, d: *d, e: *e, f: *f }),
            _ => None,
        }
    }

    /// `self × other`
    fn then(self, other: Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

struct TextCursor<'a> {
    ctm: Matrix,
    saved: Vec<Matrix>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    leading: f64,
    font_size: f64,
    encoding: Option<&'a str>,
}

impl<'a> TextCursor<'a> {
    fn new() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            saved: Vec::new(),
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            leading: 0.0,
            font_size: 0.0,
            encoding: None,
        }
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = Matrix::translate(tx, ty).then(self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    /// Top edge of glyphs drawn at the current text position, in user space.
    fn top_y(&self) -> f64 {
        let render = self.text_matrix.then(self.ctm);
        let glyph_height = self.font_size * (render.c * render.c + render.d * render.d).sqrt();
        render.f + glyph_height
    }
}

/// Collects shown text into whitespace-separated words. Back-to-back show
/// operators with no repositioning in between continue the same word.
#[derive(Default)]
struct WordSink {
    tokens: Vec<PositionedToken>,
    open_word: bool,
}

impl WordSink {
    fn push(&mut self, text: &str, top_y: f64) {
        if text.is_empty() {
            return;
        }
        let mut words = text.split_whitespace();
        if self.open_word && !text.starts_with(char::is_whitespace) {
            if let (Some(last), Some(first)) = (self.tokens.last_mut(), words.next()) {
                last.text.push_str(first);
            }
        }
        for word in words {
            self.tokens.push(PositionedToken::new(word, top_y));
        }
        self.open_word = !text.ends_with(char::is_whitespace);
    }

    /// The text position moved; the next fragment starts a new word.
    fn break_word(&mut self) {
        self.open_word = false;
    }
}

fn shown_text(encoding: Option<&str>, operands: &[Object]) -> String {
    let mut text = String::new();
    for operand in operands {
        match operand {
            Object::String(bytes, _) => text.push_str(&Document::decode_text(encoding, bytes)),
            Object::Array(items) => {
                for item in items {
                    match item {
                        Object::String(bytes, _) => {
                            text.push_str(&Document::decode_text(encoding, bytes));
                        }
                        // kerning wide enough to be a word gap
                        other => {
                            if number(other).is_some_and(|adj| adj < -100.0) {
                                text.push(' ');
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
    text
}

fn extract_tokens(document: &Document, page_id: ObjectId) -> Result<Vec<PositionedToken>> {
    let raw = document
        .get_page_content(page_id)
        .map_err(|e| PriceError::MalformedDocument(format!("unreadable page content: {e}")))?;
    let content = Content::decode(&raw)
        .map_err(|e| PriceError::MalformedDocument(format!("undecodable page content: {e}")))?;

    let encodings = document
        .get_page_fonts(page_id)
        .into_iter()
        .map(|(name, font)| (name, font.get_font_encoding()))
        .collect::<BTreeMap<Vec<u8>, &str>>();

    let mut cursor = TextCursor::new();
    let mut sink = WordSink::default();

    for op in &content.operations {
        let operands = op.operands.as_slice();
        match op.operator.as_str() {
            "q" => cursor.saved.push(cursor.ctm),
            "Q" => {
                if let Some(ctm) = cursor.saved.pop() {
                    cursor.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    cursor.ctm = m.then(cursor.ctm);
                }
            }
            "BT" => {
                sink.break_word();
                cursor.text_matrix = Matrix::IDENTITY;
                cursor.line_matrix = Matrix::IDENTITY;
            }
            "Tf" => {
                if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                    cursor.encoding = encodings.get(name).copied();
                }
                if let Some(size) = operands.get(1).and_then(number) {
                    cursor.font_size = size;
                }
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(number) {
                    cursor.leading = leading;
                }
            }
            "Td" | "TD" => {
                if let (Some(tx), Some(ty)) =
                    (operands.first().and_then(number), operands.get(1).and_then(number))
                {
                    sink.break_word();
                    if op.operator == "TD" {
                        cursor.leading = -ty;
                    }
                    cursor.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    sink.break_word();
                    cursor.line_matrix = m;
                    cursor.text_matrix = m;
                }
            }
            "T*" => {
                sink.break_word();
                cursor.next_line();
            }
            "Tj" | "TJ" => {
                let text = shown_text(cursor.encoding, operands);
                sink.push(&text, cursor.top_y());
            }
            "'" => {
                sink.break_word();
                cursor.next_line();
                let text = shown_text(cursor.encoding, operands);
                sink.push(&text, cursor.top_y());
            }
            "\"" => {
                sink.break_word();
                cursor.next_line();
                let text = shown_text(cursor.encoding, operands.get(2..).unwrap_or_default());
                sink.push(&text, cursor.top_y());
            }
            _ => {}
        }
    }

    Ok(sink.tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::Operation;
    use lopdf::{Stream, dictionary};

    /// One-page PDF with a Helvetica font and the given content operations.
    fn build_pdf(operations: Vec<Operation>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    fn show(text: &str) -> Operation {
        Operation::new("Tj", vec![Object::string_literal(text)])
    }

    #[test]
    fn test_tokens_carry_top_edge() {
        let bytes = build_pdf(vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
            Operation::new("Td", vec![50.into(), 400.into()]),
            show("Feb.23 Apr.23"),
            Operation::new("Td", vec![0.into(), (-20).into()]),
            show("Brutto"),
            Operation::new("ET", vec![]),
        ]);

        let layout = LopdfLayout.open(&bytes).unwrap();
        assert_eq!(layout.page_count(), 1);

        let tokens = layout.page_tokens(1).unwrap();
        assert_eq!(
            tokens,
            vec![
                PositionedToken::new("Feb.23", 410.0),
                PositionedToken::new("Apr.23", 410.0),
                PositionedToken::new("Brutto", 390.0),
            ]
        );
    }

    #[test]
    fn test_cm_and_tj_kerning() {
        let bytes = build_pdf(vec![
            Operation::new("q", vec![]),
            Operation::new("cm", vec![1.into(), 0.into(), 0.into(), 1.into(), 0.into(), 100.into()]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Tm", vec![1.into(), 0.into(), 0.into(), 1.into(), 20.into(), 200.into()]),
            Operation::new(
                "TJ",
                vec![Object::Array(vec![
                    Object::string_literal("12,"),
                    Object::Integer(-20),
                    Object::string_literal("34"),
                    Object::Integer(-400),
                    Object::string_literal("13,00"),
                ])],
            ),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ]);

        let tokens = LopdfLayout.open(&bytes).unwrap().page_tokens(1).unwrap();
        assert_eq!(
            tokens,
            vec![
                PositionedToken::new("12,34", 312.0),
                PositionedToken::new("13,00", 312.0),
            ]
        );
    }

    #[test]
    fn test_adjacent_shows_form_one_word() {
        let bytes = build_pdf(vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
            Operation::new("Td", vec![50.into(), 400.into()]),
            show("Feb."),
            show("23"),
            show(" Apr."),
            show("23 "),
            show("Mai.23"),
            Operation::new("Td", vec![0.into(), (-20).into()]),
            show("12,34"),
            Operation::new("Td", vec![40.into(), 0.into()]),
            show("13,00"),
            Operation::new("ET", vec![]),
        ]);

        let tokens = LopdfLayout.open(&bytes).unwrap().page_tokens(1).unwrap();
        let words: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(words, vec!["Feb.23", "Apr.23", "Mai.23", "12,34", "13,00"]);
        assert_eq!(tokens[0].top_y, 410.0);
        assert_eq!(tokens[3].top_y, 390.0);
    }

    #[test]
    fn test_missing_page_is_malformed() {
        let bytes = build_pdf(vec![]);
        let layout = LopdfLayout.open(&bytes).unwrap();
        assert!(matches!(layout.page_tokens(2), Err(PriceError::MalformedDocument(_))));
    }

    #[test]
    fn test_garbage_bytes_are_malformed() {
        assert!(matches!(
            LopdfLayout.open(b"definitely not a pdf"),
            Err(PriceError::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_matrix_composition() {
        let m = Matrix::translate(5.0, 7.0).then(Matrix { a: 2.0, d: 2.0, ..Matrix::IDENTITY });
        assert_eq!(m, Matrix { a: 2.0, b: 0.0, c: 0.0, d: 2.0, e: 10.0, f: 14.0 });
    }
}
