//! Content-stream interpreter driving layout callbacks

use super::font::{Font, FontCache, FontKey};
use super::object::{
    display_name, lookup, lookup_array, lookup_dict, lookup_name, number, stream_bytes,
};
use crate::error::{Error, Result};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::sync::Arc;

/// Deepest Form XObject nesting that is still interpreted
const MAX_FORM_DEPTH: usize = 8;

/// Page-tree levels searched for inherited resources
const MAX_TREE_DEPTH: usize = 32;

/// Receives layout events in content-stream order
pub(crate) trait LayoutSink {
    /// A `TJ` adjustment moved the pen right by `gap` thousandths of text space
    fn gap(&mut self, gap: f64, space_width: f64);

    /// The text cursor moved to a new line
    fn line_break(&mut self);

    /// A glyph with resolved text was shown at device-space x
    fn glyph(&mut self, x: f64, text: &str);
}

/// Affine transform `[a b c d e f]` in PDF's row-vector convention
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub(crate) const IDENTITY: Matrix = Matrix::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    pub(crate) const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub(crate) const fn translation(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    fn from_values([a, b, c, d, e, f]: [f64; 6]) -> Self {
        Self::new(a, b, c, d, e, f)
    }

    /// `self × other`: applies `self` first, then `other`
    pub(crate) fn multiply(&self, other: &Matrix) -> Matrix {
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

#[derive(Debug, Clone)]
struct TextState {
    font: Option<Arc<Font>>,
    size: f64,
    char_spacing: f64,
    word_spacing: f64,
    /// Horizontal scaling as a factor (`Tz` / 100)
    scale: f64,
    leading: f64,
    rise: f64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            scale: 1.0,
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

/// Interprets the content streams of one page
pub(crate) struct Interpreter<'a, S> {
    doc: &'a Document,
    fonts: &'a mut FontCache,
    sink: &'a mut S,
    page: u32,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    tm: Matrix,
    tlm: Matrix,
}

impl<'a, S: LayoutSink> Interpreter<'a, S> {
    pub(crate) fn new(
        doc: &'a Document,
        fonts: &'a mut FontCache,
        sink: &'a mut S,
        page: u32,
    ) -> Self {
        Self {
            doc,
            fonts,
            sink,
            page,
            state: GraphicsState {
                ctm: Matrix::IDENTITY,
                text: TextState::default(),
            },
            stack: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
        }
    }

    /// Interpret every content stream of a page
    pub(crate) fn run_page(&mut self, page_id: ObjectId) -> Result<()> {
        let content = self
            .doc
            .get_page_content(page_id)
            .map_err(|e| self.page_error(format!("unreadable content stream: {}", e)))?;
        let resources = page_resources(self.doc, page_id);
        self.run(&content, resources, 0)
    }

    fn run(
        &mut self,
        content: &[u8],
        resources: Option<&'a Dictionary>,
        depth: usize,
    ) -> Result<()> {
        let content = Content::decode(content)
            .map_err(|e| self.page_error(format!("undecodable content stream: {}", e)))?;
        for operation in &content.operations {
            self.apply(operation, resources, depth)?;
        }
        Ok(())
    }

    fn apply(
        &mut self,
        op: &Operation,
        resources: Option<&'a Dictionary>,
        depth: usize,
    ) -> Result<()> {
        match op.operator.as_str() {
            "q" => self.stack.push(self.state.clone()),
            "Q" => match self.stack.pop() {
                Some(state) => self.state = state,
                None => tracing::trace!(page = self.page, "unbalanced Q ignored"),
            },
            "cm" => {
                let m = Matrix::from_values(self.numbers(op)?);
                self.state.ctm = m.multiply(&self.state.ctm);
            }
            "BT" => {
                self.tm = Matrix::IDENTITY;
                self.tlm = Matrix::IDENTITY;
            }
            "Tf" => {
                let name = op
                    .operands
                    .first()
                    .and_then(|o| o.as_name().ok())
                    .ok_or_else(|| self.malformed(op))?;
                let size = op.operands.get(1).and_then(number).ok_or_else(|| self.malformed(op))?;
                self.state.text.font = self.load_font(resources, name);
                self.state.text.size = size;
            }
            "Tc" => self.state.text.char_spacing = self.numbers::<1>(op)?[0],
            "Tw" => self.state.text.word_spacing = self.numbers::<1>(op)?[0],
            "Tz" => self.state.text.scale = self.numbers::<1>(op)?[0] / 100.0,
            "TL" => self.state.text.leading = self.numbers::<1>(op)?[0],
            "Ts" => self.state.text.rise = self.numbers::<1>(op)?[0],
            "Td" => {
                let [tx, ty] = self.numbers::<2>(op)?;
                self.move_line(tx, ty);
            }
            "TD" => {
                let [tx, ty] = self.numbers::<2>(op)?;
                self.state.text.leading = -ty;
                self.move_line(tx, ty);
            }
            "Tm" => {
                self.tlm = Matrix::from_values(self.numbers(op)?);
                self.tm = self.tlm;
                self.sink.line_break();
            }
            "T*" => self.next_line(),
            "Tj" => {
                let bytes = string_operand(op, 0).ok_or_else(|| self.malformed(op))?;
                self.show(bytes);
            }
            "'" => {
                let bytes = string_operand(op, 0).ok_or_else(|| self.malformed(op))?;
                self.next_line();
                self.show(bytes);
            }
            "\"" => {
                let [word_spacing, char_spacing] = self.numbers::<2>(op)?;
                let bytes = string_operand(op, 2).ok_or_else(|| self.malformed(op))?;
                self.state.text.word_spacing = word_spacing;
                self.state.text.char_spacing = char_spacing;
                self.next_line();
                self.show(bytes);
            }
            "TJ" => {
                let elements = op
                    .operands
                    .first()
                    .and_then(|o| o.as_array().ok())
                    .ok_or_else(|| self.malformed(op))?;
                for element in elements {
                    match element {
                        Object::String(bytes, _) => self.show(bytes),
                        other => {
                            if let Some(adjustment) = number(other) {
                                self.adjust(adjustment);
                            }
                        }
                    }
                }
            }
            "Do" => {
                let name = op
                    .operands
                    .first()
                    .and_then(|o| o.as_name().ok())
                    .ok_or_else(|| self.malformed(op))?;
                self.invoke_xobject(resources, name, depth)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn numbers<const N: usize>(&self, op: &Operation) -> Result<[f64; N]> {
        if op.operands.len() < N {
            return Err(self.malformed(op));
        }
        let mut values = [0.0; N];
        for (slot, operand) in values.iter_mut().zip(&op.operands) {
            *slot = number(operand).ok_or_else(|| self.malformed(op))?;
        }
        Ok(values)
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.tlm = Matrix::translation(tx, ty).multiply(&self.tlm);
        self.tm = self.tlm;
        self.sink.line_break();
    }

    fn next_line(&mut self) {
        let leading = self.state.text.leading;
        self.move_line(0.0, -leading);
    }

    fn show(&mut self, bytes: &[u8]) {
        let Some(font) = self.state.text.font.clone() else {
            tracing::trace!(page = self.page, "text shown without a font");
            return;
        };

        for glyph in font.glyphs(bytes) {
            let ts = &self.state.text;
            let trm = Matrix::new(ts.size * ts.scale, 0.0, 0.0, ts.size, 0.0, ts.rise)
                .multiply(&self.tm)
                .multiply(&self.state.ctm);

            let mut spacing = ts.char_spacing;
            if glyph.code == 32 && glyph.single_byte {
                spacing += ts.word_spacing;
            }
            let tx = (font.width(&glyph) / 1000.0 * ts.size + spacing) * ts.scale;

            let text = font.text(self.doc, &glyph);
            if !text.is_empty() {
                self.sink.glyph(trm.e, &text);
            }
            self.tm = Matrix::translation(tx, 0.0).multiply(&self.tm);
        }
    }

    /// Numeric `TJ` element: shifts the pen left by `adjustment` thousandths
    fn adjust(&mut self, adjustment: f64) {
        let ts = &self.state.text;
        let tx = -adjustment / 1000.0 * ts.size * ts.scale;
        self.tm = Matrix::translation(tx, 0.0).multiply(&self.tm);

        if let Some(font) = &ts.font {
            let space_width = font.space_width(self.doc);
            self.sink.gap(-adjustment, space_width);
        }
    }

    fn load_font(&mut self, resources: Option<&'a Dictionary>, name: &[u8]) -> Option<Arc<Font>> {
        let doc = self.doc;
        let fonts = resources.and_then(|r| lookup_dict(doc, r, b"Font"));
        let entry = fonts.and_then(|fonts| fonts.get(name).ok());

        let loaded = match entry {
            Some(Object::Reference(id)) => match doc.get_dictionary(*id) {
                Ok(dict) => Some(self.fonts.get_or_load(doc, FontKey::Object(*id), dict)),
                Err(_) => None,
            },
            Some(Object::Dictionary(dict)) => {
                let key = FontKey::Inline {
                    page: self.page,
                    name: name.to_vec(),
                };
                Some(self.fonts.get_or_load(doc, key, dict))
            }
            _ => None,
        };

        if loaded.is_none() {
            tracing::warn!(page = self.page, font = %display_name(name), "font resource not found");
        }
        loaded
    }

    fn invoke_xobject(
        &mut self,
        resources: Option<&'a Dictionary>,
        name: &[u8],
        depth: usize,
    ) -> Result<()> {
        if depth >= MAX_FORM_DEPTH {
            tracing::trace!(page = self.page, depth, "form nesting limit reached");
            return Ok(());
        }

        let doc = self.doc;
        let xobject = resources
            .and_then(|r| lookup_dict(doc, r, b"XObject"))
            .and_then(|xobjects| lookup(doc, xobjects, name));
        let Some(Object::Stream(form)) = xobject else {
            tracing::trace!(page = self.page, xobject = %display_name(name), "XObject not found");
            return Ok(());
        };
        if lookup_name(doc, &form.dict, b"Subtype") != Some(&b"Form"[..]) {
            return Ok(());
        }

        let matrix = lookup_array(doc, &form.dict, b"Matrix")
            .and_then(|values| {
                let values: Vec<f64> = values.iter().filter_map(number).collect();
                <[f64; 6]>::try_from(values).ok()
            })
            .map_or(Matrix::IDENTITY, Matrix::from_values);
        let form_resources = lookup_dict(doc, &form.dict, b"Resources").or(resources);
        let content = stream_bytes(form);

        let saved_state = self.state.clone();
        let saved_depth = self.stack.len();
        let (saved_tm, saved_tlm) = (self.tm, self.tlm);

        self.state.ctm = matrix.multiply(&self.state.ctm);
        let result = self.run(&content, form_resources, depth + 1);

        self.state = saved_state;
        self.stack.truncate(saved_depth);
        self.tm = saved_tm;
        self.tlm = saved_tlm;
        result
    }

    fn page_error(&self, reason: String) -> Error {
        Error::PageParse {
            page: self.page,
            reason,
        }
    }

    fn malformed(&self, op: &Operation) -> Error {
        self.page_error(format!("malformed operands for '{}'", op.operator))
    }
}

fn string_operand(op: &Operation, index: usize) -> Option<&[u8]> {
    match op.operands.get(index)? {
        Object::String(bytes, _) => Some(bytes),
        _ => None,
    }
}

/// Resources of a page, inherited through the page tree when absent
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Some(resources) = lookup_dict(doc, node, b"Resources") {
            return Some(resources);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}
