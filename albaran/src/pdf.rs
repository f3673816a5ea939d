//! Delivery note PDF rendering.
//!
//! [`render`] is a pure projection of a note and its related records into an A4 document using
//! the built-in Helvetica font. [`write_pdf`] stores the result under the configured PDF
//! directory. Signature images that cannot be decoded are logged and left out; the document is
//! still produced.

use crate::db::models::delivery_notes::{DeliveryNoteDBResponse, DeliveryNoteItem};
use crate::errors::{Error, Result};
use crate::types::{DeliveryNoteId, abbrev_uuid};
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
};
use std::path::{Path, PathBuf};
use tracing::{instrument, warn};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN_LEFT: f32 = 20.0;
const TOP: f32 = 277.0;
const BOTTOM: f32 = 20.0;
const LINE_HEIGHT: f32 = 7.0;
const SIGNATURE_WIDTH_MM: f32 = 53.0;
const IMAGE_DPI: f32 = 300.0;

/// Shown in place of related records that no longer exist.
const MISSING: &str = "-";

/// The signature block of a note.
#[derive(Debug, Clone)]
pub enum Signature {
    /// The note is not signed; no block is drawn
    Unsigned,
    /// The note is signed but the image file is gone
    Missing,
    /// Raw bytes of the stored image
    Image(Vec<u8>),
}

/// Everything drawn on the document, with related records already resolved.
#[derive(Debug, Clone)]
pub struct NoteDocument<'a> {
    pub note: &'a DeliveryNoteDBResponse,
    pub project_name: Option<&'a str>,
    pub client_name: Option<&'a str>,
    pub client_email: Option<&'a str>,
    pub client_address: Option<&'a str>,
    pub creator_email: Option<&'a str>,
    pub signature: Signature,
}

/// `<n>. [<tipo>] <descripcion> - Quantity: <q>` plus hours and price when present.
pub fn item_line(index: usize, item: &DeliveryNoteItem) -> String {
    let mut line = format!(
        "{}. [{}] {} - Quantity: {}",
        index + 1,
        item.kind,
        item.description,
        item.quantity
    );
    if let Some(hours) = item.hours {
        line.push_str(&format!(" - Hours: {hours}"));
    }
    if let Some(price) = item.price {
        line.push_str(&format!(" - Price: {price}"));
    }
    line
}

/// Top-to-bottom text cursor that starts a new page when the current one is full.
struct PageWriter {
    doc: PdfDocumentReference,
    font: IndirectFontRef,
    bold: IndirectFontRef,
    layer: PdfLayerReference,
    y: f32,
    pages: usize,
}

impl PageWriter {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?;
        let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_error)?;
        let layer = doc.get_page(page).get_layer(layer);

        Ok(Self {
            doc,
            font,
            bold,
            layer,
            y: TOP,
            pages: 1,
        })
    }

    /// Make room for `height` millimetres, breaking the page if needed.
    fn reserve(&mut self, height: f32) {
        if self.y - height < BOTTOM {
            self.pages += 1;
            let (page, layer) = self
                .doc
                .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), format!("Layer {}", self.pages));
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = TOP;
        }
    }

    fn line(&mut self, text: &str, size: f32) {
        self.reserve(LINE_HEIGHT);
        self.layer.use_text(text, size, Mm(MARGIN_LEFT), Mm(self.y), &self.font);
        self.y -= LINE_HEIGHT;
    }

    fn heading(&mut self, text: &str, size: f32) {
        self.reserve(LINE_HEIGHT * 2.0);
        self.layer.use_text(text, size, Mm(MARGIN_LEFT), Mm(self.y), &self.bold);
        self.y -= LINE_HEIGHT * 2.0;
    }

    fn gap(&mut self) {
        self.y -= LINE_HEIGHT / 2.0;
    }

    fn signature(&mut self, bytes: &[u8], note_id: &DeliveryNoteId) {
        let image = match printpdf::image_crate::load_from_memory(bytes) {
            Ok(image) => image,
            Err(e) => {
                warn!(note_id = %abbrev_uuid(note_id), "could not decode signature image: {e}");
                return;
            }
        };

        let (width_px, height_px) = (image.width().max(1) as f32, image.height().max(1) as f32);
        let natural_width_mm = width_px / IMAGE_DPI * 25.4;
        let scale = SIGNATURE_WIDTH_MM / natural_width_mm;
        let height_mm = height_px / IMAGE_DPI * 25.4 * scale;

        self.reserve(height_mm);
        let bottom = self.y - height_mm;
        Image::from_dynamic_image(&image).add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(MARGIN_LEFT)),
                translate_y: Some(Mm(bottom)),
                scale_x: Some(scale),
                scale_y: Some(scale),
                dpi: Some(IMAGE_DPI),
                ..Default::default()
            },
        );
        self.y = bottom - LINE_HEIGHT;
    }

    fn finish(self) -> Result<Vec<u8>> {
        self.doc.save_to_bytes().map_err(pdf_error)
    }
}

fn pdf_error(e: impl std::fmt::Display) -> Error {
    Error::Internal {
        operation: format!("render PDF: {e}"),
    }
}

/// Render a delivery note to PDF bytes.
#[instrument(skip(document), fields(note_id = %abbrev_uuid(&document.note.id), items = document.note.items.len()), err)]
pub fn render(document: &NoteDocument<'_>) -> Result<Vec<u8>> {
    let note = document.note;
    let mut writer = PageWriter::new(&format!("albaran-{}", note.id))?;

    writer.heading("Delivery note", 20.0);
    writer.line(&format!("Project: {}", document.project_name.unwrap_or(MISSING)), 12.0);
    writer.line(&format!("Client: {}", document.client_name.unwrap_or(MISSING)), 12.0);
    writer.line(&format!("Email: {}", document.client_email.unwrap_or(MISSING)), 12.0);
    writer.line(&format!("Address: {}", document.client_address.unwrap_or(MISSING)), 12.0);
    writer.line(&format!("Created by: {}", document.creator_email.unwrap_or(MISSING)), 12.0);
    writer.line(&format!("Date: {}", note.issued_at.format("%d/%m/%Y")), 12.0);
    writer.gap();

    writer.heading("Items:", 14.0);
    for (index, item) in note.items.iter().enumerate() {
        writer.line(&item_line(index, item), 11.0);
    }

    match &document.signature {
        Signature::Unsigned => {}
        Signature::Missing => {
            writer.gap();
            writer.heading("Client signature:", 14.0);
            writer.line("Signature not found", 11.0);
        }
        Signature::Image(bytes) => {
            writer.gap();
            writer.heading("Client signature:", 14.0);
            writer.signature(bytes, &note.id);
        }
    }

    writer.finish()
}

/// File name of a note's PDF, e.g. `albaran-<id>.pdf`.
pub fn pdf_file_name(note_id: &DeliveryNoteId) -> String {
    format!("albaran-{note_id}.pdf")
}

/// Write rendered bytes to `<dir>/albaran-<id>.pdf`, replacing any previous render.
#[instrument(skip(bytes), fields(note_id = %abbrev_uuid(note_id), size = bytes.len()), err)]
pub async fn write_pdf(dir: &Path, note_id: &DeliveryNoteId, bytes: &[u8]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| Error::Internal {
        operation: format!("create PDF directory {}: {e}", dir.display()),
    })?;

    let path = dir.join(pdf_file_name(note_id));
    tokio::fs::write(&path, bytes).await.map_err(|e| Error::Internal {
        operation: format!("write PDF {}: {e}", path.display()),
    })?;

    Ok(path)
}
