use crate::error::{CoreError, CoreResult};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;

/// Wrapper around the pdfium library: opens a document and rasterizes pages
/// to in-memory images. Every page is rendered in full — there is no
/// text/image hybrid classification here, unlike some pdfium wrappers.
pub struct PdfEngine {
    pdfium: Pdfium,
}

impl PdfEngine {
    /// Load the pdfium library, checking the system path first and falling
    /// back to a copy alongside the binary.
    pub fn new() -> CoreResult<Self> {
        let bindings = Pdfium::bind_to_system_library()
            .or_else(|_| Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(".")))
            .map_err(|e| {
                CoreError::Pdfium(format!(
                    "failed to load pdfium library: {e}\n\
                     install pdfium (e.g. from https://github.com/bblanchon/pdfium-binaries/releases) \
                     and place libpdfium alongside the binary or on the system library path"
                ))
            })?;
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }

    /// Open a PDF document from a file path.
    pub fn open_document<'a>(&'a self, path: &Path) -> CoreResult<PdfDocument<'a>> {
        self.pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| CoreError::Input(format!("failed to open PDF '{}': {e}", path.display())))
    }

    /// Total page count of an already-open document.
    pub fn page_count(doc: &PdfDocument) -> u32 {
        doc.pages().len() as u32
    }

    /// Rasterize a single page to an RGB image at the given DPI.
    ///
    /// `dpi / 72.0` is the scale factor applied to the page's point
    /// dimensions, matching how pdfium itself defines a "point".
    pub fn render_page(page: &PdfPage, dpi: f32) -> CoreResult<DynamicImage> {
        let scale = dpi / 72.0;
        let width = (page.width().value * scale).round() as i32;
        let height = (page.height().value * scale).round() as i32;

        let config = PdfRenderConfig::new()
            .set_target_width(width.max(1))
            .set_target_height(height.max(1));

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| CoreError::Image(format!("failed to render page: {e}")))?;

        Ok(bitmap.as_image())
    }

    /// Render every page of a document in order.
    pub fn render_all_pages(doc: &PdfDocument, dpi: f32) -> CoreResult<Vec<DynamicImage>> {
        doc.pages()
            .iter()
            .map(|page| Self::render_page(&page, dpi))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_matches_dpi_over_72() {
        // Pure arithmetic check, independent of pdfium being installed in
        // the test environment.
        let dpi = 144.0_f32;
        let scale = dpi / 72.0;
        assert_eq!(scale, 2.0);
    }
}
