use std::path::Path;

use crate::error::AppResult;

mod hayro;
mod traits;

pub use hayro::PdfDoc;
pub use traits::{LinkTarget, OutlineEntry, PageLink, PageRect, PdfBackend, RgbaFrame, WordBox};

pub fn open_default_backend(path: impl AsRef<Path>) -> AppResult<Box<dyn PdfBackend>> {
    PdfDoc::open(path).map(|doc| Box::new(doc) as Box<dyn PdfBackend>)
}
