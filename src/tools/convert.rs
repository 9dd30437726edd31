//! Turning the edited image back into a PDF with ImageMagick

use std::path::{Path, PathBuf};
use crate::error::{Error, Result};
use crate::pdf::count_pages;
use super::runner::{run_checked, CommandRunner, Invocation};

/// Converter used when none is configured
pub const DEFAULT_CONVERTER: &str = "convert";

/// Name of the single-page PDF inside the working directory
pub const SINGLE_PAGE_PDF: &str = "pdftoppm_temp.pdf";

/// Convert `image` to a one-page PDF at `<workdir>/pdftoppm_temp.pdf`
///
/// A failing converter is almost always ImageMagick's security policy
/// forbidding PDF output, so the error carries the policy fix.
/// The result must exist and hold exactly one page.
pub fn image_to_pdf<R: CommandRunner + ?Sized>(
    runner: &mut R,
    converter: &str,
    image: &Path,
    workdir: &Path,
) -> Result<PathBuf> {
    let pdf_path = workdir.join(SINGLE_PAGE_PDF);
    let invocation = Invocation::new(converter).arg(image).arg(&pdf_path);
    log::info!("converting edited image: {}", invocation);

    match run_checked(runner, &invocation) {
        Ok(()) => {}
        Err(Error::ToolFailed { status, .. }) => return Err(Error::ConversionRefused { status }),
        Err(e) => return Err(e),
    }

    if !pdf_path.exists() {
        return Err(Error::MissingOutput(pdf_path));
    }

    let count = count_pages(&pdf_path).or_else(|e| match e {
        Error::EmptyPdf(_) => Ok(0),
        other => Err(other),
    })?;
    if count != 1 {
        return Err(Error::UnexpectedPageCount { path: pdf_path, count });
    }

    Ok(pdf_path)
}
