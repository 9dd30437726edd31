//! Error types for the PDF signing library

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Remediation shown when ImageMagick refuses to write PDFs.
pub const CONVERT_POLICY_HINT: &str = "By default, ImageMagick convert will throw an error:
convert: not authorized `pdftoppm_temp.pdf' @ error/constitute.c/WriteImage/1028.
To fix this, edit /etc/ImageMagick-6/policy.xml (as root) and change
<policy domain=\"coder\" rights=\"none\" pattern=\"PDF\" />
to
<policy domain=\"coder\" rights=\"write\" pattern=\"PDF\" />";

/// Main error type for the PDF signing library
#[derive(Error, Debug)]
pub enum Error {
    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Invalid PDF (no pages)
    #[error("PDF has no pages: {}", .0.display())]
    EmptyPdf(PathBuf),

    /// The rasterizer printed a version banner we could not parse
    #[error("Unrecognized pdftoppm version banner: {0:?}")]
    VersionBanner(String),

    /// An external program could not be started
    #[error("Failed to run {tool}: {source}")]
    ToolLaunch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// An external program exited unsuccessfully
    #[error("{tool} failed ({})", describe_status(.status))]
    ToolFailed { tool: String, status: Option<i32> },

    /// The image-to-PDF converter failed, usually because of its security policy
    #[error("Converting the edited image to PDF failed ({}).\n{}", describe_status(.status), CONVERT_POLICY_HINT)]
    ConversionRefused { status: Option<i32> },

    /// A tool reported success but the file it should have written is absent
    #[error("Expected output file was not created: {}", .0.display())]
    MissingOutput(PathBuf),

    /// The converted PDF does not hold exactly one page
    #[error("Expected a single page in {}, found {count}", .path.display())]
    UnexpectedPageCount { path: PathBuf, count: usize },

    /// Requested page is beyond the end of the document
    #[error("Page {page} is out of range (document has {count} pages)")]
    PageOutOfRange { page: u32, count: usize },

    /// Page numbers are 1-based
    #[error("Invalid page number {0}: pages are numbered from 1")]
    InvalidPageNumber(u32),

    /// Editor command line was blank
    #[error("Editor command is empty")]
    EmptyCommand,

    /// General error
    #[error("{0}")]
    General(String),
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}
