//! PDF Sign Library
//!
//! Sign a page of a PDF by hand. This library provides functionality to:
//! - Detect the installed `pdftoppm` and pick compatible flags
//! - Rasterize one page and hand it to an interactive image editor
//! - Convert the edited image back into a single-page PDF
//! - Overlay that page onto the original, rescaling it to the original page box,
//!   and optionally drop another page
//!
//! # Example
//!
//! ```no_run
//! use pdf_sign::sign::{sign_page, SignOptions};
//! use pdf_sign::tools::SystemRunner;
//!
//! let mut options = SignOptions::new("lease.pdf");
//! options.page = 3;
//! options.delete = Some(4);
//!
//! let report = sign_page(&options, &mut SystemRunner).expect("Failed to sign");
//! println!("{}", report.output.display());
//! ```

pub mod error;
pub mod layout;
pub mod pdf;
pub mod sign;
pub mod tools;

// Re-export commonly used items
pub use error::{Error, Result};
pub use sign::{sign_page, SignOptions, SignReport};
