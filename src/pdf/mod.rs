//! PDF manipulation module

pub mod pages;
pub mod overlay;

// Re-export commonly used items
pub use pages::{count_pages, media_box, page_rotation};
pub use overlay::{sign_document, AssemblyReport, PageAction, SignPlan};
