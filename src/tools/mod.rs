//! External programs the signing pipeline drives

pub mod runner;
pub mod pdftoppm;
pub mod editor;
pub mod convert;

// Re-export commonly used items
pub use runner::{CommandRunner, ExitState, CapturedOutput, Invocation, SystemRunner};
pub use pdftoppm::{ImageFormat, PopplerVersion, Rasterizer, RasterizerFlavor};
pub use editor::{edit_image, DEFAULT_EDITOR};
pub use convert::{image_to_pdf, DEFAULT_CONVERTER};
