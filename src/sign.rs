//! The signing pipeline: rasterize, edit, convert, merge
//!
//! [`sign_page`] runs the four stages in order against explicit
//! [`SignOptions`]. Every external program goes through the supplied
//! [`CommandRunner`]; the only long wait is the editor, which blocks
//! until the user closes it.

use std::path::{Path, PathBuf};
use lopdf::Document;
use tempfile::TempDir;
use crate::error::{Error, Result};
use crate::layout::PageBox;
use crate::pdf::{sign_document, SignPlan};
use crate::tools::convert::{image_to_pdf, DEFAULT_CONVERTER};
use crate::tools::editor::{edit_image, DEFAULT_EDITOR};
use crate::tools::pdftoppm::{ImageFormat, PopplerVersion, Rasterizer};
use crate::tools::runner::CommandRunner;

/// Rasterizer used when none is configured
pub const DEFAULT_RASTERIZER: &str = "pdftoppm";

/// Configuration for one signing run
#[derive(Debug, Clone)]
pub struct SignOptions {
    /// Source PDF
    pub input: PathBuf,
    /// Page to edit (1-based)
    pub page: u32,
    /// Page to remove from the output (1-based)
    pub delete: Option<u32>,
    /// Image editor program (a single name or path, never split)
    pub editor: String,
    /// Extra arguments passed to the editor before the image path
    pub editor_args: Vec<String>,
    /// pdftoppm program
    pub rasterizer: String,
    /// Image-to-PDF converter program
    pub converter: String,
    /// Format of the image handed to the editor
    pub image_format: ImageFormat,
    /// Output file; defaults to `<input>.signed.pdf`
    pub output: Option<PathBuf>,
    /// Fixed directory for intermediate files; a fresh one is made when unset
    pub workdir: Option<PathBuf>,
    /// Keep the fresh working directory after the run
    pub keep_temp: bool,
}

impl SignOptions {
    /// Options for editing page 1 of `input` with the default tools
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            page: 1,
            delete: None,
            editor: DEFAULT_EDITOR.to_string(),
            editor_args: Vec::new(),
            rasterizer: DEFAULT_RASTERIZER.to_string(),
            converter: DEFAULT_CONVERTER.to_string(),
            image_format: ImageFormat::default(),
            output: None,
            workdir: None,
            keep_temp: false,
        }
    }

    /// Where the signed document will be written
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| signed_output_path(&self.input))
    }
}

/// `<input without extension>.signed.pdf`
///
/// ```
/// use pdf_sign::sign::signed_output_path;
/// use std::path::{Path, PathBuf};
///
/// assert_eq!(signed_output_path(Path::new("lease.v2.pdf")), PathBuf::from("lease.v2.signed.pdf"));
/// ```
pub fn signed_output_path(input: &Path) -> PathBuf {
    input.with_extension("signed.pdf")
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct SignReport {
    /// The written document
    pub output: PathBuf,
    /// Detected rasterizer version
    pub rasterizer_version: PopplerVersion,
    /// Pages in the written document
    pub page_count: usize,
    /// Original and edited boxes, when the edited page had to be rescaled
    pub resized: Option<(PageBox, PageBox)>,
    /// Working directory left on disk, if any
    pub workdir: Option<PathBuf>,
}

/// Directory holding the intermediate image and PDF
enum WorkDir {
    Fixed(PathBuf),
    Temp(TempDir),
}

impl WorkDir {
    fn create(options: &SignOptions) -> Result<Self> {
        match &options.workdir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                Ok(WorkDir::Fixed(dir.clone()))
            }
            None => {
                let dir = tempfile::Builder::new()
                    .prefix("pdf-sign-")
                    .disable_cleanup(options.keep_temp)
                    .tempdir()?;
                Ok(WorkDir::Temp(dir))
            }
        }
    }

    fn path(&self) -> &Path {
        match self {
            WorkDir::Fixed(dir) => dir,
            WorkDir::Temp(dir) => dir.path(),
        }
    }
}

/// Check the source and page numbers before any external tool runs
///
/// Returns the source page count.
pub fn preflight(options: &SignOptions) -> Result<usize> {
    if !options.input.exists() {
        return Err(Error::FileNotFound(options.input.clone()));
    }

    let doc = Document::load(&options.input)?;
    let count = doc.get_pages().len();
    if count == 0 {
        return Err(Error::EmptyPdf(options.input.clone()));
    }

    for page in std::iter::once(options.page).chain(options.delete) {
        if page == 0 {
            return Err(Error::InvalidPageNumber(page));
        }
        if page as usize > count {
            return Err(Error::PageOutOfRange { page, count });
        }
    }

    Ok(count)
}

/// Sign one page of a PDF
///
/// 1. detect the rasterizer version,
/// 2. rasterize the page,
/// 3. open it in the editor and wait,
/// 4. convert it back to PDF and merge it over the original page.
///
/// The output file is written only after every earlier step succeeded.
pub fn sign_page<R: CommandRunner + ?Sized>(options: &SignOptions, runner: &mut R) -> Result<SignReport> {
    let source_pages = preflight(options)?;
    log::debug!("{} has {} pages", options.input.display(), source_pages);

    let rasterizer = Rasterizer::detect(&mut *runner, &options.rasterizer)?;

    let workdir = WorkDir::create(options)?;
    log::debug!("working directory: {}", workdir.path().display());

    let image = rasterizer.rasterize_page(
        &mut *runner,
        &options.input,
        options.page,
        options.image_format,
        workdir.path(),
    )?;

    edit_image(&mut *runner, &options.editor, &options.editor_args, &image)?;

    let single_page = image_to_pdf(runner, &options.converter, &image, workdir.path())?;

    let output = options.output_path();
    let plan = SignPlan {
        edit_page: options.page,
        delete_page: options.delete,
    };
    let assembly = sign_document(&options.input, &single_page, &output, &plan)?;
    log::info!("wrote {} ({} pages)", output.display(), assembly.page_count);

    let kept_workdir = match &workdir {
        WorkDir::Fixed(dir) => Some(dir.clone()),
        WorkDir::Temp(dir) if options.keep_temp => Some(dir.path().to_path_buf()),
        WorkDir::Temp(_) => None,
    };

    Ok(SignReport {
        output,
        rasterizer_version: rasterizer.version(),
        page_count: assembly.page_count,
        resized: assembly.resized,
        workdir: kept_workdir,
    })
}
