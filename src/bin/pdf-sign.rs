//! PDF Sign CLI tool
//!
//! Rasterizes one page of a PDF, opens it in an image editor, and merges
//! the edited page back into `<name>.signed.pdf`.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;

use pdf_sign::sign::{sign_page, SignOptions};
use pdf_sign::tools::{ImageFormat, SystemRunner};

/// PDF Sign - draw on a page of a PDF and merge it back
#[derive(Parser)]
#[command(name = "pdf-sign")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Sign the first page with gimp
    pdf-sign lease.pdf

    # Sign page 3 and drop the blank page 4
    pdf-sign lease.pdf --page 3 --delete 4

    # Use another editor
    pdf-sign lease.pdf -n 2 -e krita --editor-arg=--nosplash

    # Editor installed under a path with spaces
    pdf-sign lease.pdf -e \"/opt/GIMP 2/bin/gimp\"

If ImageMagick refuses to write the PDF, allow it in /etc/ImageMagick-6/policy.xml:
    <policy domain=\"coder\" rights=\"write\" pattern=\"PDF\" />")]
struct Cli {
    /// PDF file to sign
    #[arg(value_name = "PDF")]
    input: PathBuf,

    /// Page of the PDF file to edit (1-based)
    #[arg(short = 'n', long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    page: u32,

    /// Page to delete from the output (1-based)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    delete: Option<u32>,

    /// Image editor to call on the temporary image file
    #[arg(short, long, default_value = pdf_sign::tools::DEFAULT_EDITOR)]
    editor: String,

    /// Extra argument for the editor, placed before the image path (repeatable)
    #[arg(long = "editor-arg", value_name = "ARG", allow_hyphen_values = true)]
    editor_args: Vec<String>,

    /// Output PDF file path [default: <PDF without extension>.signed.pdf]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Image format handed to the editor (png, ppm, jpeg, tiff)
    #[arg(long, default_value = "png", value_parser = parse_format)]
    format: ImageFormat,

    /// pdftoppm program
    #[arg(long, default_value = pdf_sign::sign::DEFAULT_RASTERIZER)]
    pdftoppm: String,

    /// ImageMagick convert program
    #[arg(long, default_value = pdf_sign::tools::DEFAULT_CONVERTER)]
    convert: String,

    /// Directory for intermediate files (left in place) instead of a fresh temporary one
    #[arg(long)]
    workdir: Option<PathBuf>,

    /// Keep the temporary directory after the run
    #[arg(long)]
    keep_temp: bool,

    /// Open the output file after creation
    #[arg(long)]
    open: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_format(s: &str) -> Result<ImageFormat, String> {
    s.parse().map_err(|e: pdf_sign::Error| e.to_string())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let options = SignOptions {
        input: cli.input,
        page: cli.page,
        delete: cli.delete,
        editor: cli.editor,
        editor_args: cli.editor_args,
        rasterizer: cli.pdftoppm,
        converter: cli.convert,
        image_format: cli.format,
        output: cli.output,
        workdir: cli.workdir,
        keep_temp: cli.keep_temp,
    };

    let report = sign_page(&options, &mut SystemRunner)
        .with_context(|| format!("signing page {} of {}", options.page, options.input.display()))?;

    if let Some((original, edited)) = report.resized {
        log::debug!("edited page rescaled from {} to {}", edited, original);
    }
    if let Some(dir) = &report.workdir {
        eprintln!("Intermediate files kept in: {}", dir.display());
    }
    eprintln!("Output: {}", report.output.display());

    if cli.open {
        open_file(&report.output).context("opening the signed PDF")?;
    }

    Ok(())
}

/// Open a file with the system default application
fn open_file(path: &Path) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(path)
            .spawn()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(path)
            .spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", ""])
            .arg(path)
            .spawn()?;
    }
    Ok(())
}
