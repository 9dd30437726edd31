//! Rasterizing a PDF page with poppler's `pdftoppm`
//!
//! pdftoppm's flags and output naming changed over time:
//!
//! | version         | page range          | output file              |
//! |-----------------|---------------------|--------------------------|
//! | < 0.14.2        | `-f N -l N`         | `<prefix>-N.<ext>`       |
//! | 0.14.2 – 0.16.x | `-f N -l N`         | `<prefix>.<ext>`         |
//! | ≥ 0.17.0        | `-f N -singlefile`  | `<prefix>.<ext>`         |

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use lazy_static::lazy_static;
use regex::Regex;
use crate::error::{Error, Result};
use super::runner::{run_checked, CommandRunner, Invocation};

/// Base name pdftoppm writes to inside the working directory
pub const TEMP_IMAGE_STEM: &str = "pdftoppm_temp";

lazy_static! {
    static ref VERSION_BANNER: Regex =
        Regex::new(r"^\s*pdftoppm version (\d+)\.(\d+)\.(\d+)").unwrap();
}

/// Installed poppler version, ordered component-wise
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PopplerVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl PopplerVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }
}

impl fmt::Display for PopplerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Parse the banner printed by `pdftoppm -v`
///
/// # Example
///
/// ```
/// use pdf_sign::tools::pdftoppm::{parse_version_banner, PopplerVersion};
///
/// let version = parse_version_banner("pdftoppm version 22.02.0\nCopyright 2005-2022 The Poppler Developers").unwrap();
/// assert_eq!(version, PopplerVersion::new(22, 2, 0));
/// ```
pub fn parse_version_banner(banner: &str) -> Result<PopplerVersion> {
    let captures = VERSION_BANNER
        .captures(banner)
        .ok_or_else(|| Error::VersionBanner(banner.to_string()))?;

    let component = |i: usize| -> Result<u32> {
        captures[i]
            .parse()
            .map_err(|_| Error::VersionBanner(banner.to_string()))
    };

    Ok(PopplerVersion::new(component(1)?, component(2)?, component(3)?))
}

/// Ask the rasterizer for its version
///
/// Only the banner matters; some builds exit non-zero for `-v`.
pub fn detect_version<R: CommandRunner + ?Sized>(runner: &mut R, program: &str) -> Result<PopplerVersion> {
    let invocation = Invocation::new(program).arg("-v");
    log::debug!("probing: {}", invocation);

    let captured = runner.output(&invocation).map_err(|source| Error::ToolLaunch {
        tool: program.to_string(),
        source,
    })?;

    parse_version_banner(&captured.text)
}

/// Command-line dialect of a pdftoppm release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterizerFlavor {
    /// `-f N -l N`, output gets a `-N` page suffix
    Legacy,
    /// `-f N -l N`, no page suffix
    Unsuffixed,
    /// `-f N -singlefile`, no page suffix
    SingleFile,
}

/// Newest threshold first; the first one the version reaches wins.
const FLAVOR_THRESHOLDS: [(PopplerVersion, RasterizerFlavor); 2] = [
    (PopplerVersion::new(0, 17, 0), RasterizerFlavor::SingleFile),
    (PopplerVersion::new(0, 14, 2), RasterizerFlavor::Unsuffixed),
];

impl RasterizerFlavor {
    pub fn for_version(version: PopplerVersion) -> Self {
        FLAVOR_THRESHOLDS
            .iter()
            .find(|(threshold, _)| version >= *threshold)
            .map(|(_, flavor)| *flavor)
            .unwrap_or(RasterizerFlavor::Legacy)
    }

    fn page_suffix(self) -> bool {
        matches!(self, RasterizerFlavor::Legacy)
    }
}

/// Raster format for the image handed to the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    Ppm,
    /// Default: unlike PPM, editors can keep layers on top of it
    #[default]
    Png,
    Jpeg,
    Tiff,
}

impl ImageFormat {
    /// pdftoppm flag selecting this format (PPM is its default)
    pub fn flag(self) -> Option<&'static str> {
        match self {
            ImageFormat::Ppm => None,
            ImageFormat::Png => Some("-png"),
            ImageFormat::Jpeg => Some("-jpeg"),
            ImageFormat::Tiff => Some("-tiff"),
        }
    }

    /// Extension pdftoppm gives the output file
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Ppm => "ppm",
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Tiff => "tif",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ppm" => Ok(ImageFormat::Ppm),
            "png" => Ok(ImageFormat::Png),
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            "tiff" | "tif" => Ok(ImageFormat::Tiff),
            other => Err(Error::General(format!("Unsupported image format: {}", other))),
        }
    }
}

/// A pdftoppm installation of a known version
#[derive(Debug, Clone)]
pub struct Rasterizer {
    program: String,
    version: PopplerVersion,
    flavor: RasterizerFlavor,
}

impl Rasterizer {
    pub fn new(program: impl Into<String>, version: PopplerVersion) -> Self {
        Self {
            program: program.into(),
            version,
            flavor: RasterizerFlavor::for_version(version),
        }
    }

    /// Probe `program` for its version and pick the matching flavor
    pub fn detect<R: CommandRunner + ?Sized>(runner: &mut R, program: &str) -> Result<Self> {
        let version = detect_version(runner, program)?;
        let rasterizer = Self::new(program, version);
        log::info!("pdftoppm version {} ({:?})", version, rasterizer.flavor);
        Ok(rasterizer)
    }

    pub fn version(&self) -> PopplerVersion {
        self.version
    }

    pub fn flavor(&self) -> RasterizerFlavor {
        self.flavor
    }

    /// Command line rendering `page` (1-based) of `input` to `<prefix>...`
    pub fn invocation(&self, input: &Path, page: u32, format: ImageFormat, prefix: &Path) -> Invocation {
        let page = page.to_string();
        let mut invocation = Invocation::new(&self.program)
            .args(["-f", page.as_str()])
            .args(["-freetype", "yes"]);

        invocation = match self.flavor {
            RasterizerFlavor::Legacy | RasterizerFlavor::Unsuffixed => {
                invocation.args(["-l", page.as_str()])
            }
            RasterizerFlavor::SingleFile => invocation.arg("-singlefile"),
        };

        if let Some(flag) = format.flag() {
            invocation = invocation.arg(flag);
        }

        invocation.arg(input).arg(prefix)
    }

    /// File pdftoppm will write for `page` given the output prefix
    pub fn output_path(&self, prefix: &Path, page: u32, format: ImageFormat) -> PathBuf {
        let mut name: OsString = prefix.as_os_str().to_os_string();
        if self.flavor.page_suffix() {
            name.push(format!("-{}", page));
        }
        name.push(".");
        name.push(format.extension());
        PathBuf::from(name)
    }

    /// Render one page of `input` into `workdir`, returning the image path
    pub fn rasterize_page<R: CommandRunner + ?Sized>(
        &self,
        runner: &mut R,
        input: &Path,
        page: u32,
        format: ImageFormat,
        workdir: &Path,
    ) -> Result<PathBuf> {
        let prefix = workdir.join(TEMP_IMAGE_STEM);
        let invocation = self.invocation(input, page, format, &prefix);
        log::info!("rasterizing page {}: {}", page, invocation);

        run_checked(runner, &invocation)?;

        let image = self.output_path(&prefix, page, format);
        if !image.exists() {
            return Err(Error::MissingOutput(image));
        }

        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_of(invocation: &Invocation) -> Vec<String> {
        invocation.args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_parse_banner() {
        let version = parse_version_banner("pdftoppm version 0.26.5\nCopyright 2005-2014 The Poppler Developers").unwrap();
        assert_eq!(version, PopplerVersion::new(0, 26, 5));
    }

    #[test]
    fn test_parse_banner_rejects_nonsense() {
        let err = parse_version_banner("nonsense output").unwrap_err();
        match err {
            Error::VersionBanner(raw) => assert_eq!(raw, "nonsense output"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_banner_requires_tool_prefix() {
        assert!(parse_version_banner("pdftocairo version 22.02.0").is_err());
        assert!(parse_version_banner("pdftoppm version 22.02").is_err());
    }

    #[test]
    fn test_flavor_thresholds() {
        let flavor = |major, minor, patch| RasterizerFlavor::for_version(PopplerVersion::new(major, minor, patch));
        assert_eq!(flavor(0, 12, 4), RasterizerFlavor::Legacy);
        assert_eq!(flavor(0, 14, 1), RasterizerFlavor::Legacy);
        assert_eq!(flavor(0, 14, 2), RasterizerFlavor::Unsuffixed);
        assert_eq!(flavor(0, 16, 7), RasterizerFlavor::Unsuffixed);
        assert_eq!(flavor(0, 17, 0), RasterizerFlavor::SingleFile);
        assert_eq!(flavor(22, 2, 0), RasterizerFlavor::SingleFile);
    }

    #[test]
    fn test_legacy_invocation_and_name() {
        let rasterizer = Rasterizer::new("pdftoppm", PopplerVersion::new(0, 13, 9));
        let prefix = Path::new("/tmp/run/pdftoppm_temp");
        let invocation = rasterizer.invocation(Path::new("doc.pdf"), 4, ImageFormat::Png, prefix);

        assert_eq!(
            args_of(&invocation),
            ["-f", "4", "-freetype", "yes", "-l", "4", "-png", "doc.pdf", "/tmp/run/pdftoppm_temp"]
        );
        assert_eq!(
            rasterizer.output_path(prefix, 4, ImageFormat::Png),
            PathBuf::from("/tmp/run/pdftoppm_temp-4.png")
        );
    }

    #[test]
    fn test_single_file_invocation_and_name() {
        let rasterizer = Rasterizer::new("pdftoppm", PopplerVersion::new(0, 18, 0));
        let prefix = Path::new("/tmp/run/pdftoppm_temp");
        let invocation = rasterizer.invocation(Path::new("doc.pdf"), 4, ImageFormat::Png, prefix);

        assert!(invocation.has_arg("-singlefile"));
        assert!(!invocation.has_arg("-l"));
        assert_eq!(
            rasterizer.output_path(prefix, 4, ImageFormat::Png),
            PathBuf::from("/tmp/run/pdftoppm_temp.png")
        );
    }

    #[test]
    fn test_ppm_has_no_format_flag() {
        let rasterizer = Rasterizer::new("pdftoppm", PopplerVersion::new(0, 15, 0));
        let prefix = Path::new("pdftoppm_temp");
        let invocation = rasterizer.invocation(Path::new("doc.pdf"), 1, ImageFormat::Ppm, prefix);

        assert_eq!(
            args_of(&invocation),
            ["-f", "1", "-freetype", "yes", "-l", "1", "doc.pdf", "pdftoppm_temp"]
        );
        assert_eq!(rasterizer.output_path(prefix, 1, ImageFormat::Ppm), PathBuf::from("pdftoppm_temp.ppm"));
    }

    #[test]
    fn test_image_format_from_str() {
        assert_eq!("PNG".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert_eq!("jpg".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert!("bmp".parse::<ImageFormat>().is_err());
    }
}
