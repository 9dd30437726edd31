//! The interactive editing step

use std::path::Path;
use crate::error::{Error, Result};
use super::runner::{run_checked, CommandRunner, Invocation};

/// Editor used when none is configured
pub const DEFAULT_EDITOR: &str = "gimp";

/// Build the editor command line for `image`
///
/// `editor` is a single program name or path and is never split, so paths
/// with spaces work. Extra flags go in `extra_args`; the image path goes last.
pub fn editor_invocation(editor: &str, extra_args: &[String], image: &Path) -> Result<Invocation> {
    if editor.trim().is_empty() {
        return Err(Error::EmptyCommand);
    }

    Ok(Invocation::new(editor).args(extra_args).arg(image))
}

/// Open `image` in the editor and block until the user closes it
///
/// The file is trusted to have been saved in place.
pub fn edit_image<R: CommandRunner + ?Sized>(
    runner: &mut R,
    editor: &str,
    extra_args: &[String],
    image: &Path,
) -> Result<()> {
    let invocation = editor_invocation(editor, extra_args, image)?;
    log::info!("waiting for editor: {}", invocation);
    run_checked(runner, &invocation)
}
