//! Output file naming.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::error::ResolveError;
use crate::params::ConversionParameters;

/// Derives the output path for `input`.
///
/// The name is `{stem}-{rate}-{bit_depth}.wav` for WAV and
/// `{stem}-{rate}-{bitrate}.{ext}` for lossy targets, placed directly in
/// `output_dir`. The input's directory plays no part, so two inputs with the
/// same stem collide.
pub fn resolve_output_path(
    input: &Path,
    params: &ConversionParameters,
    output_dir: &Path,
) -> Result<PathBuf, ResolveError> {
    let stem = input
        .file_stem()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ResolveError::MissingStem {
            input: input.to_path_buf(),
        })?;

    let mut name = OsString::from(stem);
    name.push(format!(
        "-{}.{}",
        params.suffix(),
        params.target_format().extension()
    ));

    Ok(output_dir.join(name))
}

/// Returns every output path targeted by more than one input.
///
/// Paths are listed once each, in the order their first duplicate appears.
pub fn find_collisions<'a, I>(outputs: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = &'a Path>,
{
    let mut seen: HashMap<&Path, usize> = HashMap::new();
    let mut collisions = Vec::new();

    for path in outputs {
        let count = seen.entry(path).or_insert(0);
        *count += 1;
        if *count == 2 {
            collisions.push(path.to_path_buf());
        }
    }

    collisions
}
