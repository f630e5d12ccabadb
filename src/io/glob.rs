//! Glob expansion for multi-file inputs.
//!
//! Large fixed-length extracts are often split into numbered parts (`ledger.001.dat`,
//! `ledger.002.dat`, ...). Expanding the pattern yields the parts in lexicographic order, which
//! is the order a [`FileSet`](super::FileSet) feeds them to a parser.
//!
//! ```no_run
//! use flatbeam::io::glob::expand_glob;
//!
//! let parts = expand_glob("extracts/ledger.*.dat.gz")?;
//! # use anyhow::Error; Ok::<(), Error>(())
//! ```

use anyhow::{Context, Result, bail};
use std::path::PathBuf;

/// Regular files matching `pattern`, sorted. No match is an empty list.
///
/// Supports `*`, `?`, `**` and character classes (`[abc]`, `[!abc]`).
///
/// # Errors
/// If the pattern is invalid or a directory cannot be read.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let entries = glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.with_context(|| format!("expand glob pattern {pattern}"))?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Like [`expand_glob`], but no match is an error.
///
/// # Errors
/// As [`expand_glob`], and if nothing matches.
pub fn expand_glob_required(pattern: &str) -> Result<Vec<PathBuf>> {
    let files = expand_glob(pattern)?;
    if files.is_empty() {
        bail!("no input files match {pattern}");
    }
    Ok(files)
}
