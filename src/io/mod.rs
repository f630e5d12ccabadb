//! Opening physical sources and sinks.
//!
//! Parsers read from any [`Read`]; this module turns file paths into such sources, with
//! transparent decompression ([`compression`]), and groups split extracts into one logical
//! input ([`FileSet`], built on [`glob`]).

pub mod compression;
pub mod glob;

use crate::parser::DataParser;
use crate::record::Record;
use anyhow::{Context, Result};
use log::debug;
use std::fs::{File, create_dir_all};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Open `path` for reading, decompressing it if its name or header says so.
///
/// # Errors
/// If the file cannot be opened or its codec fails to initialize.
pub fn open_source(path: impl AsRef<Path>) -> Result<Box<dyn Read>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    compression::auto_detect_reader(file, path)
}

/// Create `path` for writing, compressing by file name. Parent directories are created.
///
/// # Errors
/// If the file or its parent directories cannot be created.
pub fn create_sink(path: impl AsRef<Path>) -> Result<Box<dyn Write>> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    compression::auto_detect_writer(file, path)
}

/// An ordered list of files parsed as one logical stream.
///
/// ```no_run
/// use flatbeam::io::FileSet;
/// use flatbeam::metadata::{FieldDescriptor, RecordType};
/// use flatbeam::parser::{FixLenParser, ParserSettings};
/// # fn main() -> anyhow::Result<()> {
/// let record_type = RecordType::new("line", vec![FieldDescriptor::text("text", 80)]);
/// let mut parser = FixLenParser::new(record_type, ParserSettings::default())?;
/// let records = FileSet::from_glob("extracts/part-*.dat")?.read_all(&mut parser)?;
/// println!("{} records", records.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    files: Vec<PathBuf>,
    next: usize,
}

impl FileSet {
    #[must_use]
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self { files, next: 0 }
    }

    /// The files matching `pattern`, in lexicographic order.
    ///
    /// # Errors
    /// If the pattern is invalid or matches nothing.
    pub fn from_glob(pattern: &str) -> Result<Self> {
        Ok(Self::new(glob::expand_glob_required(pattern)?))
    }

    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Files not yet opened.
    #[must_use]
    pub fn remaining(&self) -> &[PathBuf] {
        &self.files[self.next..]
    }

    /// Open the next file, `None` once all files were opened.
    ///
    /// # Errors
    /// As [`open_source`].
    pub fn open_next(&mut self) -> Result<Option<(PathBuf, Box<dyn Read>)>> {
        let Some(path) = self.files.get(self.next).cloned() else {
            return Ok(None);
        };
        self.next += 1;
        let source = open_source(&path)?;
        Ok(Some((path, source)))
    }

    /// Bind every remaining file to `parser` in turn and collect all records.
    ///
    /// # Errors
    /// If a file cannot be opened or the parser fails on one of them.
    pub fn read_all<P: DataParser>(&mut self, parser: &mut P) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        while let Some((path, source)) = self.open_next()? {
            debug!("parsing {}", path.display());
            parser.set_data_source(source)?;
            while let Some(record) = parser
                .get_next()
                .with_context(|| format!("parse {} at byte {}", path.display(), parser.position()))?
            {
                records.push(record);
            }
        }
        Ok(records)
    }
}
