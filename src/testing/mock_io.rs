//! Mock I/O helpers: temporary files and sources with controlled read sizes.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};

/// A temporary file deleted on drop.
pub struct TempFilePath {
    _temp_file: NamedTempFile,
    path: PathBuf,
}

impl TempFilePath {
    /// # Errors
    /// If the temporary file cannot be created.
    pub fn new() -> io::Result<Self> {
        let temp_file = NamedTempFile::new()?;
        let path = temp_file.path().to_path_buf();
        Ok(Self {
            _temp_file: temp_file,
            path,
        })
    }

    /// A temporary file whose name ends in `.{extension}`, e.g. `"dat.gz"`.
    ///
    /// # Errors
    /// If the temporary file cannot be created.
    pub fn with_extension(extension: &str) -> io::Result<Self> {
        let temp_file = tempfile::Builder::new()
            .suffix(&format!(".{extension}"))
            .tempfile()?;
        let path = temp_file.path().to_path_buf();
        Ok(Self {
            _temp_file: temp_file,
            path,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A temporary directory deleted with its contents on drop.
pub struct TempDirPath {
    _temp_dir: TempDir,
    path: PathBuf,
}

impl TempDirPath {
    /// # Errors
    /// If the temporary directory cannot be created.
    pub fn new() -> io::Result<Self> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().to_path_buf();
        Ok(Self {
            _temp_dir: temp_dir,
            path,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.path.join(filename)
    }

    /// Write `data` to `filename` inside the directory.
    ///
    /// # Errors
    /// If the file cannot be written.
    pub fn write_file(&self, filename: &str, data: &[u8]) -> io::Result<PathBuf> {
        let path = self.file_path(filename);
        std::fs::write(&path, data)?;
        Ok(path)
    }
}

/// Write `data` to a new temporary file with the given extension.
///
/// # Errors
/// If the file cannot be created or written.
pub fn mock_data_file(data: &[u8], extension: &str) -> io::Result<TempFilePath> {
    let temp = TempFilePath::with_extension(extension)?;
    let mut file = std::fs::File::create(temp.path())?;
    file.write_all(data)?;
    file.flush()?;
    Ok(temp)
}

/// An in-memory source returning at most `chunk` bytes per read.
///
/// Splits multi-byte characters and records across refills, the way pipes and network
/// streams do.
#[derive(Debug, Clone)]
pub struct ChunkedSource {
    data: Vec<u8>,
    pos: usize,
    chunk: usize,
    reads: usize,
}

impl ChunkedSource {
    /// `chunk` is clamped to at least one byte.
    #[must_use]
    pub fn new(data: Vec<u8>, chunk: usize) -> Self {
        Self {
            data,
            pos: 0,
            chunk: chunk.max(1),
            reads: 0,
        }
    }

    /// Number of `read` calls that returned data.
    #[must_use]
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl Read for ChunkedSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.chunk).min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        if n > 0 {
            self.reads += 1;
        }
        Ok(n)
    }
}

/// A source that fails with `kind` after delivering `data`.
#[derive(Debug)]
pub struct FailingSource {
    data: io::Cursor<Vec<u8>>,
    kind: io::ErrorKind,
}

impl FailingSource {
    #[must_use]
    pub fn new(data: Vec<u8>, kind: io::ErrorKind) -> Self {
        Self {
            data: io::Cursor::new(data),
            kind,
        }
    }
}

impl Read for FailingSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.data.read(buf)? {
            0 => Err(io::Error::new(self.kind, "mock source failure")),
            n => Ok(n),
        }
    }
}
