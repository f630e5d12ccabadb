//! Transparent decompression of input sources and compression of formatted output.
//!
//! Fixed-length extracts are routinely shipped compressed. [`auto_detect_reader`] picks a
//! codec from the file name, falling back to the magic bytes at the start of the stream, so
//! a parser always sees the plain record bytes. [`auto_detect_writer`] does the reverse for
//! the formatter, by file name only.
//!
//! Built-in codecs, each behind a feature flag:
//! - gzip (`.gz`, `.gzip`) - `compression-gzip`, via `flate2`
//! - zstd (`.zst`, `.zstd`) - `compression-zstd`, via `zstd`
//! - bzip2 (`.bz2`, `.bzip2`) - `compression-bzip2`, via `bzip2`
//! - xz (`.xz`) - `compression-xz`, via `xz2`
//!
//! Further codecs can be added at runtime with [`register_codec`].
//!
//! ```no_run
//! use flatbeam::io::compression::auto_detect_reader;
//! use std::fs::File;
//! # fn main() -> anyhow::Result<()> {
//! let file = File::open("ledger.dat.gz")?;
//! let source = auto_detect_reader(file, "ledger.dat.gz")?;
//! # let _ = source;
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use log::debug;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

/// A compression format usable for input sources and formatter output.
///
/// Implementations live in a process-wide registry and must be `Send + Sync`.
pub trait CompressionCodec: Send + Sync {
    /// Short name used in diagnostics, e.g. `"gzip"`.
    fn name(&self) -> &str;

    /// Lowercase file suffixes including the dot, e.g. `&[".gz"]`.
    fn extensions(&self) -> &[&str];

    /// Leading bytes identifying the format, if it has any.
    fn magic_bytes(&self) -> Option<&[u8]>;

    /// Wrap `reader` so that it yields decompressed bytes.
    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>>;

    /// Wrap `writer` so that written bytes are compressed.
    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> std::io::Result<Box<dyn Write>>;
}

type Registry = Vec<Arc<dyn CompressionCodec>>;

static CODECS: LazyLock<RwLock<Registry>> = LazyLock::new(|| RwLock::new(builtin_codecs()));

fn builtin_codecs() -> Registry {
    vec![
        #[cfg(feature = "compression-gzip")]
        Arc::new(GzipCodec),
        #[cfg(feature = "compression-zstd")]
        Arc::new(ZstdCodec),
        #[cfg(feature = "compression-bzip2")]
        Arc::new(Bzip2Codec),
        #[cfg(feature = "compression-xz")]
        Arc::new(XzCodec),
    ]
}

/// Snapshot of the registered codecs.
///
/// The registry only ever grows, so a poisoned lock still holds a usable list.
fn codecs() -> Registry {
    CODECS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Add a codec to the process-wide registry. Later registrations are consulted last.
pub fn register_codec(codec: Arc<dyn CompressionCodec>) {
    debug!("registering compression codec '{}'", codec.name());
    CODECS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .push(codec);
}

/// Names of all registered codecs, in detection order.
#[must_use]
pub fn codec_names() -> Vec<String> {
    codecs().iter().map(|c| c.name().to_string()).collect()
}

/// The codec whose file suffix matches `path`, case-insensitively.
#[must_use]
pub fn codec_for_path(path: impl AsRef<Path>) -> Option<Arc<dyn CompressionCodec>> {
    let name = path.as_ref().to_string_lossy().to_lowercase();
    codecs()
        .into_iter()
        .find(|codec| codec.extensions().iter().any(|ext| name.ends_with(ext)))
}

fn codec_for_header(header: &[u8]) -> Option<Arc<dyn CompressionCodec>> {
    if header.is_empty() {
        return None;
    }
    codecs()
        .into_iter()
        .find(|codec| codec.magic_bytes().is_some_and(|magic| header.starts_with(magic)))
}

/// Wrap `reader` with the decompressor matching `path_hint` or the stream's magic bytes.
///
/// Uncompressed input is returned buffered.
///
/// # Errors
/// If the codec cannot initialize its decoder.
pub fn auto_detect_reader<R: Read + 'static>(
    reader: R,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn Read>> {
    let path_hint = path_hint.as_ref();
    if let Some(codec) = codec_for_path(path_hint) {
        debug!("{}: {} by file name", path_hint.display(), codec.name());
        return codec
            .wrap_reader_dyn(Box::new(reader))
            .with_context(|| format!("open {} stream {}", codec.name(), path_hint.display()));
    }

    let mut buffered = BufReader::new(reader);
    let header = buffered
        .fill_buf()
        .with_context(|| format!("read header of {}", path_hint.display()))?;
    if let Some(codec) = codec_for_header(header) {
        debug!("{}: {} by magic bytes", path_hint.display(), codec.name());
        return codec
            .wrap_reader_dyn(Box::new(buffered))
            .with_context(|| format!("open {} stream {}", codec.name(), path_hint.display()));
    }
    Ok(Box::new(buffered))
}

/// Wrap `writer` with the compressor matching `path_hint`; plain output is buffered.
///
/// # Errors
/// If the codec cannot initialize its encoder.
pub fn auto_detect_writer<W: Write + 'static>(
    writer: W,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn Write>> {
    let path_hint = path_hint.as_ref();
    match codec_for_path(path_hint) {
        Some(codec) => codec
            .wrap_writer_dyn(Box::new(writer))
            .with_context(|| format!("create {} stream {}", codec.name(), path_hint.display())),
        None => Ok(Box::new(BufWriter::new(writer))),
    }
}

#[cfg(feature = "compression-gzip")]
struct GzipCodec;

#[cfg(feature = "compression-gzip")]
impl CompressionCodec for GzipCodec {
    fn name(&self) -> &str {
        "gzip"
    }

    fn extensions(&self) -> &[&str] {
        &[".gz", ".gzip"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x1f, 0x8b])
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        // multi-member archives are common for concatenated extracts
        Ok(Box::new(flate2::read::MultiGzDecoder::new(reader)))
    }

    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> std::io::Result<Box<dyn Write>> {
        let encoder = flate2::write::GzEncoder::new(writer, flate2::Compression::default());
        Ok(Box::new(encoder))
    }
}

#[cfg(feature = "compression-zstd")]
struct ZstdCodec;

#[cfg(feature = "compression-zstd")]
impl CompressionCodec for ZstdCodec {
    fn name(&self) -> &str {
        "zstd"
    }

    fn extensions(&self) -> &[&str] {
        &[".zst", ".zstd"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x28, 0xb5, 0x2f, 0xfd])
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        let decoder = zstd::stream::read::Decoder::new(reader)?;
        Ok(Box::new(decoder))
    }

    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> std::io::Result<Box<dyn Write>> {
        let encoder = zstd::stream::write::Encoder::new(writer, 3)?;
        Ok(Box::new(encoder.auto_finish()))
    }
}

#[cfg(feature = "compression-bzip2")]
struct Bzip2Codec;

#[cfg(feature = "compression-bzip2")]
impl CompressionCodec for Bzip2Codec {
    fn name(&self) -> &str {
        "bzip2"
    }

    fn extensions(&self) -> &[&str] {
        &[".bz2", ".bzip2"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(b"BZh")
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        Ok(Box::new(bzip2::read::MultiBzDecoder::new(reader)))
    }

    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> std::io::Result<Box<dyn Write>> {
        let encoder = bzip2::write::BzEncoder::new(writer, bzip2::Compression::default());
        Ok(Box::new(encoder))
    }
}

#[cfg(feature = "compression-xz")]
struct XzCodec;

#[cfg(feature = "compression-xz")]
impl CompressionCodec for XzCodec {
    fn name(&self) -> &str {
        "xz"
    }

    fn extensions(&self) -> &[&str] {
        &[".xz"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0xfd, b'7', b'z', b'X', b'Z', 0x00])
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        Ok(Box::new(xz2::read::XzDecoder::new_multi_decoder(reader)))
    }

    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> std::io::Result<Box<dyn Write>> {
        Ok(Box::new(xz2::write::XzEncoder::new(writer, 6)))
    }
}
