//! Writing a digest to disk, optionally gzip-compressed.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::info;

use crate::error::{DigestError, Result};

/// Path the digest is written to: `path` itself, or with a `.gz`
/// extension in place of its own when compressing.
pub fn output_path(path: &Path, compress: bool) -> PathBuf {
    if compress {
        path.with_extension("gz")
    } else {
        path.to_path_buf()
    }
}

/// Write `text` to `path`, gzip level 9 when `compress` is set.
///
/// Returns the path actually written.
pub fn write_digest(text: &str, path: &Path, compress: bool) -> Result<PathBuf> {
    let target = output_path(path, compress);
    let write_err = |source| DigestError::Write {
        path: target.clone(),
        source,
    };

    let file = File::create(&target).map_err(write_err)?;
    let mut writer = BufWriter::new(file);
    if compress {
        let mut encoder = GzEncoder::new(&mut writer, Compression::best());
        encoder.write_all(text.as_bytes()).map_err(write_err)?;
        encoder.finish().map_err(write_err)?;
    } else {
        writer.write_all(text.as_bytes()).map_err(write_err)?;
    }
    writer.flush().map_err(write_err)?;

    info!("Wrote {} bytes of digest to {}", text.len(), target.display());
    Ok(target)
}
