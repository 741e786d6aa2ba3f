//! Locate the executable inside a downloaded `.tar.gz` release.
//!
//! The archive is streamed, never unpacked to disk: the matching entry's
//! reader is handed straight to a caller-supplied closure (normally the
//! binary replacer), so the payload is not buffered in memory either.
//!
//! Read failures on the matched entry, including a stream that ends before
//! the size recorded in its header, surface as `InvalidData` so the
//! replacer can tell a corrupt download from a failed local write.
//!
//! Matching is by base name on regular-file entries only, in stream order.
//! The first match wins; if a release ever ships two entries with the same
//! base name in different directories, the one that comes first in the
//! tarball is installed and the rest are ignored.

use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use tar::Archive;

use crate::error::{UpdateError, UpdateResult};

/// Find `binary_name` in the archive at `archive_path` and pass its content
/// to `on_match`.
///
/// Errors returned by `on_match` are passed through untouched.
pub fn with_archived_binary<T, F>(
    archive_path: &Path,
    binary_name: &str,
    on_match: F,
) -> UpdateResult<T>
where
    F: FnOnce(&mut dyn Read) -> UpdateResult<T>,
{
    let file = File::open(archive_path).map_err(|e| {
        UpdateError::io(format!("Failed to open {}", archive_path.display()), e)
    })?;

    read_archived_binary(BufReader::new(file), binary_name, on_match)
}

/// Same as [`with_archived_binary`], reading the archive from any stream.
pub fn read_archived_binary<R, T, F>(reader: R, binary_name: &str, on_match: F) -> UpdateResult<T>
where
    R: Read,
    F: FnOnce(&mut dyn Read) -> UpdateResult<T>,
{
    let mut archive = Archive::new(GzDecoder::new(reader));
    let entries = archive.entries().map_err(format_error)?;

    for entry in entries {
        let mut entry = entry.map_err(format_error)?;

        if !entry.header().entry_type().is_file() {
            continue;
        }

        let matches = {
            let path = entry.path().map_err(format_error)?;
            path.file_name() == Some(OsStr::new(binary_name))
        };
        if !matches {
            continue;
        }

        tracing::debug!(
            "Found {} in archive ({} bytes)",
            binary_name,
            entry.size()
        );
        let remaining = entry.size();
        return on_match(&mut EntryReader {
            inner: &mut entry,
            remaining,
        });
    }

    Err(UpdateError::BinaryNotFound {
        name: binary_name.to_string(),
    })
}

/// Reader over the matched entry that refuses to end early.
struct EntryReader<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> Read for EntryReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        match self.inner.read(buf) {
            Ok(0) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("archive entry truncated ({} bytes missing)", self.remaining),
            )),
            Ok(n) => {
                self.remaining = self.remaining.saturating_sub(n as u64);
                Ok(n)
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Err(e),
            Err(e) => Err(io::Error::new(io::ErrorKind::InvalidData, e)),
        }
    }
}

fn format_error(e: std::io::Error) -> UpdateError {
    UpdateError::Format {
        message: e.to_string(),
    }
}
