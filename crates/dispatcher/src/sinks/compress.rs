//! Gzip compression of closed file windows

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Suffix appended to compressed windows
pub const GZIP_SUFFIX: &str = ".gz";

/// Path of the compressed counterpart of `path`
pub fn compressed_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(GZIP_SUFFIX);
    PathBuf::from(name)
}

/// Compress `path` into `<path>.gz` and remove the original
///
/// An existing `<path>.gz` (left by an earlier run in the same window) is kept
/// and a new gzip member is appended after it. The original is removed only
/// after the member is complete; on failure the target is cut back to its
/// previous length and the original is kept.
pub fn gzip_file(path: &Path) -> io::Result<PathBuf> {
    let target = compressed_path(path);
    let previous_len = match fs::metadata(&target) {
        Ok(meta) => Some(meta.len()),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(e),
    };

    match write_gzip(path, &target) {
        Ok(()) => {
            fs::remove_file(path)?;
            Ok(target)
        }
        Err(e) => {
            let _ = restore(&target, previous_len);
            Err(e)
        }
    }
}

fn write_gzip(source: &Path, target: &Path) -> io::Result<()> {
    let mut input = File::open(source)?;
    let file = OpenOptions::new().create(true).append(true).open(target)?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    io::copy(&mut input, &mut encoder)?;
    let mut output = encoder.finish()?;
    output.flush()?;
    output.get_ref().sync_all()
}

fn restore(target: &Path, previous_len: Option<u64>) -> io::Result<()> {
    match previous_len {
        Some(len) => OpenOptions::new().write(true).open(target)?.set_len(len),
        None => match fs::remove_file(target) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::{GzDecoder, MultiGzDecoder};
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn test_gzip_replaces_original() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flows.202401010000");
        fs::write(&path, b"1,2,3\n4,5,6\n").unwrap();

        let target = gzip_file(&path).unwrap();
        assert_eq!(target, dir.path().join("flows.202401010000.gz"));
        assert!(!path.exists());

        let mut text = String::new();
        GzDecoder::new(File::open(&target).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "1,2,3\n4,5,6\n");
    }

    #[test]
    fn test_missing_source_keeps_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing");
        assert!(gzip_file(&path).is_err());
        assert!(!compressed_path(&path).exists());
    }

    #[test]
    fn test_existing_archive_gets_a_new_member() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flows.202401010000");
        fs::write(&path, b"first\n").unwrap();
        gzip_file(&path).unwrap();

        fs::write(&path, b"second\n").unwrap();
        let target = gzip_file(&path).unwrap();

        let mut text = String::new();
        MultiGzDecoder::new(File::open(&target).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "first\nsecond\n");
    }

    #[test]
    fn test_failed_compression_keeps_existing_archive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flows.202401010000");
        fs::write(&path, b"first\n").unwrap();
        let target = gzip_file(&path).unwrap();
        let archived = fs::read(&target).unwrap();

        // Source is gone, so nothing may be appended
        assert!(gzip_file(&path).is_err());
        assert_eq!(fs::read(&target).unwrap(), archived);
    }
}
