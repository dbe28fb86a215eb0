//! Atomic file output.
//!
//! The archive is written to a temp file in the destination directory
//! (same filesystem, so the final rename cannot cross devices), flushed and
//! synced, then renamed over the destination. Until the rename the
//! destination is untouched; on any error the temp file is removed when it
//! drops.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::Result;
use crate::options::SerializeOptions;

fn parent_dir_or_dot(path: &Path) -> &Path {
    // `Path::parent` is `Some("")` for a bare file name.
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Write `bytes` to `dest` atomically.
///
/// The cancellation token in `options` is checked once more right before
/// the rename, so a cancelled run never replaces the destination.
///
/// # Errors
/// [`XlcloneError::Io`](crate::XlcloneError::Io) on any filesystem failure;
/// [`XlcloneError::Cancelled`](crate::XlcloneError::Cancelled) if cancelled.
pub fn write_atomic(dest: impl AsRef<Path>, bytes: &[u8], options: &SerializeOptions) -> Result<()> {
    let dest = dest.as_ref();
    let dir = parent_dir_or_dot(dest);
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.as_file_mut().write_all(bytes)?;
    tmp.as_file_mut().flush()?;
    tmp.as_file().sync_all()?;

    options.check_cancelled()?;

    tmp.persist(dest).map_err(|e| e.error)?;

    // Directory sync is best-effort; the file is already in place.
    if let Ok(d) = fs::File::open(dir) {
        let _ = d.sync_all();
    }

    debug!(path = %dest.display(), bytes = bytes.len(), "wrote package");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::XlcloneError;
    use crate::options::CancellationToken;

    #[test]
    fn test_writes_and_replaces() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("out/book.xlsx");
        write_atomic(&dest, b"first", &SerializeOptions::default()).unwrap();
        write_atomic(&dest, b"second", &SerializeOptions::default()).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"second");
        // Only the destination is left behind.
        assert_eq!(fs::read_dir(dest.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn test_cancelled_write_leaves_destination_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("book.xlsx");
        fs::write(&dest, b"original").unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let options = SerializeOptions::new().cancellation(token);
        let err = write_atomic(&dest, b"new", &options).unwrap_err();

        assert!(matches!(err, XlcloneError::Cancelled));
        assert_eq!(fs::read(&dest).unwrap(), b"original");
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_unwritable_destination_leaves_no_file() {
        let tmp = tempfile::tempdir().unwrap();
        // A regular file where the parent directory should be.
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, b"").unwrap();
        let dest = blocker.join("book.xlsx");

        let err = write_atomic(&dest, b"data", &SerializeOptions::default()).unwrap_err();
        assert!(matches!(err, XlcloneError::Io(_)));
        assert!(!dest.exists());
    }
}
