//! Atomic file writing via tempfile + rename.
//!
//! Uses [`tempfile::NamedTempFile`] to write to a temporary file in the same
//! directory as the target, then renames it over the target. A crash or kill
//! mid-write leaves either the old content or the new content on disk.
//!
//! Renaming swaps in a new inode, so two cases write in place instead:
//! a hard-linked target (other links would keep the old content) and a
//! directory the caller may not create files in or rename within.

use std::fs::{Metadata, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

/// Atomically replace the contents of `path` with `content`.
///
/// Symlinks are resolved first so the link target is rewritten rather than
/// the link itself. When `path` already exists its permissions and owner are
/// carried over to the replacement file. Existing files that cannot be
/// replaced by rename are truncated and rewritten in place.
///
/// # Errors
///
/// Returns an error if the parent directory doesn't exist, writing fails,
/// or the rename fails (e.g., cross-device).
pub fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let target = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let meta = std::fs::metadata(&target).ok();

    if meta.as_ref().is_some_and(is_hard_linked) {
        debug!(path = %target.display(), "hard-linked target, writing in place");
        return write_in_place(&target, content);
    }

    match replace_via_rename(&target, content, meta.as_ref()) {
        Err(e) if meta.is_some() && is_permission_denied(&e) => {
            debug!(
                path = %target.display(),
                error = %format!("{e:#}"),
                "rename not permitted, writing in place"
            );
            write_in_place(&target, content)
        }
        result => result,
    }
}

fn replace_via_rename(target: &Path, content: &str, meta: Option<&Metadata>) -> Result<()> {
    let parent = target
        .parent()
        .with_context(|| format!("no parent directory for {}", target.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;

    tmp.write_all(content.as_bytes())
        .with_context(|| format!("failed to write to temp file for {}", target.display()))?;

    tmp.flush()
        .with_context(|| format!("failed to flush temp file for {}", target.display()))?;

    if let Some(meta) = meta {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .with_context(|| format!("failed to copy permissions of {}", target.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            std::os::unix::fs::fchown(tmp.as_file(), Some(meta.uid()), Some(meta.gid()))
                .with_context(|| format!("failed to copy owner of {}", target.display()))?;
        }
    }

    tmp.persist(target)
        .map_err(|e| e.error)
        .with_context(|| format!("failed to atomically replace {}", target.display()))?;

    Ok(())
}

/// Truncate the existing file and write `content` into the same inode.
fn write_in_place(target: &Path, content: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(target)
        .with_context(|| format!("failed to open {} for writing", target.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("failed to write {}", target.display()))?;
    file.flush()
        .with_context(|| format!("failed to flush {}", target.display()))
}

#[cfg(unix)]
fn is_hard_linked(meta: &Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    meta.nlink() > 1
}

#[cfg(not(unix))]
fn is_hard_linked(_meta: &Metadata) -> bool {
    false
}

fn is_permission_denied(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<io::Error>())
        .any(|e| e.kind() == io::ErrorKind::PermissionDenied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overwrites_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "old").expect("write");

        atomic_write(&path, "new").expect("atomic write");

        assert_eq!(std::fs::read_to_string(&path).expect("read"), "new");
        // No stray temp files left behind.
        assert_eq!(std::fs::read_dir(dir.path()).expect("read_dir").count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("script.sh");
        std::fs::write(&path, "echo hi\n").expect("write");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod");

        atomic_write(&path, "echo bye\n").expect("atomic write");

        let mode = std::fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[cfg(unix)]
    #[test]
    fn test_writes_through_symlink() {
        let dir = tempfile::tempdir().expect("tempdir");
        let real = dir.path().join("real.txt");
        let link = dir.path().join("link.txt");
        std::fs::write(&real, "before").expect("write");
        std::os::unix::fs::symlink(&real, &link).expect("symlink");

        atomic_write(&link, "after").expect("atomic write");

        assert!(std::fs::symlink_metadata(&link).expect("lstat").file_type().is_symlink());
        assert_eq!(std::fs::read_to_string(&real).expect("read"), "after");
    }

    #[cfg(unix)]
    #[test]
    fn test_hard_link_sees_new_content() {
        use std::os::unix::fs::MetadataExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.txt");
        let other = dir.path().join("b.txt");
        std::fs::write(&path, "old").expect("write");
        std::fs::hard_link(&path, &other).expect("hard link");
        let inode = std::fs::metadata(&path).expect("metadata").ino();

        atomic_write(&path, "new").expect("atomic write");

        assert_eq!(std::fs::read_to_string(&other).expect("read"), "new");
        assert_eq!(std::fs::metadata(&path).expect("metadata").ino(), inode);
    }

    #[cfg(unix)]
    #[test]
    fn test_preserves_owner() {
        use std::os::unix::fs::MetadataExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("owned.txt");
        std::fs::write(&path, "old").expect("write");
        if std::fs::metadata(&path).expect("metadata").uid() != 0 {
            // Changing ownership needs root.
            return;
        }
        std::os::unix::fs::chown(&path, Some(1000), Some(1000)).expect("chown");

        atomic_write(&path, "new").expect("atomic write");

        let meta = std::fs::metadata(&path).expect("metadata");
        assert_eq!((meta.uid(), meta.gid()), (1000, 1000));
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "new");
    }

    #[cfg(unix)]
    #[test]
    fn test_read_only_directory_writes_in_place() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).expect("mkdir");
        let path = locked.join("a.txt");
        std::fs::write(&path, "old").expect("write");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555))
            .expect("chmod");

        let result = atomic_write(&path, "new");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755))
            .expect("chmod");

        result.expect("atomic write");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "new");
        assert_eq!(std::fs::read_dir(&locked).expect("read_dir").count(), 1);
    }

    #[test]
    fn test_permission_denied_is_found_in_context_chain() {
        let err = anyhow::Error::new(io::Error::from(io::ErrorKind::PermissionDenied))
            .context("failed to create temp file");
        assert!(is_permission_denied(&err));

        let err = anyhow::Error::new(io::Error::from(io::ErrorKind::NotFound))
            .context("failed to create temp file");
        assert!(!is_permission_denied(&err));
    }
}
