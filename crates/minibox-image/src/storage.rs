//! On-disk storage of image root filesystems.
//!
//! Every image owns `<images_dir>/<name>/rootfs`, a private copy of the
//! directory it was built from.

use std::fs;
use std::path::{Path, PathBuf};

use minibox_common::error::{MiniboxError, Result};
use walkdir::WalkDir;

/// Manages the owned rootfs copies under the images directory.
#[derive(Debug, Clone)]
pub struct ImageStorage {
    root: PathBuf,
}

impl ImageStorage {
    /// Binds storage to `root` (the layout's images directory).
    #[must_use]
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory owned by image `name`.
    #[must_use]
    pub fn image_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Rootfs copy of image `name`.
    #[must_use]
    pub fn rootfs_path(&self, name: &str) -> PathBuf {
        self.image_dir(name).join("rootfs")
    }

    /// Copies `source` into the rootfs of `name` and returns the new path.
    ///
    /// On failure the partial copy is removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy fails.
    pub fn import(&self, name: &str, source: &Path) -> Result<PathBuf> {
        let rootfs = self.rootfs_path(name);
        tracing::info!(source = %source.display(), target = %rootfs.display(), "importing rootfs");
        if let Err(e) = copy_directory_tree(source, &rootfs) {
            if let Err(cleanup) = fs::remove_dir_all(self.image_dir(name)) {
                tracing::warn!(error = %cleanup, image = name, "could not remove partial import");
            }
            return Err(e);
        }
        Ok(rootfs)
    }

    /// Deletes the directory owned by image `name`. Missing is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    pub fn remove(&self, name: &str) -> Result<()> {
        let dir = self.image_dir(name);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MiniboxError::io(dir, e)),
        }
    }
}

/// Recursively copies `src` into `dst`.
///
/// Directories are recreated with their permission bits, regular files are
/// copied with theirs, and symlinks are recreated verbatim. Other entry
/// types (devices, fifos, sockets) are skipped with a warning.
///
/// # Errors
///
/// Returns `InvalidArgument` if `src` is not a directory and `Io` for any
/// failed filesystem operation.
pub fn copy_directory_tree(src: &Path, dst: &Path) -> Result<()> {
    let meta = fs::metadata(src).map_err(|e| MiniboxError::io(src, e))?;
    if !meta.is_dir() {
        return Err(MiniboxError::InvalidArgument {
            message: format!("{} is not a directory", src.display()),
        });
    }

    // Directory modes are applied last so read-only directories can still
    // be filled.
    let mut dir_modes = Vec::new();
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| walk_error(src, e))?;
        let from = entry.path();
        let relative = from
            .strip_prefix(src)
            .map_err(|_| MiniboxError::InvalidArgument {
                message: format!("{} is outside {}", from.display(), src.display()),
            })?;
        let to = dst.join(relative);
        let kind = entry.file_type();

        if kind.is_dir() {
            fs::create_dir_all(&to).map_err(|e| MiniboxError::io(&to, e))?;
            let mode = entry.metadata().map_err(|e| walk_error(src, e))?.permissions();
            dir_modes.push((to, mode));
        } else if kind.is_file() {
            let _bytes = fs::copy(from, &to).map_err(|e| MiniboxError::io(from, e))?;
        } else if kind.is_symlink() {
            let target = fs::read_link(from).map_err(|e| MiniboxError::io(from, e))?;
            std::os::unix::fs::symlink(&target, &to).map_err(|e| MiniboxError::io(&to, e))?;
        } else {
            tracing::warn!(path = %from.display(), "skipping special file");
        }
    }

    for (dir, mode) in dir_modes.into_iter().rev() {
        fs::set_permissions(&dir, mode).map_err(|e| MiniboxError::io(&dir, e))?;
    }
    Ok(())
}

/// Total size in bytes of the regular files below `path`. Symlinks are
/// not followed.
///
/// # Errors
///
/// Returns an error if `path` or any directory below it cannot be read.
pub fn directory_size(path: &Path) -> Result<u64> {
    let mut total = 0;
    for entry in WalkDir::new(path).follow_links(false) {
        let entry = entry.map_err(|e| walk_error(path, e))?;
        if entry.file_type().is_file() {
            total += entry.metadata().map_err(|e| walk_error(path, e))?.len();
        }
    }
    Ok(total)
}

fn walk_error(root: &Path, error: walkdir::Error) -> MiniboxError {
    let path = error.path().unwrap_or(root).to_path_buf();
    MiniboxError::io(path, std::io::Error::from(error))
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use super::*;

    fn sample_tree(root: &Path) {
        fs::create_dir_all(root.join("bin")).expect("mkdir bin");
        fs::create_dir_all(root.join("etc/conf.d")).expect("mkdir etc");
        fs::write(root.join("bin/app"), b"#!/bin/sh\necho hi\n").expect("write app");
        fs::set_permissions(root.join("bin/app"), fs::Permissions::from_mode(0o755))
            .expect("chmod");
        fs::write(root.join("etc/conf.d/app.conf"), b"key=value\n").expect("write conf");
        std::os::unix::fs::symlink("app", root.join("bin/app-link")).expect("symlink");
    }

    #[test]
    fn storage_paths_nest_under_root() {
        let storage = ImageStorage::open("/srv/images");
        assert_eq!(
            storage.rootfs_path("alpine"),
            PathBuf::from("/srv/images/alpine/rootfs")
        );
        assert_eq!(storage.image_dir("alpine"), PathBuf::from("/srv/images/alpine"));
    }

    #[test]
    fn copy_preserves_files_modes_and_links() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        sample_tree(&src);

        copy_directory_tree(&src, &dst).expect("copy");

        assert_eq!(
            fs::read(dst.join("etc/conf.d/app.conf")).expect("read"),
            b"key=value\n"
        );
        let mode = fs::metadata(dst.join("bin/app"))
            .expect("meta")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
        assert_eq!(
            fs::read_link(dst.join("bin/app-link")).expect("link"),
            PathBuf::from("app")
        );
    }

    #[test]
    fn copy_of_a_file_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("plain");
        fs::write(&file, b"x").expect("write");
        let err = copy_directory_tree(&file, &dir.path().join("out")).expect_err("not a dir");
        assert!(matches!(err, MiniboxError::InvalidArgument { .. }));
    }

    #[test]
    fn import_and_remove_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("src");
        sample_tree(&src);
        let storage = ImageStorage::open(dir.path().join("images"));

        let rootfs = storage.import("alpine", &src).expect("import");
        assert!(rootfs.join("bin/app").is_file());

        storage.remove("alpine").expect("remove");
        assert!(!storage.image_dir("alpine").exists());
        storage.remove("alpine").expect("second remove is a no-op");
    }

    #[test]
    fn copy_fills_read_only_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("src");
        sample_tree(&src);
        fs::set_permissions(src.join("etc"), fs::Permissions::from_mode(0o555)).expect("chmod");
        let dst = dir.path().join("dst");

        copy_directory_tree(&src, &dst).expect("copy");

        assert!(dst.join("etc/conf.d/app.conf").is_file());
        let mode = fs::metadata(dst.join("etc")).expect("meta").permissions().mode();
        assert_eq!(mode & 0o777, 0o555);

        for root in [&src, &dst] {
            fs::set_permissions(root.join("etc"), fs::Permissions::from_mode(0o755))
                .expect("restore");
        }
    }

    #[test]
    fn size_of_missing_tree_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(directory_size(&dir.path().join("gone")).is_err());
    }

    #[test]
    fn size_counts_regular_files_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        sample_tree(dir.path());
        let expected = (b"#!/bin/sh\necho hi\n".len() + b"key=value\n".len()) as u64;
        assert_eq!(directory_size(dir.path()).expect("size"), expected);
    }
}
