//! Local image catalog.
//!
//! A thin layer over the image table. The supervisor only reads from it;
//! `build` and `rmi` are the only writers.

use std::path::{Path, PathBuf};

use minibox_common::config::HomeLayout;
use minibox_common::constants::MAX_IMAGE_NAME_LEN;
use minibox_common::error::{MiniboxError, Result};
use minibox_common::time::current_timestamp;
use minibox_common::types::{ContainerRecord, ImageRecord};
use minibox_store::Table;

/// Image catalog backed by the image table.
#[derive(Debug, Clone)]
pub struct ImageCatalog {
    images: Table<ImageRecord>,
    containers: Table<ContainerRecord>,
}

impl ImageCatalog {
    /// Binds the catalog to the tables of `layout`.
    #[must_use]
    pub fn open(layout: &HomeLayout) -> Self {
        Self {
            images: Table::open(layout.images_table()),
            containers: Table::open(layout.containers_table()),
        }
    }

    /// Whether an image called `name` is registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the image table cannot be read.
    pub fn exists(&self, name: &str) -> Result<bool> {
        self.images.contains(name)
    }

    /// Appends a new image record stamped with the current time.
    ///
    /// Does not check for collisions; call [`exists`](Self::exists) first.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded or appended.
    pub fn register(&self, name: &str, rootfs_path: &Path) -> Result<ImageRecord> {
        let record = ImageRecord {
            name: name.to_string(),
            rootfs_path: rootfs_path.to_path_buf(),
            created_at: current_timestamp(),
        };
        self.images.append(&record)?;
        tracing::info!(image = name, rootfs = %rootfs_path.display(), "image registered");
        Ok(record)
    }

    /// Returns the full record of `name`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the image is not registered.
    pub fn lookup(&self, name: &str) -> Result<ImageRecord> {
        self.images.find(name)
    }

    /// Returns the rootfs path of `name`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the image is not registered.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        self.lookup(name).map(|r| r.rootfs_path)
    }

    /// Lists all images in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the image table cannot be read.
    pub fn list(&self) -> Result<Vec<ImageRecord>> {
        self.images.scan()
    }

    /// Whether any container record, whatever its status, references `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the container table cannot be read.
    pub fn in_use(&self, name: &str) -> Result<bool> {
        Ok(self.containers.scan()?.iter().any(|c| c.image == name))
    }

    /// Deletes the record of `name`. The caller removes the rootfs copy.
    ///
    /// # Errors
    ///
    /// Returns `ImageInUse` if a container references the image and
    /// `NotFound` if it is not registered.
    pub fn remove(&self, name: &str) -> Result<ImageRecord> {
        if self.in_use(name)? {
            return Err(MiniboxError::ImageInUse {
                image: name.to_string(),
            });
        }
        let removed = self.images.delete(name)?;
        tracing::info!(image = name, "image unregistered");
        Ok(removed)
    }
}

/// Checks that `name` is a usable image name: 1 to 64 ASCII letters,
/// digits, `-` or `_`, starting with a letter.
///
/// # Errors
///
/// Returns `InvalidArgument` describing the first violated rule.
pub fn validate_image_name(name: &str) -> Result<()> {
    let invalid = |message: String| Err(MiniboxError::InvalidArgument { message });
    let Some(first) = name.chars().next() else {
        return invalid("image name is empty".into());
    };
    if name.len() > MAX_IMAGE_NAME_LEN {
        return invalid(format!(
            "image name too long (max {MAX_IMAGE_NAME_LEN} characters)"
        ));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return invalid(format!(
            "invalid character {bad:?} in image name; use letters, digits, '-' or '_'"
        ));
    }
    if !first.is_ascii_alphabetic() {
        return invalid("image name must start with a letter".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use minibox_common::types::{ContainerId, ContainerStatus};

    use super::*;

    fn setup() -> (tempfile::TempDir, HomeLayout, ImageCatalog) {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = HomeLayout::new(dir.path());
        layout.bootstrap().expect("bootstrap");
        let catalog = ImageCatalog::open(&layout);
        (dir, layout, catalog)
    }

    fn add_container(layout: &HomeLayout, id: &str, image: &str, status: ContainerStatus) {
        let mut rec = ContainerRecord::running(
            ContainerId::new(id),
            1,
            image,
            "2026-01-01T00:00:00".into(),
        );
        rec.status = status;
        Table::open(layout.containers_table())
            .append(&rec)
            .expect("append container");
    }

    #[test]
    fn catalog_empty_after_bootstrap() {
        let (_dir, _layout, catalog) = setup();
        assert!(catalog.list().expect("list").is_empty());
        assert!(!catalog.exists("alpine").expect("exists"));
    }

    #[test]
    fn register_and_resolve() {
        let (_dir, _layout, catalog) = setup();
        let rec = catalog
            .register("alpine", Path::new("/srv/alpine/rootfs"))
            .expect("register");
        assert_eq!(rec.created_at.len(), 19);
        assert!(catalog.exists("alpine").expect("exists"));
        assert_eq!(
            catalog.resolve("alpine").expect("resolve"),
            PathBuf::from("/srv/alpine/rootfs")
        );
    }

    #[test]
    fn resolve_unknown_is_not_found() {
        let (_dir, _layout, catalog) = setup();
        assert!(catalog.resolve("ghost").expect_err("absent").is_not_found());
    }

    #[test]
    fn in_use_ignores_container_status() {
        let (_dir, layout, catalog) = setup();
        add_container(&layout, "c1", "alpine", ContainerStatus::Exited);
        assert!(catalog.in_use("alpine").expect("in_use"));
        assert!(!catalog.in_use("debian").expect("in_use"));
    }

    #[test]
    fn remove_refuses_image_in_use() {
        let (_dir, layout, catalog) = setup();
        let _ = catalog
            .register("alpine", Path::new("/srv/alpine/rootfs"))
            .expect("register");
        add_container(&layout, "c1", "alpine", ContainerStatus::Killed);

        let err = catalog.remove("alpine").expect_err("in use");
        assert!(matches!(err, MiniboxError::ImageInUse { .. }));
        assert!(catalog.exists("alpine").expect("still there"));
    }

    #[test]
    fn remove_unused_image_keeps_others() {
        let (_dir, _layout, catalog) = setup();
        let _ = catalog
            .register("alpine", Path::new("/srv/a"))
            .expect("register");
        let _ = catalog
            .register("debian", Path::new("/srv/d"))
            .expect("register");

        let removed = catalog.remove("alpine").expect("remove");
        assert_eq!(removed.rootfs_path, PathBuf::from("/srv/a"));
        let names: Vec<_> = catalog
            .list()
            .expect("list")
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["debian"]);
        assert!(catalog.remove("alpine").expect_err("gone").is_not_found());
    }

    #[test]
    fn image_name_rules() {
        assert!(validate_image_name("alpine-3_19").is_ok());
        assert!(validate_image_name("").is_err());
        assert!(validate_image_name("9lives").is_err());
        assert!(validate_image_name("-dash").is_err());
        assert!(validate_image_name("has space").is_err());
        assert!(validate_image_name("pipe|name").is_err());
        assert!(validate_image_name(&"a".repeat(65)).is_err());
        assert!(validate_image_name(&"a".repeat(64)).is_ok());
    }
}
