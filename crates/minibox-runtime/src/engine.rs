//! Runtime engine: the single entry point the CLI drives.

use std::io::Write;
use std::path::Path;

use minibox_common::config::HomeLayout;
use minibox_common::error::{MiniboxError, Result};
use minibox_common::types::{ContainerId, ContainerRecord, ImageRecord};
use minibox_image::catalog::{ImageCatalog, validate_image_name};
use minibox_image::storage::{ImageStorage, directory_size};

use crate::audit::AuditLog;
use crate::lifecycle::{ContainerView, Lifecycle, StopOutcome};
use crate::logs::{LogFollower, LogsOutcome};
use crate::supervisor::{RunOutcome, RunRequest, Supervisor};

/// An image record with its on-disk size.
#[derive(Debug, Clone)]
pub struct ImageSummary {
    /// Catalog record.
    pub record: ImageRecord,
    /// Total bytes under the rootfs, `None` if it could not be measured.
    pub size: Option<u64>,
}

/// Coordinates images and containers for one home layout.
///
/// Holds no state besides paths: every call re-reads the tables.
#[derive(Debug, Clone)]
pub struct Engine {
    layout: HomeLayout,
    catalog: ImageCatalog,
    storage: ImageStorage,
    supervisor: Supervisor,
    lifecycle: Lifecycle,
    logs: LogFollower,
    audit: AuditLog,
}

impl Engine {
    /// Bootstraps `layout` on disk and opens an engine over it.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directories or tables cannot be created.
    pub fn open(layout: HomeLayout) -> Result<Self> {
        layout.bootstrap()?;
        tracing::debug!(home = %layout.base_dir().display(), "engine opened");
        Ok(Self {
            catalog: ImageCatalog::open(&layout),
            storage: ImageStorage::open(layout.images_dir()),
            supervisor: Supervisor::new(&layout),
            lifecycle: Lifecycle::new(&layout),
            logs: LogFollower::new(&layout),
            audit: AuditLog::open(&layout),
            layout,
        })
    }

    /// Home layout this engine works in.
    #[must_use]
    pub const fn layout(&self) -> &HomeLayout {
        &self.layout
    }

    /// Snapshots `source` as a new image called `name`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a bad name or a non-directory source,
    /// `NotFound` for a missing source, `AlreadyExists` on a name collision,
    /// or an I/O error from the copy.
    pub fn build(&self, name: &str, source: &Path) -> Result<ImageRecord> {
        validate_image_name(name)?;
        if !source.exists() {
            return Err(MiniboxError::NotFound {
                kind: "source directory",
                id: source.display().to_string(),
            });
        }
        if !source.is_dir() {
            return Err(MiniboxError::InvalidArgument {
                message: format!("{} is not a directory", source.display()),
            });
        }
        if self.catalog.exists(name)? {
            return Err(MiniboxError::AlreadyExists {
                kind: "image",
                id: name.to_string(),
            });
        }

        let rootfs = self.storage.import(name, source)?;
        let record = match self.catalog.register(name, &rootfs) {
            Ok(record) => record,
            Err(e) => {
                if let Err(cleanup) = self.storage.remove(name) {
                    tracing::warn!(image = name, error = %cleanup, "could not remove unregistered rootfs");
                }
                return Err(e);
            }
        };
        self.audit.record(format_args!(
            "BUILD image={name} source={} rootfs={}",
            source.display(),
            rootfs.display()
        ));
        Ok(record)
    }

    /// All images with their rootfs sizes.
    ///
    /// # Errors
    ///
    /// Returns an error if the image table cannot be read.
    pub fn images(&self) -> Result<Vec<ImageSummary>> {
        Ok(self
            .catalog
            .list()?
            .into_iter()
            .map(|record| {
                let size = match directory_size(&record.rootfs_path) {
                    Ok(size) => Some(size),
                    Err(e) => {
                        tracing::debug!(image = %record.name, error = %e, "cannot size rootfs");
                        None
                    }
                };
                ImageSummary { record, size }
            })
            .collect())
    }

    /// Unregisters `name` and deletes its rootfs copy.
    ///
    /// # Errors
    ///
    /// Returns `ImageInUse` if any container references it and `NotFound`
    /// if it is not registered.
    pub fn remove_image(&self, name: &str) -> Result<ImageRecord> {
        let record = self.catalog.remove(name)?;
        if let Err(e) = self.storage.remove(name) {
            tracing::warn!(image = name, error = %e, "image unregistered but its files remain");
        }
        self.audit.record(format_args!("RMI image={name}"));
        Ok(record)
    }

    /// Launches a container and blocks until it exits.
    ///
    /// # Errors
    ///
    /// See [`Supervisor::run`].
    pub fn run(
        &self,
        request: &RunRequest,
        on_started: impl FnOnce(&ContainerId, i32),
    ) -> Result<RunOutcome> {
        self.supervisor.run(request, on_started)
    }

    /// All containers with reconciled status.
    ///
    /// # Errors
    ///
    /// Returns an error if the container table cannot be read.
    pub fn list(&self) -> Result<Vec<ContainerView>> {
        self.lifecycle.list()
    }

    /// Stops a container.
    ///
    /// # Errors
    ///
    /// See [`Lifecycle::stop`].
    pub fn stop(&self, id: &str) -> Result<StopOutcome> {
        self.lifecycle.stop(id)
    }

    /// Removes a container record.
    ///
    /// # Errors
    ///
    /// See [`Lifecycle::remove`].
    pub fn remove(&self, id: &str) -> Result<ContainerRecord> {
        self.lifecycle.remove(id)
    }

    /// Streams a container's log to `out`.
    ///
    /// # Errors
    ///
    /// See [`LogFollower::stream`].
    pub fn logs(&self, id: &str, follow: bool, out: &mut impl Write) -> Result<LogsOutcome> {
        self.logs.stream(id, follow, out)
    }
}

/// Parses a memory size such as `16M`, `512KiB`, `1GB` or `1048576` into bytes.
///
/// Single-letter and `iB` suffixes are binary multiples; `KB`/`MB`/`GB` are
/// decimal. Suffixes are case-insensitive.
///
/// # Errors
///
/// Returns `InvalidArgument` for an unknown suffix, a non-numeric or zero
/// value, or a size that overflows `u64`.
pub fn parse_memory(s: &str) -> Result<u64> {
    const KIB: u64 = 1024;
    const UNITS: &[(&str, u64)] = &[
        ("KIB", KIB),
        ("MIB", KIB * KIB),
        ("GIB", KIB * KIB * KIB),
        ("KB", 1_000),
        ("MB", 1_000_000),
        ("GB", 1_000_000_000),
        ("K", KIB),
        ("M", KIB * KIB),
        ("G", KIB * KIB * KIB),
        ("B", 1),
    ];

    let invalid = || MiniboxError::InvalidArgument {
        message: format!("invalid memory size {s:?} (expected e.g. 512K, 16M, 1GiB)"),
    };
    let upper = s.trim().to_ascii_uppercase();
    let (digits, multiplier) = UNITS
        .iter()
        .find_map(|(suffix, mult)| upper.strip_suffix(suffix).map(|n| (n, *mult)))
        .unwrap_or((upper.as_str(), 1));
    let value: u64 = digits.trim().parse().map_err(|_| invalid())?;
    if value == 0 {
        return Err(invalid());
    }
    value.checked_mul(multiplier).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, Engine) {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Engine::open(HomeLayout::new(dir.path().join("home"))).expect("open");
        (dir, engine)
    }

    fn source_tree(dir: &Path) -> std::path::PathBuf {
        let src = dir.join("src");
        std::fs::create_dir_all(src.join("bin")).expect("mkdir");
        std::fs::write(src.join("bin/hello"), "hello").expect("write");
        src
    }

    #[test]
    fn parse_memory_units() {
        assert_eq!(parse_memory("1048576").expect("bytes"), 1_048_576);
        assert_eq!(parse_memory("512K").expect("K"), 512 * 1024);
        assert_eq!(parse_memory("16M").expect("M"), 16 * 1024 * 1024);
        assert_eq!(parse_memory("16m").expect("lowercase"), 16 * 1024 * 1024);
        assert_eq!(parse_memory("1G").expect("G"), 1024 * 1024 * 1024);
        assert_eq!(parse_memory("128MiB").expect("MiB"), 128 * 1024 * 1024);
        assert_eq!(parse_memory("1GiB").expect("GiB"), 1024 * 1024 * 1024);
        assert_eq!(parse_memory("256MB").expect("MB"), 256_000_000);
        assert_eq!(parse_memory("2KB").expect("KB"), 2_000);
    }

    #[test]
    fn parse_memory_rejects_garbage() {
        for bad in ["", "abc", "12X", "-5M", "0", "M", "99999999999999999999G"] {
            assert!(
                matches!(parse_memory(bad), Err(MiniboxError::InvalidArgument { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn open_bootstraps_home() {
        let (_dir, engine) = setup();
        assert!(engine.layout().images_table().is_file());
        assert!(engine.layout().containers_table().is_file());
        assert!(engine.layout().logs_dir().is_dir());
    }

    #[test]
    fn build_list_and_remove_image() {
        let (dir, engine) = setup();
        let src = source_tree(dir.path());

        let record = engine.build("alpine", &src).expect("build");
        assert!(record.rootfs_path.join("bin/hello").is_file());

        let images = engine.images().expect("images");
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].size, Some(5));

        let _ = engine.remove_image("alpine").expect("rmi");
        assert!(engine.images().expect("images").is_empty());
        assert!(!record.rootfs_path.exists());

        let audit = std::fs::read_to_string(engine.layout().audit_log()).expect("audit");
        assert!(audit.contains("BUILD image=alpine"));
        assert!(audit.contains("RMI image=alpine"));
    }

    #[test]
    fn build_rejects_duplicates_and_bad_input() {
        let (dir, engine) = setup();
        let src = source_tree(dir.path());
        let _ = engine.build("alpine", &src).expect("build");

        assert!(matches!(
            engine.build("alpine", &src),
            Err(MiniboxError::AlreadyExists { .. })
        ));
        assert!(matches!(
            engine.build("9lives", &src),
            Err(MiniboxError::InvalidArgument { .. })
        ));
        assert!(engine.build("ghost", &dir.path().join("nope")).expect_err("missing").is_not_found());
        assert!(matches!(
            engine.build("file", &src.join("bin/hello")),
            Err(MiniboxError::InvalidArgument { .. })
        ));
        assert_eq!(engine.images().expect("images").len(), 1);
    }

    #[test]
    fn image_size_is_none_when_rootfs_vanished() {
        let (dir, engine) = setup();
        let record = engine.build("alpine", &source_tree(dir.path())).expect("build");
        std::fs::remove_dir_all(&record.rootfs_path).expect("remove rootfs");
        assert_eq!(engine.images().expect("images")[0].size, None);
    }

    #[test]
    fn remove_unknown_image_is_not_found() {
        let (_dir, engine) = setup();
        assert!(engine.remove_image("ghost").expect_err("unknown").is_not_found());
    }
}
