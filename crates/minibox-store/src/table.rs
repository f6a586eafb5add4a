//! Generic pipe-delimited table.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use minibox_common::constants::FIELD_DELIMITER;
use minibox_common::error::{MiniboxError, Result};

/// A value stored as one line of a [`Table`].
pub trait Record: Sized + Clone {
    /// Resource name used in `NotFound` errors.
    const KIND: &'static str;

    /// Number of fields of a well-formed line.
    const FIELD_COUNT: usize;

    /// Value of the key field (the first field).
    fn key(&self) -> &str;

    /// Fields in on-disk order.
    fn to_fields(&self) -> Vec<String>;

    /// Parses a split line. `None` marks the line as malformed.
    fn from_fields(fields: &[&str]) -> Option<Self>;
}

/// Flat persistent table of `R` records.
#[derive(Debug, Clone)]
pub struct Table<R> {
    path: PathBuf,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Table<R> {
    /// Binds a table to its backing file. The file is created lazily.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: PhantomData,
        }
    }

    /// Backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `record` as a new line, creating the file if absent.
    ///
    /// No uniqueness check is performed; callers check for collisions
    /// beforehand.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a field contains the delimiter or a
    /// newline, and `Io` if the file cannot be written.
    pub fn append(&self, record: &R) -> Result<()> {
        let line = encode(record)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| MiniboxError::io(&self.path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| MiniboxError::io(&self.path, e))?;
        tracing::debug!(table = %self.path.display(), key = record.key(), "record appended");
        Ok(())
    }

    /// Returns every well-formed record in file order.
    ///
    /// A missing file reads as an empty table; malformed lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file exists but cannot be read.
    pub fn scan(&self) -> Result<Vec<R>> {
        let Some(reader) = self.reader()? else {
            return Ok(Vec::new());
        };
        let mut records = Vec::new();
        for line in reader.split(b'\n') {
            let line = line.map_err(|e| MiniboxError::io(&self.path, e))?;
            if let Some(record) = decode(&line) {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Returns the first record whose key equals `key`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no record matches, `Io` on read failure.
    pub fn find(&self, key: &str) -> Result<R> {
        self.scan()?
            .into_iter()
            .find(|r| r.key() == key)
            .ok_or_else(|| not_found::<R>(key))
    }

    /// Whether a record with `key` exists.
    ///
    /// # Errors
    ///
    /// Returns `Io` on read failure.
    pub fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.scan()?.iter().any(|r| r.key() == key))
    }

    /// Applies `mutator` to the first record keyed `key` and atomically
    /// rewrites the table. Returns the updated record.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no record matched (the table is untouched),
    /// `InvalidArgument` if the mutator changed the key or produced an
    /// unencodable field, and `Io` if reading, writing, or the final
    /// rename fails.
    pub fn update_fields(&self, key: &str, mutator: impl FnOnce(&mut R)) -> Result<R> {
        self.rewrite(key, |mut record| {
            mutator(&mut record);
            if record.key() != key {
                return Err(MiniboxError::InvalidArgument {
                    message: format!("{} key {key} is immutable", R::KIND),
                });
            }
            Ok((Some(record.clone()), record))
        })
    }

    /// Removes the first record keyed `key` and atomically rewrites the
    /// table. Returns the removed record.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no record matched (the table is untouched),
    /// and `Io` if reading, writing, or the final rename fails.
    pub fn delete(&self, key: &str) -> Result<R> {
        self.rewrite(key, |record| Ok((None, record)))
    }

    /// Streams the table into a sibling temporary file, passing the first
    /// record keyed `key` through `edit`. `edit` returns the replacement
    /// line (`None` drops the record) and the value to hand back. Unmatched
    /// and malformed lines are copied verbatim, preserving order.
    ///
    /// The temporary file replaces the original only after it has been
    /// fully written and synced; on any early return it is dropped, which
    /// removes it.
    fn rewrite<T>(&self, key: &str, edit: impl FnOnce(R) -> Result<(Option<R>, T)>) -> Result<T> {
        let Some(reader) = self.reader()? else {
            return Err(not_found::<R>(key));
        };
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let temp = tempfile::Builder::new()
            .prefix(&format!(".{}.", file_name(&self.path)))
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| MiniboxError::io(dir, e))?;
        let mut out = BufWriter::new(temp);

        let mut edit = Some(edit);
        let mut outcome = None;
        for line in reader.split(b'\n') {
            let mut line = line.map_err(|e| MiniboxError::io(&self.path, e))?;
            let output = match decode::<R>(&line) {
                Some(record) if record.key() == key && edit.is_some() => {
                    let Some(edit) = edit.take() else { continue };
                    let (replacement, value) = edit(record)?;
                    outcome = Some(value);
                    replacement
                        .as_ref()
                        .map(encode)
                        .transpose()?
                        .map(String::into_bytes)
                }
                _ => {
                    line.push(b'\n');
                    Some(line)
                }
            };
            if let Some(output) = output {
                out.write_all(&output)
                    .map_err(|e| MiniboxError::io(&self.path, e))?;
            }
        }

        let Some(value) = outcome else {
            return Err(not_found::<R>(key));
        };

        let temp = out
            .into_inner()
            .map_err(|e| MiniboxError::io(&self.path, e.into_error()))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| MiniboxError::io(temp.path(), e))?;
        let _file = temp
            .persist(&self.path)
            .map_err(|e| MiniboxError::io(&self.path, e.error))?;
        tracing::debug!(table = %self.path.display(), key, "table rewritten");
        Ok(value)
    }

    fn reader(&self) -> Result<Option<BufReader<File>>> {
        match File::open(&self.path) {
            Ok(file) => Ok(Some(BufReader::new(file))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MiniboxError::io(&self.path, e)),
        }
    }
}

fn encode<R: Record>(record: &R) -> Result<String> {
    let fields = record.to_fields();
    if let Some(bad) = fields
        .iter()
        .find(|f| f.contains(FIELD_DELIMITER) || f.contains('\n'))
    {
        return Err(MiniboxError::InvalidArgument {
            message: format!("{} field may not contain '|' or a newline: {bad:?}", R::KIND),
        });
    }
    let mut line = fields.join(&FIELD_DELIMITER.to_string());
    line.push('\n');
    Ok(line)
}

/// Parses one raw line. Lines that are not UTF-8 are malformed too.
fn decode<R: Record>(line: &[u8]) -> Option<R> {
    let line = std::str::from_utf8(line).ok()?;
    let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
    if fields.len() != R::FIELD_COUNT {
        return None;
    }
    R::from_fields(&fields)
}

fn not_found<R: Record>(key: &str) -> MiniboxError {
    MiniboxError::NotFound {
        kind: R::KIND,
        id: key.to_string(),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| "table".into(), |n| n.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use minibox_common::types::{ContainerId, ContainerRecord, ContainerStatus, ImageRecord};

    use super::*;

    fn record(id: &str, pid: i32) -> ContainerRecord {
        ContainerRecord::running(ContainerId::new(id), pid, "alpine", "2026-01-01T00:00:00".into())
    }

    fn table(dir: &Path) -> Table<ContainerRecord> {
        Table::open(dir.join("containers.db"))
    }

    fn leftover_temp_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .expect("read_dir")
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count()
    }

    #[test]
    fn missing_file_scans_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(table(dir.path()).scan().expect("scan").is_empty());
    }

    #[test]
    fn append_then_find_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let t = table(dir.path());
        t.append(&record("c1", 100)).expect("append");
        t.append(&record("c2", 200)).expect("append");

        assert_eq!(t.find("c2").expect("find"), record("c2", 200));
        assert!(t.find("c3").expect_err("absent").is_not_found());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let t = table(dir.path());
        std::fs::write(
            t.path(),
            "garbage\nc1|100|alpine|running|2026-01-01T00:00:00||-1\nc2|x|y\n\n",
        )
        .expect("seed");

        let all = t.scan().expect("scan");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id.as_str(), "c1");
    }

    #[test]
    fn non_utf8_lines_are_skipped_and_preserved() {
        let dir = tempfile::tempdir().expect("tempdir");
        let t = table(dir.path());
        let mut seed = b"c1|100|alpine|running|2026-01-01T00:00:00||-1\n".to_vec();
        let bad_line = b"c2|200|\xff\xfe|running|2026-01-01T00:00:00||-1\n";
        seed.extend_from_slice(bad_line);
        std::fs::write(t.path(), &seed).expect("seed");

        let all = t.scan().expect("scan");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id.as_str(), "c1");

        let updated = t
            .update_fields("c1", |r| r.status = ContainerStatus::Exited)
            .expect("update");
        assert_eq!(updated.status, ContainerStatus::Exited);

        let bytes = std::fs::read(t.path()).expect("read");
        assert!(bytes.ends_with(bad_line));
        assert!(t.find("c2").expect_err("undecodable").is_not_found());
    }

    #[test]
    fn update_rewrites_only_the_matching_line_in_place() {
        let dir = tempfile::tempdir().expect("tempdir");
        let t = table(dir.path());
        for (id, pid) in [("c1", 1), ("c2", 2), ("c3", 3)] {
            t.append(&record(id, pid)).expect("append");
        }

        let updated = t
            .update_fields("c2", |r| {
                r.status = ContainerStatus::Exited;
                r.exit_code = Some(0);
            })
            .expect("update");
        assert_eq!(updated.status, ContainerStatus::Exited);

        let ids: Vec<_> = t.scan().expect("scan").into_iter().map(|r| r.id).collect();
        assert_eq!(ids, ["c1", "c2", "c3"].map(ContainerId::new));
        assert_eq!(t.find("c1").expect("c1").status, ContainerStatus::Running);
        assert_eq!(t.find("c2").expect("c2").exit_code, Some(0));
        assert_eq!(leftover_temp_files(dir.path()), 0);
    }

    #[test]
    fn update_preserves_malformed_lines_verbatim() {
        let dir = tempfile::tempdir().expect("tempdir");
        let t = table(dir.path());
        std::fs::write(
            t.path(),
            "# operator note\nc1|100|alpine|running|2026-01-01T00:00:00||-1\n",
        )
        .expect("seed");

        let _ = t
            .update_fields("c1", |r| r.status = ContainerStatus::Stopped)
            .expect("update");
        let content = std::fs::read_to_string(t.path()).expect("read");
        assert!(content.starts_with("# operator note\n"));
        assert!(content.contains("|stopped|"));
    }

    #[test]
    fn update_of_missing_key_leaves_table_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let t = table(dir.path());
        t.append(&record("c1", 1)).expect("append");
        let before = std::fs::read(t.path()).expect("read");

        let err = t
            .update_fields("c9", |r| r.status = ContainerStatus::Killed)
            .expect_err("missing");
        assert!(err.is_not_found());
        assert_eq!(std::fs::read(t.path()).expect("read"), before);
        assert_eq!(leftover_temp_files(dir.path()), 0);
    }

    #[test]
    fn update_may_not_change_the_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let t = table(dir.path());
        t.append(&record("c1", 1)).expect("append");
        let before = std::fs::read(t.path()).expect("read");

        let err = t
            .update_fields("c1", |r| r.id = ContainerId::new("c7"))
            .expect_err("key change");
        assert!(matches!(err, MiniboxError::InvalidArgument { .. }));
        assert_eq!(std::fs::read(t.path()).expect("read"), before);
    }

    #[test]
    fn interrupted_rewrite_keeps_original_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let t = table(dir.path());
        t.append(&record("c1", 1)).expect("append");
        t.append(&record("c2", 2)).expect("append");
        let before = std::fs::read(t.path()).expect("read");

        let result = catch_unwind(AssertUnwindSafe(|| {
            t.update_fields("c1", |_| panic!("crash between temp write and rename"))
        }));
        assert!(result.is_err());
        assert_eq!(std::fs::read(t.path()).expect("read"), before);
        assert_eq!(leftover_temp_files(dir.path()), 0);
    }

    #[test]
    fn delete_drops_only_the_matching_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let t = table(dir.path());
        for (id, pid) in [("c1", 1), ("c2", 2), ("c3", 3)] {
            t.append(&record(id, pid)).expect("append");
        }

        let removed = t.delete("c2").expect("delete");
        assert_eq!(removed.pid, 2);
        let ids: Vec<_> = t.scan().expect("scan").into_iter().map(|r| r.id).collect();
        assert_eq!(ids, ["c1", "c3"].map(ContainerId::new));
        assert!(t.delete("c2").expect_err("gone").is_not_found());
    }

    #[test]
    fn delete_on_missing_table_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(table(dir.path()).delete("c1").expect_err("no file").is_not_found());
    }

    #[test]
    fn append_rejects_delimiter_in_field() {
        let dir = tempfile::tempdir().expect("tempdir");
        let images: Table<ImageRecord> = Table::open(dir.path().join("images.db"));
        let err = images
            .append(&ImageRecord {
                name: "alpine".into(),
                rootfs_path: "/tmp/a|b".into(),
                created_at: "2026-01-01T00:00:00".into(),
            })
            .expect_err("delimiter");
        assert!(matches!(err, MiniboxError::InvalidArgument { .. }));
        assert!(!images.path().exists());
    }
}
