//! Container table access.
//!
//! Wraps the generic record table with the container-specific operations:
//! id allocation, launch registration, exit finalization and stop
//! verdicts.

use minibox_common::config::HomeLayout;
use minibox_common::error::Result;
use minibox_common::types::{ContainerId, ContainerRecord, ContainerStatus};
use minibox_store::Table;

/// The persistent container table.
#[derive(Debug, Clone)]
pub struct ContainerTable {
    table: Table<ContainerRecord>,
}

impl ContainerTable {
    /// Binds the container table of `layout`.
    #[must_use]
    pub fn open(layout: &HomeLayout) -> Self {
        Self {
            table: Table::open(layout.containers_table()),
        }
    }

    /// Allocates the next id: one past the highest `c<N>` in the table, or
    /// `c1` for an empty or absent table.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read.
    pub fn next_id(&self) -> Result<ContainerId> {
        let max = self
            .table
            .scan()?
            .iter()
            .filter_map(|r| r.id.sequence())
            .max()
            .unwrap_or(0);
        Ok(ContainerId::from_sequence(max + 1))
    }

    /// Persists a freshly launched record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be appended.
    pub fn insert(&self, record: &ContainerRecord) -> Result<()> {
        self.table.append(record)
    }

    /// Looks a container up by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no record has this id.
    pub fn get(&self, id: &str) -> Result<ContainerRecord> {
        self.table.find(id)
    }

    /// All records in launch order.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read.
    pub fn list(&self) -> Result<Vec<ContainerRecord>> {
        self.table.scan()
    }

    /// Records the reaped exit of a container.
    ///
    /// `end_time` and `exit_code` are only filled when still absent, and the
    /// status only moves `running → exited`; a verdict already written by
    /// `stop` is kept.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the record vanished, or an I/O error.
    pub fn finalize_exit(&self, id: &str, exit_code: i32, end_time: &str) -> Result<ContainerRecord> {
        self.table.update_fields(id, |r| {
            if r.status == ContainerStatus::Running {
                r.status = ContainerStatus::Exited;
            }
            if r.end_time.is_none() {
                r.end_time = Some(end_time.to_string());
            }
            if r.exit_code.is_none() {
                r.exit_code = Some(exit_code);
            }
        })
    }

    /// Records the outcome decided by `stop`. `end_time` is only filled
    /// when still absent.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the record vanished, or an I/O error.
    pub fn mark_terminated(
        &self,
        id: &str,
        status: ContainerStatus,
        end_time: &str,
    ) -> Result<ContainerRecord> {
        self.table.update_fields(id, |r| {
            r.status = status;
            if r.end_time.is_none() {
                r.end_time = Some(end_time.to_string());
            }
        })
    }

    /// Deletes a record.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no record has this id.
    pub fn remove(&self, id: &str) -> Result<ContainerRecord> {
        self.table.delete(id)
    }
}
