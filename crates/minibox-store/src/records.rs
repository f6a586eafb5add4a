//! [`Record`] encodings of the container and image tables.

use std::path::PathBuf;

use minibox_common::constants::EXIT_CODE_UNSET;
use minibox_common::types::{ContainerId, ContainerRecord, ImageRecord};

use crate::table::Record;

impl Record for ContainerRecord {
    const KIND: &'static str = "container";
    const FIELD_COUNT: usize = 7;

    fn key(&self) -> &str {
        self.id.as_str()
    }

    fn to_fields(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.pid.to_string(),
            self.image.clone(),
            self.status.to_string(),
            self.start_time.clone(),
            self.end_time.clone().unwrap_or_default(),
            self.exit_code.unwrap_or(EXIT_CODE_UNSET).to_string(),
        ]
    }

    fn from_fields(fields: &[&str]) -> Option<Self> {
        let [id, pid, image, status, start_time, end_time, exit_code] = fields else {
            return None;
        };
        if id.is_empty() {
            return None;
        }
        let exit_code: i32 = exit_code.trim().parse().ok()?;
        Some(Self {
            id: ContainerId::new(*id),
            pid: pid.parse().ok()?,
            image: (*image).to_string(),
            status: status.parse().ok()?,
            start_time: (*start_time).to_string(),
            end_time: (!end_time.is_empty()).then(|| (*end_time).to_string()),
            exit_code: (exit_code != EXIT_CODE_UNSET).then_some(exit_code),
        })
    }
}

impl Record for ImageRecord {
    const KIND: &'static str = "image";
    const FIELD_COUNT: usize = 3;

    fn key(&self) -> &str {
        &self.name
    }

    fn to_fields(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.rootfs_path.to_string_lossy().into_owned(),
            self.created_at.clone(),
        ]
    }

    fn from_fields(fields: &[&str]) -> Option<Self> {
        let [name, rootfs_path, created_at] = fields else {
            return None;
        };
        if name.is_empty() || rootfs_path.is_empty() {
            return None;
        }
        Some(Self {
            name: (*name).to_string(),
            rootfs_path: PathBuf::from(*rootfs_path),
            created_at: (*created_at).to_string(),
        })
    }
}
