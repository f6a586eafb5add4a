//! System-wide constants and fixed timings.

use std::time::Duration;

/// Directory created under `$HOME` when no explicit home is given.
pub const HOME_DIR_NAME: &str = ".minibox";

/// Environment variable overriding the home directory.
pub const HOME_ENV: &str = "MINIBOX_HOME";

/// Image table file name.
pub const IMAGES_TABLE: &str = "images.db";

/// Container table file name.
pub const CONTAINERS_TABLE: &str = "containers.db";

/// Audit log file name.
pub const AUDIT_LOG: &str = "log.txt";

/// Field separator of both record tables.
pub const FIELD_DELIMITER: char = '|';

/// Prefix of generated container identifiers (`c1`, `c2`, ...).
pub const CONTAINER_ID_PREFIX: char = 'c';

/// Stored exit code while a container has not exited.
pub const EXIT_CODE_UNSET: i32 = -1;

/// Timestamp layout written to both tables and the audit log.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Wait between the graceful and the forceful stop signal.
pub const STOP_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Wait after the forceful stop signal.
pub const STOP_KILL_WAIT: Duration = Duration::from_secs(2);

/// Poll cadence of `logs --follow`.
pub const FOLLOW_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Entry command used when `run` is given none.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Baseline environment of every container process.
pub const BASE_ENV: &[(&str, &str)] = &[
    ("PATH", "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin"),
    ("HOME", "/root"),
    ("TERM", "xterm"),
];

/// Child exit status when the entry command cannot be executed.
pub const EXIT_EXEC_FAILED: i32 = 127;

/// Child exit status when pre-exec setup (log redirect, chdir) fails.
pub const EXIT_SETUP_FAILED: i32 = 126;

/// Offset added to a signal number to form a shell-style exit code.
pub const SIGNAL_EXIT_BASE: i32 = 128;

/// Maximum image name length.
pub const MAX_IMAGE_NAME_LEN: usize = 64;
