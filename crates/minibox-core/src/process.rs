//! Container entry-process control.
//!
//! A [`ProcessHandle`] is the only capability the runtime has over a
//! container process: [`spawn`] creates one, and the handle can be
//! [waited](ProcessHandle::wait) on, [checked](ProcessHandle::is_alive) and
//! [signalled](ProcessHandle::signal). Handles can be rebuilt from a stored
//! pid; there is no protection against pid reuse.

use std::ffi::CString;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

use minibox_common::constants::{EXIT_EXEC_FAILED, EXIT_SETUP_FAILED, SIGNAL_EXIT_BASE};
use minibox_common::error::{MiniboxError, Result};
use minibox_common::types::ResourceLimits;
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::Pid;

/// Everything needed to launch a container entry process.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Full argument vector; `argv[0]` is the program.
    pub argv: Vec<String>,
    /// Complete environment, in lookup order.
    pub env: Vec<(String, String)>,
    /// Working directory of the process (the image rootfs).
    pub workdir: PathBuf,
    /// Directory holding `log_file`; created if absent.
    pub log_dir: PathBuf,
    /// File receiving the process's stdout and stderr, opened for append.
    pub log_file: PathBuf,
    /// CPU and memory caps.
    pub limits: ResourceLimits,
}

/// How a reaped process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Normal exit with the program's own status.
    Exited(i32),
    /// Death by an uncaught signal.
    Signaled(Signal),
}

impl Termination {
    /// Shell-style exit code: the status itself, or `128 + signal`.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Exited(code) => *code,
            Self::Signaled(signal) => SIGNAL_EXIT_BASE + *signal as i32,
        }
    }
}

/// Handle on a container's entry process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle {
    pid: Pid,
}

impl ProcessHandle {
    /// Rebuilds a handle from a stored pid.
    #[must_use]
    pub const fn from_raw(pid: i32) -> Self {
        Self {
            pid: Pid::from_raw(pid),
        }
    }

    /// Raw process id.
    #[must_use]
    pub const fn pid(&self) -> i32 {
        self.pid.as_raw()
    }

    /// Zero-effect existence check (`kill(pid, 0)`).
    ///
    /// `EPERM` still proves the process exists. An unreaped zombie also
    /// counts as alive. Non-positive pids are never
    /// alive, since `kill` would address a process group instead.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        if self.pid.as_raw() <= 0 {
            return false;
        }
        matches!(kill(self.pid, None), Ok(()) | Err(Errno::EPERM))
    }

    /// Delivers `signal` to the process.
    ///
    /// # Errors
    ///
    /// Returns `Process` if `kill(2)` fails, including when the process
    /// is already gone (`ESRCH`).
    pub fn signal(&self, signal: Signal) -> Result<()> {
        if self.pid.as_raw() <= 0 {
            return Err(MiniboxError::Process {
                message: format!("refusing to signal pid {}", self.pid),
            });
        }
        kill(self.pid, signal).map_err(|e| MiniboxError::Process {
            message: format!("kill({}, {}) failed: {e}", self.pid, signal.as_str()),
        })?;
        tracing::debug!(pid = self.pid.as_raw(), signal = signal.as_str(), "signal sent");
        Ok(())
    }

    /// Blocks until the process terminates and reaps it.
    ///
    /// Only works for children of the calling process.
    ///
    /// # Errors
    ///
    /// Returns `Process` if `waitpid(2)` fails for a reason other than
    /// `EINTR`.
    pub fn wait(&self) -> Result<Termination> {
        loop {
            match waitpid(self.pid, None) {
                Ok(WaitStatus::Exited(_, code)) => return Ok(Termination::Exited(code)),
                Ok(WaitStatus::Signaled(_, signal, _)) => return Ok(Termination::Signaled(signal)),
                Ok(_) | Err(Errno::EINTR) => {}
                Err(e) => {
                    return Err(MiniboxError::Process {
                        message: format!("waitpid({}) failed: {e}", self.pid),
                    });
                }
            }
        }
    }
}

/// Forks and execs the entry process described by `spec`.
///
/// Returns in the parent once the child exists; the child never returns.
/// In the child, output is redirected to the log file before any other
/// setup, limits are applied (failures are reported into the log and
/// ignored), the working directory is entered, and the program is
/// executed first relative to the working directory, then through a plain
/// `PATH` lookup. If setup or exec fails the child exits with
/// [`EXIT_SETUP_FAILED`] or [`EXIT_EXEC_FAILED`].
///
/// # Errors
///
/// Returns `InvalidArgument` if an argument or environment entry contains
/// a NUL byte or `argv` is empty, and `Process` if `fork(2)` fails.
#[cfg(target_os = "linux")]
pub fn spawn(spec: &LaunchSpec) -> Result<ProcessHandle> {
    use nix::unistd::{ForkResult, fork};

    let exec = PreparedExec::new(spec)?;

    // SAFETY: the child only performs async-signal-tolerant setup (file
    // opens, dup2, setrlimit, chdir) followed by exec or `_exit`; it never
    // returns into the caller's stack or runs destructors of shared state.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => {
            tracing::debug!(pid = child.as_raw(), "forked container process");
            Ok(ProcessHandle { pid: child })
        }
        Ok(ForkResult::Child) => run_child(spec, &exec),
        Err(e) => Err(MiniboxError::Process {
            message: format!("fork failed: {e}"),
        }),
    }
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error: container launch requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn spawn(_spec: &LaunchSpec) -> Result<ProcessHandle> {
    Err(MiniboxError::Process {
        message: "Linux required for container launch".into(),
    })
}

/// NUL-terminated copies of the exec arguments, built before forking.
#[derive(Debug)]
struct PreparedExec {
    relative: CString,
    program: CString,
    argv: Vec<CString>,
    env: Vec<CString>,
}

impl PreparedExec {
    fn new(spec: &LaunchSpec) -> Result<Self> {
        let program = spec.argv.first().ok_or_else(|| MiniboxError::InvalidArgument {
            message: "entry command is empty".into(),
        })?;
        let relative = format!("./{}", program.trim_start_matches('/'));
        Ok(Self {
            relative: c_string(&relative)?,
            program: c_string(program)?,
            argv: spec.argv.iter().map(|a| c_string(a)).collect::<Result<_>>()?,
            env: spec
                .env
                .iter()
                .map(|(k, v)| c_string(&format!("{k}={v}")))
                .collect::<Result<_>>()?,
        })
    }
}

fn c_string(value: &str) -> Result<CString> {
    CString::new(value).map_err(|_| MiniboxError::InvalidArgument {
        message: format!("value contains a NUL byte: {value:?}"),
    })
}

#[cfg(target_os = "linux")]
fn run_child(spec: &LaunchSpec, exec: &PreparedExec) -> ! {
    use nix::unistd::{chdir, execve, execvpe};

    if let Err(e) = redirect_output(&spec.log_dir, &spec.log_file) {
        report(format_args!("cannot redirect output to {}: {e}", spec.log_file.display()));
        child_exit(EXIT_SETUP_FAILED);
    }

    for warning in crate::limits::apply(&spec.limits) {
        report(format_args!("warning: {warning}; continuing without it"));
    }

    if let Err(e) = chdir(spec.workdir.as_path()) {
        report(format_args!("chdir {}: {e}", spec.workdir.display()));
        child_exit(EXIT_SETUP_FAILED);
    }

    let Err(relative_err) = execve(&exec.relative, &exec.argv, &exec.env);
    let Err(lookup_err) = execvpe(&exec.program, &exec.argv, &exec.env);
    report(format_args!(
        "cannot execute {:?}: {relative_err} (relative), {lookup_err} (lookup)",
        exec.program
    ));
    child_exit(EXIT_EXEC_FAILED)
}

/// Writes a diagnostic line to the child's stderr, which by then is the
/// container log. Goes through the raw handle so test output capture does
/// not swallow it.
fn report(message: std::fmt::Arguments<'_>) {
    use std::io::Write;

    let _ = writeln!(std::io::stderr(), "minibox: {message}");
}

/// Points stdout and stderr at the container log.
fn redirect_output(log_dir: &Path, log_file: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(log_dir)?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;
    let fd = file.as_raw_fd();
    for target in [libc::STDOUT_FILENO, libc::STDERR_FILENO] {
        // SAFETY: `fd` is an open descriptor owned by `file`; dup2 onto the
        // standard descriptors does not invalidate it.
        if unsafe { libc::dup2(fd, target) } == -1 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}

fn child_exit(code: i32) -> ! {
    // SAFETY: `_exit` skips atexit handlers and stdio flushing, which
    // belong to the parent's copy of the process state.
    unsafe { libc::_exit(code) }
}
