// src/exec/platform.rs

//! Process-group creation and group-wide termination.
//!
//! Exactly one implementation is compiled per target and exported as
//! [`PlatformGroup`]; nothing else in the crate branches on the OS.

use std::io;

use tokio::process::Command;

/// The two operations the process controller needs from the OS.
pub trait ProcessGroup {
    /// Arrange for the spawned child to lead a new process group.
    fn configure(cmd: &mut Command);

    /// Terminate every process in the group led by `pid`.
    ///
    /// A group that no longer exists is not an error.
    fn kill_group(pid: u32) -> io::Result<()>;
}

#[cfg(unix)]
pub use self::posix::PosixProcessGroup as PlatformGroup;
#[cfg(windows)]
pub use self::windows::WindowsProcessGroup as PlatformGroup;

#[cfg(unix)]
mod posix {
    use std::io;

    use tokio::process::Command;

    use super::ProcessGroup;

    pub struct PosixProcessGroup;

    impl ProcessGroup for PosixProcessGroup {
        fn configure(cmd: &mut Command) {
            // pgid = child's pid
            cmd.process_group(0);
        }

        fn kill_group(pid: u32) -> io::Result<()> {
            let pgid = libc::pid_t::try_from(pid)
                .ok()
                .filter(|p| *p > 1)
                .ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, format!("refusing to signal group {pid}"))
                })?;

            // SAFETY: killpg only sends a signal. `pgid` is a group created by
            // `configure` and is never 0 or 1, so it cannot address our own
            // group or init.
            let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
            if rc == 0 {
                return Ok(());
            }

            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::ESRCH) {
                Ok(())
            } else {
                Err(err)
            }
        }
    }
}

#[cfg(windows)]
mod windows {
    use std::io;
    use std::process::Stdio;

    use tokio::process::Command;

    use super::ProcessGroup;

    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

    pub struct WindowsProcessGroup;

    impl ProcessGroup for WindowsProcessGroup {
        fn configure(cmd: &mut Command) {
            cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
        }

        fn kill_group(pid: u32) -> io::Result<()> {
            // taskkill exits non-zero when the tree is already gone; that is fine.
            std::process::Command::new("taskkill")
                .args(["/F", "/T", "/PID", &pid.to_string()])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|_| ())
        }
    }
}
