// LOADSWEEP PROCESS CONTROLLER
// OWNS AT MOST ONE TARGET SERVER INSTANCE:
//   DISCOVER   SCAN /proc/*/cmdline FOR THE TARGET PATTERN (LOWEST PID WINS)
//   SPAWN      REAP ANY STALE INSTANCE, LAUNCH PINNED, SETTLE, RE-DISCOVER
//   TERMINATE  SIGKILL, REAP, OR SLEEP UNTIL THE PROCESS TABLE CONVERGES
//
// THE LAUNCHER'S PID IS NOT TRUSTED (WRAPPER SCRIPTS, FORKING SERVERS).
// DISCOVERY IS THE SOURCE OF TRUTH FOR THE HANDLE.

use std::fmt;
use std::fs;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::affinity::AffinityMask;
use crate::error::RunError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(u32);

impl Pid {
    /// Zero and values beyond pid_t are rejected: kill(0) would signal our own group.
    pub fn new(raw: u32) -> Option<Self> {
        (raw > 0 && raw <= i32::MAX as u32).then_some(Self(raw))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    fn as_raw(self) -> libc::pid_t {
        self.0 as libc::pid_t
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub trait ProcessControl {
    /// First process (ascending pid) whose command line matches the target pattern.
    fn discover(&self) -> Option<Pid>;

    /// Launch `command` pinned to `mask`. Ok(None) means it launched but
    /// discovery found nothing after the startup interval.
    fn spawn(&mut self, command: &[String], mask: &AffinityMask) -> Result<Option<Pid>, RunError>;

    /// Best-effort kill and reap. Never fails, safe to repeat.
    fn terminate(&mut self, pid: Pid);
}

pub struct ProcessController {
    proc_root: PathBuf,
    pattern: Regex,
    startup: Duration,
    after_kill: Duration,
    own_pid: u32,
    child: Option<Child>,
}

impl ProcessController {
    pub fn new(pattern: &str, startup: Duration, after_kill: Duration) -> Result<Self, regex::Error> {
        Ok(Self {
            proc_root: PathBuf::from("/proc"),
            pattern: Regex::new(pattern)?,
            startup,
            after_kill,
            own_pid: std::process::id(),
            child: None,
        })
    }

    pub fn with_proc_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.proc_root = root.into();
        self
    }

    fn cmdline(&self, pid: u32) -> Option<String> {
        let raw = fs::read(self.proc_root.join(pid.to_string()).join("cmdline")).ok()?;
        let line = String::from_utf8_lossy(&raw).replace('\0', " ");
        let line = line.trim_end();
        // KERNEL THREADS AND ZOMBIES HAVE NO COMMAND LINE
        (!line.is_empty()).then(|| line.to_string())
    }

    // KILL AND REAP A LAUNCHER CHILD WE STILL HOLD
    fn release_child(&mut self) {
        if let Some(mut child) = self.child.take() {
            debug!(pid = child.id(), "releasing launcher child");
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    fn kill(&self, pid: Pid) -> io::Result<()> {
        if unsafe { libc::kill(pid.as_raw(), libc::SIGKILL) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    // KILL WHATEVER DISCOVERY FINDS. RETURNS IT IF IT IS STILL DISCOVERABLE
    fn clear_stale(&mut self) -> Option<Pid> {
        let stale = self.discover()?;
        info!(pid = %stale, "old target process found, killing it");
        self.terminate(stale);
        self.discover().filter(|&pid| pid == stale)
    }

    // REAP THROUGH OUR OWN CHILD HANDLE WHEN IT IS THE SAME PROCESS, ELSE waitpid.
    // waitpid FAILS WITH ECHILD FOR ANYTHING WE DID NOT FORK.
    fn reap(&mut self, pid: Pid) -> bool {
        if self.child.as_ref().is_some_and(|c| c.id() == pid.get()) {
            return self.child.take().is_some_and(|mut c| c.wait().is_ok());
        }
        let mut status = 0;
        unsafe { libc::waitpid(pid.as_raw(), &mut status, 0) == pid.as_raw() }
    }
}

impl ProcessControl for ProcessController {
    fn discover(&self) -> Option<Pid> {
        let entries = fs::read_dir(&self.proc_root).ok()?;
        let mut pids: Vec<u32> = entries
            .flatten()
            .filter_map(|e| e.file_name().to_str()?.parse().ok())
            .filter(|&pid| pid != self.own_pid)
            .collect();
        pids.sort_unstable();
        pids.into_iter()
            .find(|&pid| {
                self.cmdline(pid)
                    .is_some_and(|line| self.pattern.is_match(&line))
            })
            .and_then(Pid::new)
    }

    fn spawn(&mut self, command: &[String], mask: &AffinityMask) -> Result<Option<Pid>, RunError> {
        if let Some(survivor) = self.clear_stale() {
            warn!(pid = %survivor, "old target process survived kill, discovery may return it");
        }
        self.release_child();

        let (program, args) = command.split_first().ok_or(RunError::EmptyCommand)?;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        mask.pin(&mut cmd);
        // TARGET DIES WITH THE HARNESS
        unsafe {
            cmd.pre_exec(|| {
                libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL as libc::c_ulong);
                Ok(())
            });
        }

        let child = cmd.spawn().map_err(|source| RunError::Spawn {
            program: program.clone(),
            source,
        })?;
        info!(launcher_pid = child.id(), cpus = %mask, "target launched: {}", command.join(" "));
        self.child = Some(child);

        std::thread::sleep(self.startup);

        if let Some(child) = self.child.as_mut() {
            if let Ok(Some(status)) = child.try_wait() {
                warn!(%status, "target exited during startup");
                self.child = None;
            }
        }
        Ok(self.discover())
    }

    fn terminate(&mut self, pid: Pid) {
        info!(%pid, "killing process");
        match self.kill(pid) {
            Ok(()) => {}
            Err(e) if e.raw_os_error() == Some(libc::ESRCH) => info!(%pid, "process not found"),
            Err(e) => warn!(%pid, error = %e, "kill failed"),
        }
        if !self.reap(pid) {
            // NOT OUR CHILD OR ALREADY GONE: GIVE THE PROCESS TABLE TIME TO CONVERGE
            std::thread::sleep(self.after_kill);
        }
    }
}

impl Drop for ProcessController {
    fn drop(&mut self) {
        self.release_child();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_proc(entries: &[(&str, &[u8])]) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        for (name, cmdline) in entries {
            let dir = root.path().join(name);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("cmdline"), cmdline).unwrap();
        }
        root
    }

    fn controller(root: &tempfile::TempDir) -> ProcessController {
        let mut c =
            ProcessController::new(r"(^|/)java\b.*-SNAPSHOT.*\.jar", Duration::ZERO, Duration::ZERO)
                .unwrap()
                .with_proc_root(root.path());
        // FAKE PIDS MUST NOT COLLIDE WITH THE TEST BINARY
        c.own_pid = 0;
        c
    }

    #[test]
    fn pid_rejects_zero_and_overflow() {
        assert!(Pid::new(0).is_none());
        assert!(Pid::new(u32::MAX).is_none());
        assert_eq!(Pid::new(42).map(Pid::get), Some(42));
    }

    #[test]
    fn discover_lowest_matching_pid() {
        let root = fake_proc(&[
            ("self", b"ignored"),
            ("9", b"/usr/bin/java\0-Xmx2g\0-jar\0app-0.0.1-SNAPSHOT.jar\0"),
            ("31", b"java\0-jar\0other-0.0.1-SNAPSHOT.jar\0"),
            ("12", b"bash\0-c\0echo java -jar x-SNAPSHOT.jar\0"),
            ("2", b""),
        ]);
        assert_eq!(controller(&root).discover(), Pid::new(9));
    }

    #[test]
    fn discover_none() {
        let root = fake_proc(&[("5", b"wrk\0-t4\0http://localhost:8080/people\0")]);
        assert_eq!(controller(&root).discover(), None);
    }

    #[test]
    fn discover_missing_proc_root() {
        let root = tempfile::tempdir().unwrap();
        let c = ProcessController::new("java", Duration::ZERO, Duration::ZERO)
            .unwrap()
            .with_proc_root(root.path().join("gone"));
        assert_eq!(c.discover(), None);
    }

    #[test]
    fn stale_entry_that_cannot_be_killed_is_reported() {
        // BEYOND pid_max: kill FAILS AND THE FAKE ENTRY STAYS IN /proc
        let root = fake_proc(&[("999999999", b"java\0-jar\0app-0.0.1-SNAPSHOT.jar\0")]);
        let mut c = controller(&root);
        assert_eq!(c.clear_stale(), Pid::new(999_999_999));
    }

    #[test]
    fn clear_stale_without_instance_is_none() {
        let root = fake_proc(&[("5", b"wrk\0-t4\0http://localhost:8080/people\0")]);
        assert_eq!(controller(&root).clear_stale(), None);
    }

    #[test]
    fn spawn_proceeds_past_surviving_stale_instance() {
        let root = fake_proc(&[("999999999", b"java\0-jar\0app-0.0.1-SNAPSHOT.jar\0")]);
        let mut c = controller(&root);
        let mask = AffinityMask::current().unwrap();
        let command = vec!["true".to_string()];
        // THE SURVIVOR IS STILL THE LOWEST MATCH, SO IT COMES BACK AS THE HANDLE
        assert_eq!(c.spawn(&command, &mask).unwrap(), Pid::new(999_999_999));
    }

    #[test]
    fn spawn_rejects_empty_command() {
        let root = fake_proc(&[]);
        let mut c = controller(&root);
        let mask = AffinityMask::current().unwrap();
        assert!(matches!(c.spawn(&[], &mask), Err(RunError::EmptyCommand)));
    }
}
