// LOADSWEEP PROCESS CONTROLLER TESTS
// REAL SHORT-LIVED sleep CHILDREN AGAINST THE REAL /proc.
// EACH TEST USES ITS OWN sleep ARGUMENT SO PARALLEL TESTS NEVER DISCOVER
// EACH OTHER'S CHILDREN.

use std::process::Command;
use std::time::Duration;

use loadsweep::affinity::AffinityMask;
use loadsweep::process::{Pid, ProcessControl, ProcessController};

// kill(pid, 0) CHECKS EXISTENCE WITHOUT SIGNALLING
fn alive(pid: Pid) -> bool {
    unsafe { libc::kill(pid.get() as libc::pid_t, 0) == 0 }
}

fn controller(pattern: &str) -> ProcessController {
    ProcessController::new(pattern, Duration::from_millis(200), Duration::from_millis(10)).unwrap()
}

// === TERMINATE ===

#[test]
fn terminate_is_idempotent_on_a_real_child() {
    let child = Command::new("sleep").arg("3001.5").spawn().unwrap();
    let pid = Pid::new(child.id()).unwrap();
    let mut c = controller(r"^sleep 3001\.5$");

    assert_eq!(c.discover(), Some(pid));
    assert!(alive(pid));
    c.terminate(pid);
    assert!(!alive(pid));
    assert_eq!(c.discover(), None);

    // ALREADY DEAD AND REAPED: KILL FAILS, waitpid FAILS, STILL RETURNS
    c.terminate(pid);
    assert_eq!(c.discover(), None);
}

#[test]
fn terminate_unknown_pid_returns() {
    let mut c = controller(r"^never-matches$");
    let pid = Pid::new(i32::MAX as u32).unwrap();
    c.terminate(pid);
    c.terminate(pid);
}

// === SPAWN ===

#[test]
fn spawn_discovers_pinned_target() {
    let mask = AffinityMask::current().unwrap();
    let mut c = controller(r"^sleep 3002\.5$");
    let command = vec!["sleep".to_string(), "3002.5".to_string()];

    let pid = c.spawn(&command, &mask).unwrap().expect("target discovered");
    assert_eq!(c.discover(), Some(pid));

    c.terminate(pid);
    assert_eq!(c.discover(), None);
}

#[test]
fn spawn_reaps_stale_instance_first() {
    let mask = AffinityMask::current().unwrap();
    let mut c = controller(r"^sleep 3003\.5$");
    let command = vec!["sleep".to_string(), "3003.5".to_string()];

    let first = c.spawn(&command, &mask).unwrap().unwrap();
    let second = c.spawn(&command, &mask).unwrap().unwrap();
    assert_ne!(first, second);
    assert_eq!(c.discover(), Some(second));

    c.terminate(second);
    assert_eq!(c.discover(), None);
}

#[test]
fn spawn_of_exiting_target_yields_no_handle() {
    let mask = AffinityMask::current().unwrap();
    let mut c = controller(r"^never-matches-3004$");
    let command = vec!["true".to_string()];
    assert_eq!(c.spawn(&command, &mask).unwrap(), None);
}

#[test]
fn spawn_of_missing_binary_is_an_error() {
    let mask = AffinityMask::current().unwrap();
    let mut c = controller(r"^never-matches-3005$");
    let command = vec!["/nonexistent/server".to_string()];
    assert!(c.spawn(&command, &mask).is_err());
}
