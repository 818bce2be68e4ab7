// LOADSWEEP CPU AFFINITY MASKS
// A SORTED, DEDUPLICATED, NON-EMPTY CPU SET. PARSED FROM taskset-STYLE LISTS
// ("3,5,7,9", "0-3", "0-1,6"). THE SAME MASK TYPE PINS THE TARGET SERVER AND wrk.

use std::fmt;
use std::io;
use std::os::unix::process::CommandExt;
use std::process::Command;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::AffinityError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct AffinityMask {
    cpus: Vec<usize>,
}

impl AffinityMask {
    pub fn new(cpus: impl IntoIterator<Item = usize>) -> Result<Self, AffinityError> {
        let mut cpus: Vec<usize> = cpus.into_iter().collect();
        cpus.sort_unstable();
        cpus.dedup();
        if cpus.is_empty() {
            return Err(AffinityError::Empty);
        }
        if let Some(&cpu) = cpus.iter().find(|&&c| c >= libc::CPU_SETSIZE as usize) {
            return Err(AffinityError::OutOfRange(cpu));
        }
        Ok(Self { cpus })
    }

    /// CPUs the calling process may currently run on.
    pub fn current() -> io::Result<Self> {
        let mut set: libc::cpu_set_t = unsafe { std::mem::zeroed() };
        let rc = unsafe {
            libc::sched_getaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &mut set)
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        let cpus = (0..libc::CPU_SETSIZE as usize).filter(|&cpu| unsafe { libc::CPU_ISSET(cpu, &set) });
        Self::new(cpus).map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    pub fn cpus(&self) -> &[usize] {
        &self.cpus
    }

    pub fn cpu_count(&self) -> usize {
        self.cpus.len()
    }

    pub fn is_subset_of(&self, other: &AffinityMask) -> bool {
        self.cpus.iter().all(|cpu| other.cpus.binary_search(cpu).is_ok())
    }

    fn cpu_set(&self) -> libc::cpu_set_t {
        let mut set: libc::cpu_set_t = unsafe { std::mem::zeroed() };
        for &cpu in &self.cpus {
            unsafe { libc::CPU_SET(cpu, &mut set) };
        }
        set
    }

    /// Restrict the command's child process to this mask before it execs.
    pub fn pin<'c>(&self, cmd: &'c mut Command) -> &'c mut Command {
        let set = self.cpu_set();
        unsafe {
            cmd.pre_exec(move || {
                let rc = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set);
                if rc != 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            })
        }
    }
}

impl FromStr for AffinityMask {
    type Err = AffinityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut cpus = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            let cpu = |raw: &str| {
                raw.trim()
                    .parse::<usize>()
                    .map_err(|_| AffinityError::InvalidCpu(raw.trim().to_string()))
            };
            match part.split_once('-') {
                Some((lo, hi)) => {
                    let (lo, hi) = (cpu(lo)?, cpu(hi)?);
                    if lo > hi {
                        return Err(AffinityError::ReversedRange(lo, hi));
                    }
                    // BOUND BEFORE EXPANDING: A HUGE hi WOULD ALLOCATE, NOT FAIL
                    if hi >= libc::CPU_SETSIZE as usize {
                        return Err(AffinityError::OutOfRange(hi));
                    }
                    cpus.extend(lo..=hi);
                }
                None if part.is_empty() && s.trim().is_empty() => return Err(AffinityError::Empty),
                None => cpus.push(cpu(part)?),
            }
        }
        Self::new(cpus)
    }
}

impl TryFrom<String> for AffinityMask {
    type Error = AffinityError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for AffinityMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for cpu in &self.cpus {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{}", cpu)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_list() {
        let mask: AffinityMask = "3,5,7,9".parse().unwrap();
        assert_eq!(mask.cpus(), &[3, 5, 7, 9]);
        assert_eq!(mask.cpu_count(), 4);
        assert_eq!(mask.to_string(), "3,5,7,9");
    }

    #[test]
    fn ranges_and_duplicates() {
        let mask: AffinityMask = "6, 0-2,1".parse().unwrap();
        assert_eq!(mask.cpus(), &[0, 1, 2, 6]);
        assert_eq!(mask.cpu_count(), 4);
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!("".parse::<AffinityMask>(), Err(AffinityError::Empty));
        assert_eq!(
            "1,,2".parse::<AffinityMask>(),
            Err(AffinityError::InvalidCpu(String::new()))
        );
        assert_eq!(
            "a".parse::<AffinityMask>(),
            Err(AffinityError::InvalidCpu("a".into()))
        );
        assert_eq!(
            "4-2".parse::<AffinityMask>(),
            Err(AffinityError::ReversedRange(4, 2))
        );
        assert_eq!(
            "99999".parse::<AffinityMask>(),
            Err(AffinityError::OutOfRange(99999))
        );
        assert_eq!(
            "0-18446744073709551615".parse::<AffinityMask>(),
            Err(AffinityError::OutOfRange(usize::MAX))
        );
        assert_eq!(
            "0-4000000000".parse::<AffinityMask>(),
            Err(AffinityError::OutOfRange(4_000_000_000))
        );
    }

    #[test]
    fn subset() {
        let small: AffinityMask = "1,3".parse().unwrap();
        let big: AffinityMask = "0-3".parse().unwrap();
        assert!(small.is_subset_of(&big));
        assert!(!big.is_subset_of(&small));
    }

    #[test]
    fn current_mask_is_not_empty() {
        let mask = AffinityMask::current().expect("sched_getaffinity");
        assert!(mask.cpu_count() >= 1);
    }
}
