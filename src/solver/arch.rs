// src/solver/arch.rs

//! Operating system and machine preferences
//!
//! An [`ArchRanking`] maps each supported OS and machine name to a rank,
//! lower being better. Names missing from the table are unsupported. A
//! wildcard (an implementation that declares no OS or no machine) always
//! ranks after every named entry.

use std::collections::HashMap;

/// Families of mutually runnable machine types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineGroup {
    Bits32,
    Bits64,
}

impl MachineGroup {
    pub fn name(&self) -> &'static str {
        match self {
            MachineGroup::Bits32 => "32-bit",
            MachineGroup::Bits64 => "64-bit",
        }
    }
}

/// Group of a declared machine; wildcards and source have none
pub fn machine_group(machine: Option<&str>) -> Option<MachineGroup> {
    match machine {
        None | Some("src") => None,
        Some("x86_64" | "ppc64" | "aarch64" | "s390x") => Some(MachineGroup::Bits64),
        Some(_) => Some(MachineGroup::Bits32),
    }
}

/// Machines a host of type `machine` can run, best first
fn compatible_machines(machine: &str) -> &'static [&'static str] {
    match machine {
        "i386" => &["i386"],
        "i486" => &["i486", "i386"],
        "i586" => &["i586", "i486", "i386"],
        "i686" => &["i686", "i586", "i486", "i386"],
        "x86_64" => &["x86_64", "i686", "i586", "i486", "i386"],
        "ppc" => &["ppc"],
        "ppc64" => &["ppc64", "ppc"],
        "armv6l" => &["armv6l"],
        "armv7l" => &["armv7l", "armv6l"],
        "aarch64" => &["aarch64"],
        "s390x" => &["s390x"],
        _ => &[],
    }
}

/// Operating systems a host OS can run, best first
fn compatible_oses(os: &str) -> Vec<&str> {
    match os {
        "Linux" | "FreeBSD" | "Darwin" | "SunOS" => vec![os, "POSIX"],
        "MacOSX" => vec!["MacOSX", "Darwin", "POSIX"],
        "Cygwin" => vec!["Cygwin", "POSIX", "Windows"],
        other => vec![other],
    }
}

/// Total preference order over OS and machine names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchRanking {
    os_ranks: HashMap<String, usize>,
    machine_ranks: HashMap<String, usize>,
}

impl ArchRanking {
    /// A ranking from explicit lists, best first
    pub fn new<'a, 'b>(
        oses: impl IntoIterator<Item = &'a str>,
        machines: impl IntoIterator<Item = &'b str>,
    ) -> Self {
        let mut os_ranks = HashMap::new();
        for os in oses {
            let rank = os_ranks.len();
            os_ranks.entry(os.to_string()).or_insert(rank);
        }
        let mut machine_ranks = HashMap::new();
        for machine in machines {
            let rank = machine_ranks.len();
            machine_ranks.entry(machine.to_string()).or_insert(rank);
        }
        Self { os_ranks, machine_ranks }
    }

    /// Ranking for a host with the given OS and machine names
    pub fn for_host(os: &str, machine: &str) -> Self {
        let machines = compatible_machines(machine);
        if machines.is_empty() {
            Self::new(compatible_oses(os), [machine])
        } else {
            Self::new(compatible_oses(os), machines.iter().copied())
        }
    }

    /// Ranking for the machine this process runs on
    pub fn host() -> Self {
        let os = match std::env::consts::OS {
            "linux" => "Linux",
            "macos" => "MacOSX",
            "freebsd" => "FreeBSD",
            "windows" => "Windows",
            "solaris" | "illumos" => "SunOS",
            other => other,
        };
        let machine = match std::env::consts::ARCH {
            "x86" => "i686",
            "arm" => "armv7l",
            "powerpc" => "ppc",
            "powerpc64" => "ppc64",
            other => other,
        };
        Self::for_host(os, machine)
    }

    /// Rank of a declared OS, `None` if unsupported
    pub fn os_rank(&self, os: Option<&str>) -> Option<usize> {
        match os {
            None => Some(self.os_ranks.len()),
            Some(name) => self.os_ranks.get(name).copied(),
        }
    }

    /// Rank of a declared machine, `None` if unsupported
    ///
    /// `src` is not a machine the host runs; the solver handles it.
    pub fn machine_rank(&self, machine: Option<&str>) -> Option<usize> {
        match machine {
            None => Some(self.machine_ranks.len()),
            Some(name) => self.machine_ranks.get(name).copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_x86_64_host() {
        let arch = ArchRanking::for_host("Linux", "x86_64");
        assert_eq!(arch.machine_rank(Some("x86_64")), Some(0));
        assert_eq!(arch.machine_rank(Some("i386")), Some(4));
        assert_eq!(arch.machine_rank(None), Some(5));
        assert_eq!(arch.machine_rank(Some("ppc")), None);
        assert_eq!(arch.machine_rank(Some("src")), None);

        assert_eq!(arch.os_rank(Some("Linux")), Some(0));
        assert_eq!(arch.os_rank(Some("POSIX")), Some(1));
        assert_eq!(arch.os_rank(None), Some(2));
        assert_eq!(arch.os_rank(Some("Windows")), None);
    }

    #[test]
    fn test_unknown_machine_supports_itself() {
        let arch = ArchRanking::for_host("Linux", "riscv64");
        assert_eq!(arch.machine_rank(Some("riscv64")), Some(0));
        assert_eq!(arch.machine_rank(None), Some(1));
    }

    #[test]
    fn test_machine_groups() {
        assert_eq!(machine_group(Some("x86_64")), Some(MachineGroup::Bits64));
        assert_eq!(machine_group(Some("aarch64")), Some(MachineGroup::Bits64));
        assert_eq!(machine_group(Some("i686")), Some(MachineGroup::Bits32));
        assert_eq!(machine_group(Some("src")), None);
        assert_eq!(machine_group(None), None);
    }
}
