// src/solver/mod.rs

//! Dependency solver
//!
//! Picks one implementation per interface, starting from a root interface
//! and walking dependencies depth-first. The walk is greedy: each interface
//! is decided once, from a total ranking of its candidates, and never
//! revisited. Restrictions declared on any edge are registered against the
//! target interface before it is visited, and the first implementation that
//! declares a machine type pins the machine group for the rest of the walk.
//!
//! An interface with no usable candidate is recorded as unsatisfied and the
//! result is flagged not-ready, but the rest of the graph is still solved.
//!
//! [`sat`] formulates the same problem for an exact backend.

pub mod arch;
pub mod sat;
mod selections;
mod xml;

pub use arch::{ArchRanking, MachineGroup, machine_group};
pub use selections::{Selection, Selections};

use crate::error::{Error, Result};
use crate::model::{Dependency, ImplSource, Implementation, InterfaceCatalog, Stability};
use crate::store::Store;
use crate::version::Restriction;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// How freely the network may be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NetworkPolicy {
    /// Only already-available implementations are usable
    #[serde(rename = "off-line")]
    Offline,
    /// Prefer available implementations over better uncached ones
    #[serde(rename = "minimal")]
    Minimal,
    /// Prefer the best implementation, downloading if needed
    #[default]
    #[serde(rename = "full")]
    Full,
}

impl NetworkPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            NetworkPolicy::Offline => "off-line",
            NetworkPolicy::Minimal => "minimal",
            NetworkPolicy::Full => "full",
        }
    }
}

impl FromStr for NetworkPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "off-line" | "offline" => Ok(NetworkPolicy::Offline),
            "minimal" => Ok(NetworkPolicy::Minimal),
            "full" => Ok(NetworkPolicy::Full),
            other => Err(Error::Config(format!("unknown network policy: {}", other))),
        }
    }
}

impl fmt::Display for NetworkPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether an implementation can be used without downloading anything
pub trait Availability {
    fn is_available(&self, source: &ImplSource) -> bool;
}

impl Availability for Store {
    fn is_available(&self, source: &ImplSource) -> bool {
        match source {
            ImplSource::Digests(digests) => self.lookup_any(digests).is_some(),
            ImplSource::LocalPath(path) => path.is_dir(),
            ImplSource::Package { installed, .. } => *installed,
        }
    }
}

/// What the caller wants to run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements {
    pub interface_uri: String,
    /// The root implementation must provide this command
    pub command: Option<String>,
    /// Select source code for the root instead of a binary
    pub source: bool,
    /// Extra restrictions on the root interface
    pub restrictions: Vec<Restriction>,
}

impl Requirements {
    pub fn new(interface_uri: impl Into<String>) -> Self {
        Self {
            interface_uri: interface_uri.into(),
            ..Default::default()
        }
    }
}

/// User preferences that affect ranking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolverPolicy {
    pub network_use: NetworkPolicy,
    /// Treat `testing` as good enough to prefer when an interface sets no policy
    pub help_with_testing: bool,
}

/// Why a candidate cannot be selected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Stability(Stability),
    NotSource,
    SourceOnly,
    UnsupportedOs(String),
    UnsupportedMachine(String),
    IncompatibleMachine { machine: String, group: MachineGroup },
    Restricted(Restriction),
    MissingCommand(String),
    NotCached,
    NoRetrievalMethod,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Stability(s) => write!(f, "stability is {}", s),
            RejectReason::NotSource => f.write_str("not source code"),
            RejectReason::SourceOnly => f.write_str("source code only"),
            RejectReason::UnsupportedOs(os) => write!(f, "unsupported OS {}", os),
            RejectReason::UnsupportedMachine(m) => write!(f, "unsupported machine type {}", m),
            RejectReason::IncompatibleMachine { machine, group } => {
                write!(f, "machine type {} cannot be mixed with {} selections", machine, group.name())
            }
            RejectReason::Restricted(r) => write!(f, "excluded by restriction: {}", r),
            RejectReason::MissingCommand(c) => write!(f, "has no command {:?}", c),
            RejectReason::NotCached => f.write_str("not available while off-line"),
            RejectReason::NoRetrievalMethod => f.write_str("not cached and no way to download it"),
        }
    }
}

/// One candidate as the solver ranked it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedCandidate {
    pub feed: String,
    pub id: String,
    pub version: String,
    pub stability: Stability,
    pub rejection: Option<RejectReason>,
}

/// Ranked candidates of every interface the walk visited
#[derive(Debug, Clone, Default)]
pub struct SolverDiagnostics {
    interfaces: BTreeMap<String, Vec<RankedCandidate>>,
}

impl SolverDiagnostics {
    pub fn candidates(&self, uri: &str) -> &[RankedCandidate] {
        self.interfaces.get(uri).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &str> {
        self.interfaces.keys().map(String::as_str)
    }

    /// Human-readable ranking of one interface, best first
    pub fn explain(&self, uri: &str) -> String {
        let candidates = self.candidates(uri);
        if candidates.is_empty() {
            return format!("{}: no candidates", uri);
        }
        let mut out = format!("{}:", uri);
        for c in candidates {
            match &c.rejection {
                None => out.push_str(&format!("\n  {} ({}, {}) from {}", c.version, c.id, c.stability, c.feed)),
                Some(why) => out.push_str(&format!("\n  {} ({}) from {}: {}", c.version, c.id, c.feed, why)),
            }
        }
        out
    }
}

/// Greedy depth-first solver
pub struct Solver<'a> {
    catalog: &'a InterfaceCatalog,
    availability: &'a dyn Availability,
    policy: SolverPolicy,
}

impl<'a> Solver<'a> {
    pub fn new(catalog: &'a InterfaceCatalog, availability: &'a dyn Availability, policy: SolverPolicy) -> Self {
        Self {
            catalog,
            availability,
            policy,
        }
    }

    pub fn solve(&self, requirements: &Requirements, arch: &ArchRanking) -> Selections {
        self.solve_explained(requirements, arch).0
    }

    /// Solve and keep every interface's ranked candidate list
    pub fn solve_explained(&self, requirements: &Requirements, arch: &ArchRanking) -> (Selections, SolverDiagnostics) {
        info!("Solving for {}", requirements.interface_uri);
        let mut walk = Walk {
            solver: self,
            arch,
            requirements,
            visited: HashSet::new(),
            restrictions: HashMap::new(),
            chosen: HashMap::new(),
            machine_group: None,
            selections: BTreeMap::new(),
            ready: true,
            notes: Vec::new(),
            diagnostics: SolverDiagnostics::default(),
        };
        let root = requirements.interface_uri.as_str();
        walk.restrictions
            .entry(root.to_string())
            .or_default()
            .extend(requirements.restrictions.iter().cloned());
        walk.process(root, &[], true, true);

        if !walk.ready {
            warn!("Selections for {} are incomplete", root);
        }
        let selections = Selections {
            interface: requirements.interface_uri.clone(),
            command: requirements.command.clone(),
            selections: walk.selections,
            ready: walk.ready,
            notes: walk.notes,
        };
        (selections, walk.diagnostics)
    }

    /// Stability at or above which a candidate counts as preferred
    fn stability_threshold(&self, uri: &str) -> Stability {
        self.catalog.stability_policy(uri).unwrap_or(if self.policy.help_with_testing {
            Stability::Testing
        } else {
            Stability::Stable
        })
    }
}

struct Candidate<'a> {
    implementation: &'a Implementation,
    rejection: Option<RejectReason>,
    available: bool,
    os_rank: usize,
    machine_rank: usize,
}

struct Walk<'s, 'a> {
    solver: &'s Solver<'a>,
    arch: &'s ArchRanking,
    requirements: &'s Requirements,
    visited: HashSet<String>,
    restrictions: HashMap<String, Vec<Restriction>>,
    chosen: HashMap<String, &'a Implementation>,
    machine_group: Option<MachineGroup>,
    selections: BTreeMap<String, Option<Selection>>,
    ready: bool,
    notes: Vec<String>,
    diagnostics: SolverDiagnostics,
}

impl<'s, 'a> Walk<'s, 'a> {
    fn process(&mut self, uri: &str, edge: &[Restriction], essential: bool, is_root: bool) {
        if !self.visited.insert(uri.to_string()) {
            self.check_revisit(uri, edge, essential);
            return;
        }

        let ranked = self.rank(uri, is_root);
        self.diagnostics.interfaces.insert(
            uri.to_string(),
            ranked
                .iter()
                .map(|c| RankedCandidate {
                    feed: c.implementation.feed.clone(),
                    id: c.implementation.id.clone(),
                    version: c.implementation.version.to_string(),
                    stability: c.implementation.stability(),
                    rejection: c.rejection.clone(),
                })
                .collect(),
        );

        let best = ranked
            .first()
            .filter(|c| c.rejection.is_none())
            .map(|c| c.implementation);
        let Some(implementation) = best else {
            debug!("No usable implementation of {} ({} candidates)", uri, ranked.len());
            self.selections.insert(uri.to_string(), None);
            if essential {
                self.ready = false;
            }
            self.notes.push(format!(
                "{}: no usable implementation among {} candidates",
                uri,
                ranked.len()
            ));
            return;
        };

        debug!("Selected {} {} for {}", implementation.id, implementation.version, uri);
        if self.machine_group.is_none() {
            self.machine_group = machine_group(implementation.machine.as_deref());
        }
        let command = if is_root {
            self.requirements.command.as_deref()
        } else {
            None
        };
        self.selections
            .insert(uri.to_string(), Some(Selection::from_implementation(uri, implementation)));
        self.chosen.insert(uri.to_string(), implementation);

        let dependencies: Vec<&'a Dependency> = implementation.dependencies_for(command).collect();
        for dep in &dependencies {
            self.restrictions
                .entry(dep.interface.clone())
                .or_default()
                .extend(dep.restrictions.iter().cloned());
        }
        for dep in dependencies {
            self.process(&dep.interface, &dep.restrictions, dep.is_essential(), false);
        }
    }

    /// A second arrival at an interface: validate the edge against the existing choice
    fn check_revisit(&mut self, uri: &str, edge: &[Restriction], essential: bool) {
        let Some(existing) = self.chosen.get(uri) else {
            if essential && self.selections.get(uri).is_some_and(Option::is_none) {
                self.ready = false;
            }
            return;
        };
        let violated: Vec<String> = edge
            .iter()
            .filter(|r| !r.meets(&existing.version))
            .map(ToString::to_string)
            .collect();
        if violated.is_empty() {
            return;
        }
        warn!(
            "{} {} was already selected but a later dependency requires {}",
            uri,
            existing.version,
            violated.join(", ")
        );
        self.notes.push(format!(
            "{}: selected version {} conflicts with {}",
            uri,
            existing.version,
            violated.join(", ")
        ));
        if essential {
            self.ready = false;
        }
    }

    fn rank(&self, uri: &str, is_root: bool) -> Vec<Candidate<'a>> {
        let want_source = is_root && self.requirements.source;
        let catalog: &'a InterfaceCatalog = self.solver.catalog;

        let mut candidates = Vec::new();
        for feed_ref in catalog.feed_references(uri) {
            if self.arch.os_rank(feed_ref.os.as_deref()).is_none() {
                continue;
            }
            let usable_feed = match feed_ref.machine.as_deref() {
                Some("src") => want_source,
                Some(machine) => !want_source && self.arch.machine_rank(Some(machine)).is_some(),
                None => true,
            };
            if !usable_feed {
                continue;
            }
            match catalog.feed(&feed_ref.url) {
                Some(feed) => candidates.extend(
                    feed.implementations
                        .iter()
                        .map(|imp| self.candidate(uri, imp, is_root, want_source)),
                ),
                None => debug!("Feed {} for {} is not in the catalog", feed_ref.url, uri),
            }
        }

        let threshold = self.solver.stability_threshold(uri);
        let network_use = self.solver.policy.network_use;
        candidates.sort_by(|a, b| compare(a, b, threshold, network_use));
        candidates
    }

    fn candidate(&self, uri: &str, implementation: &'a Implementation, is_root: bool, want_source: bool) -> Candidate<'a> {
        let available = self.solver.availability.is_available(&implementation.source);
        let os_rank = self.arch.os_rank(implementation.os.as_deref());
        let machine_rank = if implementation.is_source() {
            Some(0)
        } else {
            self.arch.machine_rank(implementation.machine.as_deref())
        };
        let rejection = self.rejection(uri, implementation, is_root, want_source, available, os_rank, machine_rank);
        Candidate {
            implementation,
            rejection,
            available,
            os_rank: os_rank.unwrap_or(usize::MAX),
            machine_rank: machine_rank.unwrap_or(usize::MAX),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn rejection(
        &self,
        uri: &str,
        implementation: &Implementation,
        is_root: bool,
        want_source: bool,
        available: bool,
        os_rank: Option<usize>,
        machine_rank: Option<usize>,
    ) -> Option<RejectReason> {
        let stability = implementation.stability();
        if !stability.is_usable() {
            return Some(RejectReason::Stability(stability));
        }
        if want_source && !implementation.is_source() {
            return Some(RejectReason::NotSource);
        }
        if !want_source && implementation.is_source() {
            return Some(RejectReason::SourceOnly);
        }
        if os_rank.is_none() {
            return Some(RejectReason::UnsupportedOs(implementation.os.clone().unwrap_or_default()));
        }
        let machine = implementation.machine.clone().unwrap_or_default();
        if machine_rank.is_none() {
            return Some(RejectReason::UnsupportedMachine(machine));
        }
        if let (Some(group), Some(own)) = (self.machine_group, machine_group(implementation.machine.as_deref()))
            && group != own
        {
            return Some(RejectReason::IncompatibleMachine { machine, group });
        }
        if let Some(restriction) = self
            .restrictions
            .get(uri)
            .and_then(|rs| rs.iter().find(|r| !r.meets(&implementation.version)))
        {
            return Some(RejectReason::Restricted(restriction.clone()));
        }
        if is_root
            && let Some(command) = self.requirements.command.as_deref()
            && implementation.command(command).is_none()
        {
            return Some(RejectReason::MissingCommand(command.to_string()));
        }
        if !available {
            if self.solver.policy.network_use == NetworkPolicy::Offline {
                return Some(RejectReason::NotCached);
            }
            if implementation.retrieval_methods.is_empty() {
                return Some(RejectReason::NoRetrievalMethod);
            }
        }
        None
    }
}

/// Total order over candidates, best first
fn compare(a: &Candidate<'_>, b: &Candidate<'_>, threshold: Stability, network_use: NetworkPolicy) -> Ordering {
    let (ia, ib) = (a.implementation, b.implementation);
    let collapse = |s: Stability| if s >= threshold { Stability::Preferred } else { s };
    let preferred = |imp: &Implementation| imp.user_stability == Some(Stability::Preferred);

    b.rejection
        .is_none()
        .cmp(&a.rejection.is_none())
        .then_with(|| preferred(ib).cmp(&preferred(ia)))
        .then_with(|| match network_use {
            NetworkPolicy::Full => Ordering::Equal,
            _ => b.available.cmp(&a.available),
        })
        .then_with(|| collapse(ib.stability()).cmp(&collapse(ia.stability())))
        .then_with(|| ib.version.cmp(&ia.version))
        .then_with(|| a.os_rank.cmp(&b.os_rank))
        .then_with(|| a.machine_rank.cmp(&b.machine_rank))
        .then_with(|| match network_use {
            NetworkPolicy::Full => b.available.cmp(&a.available),
            _ => Ordering::Equal,
        })
        .then_with(|| ia.id.cmp(&ib.id))
        .then_with(|| ia.feed.cmp(&ib.feed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::ManifestDigest;
    use crate::model::{ArchiveSource, Feed, FeedReference, RetrievalMethod};

    /// Availability keyed by digest string
    #[derive(Default)]
    struct Cached(HashSet<String>);

    impl Availability for Cached {
        fn is_available(&self, source: &ImplSource) -> bool {
            source.digests().iter().any(|d| self.0.contains(&d.to_string()))
        }
    }

    fn digest(n: u32) -> ManifestDigest {
        format!("sha256={:064x}", n).parse().unwrap()
    }

    fn imp(id: &str, version: &str, n: u32) -> Implementation {
        let mut imp = Implementation::new(id, version.parse().unwrap());
        imp.source = ImplSource::Digests(vec![digest(n)]);
        imp.upstream_stability = Stability::Stable;
        imp.retrieval_methods = vec![RetrievalMethod::Archive(ArchiveSource::new(format!(
            "http://example.com/{}.tgz",
            id
        )))];
        imp
    }

    fn feed(url: &str, implementations: Vec<Implementation>) -> Feed {
        Feed {
            implementations,
            ..Feed::new(url)
        }
    }

    fn arch() -> ArchRanking {
        ArchRanking::for_host("Linux", "x86_64")
    }

    fn chosen(selections: &Selections, uri: &str) -> Option<String> {
        selections.get(uri).map(|s| s.id.clone())
    }

    #[test]
    fn test_prefers_newest_stable() {
        let mut catalog = InterfaceCatalog::new();
        let mut testing = imp("c", "3.0", 3);
        testing.upstream_stability = Stability::Testing;
        catalog.add_feed(feed("http://ex/prog", vec![imp("a", "1.0", 1), imp("b", "2.0", 2), testing]));

        let cached = Cached::default();
        let solver = Solver::new(&catalog, &cached, SolverPolicy::default());
        let selections = solver.solve(&Requirements::new("http://ex/prog"), &arch());
        assert!(selections.ready);
        assert_eq!(chosen(&selections, "http://ex/prog").as_deref(), Some("b"));

        let helping = SolverPolicy {
            help_with_testing: true,
            ..Default::default()
        };
        let cached = Cached::default();
        let solver = Solver::new(&catalog, &cached, helping);
        let selections = solver.solve(&Requirements::new("http://ex/prog"), &arch());
        assert_eq!(chosen(&selections, "http://ex/prog").as_deref(), Some("c"));
    }

    #[test]
    fn test_user_preferred_wins() {
        let mut catalog = InterfaceCatalog::new();
        catalog.add_feed(feed("http://ex/prog", vec![imp("old", "1.0", 1), imp("new", "2.0", 2)]));
        catalog
            .set_user_stability("http://ex/prog", "old", Some(Stability::Preferred))
            .unwrap();
        let cached = Cached::default();
        let solver = Solver::new(&catalog, &cached, SolverPolicy::default());
        let selections = solver.solve(&Requirements::new("http://ex/prog"), &arch());
        assert_eq!(chosen(&selections, "http://ex/prog").as_deref(), Some("old"));
    }

    #[test]
    fn test_network_policies() {
        let mut catalog = InterfaceCatalog::new();
        catalog.add_feed(feed("http://ex/prog", vec![imp("old", "1.0", 1), imp("new", "2.0", 2)]));
        let cached = Cached(HashSet::from([digest(1).to_string()]));

        let pick = |network_use| {
            let policy = SolverPolicy {
                network_use,
                ..Default::default()
            };
            let solver = Solver::new(&catalog, &cached, policy);
            chosen(&solver.solve(&Requirements::new("http://ex/prog"), &arch()), "http://ex/prog")
        };
        assert_eq!(pick(NetworkPolicy::Full).as_deref(), Some("new"));
        assert_eq!(pick(NetworkPolicy::Minimal).as_deref(), Some("old"));
        assert_eq!(pick(NetworkPolicy::Offline).as_deref(), Some("old"));

        let policy = SolverPolicy {
            network_use: NetworkPolicy::Offline,
            ..Default::default()
        };
        let cached = Cached::default();
        let solver = Solver::new(&catalog, &cached, policy);
        let (selections, diagnostics) = solver.solve_explained(&Requirements::new("http://ex/prog"), &arch());
        assert!(!selections.ready);
        assert!(
            diagnostics
                .candidates("http://ex/prog")
                .iter()
                .all(|c| c.rejection == Some(RejectReason::NotCached))
        );
    }

    #[test]
    fn test_missing_dependency_keeps_solving_siblings() {
        let mut catalog = InterfaceCatalog::new();
        let mut root = imp("root", "1", 1);
        root.requires = vec![Dependency::new("http://ex/missing"), Dependency::new("http://ex/lib")];
        catalog.add_feed(feed("http://ex/root", vec![root]));
        catalog.add_feed(feed("http://ex/lib", vec![imp("lib", "1", 2)]));

        let cached = Cached::default();
        let solver = Solver::new(&catalog, &cached, SolverPolicy::default());
        let selections = solver.solve(&Requirements::new("http://ex/root"), &arch());
        assert!(!selections.ready);
        assert_eq!(chosen(&selections, "http://ex/lib").as_deref(), Some("lib"));
        assert_eq!(selections.unsatisfied(), vec!["http://ex/missing"]);
        assert_eq!(selections.notes.len(), 1);
    }

    #[test]
    fn test_recommended_failure_stays_ready() {
        let mut catalog = InterfaceCatalog::new();
        let mut root = imp("root", "1", 1);
        let mut optional = Dependency::new("http://ex/missing");
        optional.importance = crate::model::Importance::Recommended;
        root.requires = vec![optional];
        catalog.add_feed(feed("http://ex/root", vec![root]));

        let cached = Cached::default();
        let solver = Solver::new(&catalog, &cached, SolverPolicy::default());
        let selections = solver.solve(&Requirements::new("http://ex/root"), &arch());
        assert!(selections.ready);
        assert_eq!(selections.unsatisfied(), vec!["http://ex/missing"]);
    }

    #[test]
    fn test_cycle_back_edge_is_validated() {
        let mut catalog = InterfaceCatalog::new();
        let mut a = imp("a", "1.0", 1);
        a.requires = vec![Dependency::new("http://ex/b")];
        let mut b = imp("b", "1.0", 2);
        let mut back = Dependency::new("http://ex/a");
        back.restrictions = vec![Restriction::range(Some("2.0"), None).unwrap()];
        b.requires = vec![back];
        catalog.add_feed(feed("http://ex/a", vec![a]));
        catalog.add_feed(feed("http://ex/b", vec![b]));

        let cached = Cached::default();
        let solver = Solver::new(&catalog, &cached, SolverPolicy::default());
        let selections = solver.solve(&Requirements::new("http://ex/a"), &arch());
        assert_eq!(chosen(&selections, "http://ex/a").as_deref(), Some("a"));
        assert_eq!(chosen(&selections, "http://ex/b").as_deref(), Some("b"));
        assert!(!selections.ready);
        assert!(selections.notes[0].contains("conflicts with version >= 2.0"));
    }

    #[test]
    fn test_command_required_at_root() {
        let mut catalog = InterfaceCatalog::new();
        let mut with_run = imp("with", "1.0", 1);
        with_run.commands = vec![crate::model::Command {
            name: "run".into(),
            path: Some("bin/prog".into()),
            requires: vec![Dependency::new("http://ex/runtime")],
            bindings: vec![],
        }];
        let without = imp("without", "2.0", 2);
        catalog.add_feed(feed("http://ex/prog", vec![with_run, without]));
        catalog.add_feed(feed("http://ex/runtime", vec![imp("rt", "1", 3)]));

        let cached = Cached::default();
        let solver = Solver::new(&catalog, &cached, SolverPolicy::default());
        let mut requirements = Requirements::new("http://ex/prog");
        requirements.command = Some("run".into());
        let selections = solver.solve(&requirements, &arch());
        assert_eq!(chosen(&selections, "http://ex/prog").as_deref(), Some("with"));
        assert_eq!(chosen(&selections, "http://ex/runtime").as_deref(), Some("rt"));
        assert_eq!(selections.command.as_deref(), Some("run"));
    }

    #[test]
    fn test_machine_specific_feed_reference() {
        let mut catalog = InterfaceCatalog::new();
        let mut main = feed("http://ex/prog", vec![imp("generic", "1.0", 1)]);
        main.feeds = vec![FeedReference {
            url: "http://ex/prog-ppc".into(),
            os: None,
            machine: Some("ppc".into()),
        }];
        catalog.add_feed(main);
        let mut ppc = imp("ppc", "9.0", 2);
        ppc.machine = Some("ppc".into());
        catalog.add_feed(feed("http://ex/prog-ppc", vec![ppc]));

        let cached = Cached::default();
        let solver = Solver::new(&catalog, &cached, SolverPolicy::default());
        let (selections, diagnostics) = solver.solve_explained(&Requirements::new("http://ex/prog"), &arch());
        assert_eq!(chosen(&selections, "http://ex/prog").as_deref(), Some("generic"));
        assert_eq!(diagnostics.candidates("http://ex/prog").len(), 1);
        assert!(diagnostics.explain("http://ex/prog").contains("generic"));
    }

    #[test]
    fn test_os_and_machine_rank_break_version_ties() {
        let mut catalog = InterfaceCatalog::new();
        let mut generic = imp("generic", "1.0", 1);
        generic.machine = None;
        let mut native = imp("native", "1.0", 2);
        native.machine = Some("x86_64".into());
        native.os = Some("Linux".into());
        let mut windows = imp("windows", "5.0", 3);
        windows.os = Some("Windows".into());
        catalog.add_feed(feed("http://ex/prog", vec![generic, native, windows]));

        let cached = Cached::default();
        let solver = Solver::new(&catalog, &cached, SolverPolicy::default());
        let (selections, diagnostics) = solver.solve_explained(&Requirements::new("http://ex/prog"), &arch());
        assert_eq!(chosen(&selections, "http://ex/prog").as_deref(), Some("native"));
        let last = diagnostics.candidates("http://ex/prog").last().unwrap();
        assert_eq!(last.rejection, Some(RejectReason::UnsupportedOs("Windows".into())));
    }
}
