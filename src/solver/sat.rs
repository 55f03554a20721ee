// src/solver/sat.rs

//! Exact selection via a boolean formulation
//!
//! The greedy walk in the parent module can miss a combination that needs
//! an earlier choice revisited. This module compiles the same candidate data
//! into a [`SatProblem`]:
//!
//! - one variable per candidate implementation;
//! - at most one selected candidate per interface;
//! - for each dependency of a candidate, "candidate implies one of the
//!   dependency's acceptable candidates" (essential) or "candidate excludes
//!   the dependency's restricted-out candidates" (recommended);
//! - one variable per machine group, at most one of which is true;
//! - fixed assignments from the caller's pins;
//! - a cost per variable, lower for better-ranked candidates.
//!
//! Any [`SatBackend`] returning a minimum-cost model can solve it. The crate
//! ships [`ExhaustiveBackend`], a branch-and-bound search with unit
//! propagation and a bounded number of decisions.

use super::{
    ArchRanking, Availability, MachineGroup, NetworkPolicy, Requirements, Selection, Selections, SolverPolicy,
    machine_group,
};
use crate::model::{Implementation, InterfaceCatalog, Stability};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::{debug, info, warn};

/// A boolean variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(pub usize);

/// A variable or its negation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lit {
    pub var: Var,
    pub positive: bool,
}

impl Var {
    pub fn pos(self) -> Lit {
        Lit { var: self, positive: true }
    }

    pub fn neg(self) -> Lit {
        Lit { var: self, positive: false }
    }
}

/// Clauses, cardinality groups, fixed values and a linear cost
#[derive(Debug, Clone, Default)]
pub struct SatProblem {
    labels: Vec<String>,
    costs: Vec<u64>,
    clauses: Vec<Vec<Lit>>,
    at_most_one: Vec<Vec<Var>>,
    fixed: Vec<(Var, bool)>,
}

impl SatProblem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable costing `cost` when true
    pub fn add_var(&mut self, label: impl Into<String>, cost: u64) -> Var {
        self.labels.push(label.into());
        self.costs.push(cost);
        Var(self.labels.len() - 1)
    }

    /// At least one literal must hold
    pub fn add_clause(&mut self, lits: Vec<Lit>) {
        self.clauses.push(lits);
    }

    pub fn at_most_one(&mut self, vars: Vec<Var>) {
        if vars.len() > 1 {
            self.at_most_one.push(vars);
        }
    }

    pub fn fix(&mut self, var: Var, value: bool) {
        self.fixed.push((var, value));
    }

    pub fn num_vars(&self) -> usize {
        self.labels.len()
    }

    pub fn label(&self, var: Var) -> &str {
        &self.labels[var.0]
    }

    pub fn cost(&self, var: Var) -> u64 {
        self.costs[var.0]
    }

    /// Total cost of a complete assignment
    pub fn assignment_cost(&self, model: &[bool]) -> u64 {
        model
            .iter()
            .zip(&self.costs)
            .filter(|(value, _)| **value)
            .map(|(_, cost)| cost)
            .sum()
    }

    /// Whether a complete assignment satisfies every constraint
    pub fn is_satisfied_by(&self, model: &[bool]) -> bool {
        let value = |lit: &Lit| model[lit.var.0] == lit.positive;
        self.clauses.iter().all(|c| c.iter().any(value))
            && self
                .at_most_one
                .iter()
                .all(|group| group.iter().filter(|v| model[v.0]).count() <= 1)
            && self.fixed.iter().all(|(v, want)| model[v.0] == *want)
    }
}

/// Something that finds a minimum-cost satisfying assignment
pub trait SatBackend {
    /// `None` if the problem is unsatisfiable
    fn solve(&self, problem: &SatProblem) -> Option<Vec<bool>>;
}

/// Decisions [`ExhaustiveBackend`] makes before settling for its best model
pub const MAX_DECISIONS: usize = 50_000;

/// Branch and bound with unit propagation
///
/// Only clauses that still need a variable set true are branched on, most
/// constrained first, trying their cheapest literal first. When none is left
/// the remaining variables are set false, which cannot raise the cost. The
/// first model found is therefore the preference-ordered one; the search
/// then keeps looking for cheaper ones. After [`MAX_DECISIONS`] it stops and
/// returns the best model so far, which may not be the cheapest.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExhaustiveBackend;

impl SatBackend for ExhaustiveBackend {
    fn solve(&self, problem: &SatProblem) -> Option<Vec<bool>> {
        let occurs = Occurrences::new(problem);
        let mut search = Search {
            problem,
            occurs: &occurs,
            assignment: vec![None; problem.num_vars()],
            trail: Vec::new(),
            cost: 0,
            best: None,
            decisions: 0,
        };

        for (var, value) in &problem.fixed {
            if !search.set(var.0, *value) {
                return None;
            }
        }
        for clause in 0..problem.clauses.len() {
            match search.clause_state(clause) {
                ClauseState::Falsified => return None,
                ClauseState::Unit(lit) => {
                    if !search.set(lit.var.0, lit.positive) {
                        return None;
                    }
                }
                ClauseState::Satisfied | ClauseState::Open { .. } => {}
            }
        }

        search.descend();
        if search.decisions > MAX_DECISIONS {
            warn!(
                "SAT search stopped after {} decisions; the selection may not be the cheapest",
                MAX_DECISIONS
            );
        }
        search.best.map(|(_, model)| model)
    }
}

/// Clauses and groups each variable appears in
struct Occurrences {
    clauses: Vec<Vec<usize>>,
    groups: Vec<Vec<usize>>,
}

impl Occurrences {
    fn new(problem: &SatProblem) -> Self {
        let mut clauses = vec![Vec::new(); problem.num_vars()];
        for (index, clause) in problem.clauses.iter().enumerate() {
            for lit in clause {
                clauses[lit.var.0].push(index);
            }
        }
        let mut groups = vec![Vec::new(); problem.num_vars()];
        for (index, group) in problem.at_most_one.iter().enumerate() {
            for var in group {
                groups[var.0].push(index);
            }
        }
        Self { clauses, groups }
    }
}

enum ClauseState {
    Satisfied,
    Falsified,
    Unit(Lit),
    /// `positive_only`: every unassigned literal is positive
    Open { unassigned: usize, positive_only: bool },
}

struct Search<'p> {
    problem: &'p SatProblem,
    occurs: &'p Occurrences,
    assignment: Vec<Option<bool>>,
    trail: Vec<usize>,
    cost: u64,
    best: Option<(u64, Vec<bool>)>,
    decisions: usize,
}

impl Search<'_> {
    fn descend(&mut self) {
        self.decisions += 1;
        if self.decisions > MAX_DECISIONS {
            return;
        }

        let Some((branch, bound)) = self.pick_branch() else {
            return;
        };
        if self.best.as_ref().is_some_and(|(best, _)| bound >= *best) {
            return;
        }
        let Some(clause) = branch else {
            let model = self.assignment.iter().map(|v| v.unwrap_or(false)).collect();
            self.best = Some((self.cost, model));
            return;
        };

        let problem = self.problem;
        let mut lits: Vec<Lit> = self.open_lits(clause).copied().collect();
        lits.sort_by_key(|lit| problem.costs[lit.var.0]);

        // Try each literal in turn, ruling the earlier ones out
        let outer = self.trail.len();
        for lit in lits {
            let mark = self.trail.len();
            if self.set(lit.var.0, true) {
                self.descend();
            }
            self.undo(mark);
            if self.decisions > MAX_DECISIONS || !self.set(lit.var.0, false) {
                break;
            }
        }
        self.undo(outer);
    }

    /// Clause to branch on plus a lower bound on any completion's cost
    ///
    /// `None` on a conflict. The branch is `None` when every remaining
    /// clause can be satisfied by setting variables false.
    fn pick_branch(&self) -> Option<(Option<usize>, u64)> {
        let problem = self.problem;
        let mut branch: Option<(usize, usize)> = None;
        let mut bound = self.cost;
        let mut counted = vec![false; problem.num_vars()];

        for clause in 0..problem.clauses.len() {
            match self.clause_state(clause) {
                ClauseState::Satisfied => {}
                ClauseState::Falsified => return None,
                ClauseState::Unit(lit) if !lit.positive => {}
                ClauseState::Unit(_) => {
                    branch = Some((1, clause));
                }
                ClauseState::Open { positive_only: false, .. } => {}
                ClauseState::Open {
                    unassigned,
                    positive_only: true,
                } => {
                    if branch.is_none_or(|(fewest, _)| unassigned < fewest) {
                        branch = Some((unassigned, clause));
                    }
                }
            }
            if self.needs_true(clause) {
                // Clauses over disjoint variables each add their cheapest literal
                if self.open_lits(clause).all(|l| !counted[l.var.0]) {
                    bound += self.open_lits(clause).map(|l| problem.costs[l.var.0]).min().unwrap_or(0);
                    for lit in self.open_lits(clause) {
                        counted[lit.var.0] = true;
                    }
                }
            }
        }
        Some((branch.map(|(_, clause)| clause), bound))
    }

    fn open_lits(&self, clause: usize) -> impl Iterator<Item = &Lit> + '_ {
        self.problem.clauses[clause]
            .iter()
            .filter(|lit| self.assignment[lit.var.0].is_none())
    }

    /// Unsatisfied, and only a variable set true can satisfy it
    fn needs_true(&self, clause: usize) -> bool {
        matches!(
            self.clause_state(clause),
            ClauseState::Unit(Lit { positive: true, .. }) | ClauseState::Open { positive_only: true, .. }
        )
    }

    fn clause_state(&self, clause: usize) -> ClauseState {
        let mut unassigned = 0;
        let mut last = None;
        let mut positive_only = true;
        for lit in &self.problem.clauses[clause] {
            match self.assignment[lit.var.0] {
                Some(value) if value == lit.positive => return ClauseState::Satisfied,
                Some(_) => {}
                None => {
                    unassigned += 1;
                    positive_only &= lit.positive;
                    last = Some(*lit);
                }
            }
        }
        match last {
            None => ClauseState::Falsified,
            Some(lit) if unassigned == 1 => ClauseState::Unit(lit),
            Some(_) => ClauseState::Open {
                unassigned,
                positive_only,
            },
        }
    }

    /// Assign `value` and everything it implies; `false` on a conflict
    fn set(&mut self, var: usize, value: bool) -> bool {
        let problem = self.problem;
        let occurs = self.occurs;
        let mut queue = VecDeque::from([(var, value)]);

        while let Some((var, value)) = queue.pop_front() {
            match self.assignment[var] {
                Some(existing) if existing == value => continue,
                Some(_) => return false,
                None => {}
            }
            self.assignment[var] = Some(value);
            self.trail.push(var);
            if value {
                self.cost += problem.costs[var];
                for &group in &occurs.groups[var] {
                    for other in &problem.at_most_one[group] {
                        if other.0 != var {
                            queue.push_back((other.0, false));
                        }
                    }
                }
            }
            for &clause in &occurs.clauses[var] {
                match self.clause_state(clause) {
                    ClauseState::Falsified => return false,
                    ClauseState::Unit(lit) => queue.push_back((lit.var.0, lit.positive)),
                    ClauseState::Satisfied | ClauseState::Open { .. } => {}
                }
            }
        }
        true
    }

    fn undo(&mut self, mark: usize) {
        while self.trail.len() > mark {
            let Some(var) = self.trail.pop() else {
                break;
            };
            if self.assignment[var] == Some(true) {
                self.cost -= self.problem.costs[var];
            }
            self.assignment[var] = None;
        }
    }
}

/// Exact solver over the same catalog and policy as the greedy [`super::Solver`]
pub struct SatSolver<'a> {
    catalog: &'a InterfaceCatalog,
    availability: &'a dyn Availability,
    policy: SolverPolicy,
    pins: HashMap<String, String>,
}

struct Candidate<'a> {
    interface: String,
    implementation: &'a Implementation,
    var: Var,
}

impl<'a> SatSolver<'a> {
    pub fn new(catalog: &'a InterfaceCatalog, availability: &'a dyn Availability, policy: SolverPolicy) -> Self {
        Self {
            catalog,
            availability,
            policy,
            pins: HashMap::new(),
        }
    }

    /// Force `interface` to use the implementation with this id
    pub fn pin(&mut self, interface: impl Into<String>, id: impl Into<String>) {
        self.pins.insert(interface.into(), id.into());
    }

    pub fn solve(&self, requirements: &Requirements, arch: &ArchRanking, backend: &dyn SatBackend) -> Selections {
        let root = requirements.interface_uri.clone();
        let mut problem = SatProblem::new();
        let mut by_interface: BTreeMap<String, Vec<Candidate<'a>>> = BTreeMap::new();

        // Discover every interface reachable through any candidate
        let mut queue = VecDeque::from([root.clone()]);
        while let Some(uri) = queue.pop_front() {
            if by_interface.contains_key(&uri) {
                continue;
            }
            let is_root = uri == root;
            let usable = self.usable_candidates(&uri, is_root, requirements, arch);
            let mut candidates = Vec::new();
            for (rank, implementation) in usable.into_iter().enumerate() {
                let var = problem.add_var(format!("{} {}", uri, implementation.id), rank as u64 + 1);
                let command = if is_root { requirements.command.as_deref() } else { None };
                for dep in implementation.dependencies_for(command) {
                    queue.push_back(dep.interface.clone());
                }
                candidates.push(Candidate {
                    interface: uri.clone(),
                    implementation,
                    var,
                });
            }
            by_interface.insert(uri, candidates);
        }

        let group_32 = problem.add_var("machine group 32-bit", 0);
        let group_64 = problem.add_var("machine group 64-bit", 0);
        problem.at_most_one(vec![group_32, group_64]);

        for (uri, candidates) in &by_interface {
            problem.at_most_one(candidates.iter().map(|c| c.var).collect());
            if let Some(pinned) = self.pins.get(uri) {
                for c in candidates {
                    problem.fix(c.var, &c.implementation.id == pinned);
                }
            }
            for c in candidates {
                match machine_group(c.implementation.machine.as_deref()) {
                    Some(MachineGroup::Bits32) => problem.add_clause(vec![c.var.neg(), group_32.pos()]),
                    Some(MachineGroup::Bits64) => problem.add_clause(vec![c.var.neg(), group_64.pos()]),
                    None => {}
                }
                let command = if *uri == root { requirements.command.as_deref() } else { None };
                for dep in c.implementation.dependencies_for(command) {
                    let targets = by_interface.get(&dep.interface).map(Vec::as_slice).unwrap_or_default();
                    let (acceptable, excluded): (Vec<&Candidate<'_>>, Vec<&Candidate<'_>>) = targets
                        .iter()
                        .partition(|t| dep.restrictions.iter().all(|r| r.meets(&t.implementation.version)));
                    if dep.is_essential() {
                        let mut clause = vec![c.var.neg()];
                        clause.extend(acceptable.iter().map(|t| t.var.pos()));
                        problem.add_clause(clause);
                    }
                    for t in excluded {
                        problem.add_clause(vec![c.var.neg(), t.var.neg()]);
                    }
                }
            }
        }

        let root_vars: Vec<_> = by_interface
            .get(&root)
            .map(|cs| cs.iter().map(|c| c.var.pos()).collect())
            .unwrap_or_default();
        problem.add_clause(root_vars);

        debug!(
            "SAT problem for {}: {} variables, {} interfaces",
            root,
            problem.num_vars(),
            by_interface.len()
        );

        let model = backend.solve(&problem);
        let mut selections = BTreeMap::new();
        let ready = model.is_some();
        match &model {
            Some(model) => {
                for (uri, candidates) in &by_interface {
                    let chosen = candidates.iter().find(|c| model[c.var.0]);
                    if let Some(c) = chosen {
                        selections.insert(
                            uri.clone(),
                            Some(Selection::from_implementation(&c.interface, c.implementation)),
                        );
                    }
                }
                info!("SAT solution for {} costs {}", root, problem.assignment_cost(model));
            }
            None => {
                selections.insert(root.clone(), None);
            }
        }

        Selections {
            interface: root.clone(),
            command: requirements.command.clone(),
            selections,
            ready,
            notes: if ready {
                Vec::new()
            } else {
                vec![format!("{}: no combination of implementations satisfies every constraint", root)]
            },
        }
    }

    /// Candidates that pass every per-implementation check, best first
    fn usable_candidates(
        &self,
        uri: &str,
        is_root: bool,
        requirements: &Requirements,
        arch: &ArchRanking,
    ) -> Vec<&'a Implementation> {
        let want_source = is_root && requirements.source;
        let threshold = self
            .catalog
            .stability_policy(uri)
            .unwrap_or(if self.policy.help_with_testing {
                Stability::Testing
            } else {
                Stability::Stable
            });
        let catalog: &'a InterfaceCatalog = self.catalog;

        let mut usable: Vec<(&'a Implementation, bool)> = Vec::new();
        for feed_ref in catalog.feed_references(uri) {
            let Some(feed) = catalog.feed(&feed_ref.url) else {
                continue;
            };
            for implementation in &feed.implementations {
                let available = self.availability.is_available(&implementation.source);
                let ok = implementation.stability().is_usable()
                    && implementation.is_source() == want_source
                    && arch.os_rank(implementation.os.as_deref()).is_some()
                    && (implementation.is_source() || arch.machine_rank(implementation.machine.as_deref()).is_some())
                    && (!is_root || requirements.restrictions.iter().all(|r| r.meets(&implementation.version)))
                    && (!is_root
                        || requirements
                            .command
                            .as_deref()
                            .is_none_or(|c| implementation.command(c).is_some()))
                    && (available
                        || (self.policy.network_use != NetworkPolicy::Offline
                            && !implementation.retrieval_methods.is_empty()));
                if ok {
                    usable.push((implementation, available));
                }
            }
        }

        let collapse = |s: Stability| if s >= threshold { Stability::Preferred } else { s };
        usable.sort_by(|(a, a_cached), (b, b_cached)| {
            (b.user_stability == Some(Stability::Preferred))
                .cmp(&(a.user_stability == Some(Stability::Preferred)))
                .then_with(|| collapse(b.stability()).cmp(&collapse(a.stability())))
                .then_with(|| b.version.cmp(&a.version))
                .then_with(|| b_cached.cmp(a_cached))
                .then_with(|| a.id.cmp(&b.id))
        });
        usable.into_iter().map(|(imp, _)| imp).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArchiveSource, Dependency, Feed, ImplSource, RetrievalMethod};
    use crate::version::Restriction;

    struct NothingCached;

    impl Availability for NothingCached {
        fn is_available(&self, _source: &ImplSource) -> bool {
            false
        }
    }

    fn imp(id: &str, version: &str) -> Implementation {
        let mut imp = Implementation::new(id, version.parse().unwrap());
        imp.upstream_stability = Stability::Stable;
        imp.retrieval_methods = vec![RetrievalMethod::Archive(ArchiveSource::new("http://ex/a.tgz"))];
        imp
    }

    fn feed(url: &str, implementations: Vec<Implementation>) -> Feed {
        Feed {
            implementations,
            ..Feed::new(url)
        }
    }

    #[test]
    fn test_backend_minimizes_cost() {
        let mut p = SatProblem::new();
        let a = p.add_var("a", 5);
        let b = p.add_var("b", 2);
        let c = p.add_var("c", 1);
        p.add_clause(vec![a.pos(), b.pos()]);
        p.add_clause(vec![b.neg(), c.pos()]);
        let model = ExhaustiveBackend.solve(&p).unwrap();
        assert!(p.is_satisfied_by(&model));
        assert_eq!(model, vec![false, true, true]);
        assert_eq!(p.assignment_cost(&model), 3);

        p.fix(b, false);
        let model = ExhaustiveBackend.solve(&p).unwrap();
        assert_eq!(model, vec![true, false, false]);

        p.fix(a, false);
        assert!(ExhaustiveBackend.solve(&p).is_none());
    }

    #[test]
    fn test_long_chain_stays_tractable() {
        // 40 interfaces of three candidates each; every candidate needs some
        // candidate of the next interface, and two best candidates in a row
        // clash. Plain enumeration would face 2^120 assignments.
        const LEVELS: usize = 40;
        let mut p = SatProblem::new();
        let levels: Vec<Vec<Var>> = (0..LEVELS)
            .map(|i| (0..3).map(|rank| p.add_var(format!("lib{} #{}", i, rank), rank + 1)).collect())
            .collect();
        for (i, level) in levels.iter().enumerate() {
            p.at_most_one(level.clone());
            let Some(next) = levels.get(i + 1) else {
                continue;
            };
            for var in level {
                let mut clause = vec![var.neg()];
                clause.extend(next.iter().map(|v| v.pos()));
                p.add_clause(clause);
            }
            p.add_clause(vec![level[0].neg(), next[0].neg()]);
        }
        p.add_clause(levels[0].iter().map(|v| v.pos()).collect());

        let model = ExhaustiveBackend.solve(&p).unwrap();
        assert!(p.is_satisfied_by(&model));
        // Best and second-best alternate down the chain
        for (i, level) in levels.iter().enumerate() {
            let picked = level.iter().position(|v| model[v.0]);
            assert_eq!(picked, Some(i % 2), "level {}", i);
        }
        assert_eq!(p.assignment_cost(&model), (LEVELS as u64 / 2) * 3);
    }

    #[test]
    fn test_unit_clauses_and_empty_clause() {
        let mut p = SatProblem::new();
        let a = p.add_var("a", 1);
        let b = p.add_var("b", 1);
        p.add_clause(vec![a.pos()]);
        p.add_clause(vec![a.neg(), b.neg()]);
        assert_eq!(ExhaustiveBackend.solve(&p), Some(vec![true, false]));

        p.add_clause(vec![]);
        assert!(ExhaustiveBackend.solve(&p).is_none());
    }

    #[test]
    fn test_finds_combination_greedy_misses() {
        // The newest root needs lib >= 2 but the only lib 2 needs an
        // unavailable helper; the exact solver falls back to root 1.
        let mut catalog = InterfaceCatalog::new();
        let mut root_new = imp("root2", "2.0");
        let mut needs_new_lib = Dependency::new("http://ex/lib");
        needs_new_lib.restrictions = vec![Restriction::range(Some("2"), None).unwrap()];
        root_new.requires = vec![needs_new_lib];
        let mut root_old = imp("root1", "1.0");
        root_old.requires = vec![Dependency::new("http://ex/lib")];
        let mut lib_new = imp("lib2", "2.0");
        lib_new.requires = vec![Dependency::new("http://ex/helper")];
        catalog.add_feed(feed("http://ex/root", vec![root_new, root_old]));
        catalog.add_feed(feed("http://ex/lib", vec![lib_new, imp("lib1", "1.0")]));

        let greedy = super::super::Solver::new(&catalog, &NothingCached, SolverPolicy::default())
            .solve(&Requirements::new("http://ex/root"), &ArchRanking::for_host("Linux", "x86_64"));
        assert!(!greedy.ready);

        let sat = SatSolver::new(&catalog, &NothingCached, SolverPolicy::default());
        let selections = sat.solve(
            &Requirements::new("http://ex/root"),
            &ArchRanking::for_host("Linux", "x86_64"),
            &ExhaustiveBackend,
        );
        assert!(selections.ready);
        assert_eq!(selections.get("http://ex/root").unwrap().id, "root1");
        assert_eq!(selections.get("http://ex/lib").unwrap().id, "lib1");
        assert!(selections.get("http://ex/helper").is_none());
    }

    #[test]
    fn test_machine_groups_are_exclusive() {
        let mut catalog = InterfaceCatalog::new();
        let mut root = imp("root64", "1.0");
        root.machine = Some("x86_64".into());
        root.requires = vec![Dependency::new("http://ex/lib")];
        let mut lib32 = imp("lib32", "2.0");
        lib32.machine = Some("i686".into());
        let mut lib64 = imp("lib64", "1.0");
        lib64.machine = Some("x86_64".into());
        catalog.add_feed(feed("http://ex/root", vec![root]));
        catalog.add_feed(feed("http://ex/lib", vec![lib32, lib64]));

        let sat = SatSolver::new(&catalog, &NothingCached, SolverPolicy::default());
        let selections = sat.solve(
            &Requirements::new("http://ex/root"),
            &ArchRanking::for_host("Linux", "x86_64"),
            &ExhaustiveBackend,
        );
        assert_eq!(selections.get("http://ex/lib").unwrap().id, "lib64");
    }

    #[test]
    fn test_pins_and_unsatisfiable() {
        let mut catalog = InterfaceCatalog::new();
        catalog.add_feed(feed("http://ex/root", vec![imp("a", "1.0"), imp("b", "2.0")]));

        let mut sat = SatSolver::new(&catalog, &NothingCached, SolverPolicy::default());
        let arch = ArchRanking::for_host("Linux", "x86_64");
        sat.pin("http://ex/root", "a");
        let selections = sat.solve(&Requirements::new("http://ex/root"), &arch, &ExhaustiveBackend);
        assert_eq!(selections.root().unwrap().id, "a");

        sat.pin("http://ex/root", "missing");
        let selections = sat.solve(&Requirements::new("http://ex/root"), &arch, &ExhaustiveBackend);
        assert!(!selections.ready);
        assert_eq!(selections.unsatisfied(), vec!["http://ex/root"]);
    }
}
