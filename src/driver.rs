// src/driver.rs

//! Solve, download, and solve again
//!
//! Under the minimal network policy a fresh download can change what the
//! solver prefers, so the [`Driver`] repeats solve-then-fetch until the
//! choices stop changing or nothing is left to download.

use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::model::InterfaceCatalog;
use crate::solver::sat::{ExhaustiveBackend, SatSolver};
use crate::solver::{ArchRanking, NetworkPolicy, Requirements, Selection, Selections, Solver, SolverPolicy};
use crate::tasks::Blocker;
use futures::future::try_join_all;
use tracing::{debug, info};

/// Upper bound on solve/fetch rounds
pub const MAX_ROUNDS: usize = 5;

/// Drives the solver and the fetcher for one set of requirements
pub struct Driver<'a> {
    catalog: &'a InterfaceCatalog,
    fetcher: &'a Fetcher,
    policy: SolverPolicy,
    arch: ArchRanking,
    exact: bool,
}

impl<'a> Driver<'a> {
    pub fn new(catalog: &'a InterfaceCatalog, fetcher: &'a Fetcher, policy: SolverPolicy) -> Self {
        Self {
            catalog,
            fetcher,
            policy,
            arch: ArchRanking::host(),
            exact: false,
        }
    }

    pub fn with_arch(mut self, arch: ArchRanking) -> Self {
        self.arch = arch;
        self
    }

    /// Use the exact SAT formulation instead of the greedy walk
    pub fn exact(mut self, exact: bool) -> Self {
        self.exact = exact;
        self
    }

    pub fn solve(&self, requirements: &Requirements) -> Selections {
        let store = self.fetcher.store();
        if self.exact {
            SatSolver::new(self.catalog, store, self.policy).solve(requirements, &self.arch, &ExhaustiveBackend)
        } else {
            Solver::new(self.catalog, store, self.policy).solve(requirements, &self.arch)
        }
    }

    /// Fetch every selected implementation that is not available yet
    pub async fn download_missing(&self, selections: &Selections, abort: Option<&Blocker>) -> Result<()> {
        let missing = selections.needing_download(self.fetcher.store());
        let jobs = missing.into_iter().map(|selection| self.download_one(selection, abort));
        try_join_all(jobs).await?;
        Ok(())
    }

    async fn download_one(&self, selection: &Selection, abort: Option<&Blocker>) -> Result<()> {
        let implementation = self
            .catalog
            .implementation(&selection.from_feed, &selection.id)
            .ok_or_else(|| {
                Error::NotFound(format!("implementation {} is not in feed {}", selection.id, selection.from_feed))
            })?;
        let method = self.fetcher.choose_method(implementation).ok_or_else(|| {
            Error::NotFound(format!(
                "no usable retrieval method for {} {}",
                selection.interface, selection.id
            ))
        })?;
        self.fetcher.download_impl(implementation, method, abort).await
    }

    /// Alternate solving and fetching until the result is stable
    ///
    /// Off-line, this is a single solve. Otherwise the loop stops once nothing
    /// needs downloading, once a re-solve makes the same choices, or after
    /// [`MAX_ROUNDS`].
    pub async fn solve_with_downloads(&self, requirements: &Requirements, abort: Option<&Blocker>) -> Result<Selections> {
        let mut selections = self.solve(requirements);
        if self.policy.network_use == NetworkPolicy::Offline {
            return Ok(selections);
        }

        for round in 1..=MAX_ROUNDS {
            let missing = selections.needing_download(self.fetcher.store()).len();
            if missing == 0 {
                break;
            }
            info!("Round {}: fetching {} implementation(s)", round, missing);
            self.download_missing(&selections, abort).await?;

            let next = self.solve(requirements);
            let stable = next.same_choices(&selections);
            selections = next;
            if stable {
                debug!("Choices unchanged after round {}", round);
                break;
            }
        }
        Ok(selections)
    }
}
