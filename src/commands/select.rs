// src/commands/select.rs

//! `injector select`

use super::{load_catalogs, open_context, print_selections, requirements, solver_policy};
use crate::cli::SolveArgs;
use anyhow::Result;
use injector::solver::sat::{ExhaustiveBackend, SatSolver};
use injector::solver::{ArchRanking, Solver};
use std::path::Path;
use tracing::info;

/// Solve without downloading and print the result
///
/// Partial results are printed and are not an error.
pub fn cmd_select(config: Option<&Path>, args: &SolveArgs, xml: bool, explain: bool) -> Result<()> {
    let mut context = open_context(config)?;
    load_catalogs(&mut context, &args.catalogs)?;
    let requirements = requirements(args)?;
    let policy = solver_policy(&context, args);
    let arch = ArchRanking::host();

    let selections = if args.exact {
        info!("Solving {} with the SAT formulation", args.interface);
        SatSolver::new(&context.catalog, &context.store, policy).solve(&requirements, &arch, &ExhaustiveBackend)
    } else {
        let solver = Solver::new(&context.catalog, &context.store, policy);
        let (selections, diagnostics) = solver.solve_explained(&requirements, &arch);
        if explain {
            for uri in diagnostics.interfaces() {
                println!("{}\n", diagnostics.explain(uri));
            }
        }
        selections
    };

    if xml {
        print!("{}", selections.to_xml()?);
    } else {
        print_selections(&selections, &context.store);
    }
    Ok(())
}
