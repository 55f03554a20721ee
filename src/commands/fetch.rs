// src/commands/fetch.rs

//! `injector fetch`

use super::{load_catalogs, open_context, print_selections, requirements, solver_policy};
use crate::cli::SolveArgs;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use injector::Driver;
use injector::tasks::Blocker;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Solve, download what is missing, and print the result
pub async fn cmd_fetch(config: Option<&Path>, args: &SolveArgs, xml: bool) -> Result<()> {
    let mut context = open_context(config)?;
    load_catalogs(&mut context, &args.catalogs)?;
    let requirements = requirements(args)?;
    let policy = solver_policy(&context, args);
    let fetcher = context.fetcher()?;

    let abort = Blocker::new("interrupted");
    let on_interrupt = abort.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling downloads");
            on_interrupt.trigger();
        }
    });

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}")?);
    spinner.set_message(format!("Fetching {}", args.interface));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let driver = Driver::new(&context.catalog, &fetcher, policy).exact(args.exact);
    let result = driver.solve_with_downloads(&requirements, Some(&abort)).await;
    spinner.finish_and_clear();
    let selections = result?;

    if xml {
        print!("{}", selections.to_xml()?);
    } else {
        print_selections(&selections, &context.store);
    }
    Ok(())
}
