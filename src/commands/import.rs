// src/commands/import.rs

//! `injector import`

use super::open_context;
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use injector::trust::{TrustConfirmation, TrustDecision, ValidSignature};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

/// Asks on the terminal, or approves everything with `--yes`
struct TerminalConfirmation {
    assume_yes: bool,
}

#[async_trait]
impl TrustConfirmation for TerminalConfirmation {
    async fn confirm(&self, url: &str, domain: &str, signatures: &[ValidSignature]) -> TrustDecision {
        let fingerprints: Vec<String> = signatures.iter().map(|s| s.fingerprint.clone()).collect();
        if self.assume_yes {
            return TrustDecision::Approve(fingerprints);
        }

        println!("Feed {} is signed by keys not yet trusted for {}:", url, domain);
        for fingerprint in &fingerprints {
            println!("  {}", fingerprint);
        }
        print!("Trust these keys for {}? [y/N] ", domain);
        let _ = io::stdout().flush();

        let answer = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line).map(|_| line)
        })
        .await;
        match answer {
            Ok(Ok(line)) if matches!(line.trim(), "y" | "Y" | "yes") => TrustDecision::Approve(fingerprints),
            _ => TrustDecision::Reject,
        }
    }
}

/// Check a downloaded feed and add it to the feed cache
pub async fn cmd_import(config: Option<&Path>, url: &str, feed: &Path, signature: Option<&Path>, yes: bool) -> Result<()> {
    let mut context = open_context(config)?;
    let data = fs::read(feed).with_context(|| format!("reading {}", feed.display()))?;
    let signature = signature
        .map(|p| fs::read(p).with_context(|| format!("reading {}", p.display())))
        .transpose()?;

    let importer = context.importer(Arc::new(TerminalConfirmation { assume_yes: yes }))?;
    importer
        .import_into(url, &data, signature.as_deref(), &mut context.catalog)
        .await?;
    println!("Imported {}", url);
    Ok(())
}
