// src/commands/trust.rs

//! `injector trust ...` commands

use super::open_context;
use anyhow::Result;
use std::path::Path;

pub fn cmd_trust_add(config: Option<&Path>, fingerprint: &str, domain: &str) -> Result<()> {
    let context = open_context(config)?;
    context.trust_db.lock().trust_key(fingerprint, domain)?;
    println!("Trusting {} for {}", fingerprint, domain);
    Ok(())
}

pub fn cmd_trust_remove(config: Option<&Path>, fingerprint: &str, domain: &str) -> Result<()> {
    let context = open_context(config)?;
    if context.trust_db.lock().untrust_key(fingerprint, domain)? {
        println!("No longer trusting {} for {}", fingerprint, domain);
    } else {
        println!("{} was not trusted for {}", fingerprint, domain);
    }
    Ok(())
}

pub fn cmd_trust_list(config: Option<&Path>) -> Result<()> {
    let context = open_context(config)?;
    let keys = context.trust_db.lock().keys();
    if keys.is_empty() {
        println!("No trusted keys.");
        return Ok(());
    }
    for (fingerprint, domains) in keys {
        println!("{}", fingerprint);
        for domain in domains {
            println!("  {}", domain);
        }
    }
    Ok(())
}
