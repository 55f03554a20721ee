// src/commands/store.rs

//! `injector store ...` commands

use super::open_context;
use anyhow::{Result, anyhow, bail};
use injector::archive::{ArchiveType, UnpackOptions};
use injector::hash::{DigestAlgorithm, ManifestDigest};
use injector::manifest;
use injector::store::verify_tree;
use std::path::{Path, PathBuf};
use tracing::info;

fn parse_digest(digest: &str) -> Result<ManifestDigest> {
    digest
        .parse()
        .map_err(|e| anyhow!("invalid digest {:?}: {}", digest, e))
}

/// Add a directory or an archive to the store
pub fn cmd_store_add(
    config: Option<&Path>,
    digest: &str,
    source: &Path,
    extract: Option<&str>,
    mime_type: Option<&str>,
) -> Result<()> {
    let context = open_context(config)?;
    let digest = parse_digest(digest)?;

    let path = if source.is_dir() {
        if extract.is_some() {
            bail!("--extract only applies to archives");
        }
        context.store.add_dir(&digest, source)?
    } else {
        let name = source.to_string_lossy();
        let kind = ArchiveType::detect(mime_type, &name)?;
        let options = UnpackOptions {
            extract: extract.map(str::to_string),
            start_offset: 0,
        };
        context.store.add_archive(&digest, source, kind, &options)?
    };
    println!("{}", path.display());
    Ok(())
}

pub fn cmd_store_find(config: Option<&Path>, digest: &str) -> Result<()> {
    let context = open_context(config)?;
    let digest = parse_digest(digest)?;
    match context.store.lookup(&digest) {
        Some(path) => {
            println!("{}", path.display());
            Ok(())
        }
        None => bail!("{} is not in any store", digest),
    }
}

/// Verify the named entries, or every entry when none are named
pub fn cmd_store_verify(config: Option<&Path>, paths: &[String]) -> Result<()> {
    let context = open_context(config)?;

    let mut targets: Vec<(PathBuf, Option<ManifestDigest>)> = Vec::new();
    if paths.is_empty() {
        for (digest, path) in context.store.list()? {
            targets.push((path, Some(digest)));
        }
    }
    for arg in paths {
        let as_path = Path::new(arg);
        if as_path.is_dir() {
            targets.push((as_path.to_path_buf(), None));
        } else {
            let digest = parse_digest(arg)?;
            let path = context
                .store
                .lookup(&digest)
                .ok_or_else(|| anyhow!("{} is not in any store", digest))?;
            targets.push((path, Some(digest)));
        }
    }

    let mut failures = 0;
    for (path, digest) in &targets {
        let report = verify_tree(path, digest.as_ref())?;
        if report.is_ok() {
            println!("OK {}", path.display());
        } else {
            failures += 1;
            println!("FAILED {}\n{}", path.display(), report);
        }
    }
    info!("Verified {} entries, {} failed", targets.len(), failures);
    if failures > 0 {
        bail!("{} of {} entries failed verification", failures, targets.len());
    }
    Ok(())
}

pub fn cmd_store_list(config: Option<&Path>) -> Result<()> {
    let context = open_context(config)?;
    let entries = context.store.list()?;
    if entries.is_empty() {
        println!("Store is empty.");
        return Ok(());
    }
    for (digest, path) in entries {
        println!("{}  {}", digest, path.display());
    }
    Ok(())
}

/// Print a directory's manifest followed by its digest
pub fn cmd_store_manifest(dir: &Path, algorithm: Option<&str>) -> Result<()> {
    let algorithm = match algorithm {
        Some(name) => name
            .parse::<DigestAlgorithm>()
            .map_err(|e| anyhow!("unknown algorithm {:?}: {}", name, e))?,
        None => DigestAlgorithm::default(),
    };
    let (text, digest) = manifest::tree_digest(dir, algorithm)?;
    print!("{}", text);
    println!("{}", digest);
    Ok(())
}
