// src/fetch/recipe.rs

//! Multi-step recipes
//!
//! All downloads of a recipe start together. Once every one of them has
//! finished, the steps are applied in declared order to a single staging
//! directory, so a later step can rename or delete what an earlier one
//! unpacked. Every path a step names is checked before anything touches the
//! disk, and again against symlinks when the step runs.

use super::Fetcher;
use crate::archive::{self, ArchiveType, UnpackOptions};
use crate::error::{Error, Result};
use crate::filesystem::path::{relative_path, resolve_within};
use crate::filesystem::set_executable;
use crate::hash::ManifestDigest;
use crate::model::{ArchiveSource, FileSource, Recipe, RecipeStep};
use crate::tasks::Blocker;
use filetime::FileTime;
use futures::future::try_join_all;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reject absolute and escaping paths and unknown archive types up front
pub fn validate(recipe: &Recipe) -> Result<()> {
    for step in &recipe.steps {
        match step {
            RecipeStep::Archive(archive) => {
                ArchiveType::detect(archive.mime_type.as_deref(), &archive.url)?;
                if let Some(dest) = &archive.dest {
                    relative_path(dest)?;
                }
                if let Some(extract) = &archive.extract {
                    relative_path(extract)?;
                }
            }
            RecipeStep::File(file) => {
                relative_path(&file.dest)?;
            }
            RecipeStep::Rename { source, dest } => {
                relative_path(source)?;
                relative_path(dest)?;
            }
            RecipeStep::Remove { path } => {
                relative_path(path)?;
            }
        }
    }
    Ok(())
}

pub(crate) async fn fetch_recipe(
    fetcher: &Fetcher,
    required: &ManifestDigest,
    recipe: &Recipe,
    abort: Option<&Blocker>,
) -> Result<()> {
    validate(recipe)?;

    let downloads = tempfile::Builder::new().prefix("injector-recipe-").tempdir()?;
    let fetches = recipe.steps.iter().enumerate().filter_map(|(index, step)| {
        let (url, size) = match step {
            RecipeStep::Archive(archive) => (&archive.url, archive.size.map(|s| s + archive.start_offset)),
            RecipeStep::File(file) => (&file.url, file.size),
            RecipeStep::Rename { .. } | RecipeStep::Remove { .. } => return None,
        };
        let dest = downloads.path().join(format!("step-{}", index));
        Some(async move {
            fetcher.fetch_to(url, &dest, size, abort).await?;
            Ok::<_, Error>((index, dest))
        })
    });
    let downloaded: HashMap<usize, PathBuf> = try_join_all(fetches).await?.into_iter().collect();
    debug!("Recipe downloads complete ({} files)", downloaded.len());

    let staging = fetcher.store().staging()?;
    for (index, step) in recipe.steps.iter().enumerate() {
        apply_step(staging.path(), step, downloaded.get(&index))?;
    }
    fetcher.store().add_staged(required, staging)?;
    Ok(())
}

fn apply_step(root: &Path, step: &RecipeStep, downloaded: Option<&PathBuf>) -> Result<()> {
    match step {
        RecipeStep::Archive(archive) => apply_archive(root, archive, downloaded),
        RecipeStep::File(file) => apply_file(root, file, downloaded),
        RecipeStep::Rename { source, dest } => {
            let from = resolve_within(root, source)?;
            let to = resolve_within(root, dest)?;
            if fs::symlink_metadata(&from).is_err() {
                return Err(Error::NotFound(format!("rename source {} does not exist", source)));
            }
            if fs::symlink_metadata(&to).is_ok() {
                return Err(Error::AlreadyExists(format!("rename destination {}", dest)));
            }
            if let Some(parent) = to.parent() {
                fs::create_dir_all(parent)?;
            }
            debug!("Renaming {} to {}", source, dest);
            fs::rename(&from, &to)?;
            Ok(())
        }
        RecipeStep::Remove { path } => {
            let target = resolve_within(root, path)?;
            let meta = fs::symlink_metadata(&target)
                .map_err(|_| Error::NotFound(format!("cannot remove {}: no such path", path)))?;
            debug!("Removing {}", path);
            if meta.is_dir() {
                fs::remove_dir_all(&target)?;
            } else {
                fs::remove_file(&target)?;
            }
            Ok(())
        }
    }
}

fn downloaded_file<'a>(downloaded: Option<&'a PathBuf>, url: &str) -> Result<&'a PathBuf> {
    downloaded.ok_or_else(|| Error::NotFound(format!("no download for {}", url)))
}

fn apply_archive(root: &Path, archive: &ArchiveSource, downloaded: Option<&PathBuf>) -> Result<()> {
    let file = downloaded_file(downloaded, &archive.url)?;
    let target = match &archive.dest {
        Some(dest) => {
            let target = resolve_within(root, dest)?;
            fs::create_dir_all(&target)?;
            target
        }
        None => root.to_path_buf(),
    };
    let kind = ArchiveType::detect(archive.mime_type.as_deref(), &archive.url)?;
    let options = UnpackOptions {
        extract: archive.extract.clone(),
        start_offset: archive.start_offset,
    };
    archive::unpack(file, &target, kind, &options)
}

fn apply_file(root: &Path, source: &FileSource, downloaded: Option<&PathBuf>) -> Result<()> {
    let file = downloaded_file(downloaded, &source.url)?;
    let target = resolve_within(root, &source.dest)?;
    if fs::symlink_metadata(&target).is_ok() {
        return Err(Error::AlreadyExists(format!("file destination {}", source.dest)));
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(file, &target)?;
    set_executable(&target, source.executable)?;
    filetime::set_file_mtime(&target, FileTime::zero())?;
    Ok(())
}
