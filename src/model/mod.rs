// src/model/mod.rs

//! Interfaces, feeds and implementations
//!
//! This is the already-parsed object graph the solver and fetcher work on.
//! Feeds are read from JSON documents (see [`catalog`]); nothing here knows
//! about the network.
//!
//! An implementation is identified either by manifest digests (fetchable
//! into the store), by a local directory, or by a native package id, which
//! [`ImplSource`] keeps as a closed set of alternatives.

pub mod catalog;

pub use catalog::InterfaceCatalog;

use crate::hash::ManifestDigest;
use crate::version::{ImplVersion, Restriction};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Quality rating of an implementation, worst first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stability {
    Insecure,
    Buggy,
    Developer,
    #[default]
    Testing,
    Stable,
    Packaged,
    Preferred,
}

impl Stability {
    pub const ALL: [Stability; 7] = [
        Stability::Insecure,
        Stability::Buggy,
        Stability::Developer,
        Stability::Testing,
        Stability::Stable,
        Stability::Packaged,
        Stability::Preferred,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stability::Insecure => "insecure",
            Stability::Buggy => "buggy",
            Stability::Developer => "developer",
            Stability::Testing => "testing",
            Stability::Stable => "stable",
            Stability::Packaged => "packaged",
            Stability::Preferred => "preferred",
        }
    }

    /// Anything rated buggy or worse is never selected
    pub fn is_usable(&self) -> bool {
        *self > Stability::Buggy
    }
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Stability::ALL
            .into_iter()
            .find(|level| level.name() == s)
            .ok_or_else(|| Error::ParseError(format!("unknown stability level: {}", s)))
    }
}

/// Whether a dependency must be satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    #[default]
    Essential,
    Recommended,
}

impl Importance {
    pub fn name(&self) -> &'static str {
        match self {
            Importance::Essential => "essential",
            Importance::Recommended => "recommended",
        }
    }
}

/// How an environment binding combines with an existing value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvMode {
    #[default]
    Prepend,
    Append,
    Replace,
}

impl EnvMode {
    pub fn name(&self) -> &'static str {
        match self {
            EnvMode::Prepend => "prepend",
            EnvMode::Append => "append",
            EnvMode::Replace => "replace",
        }
    }
}

impl FromStr for EnvMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "prepend" => Ok(EnvMode::Prepend),
            "append" => Ok(EnvMode::Append),
            "replace" => Ok(EnvMode::Replace),
            other => Err(Error::ParseError(format!("unknown environment mode: {}", other))),
        }
    }
}

/// How a selected implementation's location is exposed to its user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Binding {
    Environment {
        name: String,
        /// Path inside the implementation to insert
        #[serde(default, skip_serializing_if = "Option::is_none")]
        insert: Option<String>,
        /// Literal value, used instead of `insert`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        #[serde(default)]
        mode: EnvMode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        separator: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<String>,
    },
    ExecutableInVar {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        command: Option<String>,
    },
    ExecutableInPath {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        command: Option<String>,
    },
}

/// A reference from an implementation (or command) to another interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub interface: String,
    #[serde(default)]
    pub importance: Importance,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restrictions: Vec<Restriction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<Binding>,
}

impl Dependency {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            importance: Importance::Essential,
            restrictions: Vec::new(),
            bindings: Vec::new(),
        }
    }

    pub fn is_essential(&self) -> bool {
        self.importance == Importance::Essential
    }
}

/// A named entry point of an implementation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<Dependency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<Binding>,
}

/// What identifies an implementation on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImplSource {
    /// Content-addressed: any of these digests names it in the store
    Digests(Vec<ManifestDigest>),
    /// A directory on the local filesystem, never copied into the store
    LocalPath(PathBuf),
    /// A native distribution package
    Package { package_id: String, installed: bool },
}

impl Default for ImplSource {
    fn default() -> Self {
        ImplSource::Digests(Vec::new())
    }
}

impl ImplSource {
    pub fn digests(&self) -> &[ManifestDigest] {
        match self {
            ImplSource::Digests(digests) => digests,
            _ => &[],
        }
    }
}

/// A single archive download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSource {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// MIME type; guessed from the URL when absent
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Sub-directory of the archive to use as the implementation root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract: Option<String>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub start_offset: u64,
    /// Only inside recipes: where in the assembly directory to unpack
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

impl ArchiveSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            size: None,
            mime_type: None,
            extract: None,
            start_offset: 0,
            dest: None,
        }
    }
}

/// A single file download placed inside a recipe's assembly directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSource {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub dest: String,
    #[serde(default)]
    pub executable: bool,
}

/// One step of a recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RecipeStep {
    Archive(ArchiveSource),
    File(FileSource),
    Rename { source: String, dest: String },
    Remove { path: String },
}

impl RecipeStep {
    pub fn size(&self) -> u64 {
        match self {
            RecipeStep::Archive(archive) => archive.size.unwrap_or(0),
            RecipeStep::File(file) => file.size.unwrap_or(0),
            RecipeStep::Rename { .. } | RecipeStep::Remove { .. } => 0,
        }
    }

    /// URL this step downloads, if any
    pub fn url(&self) -> Option<&str> {
        match self {
            RecipeStep::Archive(archive) => Some(&archive.url),
            RecipeStep::File(file) => Some(&file.url),
            RecipeStep::Rename { .. } | RecipeStep::Remove { .. } => None,
        }
    }
}

/// Ordered assembly steps applied to one shared directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub steps: Vec<RecipeStep>,
}

impl Recipe {
    /// Total download size of all steps
    pub fn size(&self) -> u64 {
        self.steps.iter().map(RecipeStep::size).sum()
    }
}

/// Reference to a native distribution package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    pub package: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub distributions: Vec<String>,
}

/// Ways of acquiring an implementation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RetrievalMethod {
    Archive(ArchiveSource),
    Recipe(Recipe),
    Package(PackageRef),
}

impl RetrievalMethod {
    pub fn size(&self) -> u64 {
        match self {
            RetrievalMethod::Archive(archive) => archive.size.unwrap_or(0),
            RetrievalMethod::Recipe(recipe) => recipe.size(),
            RetrievalMethod::Package(_) => 0,
        }
    }
}

/// One concrete, versioned realization of an interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    pub id: String,
    /// URL of the feed this implementation came from; filled in on import
    #[serde(default)]
    pub feed: String,
    pub version: ImplVersion,
    #[serde(default)]
    pub source: ImplSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<String>,
    #[serde(rename = "stability", default)]
    pub upstream_stability: Stability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_stability: Option<Stability>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<Dependency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<Command>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<Binding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retrieval_methods: Vec<RetrievalMethod>,
}

impl Implementation {
    pub fn new(id: impl Into<String>, version: ImplVersion) -> Self {
        Self {
            id: id.into(),
            feed: String::new(),
            version,
            source: ImplSource::default(),
            os: None,
            machine: None,
            upstream_stability: Stability::default(),
            user_stability: None,
            requires: Vec::new(),
            commands: Vec::new(),
            bindings: Vec::new(),
            retrieval_methods: Vec::new(),
        }
    }

    /// The user's override if set, else the upstream rating
    pub fn stability(&self) -> Stability {
        self.user_stability.unwrap_or(self.upstream_stability)
    }

    pub fn is_source(&self) -> bool {
        self.machine.as_deref() == Some("src")
    }

    pub fn digests(&self) -> &[ManifestDigest] {
        self.source.digests()
    }

    /// The digest to fetch and verify against
    pub fn best_digest(&self) -> Option<&ManifestDigest> {
        ManifestDigest::best(self.digests())
    }

    pub fn command(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.name == name)
    }

    /// Dependencies of the implementation plus those of `command`
    pub fn dependencies_for<'a>(&'a self, command: Option<&str>) -> impl Iterator<Item = &'a Dependency> {
        let command_deps = command
            .and_then(|name| self.command(name))
            .map(|c| c.requires.as_slice())
            .unwrap_or_default();
        self.requires.iter().chain(command_deps)
    }
}

/// A feed's pointer to another feed that also provides implementations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedReference {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<String>,
}

impl FeedReference {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            os: None,
            machine: None,
        }
    }
}

/// A document listing implementations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Declared modification time, seconds since the epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<i64>,
    #[serde(default)]
    pub implementations: Vec<Implementation>,
    /// Secondary feeds for the same interface
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feeds: Vec<FeedReference>,
}

impl Feed {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: None,
            last_modified: None,
            implementations: Vec::new(),
            feeds: Vec::new(),
        }
    }

    pub fn implementation(&self, id: &str) -> Option<&Implementation> {
        self.implementations.iter().find(|i| i.id == id)
    }
}

/// Per-interface settings kept by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub uri: String,
    /// Minimum stability ranked as preferred
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stability_policy: Option<Stability>,
    /// Extra feeds registered by the user
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feeds: Vec<FeedReference>,
}

impl Interface {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            stability_policy: None,
            feeds: Vec::new(),
        }
    }
}
