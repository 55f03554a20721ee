// src/version/mod.rs

//! Implementation versions and version restrictions
//!
//! Versions are dotted number lists separated by modifiers:
//! `1.2-pre3`, `2.0-rc1`, `1.0-post`, `1.4-2`. Modifiers order as
//! `pre < rc < (none) < post`, and a version without a trailing modifier
//! sorts after the same version carrying `pre` or `rc`:
//!
//! ```
//! use injector::version::ImplVersion;
//!
//! let v = |s: &str| s.parse::<ImplVersion>().unwrap();
//! assert!(v("1.2-pre3") < v("1.2-rc1"));
//! assert!(v("1.2-rc1") < v("1.2"));
//! assert!(v("1.2") < v("1.2-post"));
//! assert!(v("1.2") < v("1.2-1"));
//! assert!(v("1.2") < v("1.10"));
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Segment {
    Numbers(Vec<u64>),
    Modifier(i8),
}

fn modifier_value(word: &str) -> Option<i8> {
    match word {
        "pre" => Some(-2),
        "rc" => Some(-1),
        "" => Some(0),
        "post" => Some(1),
        _ => None,
    }
}

/// A parsed implementation version
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImplVersion {
    raw: String,
    segments: Vec<Segment>,
}

impl ImplVersion {
    pub fn parse(s: &str) -> Result<Self> {
        let bad = |why: &str| Error::ParseError(format!("invalid version {:?}: {}", s, why));
        if s.is_empty() {
            return Err(bad("empty"));
        }

        let mut segments = Vec::new();
        let mut chunks = s.split('-');
        let numbers = |text: &str| -> Result<Segment> {
            if text.is_empty() {
                return Ok(Segment::Numbers(Vec::new()));
            }
            text.split('.')
                .map(|n| n.parse::<u64>().map_err(|_| bad("expected dotted numbers")))
                .collect::<Result<Vec<_>>>()
                .map(Segment::Numbers)
        };

        segments.push(numbers(chunks.next().unwrap_or_default())?);
        let mut ends_with_modifier = false;
        for chunk in chunks {
            let split = chunk
                .find(|c: char| !c.is_ascii_lowercase())
                .unwrap_or(chunk.len());
            let (word, rest) = chunk.split_at(split);
            let value = modifier_value(word).ok_or_else(|| bad("unknown modifier"))?;
            segments.push(Segment::Modifier(value));
            ends_with_modifier = rest.is_empty() && !word.is_empty();
            if !ends_with_modifier {
                segments.push(numbers(rest)?);
            }
        }
        if !ends_with_modifier {
            segments.push(Segment::Modifier(0));
        }

        Ok(Self {
            raw: s.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl PartialEq for ImplVersion {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for ImplVersion {}

impl std::hash::Hash for ImplVersion {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.segments.hash(state);
    }
}

impl Ord for ImplVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.segments.cmp(&other.segments)
    }
}

impl PartialOrd for ImplVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ImplVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for ImplVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ImplVersion {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<ImplVersion> for String {
    fn from(v: ImplVersion) -> String {
        v.raw
    }
}

/// One alternative of a version expression
#[derive(Debug, Clone, PartialEq, Eq)]
enum Clause {
    Exact(ImplVersion),
    Not(ImplVersion),
    Range {
        not_before: Option<ImplVersion>,
        before: Option<ImplVersion>,
    },
}

impl Clause {
    fn matches(&self, v: &ImplVersion) -> bool {
        match self {
            Clause::Exact(x) => v == x,
            Clause::Not(x) => v != x,
            Clause::Range { not_before, before } => {
                not_before.as_ref().is_none_or(|low| v >= low)
                    && before.as_ref().is_none_or(|high| v < high)
            }
        }
    }
}

/// A version expression such as `1.2..!2.0 | 3`
///
/// Alternatives are separated by `|`. Each is an exact version, `!v` (any
/// version except `v`), or a range `low..!high` where either side may be
/// omitted. The lower bound is inclusive, the upper exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionExpression {
    raw: String,
    clauses: Vec<Clause>,
}

impl VersionExpression {
    pub fn parse(s: &str) -> Result<Self> {
        let clauses = s
            .split('|')
            .map(|alt| parse_clause(alt.trim(), s))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            raw: s.trim().to_string(),
            clauses,
        })
    }

    pub fn matches(&self, v: &ImplVersion) -> bool {
        self.clauses.iter().any(|c| c.matches(v))
    }
}

fn parse_clause(alt: &str, whole: &str) -> Result<Clause> {
    let bad = || Error::ParseError(format!("invalid version expression {:?}", whole));
    if alt.is_empty() {
        return Err(bad());
    }
    if let Some((low, high)) = alt.split_once("..") {
        let not_before = match low.trim() {
            "" => None,
            low => Some(ImplVersion::parse(low)?),
        };
        let before = match high.trim() {
            "" => None,
            high => Some(ImplVersion::parse(high.strip_prefix('!').ok_or_else(bad)?)?),
        };
        return Ok(Clause::Range { not_before, before });
    }
    if let Some(v) = alt.strip_prefix('!') {
        return Ok(Clause::Not(ImplVersion::parse(v.trim())?));
    }
    Ok(Clause::Exact(ImplVersion::parse(alt)?))
}

impl fmt::Display for VersionExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for VersionExpression {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<VersionExpression> for String {
    fn from(e: VersionExpression) -> String {
        e.raw
    }
}

/// A constraint a dependency places on the versions of its target interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Restriction {
    Expression {
        expression: VersionExpression,
    },
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        not_before: Option<ImplVersion>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        before: Option<ImplVersion>,
    },
}

impl Restriction {
    pub fn range(not_before: Option<&str>, before: Option<&str>) -> Result<Self> {
        Ok(Restriction::Range {
            not_before: not_before.map(ImplVersion::parse).transpose()?,
            before: before.map(ImplVersion::parse).transpose()?,
        })
    }

    pub fn expression(expr: &str) -> Result<Self> {
        Ok(Restriction::Expression {
            expression: VersionExpression::parse(expr)?,
        })
    }

    pub fn meets(&self, version: &ImplVersion) -> bool {
        match self {
            Restriction::Expression { expression } => expression.matches(version),
            Restriction::Range { not_before, before } => Clause::Range {
                not_before: not_before.clone(),
                before: before.clone(),
            }
            .matches(version),
        }
    }
}

impl fmt::Display for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Restriction::Expression { expression } => write!(f, "version {}", expression),
            Restriction::Range { not_before, before } => {
                let mut parts = Vec::new();
                if let Some(v) = not_before {
                    parts.push(format!("version >= {}", v));
                }
                if let Some(v) = before {
                    parts.push(format!("version < {}", v));
                }
                if parts.is_empty() {
                    f.write_str("any version")
                } else {
                    f.write_str(&parts.join(", "))
                }
            }
        }
    }
}
