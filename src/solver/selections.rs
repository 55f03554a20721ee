// src/solver/selections.rs

//! Solver output
//!
//! A [`Selections`] set maps each interface the solver visited to the chosen
//! implementation, or to nothing when no candidate was usable. It carries
//! everything needed to fetch and run the result without the feeds, and is
//! persisted as XML (see [`Selections::to_xml`]).

use super::Availability;
use crate::error::Result;
use crate::hash::ManifestDigest;
use crate::model::{Binding, Command, Dependency, ImplSource, Implementation, Stability};
use crate::version::ImplVersion;
use std::collections::BTreeMap;

/// The chosen implementation of one interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub interface: String,
    pub id: String,
    pub version: ImplVersion,
    pub from_feed: String,
    pub stability: Stability,
    pub os: Option<String>,
    pub machine: Option<String>,
    pub source: ImplSource,
    pub bindings: Vec<Binding>,
    pub requires: Vec<Dependency>,
    pub commands: Vec<Command>,
}

impl Selection {
    pub fn from_implementation(interface: &str, implementation: &Implementation) -> Self {
        Self {
            interface: interface.to_string(),
            id: implementation.id.clone(),
            version: implementation.version.clone(),
            from_feed: implementation.feed.clone(),
            stability: implementation.stability(),
            os: implementation.os.clone(),
            machine: implementation.machine.clone(),
            source: implementation.source.clone(),
            bindings: implementation.bindings.clone(),
            requires: implementation.requires.clone(),
            commands: implementation.commands.clone(),
        }
    }

    pub fn digests(&self) -> &[ManifestDigest] {
        self.source.digests()
    }

    pub fn command(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.name == name)
    }
}

/// The solver's choices for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selections {
    /// Root interface
    pub interface: String,
    /// Command to run in the root implementation
    pub command: Option<String>,
    /// Every visited interface; `None` where nothing was usable
    pub selections: BTreeMap<String, Option<Selection>>,
    /// Whether every essential interface has a usable selection
    pub ready: bool,
    /// Problems found while solving
    pub notes: Vec<String>,
}

impl Selections {
    pub fn get(&self, uri: &str) -> Option<&Selection> {
        self.selections.get(uri).and_then(Option::as_ref)
    }

    pub fn root(&self) -> Option<&Selection> {
        self.get(&self.interface)
    }

    /// Chosen selections in interface order
    pub fn iter(&self) -> impl Iterator<Item = &Selection> {
        self.selections.values().flatten()
    }

    /// Interfaces with no usable implementation
    pub fn unsatisfied(&self) -> Vec<&str> {
        self.selections
            .iter()
            .filter(|(_, s)| s.is_none())
            .map(|(uri, _)| uri.as_str())
            .collect()
    }

    /// Chosen implementations that still have to be acquired
    pub fn needing_download(&self, availability: &dyn Availability) -> Vec<&Selection> {
        self.iter()
            .filter(|s| !availability.is_available(&s.source))
            .collect()
    }

    /// Whether two runs chose the same implementation for every interface
    pub fn same_choices(&self, other: &Selections) -> bool {
        let key = |s: &Selections| -> Vec<(String, Option<(String, String)>)> {
            s.selections
                .iter()
                .map(|(uri, sel)| (uri.clone(), sel.as_ref().map(|x| (x.from_feed.clone(), x.id.clone()))))
                .collect()
        };
        key(self) == key(other)
    }

    pub fn to_xml(&self) -> Result<String> {
        super::xml::write_selections(self)
    }

    pub fn from_xml(xml: &str) -> Result<Self> {
        super::xml::parse_selections(xml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(uri: &str, id: &str, digest: &str) -> Selection {
        let mut imp = Implementation::new(id, "1.0".parse().unwrap());
        imp.feed = uri.to_string();
        imp.source = ImplSource::Digests(vec![digest.parse().unwrap()]);
        Selection::from_implementation(uri, &imp)
    }

    struct Only(String);

    impl Availability for Only {
        fn is_available(&self, source: &ImplSource) -> bool {
            source.digests().iter().any(|d| d.to_string() == self.0)
        }
    }

    #[test]
    fn test_needing_download() {
        let have = "sha1new=0000000000000000000000000000000000000001";
        let want = "sha1new=0000000000000000000000000000000000000002";
        let mut selections = BTreeMap::new();
        selections.insert("http://ex/a".to_string(), Some(selection("http://ex/a", "a", have)));
        selections.insert("http://ex/b".to_string(), Some(selection("http://ex/b", "b", want)));
        selections.insert("http://ex/c".to_string(), None);
        let sels = Selections {
            interface: "http://ex/a".into(),
            command: None,
            selections,
            ready: false,
            notes: vec![],
        };

        let missing = sels.needing_download(&Only(have.to_string()));
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].id, "b");
        assert_eq!(sels.root().unwrap().id, "a");
        assert_eq!(sels.unsatisfied(), vec!["http://ex/c"]);
        assert!(sels.same_choices(&sels.clone()));
    }
}
