//! Capability resolution
//!
//! Maps the currently selected entry to the set of actions a shell may
//! enable. The mapping is pure: it only looks at the entry passed in.

use crate::services::remote::{EntryKind, RemoteEntry};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;

static DOCUMENT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^.*\.(doc|docx|docm|ppt|pps|ppsx|ppsm|pptx|pptm|xls|xlsx|xlsm|rtf)$")
        .expect("document pattern is valid")
});

static IMAGE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^.*\.(jpg|jpeg|png|tiff|tif|gif|bmp)$").expect("image pattern is valid")
});

/// An action the shell can offer for the selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    Download,
    Delete,
    Copy,
    Preview,
    Thumbnail,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Download => "download",
            Capability::Delete => "delete",
            Capability::Copy => "copy",
            Capability::Preview => "preview",
            Capability::Thumbnail => "thumbnail",
        };
        f.write_str(name)
    }
}

/// Set of enabled actions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }

    fn insert(&mut self, capability: Capability) {
        self.0.insert(capability);
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.iter().map(|c| c.to_string()).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

/// True if `name` has one of the previewable document extensions
pub fn is_previewable(name: &str) -> bool {
    DOCUMENT_PATTERN.is_match(name)
}

/// True if `name` has one of the raster image extensions
pub fn is_thumbnailable(name: &str) -> bool {
    IMAGE_PATTERN.is_match(name)
}

/// Resolve the enabled actions for a selection
///
/// Tombstones resolve exactly like live entries; the shell only renders
/// them differently.
pub fn resolve(selected: Option<&RemoteEntry>) -> CapabilitySet {
    let mut set = CapabilitySet::empty();
    let Some(entry) = selected else {
        return set;
    };

    match entry.kind() {
        EntryKind::File => {
            set.insert(Capability::Download);
            set.insert(Capability::Delete);
            set.insert(Capability::Copy);
        }
        EntryKind::Folder => {
            set.insert(Capability::Delete);
            set.insert(Capability::Copy);
        }
    }

    if is_previewable(entry.name()) {
        set.insert(Capability::Preview);
    }
    if is_thumbnailable(entry.name()) {
        set.insert(Capability::Thumbnail);
    }

    set
}
