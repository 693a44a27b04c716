//! Remote version probe
//!
//! Observed versions are collaborator-provided opaque tokens (a
//! `dd/mm/yyyy` date for the registry, a file URL for the two spreadsheet
//! sources). Only equality against the ledger matters; the core never
//! orders or interprets them.

use crate::ledger::Source;
use std::collections::BTreeMap;

/// Reports the latest remote version per source, `None` when the probe
/// could not answer for that source
pub trait VersionProbe {
    fn observed(&self, source: Source) -> Option<String>;
}

/// Probe backed by tokens supplied up front (CLI arguments or a
/// collaborator's scrape result)
#[derive(Debug, Default)]
pub struct StaticProbe {
    versions: BTreeMap<Source, String>,
}

impl StaticProbe {
    pub fn new(
        registry: Option<String>,
        mapping: Option<String>,
        determined: Option<String>,
    ) -> Self {
        let mut versions = BTreeMap::new();
        if let Some(v) = registry {
            versions.insert(Source::Registry, v);
        }
        if let Some(v) = mapping {
            versions.insert(Source::Mapping, v);
        }
        if let Some(v) = determined {
            versions.insert(Source::DeterminedList, v);
        }
        Self { versions }
    }
}

impl VersionProbe for StaticProbe {
    fn observed(&self, source: Source) -> Option<String> {
        self.versions.get(&source).cloned()
    }
}
