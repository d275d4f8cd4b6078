//! Static lookup tables: specialist tracks and registry-type codes.
//!
//! A `Catalog` is immutable once built. `CatalogHandle` lets an admin swap
//! the whole catalog atomically; readers always see either the old or the
//! new table, never a mix.

use crate::canon::canonicalize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Code used in roll numbers when no track matches the specialist field.
pub const UNKNOWN_SPECIALIST_CODE: &str = "XX";

/// Registry-type code used when the record carries no registry type at all.
pub const DEFAULT_REGISTRY_TYPE_CODE: &str = "R";

// ---------------------------------------------------------------------------
// SpecialistTrack
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialistTrack {
    /// Two-letter code embedded in roll numbers, e.g. `EL`.
    pub code: String,
    pub short_name: String,
    pub full_name: String,
    /// Hyphenated english name, e.g. `medical-device-maintenance`.
    pub machine_name: String,
    /// One-letter local-script code shown on printed cards.
    #[serde(default)]
    pub letter: String,
}

impl SpecialistTrack {
    pub fn new(
        code: &str,
        short_name: &str,
        full_name: &str,
        machine_name: &str,
        letter: &str,
    ) -> Self {
        Self {
            code: code.to_string(),
            short_name: short_name.to_string(),
            full_name: full_name.to_string(),
            machine_name: machine_name.to_string(),
            letter: letter.to_string(),
        }
    }

    fn name_for(&self, strategy: MatchStrategy) -> &str {
        match strategy {
            MatchStrategy::ShortName => &self.short_name,
            MatchStrategy::FullName => &self.full_name,
            MatchStrategy::MachineName => &self.machine_name,
        }
    }
}

// ---------------------------------------------------------------------------
// MatchStrategy
// ---------------------------------------------------------------------------

/// Which track name a specialist field is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    ShortName,
    FullName,
    MachineName,
}

impl MatchStrategy {
    /// Evaluation order within a single track.
    pub const PRIORITY: [MatchStrategy; 3] = [
        MatchStrategy::ShortName,
        MatchStrategy::FullName,
        MatchStrategy::MachineName,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialistMatch<'a> {
    pub track: &'a SpecialistTrack,
    pub strategy: MatchStrategy,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default = "default_specialists")]
    pub specialists: Vec<SpecialistTrack>,
    /// Registry-type label → one-letter code.
    #[serde(default = "default_registry_types")]
    pub registry_types: BTreeMap<String, String>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            specialists: default_specialists(),
            registry_types: default_registry_types(),
        }
    }
}

impl Catalog {
    /// Find the track for a free-text specialist field.
    ///
    /// Tracks are tried in table order; within a track the strategies in
    /// `MatchStrategy::PRIORITY` order. Comparison is on canonical forms.
    pub fn match_specialist(&self, specialist: &str) -> Option<SpecialistMatch<'_>> {
        let wanted = canonicalize(specialist);
        if wanted.is_empty() {
            return None;
        }
        self.specialists.iter().find_map(|track| {
            MatchStrategy::PRIORITY
                .iter()
                .copied()
                .find(|&s| canonicalize(track.name_for(s)) == wanted)
                .map(|strategy| SpecialistMatch { track, strategy })
        })
    }

    pub fn specialist_code(&self, specialist: &str) -> &str {
        self.match_specialist(specialist)
            .map(|m| m.track.code.as_str())
            .unwrap_or(UNKNOWN_SPECIALIST_CODE)
    }

    /// Unmapped labels are used literally; a blank label maps to `R`.
    pub fn registry_type_code<'a>(&'a self, label: &'a str) -> &'a str {
        let label = label.trim();
        if label.is_empty() {
            return DEFAULT_REGISTRY_TYPE_CODE;
        }
        self.registry_types
            .get(label)
            .map(String::as_str)
            .unwrap_or(label)
    }
}

fn default_specialists() -> Vec<SpecialistTrack> {
    vec![
        SpecialistTrack::new(
            "OP",
            "نفط",
            "تكرير النفط ومعالجة الغاز",
            "oil-refining-and-gas-processing",
            "ن",
        ),
        SpecialistTrack::new(
            "MD",
            "طبية",
            "صيانة الاجهزة الطبية",
            "medical-device-maintenance",
            "ط",
        ),
        SpecialistTrack::new("EL", "كهرباء", "الكهرباء", "electricity", "ك"),
        SpecialistTrack::new("MC", "ميكانيك", "الميكانيك", "mechanics", "م"),
        SpecialistTrack::new("VC", "سيارات", "السيارات", "cars-engineering", "س"),
        SpecialistTrack::new(
            "AR",
            "تبريد",
            "تكييف الهواء والتثليج",
            "air-conditioning-and-refrigeration",
            "ت",
        ),
        SpecialistTrack::new(
            "WF",
            "معادن",
            "اللحام وتشكيل المعادن",
            "welding-and-metal-forming",
            "ل",
        ),
        SpecialistTrack::new("CY", "نجارة", "النجارة", "carpentry", "ج"),
        SpecialistTrack::new("TE", "نسيج", "النسيج", "textile", "ي"),
    ]
}

fn default_registry_types() -> BTreeMap<String, String> {
    [("صباحي", "R"), ("كورسات", "C"), ("مسائي", "E")]
        .into_iter()
        .map(|(label, code)| (label.to_string(), code.to_string()))
        .collect()
}

// ---------------------------------------------------------------------------
// CatalogHandle
// ---------------------------------------------------------------------------

/// Process-wide catalog slot, replaced only as a whole.
#[derive(Debug)]
pub struct CatalogHandle {
    current: RwLock<Arc<Catalog>>,
}

impl CatalogHandle {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    /// The catalog in effect right now. Holding the `Arc` pins that version.
    pub fn load(&self) -> Arc<Catalog> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the catalog, returning the previous one.
    pub fn swap(&self, catalog: Catalog) -> Arc<Catalog> {
        let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, Arc::new(catalog))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_any_name_field() {
        let catalog = Catalog::default();
        assert_eq!(catalog.specialist_code("كهرباء"), "EL");
        assert_eq!(catalog.specialist_code("الكهرباء"), "EL");
        assert_eq!(catalog.specialist_code("electricity"), "EL");
        assert_eq!(catalog.specialist_code("صيانة الأجهزة الطبية"), "MD");
    }

    #[test]
    fn reports_which_strategy_matched() {
        let catalog = Catalog::default();
        let m = catalog.match_specialist("cars-engineering").unwrap();
        assert_eq!(m.track.code, "VC");
        assert_eq!(m.strategy, MatchStrategy::MachineName);

        let m = catalog.match_specialist("النجارة").unwrap();
        assert_eq!(m.strategy, MatchStrategy::FullName);
    }

    #[test]
    fn unmatched_specialist_uses_placeholder() {
        let catalog = Catalog::default();
        assert_eq!(catalog.specialist_code("astronomy"), UNKNOWN_SPECIALIST_CODE);
        assert_eq!(catalog.specialist_code(""), UNKNOWN_SPECIALIST_CODE);
    }

    #[test]
    fn table_order_breaks_ties() {
        let catalog = Catalog {
            specialists: vec![
                SpecialistTrack::new("AA", "x", "shared", "first", ""),
                SpecialistTrack::new("BB", "shared", "y", "second", ""),
            ],
            registry_types: BTreeMap::new(),
        };
        // "shared" is the full name of AA and the short name of BB; AA is first.
        assert_eq!(catalog.specialist_code("shared"), "AA");
    }

    #[test]
    fn registry_type_codes() {
        let catalog = Catalog::default();
        assert_eq!(catalog.registry_type_code("صباحي"), "R");
        assert_eq!(catalog.registry_type_code("مسائي"), "E");
        assert_eq!(catalog.registry_type_code("Z"), "Z");
        assert_eq!(catalog.registry_type_code(""), "R");
    }

    #[test]
    fn handle_swaps_atomically() {
        let handle = CatalogHandle::new(Catalog::default());
        let before = handle.load();
        let mut next = Catalog::default();
        next.specialists.truncate(1);
        let previous = handle.swap(next);
        assert_eq!(previous.specialists.len(), 9);
        assert_eq!(handle.load().specialists.len(), 1);
        // A reader holding the old Arc keeps a consistent view.
        assert_eq!(before.specialists.len(), 9);
    }
}
