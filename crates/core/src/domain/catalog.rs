use std::collections::HashSet;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CatalogKind {
    Sector,
    Head,
    Pump,
    Shift,
}

impl CatalogKind {
    pub fn noun(&self) -> &'static str {
        match self {
            Self::Sector => "Sector",
            Self::Head => "Head",
            Self::Pump => "Pump",
            Self::Shift => "Shift",
        }
    }

    pub fn plural(&self) -> &'static str {
        match self {
            Self::Sector => "sectors",
            Self::Head => "heads",
            Self::Pump => "pumps",
            Self::Shift => "shifts",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: i64,
    pub code: Option<String>,
    pub name: Option<String>,
}

impl CatalogEntry {
    pub fn new(id: i64, code: Option<&str>, name: Option<&str>) -> Self {
        Self { id, code: code.map(str::to_owned), name: name.map(str::to_owned) }
    }

    /// `code – name`, falling back to the name and then to `<Kind> <id>`.
    pub fn label(&self, kind: CatalogKind) -> String {
        let code = self.code.as_deref().map(str::trim).unwrap_or_default();
        let name = self.name.as_deref().map(str::trim).unwrap_or_default();

        match (code.is_empty(), name.is_empty()) {
            (false, false) => format!("{code} – {name}"),
            (_, false) => name.to_owned(),
            _ => format!("{} {}", kind.noun(), self.id),
        }
    }
}

/// Labels shown on the keyboard mapped back to what they stand for.
///
/// Built fresh every time a list is fetched and kept only while the flow that
/// fetched it is active.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelLookup<T = i64> {
    entries: Vec<(String, T)>,
}

impl<T> Default for LabelLookup<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl LabelLookup<i64> {
    pub fn from_catalog(kind: CatalogKind, entries: &[CatalogEntry]) -> Self {
        Self::from_pairs(entries.iter().map(|entry| (entry.label(kind), entry.id, entry.id)))
    }
}

impl<T> LabelLookup<T> {
    /// A label already taken gets a ` (#id)` suffix, then ` (#id-2)`,
    /// ` (#id-3)` and so on until it is unused.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, i64, T)>,
    {
        let mut taken = HashSet::new();
        let mut entries: Vec<(String, T)> = Vec::new();
        for (label, id, value) in pairs {
            let mut unique = label.clone();
            let mut attempt = 1;
            while taken.contains(&unique) {
                unique = match attempt {
                    1 => format!("{label} (#{id})"),
                    n => format!("{label} (#{id}-{n})"),
                };
                attempt += 1;
            }
            taken.insert(unique.clone());
            entries.push((unique, value));
        }
        Self { entries }
    }

    pub fn resolve(&self, input: &str) -> Option<&T> {
        let needle = input.trim();
        self.entries.iter().find(|(label, _)| label == needle).map(|(_, value)| value)
    }

    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(|(label, _)| label.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{CatalogEntry, CatalogKind, LabelLookup};

    #[test]
    fn label_prefers_code_and_name() {
        let entry = CatalogEntry::new(3, Some(" S03 "), Some("Almendros"));
        assert_eq!(entry.label(CatalogKind::Sector), "S03 – Almendros");
    }

    #[test]
    fn label_falls_back_to_name_then_synthetic() {
        assert_eq!(
            CatalogEntry::new(4, None, Some("Cabezal sur")).label(CatalogKind::Head),
            "Cabezal sur"
        );
        assert_eq!(CatalogEntry::new(4, Some(""), Some("  ")).label(CatalogKind::Head), "Head 4");
        assert_eq!(CatalogEntry::new(9, Some("P9"), None).label(CatalogKind::Pump), "Pump 9");
    }

    #[test]
    fn every_label_round_trips_to_its_id() {
        let entries = vec![
            CatalogEntry::new(1, Some("S01"), Some("Norte")),
            CatalogEntry::new(2, Some("S02"), Some("Norte")),
            CatalogEntry::new(3, None, Some("Sur")),
            CatalogEntry::new(4, None, None),
            CatalogEntry::new(5, Some("S05"), Some("Este")),
        ];
        let lookup = LabelLookup::from_catalog(CatalogKind::Sector, &entries);

        assert_eq!(lookup.len(), entries.len());
        for entry in &entries {
            assert_eq!(lookup.resolve(&entry.label(CatalogKind::Sector)), Some(&entry.id));
        }
    }

    #[test]
    fn colliding_labels_are_made_unique() {
        let entries = vec![
            CatalogEntry::new(10, None, Some("Turno A")),
            CatalogEntry::new(11, None, Some("Turno A")),
        ];
        let lookup = LabelLookup::from_catalog(CatalogKind::Shift, &entries);

        assert_eq!(lookup.labels(), vec!["Turno A".to_owned(), "Turno A (#11)".to_owned()]);
        assert_eq!(lookup.resolve("Turno A"), Some(&10));
        assert_eq!(lookup.resolve("Turno A (#11)"), Some(&11));
    }

    #[test]
    fn suffixed_labels_never_shadow_existing_ones() {
        let entries = vec![
            CatalogEntry::new(1, None, Some("S1 – Norte (#3)")),
            CatalogEntry::new(2, Some("S1"), Some("Norte")),
            CatalogEntry::new(3, None, Some("S1 – Norte")),
            CatalogEntry::new(3, None, Some("S1 – Norte")),
        ];
        let lookup = LabelLookup::from_catalog(CatalogKind::Sector, &entries);
        let labels = lookup.labels();

        assert_eq!(
            labels,
            vec![
                "S1 – Norte (#3)".to_owned(),
                "S1 – Norte".to_owned(),
                "S1 – Norte (#3-2)".to_owned(),
                "S1 – Norte (#3-3)".to_owned(),
            ]
        );
        let unique: HashSet<&String> = labels.iter().collect();
        assert_eq!(unique.len(), labels.len());
        assert_eq!(lookup.resolve("S1 – Norte (#3)"), Some(&1));
        assert_eq!(lookup.resolve("S1 – Norte"), Some(&2));
        assert_eq!(lookup.resolve("S1 – Norte (#3-2)"), Some(&3));
        assert_eq!(lookup.resolve("S1 – Norte (#3-3)"), Some(&3));
    }

    #[test]
    fn empty_lookup_resolves_nothing() {
        let lookup: LabelLookup = LabelLookup::default();
        assert!(lookup.is_empty());
        assert_eq!(lookup.resolve("Sector 1"), None);
    }
}
