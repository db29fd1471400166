use serde::{Deserialize, Serialize};

/// An academic cohort the report can be filtered by.
/// `name` is the stable key; `value` is the server's selector code and
/// may change between catalog fetches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Batch {
    pub name: String,
    pub value: String,
}

impl Batch {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Case-insensitive substring filter over batch names.
/// A blank query matches everything.
pub fn filter_batches<'a>(batches: &'a [Batch], query: &str) -> Vec<&'a Batch> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return batches.iter().collect();
    }
    batches
        .iter()
        .filter(|b| b.name.to_lowercase().contains(&query))
        .collect()
}

/// The user's standing batch choice, unique by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    batches: Vec<Batch>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by name. Returns true if the name was new.
    pub fn insert(&mut self, batch: Batch) -> bool {
        match self.batches.iter_mut().find(|b| b.name == batch.name) {
            Some(existing) => {
                *existing = batch;
                false
            }
            None => {
                self.batches.push(batch);
                true
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.batches.len();
        self.batches.retain(|b| b.name != name);
        self.batches.len() != before
    }

    pub fn contains(&self, name: &str) -> bool {
        self.batches.iter().any(|b| b.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    /// Names in sorted order, independent of insertion order
    pub fn sorted_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.batches.iter().map(|b| b.name.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Selector codes for the report query, ordered by name
    pub fn codes(&self) -> Vec<&str> {
        let mut sorted: Vec<&Batch> = self.batches.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        sorted.into_iter().map(|b| b.value.as_str()).collect()
    }

    /// Re-point every entry at the catalog's current code for its name.
    /// Names missing from a non-empty catalog are dropped.
    pub fn resolve_against(&mut self, catalog: &[Batch]) {
        if catalog.is_empty() {
            return;
        }
        self.batches = self
            .batches
            .iter()
            .filter_map(|selected| catalog.iter().find(|b| b.name == selected.name).cloned())
            .collect();
    }
}

impl FromIterator<Batch> for Selection {
    fn from_iter<I: IntoIterator<Item = Batch>>(iter: I) -> Self {
        let mut selection = Selection::new();
        for batch in iter {
            selection.insert(batch);
        }
        selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<Batch> {
        vec![
            Batch::new("BBA IT Sem I", "a"),
            Batch::new("BCA Sem III", "b"),
            Batch::new("MBA IT Sem I", "c"),
        ]
    }

    #[test]
    fn test_filter_batches() {
        let batches = catalog();
        let hits: Vec<&str> = filter_batches(&batches, " it sem ").iter().map(|b| b.name.as_str()).collect();
        assert_eq!(hits, vec!["BBA IT Sem I", "MBA IT Sem I"]);
        assert_eq!(filter_batches(&batches, "").len(), 3);
        assert!(filter_batches(&batches, "law").is_empty());
    }

    #[test]
    fn test_selection_unique_by_name() {
        let mut selection = Selection::new();
        assert!(selection.insert(Batch::new("BCA Sem III", "b")));
        assert!(!selection.insert(Batch::new("BCA Sem III", "z")));
        assert_eq!(selection.len(), 1);
        assert_eq!(selection.batches()[0].value, "z");
    }

    #[test]
    fn test_sorted_names_ignore_insertion_order() {
        let a: Selection = vec![Batch::new("Y", "2"), Batch::new("X", "1")].into_iter().collect();
        let b: Selection = vec![Batch::new("X", "1"), Batch::new("Y", "2")].into_iter().collect();
        assert_eq!(a.sorted_names(), b.sorted_names());
        assert_eq!(a.codes(), vec!["1", "2"]);
    }

    #[test]
    fn test_resolve_prefers_fresh_codes() {
        let mut selection: Selection = vec![
            Batch::new("BCA Sem III", "old"),
            Batch::new("Retired Batch", "q"),
        ]
        .into_iter()
        .collect();
        selection.resolve_against(&catalog());
        assert_eq!(selection.batches(), &[Batch::new("BCA Sem III", "b")]);
    }

    #[test]
    fn test_resolve_against_empty_catalog_keeps_selection() {
        let mut selection: Selection = vec![Batch::new("BCA Sem III", "old")].into_iter().collect();
        selection.resolve_against(&[]);
        assert_eq!(selection.len(), 1);
    }

    #[test]
    fn test_remove() {
        let mut selection: Selection = catalog().into_iter().collect();
        assert!(selection.remove("BCA Sem III"));
        assert!(!selection.remove("BCA Sem III"));
        assert!(!selection.contains("BCA Sem III"));
    }
}
