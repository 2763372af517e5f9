use std::collections::HashSet;

use crate::types::MarketId;

/// Ids of every market already recorded. Seeded from the ledger at startup
/// and only ever grown, after the ledger append for a batch succeeded.
#[derive(Debug, Default, Clone)]
pub struct KnownMarkets {
    ids: HashSet<MarketId>,
}

impl KnownMarkets {
    pub fn new(ids: HashSet<MarketId>) -> Self {
        Self { ids }
    }

    pub fn ids(&self) -> &HashSet<MarketId> {
        &self.ids
    }

    #[cfg(test)]
    pub fn contains(&self, id: MarketId) -> bool {
        self.ids.contains(&id)
    }

    /// Returns how many ids were not already present.
    pub fn extend<I: IntoIterator<Item = MarketId>>(&mut self, ids: I) -> usize {
        let before = self.ids.len();
        self.ids.extend(ids);
        self.ids.len() - before
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_counts_only_new_ids() {
        let mut known = KnownMarkets::new([1, 2].into());
        assert_eq!(known.extend([2, 3, 3]), 1);
        assert_eq!(known.len(), 3);
        assert!(known.contains(3));
    }

    #[test]
    fn starts_empty_by_default() {
        let known = KnownMarkets::default();
        assert!(known.is_empty());
        assert!(!known.contains(1));
    }
}
