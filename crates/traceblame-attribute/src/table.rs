//! Interning table for attribution values.

use std::ops::Index;

use indexmap::IndexMap;
use indexmap::map::Entry;
use traceblame_schemas::{Attribution, AttributionId, AttributionKey};

/// Every distinct attribution seen in one analysis run.
///
/// Append-only: ids handed out stay valid for the lifetime of the table.
/// `Unknown` is always id 0.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributionTable {
    entries: IndexMap<AttributionKey, Attribution>,
}

impl Default for AttributionTable {
    fn default() -> Self {
        let mut entries = IndexMap::new();
        entries.insert(AttributionKey::Unknown, Attribution::Unknown);
        Self { entries }
    }
}

impl AttributionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `attribution`, inserting it if its key is new.
    ///
    /// When the key is already present the stored value wins; the argument
    /// is dropped even if it differs in non-key fields.
    pub fn intern(&mut self, attribution: Attribution) -> AttributionId {
        match self.entries.entry(attribution.key()) {
            Entry::Occupied(entry) => AttributionId(entry.index()),
            Entry::Vacant(entry) => {
                let id = AttributionId(entry.index());
                entry.insert(attribution);
                id
            }
        }
    }

    /// Looks up the id of an already-interned key.
    pub fn id_of(&self, key: &AttributionKey) -> Option<AttributionId> {
        self.entries.get_index_of(key).map(AttributionId)
    }

    pub fn get(&self, id: AttributionId) -> Option<&Attribution> {
        self.entries.get_index(id.index()).map(|(_, value)| value)
    }

    /// Mutable access for in-place rewriting (source maps). The key, and
    /// therefore the id, is unaffected.
    pub(crate) fn get_mut(
        &mut self,
        id: AttributionId,
    ) -> Option<&mut Attribution> {
        self.entries.get_index_mut(id.index()).map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Never true in practice: `Unknown` is always present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (AttributionId, &Attribution)> + '_ {
        self.entries
            .values()
            .enumerate()
            .map(|(i, value)| (AttributionId(i), value))
    }

    pub fn ids(&self) -> impl Iterator<Item = AttributionId> + use<> {
        (0..self.entries.len()).map(AttributionId)
    }

    /// All values in id order, for embedding in a summary.
    pub fn snapshot(&self) -> Vec<Attribution> {
        self.entries.values().cloned().collect()
    }
}

impl Index<AttributionId> for AttributionTable {
    type Output = Attribution;

    fn index(&self, id: AttributionId) -> &Attribution {
        &self.entries[id.index()]
    }
}
