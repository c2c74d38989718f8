//! Directory registry implementation

use std::collections::HashMap;

use super::entry::DirectoryEntry;
use crate::protocol::SourceId;

/// Roster of known cameras keyed by identity
///
/// Insertion is idempotent: an entry whose id is already present is left
/// untouched, including its display name. Removal of an unknown id is a
/// no-op. The registry never talks to the network.
#[derive(Debug, Default)]
pub struct DirectoryRegistry {
    entries: HashMap<SourceId, DirectoryEntry>,
}

impl DirectoryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a roster snapshot
    ///
    /// Entries missing from the snapshot are retained. Returns the number of
    /// entries that were newly inserted.
    pub fn apply_snapshot<I>(&mut self, entries: I) -> usize
    where
        I: IntoIterator<Item = DirectoryEntry>,
    {
        let mut inserted = 0;
        for entry in entries {
            if self.add_entry(entry) {
                inserted += 1;
            }
        }

        tracing::debug!(
            inserted = inserted,
            total = self.entries.len(),
            "Directory snapshot applied"
        );

        inserted
    }

    /// Insert an entry if its id is absent
    ///
    /// Returns `true` if the entry was inserted.
    pub fn add_entry(&mut self, entry: DirectoryEntry) -> bool {
        if self.entries.contains_key(&entry.id) {
            return false;
        }
        self.entries.insert(entry.id.clone(), entry);
        true
    }

    /// Remove an entry, returning it if it was present
    pub fn remove_entry(&mut self, id: &SourceId) -> Option<DirectoryEntry> {
        self.entries.remove(id)
    }

    /// Check whether an id is listed
    pub fn contains(&self, id: &SourceId) -> bool {
        self.entries.contains_key(id)
    }

    /// Display name for an id
    pub fn name_of(&self, id: &SourceId) -> Option<&str> {
        self.entries.get(id).map(|e| e.display_name.as_str())
    }

    /// Number of listed cameras
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the directory is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
