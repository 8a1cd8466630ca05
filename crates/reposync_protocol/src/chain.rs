//! Canonical chain construction.
//!
//! The store offers no compare-and-swap, so concurrent writers can both
//! upload a link for the same position. Every observer resolves this the
//! same way by sorting on `(number, generation, upload timestamp,
//! instance id)` and keeping the first candidate per `(number, generation)`.
//! Everything that loses is a leftover, eligible for deletion.

use crate::link::LinkId;
use std::cmp::Ordering;

/// A decoded link together with the store's view of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEntry {
    /// Decoded identifier.
    pub id: LinkId,
    /// Store object name.
    pub name: String,
    /// Upload timestamp assigned by the store.
    pub upload_timestamp: u64,
}

impl ChainEntry {
    /// Returns `(number, generation)`.
    #[must_use]
    pub fn position(&self) -> (u64, u32) {
        self.id.position()
    }
}

impl Ord for ChainEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id
            .number
            .cmp(&other.id.number)
            .then(self.id.generation.cmp(&other.id.generation))
            .then(self.upload_timestamp.cmp(&other.upload_timestamp))
            .then_with(|| self.id.instance_id.cmp(&other.id.instance_id))
            // Only reached for byte-identical candidates; keeps Ord total.
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for ChainEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The canonical link sequence derived from one store listing.
///
/// - Each closed position contributes exactly its final generation
/// - The trailing open position (if any) contributes its surviving
///   generations in ascending order
/// - Positions are contiguous from 1; the walk stops at the first gap
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalChain {
    entries: Vec<ChainEntry>,
    leftovers: Vec<ChainEntry>,
    ignored: Vec<String>,
}

impl CanonicalChain {
    /// Canonical entries in chain order.
    #[must_use]
    pub fn entries(&self) -> &[ChainEntry] {
        &self.entries
    }

    /// Canonical object names in chain order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Decoded links that are not part of the canonical chain.
    #[must_use]
    pub fn leftovers(&self) -> &[ChainEntry] {
        &self.leftovers
    }

    /// Listed names that are not link objects at all.
    #[must_use]
    pub fn ignored(&self) -> &[String] {
        &self.ignored
    }

    /// The last canonical entry.
    #[must_use]
    pub fn last(&self) -> Option<&ChainEntry> {
        self.entries.last()
    }

    /// Number of canonical entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the chain has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if the given object is part of the canonical chain.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Canonical entries strictly after `position` (all of them for `None`).
    #[must_use]
    pub fn after(&self, position: Option<(u64, u32)>) -> &[ChainEntry] {
        match position {
            None => &self.entries,
            Some(position) => {
                let start = self
                    .entries
                    .iter()
                    .position(|e| e.position() > position)
                    .unwrap_or(self.entries.len());
                &self.entries[start..]
            }
        }
    }

    /// Objects made obsolete once `link` is verified canonical.
    ///
    /// That is every open generation below it at its own position (canonical
    /// or not) plus every leftover at an earlier position. `link` itself is
    /// never included.
    #[must_use]
    pub fn superseded_by(&self, link: &LinkId) -> Vec<&ChainEntry> {
        self.entries
            .iter()
            .chain(self.leftovers.iter())
            .filter(|e| &e.id != link)
            .filter(|e| {
                link.supersedes(&e.id)
                    || (e.id.number < link.number && !self.contains(&e.name))
            })
            .collect()
    }
}

/// Builds the canonical chain from `(name, upload timestamp)` pairs.
///
/// Names that are not link objects are ignored (and reported through
/// [`CanonicalChain::ignored`]); the builder never fails.
pub fn build_canonical_chain<'a, I>(listing: I) -> CanonicalChain
where
    I: IntoIterator<Item = (&'a str, u64)>,
{
    let mut chain = CanonicalChain::default();
    let mut candidates = Vec::new();

    for (name, upload_timestamp) in listing {
        match LinkId::decode(name) {
            Ok(id) => candidates.push(ChainEntry {
                id,
                name: name.to_string(),
                upload_timestamp,
            }),
            Err(_) => chain.ignored.push(name.to_string()),
        }
    }
    candidates.sort();

    // First candidate per (number, generation) wins the tie-break.
    let mut winners: Vec<ChainEntry> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match winners.last() {
            Some(prev) if prev.position() == candidate.position() => {
                chain.leftovers.push(candidate);
            }
            _ => winners.push(candidate),
        }
    }

    let mut expected = 1u64;
    let mut stopped = false;
    let mut index = 0;
    while index < winners.len() {
        let number = winners[index].id.number;
        let end = winners[index..]
            .iter()
            .position(|e| e.id.number != number)
            .map_or(winners.len(), |offset| index + offset);
        let group = &winners[index..end];
        index = end;

        if stopped || number != expected {
            stopped = true;
            chain.leftovers.extend(group.iter().cloned());
            continue;
        }

        match group.iter().position(|e| e.id.is_final) {
            Some(final_at) => {
                for (i, entry) in group.iter().enumerate() {
                    if i == final_at {
                        chain.entries.push(entry.clone());
                    } else {
                        chain.leftovers.push(entry.clone());
                    }
                }
                expected += 1;
            }
            None => {
                // Open position: nothing may follow it.
                chain.entries.extend(group.iter().cloned());
                stopped = true;
            }
        }
    }

    chain.leftovers.sort();
    chain
}
