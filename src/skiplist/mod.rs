//! Probabilistic Skip List Module
//!
//! An ordered in-memory map keyed by string, used as the backing container
//! of the memtable. Lookup and insertion run in expected `O(log n)` by
//! maintaining a tower of forward pointers per node; the height of each
//! tower is drawn from an ascending-geometric distribution.
//!
//! ## Design Overview
//!
//! Nodes live in an index-based arena (`Vec<Node<V>>`), so the structure is
//! entirely safe Rust: forward pointers are `Option<usize>` indices into the
//! arena rather than raw pointers. `None` at the head of a level means the
//! level is empty.
//!
//! Keys are compared byte-lexicographically (the natural `str` ordering).
//! Repeated inserts for the same key overwrite the stored value in place,
//! but the size counter still advances — [`SkipList::len`] reports the
//! number of `insert` calls, not the number of distinct keys. Callers using
//! it as a capacity trigger get an upper bound on buffered work.
//!
//! # Guarantees
//!
//! - **Ordering:** [`SkipList::iter`] yields entries in ascending key order.
//! - **Upsert:** inserting an existing key replaces its value.
//! - **Validation:** construction rejects a zero `max_level` or a
//!   probability outside `0..=100`.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests;

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use rand::Rng;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors returned by [`SkipList`] construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SkipListError {
    /// `max_level` must be at least 1.
    #[error("max level must be at least 1, got {0}")]
    InvalidMaxLevel(usize),

    /// `probability` must lie within `0..=100`.
    #[error("probability must be within 0..=100, got {0}")]
    InvalidProbability(u8),
}

// ------------------------------------------------------------------------------------------------
// Node
// ------------------------------------------------------------------------------------------------

/// A single arena-allocated node with one forward pointer per level it
/// participates in.
struct Node<V> {
    key: String,
    value: V,
    /// Forward pointers; `next.len()` is the node's tower height.
    next: Vec<Option<usize>>,
}

// ------------------------------------------------------------------------------------------------
// SkipList
// ------------------------------------------------------------------------------------------------

/// A randomized skip list mapping `String` keys to values of type `V`.
pub struct SkipList<V> {
    /// Maximum tower height any node may reach.
    max_level: usize,

    /// Per-level continuation probability in percent.
    probability: u8,

    /// Head forward pointers, one per possible level.
    head: Vec<Option<usize>>,

    /// Node arena; indices in `head` and `Node::next` point here.
    nodes: Vec<Node<V>>,

    /// Highest level currently in use.
    level: usize,

    /// Number of `insert` calls since construction.
    insert_count: usize,
}

impl<V> SkipList<V> {
    /// Creates an empty skip list.
    ///
    /// # Parameters
    /// - `max_level`: maximum tower height, must be ≥ 1.
    /// - `probability`: per-level continuation chance in percent (`0..=100`).
    pub fn new(max_level: usize, probability: u8) -> Result<Self, SkipListError> {
        if max_level == 0 {
            return Err(SkipListError::InvalidMaxLevel(max_level));
        }
        if probability > 100 {
            return Err(SkipListError::InvalidProbability(probability));
        }

        Ok(Self {
            max_level,
            probability,
            head: vec![None; max_level],
            nodes: Vec::new(),
            level: 0,
            insert_count: 0,
        })
    }

    /// Inserts or updates a key.
    ///
    /// An existing key keeps its node and tower; only the value is
    /// replaced. The insert counter advances either way.
    pub fn insert(&mut self, key: &str, value: V) {
        let mut update: Vec<Option<usize>> = vec![None; self.max_level];

        let mut cursor: Option<usize> = None;
        for lvl in (0..=self.level).rev() {
            while let Some(next) = self.next_of(cursor, lvl) {
                if self.nodes[next].key.as_str() < key {
                    cursor = Some(next);
                } else {
                    break;
                }
            }
            update[lvl] = cursor;
        }

        // Upsert: an equal key at the bottom level means overwrite in place.
        if let Some(next) = self.next_of(update[0], 0)
            && self.nodes[next].key == key
        {
            self.nodes[next].value = value;
            self.insert_count += 1;
            return;
        }

        let node_level = self.random_level();
        if node_level > self.level {
            for slot in update.iter_mut().take(node_level + 1).skip(self.level + 1) {
                *slot = None;
            }
            self.level = node_level;
        }

        let idx = self.nodes.len();
        let mut next = vec![None; node_level + 1];
        for (lvl, slot) in next.iter_mut().enumerate() {
            *slot = self.next_of(update[lvl], lvl);
        }
        self.nodes.push(Node {
            key: key.to_string(),
            value,
            next,
        });

        for lvl in 0..=node_level {
            match update[lvl] {
                None => self.head[lvl] = Some(idx),
                Some(prev) => self.nodes[prev].next[lvl] = Some(idx),
            }
        }

        self.insert_count += 1;
    }

    /// Looks up a key, returning a reference to its value if present.
    pub fn search(&self, key: &str) -> Option<&V> {
        let mut cursor: Option<usize> = None;
        for lvl in (0..=self.level).rev() {
            while let Some(next) = self.next_of(cursor, lvl) {
                if self.nodes[next].key.as_str() < key {
                    cursor = Some(next);
                } else {
                    break;
                }
            }
        }

        match self.next_of(cursor, 0) {
            Some(next) if self.nodes[next].key == key => Some(&self.nodes[next].value),
            _ => None,
        }
    }

    /// Returns an iterator over `(key, value)` pairs in ascending key order.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            list: self,
            cursor: self.head[0],
        }
    }

    /// Number of `insert` calls since construction (not distinct keys).
    pub fn len(&self) -> usize {
        self.insert_count
    }

    /// Returns `true` if nothing has been inserted yet.
    pub fn is_empty(&self) -> bool {
        self.insert_count == 0
    }

    /// Forward pointer at `lvl` from either the head (`None`) or a node.
    fn next_of(&self, cursor: Option<usize>, lvl: usize) -> Option<usize> {
        match cursor {
            None => self.head[lvl],
            Some(idx) => self.nodes[idx].next.get(lvl).copied().flatten(),
        }
    }

    /// Draws a tower height: starting at 0, keep climbing while a uniform
    /// draw from `[0, 100)` exceeds `probability`, capped at `max_level - 1`.
    fn random_level(&self) -> usize {
        let mut rng = rand::rng();
        let mut level = 0;
        while level < self.max_level - 1 && rng.random_range(0..100u8) > self.probability {
            level += 1;
        }
        level
    }
}

// ------------------------------------------------------------------------------------------------
// Iterator
// ------------------------------------------------------------------------------------------------

/// Ascending key-order iterator over a [`SkipList`].
pub struct Iter<'a, V> {
    list: &'a SkipList<V>,
    cursor: Option<usize>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a str, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cursor?;
        let node = &self.list.nodes[idx];
        self.cursor = node.next[0];
        Some((node.key.as_str(), &node.value))
    }
}
