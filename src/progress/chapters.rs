use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Completed chapter indices of a book.
///
/// Only positive indices, no duplicates. Iteration is ascending, which is the
/// display order; equality ignores the order the indices arrived in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ChapterSet(BTreeSet<u32>);

impl ChapterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lenient normalization: drops non-positive and out-of-range values, dedupes.
    pub fn normalize<I>(indices: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        Self(
            indices
                .into_iter()
                .filter_map(|i| u32::try_from(i).ok())
                .filter(|&i| i > 0)
                .collect(),
        )
    }

    /// Strict construction for user input: any non-positive index is an error.
    pub fn try_from_indices<I>(indices: I) -> Result<Self>
    where
        I: IntoIterator<Item = i64>,
    {
        let mut set = BTreeSet::new();
        for i in indices {
            set.insert(checked_index(i)?);
        }
        Ok(Self(set))
    }

    pub fn contains(&self, index: u32) -> bool {
        self.0.contains(&index)
    }

    /// The set with `index` removed if present, inserted otherwise.
    pub fn toggled(&self, index: u32) -> Self {
        let mut next = self.0.clone();
        if !next.remove(&index) {
            next.insert(index);
        }
        Self(next)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<u32> for ChapterSet {
    fn from_iter<T: IntoIterator<Item = u32>>(iter: T) -> Self {
        Self(iter.into_iter().filter(|&i| i > 0).collect())
    }
}

impl<'de> Deserialize<'de> for ChapterSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<Vec<i64>>::deserialize(deserializer)?;
        Ok(ChapterSet::normalize(raw.unwrap_or_default()))
    }
}

/// Validate a user-supplied chapter index.
pub fn checked_index(index: i64) -> Result<u32> {
    u32::try_from(index)
        .ok()
        .filter(|&i| i > 0)
        .ok_or_else(|| Error::validation(format!("chapter index must be a positive integer, got {index}")))
}
