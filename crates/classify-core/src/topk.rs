//! Fixed-capacity top-K reduction over a flat score buffer

use serde::{Deserialize, Serialize};

/// Number of classes reported per output tensor
pub const TOP_K: usize = 5;

/// One class and its score
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassScore {
    pub class_id: usize,
    pub probability: f32,
}

/// K best scores in descending order
///
/// Slots start at `(0, 0.0)`. A score enters at the first slot holding a
/// strictly lower score, so equal scores keep the earlier index ahead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopK<const K: usize> {
    slots: [ClassScore; K],
}

impl<const K: usize> Default for TopK<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const K: usize> TopK<K> {
    pub fn new() -> Self {
        Self {
            slots: [ClassScore::default(); K],
        }
    }

    /// Offer one score
    #[inline]
    pub fn push(&mut self, class_id: usize, score: f32) {
        let Some(rank) = self.slots.iter().position(|s| s.probability < score) else {
            return;
        };
        self.slots.copy_within(rank..K - 1, rank + 1);
        self.slots[rank] = ClassScore {
            class_id,
            probability: score,
        };
    }

    pub fn slots(&self) -> &[ClassScore; K] {
        &self.slots
    }

    /// Every selected score lies in `[0.0, 1.0]`
    pub fn is_valid(&self) -> bool {
        self.slots
            .iter()
            .all(|s| (0.0..=1.0).contains(&s.probability))
    }

    /// First slot failing the validity check
    pub fn first_invalid(&self) -> Option<&ClassScore> {
        self.slots
            .iter()
            .find(|s| !(0.0..=1.0).contains(&s.probability))
    }

    pub fn to_classification(&self) -> Classification {
        Classification {
            classes: self.slots.to_vec(),
            valid: self.is_valid(),
        }
    }
}

/// Scan `scores` once and keep the K best
pub fn reduce<const K: usize>(scores: &[f32]) -> TopK<K> {
    let mut top = TopK::<K>::new();
    for (class_id, &score) in scores.iter().enumerate() {
        top.push(class_id, score);
    }
    top
}

/// Published form of a reduction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub classes: Vec<ClassScore>,
    pub valid: bool,
}
