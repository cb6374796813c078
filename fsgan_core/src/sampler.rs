//! Endless minibatch index sampling over a domain subset.
//!
//! An [`IndexSampler`] walks a shuffled permutation of its selection and
//! reshuffles when a pass runs out. When the current pass holds fewer indices
//! than a batch needs, the tail of the pass is kept and the shortfall is drawn
//! from the freshly shuffled order, skipping indices already in the tail. Each
//! pass therefore covers every selected index exactly once and no batch
//! contains the same index twice.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{CoreError, Result};

/// Infinite iterator over batches of indices drawn from a fixed selection.
#[derive(Debug, Clone)]
pub struct IndexSampler {
    /// Current permutation of the selection.
    order: Vec<usize>,
    /// Position of the next unread index in `order`.
    cursor: usize,
    batch_size: usize,
    /// Number of completed reshuffles.
    epoch: usize,
    rng: StdRng,
}

impl IndexSampler {
    /// Create a sampler over `selection` with its own shuffling state.
    ///
    /// Duplicate indices in the selection are collapsed.
    pub fn new(selection: &[usize], batch_size: usize, seed: u64) -> Result<Self> {
        if batch_size == 0 {
            return Err(CoreError::ZeroBatchSize);
        }
        let mut order = selection.to_vec();
        order.sort_unstable();
        order.dedup();
        if order.is_empty() {
            return Err(CoreError::EmptySelection);
        }
        if batch_size > order.len() {
            return Err(CoreError::BatchLargerThanSelection {
                batch_size,
                selection: order.len(),
            });
        }

        let mut rng = StdRng::seed_from_u64(seed);
        order.shuffle(&mut rng);

        Ok(Self {
            order,
            cursor: 0,
            batch_size,
            epoch: 0,
            rng,
        })
    }

    /// Number of indices drawn per batch.
    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of distinct indices in the selection.
    #[inline]
    pub fn selection_len(&self) -> usize {
        self.order.len()
    }

    /// Number of reshuffles performed so far.
    #[inline]
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// Draw the next batch of indices.
    pub fn next_batch(&mut self) -> Vec<usize> {
        let remaining = self.order.len() - self.cursor;
        if remaining >= self.batch_size {
            let batch = self.order[self.cursor..self.cursor + self.batch_size].to_vec();
            self.cursor += self.batch_size;
            return batch;
        }

        let mut batch = self.order[self.cursor..].to_vec();
        self.order.shuffle(&mut self.rng);
        self.epoch += 1;

        // Move the shortfall picks to the front of the new pass so the rest
        // of the pass still visits every other index once.
        let need = self.batch_size - batch.len();
        let mut taken = 0;
        for i in 0..self.order.len() {
            if taken == need {
                break;
            }
            if !batch.contains(&self.order[i]) {
                self.order.swap(taken, i);
                batch.push(self.order[taken]);
                taken += 1;
            }
        }
        self.cursor = taken;

        batch
    }
}

impl Iterator for IndexSampler {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_batch())
    }
}
