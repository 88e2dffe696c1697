//! The single random source of a world.
//!
//! Every random decision (generation, AI rolls, loot) is drawn from one
//! [`SimRng`] owned by the world, so a fixed seed replays a world exactly.
//! Tests can also script the exact sequence of unit draws.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use shared::Vec2;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct SimRng {
    inner: Pcg64,
    script: VecDeque<f64>,
}

impl SimRng {
    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: Pcg64::seed_from_u64(seed),
            script: VecDeque::new(),
        }
    }

    pub fn from_entropy() -> Self {
        Self::seeded(rand::random())
    }

    /// A source that returns `values` from [`SimRng::unit`] in order before
    /// falling back to a fixed-seed generator.
    pub fn scripted(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            inner: Pcg64::seed_from_u64(0),
            script: values.into_iter().collect(),
        }
    }

    /// Uniform draw in `[0, 1)`. All other helpers are built on this.
    pub fn unit(&mut self) -> f64 {
        self.script
            .pop_front()
            .unwrap_or_else(|| self.inner.gen::<f64>())
    }

    /// True with probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.unit() < p
    }

    /// Uniform float in `[low, high)`; returns `low` for an empty range.
    pub fn range(&mut self, low: f32, high: f32) -> f32 {
        if high <= low {
            return low;
        }
        low + (self.unit() as f32) * (high - low)
    }

    /// Uniform integer in `[low, high]`.
    pub fn range_inclusive(&mut self, low: u32, high: u32) -> u32 {
        if high <= low {
            return low;
        }
        let span = (high - low + 1) as f64;
        low + ((self.unit() * span) as u32).min(high - low)
    }

    /// Uniform index into a collection of `len` elements.
    pub fn index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some(((self.unit() * len as f64) as usize).min(len - 1))
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        self.index(items.len()).map(|i| &items[i])
    }

    /// Index chosen with probability proportional to its weight. Returns
    /// `None` when no weight is positive.
    pub fn weighted_index(&mut self, weights: &[f32]) -> Option<usize> {
        let total: f32 = weights.iter().filter(|w| **w > 0.0).sum();
        if total <= 0.0 {
            return None;
        }
        let mut roll = self.unit() as f32 * total;
        let mut last = None;
        for (i, weight) in weights.iter().enumerate() {
            if *weight <= 0.0 {
                continue;
            }
            if roll < *weight {
                return Some(i);
            }
            roll -= weight;
            last = Some(i);
        }
        last
    }

    /// Uniform point inside the disc around `center`.
    pub fn point_in_circle(&mut self, center: Vec2, radius: f32) -> Vec2 {
        let r = radius * (self.unit() as f32).sqrt();
        let theta = (self.unit() as f32) * std::f32::consts::TAU;
        center + Vec2::new(r * theta.cos(), r * theta.sin())
    }
}
