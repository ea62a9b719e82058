//! Distribution bucket arrays
//!
//! A bucket array partitions the observed value range into fixed-width
//! buckets. Arrays never shrink: when an implicit extremum moves, the
//! array grows at that end with zero-filled buckets and existing counts
//! keep their original bucket. Explicit bounds freeze the layout and
//! values outside it are silently dropped.

use serde::{Deserialize, Serialize};

/// A fixed-width bucket array with a growable layout
///
/// `counts` is empty until the first value lays the array out. `origin`
/// is the value at the lower edge of bucket 0; growth at the front
/// moves it down by whole bucket widths so existing indices stay on the
/// same grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketArray {
    counts: Vec<f64>,
    origin: Option<f64>,
    bucket_size: f64,
    fixed_min: Option<f64>,
    fixed_max: Option<f64>,
}

impl BucketArray {
    /// A numeric bucket array; bounds given here are frozen
    pub fn new(bucket_size: f64, fixed_min: Option<f64>, fixed_max: Option<f64>) -> Self {
        Self {
            counts: Vec::new(),
            origin: None,
            bucket_size,
            fixed_min,
            fixed_max,
        }
    }

    /// The fixed two-bucket layout for boolean streams: index 0 counts
    /// `false`, index 1 counts `true`
    pub fn boolean() -> Self {
        Self::new(1.0, Some(0.0), Some(1.0))
    }

    /// Bucket counts in index order; empty before the first layout
    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Lower edge of bucket 0, once laid out
    pub fn origin(&self) -> Option<f64> {
        self.origin
    }

    /// Lay the array out for the extrema seen so far, growing it if an
    /// implicit extremum moved
    ///
    /// `min`/`max` are the live extrema after the current observation;
    /// explicit bounds override them. Existing counts are preserved at
    /// their original bucket.
    pub fn prepare(&mut self, min: f64, max: f64) {
        let lo = self.fixed_min.unwrap_or(min);
        let hi = self.fixed_max.unwrap_or(max);

        match self.origin {
            None => {
                let len = if hi >= lo {
                    ((hi - lo) / self.bucket_size).floor() as usize + 1
                } else {
                    1
                };
                self.origin = Some(lo);
                self.counts = vec![0.0; len];
            }
            Some(origin) => {
                let mut origin = origin;
                if self.fixed_min.is_none() && min < origin {
                    // grow at the front in whole bucket steps so old
                    // indices shift by exactly the inserted count
                    let steps = ((origin - min) / self.bucket_size).ceil() as usize;
                    let mut grown = vec![0.0; steps];
                    grown.extend_from_slice(&self.counts);
                    self.counts = grown;
                    origin -= steps as f64 * self.bucket_size;
                    self.origin = Some(origin);
                }
                if self.fixed_max.is_none() && max > origin {
                    let needed = ((max - origin) / self.bucket_size).floor() as usize + 1;
                    if needed > self.counts.len() {
                        self.counts.resize(needed, 0.0);
                    }
                }
            }
        }
    }

    /// Bucket index for a value, or `None` when it falls outside the
    /// current layout
    pub fn index_of(&self, value: f64) -> Option<usize> {
        let origin = self.origin?;
        let index = ((value - origin) / self.bucket_size).floor();
        if index < 0.0 || index as usize >= self.counts.len() {
            return None;
        }
        Some(index as usize)
    }

    /// Add `amount` to the bucket holding `value`; out-of-range values
    /// are dropped and reported as `false`
    pub fn add(&mut self, value: f64, amount: f64) -> bool {
        match self.index_of(value) {
            Some(index) => {
                self.counts[index] += amount;
                true
            }
            None => false,
        }
    }

    /// Percentage view of the counts; empty when the total is zero
    pub fn percentages(&self) -> Vec<f64> {
        let total: f64 = self.counts.iter().sum();
        if total == 0.0 {
            return Vec::new();
        }
        self.counts.iter().map(|c| c * 100.0 / total).collect()
    }

    /// Clear all counts and drop the layout; the next `prepare` builds
    /// a fresh array. Frozen bounds are retained.
    pub fn reset(&mut self) {
        self.counts.clear();
        self.origin = None;
    }
}
