// Copyright 2022 The Blaze Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Tunables shared by the `MapStatus` factory and `ExchangeCoordinator`.
//!
//! A single value type threaded by reference everywhere, rather than
//! read from process-wide globals -- see DESIGN.md for why.

use crate::error::{Result, ShuffleAccountingError};

/// Minimum outlier cap floor, used when `max_outliers` is left at its
/// default. The real per-status cap is `max(OUTLIER_CAP_FLOOR, N / 10)`.
pub const OUTLIER_CAP_FLOOR: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinatorConfig {
    /// Desired upper bound on bytes consumed by any single post-shuffle
    /// partition.
    pub target_post_shuffle_bytes: u64,
    /// Optional lower bound on the number of post-shuffle partitions
    /// produced by a single `plan()` call.
    pub min_post_shuffle_partitions: Option<usize>,
    /// A block whose size exceeds `skew_factor * avgSize` is stored
    /// exactly in a `HighlyCompressedStatus`.
    pub skew_factor: f64,
    /// A block at or above this size is always stored exactly,
    /// regardless of the skew rule.
    pub accurate_block_threshold: u64,
    /// If a map task's partition count is at or above this threshold,
    /// `MapStatus::new` chooses the highly-compressed representation.
    pub highly_compressed_threshold: usize,
    /// Overrides the default `max(100, N / 10)` outlier cap. `None`
    /// uses the default formula.
    pub max_outliers: Option<usize>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            target_post_shuffle_bytes: 64 * 1024 * 1024,
            min_post_shuffle_partitions: None,
            skew_factor: 10.0,
            accurate_block_threshold: 100 * 1024 * 1024,
            highly_compressed_threshold: 2000,
            max_outliers: None,
        }
    }
}

impl CoordinatorConfig {
    /// Validates the config in isolation (no knowledge of N yet -- the
    /// `min_post_shuffle_partitions <= N` check happens in
    /// `ExchangeCoordinator::plan`, the first place N is known).
    pub fn validate(&self) -> Result<()> {
        if self.target_post_shuffle_bytes == 0 {
            return Err(ShuffleAccountingError::ConfigError(
                "target_post_shuffle_bytes must be positive".to_string(),
            ));
        }
        if let Some(k) = self.min_post_shuffle_partitions {
            if k == 0 {
                return Err(ShuffleAccountingError::ConfigError(
                    "min_post_shuffle_partitions must be at least 1".to_string(),
                ));
            }
        }
        if !(self.skew_factor > 0.0) {
            return Err(ShuffleAccountingError::ConfigError(
                "skew_factor must be positive".to_string(),
            ));
        }
        if self.accurate_block_threshold == 0 {
            return Err(ShuffleAccountingError::ConfigError(
                "accurate_block_threshold must be positive".to_string(),
            ));
        }
        if self.highly_compressed_threshold == 0 {
            return Err(ShuffleAccountingError::ConfigError(
                "highly_compressed_threshold must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// The maximum number of skew-only (below `accurate_block_threshold`)
    /// blocks a highly-compressed status for a map task with `n`
    /// partitions may store exactly. Blocks at or above
    /// `accurate_block_threshold` are never subject to this cap.
    pub fn outlier_cap(&self, n: usize) -> usize {
        self.max_outliers.unwrap_or_else(|| (n / 10).max(OUTLIER_CAP_FLOOR))
    }
}
