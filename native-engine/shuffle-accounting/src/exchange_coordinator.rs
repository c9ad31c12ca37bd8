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

//! Adaptive post-shuffle partitioning: turns one or more per-partition
//! byte totals into a single ordered list of post-shuffle start
//! indices, respecting a target byte budget, an optional minimum
//! reducer count, and (for M > 1 inputs) a shared partition boundary
//! so sort-merge joins can align across shuffles.

use crate::config::CoordinatorConfig;
use crate::error::{Result, ShuffleAccountingError};
use crate::types::{PostShufflePlan, ShuffleSizeVector};

pub struct ExchangeCoordinator {
    config: CoordinatorConfig,
}

impl ExchangeCoordinator {
    pub fn new(config: CoordinatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Computes the post-shuffle plan for `vectors`, one per
    /// participating shuffle. All vectors must share the same length;
    /// the same start-index sequence is always produced regardless of
    /// the order the vectors are passed in, since only their per-index
    /// sum matters.
    pub fn plan(&self, vectors: &[ShuffleSizeVector]) -> Result<PostShufflePlan> {
        let n = vectors
            .first()
            .ok_or_else(|| ShuffleAccountingError::ConfigError("no shuffle size vectors given".to_string()))?
            .len();

        for (idx, v) in vectors.iter().enumerate() {
            if v.len() != n {
                return Err(ShuffleAccountingError::ShapeMismatch {
                    expected: n,
                    actual: v.len(),
                    input_index: idx,
                });
            }
        }

        if let Some(k) = self.config.min_post_shuffle_partitions {
            if k > n {
                return Err(ShuffleAccountingError::ConfigError(format!(
                    "min_post_shuffle_partitions={k} exceeds pre-shuffle partition count N={n}"
                )));
            }
        }

        let totals: Vec<u64> = (0..n)
            .map(|j| vectors.iter().map(|v| v[j]).fold(0u64, u64::saturating_add))
            .collect();
        let total_sum: u128 = totals.iter().map(|&v| v as u128).sum();

        if total_sum == 0 {
            log::debug!("all {n} pre-shuffle partitions are empty, returning a single post-shuffle partition");
            return Ok(PostShufflePlan::new(vec![0]));
        }

        let mut starts = Self::sweep(&totals, self.config.target_post_shuffle_bytes);
        log::info!(
            "exchange coordinator computed {} post-shuffle partitions at target {} bytes",
            starts.len(),
            self.config.target_post_shuffle_bytes
        );

        if let Some(k_min) = self.config.min_post_shuffle_partitions {
            if starts.len() < k_min {
                let adjusted_target = (total_sum / k_min as u128).max(1) as u64;
                log::info!(
                    "only {} partitions produced, below min_post_shuffle_partitions={k_min}; \
                     retrying with adjusted target {adjusted_target} bytes",
                    starts.len()
                );
                starts = Self::sweep(&totals, adjusted_target);

                if starts.len() < k_min {
                    log::info!(
                        "adjusted sweep still produced only {} partitions; falling back to \
                         evenly spaced partitioning for min_post_shuffle_partitions={k_min}",
                        starts.len()
                    );
                    starts = Self::even_spacing(n, k_min);
                }
            }
        }

        Ok(PostShufflePlan::new(starts))
    }

    /// The authoritative left-to-right sweep: accumulate pre-shuffle
    /// totals into the current post-shuffle partition until adding the
    /// next one would exceed `target`, then start a new partition.
    fn sweep(totals: &[u64], target: u64) -> Vec<usize> {
        let target = target as u128;
        let mut starts = vec![0usize];
        let mut accum: u128 = 0;

        for (j, &s) in totals.iter().enumerate() {
            let s = s as u128;
            if accum + s > target && accum > 0 {
                starts.push(j);
                accum = s;
            } else {
                accum += s;
            }
        }
        starts
    }

    /// Evenly spaced fallback used only when even an adjusted-target
    /// sweep cannot reach `k` partitions (e.g. almost all bytes land on
    /// a handful of pre-shuffle ids).
    fn even_spacing(n: usize, k: usize) -> Vec<usize> {
        (0..k).map(|i| i * n / k).collect()
    }
}
