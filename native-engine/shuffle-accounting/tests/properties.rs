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

//! Quantified properties from the spec, checked with `proptest` instead
//! of hand-picked examples.

use proptest::prelude::*;
use shuffle_accounting::{
    size_codec, CoordinatorConfig, ExchangeCoordinator, LocationId, MapStatus, OutlierSelector, OutlierSize,
    ShuffleSizeVector,
};

proptest! {
    /// Property 1: codec round-trip is bounded for every non-saturated size.
    #[test]
    fn codec_round_trip_is_bounded(size in 1u64..10_000_000_000) {
        let c = size_codec::compress(size);
        if c != 255 {
            let d = size_codec::decompress(c) as f64;
            let s = size as f64;
            prop_assert!(d >= 0.99 * s);
            prop_assert!(d <= 1.11 * s);
        }
    }

    /// Property 2: zero preservation end to end, across both status forms.
    #[test]
    fn zero_preservation_end_to_end(
        sizes in prop::collection::vec(0u64..50_000, 1..300),
        highly_compressed in any::<bool>(),
    ) {
        let config = CoordinatorConfig {
            highly_compressed_threshold: if highly_compressed { 1 } else { usize::MAX },
            ..Default::default()
        };
        let status = MapStatus::new(LocationId::new("host:1"), 0, &sizes, &config);
        for (i, &s) in sizes.iter().enumerate() {
            prop_assert_eq!(s == 0, status.get_size(i) == 0);
        }
    }

    /// Property 3: the outlier cap bounds only the skew-only (approximate)
    /// outliers -- blocks at or above the accurate threshold are exempt
    /// from the cap by construction, so they're excluded from this count.
    #[test]
    fn outlier_cap_is_never_exceeded_for_skew_only_outliers(
        sizes in prop::collection::vec(0u64..1_000_000, 20..400),
        accurate_threshold in 1u64..10_000,
        skew_factor in 0.1f64..20.0,
    ) {
        let config = CoordinatorConfig {
            highly_compressed_threshold: 1,
            accurate_block_threshold: accurate_threshold,
            skew_factor,
            ..Default::default()
        };
        let n = sizes.len();
        let selection = OutlierSelector::select(&sizes, &config);
        let approx_count = selection
            .outliers
            .values()
            .filter(|o| matches!(o, OutlierSize::Approx(_)))
            .count();
        let cap = (n / 10).max(100);
        prop_assert!(approx_count <= cap);
    }

    /// Property 4: a block at or above the accurate threshold is never
    /// underestimated by a highly-compressed status.
    #[test]
    fn accurate_blocks_are_never_underestimated(
        sizes in prop::collection::vec(0u64..200_000, 20..200),
    ) {
        let config = CoordinatorConfig {
            highly_compressed_threshold: 1,
            accurate_block_threshold: 50_000,
            ..Default::default()
        };
        let status = MapStatus::new(LocationId::new("host:1"), 0, &sizes, &config);
        for (i, &s) in sizes.iter().enumerate() {
            if s >= config.accurate_block_threshold {
                prop_assert!(status.get_size(i) >= s);
            }
        }
    }

    /// Property 7: per-post-shuffle-partition sums add back up to the
    /// shuffle's total -- the sweep neither drops nor duplicates bytes.
    #[test]
    fn coordinator_preserves_total_bytes(
        totals in prop::collection::vec(0u64..5_000, 1..200),
        target in 1u64..20_000,
    ) {
        let config = CoordinatorConfig { target_post_shuffle_bytes: target, ..Default::default() };
        let coordinator = ExchangeCoordinator::new(config).unwrap();
        let vector = ShuffleSizeVector::new(totals.clone());
        let expected: u128 = totals.iter().map(|&v| v as u128).sum();
        let plan = coordinator.plan(&[vector]).unwrap();

        let mut reconstructed = 0u128;
        for p in 0..plan.num_partitions() {
            let range = plan.range(p, totals.len());
            reconstructed += range.map(|j| totals[j] as u128).sum::<u128>();
        }
        prop_assert_eq!(expected, reconstructed);
    }

    /// Property 8: every non-singleton post-shuffle partition respects
    /// the (possibly adjusted) target budget.
    #[test]
    fn coordinator_respects_budget_or_is_a_singleton(
        totals in prop::collection::vec(0u64..5_000, 2..200),
        target in 1u64..20_000,
    ) {
        let config = CoordinatorConfig { target_post_shuffle_bytes: target, ..Default::default() };
        let coordinator = ExchangeCoordinator::new(config).unwrap();
        let n = totals.len();
        let vector = ShuffleSizeVector::new(totals.clone());
        let plan = coordinator.plan(&[vector]).unwrap();

        let starts = plan.starts();
        for w in starts.windows(2) {
            let (s, e) = (w[0], w[1]);
            if e - s == 1 {
                continue;
            }
            let sum: u128 = (s..e).map(|j| totals[j] as u128).sum();
            prop_assert!(sum <= target as u128);
        }
        let _ = n;
    }
}
