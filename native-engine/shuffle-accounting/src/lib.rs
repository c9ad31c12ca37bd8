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

//! Shuffle-write accounting and adaptive post-shuffle partitioning.
//!
//! Sits between the task scheduler and the shuffle read path: map tasks
//! report their per-partition output sizes as a [`MapStatus`], the
//! driver aggregates many of those into a [`ShuffleSizeVector`] via
//! [`ShuffleStatistics`], and an [`ExchangeCoordinator`] turns one or
//! more such vectors into a [`PostShufflePlan`] that downstream readers
//! use to fetch contiguous pre-shuffle ranges.
//!
//! This crate has no knowledge of task execution, shuffle I/O transport,
//! or plan serialization -- those are external collaborators.

pub mod bitset;
pub mod config;
pub mod error;
pub mod exchange_coordinator;
pub mod map_status;
pub mod outlier_selector;
pub mod registry;
pub mod shuffle_statistics;
pub mod size_codec;
pub mod types;
mod wire;

pub use config::CoordinatorConfig;
pub use error::{Result, ShuffleAccountingError};
pub use exchange_coordinator::ExchangeCoordinator;
pub use map_status::{CompressedStatus, HighlyCompressedStatus, LocationId, MapId, MapStatus};
pub use outlier_selector::{OutlierSelection, OutlierSelector, OutlierSize};
pub use registry::{ShuffleId, ShuffleStatusRegistry};
pub use shuffle_statistics::ShuffleStatistics;
pub use types::{PostShufflePlan, ShuffleSizeVector};
