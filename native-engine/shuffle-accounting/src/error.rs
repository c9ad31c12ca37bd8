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

use thiserror::Error;

use crate::registry::ShuffleId;

#[derive(Debug, Error)]
pub enum ShuffleAccountingError {
    #[error("corrupt map status: {0}")]
    CorruptStatus(String),

    #[error(
        "shuffle size vector shape mismatch: expected length {expected}, \
         got {actual} at input index {input_index}"
    )]
    ShapeMismatch {
        expected: usize,
        actual: usize,
        input_index: usize,
    },

    #[error("invalid coordinator config: {0}")]
    ConfigError(String),

    #[error("unknown shuffle {0}")]
    UnknownShuffle(ShuffleId),

    #[error("unknown map {map_id} for shuffle {shuffle_id}")]
    UnknownMap { shuffle_id: ShuffleId, map_id: u64 },
}

pub type Result<T> = std::result::Result<T, ShuffleAccountingError>;
