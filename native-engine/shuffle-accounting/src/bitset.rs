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

//! Compact representation of the set of empty (zero-size) pre-shuffle
//! blocks inside a `HighlyCompressedStatus`.
//!
//! Chooses between a dense bitmap (cheap when empty blocks are a large
//! fraction of N) and a sparse, delta-encoded index list (cheap when
//! they are rare), picking whichever serializes smaller.

use std::io::{Read, Write};

use bitvec::prelude::*;

use crate::error::{Result, ShuffleAccountingError};
use crate::wire::{read_varint, write_varint};

type Bits = BitVec<u8, Lsb0>;

const TAG_DENSE: u8 = 0;
const TAG_SPARSE: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmptyBlockSet {
    Dense(Bits),
    /// Strictly ascending indices.
    Sparse(Vec<u32>),
}

impl EmptyBlockSet {
    /// Builds the most compact representation for the given empty
    /// indices out of `len` total blocks. `indices` need not be sorted.
    pub fn from_indices(mut indices: Vec<u32>, len: usize) -> Self {
        indices.sort_unstable();
        indices.dedup();

        // A dense bitmap costs ceil(len/8) bytes; a sparse list costs
        // roughly one varint byte per gap for well-distributed indices.
        // Use the bitmap once the sparse list would exceed it.
        let dense_bytes = len.div_ceil(8);
        if indices.len() > dense_bytes {
            let mut bits: Bits = bitvec![u8, Lsb0; 0; len];
            for &i in &indices {
                bits.set(i as usize, true);
            }
            EmptyBlockSet::Dense(bits)
        } else {
            EmptyBlockSet::Sparse(indices)
        }
    }

    pub fn contains(&self, i: usize) -> bool {
        match self {
            EmptyBlockSet::Dense(bits) => bits.get(i).map(|b| *b).unwrap_or(false),
            EmptyBlockSet::Sparse(v) => v.binary_search(&(i as u32)).is_ok(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            EmptyBlockSet::Dense(bits) => bits.count_ones(),
            EmptyBlockSet::Sparse(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn serialize<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        match self {
            EmptyBlockSet::Dense(bits) => {
                w.write_all(&[TAG_DENSE])?;
                let raw = bits.as_raw_slice();
                write_varint(w, raw.len() as u64)?;
                w.write_all(raw)
            }
            EmptyBlockSet::Sparse(indices) => {
                w.write_all(&[TAG_SPARSE])?;
                write_varint(w, indices.len() as u64)?;
                // run-length-style delta encoding: each entry is the gap
                // since the previous index, so dense clusters shrink to
                // single-byte varints regardless of absolute magnitude.
                let mut prev = 0u32;
                for (n, &idx) in indices.iter().enumerate() {
                    let delta = if n == 0 { idx } else { idx - prev };
                    write_varint(w, delta as u64)?;
                    prev = idx;
                }
                Ok(())
            }
        }
    }

    pub fn deserialize<R: Read>(r: &mut R, len: usize) -> Result<Self> {
        let mut tag = [0u8; 1];
        r.read_exact(&mut tag)
            .map_err(|_| ShuffleAccountingError::CorruptStatus("truncated empty-block tag".to_string()))?;
        match tag[0] {
            TAG_DENSE => {
                let byte_len = read_varint(r)? as usize;
                if byte_len != len.div_ceil(8) {
                    return Err(ShuffleAccountingError::CorruptStatus(format!(
                        "dense empty-block bitmap length {byte_len} does not match N={len}"
                    )));
                }
                let mut raw = vec![0u8; byte_len];
                r.read_exact(&mut raw).map_err(|_| {
                    ShuffleAccountingError::CorruptStatus("truncated empty-block bitmap".to_string())
                })?;
                let mut bits: Bits = BitVec::from_vec(raw);
                bits.truncate(len);
                Ok(EmptyBlockSet::Dense(bits))
            }
            TAG_SPARSE => {
                let count = read_varint(r)? as usize;
                let mut indices = Vec::with_capacity(count);
                let mut prev = 0u32;
                for n in 0..count {
                    let delta = read_varint(r)? as u32;
                    let idx = if n == 0 { delta } else { prev + delta };
                    if idx as usize >= len {
                        return Err(ShuffleAccountingError::CorruptStatus(format!(
                            "empty-block index {idx} out of range for N={len}"
                        )));
                    }
                    indices.push(idx);
                    prev = idx;
                }
                Ok(EmptyBlockSet::Sparse(indices))
            }
            other => Err(ShuffleAccountingError::CorruptStatus(format!(
                "unknown empty-block set tag {other}"
            ))),
        }
    }
}
