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

//! Logarithmic size quantization: one byte per block, bounded relative
//! error, exact preservation of "zero".

/// Base of the logarithmic quantization. Chosen so that a single byte
/// keeps relative error under 11% while covering sizes up to ~2^36.
const LOG_BASE: f64 = 1.1;

/// Encoded value reserved to mean "too large to represent -- saturated".
const SATURATED: u8 = 255;

/// Compresses a non-negative byte count into a single byte.
///
/// `compress(0) == 0` and that is the only encoded value meaning zero;
/// every `size >= 1` round-trips through `decompress` to within
/// `[0.99 * size, 1.11 * size]`, unless the size is large enough that
/// `compress` returns the saturation marker `255`.
pub fn compress(size: u64) -> u8 {
    if size == 0 {
        return 0;
    }
    if size <= 1 {
        // log_BASE(1) == 0, which would collide with the zero encoding.
        return 1;
    }
    let exp = (size as f64).ln() / LOG_BASE.ln();
    let clipped = exp.ceil();
    if clipped > (SATURATED - 1) as f64 {
        SATURATED
    } else {
        clipped as u8
    }
}

/// Inverse of [`compress`]. `decompress(0) == 0`; `decompress(255)`
/// returns a fixed sentinel no smaller than the size at which `compress`
/// starts saturating.
pub fn decompress(compressed: u8) -> u64 {
    if compressed == 0 {
        return 0;
    }
    LOG_BASE.powi(compressed as i32).round() as u64
}
