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

//! Per-map-task shuffle-write metadata: the two `MapStatus` variants,
//! the factory that picks between them, and stable wire framing.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::Arc;

use crate::bitset::EmptyBlockSet;
use crate::config::CoordinatorConfig;
use crate::error::{Result, ShuffleAccountingError};
use crate::outlier_selector::{OutlierSelector, OutlierSize};
use crate::size_codec;
use crate::wire::{read_string, read_varint, write_string, write_varint};

const TAG_COMPRESSED: u8 = 0x00;
const TAG_HIGHLY_COMPRESSED: u8 = 0x01;

const OUTLIER_FLAG_EXACT: u8 = 0;
const OUTLIER_FLAG_APPROX: u8 = 1;

/// Opaque identity of the worker that produced a status. Host/port
/// resolution is the job of the cluster membership collaborator; this
/// crate only needs identity and equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationId(Arc<str>);

impl LocationId {
    pub fn new(s: impl Into<Arc<str>>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub type MapId = u64;

/// One byte per downstream partition, each decoded with [`size_codec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedStatus {
    location: LocationId,
    map_id: MapId,
    sizes: Vec<u8>,
}

impl CompressedStatus {
    pub fn new(location: LocationId, map_id: MapId, sizes: &[u64]) -> Self {
        let sizes = sizes.iter().map(|&s| size_codec::compress(s)).collect();
        Self { location, map_id, sizes }
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    pub fn get_size(&self, i: usize) -> u64 {
        size_codec::decompress(self.sizes[i])
    }

    fn serialize<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        write_string(w, self.location.as_str())?;
        write_varint(w, self.map_id)?;
        write_varint(w, self.sizes.len() as u64)?;
        w.write_all(&self.sizes)
    }

    fn deserialize<R: Read>(r: &mut R) -> Result<Self> {
        let location = LocationId::new(read_string(r)?);
        let map_id = read_varint(r)?;
        let n = read_varint(r)? as usize;
        let mut sizes = vec![0u8; n];
        r.read_exact(&mut sizes)
            .map_err(|_| ShuffleAccountingError::CorruptStatus("truncated compressed sizes".to_string()))?;
        Ok(Self { location, map_id, sizes })
    }
}

/// Average + explicit outliers + empty-block set. See
/// [`OutlierSelector`] for how `avg_size` and `outliers` are derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlyCompressedStatus {
    location: LocationId,
    map_id: MapId,
    len: usize,
    empty_blocks: EmptyBlockSet,
    avg_size: u64,
    outliers: BTreeMap<u32, OutlierSize>,
}

impl HighlyCompressedStatus {
    pub fn new(location: LocationId, map_id: MapId, sizes: &[u64], config: &CoordinatorConfig) -> Self {
        let selection = OutlierSelector::select(sizes, config);
        Self {
            location,
            map_id,
            len: sizes.len(),
            empty_blocks: selection.empty_blocks,
            avg_size: selection.avg_size,
            outliers: selection.outliers,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get_size(&self, i: usize) -> u64 {
        if self.empty_blocks.contains(i) {
            0
        } else if let Some(outlier) = self.outliers.get(&(i as u32)) {
            outlier.get()
        } else {
            self.avg_size
        }
    }

    pub fn outlier_count(&self) -> usize {
        self.outliers.len()
    }

    fn serialize<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        write_string(w, self.location.as_str())?;
        write_varint(w, self.map_id)?;
        write_varint(w, self.len as u64)?;
        write_varint(w, self.avg_size)?;
        self.empty_blocks.serialize(w)?;
        write_varint(w, self.outliers.len() as u64)?;
        for (&idx, outlier) in &self.outliers {
            write_varint(w, idx as u64)?;
            match outlier {
                OutlierSize::Exact(v) => {
                    w.write_all(&[OUTLIER_FLAG_EXACT])?;
                    write_varint(w, *v)?;
                }
                OutlierSize::Approx(b) => {
                    w.write_all(&[OUTLIER_FLAG_APPROX])?;
                    w.write_all(&[*b])?;
                }
            }
        }
        Ok(())
    }

    fn deserialize<R: Read>(r: &mut R) -> Result<Self> {
        let location = LocationId::new(read_string(r)?);
        let map_id = read_varint(r)?;
        let len = read_varint(r)? as usize;
        let avg_size = read_varint(r)?;
        let empty_blocks = EmptyBlockSet::deserialize(r, len)?;
        let outlier_count = read_varint(r)? as usize;
        let mut outliers = BTreeMap::new();
        for _ in 0..outlier_count {
            let idx = read_varint(r)? as u32;
            if idx as usize >= len {
                return Err(ShuffleAccountingError::CorruptStatus(format!(
                    "outlier index {idx} out of range for N={len}"
                )));
            }
            let mut flag = [0u8; 1];
            r.read_exact(&mut flag)
                .map_err(|_| ShuffleAccountingError::CorruptStatus("truncated outlier flag".to_string()))?;
            let size = match flag[0] {
                OUTLIER_FLAG_EXACT => OutlierSize::Exact(read_varint(r)?),
                OUTLIER_FLAG_APPROX => {
                    let mut b = [0u8; 1];
                    r.read_exact(&mut b).map_err(|_| {
                        ShuffleAccountingError::CorruptStatus("truncated outlier byte".to_string())
                    })?;
                    OutlierSize::Approx(b[0])
                }
                other => {
                    return Err(ShuffleAccountingError::CorruptStatus(format!(
                        "unknown outlier flag {other}"
                    )))
                }
            };
            outliers.insert(idx, size);
        }
        Ok(Self {
            location,
            map_id,
            len,
            empty_blocks,
            avg_size,
            outliers,
        })
    }
}

/// Per-map-task shuffle-write metadata, in one of two forms chosen by
/// [`MapStatus::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapStatus {
    Compressed(CompressedStatus),
    HighlyCompressed(HighlyCompressedStatus),
}

impl MapStatus {
    /// Chooses `HighlyCompressed` once `sizes.len() >=
    /// config.highly_compressed_threshold`, `Compressed` otherwise.
    pub fn new(location: LocationId, map_id: MapId, sizes: &[u64], config: &CoordinatorConfig) -> Self {
        if sizes.len() >= config.highly_compressed_threshold {
            log::debug!(
                "map {map_id} on {location}: {} partitions >= threshold {}, using highly-compressed status",
                sizes.len(),
                config.highly_compressed_threshold
            );
            MapStatus::HighlyCompressed(HighlyCompressedStatus::new(location, map_id, sizes, config))
        } else {
            MapStatus::Compressed(CompressedStatus::new(location, map_id, sizes))
        }
    }

    pub fn len(&self) -> usize {
        match self {
            MapStatus::Compressed(s) => s.len(),
            MapStatus::HighlyCompressed(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_size(&self, i: usize) -> u64 {
        match self {
            MapStatus::Compressed(s) => s.get_size(i),
            MapStatus::HighlyCompressed(s) => s.get_size(i),
        }
    }

    pub fn location(&self) -> &LocationId {
        match self {
            MapStatus::Compressed(s) => &s.location,
            MapStatus::HighlyCompressed(s) => &s.location,
        }
    }

    pub fn map_id(&self) -> MapId {
        match self {
            MapStatus::Compressed(s) => s.map_id,
            MapStatus::HighlyCompressed(s) => s.map_id,
        }
    }

    pub fn serialize<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        match self {
            MapStatus::Compressed(s) => {
                w.write_all(&[TAG_COMPRESSED])?;
                s.serialize(w)
            }
            MapStatus::HighlyCompressed(s) => {
                w.write_all(&[TAG_HIGHLY_COMPRESSED])?;
                s.serialize(w)
            }
        }
    }

    pub fn deserialize<R: Read>(r: &mut R) -> Result<Self> {
        let mut tag = [0u8; 1];
        r.read_exact(&mut tag)
            .map_err(|_| ShuffleAccountingError::CorruptStatus("truncated status tag".to_string()))?;
        match tag[0] {
            TAG_COMPRESSED => Ok(MapStatus::Compressed(CompressedStatus::deserialize(r)?)),
            TAG_HIGHLY_COMPRESSED => Ok(MapStatus::HighlyCompressed(HighlyCompressedStatus::deserialize(r)?)),
            other => Err(ShuffleAccountingError::CorruptStatus(format!(
                "unknown map status discriminator {other:#x}"
            ))),
        }
    }

    /// `serialize` followed directly by bytes produced by a foreign
    /// call -- reject any leftover, unconsumed bytes as corrupt.
    pub fn deserialize_exact(bytes: &[u8]) -> Result<Self> {
        let mut cursor = std::io::Cursor::new(bytes);
        let status = Self::deserialize(&mut cursor)?;
        if (cursor.position() as usize) != bytes.len() {
            return Err(ShuffleAccountingError::CorruptStatus(
                "trailing bytes after map status".to_string(),
            ));
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> LocationId {
        LocationId::new("executor-1:7337")
    }

    #[test]
    fn factory_chooses_compressed_below_threshold() {
        let config = CoordinatorConfig {
            highly_compressed_threshold: 10,
            ..Default::default()
        };
        let status = MapStatus::new(loc(), 1, &[1, 2, 3], &config);
        assert!(matches!(status, MapStatus::Compressed(_)));
    }

    #[test]
    fn factory_chooses_highly_compressed_at_threshold() {
        let config = CoordinatorConfig {
            highly_compressed_threshold: 3,
            ..Default::default()
        };
        let status = MapStatus::new(loc(), 1, &[1, 2, 3], &config);
        assert!(matches!(status, MapStatus::HighlyCompressed(_)));
    }

    #[test]
    fn zero_is_preserved_end_to_end_compressed() {
        let config = CoordinatorConfig::default();
        let sizes = vec![0, 5, 0, 1000];
        let status = MapStatus::new(loc(), 1, &sizes, &config);
        for (i, &s) in sizes.iter().enumerate() {
            assert_eq!(s == 0, status.get_size(i) == 0, "index {i}");
        }
    }

    #[test]
    fn zero_is_preserved_end_to_end_highly_compressed() {
        let config = CoordinatorConfig {
            highly_compressed_threshold: 1,
            ..Default::default()
        };
        let sizes = vec![0, 5, 0, 1000, 0, 2_000_000];
        let status = MapStatus::new(loc(), 1, &sizes, &config);
        for (i, &s) in sizes.iter().enumerate() {
            assert_eq!(s == 0, status.get_size(i) == 0, "index {i}");
        }
    }

    #[test]
    fn accurate_threshold_never_underestimated() {
        let config = CoordinatorConfig {
            highly_compressed_threshold: 1,
            accurate_block_threshold: 1000,
            ..Default::default()
        };
        let sizes = vec![10, 20, 5000, 30];
        let status = MapStatus::new(loc(), 1, &sizes, &config);
        assert!(status.get_size(2) >= 5000);
    }

    #[test]
    fn serialization_round_trips_compressed() {
        let config = CoordinatorConfig::default();
        let status = MapStatus::new(loc(), 42, &[0, 10, 12345, 999_999], &config);
        let mut buf = Vec::new();
        status.serialize(&mut buf).unwrap();
        let decoded = MapStatus::deserialize_exact(&buf).unwrap();
        assert_eq!(status, decoded);
    }

    #[test]
    fn serialization_round_trips_highly_compressed() {
        let config = CoordinatorConfig {
            highly_compressed_threshold: 1,
            accurate_block_threshold: 500,
            skew_factor: 3.0,
            ..Default::default()
        };
        let sizes: Vec<u64> = (0..200).map(|i| if i % 7 == 0 { 0 } else { i * i } as u64).collect();
        let status = MapStatus::new(loc(), 7, &sizes, &config);
        let mut buf = Vec::new();
        status.serialize(&mut buf).unwrap();
        let decoded = MapStatus::deserialize_exact(&buf).unwrap();
        assert_eq!(status, decoded);
    }

    #[test]
    fn trailing_bytes_are_corrupt() {
        let config = CoordinatorConfig::default();
        let status = MapStatus::new(loc(), 1, &[1, 2, 3], &config);
        let mut buf = Vec::new();
        status.serialize(&mut buf).unwrap();
        buf.push(0xFF);
        assert!(matches!(
            MapStatus::deserialize_exact(&buf),
            Err(ShuffleAccountingError::CorruptStatus(_))
        ));
    }

    #[test]
    fn unknown_discriminator_is_corrupt() {
        let buf = [0x7Fu8];
        assert!(matches!(
            MapStatus::deserialize_exact(&buf),
            Err(ShuffleAccountingError::CorruptStatus(_))
        ));
    }

    #[test]
    fn outlier_cap_is_respected_for_skew_only_outliers() {
        let config = CoordinatorConfig {
            highly_compressed_threshold: 1,
            accurate_block_threshold: u64::MAX, // nothing qualifies as accurate
            skew_factor: 0.5,
            max_outliers: Some(5),
            ..Default::default()
        };
        let sizes: Vec<u64> = (1..=1000).collect();
        let status = MapStatus::new(loc(), 1, &sizes, &config);
        if let MapStatus::HighlyCompressed(s) = status {
            assert!(s.outlier_count() <= 5);
        } else {
            panic!("expected highly compressed status");
        }
    }

    #[test]
    fn outlier_cap_does_not_apply_to_accurate_blocks() {
        let config = CoordinatorConfig {
            highly_compressed_threshold: 1,
            accurate_block_threshold: 1,
            max_outliers: Some(5),
            ..Default::default()
        };
        // every size is >= accurate_block_threshold: all 1000 must be
        // stored exactly and never underestimated, cap notwithstanding.
        let sizes: Vec<u64> = (1..=1000).collect();
        let status = MapStatus::new(loc(), 1, &sizes, &config);
        if let MapStatus::HighlyCompressed(ref s) = status {
            assert_eq!(s.outlier_count(), 1000);
        } else {
            panic!("expected highly compressed status");
        }
        for (i, &size) in sizes.iter().enumerate() {
            assert!(status.get_size(i) >= size, "index {i}");
        }
    }
}
