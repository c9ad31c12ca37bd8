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

//! Minimal wire primitives shared by the status codecs: LEB128 varints
//! and length-prefixed byte strings. Kept separate from
//! `datafusion::arrow::ipc` framing since statuses never carry Arrow
//! payloads.

use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::error::{Result, ShuffleAccountingError};

pub fn write_varint<W: Write>(w: &mut W, mut value: u64) -> std::io::Result<()> {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            w.write_u8(byte | 0x80)?;
        } else {
            w.write_u8(byte)?;
            return Ok(());
        }
    }
}

pub fn read_varint<R: Read>(r: &mut R) -> Result<u64> {
    let mut result: u64 = 0;
    let mut shift = 0u32;
    loop {
        if shift >= 64 {
            return Err(ShuffleAccountingError::CorruptStatus(
                "varint exceeds 64 bits".to_string(),
            ));
        }
        let byte = r
            .read_u8()
            .map_err(|_| ShuffleAccountingError::CorruptStatus("truncated varint".to_string()))?;
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

pub fn write_bytes<W: Write>(w: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    write_varint(w, bytes.len() as u64)?;
    w.write_all(bytes)
}

pub fn read_bytes<R: Read>(r: &mut R) -> Result<Vec<u8>> {
    let len = read_varint(r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)
        .map_err(|_| ShuffleAccountingError::CorruptStatus("truncated byte string".to_string()))?;
    Ok(buf)
}

pub fn write_string<W: Write>(w: &mut W, s: &str) -> std::io::Result<()> {
    write_bytes(w, s.as_bytes())
}

pub fn read_string<R: Read>(r: &mut R) -> Result<String> {
    let bytes = read_bytes(r)?;
    String::from_utf8(bytes)
        .map_err(|e| ShuffleAccountingError::CorruptStatus(format!("invalid utf8 in string: {e}")))
}
