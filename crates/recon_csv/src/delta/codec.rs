//! Delta record codecs.
//!
//! Canonical serialization is a length-prefixed stream of version 1.0
//! record blobs. The remaining schemes transform either that byte
//! stream (RLE, LZ77, hybrid) or a typed payload (delta-integer,
//! dictionary). Every encoder has an exact inverse: `decode(encode(p))`
//! returns `p` for arbitrary payloads.

// dependencies
use std::collections::HashMap;
use crate::delta::record::DeltaRecord;
use crate::delta::DeltaAlgorithm;
use crate::error::DeltaError;

// constants
const LZ77_WINDOW: usize = 4096;
const LZ77_LOOKAHEAD: usize = 18;
const LZ77_MARKER: u8 = 0xFF;
const LZ77_MIN_MATCH: usize = 3;
// sentinel index for strings that overflowed the dictionary and are
// stored inline
const DICTIONARY_INLINE: u32 = u32::MAX;

/* ------------------------------------------------------------------
canonical serialization
------------------------------------------------------------------ */
/// Length-prefixed record stream: a little-endian u64 record count,
/// then per record a little-endian u32 byte length and the canonical
/// textual form.
pub fn serialize_records(records: &[DeltaRecord]) -> Result<Vec<u8>, DeltaError> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&(records.len() as u64).to_le_bytes());
    for record in records {
        let serialized = record.serialize()?;
        bytes.extend_from_slice(&(serialized.len() as u32).to_le_bytes());
        bytes.extend_from_slice(serialized.as_bytes());
    }
    Ok(bytes)
}

/// Inverse of [`serialize_records`].
pub fn deserialize_records(data: &[u8]) -> Result<Vec<DeltaRecord>, DeltaError> {
    let mut cursor = Cursor::new(data);
    let count = cursor.read_u64()?;
    let mut records = Vec::new();
    for _ in 0..count {
        let length = cursor.read_u32()? as usize;
        let blob = cursor.read_bytes(length)?;
        let text = std::str::from_utf8(blob)
            .map_err(|_| DeltaError::DecompressionFailed("record blob is not UTF-8".to_string()))?;
        records.push(DeltaRecord::deserialize(text)?);
    }
    Ok(records)
}

/* ------------------------------------------------------------------
run-length encoding
------------------------------------------------------------------ */
/// RLE over bytes as `(count, value)` pairs with a one-byte count.
pub fn rle_encode(data: &[u8]) -> Vec<u8> {
    let mut compressed = Vec::new();
    let mut iter = data.iter();
    let Some(&first) = iter.next() else {
        return compressed;
    };
    let mut current = first;
    let mut count: u8 = 1;
    for &byte in iter {
        if byte == current && count < u8::MAX {
            count += 1;
        } else {
            compressed.push(count);
            compressed.push(current);
            current = byte;
            count = 1;
        }
    }
    compressed.push(count);
    compressed.push(current);
    compressed
}

/// Inverse of [`rle_encode`].
pub fn rle_decode(data: &[u8]) -> Result<Vec<u8>, DeltaError> {
    if data.len() % 2 != 0 {
        return Err(DeltaError::DecompressionFailed(
            "run-length stream has a dangling byte".to_string(),
        ));
    }
    let mut decompressed = Vec::new();
    for pair in data.chunks_exact(2) {
        let (count, value) = (pair[0], pair[1]);
        if count == 0 {
            return Err(DeltaError::DecompressionFailed(
                "run-length stream contains a zero-length run".to_string(),
            ));
        }
        decompressed.extend(std::iter::repeat(value).take(count as usize));
    }
    Ok(decompressed)
}

/* ------------------------------------------------------------------
delta encoding for integer vectors
------------------------------------------------------------------ */
/// First value verbatim, then successive differences, as little-endian
/// 8-byte integers.
pub fn delta_encode_integers(values: &[i64]) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(values.len() * 8);
    let mut previous = 0i64;
    for (index, &value) in values.iter().enumerate() {
        let stored = if index == 0 { value } else { value.wrapping_sub(previous) };
        encoded.extend_from_slice(&stored.to_le_bytes());
        previous = value;
    }
    encoded
}

/// Inverse of [`delta_encode_integers`].
pub fn delta_decode_integers(data: &[u8]) -> Result<Vec<i64>, DeltaError> {
    if data.len() % 8 != 0 {
        return Err(DeltaError::DecompressionFailed(
            "delta-encoded stream length is not a multiple of 8".to_string(),
        ));
    }
    let mut values = Vec::with_capacity(data.len() / 8);
    let mut previous = 0i64;
    for (index, chunk) in data.chunks_exact(8).enumerate() {
        let stored = i64::from_le_bytes(chunk.try_into().expect("8-byte chunk"));
        let value = if index == 0 { stored } else { previous.wrapping_add(stored) };
        values.push(value);
        previous = value;
    }
    Ok(values)
}

/* ------------------------------------------------------------------
dictionary compression for string vectors
------------------------------------------------------------------ */
/// Frequency-sorted dictionary of up to `max_entries` distinct strings,
/// then the body as dictionary indices. Strings that fall outside the
/// dictionary are stored inline behind a sentinel index so decoding is
/// lossless.
pub fn dictionary_encode(strings: &[String], max_entries: usize) -> Vec<u8> {
    // frequency descending, first appearance breaking ties
    let mut frequency: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, string) in strings.iter().enumerate() {
        let entry = frequency.entry(string.as_str()).or_insert((0, position));
        entry.0 += 1;
    }
    let mut ordered: Vec<(&str, usize, usize)> = frequency
        .into_iter()
        .map(|(string, (count, first_seen))| (string, count, first_seen))
        .collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ordered.truncate(max_entries.min(DICTIONARY_INLINE as usize));

    let index_of: HashMap<&str, u32> = ordered
        .iter()
        .enumerate()
        .map(|(index, (string, _, _))| (*string, index as u32))
        .collect();

    let mut compressed = Vec::new();
    compressed.extend_from_slice(&(ordered.len() as u32).to_le_bytes());
    for (string, _, _) in &ordered {
        compressed.extend_from_slice(&(string.len() as u32).to_le_bytes());
        compressed.extend_from_slice(string.as_bytes());
    }
    for string in strings {
        match index_of.get(string.as_str()) {
            Some(&index) => compressed.extend_from_slice(&index.to_le_bytes()),
            None => {
                compressed.extend_from_slice(&DICTIONARY_INLINE.to_le_bytes());
                compressed.extend_from_slice(&(string.len() as u32).to_le_bytes());
                compressed.extend_from_slice(string.as_bytes());
            }
        }
    }
    compressed
}

/// Inverse of [`dictionary_encode`].
pub fn dictionary_decode(data: &[u8]) -> Result<Vec<String>, DeltaError> {
    let mut cursor = Cursor::new(data);
    let entry_count = cursor.read_u32()? as usize;
    let mut dictionary = Vec::with_capacity(entry_count);
    for _ in 0..entry_count {
        let length = cursor.read_u32()? as usize;
        dictionary.push(cursor.read_string(length)?);
    }
    let mut strings = Vec::new();
    while !cursor.is_empty() {
        let index = cursor.read_u32()?;
        if index == DICTIONARY_INLINE {
            let length = cursor.read_u32()? as usize;
            strings.push(cursor.read_string(length)?);
        } else {
            let entry = dictionary.get(index as usize).ok_or_else(|| {
                DeltaError::DecompressionFailed(format!(
                    "dictionary index {index} is out of range"
                ))
            })?;
            strings.push(entry.clone());
        }
    }
    Ok(strings)
}

/* ------------------------------------------------------------------
LZ77
------------------------------------------------------------------ */
/// Sliding-window LZ77 with a 4096-byte window and an 18-byte
/// lookahead. Back-references are `0xFF, dist_lo, dist_hi, length`;
/// literal `0xFF` bytes are escaped as `0xFF, 0x00, 0x00` (distance
/// zero is never a valid reference).
pub fn lz77_compress(data: &[u8]) -> Vec<u8> {
    let mut compressed = Vec::new();
    let mut position = 0usize;
    while position < data.len() {
        let window_start = position.saturating_sub(LZ77_WINDOW);
        let mut match_length = 0usize;
        let mut match_distance = 0usize;
        for candidate in window_start..position {
            let mut length = 0usize;
            while length < LZ77_LOOKAHEAD
                && position + length < data.len()
                && data[candidate + length] == data[position + length]
            {
                length += 1;
            }
            if length > match_length {
                match_length = length;
                match_distance = position - candidate;
            }
        }
        if match_length >= LZ77_MIN_MATCH {
            compressed.push(LZ77_MARKER);
            compressed.push((match_distance & 0xFF) as u8);
            compressed.push(((match_distance >> 8) & 0xFF) as u8);
            compressed.push(match_length as u8);
            position += match_length;
        } else {
            let byte = data[position];
            if byte == LZ77_MARKER {
                compressed.extend_from_slice(&[LZ77_MARKER, 0x00, 0x00]);
            } else {
                compressed.push(byte);
            }
            position += 1;
        }
    }
    compressed
}

/// Inverse of [`lz77_compress`].
pub fn lz77_decompress(data: &[u8]) -> Result<Vec<u8>, DeltaError> {
    let mut out = Vec::new();
    let mut cursor = Cursor::new(data);
    while !cursor.is_empty() {
        let byte = cursor.read_u8()?;
        if byte != LZ77_MARKER {
            out.push(byte);
            continue;
        }
        let low = cursor.read_u8()? as usize;
        let high = cursor.read_u8()? as usize;
        let distance = low | (high << 8);
        if distance == 0 {
            out.push(LZ77_MARKER); // escaped literal
            continue;
        }
        let length = cursor.read_u8()? as usize;
        if distance > out.len() {
            return Err(DeltaError::DecompressionFailed(format!(
                "back-reference distance {distance} exceeds output length {}",
                out.len()
            )));
        }
        // copy byte-by-byte so overlapping references work
        let start = out.len() - distance;
        for offset in 0..length {
            let byte = out[start + offset];
            out.push(byte);
        }
    }
    Ok(out)
}

/* ------------------------------------------------------------------
hybrid
------------------------------------------------------------------ */
/// Canonical-serialize, then keep the smallest of identity, RLE, and
/// LZ77, behind a one-byte algorithm tag (0, 1, or 2).
pub fn hybrid_encode(records: &[DeltaRecord], enable_rle: bool) -> Result<Vec<u8>, DeltaError> {
    let serialized = serialize_records(records)?;
    let mut best = serialized.clone();
    let mut tag: u8 = 0;
    if enable_rle {
        let rle = rle_encode(&serialized);
        if rle.len() < best.len() {
            best = rle;
            tag = 1;
        }
    }
    let lz = lz77_compress(&serialized);
    if lz.len() < best.len() {
        best = lz;
        tag = 2;
    }
    let mut out = Vec::with_capacity(best.len() + 1);
    out.push(tag);
    out.extend_from_slice(&best);
    Ok(out)
}

/// Inverse of [`hybrid_encode`]: read the algorithm tag, then dispatch.
pub fn hybrid_decode(data: &[u8]) -> Result<Vec<DeltaRecord>, DeltaError> {
    let (&tag, body) = data.split_first().ok_or_else(|| {
        DeltaError::DecompressionFailed("hybrid stream is missing its algorithm tag".to_string())
    })?;
    let serialized = match tag {
        0 => body.to_vec(),
        1 => rle_decode(body)?,
        2 => lz77_decompress(body)?,
        other => {
            return Err(DeltaError::DecompressionFailed(format!(
                "unknown hybrid algorithm tag {other}"
            )))
        }
    };
    deserialize_records(&serialized)
}

/* ------------------------------------------------------------------
algorithm dispatch for record streams
------------------------------------------------------------------ */
/// Encode a record stream under `algorithm`. The delta-integer and
/// dictionary schemes carry typed payloads rather than record streams,
/// so record artifacts fall back to the canonical form for them.
pub fn encode_records(
    records: &[DeltaRecord],
    algorithm: DeltaAlgorithm,
    enable_rle: bool,
) -> Result<Vec<u8>, DeltaError> {
    match algorithm {
        DeltaAlgorithm::None | DeltaAlgorithm::DeltaEncoding | DeltaAlgorithm::Dictionary => {
            serialize_records(records)
        }
        DeltaAlgorithm::Rle => Ok(rle_encode(&serialize_records(records)?)),
        DeltaAlgorithm::Lz77 => Ok(lz77_compress(&serialize_records(records)?)),
        DeltaAlgorithm::Hybrid => hybrid_encode(records, enable_rle),
    }
}

/// Inverse of [`encode_records`].
pub fn decode_records(
    data: &[u8],
    algorithm: DeltaAlgorithm,
) -> Result<Vec<DeltaRecord>, DeltaError> {
    match algorithm {
        DeltaAlgorithm::None | DeltaAlgorithm::DeltaEncoding | DeltaAlgorithm::Dictionary => {
            deserialize_records(data)
        }
        DeltaAlgorithm::Rle => deserialize_records(&rle_decode(data)?),
        DeltaAlgorithm::Lz77 => deserialize_records(&lz77_decompress(data)?),
        DeltaAlgorithm::Hybrid => hybrid_decode(data),
    }
}

/* ------------------------------------------------------------------
byte cursor
------------------------------------------------------------------ */
/// Bounds-checked reader over an encoded byte stream.
struct Cursor<'a> {
    data:     &'a [u8],
    position: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Cursor { data, position: 0 }
    }

    fn is_empty(&self) -> bool {
        self.position >= self.data.len()
    }

    fn read_bytes(&mut self, length: usize) -> Result<&'a [u8], DeltaError> {
        let end = self.position.checked_add(length).ok_or_else(truncated)?;
        if end > self.data.len() {
            return Err(truncated());
        }
        let slice = &self.data[self.position..end];
        self.position = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, DeltaError> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, DeltaError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().expect("4-byte slice")))
    }

    fn read_u64(&mut self) -> Result<u64, DeltaError> {
        let bytes = self.read_bytes(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().expect("8-byte slice")))
    }

    fn read_string(&mut self, length: usize) -> Result<String, DeltaError> {
        let bytes = self.read_bytes(length)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| DeltaError::DecompressionFailed("string is not UTF-8".to_string()))
    }
}

fn truncated() -> DeltaError {
    DeltaError::DecompressionFailed("encoded stream is truncated".to_string())
}
