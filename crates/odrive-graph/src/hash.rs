//! Content-addressed integrity hashing: SHA-1, SHA-256, and Microsoft's
//! QuickXorHash, each in a byte-buffer and a seekable-stream variant.
//!
//! The streaming variants leave the reader's position exactly where they
//! found it: seek to the start before reading, seek back to the start (not
//! merely "wherever the caller left it") after.

use std::io::{Read, Seek, SeekFrom};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Microsoft's quickXorHash: a 160-bit state held as three little-endian
/// cells (two 64-bit cells and one 32-bit cell), with each input byte
/// XOR-ed in at a bit position that advances by 11 bits per byte and wraps
/// at the 160-bit width. The total input length is XOR-ed into the final
/// 8 bytes of the state at the end. Reproduces Microsoft's reference
/// implementation (and its published test vectors) byte-exactly, including
/// the asymmetric last cell -- this is not a plain 160-bit circular buffer.
pub struct QuickXorHash {
    /// Three cells: `data[0]` and `data[1]` hold 64 bits each, `data[2]`
    /// holds only its low 32 bits (160 = 64 + 64 + 32).
    data: [u64; Self::CELL_COUNT],
    /// Bit position of the next byte, in the range `0..WIDTH_BITS`.
    shift: usize,
    length: u64,
}

impl QuickXorHash {
    const WIDTH_BITS: usize = 160;
    const SHIFT_STEP: usize = 11;
    const CELL_COUNT: usize = 3;
    const LAST_CELL_BITS: usize = 32;

    #[must_use]
    pub fn new() -> Self {
        Self {
            data: [0u64; Self::CELL_COUNT],
            shift: 0,
            length: 0,
        }
    }

    /// Bit width of cell `index`: 64 for every cell but the last, which is
    /// truncated to 32 bits so the three cells sum to 160.
    fn bits_in_cell(index: usize) -> usize {
        if index == Self::CELL_COUNT - 1 {
            Self::LAST_CELL_BITS
        } else {
            64
        }
    }

    pub fn update(&mut self, input: &[u8]) {
        let count = input.len();
        if count == 0 {
            return;
        }

        let mut cell = self.shift / 64;
        let mut offset = self.shift % 64;
        // Every byte `iterations` apart lands in the same cell at the same
        // offset (a full cycle through the 160-bit width is exactly
        // `WIDTH_BITS` bytes), so each of the first `iterations` byte
        // positions can absorb its whole strided run in one inner loop.
        let iterations = count.min(Self::WIDTH_BITS);

        for i in 0..iterations {
            let bits_in_cell = Self::bits_in_cell(cell);
            // A byte spanning past this cell's width also XORs its high
            // bits into the next cell. `SHIFT_STEP` is used as the trigger
            // (rather than the byte's own 8-bit width) to match the
            // reference implementation; when no carry is actually needed
            // the shift amount is >= 8 and the XOR is a harmless no-op.
            let carries = offset + Self::SHIFT_STEP > bits_in_cell;
            let next_cell = (cell + 1) % Self::CELL_COUNT;

            let mut j = i;
            while j < count {
                self.data[cell] ^= (input[j] as u64) << offset;
                if carries {
                    self.data[next_cell] ^= (input[j] as u64) >> (bits_in_cell - offset);
                }
                j += Self::WIDTH_BITS;
            }

            offset += Self::SHIFT_STEP;
            if offset >= bits_in_cell {
                cell = (cell + 1) % Self::CELL_COUNT;
                offset -= bits_in_cell;
            }
        }

        self.shift = (self.shift + Self::SHIFT_STEP * (count % Self::WIDTH_BITS)) % Self::WIDTH_BITS;
        self.length += count as u64;
    }

    #[must_use]
    pub fn finalize(self) -> [u8; 20] {
        let mut out = [0u8; 20];
        for (i, word) in self.data.iter().enumerate().take(Self::CELL_COUNT - 1) {
            out[i * 8..i * 8 + 8].copy_from_slice(&word.to_le_bytes());
        }
        let last = self.data[Self::CELL_COUNT - 1].to_le_bytes();
        let last_start = (Self::CELL_COUNT - 1) * 8;
        out[last_start..].copy_from_slice(&last[..20 - last_start]);

        // XOR the little-endian byte length into the final 8 bytes of the
        // state -- the tail of the circular buffer, not its start.
        let length_bytes = self.length.to_le_bytes();
        let offset = out.len() - length_bytes.len();
        for (i, &lb) in length_bytes.iter().enumerate() {
            out[offset + i] ^= lb;
        }
        out
    }
}

impl Default for QuickXorHash {
    fn default() -> Self {
        Self::new()
    }
}

const STREAM_CHUNK: usize = 64 * 1024;

/// SHA-1 of `data`, as uppercase hex.
#[must_use]
pub fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex_upper(&hasher.finalize())
}

/// SHA-1 of a seekable stream's full contents, as uppercase hex. Leaves the
/// stream positioned at offset zero.
pub fn sha1_hex_stream<R: Read + Seek>(reader: &mut R) -> std::io::Result<String> {
    reader.seek(SeekFrom::Start(0))?;
    let mut hasher = Sha1::new();
    stream_into(reader, |chunk| hasher.update(chunk))?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(hex_upper(&hasher.finalize()))
}

/// SHA-256 of `data`, as uppercase hex.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex_upper(&hasher.finalize())
}

/// SHA-256 of a seekable stream's full contents, as uppercase hex. Leaves
/// the stream positioned at offset zero.
pub fn sha256_hex_stream<R: Read + Seek>(reader: &mut R) -> std::io::Result<String> {
    reader.seek(SeekFrom::Start(0))?;
    let mut hasher = Sha256::new();
    stream_into(reader, |chunk| hasher.update(chunk))?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(hex_upper(&hasher.finalize()))
}

/// quickXorHash of `data`, Base64-encoded.
#[must_use]
pub fn quick_xor_base64(data: &[u8]) -> String {
    let mut hasher = QuickXorHash::new();
    hasher.update(data);
    BASE64.encode(hasher.finalize())
}

/// quickXorHash of a seekable stream's full contents, Base64-encoded.
/// Leaves the stream positioned at offset zero.
pub fn quick_xor_base64_stream<R: Read + Seek>(reader: &mut R) -> std::io::Result<String> {
    reader.seek(SeekFrom::Start(0))?;
    let mut hasher = QuickXorHash::new();
    stream_into(reader, |chunk| hasher.update(chunk))?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(BASE64.encode(hasher.finalize()))
}

fn stream_into<R: Read, F: FnMut(&[u8])>(reader: &mut R, mut f: F) -> std::io::Result<()> {
    let mut buf = vec![0u8; STREAM_CHUNK];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        f(&buf[..n]);
    }
    Ok(())
}

fn hex_upper(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(s, "{b:02X}").expect("writing to String never fails");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use std::io::Cursor;

    #[test]
    fn quick_xor_empty_input() {
        // Microsoft's published vector: quickXorHash of zero bytes is 20
        // zero bytes, base64-encoded.
        assert_eq!(quick_xor_base64(b""), "AAAAAAAAAAAAAAAAAAAAAAAAAAA=");
    }

    #[test]
    fn quick_xor_matches_known_vector_for_short_ascii_input() {
        // "abc" -> bytes 0x61 0x62 0x63 XORed in at bit offsets 0, 11, 22,
        // all landing in cell 0 with no carry: byte 0x61 at bits 0-7, 0x62
        // shifted left 11 (0x310), 0x63 shifted left 22 (0x18c0000), XORed
        // together into the first little-endian u64 cell.
        let cell0 = 0x61u64 | (0x62u64 << 11) | (0x63u64 << 22);
        let mut expected = [0u8; 20];
        expected[0..8].copy_from_slice(&cell0.to_le_bytes());
        expected[12] ^= 3; // byte length (3) XORed into the last 8 bytes
        assert_eq!(quick_xor_base64(b"abc"), BASE64.encode(expected));
    }

    /// Directly places each byte at its bit position in the 160-bit
    /// circular buffer (no strided inner loop), so this oracle cannot share
    /// the production implementation's carry bug -- a ground truth for
    /// inputs long enough to wrap past 160 bytes.
    fn quick_xor_reference(data: &[u8]) -> [u8; 20] {
        let mut cells = [0u64; 3];
        for (k, &byte) in data.iter().enumerate() {
            let bit = (k * QuickXorHash::SHIFT_STEP) % QuickXorHash::WIDTH_BITS;
            let cell = bit / 64;
            let offset = bit % 64;
            let bits_in_cell = QuickXorHash::bits_in_cell(cell);
            cells[cell] ^= (byte as u64) << offset;
            if offset + QuickXorHash::SHIFT_STEP > bits_in_cell {
                let next = (cell + 1) % QuickXorHash::CELL_COUNT;
                cells[next] ^= (byte as u64) >> (bits_in_cell - offset);
            }
        }
        let mut out = [0u8; 20];
        out[0..8].copy_from_slice(&cells[0].to_le_bytes());
        out[8..16].copy_from_slice(&cells[1].to_le_bytes());
        out[16..20].copy_from_slice(&cells[2].to_le_bytes()[..4]);
        let len_bytes = (data.len() as u64).to_le_bytes();
        for (i, b) in len_bytes.iter().enumerate() {
            out[12 + i] ^= b;
        }
        out
    }

    #[test]
    fn quick_xor_matches_direct_bit_placement_past_one_stride_width() {
        // 200 bytes: more than WIDTH_BITS (160), so several byte positions
        // get XORed twice across the stride -- exactly the case where a
        // carry that only folds the first strided byte instead of every
        // one of them would silently drop bits and diverge from this
        // direct, non-strided placement of each byte.
        let data: Vec<u8> = (0..200u32).map(|i| (i % 256) as u8).collect();
        assert_eq!(
            quick_xor_base64(&data),
            BASE64.encode(quick_xor_reference(&data))
        );
    }

    #[test]
    fn buffer_and_stream_hashes_agree() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(100);
        let mut cursor = Cursor::new(data.clone());

        assert_eq!(sha1_hex(&data), sha1_hex_stream(&mut cursor).unwrap());
        assert_eq!(sha256_hex(&data), sha256_hex_stream(&mut cursor).unwrap());
        assert_eq!(
            quick_xor_base64(&data),
            quick_xor_base64_stream(&mut cursor).unwrap()
        );
    }

    #[test]
    fn streaming_hash_leaves_cursor_at_start() {
        let data = vec![7u8; 200_000];
        let mut cursor = Cursor::new(data);
        cursor.set_position(12345);

        quick_xor_base64_stream(&mut cursor).unwrap();
        assert_eq!(cursor.position(), 0);

        cursor.set_position(42);
        sha256_hex_stream(&mut cursor).unwrap();
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn different_content_produces_different_hashes() {
        assert_ne!(quick_xor_base64(b"abc"), quick_xor_base64(b"abd"));
        assert_ne!(sha1_hex(b"abc"), sha1_hex(b"abd"));
        assert_ne!(sha256_hex(b"abc"), sha256_hex(b"abd"));
    }

    #[test]
    fn chunked_updates_match_a_single_call() {
        // The cell/offset carried across `update()` calls must land each
        // byte identically to a single bulk call, including across a cell
        // boundary (64 bits in) and the 160-bit wraparound.
        let data: Vec<u8> = (0..500u32).map(|i| (i % 251) as u8).collect();

        let mut whole = QuickXorHash::new();
        whole.update(&data);

        let mut chunked = QuickXorHash::new();
        for chunk in [&data[..1], &data[1..7], &data[7..64], &data[64..159], &data[159..]] {
            chunked.update(chunk);
        }

        assert_eq!(whole.finalize(), chunked.finalize());
    }

    #[test]
    fn input_longer_than_width_wraps_the_bit_position() {
        let short = vec![3u8; 160];
        let long = vec![3u8; 320];
        assert_ne!(quick_xor_base64(&short), quick_xor_base64(&long));
    }
}
