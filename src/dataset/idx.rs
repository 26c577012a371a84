//! IDX file parsing
//!
//! EMNIST ships its images and labels in the IDX format used by MNIST: a
//! big-endian header (magic number, item count, then dimensions) followed by
//! raw `u8` payload. EMNIST glyphs are stored column-major, so images are
//! transposed on read.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use crate::utils::error::{RecognizerError, Result};

/// Magic number of an unsigned-byte, 3-dimensional IDX file
pub const IMAGES_MAGIC: u32 = 0x0000_0803;

/// Magic number of an unsigned-byte, 1-dimensional IDX file
pub const LABELS_MAGIC: u32 = 0x0000_0801;

/// Decoded IDX image file
#[derive(Debug, Clone)]
pub struct IdxImages {
    pub count: usize,
    pub rows: usize,
    pub cols: usize,
    /// Row-major pixels, `count * rows * cols` bytes
    pub pixels: Vec<u8>,
}

fn read_u32<R: Read>(reader: &mut R, what: &str) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader
        .read_exact(&mut buf)
        .map_err(|e| RecognizerError::Dataset(format!("Truncated IDX header ({what}): {e}")))?;
    Ok(u32::from_be_bytes(buf))
}

fn expect_magic<R: Read>(reader: &mut R, expected: u32) -> Result<()> {
    let magic = read_u32(reader, "magic")?;
    if magic != expected {
        return Err(RecognizerError::Dataset(format!(
            "Bad IDX magic number {magic:#010x}, expected {expected:#010x}"
        )));
    }
    Ok(())
}

/// Read exactly `len` bytes; the buffer grows with the data actually present
fn read_payload<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    reader
        .take(len as u64)
        .read_to_end(&mut payload)
        .map_err(|e| RecognizerError::Dataset(format!("Unreadable IDX payload: {e}")))?;
    if payload.len() != len {
        return Err(RecognizerError::Dataset(format!(
            "Truncated IDX payload, expected {len} bytes, got {}",
            payload.len()
        )));
    }
    Ok(payload)
}

/// Read an IDX image file, transposing every glyph to row-major order
pub fn read_idx_images<R: Read>(mut reader: R) -> Result<IdxImages> {
    expect_magic(&mut reader, IMAGES_MAGIC)?;
    let count = read_u32(&mut reader, "count")? as usize;
    let rows = read_u32(&mut reader, "rows")? as usize;
    let cols = read_u32(&mut reader, "cols")? as usize;

    if rows == 0 || cols == 0 {
        return Err(RecognizerError::Dataset(format!(
            "IDX images have zero-sized glyphs ({rows}x{cols})"
        )));
    }
    let glyph = rows
        .checked_mul(cols)
        .ok_or_else(|| RecognizerError::Dataset(format!("IDX glyph size {rows}x{cols} overflows")))?;
    let len = count.checked_mul(glyph).ok_or_else(|| {
        RecognizerError::Dataset(format!("IDX payload size {count}x{rows}x{cols} overflows"))
    })?;

    let raw = read_payload(&mut reader, len)?;

    // stored glyphs are [col][row]
    let mut pixels = vec![0u8; raw.len()];
    for (n, chunk) in raw.chunks_exact(glyph).enumerate() {
        let out = &mut pixels[n * glyph..(n + 1) * glyph];
        for c in 0..cols {
            for r in 0..rows {
                out[r * cols + c] = chunk[c * rows + r];
            }
        }
    }

    Ok(IdxImages {
        count,
        rows,
        cols,
        pixels,
    })
}

/// Read an IDX label file
pub fn read_idx_labels<R: Read>(mut reader: R) -> Result<Vec<u8>> {
    expect_magic(&mut reader, LABELS_MAGIC)?;
    let count = read_u32(&mut reader, "count")? as usize;
    read_payload(&mut reader, count)
}

/// Resolve `name` inside `dir`, preferring the uncompressed file over `name.gz`
pub fn locate(dir: &Path, name: &str) -> Result<PathBuf> {
    let plain = dir.join(name);
    if plain.exists() {
        return Ok(plain);
    }
    let gz = dir.join(format!("{name}.gz"));
    if gz.exists() {
        return Ok(gz);
    }
    Err(RecognizerError::PathNotFound(plain))
}

/// Open a file for reading, decompressing on the fly when it ends in `.gz`
pub fn open(path: &Path) -> Result<Box<dyn Read>> {
    let file = BufReader::new(File::open(path)?);
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    use flate2::write::GzEncoder;
    use flate2::Compression;

    /// Encode glyphs (row-major) as an EMNIST-style column-major IDX file
    pub(crate) fn encode_images(glyphs: &[Vec<u8>], rows: usize, cols: usize) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&IMAGES_MAGIC.to_be_bytes());
        out.extend_from_slice(&(glyphs.len() as u32).to_be_bytes());
        out.extend_from_slice(&(rows as u32).to_be_bytes());
        out.extend_from_slice(&(cols as u32).to_be_bytes());
        for glyph in glyphs {
            for c in 0..cols {
                for r in 0..rows {
                    out.push(glyph[r * cols + c]);
                }
            }
        }
        out
    }

    pub(crate) fn encode_labels(labels: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&LABELS_MAGIC.to_be_bytes());
        out.extend_from_slice(&(labels.len() as u32).to_be_bytes());
        out.extend_from_slice(labels);
        out
    }

    #[test]
    fn test_images_are_transposed() {
        // 2x3 glyph, row-major 0..6
        let glyph: Vec<u8> = (0..6).collect();
        let bytes = encode_images(&[glyph.clone()], 2, 3);

        let images = read_idx_images(Cursor::new(bytes)).unwrap();
        assert_eq!((images.count, images.rows, images.cols), (1, 2, 3));
        assert_eq!(images.pixels, glyph);
    }

    #[test]
    fn test_bad_magic_is_rejected() {
        let bytes = encode_labels(&[1, 2, 3]);
        let err = read_idx_images(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, RecognizerError::Dataset(_)));
    }

    fn image_header(count: u32, rows: u32, cols: u32) -> Vec<u8> {
        [IMAGES_MAGIC, count, rows, cols]
            .iter()
            .flat_map(|v| v.to_be_bytes())
            .collect()
    }

    #[test]
    fn test_zero_sized_glyphs_are_rejected() {
        let mut bytes = image_header(1, 0, 28);
        bytes.extend_from_slice(&[0; 28]);
        let err = read_idx_images(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, RecognizerError::Dataset(_)));

        let err = read_idx_images(Cursor::new(image_header(1, 28, 0))).unwrap_err();
        assert!(matches!(err, RecognizerError::Dataset(_)));
    }

    #[test]
    fn test_oversized_header_is_rejected() {
        let bytes = image_header(u32::MAX, u32::MAX, u32::MAX);
        let err = read_idx_images(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, RecognizerError::Dataset(_)));
    }

    #[test]
    fn test_header_count_larger_than_payload() {
        // 1000 glyphs announced, one present
        let mut bytes = image_header(1000, 28, 28);
        bytes.extend_from_slice(&[0; 28 * 28]);
        let err = read_idx_images(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, RecognizerError::Dataset(_)));

        let mut labels = Vec::new();
        labels.extend_from_slice(&LABELS_MAGIC.to_be_bytes());
        labels.extend_from_slice(&u32::MAX.to_be_bytes());
        labels.extend_from_slice(&[1, 2]);
        let err = read_idx_labels(Cursor::new(labels)).unwrap_err();
        assert!(matches!(err, RecognizerError::Dataset(_)));
    }

    #[test]
    fn test_truncated_payload_is_rejected() {
        let mut bytes = encode_labels(&[1, 2, 3, 4]);
        bytes.truncate(bytes.len() - 2);
        assert!(read_idx_labels(Cursor::new(bytes)).is_err());
    }

    #[test]
    fn test_open_reads_gzip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("labels-idx1-ubyte.gz");

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&encode_labels(&[7, 8])).unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let found = locate(dir.path(), "labels-idx1-ubyte").unwrap();
        assert_eq!(found, path);
        let labels = read_idx_labels(open(&found).unwrap()).unwrap();
        assert_eq!(labels, vec![7, 8]);
    }
}
