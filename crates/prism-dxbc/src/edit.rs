//! Container editing.
//!
//! Editing never mutates the source container: every operation serializes a
//! fresh buffer with the chunk offset table, `total_size` and `chunk_count`
//! recomputed for the new layout, and the digest field re-hashed before the
//! buffer is returned. Chunks the edit does not touch are carried over
//! byte-for-byte, unexamined.

use crate::container::{DxbcFile, DXBC_HEADER_LEN};
use crate::error::DxbcError;
use crate::fourcc::FourCC;
use crate::hash::update_checksum;

/// Debug-info chunk tags removed by [`strip_debug_chunks`].
pub const DEBUG_CHUNK_TAGS: [FourCC; 5] = [
    FourCC::SDBG,
    FourCC::SPDB,
    FourCC::ILDB,
    FourCC::ILDN,
    FourCC::STAT,
];

/// Serializes `chunks` into a fresh container with a correct offset table,
/// sizes and digest.
fn rebuild(version: u32, chunks: &[(FourCC, &[u8])]) -> Result<Vec<u8>, DxbcError> {
    let chunk_count = u32::try_from(chunks.len())
        .map_err(|_| DxbcError::malformed_offsets("chunk count does not fit in u32"))?;

    let table_len = chunks.len() * 4;
    let body_len: usize = chunks.iter().map(|(_, data)| 8 + data.len()).sum();
    let total = DXBC_HEADER_LEN + table_len + body_len;
    let total_size = u32::try_from(total)
        .map_err(|_| DxbcError::malformed_offsets("container size does not fit in u32"))?;

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&FourCC::DXBC.0);
    out.extend_from_slice(&[0u8; 16]); // digest, filled in below
    out.extend_from_slice(&version.to_le_bytes());
    out.extend_from_slice(&total_size.to_le_bytes());
    out.extend_from_slice(&chunk_count.to_le_bytes());

    let mut offset = DXBC_HEADER_LEN + table_len;
    for (_, data) in chunks {
        out.extend_from_slice(&(offset as u32).to_le_bytes());
        offset += 8 + data.len();
    }

    for (fourcc, data) in chunks {
        let size = u32::try_from(data.len())
            .map_err(|_| DxbcError::malformed_offsets("chunk size does not fit in u32"))?;
        out.extend_from_slice(&fourcc.0);
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(data);
    }

    debug_assert_eq!(out.len(), total);
    update_checksum(&mut out);
    Ok(out)
}

/// Returns a new container with `payload` appended as a chunk tagged
/// `fourcc`, after all existing chunks.
pub fn insert_chunk(
    file: &DxbcFile<'_>,
    fourcc: FourCC,
    payload: &[u8],
) -> Result<Vec<u8>, DxbcError> {
    let mut chunks: Vec<(FourCC, &[u8])> =
        file.chunks().map(|chunk| (chunk.fourcc, chunk.data)).collect();
    chunks.push((fourcc, payload));
    rebuild(file.header().version, &chunks)
}

/// Returns a new container with the payload of the first chunk tagged
/// `fourcc` replaced by `payload`. Fails if no such chunk exists.
pub fn replace_chunk(
    file: &DxbcFile<'_>,
    fourcc: FourCC,
    payload: &[u8],
) -> Result<Vec<u8>, DxbcError> {
    let mut chunks: Vec<(FourCC, &[u8])> =
        file.chunks().map(|chunk| (chunk.fourcc, chunk.data)).collect();

    let slot = chunks
        .iter_mut()
        .find(|(tag, _)| *tag == fourcc)
        .ok_or_else(|| {
            DxbcError::invalid_chunk(format!("cannot replace {fourcc}: no such chunk"))
        })?;
    slot.1 = payload;

    rebuild(file.header().version, &chunks)
}

/// Returns a new container with every chunk tagged `fourcc` removed.
/// Stripping a tag that is not present is a no-op rebuild.
pub fn strip_chunk(file: &DxbcFile<'_>, fourcc: FourCC) -> Result<Vec<u8>, DxbcError> {
    let chunks: Vec<(FourCC, &[u8])> = file
        .chunks()
        .filter(|chunk| chunk.fourcc != fourcc)
        .map(|chunk| (chunk.fourcc, chunk.data))
        .collect();
    rebuild(file.header().version, &chunks)
}

/// Returns a new container with all known debug-info chunks removed
/// (see [`DEBUG_CHUNK_TAGS`]).
pub fn strip_debug_chunks(file: &DxbcFile<'_>) -> Result<Vec<u8>, DxbcError> {
    let chunks: Vec<(FourCC, &[u8])> = file
        .chunks()
        .filter(|chunk| !DEBUG_CHUNK_TAGS.contains(&chunk.fourcc))
        .map(|chunk| (chunk.fourcc, chunk.data))
        .collect();
    rebuild(file.header().version, &chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{checksum, verify_checksum};
    use crate::test_utils::build_container;

    fn two_chunk_file() -> Vec<u8> {
        build_container(&[
            (FourCC::ISGN, &[1u8, 2, 3, 4, 5, 6, 7, 8]),
            (FourCC::SHEX, &[9u8, 10, 11, 12]),
        ])
    }

    #[test]
    fn replace_reoffsets_and_rehashes() {
        let bytes = two_chunk_file();
        let file = DxbcFile::parse(&bytes).unwrap();

        // Grow the first chunk so everything after it shifts.
        let new_payload = [0u8; 24];
        let edited = replace_chunk(&file, FourCC::ISGN, &new_payload).unwrap();

        let reparsed = DxbcFile::parse(&edited).unwrap();
        assert_eq!(reparsed.header().chunk_count, 2);
        assert_eq!(reparsed.find_chunk(FourCC::ISGN), Some(&new_payload[..]));
        assert_eq!(
            reparsed.find_chunk(FourCC::SHEX),
            Some(&[9u8, 10, 11, 12][..])
        );

        // The stored digest matches an independent re-hash of the new buffer.
        assert_eq!(reparsed.header().digest, checksum(&edited));
        assert!(verify_checksum(&edited));
    }

    #[test]
    fn replace_missing_chunk_fails() {
        let bytes = two_chunk_file();
        let file = DxbcFile::parse(&bytes).unwrap();
        assert!(replace_chunk(&file, FourCC::RDEF, &[]).is_err());
    }

    #[test]
    fn insert_appends_and_preserves_existing() {
        let bytes = two_chunk_file();
        let file = DxbcFile::parse(&bytes).unwrap();

        let edited = insert_chunk(&file, FourCC::PRIV, &[0xaa, 0xbb]).unwrap();
        let reparsed = DxbcFile::parse(&edited).unwrap();

        assert_eq!(reparsed.header().chunk_count, 3);
        let tags: Vec<FourCC> = reparsed.chunks().map(|c| c.fourcc).collect();
        assert_eq!(tags, vec![FourCC::ISGN, FourCC::SHEX, FourCC::PRIV]);
        assert!(verify_checksum(&edited));
    }

    #[test]
    fn strip_removes_all_matching() {
        let bytes = build_container(&[
            (FourCC::SPDB, &[0u8; 6]),
            (FourCC::SHEX, &[1u8; 4]),
            (FourCC::SPDB, &[2u8; 2]),
        ]);
        let file = DxbcFile::parse(&bytes).unwrap();

        let edited = strip_chunk(&file, FourCC::SPDB).unwrap();
        let reparsed = DxbcFile::parse(&edited).unwrap();
        assert_eq!(reparsed.header().chunk_count, 1);
        assert!(reparsed.find_chunk(FourCC::SPDB).is_none());
        assert!(verify_checksum(&edited));
    }

    #[test]
    fn strip_debug_chunks_removes_known_tags_only() {
        let bytes = build_container(&[
            (FourCC::RDEF, &[0u8; 4]),
            (FourCC::STAT, &[0u8; 8]),
            (FourCC::SDBG, &[0u8; 8]),
            (FourCC::SHEX, &[0u8; 4]),
        ]);
        let file = DxbcFile::parse(&bytes).unwrap();

        let edited = strip_debug_chunks(&file).unwrap();
        let reparsed = DxbcFile::parse(&edited).unwrap();
        let tags: Vec<FourCC> = reparsed.chunks().map(|c| c.fourcc).collect();
        assert_eq!(tags, vec![FourCC::RDEF, FourCC::SHEX]);
    }

    #[test]
    fn identity_rebuild_matches_builder_output() {
        let bytes = two_chunk_file();
        let file = DxbcFile::parse(&bytes).unwrap();
        // Stripping a tag that isn't present rebuilds the same layout.
        let rebuilt = strip_chunk(&file, FourCC::RDEF).unwrap();
        assert_eq!(rebuilt, bytes);
    }
}
