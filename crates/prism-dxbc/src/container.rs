use core::fmt;

use crate::error::DxbcError;
use crate::fourcc::FourCC;
use crate::rdef::{parse_rdef_chunk_with_fourcc, RdefChunk};
use crate::signature::{parse_signature_chunk_with_fourcc, SignatureChunk};

/// magic + digest + version + total_size + chunk_count
pub(crate) const DXBC_HEADER_LEN: usize = 4 + 16 + 4 + 4 + 4;

/// Byte offset of the 16-byte digest field within the header.
pub(crate) const DIGEST_OFFSET: usize = 4;

// Hard cap on chunk count. Real containers hold a handful of chunks; the cap
// bounds offset-table validation work on hostile input.
pub(crate) const MAX_CHUNK_COUNT: u32 = 4096;

/// The fixed header of a `DXBC` container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DxbcHeader {
    /// Must be [`FourCC::DXBC`].
    pub magic: FourCC,
    /// The 128-bit digest stored in the container (see [`crate::hash`]).
    pub digest: [u8; 16],
    /// Container format version; observed as 1.
    pub version: u32,
    /// Declared total size in bytes. Must equal the buffer length.
    pub total_size: u32,
    /// Number of chunk offsets following the header.
    pub chunk_count: u32,
}

/// A single chunk within a `DXBC` container.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct DxbcChunk<'a> {
    /// The chunk identifier.
    pub fourcc: FourCC,
    /// Absolute byte offset of the chunk record (fourcc + size + payload).
    pub offset: usize,
    /// Raw chunk payload bytes.
    pub data: &'a [u8],
}

impl fmt::Debug for DxbcChunk<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DxbcChunk")
            .field("fourcc", &self.fourcc)
            .field("offset", &self.offset)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// A parsed, immutable view of a `DXBC` container.
///
/// Parsing is strict: the declared total size must equal the buffer length and
/// every offset-table entry and chunk span must lie inside the buffer. A
/// container that fails these checks yields no chunks at all, so no later
/// lookup can read out of bounds. Mutation is done through [`crate::edit`],
/// which produces a fresh re-hashed buffer.
#[derive(Debug, Clone)]
pub struct DxbcFile<'a> {
    bytes: &'a [u8],
    header: DxbcHeader,
    chunk_offsets: Vec<u32>,
}

impl<'a> DxbcFile<'a> {
    /// Parses a `DXBC` container from untrusted `bytes`.
    pub fn parse(bytes: &'a [u8]) -> Result<DxbcFile<'a>, DxbcError> {
        if bytes.len() < DXBC_HEADER_LEN {
            return Err(DxbcError::malformed_header(format!(
                "need at least {DXBC_HEADER_LEN} bytes, got {}",
                bytes.len()
            )));
        }

        let magic = read_fourcc(bytes, 0)?;
        if magic != FourCC::DXBC {
            return Err(DxbcError::malformed_header(format!(
                "bad magic {magic:?}, expected {:?}",
                FourCC::DXBC
            )));
        }

        let digest = read_array_16(bytes, DIGEST_OFFSET)?;
        let version = read_u32_le(bytes, 20)?;
        let total_size = read_u32_le(bytes, 24)?;
        let chunk_count = read_u32_le(bytes, 28)?;

        if total_size as usize != bytes.len() {
            return Err(DxbcError::malformed_header(format!(
                "declared total_size {total_size} does not match buffer length {}",
                bytes.len()
            )));
        }
        if chunk_count > MAX_CHUNK_COUNT {
            return Err(DxbcError::malformed_offsets(format!(
                "chunk_count {chunk_count} exceeds maximum {MAX_CHUNK_COUNT}"
            )));
        }

        let table_len = chunk_count as usize * 4;
        let table_end = DXBC_HEADER_LEN
            .checked_add(table_len)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| {
                DxbcError::malformed_offsets(format!(
                    "chunk offset table for {chunk_count} chunks does not fit in {} bytes",
                    bytes.len()
                ))
            })?;

        let mut chunk_offsets = Vec::with_capacity(chunk_count as usize);
        for i in 0..chunk_count as usize {
            let offset = read_u32_le(bytes, DXBC_HEADER_LEN + i * 4)?;
            let offset_usize = offset as usize;

            if offset_usize < table_end {
                return Err(DxbcError::malformed_offsets(format!(
                    "chunk {i} offset {offset} points into the header/offset table (..{table_end})"
                )));
            }

            let data_len = read_u32_le(bytes, offset_usize.checked_add(4).ok_or_else(|| {
                DxbcError::malformed_offsets(format!("chunk {i} offset {offset} overflows"))
            })?)
            .map_err(|e| {
                DxbcError::malformed_offsets(format!(
                    "chunk {i} header at {offset}: {}",
                    e.context()
                ))
            })? as usize;

            let data_end = offset_usize
                .checked_add(8)
                .and_then(|start| start.checked_add(data_len))
                .ok_or_else(|| {
                    DxbcError::malformed_offsets(format!(
                        "chunk {i} size {data_len} overflows when computing data range"
                    ))
                })?;
            if data_end > bytes.len() {
                let fourcc = read_fourcc(bytes, offset_usize)?;
                return Err(DxbcError::out_of_bounds(format!(
                    "chunk {i} ({fourcc}) spans {offset}..{data_end}, outside total_size {total_size}"
                )));
            }

            chunk_offsets.push(offset);
        }

        Ok(DxbcFile {
            bytes,
            header: DxbcHeader {
                magic,
                digest,
                version,
                total_size,
                chunk_count,
            },
            chunk_offsets,
        })
    }

    /// Returns the parsed container header.
    pub fn header(&self) -> &DxbcHeader {
        &self.header
    }

    /// Returns the full container bytes.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Iterates over all chunks in offset-table order.
    pub fn chunks(&self) -> impl Iterator<Item = DxbcChunk<'a>> + '_ {
        let bytes = self.bytes;
        self.chunk_offsets.iter().filter_map(move |&offset| {
            let offset = offset as usize;
            let header = bytes.get(offset..offset + 8)?;
            let fourcc = FourCC([header[0], header[1], header[2], header[3]]);
            let size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
            let data = bytes.get(offset + 8..offset + 8 + size)?;
            Some(DxbcChunk {
                fourcc,
                offset,
                data,
            })
        })
    }

    /// Returns the first chunk matching `fourcc`, if any.
    pub fn get_chunk(&self, fourcc: FourCC) -> Option<DxbcChunk<'a>> {
        self.chunks().find(|chunk| chunk.fourcc == fourcc)
    }

    /// Iterates over all chunks matching `fourcc`, in offset-table order.
    pub fn get_chunks(&self, fourcc: FourCC) -> impl Iterator<Item = DxbcChunk<'a>> + '_ {
        self.chunks().filter(move |chunk| chunk.fourcc == fourcc)
    }

    /// Returns the payload of the first chunk matching `fourcc`, if any.
    pub fn find_chunk(&self, fourcc: FourCC) -> Option<&'a [u8]> {
        self.get_chunk(fourcc).map(|chunk| chunk.data)
    }

    /// Returns and parses the first signature chunk matching `kind`, if any.
    ///
    /// Signature tags come in several generational variants with identical
    /// meaning (`ISGN`/`ISG1`, `OSGN`/`OSG5`/`OSG1`, `PCSG`/`PSG1`/`PCG1`).
    /// Chunks with the exact requested tag are tried first, in file order; if
    /// none parses, the known variants are tried the same way. `None` is
    /// returned only when no tag of the family is present.
    pub fn get_signature(&self, kind: FourCC) -> Option<Result<SignatureChunk, DxbcError>> {
        let fallbacks: &[FourCC] = match kind {
            FourCC::ISGN => &[FourCC::ISG1],
            FourCC::ISG1 => &[FourCC::ISGN],
            FourCC::OSGN => &[FourCC::OSG5, FourCC::OSG1],
            FourCC::OSG5 => &[FourCC::OSGN, FourCC::OSG1],
            FourCC::OSG1 => &[FourCC::OSG5, FourCC::OSGN],
            FourCC::PCSG => &[FourCC::PSG1, FourCC::PCG1],
            FourCC::PSG1 | FourCC::PCG1 => &[FourCC::PCSG],
            _ => &[],
        };

        let mut first_err = None;
        for &tag in core::iter::once(&kind).chain(fallbacks) {
            for chunk in self.get_chunks(tag) {
                match parse_signature_chunk_with_fourcc(chunk.fourcc, chunk.data).map_err(|e| {
                    DxbcError::invalid_chunk(format!(
                        "{} signature chunk: {}",
                        chunk.fourcc,
                        e.context()
                    ))
                }) {
                    Ok(sig) => return Some(Ok(sig)),
                    Err(err) => first_err.get_or_insert(err),
                };
            }
        }
        first_err.map(Err)
    }

    /// Returns and parses the first resource definition chunk, if any.
    ///
    /// Tries `RDEF` chunks in file order, then the alternate `RD11` tag.
    /// Malformed chunks are skipped in favor of a later well-formed one.
    pub fn get_rdef(&self) -> Option<Result<RdefChunk, DxbcError>> {
        let mut first_err = None;
        for tag in [FourCC::RDEF, FourCC::RD11] {
            for chunk in self.get_chunks(tag) {
                match parse_rdef_chunk_with_fourcc(chunk.fourcc, chunk.data).map_err(|e| {
                    DxbcError::invalid_chunk(format!("{} chunk: {}", chunk.fourcc, e.context()))
                }) {
                    Ok(rdef) => return Some(Ok(rdef)),
                    Err(err) => first_err.get_or_insert(err),
                };
            }
        }
        first_err.map(Err)
    }

    /// Returns the first shader bytecode chunk (`SHEX` preferred over `SHDR`).
    pub fn find_shader_chunk(&self) -> Option<DxbcChunk<'a>> {
        self.get_chunk(FourCC::SHEX)
            .or_else(|| self.get_chunk(FourCC::SHDR))
    }

    /// Returns `(program_type, major, minor)` from the bytecode version token,
    /// if a shader chunk is present and long enough.
    pub fn shader_model(&self) -> Option<(u16, u8, u8)> {
        let chunk = self.find_shader_chunk()?;
        let version = read_u32_le(chunk.data, 0).ok()?;
        Some((
            (version >> 16) as u16,
            ((version >> 4) & 0xf) as u8,
            (version & 0xf) as u8,
        ))
    }

    /// Returns `true` if the stored digest matches a fresh hash of the
    /// container bytes.
    pub fn digest_matches(&self) -> bool {
        crate::hash::checksum(self.bytes) == self.header.digest
    }

    /// Returns a human-readable summary of the container and its chunks.
    pub fn debug_summary(&self) -> String {
        use core::fmt::Write as _;
        let mut out = String::new();

        let _ = write!(
            &mut out,
            "{} total_size={} chunk_count={}",
            self.header.magic, self.header.total_size, self.header.chunk_count
        );
        for (idx, chunk) in self.chunks().enumerate() {
            let _ = write!(
                &mut out,
                "\n  [{idx:02}] {} {} bytes at {}",
                chunk.fourcc,
                chunk.data.len(),
                chunk.offset
            );
        }
        out
    }
}

pub(crate) fn read_u32_le(bytes: &[u8], offset: usize) -> Result<u32, DxbcError> {
    let end = offset
        .checked_add(4)
        .ok_or_else(|| DxbcError::out_of_bounds("offset overflows when reading u32"))?;
    let slice = bytes.get(offset..end).ok_or_else(|| {
        DxbcError::out_of_bounds(format!(
            "need 4 bytes at {offset}..{end}, but buffer length is {}",
            bytes.len()
        ))
    })?;
    Ok(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

pub(crate) fn read_fourcc(bytes: &[u8], offset: usize) -> Result<FourCC, DxbcError> {
    read_u32_le(bytes, offset).map(|v| FourCC(v.to_le_bytes()))
}

pub(crate) fn read_array_16(bytes: &[u8], offset: usize) -> Result<[u8; 16], DxbcError> {
    let end = offset
        .checked_add(16)
        .ok_or_else(|| DxbcError::out_of_bounds("offset overflows when reading digest"))?;
    let slice = bytes.get(offset..end).ok_or_else(|| {
        DxbcError::out_of_bounds(format!(
            "need 16 bytes at {offset}..{end}, but buffer length is {}",
            bytes.len()
        ))
    })?;
    let mut out = [0u8; 16];
    out.copy_from_slice(slice);
    Ok(out)
}

/// Reads a NUL-terminated UTF-8 string starting at `offset`.
pub(crate) fn read_cstring(bytes: &[u8], offset: usize) -> Result<String, DxbcError> {
    let tail = bytes.get(offset..).ok_or_else(|| {
        DxbcError::out_of_bounds(format!(
            "string offset {offset} is outside buffer of length {}",
            bytes.len()
        ))
    })?;
    let len = tail.iter().position(|&b| b == 0).ok_or_else(|| {
        DxbcError::invalid_chunk(format!("string at {offset} is not NUL-terminated"))
    })?;
    core::str::from_utf8(&tail[..len])
        .map(str::to_owned)
        .map_err(|_| DxbcError::invalid_chunk(format!("string at {offset} is not valid UTF-8")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::build_container;

    #[test]
    fn parse_validates_magic_and_size() {
        let bytes = build_container(&[(FourCC::SHEX, &[1, 2, 3, 4])]);
        let file = DxbcFile::parse(&bytes).expect("built container should parse");
        assert_eq!(file.header().magic, FourCC::DXBC);
        assert_eq!(file.header().total_size as usize, bytes.len());
        assert_eq!(file.header().chunk_count, 1);
        assert_eq!(file.find_chunk(FourCC::SHEX), Some(&[1u8, 2, 3, 4][..]));

        let mut bad_magic = bytes.clone();
        bad_magic[0] = b'X';
        assert!(DxbcFile::parse(&bad_magic).is_err());

        let mut bad_size = bytes.clone();
        bad_size[24] ^= 0xff;
        assert!(DxbcFile::parse(&bad_size).is_err());
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let bytes = build_container(&[(FourCC::SHEX, &[0u8; 16])]);
        assert!(DxbcFile::parse(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn chunk_offset_into_header_is_rejected() {
        let mut bytes = build_container(&[(FourCC::SHEX, &[0u8; 8])]);
        // Point chunk 0 back into the header.
        bytes[DXBC_HEADER_LEN..DXBC_HEADER_LEN + 4].copy_from_slice(&4u32.to_le_bytes());
        assert!(matches!(
            DxbcFile::parse(&bytes),
            Err(DxbcError::MalformedOffsets(_))
        ));
    }

    #[test]
    fn chunk_span_past_end_is_rejected() {
        let mut bytes = build_container(&[(FourCC::SHEX, &[0u8; 8])]);
        // Inflate the chunk's declared size so its span leaves the buffer.
        let chunk_offset = DXBC_HEADER_LEN + 4;
        bytes[chunk_offset + 4..chunk_offset + 8].copy_from_slice(&0x1000u32.to_le_bytes());
        assert!(matches!(
            DxbcFile::parse(&bytes),
            Err(DxbcError::OutOfBounds(_))
        ));
    }

    #[test]
    fn all_chunk_spans_account_for_total_size() {
        let bytes = build_container(&[
            (FourCC::RDEF, &[0u8; 12]),
            (FourCC::ISGN, &[0u8; 20]),
            (FourCC::SHEX, &[0u8; 8]),
        ]);
        let file = DxbcFile::parse(&bytes).unwrap();

        let table_end = DXBC_HEADER_LEN + 4 * file.header().chunk_count as usize;
        let mut accounted = table_end;
        for chunk in file.chunks() {
            assert_eq!(chunk.offset, accounted);
            assert!(chunk.offset + 8 + chunk.data.len() <= bytes.len());
            accounted += 8 + chunk.data.len();
        }
        assert_eq!(accounted, file.header().total_size as usize);
    }

    #[test]
    fn unknown_tags_pass_through() {
        let bytes = build_container(&[(FourCC(*b"ZZZZ"), &[0xde, 0xad])]);
        let file = DxbcFile::parse(&bytes).unwrap();
        assert_eq!(file.find_chunk(FourCC(*b"ZZZZ")), Some(&[0xde, 0xad][..]));
    }

    #[test]
    fn shader_model_reads_version_token() {
        // ps_5_0 version token.
        let version: u32 = 0x5 << 4;
        let mut shader = version.to_le_bytes().to_vec();
        shader.extend_from_slice(&2u32.to_le_bytes());
        let bytes = build_container(&[(FourCC::SHEX, &shader)]);
        let file = DxbcFile::parse(&bytes).unwrap();
        assert_eq!(file.shader_model(), Some((0, 5, 0)));
    }
}
