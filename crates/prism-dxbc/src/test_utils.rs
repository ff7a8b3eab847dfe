use crate::fourcc::FourCC;
use crate::hash::update_checksum;

/// Builds a minimal `DXBC` container containing the provided chunks.
///
/// The resulting blob has a valid header (magic, digest, version 1,
/// `total_size`, chunk count), a correct chunk offset table, and a digest
/// computed with the container hash, so parsing, editing and verification
/// all treat it as a well-formed container.
pub fn build_container(chunks: &[(FourCC, &[u8])]) -> Vec<u8> {
    let header_size = 4 + 16 + 4 + 4 + 4 + 4 * chunks.len();
    let body_size = chunks.iter().map(|(_, data)| 8 + data.len()).sum::<usize>();

    let mut out = Vec::with_capacity(header_size + body_size);

    out.extend_from_slice(&FourCC::DXBC.0);
    out.extend_from_slice(&[0u8; 16]); // digest, filled in at the end
    out.extend_from_slice(&1u32.to_le_bytes()); // version
    let total_size =
        u32::try_from(header_size + body_size).expect("container size does not fit in u32");
    out.extend_from_slice(&total_size.to_le_bytes());

    let chunk_count = u32::try_from(chunks.len()).expect("chunk count does not fit in u32");
    out.extend_from_slice(&chunk_count.to_le_bytes());

    let mut offset = header_size;
    for (_, data) in chunks {
        out.extend_from_slice(&(offset as u32).to_le_bytes());
        offset += 8 + data.len();
    }

    for (fourcc, data) in chunks {
        let size = u32::try_from(data.len()).expect("chunk size does not fit in u32");
        out.extend_from_slice(&fourcc.0);
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(data);
    }

    update_checksum(&mut out);
    out
}

/// Serializes one signature element table with 24-byte records under the
/// classic layout (`ISGN`/`OSGN`/`PCSG`).
///
/// `elements` entries are `(semantic_name, semantic_index, system_value,
/// component_type, register, mask, rw_mask)`.
pub fn build_signature_chunk(elements: &[(&str, u32, u32, u32, u32, u8, u8)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(elements.len() as u32).to_le_bytes());
    out.extend_from_slice(&8u32.to_le_bytes()); // element table offset

    // Names land after the element table.
    let mut name_offset = 8 + elements.len() * 24;
    for &(name, semantic_index, system_value, component_type, register, mask, rw_mask) in elements
    {
        out.extend_from_slice(&(name_offset as u32).to_le_bytes());
        out.extend_from_slice(&semantic_index.to_le_bytes());
        out.extend_from_slice(&system_value.to_le_bytes());
        out.extend_from_slice(&component_type.to_le_bytes());
        out.extend_from_slice(&register.to_le_bytes());
        out.push(mask);
        out.push(rw_mask);
        out.extend_from_slice(&[0u8, 0]); // padding
        name_offset += name.len() + 1;
    }
    for &(name, ..) in elements {
        out.extend_from_slice(name.as_bytes());
        out.push(0);
    }
    out
}
