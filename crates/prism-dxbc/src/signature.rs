use crate::container::{read_cstring, read_u32_le};
use crate::error::DxbcError;
use crate::fourcc::FourCC;

/// count + element table offset
const SIGNATURE_HEADER_LEN: usize = 8;

/// Classic record layout (`ISGN`/`OSGN`/`PCSG`).
const ELEMENT_LEN_V0: usize = 24;
/// Stream-prefixed layout (`OSG5`).
const ELEMENT_LEN_V5: usize = 28;
/// Stream-prefixed layout with a trailing min-precision dword
/// (`ISG1`/`OSG1`/`PSG1`/`PCG1`). The precision hint is read and discarded.
const ELEMENT_LEN_V1: usize = 32;

/// System-value classification of a signature element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum SystemValue {
    None,
    Position,
    ClipDistance,
    CullDistance,
    RenderTargetIndex,
    ViewportIndex,
    VertexIndex,
    PrimitiveIndex,
    InstanceIndex,
    IsFrontFace,
    SampleIndex,
    QuadEdgeTessFactor,
    QuadInsideTessFactor,
    TriEdgeTessFactor,
    TriInsideTessFactor,
    LineDetailTessFactor,
    LineDensityTessFactor,
    /// Pixel shader color output (`SV_Target`-style).
    ColorOutput,
    DepthOutput,
    DepthGreaterEqualOutput,
    DepthLessEqualOutput,
    CoverageOutput,
    StencilRefOutput,
    /// Unrecognized on-disk value, preserved as-is.
    Other(u32),
}

impl SystemValue {
    fn from_raw(raw: u32) -> SystemValue {
        match raw {
            0 => SystemValue::None,
            1 => SystemValue::Position,
            2 => SystemValue::ClipDistance,
            3 => SystemValue::CullDistance,
            4 => SystemValue::RenderTargetIndex,
            5 => SystemValue::ViewportIndex,
            6 => SystemValue::VertexIndex,
            7 => SystemValue::PrimitiveIndex,
            8 => SystemValue::InstanceIndex,
            9 => SystemValue::IsFrontFace,
            10 => SystemValue::SampleIndex,
            11 => SystemValue::QuadEdgeTessFactor,
            12 => SystemValue::QuadInsideTessFactor,
            13 => SystemValue::TriEdgeTessFactor,
            14 => SystemValue::TriInsideTessFactor,
            15 => SystemValue::LineDetailTessFactor,
            16 => SystemValue::LineDensityTessFactor,
            other => SystemValue::Other(other),
        }
    }

    /// Infers a classification from a well-known `SV_*` semantic name
    /// (case-insensitive). Elements written by older compilers leave the
    /// on-disk field at zero and rely on the name alone.
    pub fn from_semantic_name(name: &str) -> Option<SystemValue> {
        let lower = name.to_ascii_lowercase();
        Some(match lower.as_str() {
            "sv_position" => SystemValue::Position,
            "sv_vertexid" => SystemValue::VertexIndex,
            "sv_instanceid" => SystemValue::InstanceIndex,
            "sv_primitiveid" => SystemValue::PrimitiveIndex,
            "sv_isfrontface" => SystemValue::IsFrontFace,
            "sv_sampleindex" => SystemValue::SampleIndex,
            "sv_clipdistance" => SystemValue::ClipDistance,
            "sv_culldistance" => SystemValue::CullDistance,
            "sv_rendertargetarrayindex" => SystemValue::RenderTargetIndex,
            "sv_viewportarrayindex" => SystemValue::ViewportIndex,
            "sv_coverage" => SystemValue::CoverageOutput,
            "sv_depth" => SystemValue::DepthOutput,
            "sv_depthgreaterequal" => SystemValue::DepthGreaterEqualOutput,
            "sv_depthlessequal" => SystemValue::DepthLessEqualOutput,
            "sv_stencilref" => SystemValue::StencilRefOutput,
            "sv_target" => SystemValue::ColorOutput,
            _ => return None,
        })
    }
}

/// Register component type of a signature element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ComponentType {
    Unknown,
    UInt32,
    SInt32,
    Float32,
    Other(u32),
}

impl ComponentType {
    fn from_raw(raw: u32) -> ComponentType {
        match raw {
            0 => ComponentType::Unknown,
            1 => ComponentType::UInt32,
            2 => ComponentType::SInt32,
            3 => ComponentType::Float32,
            other => ComponentType::Other(other),
        }
    }
}

/// A single parsed signature element.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureElement {
    /// Semantic name (e.g. `POSITION`, `TEXCOORD`).
    pub semantic_name: String,
    /// Semantic index distinguishing elements that share a name.
    pub semantic_index: u32,
    /// `semantic_name` suffixed with the index when
    /// [`needs_semantic_index`](Self::needs_semantic_index) is set,
    /// otherwise just the name.
    pub semantic_index_name: String,
    /// Set when another element in the same signature shares this name.
    pub needs_semantic_index: bool,
    /// Register index this element is bound to.
    pub register: u32,
    /// System-value classification (on-disk, or inferred from the name).
    pub system_value: SystemValue,
    /// Component type of the register.
    pub component_type: ComponentType,
    /// Component mask (bits 0..4 = xyzw).
    pub mask: u8,
    /// Read/write mask: components read (inputs) or never written (outputs).
    pub rw_mask: u8,
    /// Geometry shader stream index (zero for non-stream layouts).
    pub stream: u32,
}

/// A parsed signature chunk: an ordered list of elements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignatureChunk {
    /// Elements in on-disk order.
    pub elements: Vec<SignatureElement>,
}

impl SignatureChunk {
    /// Reclassifies unclassified elements at low register indices as color
    /// outputs.
    ///
    /// Pixel shader output signatures frequently leave `SV_Target`-style
    /// outputs unclassified; anything still unclassified below the render
    /// target cutoff is a color output. Callers apply this only to pixel
    /// shader output signatures.
    pub fn mark_pixel_shader_color_outputs(&mut self) {
        for element in &mut self.elements {
            if element.system_value == SystemValue::None && element.register <= 16 {
                element.system_value = SystemValue::ColorOutput;
            }
        }
    }
}

/// Record layout used by a signature tag.
fn element_len_for(fourcc: FourCC) -> usize {
    match fourcc {
        FourCC::OSG5 => ELEMENT_LEN_V5,
        FourCC::ISG1 | FourCC::OSG1 | FourCC::PSG1 | FourCC::PCG1 => ELEMENT_LEN_V1,
        _ => ELEMENT_LEN_V0,
    }
}

/// Parses a signature chunk whose record layout is implied by `fourcc`.
pub fn parse_signature_chunk_with_fourcc(
    fourcc: FourCC,
    data: &[u8],
) -> Result<SignatureChunk, DxbcError> {
    parse_signature_chunk(data, element_len_for(fourcc))
}

/// Parses a signature chunk with an explicit per-element record length.
pub fn parse_signature_chunk(data: &[u8], element_len: usize) -> Result<SignatureChunk, DxbcError> {
    if data.len() < SIGNATURE_HEADER_LEN {
        return Err(DxbcError::invalid_chunk(format!(
            "signature chunk of {} bytes is smaller than its {SIGNATURE_HEADER_LEN}-byte header",
            data.len()
        )));
    }

    let count = read_u32_le(data, 0)? as usize;
    let table_offset = read_u32_le(data, 4)? as usize;

    let table_len = count.checked_mul(element_len).ok_or_else(|| {
        DxbcError::invalid_chunk("signature element count overflows table size")
    })?;
    let table_end = table_offset.checked_add(table_len).ok_or_else(|| {
        DxbcError::invalid_chunk("signature element table offset overflows")
    })?;
    if table_offset < SIGNATURE_HEADER_LEN || table_end > data.len() {
        return Err(DxbcError::invalid_chunk(format!(
            "signature element table {table_offset}..{table_end} is outside chunk of {} bytes",
            data.len()
        )));
    }

    let has_stream = element_len >= ELEMENT_LEN_V5;

    let mut elements = Vec::with_capacity(count);
    for i in 0..count {
        let mut at = table_offset + i * element_len;

        let stream = if has_stream {
            let stream = read_u32_le(data, at)?;
            at += 4;
            stream
        } else {
            0
        };

        let name_offset = read_u32_le(data, at)? as usize;
        if name_offset < SIGNATURE_HEADER_LEN || name_offset >= data.len() {
            return Err(DxbcError::invalid_chunk(format!(
                "signature element {i} name offset {name_offset} is outside chunk of {} bytes",
                data.len()
            )));
        }
        let semantic_name = read_cstring(data, name_offset)?;

        let semantic_index = read_u32_le(data, at + 4)?;
        let system_value_raw = read_u32_le(data, at + 8)?;
        let component_type = ComponentType::from_raw(read_u32_le(data, at + 12)?);
        let register = read_u32_le(data, at + 16)?;
        let mask_pair = read_u32_le(data, at + 20)?;
        let mask = (mask_pair & 0xff) as u8;
        let rw_mask = ((mask_pair >> 8) & 0xff) as u8;
        // ELEMENT_LEN_V1 carries a trailing min-precision dword; no consumer
        // of this chunk uses it, so it is discarded here.

        let mut system_value = SystemValue::from_raw(system_value_raw);
        if system_value == SystemValue::None {
            if let Some(inferred) = SystemValue::from_semantic_name(&semantic_name) {
                system_value = inferred;
            }
        }

        elements.push(SignatureElement {
            semantic_index_name: semantic_name.clone(),
            semantic_name,
            semantic_index,
            needs_semantic_index: false,
            register,
            system_value,
            component_type,
            mask,
            rw_mask,
            stream,
        });
    }

    disambiguate_semantic_names(&mut elements);

    Ok(SignatureChunk { elements })
}

/// Marks elements whose semantic name collides with another element and
/// gives them an index-suffixed display name, so (name, index) is unique.
fn disambiguate_semantic_names(elements: &mut [SignatureElement]) {
    for i in 0..elements.len() {
        let collides = elements
            .iter()
            .enumerate()
            .any(|(j, other)| j != i && other.semantic_name == elements[i].semantic_name);
        if collides {
            elements[i].needs_semantic_index = true;
            elements[i].semantic_index_name = format!(
                "{}{}",
                elements[i].semantic_name, elements[i].semantic_index
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::build_signature_chunk;

    #[test]
    fn parse_single_position_element() {
        let chunk = build_signature_chunk(&[("POSITION", 0, 0, 3, 0, 0xf, 0)]);
        let sig = parse_signature_chunk_with_fourcc(FourCC::ISGN, &chunk).unwrap();

        assert_eq!(sig.elements.len(), 1);
        let e = &sig.elements[0];
        assert_eq!(e.semantic_name, "POSITION");
        assert_eq!(e.semantic_index, 0);
        assert_eq!(e.register, 0);
        assert_eq!(e.component_type, ComponentType::Float32);
        assert_eq!(e.mask, 0xf);
        assert_eq!(e.system_value, SystemValue::None);
        assert!(!e.needs_semantic_index);
    }

    #[test]
    fn infers_system_value_from_name_case_insensitively() {
        let chunk = build_signature_chunk(&[("sv_PoSiTiOn", 0, 0, 3, 0, 0xf, 0)]);
        let sig = parse_signature_chunk_with_fourcc(FourCC::OSGN, &chunk).unwrap();
        assert_eq!(sig.elements[0].system_value, SystemValue::Position);
    }

    #[test]
    fn explicit_system_value_wins_over_name() {
        let chunk = build_signature_chunk(&[("SV_Position", 0, 6, 1, 0, 0x1, 0)]);
        let sig = parse_signature_chunk_with_fourcc(FourCC::ISGN, &chunk).unwrap();
        assert_eq!(sig.elements[0].system_value, SystemValue::VertexIndex);
    }

    #[test]
    fn colliding_names_get_index_suffixes() {
        let chunk = build_signature_chunk(&[
            ("TEXCOORD", 0, 0, 3, 0, 0xf, 0),
            ("TEXCOORD", 1, 0, 3, 1, 0xf, 0),
            ("NORMAL", 0, 0, 3, 2, 0x7, 0),
        ]);
        let sig = parse_signature_chunk_with_fourcc(FourCC::ISGN, &chunk).unwrap();

        assert!(sig.elements[0].needs_semantic_index);
        assert_eq!(sig.elements[0].semantic_index_name, "TEXCOORD0");
        assert!(sig.elements[1].needs_semantic_index);
        assert_eq!(sig.elements[1].semantic_index_name, "TEXCOORD1");
        assert!(!sig.elements[2].needs_semantic_index);
        assert_eq!(sig.elements[2].semantic_index_name, "NORMAL");

        // (name, index) pairs are unique after disambiguation.
        let mut pairs: Vec<(&str, u32)> = sig
            .elements
            .iter()
            .map(|e| (e.semantic_name.as_str(), e.semantic_index))
            .collect();
        pairs.sort();
        pairs.dedup();
        assert_eq!(pairs.len(), sig.elements.len());
    }

    #[test]
    fn stream_prefixed_layout_parses() {
        // Hand-build one OSG5 record: stream prefix + classic 24 bytes.
        let mut chunk = Vec::new();
        chunk.extend_from_slice(&1u32.to_le_bytes());
        chunk.extend_from_slice(&8u32.to_le_bytes());
        let name_offset = 8 + 28;
        chunk.extend_from_slice(&2u32.to_le_bytes()); // stream
        chunk.extend_from_slice(&(name_offset as u32).to_le_bytes());
        chunk.extend_from_slice(&0u32.to_le_bytes()); // semantic index
        chunk.extend_from_slice(&0u32.to_le_bytes()); // system value
        chunk.extend_from_slice(&3u32.to_le_bytes()); // component type
        chunk.extend_from_slice(&1u32.to_le_bytes()); // register
        chunk.extend_from_slice(&[0xf, 0x0, 0, 0]);
        chunk.extend_from_slice(b"COLOR\0");

        let sig = parse_signature_chunk_with_fourcc(FourCC::OSG5, &chunk).unwrap();
        assert_eq!(sig.elements[0].stream, 2);
        assert_eq!(sig.elements[0].semantic_name, "COLOR");
        assert_eq!(sig.elements[0].register, 1);
    }

    #[test]
    fn v1_layout_discards_precision_suffix() {
        let mut chunk = Vec::new();
        chunk.extend_from_slice(&1u32.to_le_bytes());
        chunk.extend_from_slice(&8u32.to_le_bytes());
        let name_offset = 8 + 32;
        chunk.extend_from_slice(&0u32.to_le_bytes()); // stream
        chunk.extend_from_slice(&(name_offset as u32).to_le_bytes());
        chunk.extend_from_slice(&0u32.to_le_bytes());
        chunk.extend_from_slice(&0u32.to_le_bytes());
        chunk.extend_from_slice(&3u32.to_le_bytes());
        chunk.extend_from_slice(&0u32.to_le_bytes());
        chunk.extend_from_slice(&[0xf, 0xf, 0, 0]);
        chunk.extend_from_slice(&5u32.to_le_bytes()); // min precision, discarded
        chunk.extend_from_slice(b"TEXCOORD\0");

        let sig = parse_signature_chunk_with_fourcc(FourCC::ISG1, &chunk).unwrap();
        assert_eq!(sig.elements.len(), 1);
        assert_eq!(sig.elements[0].semantic_name, "TEXCOORD");
    }

    #[test]
    fn pixel_output_fixup_marks_low_registers_only() {
        let chunk = build_signature_chunk(&[
            ("COLOR", 0, 0, 3, 0, 0xf, 0),
            ("AUX", 0, 0, 3, 20, 0xf, 0),
        ]);
        let mut sig = parse_signature_chunk_with_fourcc(FourCC::OSGN, &chunk).unwrap();
        sig.mark_pixel_shader_color_outputs();
        assert_eq!(sig.elements[0].system_value, SystemValue::ColorOutput);
        assert_eq!(sig.elements[1].system_value, SystemValue::None);
    }

    #[test]
    fn truncated_chunk_is_rejected() {
        let chunk = build_signature_chunk(&[("POSITION", 0, 0, 3, 0, 0xf, 0)]);
        assert!(parse_signature_chunk_with_fourcc(FourCC::ISGN, &chunk[..10]).is_err());
    }

    #[test]
    fn name_offset_outside_chunk_is_rejected() {
        let mut chunk = build_signature_chunk(&[("POSITION", 0, 0, 3, 0, 0xf, 0)]);
        // Corrupt the element's name offset.
        chunk[8..12].copy_from_slice(&0xffffu32.to_le_bytes());
        assert!(parse_signature_chunk_with_fourcc(FourCC::ISGN, &chunk).is_err());
    }
}
