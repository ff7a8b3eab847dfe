//! Resource definition (`RDEF`) reflection.
//!
//! The `RDEF` chunk describes everything the shader binds: SRVs, UAVs,
//! samplers and constant buffers, plus the full recursive type layout of each
//! constant buffer variable. All offsets inside the chunk are relative to the
//! chunk payload start.
//!
//! Record strides are not fixed across compiler generations. Resource records
//! grew a register-space and ID field in shader model 5.1, variable records
//! grew trailing data at 5.0, and in rare cases the wide variable layout shows
//! up under a version that claims the narrow one. Parsing detects the stride
//! from the declared target version, with a sanity check on the second record
//! for the known mismatch.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::container::{read_cstring, read_u32_le};
use crate::error::DxbcError;
use crate::fourcc::FourCC;

/// Fixed header: cbuffer count/offset, resource count/offset, target version,
/// target stage, flags, creator offset.
const RDEF_HEADER_LEN: usize = 4 * 4 + 2 + 2 + 4 + 4;

/// Resource record without the 5.1 space/ID pair.
const RESOURCE_RECORD_NARROW: usize = 32;
/// Resource record with the 5.1 space/ID pair.
const RESOURCE_RECORD_WIDE: usize = 40;

const CBUFFER_RECORD_LEN: usize = 24;

/// Variable record without the 5.0 trailing data.
const VARIABLE_RECORD_NARROW: usize = 24;
/// Variable record with the 5.0 trailing data.
const VARIABLE_RECORD_WIDE: usize = 40;

/// Member record: name offset, type offset, byte offset in the parent.
const MEMBER_RECORD_LEN: usize = 12;

/// Bind count reported for bindless (unbounded) resource ranges.
pub const BINDLESS_BIND_COUNT: u32 = u32::MAX;

/// The shader stage an `RDEF` chunk was compiled for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ShaderStage {
    Pixel,
    Vertex,
    Geometry,
    Hull,
    Domain,
    Compute,
    /// A stage marker this parser does not recognize.
    Other(u16),
}

impl ShaderStage {
    fn from_raw(raw: u16) -> ShaderStage {
        match raw {
            0xffff => ShaderStage::Pixel,
            0xfffe => ShaderStage::Vertex,
            0x4753 => ShaderStage::Geometry, // 'GS'
            0x4853 => ShaderStage::Hull,     // 'HS'
            0x4453 => ShaderStage::Domain,   // 'DS'
            0x4353 => ShaderStage::Compute,  // 'CS'
            other => ShaderStage::Other(other),
        }
    }
}

/// What kind of binding a resource record describes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ResourceKind {
    CBuffer,
    TBuffer,
    Texture,
    Sampler,
    RwTyped,
    Structured,
    RwStructured,
    ByteAddress,
    RwByteAddress,
    AppendStructured,
    ConsumeStructured,
    RwStructuredWithCounter,
    AccelerationStructure,
    FeedbackTexture,
    /// A kind this parser does not recognize.
    Other(u32),
}

impl ResourceKind {
    fn from_raw(raw: u32) -> ResourceKind {
        match raw {
            0 => ResourceKind::CBuffer,
            1 => ResourceKind::TBuffer,
            2 => ResourceKind::Texture,
            3 => ResourceKind::Sampler,
            4 => ResourceKind::RwTyped,
            5 => ResourceKind::Structured,
            6 => ResourceKind::RwStructured,
            7 => ResourceKind::ByteAddress,
            8 => ResourceKind::RwByteAddress,
            9 => ResourceKind::AppendStructured,
            10 => ResourceKind::ConsumeStructured,
            11 => ResourceKind::RwStructuredWithCounter,
            12 => ResourceKind::AccelerationStructure,
            13 => ResourceKind::FeedbackTexture,
            other => ResourceKind::Other(other),
        }
    }

    /// `true` for constant buffer bindings.
    pub fn is_cbuffer(self) -> bool {
        self == ResourceKind::CBuffer
    }

    /// `true` for sampler bindings.
    pub fn is_sampler(self) -> bool {
        self == ResourceKind::Sampler
    }

    /// `true` for read-only shader resource views.
    pub fn is_srv(self) -> bool {
        matches!(
            self,
            ResourceKind::TBuffer
                | ResourceKind::Texture
                | ResourceKind::Structured
                | ResourceKind::ByteAddress
                | ResourceKind::AccelerationStructure
        )
    }

    /// `true` for unordered access views.
    pub fn is_uav(self) -> bool {
        matches!(
            self,
            ResourceKind::RwTyped
                | ResourceKind::RwStructured
                | ResourceKind::RwByteAddress
                | ResourceKind::AppendStructured
                | ResourceKind::ConsumeStructured
                | ResourceKind::RwStructuredWithCounter
                | ResourceKind::FeedbackTexture
        )
    }
}

/// Component return type of a typed resource.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ResourceRetType {
    Unknown,
    UNorm,
    SNorm,
    SInt,
    UInt,
    Float,
    Mixed,
    Double,
    Continued,
    /// A return type this parser does not recognize.
    Other(u32),
}

impl ResourceRetType {
    fn from_raw(raw: u32) -> ResourceRetType {
        match raw {
            0 => ResourceRetType::Unknown,
            1 => ResourceRetType::UNorm,
            2 => ResourceRetType::SNorm,
            3 => ResourceRetType::SInt,
            4 => ResourceRetType::UInt,
            5 => ResourceRetType::Float,
            6 => ResourceRetType::Mixed,
            7 => ResourceRetType::Double,
            8 => ResourceRetType::Continued,
            other => ResourceRetType::Other(other),
        }
    }
}

/// View dimension of a resource binding.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ResourceDimension {
    Unknown,
    Buffer,
    Texture1D,
    Texture1DArray,
    Texture2D,
    Texture2DArray,
    Texture2DMS,
    Texture2DMSArray,
    Texture3D,
    TextureCube,
    TextureCubeArray,
    BufferEx,
    /// A dimension this parser does not recognize.
    Other(u32),
}

impl ResourceDimension {
    fn from_raw(raw: u32) -> ResourceDimension {
        match raw {
            0 => ResourceDimension::Unknown,
            1 => ResourceDimension::Buffer,
            2 => ResourceDimension::Texture1D,
            3 => ResourceDimension::Texture1DArray,
            4 => ResourceDimension::Texture2D,
            5 => ResourceDimension::Texture2DArray,
            6 => ResourceDimension::Texture2DMS,
            7 => ResourceDimension::Texture2DMSArray,
            8 => ResourceDimension::Texture3D,
            9 => ResourceDimension::TextureCube,
            10 => ResourceDimension::TextureCubeArray,
            11 => ResourceDimension::BufferEx,
            other => ResourceDimension::Other(other),
        }
    }
}

/// One resource binding (SRV, UAV, sampler or constant buffer bind point).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceBinding {
    /// Binding name as declared in the source.
    pub name: String,
    /// What kind of binding this is.
    pub kind: ResourceKind,
    /// Register space; always 0 before shader model 5.1.
    pub space: u32,
    /// First register of the binding.
    pub reg: u32,
    /// Number of registers; [`BINDLESS_BIND_COUNT`] for unbounded ranges.
    pub bind_count: u32,
    /// Raw flag bits from the record.
    pub flags: u32,
    /// Component return type for typed resources.
    pub return_type: ResourceRetType,
    /// View dimension.
    pub dimension: ResourceDimension,
    /// Sample count for multisampled resources, component count for typed
    /// buffers.
    pub sample_count: u32,
}

/// Classification of a constant buffer variable's type.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum VarClass {
    Scalar,
    Vector,
    MatrixRows,
    MatrixColumns,
    Object,
    Struct,
    InterfaceClass,
    InterfacePointer,
    /// A class this parser does not recognize.
    Other(u16),
}

impl VarClass {
    fn from_raw(raw: u16) -> VarClass {
        match raw {
            0 => VarClass::Scalar,
            1 => VarClass::Vector,
            2 => VarClass::MatrixRows,
            3 => VarClass::MatrixColumns,
            4 => VarClass::Object,
            5 => VarClass::Struct,
            6 => VarClass::InterfaceClass,
            7 => VarClass::InterfacePointer,
            other => VarClass::Other(other),
        }
    }
}

/// Base component type of a constant buffer variable.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum VarType {
    Void,
    Bool,
    Int,
    Float,
    UInt,
    UInt8,
    Double,
    InterfacePointer,
    Min8Float,
    Min10Float,
    Min16Float,
    Min12Int,
    Min16Int,
    Min16UInt,
    /// A type this parser does not recognize.
    Other(u16),
}

impl VarType {
    fn from_raw(raw: u16) -> VarType {
        match raw {
            0 => VarType::Void,
            1 => VarType::Bool,
            2 => VarType::Int,
            3 => VarType::Float,
            19 => VarType::UInt,
            20 => VarType::UInt8,
            37 => VarType::InterfacePointer,
            39 => VarType::Double,
            52 => VarType::Min8Float,
            53 => VarType::Min10Float,
            54 => VarType::Min16Float,
            55 => VarType::Min12Int,
            56 => VarType::Min16Int,
            57 => VarType::Min16UInt,
            other => VarType::Other(other),
        }
    }

    /// Size of one component in bytes.
    ///
    /// The `min` precision formats round up to a full 4 bytes; they only use
    /// lower precision internally.
    pub fn byte_size(self) -> u32 {
        match self {
            VarType::UInt8 => 1,
            VarType::Bool | VarType::Int | VarType::Float | VarType::UInt => 4,
            VarType::Min8Float
            | VarType::Min10Float
            | VarType::Min16Float
            | VarType::Min12Int
            | VarType::Min16Int
            | VarType::Min16UInt => 4,
            VarType::Double => 8,
            VarType::InterfacePointer => 1,
            VarType::Void | VarType::Other(_) => {
                debug!(var_type = ?self, "taking size of undefined type");
                1
            }
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            VarType::Bool => "bool",
            VarType::Int => "int",
            VarType::Float => "float",
            VarType::Double => "double",
            VarType::UInt => "uint",
            VarType::UInt8 => "ubyte",
            VarType::Void => "void",
            VarType::InterfacePointer => "interface",
            VarType::Min8Float => "min8float",
            VarType::Min10Float => "min10float",
            VarType::Min16Float => "min16float",
            VarType::Min12Int => "min12int",
            VarType::Min16Int => "min16int",
            VarType::Min16UInt => "min16uint",
            VarType::Other(_) => "",
        }
    }
}

/// One member of a structure type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdefMember {
    /// Member name.
    pub name: String,
    /// Byte offset within the parent structure.
    pub offset: u32,
    /// The member's type.
    pub ty: RdefType,
}

/// A fully resolved constant buffer variable type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdefType {
    /// Display name, e.g. `float4` or `row_major float3x3`.
    pub name: String,
    /// Type classification.
    pub class: VarClass,
    /// Base component type.
    pub var_type: VarType,
    /// Row count for matrices.
    pub rows: u16,
    /// Column count.
    pub cols: u16,
    /// Array element count; 0 for non-arrays.
    pub elements: u16,
    /// Total size in bytes under constant buffer packing rules.
    pub byte_size: u32,
    /// Structure members, empty for non-structures.
    pub members: Vec<RdefMember>,
}

/// A variable inside a constant buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CBufferVariable {
    /// Variable name.
    pub name: String,
    /// Byte offset within the buffer.
    pub offset: u32,
    /// Raw flag bits from the record.
    pub flags: u32,
    /// Initializer bytes, empty when the variable has no default value.
    pub default_value: Vec<u8>,
    /// The variable's type.
    pub ty: RdefType,
}

/// A constant buffer and its bind point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantBuffer {
    /// Buffer name.
    pub name: String,
    /// Stable identifier: the 5.1 ID when present, the register otherwise.
    pub identifier: u32,
    /// Register space; always 0 before shader model 5.1.
    pub space: u32,
    /// Bound register.
    pub reg: u32,
    /// Number of registers; [`BINDLESS_BIND_COUNT`] for unbounded ranges.
    pub bind_count: u32,
    /// Declared size in bytes.
    pub byte_size: u32,
    /// Raw flag bits from the record.
    pub flags: u32,
    /// The buffer's variables in declaration order.
    pub variables: Vec<CBufferVariable>,
}

/// Parsed reflection data from an `RDEF` chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RdefChunk {
    /// Declared target version, e.g. `0x0500` for shader model 5.0.
    pub target_version: u16,
    /// The stage the chunk was compiled for.
    pub stage: Option<ShaderStage>,
    /// Raw compile flag bits.
    pub flags: u32,
    /// Compiler identification string.
    pub creator: String,
    /// Read-only resource bindings.
    pub srvs: Vec<ResourceBinding>,
    /// Read-write resource bindings.
    pub uavs: Vec<ResourceBinding>,
    /// Sampler bindings.
    pub samplers: Vec<ResourceBinding>,
    /// Constant buffers with their variable layouts.
    pub cbuffers: Vec<ConstantBuffer>,
    /// Element types of structured resources, keyed by resource name.
    pub resource_binds: Vec<(String, RdefType)>,
}

impl RdefChunk {
    /// Looks up an SRV by register and space.
    pub fn find_srv(&self, reg: u32, space: u32) -> Option<&ResourceBinding> {
        self.srvs.iter().find(|r| r.reg == reg && r.space == space)
    }

    /// Looks up a UAV by register and space.
    pub fn find_uav(&self, reg: u32, space: u32) -> Option<&ResourceBinding> {
        self.uavs.iter().find(|r| r.reg == reg && r.space == space)
    }

    /// Looks up a sampler by register and space.
    pub fn find_sampler(&self, reg: u32, space: u32) -> Option<&ResourceBinding> {
        self.samplers
            .iter()
            .find(|r| r.reg == reg && r.space == space)
    }

    /// Looks up a constant buffer by its identifier (5.1) or register.
    pub fn find_cbuffer(&self, identifier: u32) -> Option<&ConstantBuffer> {
        self.cbuffers.iter().find(|cb| cb.identifier == identifier)
    }
}

pub(crate) fn parse_rdef_chunk_with_fourcc(
    fourcc: FourCC,
    data: &[u8],
) -> Result<RdefChunk, DxbcError> {
    debug!(%fourcc, len = data.len(), "parsing resource definitions");
    RdefParser::new(data).parse()
}

/// Parses an `RDEF` chunk payload into reflection data.
pub fn parse_rdef_chunk(data: &[u8]) -> Result<RdefChunk, DxbcError> {
    RdefParser::new(data).parse()
}

fn read_u16_le(bytes: &[u8], offset: usize) -> Result<u16, DxbcError> {
    let end = offset
        .checked_add(2)
        .ok_or_else(|| DxbcError::out_of_bounds("offset overflows when reading u16"))?;
    let slice = bytes.get(offset..end).ok_or_else(|| {
        DxbcError::out_of_bounds(format!(
            "need 2 bytes at {offset}..{end}, but buffer length is {}",
            bytes.len()
        ))
    })?;
    Ok(u16::from_le_bytes([slice[0], slice[1]]))
}

/// Bind point recorded for a constant buffer resource, keyed by name so the
/// buffer declaration can find it later.
#[derive(Debug, Copy, Clone, Default)]
struct CBufferBind {
    reg: u32,
    space: u32,
    bind_count: u32,
    identifier: u32,
}

struct RdefParser<'a> {
    data: &'a [u8],
    target_version: u16,
    /// Types already parsed, keyed by their offset within the chunk. Type
    /// records are shared aggressively between variables.
    types: HashMap<u32, RdefType>,
    /// Offsets currently being parsed, to break reference cycles in
    /// hostile member tables.
    in_flight: Vec<u32>,
}

impl<'a> RdefParser<'a> {
    fn new(data: &'a [u8]) -> Self {
        RdefParser {
            data,
            target_version: 0,
            types: HashMap::new(),
            in_flight: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<RdefChunk, DxbcError> {
        if self.data.len() < RDEF_HEADER_LEN {
            return Err(DxbcError::invalid_chunk(format!(
                "need at least {RDEF_HEADER_LEN} header bytes, got {}",
                self.data.len()
            )));
        }

        let cbuffer_count = read_u32_le(self.data, 0)? as usize;
        let cbuffer_offset = read_u32_le(self.data, 4)?;
        let resource_count = read_u32_le(self.data, 8)? as usize;
        let resource_offset = read_u32_le(self.data, 12)?;
        self.target_version = read_u16_le(self.data, 16)?;
        let stage_raw = read_u16_le(self.data, 18)?;
        let flags = read_u32_le(self.data, 20)?;
        let creator_offset = read_u32_le(self.data, 24)?;

        let mut out = RdefChunk {
            target_version: self.target_version,
            stage: Some(ShaderStage::from_raw(stage_raw)),
            flags,
            ..RdefChunk::default()
        };

        // The creator string is informational; a bad offset degrades to empty.
        match read_cstring(self.data, creator_offset as usize) {
            Ok(creator) => out.creator = creator,
            Err(err) => warn!(context = err.context(), "unreadable creator string"),
        }

        let mut cbufferbinds: HashMap<String, CBufferBind> = HashMap::new();
        self.parse_resources(resource_count, resource_offset, &mut out, &mut cbufferbinds)?;

        // Expand array resources out to one binding per register. Expanded
        // entries are appended after all non-array bindings so a lookup by
        // register prefers the individual (always correctly named) binding
        // over an array alias. Shader model 5.1 keeps arrays intact.
        if self.target_version < 0x501 {
            for list in [&mut out.srvs, &mut out.uavs, &mut out.samplers] {
                expand_resource_arrays(list);
            }
        }

        self.parse_cbuffers(cbuffer_count, cbuffer_offset, &mut out, &cbufferbinds)?;

        Ok(out)
    }

    fn parse_resources(
        &mut self,
        count: usize,
        table_offset: u32,
        out: &mut RdefChunk,
        cbufferbinds: &mut HashMap<String, CBufferBind>,
    ) -> Result<(), DxbcError> {
        // Shader model 5.1 added the register space and ID fields.
        let stride = if self.target_version >= 0x501 {
            RESOURCE_RECORD_WIDE
        } else {
            RESOURCE_RECORD_NARROW
        };

        for i in 0..count {
            let base = record_offset(table_offset, i, stride, self.data.len()).ok_or_else(
                || {
                    DxbcError::out_of_bounds(format!(
                        "resource record {i} of {count} does not fit in chunk of {} bytes",
                        self.data.len()
                    ))
                },
            )?;

            let name_offset = read_u32_le(self.data, base)?;
            let kind = ResourceKind::from_raw(read_u32_le(self.data, base + 4)?);
            let ret_type = ResourceRetType::from_raw(read_u32_le(self.data, base + 8)?);
            let dimension = ResourceDimension::from_raw(read_u32_le(self.data, base + 12)?);
            let mut sample_count = read_u32_le(self.data, base + 16)?;
            let reg = read_u32_le(self.data, base + 20)?;
            let mut bind_count = read_u32_le(self.data, base + 24)?;
            let res_flags = read_u32_le(self.data, base + 28)?;

            let (space, id) = if self.target_version >= 0x501 {
                (
                    read_u32_le(self.data, base + 32)?,
                    read_u32_le(self.data, base + 36)?,
                )
            } else {
                (0, reg)
            };

            // Bindless ranges report a bind count of 0; normalize to the
            // sentinel everything downstream checks for.
            if self.target_version >= 0x501 && bind_count == 0 {
                bind_count = BINDLESS_BIND_COUNT;
            }

            // Typed buffers reuse the sample count field; the component count
            // lives in the flag bits instead.
            if sample_count == u32::MAX
                && !matches!(
                    ret_type,
                    ResourceRetType::Mixed | ResourceRetType::Unknown | ResourceRetType::Continued
                )
            {
                sample_count = 1 + ((res_flags & 0xC) >> 2);
            }

            let name = read_cstring(self.data, name_offset as usize).map_err(|e| {
                DxbcError::invalid_chunk(format!("resource {i} name: {}", e.context()))
            })?;

            let binding = ResourceBinding {
                name,
                kind,
                space,
                reg,
                bind_count,
                flags: res_flags,
                return_type: ret_type,
                dimension,
                sample_count,
            };

            if kind.is_cbuffer() {
                // cbuffer bind names can collide; the declaration order
                // matches between bindings and buffer records, so disambiguate
                // both sides the same way.
                let mut key = binding.name.clone();
                while cbufferbinds.contains_key(&key) {
                    key.push('_');
                }
                cbufferbinds.insert(
                    key,
                    CBufferBind {
                        reg,
                        space,
                        bind_count,
                        identifier: id,
                    },
                );
            } else if kind.is_sampler() {
                out.samplers.push(binding);
            } else if kind.is_srv() {
                out.srvs.push(binding);
            } else if kind.is_uav() {
                out.uavs.push(binding);
            } else {
                warn!(kind = ?kind, name = %binding.name, "unexpected resource kind");
            }
        }

        Ok(())
    }

    fn parse_cbuffers(
        &mut self,
        count: usize,
        table_offset: u32,
        out: &mut RdefChunk,
        cbufferbinds: &HashMap<String, CBufferBind>,
    ) -> Result<(), DxbcError> {
        let mut seen_names: Vec<String> = Vec::new();

        for i in 0..count {
            let base = record_offset(table_offset, i, CBUFFER_RECORD_LEN, self.data.len())
                .ok_or_else(|| {
                    DxbcError::out_of_bounds(format!(
                        "cbuffer record {i} of {count} does not fit in chunk of {} bytes",
                        self.data.len()
                    ))
                })?;

            let name_offset = read_u32_le(self.data, base)?;

            // Some compilers emit empty placeholder buffers with a zero name
            // offset; fxc skips them, so do the same.
            if name_offset == 0 {
                continue;
            }

            let var_count = read_u32_le(self.data, base + 4)? as usize;
            let var_offset = read_u32_le(self.data, base + 8)?;
            let byte_size = read_u32_le(self.data, base + 12)?;
            let cb_flags = read_u32_le(self.data, base + 16)?;
            let kind = read_u32_le(self.data, base + 20)?;

            let name = read_cstring(self.data, name_offset as usize).map_err(|e| {
                DxbcError::invalid_chunk(format!("cbuffer {i} name: {}", e.context()))
            })?;

            let variables = self.parse_variables(var_count, var_offset)?;

            let mut key = name.clone();
            while seen_names.contains(&key) {
                key.push('_');
            }
            seen_names.push(key.clone());

            let bind = cbufferbinds.get(&key).copied().unwrap_or_default();

            let cb = ConstantBuffer {
                name,
                identifier: bind.identifier,
                space: bind.space,
                reg: bind.reg,
                bind_count: bind.bind_count,
                byte_size,
                flags: cb_flags,
                variables,
            };

            match kind {
                // D3D_CT_CBUFFER
                0 => out.cbuffers.push(cb),
                // D3D_CT_RESOURCE_BIND_INFO: a single $Element variable
                // describing a structured resource's element type.
                3 => {
                    if let Some(var) = cb.variables.into_iter().next() {
                        out.resource_binds.push((cb.name, var.ty));
                    } else {
                        warn!(name = %cb.name, "resource bind info without a variable");
                    }
                }
                other => {
                    debug!(kind = other, name = %cb.name, "unused buffer information");
                }
            }
        }

        Ok(())
    }

    fn parse_variables(
        &mut self,
        count: usize,
        table_offset: u32,
    ) -> Result<Vec<CBufferVariable>, DxbcError> {
        let mut stride = if self.target_version >= 0x500 {
            VARIABLE_RECORD_WIDE
        } else {
            VARIABLE_RECORD_NARROW
        };

        // In rare cases the wide layout is present even under an older target
        // version. If the narrow stride would make the second record's name
        // offset point outside the chunk, assume the wide layout.
        if stride == VARIABLE_RECORD_NARROW && count > 1 {
            let second = table_offset as usize + VARIABLE_RECORD_NARROW;
            if let Ok(name_offset) = read_u32_le(self.data, second) {
                if name_offset as usize > self.data.len() {
                    stride = VARIABLE_RECORD_WIDE;
                }
            }
        }

        let mut variables = Vec::with_capacity(count.min(256));
        for vi in 0..count {
            let base = record_offset(table_offset, vi, stride, self.data.len()).ok_or_else(
                || {
                    DxbcError::out_of_bounds(format!(
                        "variable record {vi} of {count} does not fit in chunk of {} bytes",
                        self.data.len()
                    ))
                },
            )?;

            let name_offset = read_u32_le(self.data, base)?;
            let start_offset = read_u32_le(self.data, base + 4)?;
            let size = read_u32_le(self.data, base + 8)?;
            let var_flags = read_u32_le(self.data, base + 12)?;
            let type_offset = read_u32_le(self.data, base + 16)?;
            let default_offset = read_u32_le(self.data, base + 20)?;

            let name = read_cstring(self.data, name_offset as usize).map_err(|e| {
                DxbcError::invalid_chunk(format!("variable {vi} name: {}", e.context()))
            })?;

            let mut default_value = Vec::new();
            if default_offset != 0 && default_offset != u32::MAX {
                let start = default_offset as usize;
                match start
                    .checked_add(size as usize)
                    .and_then(|end| self.data.get(start..end))
                {
                    Some(bytes) => default_value = bytes.to_vec(),
                    None => {
                        warn!(name = %name, offset = default_offset, "default value out of bounds")
                    }
                }
            }

            let ty = self.parse_type(type_offset)?;

            variables.push(CBufferVariable {
                name,
                offset: start_offset,
                flags: var_flags,
                default_value,
                ty,
            });
        }

        Ok(variables)
    }

    /// Resolves the type record at `type_offset`, recursing through structure
    /// members. Results are memoized per offset so shared and repeated types
    /// parse once, and an offset seen again while still in flight (a cycle,
    /// which no compiler emits) degrades instead of recursing forever.
    fn parse_type(&mut self, type_offset: u32) -> Result<RdefType, DxbcError> {
        if let Some(ty) = self.types.get(&type_offset) {
            return Ok(ty.clone());
        }
        if self.in_flight.contains(&type_offset) {
            warn!(type_offset, "type record cycle");
            return Ok(placeholder_type(type_offset));
        }
        self.in_flight.push(type_offset);
        let result = self.parse_type_uncached(type_offset);
        self.in_flight.pop();

        if let Ok(ty) = &result {
            self.types.insert(type_offset, ty.clone());
        }
        result
    }

    fn parse_type_uncached(&mut self, type_offset: u32) -> Result<RdefType, DxbcError> {
        let base = type_offset as usize;

        let class = VarClass::from_raw(read_u16_le(self.data, base)?);
        let var_type = VarType::from_raw(read_u16_le(self.data, base + 2)?);
        let rows = read_u16_le(self.data, base + 4)?;
        let cols = read_u16_le(self.data, base + 6)?;
        let elements = read_u16_le(self.data, base + 8)?;
        let member_count = read_u16_le(self.data, base + 10)?;
        let member_offset = read_u32_le(self.data, base + 12)?;

        // From 5.0 on the record carries four extra dwords and then a name
        // offset; earlier records end at the member offset.
        let name_offset = if self.target_version >= 0x500 {
            read_u32_le(self.data, base + 32).unwrap_or(0)
        } else {
            0
        };

        let mut name = type_display_name(class, var_type, rows, cols);

        if name == "interface" {
            if name_offset > 0 {
                let iface = read_cstring(self.data, name_offset as usize)?;
                name = format!("interface {iface}");
            } else {
                name = format!("interface unnamed_iface_0x{type_offset:08x}");
            }
        }

        // Unnamed structs get a valid identifier as their type name.
        if name.contains("<unnamed>") {
            if name_offset > 0 {
                name = read_cstring(self.data, name_offset as usize)?;
            } else {
                name = format!("unnamed_struct_0x{type_offset:08x}");
            }
        }

        let mut members = Vec::new();
        let byte_size;

        if member_offset != 0 {
            let mut size = 0u32;
            for j in 0..member_count as usize {
                let mbase = record_offset(member_offset, j, MEMBER_RECORD_LEN, self.data.len())
                    .ok_or_else(|| {
                        DxbcError::out_of_bounds(format!(
                            "member record {j} of {member_count} does not fit in chunk of {} bytes",
                            self.data.len()
                        ))
                    })?;

                let member_name_offset = read_u32_le(self.data, mbase)?;
                let member_type_offset = read_u32_le(self.data, mbase + 4)?;
                let offset_in_parent = read_u32_le(self.data, mbase + 8)?;

                let member_name = read_cstring(self.data, member_name_offset as usize)?;
                let ty = self.parse_type(member_type_offset)?;

                size = offset_in_parent.wrapping_add(ty.byte_size);

                members.push(RdefMember {
                    name: member_name,
                    offset: offset_in_parent,
                    ty,
                });
            }
            byte_size = size.wrapping_mul(u32::from(elements).max(1));
        } else {
            let component = var_type.byte_size();
            // Matrices take a full vector per column or row depending on
            // majorness, and arrays a full vector per element.
            byte_size = match class {
                VarClass::MatrixColumns => {
                    component * u32::from(cols) * 4 * u32::from(elements).max(1)
                }
                VarClass::MatrixRows => {
                    component * u32::from(rows) * 4 * u32::from(elements).max(1)
                }
                _ if elements > 1 => component * 4 * u32::from(elements),
                _ => component * u32::from(rows) * u32::from(cols),
            };
        }

        Ok(RdefType {
            name,
            class,
            var_type,
            rows,
            cols,
            elements,
            byte_size,
            members,
        })
    }
}

/// Computes the offset of record `index` in a table and checks the full
/// record fits inside a chunk of `len` bytes.
fn record_offset(table_offset: u32, index: usize, stride: usize, len: usize) -> Option<usize> {
    let base = (table_offset as usize).checked_add(index.checked_mul(stride)?)?;
    let end = base.checked_add(stride)?;
    (end <= len).then_some(base)
}

fn expand_resource_arrays(list: &mut Vec<ResourceBinding>) {
    let mut i = 0;
    while i < list.len() {
        if list[i].bind_count > 1 && list[i].bind_count != BINDLESS_BIND_COUNT {
            let mut binding = list.remove(i);
            let array_name = binding.name.clone();
            let array_size = binding.bind_count;
            binding.bind_count = 1;

            for a in 0..array_size {
                let mut element = binding.clone();
                element.name = format!("{array_name}[{a}]");
                element.reg = binding.reg + a;
                list.push(element);
            }
            continue;
        }
        i += 1;
    }
}

fn placeholder_type(type_offset: u32) -> RdefType {
    RdefType {
        name: format!("unnamed_struct_0x{type_offset:08x}"),
        class: VarClass::Struct,
        var_type: VarType::Void,
        rows: 0,
        cols: 0,
        elements: 0,
        byte_size: 0,
        members: Vec::new(),
    }
}

fn type_display_name(class: VarClass, var_type: VarType, rows: u16, cols: u16) -> String {
    let keyword = var_type.keyword();

    match class {
        VarClass::Object | VarClass::InterfaceClass => {
            warn!(class = ?class, "unexpected class in variable type");
            String::new()
        }
        VarClass::InterfacePointer => keyword.to_owned(),
        VarClass::Struct => "<unnamed>".to_owned(),
        _ => {
            if rows > 1 {
                let name = format!("{keyword}{rows}x{cols}");
                if class == VarClass::MatrixRows {
                    format!("row_major {name}")
                } else {
                    name
                }
            } else if cols > 1 {
                format!("{keyword}{cols}")
            } else {
                keyword.to_owned()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Assembles RDEF chunk bytes in order: header, strings, resource table,
    // cbuffer records, variable records, type records. String offsets are
    // reserved before tables so everything can be laid out in one pass.
    struct ChunkBuilder {
        buf: Vec<u8>,
    }

    impl ChunkBuilder {
        fn new(len_hint: usize) -> Self {
            ChunkBuilder {
                buf: Vec::with_capacity(len_hint),
            }
        }

        fn u16(&mut self, v: u16) -> &mut Self {
            self.buf.extend_from_slice(&v.to_le_bytes());
            self
        }

        fn u32(&mut self, v: u32) -> &mut Self {
            self.buf.extend_from_slice(&v.to_le_bytes());
            self
        }

        fn str_at(&mut self, s: &str) -> u32 {
            let off = self.buf.len() as u32;
            self.buf.extend_from_slice(s.as_bytes());
            self.buf.push(0);
            off
        }

        fn pos(&self) -> u32 {
            self.buf.len() as u32
        }
    }

    fn header(
        b: &mut ChunkBuilder,
        cbuffers: (u32, u32),
        resources: (u32, u32),
        version: u16,
        stage: u16,
        creator_offset: u32,
    ) {
        b.u32(cbuffers.0).u32(cbuffers.1);
        b.u32(resources.0).u32(resources.1);
        b.u16(version).u16(stage);
        b.u32(0); // flags
        b.u32(creator_offset);
        if version >= 0x500 {
            for _ in 0..8 {
                b.u32(0);
            }
        }
    }

    // Narrow resource record (pre-5.1).
    fn resource(
        b: &mut ChunkBuilder,
        name: u32,
        kind: u32,
        ret: u32,
        dim: u32,
        reg: u32,
        bind_count: u32,
    ) {
        b.u32(name).u32(kind).u32(ret).u32(dim);
        b.u32(0); // sample count
        b.u32(reg).u32(bind_count);
        b.u32(0); // flags
    }

    /// Single SM5.0 pixel shader RDEF: one Texture2D at t3, one cbuffer
    /// "globals" at b0 holding a single float4 "color".
    fn sm50_fixture() -> Vec<u8> {
        let mut b = ChunkBuilder::new(256);
        // Header is written last into a fresh builder; reserve its layout by
        // building the body at known offsets instead: body starts at 60.
        let mut body = ChunkBuilder::new(256);
        body.buf.resize(60, 0); // header placeholder

        let creator = body.str_at("test compiler");
        let tex_name = body.str_at("tex0");
        let cb_name = body.str_at("globals");
        let var_name = body.str_at("color");

        let res_off = body.pos();
        resource(&mut body, tex_name, 2, 5, 4, 3, 1); // texture, float, 2d, t3
        resource(&mut body, cb_name, 0, 0, 0, 0, 1); // cbuffer at b0

        let ty_off = body.pos();
        // float4: vector class, float type, 1x4.
        body.u16(1).u16(3).u16(1).u16(4).u16(0).u16(0);
        body.u32(0); // member offset
        for _ in 0..4 {
            body.u32(0); // 5.0 extra data
        }
        body.u32(0); // name offset

        let var_off = body.pos();
        body.u32(var_name).u32(0).u32(16).u32(0);
        body.u32(ty_off).u32(0);
        for _ in 0..4 {
            body.u32(0); // 5.0 extra data
        }

        let cb_off = body.pos();
        body.u32(cb_name).u32(1).u32(var_off).u32(16).u32(0).u32(0);

        header(
            &mut b,
            (1, cb_off),
            (2, res_off),
            0x500,
            0xffff,
            creator,
        );
        assert_eq!(b.pos(), 60);
        let mut bytes = b.buf;
        bytes.extend_from_slice(&body.buf[60..]);
        bytes
    }

    #[test]
    fn parses_resources_and_cbuffers() {
        let bytes = sm50_fixture();
        let rdef = parse_rdef_chunk(&bytes).unwrap();

        assert_eq!(rdef.target_version, 0x500);
        assert_eq!(rdef.stage, Some(ShaderStage::Pixel));
        assert_eq!(rdef.creator, "test compiler");

        assert_eq!(rdef.srvs.len(), 1);
        let srv = &rdef.srvs[0];
        assert_eq!(srv.name, "tex0");
        assert_eq!(srv.kind, ResourceKind::Texture);
        assert_eq!(srv.reg, 3);
        assert_eq!(srv.space, 0);
        assert_eq!(srv.return_type, ResourceRetType::Float);
        assert_eq!(srv.dimension, ResourceDimension::Texture2D);

        assert_eq!(rdef.cbuffers.len(), 1);
        let cb = &rdef.cbuffers[0];
        assert_eq!(cb.name, "globals");
        assert_eq!(cb.reg, 0);
        assert_eq!(cb.identifier, 0);
        assert_eq!(cb.byte_size, 16);
        assert_eq!(cb.variables.len(), 1);

        let var = &cb.variables[0];
        assert_eq!(var.name, "color");
        assert_eq!(var.offset, 0);
        assert_eq!(var.ty.name, "float4");
        assert_eq!(var.ty.class, VarClass::Vector);
        assert_eq!(var.ty.byte_size, 16);
    }

    #[test]
    fn header_too_short_is_rejected() {
        assert!(parse_rdef_chunk(&[0u8; 16]).is_err());
    }

    #[test]
    fn resource_table_out_of_bounds_is_rejected() {
        let mut b = ChunkBuilder::new(64);
        let mut body = ChunkBuilder::new(64);
        body.buf.resize(60, 0);
        let creator = body.str_at("x");
        header(&mut b, (0, 0), (4, 0x1000), 0x500, 0xffff, creator);
        let mut bytes = b.buf;
        bytes.extend_from_slice(&body.buf[60..]);
        assert!(matches!(
            parse_rdef_chunk(&bytes),
            Err(DxbcError::OutOfBounds(_))
        ));
    }

    #[test]
    fn pre_51_arrays_expand_after_scalars() {
        let mut b = ChunkBuilder::new(256);
        let mut body = ChunkBuilder::new(256);
        body.buf.resize(60, 0);
        let creator = body.str_at("x");
        let arr_name = body.str_at("texArr");
        let single_name = body.str_at("texSingle");

        let res_off = body.pos();
        resource(&mut body, arr_name, 2, 5, 4, 4, 3); // t4..t6
        resource(&mut body, single_name, 2, 5, 4, 0, 1); // t0

        header(&mut b, (0, 0), (2, res_off), 0x500, 0xffff, creator);
        let mut bytes = b.buf;
        bytes.extend_from_slice(&body.buf[60..]);

        let rdef = parse_rdef_chunk(&bytes).unwrap();
        let names: Vec<&str> = rdef.srvs.iter().map(|r| r.name.as_str()).collect();
        // Non-array bindings come first, expanded elements are appended.
        assert_eq!(
            names,
            vec!["texSingle", "texArr[0]", "texArr[1]", "texArr[2]"]
        );
        let regs: Vec<u32> = rdef.srvs.iter().map(|r| r.reg).collect();
        assert_eq!(regs, vec![0, 4, 5, 6]);
        assert!(rdef.srvs.iter().all(|r| r.bind_count == 1));
    }

    #[test]
    fn sm51_keeps_arrays_and_marks_bindless() {
        let mut b = ChunkBuilder::new(256);
        let mut body = ChunkBuilder::new(256);
        body.buf.resize(60, 0);
        let creator = body.str_at("x");
        let name = body.str_at("bindlessTex");

        let res_off = body.pos();
        // Wide record: bind count 0 (unbounded), space 2, ID 7.
        body.u32(name).u32(2).u32(5).u32(4);
        body.u32(0).u32(0).u32(0).u32(0);
        body.u32(2).u32(7);

        header(&mut b, (0, 0), (1, res_off), 0x501, 0xffff, creator);
        let mut bytes = b.buf;
        bytes.extend_from_slice(&body.buf[60..]);

        let rdef = parse_rdef_chunk(&bytes).unwrap();
        assert_eq!(rdef.srvs.len(), 1);
        assert_eq!(rdef.srvs[0].name, "bindlessTex");
        assert_eq!(rdef.srvs[0].bind_count, BINDLESS_BIND_COUNT);
        assert_eq!(rdef.srvs[0].space, 2);
    }

    #[test]
    fn placeholder_cbuffer_with_zero_name_is_dropped() {
        let mut b = ChunkBuilder::new(128);
        let mut body = ChunkBuilder::new(128);
        body.buf.resize(60, 0);
        let creator = body.str_at("x");

        let cb_off = body.pos();
        // nameOffset 0: placeholder, skipped entirely.
        body.u32(0).u32(0).u32(0).u32(0).u32(0).u32(0);

        header(&mut b, (1, cb_off), (0, 0), 0x500, 0xfffe, creator);
        let mut bytes = b.buf;
        bytes.extend_from_slice(&body.buf[60..]);

        let rdef = parse_rdef_chunk(&bytes).unwrap();
        assert_eq!(rdef.stage, Some(ShaderStage::Vertex));
        assert!(rdef.cbuffers.is_empty());
    }

    #[test]
    fn struct_byte_size_is_last_member_extent_times_elements() {
        let mut b = ChunkBuilder::new(512);
        let mut body = ChunkBuilder::new(512);
        body.buf.resize(60, 0);
        let creator = body.str_at("x");
        let cb_name = body.str_at("cb");
        let var_name = body.str_at("lights");
        let m0_name = body.str_at("pos");
        let m1_name = body.str_at("intensity");

        // float3 member type.
        let float3_off = body.pos();
        body.u16(1).u16(3).u16(1).u16(3).u16(0).u16(0);
        body.u32(0);
        for _ in 0..4 {
            body.u32(0);
        }
        body.u32(0);

        // float member type.
        let float_off = body.pos();
        body.u16(0).u16(3).u16(1).u16(1).u16(0).u16(0);
        body.u32(0);
        for _ in 0..4 {
            body.u32(0);
        }
        body.u32(0);

        // Member table: pos at 0, intensity at 12.
        let members_off = body.pos();
        body.u32(m0_name).u32(float3_off).u32(0);
        body.u32(m1_name).u32(float_off).u32(12);

        // struct { float3 pos; float intensity; } lights[4]
        let struct_off = body.pos();
        body.u16(5).u16(0).u16(0).u16(0).u16(4).u16(2);
        body.u32(members_off);
        for _ in 0..4 {
            body.u32(0);
        }
        body.u32(0);

        let var_off = body.pos();
        body.u32(var_name).u32(0).u32(256).u32(0);
        body.u32(struct_off).u32(0);
        for _ in 0..4 {
            body.u32(0);
        }

        let cb_off = body.pos();
        body.u32(cb_name).u32(1).u32(var_off).u32(256).u32(0).u32(0);

        header(&mut b, (1, cb_off), (0, 0), 0x500, 0x4353, creator);
        let mut bytes = b.buf;
        bytes.extend_from_slice(&body.buf[60..]);

        let rdef = parse_rdef_chunk(&bytes).unwrap();
        assert_eq!(rdef.stage, Some(ShaderStage::Compute));
        let ty = &rdef.cbuffers[0].variables[0].ty;
        assert_eq!(ty.name, format!("unnamed_struct_0x{struct_off:08x}"));
        assert_eq!(ty.class, VarClass::Struct);
        assert_eq!(ty.members.len(), 2);
        assert_eq!(ty.members[1].name, "intensity");
        // Last member extent (12 + 4) times 4 array elements.
        assert_eq!(ty.byte_size, 64);
    }

    #[test]
    fn matrix_and_array_byte_sizes() {
        // Column-major float4x4: 4 bytes * 4 cols * 4 = 64.
        // Checked through a single-variable cbuffer per layout.
        let mut b = ChunkBuilder::new(256);
        let mut body = ChunkBuilder::new(256);
        body.buf.resize(60, 0);
        let creator = body.str_at("x");
        let cb_name = body.str_at("cb");
        let var_name = body.str_at("world");

        let ty_off = body.pos();
        body.u16(3).u16(3).u16(4).u16(4).u16(0).u16(0); // matrix_columns float 4x4
        body.u32(0);
        for _ in 0..4 {
            body.u32(0);
        }
        body.u32(0);

        let var_off = body.pos();
        body.u32(var_name).u32(0).u32(64).u32(0);
        body.u32(ty_off).u32(0);
        for _ in 0..4 {
            body.u32(0);
        }

        let cb_off = body.pos();
        body.u32(cb_name).u32(1).u32(var_off).u32(64).u32(0).u32(0);

        header(&mut b, (1, cb_off), (0, 0), 0x500, 0xfffe, creator);
        let mut bytes = b.buf;
        bytes.extend_from_slice(&body.buf[60..]);

        let rdef = parse_rdef_chunk(&bytes).unwrap();
        let ty = &rdef.cbuffers[0].variables[0].ty;
        assert_eq!(ty.name, "float4x4");
        assert_eq!(ty.byte_size, 64);
    }

    #[test]
    fn shared_type_offsets_parse_once_and_cycles_terminate() {
        let mut b = ChunkBuilder::new(512);
        let mut body = ChunkBuilder::new(512);
        body.buf.resize(60, 0);
        let creator = body.str_at("x");
        let cb_name = body.str_at("cb");
        let v0_name = body.str_at("a");
        let v1_name = body.str_at("b");
        let m_name = body.str_at("self");

        // A struct whose single member's type offset points back at itself.
        let struct_off_pos = body.pos();
        let members_off = struct_off_pos + 36;
        body.u16(5).u16(0).u16(0).u16(0).u16(0).u16(1);
        body.u32(members_off);
        for _ in 0..4 {
            body.u32(0);
        }
        body.u32(0);
        assert_eq!(body.pos(), members_off);
        body.u32(m_name).u32(struct_off_pos).u32(0);

        // Two variables aliasing the same (cyclic) type record.
        let var_off = body.pos();
        for name in [v0_name, v1_name] {
            body.u32(name).u32(0).u32(16).u32(0);
            body.u32(struct_off_pos).u32(0);
            for _ in 0..4 {
                body.u32(0);
            }
        }

        let cb_off = body.pos();
        body.u32(cb_name).u32(2).u32(var_off).u32(32).u32(0).u32(0);

        header(&mut b, (1, cb_off), (0, 0), 0x500, 0xffff, creator);
        let mut bytes = b.buf;
        bytes.extend_from_slice(&body.buf[60..]);

        // Must terminate; the cyclic member degrades to a placeholder.
        let rdef = parse_rdef_chunk(&bytes).unwrap();
        let vars = &rdef.cbuffers[0].variables;
        assert_eq!(vars.len(), 2);
        assert_eq!(vars[0].ty, vars[1].ty);
        assert_eq!(vars[0].ty.members.len(), 1);
    }

    #[test]
    fn narrow_version_with_wide_variable_records_is_detected() {
        let mut b = ChunkBuilder::new(512);
        // Pre-5.0 header is only 28 bytes.
        let mut body = ChunkBuilder::new(512);
        body.buf.resize(28, 0);
        let creator = body.str_at("x");
        let cb_name = body.str_at("cb");
        let v0_name = body.str_at("first");
        let v1_name = body.str_at("second");

        let ty_off = body.pos();
        // Pre-5.0 type record: no extra data, no name offset.
        body.u16(1).u16(3).u16(1).u16(4).u16(0).u16(0);
        body.u32(0);

        // Wide variable records despite targetVersion 0x400. At the narrow
        // stride the second record's name field would land on the first
        // record's trailing data, which is filled with an out-of-range value.
        let var_off = body.pos();
        for name in [v0_name, v1_name] {
            body.u32(name).u32(0).u32(16).u32(0);
            body.u32(ty_off).u32(0);
            for _ in 0..4 {
                body.u32(0xffff_0000);
            }
        }

        let cb_off = body.pos();
        body.u32(cb_name).u32(2).u32(var_off).u32(32).u32(0).u32(0);

        header(&mut b, (1, cb_off), (0, 0), 0x400, 0xffff, creator);
        assert_eq!(b.pos(), 28);
        let mut bytes = b.buf;
        bytes.extend_from_slice(&body.buf[28..]);

        let rdef = parse_rdef_chunk(&bytes).unwrap();
        let vars = &rdef.cbuffers[0].variables;
        assert_eq!(vars.len(), 2);
        assert_eq!(vars[0].name, "first");
        assert_eq!(vars[1].name, "second");
        assert_eq!(vars[1].ty.name, "float4");
    }

    #[test]
    fn resource_bind_info_feeds_structured_element_types() {
        let mut b = ChunkBuilder::new(512);
        let mut body = ChunkBuilder::new(512);
        body.buf.resize(60, 0);
        let creator = body.str_at("x");
        let res_name = body.str_at("particles");
        let elem_name = body.str_at("$Element");

        let res_off = body.pos();
        resource(&mut body, res_name, 5, 0, 1, 0, 1); // structured buffer

        let ty_off = body.pos();
        body.u16(1).u16(19).u16(1).u16(2).u16(0).u16(0); // uint2
        body.u32(0);
        for _ in 0..4 {
            body.u32(0);
        }
        body.u32(0);

        let var_off = body.pos();
        body.u32(elem_name).u32(0).u32(8).u32(0);
        body.u32(ty_off).u32(0);
        for _ in 0..4 {
            body.u32(0);
        }

        let cb_off = body.pos();
        // type 3: resource bind info.
        body.u32(res_name).u32(1).u32(var_off).u32(8).u32(0).u32(3);

        header(&mut b, (1, cb_off), (1, res_off), 0x500, 0x4353, creator);
        let mut bytes = b.buf;
        bytes.extend_from_slice(&body.buf[60..]);

        let rdef = parse_rdef_chunk(&bytes).unwrap();
        assert!(rdef.cbuffers.is_empty());
        assert_eq!(rdef.resource_binds.len(), 1);
        assert_eq!(rdef.resource_binds[0].0, "particles");
        assert_eq!(rdef.resource_binds[0].1.name, "uint2");
        assert_eq!(rdef.resource_binds[0].1.byte_size, 8);
    }
}
