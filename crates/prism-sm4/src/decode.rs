//! Tokenized SM4/SM5 program decoding.
//!
//! The decoder walks the dword stream of a shader code chunk and produces a
//! flat list of declarations and instructions. It is written for untrusted
//! input: every token read is bounds-checked, and a malformed stream degrades
//! to a partial decode rather than a panic.
//!
//! Instruction boundaries always come from the self-declared length field of
//! the opcode token. When the decoded operands don't account for the whole
//! instruction the remainder is skipped; that keeps the decoder in step with
//! streams that carry operand extensions it doesn't know about.

use prism_dxbc::ShaderStage;
use thiserror::Error;
use tracing::warn;

use crate::opcode::{
    extended_opcode, opcode_token, CustomDataClass, GlobalFlags, Opcode, ResinfoRetType,
    SyncFlags, EXTENDED_OPCODE_RESOURCE_DIM, EXTENDED_OPCODE_RESOURCE_RETURN_TYPE,
    EXTENDED_OPCODE_SAMPLE_CONTROLS,
};
use crate::operand::{
    extended_operand, operand_token, MinPrecision, NumComponents, Operand, OperandIndex,
    OperandIndexType, OperandModifier, OperandType, SelectionMode, EXTENDED_OPERAND_MODIFIER,
};
use crate::vendor::VendorOpData;

/// Errors from program decoding.
///
/// Only structural problems with the program header are surfaced to callers;
/// mid-stream problems are logged and truncate the decode instead.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The stream is shorter than the two-token program header.
    #[error("program ends before the version and length tokens")]
    TooShort,
    /// The version token names a program type this decoder does not know.
    #[error("unrecognized program type {0:#x} in version token")]
    UnknownProgramType(u32),
    /// A read past the end of the token stream.
    #[error("token stream truncated at dword {0}")]
    Truncated(usize),
    /// An opcode outside the real opcode range.
    #[error("unrecognized opcode {raw:#x} at dword {offset}")]
    UnknownOpcode {
        /// Raw opcode field value.
        raw: u32,
        /// Dword offset of the opcode token.
        offset: usize,
    },
    /// An operand type field with no known meaning.
    #[error("unrecognized operand type {raw:#x} at dword {offset}")]
    UnknownOperandType {
        /// Raw operand type field value.
        raw: u32,
        /// Dword offset of the operand token.
        offset: usize,
    },
    /// An instruction whose declared length is too small to be real.
    #[error("instruction at dword {0} declares an impossible length")]
    BadLength(usize),
    /// A container with no `SHDR`/`SHEX` chunk to decode.
    #[error("container has no shader bytecode chunk")]
    NoShaderChunk,
}

/// A shader message embedded in the instruction stream via custom data.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderMessage {
    /// `true` for printf-style messages, `false` for plain text.
    pub printf: bool,
    /// The message format string.
    pub format: String,
}

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// The instruction opcode.
    pub opcode: Opcode,
    /// Dword offset of the opcode token within the program.
    pub offset: usize,
    /// Decoded operands, destination first.
    pub operands: Vec<Operand>,
    /// Saturate result modifier.
    pub saturate: bool,
    /// For conditional opcodes: `true` tests nonzero, `false` tests zero.
    pub nonzero: bool,
    /// Per-component precise mask, bits 0..4.
    pub precise_mask: u8,
    /// Return type modifier for `resinfo`.
    pub resinfo_ret: ResinfoRetType,
    /// Barrier flags for `sync`.
    pub sync_flags: SyncFlags,
    /// Immediate texel offsets from a sample-controls extension.
    pub texel_offsets: [i32; 3],
    /// Resource dimension from an extended opcode token.
    pub resource_dim: Option<u32>,
    /// Structured buffer stride from a resource-dimension extension.
    pub dim_stride: u32,
    /// Resource return types from an extended opcode token.
    pub return_type: Option<[u32; 4]>,
    /// Payload of a shader-message custom-data instruction.
    pub msg: Option<ShaderMessage>,
    /// Extra data attached by the vendor-extension rewriter.
    pub vendor: Option<VendorOpData>,
}

impl Instruction {
    pub(crate) fn new(opcode: Opcode, offset: usize) -> Instruction {
        Instruction {
            opcode,
            offset,
            operands: Vec::new(),
            saturate: false,
            nonzero: false,
            precise_mask: 0,
            resinfo_ret: ResinfoRetType::Float,
            sync_flags: SyncFlags::empty(),
            texel_offsets: [0; 3],
            resource_dim: None,
            dim_stride: 0,
            return_type: None,
            msg: None,
            vendor: None,
        }
    }
}

/// Payload of a declaration, by declaration opcode.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum DeclKind {
    GlobalFlags(GlobalFlags),
    ConstantBuffer {
        dynamic: bool,
        vec4_count: Option<u32>,
        space: Option<u32>,
    },
    /// `dcl_input`, `dcl_output` or `dcl_stream`: the operand says it all.
    InOut,
    InOutSiv {
        sv: u32,
    },
    InputPs {
        interp: u32,
    },
    InputPsSiv {
        interp: u32,
        sv: u32,
    },
    Temps(u32),
    IndexableTemp {
        reg: u32,
        count: u32,
        comps: u32,
    },
    IndexRange {
        count: u32,
    },
    MaxOutputVertexCount(u32),
    Sampler {
        mode: u32,
        space: Option<u32>,
    },
    Resource {
        dim: u32,
        sample_count: u32,
        ret: [u32; 4],
        space: Option<u32>,
    },
    UavTyped {
        dim: u32,
        ret: [u32; 4],
        coherent: bool,
        rov: bool,
        space: Option<u32>,
    },
    RawBuffer {
        coherent: bool,
        rov: bool,
        space: Option<u32>,
    },
    StructuredBuffer {
        stride: u32,
        counter: bool,
        coherent: bool,
        rov: bool,
        space: Option<u32>,
    },
    Tgsm {
        stride: Option<u32>,
        count: u32,
    },
    ThreadGroup([u32; 3]),
    ControlPointCount(u32),
    TessDomain(u32),
    TessPartitioning(u32),
    TessOutputPrimitive(u32),
    GsInputPrimitive(u32),
    GsOutputTopology(u32),
    InstanceCount(u32),
    MaxTessFactor(f32),
    FunctionBody(u32),
    FunctionTable {
        id: u32,
        bodies: Vec<u32>,
    },
    Interface {
        id: u32,
        num_types: u32,
        num_interfaces: u32,
        tables: Vec<u32>,
    },
    ImmediateConstantBuffer(Vec<u32>),
    /// `hs_decls` phase marker.
    HsPhaseDecls,
}

/// One decoded declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    /// The declaration opcode.
    pub opcode: Opcode,
    /// Dword offset of the opcode token within the program.
    pub offset: usize,
    /// Index of the instruction this declaration precedes. Hull shader phases
    /// declare registers mid-stream, so this is not always zero.
    pub instruction: usize,
    /// The declared operand, when the declaration has one.
    pub operand: Option<Operand>,
    /// Declaration payload.
    pub kind: DeclKind,
}

/// A decoded SM4/SM5 program.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// Pipeline stage from the version token.
    pub stage: ShaderStage,
    /// Shader model major version.
    pub major: u8,
    /// Shader model minor version.
    pub minor: u8,
    /// All declarations, in stream order.
    pub declarations: Vec<Declaration>,
    /// All instructions, in stream order, with a trailing implicit `ret`.
    pub instructions: Vec<Instruction>,
}

impl Program {
    /// Decodes a program from the raw bytes of a shader code chunk.
    pub fn from_bytes(data: &[u8]) -> Result<Program, DecodeError> {
        let tokens: Vec<u32> = data
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Program::decode(&tokens)
    }

    /// Decodes a program from its dword token stream.
    pub fn decode(tokens: &[u32]) -> Result<Program, DecodeError> {
        if tokens.len() < 2 {
            return Err(DecodeError::TooShort);
        }

        let version = tokens[0];
        let minor = (version & 0xf) as u8;
        let major = ((version >> 4) & 0xf) as u8;
        let stage = match version >> 16 {
            0 => ShaderStage::Pixel,
            1 => ShaderStage::Vertex,
            2 => ShaderStage::Geometry,
            3 => ShaderStage::Hull,
            4 => ShaderStage::Domain,
            5 => ShaderStage::Compute,
            other => return Err(DecodeError::UnknownProgramType(other)),
        };
        if major != 4 && major != 5 {
            warn!(major, minor, "unexpected shader model in version token");
        }

        let declared_len = tokens[1] as usize;
        if declared_len != tokens.len() {
            warn!(
                declared = declared_len,
                actual = tokens.len(),
                "program length token disagrees with chunk size"
            );
        }

        let decoder = Decoder {
            tokens,
            sm51: major > 5 || (major == 5 && minor >= 1),
        };

        let mut declarations = Vec::new();
        let mut instructions = Vec::new();
        let mut pos = 2;

        while pos < tokens.len() {
            let before = pos;
            let step = decoder
                .extract_operation(&mut pos)
                .and_then(|inst| match inst {
                    Some(inst) => {
                        instructions.push(inst);
                        Ok(true)
                    }
                    None => {
                        let decl = decoder.extract_decl(&mut pos, instructions.len())?;
                        if let Some(decl) = decl {
                            declarations.push(decl);
                        }
                        Ok(pos != before)
                    }
                });
            match step {
                Ok(true) => {}
                Ok(false) => {
                    warn!(offset = before, "token is neither instruction nor declaration");
                    break;
                }
                Err(err) => {
                    warn!(offset = before, %err, "stopping program decode early");
                    break;
                }
            }
        }

        // The stream has no terminator; a trailing ret closes the listing.
        instructions.push(Instruction::new(Opcode::Ret, tokens.len()));

        let mut program = Program {
            stage,
            major,
            minor,
            declarations,
            instructions,
        };
        program.link_operands();
        Ok(program)
    }

    /// `true` for shader model 5.1 programs, which carry register space
    /// tokens in resource declarations.
    pub fn is_sm51(&self) -> bool {
        self.major > 5 || (self.major == 5 && self.minor >= 1)
    }

    /// Points resource, sampler, UAV and constant buffer operands at the
    /// declaration for the register they address.
    pub(crate) fn link_operands(&mut self) {
        for inst in &mut self.instructions {
            for op in &mut inst.operands {
                link_operand(op, &self.declarations);
            }
        }
    }
}

fn link_operand(op: &mut Operand, declarations: &[Declaration]) {
    if matches!(
        op.op_type,
        OperandType::Resource
            | OperandType::Sampler
            | OperandType::UnorderedAccessView
            | OperandType::ConstantBuffer
    ) {
        op.decl_index = declarations.iter().position(|d| {
            d.operand
                .as_ref()
                .is_some_and(|decl_op| decl_op.op_type == op.op_type && decl_op.reg() == op.reg())
        });
    }
    for idx in &mut op.indices {
        if let Some(rel) = &mut idx.relative {
            link_operand(rel, declarations);
        }
    }
}

struct Decoder<'a> {
    tokens: &'a [u32],
    sm51: bool,
}

impl Decoder<'_> {
    fn tok(&self, pos: usize) -> Result<u32, DecodeError> {
        self.tokens
            .get(pos)
            .copied()
            .ok_or(DecodeError::Truncated(pos))
    }

    fn read(&self, pos: &mut usize) -> Result<u32, DecodeError> {
        let t = self.tok(*pos)?;
        *pos += 1;
        Ok(t)
    }

    fn extract_operand(&self, pos: &mut usize) -> Result<Operand, DecodeError> {
        let start = *pos;
        let t = self.read(pos)?;

        let num_components = operand_token::num_components(t);
        let mut comps = [0xffu8; 4];
        match num_components {
            NumComponents::One => comps[0] = 0,
            NumComponents::Four => match operand_token::selection_mode(t) {
                SelectionMode::Mask => {
                    let mask = operand_token::mask(t);
                    let mut n = 0;
                    for i in 0..4u8 {
                        if mask & (1 << i) != 0 {
                            comps[n] = i;
                            n += 1;
                        }
                    }
                }
                SelectionMode::Swizzle => {
                    for (i, c) in comps.iter_mut().enumerate() {
                        *c = operand_token::swizzle(t, i);
                    }
                }
                SelectionMode::Select1 => comps[0] = operand_token::select_1(t),
            },
            NumComponents::Zero | NumComponents::N => {}
        }

        let raw_type = operand_token::op_type(t);
        let op_type = OperandType::from_raw(raw_type).ok_or(DecodeError::UnknownOperandType {
            raw: raw_type,
            offset: start,
        })?;

        let mut modifier = OperandModifier::None;
        let mut precision = MinPrecision::Default;
        let mut non_uniform = false;
        let mut ext = operand_token::extended(t);
        while ext {
            let e = self.read(pos)?;
            if extended_operand::ext_type(e) == EXTENDED_OPERAND_MODIFIER {
                modifier = OperandModifier::from_raw(extended_operand::modifier(e));
                precision = MinPrecision::from_raw(extended_operand::min_precision(e));
                non_uniform = extended_operand::non_uniform(e);
            }
            ext = extended_operand::extended(e);
        }

        // Immediate values precede the indices in the stream.
        let mut values = [0u32; 4];
        match op_type {
            OperandType::Imm32 => {
                let n = if num_components == NumComponents::One {
                    1
                } else {
                    4
                };
                for v in values.iter_mut().take(n) {
                    *v = self.read(pos)?;
                }
            }
            OperandType::Imm64 => {
                let n = if num_components == NumComponents::One {
                    2
                } else {
                    4
                };
                for v in values.iter_mut().take(n) {
                    *v = self.read(pos)?;
                }
            }
            _ => {}
        }

        let dim = operand_token::index_dimension(t) as usize;
        let mut indices = Vec::with_capacity(dim);
        for i in 0..dim {
            let raw_idx = operand_token::index_type(t, i);
            let idx_type =
                OperandIndexType::from_raw(raw_idx).ok_or(DecodeError::UnknownOperandType {
                    raw: raw_idx,
                    offset: start,
                })?;
            let mut index = OperandIndex::default();
            match idx_type {
                OperandIndexType::Imm32 | OperandIndexType::Imm32PlusRelative => {
                    index.index = self.read(pos)? as u64;
                }
                OperandIndexType::Imm64 | OperandIndexType::Imm64PlusRelative => {
                    let hi = self.read(pos)? as u64;
                    let lo = self.read(pos)? as u64;
                    index.index = (hi << 32) | lo;
                }
                OperandIndexType::Relative => {}
            }
            if idx_type.is_relative() {
                index.relative = Some(Box::new(self.extract_operand(pos)?));
            }
            indices.push(index);
        }

        Ok(Operand {
            op_type,
            num_components,
            comps,
            values,
            indices,
            modifier,
            precision,
            non_uniform,
            func_num: 0,
            decl_index: None,
            name: None,
        })
    }

    /// Decodes one instruction, or returns `None` when the next token starts
    /// a declaration.
    fn extract_operation(&self, pos: &mut usize) -> Result<Option<Instruction>, DecodeError> {
        let start = *pos;
        let t = self.tok(start)?;
        let raw = opcode_token::opcode(t);
        let opcode = Opcode::from_raw(raw).ok_or(DecodeError::UnknownOpcode { raw, offset: start })?;

        if opcode == Opcode::CustomData {
            // Shader messages are the one custom-data class that behaves as
            // an instruction; the rest are declarations.
            let class = CustomDataClass::from_raw(opcode_token::custom_class(t));
            if class != CustomDataClass::ShaderMessage {
                return Ok(None);
            }
            return self.extract_shader_message(pos).map(Some);
        }
        if opcode.is_declaration() {
            return Ok(None);
        }

        let declared = opcode_token::length(t) as usize;
        if declared == 0 {
            return Err(DecodeError::BadLength(start));
        }

        let mut cur = start + 1;
        let mut inst = Instruction::new(opcode, start);

        let mut ext = opcode_token::extended(t);
        while ext {
            let e = self.read(&mut cur)?;
            match extended_opcode::ext_type(e) {
                EXTENDED_OPCODE_SAMPLE_CONTROLS => {
                    for (axis, off) in inst.texel_offsets.iter_mut().enumerate() {
                        *off = extended_opcode::texel_offset(e, axis);
                    }
                }
                EXTENDED_OPCODE_RESOURCE_DIM => {
                    inst.resource_dim = Some(extended_opcode::resource_dim(e));
                    inst.dim_stride = extended_opcode::buffer_stride(e);
                }
                EXTENDED_OPCODE_RESOURCE_RETURN_TYPE => {
                    let mut ret = [0u32; 4];
                    for (i, r) in ret.iter_mut().enumerate() {
                        *r = extended_opcode::return_type(e, i);
                    }
                    inst.return_type = Some(ret);
                }
                _ => {}
            }
            ext = extended_opcode::extended(e);
        }

        // fcall carries the function number before its interface operand.
        let func_num = if opcode == Opcode::InterfaceCall {
            Some(self.read(&mut cur)?)
        } else {
            None
        };

        for _ in 0..opcode.num_operands() {
            inst.operands.push(self.extract_operand(&mut cur)?);
        }
        if let (Some(func_num), Some(target)) = (func_num, inst.operands.first_mut()) {
            target.func_num = func_num;
        }

        match opcode {
            Opcode::Sync => {
                inst.sync_flags = SyncFlags::from_bits_truncate(opcode_token::sync_flags(t));
            }
            Opcode::Resinfo => {
                inst.resinfo_ret = ResinfoRetType::from_raw(opcode_token::resinfo_ret(t));
            }
            _ => {
                inst.saturate = opcode_token::saturate(t);
            }
        }
        inst.nonzero = opcode_token::test_nonzero(t);
        inst.precise_mask = opcode_token::precise_mask(t) as u8;

        debug_assert_eq!(
            cur,
            start + declared,
            "decoded length disagrees with the instruction's declared length"
        );
        *pos = start + declared;
        Ok(Some(inst))
    }

    fn extract_shader_message(&self, pos: &mut usize) -> Result<Instruction, DecodeError> {
        let start = *pos;
        // Custom-data blocks carry their length in the second token.
        let declared = self.tok(start + 1)? as usize;
        if declared < 7 {
            return Err(DecodeError::BadLength(start));
        }

        let mut cur = start + 2;
        let _message_id = self.read(&mut cur)?;
        let message_format = self.read(&mut cur)?;
        let format_len = self.read(&mut cur)? as usize;
        let num_operands = self.read(&mut cur)? as usize;
        let _operand_dwords = self.read(&mut cur)?;

        let mut inst = Instruction::new(Opcode::ShaderMessage, start);
        for _ in 0..num_operands {
            inst.operands.push(self.extract_operand(&mut cur)?);
        }

        let mut bytes = Vec::with_capacity(format_len.min(declared * 4));
        for i in 0..format_len {
            let t = self.tok(cur + i / 4)?;
            let b = ((t >> (8 * (i % 4))) & 0xff) as u8;
            if b == 0 {
                break;
            }
            bytes.push(b);
        }
        inst.msg = Some(ShaderMessage {
            printf: message_format == 1,
            format: String::from_utf8_lossy(&bytes).into_owned(),
        });

        *pos = start + declared;
        Ok(inst)
    }

    /// Decodes one declaration. Returns `None` for custom-data classes that
    /// are skipped over (the stream position still advances past them).
    fn extract_decl(
        &self,
        pos: &mut usize,
        instruction: usize,
    ) -> Result<Option<Declaration>, DecodeError> {
        let start = *pos;
        let t = self.tok(start)?;
        let raw = opcode_token::opcode(t);
        let opcode = Opcode::from_raw(raw).ok_or(DecodeError::UnknownOpcode { raw, offset: start })?;
        if !opcode.is_declaration() {
            return Ok(None);
        }

        if opcode == Opcode::CustomData {
            let declared = self.tok(start + 1)? as usize;
            if declared < 2 {
                return Err(DecodeError::BadLength(start));
            }
            let class = CustomDataClass::from_raw(opcode_token::custom_class(t));
            let decl = if class == CustomDataClass::ImmediateConstantBuffer {
                let end = (start + declared).min(self.tokens.len());
                Some(Declaration {
                    opcode: Opcode::DclImmediateConstantBuffer,
                    offset: start,
                    instruction,
                    operand: None,
                    kind: DeclKind::ImmediateConstantBuffer(self.tokens[start + 2..end].to_vec()),
                })
            } else {
                warn!(?class, offset = start, "skipping custom-data block");
                None
            };
            *pos = start + declared;
            return Ok(decl);
        }

        let declared = opcode_token::length(t) as usize;
        if declared == 0 {
            return Err(DecodeError::BadLength(start));
        }

        let mut cur = start + 1;
        let mut operand = None;

        let space = |cur: &mut usize| -> Result<Option<u32>, DecodeError> {
            if self.sm51 {
                Ok(Some(self.read(cur)?))
            } else {
                Ok(None)
            }
        };

        let kind = match opcode {
            Opcode::DclGlobalFlags => DeclKind::GlobalFlags(GlobalFlags::from_bits_truncate(
                opcode_token::global_flags(t),
            )),
            Opcode::DclConstantBuffer => {
                operand = Some(self.extract_operand(&mut cur)?);
                let vec4_count = if self.sm51 {
                    Some(self.read(&mut cur)?)
                } else {
                    None
                };
                DeclKind::ConstantBuffer {
                    dynamic: opcode_token::cb_dynamic_indexed(t),
                    vec4_count,
                    space: space(&mut cur)?,
                }
            }
            Opcode::DclInput | Opcode::DclOutput | Opcode::DclStream => {
                operand = Some(self.extract_operand(&mut cur)?);
                DeclKind::InOut
            }
            Opcode::DclInputSgv
            | Opcode::DclInputSiv
            | Opcode::DclOutputSgv
            | Opcode::DclOutputSiv => {
                operand = Some(self.extract_operand(&mut cur)?);
                DeclKind::InOutSiv {
                    sv: self.read(&mut cur)?,
                }
            }
            Opcode::DclInputPs => {
                operand = Some(self.extract_operand(&mut cur)?);
                DeclKind::InputPs {
                    interp: opcode_token::interpolation(t),
                }
            }
            Opcode::DclInputPsSgv | Opcode::DclInputPsSiv => {
                operand = Some(self.extract_operand(&mut cur)?);
                DeclKind::InputPsSiv {
                    interp: opcode_token::interpolation(t),
                    sv: self.read(&mut cur)?,
                }
            }
            Opcode::DclTemps => DeclKind::Temps(self.read(&mut cur)?),
            Opcode::DclIndexableTemp => DeclKind::IndexableTemp {
                reg: self.read(&mut cur)?,
                count: self.read(&mut cur)?,
                comps: self.read(&mut cur)?,
            },
            Opcode::DclIndexRange => {
                operand = Some(self.extract_operand(&mut cur)?);
                DeclKind::IndexRange {
                    count: self.read(&mut cur)?,
                }
            }
            Opcode::DclMaxOutputVertexCount => {
                DeclKind::MaxOutputVertexCount(self.read(&mut cur)?)
            }
            Opcode::DclSampler => {
                operand = Some(self.extract_operand(&mut cur)?);
                DeclKind::Sampler {
                    mode: opcode_token::sampler_mode(t),
                    space: space(&mut cur)?,
                }
            }
            Opcode::DclResource => {
                operand = Some(self.extract_operand(&mut cur)?);
                let ret_token = self.read(&mut cur)?;
                DeclKind::Resource {
                    dim: opcode_token::resource_dim(t),
                    sample_count: opcode_token::sample_count(t),
                    ret: [
                        ret_token & 0xf,
                        (ret_token >> 4) & 0xf,
                        (ret_token >> 8) & 0xf,
                        (ret_token >> 12) & 0xf,
                    ],
                    space: space(&mut cur)?,
                }
            }
            Opcode::DclUavTyped => {
                operand = Some(self.extract_operand(&mut cur)?);
                let ret_token = self.read(&mut cur)?;
                DeclKind::UavTyped {
                    dim: opcode_token::resource_dim(t),
                    ret: [
                        ret_token & 0xf,
                        (ret_token >> 4) & 0xf,
                        (ret_token >> 8) & 0xf,
                        (ret_token >> 12) & 0xf,
                    ],
                    coherent: opcode_token::globally_coherent(t),
                    rov: opcode_token::rasterizer_ordered(t),
                    space: space(&mut cur)?,
                }
            }
            Opcode::DclUavRaw | Opcode::DclResourceRaw => {
                operand = Some(self.extract_operand(&mut cur)?);
                DeclKind::RawBuffer {
                    coherent: opcode_token::globally_coherent(t),
                    rov: opcode_token::rasterizer_ordered(t),
                    space: space(&mut cur)?,
                }
            }
            Opcode::DclUavStructured | Opcode::DclResourceStructured => {
                operand = Some(self.extract_operand(&mut cur)?);
                DeclKind::StructuredBuffer {
                    stride: self.read(&mut cur)?,
                    counter: opcode_token::has_order_preserving_counter(t),
                    coherent: opcode_token::globally_coherent(t),
                    rov: opcode_token::rasterizer_ordered(t),
                    space: space(&mut cur)?,
                }
            }
            Opcode::DclTgsmRaw => {
                operand = Some(self.extract_operand(&mut cur)?);
                DeclKind::Tgsm {
                    stride: None,
                    count: self.read(&mut cur)?,
                }
            }
            Opcode::DclTgsmStructured => {
                operand = Some(self.extract_operand(&mut cur)?);
                let stride = self.read(&mut cur)?;
                DeclKind::Tgsm {
                    stride: Some(stride),
                    count: self.read(&mut cur)?,
                }
            }
            Opcode::DclThreadGroup => DeclKind::ThreadGroup([
                self.read(&mut cur)?,
                self.read(&mut cur)?,
                self.read(&mut cur)?,
            ]),
            Opcode::DclInputControlPointCount | Opcode::DclOutputControlPointCount => {
                DeclKind::ControlPointCount(opcode_token::control_point_count(t))
            }
            Opcode::DclTessDomain => DeclKind::TessDomain(opcode_token::tess_domain(t)),
            Opcode::DclTessPartitioning => {
                DeclKind::TessPartitioning(opcode_token::tess_partitioning(t))
            }
            Opcode::DclTessOutputPrimitive => {
                DeclKind::TessOutputPrimitive(opcode_token::tess_output_primitive(t))
            }
            Opcode::DclGsInputPrimitive => {
                DeclKind::GsInputPrimitive(opcode_token::input_primitive(t))
            }
            Opcode::DclGsOutputPrimitiveTopology => {
                DeclKind::GsOutputTopology(opcode_token::output_topology(t))
            }
            Opcode::DclGsInstanceCount
            | Opcode::DclHsForkPhaseInstanceCount
            | Opcode::DclHsJoinPhaseInstanceCount => {
                DeclKind::InstanceCount(self.read(&mut cur)?)
            }
            Opcode::DclHsMaxTessfactor => {
                DeclKind::MaxTessFactor(f32::from_bits(self.read(&mut cur)?))
            }
            Opcode::DclFunctionBody => DeclKind::FunctionBody(self.read(&mut cur)?),
            Opcode::DclFunctionTable => {
                let id = self.read(&mut cur)?;
                let count = self.read(&mut cur)? as usize;
                let avail = (start + declared).saturating_sub(cur);
                let mut bodies = Vec::with_capacity(count.min(avail));
                for _ in 0..count.min(avail) {
                    bodies.push(self.read(&mut cur)?);
                }
                DeclKind::FunctionTable { id, bodies }
            }
            Opcode::DclInterface => {
                let id = self.read(&mut cur)?;
                let num_types = self.read(&mut cur)?;
                let counts = self.read(&mut cur)?;
                let table_len = (counts & 0xffff) as usize;
                let num_interfaces = counts >> 16;
                let avail = (start + declared).saturating_sub(cur);
                let mut tables = Vec::with_capacity(table_len.min(avail));
                for _ in 0..table_len.min(avail) {
                    tables.push(self.read(&mut cur)?);
                }
                DeclKind::Interface {
                    id,
                    num_types,
                    num_interfaces,
                    tables,
                }
            }
            Opcode::HsDecls => DeclKind::HsPhaseDecls,
            _ => {
                warn!(?opcode, offset = start, "skipping unhandled declaration");
                *pos = start + declared;
                return Ok(None);
            }
        };

        debug_assert!(
            cur <= start + declared,
            "declaration decode overran its declared length"
        );
        *pos = start + declared;
        Ok(Some(Declaration {
            opcode,
            offset: start,
            instruction,
            operand,
            kind,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opcode_tok(op: Opcode, len: u32) -> u32 {
        op as u32 | (len << 24)
    }

    // r<reg>.xyzw destination
    fn temp_dst(reg: u32) -> [u32; 2] {
        [2 | (0xf << 4) | (1 << 20), reg]
    }

    // v<reg>.xyzw source (identity swizzle)
    fn input_src(reg: u32) -> [u32; 2] {
        [
            2 | (1 << 2) | (1 << 6) | (2 << 8) | (3 << 10) | (1 << 12) | (1 << 20),
            reg,
        ]
    }

    fn vs_5_0_header() -> [u32; 2] {
        [(1 << 16) | (5 << 4), 0]
    }

    fn finish(mut tokens: Vec<u32>) -> Vec<u32> {
        let len = tokens.len() as u32;
        tokens[1] = len;
        tokens
    }

    #[test]
    fn decodes_version_token() {
        let tokens = finish(vec![(5 << 16) | (5 << 4) | 1, 0]);
        let program = Program::decode(&tokens).unwrap();
        assert_eq!(program.stage, ShaderStage::Compute);
        assert_eq!((program.major, program.minor), (5, 1));
        assert!(program.is_sm51());
    }

    #[test]
    fn rejects_unknown_program_type() {
        let tokens = [(9 << 16) | (5 << 4), 2];
        assert!(matches!(
            Program::decode(&tokens),
            Err(DecodeError::UnknownProgramType(9))
        ));
    }

    #[test]
    fn decodes_mov_and_appends_implicit_ret() {
        let mut tokens = vs_5_0_header().to_vec();
        tokens.push(opcode_tok(Opcode::Mov, 5));
        tokens.extend(temp_dst(0));
        tokens.extend(input_src(3));
        tokens.push(opcode_tok(Opcode::Ret, 1));
        let tokens = finish(tokens);

        let program = Program::decode(&tokens).unwrap();
        assert_eq!(program.instructions.len(), 3);

        let mov = &program.instructions[0];
        assert_eq!(mov.opcode, Opcode::Mov);
        assert_eq!(mov.operands.len(), 2);
        assert_eq!(mov.operands[0].op_type, OperandType::Temp);
        assert_eq!(mov.operands[0].comps, [0, 1, 2, 3]);
        assert_eq!(mov.operands[1].op_type, OperandType::Input);
        assert_eq!(mov.operands[1].reg(), 3);

        assert_eq!(program.instructions[1].opcode, Opcode::Ret);
        assert_eq!(program.instructions[2].opcode, Opcode::Ret);
    }

    #[test]
    fn trusts_declared_instruction_length_for_resync() {
        // A mov that claims 7 dwords but only encodes 5; the two trailing
        // padding tokens must be skipped, leaving the ret decodable.
        let mut tokens = vs_5_0_header().to_vec();
        tokens.push(opcode_tok(Opcode::Mov, 7));
        tokens.extend(temp_dst(0));
        tokens.extend(input_src(0));
        tokens.extend([0xdead_beef, 0xdead_beef]);
        tokens.push(opcode_tok(Opcode::Ret, 1));
        let tokens = finish(tokens);

        // Length-based resync is release behavior; the consumed-length
        // cross-check is a debug assertion.
        if cfg!(debug_assertions) {
            return;
        }
        let program = Program::decode(&tokens).unwrap();
        assert_eq!(program.instructions.len(), 3);
        assert_eq!(program.instructions[1].opcode, Opcode::Ret);
    }

    #[test]
    fn truncated_stream_degrades_to_partial_decode() {
        let mut tokens = vs_5_0_header().to_vec();
        tokens.push(opcode_tok(Opcode::Mov, 5));
        tokens.extend(temp_dst(0));
        // source operand missing
        let tokens = finish(tokens);

        let program = Program::decode(&tokens).unwrap();
        // nothing decoded but the implicit ret
        assert_eq!(program.instructions.len(), 1);
        assert_eq!(program.instructions[0].opcode, Opcode::Ret);
    }

    #[test]
    fn decodes_immediate_operand() {
        let mut tokens = vs_5_0_header().to_vec();
        tokens.push(opcode_tok(Opcode::Mov, 8));
        tokens.extend(temp_dst(0));
        tokens.push(2 | (4 << 12)); // l(imm32 x4), no indices
        tokens.extend([0x3f80_0000, 0, 0, 0x4000_0000]);
        let tokens = finish(tokens);

        let program = Program::decode(&tokens).unwrap();
        let imm = &program.instructions[0].operands[1];
        assert_eq!(imm.op_type, OperandType::Imm32);
        assert_eq!(imm.values, [0x3f80_0000, 0, 0, 0x4000_0000]);
    }

    #[test]
    fn decodes_relative_index() {
        // x0[r1.x + 4]
        let mut tokens = vs_5_0_header().to_vec();
        tokens.push(opcode_tok(Opcode::Mov, 8));
        tokens.extend(temp_dst(0));
        tokens.push(
            2 | (1 << 2) // swizzle xxxx
                | (3 << 12) // indexable temp
                | (2 << 20) // two indices
                | (0 << 22) // index 0: imm32
                | (3 << 25), // index 1: imm32 + relative
        );
        tokens.push(0); // x0
        tokens.push(4); // + 4
        tokens.push(2 | (2 << 2) | (1 << 20)); // r1.x (select_1)
        tokens.push(1);
        let tokens = finish(tokens);

        let program = Program::decode(&tokens).unwrap();
        let src = &program.instructions[0].operands[1];
        assert_eq!(src.op_type, OperandType::IndexableTemp);
        assert_eq!(src.indices.len(), 2);
        assert_eq!(src.indices[1].index, 4);
        let rel = src.indices[1].relative.as_ref().unwrap();
        assert_eq!(rel.op_type, OperandType::Temp);
        assert_eq!(rel.comps[0], 0);
    }

    #[test]
    fn decodes_declarations_and_links_operands() {
        let mut tokens = vs_5_0_header().to_vec();
        // dcl_sampler s0, mode_default (3 dwords: no space token before 5.1)
        tokens.push(opcode_tok(Opcode::DclSampler, 3));
        tokens.push((6 << 12) | (1 << 20));
        tokens.push(0);
        // dcl_temps 1
        tokens.push(opcode_tok(Opcode::DclTemps, 2));
        tokens.push(1);
        // sample_info r0.xyzw, s0
        tokens.push(opcode_tok(Opcode::SampleInfo, 5));
        tokens.extend(temp_dst(0));
        tokens.push(2 | (1 << 2) | (6 << 12) | (1 << 20));
        tokens.push(0);
        let tokens = finish(tokens);

        let program = Program::decode(&tokens).unwrap();
        assert_eq!(program.declarations.len(), 2);
        assert!(matches!(
            program.declarations[0].kind,
            DeclKind::Sampler { mode: 0, space: None }
        ));
        assert!(matches!(program.declarations[1].kind, DeclKind::Temps(1)));

        let sampler = &program.instructions[0].operands[1];
        assert_eq!(sampler.decl_index, Some(0));
    }

    #[test]
    fn decodes_immediate_constant_buffer() {
        let mut tokens = vs_5_0_header().to_vec();
        tokens.push(Opcode::CustomData as u32 | (3 << 11));
        tokens.push(10); // total custom-data length in dwords
        tokens.extend([1, 2, 3, 4, 5, 6, 7, 8]);
        let tokens = finish(tokens);

        let program = Program::decode(&tokens).unwrap();
        assert_eq!(program.declarations.len(), 1);
        let decl = &program.declarations[0];
        assert_eq!(decl.opcode, Opcode::DclImmediateConstantBuffer);
        assert_eq!(
            decl.kind,
            DeclKind::ImmediateConstantBuffer(vec![1, 2, 3, 4, 5, 6, 7, 8])
        );
    }

    #[test]
    fn decodes_shader_message() {
        let text = b"oops";
        let mut tokens = vs_5_0_header().to_vec();
        let payload = [0u32, 0, text.len() as u32, 0, 0];
        let packed = u32::from_le_bytes([text[0], text[1], text[2], text[3]]);
        tokens.push(Opcode::CustomData as u32 | (4 << 11));
        tokens.push(2 + payload.len() as u32 + 2);
        tokens.extend(payload);
        tokens.extend([packed, 0]);
        let tokens = finish(tokens);

        let program = Program::decode(&tokens).unwrap();
        let msg_inst = &program.instructions[0];
        assert_eq!(msg_inst.opcode, Opcode::ShaderMessage);
        let msg = msg_inst.msg.as_ref().unwrap();
        assert!(!msg.printf);
        assert_eq!(msg.format, "oops");
    }

    #[test]
    fn sample_with_texel_offsets() {
        // sample with an extended opcode token carrying (u, v, w) offsets
        let mut tokens = vs_5_0_header().to_vec();
        tokens.push(opcode_tok(Opcode::Sample, 10) | 0x8000_0000);
        // extended token then 4 operands (dst, coord, resource, sampler)
        tokens.push(1 | (0xf << 9) | (2 << 13)); // u = -1, v = 2, chain ends
        tokens.extend(temp_dst(0));
        tokens.extend(input_src(0));
        tokens.push(2 | (1 << 2) | (7 << 12) | (1 << 20));
        tokens.push(0);
        tokens.push(2 | (1 << 2) | (6 << 12) | (1 << 20));
        tokens.push(0);
        let tokens = finish(tokens);

        let program = Program::decode(&tokens).unwrap();
        let sample = &program.instructions[0];
        assert_eq!(sample.texel_offsets, [-1, 2, 0]);
        assert_eq!(sample.operands.len(), 4);
    }
}
