//! Vendor shader-extension rewriting.
//!
//! AMD and NVIDIA expose extra GPU instructions to HLSL through a "magic" UAV
//! slot: the driver intercepts specific atomic patterns on that UAV and
//! replaces them with hardware intrinsics. Disassembling the raw patterns is
//! useless to a reader, so this pass pattern-matches them back into synthetic
//! vendor opcodes.
//!
//! AMD encodes each intrinsic in a single `imm_atomic_cmp_exch` (or
//! `atomic_cmp_store` when the result is unused), with a literal payload
//! carrying the opcode, phase and data. Multi-phase intrinsics spread their
//! parameters over consecutive atomics.
//!
//! NVIDIA instead drives a little protocol against a structured UAV:
//! `imm_atomic_alloc` brackets each intrinsic, and parameters are stored to
//! fixed member offsets with `store_structured`. Results come back either
//! through the closing increments or through a later `ld_structured` of the
//! `dst` member, which is patched into the emitted instruction after the
//! fact.
//!
//! The whole pass runs on a scratch copy of the instruction list. If the
//! pattern matcher loses sync with the stream it abandons the copy and the
//! program keeps its original instructions, magic UAV and all.

use std::array;

use tracing::{debug, warn};

use crate::decode::{DeclKind, Declaration, Instruction, Program};
use crate::opcode::Opcode;
use crate::operand::{NumComponents, Operand, OperandType};

/// Which vendor's extension protocol a magic UAV slot speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuVendor {
    /// AMD AGS intrinsics.
    Amd,
    /// NVIDIA NVAPI intrinsics.
    Nvidia,
}

/// Configuration of the vendor extension UAV slot, as communicated to the
/// driver at shader creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorExtension {
    /// The vendor protocol in use.
    pub vendor: GpuVendor,
    /// Register space of the magic UAV. `None` for D3D11-style extensions,
    /// which also changes the AMD opcode numbering.
    pub space: Option<u32>,
    /// Register slot of the magic UAV.
    pub reg: u32,
}

/// Atomic operation carried by a vendor 64-bit/float atomic intrinsic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum VendorAtomicOp {
    And,
    Or,
    Xor,
    Add,
    Max,
    Min,
    Swap,
    CompareAndSwap,
}

impl VendorAtomicOp {
    pub(crate) fn suffix(self) -> &'static str {
        match self {
            VendorAtomicOp::And => "_and",
            VendorAtomicOp::Or => "_or",
            VendorAtomicOp::Xor => "_xor",
            VendorAtomicOp::Add => "_add",
            VendorAtomicOp::Max => "_max",
            VendorAtomicOp::Min => "_min",
            VendorAtomicOp::Swap => "_swap",
            VendorAtomicOp::CompareAndSwap => "_comp_swap",
        }
    }
}

/// Reduction operator of an AMD wave reduce/scan intrinsic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum VendorWaveOp {
    AddFloat,
    AddSint,
    AddUint,
    MulFloat,
    MulSint,
    MulUint,
    MinFloat,
    MinSint,
    MinUint,
    MaxFloat,
    MaxSint,
    MaxUint,
    And,
    Or,
    Xor,
}

impl VendorWaveOp {
    fn from_raw(raw: u32) -> Option<VendorWaveOp> {
        use VendorWaveOp::*;
        Some(match raw {
            1 => AddFloat,
            2 => AddSint,
            3 => AddUint,
            4 => MulFloat,
            5 => MulSint,
            6 => MulUint,
            7 => MinFloat,
            8 => MinSint,
            9 => MinUint,
            10 => MaxFloat,
            11 => MaxSint,
            12 => MaxUint,
            13 => And,
            14 => Or,
            15 => Xor,
            _ => return None,
        })
    }

    pub(crate) fn suffix(self) -> &'static str {
        match self {
            VendorWaveOp::AddFloat => "_addf",
            VendorWaveOp::AddSint => "_addi",
            VendorWaveOp::AddUint => "_addu",
            VendorWaveOp::MulFloat => "_mulf",
            VendorWaveOp::MulSint => "_muli",
            VendorWaveOp::MulUint => "_mulu",
            VendorWaveOp::MinFloat => "_minf",
            VendorWaveOp::MinSint => "_mini",
            VendorWaveOp::MinUint => "_minu",
            VendorWaveOp::MaxFloat => "_maxf",
            VendorWaveOp::MaxSint => "_maxi",
            VendorWaveOp::MaxUint => "_maxu",
            VendorWaveOp::And => "_and",
            VendorWaveOp::Or => "_or",
            VendorWaveOp::Xor => "_xor",
        }
    }
}

/// Mnemonic-affecting payload attached to a synthesized vendor instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum VendorOpData {
    /// Atomic operation suffix for `amd_u64_atomic` / `nv_*_atomic`.
    Atomic(VendorAtomicOp),
    /// Wave reduction operator, plus inclusive/exclusive scan flags.
    Wave {
        /// The reduction operator.
        op: Option<VendorWaveOp>,
        /// Inclusive-scan flag (scans only).
        inclusive: bool,
        /// Exclusive-scan flag (scans only).
        exclusive: bool,
    },
    /// Barycentric interpolation mode for `amd_barycoord` (raw field value).
    BaryInterp(u32),
    /// Cross-lane swizzle pattern for `amd_swizzle` (raw field value).
    LaneSwizzle(u32),
}

impl VendorOpData {
    pub(crate) fn append_suffix(&self, out: &mut String) {
        match self {
            VendorOpData::Atomic(op) => out.push_str(op.suffix()),
            VendorOpData::Wave {
                op,
                inclusive,
                exclusive,
            } => {
                if let Some(op) = op {
                    out.push_str(op.suffix());
                }
                if *inclusive {
                    out.push_str("_incl");
                }
                if *exclusive {
                    out.push_str("_excl");
                }
            }
            VendorOpData::BaryInterp(mode) => out.push_str(match mode {
                1 => "_linear_center",
                2 => "_linear_centroid",
                3 => "_linear_sample",
                4 => "_persp_center",
                5 => "_persp_centroid",
                6 => "_persp_sample",
                7 => "_persp_pullmodel",
                _ => "_unknown",
            }),
            VendorOpData::LaneSwizzle(pattern) => out.push_str(match pattern {
                0x041f => "_swap1",
                0x081f => "_swap2",
                0x101f => "_swap4",
                0x201f => "_swap8",
                0x401f => "_swap16",
                0x0c1f => "_reverse4",
                0x1c1f => "_reverse8",
                0x3c1f => "_reverse16:",
                0x7c1f => "_reverse32:",
                0x003e => "_bcast2",
                0x003c => "_bcast4",
                0x0038 => "_bcast8",
                0x0030 => "_bcast16",
                0x0020 => "_bcast32",
                _ => "",
            }),
        }
    }
}

/// Field accessors for the literal payload of an AMD extension atomic.
mod amd {
    pub fn magic(i: u32) -> u32 {
        i >> 28
    }
    pub fn phase(i: u32) -> u32 {
        (i >> 24) & 0x3
    }
    pub fn data(i: u32) -> u32 {
        (i >> 8) & 0xffff
    }
    pub fn opcode(i: u32) -> u32 {
        i & 0xff
    }
    pub fn vtx_param_component(i: u32) -> u8 {
        ((i >> 15) & 0x3) as u8
    }
    pub fn vtx_param_parameter(i: u32) -> u64 {
        ((i >> 8) & 0x1f) as u64
    }
    pub fn vtx_param_vertex(i: u32) -> u32 {
        (i >> 13) & 0x3
    }
    pub fn wave_op(i: u32) -> u32 {
        (i >> 8) & 0xff
    }
    pub fn wave_op_flags(i: u32) -> u32 {
        (i >> 16) & 0xff
    }
    pub fn atomic_op(i: u32) -> u32 {
        (i >> 8) & 0xff
    }

    // Extension opcode numbering used by the D3D12 driver path. The D3D11
    // numbering differs in the middle of the range; see `convert_dx11`.
    pub const READFIRSTLANE: u32 = 0x01;
    pub const READLANE: u32 = 0x02;
    pub const LANEID: u32 = 0x03;
    pub const SWIZZLE: u32 = 0x04;
    pub const BALLOT: u32 = 0x05;
    pub const MBCNT: u32 = 0x06;
    pub const MIN3U: u32 = 0x07;
    pub const MIN3F: u32 = 0x08;
    pub const MED3U: u32 = 0x09;
    pub const MED3F: u32 = 0x0a;
    pub const MAX3U: u32 = 0x0b;
    pub const MAX3F: u32 = 0x0c;
    pub const BARYCOORD: u32 = 0x0d;
    pub const VTXPARAM: u32 = 0x0e;
    pub const VIEWPORT_INDEX: u32 = 0x10;
    pub const RT_ARRAY_SLICE: u32 = 0x11;
    pub const WAVE_REDUCE: u32 = 0x12;
    pub const WAVE_SCAN: u32 = 0x13;
    pub const LOAD_DW_AT_ADDR: u32 = 0x14;
    pub const DRAW_INDEX: u32 = 0x17;
    pub const ATOMIC_U64: u32 = 0x18;
    pub const GET_WAVE_SIZE: u32 = 0x19;
    pub const BASE_INSTANCE: u32 = 0x1a;
    pub const BASE_VERTEX: u32 = 0x1b;

    /// Maps the D3D11 extension numbering onto the D3D12 one. The opcodes
    /// from Min3U through VtxParam sit one slot higher on D3D11.
    pub fn convert_dx11(op: u32) -> u32 {
        match op {
            0x08..=0x0f => op - 1,
            other => other,
        }
    }

    pub const BARY_PERSP_PULL_MODEL: u32 = 7;

    // AMD's atomic numbering, distinct from NV's.
    pub fn convert_atomic(raw: u32) -> Option<super::VendorAtomicOp> {
        use super::VendorAtomicOp::*;
        Some(match raw {
            0x01 => Min,
            0x02 => Max,
            0x03 => And,
            0x04 => Or,
            0x05 => Xor,
            0x06 => Add,
            0x07 => Swap,
            0x08 => CompareAndSwap,
            _ => return None,
        })
    }
}

/// NVAPI protocol constants.
mod nv {
    pub const SHUFFLE: u32 = 1;
    pub const SHUFFLE_UP: u32 = 2;
    pub const SHUFFLE_DOWN: u32 = 3;
    pub const SHUFFLE_XOR: u32 = 4;
    pub const VOTE_ALL: u32 = 5;
    pub const VOTE_ANY: u32 = 6;
    pub const VOTE_BALLOT: u32 = 7;
    pub const GET_LANE_ID: u32 = 8;
    pub const FP16_ATOMIC: u32 = 12;
    pub const FP32_ATOMIC: u32 = 13;
    pub const GET_SPECIAL: u32 = 19;
    pub const U64_ATOMIC: u32 = 20;
    pub const MATCH_ANY: u32 = 21;
    pub const FOOTPRINT: u32 = 28;
    pub const FOOTPRINT_BIAS: u32 = 29;
    pub const GET_SHADING_RATE: u32 = 30;
    pub const FOOTPRINT_LEVEL: u32 = 31;
    pub const FOOTPRINT_GRAD: u32 = 32;
    pub const SHUFFLE_GENERIC: u32 = 33;
    pub const VPRS_EVAL_ATTRIB_AT_SAMPLE: u32 = 51;
    pub const VPRS_EVAL_ATTRIB_SNAPPED: u32 = 52;

    pub const SPECIAL_THREAD_LT_MASK: u32 = 4;
    pub const SPECIAL_FOOTPRINT_SINGLELOD: u32 = 5;

    pub fn convert_atomic(raw: u32) -> Option<super::VendorAtomicOp> {
        use super::VendorAtomicOp::*;
        Some(match raw {
            0 => And,
            1 => Or,
            2 => Xor,
            3 => Add,
            4 => Swap,
            5 => CompareAndSwap,
            6 => Max,
            7 => Min,
            _ => return None,
        })
    }

    // Byte offsets of the magic structured UAV's members.
    pub const SLOT_OPCODE: u32 = 0;
    pub const SLOT_SRC0: u32 = 76;
    pub const SLOT_SRC1: u32 = 92;
    pub const SLOT_SRC2: u32 = 108;
    pub const SLOT_SRC3: u32 = 28;
    pub const SLOT_SRC4: u32 = 44;
    pub const SLOT_SRC5: u32 = 60;
    pub const SLOT_DST: u32 = 124;
    pub const SLOT_MARK_UAV: u32 = 140;
    pub const SLOT_NUM_OUTPUTS: u32 = 144;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Nothing,
    Broken,
    InstructionHeader,
    InstructionBody,
    UavInstructionHeader1,
    UavInstructionHeader2,
    UavInstructionBody,
    AmdUavAtomic,
}

const RESULT_COMP: [&str; 4] = ["result.x", "result.y", "result.z", "result.w"];

/// Rewrites vendor extension patterns in `program` into synthetic vendor
/// instructions, removing the magic UAV declaration. On any mismatch the
/// program is left untouched.
pub fn rewrite_vendor_ops(program: &mut Program, ext: &VendorExtension) {
    let Some(decl_idx) = find_magic_decl(&program.declarations, ext) else {
        debug!("no magic UAV declaration found; nothing to rewrite");
        return;
    };
    let magic_id = program.declarations[decl_idx]
        .operand
        .as_ref()
        .map(|op| op.reg())
        .unwrap_or(u64::MAX);

    let mut rw = Rewriter {
        insts: program.instructions.clone(),
        state: State::Nothing,
        nv_opcode: 0,
        src: array::from_fn(|_| Operand::default()),
        dst: array::from_fn(|_| Operand::default()),
        uav: Operand::default(),
        num_outputs: 0,
        outputs_needed: 0,
        magic_id,
        dx11: ext.space.is_none(),
    };
    rw.run();

    if rw.state == State::Broken {
        warn!("vendor extension stream did not match; keeping raw instructions");
        return;
    }

    rw.insts.retain(|op| op.opcode != Opcode::VendorRemoved);
    program.instructions = rw.insts;
    program.declarations.remove(decl_idx);
    // declaration indices shifted under the operands
    program.link_operands();
}

fn decl_space(kind: &DeclKind) -> Option<u32> {
    match kind {
        DeclKind::ConstantBuffer { space, .. }
        | DeclKind::Sampler { space, .. }
        | DeclKind::Resource { space, .. }
        | DeclKind::UavTyped { space, .. }
        | DeclKind::RawBuffer { space, .. }
        | DeclKind::StructuredBuffer { space, .. } => *space,
        _ => None,
    }
}

fn find_magic_decl(declarations: &[Declaration], ext: &VendorExtension) -> Option<usize> {
    declarations.iter().position(|d| {
        let Some(op) = &d.operand else {
            return false;
        };
        match op.indices.len() {
            1 => op.indices[0].index == u64::from(ext.reg),
            3 => {
                op.indices[1].index == u64::from(ext.reg)
                    && decl_space(&d.kind) == ext.space
            }
            _ => false,
        }
    })
}

struct Rewriter {
    insts: Vec<Instruction>,
    state: State,
    nv_opcode: u32,
    src: [Operand; 8],
    dst: [Operand; 4],
    uav: Operand,
    num_outputs: i32,
    outputs_needed: i32,
    magic_id: u64,
    dx11: bool,
}

impl Rewriter {
    fn run(&mut self) {
        let mut i = 0;
        while i < self.insts.len() {
            if self.state == State::Broken {
                break;
            }

            let cur = self.insts[i].clone();

            let amd_trigger = (cur.opcode == Opcode::ImmAtomicCmpExch
                && operand_reg(&cur, 1) == Some(self.magic_id))
                || (cur.opcode == Opcode::AtomicCmpStore
                    && operand_reg(&cur, 0) == Some(self.magic_id));

            if amd_trigger {
                self.amd_instruction(i, &cur);
                if self.state != State::Broken {
                    self.insts[i].opcode = Opcode::VendorRemoved;
                }
            } else if cur.opcode == Opcode::ImmAtomicAlloc
                && operand_reg(&cur, 1) == Some(self.magic_id)
            {
                self.nv_increment(i, &cur);
                if self.state != State::Broken {
                    self.insts[i].opcode = Opcode::VendorRemoved;
                }
            } else if cur.opcode == Opcode::StoreStructured
                && operand_reg(&cur, 0) == Some(self.magic_id)
            {
                self.nv_store(i, &cur);
                if self.state != State::Broken {
                    self.insts[i].opcode = Opcode::VendorRemoved;
                }
            } else if cur.opcode == Opcode::LdStructured
                && operand_reg(&cur, 3) == Some(self.magic_id)
            {
                self.nv_load(i, &cur);
            } else if self.state == State::UavInstructionHeader1
                || self.state == State::AmdUavAtomic
            {
                // snoop the user's UAV out of the next raw/typed store
                if cur.opcode == Opcode::StoreRaw || cur.opcode == Opcode::StoreUavTyped {
                    self.uav = cur.operands[0].clone();
                    self.state = State::UavInstructionHeader2;
                    self.insts[i].opcode = Opcode::VendorRemoved;
                }
            }

            i += 1;
        }
    }

    fn broken(&mut self, why: &'static str) {
        warn!(why, "vendor extension pattern mismatch");
        self.state = State::Broken;
    }

    fn emit(&mut self, i: usize, op: Instruction) {
        self.insts.insert(i + 1, op);
    }

    // ---- AMD ----

    fn amd_instruction(&mut self, i: usize, cur: &Instruction) {
        let inst_idx = if cur.opcode == Opcode::AtomicCmpStore { 1 } else { 2 };

        let dst_operand = if cur.opcode == Opcode::AtomicCmpStore {
            Operand::null()
        } else {
            cur.operands[0].clone()
        };

        let Some(payload) = cur.operands.get(inst_idx) else {
            return self.broken("AMD atomic is missing its payload operand");
        };
        if !payload.is_literal() {
            return self.broken("AMD extension payload is not a literal");
        }
        let instruction = payload.values[0];

        if amd::magic(instruction) != 5 {
            return self.broken("bad magic field in AMD extension payload");
        }

        let amdop = if self.dx11 {
            amd::convert_dx11(amd::opcode(instruction))
        } else {
            amd::opcode(instruction)
        };
        let phase = amd::phase(instruction) as usize;

        let p0 = cur.operands.get(inst_idx + 1).cloned().unwrap_or_default();
        let p1 = cur.operands.get(inst_idx + 2).cloned().unwrap_or_default();
        self.src[2 * phase] = p0;
        self.src[2 * phase + 1] = p1;

        let mut op = Instruction::new(Opcode::VendorRemoved, cur.offset);
        match amdop {
            amd::READFIRSTLANE => {
                op.opcode = Opcode::AmdReadfirstlane;
                op.operands = vec![dst_operand, self.src[0].clone()];
            }
            amd::READLANE => {
                op.opcode = Opcode::AmdReadlane;
                let lane = Operand::imm32(amd::data(instruction)).named("lane");
                op.operands = vec![dst_operand, self.src[0].clone(), lane];
            }
            amd::LANEID => {
                op.opcode = Opcode::AmdLaneId;
                op.operands = vec![dst_operand];
            }
            amd::SWIZZLE => {
                op.opcode = Opcode::AmdSwizzle;
                op.operands = vec![dst_operand, self.src[0].clone()];
                op.vendor = Some(VendorOpData::LaneSwizzle(amd::data(instruction)));
            }
            amd::BALLOT => {
                if phase == 0 {
                    self.dst[0] = dst_operand;
                } else {
                    op.opcode = Opcode::AmdBallot;
                    op.operands = vec![
                        self.dst[0].clone(),
                        dst_operand,
                        self.src[0].named("predicate"),
                    ];
                }
            }
            amd::MBCNT => {
                op.opcode = Opcode::AmdMbcnt;
                op.operands = vec![dst_operand, self.src[0].clone(), self.src[1].clone()];
            }
            amd::MIN3U | amd::MIN3F | amd::MED3U | amd::MED3F | amd::MAX3U | amd::MAX3F => {
                // phase 0 output just chains the instructions
                if phase == 1 {
                    op.opcode = match amdop {
                        amd::MIN3U => Opcode::AmdMin3U,
                        amd::MIN3F => Opcode::AmdMin3F,
                        amd::MED3U => Opcode::AmdMed3U,
                        amd::MED3F => Opcode::AmdMed3F,
                        amd::MAX3U => Opcode::AmdMax3U,
                        _ => Opcode::AmdMax3F,
                    };
                    op.operands = vec![
                        dst_operand,
                        self.src[0].clone(),
                        self.src[1].clone(),
                        self.src[2].clone(),
                    ];
                }
            }
            amd::BARYCOORD => {
                let interp = amd::data(instruction);
                if phase == 0 {
                    self.dst[0] = dst_operand;
                } else if phase == 1 {
                    if interp != amd::BARY_PERSP_PULL_MODEL {
                        op.opcode = Opcode::AmdBaryCoord;
                        op.operands = vec![self.dst[0].named("j"), dst_operand];
                        op.vendor = Some(VendorOpData::BaryInterp(interp));
                    } else {
                        self.dst[1] = dst_operand;
                    }
                } else if phase == 2 {
                    op.opcode = Opcode::AmdBaryCoord;
                    op.operands = vec![self.dst[0].clone(), self.dst[1].clone(), dst_operand];
                    op.vendor = Some(VendorOpData::BaryInterp(interp));
                }
            }
            amd::VTXPARAM => {
                op.opcode = Opcode::AmdVtxParam;
                let vertex =
                    Operand::imm32(amd::vtx_param_vertex(instruction)).named("vertexIndex");
                let mut parameter = Operand::default();
                parameter.op_type = OperandType::Input;
                parameter.num_components = NumComponents::One;
                parameter.indices = vec![crate::operand::OperandIndex::imm(
                    amd::vtx_param_parameter(instruction),
                )];
                parameter.comps = [amd::vtx_param_component(instruction), 0xff, 0xff, 0xff];
                parameter.name = Some("parameter");
                op.operands = vec![dst_operand, vertex, parameter];
            }
            amd::VIEWPORT_INDEX => {
                op.opcode = Opcode::AmdGetViewportIndex;
                op.operands = vec![dst_operand];
            }
            amd::RT_ARRAY_SLICE => {
                op.opcode = Opcode::AmdGetRtArraySlice;
                op.operands = vec![dst_operand];
            }
            amd::WAVE_REDUCE | amd::WAVE_SCAN => {
                op.opcode = if amdop == amd::WAVE_REDUCE {
                    Opcode::AmdWaveReduce
                } else {
                    Opcode::AmdWaveScan
                };
                let flags = amd::wave_op_flags(instruction);
                op.vendor = Some(VendorOpData::Wave {
                    op: VendorWaveOp::from_raw(amd::wave_op(instruction)),
                    inclusive: amdop == amd::WAVE_SCAN && flags & 0x1 != 0,
                    exclusive: amdop == amd::WAVE_SCAN && flags & 0x2 != 0,
                });
            }
            amd::LOAD_DW_AT_ADDR => {
                if phase == 1 {
                    op.opcode = Opcode::AmdLoadDwAtAddr;
                    op.operands = vec![
                        dst_operand,
                        self.src[0].named("gpuVaLoBits"),
                        self.src[1].named("gpuVaHiBits"),
                        self.src[2].named("offset"),
                    ];
                }
            }
            amd::DRAW_INDEX => {
                op.opcode = Opcode::AmdGetDrawIndex;
                op.operands = vec![dst_operand];
            }
            amd::GET_WAVE_SIZE => {
                op.opcode = Opcode::AmdGetWaveSize;
                op.operands = vec![dst_operand];
            }
            amd::BASE_INSTANCE => {
                op.opcode = Opcode::AmdGetBaseInstance;
                op.operands = vec![dst_operand];
            }
            amd::BASE_VERTEX => {
                op.opcode = Opcode::AmdGetBaseVertex;
                op.operands = vec![dst_operand];
            }
            amd::ATOMIC_U64 => {
                // watch for the user's UAV access so it can be swallowed
                if self.state == State::Nothing {
                    self.state = State::AmdUavAtomic;
                }

                let Some(atomicop) = amd::convert_atomic(amd::atomic_op(instruction)) else {
                    return self.broken("unknown AMD atomic operation");
                };
                let is_cas = atomicop == VendorAtomicOp::CompareAndSwap;

                // CAS spreads over four phases, everything else over three
                if phase == 3 || (phase == 2 && !is_cas) {
                    op.opcode = Opcode::AmdU64Atomic;
                    op.vendor = Some(VendorOpData::Atomic(atomicop));
                    self.state = State::Nothing;

                    op.operands.push(self.dst[0].clone());
                    op.operands.push(dst_operand.clone());
                    op.operands.push(self.uav.clone());

                    // the address sits in src[0..3]; compact when they all
                    // read the same register
                    if self.src[0].indices == self.src[1].indices
                        && self.src[1].indices == self.src[2].indices
                    {
                        let mut addr = self.src[0].named("address");
                        addr.comps = [
                            self.src[0].comps[0],
                            self.src[1].comps[0],
                            self.src[2].comps[0],
                            0xff,
                        ];
                        op.operands.push(addr);
                        op.texel_offsets[0] = 1;
                    } else {
                        for (axis, name) in
                            ["address.x", "address.y", "address.z"].into_iter().enumerate()
                        {
                            let mut part = self.src[axis].named(name);
                            part.comps = [self.src[axis].comps[0], 0xff, 0xff, 0xff];
                            op.operands.push(part);
                        }
                        op.texel_offsets[0] = 2;
                    }

                    if is_cas {
                        if self.src[5].indices == self.src[6].indices {
                            let mut cmp = self.src[5].named("compare_value");
                            cmp.comps = [self.src[5].comps[0], self.src[6].comps[0], 0xff, 0xff];
                            cmp.values[1] = self.src[6].values[0];
                            op.operands.push(cmp);
                            op.texel_offsets[1] = 1;
                        } else {
                            let mut lo = self.src[5].select_comp(0).named("compare_value.x");
                            lo.comps = [self.src[5].comps[0], 0xff, 0xff, 0xff];
                            op.operands.push(lo);
                            let mut hi = self.src[6].select_comp(0).named("compare_value.y");
                            hi.comps = [self.src[6].comps[0], 0xff, 0xff, 0xff];
                            op.operands.push(hi);
                            op.texel_offsets[1] = 2;
                        }
                    }

                    if self.src[3].indices == self.src[4].indices {
                        let mut value = self.src[3].named("value");
                        value.comps = [self.src[3].comps[0], self.src[4].comps[0], 0xff, 0xff];
                        value.values[1] = self.src[4].values[0];
                        op.operands.push(value);
                        op.texel_offsets[2] = 1;
                    } else {
                        let mut lo = self.src[3].select_comp(0).named("value.x");
                        lo.comps = [self.src[3].comps[0], 0xff, 0xff, 0xff];
                        op.operands.push(lo);
                        let mut hi = self.src[4].select_comp(0).named("value.y");
                        hi.comps = [self.src[4].comps[0], 0xff, 0xff, 0xff];
                        op.operands.push(hi);
                        op.texel_offsets[2] = 2;
                    }
                }

                if phase == 0 {
                    self.dst[0] = dst_operand;
                }
            }
            _ => {
                return self.broken("unknown AMD extension opcode");
            }
        }

        // intermediate phases save operands without emitting
        if op.opcode != Opcode::VendorRemoved {
            self.emit(i, op);
        }
    }

    // ---- NVIDIA ----

    /// `IncrementCounter()` on the magic UAV.
    fn nv_increment(&mut self, i: usize, cur: &Instruction) {
        match self.state {
            State::Broken | State::AmdUavAtomic => {}
            State::Nothing => self.state = State::InstructionHeader,
            State::InstructionHeader => {
                self.broken("expected markUAV or opcode write before counter increment");
            }
            State::InstructionBody => {
                self.outputs_needed -= 1;
                if self.outputs_needed <= 0 {
                    self.state = State::Nothing;
                    if let Some(op) = self.nv_emit_simple(cur) {
                        self.emit(i, op);
                    }
                } else {
                    self.dst[(self.outputs_needed - 1) as usize] = cur.operands[0].clone();
                }
            }
            State::UavInstructionHeader1 => {
                self.broken("expected UAV write before counter increment");
            }
            State::UavInstructionHeader2 => self.state = State::UavInstructionBody,
            State::UavInstructionBody => {
                self.broken("unexpected counter increment in UAV instruction body");
            }
        }
    }

    /// Builds the vendor instruction for the "simple" NV protocol, emitted at
    /// the closing counter increment.
    fn nv_emit_simple(&mut self, cur: &Instruction) -> Option<Instruction> {
        let mut op = Instruction::new(Opcode::VendorRemoved, cur.offset);
        let result = cur.operands[0].clone();

        match self.nv_opcode {
            nv::SHUFFLE | nv::SHUFFLE_UP | nv::SHUFFLE_DOWN | nv::SHUFFLE_XOR => {
                op.opcode = match self.nv_opcode {
                    nv::SHUFFLE => Opcode::NvShuffle,
                    nv::SHUFFLE_UP => Opcode::NvShuffleUp,
                    nv::SHUFFLE_DOWN => Opcode::NvShuffleDown,
                    _ => Opcode::NvShuffleXor,
                };
                op.operands = vec![
                    result,
                    self.src[0].select_comp(0),
                    self.src[0].select_comp(1),
                    self.src[0].select_comp(3),
                ];
            }
            nv::VOTE_ALL | nv::VOTE_ANY | nv::VOTE_BALLOT => {
                op.opcode = match self.nv_opcode {
                    nv::VOTE_ALL => Opcode::NvVoteAll,
                    nv::VOTE_ANY => Opcode::NvVoteAny,
                    _ => Opcode::NvVoteBallot,
                };
                op.operands = vec![result, self.src[0].named("predicate")];
            }
            nv::GET_LANE_ID => {
                op.opcode = Opcode::NvGetLaneId;
                op.operands = vec![result];
            }
            nv::GET_SPECIAL => {
                if !self.src[0].is_literal() {
                    self.broken("expected literal special subopcode");
                    return None;
                }
                op.opcode = match self.src[0].values[0] {
                    nv::SPECIAL_THREAD_LT_MASK => Opcode::NvGetThreadLtMask,
                    nv::SPECIAL_FOOTPRINT_SINGLELOD => Opcode::NvGetFootprintSingleLod,
                    _ => {
                        self.broken("unexpected special subopcode");
                        return None;
                    }
                };
                op.operands = vec![result];
            }
            nv::MATCH_ANY => {
                op.opcode = Opcode::NvMatchAny;
                // src1 only carries the component count, which the value
                // operand already knows
                op.operands = vec![result, self.src[0].clone()];
            }
            nv::GET_SHADING_RATE => {
                op.opcode = Opcode::NvGetShadingRate;
                if self.dst[0].indices == result.indices && self.dst[1].indices == result.indices {
                    let mut compact = result.named("result");
                    compact.comps = [
                        self.dst[1].comps[0],
                        self.dst[0].comps[0],
                        result.comps[0],
                        0xff,
                    ];
                    op.operands = vec![compact];
                } else {
                    // reverse order: outputs arrived as the counter decremented
                    op.operands = vec![
                        self.dst[1].named("result.x"),
                        self.dst[0].named("result.y"),
                        result.named("result.z"),
                    ];
                }
            }
            nv::FOOTPRINT | nv::FOOTPRINT_BIAS | nv::FOOTPRINT_LEVEL | nv::FOOTPRINT_GRAD => {
                op.opcode = match self.nv_opcode {
                    nv::FOOTPRINT => Opcode::NvFootprint,
                    nv::FOOTPRINT_BIAS => Opcode::NvFootprintBias,
                    nv::FOOTPRINT_LEVEL => Opcode::NvFootprintLevel,
                    _ => Opcode::NvFootprintGrad,
                };

                if self.dst[0].indices == result.indices
                    && self.dst[1].indices == result.indices
                    && self.dst[2].indices == result.indices
                {
                    let mut compact = result.named("result");
                    compact.comps = [
                        self.dst[2].comps[0],
                        self.dst[1].comps[0],
                        self.dst[0].comps[0],
                        result.comps[0],
                    ];
                    op.operands = vec![compact];
                } else {
                    op.operands = vec![
                        self.dst[2].named("result.x"),
                        self.dst[1].named("result.y"),
                        self.dst[0].named("result.z"),
                        result.named("result.w"),
                    ];
                }

                op.operands.push(self.src[3].select_comp(0).named("texSpace"));
                op.operands.push(self.src[0].select_comp(0).named("texIndex"));
                op.operands.push(self.src[3].select_comp(1).named("smpSpace"));
                op.operands.push(self.src[0].select_comp(1).named("smpIndex"));
                op.operands.push(self.src[3].select_comp(2).named("texType"));
                let mut location = self.src[1].named("location");
                location.comps[3] = 0xff; // location is a float3
                location.values[3] = 0;
                op.operands.push(location);
                op.operands.push(self.src[3].select_comp(3).named("coarse"));
                op.operands.push(self.src[1].select_comp(3).named("gran"));

                match self.nv_opcode {
                    nv::FOOTPRINT_BIAS => {
                        op.operands.push(self.src[2].select_comp(0).named("bias"));
                    }
                    nv::FOOTPRINT_LEVEL => {
                        op.operands.push(self.src[2].select_comp(0).named("lodLevel"));
                    }
                    nv::FOOTPRINT_GRAD => {
                        op.operands.push(self.src[2].named("ddx"));
                        op.operands.push(self.src[5].named("ddy"));
                    }
                    _ => {}
                }

                op.operands.push(self.src[4].named("offset"));
            }
            nv::SHUFFLE_GENERIC => {
                op.opcode = Opcode::NvShuffleGeneric;
                op.operands = vec![
                    result,
                    self.dst[0].named("out laneValid"),
                    self.src[0].select_comp(0).named("value"),
                    self.src[0].select_comp(1).named("srcLane"),
                    self.src[0].select_comp(2).named("width"),
                ];
            }
            nv::VPRS_EVAL_ATTRIB_AT_SAMPLE | nv::VPRS_EVAL_ATTRIB_SNAPPED => {
                op.opcode = if self.nv_opcode == nv::VPRS_EVAL_ATTRIB_AT_SAMPLE {
                    Opcode::NvVprsEvalAttribAtSample
                } else {
                    Opcode::NvVprsEvalAttribSnapped
                };

                let n = self.num_outputs.clamp(1, 4) as usize;
                let all_same_reg = (0..n - 1).all(|o| self.dst[o].indices == result.indices);

                if all_same_reg {
                    let mut compact = result.named("result");
                    for o in 0..4 {
                        compact.comps[o] = if o >= n {
                            0xff
                        } else if o + 1 == n {
                            result.comps[0]
                        } else {
                            self.dst[n - 2 - o].comps[0]
                        };
                    }
                    op.operands = vec![compact];
                } else {
                    for o in 0..n - 1 {
                        op.operands
                            .push(self.dst[n - 2 - o].named(RESULT_COMP[o]));
                    }
                    op.operands.push(result.named(RESULT_COMP[n - 1]));
                }

                op.operands.push(self.src[0].named("attrib"));
                if self.nv_opcode == nv::VPRS_EVAL_ATTRIB_AT_SAMPLE {
                    op.operands.push(self.src[1].named("sampleIndex"));
                    op.operands.push(self.src[2].named("pixelOffset"));
                } else {
                    op.operands.push(self.src[1].named("offset"));
                }
            }
            _ => {
                self.broken("unexpected non-UAV NV opcode");
                return None;
            }
        }

        Some(op)
    }

    /// `store_structured` into the magic UAV: a parameter or opcode write.
    fn nv_store(&mut self, i: usize, cur: &Instruction) {
        let Some(slot_op) = cur.operands.get(2) else {
            return self.broken("malformed magic UAV write");
        };
        if !slot_op.is_literal() {
            return self.broken("expected literal UAV write offset");
        }
        let slot = slot_op.values[0];

        let Some(value) = cur.operands.get(3).cloned() else {
            return self.broken("malformed magic UAV write");
        };

        match slot {
            nv::SLOT_OPCODE => {
                if !value.is_literal() {
                    return self.broken("expected literal opcode write");
                }
                self.nv_opcode = value.values[0];

                // An FP16 atomic opcode seen in the plain header is really
                // the continuation of a multi-part UAV instruction.
                if self.state == State::InstructionHeader && self.nv_opcode == nv::FP16_ATOMIC {
                    self.state = State::UavInstructionBody;
                }

                if self.state == State::InstructionHeader {
                    if self.outputs_needed <= 0 {
                        self.num_outputs = 1;
                        self.outputs_needed = 1;
                    }
                    self.state = State::InstructionBody;
                } else if self.state == State::UavInstructionBody {
                    self.state = State::Nothing;
                    if let Some(op) = self.nv_emit_uav(cur) {
                        self.emit(i, op);
                    }
                } else {
                    self.broken("opcode write in unexpected state");
                }
            }
            nv::SLOT_MARK_UAV => {
                if !value.is_literal() || value.values[0] != 1 {
                    return self.broken("expected literal 1 written to markUAV");
                }
                if self.state == State::InstructionHeader {
                    self.state = State::UavInstructionHeader1;
                } else {
                    self.broken("markUAV write in unexpected state");
                }
            }
            // parameters are stored regardless of state
            nv::SLOT_SRC0 => self.src[0] = value,
            nv::SLOT_SRC1 => self.src[1] = value,
            nv::SLOT_SRC2 => self.src[2] = value,
            nv::SLOT_SRC3 => self.src[3] = value,
            nv::SLOT_SRC4 => self.src[4] = value,
            nv::SLOT_SRC5 => self.src[5] = value,
            nv::SLOT_DST => self.broken("unexpected store to dst member"),
            nv::SLOT_NUM_OUTPUTS => {
                if !value.is_literal() {
                    return self.broken("expected literal numOutputs write");
                }
                if self.state == State::InstructionHeader || self.state == State::InstructionBody {
                    self.num_outputs = value.values[0] as i32;
                    self.outputs_needed = self.num_outputs;
                } else {
                    self.broken("numOutputs write in unexpected state");
                }
            }
            _ => self.broken("unexpected member offset in magic UAV write"),
        }
    }

    /// Builds a UAV-protocol vendor instruction (fp16/fp32/u64 atomics),
    /// emitted at the closing opcode write.
    fn nv_emit_uav(&mut self, cur: &Instruction) -> Option<Instruction> {
        let mut op = Instruction::new(Opcode::VendorRemoved, cur.offset);

        // Write to the scratch index register for now; a later read of the
        // dst member patches in the real destination.
        op.operands.push(cur.operands[1].clone());
        op.operands.push(self.uav.clone());

        if !self.src[2].is_literal() {
            self.broken("expected literal atomic opcode");
            return None;
        }
        let atomicop = nv::convert_atomic(self.src[2].values[0]);

        match self.nv_opcode {
            nv::FP16_ATOMIC => {
                op.opcode = Opcode::NvFp16Atomic;
                op.operands.push(self.src[0].named("address"));
                op.operands.push(self.src[1].named("value"));
            }
            nv::FP32_ATOMIC => {
                op.opcode = Opcode::NvFp32Atomic;
                op.operands
                    .push(self.src[0].select_comp(0).named("byteAddress"));
                op.operands.push(self.src[1].select_comp(0).named("value"));
            }
            nv::U64_ATOMIC => {
                op.opcode = Opcode::NvU64Atomic;

                // second dummy return value for the high bits
                op.operands.insert(0, cur.operands[1].clone());
                for ret in op.operands.iter_mut().take(2) {
                    ret.op_type = OperandType::Null;
                    ret.comps = [0xff; 4];
                }

                let mut addr = self.src[0].clone();
                addr.num_components = NumComponents::One;
                addr.name = Some("address");
                op.operands.push(addr);

                // NV packs value (and compare value) pairs into one register
                op.texel_offsets = [1, 1, 1];

                if atomicop == Some(VendorAtomicOp::CompareAndSwap) {
                    let mut cmp = self.src[1].named("compareValue");
                    cmp.num_components = NumComponents::Four;
                    cmp.comps = [self.src[1].comps[0], self.src[1].comps[1], 0xff, 0xff];
                    cmp.values[1] = self.src[1].values[1];
                    op.operands.push(cmp);
                    let mut value = self.src[1].named("value");
                    value.num_components = NumComponents::Four;
                    value.comps = [self.src[1].comps[2], self.src[1].comps[3], 0xff, 0xff];
                    value.values[1] = self.src[1].values[3];
                    op.operands.push(value);
                } else {
                    let mut value = self.src[1].named("value");
                    value.num_components = NumComponents::Four;
                    value.comps = [self.src[1].comps[0], self.src[1].comps[1], 0xff, 0xff];
                    value.values[1] = self.src[1].values[1];
                    op.operands.push(value);
                }
            }
            _ => {
                self.broken("unexpected UAV-protocol NV opcode");
                return None;
            }
        }

        let Some(atomicop) = atomicop else {
            self.broken("couldn't determine atomic operation");
            return None;
        };
        op.vendor = Some(VendorOpData::Atomic(atomicop));

        Some(op)
    }

    /// `ld_structured` from the magic UAV: a read of the `dst` member, which
    /// retargets the most recent vendor instruction at the real destination.
    fn nv_load(&mut self, i: usize, cur: &Instruction) {
        if self.state != State::Nothing {
            return self.broken("unexpected magic UAV read");
        }
        let Some(slot_op) = cur.operands.get(2) else {
            return self.broken("malformed magic UAV read");
        };
        if !slot_op.is_literal() {
            return self.broken("expected literal UAV read offset");
        }
        if slot_op.values[0] != nv::SLOT_DST {
            return self.broken("unexpected UAV member read");
        }

        // search backwards for the vendor instruction being read from
        for j in (0..=i).rev() {
            if self.insts[j].opcode.is_vendor() {
                let mut op = self.insts[j].clone();
                op.offset = cur.offset;
                op.operands[0] = cur.operands[0].clone();

                // a 64-bit atomic returns low/high bits as separate operands
                if op.opcode == Opcode::NvU64Atomic {
                    op.operands[1] = cur.operands[0].clone();
                    op.operands[0].comps = [cur.operands[0].comps[0], 0xff, 0xff, 0xff];
                    op.operands[1].comps = [cur.operands[0].comps[1], 0xff, 0xff, 0xff];
                }

                // the placeholder has been replaced
                self.insts[j].opcode = Opcode::VendorRemoved;
                self.insts[i].opcode = Opcode::VendorRemoved;
                self.emit(i, op);
                return;
            }
        }
    }
}

fn operand_reg(inst: &Instruction, idx: usize) -> Option<u64> {
    inst.operands.get(idx).map(|op| op.reg())
}
