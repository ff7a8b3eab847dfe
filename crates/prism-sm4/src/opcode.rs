//! SM4/SM5 opcode numbering, mnemonics and opcode-token bitfields.
//!
//! Opcodes are numbered sequentially in the tokenized program format; the
//! table below lists them in wire order so the discriminant *is* the encoded
//! value. Pseudo opcodes used internally (vendor extensions, split custom-data
//! forms) follow the real range and are never produced by [`Opcode::from_raw`].

use bitflags::bitflags;

macro_rules! opcodes {
    ($($name:ident = $mnemonic:literal,)*) => {
        /// An SM4/SM5 instruction or declaration opcode.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[allow(missing_docs)]
        pub enum Opcode {
            $($name,)*
        }

        impl Opcode {
            /// Every opcode in wire order, pseudo opcodes last.
            pub const ALL: &'static [Opcode] = &[$(Opcode::$name,)*];

            /// The assembly mnemonic.
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Opcode::$name => $mnemonic,)*
                }
            }
        }
    };
}

opcodes! {
    // -- real opcodes, in wire order --
    Add = "add",
    And = "and",
    Break = "break",
    Breakc = "breakc",
    Call = "call",
    Callc = "callc",
    Case = "case",
    Continue = "continue",
    Continuec = "continuec",
    Cut = "cut",
    Default = "default",
    DerivRtx = "deriv_rtx",
    DerivRty = "deriv_rty",
    Discard = "discard",
    Div = "div",
    Dp2 = "dp2",
    Dp3 = "dp3",
    Dp4 = "dp4",
    Else = "else",
    Emit = "emit",
    EmitThenCut = "emitthencut",
    Endif = "endif",
    Endloop = "endloop",
    Endswitch = "endswitch",
    Eq = "eq",
    Exp = "exp",
    Frc = "frc",
    Ftoi = "ftoi",
    Ftou = "ftou",
    Ge = "ge",
    Iadd = "iadd",
    If = "if",
    Ieq = "ieq",
    Ige = "ige",
    Ilt = "ilt",
    Imad = "imad",
    Imax = "imax",
    Imin = "imin",
    Imul = "imul",
    Ine = "ine",
    Ineg = "ineg",
    Ishl = "ishl",
    Ishr = "ishr",
    Itof = "itof",
    Label = "label",
    Ld = "ld_indexable",
    LdMs = "ld_ms",
    Log = "log",
    Loop = "loop",
    Lt = "lt",
    Mad = "mad",
    Min = "min",
    Max = "max",
    CustomData = "customdata",
    Mov = "mov",
    Movc = "movc",
    Mul = "mul",
    Ne = "ne",
    Nop = "nop",
    Not = "not",
    Or = "or",
    Resinfo = "resinfo_indexable",
    Ret = "ret",
    Retc = "retc",
    RoundNe = "round_ne",
    RoundNi = "round_ni",
    RoundPi = "round_pi",
    RoundZ = "round_z",
    Rsq = "rsq",
    Sample = "sample_indexable",
    SampleC = "sample_c",
    SampleCLz = "sample_c_lz",
    SampleL = "sample_l",
    SampleD = "sample_d",
    SampleB = "sample_b",
    Sqrt = "sqrt",
    Switch = "switch",
    Sincos = "sincos",
    Udiv = "udiv",
    Ult = "ult",
    Uge = "uge",
    Umul = "umul",
    Umad = "umad",
    Umax = "umax",
    Umin = "umin",
    Ushr = "ushr",
    Utof = "utof",
    Xor = "xor",
    DclResource = "dcl_resource",
    DclConstantBuffer = "dcl_constantbuffer",
    DclSampler = "dcl_sampler",
    DclIndexRange = "dcl_indexRange",
    DclGsOutputPrimitiveTopology = "dcl_outputtopology",
    DclGsInputPrimitive = "dcl_inputprimitive",
    DclMaxOutputVertexCount = "dcl_maxout",
    DclInput = "dcl_input",
    DclInputSgv = "dcl_input_sgv",
    DclInputSiv = "dcl_input_siv",
    DclInputPs = "dcl_input_ps",
    DclInputPsSgv = "dcl_input_ps_sgv",
    DclInputPsSiv = "dcl_input_ps_siv",
    DclOutput = "dcl_output",
    DclOutputSgv = "dcl_output_sgv",
    DclOutputSiv = "dcl_output_siv",
    DclTemps = "dcl_temps",
    DclIndexableTemp = "dcl_indexableTemp",
    DclGlobalFlags = "dcl_globalFlags",
    Reserved0 = "reserved0",
    Lod = "lod",
    Gather4 = "gather4",
    SamplePos = "samplepos",
    SampleInfo = "sample_info",
    Reserved1 = "reserved1",
    HsDecls = "hs_decls",
    HsControlPointPhase = "hs_control_point_phase",
    HsForkPhase = "hs_fork_phase",
    HsJoinPhase = "hs_join_phase",
    EmitStream = "emit_stream",
    CutStream = "cut_stream",
    EmitThenCutStream = "emitThenCut_stream",
    InterfaceCall = "fcall",
    Bufinfo = "bufinfo",
    DerivRtxCoarse = "deriv_rtx_coarse",
    DerivRtxFine = "deriv_rtx_fine",
    DerivRtyCoarse = "deriv_rty_coarse",
    DerivRtyFine = "deriv_rty_fine",
    Gather4C = "gather4_c",
    Gather4Po = "gather4_po",
    Gather4PoC = "gather4_po_c",
    Rcp = "rcp",
    F32ToF16 = "f32tof16",
    F16ToF32 = "f16tof32",
    Uaddc = "uaddc",
    Usubb = "usubb",
    Countbits = "countbits",
    FirstbitHi = "firstbit_hi",
    FirstbitLo = "firstbit_lo",
    FirstbitShi = "firstbit_shi",
    Ubfe = "ubfe",
    Ibfe = "ibfe",
    Bfi = "bfi",
    Bfrev = "bfrev",
    Swapc = "swapc",
    DclStream = "dcl_stream",
    DclFunctionBody = "dcl_function_body",
    DclFunctionTable = "dcl_function_table",
    DclInterface = "dcl_interface",
    DclInputControlPointCount = "dcl_input_control_point_count",
    DclOutputControlPointCount = "dcl_output_control_point_count",
    DclTessDomain = "dcl_tessellator_domain",
    DclTessPartitioning = "dcl_tessellator_partitioning",
    DclTessOutputPrimitive = "dcl_tessellator_output_primitive",
    DclHsMaxTessfactor = "dcl_hs_max_tessfactor",
    DclHsForkPhaseInstanceCount = "dcl_hs_fork_phase_instance_count",
    DclHsJoinPhaseInstanceCount = "dcl_hs_join_phase_instance_count",
    DclThreadGroup = "dcl_thread_group",
    DclUavTyped = "dcl_uav_typed",
    DclUavRaw = "dcl_uav_raw",
    DclUavStructured = "dcl_uav_structured",
    DclTgsmRaw = "dcl_tgsm_raw",
    DclTgsmStructured = "dcl_tgsm_structured",
    DclResourceRaw = "dcl_resource_raw",
    DclResourceStructured = "dcl_resource_structured",
    LdUavTyped = "ld_uav_typed",
    StoreUavTyped = "store_uav_typed",
    LdRaw = "ld_raw",
    StoreRaw = "store_raw",
    LdStructured = "ld_structured",
    StoreStructured = "store_structured",
    AtomicAnd = "atomic_and",
    AtomicOr = "atomic_or",
    AtomicXor = "atomic_xor",
    AtomicCmpStore = "atomic_cmp_store",
    AtomicIadd = "atomic_iadd",
    AtomicImax = "atomic_imax",
    AtomicImin = "atomic_imin",
    AtomicUmax = "atomic_umax",
    AtomicUmin = "atomic_umin",
    ImmAtomicAlloc = "imm_atomic_alloc",
    ImmAtomicConsume = "imm_atomic_consume",
    ImmAtomicIadd = "imm_atomic_iadd",
    ImmAtomicAnd = "imm_atomic_and",
    ImmAtomicOr = "imm_atomic_or",
    ImmAtomicXor = "imm_atomic_xor",
    ImmAtomicExch = "imm_atomic_exch",
    ImmAtomicCmpExch = "imm_atomic_cmp_exch",
    ImmAtomicImax = "imm_atomic_imax",
    ImmAtomicImin = "imm_atomic_imin",
    ImmAtomicUmax = "imm_atomic_umax",
    ImmAtomicUmin = "imm_atomic_umin",
    Sync = "sync",
    Dadd = "dadd",
    Dmax = "dmax",
    Dmin = "dmin",
    Dmul = "dmul",
    Deq = "deq",
    Dge = "dge",
    Dlt = "dlt",
    Dne = "dne",
    Dmov = "dmov",
    Dmovc = "dmovc",
    Dtof = "dtof",
    Ftod = "ftod",
    EvalSnapped = "eval_snapped",
    EvalSampleIndex = "eval_sample_index",
    EvalCentroid = "eval_centroid",
    DclGsInstanceCount = "dcl_gs_instance_count",
    Abort = "abort",
    Debugbreak = "debugbreak",
    Reserved2 = "reserved2",
    Ddiv = "ddiv",
    Dfma = "dfma",
    Drcp = "drcp",
    Msad = "msad",
    Dtoi = "dtoi",
    Dtou = "dtou",
    Itod = "itod",
    Utod = "utod",
    Reserved3 = "reserved3",
    Gather4Feedback = "gather4_statusk",
    Gather4CFeedback = "gather4_c_status",
    Gather4PoFeedback = "gather4_po_statusk",
    Gather4PoCFeedback = "gather4_po_c_status",
    LdFeedback = "ld",
    LdMsFeedback = "ld_ms_status",
    LdUavTypedFeedback = "ld_uav_typed_status",
    LdRawFeedback = "ld_raw_status",
    LdStructuredFeedback = "ld_structured_status",
    SampleLFeedback = "sample_l_status",
    SampleCLzFeedback = "sample_c_lz_status",
    SampleClampFeedback = "sample_status",
    SampleBClampFeedback = "sample_b_status",
    SampleDClampFeedback = "sample_d_status",
    SampleCClampFeedback = "sample_c_status",
    CheckAccessFullyMapped = "check_access_fully_mapped",

    // -- pseudo opcodes, never on the wire --
    VendorRemoved = "vendor_removed",
    AmdReadfirstlane = "amd_readfirstlane",
    AmdReadlane = "amd_readlane",
    AmdLaneId = "amd_laneid",
    AmdSwizzle = "amd_swizzle",
    AmdBallot = "amd_ballot",
    AmdMbcnt = "amd_mbcnt",
    AmdMin3U = "amd_min3u",
    AmdMin3F = "amd_min3f",
    AmdMed3U = "amd_med3u",
    AmdMed3F = "amd_med3f",
    AmdMax3U = "amd_max3u",
    AmdMax3F = "amd_max3f",
    AmdBaryCoord = "amd_barycoord",
    AmdVtxParam = "amd_vtxparam",
    AmdGetViewportIndex = "amd_get_viewportindex",
    AmdGetRtArraySlice = "amd_get_rtarrayslice",
    AmdWaveReduce = "amd_wave_reduce",
    AmdWaveScan = "amd_wave_scan",
    AmdLoadDwAtAddr = "amd_loaddwataddr",
    AmdGetDrawIndex = "amd_get_drawindex",
    AmdU64Atomic = "amd_u64_atomic",
    AmdGetWaveSize = "amd_get_wavesize",
    AmdGetBaseInstance = "amd_get_baseinstance",
    AmdGetBaseVertex = "amd_get_basevertex",
    NvShuffle = "nv_shuffle",
    NvShuffleUp = "nv_shuffle_up",
    NvShuffleDown = "nv_shuffle_down",
    NvShuffleXor = "nv_shuffle_xor",
    NvVoteAll = "nv_vote_all",
    NvVoteAny = "nv_vote_any",
    NvVoteBallot = "nv_vote_ballot",
    NvGetLaneId = "nv_get_laneid",
    NvFp16Atomic = "nv_fp16_atomic",
    NvFp32Atomic = "nv_fp32_atomic",
    NvGetThreadLtMask = "nv_get_threadltmask",
    NvGetFootprintSingleLod = "nv_get_footprint_singlelod",
    NvU64Atomic = "nv_u64_atomic",
    NvMatchAny = "nv_match_any",
    NvFootprint = "nv_footprint",
    NvFootprintBias = "nv_footprint_bias",
    NvGetShadingRate = "nv_get_shading_rate",
    NvFootprintLevel = "nv_footprint_level",
    NvFootprintGrad = "nv_footprint_grad",
    NvShuffleGeneric = "nv_shuffle_generic",
    NvVprsEvalAttribAtSample = "nv_vprs_eval_attrib_at_sample",
    NvVprsEvalAttribSnapped = "nv_vprs_eval_attrib_snapped",
    DclImmediateConstantBuffer = "dcl_immediateConstantBuffer",
    OpaqueCustomData = "customdata",
    ShaderMessage = "shader_message",
}

impl Opcode {
    /// Number of opcodes that can appear in the token stream.
    pub const NUM_REAL: usize = Opcode::CheckAccessFullyMapped as usize + 1;

    /// First synthesized vendor-extension opcode.
    pub const FIRST_VENDOR: Opcode = Opcode::AmdReadfirstlane;

    /// Decodes the opcode field of an opcode token, rejecting values outside
    /// the real opcode range.
    pub fn from_raw(raw: u32) -> Option<Opcode> {
        let idx = raw as usize;
        if idx >= Self::NUM_REAL {
            return None;
        }
        Some(Self::ALL[idx])
    }

    /// `true` for declaration opcodes (including custom-data blocks, which are
    /// not executable).
    pub fn is_declaration(self) -> bool {
        (self >= Opcode::DclResource && self <= Opcode::DclGlobalFlags)
            || (self >= Opcode::DclStream && self <= Opcode::DclResourceStructured)
            || self == Opcode::DclGsInstanceCount
            || self == Opcode::HsDecls
            || self == Opcode::CustomData
    }

    /// `true` for synthesized vendor-extension opcodes.
    pub fn is_vendor(self) -> bool {
        self >= Opcode::AmdReadfirstlane && self <= Opcode::NvVprsEvalAttribSnapped
    }

    /// How many operands follow the opcode token (after any extended opcode
    /// tokens), per the tokenized program format.
    pub fn num_operands(self) -> usize {
        use Opcode::*;
        match self {
            Break | Continue | Cut | Default | Else | Emit | EmitThenCut | Endif | Endloop
            | Endswitch | Loop | Nop | Ret | Sync | Abort | Debugbreak | HsControlPointPhase
            | HsForkPhase | HsJoinPhase | HsDecls => 0,

            Breakc | Continuec | Call | Case | CutStream | Discard | EmitStream
            | EmitThenCutStream | If | InterfaceCall | Label | Retc | Switch => 1,

            Bfrev | Bufinfo | Countbits | DerivRtx | DerivRty | DerivRtxCoarse | DerivRtxFine
            | DerivRtyCoarse | DerivRtyFine | Dmov | Dtof | Exp | F32ToF16 | F16ToF32
            | FirstbitHi | FirstbitLo | FirstbitShi | Frc | Ftod | Ftoi | Ftou
            | ImmAtomicAlloc | ImmAtomicConsume | Ineg | Itof | Log | Mov | Not | Rcp
            | RoundNe | RoundNi | RoundPi | RoundZ | Rsq | SampleInfo | Sqrt | Utof
            | EvalCentroid | Drcp | Dtoi | Dtou | Itod | Utod | CheckAccessFullyMapped => 2,

            And | Add | AtomicAnd | AtomicOr | AtomicXor | AtomicIadd | AtomicImax
            | AtomicImin | AtomicUmax | AtomicUmin | Dadd | Div | Dp2 | Dp3 | Dp4 | Deq | Dge
            | Dlt | Dmax | Dmin | Dmul | Dne | Eq | Ge | Iadd | Ieq | Ige | Ilt | Imax | Imin
            | Ine | Ishl | Ishr | Ld | LdRaw | LdUavTyped | Lt | Max | Min | Mul | Ne | Or
            | Resinfo | SamplePos | Sincos | StoreRaw | StoreUavTyped | Uge | Ult | Umax
            | Umin | Ushr | Xor | EvalSnapped | EvalSampleIndex | Ddiv => 3,

            AtomicCmpStore | Dmovc | Gather4 | Ibfe | Imad | ImmAtomicIadd | ImmAtomicAnd
            | ImmAtomicOr | ImmAtomicXor | ImmAtomicExch | ImmAtomicImax | ImmAtomicImin
            | ImmAtomicUmax | ImmAtomicUmin | Imul | LdMs | LdStructured | Lod | Mad | Movc
            | Sample | StoreStructured | Uaddc | Ubfe | Udiv | Umad | Umul | Usubb | Dfma
            | Msad | LdFeedback | LdRawFeedback | LdUavTypedFeedback => 4,

            Bfi | Gather4C | Gather4Po | ImmAtomicCmpExch | SampleC | SampleCLz | SampleL
            | SampleB | Swapc | Gather4Feedback | LdMsFeedback | LdStructuredFeedback => 5,

            Gather4PoC | SampleD | SampleClampFeedback | SampleCClampFeedback
            | SampleCLzFeedback | SampleLFeedback | SampleBClampFeedback | Gather4CFeedback
            | Gather4PoFeedback => 6,

            SampleDClampFeedback | Gather4PoCFeedback => 7,

            _ => 0,
        }
    }
}

/// Custom-data block class, from the high bits of a `customdata` opcode token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum CustomDataClass {
    Comment,
    DebugInfo,
    Opaque,
    ImmediateConstantBuffer,
    ShaderMessage,
    ClipPlaneConstantMappings,
    /// A class this decoder does not recognize.
    Other(u32),
}

impl CustomDataClass {
    pub(crate) fn from_raw(raw: u32) -> CustomDataClass {
        match raw {
            0 => CustomDataClass::Comment,
            1 => CustomDataClass::DebugInfo,
            2 => CustomDataClass::Opaque,
            3 => CustomDataClass::ImmediateConstantBuffer,
            4 => CustomDataClass::ShaderMessage,
            5 => CustomDataClass::ClipPlaneConstantMappings,
            other => CustomDataClass::Other(other),
        }
    }
}

bitflags! {
    /// `dcl_globalFlags` bits, pre-shifted out of the opcode token.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct GlobalFlags: u32 {
        /// Refactoring of arithmetic is allowed.
        const REFACTORING_ALLOWED = 1 << 0;
        /// Double-precision float instructions are used.
        const DOUBLE_FLOAT_OPS = 1 << 1;
        /// Force early depth/stencil test.
        const FORCE_EARLY_DEPTH_STENCIL = 1 << 2;
        /// Raw and structured buffers are used.
        const RAW_STRUCTURED_BUFFERS = 1 << 3;
        /// Shader was compiled without optimisation.
        const SKIP_OPTIMISATION = 1 << 4;
        /// Minimum-precision types are used.
        const MIN_PRECISION = 1 << 5;
        /// 11.1 double-precision extension instructions are used.
        const DOUBLE_EXTENSIONS = 1 << 6;
        /// 11.1 shader extension instructions are used.
        const SHADER_EXTENSIONS = 1 << 7;
        /// All resources are promised bound for the shader's lifetime.
        const ALL_RESOURCES_BOUND = 1 << 8;
    }
}

bitflags! {
    /// `sync` instruction flags, pre-shifted out of the opcode token.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SyncFlags: u32 {
        /// Thread group execution barrier.
        const THREADS = 1 << 0;
        /// Thread group shared memory fence.
        const TGSM = 1 << 1;
        /// UAV fence, thread group scope.
        const UAV_GROUP = 1 << 2;
        /// UAV fence, global scope.
        const UAV_GLOBAL = 1 << 3;
    }
}

/// `resinfo` return type modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ResinfoRetType {
    Float,
    RcpFloat,
    Uint,
}

impl ResinfoRetType {
    pub(crate) fn from_raw(raw: u32) -> ResinfoRetType {
        match raw {
            1 => ResinfoRetType::RcpFloat,
            2 => ResinfoRetType::Uint,
            _ => ResinfoRetType::Float,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            ResinfoRetType::Float => "float",
            ResinfoRetType::RcpFloat => "rcpfloat",
            ResinfoRetType::Uint => "uint",
        }
    }
}

/// Accessors for the fields of an opcode token (token 0 of each instruction).
pub(crate) mod opcode_token {
    /// Opcode field, bits 0..11.
    pub fn opcode(t: u32) -> u32 {
        t & 0x7ff
    }

    /// Instruction length in dwords (including the opcode token), bits 24..31.
    pub fn length(t: u32) -> u32 {
        (t >> 24) & 0x7f
    }

    /// Bit 31: one or more extended opcode tokens follow.
    pub fn extended(t: u32) -> bool {
        t & 0x8000_0000 != 0
    }

    /// Custom-data class, bits 11..32 of a `customdata` opcode token.
    pub fn custom_class(t: u32) -> u32 {
        t >> 11
    }

    /// Saturate result modifier.
    pub fn saturate(t: u32) -> bool {
        t & 0x2000 != 0
    }

    /// Test-boolean for conditional ops: `true` = nonzero test.
    pub fn test_nonzero(t: u32) -> bool {
        t & 0x0004_0000 != 0
    }

    /// Precise-value component mask, bits 19..23.
    pub fn precise_mask(t: u32) -> u32 {
        (t >> 19) & 0xf
    }

    /// `resinfo` return type, bits 11..13.
    pub fn resinfo_ret(t: u32) -> u32 {
        (t >> 11) & 0x3
    }

    /// `sync` flags, bits 11..15.
    pub fn sync_flags(t: u32) -> u32 {
        (t >> 11) & 0xf
    }

    /// `dcl_globalFlags` bits, 11..20.
    pub fn global_flags(t: u32) -> u32 {
        (t >> 11) & 0x1ff
    }

    /// Structured UAV declarations: order-preserving counter present.
    pub fn has_order_preserving_counter(t: u32) -> bool {
        t & 0x0080_0000 != 0
    }

    /// Typed/raw/structured UAV declarations: globally coherent access.
    pub fn globally_coherent(t: u32) -> bool {
        t & 0x0001_0000 != 0
    }

    /// UAV declarations: rasterizer-ordered access.
    pub fn rasterizer_ordered(t: u32) -> bool {
        t & 0x0002_0000 != 0
    }

    /// Constant buffer declarations: dynamic vs immediate indexing.
    pub fn cb_dynamic_indexed(t: u32) -> bool {
        t & 0x800 != 0
    }

    /// Sampler declarations: sampler mode, bits 11..15.
    pub fn sampler_mode(t: u32) -> u32 {
        (t >> 11) & 0xf
    }

    /// Resource declarations: dimension, bits 11..16.
    pub fn resource_dim(t: u32) -> u32 {
        (t >> 11) & 0x1f
    }

    /// Multisampled resource declarations: sample count, bits 16..23.
    pub fn sample_count(t: u32) -> u32 {
        (t >> 16) & 0x7f
    }

    /// `dcl_input_ps` interpolation mode, bits 11..15.
    pub fn interpolation(t: u32) -> u32 {
        (t >> 11) & 0xf
    }

    /// Control point count declarations, bits 11..17.
    pub fn control_point_count(t: u32) -> u32 {
        (t >> 11) & 0x3f
    }

    /// Tessellator domain, bits 11..13.
    pub fn tess_domain(t: u32) -> u32 {
        (t >> 11) & 0x3
    }

    /// Tessellator partitioning, bits 11..14.
    pub fn tess_partitioning(t: u32) -> u32 {
        (t >> 11) & 0x7
    }

    /// Geometry shader input primitive, bits 11..17.
    pub fn input_primitive(t: u32) -> u32 {
        (t >> 11) & 0x3f
    }

    /// Geometry shader output topology, bits 11..17.
    pub fn output_topology(t: u32) -> u32 {
        (t >> 11) & 0x3f
    }

    /// Tessellator output primitive, bits 11..14.
    pub fn tess_output_primitive(t: u32) -> u32 {
        (t >> 11) & 0x7
    }
}

/// Accessors for extended opcode tokens.
pub(crate) mod extended_opcode {
    /// Extended token type, bits 0..6: 1 sample controls, 2 resource dim,
    /// 3 resource return type.
    pub fn ext_type(t: u32) -> u32 {
        t & 0x3f
    }

    /// Bit 31: another extended token follows.
    pub fn extended(t: u32) -> bool {
        t & 0x8000_0000 != 0
    }

    /// Sample controls: texel offsets, 4-bit two's complement.
    pub fn texel_offset(t: u32, axis: usize) -> i32 {
        let raw = match axis {
            0 => (t >> 9) & 0xf,
            1 => (t >> 13) & 0xf,
            _ => (t >> 17) & 0xf,
        } as i32;
        if raw > 7 {
            raw - 16
        } else {
            raw
        }
    }

    /// Resource dimension, bits 6..11.
    pub fn resource_dim(t: u32) -> u32 {
        (t >> 6) & 0x1f
    }

    /// Structured buffer stride, bits 11..23.
    pub fn buffer_stride(t: u32) -> u32 {
        (t >> 11) & 0xfff
    }

    /// Resource return type components, 4 bits each from bit 6.
    pub fn return_type(t: u32, comp: usize) -> u32 {
        (t >> (6 + comp * 4)) & 0xf
    }
}

pub(crate) const EXTENDED_OPCODE_SAMPLE_CONTROLS: u32 = 1;
pub(crate) const EXTENDED_OPCODE_RESOURCE_DIM: u32 = 2;
pub(crate) const EXTENDED_OPCODE_RESOURCE_RETURN_TYPE: u32 = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_numbering_is_sequential() {
        assert_eq!(Opcode::from_raw(0), Some(Opcode::Add));
        assert_eq!(Opcode::from_raw(54), Some(Opcode::Mov));
        assert_eq!(Opcode::from_raw(62), Some(Opcode::Ret));
        assert_eq!(Opcode::from_raw(106), Some(Opcode::DclGlobalFlags));
        assert_eq!(Opcode::from_raw(168), Some(Opcode::StoreStructured));
        assert_eq!(Opcode::from_raw(178), Some(Opcode::ImmAtomicAlloc));
        assert_eq!(Opcode::from_raw(185), Some(Opcode::ImmAtomicCmpExch));
        assert_eq!(Opcode::from_raw(234), Some(Opcode::CheckAccessFullyMapped));
    }

    #[test]
    fn pseudo_opcodes_never_decode() {
        assert_eq!(Opcode::from_raw(Opcode::NUM_REAL as u32), None);
        assert_eq!(Opcode::from_raw(0x7ff), None);
    }

    #[test]
    fn declarations_are_recognized() {
        assert!(Opcode::DclResource.is_declaration());
        assert!(Opcode::DclGlobalFlags.is_declaration());
        assert!(Opcode::DclStream.is_declaration());
        assert!(Opcode::DclResourceStructured.is_declaration());
        assert!(Opcode::DclGsInstanceCount.is_declaration());
        assert!(Opcode::HsDecls.is_declaration());
        assert!(Opcode::CustomData.is_declaration());
        assert!(!Opcode::Mov.is_declaration());
        assert!(!Opcode::HsForkPhase.is_declaration());
    }

    #[test]
    fn operand_counts_match_format() {
        assert_eq!(Opcode::Ret.num_operands(), 0);
        assert_eq!(Opcode::If.num_operands(), 1);
        assert_eq!(Opcode::Mov.num_operands(), 2);
        assert_eq!(Opcode::Add.num_operands(), 3);
        assert_eq!(Opcode::Sample.num_operands(), 4);
        assert_eq!(Opcode::SampleL.num_operands(), 5);
        assert_eq!(Opcode::SampleD.num_operands(), 6);
        assert_eq!(Opcode::SampleDClampFeedback.num_operands(), 7);
    }

    #[test]
    fn length_field_sits_in_high_bits() {
        let token = 54 | (8 << 24);
        assert_eq!(opcode_token::opcode(token), 54);
        assert_eq!(opcode_token::length(token), 8);
        assert!(!opcode_token::extended(token));
    }

    #[test]
    fn texel_offsets_are_twos_complement() {
        // u = -1, v = 7, w = 0
        let token = EXTENDED_OPCODE_SAMPLE_CONTROLS | (0xf << 9) | (7 << 13);
        assert_eq!(extended_opcode::texel_offset(token, 0), -1);
        assert_eq!(extended_opcode::texel_offset(token, 1), 7);
        assert_eq!(extended_opcode::texel_offset(token, 2), 0);
    }
}
