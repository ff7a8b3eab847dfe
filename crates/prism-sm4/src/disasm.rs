//! Assembly listing generation.
//!
//! The formatter is a pure function over a decoded [`Program`]: it never
//! mutates the program and produces the same text for the same input, so line
//! numbers in the listing are stable across runs. When reflection data is
//! available and friendly naming is enabled, register references are replaced
//! with source-level names wherever the mapping is unambiguous.

use prism_dxbc::{RdefChunk, ShaderStage, VarClass};
use tracing::warn;

use crate::decode::{DeclKind, Declaration, Instruction, Program};
use crate::opcode::{GlobalFlags, Opcode, SyncFlags};
use crate::operand::{NumComponents, Operand, OperandIndex, OperandModifier, OperandType};

/// A rendered program listing.
#[derive(Debug, Clone)]
pub struct Disassembly {
    /// The listing text.
    pub text: String,
    /// 1-based line of each instruction within `text`, by instruction index.
    pub instruction_lines: Vec<u32>,
}

/// Renders the whole program: target line, declarations, then numbered and
/// indented instructions.
pub(crate) fn disassemble(
    program: &Program,
    reflection: Option<&RdefChunk>,
    friendly: bool,
) -> Disassembly {
    if program.declarations.is_empty() && program.instructions.is_empty() {
        return Disassembly {
            text: "No bytecode in this blob".to_owned(),
            instruction_lines: Vec::new(),
        };
    }

    let fmt = Formatter {
        program,
        reflection: if friendly { reflection } else { None },
    };

    let target = match program.stage {
        ShaderStage::Pixel => "ps",
        ShaderStage::Vertex => "vs",
        ShaderStage::Geometry => "gs",
        ShaderStage::Hull => "hs",
        ShaderStage::Domain => "ds",
        ShaderStage::Compute => "cs",
        ShaderStage::Other(raw) => {
            warn!(raw, "unknown stage in listing");
            "xs"
        }
    };
    let mut text = format!("{}_{}_{}\n", target, program.major, program.minor);

    let mut linenum: u32 = 2;
    let mut indent: i32 = 0;
    let mut d = 0;
    let mut instruction_lines = Vec::with_capacity(program.instructions.len());

    for (i, inst) in program.instructions.iter().enumerate() {
        while d < program.declarations.len() {
            if program.declarations[d].instruction > i {
                if i == 0 {
                    text.push('\n');
                    linenum += 1;
                }
                break;
            }

            let str = fmt.declaration_str(&program.declarations[d]);
            text.push_str("      ");
            text.push_str(&str);
            text.push('\n');
            linenum += 1 + str.matches('\n').count() as u32;
            d += 1;
        }

        if matches!(inst.opcode, Opcode::Endif | Opcode::Endloop) {
            indent -= 1;
        }
        let cur_indent = if inst.opcode == Opcode::Else {
            indent - 1
        } else {
            indent
        };

        instruction_lines.push(linenum);
        text.push_str(&format!("{i:4}: "));
        for _ in 0..cur_indent.max(0) {
            text.push_str("  ");
        }
        text.push_str(&fmt.instruction_str(inst));
        text.push('\n');
        linenum += 1;

        if matches!(inst.opcode, Opcode::If | Opcode::Loop) {
            indent += 1;
        }
    }

    Disassembly {
        text,
        instruction_lines,
    }
}

struct Formatter<'a> {
    program: &'a Program,
    /// Present only when friendly naming is on.
    reflection: Option<&'a RdefChunk>,
}

#[derive(Clone, Copy, Default)]
struct OperandFlags {
    /// Printing inside a declaration.
    decl: bool,
    /// Append the swizzle/mask suffix.
    swizzle: bool,
}

impl OperandFlags {
    fn swizzled() -> OperandFlags {
        OperandFlags {
            decl: false,
            swizzle: true,
        }
    }

    fn in_decl(swizzle: bool) -> OperandFlags {
        OperandFlags {
            decl: true,
            swizzle,
        }
    }
}

impl Formatter<'_> {
    // ------------------------------------------------------------------
    // instructions

    fn instruction_str(&self, inst: &Instruction) -> String {
        if inst.opcode == Opcode::ShaderMessage {
            return self.shader_message_str(inst);
        }

        let mut str = inst.opcode.mnemonic().to_owned();

        if let Some(vendor) = &inst.vendor {
            vendor.append_suffix(&mut str);
        } else {
            // Suffixes from extended opcode tokens, in token order.
            if inst.texel_offsets != [0; 3] {
                str += &format!(
                    "({},{},{})",
                    inst.texel_offsets[0], inst.texel_offsets[1], inst.texel_offsets[2]
                );
            }
            if let Some(dim) = inst.resource_dim {
                if inst.opcode == Opcode::LdStructured {
                    str += &format!(
                        "_indexable({}, stride={})",
                        resource_dim_str(dim),
                        inst.dim_stride
                    );
                } else {
                    str += &format!("({})", resource_dim_str(dim));
                }
            }
            if let Some(ret) = inst.return_type {
                str += &format!(
                    "({},{},{},{})",
                    resource_ret_type_str(ret[0]),
                    resource_ret_type_str(ret[1]),
                    resource_ret_type_str(ret[2]),
                    resource_ret_type_str(ret[3])
                );
            }
        }

        if inst.opcode == Opcode::Resinfo {
            str.push('_');
            str += inst.resinfo_ret.as_str();
        }

        if inst.opcode == Opcode::Sync {
            if inst.sync_flags.contains(SyncFlags::UAV_GLOBAL) {
                str += "_uglobal";
            }
            if inst.sync_flags.contains(SyncFlags::UAV_GROUP) {
                str += "_ugroup";
            }
            if inst.sync_flags.contains(SyncFlags::TGSM) {
                str += "_g";
            }
            if inst.sync_flags.contains(SyncFlags::THREADS) {
                str += "_t";
            }
        }

        if matches!(
            inst.opcode,
            Opcode::If
                | Opcode::Breakc
                | Opcode::Callc
                | Opcode::Continuec
                | Opcode::Retc
                | Opcode::Discard
        ) {
            str += if inst.nonzero { "_nz" } else { "_z" };
        }

        if inst.opcode != Opcode::Sync && inst.saturate {
            str += "_sat";
        }

        if inst.precise_mask != 0 {
            let mut precise = String::new();
            for (bit, c) in [(1, 'x'), (2, 'y'), (4, 'z'), (8, 'w')] {
                if inst.precise_mask & bit != 0 {
                    precise.push(c);
                }
            }
            str += &format!(" [precise({precise})] ");
        }

        for (i, operand) in inst.operands.iter().enumerate() {
            str += if i == 0 { " " } else { ", " };
            str += &self.operand_str(operand, OperandFlags::swizzled());
        }

        str
    }

    fn shader_message_str(&self, inst: &Instruction) -> String {
        let mut str = String::new();
        if let Some(msg) = &inst.msg {
            str += if msg.printf { "errorf" } else { "error" };
            str += &format!(" \"{}\"", msg.format.replace('\n', "\\n"));
        }
        for operand in &inst.operands {
            str += ", ";
            str += &self.operand_str(operand, OperandFlags::swizzled());
        }
        str
    }

    // ------------------------------------------------------------------
    // declarations

    fn declaration_str(&self, decl: &Declaration) -> String {
        let mut str = decl.opcode.mnemonic().to_owned();
        let operand = |swizzle| {
            decl.operand
                .as_ref()
                .map(|op| self.operand_str(op, OperandFlags::in_decl(swizzle)))
                .unwrap_or_default()
        };

        match &decl.kind {
            DeclKind::GlobalFlags(flags) => {
                str.push(' ');
                let names = [
                    (GlobalFlags::REFACTORING_ALLOWED, "refactoringAllowed"),
                    (GlobalFlags::DOUBLE_FLOAT_OPS, "doublePrecisionFloats"),
                    (
                        GlobalFlags::FORCE_EARLY_DEPTH_STENCIL,
                        "forceEarlyDepthStencil",
                    ),
                    (
                        GlobalFlags::RAW_STRUCTURED_BUFFERS,
                        "enableRawAndStructuredBuffers",
                    ),
                    (GlobalFlags::SKIP_OPTIMISATION, "skipOptimisation"),
                    (GlobalFlags::MIN_PRECISION, "enableMinPrecision"),
                    (GlobalFlags::DOUBLE_EXTENSIONS, "doubleExtensions"),
                    (GlobalFlags::SHADER_EXTENSIONS, "shaderExtensions"),
                    (GlobalFlags::ALL_RESOURCES_BOUND, "d3d12AllResourcesBound"),
                ];
                let mut added = false;
                for (flag, name) in names {
                    if flags.contains(flag) {
                        if added {
                            str += ", ";
                        }
                        str += name;
                        added = true;
                    }
                }
            }
            DeclKind::ConstantBuffer {
                dynamic,
                vec4_count,
                space,
            } => {
                str.push(' ');
                str += &operand(false);
                if let Some(count) = vec4_count {
                    str += &format!("[{count}]");
                }
                str += ", ";
                str += if *dynamic {
                    "dynamicIndexed"
                } else {
                    "immediateIndexed"
                };
                self.append_space_reg(&mut str, *space, decl, true);
            }
            DeclKind::InOut => {
                str.push(' ');
                // dcl_stream prints its operand without a swizzle.
                str += &operand(decl.opcode != Opcode::DclStream);
            }
            DeclKind::InOutSiv { sv } | DeclKind::InputPsSiv { sv, .. } => {
                str.push(' ');
                str += &operand(true);
                str += ", ";
                str += sv_semantic_str(*sv);
            }
            DeclKind::InputPs { interp } => {
                str.push(' ');
                str += interpolation_str(*interp);
                str.push(' ');
                str += &operand(true);
            }
            DeclKind::Temps(count) => str += &format!(" {count}"),
            DeclKind::IndexableTemp { reg, count, comps } => {
                str += &format!(" x{reg}[{count}], {comps}")
            }
            DeclKind::IndexRange { count } => {
                str.push(' ');
                str += &operand(true);
                str += &format!(" {count}");
            }
            DeclKind::MaxOutputVertexCount(count) => str += &format!("  {count}"),
            DeclKind::Sampler { mode, space } => {
                str.push(' ');
                str += &operand(false);
                str += ", ";
                str += match mode {
                    1 => "mode_comparison",
                    2 => "mode_mono",
                    _ => "mode_default",
                };
                self.append_space_reg(&mut str, *space, decl, false);
            }
            DeclKind::Resource {
                dim,
                sample_count,
                ret,
                space,
            } => {
                str.push('_');
                str += resource_dim_str(*dim);
                if *sample_count > 0 {
                    str += &format!("({sample_count})");
                }
                str.push(' ');
                str += &ret_types_str(ret);
                str.push(' ');
                str += &operand(false);
                self.append_space_reg(&mut str, *space, decl, false);
            }
            DeclKind::UavTyped {
                dim,
                ret,
                coherent,
                rov,
                space,
            } => {
                str.push('_');
                str += resource_dim_str(*dim);
                if *coherent {
                    str += "_glc";
                }
                str.push(' ');
                str += &ret_types_str(ret);
                str.push(' ');
                str += &operand(false);
                if *rov {
                    str += ", rasterizerOrderedAccess";
                }
                self.append_space_reg(&mut str, *space, decl, false);
            }
            DeclKind::RawBuffer {
                coherent,
                rov,
                space,
            } => {
                str.push(' ');
                str += &operand(false);
                if *coherent {
                    str += ", globallyCoherant";
                }
                if *rov {
                    str += ", rasterizerOrderedAccess";
                }
                self.append_space_reg(&mut str, *space, decl, false);
            }
            DeclKind::StructuredBuffer {
                stride,
                counter,
                coherent,
                rov,
                space,
            } => {
                str.push(' ');
                str += &operand(false);
                str += &format!(", {stride}");
                if *counter {
                    str += ", hasOrderPreservingCounter";
                }
                if *coherent {
                    str += ", globallyCoherant";
                }
                if *rov {
                    str += ", rasterizerOrderedAccess";
                }
                self.append_space_reg(&mut str, *space, decl, false);
            }
            DeclKind::Tgsm { stride, count } => {
                str.push(' ');
                str += &operand(false);
                if let Some(stride) = stride {
                    str += &format!(", {stride}");
                }
                str += &format!(", {count}");
            }
            DeclKind::ThreadGroup([x, y, z]) => str += &format!(" {x}, {y}, {z}"),
            DeclKind::ControlPointCount(count) => str += &format!(" {count}"),
            DeclKind::TessDomain(domain) => {
                str.push(' ');
                str += match domain {
                    1 => "domain_isoline",
                    2 => "domain_tri",
                    3 => "domain_quad",
                    _ => "domain_undefined",
                };
            }
            DeclKind::TessPartitioning(partitioning) => {
                str.push(' ');
                str += match partitioning {
                    1 => "partitioning_integer",
                    2 => "partitioning_pow2",
                    3 => "partitioning_fractional_odd",
                    4 => "partitioning_fractional_even",
                    _ => "partitioning_undefined",
                };
            }
            DeclKind::TessOutputPrimitive(prim) => {
                str.push(' ');
                str += match prim {
                    1 => "output_point",
                    2 => "output_line",
                    3 => "output_triangle_cw",
                    4 => "output_triangle_ccw",
                    _ => "output_undefined",
                };
            }
            DeclKind::GsInputPrimitive(prim) => {
                str.push(' ');
                match prim {
                    1 => str += "point",
                    2 => str += "line",
                    3 => str += "triangle",
                    6 => str += "line_adj",
                    7 => str += "triangle_adj",
                    8..=39 => str += &format!("control_point_patch_{}", prim - 7),
                    _ => str += "undefined",
                }
            }
            DeclKind::GsOutputTopology(topology) => {
                str.push(' ');
                str += match topology {
                    1 => "point",
                    2 => "linelist",
                    3 => "linestrip",
                    4 => "trianglelist",
                    5 => "trianglestrip",
                    10 => "linelist_adj",
                    11 => "linestrip_adj",
                    12 => "trianglelist_adj",
                    13 => "trianglestrip_adj",
                    _ => "undefined",
                };
            }
            DeclKind::InstanceCount(count) => str += &format!(" {count}"),
            DeclKind::MaxTessFactor(factor) => str += &format!(" l({factor:.6})"),
            DeclKind::FunctionBody(id) => str += &format!(" fb{id}"),
            DeclKind::FunctionTable { id, bodies } => {
                str += &format!(" ft{id}");
                str += " = {";
                for (i, body) in bodies.iter().enumerate() {
                    str += &format!("fb{body}");
                    if i + 1 < bodies.len() {
                        str += ", ";
                    }
                }
                str.push('}');
            }
            DeclKind::Interface {
                id,
                num_types,
                num_interfaces,
                tables,
            } => {
                str += &format!(" fp{id}[{num_interfaces}][{num_types}]");
                str += " = {";
                for (i, table) in tables.iter().enumerate() {
                    str += &format!("ft{table}");
                    if i + 1 < tables.len() {
                        str += ", ";
                    }
                }
                str.push('}');
            }
            DeclKind::ImmediateConstantBuffer(values) => {
                str += " {";
                for (i, value) in values.iter().enumerate() {
                    if i % 4 == 0 {
                        str += "\n\t\t\t{ ";
                    }
                    str += &immediate_str(std::slice::from_ref(value));
                    if (i + 1) % 4 == 0 {
                        str.push('}');
                    }
                    if i + 1 < values.len() {
                        str += ", ";
                    }
                }
                str += " }";
            }
            DeclKind::HsPhaseDecls => {}
        }

        str
    }

    /// Shader model 5.1 register-space suffix: ` space=N,reg=R` for plain
    /// bindings, `,regs=lo:hi` for arrayed ones.
    fn append_space_reg(&self, str: &mut String, space: Option<u32>, decl: &Declaration, cb: bool) {
        let Some(space) = space else { return };
        *str += &format!(" space={space}");

        let Some(operand) = &decl.operand else { return };
        if operand.indices.len() < 3 {
            return;
        }
        let lo = operand.indices[1].index;
        let hi = operand.indices[2].index;
        if lo == hi {
            *str += &format!(",reg={lo}");
        } else if cb && hi == u64::from(u32::MAX) {
            *str += &format!(",regs={lo}:unbound");
        } else {
            *str += &format!(",regs={lo}:{hi}");
        }
    }

    // ------------------------------------------------------------------
    // operands

    fn declaration_for(&self, operand: &Operand) -> Option<&Declaration> {
        operand
            .decl_index
            .and_then(|i| self.program.declarations.get(i))
    }

    fn index_str(&self, index: &OperandIndex) -> String {
        match &index.relative {
            Some(rel) => format!(
                "[{} + {}]",
                self.operand_str(rel, OperandFlags::swizzled()),
                index.index
            ),
            None => index.index.to_string(),
        }
    }

    fn operand_str(&self, operand: &Operand, flags: OperandFlags) -> String {
        let mut comps = operand.comps;
        let mut str;
        let mut regstr = String::new();

        let idx = |i: usize| self.index_str(&operand.indices[i]);

        match operand.op_type {
            OperandType::Null => str = "null".to_owned(),
            OperandType::Interface => {
                str = format!("fp{}[{}][{}]", idx(0), idx(1), operand.func_num);
            }
            OperandType::Resource | OperandType::Sampler | OperandType::UnorderedAccessView => {
                match operand.indices.len() {
                    1 => {
                        str = match operand.op_type {
                            OperandType::Resource => "t",
                            OperandType::Sampler => "s",
                            _ => "u",
                        }
                        .to_owned();
                        str += &idx(0);

                        if let Some(rdef) = self.reflection {
                            let reg = operand.indices[0].index as u32;
                            let list = match operand.op_type {
                                OperandType::Resource => &rdef.srvs,
                                OperandType::UnorderedAccessView => &rdef.uavs,
                                _ => &rdef.samplers,
                            };
                            if let Some(bind) =
                                list.iter().find(|b| b.reg == reg && b.space == 0)
                            {
                                if flags.decl {
                                    regstr = str;
                                }
                                str = bind.name.clone();
                            }
                        }
                    }
                    3 => {
                        // Declaration form: the range bounds live in the
                        // second and third index.
                        str = match operand.op_type {
                            OperandType::Resource => "T",
                            OperandType::Sampler => "S",
                            _ => "U",
                        }
                        .to_owned();
                        let lo = operand.indices[1].index;
                        let hi = operand.indices[2].index;
                        if lo == hi {
                            str += &idx(0);
                        } else if hi == u64::from(u32::MAX) {
                            str += &format!("{}[{}:unbound]", idx(0), idx(1));
                        } else {
                            str += &format!("{}[{}:{}]", idx(0), idx(1), idx(2));
                        }
                    }
                    2 => {
                        str = match operand.op_type {
                            OperandType::Resource => "T",
                            OperandType::Sampler => "S",
                            _ => "U",
                        }
                        .to_owned();
                        // Non-arrayed bindings collapse to just the ID.
                        let non_arrayed = self.declaration_for(operand).is_some_and(|d| {
                            d.operand.as_ref().is_some_and(|op| {
                                op.indices.len() >= 3
                                    && op.indices[1].index == op.indices[2].index
                            })
                        });
                        if non_arrayed {
                            str += &idx(0);
                        } else if operand.indices[1].relative.is_some() {
                            str += &format!("{}{}", idx(0), idx(1));
                        } else {
                            str += &format!("{}[{}]", idx(0), idx(1));
                        }
                    }
                    dims => {
                        warn!(?dims, "unexpected resource operand dimensions");
                        str = "oUnsupported".to_owned();
                    }
                }
            }
            OperandType::ConstantBuffer => {
                if operand.indices.len() == 3 {
                    str = "CB".to_owned();
                    if let Some(decl) = self.declaration_for(operand) {
                        let non_arrayed = decl.operand.as_ref().is_some_and(|op| {
                            op.indices.len() >= 3 && op.indices[1].index == op.indices[2].index
                        });
                        if non_arrayed {
                            str += &idx(0);
                            if operand.indices[2].relative.is_some() {
                                str += &idx(2);
                            } else {
                                str += &format!("[{}]", idx(2));
                            }
                        } else {
                            str += &idx(0);
                            if operand.indices[1].relative.is_some() {
                                str += &idx(1);
                            } else {
                                str += &format!("[{}]", idx(1));
                            }
                            if operand.indices[2].relative.is_some() {
                                str += &idx(1);
                            } else {
                                str += &format!("[{}]", idx(2));
                            }
                        }
                    } else {
                        // Inside the declaration itself: print the range.
                        let lo = operand.indices[1].index;
                        let hi = operand.indices[2].index;
                        if lo == hi {
                            str += &idx(0);
                        } else if hi == u64::from(u32::MAX) {
                            str += &format!("{}[{}:unbound]", idx(0), idx(1));
                        } else {
                            str += &format!("{}[{}:{}]", idx(0), idx(1), idx(2));
                        }
                    }
                } else {
                    str = "cb".to_owned();
                    if operand.indices[1].relative.is_some() {
                        str += &format!("{}{}", idx(0), idx(1));
                    } else {
                        str += &format!("{}[{}]", idx(0), idx(1));
                    }

                    if let Some(name) = self.friendly_cbuffer_var(operand, &mut comps) {
                        str = name;
                    }
                }
            }
            OperandType::Temp
            | OperandType::Output
            | OperandType::Stream
            | OperandType::ThreadGroupSharedMemory
            | OperandType::FunctionBody => {
                str = match operand.op_type {
                    OperandType::Temp => "r",
                    OperandType::Output => "o",
                    OperandType::Stream => "m",
                    OperandType::ThreadGroupSharedMemory => "g",
                    _ => "fb",
                }
                .to_owned();
                if !operand.indices.is_empty() {
                    str += &idx(0);
                }
            }
            OperandType::ImmediateConstantBuffer
            | OperandType::IndexableTemp
            | OperandType::Input
            | OperandType::InputControlPoint
            | OperandType::InputPatchConstant
            | OperandType::ThisPointer
            | OperandType::OutputControlPoint => {
                str = match operand.op_type {
                    OperandType::ImmediateConstantBuffer => "icb",
                    OperandType::IndexableTemp => "x",
                    OperandType::Input => "v",
                    OperandType::InputControlPoint => "vicp",
                    OperandType::InputPatchConstant => "vpc",
                    OperandType::OutputControlPoint => "vocp",
                    _ => "this",
                }
                .to_owned();

                if operand.indices.len() == 1
                    && operand.op_type != OperandType::ImmediateConstantBuffer
                {
                    str += &idx(0);
                } else {
                    for (i, index) in operand.indices.iter().enumerate() {
                        if i == 0 && operand.op_type == OperandType::IndexableTemp {
                            str += &self.index_str(index);
                            continue;
                        }
                        if index.relative.is_some() {
                            str += &self.index_str(index);
                        } else {
                            str += &format!("[{}]", self.index_str(index));
                        }
                    }
                }
            }
            OperandType::Imm32 => {
                let n = if operand.num_components == NumComponents::One {
                    1
                } else {
                    4
                };
                str = format!("l({})", immediate_str(&operand.values[..n]));
            }
            OperandType::Imm64 => {
                let d0 = f64::from_bits(
                    (u64::from(operand.values[1]) << 32) | u64::from(operand.values[0]),
                );
                let d1 = f64::from_bits(
                    (u64::from(operand.values[3]) << 32) | u64::from(operand.values[2]),
                );
                str = format!("d({d0:.6}l, {d1:.6}l)");
            }
            OperandType::Rasterizer => str = "rasterizer".to_owned(),
            OperandType::OutputControlPointId => str = "vOutputControlPointID".to_owned(),
            OperandType::InputDomainPoint => str = "vDomain".to_owned(),
            OperandType::InputPrimitiveId => str = "vPrim".to_owned(),
            OperandType::InputCoverageMask => str = "vCoverageMask".to_owned(),
            OperandType::InputGsInstanceId => str = "vGSInstanceID".to_owned(),
            OperandType::InputThreadId => str = "vThreadID".to_owned(),
            OperandType::InputThreadGroupId => str = "vThreadGroupID".to_owned(),
            OperandType::InputThreadIdInGroup => str = "vThreadIDInGroup".to_owned(),
            OperandType::InputThreadIdInGroupFlattened => {
                str = "vThreadIDInGroupFlattened".to_owned()
            }
            OperandType::InputForkInstanceId => str = "vForkInstanceID".to_owned(),
            OperandType::InputJoinInstanceId => str = "vJoinInstanceID".to_owned(),
            OperandType::OutputDepth => str = "oDepth".to_owned(),
            OperandType::OutputDepthLessEqual => str = "oDepthLessEqual".to_owned(),
            OperandType::OutputDepthGreaterEqual => str = "oDepthGreaterEqual".to_owned(),
            OperandType::OutputCoverageMask => str = "oMask".to_owned(),
            OperandType::OutputStencilRef => str = "oStencilRef".to_owned(),
            other => {
                warn!(?other, "unsupported operand type in listing");
                str = "oUnsupported".to_owned();
            }
        }

        if flags.swizzle && comps.iter().any(|&c| c < 4) {
            str.push('.');
            for &c in &comps {
                if c < 4 {
                    str.push(COMP_CHARS[c as usize]);
                }
            }
        }

        if let Some(suffix) = operand.precision.suffix() {
            str += suffix;
        }

        match operand.modifier {
            OperandModifier::None => {}
            OperandModifier::Neg => str = format!("-{str}"),
            OperandModifier::Abs => str = format!("abs({str})"),
            OperandModifier::AbsNeg => str = format!("-abs({str})"),
        }

        if flags.decl && !regstr.is_empty() {
            str += &format!(" ({regstr})");
        }

        if let Some(name) = operand.name {
            str = format!("{name}={str}");
        }

        str
    }

    /// Resolves `cbN[index]` to a source-level variable name, with array and
    /// matrix indices, rebasing the swizzle for variables that don't start on
    /// a register boundary. Only constant second indices can be resolved.
    fn friendly_cbuffer_var(&self, operand: &Operand, comps: &mut [u8; 4]) -> Option<String> {
        let rdef = self.reflection?;
        if operand.indices[1].relative.is_some() {
            return None;
        }

        let reg = operand.indices[0].index as u32;
        let cbuffer = rdef
            .cbuffers
            .iter()
            .find(|cb| cb.space == 0 && cb.reg == reg)?;

        let mut min_comp = u32::from(comps[0]);
        let mut max_comp = u32::from(comps[0]);
        for &c in &comps[1..] {
            if c < 4 {
                min_comp = min_comp.min(u32::from(c));
                max_comp = max_comp.max(u32::from(c));
            }
        }

        let vec_index = operand.indices[1].index as u32;
        let mut min_offset = vec_index * 16 + min_comp * 4;
        let max_offset = vec_index * 16 + max_comp * 4;

        let mut base_offset = 0;
        let mut prefix = String::new();
        let var = find_cbuffer_var(
            min_offset,
            max_offset,
            &mut cbuffer.variables.iter().map(|v| VarView {
                name: &v.name,
                offset: v.offset,
                ty: &v.ty,
            }),
            &mut base_offset,
            &mut prefix,
        )?;

        let mut str = prefix + var.name;

        // For indexing, only the selected register matters.
        min_offset &= !0xf;
        let mut var_offset = min_offset.wrapping_sub(base_offset);

        if var.ty.elements > 1 {
            let byte_size = align_up_16(var.ty.byte_size);
            let element_size = byte_size / u32::from(var.ty.elements);
            if element_size > 0 {
                let element_index = var_offset / element_size;
                str += &format!("[{element_index}]");
                var_offset = var_offset.wrapping_sub(element_index);
            }
        }

        if (var.ty.class == VarClass::MatrixRows && var.ty.cols > 1)
            || (var.ty.class == VarClass::MatrixColumns && var.ty.rows > 1)
        {
            str += &format!("[{}]", var_offset / 16);
        }

        let vec_offset = var.offset & 0xf;
        if vec_offset > 0 {
            for c in comps.iter_mut() {
                if *c < 4 {
                    *c -= (vec_offset / 4) as u8;
                }
            }
        }

        Some(str)
    }
}

const COMP_CHARS: [char; 4] = ['x', 'y', 'z', 'w'];

/// A variable or structure member, viewed uniformly for name resolution.
#[derive(Clone, Copy)]
struct VarView<'a> {
    name: &'a str,
    offset: u32,
    ty: &'a prism_dxbc::RdefType,
}

/// Finds the variable covering `min_offset..=max_offset`, recursing into
/// structure members for the tightest match. `byte_offset` accumulates the
/// absolute offset of the returned variable; `prefix` the dotted path to it.
fn find_cbuffer_var<'a>(
    min_offset: u32,
    max_offset: u32,
    vars: &mut dyn Iterator<Item = VarView<'a>>,
    byte_offset: &mut u32,
    prefix: &mut String,
) -> Option<VarView<'a>> {
    for v in vars {
        let voffs = *byte_offset + v.offset;

        // Ranges crossing a variable boundary stay unresolved.
        if voffs <= min_offset && voffs + v.ty.byte_size > max_offset {
            *byte_offset = voffs;

            if !v.ty.members.is_empty() {
                prefix.push_str(v.name);
                prefix.push('.');
                return find_cbuffer_var(
                    min_offset,
                    max_offset,
                    &mut v.ty.members.iter().map(|m| VarView {
                        name: &m.name,
                        offset: m.offset,
                        ty: &m.ty,
                    }),
                    byte_offset,
                    prefix,
                );
            }

            return Some(v);
        }
    }

    None
}

fn align_up_16(x: u32) -> u32 {
    (x + 0xf) & !0xf
}

/// Renders immediate values the way the compiler's own listings do: if any
/// component has a valid (finite, non-denormal) float exponent the whole
/// vector prints as floats, otherwise as decimal integers with large
/// magnitudes in hex.
fn immediate_str(values: &[u32]) -> String {
    let float_output = values
        .iter()
        .any(|&v| (v & 0x7f80_0000) != 0 && (v & 0x7f80_0000) != 0x7f80_0000);

    let mut out = String::new();
    for (i, &v) in values.iter().enumerate() {
        if i > 0 {
            out += ", ";
        }
        if float_output {
            out += &format!("{:.6}", f32::from_bits(v));
        } else {
            let signed = v as i32;
            if (-10000..=10000).contains(&signed) {
                out += &signed.to_string();
            } else {
                out += &format!("0x{v:08x}");
            }
        }
    }
    out
}

fn ret_types_str(ret: &[u32; 4]) -> String {
    format!(
        "({},{},{},{})",
        resource_ret_type_str(ret[0]),
        resource_ret_type_str(ret[1]),
        resource_ret_type_str(ret[2]),
        resource_ret_type_str(ret[3])
    )
}

fn resource_dim_str(dim: u32) -> &'static str {
    match dim {
        1 => "buffer",
        2 => "texture1d",
        3 => "texture2d",
        4 => "texture2dms",
        5 => "texture3d",
        6 => "texturecube",
        7 => "texture1darray",
        8 => "texture2darray",
        9 => "texture2dmsarray",
        10 => "texturecubearray",
        11 => "rawbuffer",
        12 => "structured_buffer",
        _ => "unknown",
    }
}

fn resource_ret_type_str(ret: u32) -> &'static str {
    match ret {
        1 => "unorm",
        2 => "snorm",
        3 => "sint",
        4 => "uint",
        5 => "float",
        6 => "mixed",
        7 => "double",
        8 => "continued",
        9 => "unused",
        _ => "unknown",
    }
}

fn interpolation_str(interp: u32) -> &'static str {
    match interp {
        1 => "constant",
        2 => "linear",
        3 => "linearCentroid",
        4 => "linearNopersp",
        5 => "linearNoperspCentroid",
        6 => "linearSample",
        7 => "linaerNoperspSample",
        _ => "undefined",
    }
}

fn sv_semantic_str(sv: u32) -> &'static str {
    match sv {
        1 => "position",
        2 => "clipdistance",
        3 => "culldistance",
        4 => "rendertarget_array_index",
        5 => "viewport_array_index",
        6 => "vertexid",
        7 => "primitiveid",
        8 => "instanceid",
        9 => "isfrontface",
        10 => "sampleidx",
        11 => "finalQuadUeq0EdgeTessFactor",
        12 => "finalQuadVeq0EdgeTessFactor",
        13 => "finalQuadUeq1EdgeTessFactor",
        14 => "finalQuadVeq1EdgeTessFactor",
        15 => "finalQuadUInsideTessFactor",
        16 => "finalQuadVInsideTessFactor",
        17 => "finalTriUeq0EdgeTessFactor",
        18 => "finalTriVeq0EdgeTessFactor",
        19 => "finalTriWeq0EdgeTessFactor",
        20 => "finalTriInsideTessFactor",
        21 => "finalLineEdgeTessFactor",
        22 => "finalLineInsideTessFactor",
        64 => "target",
        65 => "depth",
        66 => "coverage",
        67 => "depthgreaterequal",
        68 => "depthlessequal",
        _ => "undefined",
    }
}
