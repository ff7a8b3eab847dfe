//! Bytecode-derived fallback reflection.
//!
//! Containers stripped for shipping often carry no `RDEF` or signature
//! chunks. The declarations at the top of the token stream still describe
//! every binding the shader touches, so a usable reflection view can be
//! synthesized from them: bind points keep their registers, and names are
//! generated from the register (`texture0`, `cb1_v3`). Generated names are
//! placeholders, so callers should not apply friendly naming on top of a
//! guessed view.

use prism_dxbc::{
    CBufferVariable, ComponentType, ConstantBuffer, RdefChunk, RdefType, ResourceBinding,
    ResourceDimension, ResourceKind, ResourceRetType, SignatureChunk, SignatureElement,
    SystemValue, VarClass, VarType, BINDLESS_BIND_COUNT,
};

use crate::decode::{DeclKind, Program};
use crate::opcode::Opcode;
use crate::operand::{Operand, OperandType};

/// Reflection synthesized from a program's declarations.
#[derive(Debug, Clone, Default)]
pub struct GuessedReflection {
    /// Resource and constant buffer bindings.
    pub rdef: RdefChunk,
    /// Input signature from `dcl_input*` declarations.
    pub inputs: SignatureChunk,
    /// Output signature from `dcl_output*` declarations.
    pub outputs: SignatureChunk,
    /// Thread group dimensions from `dcl_thread_group`, compute only.
    pub thread_group: Option<[u32; 3]>,
}

/// Synthesizes reflection from the program's declarations.
pub fn guess_reflection(program: &Program) -> GuessedReflection {
    let mut out = GuessedReflection::default();

    for decl in &program.declarations {
        let Some(operand) = &decl.operand else {
            if let DeclKind::ThreadGroup(dims) = &decl.kind {
                out.thread_group = Some(*dims);
            }
            continue;
        };
        // SM5.1 declarations carry [id, lo, hi]; earlier models a single
        // register index.
        let reg = if operand.indices.len() == 3 {
            operand.indices[1].index as u32
        } else {
            operand.indices[0].index as u32
        };
        let bind_count = guessed_bind_count(operand);

        match &decl.kind {
            DeclKind::Sampler { mode, space } => {
                out.rdef.samplers.push(ResourceBinding {
                    name: format!("sampler{reg}"),
                    kind: ResourceKind::Sampler,
                    space: space.unwrap_or(0),
                    reg,
                    bind_count,
                    // comparison samplers are flagged in reflection data
                    flags: if *mode == 1 { 2 } else { 0 },
                    return_type: ResourceRetType::Unknown,
                    dimension: ResourceDimension::Unknown,
                    sample_count: 0,
                });
            }
            DeclKind::Resource {
                dim,
                sample_count,
                ret,
                space,
            } => {
                let dimension = decl_dimension(*dim);
                out.rdef.srvs.push(ResourceBinding {
                    name: format!("texture{reg}"),
                    kind: ResourceKind::Texture,
                    space: space.unwrap_or(0),
                    reg,
                    bind_count,
                    flags: 0,
                    return_type: decl_ret_type(ret[0]),
                    dimension,
                    // fxc reports 4 for typed buffers
                    sample_count: if dimension == ResourceDimension::Buffer {
                        4
                    } else {
                        *sample_count
                    },
                });
            }
            DeclKind::RawBuffer { space, .. } => {
                let uav = operand.op_type == OperandType::UnorderedAccessView;
                let binding = ResourceBinding {
                    name: if uav {
                        format!("rwbytebuffer{reg}")
                    } else {
                        format!("bytebuffer{reg}")
                    },
                    kind: if uav {
                        ResourceKind::RwByteAddress
                    } else {
                        ResourceKind::ByteAddress
                    },
                    space: space.unwrap_or(0),
                    reg,
                    bind_count,
                    flags: 0,
                    return_type: ResourceRetType::Mixed,
                    dimension: ResourceDimension::Buffer,
                    sample_count: 0,
                };
                if uav {
                    out.rdef.uavs.push(binding);
                } else {
                    out.rdef.srvs.push(binding);
                }
            }
            DeclKind::StructuredBuffer {
                stride,
                counter,
                space,
                ..
            } => {
                let uav = operand.op_type == OperandType::UnorderedAccessView;
                let binding = ResourceBinding {
                    name: if uav {
                        format!("uav{reg}")
                    } else {
                        format!("structuredbuffer{reg}")
                    },
                    kind: if !uav {
                        ResourceKind::Structured
                    } else if *counter {
                        ResourceKind::RwStructuredWithCounter
                    } else {
                        ResourceKind::RwStructured
                    },
                    space: space.unwrap_or(0),
                    reg,
                    bind_count,
                    flags: 0,
                    return_type: ResourceRetType::Mixed,
                    dimension: ResourceDimension::Buffer,
                    // structure stride travels in the sample count slot
                    sample_count: *stride,
                };
                if uav {
                    out.rdef.uavs.push(binding);
                } else {
                    out.rdef.srvs.push(binding);
                }
            }
            DeclKind::UavTyped {
                dim, ret, space, ..
            } => {
                out.rdef.uavs.push(ResourceBinding {
                    name: format!("uav{reg}"),
                    kind: ResourceKind::RwTyped,
                    space: space.unwrap_or(0),
                    reg,
                    bind_count,
                    flags: 0,
                    return_type: decl_ret_type(ret[0]),
                    dimension: decl_dimension(*dim),
                    sample_count: u32::MAX,
                });
            }
            DeclKind::ConstantBuffer {
                vec4_count, space, ..
            } => {
                let space = space.unwrap_or(0);
                let declared = vec4_count.or_else(|| {
                    (operand.indices.len() == 2 && operand.indices[1].relative.is_none())
                        .then(|| operand.indices[1].index as u32)
                });
                let vec4s = declared
                    .unwrap_or(0)
                    .max(highest_cbuffer_vec4(program, reg) + 1);

                let mut variables = Vec::with_capacity(vec4s as usize);
                for v in 0..vec4s {
                    let name = if space > 0 {
                        format!("cb{space}_{reg}_v{v}")
                    } else {
                        format!("cb{reg}_v{v}")
                    };
                    variables.push(CBufferVariable {
                        name,
                        offset: 16 * v,
                        flags: 0,
                        default_value: Vec::new(),
                        ty: RdefType {
                            name: "float4".to_owned(),
                            class: VarClass::Vector,
                            var_type: VarType::Float,
                            rows: 1,
                            cols: 4,
                            elements: 0,
                            byte_size: 16,
                            members: Vec::new(),
                        },
                    });
                }

                out.rdef.cbuffers.push(ConstantBuffer {
                    name: format!("cbuffer{reg}"),
                    identifier: operand.indices[0].index as u32,
                    space,
                    reg,
                    bind_count,
                    byte_size: vec4s * 16,
                    flags: 0,
                    variables,
                });
            }
            DeclKind::InOut | DeclKind::InOutSiv { .. } | DeclKind::InputPs { .. }
            | DeclKind::InputPsSiv { .. } => {
                let sv = match &decl.kind {
                    DeclKind::InOutSiv { sv } | DeclKind::InputPsSiv { sv, .. } => Some(*sv),
                    _ => None,
                };
                match operand.op_type {
                    OperandType::Input => {
                        push_signature_element(&mut out.inputs, operand, sv);
                    }
                    OperandType::Output if decl.opcode != Opcode::DclStream => {
                        push_signature_element(&mut out.outputs, operand, sv);
                    }
                    _ => {}
                }
            }
            DeclKind::ThreadGroup(dims) => out.thread_group = Some(*dims),
            _ => {}
        }
    }

    out
}

/// Register count of a declaration operand; `[id, lo, hi]` ranges count
/// their registers, everything else binds one.
fn guessed_bind_count(operand: &Operand) -> u32 {
    if operand.indices.len() == 3 {
        let lo = operand.indices[1].index;
        let hi = operand.indices[2].index;
        if hi == u64::from(u32::MAX) {
            return BINDLESS_BIND_COUNT;
        }
        return hi.saturating_sub(lo) as u32 + 1;
    }
    1
}

/// Highest vec4 index read from `cbN` anywhere in the instruction stream.
/// Dynamically indexed reads only count their constant base offset.
fn highest_cbuffer_vec4(program: &Program, reg: u32) -> u32 {
    fn scan(operand: &Operand, reg: u32, max: &mut u32) {
        if operand.op_type == OperandType::ConstantBuffer
            && operand.indices.len() == 2
            && operand.indices[0].relative.is_none()
            && operand.indices[0].index as u32 == reg
        {
            *max = (*max).max(operand.indices[1].index as u32);
        }
        for index in &operand.indices {
            if let Some(rel) = &index.relative {
                scan(rel, reg, max);
            }
        }
    }

    let mut max = 0;
    for inst in &program.instructions {
        for operand in &inst.operands {
            scan(operand, reg, &mut max);
        }
    }
    max
}

fn push_signature_element(chunk: &mut SignatureChunk, operand: &Operand, sv: Option<u32>) {
    if operand.indices.is_empty() || operand.indices[0].relative.is_some() {
        return;
    }
    let register = operand.indices[0].index as u32;

    let mut mask = 0u8;
    for &c in &operand.comps {
        if c < 4 {
            mask |= 1 << c;
        }
    }
    if mask == 0 {
        mask = 0xf;
    }

    let system_value = sv.map_or(SystemValue::None, sv_token_to_system_value);
    let (semantic_name, component_type) = guessed_semantic(system_value, register);
    let needs_semantic_index = system_value == SystemValue::None;
    let semantic_index_name = if needs_semantic_index {
        format!("{semantic_name}{register}")
    } else {
        semantic_name.clone()
    };

    chunk.elements.push(SignatureElement {
        semantic_name,
        semantic_index: if needs_semantic_index { register } else { 0 },
        semantic_index_name,
        needs_semantic_index,
        register,
        system_value,
        component_type,
        mask,
        rw_mask: mask,
        stream: 0,
    });
}

/// Placeholder semantic for a guessed element. Registers without a
/// system-value declaration read as `TEXCOORD<reg>`.
fn guessed_semantic(sv: SystemValue, _register: u32) -> (String, ComponentType) {
    let (name, ty) = match sv {
        SystemValue::None => ("TEXCOORD", ComponentType::Float32),
        SystemValue::Position => ("SV_Position", ComponentType::Float32),
        SystemValue::ClipDistance => ("SV_ClipDistance", ComponentType::Float32),
        SystemValue::CullDistance => ("SV_CullDistance", ComponentType::Float32),
        SystemValue::RenderTargetIndex => ("SV_RenderTargetArrayIndex", ComponentType::UInt32),
        SystemValue::ViewportIndex => ("SV_ViewportArrayIndex", ComponentType::UInt32),
        SystemValue::VertexIndex => ("SV_VertexID", ComponentType::UInt32),
        SystemValue::PrimitiveIndex => ("SV_PrimitiveID", ComponentType::UInt32),
        SystemValue::InstanceIndex => ("SV_InstanceID", ComponentType::UInt32),
        SystemValue::IsFrontFace => ("SV_IsFrontFace", ComponentType::UInt32),
        SystemValue::SampleIndex => ("SV_SampleIndex", ComponentType::UInt32),
        SystemValue::QuadEdgeTessFactor => ("SV_TessFactor", ComponentType::Float32),
        SystemValue::QuadInsideTessFactor => ("SV_InsideTessFactor", ComponentType::Float32),
        SystemValue::TriEdgeTessFactor => ("SV_TessFactor", ComponentType::Float32),
        SystemValue::TriInsideTessFactor => ("SV_InsideTessFactor", ComponentType::Float32),
        SystemValue::LineDetailTessFactor => ("SV_TessFactor", ComponentType::Float32),
        SystemValue::LineDensityTessFactor => ("SV_InsideTessFactor", ComponentType::Float32),
        SystemValue::ColorOutput => ("SV_Target", ComponentType::Float32),
        SystemValue::DepthOutput => ("SV_Depth", ComponentType::Float32),
        SystemValue::DepthGreaterEqualOutput => ("SV_DepthGreaterEqual", ComponentType::Float32),
        SystemValue::DepthLessEqualOutput => ("SV_DepthLessEqual", ComponentType::Float32),
        SystemValue::CoverageOutput => ("SV_Coverage", ComponentType::UInt32),
        SystemValue::StencilRefOutput => ("SV_StencilRef", ComponentType::UInt32),
        SystemValue::Other(_) => ("TEXCOORD", ComponentType::Unknown),
    };
    (name.to_owned(), ty)
}

/// Maps the system-value token of a `dcl_*_siv`/`dcl_*_sgv` declaration to
/// the signature classification.
fn sv_token_to_system_value(sv: u32) -> SystemValue {
    match sv {
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
        11..=14 => SystemValue::QuadEdgeTessFactor,
        15 | 16 => SystemValue::QuadInsideTessFactor,
        17..=19 => SystemValue::TriEdgeTessFactor,
        20 => SystemValue::TriInsideTessFactor,
        21 => SystemValue::LineDetailTessFactor,
        22 => SystemValue::LineDensityTessFactor,
        64 => SystemValue::ColorOutput,
        65 => SystemValue::DepthOutput,
        66 => SystemValue::CoverageOutput,
        67 => SystemValue::DepthGreaterEqualOutput,
        68 => SystemValue::DepthLessEqualOutput,
        other => SystemValue::Other(other),
    }
}

/// Maps a token-stream resource dimension to the reflection enum. The two
/// numbering schemes differ, so this cannot reuse the chunk parser's table.
fn decl_dimension(dim: u32) -> ResourceDimension {
    match dim {
        1 => ResourceDimension::Buffer,
        2 => ResourceDimension::Texture1D,
        3 => ResourceDimension::Texture2D,
        4 => ResourceDimension::Texture2DMS,
        5 => ResourceDimension::Texture3D,
        6 => ResourceDimension::TextureCube,
        7 => ResourceDimension::Texture1DArray,
        8 => ResourceDimension::Texture2DArray,
        9 => ResourceDimension::Texture2DMSArray,
        10 => ResourceDimension::TextureCubeArray,
        11 | 12 => ResourceDimension::Buffer,
        _ => ResourceDimension::Unknown,
    }
}

/// Return-type table used by declaration tokens (`unorm` = 1 .. `double` = 7).
fn decl_ret_type(raw: u32) -> ResourceRetType {
    match raw {
        1 => ResourceRetType::UNorm,
        2 => ResourceRetType::SNorm,
        3 => ResourceRetType::SInt,
        4 => ResourceRetType::UInt,
        5 => ResourceRetType::Float,
        6 => ResourceRetType::Mixed,
        7 => ResourceRetType::Double,
        8 => ResourceRetType::Continued,
        _ => ResourceRetType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{Declaration, Instruction};
    use crate::operand::{NumComponents, OperandIndex};
    use prism_dxbc::ShaderStage;

    fn decl_operand(op_type: OperandType, indices: Vec<u64>) -> Operand {
        Operand {
            op_type,
            num_components: NumComponents::Zero,
            comps: [0xff; 4],
            indices: indices.into_iter().map(OperandIndex::imm).collect(),
            ..Operand::default()
        }
    }

    fn program_with_decls(decls: Vec<(Opcode, Option<Operand>, DeclKind)>) -> Program {
        Program {
            stage: ShaderStage::Compute,
            major: 5,
            minor: 0,
            declarations: decls
                .into_iter()
                .map(|(opcode, operand, kind)| Declaration {
                    opcode,
                    offset: 0,
                    instruction: 0,
                    operand,
                    kind,
                })
                .collect(),
            instructions: vec![Instruction::new(Opcode::Ret, 0)],
        }
    }

    #[test]
    fn guesses_texture_sampler_and_uav_bindings() {
        let program = program_with_decls(vec![
            (
                Opcode::DclSampler,
                Some(decl_operand(OperandType::Sampler, vec![0])),
                DeclKind::Sampler {
                    mode: 1,
                    space: None,
                },
            ),
            (
                Opcode::DclResource,
                Some(decl_operand(OperandType::Resource, vec![2])),
                DeclKind::Resource {
                    dim: 3,
                    sample_count: 0,
                    ret: [5, 5, 5, 5],
                    space: None,
                },
            ),
            (
                Opcode::DclUavTyped,
                Some(decl_operand(OperandType::UnorderedAccessView, vec![1])),
                DeclKind::UavTyped {
                    dim: 3,
                    ret: [4, 4, 4, 4],
                    coherent: false,
                    rov: false,
                    space: None,
                },
            ),
        ]);

        let guessed = guess_reflection(&program);

        assert_eq!(guessed.rdef.samplers.len(), 1);
        assert_eq!(guessed.rdef.samplers[0].name, "sampler0");
        assert_eq!(guessed.rdef.samplers[0].flags, 2);

        assert_eq!(guessed.rdef.srvs.len(), 1);
        let srv = &guessed.rdef.srvs[0];
        assert_eq!(srv.name, "texture2");
        assert_eq!(srv.reg, 2);
        assert_eq!(srv.dimension, ResourceDimension::Texture2D);
        assert_eq!(srv.return_type, ResourceRetType::Float);

        assert_eq!(guessed.rdef.uavs.len(), 1);
        assert_eq!(guessed.rdef.uavs[0].name, "uav1");
        assert_eq!(guessed.rdef.uavs[0].kind, ResourceKind::RwTyped);
        assert_eq!(guessed.rdef.uavs[0].return_type, ResourceRetType::UInt);
    }

    #[test]
    fn cbuffer_grows_to_highest_access() {
        let mut program = program_with_decls(vec![(
            Opcode::DclConstantBuffer,
            Some(decl_operand(OperandType::ConstantBuffer, vec![0, 2])),
            DeclKind::ConstantBuffer {
                dynamic: false,
                vec4_count: None,
                space: None,
            },
        )]);

        // mov r0, cb0[7]: the buffer must cover at least 8 vec4s
        let mut mov = Instruction::new(Opcode::Mov, 0);
        mov.operands = vec![
            Operand {
                op_type: OperandType::Temp,
                indices: vec![OperandIndex::imm(0)],
                ..Operand::default()
            },
            Operand {
                op_type: OperandType::ConstantBuffer,
                indices: vec![OperandIndex::imm(0), OperandIndex::imm(7)],
                ..Operand::default()
            },
        ];
        program.instructions.insert(0, mov);

        let guessed = guess_reflection(&program);
        assert_eq!(guessed.rdef.cbuffers.len(), 1);
        let cb = &guessed.rdef.cbuffers[0];
        assert_eq!(cb.name, "cbuffer0");
        assert_eq!(cb.byte_size, 8 * 16);
        assert_eq!(cb.variables.len(), 8);
        assert_eq!(cb.variables[3].name, "cb0_v3");
        assert_eq!(cb.variables[3].offset, 48);
    }

    #[test]
    fn structured_buffers_split_by_operand_type() {
        let program = program_with_decls(vec![
            (
                Opcode::DclResourceStructured,
                Some(decl_operand(OperandType::Resource, vec![0])),
                DeclKind::StructuredBuffer {
                    stride: 16,
                    counter: false,
                    coherent: false,
                    rov: false,
                    space: None,
                },
            ),
            (
                Opcode::DclUavStructured,
                Some(decl_operand(OperandType::UnorderedAccessView, vec![0])),
                DeclKind::StructuredBuffer {
                    stride: 32,
                    counter: true,
                    coherent: false,
                    rov: false,
                    space: None,
                },
            ),
        ]);

        let guessed = guess_reflection(&program);
        assert_eq!(guessed.rdef.srvs[0].name, "structuredbuffer0");
        assert_eq!(guessed.rdef.srvs[0].kind, ResourceKind::Structured);
        assert_eq!(guessed.rdef.srvs[0].sample_count, 16);
        assert_eq!(
            guessed.rdef.uavs[0].kind,
            ResourceKind::RwStructuredWithCounter
        );
    }

    #[test]
    fn sm51_range_declarations_report_bind_counts() {
        let program = program_with_decls(vec![
            (
                Opcode::DclResource,
                Some(decl_operand(OperandType::Resource, vec![0, 4, 7])),
                DeclKind::Resource {
                    dim: 3,
                    sample_count: 0,
                    ret: [5, 5, 5, 5],
                    space: Some(1),
                },
            ),
            (
                Opcode::DclResource,
                Some(decl_operand(
                    OperandType::Resource,
                    vec![1, 0, u64::from(u32::MAX)],
                )),
                DeclKind::Resource {
                    dim: 3,
                    sample_count: 0,
                    ret: [5, 5, 5, 5],
                    space: Some(2),
                },
            ),
        ]);

        let guessed = guess_reflection(&program);
        assert_eq!(guessed.rdef.srvs[0].reg, 4);
        assert_eq!(guessed.rdef.srvs[0].bind_count, 4);
        assert_eq!(guessed.rdef.srvs[0].space, 1);
        assert_eq!(guessed.rdef.srvs[1].bind_count, BINDLESS_BIND_COUNT);
    }

    #[test]
    fn signatures_and_thread_group_from_declarations() {
        let mut input = decl_operand(OperandType::Input, vec![0]);
        input.comps = [0, 1, 2, 0xff];
        let output = decl_operand(OperandType::Output, vec![0]);

        let program = program_with_decls(vec![
            (
                Opcode::DclInputSiv,
                Some(input),
                DeclKind::InOutSiv { sv: 1 },
            ),
            (Opcode::DclOutput, Some(output), DeclKind::InOut),
            (
                Opcode::DclThreadGroup,
                None,
                DeclKind::ThreadGroup([64, 1, 1]),
            ),
        ]);

        let guessed = guess_reflection(&program);
        assert_eq!(guessed.inputs.elements.len(), 1);
        let element = &guessed.inputs.elements[0];
        assert_eq!(element.semantic_name, "SV_Position");
        assert_eq!(element.system_value, SystemValue::Position);
        assert_eq!(element.mask, 0x7);

        assert_eq!(guessed.outputs.elements.len(), 1);
        assert_eq!(guessed.outputs.elements[0].semantic_index_name, "TEXCOORD0");
        assert_eq!(guessed.outputs.elements[0].mask, 0xf);

        assert_eq!(guessed.thread_group, Some([64, 1, 1]));
    }
}
