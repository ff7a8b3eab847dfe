//! Decoder, rewriter and disassembler for SM4/SM5 shader bytecode.
//!
//! This crate consumes the token stream carried in a [`prism_dxbc`] container's
//! bytecode chunk and produces:
//!
//! - A decoded [`Program`]: flat declaration and instruction lists with fully
//!   resolved operands, built for untrusted input (see [`Program::from_bytes`]).
//! - Optional rewriting of AMD AGS / NVIDIA NVAPI intrinsic encodings into
//!   synthetic vendor instructions ([`vendor`]), with full rollback when a
//!   stream does not match the expected shape.
//! - A stable text disassembly with a per-instruction line table
//!   ([`disassemble`]), optionally using reflection data for friendly register
//!   names.
//! - Fallback reflection synthesized from the declarations when the container
//!   carries none ([`reflect`]).

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod decode;
mod disasm;
mod opcode;
mod operand;
/// Bytecode-derived fallback reflection.
pub mod reflect;
/// Vendor extension (AMD AGS / NVIDIA NVAPI) instruction rewriting.
pub mod vendor;

use prism_dxbc::{DxbcFile, RdefChunk};
use tracing::warn;

pub use crate::decode::{
    DeclKind, Declaration, DecodeError, Instruction, Program, ShaderMessage,
};
pub use crate::disasm::Disassembly;
pub use crate::opcode::{GlobalFlags, Opcode, ResinfoRetType, SyncFlags};
pub use crate::operand::{
    MinPrecision, NumComponents, Operand, OperandIndex, OperandModifier, OperandType,
};
pub use crate::vendor::{GpuVendor, VendorExtension, VendorOpData};

/// Runtime options for decoding and disassembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisasmOptions {
    /// Replace register references with reflection names where unambiguous.
    pub friendly_names: bool,
    /// Rewrite vendor intrinsic encodings against this magic UAV slot.
    pub vendor: Option<VendorExtension>,
}

impl Default for DisasmOptions {
    fn default() -> DisasmOptions {
        DisasmOptions {
            friendly_names: true,
            vendor: None,
        }
    }
}

/// Renders `program` as text with a per-instruction line table.
///
/// Pure: the same program and reflection always produce the same text, so the
/// line table can be used for source mapping across runs.
pub fn disassemble(
    program: &Program,
    reflection: Option<&RdefChunk>,
    options: &DisasmOptions,
) -> Disassembly {
    disasm::disassemble(program, reflection, options.friendly_names)
}

/// A decoded shader with its reflection view and cached disassembly.
///
/// Ties the pieces of this crate together for the common path: pull the
/// bytecode chunk out of a container, decode it, apply the vendor rewriter if
/// configured, pick real or guessed reflection, and render the listing once.
#[derive(Debug, Clone)]
pub struct ShaderModule {
    program: Program,
    reflection: Option<RdefChunk>,
    reflection_guessed: bool,
    disassembly: Disassembly,
}

impl ShaderModule {
    /// Decodes the bytecode chunk of `file`.
    ///
    /// Reflection comes from the container's `RDEF` chunk when present and
    /// well-formed, otherwise it is guessed from the declarations and friendly
    /// naming is disabled (guessed names are placeholders). The listing is
    /// prefixed with a `Shader hash` line derived from the container digest.
    pub fn from_container(
        file: &DxbcFile<'_>,
        options: &DisasmOptions,
    ) -> Result<ShaderModule, DecodeError> {
        let chunk = file.find_shader_chunk().ok_or(DecodeError::NoShaderChunk)?;
        let mut program = Program::from_bytes(chunk.data)?;

        if let Some(ext) = &options.vendor {
            vendor::rewrite_vendor_ops(&mut program, ext);
        }

        let (reflection, reflection_guessed) = match file.get_rdef() {
            Some(Ok(rdef)) => (rdef, false),
            other => {
                if let Some(Err(err)) = other {
                    warn!(%err, "malformed RDEF chunk; guessing reflection from declarations");
                }
                (reflect::guess_reflection(&program).rdef, true)
            }
        };

        let friendly = options.friendly_names && !reflection_guessed;
        let mut disassembly = disasm::disassemble(&program, Some(&reflection), friendly);
        prepend_hash_line(&mut disassembly, file.header().digest);

        Ok(ShaderModule {
            program,
            reflection: Some(reflection),
            reflection_guessed,
            disassembly,
        })
    }

    /// Decodes a bare token stream with no surrounding container.
    pub fn from_bytecode(bytes: &[u8], options: &DisasmOptions) -> Result<ShaderModule, DecodeError> {
        let mut program = Program::from_bytes(bytes)?;

        if let Some(ext) = &options.vendor {
            vendor::rewrite_vendor_ops(&mut program, ext);
        }

        let reflection = reflect::guess_reflection(&program).rdef;
        let disassembly = disasm::disassemble(&program, Some(&reflection), false);

        Ok(ShaderModule {
            program,
            reflection: Some(reflection),
            reflection_guessed: true,
            disassembly,
        })
    }

    /// The decoded program.
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Reflection in use: the container's, or one guessed from declarations.
    pub fn reflection(&self) -> Option<&RdefChunk> {
        self.reflection.as_ref()
    }

    /// `true` when [`reflection`](Self::reflection) was guessed from the
    /// declarations rather than read from an `RDEF` chunk.
    pub fn reflection_is_guessed(&self) -> bool {
        self.reflection_guessed
    }

    /// The rendered listing. Built once; stable across calls.
    pub fn disassembly(&self) -> &Disassembly {
        &self.disassembly
    }

    /// 1-based line of instruction `index` within the listing text.
    pub fn instruction_line(&self, index: usize) -> Option<u32> {
        self.disassembly.instruction_lines.get(index).copied()
    }
}

/// Prefixes the listing with the container digest and shifts the line table
/// past the two prologue lines.
fn prepend_hash_line(disassembly: &mut Disassembly, digest: [u8; 16]) {
    let word = |i: usize| {
        u32::from_le_bytes([
            digest[4 * i],
            digest[4 * i + 1],
            digest[4 * i + 2],
            digest[4 * i + 3],
        ])
    };
    let prologue = format!(
        "Shader hash {:08x}-{:08x}-{:08x}-{:08x}\n\n",
        word(0),
        word(1),
        word(2),
        word(3)
    );
    disassembly.text.insert_str(0, &prologue);
    for line in &mut disassembly.instruction_lines {
        *line += 2;
    }
}
