//! End-to-end decoding: container bytes in, listing text out.

use prism_dxbc::test_utils::{build_container, build_signature_chunk};
use prism_dxbc::{DxbcFile, FourCC};
use prism_sm4::{DecodeError, DisasmOptions, GpuVendor, Opcode, ShaderModule, VendorExtension};

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

/// Serializes a vs_5_0 token stream, patching the declared length.
fn shex_bytes(mut tokens: Vec<u32>) -> Vec<u8> {
    tokens[1] = tokens.len() as u32;
    tokens.iter().flat_map(|t| t.to_le_bytes()).collect()
}

fn vs_5_0(body: &[u32]) -> Vec<u8> {
    let mut tokens = vec![(1 << 16) | (5 << 4), 0];
    tokens.extend_from_slice(body);
    shex_bytes(tokens)
}

#[test]
fn signature_and_single_mov_end_to_end() {
    let mut body = vec![opcode_tok(Opcode::Mov, 5)];
    body.extend(temp_dst(0));
    body.extend(input_src(0));
    let shex = vs_5_0(&body);

    let isgn = build_signature_chunk(&[("POSITION", 0, 0, 3, 0, 0xf, 0xf)]);
    let bytes = build_container(&[(FourCC::ISGN, &isgn), (FourCC::SHEX, &shex)]);

    let file = DxbcFile::parse(&bytes).unwrap();
    let signature = file.get_signature(FourCC::ISGN).unwrap().unwrap();
    assert_eq!(signature.elements.len(), 1);
    assert_eq!(signature.elements[0].semantic_name, "POSITION");
    assert_eq!(signature.elements[0].register, 0);

    let module = ShaderModule::from_container(&file, &DisasmOptions::default()).unwrap();
    let text = &module.disassembly().text;

    assert!(text.starts_with("Shader hash "));
    assert!(text.contains("\n\nvs_5_0\n"));
    assert!(text.contains("   0: mov r0.xyzw, v0.xyzw\n"));
    // the implicit trailing ret is the only other numbered line
    assert!(text.contains("   1: ret\n"));
    assert_eq!(module.program().instructions.len(), 2);

    // hash line, blank, target line, then the first instruction
    assert_eq!(module.instruction_line(0), Some(4));
    assert_eq!(module.instruction_line(1), Some(5));
    assert_eq!(module.instruction_line(2), None);
}

#[test]
fn decoding_twice_is_deterministic() {
    let mut body = vec![opcode_tok(Opcode::Mov, 5)];
    body.extend(temp_dst(1));
    body.extend(input_src(2));
    let shex = vs_5_0(&body);
    let bytes = build_container(&[(FourCC::SHEX, &shex)]);

    let file = DxbcFile::parse(&bytes).unwrap();
    let first = ShaderModule::from_container(&file, &DisasmOptions::default()).unwrap();
    let second = ShaderModule::from_container(&file, &DisasmOptions::default()).unwrap();

    assert_eq!(first.disassembly().text, second.disassembly().text);
    assert_eq!(
        first.disassembly().instruction_lines,
        second.disassembly().instruction_lines
    );
}

#[test]
fn missing_rdef_falls_back_to_guessed_reflection() {
    // dcl_sampler s0 + dcl_temps 1, then ret
    let body = vec![
        opcode_tok(Opcode::DclSampler, 3),
        (6 << 12) | (1 << 20),
        0,
        opcode_tok(Opcode::DclTemps, 2),
        1,
        opcode_tok(Opcode::Ret, 1),
    ];
    let shex = vs_5_0(&body);
    let bytes = build_container(&[(FourCC::SHEX, &shex)]);

    let file = DxbcFile::parse(&bytes).unwrap();
    let module = ShaderModule::from_container(&file, &DisasmOptions::default()).unwrap();

    assert!(module.reflection_is_guessed());
    let rdef = module.reflection().unwrap();
    assert_eq!(rdef.samplers.len(), 1);
    assert_eq!(rdef.samplers[0].name, "sampler0");

    // guessed names are placeholders, so the listing keeps raw registers
    assert!(module
        .disassembly()
        .text
        .contains("dcl_sampler s0, mode_default"));
}

#[test]
fn vendor_option_without_magic_uav_changes_nothing() {
    let mut body = vec![opcode_tok(Opcode::Mov, 5)];
    body.extend(temp_dst(0));
    body.extend(input_src(0));
    let shex = vs_5_0(&body);
    let bytes = build_container(&[(FourCC::SHEX, &shex)]);

    let file = DxbcFile::parse(&bytes).unwrap();
    let plain = ShaderModule::from_container(&file, &DisasmOptions::default()).unwrap();
    let with_vendor = ShaderModule::from_container(
        &file,
        &DisasmOptions {
            vendor: Some(VendorExtension {
                vendor: GpuVendor::Amd,
                space: None,
                reg: 0,
            }),
            ..DisasmOptions::default()
        },
    )
    .unwrap();

    assert_eq!(plain.disassembly().text, with_vendor.disassembly().text);
}

#[test]
fn container_without_bytecode_reports_missing_chunk() {
    let isgn = build_signature_chunk(&[("POSITION", 0, 0, 3, 0, 0xf, 0xf)]);
    let bytes = build_container(&[(FourCC::ISGN, &isgn)]);

    let file = DxbcFile::parse(&bytes).unwrap();
    assert!(matches!(
        ShaderModule::from_container(&file, &DisasmOptions::default()),
        Err(DecodeError::NoShaderChunk)
    ));
}
