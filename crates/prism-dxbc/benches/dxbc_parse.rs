#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
use criterion::{black_box, criterion_group, criterion_main, Criterion};

#[cfg(not(target_arch = "wasm32"))]
use prism_dxbc::{hash, DxbcFile, FourCC};

/// Builds a synthetic container with a plausible chunk mix so parsing and
/// hashing are measured against a realistic layout.
#[cfg(not(target_arch = "wasm32"))]
fn synthetic_container() -> Vec<u8> {
    let chunks: [(FourCC, Vec<u8>); 4] = [
        (FourCC::RDEF, vec![0u8; 612]),
        (FourCC::ISGN, vec![0u8; 128]),
        (FourCC::OSGN, vec![0u8; 80]),
        (FourCC::SHEX, vec![0u8; 2048]),
    ];

    let header_len = 32 + 4 * chunks.len();
    let body_len: usize = chunks.iter().map(|(_, d)| 8 + d.len()).sum();

    let mut out = Vec::with_capacity(header_len + body_len);
    out.extend_from_slice(&FourCC::DXBC.0);
    out.extend_from_slice(&[0u8; 16]);
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&((header_len + body_len) as u32).to_le_bytes());
    out.extend_from_slice(&(chunks.len() as u32).to_le_bytes());

    let mut offset = header_len;
    for (_, data) in &chunks {
        out.extend_from_slice(&(offset as u32).to_le_bytes());
        offset += 8 + data.len();
    }
    for (fourcc, data) in &chunks {
        out.extend_from_slice(&fourcc.0);
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
    }

    hash::update_checksum(&mut out);
    out
}

#[cfg(not(target_arch = "wasm32"))]
fn bench_dxbc_parse(c: &mut Criterion) {
    let bytes = synthetic_container();

    c.bench_function("dxbc_parse", |b| {
        b.iter(|| {
            let file = DxbcFile::parse(black_box(&bytes)).unwrap();
            black_box(file.header().chunk_count);
        })
    });

    c.bench_function("dxbc_checksum", |b| {
        b.iter(|| black_box(hash::checksum(black_box(&bytes))))
    });
}

#[cfg(not(target_arch = "wasm32"))]
criterion_group!(benches, bench_dxbc_parse);
#[cfg(not(target_arch = "wasm32"))]
criterion_main!(benches);
