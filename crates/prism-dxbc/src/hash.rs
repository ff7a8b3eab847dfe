//! The container integrity digest.
//!
//! `DXBC` containers store a 128-bit digest computed over everything after the
//! magic and digest fields (bytes `20..`). The digest is built on the MD5
//! block transform but the finalization deviates from the standard in two
//! ways, and external verifiers expect it bit-for-bit:
//!
//! - The bit length of the hashed region is not appended after the padding.
//!   If the trailing partial block has 56 or more bytes it is padded and
//!   transformed on its own, followed by a synthetic block carrying the bit
//!   length in its first dword; otherwise the bit length *leads* the final
//!   block, followed by the tail data and padding.
//! - The last dword of the final block is `(num_bits >> 2) | 1` rather than
//!   the high half of a 64-bit length.
//!
//! Because of the nonstandard finalization the ecosystem `md5` crate cannot
//! be used; the block transform is implemented locally and validated against
//! known standard-MD5 digests in tests.

use crate::container::DIGEST_OFFSET;

/// Byte offset at which hashing starts (magic + digest are excluded).
const HASHED_REGION_START: usize = 20;

const INIT_STATE: [u32; 4] = [0x6745_2301, 0xefcd_ab89, 0x98ba_dcfe, 0x1032_5476];

const K: [u32; 64] = [
    0xd76a_a478, 0xe8c7_b756, 0x2420_70db, 0xc1bd_ceee, 0xf57c_0faf, 0x4787_c62a, 0xa830_4613,
    0xfd46_9501, 0x6980_98d8, 0x8b44_f7af, 0xffff_5bb1, 0x895c_d7be, 0x6b90_1122, 0xfd98_7193,
    0xa679_438e, 0x49b4_0821, 0xf61e_2562, 0xc040_b340, 0x265e_5a51, 0xe9b6_c7aa, 0xd62f_105d,
    0x0244_1453, 0xd8a1_e681, 0xe7d3_fbc8, 0x21e1_cde6, 0xc337_07d6, 0xf4d5_0d87, 0x455a_14ed,
    0xa9e3_e905, 0xfcef_a3f8, 0x676f_02d9, 0x8d2a_4c8a, 0xfffa_3942, 0x8771_f681, 0x6d9d_6122,
    0xfde5_380c, 0xa4be_ea44, 0x4bde_cfa9, 0xf6bb_4b60, 0xbebf_bc70, 0x289b_7ec6, 0xeaa1_27fa,
    0xd4ef_3085, 0x0488_1d05, 0xd9d4_d039, 0xe6db_99e5, 0x1fa2_7cf8, 0xc4ac_5665, 0xf429_2244,
    0x432a_ff97, 0xab94_23a7, 0xfc93_a039, 0x655b_59c3, 0x8f0c_cc92, 0xffef_f47d, 0x8584_5dd1,
    0x6fa8_7e4f, 0xfe2c_e6e0, 0xa301_4314, 0x4e08_11a1, 0xf753_7e82, 0xbd3a_f235, 0x2ad7_d2bb,
    0xeb86_d391,
];

const S: [u32; 64] = [
    7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, 5, 9, 14, 20, 5, 9, 14, 20, 5, 9,
    14, 20, 5, 9, 14, 20, 4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, 6, 10, 15,
    21, 6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15, 21,
];

#[derive(Clone)]
struct Md5Core {
    state: [u32; 4],
}

impl Md5Core {
    fn new() -> Self {
        Md5Core { state: INIT_STATE }
    }

    fn transform(&mut self, block: &[u8; 64]) {
        let mut m = [0u32; 16];
        for (i, word) in m.iter_mut().enumerate() {
            *word = u32::from_le_bytes([
                block[i * 4],
                block[i * 4 + 1],
                block[i * 4 + 2],
                block[i * 4 + 3],
            ]);
        }

        let [mut a, mut b, mut c, mut d] = self.state;

        for i in 0..64 {
            let (f, g) = match i / 16 {
                0 => ((b & c) | (!b & d), i),
                1 => ((d & b) | (!d & c), (5 * i + 1) % 16),
                2 => (b ^ c ^ d, (3 * i + 5) % 16),
                _ => (c ^ (b | !d), (7 * i) % 16),
            };

            let tmp = d;
            d = c;
            c = b;
            b = b.wrapping_add(
                a.wrapping_add(f)
                    .wrapping_add(K[i])
                    .wrapping_add(m[g])
                    .rotate_left(S[i]),
            );
            a = tmp;
        }

        self.state[0] = self.state[0].wrapping_add(a);
        self.state[1] = self.state[1].wrapping_add(b);
        self.state[2] = self.state[2].wrapping_add(c);
        self.state[3] = self.state[3].wrapping_add(d);
    }

    fn digest(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        for (i, word) in self.state.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }
        out
    }
}

/// Computes the container digest over full container `bytes`.
///
/// The magic and stored digest (bytes `..20`) are excluded from hashing, so
/// the result is independent of whatever digest the container currently
/// carries. Containers shorter than the hashed-region start hash as empty.
pub fn checksum(bytes: &[u8]) -> [u8; 16] {
    let data = bytes.get(HASHED_REGION_START..).unwrap_or(&[]);

    let num_bits = (data.len() as u32).wrapping_mul(8);
    let num_bits_part2 = (num_bits >> 2) | 1;

    let mut core = Md5Core::new();

    let mut chunks = data.chunks_exact(64);
    for chunk in &mut chunks {
        let mut block = [0u8; 64];
        block.copy_from_slice(chunk);
        core.transform(&block);
    }

    let tail = chunks.remainder();
    if tail.len() >= 56 {
        let mut block = [0u8; 64];
        block[..tail.len()].copy_from_slice(tail);
        block[tail.len()] = 0x80;
        core.transform(&block);

        let mut last = [0u8; 64];
        last[..4].copy_from_slice(&num_bits.to_le_bytes());
        last[60..].copy_from_slice(&num_bits_part2.to_le_bytes());
        core.transform(&last);
    } else {
        let mut block = [0u8; 64];
        block[..4].copy_from_slice(&num_bits.to_le_bytes());
        block[4..4 + tail.len()].copy_from_slice(tail);
        block[4 + tail.len()] = 0x80;
        block[60..].copy_from_slice(&num_bits_part2.to_le_bytes());
        core.transform(&block);
    }

    core.digest()
}

/// Recomputes the digest of `bytes` and writes it into the header digest
/// field. No-op for buffers too short to hold a header digest.
pub fn update_checksum(bytes: &mut [u8]) {
    if bytes.len() < DIGEST_OFFSET + 16 {
        return;
    }
    let digest = checksum(bytes);
    bytes[DIGEST_OFFSET..DIGEST_OFFSET + 16].copy_from_slice(&digest);
}

/// Returns `true` if the digest stored in `bytes` matches a fresh hash.
pub fn verify_checksum(bytes: &[u8]) -> bool {
    match bytes.get(DIGEST_OFFSET..DIGEST_OFFSET + 16) {
        Some(stored) => stored == checksum(bytes),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Standard MD5 finalization, used only to validate the block transform
    // against well-known digests.
    fn md5_standard(data: &[u8]) -> [u8; 16] {
        let mut core = Md5Core::new();
        let bit_len = (data.len() as u64).wrapping_mul(8);

        let mut chunks = data.chunks_exact(64);
        for chunk in &mut chunks {
            let mut block = [0u8; 64];
            block.copy_from_slice(chunk);
            core.transform(&block);
        }

        let tail = chunks.remainder();
        let mut block = [0u8; 64];
        block[..tail.len()].copy_from_slice(tail);
        block[tail.len()] = 0x80;
        if tail.len() >= 56 {
            core.transform(&block);
            block = [0u8; 64];
        }
        block[56..].copy_from_slice(&bit_len.to_le_bytes());
        core.transform(&block);

        core.digest()
    }

    fn hex(digest: [u8; 16]) -> String {
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn core_transform_matches_known_md5_vectors() {
        assert_eq!(hex(md5_standard(b"")), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            hex(md5_standard(b"abc")),
            "900150983cd24fb0d6963f7d28e17f72"
        );
        assert_eq!(
            hex(md5_standard(
                b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789"
            )),
            "d174ab98d277d9f5a5611c2c9f419d9f"
        );
    }

    #[test]
    fn checksum_is_deterministic() {
        let mut bytes = vec![0u8; 200];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        assert_eq!(checksum(&bytes), checksum(&bytes));
    }

    #[test]
    fn checksum_ignores_stored_digest() {
        let mut a = vec![0u8; 120];
        for (i, b) in a.iter_mut().enumerate() {
            *b = i as u8;
        }
        let mut b = a.clone();
        b[4..20].fill(0xff);
        assert_eq!(checksum(&a), checksum(&b));
    }

    #[test]
    fn both_tail_layouts_are_exercised() {
        // Hashed region length 20 -> remainder 20, inline layout.
        let short = vec![0xabu8; HASHED_REGION_START + 20];
        // Hashed region length 60 -> remainder 60 >= 56, synthetic trailing block.
        let long = vec![0xabu8; HASHED_REGION_START + 60];
        assert_ne!(checksum(&short), checksum(&long));
        assert_eq!(checksum(&long), checksum(&long));
    }

    #[test]
    fn update_then_verify_roundtrips() {
        let mut bytes = vec![7u8; 90];
        assert!(!verify_checksum(&bytes));
        update_checksum(&mut bytes);
        assert!(verify_checksum(&bytes));

        bytes[70] ^= 1;
        assert!(!verify_checksum(&bytes));
    }
}
