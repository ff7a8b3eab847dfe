use core::fmt;

/// A 4-byte chunk/container tag (e.g. `DXBC`, `RDEF`, `SHEX`).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Container magic.
    pub const DXBC: FourCC = FourCC(*b"DXBC");

    /// Resource definition (reflection) chunk.
    pub const RDEF: FourCC = FourCC(*b"RDEF");
    /// Alternate resource definition tag emitted by some toolchains.
    pub const RD11: FourCC = FourCC(*b"RD11");
    /// Shader statistics chunk.
    pub const STAT: FourCC = FourCC(*b"STAT");

    /// SM4 shader bytecode.
    pub const SHDR: FourCC = FourCC(*b"SHDR");
    /// SM5/SM5.1 shader bytecode.
    pub const SHEX: FourCC = FourCC(*b"SHEX");

    /// Input signature.
    pub const ISGN: FourCC = FourCC(*b"ISGN");
    /// Output signature.
    pub const OSGN: FourCC = FourCC(*b"OSGN");
    /// Patch constant signature.
    pub const PCSG: FourCC = FourCC(*b"PCSG");
    /// Input signature, v1 records (stream + min-precision).
    pub const ISG1: FourCC = FourCC(*b"ISG1");
    /// Output signature, v1 records (stream + min-precision).
    pub const OSG1: FourCC = FourCC(*b"OSG1");
    /// Output signature with stream indices (SM5 geometry shaders).
    pub const OSG5: FourCC = FourCC(*b"OSG5");
    /// Patch constant signature, v1 records.
    pub const PSG1: FourCC = FourCC(*b"PSG1");
    /// Alternate spelling of [`FourCC::PSG1`] seen in some containers.
    pub const PCG1: FourCC = FourCC(*b"PCG1");

    /// Embedded debug info (legacy SDBG format).
    pub const SDBG: FourCC = FourCC(*b"SDBG");
    /// Embedded debug info (PDB stream).
    pub const SPDB: FourCC = FourCC(*b"SPDB");
    /// DXIL debug info.
    pub const ILDB: FourCC = FourCC(*b"ILDB");
    /// DXIL debug name.
    pub const ILDN: FourCC = FourCC(*b"ILDN");

    /// DXIL bytecode (indicates an alternate program encoding is present).
    pub const DXIL: FourCC = FourCC(*b"DXIL");
    /// D3D9 fallback bytecode.
    pub const AON9: FourCC = FourCC(*b"Aon9");
    /// Private (opaque) data.
    pub const PRIV: FourCC = FourCC(*b"PRIV");
    /// Stored source hash.
    pub const HASH: FourCC = FourCC(*b"HASH");
    /// Subtarget feature info (global flags).
    pub const SFI0: FourCC = FourCC(*b"SFI0");
    /// Embedded root signature.
    pub const RTS0: FourCC = FourCC(*b"RTS0");
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_printable_and_hex() {
        assert_eq!(FourCC(*b"RDEF").to_string(), "RDEF");
        assert_eq!(FourCC([b'A', 0x01, b'b', b' ']).to_string(), "A\\x01b ");
    }
}
