//! Operand representation and operand-token bitfields.

/// Register file / operand kind, from bits 12..20 of an operand token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum OperandType {
    Temp,
    Input,
    Output,
    IndexableTemp,
    Imm32,
    Imm64,
    Sampler,
    Resource,
    ConstantBuffer,
    ImmediateConstantBuffer,
    Label,
    InputPrimitiveId,
    OutputDepth,
    Null,
    Rasterizer,
    OutputCoverageMask,
    Stream,
    FunctionBody,
    FunctionTable,
    Interface,
    FunctionInput,
    FunctionOutput,
    OutputControlPointId,
    InputForkInstanceId,
    InputJoinInstanceId,
    InputControlPoint,
    OutputControlPoint,
    InputPatchConstant,
    InputDomainPoint,
    ThisPointer,
    UnorderedAccessView,
    ThreadGroupSharedMemory,
    InputThreadId,
    InputThreadGroupId,
    InputThreadIdInGroup,
    InputCoverageMask,
    InputThreadIdInGroupFlattened,
    InputGsInstanceId,
    OutputDepthGreaterEqual,
    OutputDepthLessEqual,
    CycleCounter,
    OutputStencilRef,
    InnerCoverage,
}

impl OperandType {
    pub(crate) fn from_raw(raw: u32) -> Option<OperandType> {
        use OperandType::*;
        Some(match raw {
            0 => Temp,
            1 => Input,
            2 => Output,
            3 => IndexableTemp,
            4 => Imm32,
            5 => Imm64,
            6 => Sampler,
            7 => Resource,
            8 => ConstantBuffer,
            9 => ImmediateConstantBuffer,
            10 => Label,
            11 => InputPrimitiveId,
            12 => OutputDepth,
            13 => Null,
            14 => Rasterizer,
            15 => OutputCoverageMask,
            16 => Stream,
            17 => FunctionBody,
            18 => FunctionTable,
            19 => Interface,
            20 => FunctionInput,
            21 => FunctionOutput,
            22 => OutputControlPointId,
            23 => InputForkInstanceId,
            24 => InputJoinInstanceId,
            25 => InputControlPoint,
            26 => OutputControlPoint,
            27 => InputPatchConstant,
            28 => InputDomainPoint,
            29 => ThisPointer,
            30 => UnorderedAccessView,
            31 => ThreadGroupSharedMemory,
            32 => InputThreadId,
            33 => InputThreadGroupId,
            34 => InputThreadIdInGroup,
            35 => InputCoverageMask,
            36 => InputThreadIdInGroupFlattened,
            37 => InputGsInstanceId,
            38 => OutputDepthGreaterEqual,
            39 => OutputDepthLessEqual,
            40 => CycleCounter,
            41 => OutputStencilRef,
            43 => InnerCoverage,
            _ => return None,
        })
    }
}

/// How many components an operand carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub enum NumComponents {
    Zero,
    One,
    #[default]
    Four,
    N,
}

/// How the component field of a 4-component operand is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SelectionMode {
    Mask,
    Swizzle,
    Select1,
}

/// How a single operand index is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OperandIndexType {
    Imm32,
    Imm64,
    Relative,
    Imm32PlusRelative,
    Imm64PlusRelative,
}

impl OperandIndexType {
    pub(crate) fn from_raw(raw: u32) -> Option<OperandIndexType> {
        Some(match raw {
            0 => OperandIndexType::Imm32,
            1 => OperandIndexType::Imm64,
            2 => OperandIndexType::Relative,
            3 => OperandIndexType::Imm32PlusRelative,
            4 => OperandIndexType::Imm64PlusRelative,
            _ => return None,
        })
    }

    pub(crate) fn is_relative(self) -> bool {
        matches!(
            self,
            OperandIndexType::Relative
                | OperandIndexType::Imm32PlusRelative
                | OperandIndexType::Imm64PlusRelative
        )
    }
}

/// Source operand modifier from an extended operand token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub enum OperandModifier {
    #[default]
    None,
    Neg,
    Abs,
    AbsNeg,
}

impl OperandModifier {
    pub(crate) fn from_raw(raw: u32) -> OperandModifier {
        match raw {
            1 => OperandModifier::Neg,
            2 => OperandModifier::Abs,
            3 => OperandModifier::AbsNeg,
            _ => OperandModifier::None,
        }
    }
}

/// Minimum precision hint from an extended operand token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub enum MinPrecision {
    #[default]
    Default,
    Float16,
    Float10,
    Reserved,
    Sint16,
    Uint16,
    Any16,
    Any10,
}

impl MinPrecision {
    pub(crate) fn from_raw(raw: u32) -> MinPrecision {
        match raw {
            1 => MinPrecision::Float16,
            2 => MinPrecision::Float10,
            3 => MinPrecision::Reserved,
            4 => MinPrecision::Sint16,
            5 => MinPrecision::Uint16,
            6 => MinPrecision::Any16,
            7 => MinPrecision::Any10,
            _ => MinPrecision::Default,
        }
    }

    pub(crate) fn suffix(self) -> Option<&'static str> {
        match self {
            MinPrecision::Default | MinPrecision::Reserved => None,
            MinPrecision::Float16 => Some(" {min16f}"),
            MinPrecision::Float10 => Some(" {min10f}"),
            MinPrecision::Sint16 => Some(" {min16i}"),
            MinPrecision::Uint16 => Some(" {min16u}"),
            MinPrecision::Any16 => Some(" {any16}"),
            MinPrecision::Any10 => Some(" {any10}"),
        }
    }
}

/// One index of an operand. `index` carries the immediate part; `relative`
/// holds a nested operand when the index is computed at runtime.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OperandIndex {
    /// Immediate part of the index (64-bit indices occupy two tokens).
    pub index: u64,
    /// Nested register operand for relative addressing, if any.
    pub relative: Option<Box<Operand>>,
}

impl OperandIndex {
    pub(crate) fn imm(index: u64) -> OperandIndex {
        OperandIndex {
            index,
            relative: None,
        }
    }
}

/// A decoded instruction operand.
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    /// Register file this operand addresses.
    pub op_type: OperandType,
    /// Component count category.
    pub num_components: NumComponents,
    /// Selected components in order; `0xff` marks an unused slot.
    pub comps: [u8; 4],
    /// Immediate values for `Imm32`/`Imm64` operands.
    pub values: [u32; 4],
    /// Register indices, outermost first.
    pub indices: Vec<OperandIndex>,
    /// Source modifier.
    pub modifier: OperandModifier,
    /// Minimum precision hint.
    pub precision: MinPrecision,
    /// Non-uniform resource index hint.
    pub non_uniform: bool,
    /// Function number for `fcall` targets.
    pub func_num: u32,
    /// Index of the matching declaration in the program, once linked.
    pub decl_index: Option<usize>,
    /// Display name assigned by the vendor-extension rewriter.
    pub name: Option<&'static str>,
}

impl Default for Operand {
    fn default() -> Operand {
        Operand {
            op_type: OperandType::Null,
            num_components: NumComponents::Zero,
            comps: [0xff; 4],
            values: [0; 4],
            indices: Vec::new(),
            modifier: OperandModifier::None,
            precision: MinPrecision::Default,
            non_uniform: false,
            func_num: 0,
            decl_index: None,
            name: None,
        }
    }
}

impl Operand {
    /// A `null` destination operand.
    pub(crate) fn null() -> Operand {
        Operand::default()
    }

    /// A scalar 32-bit immediate.
    pub(crate) fn imm32(value: u32) -> Operand {
        Operand {
            op_type: OperandType::Imm32,
            num_components: NumComponents::One,
            comps: [0, 0xff, 0xff, 0xff],
            values: [value, 0, 0, 0],
            ..Operand::default()
        }
    }

    /// First register index, or 0 for indexless operands.
    pub(crate) fn reg(&self) -> u64 {
        self.indices.first().map(|i| i.index).unwrap_or(0)
    }

    /// A copy of this operand narrowed to a single swizzle component.
    pub(crate) fn select_comp(&self, comp: usize) -> Operand {
        let mut out = self.clone();
        out.num_components = NumComponents::One;
        out.comps = [self.comps[comp], 0xff, 0xff, 0xff];
        out
    }

    /// A named copy, for synthesized vendor-extension operands.
    pub(crate) fn named(&self, name: &'static str) -> Operand {
        let mut out = self.clone();
        out.name = Some(name);
        out
    }

    /// Whether two operands address the same registers (type and immediate
    /// indices match, components ignored).
    pub(crate) fn same_reg(&self, other: &Operand) -> bool {
        self.op_type == other.op_type && self.indices == other.indices
    }

    /// `true` when this is a literal scalar or vector immediate.
    pub(crate) fn is_literal(&self) -> bool {
        matches!(self.op_type, OperandType::Imm32 | OperandType::Imm64)
    }
}

/// Accessors for the fields of an operand token (token 0 of each operand).
pub(crate) mod operand_token {
    use super::{NumComponents, SelectionMode};

    pub fn num_components(t: u32) -> NumComponents {
        match t & 0x3 {
            0 => NumComponents::Zero,
            1 => NumComponents::One,
            2 => NumComponents::Four,
            _ => NumComponents::N,
        }
    }

    pub fn selection_mode(t: u32) -> SelectionMode {
        match (t >> 2) & 0x3 {
            1 => SelectionMode::Swizzle,
            2 => SelectionMode::Select1,
            _ => SelectionMode::Mask,
        }
    }

    /// Component mask bits, valid in mask mode.
    pub fn mask(t: u32) -> u32 {
        (t >> 4) & 0xf
    }

    /// 2-bit swizzle source for component `i`, valid in swizzle mode.
    pub fn swizzle(t: u32, i: usize) -> u8 {
        ((t >> (4 + 2 * i)) & 0x3) as u8
    }

    /// Selected component, valid in select-1 mode.
    pub fn select_1(t: u32) -> u8 {
        ((t >> 4) & 0x3) as u8
    }

    /// Operand type field, bits 12..20.
    pub fn op_type(t: u32) -> u32 {
        (t >> 12) & 0xff
    }

    /// Number of indices, bits 20..22.
    pub fn index_dimension(t: u32) -> u32 {
        (t >> 20) & 0x3
    }

    /// Index representation for index `i`, 3 bits each from bit 22.
    pub fn index_type(t: u32, i: usize) -> u32 {
        (t >> (22 + 3 * i)) & 0x7
    }

    /// Bit 31: an extended operand token follows.
    pub fn extended(t: u32) -> bool {
        t & 0x8000_0000 != 0
    }
}

/// Accessors for extended operand tokens.
pub(crate) mod extended_operand {
    /// Extended token type, bits 0..6 (1 = modifier).
    pub fn ext_type(t: u32) -> u32 {
        t & 0x3f
    }

    /// Source modifier, bits 6..14.
    pub fn modifier(t: u32) -> u32 {
        (t >> 6) & 0xff
    }

    /// Minimum precision, bits 14..17.
    pub fn min_precision(t: u32) -> u32 {
        (t >> 14) & 0x7
    }

    /// Non-uniform resource index hint.
    pub fn non_uniform(t: u32) -> bool {
        t & 0x0002_0000 != 0
    }

    /// Bit 31: another extended token follows.
    pub fn extended(t: u32) -> bool {
        t & 0x8000_0000 != 0
    }
}

pub(crate) const EXTENDED_OPERAND_MODIFIER: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operand_type_field_is_byte_at_bit_12() {
        let token = 30 << 12;
        assert_eq!(operand_token::op_type(token), 30);
        assert_eq!(
            OperandType::from_raw(30),
            Some(OperandType::UnorderedAccessView)
        );
        assert_eq!(OperandType::from_raw(42), None);
        assert_eq!(OperandType::from_raw(0xaa), None);
    }

    #[test]
    fn swizzle_fields_decode_in_order() {
        // yzwx = (1, 2, 3, 0)
        let token = (1 << 4) | (2 << 6) | (3 << 8);
        assert_eq!(operand_token::swizzle(token, 0), 1);
        assert_eq!(operand_token::swizzle(token, 1), 2);
        assert_eq!(operand_token::swizzle(token, 2), 3);
        assert_eq!(operand_token::swizzle(token, 3), 0);
    }

    #[test]
    fn select_comp_narrows_to_one_component() {
        let mut op = Operand::default();
        op.op_type = OperandType::Temp;
        op.num_components = NumComponents::Four;
        op.comps = [0, 1, 2, 3];
        op.indices.push(OperandIndex::imm(7));

        let z = op.select_comp(2);
        assert_eq!(z.num_components, NumComponents::One);
        assert_eq!(z.comps, [2, 0xff, 0xff, 0xff]);
        assert!(z.same_reg(&op));
    }
}
