/// Rank of a participant in a communicator group (0-indexed).
pub type Rank = u32;

/// Unsigned wide element count.
pub type Count = u64;

/// Signed, address-sized integer used for displacements and extents.
pub type Aint = i64;

/// Predefined element types understood by every transport.
///
/// Each variant maps to one named datatype handle via
/// [`TypeSystem::predefined`](crate::datatype::TypeSystem::predefined).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    F32 = 0,
    F64 = 1,
    I8 = 2,
    I16 = 3,
    I32 = 4,
    I64 = 5,
    I128 = 6,
    U8 = 7,
    U16 = 8,
    U32 = 9,
    U64 = 10,
    U128 = 11,
}

impl DataType {
    pub const ALL: [DataType; 12] = [
        DataType::F32,
        DataType::F64,
        DataType::I8,
        DataType::I16,
        DataType::I32,
        DataType::I64,
        DataType::I128,
        DataType::U8,
        DataType::U16,
        DataType::U32,
        DataType::U64,
        DataType::U128,
    ];

    /// Size of one element in bytes.
    pub const fn size_in_bytes(self) -> usize {
        match self {
            DataType::I8 | DataType::U8 => 1,
            DataType::I16 | DataType::U16 => 2,
            DataType::F32 | DataType::I32 | DataType::U32 => 4,
            DataType::F64 | DataType::I64 | DataType::U64 => 8,
            DataType::I128 | DataType::U128 => 16,
        }
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            DataType::F32 => "f32",
            DataType::F64 => "f64",
            DataType::I8 => "i8",
            DataType::I16 => "i16",
            DataType::I32 => "i32",
            DataType::I64 => "i64",
            DataType::I128 => "i128",
            DataType::U8 => "u8",
            DataType::U16 => "u16",
            DataType::U32 => "u32",
            DataType::U64 => "u64",
            DataType::U128 => "u128",
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }

    /// Inverse of `self as u8`.
    pub fn from_repr(repr: u8) -> Option<Self> {
        Self::ALL.get(repr as usize).copied()
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Predefined reduction operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    /// Element-wise sum across ranks.
    Sum,
    /// Element-wise product across ranks.
    Prod,
    /// Element-wise minimum across ranks.
    Min,
    /// Element-wise maximum across ranks.
    Max,
    /// Logical and (non-zero is true).
    LAnd,
    /// Bitwise and.
    BAnd,
    /// Logical or.
    LOr,
    /// Bitwise or.
    BOr,
    /// Logical exclusive or.
    LXor,
    /// Bitwise exclusive or.
    BXor,
    /// Maximum value paired with its index.
    MaxLoc,
    /// Minimum value paired with its index.
    MinLoc,
}

impl ReduceOp {
    pub const fn name(self) -> &'static str {
        match self {
            ReduceOp::Sum => "sum",
            ReduceOp::Prod => "prod",
            ReduceOp::Min => "min",
            ReduceOp::Max => "max",
            ReduceOp::LAnd => "land",
            ReduceOp::BAnd => "band",
            ReduceOp::LOr => "lor",
            ReduceOp::BOr => "bor",
            ReduceOp::LXor => "lxor",
            ReduceOp::BXor => "bxor",
            ReduceOp::MaxLoc => "maxloc",
            ReduceOp::MinLoc => "minloc",
        }
    }

    /// Bitwise and logical operators are only defined on integer types.
    pub const fn is_arithmetic(self) -> bool {
        matches!(
            self,
            ReduceOp::Sum | ReduceOp::Prod | ReduceOp::Min | ReduceOp::Max
        )
    }
}

impl std::fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// `addr + bytes` for a signed byte offset.
pub(crate) fn byte_offset(addr: u64, bytes: Aint) -> u64 {
    (addr as i64).wrapping_add(bytes) as u64
}

/// Source of the outgoing data for a call that accepts an in-place marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendBuf {
    /// The receive buffer doubles as input.
    InPlace,
    /// Address of a separate send buffer.
    Addr(u64),
}

impl SendBuf {
    pub fn addr(self) -> Option<u64> {
        match self {
            SendBuf::InPlace => None,
            SendBuf::Addr(ptr) => Some(ptr),
        }
    }

    /// Offset a separate send buffer by `bytes`; in-place stays in-place.
    pub fn offset(self, bytes: u64) -> Self {
        match self {
            SendBuf::InPlace => SendBuf::InPlace,
            SendBuf::Addr(ptr) => SendBuf::Addr(ptr + bytes),
        }
    }
}

/// Contiguous native-count buffer description: `count` items of `datatype`
/// starting at `addr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufDesc<H, C> {
    pub addr: u64,
    pub count: C,
    pub datatype: H,
}

/// Buffer whose count the transport accepts directly.
pub type NativeBuf<H> = BufDesc<H, i32>;

/// Buffer whose count may exceed the transport limit.
pub type WideBuf<H> = BufDesc<H, Count>;

impl<H, C> BufDesc<H, C> {
    pub fn new(addr: u64, count: C, datatype: H) -> Self {
        Self {
            addr,
            count,
            datatype,
        }
    }
}

/// Remote side of a one-sided operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDesc<H, C> {
    pub rank: Rank,
    /// Displacement in units of the window's displacement unit.
    pub disp: Aint,
    pub count: C,
    pub datatype: H,
}

pub type NativeTarget<H> = TargetDesc<H, i32>;
pub type WideTarget<H> = TargetDesc<H, Count>;

impl<H, C> TargetDesc<H, C> {
    pub fn new(rank: Rank, disp: Aint, count: C, datatype: H) -> Self {
        Self {
            rank,
            disp,
            count,
            datatype,
        }
    }
}
