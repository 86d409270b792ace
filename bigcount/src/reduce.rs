//! Element-wise reduction primitives used by the local transport for native
//! reductions and one-sided accumulates.

use crate::error::{BigCountError, Result};
use crate::types::{DataType, ReduceOp};

/// Types that support the predefined reduction operators.
///
/// Returns `None` for operators that are undefined on the type.
pub(crate) trait Reducible: Copy + 'static {
    fn reduce(a: Self, b: Self, op: ReduceOp) -> Option<Self>;
}

macro_rules! impl_reducible {
    (int: $($ty:ty),*) => {
        $(
            impl Reducible for $ty {
                #[inline]
                fn reduce(a: Self, b: Self, op: ReduceOp) -> Option<Self> {
                    let r = match op {
                        ReduceOp::Sum => a.wrapping_add(b),
                        ReduceOp::Prod => a.wrapping_mul(b),
                        ReduceOp::Min => a.min(b),
                        ReduceOp::Max => a.max(b),
                        ReduceOp::LAnd => ((a != 0) && (b != 0)) as $ty,
                        ReduceOp::BAnd => a & b,
                        ReduceOp::LOr => ((a != 0) || (b != 0)) as $ty,
                        ReduceOp::BOr => a | b,
                        ReduceOp::LXor => ((a != 0) != (b != 0)) as $ty,
                        ReduceOp::BXor => a ^ b,
                        ReduceOp::MaxLoc | ReduceOp::MinLoc => return None,
                    };
                    Some(r)
                }
            }
        )*
    };
    (float: $($ty:ty),*) => {
        $(
            impl Reducible for $ty {
                #[inline]
                fn reduce(a: Self, b: Self, op: ReduceOp) -> Option<Self> {
                    match op {
                        ReduceOp::Sum => Some(a + b),
                        ReduceOp::Prod => Some(a * b),
                        ReduceOp::Min => Some(a.min(b)),
                        ReduceOp::Max => Some(a.max(b)),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_reducible!(int: i8, i16, i32, i64, i128, u8, u16, u32, u64, u128);
impl_reducible!(float: f32, f64);

/// Whether `op` is defined for elements of `dtype`.
pub fn supports(dtype: DataType, op: ReduceOp) -> bool {
    match op {
        ReduceOp::MaxLoc | ReduceOp::MinLoc => false,
        _ if dtype.is_float() => op.is_arithmetic(),
        _ => true,
    }
}

/// Element-wise `dst[i] = op(dst[i], src[i])` on byte slices interpreted as
/// `dtype` elements in host byte order.
///
/// `dst` and `src` must both contain exactly `count * dtype.size_in_bytes()` bytes.
pub(crate) fn reduce_slice(
    dst: &mut [u8],
    src: &[u8],
    count: usize,
    dtype: DataType,
    op: ReduceOp,
) -> Result<()> {
    if !supports(dtype, op) {
        return Err(BigCountError::UnsupportedDType {
            dtype,
            op: op.name(),
        });
    }
    let expected = count * dtype.size_in_bytes();
    if dst.len() != expected || src.len() != expected {
        return Err(BigCountError::BufferSizeMismatch {
            expected,
            actual: dst.len().min(src.len()),
        });
    }
    match dtype {
        DataType::F32 => reduce_slice_typed::<f32>(dst, src, count, op),
        DataType::F64 => reduce_slice_typed::<f64>(dst, src, count, op),
        DataType::I8 => reduce_slice_typed::<i8>(dst, src, count, op),
        DataType::I16 => reduce_slice_typed::<i16>(dst, src, count, op),
        DataType::I32 => reduce_slice_typed::<i32>(dst, src, count, op),
        DataType::I64 => reduce_slice_typed::<i64>(dst, src, count, op),
        DataType::I128 => reduce_slice_typed::<i128>(dst, src, count, op),
        DataType::U8 => reduce_slice_typed::<u8>(dst, src, count, op),
        DataType::U16 => reduce_slice_typed::<u16>(dst, src, count, op),
        DataType::U32 => reduce_slice_typed::<u32>(dst, src, count, op),
        DataType::U64 => reduce_slice_typed::<u64>(dst, src, count, op),
        DataType::U128 => reduce_slice_typed::<u128>(dst, src, count, op),
    }
}

/// Alignment-safe access to host-order element bytes.
trait NeBytes: Sized {
    fn read_ne(bytes: &[u8]) -> Self;
    fn write_ne(self, bytes: &mut [u8]);
}

macro_rules! impl_ne_bytes {
    ($($ty:ty),*) => {
        $(
            impl NeBytes for $ty {
                #[inline]
                fn read_ne(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    Self::from_ne_bytes(raw)
                }
                #[inline]
                fn write_ne(self, bytes: &mut [u8]) {
                    bytes.copy_from_slice(&self.to_ne_bytes());
                }
            }
        )*
    };
}

impl_ne_bytes!(i8, i16, i32, i64, i128, u8, u16, u32, u64, u128, f32, f64);

fn reduce_slice_typed<T: Reducible + NeBytes>(
    dst: &mut [u8],
    src: &[u8],
    count: usize,
    op: ReduceOp,
) -> Result<()> {
    let t_size = std::mem::size_of::<T>();
    for i in 0..count {
        let off = i * t_size;
        let a = T::read_ne(&dst[off..off + t_size]);
        let b = T::read_ne(&src[off..off + t_size]);
        let r = T::reduce(a, b, op).ok_or(BigCountError::UnsupportedOp { op })?;
        r.write_ne(&mut dst[off..off + t_size]);
    }
    Ok(())
}
