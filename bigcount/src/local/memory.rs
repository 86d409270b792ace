//! Gather and scatter of typed host memory.

use crate::error::{BigCountError, Result};
use crate::local::types::Layout;
use crate::types::Aint;

pub(crate) use crate::types::byte_offset as offset;

/// Copy `count` instances described by `layout` at `addr` into a
/// contiguous byte buffer.
///
/// # Safety
/// Every byte of the type map must be readable.
pub(crate) unsafe fn pack(addr: u64, count: usize, layout: &Layout) -> Vec<u8> {
    let mut out = Vec::with_capacity(count * layout.size);
    if layout.is_dense() && layout.lb == 0 {
        let src = unsafe { std::slice::from_raw_parts(addr as *const u8, count * layout.size) };
        out.extend_from_slice(src);
        return out;
    }
    for j in 0..count {
        let base = offset(addr, j as Aint * layout.extent);
        for (off, len) in &layout.segments {
            let src = unsafe { std::slice::from_raw_parts(offset(base, *off) as *const u8, *len) };
            out.extend_from_slice(src);
        }
    }
    out
}

/// Scatter `data` into up to `count` instances at `addr`.
///
/// Shorter payloads fill a prefix of the type map; longer ones are an error.
///
/// # Safety
/// Every byte of the type map must be writable.
pub(crate) unsafe fn unpack(data: &[u8], addr: u64, count: usize, layout: &Layout) -> Result<()> {
    let capacity = count * layout.size;
    if data.len() > capacity {
        return Err(BigCountError::BufferSizeMismatch {
            expected: capacity,
            actual: data.len(),
        });
    }
    if layout.is_dense() && layout.lb == 0 {
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), addr as *mut u8, data.len());
        }
        return Ok(());
    }
    let mut remaining = data;
    'outer: for j in 0..count {
        let base = offset(addr, j as Aint * layout.extent);
        for (off, len) in &layout.segments {
            if remaining.is_empty() {
                break 'outer;
            }
            let n = (*len).min(remaining.len());
            unsafe {
                std::ptr::copy_nonoverlapping(
                    remaining.as_ptr(),
                    offset(base, *off) as *mut u8,
                    n,
                );
            }
            remaining = &remaining[n..];
        }
    }
    Ok(())
}

/// Byte range `[lo, hi)` touched by `count` instances, relative to the
/// buffer address.
pub(crate) fn footprint(count: usize, layout: &Layout) -> Result<(Aint, Aint)> {
    if count == 0 || layout.segments.is_empty() {
        return Ok((0, 0));
    }
    let lo = layout.segments.iter().map(|(off, _)| *off).min().unwrap_or(0);
    let hi = layout
        .segments
        .iter()
        .map(|(off, len)| off + *len as Aint)
        .max()
        .unwrap_or(0);
    let last = (count as Aint - 1)
        .checked_mul(layout.extent)
        .ok_or(BigCountError::Overflow("buffer footprint"))?;
    Ok((lo.min(lo + last), hi.max(hi + last)))
}
