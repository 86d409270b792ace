//! Large-count datatype codec.
//!
//! A count `n` of `basetype` that does not fit the transport limit `nm` is
//! encoded as one committed datatype whose single instance carries all `n`
//! elements:
//!
//! ```text
//! struct {
//!     vector(c, nm, nm) of basetype   at byte 0
//!     contiguous(r) of basetype       at byte c * nm * extent(basetype)
//! }
//! c = n / nm, r = n % nm
//! ```
//!
//! With the `factorize` feature, counts that split into two native factors
//! are encoded as a single `vector(a, b, b)` instead.

use crate::datatype::{Combiner, Envelope, OwnedDatatype, TypeSystem};
use crate::error::{BigCountError, Result, native_count};
use crate::types::{Aint, Count};

/// Which encoding [`encode`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecStrategy {
    /// `struct{vector(c, nm, nm), contiguous(r)}` for every count.
    QuotientRemainder,
    /// `vector(a, b, b)` when `n = a * b` with both factors native,
    /// quotient/remainder otherwise.
    Factorize,
}

impl CodecStrategy {
    /// The strategy selected by the `factorize` feature.
    pub const ACTIVE: CodecStrategy = if cfg!(feature = "factorize") {
        CodecStrategy::Factorize
    } else {
        CodecStrategy::QuotientRemainder
    };
}

/// Largest count the codec can represent for a given native limit and
/// element extent in bytes.
///
/// Every encodable count is strictly below this value, so the byte span of
/// the composed datatype always fits an [`Aint`].
pub fn count_max(native_max: Count, extent: Aint) -> Count {
    let bound = native_max.saturating_mul(native_max.saturating_add(1));
    let span = Aint::MAX / extent.max(1);
    bound.min(span as Count)
}

/// Encode `count` elements of `basetype` as one committed composed datatype.
pub fn encode<'t, T: TypeSystem>(
    ts: &'t T,
    count: Count,
    basetype: T::Datatype,
) -> Result<OwnedDatatype<'t, T>> {
    let nm = ts.native_max();
    let (_, extent) = ts.type_extent(basetype)?;
    if extent <= 0 {
        return Err(BigCountError::ZeroExtent { extent });
    }
    let max = count_max(nm, extent);
    if count >= max {
        return Err(BigCountError::CountTooLarge { count, max });
    }

    if CodecStrategy::ACTIVE == CodecStrategy::Factorize
        && let Some((a, b)) = factorize(count, nm)
    {
        tracing::trace!(count, a, b, "encoding count as factored vector");
        let b = native_count(b)?;
        return OwnedDatatype::vector(ts, native_count(a)?, b, b, basetype)?.commit();
    }

    let c = count / nm;
    let r = count % nm;
    let nm_native = native_count(nm)?;
    let chunks = OwnedDatatype::vector(ts, native_count(c)?, nm_native, nm_native, basetype)?;
    let remainder = OwnedDatatype::contiguous(ts, native_count(r)?, basetype)?;
    let remainder_disp = chunk_bytes(c, nm, extent)?;

    tracing::trace!(count, c, r, remainder_disp, "encoding count as chunks plus remainder");
    OwnedDatatype::create_struct(
        ts,
        &[1, 1],
        &[0, remainder_disp],
        &[chunks.raw(), remainder.raw()],
    )?
    .commit()
}

/// Recover `(count, basetype)` from a datatype produced by [`encode`].
///
/// Fails when the datatype does not have the exact composed shape.
pub fn decode<T: TypeSystem>(ts: &T, composed: T::Datatype) -> Result<(Count, T::Datatype)> {
    let env = ts.type_envelope(composed)?;
    match env.combiner {
        Combiner::Struct => decode_struct(ts, composed, env),
        Combiner::Vector if CodecStrategy::ACTIVE == CodecStrategy::Factorize => {
            decode_factored(ts, composed, env)
        }
        other => Err(BigCountError::decode(format!(
            "expected a struct combiner, found {other:?}"
        ))),
    }
}

fn decode_struct<T: TypeSystem>(
    ts: &T,
    composed: T::Datatype,
    env: Envelope,
) -> Result<(Count, T::Datatype)> {
    expect_envelope(env, (3, 2, 2), "composed struct")?;
    let contents = ts.type_contents(composed)?;
    if contents.integers != [2, 1, 1] {
        return Err(BigCountError::decode(format!(
            "unexpected struct integers {:?}",
            contents.integers
        )));
    }
    if contents.addresses.first() != Some(&0) {
        return Err(BigCountError::decode(format!(
            "chunk member must start at byte 0, found {:?}",
            contents.addresses
        )));
    }

    let nm = ts.native_max();
    let (c, chunk_base) = decode_chunks(ts, contents.datatypes[0], nm)?;
    let (r, remainder_base) = decode_remainder(ts, contents.datatypes[1])?;
    if chunk_base != remainder_base {
        return Err(BigCountError::decode(format!(
            "members disagree on base type: {chunk_base:?} vs {remainder_base:?}"
        )));
    }

    let (_, extent) = ts.type_extent(chunk_base)?;
    if contents.addresses[1] != chunk_bytes(c, nm, extent)? {
        return Err(BigCountError::decode(format!(
            "remainder displacement {} does not follow {c} chunks",
            contents.addresses[1]
        )));
    }

    let count = c
        .checked_mul(nm)
        .and_then(|v| v.checked_add(r))
        .ok_or(BigCountError::Overflow("decoded count"))?;
    Ok((count, chunk_base))
}

fn decode_chunks<T: TypeSystem>(
    ts: &T,
    chunks: T::Datatype,
    nm: Count,
) -> Result<(Count, T::Datatype)> {
    let env = ts.type_envelope(chunks)?;
    if env.combiner != Combiner::Vector {
        return Err(BigCountError::decode(format!(
            "chunk member must be a vector, found {:?}",
            env.combiner
        )));
    }
    expect_envelope(env, (3, 0, 1), "chunk vector")?;
    let contents = ts.type_contents(chunks)?;
    let [count, blocklength, stride] = contents.integers[..] else {
        return Err(BigCountError::decode("malformed chunk vector"));
    };
    if Count::try_from(blocklength).ok() != Some(nm) || stride != blocklength {
        return Err(BigCountError::decode(format!(
            "chunk vector must be ({nm}, {nm}), found ({blocklength}, {stride})"
        )));
    }
    let c = Count::try_from(count)
        .map_err(|_| BigCountError::decode(format!("negative chunk count {count}")))?;
    Ok((c, contents.datatypes[0]))
}

fn decode_remainder<T: TypeSystem>(
    ts: &T,
    remainder: T::Datatype,
) -> Result<(Count, T::Datatype)> {
    let env = ts.type_envelope(remainder)?;
    if env.combiner != Combiner::Contiguous {
        return Err(BigCountError::decode(format!(
            "remainder member must be contiguous, found {:?}",
            env.combiner
        )));
    }
    expect_envelope(env, (1, 0, 1), "remainder contiguous")?;
    let contents = ts.type_contents(remainder)?;
    let r = Count::try_from(contents.integers[0]).map_err(|_| {
        BigCountError::decode(format!("negative remainder {}", contents.integers[0]))
    })?;
    Ok((r, contents.datatypes[0]))
}

fn decode_factored<T: TypeSystem>(
    ts: &T,
    composed: T::Datatype,
    env: Envelope,
) -> Result<(Count, T::Datatype)> {
    expect_envelope(env, (3, 0, 1), "factored vector")?;
    let contents = ts.type_contents(composed)?;
    let [a, b, stride] = contents.integers[..] else {
        return Err(BigCountError::decode("malformed factored vector"));
    };
    if stride != b || a < 0 || b < 0 {
        return Err(BigCountError::decode(format!(
            "factored vector must be dense, found ({a}, {b}, {stride})"
        )));
    }
    Ok((a as Count * b as Count, contents.datatypes[0]))
}

/// Smallest factor `a` above `count / nm` such that `count = a * b`.
///
/// Both factors are then at most `nm` because `count < nm * (nm + 1)`.
fn factorize(count: Count, nm: Count) -> Option<(Count, Count)> {
    let lo = count / nm + 1;
    let hi = count.isqrt();
    (lo..=hi)
        .find(|g| count % g == 0)
        .map(|g| (g, count / g))
}

fn expect_envelope(env: Envelope, want: (usize, usize, usize), what: &str) -> Result<()> {
    if env.counts() != want {
        return Err(BigCountError::decode(format!(
            "{what} envelope {:?}, expected {want:?}",
            env.counts()
        )));
    }
    Ok(())
}

fn chunk_bytes(c: Count, nm: Count, extent: Aint) -> Result<Aint> {
    Aint::try_from(c)
        .ok()
        .zip(Aint::try_from(nm).ok())
        .and_then(|(c, nm)| c.checked_mul(nm))
        .and_then(|v| v.checked_mul(extent))
        .ok_or(BigCountError::Overflow("remainder displacement"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalWorld;
    use crate::types::DataType;

    #[test]
    fn test_count_max() {
        assert_eq!(count_max(16, 8), 272);
        assert_eq!(count_max(i32::MAX as Count, 1), 4_611_686_016_279_904_256);
        assert_eq!(count_max(i32::MAX as Count, 4), Aint::MAX as Count / 4);
        assert_eq!(count_max(u64::MAX, 1), Aint::MAX as Count);
    }

    #[test]
    fn test_roundtrip_below_ceiling_at_default_limit() {
        let t = LocalWorld::new(1).single().unwrap();
        let nm = t.native_max();
        for dt in [DataType::U8, DataType::I32, DataType::F64, DataType::U128] {
            let base = t.predefined(dt);
            let extent = dt.size_in_bytes() as Aint;
            let top = count_max(nm, extent) - 1;
            for count in [nm - 1, nm, nm + 1, 2 * nm + 7, top] {
                let composed = encode(&t, count, base).unwrap();
                assert_eq!(decode(&t, composed.raw()).unwrap(), (count, base), "{dt} x {count}");
                assert!(composed.extent().unwrap() <= Aint::MAX - extent + 1);
            }
            let err = encode(&t, top + 1, base).unwrap_err();
            assert!(matches!(err, BigCountError::CountTooLarge { .. }), "{dt}");
        }
    }

    #[test]
    fn test_factorize() {
        assert_eq!(factorize(100, 16), Some((10, 10)));
        assert_eq!(factorize(96, 16), Some((8, 12)));
        // 97 is prime.
        assert_eq!(factorize(97, 16), None);
        assert_eq!(factorize(0, 16), None);
    }

    #[test]
    fn test_active_strategy_matches_feature() {
        assert_eq!(
            CodecStrategy::ACTIVE == CodecStrategy::Factorize,
            cfg!(feature = "factorize")
        );
    }

    #[test]
    fn test_roundtrip_boundary_counts() {
        let t = LocalWorld::new(1).native_max(16).single().unwrap();
        for dt in [DataType::U8, DataType::I32, DataType::F64, DataType::U128] {
            let base = t.predefined(dt);
            for count in [0, 1, 15, 16, 17, 33, 97, 255, 256, 271] {
                let composed = encode(&t, count, base).unwrap();
                assert_eq!(decode(&t, composed.raw()).unwrap(), (count, base));
                let expected = count as Aint * dt.size_in_bytes() as Aint;
                assert_eq!(composed.extent().unwrap(), expected, "{dt} x {count}");
            }
        }
    }

    #[test]
    fn test_encode_rejects_count_max() {
        let t = LocalWorld::new(1).native_max(16).single().unwrap();
        let base = t.predefined(DataType::I32);
        let err = encode(&t, 272, base).unwrap_err();
        assert!(matches!(err, BigCountError::CountTooLarge { count: 272, max: 272 }));
    }

    #[test]
    fn test_encode_frees_intermediates() {
        let t = LocalWorld::new(1).native_max(16).single().unwrap();
        let base = t.predefined(DataType::I64);
        let before = t.live_datatypes();
        {
            let composed = encode(&t, 100, base).unwrap();
            decode(&t, composed.raw()).unwrap();
        }
        assert_eq!(t.live_datatypes(), before);
    }

    #[test]
    fn test_decode_rejects_foreign_types() {
        let t = LocalWorld::new(1).native_max(16).single().unwrap();
        let base = t.predefined(DataType::I32);

        let err = decode(&t, base).unwrap_err();
        assert!(matches!(err, BigCountError::Decode(_)));

        let contig = OwnedDatatype::contiguous(&t, 4, base).unwrap();
        assert!(decode(&t, contig.raw()).is_err());

        // Right combiner, wrong blocklength.
        let chunks = OwnedDatatype::vector(&t, 2, 8, 8, base).unwrap();
        let rem = OwnedDatatype::contiguous(&t, 3, base).unwrap();
        let bogus =
            OwnedDatatype::create_struct(&t, &[1, 1], &[0, 64], &[chunks.raw(), rem.raw()])
                .unwrap();
        assert!(decode(&t, bogus.raw()).is_err());

        // Three members.
        let three = OwnedDatatype::create_struct(
            &t,
            &[1, 1, 1],
            &[0, 4, 8],
            &[base, base, base],
        )
        .unwrap();
        assert!(decode(&t, three.raw()).is_err());
    }
}
