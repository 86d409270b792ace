//! Datatype construction and introspection.
//!
//! [`TypeSystem`] is the slice of a message-passing runtime that builds,
//! commits, frees and inspects derived datatypes. The codec and vector
//! converter are written against it alone, so they never need a live
//! communicator.

use crate::error::Result;
use crate::types::{Aint, Count, DataType};

/// How a datatype was constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combiner {
    /// A predefined type.
    Named,
    Contiguous,
    Vector,
    Struct,
}

/// Sizes of the argument arrays a derived type was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    pub num_integers: usize,
    pub num_addresses: usize,
    pub num_datatypes: usize,
    pub combiner: Combiner,
}

impl Envelope {
    pub fn named() -> Self {
        Self {
            num_integers: 0,
            num_addresses: 0,
            num_datatypes: 0,
            combiner: Combiner::Named,
        }
    }

    pub fn counts(&self) -> (usize, usize, usize) {
        (self.num_integers, self.num_addresses, self.num_datatypes)
    }
}

/// Constructor arguments of a derived type, laid out as the constructor
/// received them:
///
/// - contiguous: integers `[count]`, datatypes `[old]`
/// - vector: integers `[count, blocklength, stride]`, datatypes `[old]`
/// - struct: integers `[n, bl_0 .. bl_n]`, addresses `[d_0 .. d_n]`,
///   datatypes `[t_0 .. t_n]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contents<H> {
    pub integers: Vec<i32>,
    pub addresses: Vec<Aint>,
    pub datatypes: Vec<H>,
}

/// Datatype operations of a message-passing runtime.
///
/// Handles are plain copyable values. Derived handles must be released with
/// [`type_free`](Self::type_free); [`OwnedDatatype`] does that on drop.
pub trait TypeSystem: Send + Sync {
    type Datatype: Copy + Eq + std::hash::Hash + std::fmt::Debug + Send + Sync + 'static;

    /// Largest count a single native call accepts. Never exceeds `i32::MAX`.
    fn native_max(&self) -> Count;

    /// The null datatype used for suppressed vector entries.
    fn datatype_null(&self) -> Self::Datatype;

    /// Handle of a predefined element type.
    fn predefined(&self, dtype: DataType) -> Self::Datatype;

    fn type_contiguous(&self, count: i32, oldtype: Self::Datatype) -> Result<Self::Datatype>;

    fn type_vector(
        &self,
        count: i32,
        blocklength: i32,
        stride: i32,
        oldtype: Self::Datatype,
    ) -> Result<Self::Datatype>;

    /// Byte displacements, one block length and type per member.
    fn type_create_struct(
        &self,
        blocklengths: &[i32],
        displacements: &[Aint],
        types: &[Self::Datatype],
    ) -> Result<Self::Datatype>;

    fn type_commit(&self, datatype: Self::Datatype) -> Result<()>;

    fn type_free(&self, datatype: Self::Datatype) -> Result<()>;

    /// Returns `(lower_bound, extent)` in bytes.
    fn type_extent(&self, datatype: Self::Datatype) -> Result<(Aint, Aint)>;

    fn type_envelope(&self, datatype: Self::Datatype) -> Result<Envelope>;

    /// Constructor arguments of a derived type.
    ///
    /// The returned datatypes remain owned by `datatype`; callers must not
    /// free them.
    fn type_contents(&self, datatype: Self::Datatype) -> Result<Contents<Self::Datatype>>;

    fn is_predefined(&self, datatype: Self::Datatype) -> Result<bool> {
        Ok(self.type_envelope(datatype)?.combiner == Combiner::Named)
    }
}

/// RAII wrapper that frees a derived datatype when dropped.
///
/// Release errors are logged rather than propagated.
pub struct OwnedDatatype<'t, T: TypeSystem> {
    ts: &'t T,
    raw: T::Datatype,
}

impl<'t, T: TypeSystem> OwnedDatatype<'t, T> {
    /// Take ownership of a freshly constructed derived handle.
    pub fn from_raw(ts: &'t T, raw: T::Datatype) -> Self {
        Self { ts, raw }
    }

    pub fn contiguous(ts: &'t T, count: i32, oldtype: T::Datatype) -> Result<Self> {
        Ok(Self::from_raw(ts, ts.type_contiguous(count, oldtype)?))
    }

    pub fn vector(
        ts: &'t T,
        count: i32,
        blocklength: i32,
        stride: i32,
        oldtype: T::Datatype,
    ) -> Result<Self> {
        Ok(Self::from_raw(
            ts,
            ts.type_vector(count, blocklength, stride, oldtype)?,
        ))
    }

    pub fn create_struct(
        ts: &'t T,
        blocklengths: &[i32],
        displacements: &[Aint],
        types: &[T::Datatype],
    ) -> Result<Self> {
        Ok(Self::from_raw(
            ts,
            ts.type_create_struct(blocklengths, displacements, types)?,
        ))
    }

    pub fn commit(self) -> Result<Self> {
        self.ts.type_commit(self.raw)?;
        Ok(self)
    }

    pub fn raw(&self) -> T::Datatype {
        self.raw
    }

    pub fn extent(&self) -> Result<Aint> {
        Ok(self.ts.type_extent(self.raw)?.1)
    }
}

impl<T: TypeSystem> std::fmt::Debug for OwnedDatatype<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("OwnedDatatype").field(&self.raw).finish()
    }
}

impl<T: TypeSystem> Drop for OwnedDatatype<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.ts.type_free(self.raw) {
            tracing::warn!(datatype = ?self.raw, error = %e, "failed to free datatype");
        }
    }
}
