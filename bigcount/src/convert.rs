//! Per-peer vector conversion.
//!
//! Irregular collectives take per-peer counts, types and displacements whose
//! counts may exceed the transport limit. [`convert`] turns each peer entry
//! into one composed datatype with native count 1 (or 0), and a byte
//! displacement the neighbor exchange can consume directly.

use crate::codec::encode;
use crate::datatype::{OwnedDatatype, TypeSystem};
use crate::error::{BigCountError, Result};
use crate::transport::NeighborBlock;
use crate::types::{Aint, Count};

/// Per-peer counts, or one count shared by every peer.
#[derive(Debug, Clone, Copy)]
pub enum CountArg<'a> {
    Splat(Count),
    PerPeer(&'a [Count]),
}

/// Per-peer datatypes, or one datatype shared by every peer.
#[derive(Debug, Clone, Copy)]
pub enum TypeArg<'a, H> {
    Splat(H),
    PerPeer(&'a [H]),
}

/// Per-peer displacements in units of each peer's datatype extent, or all
/// zero.
#[derive(Debug, Clone, Copy)]
pub enum DisplArg<'a> {
    Zero,
    PerPeer(&'a [Aint]),
}

impl CountArg<'_> {
    pub fn get(&self, i: usize) -> Count {
        match self {
            CountArg::Splat(c) => *c,
            CountArg::PerPeer(v) => v[i],
        }
    }

    pub fn check_len(&self, n: usize, what: &'static str) -> Result<()> {
        match self {
            CountArg::PerPeer(v) => check_len(v.len(), n, what),
            CountArg::Splat(_) => Ok(()),
        }
    }
}

impl<H: Copy> TypeArg<'_, H> {
    pub fn get(&self, i: usize) -> H {
        match self {
            TypeArg::Splat(t) => *t,
            TypeArg::PerPeer(v) => v[i],
        }
    }

    pub fn check_len(&self, n: usize, what: &'static str) -> Result<()> {
        match self {
            TypeArg::PerPeer(v) => check_len(v.len(), n, what),
            TypeArg::Splat(_) => Ok(()),
        }
    }
}

impl DisplArg<'_> {
    pub fn get(&self, i: usize) -> Aint {
        match self {
            DisplArg::Zero => 0,
            DisplArg::PerPeer(v) => v[i],
        }
    }

    pub fn check_len(&self, n: usize, what: &'static str) -> Result<()> {
        match self {
            DisplArg::PerPeer(v) => check_len(v.len(), n, what),
            DisplArg::Zero => Ok(()),
        }
    }
}

fn check_len(actual: usize, expected: usize, what: &'static str) -> Result<()> {
    if actual != expected {
        return Err(BigCountError::VectorLength {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

/// One converted peer entry.
struct ConvertedPeer<'t, T: TypeSystem> {
    count: i32,
    datatype: Option<OwnedDatatype<'t, T>>,
    byte_displacement: Aint,
    unit_displacement: Option<Aint>,
}

/// Output of [`convert`]: `N` entries, each count 0 or 1, owning its
/// composed datatype.
pub struct ConvertedVectors<'t, T: TypeSystem> {
    ts: &'t T,
    peers: Vec<ConvertedPeer<'t, T>>,
}

impl<'t, T: TypeSystem> ConvertedVectors<'t, T> {
    /// `n` entries with count 0, the null type and displacement 0.
    pub fn suppressed(ts: &'t T, n: usize) -> Self {
        let peers = (0..n)
            .map(|_| ConvertedPeer {
                count: 0,
                datatype: None,
                byte_displacement: 0,
                unit_displacement: Some(0),
            })
            .collect();
        Self { ts, peers }
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn count(&self, i: usize) -> i32 {
        self.peers[i].count
    }

    pub fn datatype(&self, i: usize) -> T::Datatype {
        match &self.peers[i].datatype {
            Some(dt) => dt.raw(),
            None => self.ts.datatype_null(),
        }
    }

    /// Displacement of entry `i` in bytes from the buffer start.
    pub fn byte_displacement(&self, i: usize) -> Aint {
        self.peers[i].byte_displacement
    }

    /// Displacement of entry `i` in units of its composed type's extent,
    /// when that division is exact.
    pub fn displacement_in_units(&self, i: usize) -> Option<Aint> {
        self.peers[i].unit_displacement
    }

    pub fn block(&self, i: usize) -> NeighborBlock<T::Datatype> {
        NeighborBlock {
            count: self.count(i),
            displacement: self.byte_displacement(i),
            datatype: self.datatype(i),
        }
    }
}

/// Convert `n` per-peer entries into composed-type entries.
///
/// Each entry `i` becomes count 1 of `encode(counts[i], types[i])`, with
/// displacement `displs[i] * extent(types[i])` bytes. Every output datatype
/// is released when the result is dropped, including on error.
pub fn convert<'t, T: TypeSystem>(
    ts: &'t T,
    n: usize,
    counts: CountArg<'_>,
    types: TypeArg<'_, T::Datatype>,
    displs: DisplArg<'_>,
) -> Result<ConvertedVectors<'t, T>> {
    counts.check_len(n, "counts")?;
    types.check_len(n, "datatypes")?;
    displs.check_len(n, "displacements")?;

    let mut peers = Vec::with_capacity(n);
    for i in 0..n {
        let (count, basetype, displ) = (counts.get(i), types.get(i), displs.get(i));
        let (_, old_extent) = ts.type_extent(basetype)?;
        let composed = encode(ts, count, basetype)?;
        let new_extent = composed.extent()?;
        let byte_displacement = displ
            .checked_mul(old_extent)
            .ok_or(BigCountError::Overflow("byte displacement"))?;
        peers.push(ConvertedPeer {
            count: 1,
            datatype: Some(composed),
            byte_displacement,
            unit_displacement: rescale_displacement(displ, old_extent, new_extent).ok(),
        });
    }
    Ok(ConvertedVectors { ts, peers })
}

/// Rescale a displacement from units of `old_extent` to units of
/// `new_extent`, failing when the result is not a whole number.
pub fn rescale_displacement(displ: Aint, old_extent: Aint, new_extent: Aint) -> Result<Aint> {
    let bytes = displ
        .checked_mul(old_extent)
        .ok_or(BigCountError::Overflow("byte displacement"))?;
    let inexact = BigCountError::InexactDisplacement {
        displacement: displ,
        old_extent,
        new_extent,
    };
    if new_extent == 0 {
        return if bytes == 0 { Ok(0) } else { Err(inexact) };
    }
    if bytes % new_extent != 0 {
        return Err(inexact);
    }
    Ok(bytes / new_extent)
}
