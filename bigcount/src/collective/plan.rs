use crate::codec::count_max;
use crate::convert::{ConvertedVectors, CountArg, DisplArg, TypeArg, convert};
use crate::datatype::TypeSystem;
use crate::error::{BigCountError, Result};
use crate::topology::{CollectiveShape, GraphTopology};
use crate::transport::Transport;
use crate::types::{Aint, Count, SendBuf, WideBuf, byte_offset};

/// One role (send or receive) of an exchange.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Side<'a, H> {
    pub addr: u64,
    pub counts: CountArg<'a>,
    pub types: TypeArg<'a, H>,
    pub displs: DisplArg<'a>,
    /// Inactive roles contribute nothing: count 0 and the null type.
    pub active: bool,
}

impl<'a, H: Copy> Side<'a, H> {
    pub fn new(addr: u64, counts: CountArg<'a>, types: TypeArg<'a, H>, displs: DisplArg<'a>) -> Self {
        Self {
            addr,
            counts,
            types,
            displs,
            active: true,
        }
    }

    pub fn suppressed(addr: u64, datatype: H) -> Self {
        Self {
            addr,
            counts: CountArg::Splat(0),
            types: TypeArg::Splat(datatype),
            displs: DisplArg::Zero,
            active: false,
        }
    }

    fn check_len(&self, n: usize, role: Role) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.counts.check_len(n, role.counts())?;
        self.types.check_len(n, role.types())?;
        self.displs.check_len(n, role.displs())
    }

    /// Peer `i`'s region as a wide buffer at its byte address.
    pub fn wide_buf<T>(&self, ts: &T, i: usize) -> Result<WideBuf<H>>
    where
        T: TypeSystem<Datatype = H>,
    {
        let datatype = self.types.get(i);
        let count: Count = self.counts.get(i);
        let (_, extent) = ts.type_extent(datatype)?;
        let bytes = self
            .displs
            .get(i)
            .checked_mul(extent)
            .ok_or(BigCountError::Overflow("byte displacement"))?;
        Ok(WideBuf::new(byte_offset(self.addr, bytes), count, datatype))
    }

    /// `(byte displacement, byte length)` of peer `i`'s region.
    pub fn byte_region<T>(&self, ts: &T, i: usize) -> Result<(Aint, Aint)>
    where
        T: TypeSystem<Datatype = H>,
    {
        let (_, extent) = ts.type_extent(self.types.get(i))?;
        let disp = self
            .displs
            .get(i)
            .checked_mul(extent)
            .ok_or(BigCountError::Overflow("receive region"))?;
        let len = Aint::try_from(self.counts.get(i))
            .ok()
            .and_then(|c| c.checked_mul(extent))
            .ok_or(BigCountError::Overflow("receive region"))?;
        Ok((disp, len))
    }

    /// Fail early when peer `i`'s region cannot be addressed or encoded.
    fn check_region<T>(&self, ts: &T, i: usize) -> Result<()>
    where
        T: TypeSystem<Datatype = H>,
    {
        if !self.active {
            return Ok(());
        }
        let count = self.counts.get(i);
        self.byte_region(ts, i)?;
        if count <= ts.native_max() {
            return Ok(());
        }
        let (_, extent) = ts.type_extent(self.types.get(i))?;
        if extent <= 0 {
            return Err(BigCountError::ZeroExtent { extent });
        }
        let max = count_max(ts.native_max(), extent);
        if count >= max {
            return Err(BigCountError::CountTooLarge { count, max });
        }
        Ok(())
    }

    pub fn convert<'t, T>(&self, ts: &'t T, n: usize) -> Result<ConvertedVectors<'t, T>>
    where
        T: TypeSystem<Datatype = H>,
    {
        if !self.active {
            return Ok(ConvertedVectors::suppressed(ts, n));
        }
        convert(ts, n, self.counts, self.types, self.displs)
    }
}

#[derive(Debug, Clone, Copy)]
enum Role {
    Send,
    Recv,
}

impl Role {
    fn counts(self) -> &'static str {
        match self {
            Role::Send => "sendcounts",
            Role::Recv => "recvcounts",
        }
    }

    fn types(self) -> &'static str {
        match self {
            Role::Send => "sendtypes",
            Role::Recv => "recvtypes",
        }
    }

    fn displs(self) -> &'static str {
        match self {
            Role::Send => "sdispls",
            Role::Recv => "rdispls",
        }
    }
}

/// Normalized form of every irregular collective: what this rank sends to
/// each peer, what it receives from each peer, and along which edges.
#[derive(Debug, Clone)]
pub(crate) struct ExchangePlan<'a, H> {
    pub shape: CollectiveShape,
    pub send: Side<'a, H>,
    pub recv: Side<'a, H>,
    pub topology: GraphTopology,
}

impl<'a, H: Copy> ExchangePlan<'a, H> {
    /// Check every local precondition: vector lengths, then that each
    /// region on an edge of the topology can be addressed and encoded.
    pub fn validate<T: Transport<Datatype = H>>(&self, t: &T) -> Result<()> {
        let n = t.size() as usize;
        self.send.check_len(n, Role::Send)?;
        self.recv.check_len(n, Role::Recv)?;
        for &s in &self.topology.sources {
            self.recv.check_region(t, s as usize)?;
        }
        for &d in &self.topology.destinations {
            self.send.check_region(t, d as usize)?;
        }
        Ok(())
    }
}

/// Preconditions shared by every shape, checked before any side effect.
pub(crate) fn check_call<T: Transport>(
    t: &T,
    shape: CollectiveShape,
    send: SendBuf,
    root: Option<u32>,
) -> Result<u64> {
    if t.is_inter() {
        return Err(BigCountError::InterCommunicator {
            operation: shape.name(),
        });
    }
    if let Some(root) = root
        && root >= t.size()
    {
        return Err(BigCountError::InvalidRank {
            rank: root,
            size: t.size(),
        });
    }
    send.addr().ok_or(BigCountError::InPlaceUnsupported {
        operation: shape.name(),
    })
}
