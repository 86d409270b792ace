//! Directed communication graphs for the neighbor exchange.

use crate::types::Rank;

/// Which irregular collective a call emulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectiveShape {
    GatherV,
    ScatterV,
    AllgatherV,
    AlltoallV,
    AlltoallW,
}

impl CollectiveShape {
    pub const fn name(self) -> &'static str {
        match self {
            CollectiveShape::GatherV => "gatherv_x",
            CollectiveShape::ScatterV => "scatterv_x",
            CollectiveShape::AllgatherV => "allgatherv_x",
            CollectiveShape::AlltoallV => "alltoallv_x",
            CollectiveShape::AlltoallW => "alltoallw_x",
        }
    }
}

impl std::fmt::Display for CollectiveShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The calling rank's in-edges (`sources`) and out-edges (`destinations`).
///
/// Receive entries are consumed in `sources` order and send entries in
/// `destinations` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphTopology {
    pub sources: Vec<Rank>,
    pub destinations: Vec<Rank>,
}

impl GraphTopology {
    /// Every rank exchanges with every rank, itself included.
    pub fn dense(size: u32) -> Self {
        Self {
            sources: (0..size).collect(),
            destinations: (0..size).collect(),
        }
    }

    /// Star into `root`: every rank sends to the root, only the root receives.
    pub fn gather(size: u32, root: Rank, rank: Rank) -> Self {
        Self {
            sources: if rank == root {
                (0..size).collect()
            } else {
                Vec::new()
            },
            destinations: vec![root],
        }
    }

    /// Star out of `root`: only the root sends, every rank receives.
    pub fn scatter(size: u32, root: Rank, rank: Rank) -> Self {
        Self {
            sources: vec![root],
            destinations: if rank == root {
                (0..size).collect()
            } else {
                Vec::new()
            },
        }
    }

    pub fn for_shape(shape: CollectiveShape, size: u32, rank: Rank, root: Rank) -> Self {
        match shape {
            CollectiveShape::GatherV => Self::gather(size, root, rank),
            CollectiveShape::ScatterV => Self::scatter(size, root, rank),
            CollectiveShape::AllgatherV
            | CollectiveShape::AlltoallV
            | CollectiveShape::AlltoallW => Self::dense(size),
        }
    }
}
