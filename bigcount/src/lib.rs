//! Wide-count extensions for a message-passing transport whose native counts
//! are limited to a signed 32-bit integer.
//!
//! Oversized counts are encoded as one item of a composed datatype
//! ([`codec`]), per-peer vectors are converted entry by entry
//! ([`convert`]), irregular collectives are emulated over a neighbor
//! exchange, point-to-point messages or one-sided puts ([`collective`]), and
//! reductions replay predefined operators in native-sized chunks
//! ([`reduction`]). [`local`] provides an in-process transport with a
//! configurable native limit.

pub mod codec;
pub mod collective;
pub mod comm;
pub mod config;
pub mod convert;
pub mod datatype;
pub mod error;
pub mod local;
pub mod p2p;
pub mod reduce;
pub mod reduction;
pub mod rma;
pub mod topology;
pub mod transport;
pub mod types;

pub use codec::{count_max, decode, encode};
pub use collective::{allgatherv_x, alltoallv_x, alltoallw_x, gatherv_x, scatter_x, scatterv_x};
pub use comm::WideComm;
pub use config::{BigCountConfig, Method, ReduceStrategy};
pub use datatype::{OwnedDatatype, TypeSystem};
pub use error::{BigCountError, Result};
pub use local::{LocalTransport, LocalWorld};
pub use reduction::{WideOp, allreduce_x, reduce_scatter_block_x, reduce_x};
pub use topology::{CollectiveShape, GraphTopology};
pub use transport::{OwnedGraph, OwnedOp, OwnedWindow, Transport};
pub use types::{Aint, Count, DataType, Rank, ReduceOp, SendBuf, WideBuf, WideTarget};
