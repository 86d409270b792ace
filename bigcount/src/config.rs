//! Runtime-selectable strategies for the wide-count layer.
//!
//! All values have defaults. Override via environment variables (prefixed
//! `BIGCOUNT_`) or by constructing a custom `BigCountConfig`.

use std::str::FromStr;

use crate::error::BigCountError;

/// Backend used to emulate an irregular collective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    /// One generalized neighbor exchange over a graph communicator.
    #[default]
    TopologyRouted,
    /// Wide point-to-point sends and receives along every graph edge.
    PointToPoint,
    /// Puts into a window over the receive buffer between two fences.
    OneSided,
}

impl Method {
    pub const ALL: [Method; 3] = [Method::TopologyRouted, Method::PointToPoint, Method::OneSided];

    pub const fn name(self) -> &'static str {
        match self {
            Method::TopologyRouted => "topology",
            Method::PointToPoint => "p2p",
            Method::OneSided => "rma",
        }
    }
}

impl FromStr for Method {
    type Err = BigCountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "topology" | "neighborhood" | "neighbor_alltoallw" => Ok(Method::TopologyRouted),
            "p2p" | "point_to_point" => Ok(Method::PointToPoint),
            "rma" | "one_sided" | "onesided" => Ok(Method::OneSided),
            _ => Err(BigCountError::Config {
                key: "BIGCOUNT_VCOLL_METHOD",
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How reductions over oversized counts are carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReduceStrategy {
    /// One native reduction of a composed datatype with a chunking user op.
    #[default]
    UserOp,
    /// A sequence of native reductions over consecutive chunks.
    Cleaver,
}

impl FromStr for ReduceStrategy {
    type Err = BigCountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "userop" | "user_op" => Ok(ReduceStrategy::UserOp),
            "cleaver" | "chunked" => Ok(ReduceStrategy::Cleaver),
            _ => Err(BigCountError::Config {
                key: "BIGCOUNT_REDUCE_STRATEGY",
                value: s.to_string(),
            }),
        }
    }
}

/// Strategy selection for [`WideComm`](crate::comm::WideComm).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BigCountConfig {
    /// Backend for the v-collectives.
    pub vcoll_method: Method,

    /// Strategy for reductions whose count exceeds the native limit.
    pub reduce_strategy: ReduceStrategy,
}

impl BigCountConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `BIGCOUNT_VCOLL_METHOD` (`topology`, `p2p`, `rma`)
    /// - `BIGCOUNT_REDUCE_STRATEGY` (`userop`, `cleaver`)
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("BIGCOUNT_VCOLL_METHOD") {
            match v.parse() {
                Ok(m) => cfg.vcoll_method = m,
                Err(e) => tracing::warn!(error = %e, "ignoring BIGCOUNT_VCOLL_METHOD"),
            }
        }
        if let Ok(v) = std::env::var("BIGCOUNT_REDUCE_STRATEGY") {
            match v.parse() {
                Ok(s) => cfg.reduce_strategy = s,
                Err(e) => tracing::warn!(error = %e, "ignoring BIGCOUNT_REDUCE_STRATEGY"),
            }
        }

        cfg
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.vcoll_method = method;
        self
    }

    pub fn with_reduce_strategy(mut self, strategy: ReduceStrategy) -> Self {
        self.reduce_strategy = strategy;
        self
    }
}
