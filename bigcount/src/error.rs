use crate::types::{Aint, Count, DataType, Rank, ReduceOp};

pub type Result<T> = std::result::Result<T, BigCountError>;

#[derive(Debug, thiserror::Error)]
pub enum BigCountError {
    #[error("{operation} is not supported on inter-communicators")]
    InterCommunicator { operation: &'static str },

    #[error(
        "{operation} does not support an in-place send buffer; use the cleaver reduction strategy for in-place semantics"
    )]
    InPlaceUnsupported { operation: &'static str },

    #[error("reduction operator {op} is not supported for large counts")]
    UnsupportedOp { op: ReduceOp },

    #[error("{operation} failed on another rank before any data moved")]
    PeerFailed { operation: &'static str },

    #[error("count {count} exceeds the largest encodable count {max}")]
    CountTooLarge { count: Count, max: Count },

    #[error("{what} has {actual} entries, communicator size is {expected}")]
    VectorLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid rank {rank}: communicator size is {size}")]
    InvalidRank { rank: Rank, size: u32 },

    #[error("datatype has non-positive extent {extent}")]
    ZeroExtent { extent: Aint },

    #[error("composed datatype decode failed: {0}")]
    Decode(String),

    #[error(
        "displacement {displacement} with extent {old_extent} is not a whole multiple of extent {new_extent}"
    )]
    InexactDisplacement {
        displacement: Aint,
        old_extent: Aint,
        new_extent: Aint,
    },

    #[error("arithmetic overflow while computing {0}")]
    Overflow(&'static str),

    #[error("value {value} does not fit in a native count")]
    NativeCountOverflow { value: i128 },

    #[error("count {count} exceeds the transport limit {native_max}")]
    NativeLimitExceeded { count: i64, native_max: Count },

    #[error("datatype {0} must be committed before use in communication")]
    TypeNotCommitted(String),

    #[error("unknown or freed handle: {0}")]
    UnknownHandle(String),

    #[error("unsupported data type: {dtype:?} for operation {op}")]
    UnsupportedDType { dtype: DataType, op: &'static str },

    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("invalid configuration value {value:?} for {key}")]
    Config { key: &'static str, value: String },

    #[error("internal lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

impl BigCountError {
    /// Create a `Transport` error with just a message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a `Transport` error with a message and a source error.
    pub fn transport_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a `Decode` error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}

/// Narrow a wide value to a native (`i32`) count.
pub fn native_count<V>(value: V) -> Result<i32>
where
    V: TryInto<i32> + Into<i128> + Copy,
{
    value
        .try_into()
        .map_err(|_| BigCountError::NativeCountOverflow {
            value: value.into(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inter_communicator_display() {
        let e = BigCountError::InterCommunicator {
            operation: "alltoallw_x",
        };
        assert_eq!(
            e.to_string(),
            "alltoallw_x is not supported on inter-communicators"
        );
    }

    #[test]
    fn test_count_too_large_display() {
        let e = BigCountError::CountTooLarge {
            count: 300,
            max: 272,
        };
        assert_eq!(
            e.to_string(),
            "count 300 exceeds the largest encodable count 272"
        );
    }

    #[test]
    fn test_native_count() {
        assert_eq!(native_count(17u64).unwrap(), 17);
        assert_eq!(native_count(-3i64).unwrap(), -3);
        let err = native_count(u64::MAX).unwrap_err();
        assert!(matches!(err, BigCountError::NativeCountOverflow { .. }));
        assert!(native_count(i32::MAX as u64 + 1).is_err());
    }

    #[test]
    fn test_transport_with_source() {
        let io = std::io::Error::other("link down");
        let e = BigCountError::transport_with_source("send failed", io);
        assert_eq!(e.to_string(), "transport error: send failed");
        assert!(std::error::Error::source(&e).is_some());
    }

    #[test]
    fn test_all_variants_display() {
        let errors: Vec<BigCountError> = vec![
            BigCountError::InterCommunicator { operation: "x" },
            BigCountError::InPlaceUnsupported { operation: "x" },
            BigCountError::UnsupportedOp {
                op: ReduceOp::MaxLoc,
            },
            BigCountError::PeerFailed {
                operation: "alltoallv_x",
            },
            BigCountError::CountTooLarge { count: 1, max: 0 },
            BigCountError::VectorLength {
                what: "sendcounts",
                expected: 4,
                actual: 3,
            },
            BigCountError::InvalidRank { rank: 5, size: 4 },
            BigCountError::ZeroExtent { extent: 0 },
            BigCountError::decode("bad"),
            BigCountError::InexactDisplacement {
                displacement: 3,
                old_extent: 4,
                new_extent: 8,
            },
            BigCountError::Overflow("extent"),
            BigCountError::NativeCountOverflow { value: 1 << 40 },
            BigCountError::NativeLimitExceeded {
                count: 17,
                native_max: 16,
            },
            BigCountError::TypeNotCommitted("dt#9".into()),
            BigCountError::UnknownHandle("dt#9".into()),
            BigCountError::UnsupportedDType {
                dtype: DataType::F32,
                op: "band",
            },
            BigCountError::BufferSizeMismatch {
                expected: 8,
                actual: 4,
            },
            BigCountError::transport("reset"),
            BigCountError::Config {
                key: "BIGCOUNT_VCOLL_METHOD",
                value: "carrier-pigeon".into(),
            },
            BigCountError::LockPoisoned("types"),
        ];
        for e in &errors {
            assert!(!e.to_string().is_empty(), "empty display for {e:?}");
        }
    }
}
