use bigcount::{
    BigCountError, Count, DataType, ReduceOp, ReduceStrategy, SendBuf, Transport, TypeSystem,
    allreduce_x, reduce_scatter_block_x, reduce_x,
};

use super::helpers::run_collective;

const NM: Count = 8;
/// Two full native chunks plus a remainder.
const COUNT: usize = 2 * NM as usize + 5;
const STRATEGIES: [ReduceStrategy; 2] = [ReduceStrategy::UserOp, ReduceStrategy::Cleaver];

#[tokio::test]
async fn test_reduce_sum_chunked() {
    for strategy in STRATEGIES {
        run_collective(3, NM, move |t| async move {
            let r = t.rank();
            let i64_t = t.predefined(DataType::I64);
            let send: Vec<i64> = (0..COUNT as i64).map(|k| i64::from(r) * 100 + k).collect();
            let mut recv = vec![0i64; COUNT];
            unsafe {
                reduce_x(
                    &*t,
                    strategy,
                    SendBuf::Addr(send.as_ptr() as u64),
                    recv.as_mut_ptr() as u64,
                    COUNT as Count,
                    i64_t,
                    ReduceOp::Sum,
                    1,
                )
                .await
                .unwrap();
            }
            if r == 1 {
                let expected: Vec<i64> = (0..COUNT as i64).map(|k| 300 + 3 * k).collect();
                assert_eq!(recv, expected, "{strategy:?}");
            } else {
                assert!(recv.iter().all(|&v| v == 0));
            }
        })
        .await;
    }
}

#[tokio::test]
async fn test_allreduce_max_chunked() {
    for strategy in STRATEGIES {
        run_collective(3, NM, move |t| async move {
            let r = t.rank();
            let u32_t = t.predefined(DataType::U32);
            let value = |rank: u32, k: u32| (rank * 7 + k * 5) % 13;
            let send: Vec<u32> = (0..COUNT as u32).map(|k| value(r, k)).collect();
            let mut recv = vec![0u32; COUNT];
            unsafe {
                allreduce_x(
                    &*t,
                    strategy,
                    SendBuf::Addr(send.as_ptr() as u64),
                    recv.as_mut_ptr() as u64,
                    COUNT as Count,
                    u32_t,
                    ReduceOp::Max,
                )
                .await
                .unwrap();
            }
            let expected: Vec<u32> = (0..COUNT as u32)
                .map(|k| (0..3).map(|rank| value(rank, k)).max().unwrap())
                .collect();
            assert_eq!(recv, expected, "rank {r} {strategy:?}");
        })
        .await;
    }
}

#[tokio::test]
async fn test_allreduce_in_place_cleaver() {
    run_collective(3, NM, |t| async move {
        let r = t.rank();
        let u8_t = t.predefined(DataType::U8);
        let mut buf: Vec<u8> = (0..COUNT as u8).map(|k| k ^ (1 << r)).collect();
        unsafe {
            allreduce_x(
                &*t,
                ReduceStrategy::Cleaver,
                SendBuf::InPlace,
                buf.as_mut_ptr() as u64,
                COUNT as Count,
                u8_t,
                ReduceOp::BXor,
            )
            .await
            .unwrap();
        }
        // Three copies of k cancel to k; the rank bits xor to 0b111.
        let expected: Vec<u8> = (0..COUNT as u8).map(|k| k ^ 0b111).collect();
        assert_eq!(buf, expected);
    })
    .await;
}

#[tokio::test]
async fn test_reduce_scatter_block_chunked() {
    for strategy in STRATEGIES {
        run_collective(3, NM, move |t| async move {
            let r = t.rank();
            let f64_t = t.predefined(DataType::F64);
            let send: Vec<f64> = (0..3 * COUNT).map(|k| (k as f64) + f64::from(r)).collect();
            let mut recv = vec![0.0f64; COUNT];
            unsafe {
                reduce_scatter_block_x(
                    &*t,
                    strategy,
                    SendBuf::Addr(send.as_ptr() as u64),
                    recv.as_mut_ptr() as u64,
                    COUNT as Count,
                    f64_t,
                    ReduceOp::Sum,
                )
                .await
                .unwrap();
            }
            // Sum over ranks of (k + rank) = 3k + 3.
            let first = r as usize * COUNT;
            let expected: Vec<f64> = (first..first + COUNT).map(|k| 3.0 * k as f64 + 3.0).collect();
            assert_eq!(recv, expected, "rank {r} {strategy:?}");
        })
        .await;
    }
}

#[tokio::test]
async fn test_fast_path_within_limit() {
    for strategy in STRATEGIES {
        run_collective(2, NM, move |t| async move {
            let i32_t = t.predefined(DataType::I32);
            let send = vec![t.rank() as i32 + 2; NM as usize];
            let mut recv = vec![0i32; NM as usize];
            unsafe {
                allreduce_x(
                    &*t,
                    strategy,
                    SendBuf::Addr(send.as_ptr() as u64),
                    recv.as_mut_ptr() as u64,
                    NM,
                    i32_t,
                    ReduceOp::Prod,
                )
                .await
                .unwrap();
            }
            assert_eq!(recv, vec![6; NM as usize]);
        })
        .await;
    }
}

#[tokio::test]
async fn test_maxloc_unsupported() {
    run_collective(2, NM, |t| async move {
        let i32_t = t.predefined(DataType::I32);
        let send = vec![1i32; COUNT];
        let mut recv = vec![0i32; COUNT];
        let err = unsafe {
            allreduce_x(
                &*t,
                ReduceStrategy::UserOp,
                SendBuf::Addr(send.as_ptr() as u64),
                recv.as_mut_ptr() as u64,
                COUNT as Count,
                i32_t,
                ReduceOp::MaxLoc,
            )
            .await
        }
        .unwrap_err();
        assert!(matches!(
            err,
            BigCountError::UnsupportedOp {
                op: ReduceOp::MaxLoc
            }
        ));
        assert!(recv.iter().all(|&v| v == 0));
    })
    .await;
}
