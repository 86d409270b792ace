use std::sync::Arc;
use std::time::Duration;

use bigcount::{
    BigCountError, Count, DataType, LocalWorld, Method, ReduceOp, ReduceStrategy, SendBuf,
    Transport, TypeSystem, allgatherv_x, alltoallv_x, gatherv_x, reduce_x,
};

use super::helpers::run_collective;

const NM: Count = 8;

#[tokio::test]
async fn test_inter_communicator_rejected_without_side_effects() {
    let ranks: Vec<Arc<_>> = LocalWorld::new(2)
        .native_max(NM)
        .intercommunicator(true)
        .bootstrap()
        .unwrap()
        .into_iter()
        .map(Arc::new)
        .collect();

    let mut handles = Vec::new();
    for t in &ranks {
        let t = Arc::clone(t);
        handles.push(tokio::spawn(async move {
            let i32_t = t.predefined(DataType::I32);
            let send = vec![5i32; 40];
            let mut recv = vec![-1i32; 40];
            for method in Method::ALL {
                let err = unsafe {
                    alltoallv_x(
                        &*t,
                        SendBuf::Addr(send.as_ptr() as u64),
                        &[20, 20],
                        &[0, 20],
                        i32_t,
                        recv.as_mut_ptr() as u64,
                        &[20, 20],
                        &[0, 20],
                        i32_t,
                        method,
                    )
                    .await
                }
                .unwrap_err();
                assert!(matches!(
                    err,
                    BigCountError::InterCommunicator {
                        operation: "alltoallv_x"
                    }
                ));
            }
            let err = unsafe {
                gatherv_x(
                    &*t,
                    SendBuf::Addr(send.as_ptr() as u64),
                    20,
                    i32_t,
                    recv.as_mut_ptr() as u64,
                    &[20, 20],
                    &[0, 20],
                    i32_t,
                    0,
                    Method::TopologyRouted,
                )
                .await
            }
            .unwrap_err();
            assert!(matches!(err, BigCountError::InterCommunicator { .. }));
            assert_eq!(recv, vec![-1; 40]);
        }));
    }
    for h in handles {
        h.await.unwrap();
    }
    for t in &ranks {
        assert_eq!(t.pending_messages(), 0);
    }
    assert_eq!(ranks[0].live_datatypes(), 0);
}

#[tokio::test]
async fn test_in_place_irregular_rejected() {
    run_collective(2, NM, |t| async move {
        let i32_t = t.predefined(DataType::I32);
        let mut recv = vec![3i32; 40];
        for method in Method::ALL {
            let err = unsafe {
                allgatherv_x(
                    &*t,
                    SendBuf::InPlace,
                    20,
                    i32_t,
                    recv.as_mut_ptr() as u64,
                    &[20, 20],
                    &[0, 20],
                    i32_t,
                    method,
                )
                .await
            }
            .unwrap_err();
            assert!(matches!(
                err,
                BigCountError::InPlaceUnsupported {
                    operation: "allgatherv_x"
                }
            ));
        }
        assert_eq!(recv, vec![3; 40]);
    })
    .await;
}

#[tokio::test]
async fn test_vector_length_mismatch() {
    run_collective(3, NM, |t| async move {
        let u8_t = t.predefined(DataType::U8);
        let send = vec![1u8; 30];
        let mut recv = vec![0u8; 30];
        let err = unsafe {
            alltoallv_x(
                &*t,
                SendBuf::Addr(send.as_ptr() as u64),
                &[10, 10, 10],
                &[0, 10, 20],
                u8_t,
                recv.as_mut_ptr() as u64,
                &[10, 10],
                &[0, 10, 20],
                u8_t,
                Method::TopologyRouted,
            )
            .await
        }
        .unwrap_err();
        assert!(matches!(
            err,
            BigCountError::VectorLength {
                what: "recvcounts",
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(recv, vec![0; 30]);
    })
    .await;
}

#[tokio::test]
async fn test_user_op_in_place_rejected_on_every_rank() {
    run_collective(2, NM, |t| async move {
        let i64_t = t.predefined(DataType::I64);
        let mut buf = vec![9i64; 30];
        let err = unsafe {
            reduce_x(
                &*t,
                ReduceStrategy::UserOp,
                SendBuf::InPlace,
                buf.as_mut_ptr() as u64,
                30,
                i64_t,
                ReduceOp::Sum,
                0,
            )
            .await
        }
        .unwrap_err();
        assert!(err.to_string().contains("cleaver"));
        assert_eq!(buf, vec![9; 30]);
    })
    .await;
}

/// Every rank must return within this bound when one rank fails locally.
const AGREEMENT_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_one_rank_unencodable_count_fails_every_rank() {
    run_collective(2, NM, |t| async move {
        let r = t.rank();
        let i32_t = t.predefined(DataType::I32);
        let send = vec![4i32; 40];
        let mut recv = vec![-1i32; 40];
        // Only rank 1 asks for more than count_max(8, 4) = 72 items.
        let recvcounts: [Count; 2] = if r == 1 { [20, 1000] } else { [20, 20] };
        for method in Method::ALL {
            let call = unsafe {
                alltoallv_x(
                    &*t,
                    SendBuf::Addr(send.as_ptr() as u64),
                    &[20, 20],
                    &[0, 20],
                    i32_t,
                    recv.as_mut_ptr() as u64,
                    &recvcounts,
                    &[0, 20],
                    i32_t,
                    method,
                )
            };
            let err = tokio::time::timeout(AGREEMENT_TIMEOUT, call)
                .await
                .unwrap_or_else(|_| panic!("rank {r} hung under {method}"))
                .unwrap_err();
            if r == 1 {
                assert!(
                    matches!(err, BigCountError::CountTooLarge { count: 1000, max: 72 }),
                    "{method}: {err}"
                );
            } else {
                assert!(
                    matches!(
                        err,
                        BigCountError::PeerFailed {
                            operation: "alltoallv_x"
                        }
                    ),
                    "{method}: {err}"
                );
            }
        }
        assert_eq!(recv, vec![-1; 40]);
    })
    .await;
}

#[tokio::test]
async fn test_root_only_failure_reaches_non_roots() {
    run_collective(3, NM, |t| async move {
        let r = t.rank();
        let u8_t = t.predefined(DataType::U8);
        let send = vec![r as u8; 10];
        let mut recv = vec![0u8; 30];
        for method in Method::ALL {
            let call = unsafe {
                gatherv_x(
                    &*t,
                    SendBuf::Addr(send.as_ptr() as u64),
                    10,
                    u8_t,
                    recv.as_mut_ptr() as u64,
                    &[10, 10, 500],
                    &[0, 10, 20],
                    u8_t,
                    0,
                    method,
                )
            };
            let err = tokio::time::timeout(AGREEMENT_TIMEOUT, call)
                .await
                .unwrap_or_else(|_| panic!("rank {r} hung under {method}"))
                .unwrap_err();
            if r == 0 {
                assert!(matches!(err, BigCountError::CountTooLarge { count: 500, .. }));
            } else {
                assert!(matches!(err, BigCountError::PeerFailed { .. }), "{method}: {err}");
            }
        }
        assert!(recv.iter().all(|&b| b == 0));

        // The world stays usable after an agreed failure.
        unsafe {
            gatherv_x(
                &*t,
                SendBuf::Addr(send.as_ptr() as u64),
                10,
                u8_t,
                recv.as_mut_ptr() as u64,
                &[10, 10, 10],
                &[0, 10, 20],
                u8_t,
                0,
                Method::PointToPoint,
            )
            .await
            .unwrap();
        }
        if r == 0 {
            let expected: Vec<u8> = (0..3u8).flat_map(|p| [p; 10]).collect();
            assert_eq!(recv, expected);
        }
    })
    .await;
}
