use bigcount::{Aint, Count, DataType, Method, SendBuf, Transport, TypeSystem, allgatherv_x};

use super::helpers::run_collective;

const NM: Count = 8;

#[tokio::test]
async fn test_allgatherv_3_ranks_all_methods() {
    for method in Method::ALL {
        run_collective(3, NM, move |t| async move {
            let r = t.rank();
            let i32_t = t.predefined(DataType::I32);
            let recvcounts: Vec<Count> = (0..3).map(|i| 2 * NM + i).collect();
            // Rank 2's block first, then rank 0's, then rank 1's.
            let rdispls: Vec<Aint> = vec![18, 34, 0];

            let count = recvcounts[r as usize];
            let send: Vec<i32> = (0..count as i32).map(|k| -(r as i32 * 100 + k)).collect();
            let mut recv = vec![0i32; 51];
            unsafe {
                allgatherv_x(
                    &*t,
                    SendBuf::Addr(send.as_ptr() as u64),
                    count,
                    i32_t,
                    recv.as_mut_ptr() as u64,
                    &recvcounts,
                    &rdispls,
                    i32_t,
                    method,
                )
                .await
                .unwrap();
            }

            for i in 0..3 {
                let d = rdispls[i] as usize;
                let n = recvcounts[i] as usize;
                let expected: Vec<i32> = (0..n as i32).map(|k| -(i as i32 * 100 + k)).collect();
                assert_eq!(&recv[d..d + n], &expected[..], "rank {r} block {i} via {method}");
            }
        })
        .await;
    }
}

#[tokio::test]
async fn test_allgatherv_within_native_limit() {
    // Counts below the limit still go through the composed-type path and
    // must produce the plain result.
    run_collective(2, NM, |t| async move {
        let r = t.rank();
        let u64_t = t.predefined(DataType::U64);
        let send = vec![u64::from(r) + 7; 3];
        let mut recv = vec![0u64; 6];
        unsafe {
            allgatherv_x(
                &*t,
                SendBuf::Addr(send.as_ptr() as u64),
                3,
                u64_t,
                recv.as_mut_ptr() as u64,
                &[3, 3],
                &[0, 3],
                u64_t,
                Method::PointToPoint,
            )
            .await
            .unwrap();
        }
        assert_eq!(recv, vec![7, 7, 7, 8, 8, 8]);
    })
    .await;
}
