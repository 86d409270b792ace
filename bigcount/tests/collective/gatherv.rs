use bigcount::{Aint, Count, DataType, Method, SendBuf, Transport, TypeSystem, gatherv_x};

use super::helpers::run_collective;

const NM: Count = 8;

#[tokio::test]
async fn test_gatherv_4_ranks_all_methods() {
    for method in Method::ALL {
        run_collective(4, NM, move |t| async move {
            let r = t.rank();
            let root = 2;
            let u32_t = t.predefined(DataType::U32);
            let count = NM + 1 + Count::from(r);
            let send: Vec<u32> = (0..count as u32).map(|k| r * 1000 + k).collect();

            // Blocks in reverse rank order with a gap of 3 items after each.
            let recvcounts: Vec<Count> = (0..4).map(|i| NM + 1 + i).collect();
            let mut rdispls: Vec<Aint> = vec![0; 4];
            let mut at = 0;
            for i in (0..4).rev() {
                rdispls[i] = at;
                at += recvcounts[i] as Aint + 3;
            }
            let mut recv = vec![u32::MAX; at as usize];

            let (counts, displs) = if r == root {
                (recvcounts.as_slice(), rdispls.as_slice())
            } else {
                (&[] as &[Count], &[] as &[Aint])
            };
            unsafe {
                gatherv_x(
                    &*t,
                    SendBuf::Addr(send.as_ptr() as u64),
                    count,
                    u32_t,
                    recv.as_mut_ptr() as u64,
                    counts,
                    displs,
                    u32_t,
                    root,
                    method,
                )
                .await
                .unwrap();
            }

            if r == root {
                for i in 0..4u32 {
                    let d = rdispls[i as usize] as usize;
                    let n = recvcounts[i as usize] as usize;
                    let expected: Vec<u32> = (0..n as u32).map(|k| i * 1000 + k).collect();
                    assert_eq!(&recv[d..d + n], &expected[..], "block {i} via {method}");
                    assert_eq!(&recv[d + n..d + n + 3], &[u32::MAX; 3]);
                }
            } else {
                // The receive role is suppressed away from the root.
                assert!(recv.iter().all(|&v| v == u32::MAX), "rank {r} via {method}");
            }
        })
        .await;
    }
}

#[tokio::test]
async fn test_gatherv_invalid_root() {
    run_collective(2, NM, |t| async move {
        let u8_t = t.predefined(DataType::U8);
        let send = [1u8; 4];
        let err = unsafe {
            gatherv_x(
                &*t,
                SendBuf::Addr(send.as_ptr() as u64),
                4,
                u8_t,
                0,
                &[4, 4],
                &[0, 4],
                u8_t,
                5,
                Method::TopologyRouted,
            )
            .await
        }
        .unwrap_err();
        assert!(matches!(
            err,
            bigcount::BigCountError::InvalidRank { rank: 5, size: 2 }
        ));
    })
    .await;
}
