use bigcount::{Aint, Count, DataType, Method, Transport, TypeSystem, scatter_x, scatterv_x};

use super::helpers::run_collective;

const NM: Count = 8;

#[tokio::test]
async fn test_scatterv_3_ranks_all_methods() {
    for method in Method::ALL {
        run_collective(3, NM, move |t| async move {
            let r = t.rank();
            let root = 1;
            let f64_t = t.predefined(DataType::F64);

            let sendcounts: Vec<Count> = (0..3).map(|i| 2 * NM + i).collect();
            let sdispls: Vec<Aint> = vec![0, 100, 50];
            let send: Vec<f64> = if r == root {
                (0..150).map(|k| k as f64 * 0.25).collect()
            } else {
                Vec::new()
            };

            let count = 2 * NM + Count::from(r);
            let mut recv = vec![-1.0f64; count as usize + 2];
            unsafe {
                scatterv_x(
                    &*t,
                    send.as_ptr() as u64,
                    &sendcounts,
                    &sdispls,
                    f64_t,
                    recv.as_mut_ptr() as u64,
                    count,
                    f64_t,
                    root,
                    method,
                )
                .await
                .unwrap();
            }

            let start = sdispls[r as usize] as usize;
            let expected: Vec<f64> = (start..start + count as usize)
                .map(|k| k as f64 * 0.25)
                .collect();
            assert_eq!(&recv[..count as usize], &expected[..], "rank {r} via {method}");
            assert_eq!(&recv[count as usize..], &[-1.0, -1.0]);
        })
        .await;
    }
}

#[tokio::test]
async fn test_uniform_scatter_wide_blocks() {
    run_collective(4, NM, |t| async move {
        let r = t.rank();
        let i16_t = t.predefined(DataType::I16);
        let block = 3 * NM + 1;
        let send: Vec<i16> = (0..4 * block as i16).collect();
        let mut recv = vec![0i16; block as usize];
        unsafe {
            scatter_x(
                &*t,
                bigcount::WideBuf::new(send.as_ptr() as u64, block, i16_t),
                bigcount::WideBuf::new(recv.as_mut_ptr() as u64, block, i16_t),
                3,
            )
            .await
            .unwrap();
        }
        let first = r as i16 * block as i16;
        let expected: Vec<i16> = (first..first + block as i16).collect();
        assert_eq!(recv, expected);
    })
    .await;
}
