use bigcount::{Aint, Count, DataType, Method, SendBuf, Transport, TypeSystem, alltoallv_x};

use super::helpers::run_collective;

const NM: Count = 8;
const N: u32 = 4;
/// Items reserved per peer in both buffers.
const SLOT: usize = 32;

fn pair_count(source: u32, dest: u32) -> Count {
    NM + Count::from((source * 3 + dest) % 7)
}

fn value(source: u32, dest: u32, k: usize) -> f32 {
    (source * 1000 + dest * 100) as f32 + k as f32 * 0.5
}

#[tokio::test]
async fn test_alltoallv_4_ranks_all_methods() {
    for method in Method::ALL {
        run_collective(N, NM, move |t| async move {
            let r = t.rank();
            let f32_t = t.predefined(DataType::F32);

            let mut send = vec![0.0f32; SLOT * N as usize];
            let mut sendcounts = Vec::new();
            let mut recvcounts = Vec::new();
            for p in 0..N {
                let c = pair_count(r, p);
                for k in 0..c as usize {
                    send[p as usize * SLOT + k] = value(r, p, k);
                }
                sendcounts.push(c);
                recvcounts.push(pair_count(p, r));
            }
            let displs: Vec<Aint> = (0..N as Aint).map(|p| p * SLOT as Aint).collect();
            let mut recv = vec![f32::NAN; SLOT * N as usize];

            unsafe {
                alltoallv_x(
                    &*t,
                    SendBuf::Addr(send.as_ptr() as u64),
                    &sendcounts,
                    &displs,
                    f32_t,
                    recv.as_mut_ptr() as u64,
                    &recvcounts,
                    &displs,
                    f32_t,
                    method,
                )
                .await
                .unwrap();
            }

            for p in 0..N {
                let base = p as usize * SLOT;
                let c = pair_count(p, r) as usize;
                for k in 0..c {
                    assert_eq!(recv[base + k], value(p, r, k), "rank {r} from {p} via {method}");
                }
                assert!(recv[base + c..base + SLOT].iter().all(|v| v.is_nan()));
            }
        })
        .await;
    }
}
