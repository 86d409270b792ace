use bigcount::{Aint, Count, DataType, Method, SendBuf, Transport, TypeSystem, alltoallw_x};

use super::helpers::{run_collective, tagged};

const NM: Count = 8;

// Alternate 8- and 4-byte element types between pairs so every rank mixes
// both in one call.
fn pair_type(source: u32, dest: u32) -> DataType {
    if (source + dest) % 2 == 0 {
        DataType::I64
    } else {
        DataType::I32
    }
}

/// Every pair exchanges more than the native limit.
fn pair_count(source: u32, dest: u32) -> Count {
    NM + Count::from(source + dest)
}

/// Byte stride between per-peer blocks; a multiple of 8 so block starts are
/// whole units of either element type.
fn slot_bytes(n: u32) -> usize {
    8 * (NM as usize + 2 * n as usize)
}

fn write_block(buf: &mut [u8], offset: usize, dt: DataType, values: impl Iterator<Item = i64>) {
    let size = dt.size_in_bytes();
    for (k, v) in values.enumerate() {
        let at = offset + k * size;
        match dt {
            DataType::I64 => buf[at..at + 8].copy_from_slice(&v.to_ne_bytes()),
            _ => buf[at..at + 4].copy_from_slice(&(v as i32).to_ne_bytes()),
        }
    }
}

fn read_block(buf: &[u8], offset: usize, dt: DataType, count: usize) -> Vec<i64> {
    let size = dt.size_in_bytes();
    (0..count)
        .map(|k| {
            let at = offset + k * size;
            match dt {
                DataType::I64 => i64::from_ne_bytes(buf[at..at + 8].try_into().unwrap()),
                _ => i64::from(i32::from_ne_bytes(buf[at..at + 4].try_into().unwrap())),
            }
        })
        .collect()
}

async fn alltoallw_round(n: u32, method: Method) {
    run_collective(n, NM, move |t| async move {
        let r = t.rank();
        let slot = slot_bytes(n);
        let mut send = vec![0u8; slot * n as usize];
        let mut recv = vec![0xffu8; slot * n as usize];

        let (mut sendcounts, mut sdispls, mut sendtypes) = (Vec::new(), Vec::new(), Vec::new());
        let (mut recvcounts, mut rdispls, mut recvtypes) = (Vec::new(), Vec::new(), Vec::new());
        for p in 0..n {
            let out = pair_type(r, p);
            let count = pair_count(r, p);
            write_block(
                &mut send,
                p as usize * slot,
                out,
                (0..count as usize).map(|k| tagged(r, p, k)),
            );
            sendcounts.push(count);
            sdispls.push((p as usize * slot / out.size_in_bytes()) as Aint);
            sendtypes.push(t.predefined(out));

            let inc = pair_type(p, r);
            recvcounts.push(pair_count(p, r));
            rdispls.push((p as usize * slot / inc.size_in_bytes()) as Aint);
            recvtypes.push(t.predefined(inc));
        }

        unsafe {
            alltoallw_x(
                &*t,
                SendBuf::Addr(send.as_ptr() as u64),
                &sendcounts,
                &sdispls,
                &sendtypes,
                recv.as_mut_ptr() as u64,
                &recvcounts,
                &rdispls,
                &recvtypes,
                method,
            )
            .await
            .unwrap();
        }

        for p in 0..n {
            let dt = pair_type(p, r);
            let count = pair_count(p, r) as usize;
            let start = p as usize * slot;
            let expected: Vec<i64> = (0..count).map(|k| tagged(p, r, k)).collect();
            assert_eq!(
                read_block(&recv, start, dt, count),
                expected,
                "rank {r} block from {p} via {method}"
            );
            let end = start + count * dt.size_in_bytes();
            assert!(
                recv[end..start + slot].iter().all(|&b| b == 0xff),
                "rank {r} wrote past block from {p} via {method}"
            );
        }
    })
    .await;
}

#[tokio::test]
async fn test_alltoallw_1_rank() {
    for method in Method::ALL {
        alltoallw_round(1, method).await;
    }
}

#[tokio::test]
async fn test_alltoallw_2_ranks() {
    for method in Method::ALL {
        alltoallw_round(2, method).await;
    }
}

#[tokio::test]
async fn test_alltoallw_8_ranks() {
    for method in Method::ALL {
        alltoallw_round(8, method).await;
    }
}

#[tokio::test]
async fn test_alltoallw_zero_counts() {
    // Only the diagonal carries data; every other pair sends nothing.
    run_collective(3, NM, |t| async move {
        let r = t.rank();
        let u8_t = t.predefined(DataType::U8);
        let send = vec![r as u8 + 1; 20];
        let mut recv = vec![0u8; 20];
        let counts: Vec<Count> = (0..3).map(|p| if p == r { 20 } else { 0 }).collect();
        unsafe {
            alltoallw_x(
                &*t,
                SendBuf::Addr(send.as_ptr() as u64),
                &counts,
                &[0, 0, 0],
                &[u8_t; 3],
                recv.as_mut_ptr() as u64,
                &counts,
                &[0, 0, 0],
                &[u8_t; 3],
                Method::TopologyRouted,
            )
            .await
            .unwrap();
        }
        assert_eq!(recv, send);
    })
    .await;
}
