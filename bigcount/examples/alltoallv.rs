//! Wide-count all-to-all across 4 ranks with a tiny native limit.
//!
//! The in-process transport is capped at 16 items per native call, so every
//! 40-item block below travels as one composed datatype. The strategy comes
//! from `BIGCOUNT_VCOLL_METHOD` (topology, p2p or rma).
//!
//! ```bash
//! RUST_LOG=bigcount=debug BIGCOUNT_VCOLL_METHOD=rma cargo run --example alltoallv
//! ```

use bigcount::{BigCountConfig, DataType, LocalWorld, SendBuf, TypeSystem, WideComm};
use std::sync::Arc;

#[tokio::main]
async fn main() -> bigcount::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let world_size = 4u32;
    let block = 40usize;
    let config = BigCountConfig::from_env();
    let ranks: Vec<_> = LocalWorld::new(world_size)
        .native_max(16)
        .bootstrap()?
        .into_iter()
        .map(Arc::new)
        .collect();

    let mut handles = Vec::new();
    for t in &ranks {
        let t = Arc::clone(t);
        handles.push(tokio::spawn(async move {
            let comm = WideComm::new(&*t, config);
            let rank = comm.rank();
            let i32_t = t.predefined(DataType::I32);

            // Block p holds 100 * rank + p, destined for rank p.
            let send: Vec<i32> = (0..world_size as usize * block)
                .map(|i| 100 * rank as i32 + (i / block) as i32)
                .collect();
            let mut recv = vec![0i32; send.len()];
            let counts = vec![block as u64; world_size as usize];
            let displs: Vec<i64> = (0..world_size as i64).map(|p| p * block as i64).collect();

            unsafe {
                comm.alltoallv(
                    SendBuf::Addr(send.as_ptr() as u64),
                    &counts,
                    &displs,
                    i32_t,
                    recv.as_mut_ptr() as u64,
                    &counts,
                    &displs,
                    i32_t,
                )
                .await?;
            }
            let firsts: Vec<i32> = recv.chunks(block).map(|c| c[0]).collect();
            bigcount::Result::Ok((rank, firsts))
        }));
    }

    for h in handles {
        let (rank, firsts) = h.await.expect("rank task panicked")?;
        println!("rank {rank} received blocks starting with {firsts:?}");
    }
    // rank 0 received blocks starting with [0, 100, 200, 300]
    // rank 1 received blocks starting with [1, 101, 201, 301]
    // ...

    Ok(())
}
