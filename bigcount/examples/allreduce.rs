//! Wide-count allreduce across 3 ranks.
//!
//! 100 items against a native limit of 16: the reduction runs either as one
//! call over a composed datatype with a chunking operator, or as a sequence
//! of native-sized calls (`BIGCOUNT_REDUCE_STRATEGY=cleaver`).
//!
//! ```bash
//! BIGCOUNT_REDUCE_STRATEGY=cleaver cargo run --example allreduce
//! ```

use bigcount::{BigCountConfig, DataType, LocalWorld, ReduceOp, SendBuf, TypeSystem, WideComm};
use std::sync::Arc;

#[tokio::main]
async fn main() -> bigcount::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let count = 100usize;
    let config = BigCountConfig::from_env();
    let ranks: Vec<_> = LocalWorld::new(3)
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
            let f64_t = t.predefined(DataType::F64);
            let send = vec![rank as f64 + 1.0; count];
            let mut recv = vec![0.0f64; count];
            unsafe {
                comm.allreduce(
                    SendBuf::Addr(send.as_ptr() as u64),
                    recv.as_mut_ptr() as u64,
                    count as u64,
                    f64_t,
                    ReduceOp::Sum,
                )
                .await?;
            }
            bigcount::Result::Ok((rank, recv[0], recv[count - 1]))
        }));
    }

    for h in handles {
        let (rank, first, last) = h.await.expect("rank task panicked")?;
        println!("rank {rank}: first {first}, last {last}");
    }
    // Every rank prints: first 6, last 6

    Ok(())
}
