use bigcount::p2p::{irecv_x, isend_x, recv_x, send_x};
use bigcount::{BigCountError, Count, DataType, Transport, TypeSystem, WideBuf, count_max};

use super::helpers::run_collective;

const NM: Count = 4;

#[tokio::test]
async fn test_ring_exchange_wide() {
    run_collective(3, NM, |t| async move {
        let r = t.rank();
        let n = t.size();
        let i128_t = t.predefined(DataType::I128);
        let count = count_max(NM, 16) - 1;
        let send: Vec<i128> = (0..count as i128).map(|k| i128::from(r) << 64 | k).collect();
        let mut recv = vec![0i128; count as usize];
        let left = (r + n - 1) % n;
        unsafe {
            let req = irecv_x(&*t, WideBuf::new(recv.as_mut_ptr() as u64, count, i128_t), left, 9)
                .unwrap();
            let sreq = isend_x(&*t, WideBuf::new(send.as_ptr() as u64, count, i128_t), (r + 1) % n, 9)
                .unwrap();
            t.wait_all(vec![req, sreq]).await.unwrap();
        }
        let expected: Vec<i128> = (0..count as i128).map(|k| i128::from(left) << 64 | k).collect();
        assert_eq!(recv, expected);
    })
    .await;
}

#[tokio::test]
async fn test_count_limit_enforced() {
    run_collective(2, NM, |t| async move {
        let u8_t = t.predefined(DataType::U8);
        let max = count_max(NM, 1);
        let buf = vec![0u8; max as usize];
        let err = unsafe { send_x(&*t, WideBuf::new(buf.as_ptr() as u64, max, u8_t), 0, 1) }
            .await
            .unwrap_err();
        assert!(matches!(err, BigCountError::CountTooLarge { count, max: m } if count == max && m == max));

        // The native path still accepts counts up to the limit.
        if t.rank() == 0 {
            unsafe { send_x(&*t, WideBuf::new(buf.as_ptr() as u64, NM, u8_t), 1, 2) }
                .await
                .unwrap();
        } else {
            let mut into = vec![1u8; NM as usize];
            unsafe { recv_x(&*t, WideBuf::new(into.as_mut_ptr() as u64, NM, u8_t), 0, 2) }
                .await
                .unwrap();
            assert_eq!(into, vec![0; NM as usize]);
        }
    })
    .await;
}
