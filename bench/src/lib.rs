use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use mailslot::{Slot, SlotStats};

pub async fn stats_loop(slot: Arc<Slot>, interval: Duration, atomic_msgs: &'static AtomicUsize) {
    // Stats reporting loop
    let mut tot_msgs = 0;
    let mut tot_bytes = 0;
    let mut tot_would_block = 0;

    tokio::time::sleep(interval).await;
    let mut loop_interval = tokio::time::interval(interval);
    loop {
        loop_interval.tick().await;

        macro_rules! xps {
            ($x:expr) => {
                $x as f32 / interval.as_secs_f32()
            };
        }

        let msgs = atomic_msgs.swap(0, Ordering::Relaxed);
        tot_msgs += msgs;

        let SlotStats {
            bytes_out, would_block, ..
        } = slot.stats();
        let diff_bytes = bytes_out - tot_bytes;
        let diff_would_block = would_block - tot_would_block;
        let avg_bytes = if msgs != 0 { diff_bytes / msgs } else { 0 };
        let gbps = (8 * diff_bytes) as f64 / 1_000_000_000.0;

        println!(
            "[{:12}]  {:7} msg/s  {:5} B/msg  {:6} would-block/s  {:.3} Gb/s",
            tot_msgs,
            xps!(msgs),
            avg_bytes,
            xps!(diff_would_block),
            xps!(gbps)
        );

        tot_bytes = bytes_out;
        tot_would_block = would_block;
    }
}
