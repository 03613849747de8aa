use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use clap::Parser;
use mailslot::Error;

#[tokio::main]
async fn main() {
    let Args {
        size,
        producers,
        consumers,
        capacity,
        nonblocking,
        interval,
    } = Args::parse();

    let registry = mailslot::registry()
        .instances(1)
        .capacity(capacity)
        .default_max_message_size(size)
        .build()
        .unwrap();

    static MSGS: AtomicUsize = AtomicUsize::new(0);
    let slot = registry.slot(0).unwrap().clone();
    tokio::spawn(mailslot_bench::stats_loop(slot, Duration::from_secs_f32(interval), &MSGS));

    for _ in 0..producers {
        let mut endpoint = registry.open(0).unwrap();
        endpoint.set_nonblocking(nonblocking);
        tokio::spawn(async move {
            let msg = vec![0x42u8; size];
            loop {
                match endpoint.write(&msg).await {
                    Ok(_) => {}
                    Err(Error::WouldBlock) => tokio::task::yield_now().await,
                    Err(e) => panic!("write failed: {e}"),
                }
            }
        });
    }

    let mut handles = Vec::new();
    for _ in 0..consumers {
        let mut endpoint = registry.open(0).unwrap();
        endpoint.set_nonblocking(nonblocking);
        handles.push(tokio::spawn(async move {
            let mut buf = vec![0u8; size];
            loop {
                match endpoint.read(&mut buf).await {
                    Ok(_) => {
                        MSGS.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(Error::WouldBlock) => tokio::task::yield_now().await,
                    Err(e) => panic!("read failed: {e}"),
                }
            }
        }));
    }

    for h in handles {
        let _ = h.await;
    }
}

#[derive(Debug, Parser)]
struct Args {
    #[arg(short, long, default_value = "64")]
    size: usize,
    #[arg(short, long, default_value = "1")]
    producers: usize,
    #[arg(short = 'C', long, default_value = "1")]
    consumers: usize,
    #[arg(short, long, default_value = "64")]
    capacity: usize,
    #[arg(short, long)]
    nonblocking: bool,
    #[arg(short, long, default_value = "1.0")]
    interval: f32,
}
