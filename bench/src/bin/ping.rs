use std::time::Duration;

use clap::Parser;
use mailslot::Endpoint;
use quanta::Instant;

async fn pong(ping: Endpoint, pong: Endpoint) {
    // Echo loop: receive messages and immediately send them back
    let mut buf = vec![0u8; mailslot::LIMIT_MAX_MSG_SIZE];
    loop {
        let Ok(n) = ping.read(&mut buf).await else {
            break;
        };
        if pong.write(&buf[..n]).await.is_err() {
            break;
        }
    }
}

#[tokio::main]
async fn main() {
    let Args { size, num, warmup, test } = Args::parse();

    let registry = mailslot::registry()
        .instances(2)
        .default_max_message_size(size)
        .build()
        .unwrap();

    tokio::spawn(pong(registry.open(0).unwrap(), registry.open(1).unwrap()));
    let ping = registry.open(0).unwrap();
    let echo = registry.open(1).unwrap();

    // Prepare storage for RTT samples and create test message
    let mut samples: Vec<Duration> = Vec::with_capacity(num);
    let msg = vec![0x42u8; size];
    let mut buf = vec![0u8; size];

    // Warmup phase: run ping/pong cycles to stabilize the system (e.g. cache warming)
    let start = Instant::now();
    while start.elapsed() < Duration::from_secs_f64(warmup) {
        ping.write(&msg).await.unwrap();
        let _ = echo.read(&mut buf).await.unwrap();
    }

    // Measurement phase: collect RTT samples for each ping/pong round trip
    for _ in 0..num {
        let now = Instant::now();
        ping.write(&msg).await.unwrap();
        let _ = echo.read(&mut buf).await.unwrap();
        samples.push(now.elapsed());
    }

    let mut min = Duration::MAX;
    let mut max = Duration::ZERO;
    let mut sum = Duration::ZERO;
    for (seq, rtt) in samples.iter().enumerate() {
        min = min.min(*rtt);
        max = max.max(*rtt);
        sum += *rtt;

        if test {
            println!("{},{},{}", size, seq, rtt.as_nanos());
        } else {
            println!("{} bytes: seq={} rtt={:#.2?} lat={:#.2?}", size, seq, rtt, *rtt / 2);
        }
    }

    let avg = sum / samples.len().max(1) as u32;

    if !test {
        println!("rtt min/avg/max = {:#.2?}/{:#.2?}/{:#.2?}", min, avg, max);
        println!("lat min/avg/max = {:#.2?}/{:#.2?}/{:#.2?}", min / 2, avg / 2, max / 2,);
    }

    registry.shutdown();
}

#[derive(Debug, Parser)]
struct Args {
    #[arg(short, long, default_value = "64")]
    size: usize,
    #[arg(short, long, default_value = "100")]
    num: usize,
    #[arg(short, long, default_value = "1.0")]
    warmup: f64,
    #[arg(short, long)]
    test: bool,
}
