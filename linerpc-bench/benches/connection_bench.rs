//! End-to-end delivery benchmarks over in-memory connections.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use linerpc_server::Connection;
use tokio::io::AsyncWriteExt;
use tokio::runtime::Runtime;

const BATCH: usize = 100;

fn batch_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    for i in 0..BATCH {
        bytes.extend_from_slice(
            format!("{{\"jsonrpc\":\"2.0\",\"id\":{},\"method\":\"ping\"}}\n", i).as_bytes(),
        );
    }
    bytes
}

/// Writes a batch into a fresh connection and drains it through every subscriber.
async fn deliver(bytes: &[u8], subscribers: usize) -> usize {
    let (local, mut peer) = tokio::io::duplex(64 * 1024);
    let connection = Connection::init(local, "conn-bench").unwrap();
    let subs: Vec<_> = (0..subscribers).map(|_| connection.received()).collect();

    peer.write_all(bytes).await.unwrap();
    drop(peer);

    let mut tasks = Vec::new();
    for mut sub in subs {
        tasks.push(tokio::spawn(async move {
            let mut n = 0;
            while let Some(Ok(_)) = sub.recv().await {
                n += 1;
            }
            n
        }));
    }

    let mut total = 0;
    for task in tasks {
        total += task.await.unwrap();
    }
    total
}

fn bench_multicast(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let bytes = batch_bytes();

    let mut group = c.benchmark_group("multicast_delivery");
    group.throughput(Throughput::Elements(BATCH as u64));

    for subscribers in [1, 4, 16] {
        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &subscribers,
            |b, &subscribers| {
                b.to_async(&rt)
                    .iter(|| async { black_box(deliver(&bytes, subscribers).await) });
            },
        );
    }

    group.finish();
}

fn bench_send(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (connection, drain) = rt.block_on(async {
        let (local, mut peer) = tokio::io::duplex(64 * 1024);
        let connection = Connection::init(local, "conn-send").unwrap();
        let drain = tokio::spawn(async move {
            let _ = tokio::io::copy(&mut peer, &mut tokio::io::sink()).await;
        });
        (connection, drain)
    });

    let response = serde_json::json!({"jsonrpc": "2.0", "id": 1, "result": "pong"});

    let mut group = c.benchmark_group("send");
    group.throughput(Throughput::Elements(1));
    group.bench_function("response", |b| {
        b.to_async(&rt)
            .iter(|| async { connection.send(black_box(&response)).await.unwrap() });
    });
    group.finish();

    rt.block_on(async {
        connection.close().await;
        let _ = drain.await;
    });
}

criterion_group!(benches, bench_multicast, bench_send);
criterion_main!(benches);
