//! Benchmarks for the message broker
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use msgcenter::broker::{Broker, BrokerConfig, ClientId, Outbound, Outbox};
use std::sync::Arc;

/// Outbox that discards everything
struct NullOutbox;

impl Outbox for NullOutbox {
    fn deliver_to_client(&self, client: ClientId, text: String) {
        black_box(Outbound::ToClient { client, text });
    }

    fn dispatch_command_to_sender(&self, sender: &str, command: String) {
        black_box((sender, command));
    }
}

fn create_broker(clients: u64, senders: usize) -> Broker {
    let broker = Broker::new(BrokerConfig::default(), Arc::new(NullOutbox));

    for s in 0..senders {
        broker.add_sender(&format!("app{}", s));
    }
    for id in 0..clients {
        broker.add_client(ClientId(id));
        let target = id as usize % senders;
        broker.send_command(&format!("spy app{}", target), ClientId(id));
    }
    broker
}

fn bench_post_message(c: &mut Criterion) {
    let mut group = c.benchmark_group("post_message");

    for clients in [10u64, 100, 1000] {
        let broker = create_broker(clients, 4);
        let spies = clients / 4;

        group.throughput(Throughput::Elements(spies));

        group.bench_function(format!("fanout_{}_clients", clients), |b| {
            b.iter(|| broker.post_message(black_box("tick"), "app0", false))
        });
    }

    group.finish();
}

fn bench_send_command(c: &mut Criterion) {
    let mut group = c.benchmark_group("send_command");
    let broker = create_broker(100, 10);

    for line in ["ping", "list", "spy app3", "@app5 reload now", "xyzzy"] {
        group.bench_function(line, |b| {
            b.iter(|| broker.send_command(black_box(line), ClientId(7)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_post_message, bench_send_command);
criterion_main!(benches);
