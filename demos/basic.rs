#[macro_use]
extern crate log;

use metricspace::{Counter, LogBackend, MetricCollection, Writer};
use std::{thread, time::Duration};

fn handle_request(requests: &Counter, success: bool) {
    let status = if success { "ok" } else { "error" };

    // Every distinct label value is a separate series for the backend, so keep them few.
    requests.with([("status", status), ("caller", "johnnie")]).increment();
}

fn fill_collection(collection: &MetricCollection) {
    let requests = collection.counter("requests");
    handle_request(&requests, true);
    handle_request(&requests, false);
    handle_request(&requests, true);

    collection.gauge("queue_depth").with([("queue", "jobs")]).set(12.0);

    let latency = collection.histogram("latency_us").with([("route", "/checkout")]);
    for value in &[180.0, 220.0, 250.0, 900.0] {
        latency.observe(*value);
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Reading metrics directly.
    let collection = MetricCollection::new();
    fill_collection(&collection);
    for counter in collection.counters() {
        println!("counter {} has dimensions {}: {}", counter.name(), counter.dimensions(), counter.value_reset());
    }

    // Handing them to a writer, which logs them once per tick.
    let collection = MetricCollection::new();
    fill_collection(&collection);

    let (tick_tx, tick_rx) = crossbeam_channel::unbounded();
    let mut writer = Writer::new(collection.clone(), LogBackend::default());
    let done = thread::spawn(move || writer.write_loop(tick_rx, None));

    for _ in 0..3 {
        if let Err(e) = tick_tx.send(std::time::Instant::now()) {
            warn!("failed to tick writer: {}", e);
            break;
        }
        thread::sleep(Duration::from_millis(100));
        fill_collection(&collection);
    }
    drop(tick_tx);

    if done.join().is_err() {
        warn!("writer thread panicked");
    }
}
