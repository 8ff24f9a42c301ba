#[macro_use]
extern crate log;

use getopts::Options;
use metricspace::{Configuration, Counter, Histogram, LabelOrdering, MetricCollection};
use std::{
    env, thread,
    time::{Duration, Instant},
};

struct Generator {
    requests: Counter,
    latency: Histogram,
    callers: usize,
    t0: Option<Instant>,
}

impl Generator {
    fn new(collection: &MetricCollection, callers: usize) -> Generator {
        Generator {
            requests: collection.counter("requests"),
            latency: collection.histogram("latency_ns"),
            callers,
            t0: None,
        }
    }

    fn run(&mut self) {
        let mut turn: usize = 0;
        loop {
            turn = turn.wrapping_add(1);
            let caller = (turn % self.callers).to_string();
            let status = if turn % 10 == 0 { "error" } else { "ok" };

            let t1 = Instant::now();
            if let Some(t0) = self.t0 {
                let labels = [("status", status), ("caller", caller.as_str())];
                self.requests.with(labels).increment();
                self.latency.with([("status", status)]).observe((t1 - t0).as_nanos() as f64);
            }
            self.t0 = Some(t1);
        }
    }
}

fn print_usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {} [options]", program);
    print!("{}", opts.usage(&brief));
}

pub fn opts() -> Options {
    let mut opts = Options::new();

    opts.optopt("p", "producers", "number of producers", "INTEGER");
    opts.optopt("c", "callers", "number of distinct caller label values", "INTEGER");
    opts.optopt("b", "batch", "number of histogram samples folded at once", "INTEGER");
    opts.optflag("i", "insertion", "treat label order as part of an instance's identity");
    opts.optflag("h", "help", "print this help menu");

    opts
}

fn parse_opt(matches: &getopts::Matches, name: &str, default: usize) -> Result<usize, String> {
    match matches.opt_str(name) {
        Some(raw) => raw.parse().map_err(|e| format!("invalid value for --{}: {}", name, e)),
        None => Ok(default),
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let program = &args[0];
    let opts = opts();

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => {
            error!("Failed to parse command line args: {}", f);
            return;
        },
    };

    if matches.opt_present("help") {
        print_usage(program, &opts);
        return;
    }

    info!("metricspace benchmark");

    let settings = parse_opt(&matches, "producers", 1)
        .and_then(|p| parse_opt(&matches, "callers", 16).map(|c| (p, c)))
        .and_then(|(p, c)| parse_opt(&matches, "batch", 128).map(|b| (p, c, b)));
    let (producers, callers, batch) = match settings {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            return;
        },
    };
    let ordering = if matches.opt_present("insertion") {
        LabelOrdering::Insertion
    } else {
        LabelOrdering::Canonical
    };

    info!("producers: {}", producers);
    info!("callers: {}", callers);
    info!("histogram batch size: {}", batch);
    info!("label ordering: {:?}", ordering);

    let collection = match Configuration::new()
        .ordering(ordering)
        .histogram_batch_size(batch)
        .percentiles(&[50.0, 90.0, 99.0, 99.9, 100.0])
        .build()
    {
        Ok(collection) => collection,
        Err(e) => {
            error!("failed to build collection: {}", e);
            return;
        },
    };

    info!("collection configured");

    // Spin up our sample producers.
    for _ in 0..producers {
        let collection = collection.clone();
        let callers = callers.max(1);
        thread::spawn(move || {
            Generator::new(&collection, callers).run();
        });
    }

    // Drain the counters once a second to figure out the sample rate.
    let mut total = 0.0;
    let mut t0 = Instant::now();
    for _ in 0..60 {
        thread::sleep(Duration::new(1, 0));
        let t1 = Instant::now();

        let turn_total: f64 = collection.counters().iter().map(|c| c.value_reset()).sum();
        total += turn_total;
        let rate = turn_total / (t1 - t0).as_secs_f64();

        info!("rate: {} samples per second", rate);
        info!("series: {}", collection.counters().len());
        for latency in collection.histograms() {
            info!("latency{} (ns): {}", latency.dimensions(), latency.summary_reset());
        }

        t0 = t1;
    }

    info!("total metrics pushed: {}", total);
}
