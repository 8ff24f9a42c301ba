use crate::{
    collection::MetricCollection,
    data::{Measurement, Snapshot},
    error::WriteError,
};
use crossbeam_channel::Receiver;
use std::{convert::Infallible, error::Error, time::Instant};

/// Number of measurements handed to a backend at once, unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Destination for exported measurements.
pub trait Backend {
    type Error: Error + Send + Sync + 'static;

    /// Sends one batch of measurements.
    fn send(&mut self, batch: &[Measurement]) -> Result<(), Self::Error>;
}

/// A backend which logs every measurement.
#[derive(Clone, Debug)]
pub struct LogBackend {
    level: log::Level,
}

impl LogBackend {
    pub fn new(level: log::Level) -> Self { LogBackend { level } }
}

impl Default for LogBackend {
    fn default() -> Self { LogBackend::new(log::Level::Info) }
}

impl Backend for LogBackend {
    type Error = Infallible;

    fn send(&mut self, batch: &[Measurement]) -> Result<(), Self::Error> {
        for measurement in batch {
            log::log!(self.level, "{}", measurement);
        }
        Ok(())
    }
}

/// Outcome of a write where every batch went through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub measurements: usize,
    pub batches: usize,
}

/// Periodically drains a [`MetricCollection`] into a [`Backend`].
///
/// Counters are exported as the delta since the previous write, gauges as their current value,
/// and histograms as a summary of what was observed since the previous write.
pub struct Writer<B> {
    collection: MetricCollection,
    backend: B,
    batch_size: usize,
}

impl<B: Backend> Writer<B> {
    pub fn new(collection: MetricCollection, backend: B) -> Self {
        Writer {
            collection,
            backend,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Sets the most measurements sent to the backend in one batch.
    ///
    /// Defaults to `20`.  A batch size of zero is treated as one.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn backend(&self) -> &B { &self.backend }

    pub fn into_backend(self) -> B { self.backend }

    /// Reads every registered metric, resetting counters and histograms.
    ///
    /// Counters with nothing added and histograms with nothing observed since the last collect are
    /// left out.
    pub fn collect(&self) -> Snapshot {
        let mut snapshot = Snapshot::default();

        for counter in self.collection.counters() {
            let delta = counter.value_reset();
            if delta != 0.0 {
                snapshot.set_count(counter.name(), counter.dimensions().clone(), delta);
            }
        }

        for gauge in self.collection.gauges() {
            snapshot.set_gauge(gauge.name(), gauge.dimensions().clone(), gauge.value());
        }

        for histogram in self.collection.histograms() {
            let summary = histogram.summary_reset();
            if summary.count() > 0 {
                snapshot.set_histogram(histogram.name(), histogram.dimensions().clone(), summary);
            }
        }

        snapshot
    }

    /// Collects and sends everything to the backend.
    ///
    /// A batch the backend rejects is dropped: its counters and histograms were already reset and
    /// are not recorded again.  The remaining batches are still sent.
    pub fn write(&mut self) -> Result<WriteReport, WriteError> {
        let measurements = self.collect().into_vec();
        let mut report = WriteReport::default();
        let mut errors = 0;
        let mut dropped = 0;
        let mut last: Option<B::Error> = None;

        for batch in measurements.chunks(self.batch_size) {
            match self.backend.send(batch) {
                Ok(()) => {
                    report.measurements += batch.len();
                    report.batches += 1;
                },
                Err(e) => {
                    log::debug!("failed to send batch of {} measurements: {}", batch.len(), e);
                    errors += 1;
                    dropped += batch.len();
                    last = Some(e);
                },
            }
        }

        match last {
            Some(e) => Err(WriteError {
                errors,
                dropped,
                last: Box::new(e),
            }),
            None => {
                log::debug!("wrote {} measurements in {} batches", report.measurements, report.batches);
                Ok(report)
            },
        }
    }

    /// Writes once per tick received on `ticks`, until its sender goes away.
    ///
    /// Failed writes go to `on_error` when given, and are logged otherwise.  Either way the loop
    /// keeps going.
    ///
    /// ```no_run
    /// # use metricspace::{LogBackend, MetricCollection, Writer};
    /// # use std::time::Duration;
    /// let collection = MetricCollection::new();
    /// let mut writer = Writer::new(collection.clone(), LogBackend::default());
    /// writer.write_loop(crossbeam_channel::tick(Duration::from_secs(10)), None);
    /// ```
    pub fn write_loop(&mut self, ticks: Receiver<Instant>, mut on_error: Option<&mut dyn FnMut(WriteError)>) {
        for _ in ticks.iter() {
            if let Err(e) = self.write() {
                match on_error.as_mut() {
                    Some(handler) => handler(e),
                    None => log::warn!("error writing metrics: {}", e),
                }
            }
        }
        log::debug!("tick channel disconnected, writer stopping");
    }
}
