use super::atomic::AtomicF64;

/// Point-in-time value storage.
///
/// Gauges operate in last-write-wins mode, and can also be moved up or down relative to their
/// current value.  They are read in place and never reset by exporters.
#[derive(Debug, Default)]
pub struct AtomicGauge {
    value: AtomicF64,
}

impl AtomicGauge {
    pub fn new() -> AtomicGauge { AtomicGauge::default() }

    pub fn set(&self, value: f64) { let _ = self.value.swap(value); }

    pub fn increment(&self, delta: f64) { self.value.add(delta) }

    pub fn decrement(&self, delta: f64) { self.value.add(-delta) }

    pub fn value(&self) -> f64 { self.value.load() }
}
