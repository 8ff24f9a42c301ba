use super::atomic::AtomicF64;

/// Accumulating counter storage.
///
/// Counters only ever go up between resets, and are reported as deltas: an exporter reads them
/// with [`AtomicCounter::value_reset`] so every addition is reported exactly once.
#[derive(Debug, Default)]
pub struct AtomicCounter {
    value: AtomicF64,
}

impl AtomicCounter {
    pub fn new() -> AtomicCounter { AtomicCounter::default() }

    /// Adds `delta` to the counter.
    pub fn add(&self, delta: f64) { self.value.add(delta) }

    /// Current value of the counter.
    pub fn value(&self) -> f64 { self.value.load() }

    /// Returns the current value of the counter and resets it to zero.
    ///
    /// Useful for backends whose counter aggregations expect deltas.
    pub fn value_reset(&self) -> f64 { self.value.take() }
}
