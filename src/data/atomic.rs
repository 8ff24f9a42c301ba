//! Lock-free floating-point cell.
//!
//! Values are stored as their IEEE 754 bit pattern in an `AtomicU64` and updated with
//! compare-and-swap loops.

use std::sync::atomic::{AtomicU64, Ordering};

/// A 64-bit float which can be shared between threads.
#[derive(Debug, Default)]
pub struct AtomicF64 {
    bits: AtomicU64,
}

impl AtomicF64 {
    /// Creates a new cell holding `value`.
    pub fn new(value: f64) -> Self {
        AtomicF64 {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    /// Loads the current value.
    pub fn load(&self) -> f64 { f64::from_bits(self.bits.load(Ordering::Acquire)) }

    /// Adds `delta` to the current value.
    pub fn add(&self, delta: f64) {
        let mut old = self.bits.load(Ordering::Relaxed);
        loop {
            let new = (f64::from_bits(old) + delta).to_bits();
            match self.bits.compare_exchange_weak(old, new, Ordering::AcqRel, Ordering::Relaxed) {
                Ok(_) => break,
                Err(current) => old = current,
            }
        }
    }

    /// Replaces the current value with `value`, returning the previous one.
    pub fn swap(&self, value: f64) -> f64 { f64::from_bits(self.bits.swap(value.to_bits(), Ordering::AcqRel)) }

    /// Reads the current value and resets it to zero in a single step.
    ///
    /// An `add` that lands between the read and the reset makes the exchange fail, and the loop
    /// retries with the fresh value; the delta is then part of what is returned.
    pub fn take(&self) -> f64 {
        let zero = 0.0f64.to_bits();
        let mut old = self.bits.load(Ordering::Relaxed);
        loop {
            match self.bits.compare_exchange_weak(old, zero, Ordering::AcqRel, Ordering::Relaxed) {
                Ok(_) => return f64::from_bits(old),
                Err(current) => old = current,
            }
        }
    }
}
