//! Centered-lookahead extremum detector.
//!
//! Keeps the last `2L+1` samples. Once full, the sample at logical index `L`
//! is reported as an extremum when it is not exceeded by any earlier sample
//! and strictly exceeds every later one (mirrored for troughs). The
//! non-strict/strict split makes a flat plateau fire exactly once, on its
//! last equal sample (the only one no later sample ties). Detection
//! therefore lags the event by exactly `L` samples.

use crate::ring_buffer::RingBuffer;

/// Which extremum a detector looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Local maxima.
    Peak,
    /// Local minima.
    Trough,
}

#[derive(Debug, Clone)]
pub struct ExtremumDetector<T> {
    buffer: RingBuffer<T>,
    lookahead: usize,
    polarity: Polarity,
    // center of the window after the last firing add_sample
    fired: Option<T>,
}

impl<T: Copy + PartialOrd> ExtremumDetector<T> {
    pub fn new(lookahead: usize, polarity: Polarity) -> Self {
        Self {
            buffer: RingBuffer::new(2 * lookahead + 1),
            lookahead,
            polarity,
            fired: None,
        }
    }

    pub fn peak(lookahead: usize) -> Self {
        Self::new(lookahead, Polarity::Peak)
    }

    pub fn trough(lookahead: usize) -> Self {
        Self::new(lookahead, Polarity::Trough)
    }

    /// Push a sample; returns true when the window center is an extremum.
    pub fn add_sample(&mut self, sample: T) -> bool {
        self.buffer.push_back(sample);
        self.fired = None;
        if !self.buffer.is_full() {
            return false;
        }
        let Ok(&center) = self.buffer.get(self.lookahead) else {
            return false;
        };
        if self.center_is_extremum(center) {
            self.fired = Some(center);
            true
        } else {
            false
        }
    }

    fn center_is_extremum(&self, center: T) -> bool {
        // `beats(a, b)`: a is strictly more extreme than b
        let beats = |a: T, b: T| match self.polarity {
            Polarity::Peak => a > b,
            Polarity::Trough => a < b,
        };
        let mut window = self.buffer.iter().copied();
        // backward: no earlier sample may be more extreme
        for earlier in window.by_ref().take(self.lookahead) {
            if beats(earlier, center) {
                return false;
            }
        }
        // skip the center itself; forward: center must beat every later sample
        window.skip(1).all(|later| beats(center, later))
    }

    /// Push `lookahead` copies of `value`, so the first real extremum is
    /// detectable without waiting for a full window of live samples.
    pub fn prefill(&mut self, value: T) {
        for _ in 0..self.lookahead {
            self.buffer.push_back(value);
        }
        self.fired = None;
    }

    /// Value at the window center; `Some` only right after a firing sample.
    pub fn center_value(&self) -> Option<T> {
        self.fired
    }

    /// Detection lag in samples (the lookahead `L`).
    #[inline]
    pub fn center_offset(&self) -> usize {
        self.lookahead
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    /// Reset to the empty, pre-fill state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.fired = None;
    }
}
