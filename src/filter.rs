/*! The dual-heap rolling quantile filter

# About
A [Filter] tracks a single quantile over a fixed-size sliding window in
O(log w) per sample. It keeps the window's smallest `m` values in a max-heap
(`lower`) and the remaining `w - m` values in a min-heap (`upper`); the
quantile is read off the boundary between them, optionally interpolated
between the two roots.

Eviction never has to search for "the oldest value" — the ring buffer's
cursor names the window position due for eviction, and the [crate::slot::Slot]
array maps that position straight to a heap and index, so replacing it costs
one `replace_at` plus, in the rare case the heaps' relative order breaks, one
root swap.

# Design
`m` and `frac` are derived once at construction from whichever of `portion` or
`quantile` the caller gave, and nothing downstream cares which one it was —
the insertion and readout code paths are identical either way. This mirrors
how the two-heap median algorithm is normally taught (split the window in
half, keep each heap's root accessible) generalized to an arbitrary split
point plus a linear interpolation between the two roots.
*/

use tracing::{instrument, warn};

use crate::error::Error;
use crate::indexed_heap::IndexedHeap;
use crate::ring_buffer::RingBuffer;
use crate::slot::{Side, Slot};

pub(crate) struct Filter {
    lower: IndexedHeap,
    upper: IndexedHeap,
    slots: Vec<Slot>,
    ring: RingBuffer,
    window: usize,
    m: usize,
    frac: f64,
}

impl Filter {
    /// Builds a filter over a window of `window` samples, targeting either an
    /// integer `portion` (the count of samples that should land *above* the
    /// quantile) or a continuous `quantile` in `[0, 1]` interpolated with the
    /// plotting-position parameters `alpha`/`beta`. Exactly one of `portion`
    /// or `quantile` may be given; if neither is given the median
    /// (`quantile = 0.5`) is assumed.
    #[instrument(level = "debug", skip_all, fields(window, portion = ?portion, quantile = ?quantile, alpha, beta))]
    pub fn new(
        window: usize,
        portion: Option<usize>,
        quantile: Option<f64>,
        alpha: f64,
        beta: f64,
    ) -> Result<Filter, Error> {
        if window < 1 {
            return Err(Error::InvalidArgument(format!(
                "window must be at least 1, got {window}"
            )));
        }
        if !(0.0..=1.0).contains(&alpha) {
            return Err(Error::InvalidArgument(format!(
                "alpha must be in [0, 1], got {alpha}"
            )));
        }
        if !(0.0..=1.0).contains(&beta) {
            return Err(Error::InvalidArgument(format!(
                "beta must be in [0, 1], got {beta}"
            )));
        }

        let (m, frac) = match (portion, quantile) {
            (Some(_), Some(_)) => {
                return Err(Error::InvalidArgument(
                    "portion and quantile cannot both be specified".into(),
                ));
            }
            (Some(portion), None) => {
                if portion > window {
                    return Err(Error::InvalidArgument(format!(
                        "portion must be in [0, {window}], got {portion}"
                    )));
                }
                (window - portion, 0.0)
            }
            (None, Some(q)) => {
                if !(0.0..=1.0).contains(&q) {
                    return Err(Error::InvalidArgument(format!(
                        "quantile must be in [0, 1], got {q}"
                    )));
                }
                derive_rank(window, q, alpha, beta)
            }
            (None, None) => derive_rank(window, 0.5, alpha, beta),
        };

        Ok(Filter {
            lower: IndexedHeap::with_capacity(Side::Lower, window),
            upper: IndexedHeap::with_capacity(Side::Upper, window),
            slots: vec![
                Slot {
                    side: Side::Lower,
                    index: 0
                };
                window
            ],
            ring: RingBuffer::new(window),
            window,
            m,
            frac,
        })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Ingests one sample, returns the current quantile estimate (`NaN` while
    /// the window is still filling), and advances the ring buffer.
    pub fn feed(&mut self, x: f64) -> Result<f64, Error> {
        if !x.is_finite() {
            warn!(value = x, "rejecting non-finite sample");
            return Err(Error::InvalidInput(x));
        }
        if self.ring.is_full() {
            self.insert_full(x)?;
        } else {
            self.insert_filling(x)?;
        }
        self.readout()
    }

    /// The value that was fed `floor(window / 2)` samples before the one just
    /// fed, as currently stored. Only meaningful once the window has filled.
    pub fn delayed_input(&self) -> f64 {
        let slot_id = self.ring.slot_behind(self.window / 2);
        self.value_at_slot(slot_id)
    }

    fn value_at_slot(&self, slot_id: usize) -> f64 {
        let slot = self.slots[slot_id];
        match slot.side {
            Side::Lower => self.lower.value_at(slot.index),
            Side::Upper => self.upper.value_at(slot.index),
        }
    }

    fn readout(&self) -> Result<f64, Error> {
        if !self.ring.is_full() {
            return Ok(f64::NAN);
        }
        if self.m == 0 {
            Ok(self.upper.peek_top()?.value)
        } else if self.m == self.window {
            Ok(self.lower.peek_top()?.value)
        } else {
            let l = self.lower.peek_top()?.value;
            let u = self.upper.peek_top()?.value;
            Ok((1.0 - self.frac) * l + self.frac * u)
        }
    }

    fn insert_filling(&mut self, x: f64) -> Result<(), Error> {
        let slot_id = self.ring.current_slot();
        self.lower.push(x, slot_id, &mut self.slots);
        let target = target_lower_size(self.ring.len() + 1, self.m, self.window);
        if self.lower.size() > target {
            let top = self.lower.pop_top(&mut self.slots)?;
            self.upper.push(top.value, top.slot_id, &mut self.slots);
        }
        self.ring.advance();
        Ok(())
    }

    fn insert_full(&mut self, x: f64) -> Result<(), Error> {
        let slot_id = self.ring.current_slot();
        let slot = self.slots[slot_id];
        match slot.side {
            Side::Lower => {
                self.lower.replace_at(slot.index, x, &mut self.slots)?;
                self.fix_boundary()?;
            }
            Side::Upper => {
                self.upper.replace_at(slot.index, x, &mut self.slots)?;
                self.fix_boundary()?;
            }
        }
        self.ring.advance();
        Ok(())
    }

    /// After a local `replace_at`, only the two roots can possibly be out of
    /// order relative to each other; if they are, swap them across heaps.
    fn fix_boundary(&mut self) -> Result<(), Error> {
        if self.lower.is_empty() || self.upper.is_empty() {
            return Ok(());
        }
        let lower_top = self.lower.peek_top()?.value;
        let upper_top = self.upper.peek_top()?.value;
        if lower_top > upper_top {
            let lower_cell = self.lower.pop_top(&mut self.slots)?;
            let upper_cell = self.upper.pop_top(&mut self.slots)?;
            self.lower.push(upper_cell.value, upper_cell.slot_id, &mut self.slots);
            self.upper.push(lower_cell.value, lower_cell.slot_id, &mut self.slots);
        }
        Ok(())
    }
}

/// `ceil(k * m / w)`, the number of samples that should have landed in the
/// lower heap after `k` of the window's `w` slots have been filled.
fn target_lower_size(k: usize, m: usize, w: usize) -> usize {
    (k * m + w - 1) / w
}

/// Converts a continuous quantile request into the `(m, frac)` pair the
/// filter actually operates on: `m` samples in the lower heap, and a
/// fractional weight toward the upper heap's root.
///
/// `h = alpha + q * (w + 1 - alpha - beta) - 1` locates the target rank on a
/// 0-indexed order-statistic axis (Hazen's plotting position when
/// `alpha = beta = 1/2`, type-7 when `alpha = beta = 1`). `m` is
/// `floor(h) + 1` so that `lower`'s root lands on `floor(h)` and `upper`'s
/// root on the next order statistic up, clamped to the ends of the window.
fn derive_rank(w: usize, q: f64, alpha: f64, beta: f64) -> (usize, f64) {
    let h = alpha + q * (w as f64 + 1.0 - alpha - beta) - 1.0;
    let floor_h = h.floor();
    let raw_m = floor_h + 1.0;
    if raw_m <= 0.0 {
        (0, 0.0)
    } else if raw_m >= w as f64 {
        (w, 0.0)
    } else {
        (raw_m as usize, h - floor_h)
    }
}
