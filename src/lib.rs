/*! # About
A streaming engine for tracking quantiles (including the running median) over
a fixed-size sliding window of `f64` samples, in `O(log w)` time per sample
regardless of how large the window `w` gets.

The core idea is to keep the window's values split across two heaps — a
max-heap holding the smallest `m` of them, a min-heap holding the rest — so
that the quantile sitting at the boundary is always one of the two heap roots,
and the heaps' sizes are kept balanced as the window slides by cross-heap root
swaps rather than full re-sorts.

# Modules
- [filter]: the dual-heap engine itself, one window at a time.
- [pipeline]: [Stage]s (low-pass or high-pass, with optional subsampling)
  chained into a [Pipeline].
- [error]: the error taxonomy shared by every fallible entry point.

# Example
```
use rolling_quantiles::medfilt;

let smoothed = medfilt(&[5.0, 1.0, 4.0, 2.0, 3.0, 9.0, 0.0], 3).unwrap();
assert_eq!(smoothed.len(), 7);
assert_eq!(&smoothed[2..], &[4.0, 2.0, 3.0, 3.0, 3.0]);
```
*/

mod error;
mod filter;
mod indexed_heap;
mod pipeline;
mod ring_buffer;
mod slot;

pub use error::Error;
pub use pipeline::{Pipeline, Stage};

/// A convenience wrapper around a single [Stage::low_pass] median filter,
/// equivalent to building a one-stage [Pipeline] with `quantile = 0.5` and
/// feeding it the whole signal at once.
pub fn medfilt(signal: &[f64], window_size: usize) -> Result<Vec<f64>, Error> {
    let stage = Stage::low_pass(window_size, None, Some(0.5), None, None, None)?;
    let mut pipeline = Pipeline::new(vec![stage])?;
    pipeline.feed_slice(signal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn medfilt_matches_a_manually_built_pipeline() {
        let signal = [5.0, 1.0, 4.0, 2.0, 3.0, 9.0, 0.0, 7.0, 8.0, 6.0];
        let via_medfilt = medfilt(&signal, 5).unwrap();

        let stage = Stage::low_pass(5, None, Some(0.5), None, None, None).unwrap();
        let mut pipeline = Pipeline::new(vec![stage]).unwrap();
        let via_pipeline = pipeline.feed_slice(&signal).unwrap();

        assert_eq!(via_medfilt, via_pipeline);
    }

    #[test]
    fn medfilt_rejects_zero_window() {
        assert!(matches!(medfilt(&[1.0, 2.0], 0), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn medfilt_rejects_non_finite_samples() {
        assert!(matches!(medfilt(&[1.0, f64::NAN, 2.0], 2), Err(Error::InvalidInput(_))));
    }
}
