/*! Stages and pipelines: chaining quantile filters with subsampling

# About
A [Stage] wraps one [crate::filter::Filter] in either low-pass mode (emit the
running quantile) or high-pass mode (emit the delayed input minus the running
quantile), and subsamples its output by a rate `s`: only every `s`-th ingested
sample produces an emission, the rest produce nothing for that stage.

A [Pipeline] chains stages so that one stage's emissions become the next
stage's input. If an earlier stage doesn't emit on a given call (because it
subsampled it away), later stages are not fed at all for that call — they
simply see fewer, slower samples.

# Example
```
use rolling_quantiles::{Pipeline, Stage};

let stage = Stage::low_pass(3, Some(1), None, None, None, None).unwrap();
let mut pipeline = Pipeline::new(vec![stage]).unwrap();
let out = pipeline.feed_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
assert!(out[0].is_nan() && out[1].is_nan());
assert_eq!(&out[2..], &[2.0, 3.0, 4.0]);
```
*/

use tracing::{instrument, trace};

use crate::error::Error;
use crate::filter::Filter;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    LowPass,
    HighPass,
}

/// One stage of a pipeline: a quantile filter, a mode, and a subsample rate.
pub struct Stage {
    filter: Filter,
    mode: Mode,
    subsample_rate: u64,
    ingest_count: u64,
}

impl Stage {
    fn new(
        mode: Mode,
        window: usize,
        portion: Option<usize>,
        quantile: Option<f64>,
        alpha: Option<f64>,
        beta: Option<f64>,
        subsample_rate: Option<usize>,
    ) -> Result<Stage, Error> {
        let subsample_rate = subsample_rate.unwrap_or(1);
        if subsample_rate < 1 {
            return Err(Error::InvalidArgument(format!(
                "subsample_rate must be at least 1, got {subsample_rate}"
            )));
        }
        let filter = Filter::new(
            window,
            portion,
            quantile,
            alpha.unwrap_or(0.5),
            beta.unwrap_or(0.5),
        )?;
        Ok(Stage {
            filter,
            mode,
            subsample_rate: subsample_rate as u64,
            ingest_count: 0,
        })
    }

    /// A stage that emits the running quantile itself.
    pub fn low_pass(
        window: usize,
        portion: Option<usize>,
        quantile: Option<f64>,
        alpha: Option<f64>,
        beta: Option<f64>,
        subsample_rate: Option<usize>,
    ) -> Result<Stage, Error> {
        Stage::new(Mode::LowPass, window, portion, quantile, alpha, beta, subsample_rate)
    }

    /// A stage that emits the delayed input minus the running quantile, i.e.
    /// whatever the low-pass filter removed.
    pub fn high_pass(
        window: usize,
        portion: Option<usize>,
        quantile: Option<f64>,
        alpha: Option<f64>,
        beta: Option<f64>,
        subsample_rate: Option<usize>,
    ) -> Result<Stage, Error> {
        Stage::new(Mode::HighPass, window, portion, quantile, alpha, beta, subsample_rate)
    }

    pub fn window(&self) -> usize {
        self.filter.window()
    }

    pub fn subsample_rate(&self) -> usize {
        self.subsample_rate as usize
    }

    /// `x` may be a genuine sample or an upstream stage's own `NaN`
    /// fill-phase placeholder; the latter is passed straight through without
    /// touching this stage's filter, since it carries no information for
    /// this stage's window and is not caller-supplied bad input.
    fn feed(&mut self, x: f64) -> Result<Option<f64>, Error> {
        let value = if x.is_nan() {
            f64::NAN
        } else {
            let q = self.filter.feed(x)?;
            match self.mode {
                Mode::LowPass => q,
                Mode::HighPass => {
                    if q.is_nan() {
                        f64::NAN
                    } else {
                        self.filter.delayed_input() - q
                    }
                }
            }
        };
        self.ingest_count += 1;
        if self.ingest_count % self.subsample_rate == 0 {
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }
}

/// An ordered chain of [Stage]s, each fed by the previous stage's emissions.
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    #[instrument(level = "debug", skip_all, fields(stages = stages.len()))]
    pub fn new(stages: Vec<Stage>) -> Result<Pipeline, Error> {
        if stages.is_empty() {
            return Err(Error::InvalidArgument(
                "a pipeline requires at least one stage".into(),
            ));
        }
        Ok(Pipeline { stages })
    }

    /// Feeds one sample through every stage in order. Returns `None` if some
    /// stage along the way subsampled this call away; otherwise the final
    /// stage's output (which may itself be `NaN` while its window fills).
    pub fn feed_scalar(&mut self, x: f64) -> Result<Option<f64>, Error> {
        let mut current = Some(x);
        for (index, stage) in self.stages.iter_mut().enumerate() {
            current = match current {
                Some(v) => stage.feed(v)?,
                None => break,
            };
            trace!(stage = index, emitted = ?current, "stage fed");
        }
        Ok(current)
    }

    /// Feeds a whole slice, collecting every emission. `NaN`s from
    /// still-filling stages are included; calls that no stage emits on are
    /// simply absent from the output.
    pub fn feed_slice(&mut self, xs: &[f64]) -> Result<Vec<f64>, Error> {
        let mut out = Vec::with_capacity(xs.len());
        for &x in xs {
            if let Some(y) = self.feed_scalar(x)? {
                out.push(y);
            }
        }
        Ok(out)
    }

    /// The pipeline's total delay in units of original input samples: each
    /// stage contributes `window / 2` samples at its own sampling rate,
    /// scaled up by the subsample rates of every stage upstream of it.
    pub fn lag(&self) -> f64 {
        let mut total = 0.0;
        let mut scale = 1.0;
        for stage in &self.stages {
            total += scale * (stage.window() as f64 / 2.0);
            scale *= stage.subsample_rate() as f64;
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_pipeline() {
        assert!(matches!(Pipeline::new(vec![]), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn rejects_subsample_rate_zero() {
        assert!(matches!(
            Stage::low_pass(3, Some(1), None, None, None, Some(0)),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn low_pass_lag_is_half_the_window() {
        let stage = Stage::low_pass(71, None, Some(0.5), None, None, None).unwrap();
        let pipeline = Pipeline::new(vec![stage]).unwrap();
        assert_eq!(pipeline.lag(), 35.5);
    }

    #[test]
    fn high_pass_identity_reconstructs_the_delayed_input() {
        // Summing a low-pass and its complementary high-pass reconstructs the
        // delayed input exactly.
        let window = 9;
        let mut low = Stage::low_pass(window, None, Some(0.5), None, None, None).unwrap();
        let mut high = Stage::high_pass(window, None, Some(0.5), None, None, None).unwrap();
        let input: Vec<f64> = (0..30).map(|i| (i as f64 * 0.3).sin() * 10.0).collect();
        for &x in &input {
            let lo = low_feed(&mut low, x);
            let hi = high_feed(&mut high, x);
            if !lo.is_nan() {
                assert!((hi + lo - high.filter.delayed_input()).abs() < 1e-9);
            }
        }
    }

    fn low_feed(stage: &mut Stage, x: f64) -> f64 {
        stage.feed(x).unwrap().unwrap()
    }

    fn high_feed(stage: &mut Stage, x: f64) -> f64 {
        stage.feed(x).unwrap().unwrap()
    }

    #[test]
    fn subsample_rate_emits_every_nth_call() {
        let stage = Stage::low_pass(3, Some(1), None, None, None, Some(2)).unwrap();
        let mut pipeline = Pipeline::new(vec![stage]).unwrap();
        let mut emitted = 0;
        for x in 1..=10 {
            if pipeline.feed_scalar(x as f64).unwrap().is_some() {
                emitted += 1;
            }
        }
        assert_eq!(emitted, 5);
    }

    #[test]
    fn low_pass_into_high_pass_survives_the_upstream_fill_phase() {
        // Stage one's window (100) is far larger than its subsample rate
        // (2), so its first several hundred emissions are NaN placeholders
        // handed straight to stage two. This must not error out.
        let low = Stage::low_pass(100, None, Some(0.5), None, None, Some(2)).unwrap();
        let high = Stage::high_pass(10, None, Some(0.5), None, None, None).unwrap();
        let mut pipeline = Pipeline::new(vec![low, high]).unwrap();

        let mut state = 99u64;
        let mut next = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((state >> 33) as f64 / u32::MAX as f64) - 0.5
        };
        let input: Vec<f64> = (0..1000).map(|_| next()).collect();

        let out = pipeline.feed_slice(&input).unwrap();
        assert_eq!(out.len(), 500);
        assert!(out[..45].iter().all(|v| v.is_nan()));
        assert!(out[490..].iter().all(|v| v.is_finite()));
    }

    #[test]
    fn chained_stages_only_advance_on_upstream_emission() {
        let first = Stage::low_pass(2, Some(1), None, None, None, Some(2)).unwrap();
        let second = Stage::low_pass(2, Some(1), None, None, None, None).unwrap();
        let mut pipeline = Pipeline::new(vec![first, second]).unwrap();
        let mut emitted = 0;
        for x in 1..=20 {
            if pipeline.feed_scalar(x as f64).unwrap().is_some() {
                emitted += 1;
            }
        }
        // Second stage only ever sees every other sample, so it emits at
        // most once per two upstream emissions, i.e. once per four inputs.
        assert!(emitted > 0 && emitted <= 5);
    }
}
