//! A small driver that reads one `f64` per line from stdin, runs it through a
//! single rolling-quantile stage, and prints one output per line — `nan`
//! while the window is still filling, the quantile (or, with `--high-pass`,
//! the residual) once it isn't.
//!
//! ```text
//! rolling-quantile --window 101 --quantile 0.5 < signal.txt
//! ```

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use rolling_quantiles::{Error, Pipeline, Stage};

struct Args {
    window: usize,
    portion: Option<usize>,
    quantile: Option<f64>,
    alpha: Option<f64>,
    beta: Option<f64>,
    subsample: Option<usize>,
    high_pass: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut window = None;
    let mut portion = None;
    let mut quantile = None;
    let mut alpha = None;
    let mut beta = None;
    let mut subsample = None;
    let mut high_pass = false;

    let mut it = std::env::args().skip(1);
    while let Some(flag) = it.next() {
        let mut value = || {
            it.next()
                .ok_or_else(|| format!("{flag} requires a value"))
        };
        match flag.as_str() {
            "--window" => window = Some(value()?.parse().map_err(|_| "--window must be an integer")?),
            "--portion" => portion = Some(value()?.parse().map_err(|_| "--portion must be an integer")?),
            "--quantile" => quantile = Some(value()?.parse().map_err(|_| "--quantile must be a number")?),
            "--alpha" => alpha = Some(value()?.parse().map_err(|_| "--alpha must be a number")?),
            "--beta" => beta = Some(value()?.parse().map_err(|_| "--beta must be a number")?),
            "--subsample" => subsample = Some(value()?.parse().map_err(|_| "--subsample must be an integer")?),
            "--high-pass" => high_pass = true,
            other => return Err(format!("unrecognized flag: {other}")),
        }
    }

    Ok(Args {
        window: window.ok_or("--window is required")?,
        portion,
        quantile,
        alpha,
        beta,
        subsample,
        high_pass,
    })
}

fn run() -> Result<(), Error> {
    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("error: {message}");
            eprintln!(
                "usage: rolling-quantile --window N [--portion N | --quantile Q] [--alpha A] [--beta B] [--subsample S] [--high-pass]"
            );
            std::process::exit(2);
        }
    };

    let stage = if args.high_pass {
        Stage::high_pass(
            args.window,
            args.portion,
            args.quantile,
            args.alpha,
            args.beta,
            args.subsample,
        )?
    } else {
        Stage::low_pass(
            args.window,
            args.portion,
            args.quantile,
            args.alpha,
            args.beta,
            args.subsample,
        )?
    };
    let mut pipeline = Pipeline::new(vec![stage])?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in stdin.lock().lines() {
        let line = line.map_err(|e| Error::Internal(e.to_string()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let x: f64 = trimmed
            .parse()
            .map_err(|_| Error::InvalidArgument(format!("not a number: {trimmed}")))?;
        if let Some(y) = pipeline.feed_scalar(x)? {
            writeln!(out, "{y}").map_err(|e| Error::Internal(e.to_string()))?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
