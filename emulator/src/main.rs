mod session;

use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use session::SessionOptions;
use sweep_core::config::MeasurementConfig;
use sweep_core::measurement::TimeoutPolicy;
use sweep_core::sweep::{SweepAxis, SweepPlan};

/// Completion timeout applied unless `--timeout-ms` says otherwise.
const DEFAULT_TIMEOUT_MS: u32 = 5_000;

const USAGE: &str = "Usage: sweep-emulator [--analog] [--samples <n>] \
[--payload <min:max:step>] [--retries <min:max:step>] [--interval <min:max:step>] \
[--seed <n>] [--reject-rate <0..1>] [--drop-rate <0..1>] [--timeout-ms <ms|0>] \
[--transcript <path>]";

fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let options = parse_options(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let report = session::run(&options)?;

    let stdout = io::stdout();
    let mut writer = stdout.lock();
    for line in &report.lines {
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;

    let progress = report.progress;
    log::info!(
        "finished={} elapsed={}ms rows={} transmissions={} rejections={} timeouts={} stale={}",
        report.finished,
        report.elapsed_ms,
        progress.rows_emitted,
        progress.transmissions,
        progress.rejections,
        progress.timeouts,
        progress.stale_completions
    );

    if !report.finished {
        process::exit(1);
    }
    Ok(())
}

fn parse_options<I>(args: I) -> Result<SessionOptions, String>
where
    I: IntoIterator<Item = String>,
{
    let mut config = MeasurementConfig::DEFAULT;
    let mut payload = *config.plan.payload();
    let mut retries = *config.plan.retry_count();
    let mut interval = *config.plan.retry_interval();
    let mut timeout_ms = DEFAULT_TIMEOUT_MS;
    let mut analog = false;
    let mut seed = None;
    let mut reject_rate = 0.0;
    let mut drop_rate = 0.0;
    let mut transcript = None;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };
        if flag == "--analog" {
            analog = true;
            continue;
        }

        let value = match inline {
            Some(value) => value,
            None => args
                .next()
                .ok_or_else(|| format!("Expected value after {flag}"))?,
        };
        match flag.as_str() {
            "--samples" => {
                config = config.with_samples(parse_number(&flag, &value)?);
            }
            "--payload" => payload = parse_axis(&flag, &value)?,
            "--retries" => retries = parse_axis(&flag, &value)?,
            "--interval" => interval = parse_axis(&flag, &value)?,
            "--seed" => seed = Some(parse_number(&flag, &value)?),
            "--reject-rate" => reject_rate = parse_rate(&flag, &value)?,
            "--drop-rate" => drop_rate = parse_rate(&flag, &value)?,
            "--timeout-ms" => timeout_ms = parse_number(&flag, &value)?,
            "--transcript" => transcript = Some(PathBuf::from(value)),
            other => return Err(format!("Unknown option `{other}`")),
        }
    }

    let plan = SweepPlan::new(payload, retries, interval).map_err(|err| err.to_string())?;
    config = config.with_plan(plan);
    if timeout_ms > 0 {
        config = config.with_completion_timeout(timeout_ms, TimeoutPolicy::Reissue);
    }

    let mut options = SessionOptions::new(config);
    options.analog = analog;
    options.reject_rate = reject_rate;
    options.drop_rate = drop_rate;
    options.transcript = transcript;
    if let Some(seed) = seed {
        options.seed = seed;
    }
    Ok(options)
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("Invalid value `{value}` for {flag}"))
}

fn parse_rate(flag: &str, value: &str) -> Result<f64, String> {
    let rate: f64 = parse_number(flag, value)?;
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(format!("{flag} must be between 0 and 1, got {value}"))
    }
}

fn parse_axis<T>(flag: &str, value: &str) -> Result<SweepAxis<T>, String>
where
    T: sweep_core::sweep::AxisValue + std::str::FromStr,
{
    let mut parts = value.split(':');
    let (Some(min), Some(max), Some(step), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(format!("{flag} expects min:max:step, got `{value}`"));
    };
    SweepAxis::new(
        parse_number(flag, min)?,
        parse_number(flag, max)?,
        parse_number(flag, step)?,
    )
    .map_err(|err| format!("{flag}: {err}"))
}
