use std::io;
use std::path::PathBuf;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::SessionOptions;
use sweep_core::config::MeasurementConfig;
use sweep_core::measurement::TimeoutPolicy;

const TRANSCRIPT_DIR: &str = "transcripts";
const COMPLETION_TIMEOUT_MS: u32 = 5_000;

fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    record("emulator-default.log", false)?;
    record("emulator-analog.log", true)?;
    Ok(())
}

fn record(name: &str, analog: bool) -> io::Result<()> {
    let config = MeasurementConfig::DEFAULT
        .with_completion_timeout(COMPLETION_TIMEOUT_MS, TimeoutPolicy::Reissue);
    let mut options = SessionOptions::new(config);
    options.analog = analog;
    let path = PathBuf::from(TRANSCRIPT_DIR).join(name);
    options.transcript = Some(path.clone());

    let report = session::run(&options)?;
    log::info!(
        "{}: {} lines, finished={}",
        path.display(),
        report.lines.len(),
        report.finished
    );
    Ok(())
}
