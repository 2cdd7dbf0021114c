//! Headless simulation sandbox.
//!
//! Usage: `sandbox <rope|fluid> [scenario.json] [frames]`
//!
//! Without a scenario file the built-in defaults are used. Set `RUST_LOG=info`
//! (or `debug`) to see per-frame metrics.

use std::path::Path;

use sandbox::{FluidRunner, FrameMetrics, RopeRunner, RunSummary, SandboxError, Scenario};

const USAGE: &str = "usage: sandbox <rope|fluid> [scenario.json] [frames]";

enum Mode {
    Rope,
    Fluid,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let mode = match args.get(1).map(String::as_str) {
        Some("rope") => Mode::Rope,
        Some("fluid") => Mode::Fluid,
        _ => return Err(SandboxError::Usage(USAGE.to_string()).into()),
    };

    let scenario = match args.get(2) {
        Some(path) => Scenario::load_json(Path::new(path))?,
        None => Scenario::default(),
    };
    let frames = match args.get(3) {
        Some(text) => text
            .parse::<u32>()
            .map_err(|_| SandboxError::Usage(format!("invalid frame count '{}'\n{}", text, USAGE)))?,
        None => scenario.frames,
    };

    log::info!("Running scenario '{}' for {} frames", scenario.name, frames);
    let exec = scenario.threading.executor()?;
    log::info!("Executor: {:?} ({} threads)", exec, exec.thread_count());

    let summary = match mode {
        Mode::Rope => {
            let mut runner = RopeRunner::new(&scenario.rope, exec)?;
            run_frames(frames, scenario.log_interval, || runner.step())?
        }
        Mode::Fluid => {
            let mut runner = FluidRunner::new(&scenario.fluid, exec)?;
            run_frames(frames, scenario.log_interval, || runner.step())?
        }
    };

    println!(
        "{} frames, {:.2} ms/frame, peak speed {:.3}, unhealthy frames {}",
        summary.frames,
        summary.mean_step_ms(),
        summary.peak_speed,
        summary.unhealthy_frames
    );
    println!("last: {}", summary.last);
    Ok(())
}

fn run_frames<F>(frames: u32, log_interval: u32, mut step: F) -> Result<RunSummary, SandboxError>
where
    F: FnMut() -> Result<FrameMetrics, SandboxError>,
{
    let mut summary = RunSummary::default();
    for frame in 0..frames {
        let metrics = step()?;
        if !metrics.is_healthy() {
            log::warn!("{}", metrics);
        } else if log_interval > 0 && frame % log_interval == 0 {
            log::info!("{}", metrics);
        }
        summary.record(&metrics);
    }
    Ok(summary)
}
