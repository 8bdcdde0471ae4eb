use anyhow::{bail, Context, Result};
use ay8051::protocol::parse_hex_bytes;
use ay8051::{SoundSystem, SystemConfig};
use log::{LevelFilter, Log, Metadata, Record};
use std::env;
use std::fs;

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5} {}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

const USAGE: &str = "\
Usage:
  ay8051 [options] <firmware.bin>

Options:
  --config <file.json>   Load system configuration
  --seconds <n>          Length of a headless run (default 2)
  --wav <out.wav>        Render headless to a WAV file
  --trace <out.csv>      Record sound-chip bus cycles to CSV (headless only)
  --send <hex>           Queue serial bytes before start, e.g. \"B5 A4 00 DD 01 0F B0\"
  --no-dispatch          Leave command frames to the firmware
  -v, --verbose          More logging (repeat for trace)
  -h, --help             Show this help

Without --wav and with the streaming feature, plays live and reads hex byte
lines from stdin until EOF.";

#[derive(Debug, Default)]
struct CliArgs {
    firmware: Option<String>,
    config: Option<String>,
    seconds: Option<f32>,
    wav: Option<String>,
    trace: Option<String>,
    send: Vec<u8>,
    no_dispatch: bool,
    verbosity: u8,
    help: bool,
}

fn parse_args() -> Result<CliArgs> {
    let mut cli = CliArgs::default();
    let mut args = env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => cli.config = Some(args.next().context("--config requires a path")?),
            "--seconds" => {
                let value = args.next().context("--seconds requires a number")?;
                cli.seconds = Some(
                    value
                        .parse()
                        .with_context(|| format!("invalid --seconds value '{}'", value))?,
                );
            }
            "--wav" => cli.wav = Some(args.next().context("--wav requires a path")?),
            "--trace" => cli.trace = Some(args.next().context("--trace requires a path")?),
            "--send" => {
                let value = args.next().context("--send requires hex bytes")?;
                let bytes = parse_hex_bytes(&value).map_err(anyhow::Error::msg)?;
                cli.send.extend(bytes);
            }
            "--no-dispatch" => cli.no_dispatch = true,
            "-v" | "--verbose" => cli.verbosity += 1,
            "-vv" => cli.verbosity += 2,
            "-h" | "--help" => cli.help = true,
            _ if arg.starts_with('-') => bail!("unknown flag: {}\n\n{}", arg, USAGE),
            _ => cli.firmware = Some(arg),
        }
    }
    Ok(cli)
}

fn init_logging(config: &SystemConfig, verbosity: u8) -> Result<()> {
    let base = config.level_filter()?;
    let level = match verbosity {
        0 => base,
        1 => base.max(LevelFilter::Debug),
        _ => LevelFilter::Trace,
    };
    log::set_logger(&LOGGER).map_err(|e| anyhow::anyhow!("logger already set: {}", e))?;
    log::set_max_level(level);
    Ok(())
}

fn main() -> Result<()> {
    let cli = parse_args()?;
    if cli.help {
        eprintln!("{}", USAGE);
        return Ok(());
    }
    let Some(firmware_path) = cli.firmware.as_deref() else {
        eprintln!("{}", USAGE);
        bail!("no firmware image given");
    };

    let mut config = match &cli.config {
        Some(path) => SystemConfig::load(path)
            .with_context(|| format!("failed to load config '{}'", path))?,
        None => SystemConfig::default(),
    };
    if cli.no_dispatch {
        config.dispatch_frames = false;
    }
    init_logging(&config, cli.verbosity)?;

    let firmware = fs::read(firmware_path)
        .with_context(|| format!("failed to read firmware '{}'", firmware_path))?;

    let mut system = SoundSystem::new(config)?;
    system.load_firmware(&firmware)?;
    system.send_bytes(&cli.send);

    let live = cfg!(feature = "streaming") && cli.wav.is_none() && cli.trace.is_none();
    if live {
        #[cfg(feature = "streaming")]
        return live::run(system);
    }

    run_headless(system, &cli)
}

fn run_headless(mut system: SoundSystem, cli: &CliArgs) -> Result<()> {
    let seconds = cli.seconds.unwrap_or(2.0);
    if cli.trace.is_some() {
        system.enable_trace(1 << 20);
    }

    match &cli.wav {
        #[cfg(feature = "wav-export")]
        Some(path) => {
            ay8051::export::export_to_wav(&mut system, seconds, path)
                .with_context(|| format!("failed to export '{}'", path))?;
            println!("Wrote {}", path);
        }
        #[cfg(not(feature = "wav-export"))]
        Some(_) => bail!("--wav requires the \"wav-export\" feature"),
        None => {
            let count = (seconds.max(0.0) * system.config().sample_rate as f32) as usize;
            system.render(count)?;
        }
    }

    if let Some(path) = &cli.trace {
        save_trace(&mut system, path)?;
    }

    println!("{}", system.report());
    Ok(())
}

#[cfg(feature = "bus-trace")]
fn save_trace(system: &mut SoundSystem, path: &str) -> Result<()> {
    if let Some(trace) = system.take_trace() {
        trace
            .save_csv(path)
            .with_context(|| format!("failed to write trace '{}'", path))?;
        println!("Wrote {} bus events to {}", trace.events().len(), path);
    }
    Ok(())
}

#[cfg(not(feature = "bus-trace"))]
fn save_trace(_system: &mut SoundSystem, _path: &str) -> Result<()> {
    bail!("--trace requires the \"bus-trace\" feature")
}

#[cfg(feature = "streaming")]
mod live {
    use super::*;
    use ay8051::AudioDevice;
    use std::io::{self, BufRead};

    pub fn run(system: SoundSystem) -> Result<()> {
        let stream = system.config().stream_config();
        println!(
            "Playing live ({} Hz, {:.1} ms buffer). Enter hex bytes per line, EOF to quit.",
            stream.sample_rate,
            stream.latency_ms()
        );

        let running = system.spawn()?;
        let device = AudioDevice::new(stream.sample_rate, 2, running.fifo().clone())?;

        for line in io::stdin().lock().lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "quit" || line == "exit" {
                break;
            }
            match parse_hex_bytes(line) {
                Ok(bytes) => running.send_bytes(&bytes),
                Err(err) => eprintln!("ignored: {}", err),
            }
            if running.is_finished() {
                break;
            }
        }

        device.finish();
        let report = running.stop()?;
        println!("{}", report);
        if let Some(fault) = report.fault {
            bail!("interpreter stopped: {}", fault);
        }
        Ok(())
    }
}
