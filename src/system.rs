//! Sound system wiring
//!
//! Owns one interpreter, one sound chip, one framer and one sample pipeline.
//! Nothing is global, so several systems can run side by side.
//!
//! The interpreter context advances the CPU by the machine cycles that fit in
//! one output sample, then clocks the pipeline exactly `divisor` times so that
//! one sample lands in the FIFO. [`SoundSystem::run_samples`] does this on the
//! calling thread; [`SoundSystem::spawn`] moves it to a paced worker thread.

use crate::ay38910::Ay38910;
use crate::bus::{BusTrace, PeripheralBridge};
use crate::config::SystemConfig;
use crate::cpu::{Cpu8051, CpuState};
use crate::protocol::{CommandFramer, ProtocolStats};
use crate::streaming::{PlaybackStats, SampleFifo, SamplePipeline};
use crate::{Ay8051Error, Result};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Samples produced per outer loop iteration of the worker thread
const WORKER_BATCH: usize = 256;

/// How far the worker may run ahead of the wall clock before sleeping
const MAX_LEAD: Duration = Duration::from_millis(20);

/// Host-to-board serial line
///
/// Any thread may queue bytes; the interpreter context takes them one at a
/// time at the configured baud spacing.
#[derive(Debug, Default)]
pub struct SerialInput {
    queue: Mutex<VecDeque<u8>>,
}

impl SerialInput {
    /// Empty line
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one byte
    pub fn push(&self, byte: u8) {
        self.queue.lock().push_back(byte);
    }

    /// Queue several bytes in order
    pub fn extend(&self, bytes: &[u8]) {
        self.queue.lock().extend(bytes.iter().copied());
    }

    /// Take the oldest queued byte
    pub fn pop(&self) -> Option<u8> {
        self.queue.lock().pop_front()
    }

    /// Bytes still waiting
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct SystemReport {
    /// Samples produced (dropped ones included)
    pub samples: u64,
    /// Final register snapshot
    pub cpu: CpuState,
    /// Decode fault that stopped the interpreter, if any
    pub fault: Option<String>,
    /// Framer and dispatch counters
    pub protocol: ProtocolStats,
    /// FIFO counters
    pub playback: PlaybackStats,
}

impl std::fmt::Display for SystemReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "samples:   {}", self.samples)?;
        writeln!(f, "cpu:       {}", self.cpu)?;
        writeln!(
            f,
            "protocol:  {} frames, {} dispatched, {} rejected",
            self.protocol.frames,
            self.protocol.dispatched,
            self.protocol.unknown_commands
                + self.protocol.invalid_channels
                + self.protocol.short_payloads
        )?;
        write!(
            f,
            "fifo:      {} dropped, {} underruns",
            self.playback.dropped, self.playback.underruns
        )?;
        if let Some(fault) = &self.fault {
            write!(f, "\nfault:     {}", fault)?;
        }
        Ok(())
    }
}

/// Interpreter, chip and pipeline wired together
pub struct SoundSystem {
    config: SystemConfig,
    cpu: Cpu8051,
    chip: Arc<Mutex<Ay38910>>,
    framer: Arc<CommandFramer>,
    fifo: Arc<SampleFifo>,
    pipeline: SamplePipeline,
    serial: Arc<SerialInput>,
    cycles_per_sample: f64,
    cycle_debt: f64,
    next_serial_cycle: u64,
    samples: u64,
}

impl SoundSystem {
    /// Build a system from a validated configuration
    pub fn new(config: SystemConfig) -> Result<Self> {
        config.validate()?;

        let chip = Arc::new(Mutex::new(Ay38910::with_clock(config.master_clock_hz)));
        let framer = Arc::new(CommandFramer::new());
        let fifo = Arc::new(SampleFifo::new(config.fifo_capacity)?);

        let mut bridge = PeripheralBridge::new(Box::new(Arc::clone(&chip)), Arc::clone(&framer));
        bridge.set_dispatch_frames(config.dispatch_frames);

        let pipeline = SamplePipeline::new(
            Arc::clone(&chip),
            Arc::clone(&fifo),
            config.master_clock_hz,
            config.sample_rate,
        );

        debug!(
            "sound system: {} Hz chip, {} Hz output, divisor {}, {:.2} machine cycles/sample",
            config.master_clock_hz,
            config.sample_rate,
            pipeline.divisor(),
            config.machine_cycles_per_sample()
        );

        Ok(SoundSystem {
            cycles_per_sample: config.machine_cycles_per_sample(),
            config,
            cpu: Cpu8051::with_bridge(bridge),
            chip,
            framer,
            fifo,
            pipeline,
            serial: Arc::new(SerialInput::new()),
            cycle_debt: 0.0,
            next_serial_cycle: 0,
            samples: 0,
        })
    }

    /// Load a firmware image at address 0
    pub fn load_firmware(&mut self, image: &[u8]) -> Result<()> {
        self.cpu.load_firmware(image, 0)?;
        info!("firmware loaded: {} bytes", image.len());
        Ok(())
    }

    /// Queue bytes on the serial line
    pub fn send_bytes(&self, bytes: &[u8]) {
        self.serial.extend(bytes);
    }

    /// Shared handle to the serial line
    pub fn serial_input(&self) -> Arc<SerialInput> {
        Arc::clone(&self.serial)
    }

    /// Configuration in use
    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Command framer
    pub fn framer(&self) -> &Arc<CommandFramer> {
        &self.framer
    }

    /// Sample FIFO
    pub fn fifo(&self) -> &Arc<SampleFifo> {
        &self.fifo
    }

    /// Sound chip
    pub fn chip(&self) -> &Arc<Mutex<Ay38910>> {
        &self.chip
    }

    /// Interpreter
    pub fn cpu(&self) -> &Cpu8051 {
        &self.cpu
    }

    /// Interpreter (mutable)
    pub fn cpu_mut(&mut self) -> &mut Cpu8051 {
        &mut self.cpu
    }

    /// Samples produced so far
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Start recording bus cycles
    pub fn enable_trace(&mut self, capacity: usize) {
        self.cpu.bridge_mut().enable_trace(capacity);
    }

    /// Stop recording bus cycles and return them
    pub fn take_trace(&mut self) -> Option<BusTrace> {
        self.cpu.bridge_mut().take_trace()
    }

    /// Reset interpreter and chip, discard queued serial bytes and samples
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.chip.lock().reset();
        self.framer.reset();
        while self.serial.pop().is_some() {}
        self.fifo.flush();
        self.cycle_debt = 0.0;
        self.next_serial_cycle = 0;
    }

    fn deliver_serial(&mut self) {
        if self.cpu.cycles() < self.next_serial_cycle {
            return;
        }
        if let Some(byte) = self.serial.pop() {
            self.cpu.uart_receive(byte);
            self.next_serial_cycle = self.cpu.cycles() + self.config.serial_byte_cycles as u64;
        }
    }

    /// Run the interpreter for one sample period, then clock the chip once
    /// per divisor tick so exactly one sample is produced.
    pub fn step_sample(&mut self) -> Result<()> {
        self.cycle_debt += self.cycles_per_sample;
        while self.cycle_debt > 0.0 {
            self.deliver_serial();
            let spent = self.cpu.step()?;
            self.cycle_debt -= spent as f64;
        }

        for _ in 0..self.pipeline.divisor() {
            self.pipeline.clock();
        }
        self.samples += 1;
        Ok(())
    }

    /// Headless run of exactly `count` samples
    pub fn run_samples(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            self.step_sample()?;
        }
        Ok(())
    }

    /// Headless render of `count` samples. The FIFO is drained as it fills,
    /// so nothing is dropped regardless of its capacity.
    pub fn render(&mut self, count: usize) -> Result<Vec<f32>> {
        self.fifo.flush();
        let mut out = Vec::with_capacity(count);
        let mut block = vec![0.0; self.fifo.capacity()];
        while out.len() < count {
            let chunk = (count - out.len()).min(block.len());
            self.run_samples(chunk)?;
            let read = self.fifo.read(&mut block[..chunk]);
            out.extend_from_slice(&block[..read]);
        }
        Ok(out)
    }

    /// Snapshot of the counters
    pub fn report(&self) -> SystemReport {
        SystemReport {
            samples: self.samples,
            cpu: self.cpu.state(),
            fault: self
                .cpu
                .fault()
                .map(|(pc, opcode)| Ay8051Error::UndefinedOpcode { pc, opcode }.to_string()),
            protocol: self.framer.stats(),
            playback: self.fifo.stats(),
        }
    }

    /// Move the interpreter context to a worker thread paced by the wall
    /// clock. The worker never waits on the FIFO consumer.
    pub fn spawn(self) -> Result<RunningSystem> {
        let running = Arc::new(AtomicBool::new(true));
        let serial = Arc::clone(&self.serial);
        let fifo = Arc::clone(&self.fifo);
        let chip = Arc::clone(&self.chip);
        let framer = Arc::clone(&self.framer);

        let running_clone = Arc::clone(&running);
        let handle = std::thread::Builder::new()
            .name("ay8051-interpreter".into())
            .spawn(move || run_worker(self, running_clone))?;

        Ok(RunningSystem {
            handle: Some(handle),
            running,
            serial,
            fifo,
            chip,
            framer,
        })
    }
}

impl std::fmt::Debug for SoundSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundSystem")
            .field("config", &self.config)
            .field("cpu", &self.cpu)
            .field("samples", &self.samples)
            .finish_non_exhaustive()
    }
}

/// How long the worker should sleep after producing `produced` samples,
/// given the wall-clock time elapsed since it started
fn pacing_delay(produced: u64, sample_rate: u32, elapsed: Duration) -> Option<Duration> {
    let due = Duration::from_secs_f64(produced as f64 / sample_rate as f64);
    due.checked_sub(elapsed + MAX_LEAD).filter(|d| !d.is_zero())
}

fn run_worker(mut system: SoundSystem, running: Arc<AtomicBool>) -> SystemReport {
    let sample_rate = system.config.sample_rate;
    let start = Instant::now();
    let mut produced: u64 = 0;
    let mut fault = None;

    info!("interpreter thread started");
    while running.load(Ordering::Relaxed) {
        if let Err(err) = system.run_samples(WORKER_BATCH) {
            error!("interpreter stopped: {}", err);
            fault = Some(err.to_string());
            break;
        }
        produced += WORKER_BATCH as u64;

        if let Some(delay) = pacing_delay(produced, sample_rate, start.elapsed()) {
            std::thread::sleep(delay);
        }
    }
    info!("interpreter thread stopped after {} samples", system.samples);
    let playback = system.fifo.stats();
    if playback.dropped > 0 {
        warn!(
            "{} samples dropped on a full FIFO, {} underruns",
            playback.dropped, playback.underruns
        );
    }

    SystemReport {
        fault,
        ..system.report()
    }
}

/// Handle to a sound system running on its worker thread
pub struct RunningSystem {
    handle: Option<JoinHandle<SystemReport>>,
    running: Arc<AtomicBool>,
    serial: Arc<SerialInput>,
    fifo: Arc<SampleFifo>,
    chip: Arc<Mutex<Ay38910>>,
    framer: Arc<CommandFramer>,
}

impl RunningSystem {
    /// Queue bytes on the serial line
    pub fn send_bytes(&self, bytes: &[u8]) {
        self.serial.extend(bytes);
    }

    /// Sample FIFO the worker publishes into
    pub fn fifo(&self) -> &Arc<SampleFifo> {
        &self.fifo
    }

    /// Sound chip
    pub fn chip(&self) -> &Arc<Mutex<Ay38910>> {
        &self.chip
    }

    /// Command framer
    pub fn framer(&self) -> &Arc<CommandFramer> {
        &self.framer
    }

    /// Whether the worker has exited (stop requested or decode fault)
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Request shutdown and wait for the worker
    pub fn stop(mut self) -> Result<SystemReport> {
        self.running.store(false, Ordering::Relaxed);
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| Ay8051Error::Other("interpreter thread panicked".into())),
            None => Err(Ay8051Error::Other("interpreter thread already joined".into())),
        }
    }
}

impl Drop for RunningSystem {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ay38910::Register;

    fn idle_system() -> SoundSystem {
        let mut system = SoundSystem::new(SystemConfig::default()).unwrap();
        // SJMP $
        system.load_firmware(&[0x80, 0xFE]).unwrap();
        system
    }

    #[test]
    fn test_serial_input_order() {
        let line = SerialInput::new();
        line.extend(&[1, 2]);
        line.push(3);
        assert_eq!(line.len(), 3);
        assert_eq!(line.pop(), Some(1));
        assert_eq!(line.pop(), Some(2));
        assert_eq!(line.pop(), Some(3));
        assert!(line.is_empty());
    }

    #[test]
    fn test_run_samples_fills_fifo() {
        let mut system = idle_system();
        system.run_samples(100).unwrap();
        assert_eq!(system.samples(), 100);
        assert_eq!(system.fifo().available_read(), 100);
        // 921600 / 44100 machine cycles per sample
        let expected = (100.0 * 921_600.0 / 44_100.0) as u64;
        let cycles = system.cpu().cycles();
        assert!(cycles >= expected && cycles <= expected + 2, "{cycles}");
    }

    #[test]
    fn test_render_larger_than_fifo() {
        let config = SystemConfig {
            fifo_capacity: 64,
            ..SystemConfig::default()
        };
        let mut system = SoundSystem::new(config).unwrap();
        system.load_firmware(&[0x80, 0xFE]).unwrap();
        let samples = system.render(1000).unwrap();
        assert_eq!(samples.len(), 1000);
        assert_eq!(system.fifo().stats().dropped, 0);
    }

    #[test]
    fn test_serial_bytes_are_paced_and_dispatched() {
        let mut system = idle_system();
        system.send_bytes(&[0xB5, 0xA4, 0x00, 0xDD, 0x01, 0x0F, 0xB0]);

        // Seven bytes at 960 cycles each need about 6720 machine cycles
        system.run_samples(50).unwrap();
        assert!(system.serial_input().len() > 0);

        system.run_samples(400).unwrap();
        assert!(system.serial_input().is_empty());
        let chip = system.chip().lock();
        assert_eq!(chip.tone_period(0), 0x1DD);
        assert_eq!(chip.amplitude(0), 0x0F);
        assert!(chip.mixer().tone_enabled(0));
        drop(chip);
        assert_eq!(system.framer().stats().dispatched, 1);
    }

    #[test]
    fn test_no_dispatch_leaves_chip_to_firmware() {
        let config = SystemConfig {
            dispatch_frames: false,
            ..SystemConfig::default()
        };
        let mut system = SoundSystem::new(config).unwrap();
        system.load_firmware(&[0x80, 0xFE]).unwrap();
        system.send_bytes(&[0xB5, 0xA4, 0x00, 0xDD, 0x01, 0x0F, 0xB0]);
        system.run_samples(500).unwrap();
        assert_eq!(system.framer().stats().frames, 1);
        assert_eq!(system.chip().lock().read_register(Register::AmplitudeA), 0);
    }

    #[test]
    fn test_decode_fault_stops_run() {
        let mut system = SoundSystem::new(SystemConfig::default()).unwrap();
        system.load_firmware(&[0x00, 0xA5]).unwrap();
        assert!(system.run_samples(10).is_err());
        assert!(system.cpu().is_halted());
        assert_eq!(system.cpu().fault(), Some((0x0001, 0xA5)));

        let report = system.report();
        let fault = report.fault.as_ref().expect("halted system reports its fault");
        assert!(fault.contains("0xA5"), "{fault}");
        assert!(fault.contains("PC=0x0001"), "{fault}");
        assert!(report.to_string().contains("fault:"));
    }

    #[test]
    fn test_pacing_delay() {
        // One second of samples after half a second of wall time
        let delay = pacing_delay(44_100, 44_100, Duration::from_millis(500)).unwrap();
        assert_eq!(delay.as_millis(), 480);
        // Behind the clock: no sleep
        assert_eq!(pacing_delay(44_100, 44_100, Duration::from_secs(2)), None);
        assert_eq!(pacing_delay(44_100, 44_100, Duration::from_millis(980)), None);
    }

    #[test]
    fn test_pacing_past_u32_sample_count() {
        // About 27 hours of output at 44.1 kHz
        let produced = u32::MAX as u64 + 44_100;
        let elapsed = Duration::from_secs_f64(u32::MAX as f64 / 44_100.0);
        let delay = pacing_delay(produced, 44_100, elapsed).unwrap();
        approx::assert_abs_diff_eq!(delay.as_secs_f64(), 0.98, epsilon = 1e-3);
    }

    #[test]
    fn test_spawn_and_stop() {
        let system = idle_system();
        let running = system.spawn().unwrap();
        running.send_bytes(&[0xB5, 0xA6, 0xB0]);
        std::thread::sleep(Duration::from_millis(50));
        let _ = running.fifo().take_samples(512);
        let report = running.stop().unwrap();
        assert!(report.samples > 0);
        assert!(report.fault.is_none());
    }

    #[test]
    fn test_spawn_reports_fault() {
        let mut system = SoundSystem::new(SystemConfig::default()).unwrap();
        system.load_firmware(&[0xA5]).unwrap();
        let running = system.spawn().unwrap();
        for _ in 0..100 {
            if running.is_finished() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        let report = running.stop().unwrap();
        assert!(report.fault.unwrap().contains("0xA5"));
    }

    #[test]
    fn test_independent_systems() {
        let mut a = idle_system();
        let mut b = idle_system();
        a.send_bytes(&[0xB5, 0xA4, 0x01, 0x10, 0x00, 0x0A, 0xB0]);
        a.run_samples(500).unwrap();
        b.run_samples(500).unwrap();
        assert_eq!(a.chip().lock().amplitude(1), 0x0A);
        assert_eq!(b.chip().lock().amplitude(1), 0x00);
    }
}
