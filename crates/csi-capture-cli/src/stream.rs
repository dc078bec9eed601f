// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use crate::metrics::MetricsCollector;
use crate::pipeline::PipelineArgs;
use crate::utils;
use clap::Args as ClapArgs;
use csi_capture::{BufferState, CaptureCoordinator, CompletedBuffer, FormatRequest, FrameBuffer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Base bus address of the simulated buffer pool
const POOL_BASE: u64 = 0x4000_0000;
const PAGE_SIZE: u64 = 4096;

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Pixel format FOURCC
    #[arg(long, default_value = "YUYV")]
    format: String,

    /// Resolution in WxH format
    #[arg(short, long, default_value = "1280x720")]
    resolution: String,

    /// Number of capture buffers
    #[arg(short, long, default_value = "4")]
    buffers: u32,

    /// Simulated frame rate
    #[arg(short = 'F', long, default_value = "30")]
    fps: u32,

    /// Number of frames to capture (0=unlimited)
    #[arg(short, long, default_value = "0")]
    frames: u64,

    /// Time each buffer is held before being queued again, in milliseconds
    #[arg(long, default_value = "0")]
    hold_ms: u64,

    /// Fail if no frame arrives for this many seconds
    #[arg(long, default_value = "5")]
    timeout: u64,

    /// Print capture metrics on exit
    #[arg(long)]
    metrics: bool,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

type Delivery = (CompletedBuffer, Instant);

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    log::debug!("Stream parameters: {:?}", args);

    let fourcc = utils::parse_fourcc(&args.format)?;
    let (width, height) = utils::parse_resolution(&args.resolution)?;
    if args.buffers == 0 {
        return Err(CliError::InvalidArgs("At least one buffer is required".to_string()));
    }
    if args.fps == 0 {
        return Err(CliError::InvalidArgs("Frame rate must be positive".to_string()));
    }

    let term = utils::install_signal_handler()?;

    let (tx, rx) = mpsc::channel::<Delivery>();
    let csi = Arc::new(args.pipeline.build(move |buf: CompletedBuffer| {
        let _ = tx.send((buf, Instant::now()));
    })?);

    let pix = csi.set_format(&FormatRequest::new(width, height, fourcc))?;
    log::info!("Capture format: {}", pix);

    let size = pix.sizeimage as usize;
    let stride = (u64::from(pix.sizeimage) + PAGE_SIZE - 1) & !(PAGE_SIZE - 1);
    for index in 0..args.buffers {
        let addr = POOL_BASE + u64::from(index) * stride;
        csi.submit(FrameBuffer::new(index, addr, size))?;
    }

    csi.start_streaming()?;
    log::info!(
        "Streaming {} at {} fps with {} buffers (Ctrl+C to stop)...",
        csi.current_format()
            .map(|f| f.to_string())
            .unwrap_or_default(),
        args.fps,
        args.buffers
    );

    let running = Arc::new(AtomicBool::new(true));
    let interrupts = spawn_interrupts(Arc::clone(&csi), Arc::clone(&running), args.fps)?;

    let mut metrics = MetricsCollector::new();
    let outcome = capture(&csi, &rx, &args, &term, &mut metrics);

    running.store(false, Ordering::Relaxed);
    if interrupts.join().is_err() {
        log::warn!("Interrupt thread panicked");
    }

    csi.stop_streaming()?;
    metrics.record_stats(csi.stats());
    let released = csi.release_buffers()?;
    let returned = rx
        .try_iter()
        .filter(|(buf, _)| buf.state == BufferState::Error)
        .count();
    log::debug!("Released {} buffer(s), {} returned", released, returned);
    csi.cleanup()?;

    if term.load(Ordering::Relaxed) {
        log::info!("Received Ctrl+C, stopped");
    }
    let frames = outcome?;
    log::info!("Captured {} frames total", frames);

    if json {
        metrics
            .print_json()
            .map_err(|e| CliError::General(format!("Failed to output JSON metrics: {}", e)))?;
    } else if args.metrics {
        metrics.print_text();
    }

    Ok(())
}

/// Simulated frame-complete interrupt source ticking at `fps`.
fn spawn_interrupts(
    csi: Arc<CaptureCoordinator>,
    running: Arc<AtomicBool>,
    fps: u32,
) -> Result<thread::JoinHandle<()>, CliError> {
    let period = Duration::from_secs(1) / fps;
    thread::Builder::new()
        .name("csi-irq".to_string())
        .spawn(move || {
            while running.load(Ordering::Relaxed) {
                thread::sleep(period);
                let event = csi.on_frame_complete();
                log::trace!("Interrupt: {:?}", event);
            }
        })
        .map_err(|e| CliError::General(format!("Failed to start interrupt thread: {}", e)))
}

/// Consumes finished buffers and queues them again until the frame limit,
/// Ctrl+C or the timeout.
fn capture(
    csi: &CaptureCoordinator,
    rx: &Receiver<Delivery>,
    args: &Args,
    term: &AtomicBool,
    metrics: &mut MetricsCollector,
) -> Result<u64, CliError> {
    let max_frames = if args.frames == 0 {
        u64::MAX
    } else {
        args.frames
    };
    let timeout = Duration::from_secs(args.timeout);
    let hold = Duration::from_millis(args.hold_ms);

    let mut frame_count = 0u64;
    let mut last_frame = Instant::now();

    while frame_count < max_frames && !term.load(Ordering::Relaxed) {
        let (done, delivered) = match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(delivery) => delivery,
            Err(RecvTimeoutError::Timeout) => {
                if last_frame.elapsed() > timeout {
                    return Err(CliError::Timeout(format!(
                        "No frame received in {} s",
                        args.timeout
                    )));
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if done.state == BufferState::Done {
            frame_count += 1;
            last_frame = Instant::now();
            metrics.record_latency_us(delivered.elapsed().as_micros() as u64);
            metrics.record_bytes(done.buffer.length as u64);
            metrics.track_sequence(done.sequence);
            log::trace!(
                "Frame {} in buffer {}",
                done.sequence,
                done.buffer.index
            );
        }

        if !hold.is_zero() {
            thread::sleep(hold);
        }
        csi.submit(done.buffer)?;

        if frame_count % 30 == 0 {
            log::debug!("Captured {} frames, {:?}", frame_count, csi.stats());
        }
    }

    Ok(frame_count)
}
