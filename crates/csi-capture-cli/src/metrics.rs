// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use csi_capture::CaptureStats;
use serde::Serialize;
use std::time::Instant;

/// Capture session metrics
#[derive(Debug, Clone, Serialize)]
pub struct CaptureMetrics {
    /// Buffers returned with a captured frame
    pub frames_completed: u64,
    /// Frame-complete interrupts with no buffer queued
    pub frames_dropped: u64,
    /// Interrupts discarded after stream start
    pub frames_skipped: u64,
    /// Interrupts outside streaming
    pub spurious_interrupts: u64,
    /// Failed DMA address updates
    pub address_errors: u64,
    /// Buffers delivered out of sequence order
    pub out_of_order: u64,
    /// Total bytes captured
    pub bytes_captured: u64,
    /// Total duration in milliseconds
    pub duration_ms: u64,
    /// Average throughput in frames per second
    pub throughput_fps: f64,
    /// Average bandwidth in megabits per second
    pub bandwidth_mbps: f64,
    /// Minimum delivery latency in microseconds
    pub latency_min_us: u64,
    /// Maximum delivery latency in microseconds
    pub latency_max_us: u64,
    /// Average delivery latency in microseconds
    pub latency_avg_us: u64,
    /// 50th percentile (median) delivery latency in microseconds
    pub latency_p50_us: u64,
    /// 95th percentile delivery latency in microseconds
    pub latency_p95_us: u64,
    /// 99th percentile delivery latency in microseconds
    pub latency_p99_us: u64,
}

/// Metrics collector for a capture session
///
/// Delivery latency is the time between the coordinator handing a finished
/// buffer back and the consumer picking it up.
pub struct MetricsCollector {
    start_time: Instant,
    latencies_us: Vec<u64>,
    bytes: u64,
    prev_sequence: Option<u32>,
    out_of_order: u64,
    stats: CaptureStats,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            latencies_us: Vec::new(),
            bytes: 0,
            prev_sequence: None,
            out_of_order: 0,
            stats: CaptureStats::default(),
        }
    }

    /// Record a frame's delivery latency in microseconds
    pub fn record_latency_us(&mut self, latency_us: u64) {
        self.latencies_us.push(latency_us);
    }

    /// Record bytes captured
    pub fn record_bytes(&mut self, bytes: u64) {
        self.bytes += bytes;
    }

    /// Track buffer sequence numbers
    ///
    /// Dropped frames do not advance the sequence, so each buffer must carry
    /// exactly the previous number plus one. Returns false otherwise.
    pub fn track_sequence(&mut self, sequence: u32) -> bool {
        let in_order = match self.prev_sequence {
            Some(prev) => sequence == prev.wrapping_add(1),
            None => true,
        };
        if !in_order {
            log::warn!(
                "Buffer sequence out of order: {:?} -> {}",
                self.prev_sequence,
                sequence
            );
            self.out_of_order += 1;
        }
        self.prev_sequence = Some(sequence);
        in_order
    }

    /// Record the coordinator's completion counters
    pub fn record_stats(&mut self, stats: CaptureStats) {
        self.stats = stats;
    }

    /// Finalize and calculate all metrics
    pub fn finalize(&mut self) -> CaptureMetrics {
        let duration = self.start_time.elapsed();
        let duration_ms = duration.as_millis() as u64;
        let duration_secs = duration.as_secs_f64();

        let frames_completed = self.latencies_us.len() as u64;

        let throughput_fps = if duration_secs > 0.0 {
            frames_completed as f64 / duration_secs
        } else {
            0.0
        };

        let bandwidth_mbps = if duration_secs > 0.0 {
            (self.bytes as f64 * 8.0) / (duration_secs * 1_000_000.0)
        } else {
            0.0
        };

        self.latencies_us.sort_unstable();
        let (min_us, max_us, avg_us) = match (self.latencies_us.first(), self.latencies_us.last())
        {
            (Some(&min), Some(&max)) => {
                let sum: u64 = self.latencies_us.iter().sum();
                (min, max, sum / self.latencies_us.len() as u64)
            }
            _ => (0, 0, 0),
        };

        CaptureMetrics {
            frames_completed,
            frames_dropped: self.stats.dropped,
            frames_skipped: self.stats.skipped,
            spurious_interrupts: self.stats.spurious,
            address_errors: self.stats.address_errors,
            out_of_order: self.out_of_order,
            bytes_captured: self.bytes,
            duration_ms,
            throughput_fps,
            bandwidth_mbps,
            latency_min_us: min_us,
            latency_max_us: max_us,
            latency_avg_us: avg_us,
            latency_p50_us: self.percentile(50.0),
            latency_p95_us: self.percentile(95.0),
            latency_p99_us: self.percentile(99.0),
        }
    }

    /// Calculate percentile from sorted latency data
    /// Assumes self.latencies_us is already sorted
    fn percentile(&self, p: f64) -> u64 {
        if self.latencies_us.is_empty() {
            return 0;
        }

        let len = self.latencies_us.len();
        let idx = ((p / 100.0) * (len - 1) as f64).round() as usize;
        self.latencies_us[idx.min(len - 1)]
    }

    /// Print metrics in human-readable format
    pub fn print_text(&mut self) {
        let metrics = self.finalize();
        println!("\n=== Capture Metrics ===");
        println!("Frames completed:  {}", metrics.frames_completed);
        println!("Frames dropped:    {}", metrics.frames_dropped);
        println!("Frames skipped:    {}", metrics.frames_skipped);
        println!(
            "Bytes captured:    {} ({:.2} MB)",
            metrics.bytes_captured,
            metrics.bytes_captured as f64 / 1_048_576.0
        );
        println!(
            "Duration:          {:.2} s",
            metrics.duration_ms as f64 / 1000.0
        );
        println!("Throughput:        {:.2} fps", metrics.throughput_fps);
        println!("Bandwidth:         {:.2} Mbps", metrics.bandwidth_mbps);

        if metrics.frames_completed > 0 {
            println!("\nDelivery Latency (us):");
            println!("  Min:    {}", metrics.latency_min_us);
            println!("  Max:    {}", metrics.latency_max_us);
            println!("  Avg:    {}", metrics.latency_avg_us);
            println!("  P50:    {}", metrics.latency_p50_us);
            println!("  P95:    {}", metrics.latency_p95_us);
            println!("  P99:    {}", metrics.latency_p99_us);
        }

        if metrics.address_errors > 0 || metrics.out_of_order > 0 {
            println!(
                "\nAddress errors:    {}\nOut of order:      {}",
                metrics.address_errors, metrics.out_of_order
            );
        }
    }

    /// Print metrics in JSON format
    pub fn print_json(&mut self) -> Result<(), serde_json::Error> {
        let metrics = self.finalize();
        let json = serde_json::to_string_pretty(&metrics)?;
        println!("{}", json);
        Ok(())
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
