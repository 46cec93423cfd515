use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local};
use tokio::time::{Duration, Instant};
use tracing::debug;

use crate::error::DecodeError;
use crate::frame::{self, DecodedMeasurement, MeterVariant};

const SECONDS_PER_HOUR: f64 = 3600.0;

/// A decoded measurement together with the running totals of its session.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub timestamp: DateTime<Local>,
    /// 1 for the first record of a session
    pub log_number: u64,
    pub measurement: DecodedMeasurement,
    /// Integrated capacity in mAh, pinned at -1 once an AC frame is seen
    pub session_total_capacity_mah: f64,
    /// Integrated energy in Wh
    pub session_total_energy_wh: f64,
}

impl EnrichedRecord {
    pub fn is_first(&self) -> bool {
        self.log_number == 1
    }
}

/// Snapshot of when the last frame was accepted.
///
/// Cloning hands out a view onto the same timestamp. Only the owning
/// [`SessionState`] advances it; every other holder just reads.
#[derive(Debug, Clone)]
pub struct LastRead {
    origin: Instant,
    // Milliseconds after `origin` plus one, zero meaning "never".
    millis: Arc<AtomicU64>,
}

impl LastRead {
    fn new() -> Self {
        Self { origin: Instant::now(), millis: Arc::new(AtomicU64::new(0)) }
    }

    /// When the session (and its subscription) started.
    pub fn origin(&self) -> Instant {
        self.origin
    }

    /// When the last frame was accepted, if any was.
    pub fn get(&self) -> Option<Instant> {
        match self.millis.load(Ordering::Acquire) {
            0 => None,
            v => Some(self.origin + Duration::from_millis(v - 1)),
        }
    }

    fn mark(&self) {
        let elapsed = self.origin.elapsed().as_millis() as u64;
        self.millis.store(elapsed + 1, Ordering::Release);
    }
}

/// Running state of one subscribed connection.
///
/// Fed one notification at a time, in arrival order.
#[derive(Debug)]
pub struct SessionState {
    session_start: DateTime<Local>,
    log_number: u64,
    total_capacity_mah: f64,
    total_energy_wh: f64,
    last_read: LastRead,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            session_start: Local::now(),
            log_number: 0,
            total_capacity_mah: 0.0,
            total_energy_wh: 0.0,
            last_read: LastRead::new(),
        }
    }

    pub fn session_start(&self) -> DateTime<Local> {
        self.session_start
    }

    /// Number of frames processed so far.
    pub fn log_number(&self) -> u64 {
        self.log_number
    }

    pub fn total_capacity_mah(&self) -> f64 {
        self.total_capacity_mah
    }

    pub fn total_energy_wh(&self) -> f64 {
        self.total_energy_wh
    }

    /// A read-only view of the last-read timestamp for the liveness watchdog.
    pub fn last_read(&self) -> LastRead {
        self.last_read.clone()
    }

    /// Decode a frame and fold it into the session totals.
    ///
    /// Each frame is taken to represent one second of load. A frame that fails to
    /// decode leaves the state untouched, including the last-read timestamp.
    pub fn process(&mut self, raw: &[u8]) -> Result<EnrichedRecord, DecodeError> {
        let measurement = frame::decode(raw)?;

        if measurement.variant == MeterVariant::AcMeter {
            if self.total_capacity_mah >= 0.0 {
                debug!("AC meter frame seen, session capacity not applicable");
            }
            self.total_capacity_mah = frame::NOT_APPLICABLE as f64;
        } else if self.total_capacity_mah >= 0.0 {
            self.total_capacity_mah += measurement.current_ma as f64 / SECONDS_PER_HOUR;
        }
        self.total_energy_wh += measurement.power_w / SECONDS_PER_HOUR;

        self.last_read.mark();
        self.log_number += 1;

        Ok(EnrichedRecord {
            timestamp: Local::now(),
            log_number: self.log_number,
            measurement,
            session_total_capacity_mah: self.total_capacity_mah,
            session_total_energy_wh: self.total_energy_wh,
        })
    }

    /// Refresh liveness for a payload that is passed through undecoded.
    pub fn touch(&self) {
        self.last_read.mark();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{ac_frame, dc_frame};

    #[test]
    fn test_dc_totals_accumulate() {
        let mut state = SessionState::new();
        let frame = dc_frame(0x000140, 0x0001f4, 0);

        let first = state.process(&frame).unwrap();
        assert!(first.is_first());
        assert_eq!(first.measurement.power_w, 16.0);
        assert!((first.session_total_capacity_mah - 0.1389).abs() < 1e-4);
        assert!((first.session_total_energy_wh - 16.0 / 3600.0).abs() < 1e-12);

        let second = state.process(&frame).unwrap();
        assert_eq!(second.log_number, 2);
        assert!(!second.is_first());
        assert!((second.session_total_capacity_mah - 0.2778).abs() < 1e-4);
        assert!((second.session_total_energy_wh - 32.0 / 3600.0).abs() < 1e-12);
    }

    #[test]
    fn test_dc_capacity_is_sum_of_currents() {
        let mut state = SessionState::new();
        let currents = [0u32, 120, 500, 1750, 9999, 3];
        let mut last = None;
        for &current in &currents {
            last = Some(state.process(&dc_frame(50, current, 0)).unwrap());
        }
        let expected: f64 = currents.iter().map(|&c| c as f64 / 3600.0).sum();
        let last = last.unwrap();
        assert!((last.session_total_capacity_mah - expected).abs() < 1e-9);
        assert_eq!(last.log_number, currents.len() as u64);
    }

    #[test]
    fn test_ac_session_capacity_pinned() {
        let mut state = SessionState::new();
        for power in [0u32, 10, 2300] {
            let record = state.process(&ac_frame(2300, 1000, power)).unwrap();
            assert_eq!(record.measurement.capacity_mah, -1);
            assert_eq!(record.session_total_capacity_mah, -1.0);
        }
        assert!((state.total_energy_wh() - 231.0 / 3600.0).abs() < 1e-9);

        // stays pinned even if a DC frame slips in afterwards
        let record = state.process(&dc_frame(120, 500, 0)).unwrap();
        assert_eq!(record.session_total_capacity_mah, -1.0);
    }

    #[test]
    fn test_energy_non_decreasing() {
        let mut state = SessionState::new();
        let mut previous = 0.0;
        for (voltage, current) in [(120, 0), (120, 300), (0, 300), (245, 4000)] {
            let record = state.process(&dc_frame(voltage, current, 0)).unwrap();
            assert!(record.session_total_energy_wh >= previous);
            previous = record.session_total_energy_wh;
        }
    }

    #[test]
    fn test_failed_decode_leaves_state_untouched() {
        let mut state = SessionState::new();
        state.process(&dc_frame(120, 500, 0)).unwrap();
        let last_read = state.last_read().get();
        let capacity = state.total_capacity_mah();

        assert!(state.process(&[0u8; 10]).is_err());
        assert_eq!(state.log_number(), 1);
        assert_eq!(state.total_capacity_mah(), capacity);
        assert_eq!(state.last_read().get(), last_read);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_read_tracks_successful_frames() {
        let mut state = SessionState::new();
        let last_read = state.last_read();
        assert_eq!(last_read.get(), None);

        tokio::time::advance(Duration::from_secs(3)).await;
        state.process(&dc_frame(120, 500, 0)).unwrap();
        assert_eq!(last_read.get(), Some(last_read.origin() + Duration::from_secs(3)));

        tokio::time::advance(Duration::from_secs(2)).await;
        let _ = state.process(&[0u8; 4]);
        assert_eq!(last_read.get(), Some(last_read.origin() + Duration::from_secs(3)));

        state.touch();
        assert_eq!(last_read.get(), Some(last_read.origin() + Duration::from_secs(5)));
    }
}
