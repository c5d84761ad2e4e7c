//! Timed rumble effects.
//!
//! Each force-feedback capable device owns one [`RumbleController`] and a
//! platform [`Motor`]. `set` starts or replaces the single effect and records
//! an absolute expiry; `tick`, run at the start of every backend poll, stops the
//! motor once that expiry has passed. Expiry is therefore only as prompt as the
//! caller's poll cadence.

use crate::error::Result;

/// Platform motor pair.
pub trait Motor {
    /// Start or update the effect. Magnitudes are full-scale `u16`.
    fn start(&mut self, strong: u16, weak: u16, duration_ms: u32) -> Result<()>;

    fn stop(&mut self) -> Result<()>;
}

/// Convert a `[0, 1]` amplitude to a full-scale magnitude. Out-of-range and
/// NaN inputs are clamped.
pub fn magnitude(amplitude: f64) -> u16 {
    if amplitude.is_nan() {
        return 0;
    }
    (amplitude.clamp(0.0, 1.0) * u16::MAX as f64).round() as u16
}

/// Expiry bookkeeping for one device.
#[derive(Debug)]
pub struct RumbleController {
    max_duration_ms: u32,
    expiry_ms: Option<i64>,
}

impl RumbleController {
    /// `max_duration_ms` is the longest effect the platform can represent;
    /// requests are clamped to it.
    pub fn new(max_duration_ms: u32) -> Self {
        Self {
            max_duration_ms,
            expiry_ms: None,
        }
    }

    /// Start, update or stop the effect.
    ///
    /// A non-positive duration or two zero amplitudes stops any active effect
    /// and succeeds. Returns `false` only when the motor rejects the command.
    pub fn set<M: Motor + ?Sized>(
        &mut self,
        motor: &mut M,
        strong: f64,
        weak: f64,
        duration_ms: i32,
        now_ms: i64,
    ) -> bool {
        let (strong, weak) = (magnitude(strong), magnitude(weak));
        if duration_ms <= 0 || (strong == 0 && weak == 0) {
            return self.stop(motor);
        }

        let duration = (duration_ms as u32).min(self.max_duration_ms);
        match motor.start(strong, weak, duration) {
            Ok(()) => {
                self.expiry_ms = Some(now_ms.saturating_add(duration as i64));
                true
            }
            Err(e) => {
                log::warn!("rumble start failed: {e}");
                false
            }
        }
    }

    /// Stop the motor if the effect has expired. Returns `true` when a stop
    /// command was issued.
    pub fn tick<M: Motor + ?Sized>(&mut self, motor: &mut M, now_ms: i64) -> bool {
        match self.expiry_ms {
            Some(expiry) if now_ms >= expiry => {
                self.expiry_ms = None;
                if let Err(e) = motor.stop() {
                    log::warn!("rumble stop failed: {e}");
                }
                true
            }
            _ => false,
        }
    }

    /// Stop immediately and clear the expiry.
    pub fn stop<M: Motor + ?Sized>(&mut self, motor: &mut M) -> bool {
        self.expiry_ms = None;
        match motor.stop() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("rumble stop failed: {e}");
                false
            }
        }
    }

    pub fn expiry_ms(&self) -> Option<i64> {
        self.expiry_ms
    }

    pub fn is_active(&self) -> bool {
        self.expiry_ms.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;

    #[derive(Default)]
    struct Recorder {
        log: Vec<String>,
        fail: bool,
    }

    impl Motor for Recorder {
        fn start(&mut self, strong: u16, weak: u16, duration_ms: u32) -> Result<()> {
            if self.fail {
                return Err(BackendError::Unsupported("rumble"));
            }
            self.log.push(format!("start {strong} {weak} {duration_ms}"));
            Ok(())
        }

        fn stop(&mut self) -> Result<()> {
            self.log.push("stop".into());
            Ok(())
        }
    }

    #[test]
    fn stops_on_first_tick_at_or_after_expiry() {
        let mut motor = Recorder::default();
        let mut rc = RumbleController::new(u16::MAX as u32);
        assert!(rc.set(&mut motor, 1.0, 1.0, 50, 1000));
        assert_eq!(rc.expiry_ms(), Some(1050));

        assert!(!rc.tick(&mut motor, 1049));
        assert_eq!(motor.log, vec!["start 65535 65535 50"]);
        assert!(rc.tick(&mut motor, 1050));
        assert_eq!(motor.log.last().map(String::as_str), Some("stop"));
        assert!(!rc.tick(&mut motor, 2000));
        assert_eq!(motor.log.len(), 2);
    }

    #[test]
    fn zero_request_stops_and_succeeds() {
        let mut motor = Recorder::default();
        let mut rc = RumbleController::new(1000);
        rc.set(&mut motor, 0.5, 0.0, 100, 0);
        assert!(rc.set(&mut motor, 0.0, 0.0, 100, 10));
        assert!(!rc.is_active());
        assert!(rc.set(&mut motor, 1.0, 1.0, 0, 10));
        assert!(rc.set(&mut motor, 1.0, 1.0, -5, 10));
        assert_eq!(motor.log.iter().filter(|l| *l == "stop").count(), 3);
    }

    #[test]
    fn duration_is_clamped_to_platform_maximum() {
        let mut motor = Recorder::default();
        let mut rc = RumbleController::new(u16::MAX as u32);
        rc.set(&mut motor, 0.25, 2.0, i32::MAX, 0);
        assert_eq!(motor.log, vec!["start 16384 65535 65535"]);
        assert_eq!(rc.expiry_ms(), Some(65535));
    }

    #[test]
    fn motor_failure_reports_false() {
        let mut motor = Recorder { fail: true, ..Default::default() };
        let mut rc = RumbleController::new(100);
        assert!(!rc.set(&mut motor, 1.0, 1.0, 50, 0));
        assert!(!rc.is_active());
    }

    #[test]
    fn magnitude_clamps() {
        assert_eq!(magnitude(-1.0), 0);
        assert_eq!(magnitude(f64::NAN), 0);
        assert_eq!(magnitude(1.5), u16::MAX);
    }
}
