//! Frontend tuning.
//!
//! Tuning sets 8-VSB parameters for the requested carrier, then blocks on the
//! driver's frontend event. The event must not carry the timeout flag and must
//! report exactly the requested frequency. Lock is NOT required: a frontend
//! that settled on the right frequency without `HAS_LOCK` is still returned,
//! and callers that need a lock must poll [`read_signal`] or
//! [`crate::Session::status`] themselves.

use std::path::Path;
use std::time::Duration;

use log::debug;

use crate::control::{self, Command};
use crate::device::{self, open_node, DeviceHandle, DeviceOpener, Node};
use crate::error::TunerError;
use crate::params::{FeStatus, FrontendEvent, FrontendInfo, FrontendParameters};
use crate::station::Station;

/// A frontend handle whose tuning event has been validated.
#[derive(Debug)]
pub struct TunedFrontend<H> {
    handle: H,
    event: FrontendEvent,
}

impl<H: DeviceHandle> TunedFrontend<H> {
    /// The event the driver posted when it settled.
    pub fn event(&self) -> &FrontendEvent {
        &self.event
    }

    pub fn handle_mut(&mut self) -> &mut H {
        &mut self.handle
    }

    pub fn into_handle(self) -> H {
        self.handle
    }
}

/// Open the frontend under `dir` and tune it to `station`.
///
/// With `lock_timeout` set, the frontend is polled for a pending event for at
/// most that long before the blocking event read; otherwise the read blocks
/// for as long as the driver takes. On error the frontend handle is closed.
/// Poll expiry is reported as [`TunerError::EventWaitExpired`].
pub fn tune<O: DeviceOpener>(
    opener: &O,
    dir: &Path,
    station: &Station,
    lock_timeout: Option<Duration>,
) -> Result<TunedFrontend<O::Handle>, TunerError> {
    let mut handle = open_node(opener, dir, Node::Frontend)?;

    match tune_handle(&mut handle, station.frequency, lock_timeout) {
        Ok(event) => Ok(TunedFrontend { handle, event }),
        Err(e) => Err(device::rollback(e, [(Node::Frontend.file_name(), handle)])),
    }
}

fn tune_handle<H: DeviceHandle>(
    handle: &mut H,
    frequency: u32,
    lock_timeout: Option<Duration>,
) -> Result<FrontendEvent, TunerError> {
    debug!("Tuning to {} Hz (8-VSB, inversion auto)", frequency);
    control::set_frontend(handle, FrontendParameters::vsb8(frequency))?;

    if let Some(timeout) = lock_timeout {
        let pending = handle
            .wait_event(timeout)
            .map_err(|source| TunerError::ControlCommand {
                command: Command::GetEvent,
                source,
            })?;
        if !pending {
            debug!("No frontend event within {:?}", timeout);
            return Err(TunerError::EventWaitExpired {
                requested: frequency,
                timeout,
            });
        }
    }

    let event = control::get_event(handle)?;
    debug!(
        "Frontend event: status={}, frequency={}",
        event.status, event.parameters.frequency
    );
    check_event(frequency, &event)?;
    if !event.status.has_lock() {
        debug!("Frontend settled at {} Hz without lock", frequency);
    }
    Ok(event)
}

/// Validate a frontend event against the requested frequency.
pub fn check_event(requested: u32, event: &FrontendEvent) -> Result<(), TunerError> {
    if event.status.timed_out() {
        return Err(TunerError::TuneTimeout { requested });
    }
    if event.parameters.frequency != requested {
        return Err(TunerError::TuneMismatch {
            requested,
            actual: event.parameters.frequency,
        });
    }
    Ok(())
}

/// Open the frontend, read its description and close it again.
///
/// A close failure after a failed get-info is attached to that error as
/// [`TunerError::Rollback`].
pub fn probe<O: DeviceOpener>(opener: &O, dir: &Path) -> Result<FrontendInfo, TunerError> {
    let mut handle = open_node(opener, dir, Node::Frontend)?;
    let info = control::get_info(&mut handle);
    let failures = device::close_all([(Node::Frontend.file_name(), handle)]);
    match info {
        Ok(info) if failures.is_empty() => Ok(info),
        Ok(_) => Err(TunerError::CloseAggregate { failures }),
        Err(e) => Err(e.with_rollback(failures)),
    }
}

/// Snapshot of the frontend's signal measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalReport {
    pub status: FeStatus,
    /// Bit error rate, driver units.
    pub ber: u32,
    /// Signal-to-noise ratio, driver units.
    pub snr: u16,
    /// Signal strength, driver units.
    pub strength: u16,
    pub uncorrected_blocks: u32,
}

/// Read status, BER, SNR, strength and uncorrected blocks from a frontend.
pub fn read_signal<H: DeviceHandle>(handle: &mut H) -> Result<SignalReport, TunerError> {
    Ok(SignalReport {
        status: control::read_status(handle)?,
        ber: control::read_ber(handle)?,
        snr: control::read_snr(handle)?,
        strength: control::read_signal_strength(handle)?,
        uncorrected_blocks: control::read_uncorrected_blocks(handle)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{Modulation, SpectralInversion};
    use crate::sim::SimDriver;

    const DIR: &str = "/sim/adapter0";
    const KQED: Station = Station::new(569_000_000, 49, 51, 1);

    #[test]
    fn test_tune_sets_vsb8_and_returns_event() {
        let driver = SimDriver::locking();
        let tuned = tune(&driver, Path::new(DIR), &KQED, None).unwrap();

        assert!(tuned.event().status.has_lock());
        assert_eq!(tuned.event().parameters.frequency, 569_000_000);
        let set = driver.frontend_parameters().unwrap();
        assert_eq!(set.inversion, SpectralInversion::Auto);
        assert_eq!(set.modulation, Modulation::Vsb8);
        assert_eq!(driver.open_handles(), 1);
        assert_eq!(driver.opened_paths(), vec![Path::new(DIR).join("frontend0")]);
    }

    #[test]
    fn test_timeout_flag_wins_over_frequency() {
        for settled in [569_000_000, 0, 177_000_000] {
            let driver = SimDriver::timing_out().settle_at(settled);
            let err = tune(&driver, Path::new(DIR), &KQED, None).unwrap_err();
            assert!(matches!(
                err,
                TunerError::TuneTimeout {
                    requested: 569_000_000
                }
            ));
            assert_eq!(driver.open_handles(), 0);
        }
    }

    #[test]
    fn test_mismatch_reports_settled_frequency() {
        let driver = SimDriver::locking().settle_at(568_999_000);
        let err = tune(&driver, Path::new(DIR), &KQED, None).unwrap_err();
        match err {
            TunerError::TuneMismatch { requested, actual } => {
                assert_eq!(requested, 569_000_000);
                assert_eq!(actual, 568_999_000);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(driver.open_handles(), 0);
    }

    #[test]
    fn test_settled_without_lock_is_accepted() {
        let driver = SimDriver::with_status(FeStatus::HAS_SIGNAL | FeStatus::HAS_CARRIER);
        let tuned = tune(&driver, Path::new(DIR), &KQED, None).unwrap();
        assert!(!tuned.event().status.has_lock());
    }

    #[test]
    fn test_lock_timeout_without_event() {
        let driver = SimDriver::locking().without_event();
        let err = tune(
            &driver,
            Path::new(DIR),
            &KQED,
            Some(Duration::from_millis(10)),
        )
        .unwrap_err();
        match err {
            TunerError::EventWaitExpired { requested, timeout } => {
                assert_eq!(requested, 569_000_000);
                assert_eq!(timeout, Duration::from_millis(10));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(driver.command_count(Command::GetEvent), 0);
        assert_eq!(driver.open_handles(), 0);
    }

    #[test]
    fn test_lock_timeout_with_pending_event() {
        let driver = SimDriver::locking();
        let tuned = tune(
            &driver,
            Path::new(DIR),
            &KQED,
            Some(Duration::from_secs(5)),
        )
        .unwrap();
        assert_eq!(tuned.event().parameters, FrontendParameters::vsb8(569_000_000));
    }

    #[test]
    fn test_set_frontend_failure_closes_handle() {
        let driver = SimDriver::locking();
        driver.fail_command(Command::SetFrontend, 22);
        let err = tune(&driver, Path::new(DIR), &KQED, None).unwrap_err();
        assert!(matches!(
            err,
            TunerError::ControlCommand {
                command: Command::SetFrontend,
                ..
            }
        ));
        assert_eq!(driver.open_handles(), 0);
    }

    #[test]
    fn test_close_failure_after_set_frontend_failure() {
        let driver = SimDriver::locking();
        driver.fail_command(Command::SetFrontend, 22);
        driver.fail_close(0, 9);

        let err = tune(&driver, Path::new(DIR), &KQED, None).unwrap_err();
        assert!(matches!(
            err.primary(),
            TunerError::ControlCommand {
                command: Command::SetFrontend,
                ..
            }
        ));
        assert_eq!(err.os_error(), Some(22));
        assert!(err.to_string().contains("close frontend0"));
        assert_eq!(driver.open_handles(), 0);
    }

    #[test]
    fn test_probe_reports_get_info_and_close_failures() {
        let driver = SimDriver::locking();
        driver.fail_command(Command::GetInfo, 5);
        driver.fail_close(0, 9);

        let err = probe(&driver, Path::new(DIR)).unwrap_err();
        match &err {
            TunerError::Rollback { source, failures } => {
                assert!(matches!(
                    **source,
                    TunerError::ControlCommand {
                        command: Command::GetInfo,
                        ..
                    }
                ));
                assert_eq!(failures.len(), 1);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.to_string().contains("close frontend0"));
        assert_eq!(driver.open_handles(), 0);
    }

    #[test]
    fn test_probe_close_failure_after_success() {
        let driver = SimDriver::locking();
        driver.fail_close(0, 9);
        let err = probe(&driver, Path::new(DIR)).unwrap_err();
        assert!(matches!(err, TunerError::CloseAggregate { ref failures } if failures.len() == 1));
    }

    #[test]
    fn test_probe_reads_info_and_closes() {
        let driver = SimDriver::locking();
        let info = probe(&driver, Path::new(DIR)).unwrap();
        assert_eq!(info.name, "Simulated ATSC Frontend");
        assert_eq!(driver.open_handles(), 0);
    }

    #[test]
    fn test_read_signal() {
        let driver = SimDriver::locking();
        let mut tuned = tune(&driver, Path::new(DIR), &KQED, None).unwrap();
        let report = read_signal(tuned.handle_mut()).unwrap();
        assert!(report.status.has_lock());
        assert_eq!(report.snr, SimDriver::SNR);
        assert_eq!(report.strength, SimDriver::STRENGTH);
    }
}
