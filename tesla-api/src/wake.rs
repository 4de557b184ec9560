//! Wake a vehicle and confirm it is responsive before commands are sent.
//!
//! The owner API accepts `wake_up` immediately but the vehicle only answers
//! data requests once it is actually online. Polling the drive state until
//! it carries a shift state is used as the proof of life.

use crate::endpoints::{VehicleId, data_request::DriveState, vehicles::Vehicle};
use crate::{Client, Request, TeslaApiError};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Shift state reported when the vehicle answered without one before the
/// deadline ran out. This is an assumption, not something the vehicle said.
pub const ASSUMED_SHIFT_STATE: &str = "P";

/// The two owner-API calls the poller needs.
#[async_trait]
pub trait WakeTarget: Send + Sync {
    async fn wake_up(&self, vehicle_id: &VehicleId) -> Result<Vehicle, TeslaApiError>;

    /// `None` when the vehicle did not return a drive state at all.
    async fn drive_state(&self, vehicle_id: &VehicleId) -> Option<DriveState>;
}

#[async_trait]
impl WakeTarget for Client {
    async fn wake_up(&self, vehicle_id: &VehicleId) -> Result<Vehicle, TeslaApiError> {
        let req = Request::vehicles().wake_up(vehicle_id.clone());
        Ok(self.send(req).await?.response)
    }

    async fn drive_state(&self, vehicle_id: &VehicleId) -> Option<DriveState> {
        let req = Request::vehicles().drive_state(vehicle_id.clone());
        match self.send(req).await {
            Ok(resp) => resp.response,
            Err(e) => {
                tracing::warn!(vehicle_id = %vehicle_id, error = %e, "Drive state request failed");
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WakeOutcome {
    /// The vehicle reported this shift state. `D` means it is being driven,
    /// which is still a successful wake.
    Confirmed(String),
    /// The vehicle answered with a drive state but never a shift state.
    AssumedParked,
    /// No drive state before the deadline.
    TimedOut,
}

impl WakeOutcome {
    pub fn shift_state(&self) -> Option<&str> {
        match self {
            WakeOutcome::Confirmed(shift_state) => Some(shift_state),
            WakeOutcome::AssumedParked => Some(ASSUMED_SHIFT_STATE),
            WakeOutcome::TimedOut => None,
        }
    }

    pub fn is_awake(&self) -> bool {
        !matches!(self, WakeOutcome::TimedOut)
    }
}

/// Repeats `wake_up` + `drive_state` every `poll_interval` until a shift
/// state is seen or `max_duration` has elapsed. Never fails: a timeout is an
/// expected outcome.
pub async fn wake_and_confirm<T>(
    target: &T,
    vehicle_id: &VehicleId,
    max_duration: Duration,
    poll_interval: Duration,
) -> WakeOutcome
where
    T: WakeTarget + ?Sized,
{
    let deadline = Instant::now() + max_duration;
    let mut attempt: u32 = 0;

    loop {
        let now = Instant::now();
        attempt += 1;
        tracing::debug!(vehicle_id = %vehicle_id, attempt, "Waking up vehicle");

        match target.wake_up(vehicle_id).await {
            Ok(vehicle) => tracing::trace!(vehicle_id = %vehicle_id, state = ?vehicle.state, "Wake up sent"),
            Err(e) => tracing::debug!(vehicle_id = %vehicle_id, error = %e, "Wake up request failed"),
        }

        let drive_state = target.drive_state(vehicle_id).await;
        let shift_state = drive_state.as_ref().and_then(DriveState::shift_state);
        tracing::debug!(vehicle_id = %vehicle_id, attempt, shift_state = ?shift_state, "Polled drive state");

        if let Some(shift_state) = shift_state {
            tracing::debug!(vehicle_id = %vehicle_id, shift_state, "Vehicle is awake");
            return WakeOutcome::Confirmed(shift_state.to_string());
        }

        if drive_state.is_some() && now > deadline {
            tracing::debug!(
                vehicle_id = %vehicle_id,
                "Shift state still empty after deadline, assuming {}",
                ASSUMED_SHIFT_STATE
            );
            return WakeOutcome::AssumedParked;
        }

        if now > deadline {
            tracing::debug!(vehicle_id = %vehicle_id, attempts = attempt, "Vehicle did not wake up");
            return WakeOutcome::TimedOut;
        }

        sleep(poll_interval).await;
    }
}
