use super::{ResponseEnvelope, VehicleId};
use chrono::{DateTime, Utc, serde::ts_seconds_option};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tower_api_client::Request;

// Common

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriveState {
    shift_state: Option<String>,
    pub speed: Option<f64>,
    pub heading: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default, with = "ts_seconds_option")]
    pub gps_as_of: Option<DateTime<Utc>>,
}

impl DriveState {
    pub fn with_shift_state(shift_state: impl Into<String>) -> Self {
        Self {
            shift_state: Some(shift_state.into()),
            ..Self::default()
        }
    }

    /// Gear indicator (`P`, `D`, `R`, `N`). Null and blank values are `None`;
    /// a parked vehicle that was just woken often reports null.
    pub fn shift_state(&self) -> Option<&str> {
        self.shift_state
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChargeState {
    pub battery_level: Option<u8>,
    pub charging_state: Option<String>,
    pub charge_limit_soc: Option<u8>,
}

// Requests

#[derive(Debug, Clone, Serialize)]
pub struct GetDriveState {
    vehicle_id: VehicleId,
}

impl GetDriveState {
    pub fn new(vehicle_id: VehicleId) -> Self {
        Self { vehicle_id }
    }
}

impl Request for GetDriveState {
    type Data = ();
    type Response = DriveStateResponse;

    fn endpoint(&self) -> Cow<'_, str> {
        format!("/vehicles/{}/data_request/drive_state", self.vehicle_id).into()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GetChargeState {
    vehicle_id: VehicleId,
}

impl GetChargeState {
    pub fn new(vehicle_id: VehicleId) -> Self {
        Self { vehicle_id }
    }
}

impl Request for GetChargeState {
    type Data = ();
    type Response = ChargeStateResponse;

    fn endpoint(&self) -> Cow<'_, str> {
        format!("/vehicles/{}/data_request/charge_state", self.vehicle_id).into()
    }
}

// Responses

/// `response` is `null` while the vehicle cannot be reached.
pub type DriveStateResponse = ResponseEnvelope<Option<DriveState>>;

pub type ChargeStateResponse = ResponseEnvelope<Option<ChargeState>>;
