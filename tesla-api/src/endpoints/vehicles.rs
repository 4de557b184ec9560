use super::{ResponseEnvelope, VehicleId};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tower_api_client::{Method, Request};

// Common

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub vehicle_id: Option<u64>,
    pub vin: String,
    pub display_name: Option<String>,
    pub state: VehicleState,
}

impl Vehicle {
    pub fn is_asleep(&self) -> bool {
        self.state == VehicleState::Asleep
    }

    pub fn is_waking(&self) -> bool {
        self.state == VehicleState::Waking
    }

    pub fn is_online(&self) -> bool {
        self.state == VehicleState::Online
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleState {
    Asleep,
    Waking,
    Online,
    #[serde(other)]
    Unknown,
}

// Requests

#[derive(Default, Debug, Clone, Serialize)]
pub struct ListVehicles;

impl ListVehicles {
    pub fn new() -> Self {
        Self
    }
}

impl Request for ListVehicles {
    type Data = ();
    type Response = VehiclesResponse;

    fn endpoint(&self) -> Cow<'_, str> {
        "/vehicles".into()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WakeUp {
    vehicle_id: VehicleId,
}

impl WakeUp {
    pub fn new(vehicle_id: VehicleId) -> Self {
        Self { vehicle_id }
    }
}

impl Request for WakeUp {
    type Data = ();
    type Response = VehicleResponse;
    const METHOD: Method = Method::POST;

    fn endpoint(&self) -> Cow<'_, str> {
        format!("/vehicles/{}/wake_up", self.vehicle_id).into()
    }
}

// Responses

pub type VehiclesResponse = ResponseEnvelope<Vec<Vehicle>>;

pub type VehicleResponse = ResponseEnvelope<Vehicle>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_vehicle_list() {
        let body = r#"{"response":[{"id":242342423,"vehicle_id":123123123123,"vin":"5YJ3E1EA7KF000001","display_name":"Tarah","state":"asleep","tokens":["a","b"]}],"count":1}"#;
        let resp: VehiclesResponse = serde_json::from_str(body).unwrap();

        assert_eq!(resp.response.len(), 1);
        let vehicle = &resp.response[0];
        assert_eq!(vehicle.id, "242342423");
        assert_eq!(vehicle.vin, "5YJ3E1EA7KF000001");
        assert_eq!(vehicle.display_name.as_deref(), Some("Tarah"));
        assert!(vehicle.is_asleep());
        assert!(!vehicle.is_online());
    }

    #[test]
    fn unknown_vehicle_state_does_not_fail() {
        let body = r#"{"id":"1","vehicle_id":null,"vin":"V","display_name":null,"state":"offline"}"#;
        let vehicle: Vehicle = serde_json::from_str(body).unwrap();
        assert_eq!(vehicle.state, VehicleState::Unknown);
    }
}
