use crate::endpoints::{
    VehicleId,
    commands::Command,
    data_request::{GetChargeState, GetDriveState},
    vehicles::{ListVehicles, WakeUp},
};
use serde_json::json;

pub struct VehicleRepository;

impl VehicleRepository {
    pub fn new() -> Self {
        Self {}
    }

    pub fn list(&self) -> ListVehicles {
        ListVehicles::new()
    }

    pub fn wake_up(&self, vehicle_id: VehicleId) -> WakeUp {
        WakeUp::new(vehicle_id)
    }

    pub fn drive_state(&self, vehicle_id: VehicleId) -> GetDriveState {
        GetDriveState::new(vehicle_id)
    }

    pub fn charge_state(&self, vehicle_id: VehicleId) -> GetChargeState {
        GetChargeState::new(vehicle_id)
    }

    pub fn commands(&self, vehicle_id: VehicleId) -> CommandRepository {
        CommandRepository::new(vehicle_id)
    }
}

pub struct CommandRepository {
    vehicle_id: VehicleId,
}

impl CommandRepository {
    pub fn new(vehicle_id: VehicleId) -> Self {
        Self { vehicle_id }
    }

    fn command(&self, name: &'static str) -> Command {
        Command::new(self.vehicle_id.clone(), name)
    }

    pub fn flash_lights(&self) -> Command {
        self.command("flash_lights")
    }

    pub fn honk_horn(&self) -> Command {
        self.command("honk_horn")
    }

    pub fn door_lock(&self) -> Command {
        self.command("door_lock")
    }

    pub fn door_unlock(&self) -> Command {
        self.command("door_unlock")
    }

    pub fn charge_start(&self) -> Command {
        self.command("charge_start")
    }

    pub fn charge_stop(&self) -> Command {
        self.command("charge_stop")
    }

    pub fn auto_conditioning_start(&self) -> Command {
        self.command("auto_conditioning_start")
    }

    pub fn auto_conditioning_stop(&self) -> Command {
        self.command("auto_conditioning_stop")
    }

    pub fn set_sentry_mode(&self, on: bool) -> Command {
        self.command("set_sentry_mode").body(json!({ "on": on }))
    }
}
