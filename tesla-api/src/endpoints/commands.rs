use super::{ResponseEnvelope, VehicleId};
use crate::macros::setter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use tower_api_client::{Method, Request, RequestData};

/// Reason the API sends when the requested state is already in effect.
const ALREADY_SET: &str = "already_set";

// Common

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub result: bool,
    #[serde(default)]
    pub reason: String,
}

impl CommandResult {
    /// `None` when the command took effect, otherwise the API's reason.
    /// `already_set` and any of `ok_reasons` count as success.
    pub fn failure_reason(&self, ok_reasons: &[&str]) -> Option<&str> {
        let reason = self.reason.trim();
        if reason == ALREADY_SET || ok_reasons.contains(&reason) {
            return None;
        }
        if self.result && reason.is_empty() {
            return None;
        }
        if reason.is_empty() {
            Some("command rejected")
        } else {
            Some(reason)
        }
    }
}

// Requests

#[derive(Debug, Clone, Serialize)]
pub struct Command {
    vehicle_id: VehicleId,
    name: Cow<'static, str>,
    body: Option<Value>,
}

impl Command {
    pub fn new(vehicle_id: VehicleId, name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            vehicle_id,
            name: name.into(),
            body: None,
        }
    }

    setter!(opt body: Value);

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Request for Command {
    type Data = Value;
    type Response = CommandResponse;
    const METHOD: Method = Method::POST;

    fn endpoint(&self) -> Cow<'_, str> {
        format!("/vehicles/{}/command/{}", self.vehicle_id, self.name).into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        if let Some(ref body) = self.body {
            RequestData::Json(body)
        } else {
            RequestData::Empty
        }
    }
}

// Responses

pub type CommandResponse = ResponseEnvelope<CommandResult>;
