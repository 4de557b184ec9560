pub mod commands;
pub mod data_request;
pub mod vehicles;

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Display;

/// Owner-API vehicle id. The API sends it as a JSON number that does not fit
/// every client's integer type, so it is kept as its decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct VehicleId(String);

impl VehicleId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for VehicleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VehicleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for VehicleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<u64> for VehicleId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl PartialEq<&str> for VehicleId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl<'de> Deserialize<'de> for VehicleId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => VehicleId::from(n),
            Raw::Text(s) => VehicleId::from(s),
        })
    }
}

/// Every owner-API payload is wrapped in `{"response": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope<T> {
    pub response: T,
}
