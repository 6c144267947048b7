use liftcore::model::SetupInput;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Body of `POST /setup`. Omitted fields keep the station configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupRequest {
    pub taps: Option<SetupInput>,
    pub pressure_port: Option<String>,
    pub environment_port: Option<String>,
    pub demo: Option<bool>,
    pub profile: Option<PathBuf>,
    pub chord_length: Option<f64>,
}

/// Body of `POST /save`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveRequest {
    pub samples: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReply {
    pub status: String,
    pub message: String,
}

impl StatusReply {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".into(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".into(),
            message: message.into(),
        }
    }
}
