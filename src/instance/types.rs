//! Instance-related type definitions.

use serde::{Deserialize, Serialize};

/// Options for provisioning a new instance. Unset fields fall back to the
/// launcher config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateOptions {
    pub id: Option<String>,
    pub version: Option<String>,
    pub motd: Option<String>,
    pub max_players: Option<u32>,
    #[serde(default)]
    pub hardcore: bool,
}

impl CreateOptions {
    pub fn new(motd: impl Into<String>) -> Self {
        Self {
            motd: Some(motd.into()),
            ..Self::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn max_players(mut self, max_players: u32) -> Self {
        self.max_players = Some(max_players);
        self
    }

    pub fn hardcore(mut self, hardcore: bool) -> Self {
        self.hardcore = hardcore;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Absent,
    Provisioned,
    Running,
    Stopped,
}

/// Status information for an instance.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceStatus {
    pub id: String,
    pub state: InstanceState,
    pub pid: Option<u32>,
    pub port: Option<u16>,
    pub last_exit_code: Option<i32>,
}
