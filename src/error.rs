//! Launcher error types.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

/// Launcher error carrying a kind and a small key/value payload.
#[derive(Debug)]
pub struct AppError {
    payload: HashMap<String, String>,
    kind: ErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Required option missing or malformed
    Validation,
    /// Instance id already taken
    AlreadyExists,
    /// Instance not found
    InstanceNotFound,
    /// Version not present in the manifest
    VersionNotFound,
    /// Instance is currently running
    InstanceRunning,
    /// Manifest or artifact retrieval failed
    Transport,
    /// Container engine missing or daemon down
    EngineUnavailable,
    /// Container engine command exited non-zero
    EngineCommand,
    /// Image build failed
    Build,
    /// Process error
    Process,
    /// Port is occupied
    PortOccupied,
    /// External operation exceeded its deadline
    Timeout,
    /// Configuration error
    Config,
    /// File system error
    Io,
}

impl ErrorKind {
    pub fn code(&self) -> u32 {
        match self {
            Self::Validation => 1001,
            Self::AlreadyExists => 1002,
            Self::InstanceNotFound => 1003,
            Self::VersionNotFound => 1004,
            Self::InstanceRunning => 1005,
            Self::Transport => 2001,
            Self::Config => 2002,
            Self::Io => 2003,
            Self::Process => 3001,
            Self::PortOccupied => 3002,
            Self::Timeout => 3003,
            Self::EngineUnavailable => 4001,
            Self::EngineCommand => 4002,
            Self::Build => 4003,
        }
    }

    /// Unknown instance id or unknown version.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::InstanceNotFound | Self::VersionNotFound)
    }
}

impl AppError {
    pub fn new(kind: ErrorKind, payload: HashMap<String, String>) -> Self {
        Self { payload, kind }
    }

    /// Create an error with a single "detail" key from a non-empty string,
    /// or an empty payload if the string is empty.
    fn with_detail(kind: ErrorKind, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let payload = if detail.is_empty() {
            HashMap::new()
        } else {
            HashMap::from([("detail".to_string(), detail)])
        };
        Self::new(kind, payload)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Validation, message)
    }

    pub fn already_exists(id: &str) -> Self {
        Self::new(
            ErrorKind::AlreadyExists,
            HashMap::from([("id".to_string(), id.to_string())]),
        )
    }

    pub fn instance_not_found(id: &str) -> Self {
        Self::new(
            ErrorKind::InstanceNotFound,
            HashMap::from([("id".to_string(), id.to_string())]),
        )
    }

    pub fn version_not_found(version: &str) -> Self {
        Self::new(
            ErrorKind::VersionNotFound,
            HashMap::from([("version".to_string(), version.to_string())]),
        )
    }

    pub fn instance_running(id: &str) -> Self {
        Self::new(
            ErrorKind::InstanceRunning,
            HashMap::from([("id".to_string(), id.to_string())]),
        )
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Transport, message)
    }

    pub fn transport_with_url(url: &str, detail: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Transport,
            HashMap::from([
                ("url".to_string(), url.to_string()),
                ("detail".to_string(), detail.into()),
            ]),
        )
    }

    pub fn engine_unavailable(engine: &str, detail: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::EngineUnavailable,
            HashMap::from([
                ("engine".to_string(), engine.to_string()),
                ("detail".to_string(), detail.into()),
            ]),
        )
    }

    pub fn engine_command(command: &str, detail: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::EngineCommand,
            HashMap::from([
                ("command".to_string(), command.to_string()),
                ("detail".to_string(), detail.into()),
            ]),
        )
    }

    pub fn build(image: &str, detail: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Build,
            HashMap::from([
                ("image".to_string(), image.to_string()),
                ("detail".to_string(), detail.into()),
            ]),
        )
    }

    pub fn process(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Process, message)
    }

    pub fn port_occupied(port: u16) -> Self {
        Self::new(
            ErrorKind::PortOccupied,
            HashMap::from([("port".to_string(), port.to_string())]),
        )
    }

    pub fn timeout(operation: &str, secs: u64) -> Self {
        Self::new(
            ErrorKind::Timeout,
            HashMap::from([
                ("operation".to_string(), operation.to_string()),
                ("secs".to_string(), secs.to_string()),
            ]),
        )
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Config, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Io, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn payload(&self, key: &str) -> Option<&str> {
        self.payload.get(key).map(String::as_str)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.payload.is_empty() {
            write!(f, "{:?}", self.kind)
        } else {
            let mut pairs: Vec<String> = self
                .payload
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            pairs.sort();
            write!(f, "{:?}: {}", self.kind, pairs.join(", "))
        }
    }
}

impl std::error::Error for AppError {}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct as _;
        let mut s = serializer.serialize_struct("AppError", 2)?;
        s.serialize_field("code", &self.kind.code())?;
        s.serialize_field("payload", &self.payload)?;
        s.end()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(err.to_string())
    }
}

impl From<toml::ser::Error> for AppError {
    fn from(err: toml::ser::Error) -> Self {
        Self::config(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::transport(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::transport(err.to_string())
    }
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, AppError>;
