use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub video: VideoConfig,
    pub detection: DetectionConfig,
    pub rewrite: RewriteConfig,
    pub speech: SpeechConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Camera index ("0", "1", ...) or a path to a video file.
    pub source: String,
    pub display: bool,
    pub target_fps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub model_path: String,
    pub confidence_threshold: f32,
    pub num_threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteConfig {
    pub model: String,
    /// Environment variable holding the Gemini API key.
    pub api_key_env: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    pub enabled: bool,
    pub rate_wpm: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// One detected object in a frame, in original image coordinates.
#[derive(Debug, Clone)]
pub struct Detection {
    pub class_name: String,
    /// [x1, y1, x2, y2]
    pub bbox: [i32; 4],
    pub confidence: f32,
}

/// Which side of the lane midpoint an object sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detection that passed the closeness test, ready for alert gating.
#[derive(Debug, Clone)]
pub struct ClassifiedDetection {
    pub class_name: String,
    pub side: Side,
    pub area: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Person,
    Dog,
    Car,
    Other,
    PetEscort,
}

impl AlertKind {
    pub fn from_class(class_name: &str) -> Self {
        match class_name {
            "person" => AlertKind::Person,
            "dog" => AlertKind::Dog,
            "car" => AlertKind::Car,
            _ => AlertKind::Other,
        }
    }
}

/// One outbound alert, produced by the composite detector and consumed
/// immediately by the dispatcher.
#[derive(Debug, Clone)]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub class_name: String,
    pub side: Side,
    pub message: String,
    pub timestamp: f64,
}

impl AlertEvent {
    /// Value of the `type` field in the broadcast payload.
    pub fn payload_type(&self) -> &str {
        match self.kind {
            AlertKind::PetEscort => "pet_owner",
            _ => &self.class_name,
        }
    }
}

/// JSON payload broadcast to every connected client. Field names are the
/// compatibility contract with the dashboard frontend.
#[derive(Debug, Clone, Serialize)]
pub struct AlertPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub position: String,
    pub timestamp: f64,
    pub message: String,
}

/// Seconds since the Unix epoch, as used in alert timestamps and the
/// cooldown bookkeeping.
pub fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
