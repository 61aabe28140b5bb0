//! Domain model — check-ins, generated messages, users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reported mood for a check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mood {
    Happy,
    Neutral,
    Sad,
    Anxious,
    Stressed,
}

/// Reported energy level for a check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnergyLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Happy => write!(f, "HAPPY"),
            Self::Neutral => write!(f, "NEUTRAL"),
            Self::Sad => write!(f, "SAD"),
            Self::Anxious => write!(f, "ANXIOUS"),
            Self::Stressed => write!(f, "STRESSED"),
        }
    }
}

impl std::str::FromStr for Mood {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HAPPY" => Ok(Self::Happy),
            "NEUTRAL" => Ok(Self::Neutral),
            "SAD" => Ok(Self::Sad),
            "ANXIOUS" => Ok(Self::Anxious),
            "STRESSED" => Ok(Self::Stressed),
            _ => Err(format!("Unknown mood: {}", s)),
        }
    }
}

impl std::fmt::Display for EnergyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

impl std::str::FromStr for EnergyLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            _ => Err(format!("Unknown energy level: {}", s)),
        }
    }
}

/// A user's recorded mood/energy/notes entry at a point in time.
///
/// Owns at most one [`GeneratedMessage`]; deleting the check-in deletes the
/// message with it.
#[derive(Debug, Clone, Serialize)]
pub struct CheckIn {
    pub id: i64,
    pub user_id: i64,
    pub mood: Mood,
    pub energy_level: EnergyLevel,
    /// Free-text notes; arbitrary length, may be absent.
    pub notes: Option<String>,
    /// Set once at insert, immutable afterwards.
    pub created_at: DateTime<Utc>,
    /// Back-reference to the current generated message, if any.
    pub generated_message_id: Option<i64>,
}

/// The AI-produced recommendation tied 1:1 to a check-in.
///
/// Created only by the enrichment service, never standalone.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedMessage {
    pub id: i64,
    pub check_in_id: i64,
    /// Possibly empty (failed generation), never absent.
    pub message: String,
    /// When present, always within [0, 1].
    pub confidence: Option<f64>,
    pub generated_at: DateTime<Utc>,
}

/// Clamp a service-reported confidence into the valid [0, 1] range.
///
/// The external service is not trusted to respect the range; out-of-range
/// values are clamped rather than rejected so a usable message text is never
/// discarded over a bad score.
pub fn clamp_confidence(confidence: Option<f64>) -> Option<f64> {
    confidence.map(|c| c.clamp(0.0, 1.0))
}

/// A registered user.
///
/// The password is stored as a salted Argon2id hash, never plaintext.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}
