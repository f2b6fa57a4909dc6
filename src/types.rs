use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::payload::RawValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Handedness {
    R,
    L,
}

impl Handedness {
    pub fn as_str(self) -> &'static str {
        match self {
            Handedness::R => "R",
            Handedness::L => "L",
        }
    }
}

/// Raw fields the model's features are built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPlateAppearance {
    pub launch_speed: f64,
    pub launch_angle: f64,
    #[serde(default)]
    pub balls: i64,
    #[serde(default)]
    pub strikes: i64,
    pub stand: Handedness,
    pub p_throws: Handedness,
    pub pitch_type: String,
    pub inning: i64,
    pub month: i64,
}

impl RawPlateAppearance {
    /// Field/value pairs in the shape the payload builder consumes.
    pub fn fields(&self) -> [(&'static str, RawValue); 9] {
        [
            ("launch_speed", RawValue::Float(self.launch_speed)),
            ("launch_angle", RawValue::Float(self.launch_angle)),
            ("stand", RawValue::from(self.stand.as_str())),
            ("p_throws", RawValue::from(self.p_throws.as_str())),
            ("pitch_type", RawValue::from(self.pitch_type.as_str())),
            ("inning", RawValue::Int(self.inning)),
            ("month", RawValue::Int(self.month)),
            ("balls", RawValue::Int(self.balls)),
            ("strikes", RawValue::Int(self.strikes)),
        ]
    }
}

/// One decoded entry of the live feed.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayEvent {
    pub play_id: String,
    #[serde(default)]
    pub launch_speed: Option<f64>,
    #[serde(default)]
    pub launch_angle: Option<f64>,
    pub stand: Handedness,
    pub p_throws: Handedness,
    #[serde(default)]
    pub pitch_type: String,
    pub inning: i64,
    #[serde(default)]
    pub balls: i64,
    #[serde(default)]
    pub strikes: i64,
    #[serde(default)]
    pub game_date: Option<String>,
    #[serde(default)]
    pub home_team: String,
    #[serde(default)]
    pub away_team: String,
    #[serde(default)]
    pub player_name: String,
    #[serde(default)]
    pub pitcher_name: String,
}

impl PlayEvent {
    /// `fallback` supplies the month when the event carries no usable game date.
    pub fn to_raw(&self, fallback: NaiveDate) -> RawPlateAppearance {
        let month = self
            .game_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d.get(..10).unwrap_or(d), "%Y-%m-%d").ok())
            .unwrap_or(fallback)
            .month();

        if self.launch_angle.is_none() {
            tracing::debug!(play_id = %self.play_id, "no launch_angle on feed event; using 0");
        }

        RawPlateAppearance {
            launch_speed: self.launch_speed.unwrap_or_default(),
            launch_angle: self.launch_angle.unwrap_or_default(),
            balls: self.balls,
            strikes: self.strikes,
            stand: self.stand,
            p_throws: self.p_throws,
            pitch_type: self.pitch_type.clone(),
            inning: self.inning,
            month: month as i64,
        }
    }
}

// ---------- HTTP bodies ----------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub data: Vec<RawPlateAppearance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    #[serde(rename = "hr_probability")]
    pub probability: f64,
    pub model_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPrediction {
    #[serde(rename = "hr_probability")]
    pub probabilities: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub feature: String,
    pub impact: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationResult {
    #[serde(rename = "hr_probability")]
    pub probability: f64,
    pub baseline: f64,
    pub contributions: Vec<Contribution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchExplanation {
    #[serde(rename = "hr_probability")]
    pub probabilities: Vec<f64>,
    pub baseline: f64,
    pub contributions: Vec<Vec<Contribution>>,
}
