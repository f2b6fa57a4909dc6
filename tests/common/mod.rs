#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hr_alerts::{
    model, FeatureSchema, Handedness, InferenceService, LinearModel, RawPlateAppearance,
};

pub const COLUMNS: &[&str] = &[
    "launch_speed",
    "launch_angle",
    "balls",
    "strikes",
    "stand_L",
    "stand_R",
    "p_throws_L",
    "p_throws_R",
    "pitch_type_CH",
    "pitch_type_FF",
    "pitch_type_SL",
    "inning_4",
    "inning_9",
    "month_6",
];

/// Small xgboost-style dump over `COLUMNS`.
pub const TREE_ARTIFACT: &str = r#"{
    "version": "2024-wind-v1",
    "feature_names": [
        "launch_speed", "launch_angle", "balls", "strikes", "stand_L", "stand_R",
        "p_throws_L", "p_throws_R", "pitch_type_CH", "pitch_type_FF", "pitch_type_SL",
        "inning_4", "inning_9", "month_6"
    ],
    "model": {
        "kind": "tree_ensemble",
        "base_score": -3.4,
        "trees": [
            {"nodes": [
                {"type": "split", "feature": "launch_speed", "threshold": 98.0, "yes": 1, "no": 2, "cover": 100},
                {"type": "leaf", "value": -0.6, "cover": 70},
                {"type": "split", "feature": "launch_angle", "threshold": 22.0, "yes": 3, "no": 4, "cover": 30},
                {"type": "leaf", "value": 0.1, "cover": 15},
                {"type": "leaf", "value": 1.9, "cover": 15}
            ]},
            {"nodes": [
                {"type": "split", "feature": "pitch_type_FF", "threshold": 0.5, "yes": 1, "no": 2, "cover": 100},
                {"type": "leaf", "value": -0.05, "cover": 60},
                {"type": "leaf", "value": 0.2, "cover": 40}
            ]},
            {"nodes": [
                {"type": "split", "feature": "strikes", "threshold": 2.0, "yes": 1, "no": 2, "cover": 100},
                {"type": "leaf", "value": 0.05, "cover": 75},
                {"type": "leaf", "value": -0.15, "cover": 25}
            ]}
        ]
    }
}"#;

static FIXTURE_SEQ: AtomicUsize = AtomicUsize::new(0);

pub fn write_artifact(contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "hr-alerts-{}-{}.json",
        std::process::id(),
        FIXTURE_SEQ.fetch_add(1, Ordering::SeqCst)
    ));
    std::fs::write(&path, contents).expect("write fixture artifact");
    path
}

pub fn tree_service() -> InferenceService {
    let path = write_artifact(TREE_ARTIFACT);
    let loaded = model::load(&path).expect("fixture artifact loads");
    let _ = std::fs::remove_file(path);
    InferenceService::from_loaded(loaded).expect("fixture schema matches model")
}

/// Deterministic logistic stand-in: every weight non-zero except the one-hot
/// pitch and month groups, so attribution sizes are easy to reason about.
pub fn linear_service() -> InferenceService {
    let schema = Arc::new(
        FeatureSchema::new(
            COLUMNS.iter().map(|s| s.to_string()).collect(),
            hr_alerts::schema::DEFAULT_CATEGORICAL_FIELDS,
        )
        .expect("schema"),
    );
    let model = LinearModel::new(
        "stub-linear",
        &schema,
        -8.0,
        [
            ("launch_speed", 0.05),
            ("launch_angle", 0.03),
            ("strikes", -0.2),
            ("stand_L", 0.1),
        ],
    )
    .expect("linear model");
    InferenceService::new(schema, Arc::new(model)).expect("weights cover the schema")
}

pub fn pa(launch_speed: f64, launch_angle: f64, pitch_type: &str) -> RawPlateAppearance {
    RawPlateAppearance {
        launch_speed,
        launch_angle,
        balls: 1,
        strikes: 2,
        stand: Handedness::R,
        p_throws: Handedness::L,
        pitch_type: pitch_type.to_string(),
        inning: 4,
        month: 6,
    }
}
