//! Print the full schema-aligned feature payload for one plate appearance.
//!
//! build_payload models/hr_model.json --launch-speed 101.3 --launch-angle 27 \
//!     --stand R --p-throws L --pitch-type FF --inning 7 --month 8

use clap::{Parser, ValueEnum};
use hr_alerts::{model, payload, Handedness, RawPlateAppearance};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Hand {
    R,
    L,
}

impl From<Hand> for Handedness {
    fn from(h: Hand) -> Self {
        match h {
            Hand::R => Handedness::R,
            Hand::L => Handedness::L,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "build_payload", about = "Build the JSON feature payload for the HR model")]
struct Cli {
    /// Path to the model artifact
    model: String,
    #[arg(long)]
    launch_speed: f64,
    #[arg(long)]
    launch_angle: f64,
    #[arg(long, default_value_t = 0)]
    balls: i64,
    #[arg(long, default_value_t = 0)]
    strikes: i64,
    #[arg(long, value_enum, ignore_case = true)]
    stand: Hand,
    #[arg(long, value_enum, ignore_case = true)]
    p_throws: Hand,
    #[arg(long)]
    pitch_type: String,
    #[arg(long)]
    inning: i64,
    #[arg(long)]
    month: i64,
}

fn main() -> anyhow::Result<()> {
    hr_alerts::init_tracing();
    let cli = Cli::parse();

    let loaded = model::load(&cli.model)?;
    let raw = RawPlateAppearance {
        launch_speed: cli.launch_speed,
        launch_angle: cli.launch_angle,
        balls: cli.balls,
        strikes: cli.strikes,
        stand: cli.stand.into(),
        p_throws: cli.p_throws.into(),
        pitch_type: cli.pitch_type,
        inning: cli.inning,
        month: cli.month,
    };
    let features = payload::build(&loaded.schema, raw.fields());
    println!("{}", serde_json::to_string_pretty(&features)?);
    Ok(())
}
