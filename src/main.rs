use hr_alerts::{config::ServeConfig, model, server, InferenceService, RawPlateAppearance};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hr_alerts::init_tracing();

    let cfg = ServeConfig::from_env()?;
    let loaded = model::load(&cfg.model_path)?;
    let svc = InferenceService::from_loaded(loaded)?;

    // Warmup to make sure the artifact actually scores before taking traffic
    let probe = RawPlateAppearance {
        launch_speed: 0.0,
        launch_angle: 0.0,
        balls: 0,
        strikes: 0,
        stand: hr_alerts::Handedness::R,
        p_throws: hr_alerts::Handedness::R,
        pitch_type: "FF".to_string(),
        inning: 1,
        month: 1,
    };
    svc.predict(&probe)?;
    tracing::info!(
        model_version = svc.model_version(),
        n_features = svc.schema().len(),
        "warmup forward ok"
    );

    let listener = tokio::net::TcpListener::bind(cfg.addr).await?;
    tracing::info!("listening on {}", cfg.addr);
    server::serve(listener, svc, server::shutdown_on(tokio::signal::ctrl_c())).await?;
    Ok(())
}
