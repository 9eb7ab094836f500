//! Brain Invaders headless driver
//!
//! Runs one calibrated round with the autopilot on a simulated clock and
//! prints the session result as JSON.

#[cfg(not(target_arch = "wasm32"))]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use brain_invaders::sim::{Autopilot, Phase, RoundOrchestrator};
    use brain_invaders::{JsonFileSink, Settings};

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Brain Invaders (headless) starting...");

    let settings = match std::env::args().nth(1) {
        Some(path) => Settings::load(path),
        None => Settings::default(),
    };

    let sink = JsonFileSink::open(&settings.history_path);
    let mut orch = RoundOrchestrator::new(sink, settings.seed);
    let mut pilot = Autopilot::new(
        settings.seed.wrapping_add(1),
        settings.autopilot_reaction_ms,
        settings.autopilot_impulse_chance,
    );

    let step = settings.frame_step_ms();
    let mut now = 0;
    orch.start(now)?;

    while orch.phase() != Phase::GameOver {
        if now >= settings.session_time_cap_ms {
            return Err(format!(
                "round still running after {}ms of simulated time",
                settings.session_time_cap_ms
            )
            .into());
        }
        now += step;
        let input = pilot.input(now, &orch);
        orch.frame(now, input)?;
    }

    if let Some(result) = orch.last_result() {
        println!("{}", serde_json::to_string_pretty(result)?);
    }
    let bests = &orch.sink().history().personal_bests;
    log::info!(
        "Personal bests: score {:?}, kills {}, reaction {:?}ms",
        bests.highest_score,
        bests.most_kills,
        bests.best_average_reaction_time_ms
    );
    Ok(())
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The core is host-driven on the web; nothing to run here
}
