/// Preview — plays a scenario in the terminal at real (or scaled) speed.
///
/// Usage: preview [--scenario <tag> | --file <path>] [--config <path>]
///                [--speed <x>] [--loop] [--instant] [--verbose]
///
/// Scenarios auto-advance their flows; the transcript, typing indicator
/// and flow steps are printed as they change. Set RUST_LOG to override
/// the log filter.

use chat_demo_engine::builtin;
use chat_demo_engine::core::cache::ScenarioCache;
use chat_demo_engine::core::config::EngineConfig;
use chat_demo_engine::core::engine::{PlaybackStatus, SimulationEngine};
use chat_demo_engine::core::registry::{RonFile, ScenarioRegistry};
use chat_demo_engine::schema::scenario::{Scenario, ScenarioType};
use futures::executor::block_on;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

const FRAME: Duration = Duration::from_millis(50);

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    let mut scenario_tag: Option<String> = None;
    let mut file: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut speed: Option<f64> = None;
    let mut looping = false;
    let mut instant = false;
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--scenario" if i + 1 < args.len() => {
                i += 1;
                scenario_tag = Some(args[i].clone());
            }
            "--file" if i + 1 < args.len() => {
                i += 1;
                file = Some(PathBuf::from(&args[i]));
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(PathBuf::from(&args[i]));
            }
            "--speed" if i + 1 < args.len() => {
                i += 1;
                speed = Some(args[i].parse().unwrap_or_else(|_| {
                    eprintln!("Invalid speed: {}", args[i]);
                    std::process::exit(1);
                }));
            }
            "--loop" => looping = true,
            "--instant" => instant = true,
            "--verbose" | "-v" => verbose = true,
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let default_level = if verbose { "chat_demo_engine=debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match config_path {
        Some(ref path) => EngineConfig::load_from_ron(path).unwrap_or_else(|e| {
            eprintln!("ERROR: Failed to load config {}: {}", path.display(), e);
            std::process::exit(1);
        }),
        None => EngineConfig::default(),
    };
    if let Some(speed) = speed {
        config.speed = speed;
    }
    config.loop_playback |= looping;
    config.debug |= verbose;
    config.auto_play = true;

    let (registry, scenario) = match (file, scenario_tag) {
        (Some(path), _) => {
            let declared = Scenario::load_from_ron(&path).unwrap_or_else(|e| {
                eprintln!("ERROR: Failed to load {}: {}", path.display(), e);
                std::process::exit(1);
            });
            let id = declared.id;
            (ScenarioRegistry::new().with(id, RonFile(path)), id)
        }
        (None, Some(tag)) => {
            let scenario: ScenarioType = tag.parse().unwrap_or_else(|e| {
                eprintln!("ERROR: {}", e);
                eprintln!("Available: {}", available());
                std::process::exit(1);
            });
            (builtin::registry(), scenario)
        }
        (None, None) => {
            let fallback = config
                .initial_scenario
                .unwrap_or(ScenarioType::RestaurantReservation);
            (builtin::registry(), fallback)
        }
    };

    let cache = Arc::new(ScenarioCache::new(registry));
    let mut engine = match SimulationEngine::builder().config(config).build(cache) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = block_on(engine.load(scenario)) {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }

    if let Some(loaded) = engine.scenario() {
        println!("=== {} ({}) ===", loaded.title, loaded.id);
        if !loaded.business.is_empty() {
            println!("Business: {}", loaded.business);
        }
        println!(
            "{} messages, {} flows, {} actions, {:.1}s at {}x\n",
            loaded.message_count(),
            loaded.flows.len(),
            engine.sequence().len(),
            engine.sequence().duration_ms as f64 / 1000.0,
            engine.state().speed
        );
    }

    play(&mut engine, instant);

    let metrics = engine.metrics();
    println!("\n--- Metrics ---");
    println!("Messages shown:     {}", metrics.messages_shown);
    println!("Flows completed:    {}", metrics.flows_completed);
    println!("User interactions:  {}", metrics.user_interactions);
    println!("Completion rate:    {:.0}%", metrics.completion_rate());
}

fn play(engine: &mut SimulationEngine, instant: bool) {
    let mut shown = 0;
    let mut typing = None;
    let mut step = None;
    let mut last = Instant::now();

    loop {
        let delta = if instant {
            FRAME
        } else {
            std::thread::sleep(FRAME);
            let now = Instant::now();
            let elapsed = now - last;
            last = now;
            elapsed
        };
        engine.advance(delta.as_millis() as u64);

        let state = engine.state();
        let sender = state.typing_sender.filter(|_| state.is_typing);
        if sender != typing {
            if let Some(sender) = sender {
                println!("          ({} is typing...)", sender.label());
            }
            typing = sender;
        }

        let visible = engine.visible_messages();
        if visible.len() < shown {
            println!("\n--- restart ---\n");
            shown = 0;
        }
        for message in &visible[shown..] {
            let stamp = if message.timestamp.is_empty() {
                format!("{:>5.1}s", message.at_ms as f64 / 1000.0)
            } else {
                message.timestamp.clone()
            };
            println!(
                "[{}] {:<8} {}",
                stamp,
                message.sender.label(),
                message.content.preview()
            );
        }
        shown = visible.len();

        let current = engine.current_flow_step().map(|s| s.id.clone());
        if current != step {
            if let (Some(flow), Some(s)) = (engine.current_flow(), engine.current_flow_step()) {
                let answered = &engine.state().flow_answers;
                println!(
                    "          [{}] {} ({} answered)",
                    flow.title,
                    s.label,
                    answered.len()
                );
            }
            step = current;
        }

        if engine.status() == PlaybackStatus::Completed && !engine.config().loop_playback {
            println!("\n--- complete ({:.0}%) ---", engine.progress());
            break;
        }
    }
}

fn available() -> String {
    ScenarioType::ALL
        .iter()
        .map(|s| s.tag())
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_usage() {
    println!("Usage: preview [--scenario <tag> | --file <path>] [--config <path>]");
    println!("               [--speed <x>] [--loop] [--instant] [--verbose]");
    println!();
    println!("Scenarios: {}", available());
}
