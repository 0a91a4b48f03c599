use bomber_sim::command_queue::CommandEvent;
use bomber_sim::crew::CrewEvent;
use bomber_sim::hazard::HazardEvent;
use bomber_sim::protocol::ProtocolHandler;
use bomber_sim::vehicle::VehicleEvent;
use bomber_sim::{LegConfig, SimConfig, SimEvent, SimEventRecord, SimSnapshot, Simulation};
use clap::{App, Arg, ArgMatches};
use colored::*;
use std::time::Duration;
use tokio::time;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LEG_SECONDS: &str = "600";
const DEFAULT_START_DANGER: &str = "0.2";
const DEFAULT_END_DANGER: &str = "0.8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Table,
    Compact,
}

impl OutputFormat {
    fn parse(value: &str) -> Self {
        match value {
            "json" => OutputFormat::Json,
            "compact" => OutputFormat::Compact,
            _ => OutputFormat::Table,
        }
    }
}

fn number_validator<T: std::str::FromStr>(v: String) -> Result<(), String> {
    match v.parse::<T>() {
        Ok(_) => Ok(()),
        Err(_) => Err(format!("'{v}' is not a valid number")),
    }
}

fn build_cli() -> App<'static, 'static> {
    App::new("bomber-sim")
        .version("0.1.0")
        .about("Headless heavy-bomber attrition simulator")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("JSON simulation config")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("seed")
                .short("s")
                .long("seed")
                .value_name("SEED")
                .help("Random seed (overrides the config)")
                .takes_value(true)
                .validator(number_validator::<u64>),
        )
        .arg(
            Arg::with_name("duration")
                .short("d")
                .long("duration")
                .value_name("SECONDS")
                .help("Sim seconds to run (defaults to the leg length)")
                .takes_value(true)
                .validator(number_validator::<f32>),
        )
        .arg(
            Arg::with_name("dt")
                .long("dt")
                .value_name("SECONDS")
                .help("Step length (overrides the config)")
                .takes_value(true)
                .validator(number_validator::<f32>),
        )
        .arg(
            Arg::with_name("script")
                .long("script")
                .value_name("FILE")
                .help("JSON-lines file of time-tagged crew commands")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("start-danger")
                .long("start-danger")
                .value_name("DANGER")
                .help("Danger at the start of the leg, 0 to 1")
                .takes_value(true)
                .default_value(DEFAULT_START_DANGER)
                .validator(number_validator::<f32>),
        )
        .arg(
            Arg::with_name("end-danger")
                .long("end-danger")
                .value_name("DANGER")
                .help("Danger at the end of the leg, 0 to 1")
                .takes_value(true)
                .default_value(DEFAULT_END_DANGER)
                .validator(number_validator::<f32>),
        )
        .arg(
            Arg::with_name("leg-seconds")
                .long("leg-seconds")
                .value_name("SECONDS")
                .help("Length of the leg in sim seconds")
                .takes_value(true)
                .default_value(DEFAULT_LEG_SECONDS)
                .validator(number_validator::<f32>),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .takes_value(true)
                .possible_values(&["json", "table", "compact"])
                .default_value("table"),
        )
        .arg(
            Arg::with_name("realtime")
                .long("realtime")
                .help("Pace steps against the wall clock"),
        )
        .arg(
            Arg::with_name("telemetry-interval")
                .long("telemetry-interval")
                .value_name("SECONDS")
                .help("Sim seconds between snapshots (overrides the config)")
                .takes_value(true)
                .validator(number_validator::<f32>),
        )
}

fn parse_arg<T: std::str::FromStr>(matches: &ArgMatches<'_>, name: &str) -> Option<T> {
    matches.value_of(name).and_then(|v| v.parse().ok())
}

fn load_config(matches: &ArgMatches<'_>) -> Result<SimConfig, Box<dyn std::error::Error>> {
    let mut config = match matches.value_of("config") {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    if let Some(seed) = parse_arg(matches, "seed") {
        config.seed = seed;
    }
    if let Some(dt) = parse_arg(matches, "dt") {
        config.tick_seconds = dt;
    }
    if let Some(interval) = parse_arg(matches, "telemetry-interval") {
        config.telemetry_interval_seconds = interval;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = build_cli().get_matches();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let format = OutputFormat::parse(matches.value_of("format").unwrap_or("table"));
    let config = load_config(&matches)?;
    let leg = LegConfig {
        start_danger: parse_arg(&matches, "start-danger").unwrap_or(0.2),
        end_danger: parse_arg(&matches, "end-danger").unwrap_or(0.8),
        phase_weights: None,
        duration_seconds: parse_arg(&matches, "leg-seconds").unwrap_or(600.0),
    };
    let duration: f32 = parse_arg(&matches, "duration").unwrap_or(leg.duration_seconds);
    let dt = config.tick_seconds;

    let mut sim = Simulation::with_b17(config)?;
    sim.begin_leg(&leg);

    if let Some(path) = matches.value_of("script") {
        let text = std::fs::read_to_string(path)?;
        let count = sim.load_script(&text)?;
        info!(path, count, "crew script scheduled");
    }

    let mut acks = ProtocolHandler::new();
    sim.subscribe(Box::new(move |record| print_event(record, format, &mut acks)));

    if format != OutputFormat::Json {
        println!("{}", "Heavy bomber sortie".bright_blue().bold());
        println!(
            "leg {:.0}s  danger {:.2} -> {:.2}  seed {}",
            leg.duration_seconds,
            leg.start_danger,
            leg.end_danger,
            sim.config().seed
        );
    }

    let mut pacer = matches
        .is_present("realtime")
        .then(|| time::interval(Duration::from_secs_f32(dt)));

    while sim.time() < duration && !sim.is_crashed() && !sim.is_leg_complete() {
        if let Some(interval) = pacer.as_mut() {
            interval.tick().await;
        }
        if let Some(snapshot) = sim.tick() {
            print_snapshot(&snapshot, format);
        }
    }

    let snapshot = sim.snapshot();
    print_snapshot(&snapshot, format);
    if sim.is_crashed() {
        warn!(time = sim.time(), "sortie ended in a crash");
    } else {
        info!(time = sim.time(), leg_complete = sim.is_leg_complete(), "sortie ended");
    }
    if format != OutputFormat::Json {
        let outcome = if sim.is_crashed() {
            "LOST".red().bold()
        } else if sim.is_leg_complete() {
            "LEG COMPLETE".green().bold()
        } else {
            "TIME UP".yellow().bold()
        };
        println!("{} after {:.1}s", outcome, sim.time());
    }

    Ok(())
}

fn print_event(record: &SimEventRecord, format: OutputFormat, acks: &mut ProtocolHandler) {
    match format {
        OutputFormat::Json => {
            // Command results go out as wire ACK/NACK lines.
            if let SimEvent::Command(event) = &record.event {
                match acks.acknowledge(event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => warn!(error = %e, "could not encode command outcome"),
                }
                return;
            }
            if let Ok(line) = serde_json::to_string(record) {
                println!("{line}");
            }
        }
        OutputFormat::Table | OutputFormat::Compact => {
            let stamp = format!("[{:>7.1}s]", record.time).dimmed();
            let text = describe_event(&record.event);
            println!("{stamp} {text}");
        }
    }
}

fn describe_event(event: &SimEvent) -> ColoredString {
    match event {
        SimEvent::Vehicle(event) => match event {
            VehicleEvent::SectionDamaged { section, integrity } => {
                format!("{section} hit, integrity {integrity:.0}").yellow()
            }
            VehicleEvent::SectionDestroyed { section } => format!("{section} DESTROYED").red().bold(),
            VehicleEvent::SectionRepaired { section, integrity } => {
                format!("{section} patched to {integrity:.0}").green()
            }
            VehicleEvent::FireStarted { section } => format!("fire in {section}").red(),
            VehicleEvent::FireExtinguished { section } => format!("fire in {section} out").green(),
            VehicleEvent::SystemStatusChanged { system, from, to } => {
                format!("{system} {from:?} -> {to:?}").yellow()
            }
            VehicleEvent::SystemRepaired { system, integrity } => {
                format!("{system} repaired to {integrity:.0}").green()
            }
            VehicleEvent::EngineDamaged { engine, integrity } => {
                format!("{engine} damaged, integrity {integrity:.0}").yellow()
            }
            VehicleEvent::EngineFireStarted { engine } => format!("{engine} on fire").red().bold(),
            VehicleEvent::EngineFireExtinguished { engine } => format!("{engine} fire out").green(),
            VehicleEvent::EngineFeathered { engine } => format!("{engine} feathered").cyan(),
            VehicleEvent::EngineRestarted { engine } => format!("{engine} restarted").green(),
            VehicleEvent::EngineRestartFailed { engine, extra_damage } => match extra_damage {
                Some(damage) => format!("{engine} restart failed, {damage:.0} damage").red(),
                None => format!("{engine} restart failed").yellow(),
            },
            VehicleEvent::FuelChanged { fuel } => format!("fuel {fuel:.0}").normal(),
            VehicleEvent::FuelExhausted => "FUEL EXHAUSTED".red().bold(),
            VehicleEvent::AltitudeChanged { altitude } => format!("altitude {altitude:.0} ft").normal(),
            VehicleEvent::Crashed => "BOMBER CRASHED".red().bold(),
        },
        SimEvent::Crew(event) => match event {
            CrewEvent::ActionAssigned { crew, action, target } => {
                format!("{crew}: {action:?} {target}").bright_white()
            }
            CrewEvent::ActionPhaseChanged { crew, action, phase } => {
                format!("{crew}: {action:?} {phase:?}").dimmed()
            }
            CrewEvent::ActionCompleted {
                crew,
                action,
                target,
                success,
            } => {
                if *success {
                    format!("{crew}: {action:?} {target} done").green()
                } else {
                    format!("{crew}: {action:?} {target} failed").yellow()
                }
            }
            CrewEvent::ActionCancelled { crew, action, reason, .. } => {
                format!("{crew}: {action:?} cancelled ({reason})").yellow()
            }
            CrewEvent::InjuryStageChanged { crew, from, to } => {
                format!("{crew}: {from:?} -> {to:?}").magenta()
            }
            CrewEvent::CrewDied { crew } => format!("{crew} KILLED").red().bold(),
        },
        SimEvent::Hazard(event) => match event {
            HazardEvent::PhaseChanged { to, duration, .. } => {
                format!("== {to:?} for {duration:.0}s ==").bright_blue().bold()
            }
            HazardEvent::Strike {
                kind,
                target,
                damage,
                ..
            } => format!("{kind:?} strike on {target} ({damage:.0})").red(),
            HazardEvent::InjuryInflicted { crew, severity } => {
                format!("{crew} wounded ({severity:?})").magenta()
            }
        },
        SimEvent::Command(event) => match event {
            CommandEvent::Accepted { id, crew, action } => {
                format!("#{id} {crew} {action:?} accepted").cyan()
            }
            CommandEvent::Rejected { id, crew, reason } => {
                format!("#{id} {crew} rejected: {reason}").yellow()
            }
        },
    }
}

fn print_snapshot(snapshot: &SimSnapshot, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            if let Ok(line) = serde_json::to_string(snapshot) {
                println!("{line}");
            }
        }
        OutputFormat::Compact => println!("{}", snapshot.summary_line().bright_white()),
        OutputFormat::Table => print_snapshot_table(snapshot),
    }
}

fn print_snapshot_table(snapshot: &SimSnapshot) {
    println!();
    println!("{}", "┌────────────────────────────────────────────────────────┐".bright_blue());
    println!(
        "{} t={:>7.1}s  progress {:>5.1}%  danger {:.2}  {:?}",
        "│".bright_blue(),
        snapshot.time,
        snapshot.leg_progress * 100.0,
        snapshot.danger,
        snapshot.phase
    );
    println!(
        "{} fuel {:>6.0}  altitude {:>6.0} ft",
        "│".bright_blue(),
        snapshot.fuel_remaining,
        snapshot.altitude
    );
    println!("{}", "├──────────────── sections ──────────────────────────────┤".bright_blue());
    for section in &snapshot.sections {
        let integrity = format!("{:>5.1}", section.integrity());
        let integrity = if section.integrity() < 25.0 {
            integrity.red()
        } else if section.integrity() < 60.0 {
            integrity.yellow()
        } else {
            integrity.green()
        };
        let fire = if section.is_on_fire() { "FIRE".red().bold() } else { "".normal() };
        println!("{} {:<12} {} {}", "│".bright_blue(), section.id(), integrity, fire);
    }
    println!("{}", "├──────────────── systems ───────────────────────────────┤".bright_blue());
    for system in &snapshot.systems {
        let status = format!("{:?}", system.status());
        let feathered = if system.is_feathered() { " feathered" } else { "" };
        println!(
            "{} {:<12} {:>5.1} {:<11}{}{}",
            "│".bright_blue(),
            system.id(),
            system.integrity(),
            status,
            feathered,
            if system.is_on_fire() { " FIRE" } else { "" }
        );
    }
    println!("{}", "├──────────────── crew ──────────────────────────────────┤".bright_blue());
    for member in &snapshot.crew {
        let action = match (&member.action, &member.action_target) {
            (Some(action), Some(target)) => format!("{action:?} {target}"),
            _ => "-".to_string(),
        };
        println!(
            "{} {:<11} {:<11} {:<18} {}",
            "│".bright_blue(),
            member.id,
            format!("{:?}", member.status),
            member.station_id,
            action
        );
    }
    println!(
        "{} kits: {} extinguishers, {} medical, {} repair",
        "│".bright_blue(),
        snapshot.consumables.extinguishers,
        snapshot.consumables.medical_kits,
        snapshot.consumables.repair_kits
    );
    println!("{}", "└────────────────────────────────────────────────────────┘".bright_blue());
}
