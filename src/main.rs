use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lift_autopilot::ascent::{AscentPhase, UpStatus};
use lift_autopilot::commands::CommandAdapter;
use lift_autopilot::io::{csv, json};
use lift_autopilot::sim::{presets, simulate, SimConfig};
use lift_autopilot::{Autopilot, Tunables};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Preset {
    Hauler,
    IonLifter,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Prefer {
    Hydrogen,
    Ion,
}

#[derive(Parser, Debug)]
#[command(name = "lift-autopilot")]
#[command(about = "Flies a simulated vessel from the ground out of the gravity well")]
#[command(version)]
struct Args {
    /// Vessel to fly
    #[arg(short, long, value_enum, default_value = "hauler")]
    preset: Preset,

    /// Second thruster class to bring in after atmospheric
    #[arg(long, value_enum, default_value = "hydrogen")]
    prefer: Prefer,

    /// Integration step, s
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f64,

    #[arg(long, default_value_t = 1200.0)]
    max_time: f64,

    /// Keep integrating after the autopilot stops, s
    #[arg(long, default_value_t = 0.0)]
    coast: f64,

    /// Command script run before launch, e.g. "pitchclip=0.1|gyrolimitrpm=30"
    #[arg(short, long)]
    commands: Option<String>,

    /// Settings store: loaded before the script, rewritten after it
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Write the sampled flight as CSV
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Write the flight summary as JSON
    #[arg(long)]
    json: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if !(args.dt > 0.0 && args.dt.is_finite()) {
        bail!("dt must be a positive number, got {}", args.dt);
    }

    let mut vessel = match args.preset {
        Preset::Hauler => presets::hauler(),
        Preset::IonLifter => presets::ion_lifter(),
    };
    let mut autopilot = Autopilot::new(Tunables::default(), Instant::now());

    // -----------------------------------------------------------------------
    // Settings and commands
    // -----------------------------------------------------------------------
    let mut adapter = CommandAdapter::default();
    if let Some(path) = args.settings.as_ref().filter(|p| p.exists()) {
        adapter.store = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings {}", path.display()))?;
        adapter.load(&mut autopilot).context("applying stored settings")?;
        info!(path = %path.display(), "settings loaded");
    }
    if let Some(script) = &args.commands {
        if !adapter.run(&mut autopilot, script, Instant::now(), args.settings.is_some()) {
            bail!("command script had unhandled lines: {script}");
        }
    }
    if let Some(path) = &args.settings {
        if adapter.store.is_empty() {
            adapter.save(&autopilot);
        }
        std::fs::write(path, &adapter.store)
            .with_context(|| format!("writing settings {}", path.display()))?;
    }

    // -----------------------------------------------------------------------
    // Fly
    // -----------------------------------------------------------------------
    autopilot.start(Some(matches!(args.prefer, Prefer::Hydrogen)));
    let config = SimConfig { dt: args.dt, max_time: args.max_time, coast_time: args.coast };
    let samples = simulate(&mut vessel, &mut autopilot, &config);
    let Some(summary) = json::FlightSummary::from_samples(&samples) else {
        bail!("simulation produced no samples");
    };

    if let Some(path) = &args.csv {
        csv::write_trajectory_file(path, &samples)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    if let Some(path) = &args.json {
        json::write_summary_file(path, &vessel.name, &summary)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    // -----------------------------------------------------------------------
    // Print results
    // -----------------------------------------------------------------------
    let t = &autopilot.tunables;
    println!();
    println!("====================================================================");
    println!("  GRAVITY ASCENT — {}", vessel.name);
    println!("====================================================================");
    println!();
    println!("  Vessel");
    println!("  ──────────────────────────────────────────────────────────────────");
    println!(
        "  Mass:          {:>8.0} kg    Thrusters:    {:>8}",
        vessel.mass,
        vessel.thrusters.len()
    );
    println!(
        "  Gyro torque:   {:>8.0} kN·m  Gyros:        {:>8}",
        vessel.gyro_torque() / 1000.0,
        vessel.gyros.len()
    );
    println!(
        "  Prefer:        {:>8}       Cruise:       {:>8.1} m/s",
        if t.ascent.prefer_hydrogen { "hydrogen" } else { "ion" },
        t.ascent.speed_high_threshold
    );
    println!(
        "  Field limit:   {:>8.0} m     Atmosphere:   {:>8.0} m",
        vessel.planet.field_limit() - vessel.planet.radius,
        vessel.planet.atmosphere_height
    );
    println!();

    println!("  Flight Events");
    println!("  ──────────────────────────────────────────────────────────────────");
    let mut last_phase = None;
    let mut last_status = None;
    for s in &samples {
        if last_phase != Some(s.phase) || (s.phase == AscentPhase::GoingUp && last_status != Some(s.up_status)) {
            let label = if s.phase == AscentPhase::GoingUp {
                format!("{}/{}", s.phase, s.up_status)
            } else {
                s.phase.to_string()
            };
            println!(
                "  {:<28} t={:>7.1}s   alt={:>8.0}m   vs={:>7.1}m/s",
                label, s.time, s.altitude, s.vertical_speed
            );
            last_phase = Some(s.phase);
            last_status = Some(s.up_status);
        }
    }
    println!();

    println!("  Performance Summary");
    println!("  ──────────────────────────────────────────────────────────────────");
    println!(
        "  Max altitude:  {:>8.0} m   ({:.2} km)",
        summary.max_altitude,
        summary.max_altitude / 1000.0
    );
    println!("  Max climb:     {:>8.1} m/s", summary.max_vertical_speed);
    println!("  Max drift:     {:>8.3} m/s", summary.max_lateral_speed);
    println!(
        "  Min alignment: {:>8.5}   ({:.2}° off vertical)",
        summary.min_alignment,
        summary.min_alignment.clamp(-1.0, 1.0).acos().to_degrees()
    );
    if let Some(time) = summary.speed_hold_time {
        println!("  Speed hold:    {:>8.1} s", time);
    }
    match summary.free_space_time {
        Some(time) => println!("  Free space:    {:>8.1} s   completion {}", time, vessel.completed),
        None => println!("  Free space:    not reached"),
    }
    println!("  Flight time:   {:>8.1} s   final phase {}", summary.flight_time, summary.final_phase);
    println!();

    // -----------------------------------------------------------------------
    // Trajectory table (sampled)
    // -----------------------------------------------------------------------
    println!("  Trajectory");
    println!("  ──────────────────────────────────────────────────────────────────");
    println!(
        "  {:>7}  {:>9}  {:>8}  {:>8}  {:>6}  {:>9}  {:>10}",
        "t (s)", "alt (m)", "vs (m/s)", "lat(m/s)", "g", "align", "status"
    );
    println!("  {}", "─".repeat(66));

    let sample_interval = (samples.len() / 30).max(1);
    for (i, s) in samples.iter().enumerate() {
        if i % sample_interval != 0 && i != samples.len() - 1 {
            continue;
        }
        let status = match (s.phase, s.up_status) {
            (AscentPhase::GoingUp, UpStatus::SpeedHold) => "HOLD",
            (AscentPhase::GoingUp, _) => "MAX",
            (AscentPhase::Stopped, _) => "STOP",
            _ => "ALIGN",
        };
        println!(
            "  {:>7.1}  {:>9.1}  {:>8.2}  {:>8.3}  {:>6.2}  {:>9.6}  {:>10}",
            s.time, s.altitude, s.vertical_speed, s.lateral_speed, s.gravity, s.alignment, status
        );
    }

    println!();
    println!("  Simulation: {} samples, dt={:.4} s", samples.len(), config.dt);
    println!("====================================================================");
    println!();

    Ok(())
}
