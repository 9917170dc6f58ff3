use clap::{Parser, Subcommand};
use gravwell_common::GameConfig;
use gravwell_session::{Notification, Orchestrator};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gravwell", about = "Headless gravwell session harness")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to a JSON config file (defaults used when missing)
    #[arg(short, long, default_value = "gravwell.json")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Host an authoritative session on the configured port
    Host {
        /// Stop after this many seconds (0 = run until killed)
        #[arg(short, long, default_value = "0")]
        duration: u64,
    },
    /// Join a session at the given address
    Join {
        /// Server address, e.g. 192.168.1.10:42800
        addr: SocketAddr,
        /// Stop after this many seconds (0 = run until killed)
        #[arg(short, long, default_value = "0")]
        duration: u64,
    },
    /// Broadcast a discovery probe and print every server that answers
    Discover {
        /// How long to wait for replies, in milliseconds
        #[arg(short, long, default_value = "2000")]
        wait: u64,
    },
    /// Step an offline world and print a summary
    Demo {
        /// Number of steps to simulate
        #[arg(short, long, default_value = "300")]
        steps: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = Arc::new(GameConfig::load_or_default(&cli.config)?);

    match cli.command {
        Commands::Host { duration } => {
            let mut session = Orchestrator::host(Arc::clone(&config))?;
            println!(
                "hosting '{}' on port {}",
                config.server_name, config.server_port
            );
            run_session(&mut session, &config, duration);
        }
        Commands::Join { addr, duration } => {
            println!("joining {addr} ...");
            let mut session = Orchestrator::join(Arc::clone(&config), addr)?;
            println!("connected");
            run_session(&mut session, &config, duration);
            session.shutdown();
        }
        Commands::Discover { wait } => {
            // A client role with no connection; replies surface as
            // notifications while we pump.
            let mut session = Orchestrator::browser(Arc::clone(&config))?;
            session.discover()?;
            let deadline = Instant::now() + Duration::from_millis(wait);
            let mut found = 0usize;
            while Instant::now() < deadline {
                session.step(1.0 / config.sim.reference_fps);
                for note in session.drain_notifications() {
                    if let Notification::ServerDiscovered { addr, info } = note {
                        found += 1;
                        println!(
                            "{addr}  '{}'  {}/{} players",
                            info.name, info.players, info.max_players
                        );
                    }
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            println!("{found} server(s) found");
        }
        Commands::Demo { steps } => {
            let mut session = Orchestrator::offline(Arc::clone(&config));
            let dt = 1.0 / config.sim.reference_fps;
            for _ in 0..steps {
                session.step(dt);
            }
            println!(
                "demo: frame={} entities={} running={}",
                session.frame(),
                session.world().entity_count(),
                session.is_running()
            );
        }
    }

    Ok(())
}

/// Fixed-rate loop: step, report notifications, sleep off the remainder.
fn run_session(session: &mut Orchestrator, config: &GameConfig, duration: u64) {
    let dt = 1.0 / config.sim.reference_fps;
    let tick = Duration::from_secs_f32(dt);
    let stop_at = (duration > 0).then(|| Instant::now() + Duration::from_secs(duration));

    loop {
        let started = Instant::now();
        session.step(dt);
        for note in session.drain_notifications() {
            match note {
                Notification::PlayerJoined(n) => println!("player {n} joined"),
                Notification::PlayerLeft(n) => println!("player {n} left"),
                Notification::GameStarted => println!("game started"),
                Notification::ServerDisconnected => {
                    println!("server disconnected");
                    return;
                }
                Notification::PlayerRespawned(n) => println!("player {n} respawned"),
                Notification::ServerDiscovered { .. } | Notification::ConfigChanged(_) => {}
            }
        }
        if stop_at.is_some_and(|t| Instant::now() >= t) {
            return;
        }
        std::thread::sleep(tick.saturating_sub(started.elapsed()));
    }
}
