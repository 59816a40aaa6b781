//! Match Simulator CLI Tool
//!
//! Plays one complete pick-up match against an in-memory player directory,
//! with scripted players answering every menu, and prints each effect the
//! orchestrator emits. No broker is needed and a fixed seed replays the
//! same match.
//!
//! Usage:
//!   cargo run --bin match-sim -- --help
//!   cargo run --bin match-sim -- --players 10 --seed 42
//!   cargo run --bin match-sim -- --players 6 --bots 4 --rounds 12 --json
//!   cargo run --bin match-sim -- --config config.toml --leaver

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use mix_scrims::config::{validate_config, AppConfig};
use mix_scrims::match_flow::{Effect, EngineCommand, MatchEvent, MenuSelection, Menu};
use mix_scrims::{
    Ballot, InMemoryPlayerDirectory, Issuer, MatchOrchestrator, MatchPhase, PlayerDirectory,
    PlayerId, PlayerInfo, SideChoice, Team,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "match-sim")]
#[command(about = "Offline, deterministic simulation of a full mix-scrims match")]
struct Cli {
    /// Configuration file (TOML); built-in defaults otherwise
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Human players joining the server
    #[arg(short, long, default_value = "10")]
    players: u64,

    /// Bots joining the server
    #[arg(short, long, default_value = "0")]
    bots: u64,

    /// Seed for the orchestrator and the scripted players
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Regulation rounds to play, halftime after half of them
    #[arg(short, long, default_value = "24")]
    rounds: u32,

    /// Skip the timeout a CT player calls in the first half
    #[arg(long)]
    no_timeout: bool,

    /// Have a player leave and rejoin mid-match
    #[arg(long)]
    leaver: bool,

    /// Print effects as JSON lines instead of the readable log
    #[arg(long)]
    json: bool,

    /// Log level for orchestrator tracing output
    #[arg(short, long, default_value = "warn")]
    log_level: String,
}

/// Scripted server plus players around one orchestrator
struct Simulation {
    orchestrator: MatchOrchestrator,
    directory: Arc<InMemoryPlayerDirectory>,
    rng: StdRng,
    queue: VecDeque<MatchEvent>,
    json: bool,
    effects_seen: usize,
}

impl Simulation {
    fn new(config: &AppConfig, seed: u64, json: bool) -> Self {
        let directory = Arc::new(InMemoryPlayerDirectory::new());
        let orchestrator = MatchOrchestrator::with_seed(config, directory.clone(), seed);
        Self {
            orchestrator,
            directory,
            // players must not share the orchestrator's stream
            rng: StdRng::seed_from_u64(seed.wrapping_add(1)),
            queue: VecDeque::new(),
            json,
            effects_seen: 0,
        }
    }

    fn phase(&self) -> MatchPhase {
        self.orchestrator.phase()
    }

    /// Deliver one event, then everything the scripted side answers with
    fn send(&mut self, event: MatchEvent) -> Result<()> {
        self.queue.push_back(event);
        while let Some(event) = self.queue.pop_front() {
            debug!("Sending '{}'", event.name());
            let effects = self.orchestrator.handle(event);
            self.react(effects)?;
        }
        Ok(())
    }

    /// Advance virtual time one second at a time
    fn wait(&mut self, seconds: u64) -> Result<()> {
        for _ in 0..seconds {
            let effects = self.orchestrator.advance(Duration::from_secs(1));
            self.react(effects)?;
            while let Some(event) = self.queue.pop_front() {
                let effects = self.orchestrator.handle(event);
                self.react(effects)?;
            }
        }
        Ok(())
    }

    /// Wait until `phase` is reached, giving up after `limit` seconds
    fn wait_for(&mut self, phase: MatchPhase, limit: u64) -> Result<()> {
        for _ in 0..limit {
            if self.phase() == phase {
                return Ok(());
            }
            self.wait(1)?;
        }
        if self.phase() != phase {
            bail!(
                "Expected {} within {}s, still in {}",
                phase,
                limit,
                self.phase()
            );
        }
        Ok(())
    }

    fn join(&mut self, player: PlayerInfo) -> Result<()> {
        let id = player.id;
        self.directory.connect(player);
        self.send(MatchEvent::PlayerConnected { player: id })
    }

    fn leave(&mut self, id: PlayerId) -> Result<Option<PlayerInfo>> {
        let Some(player) = self.directory.disconnect(id) else {
            return Ok(None);
        };
        self.send(MatchEvent::PlayerDisconnected {
            player: id,
            name: player.name.clone(),
        })?;
        Ok(Some(player))
    }

    fn say(&mut self, issuer: Issuer, line: &str) -> Result<()> {
        self.send(MatchEvent::Command {
            issuer,
            line: line.to_string(),
        })
    }

    fn print(&mut self, effect: &Effect) -> Result<()> {
        self.effects_seen += 1;
        let at = self.orchestrator.now().as_secs_f64();
        if self.json {
            let line = serde_json::json!({ "t": at, "effect": effect });
            println!("{}", serde_json::to_string(&line)?);
        } else {
            println!(
                "[{:>7.1}s] {:<11} {:<18} {}",
                at,
                self.phase().to_string(),
                effect.kind(),
                serde_json::to_string(effect)?
            );
        }
        Ok(())
    }

    /// Apply effects the way the game server and its players would
    fn react(&mut self, effects: Vec<Effect>) -> Result<()> {
        for effect in effects {
            self.print(&effect)?;
            match effect {
                Effect::MovePlayer { player, team } => {
                    self.directory.set_team(player, team);
                }
                Effect::Engine {
                    command:
                        EngineCommand::ChangeLevel { map }
                        | EngineCommand::WorkshopChangeLevel { map, .. },
                } => self.queue.push_back(MatchEvent::MapStarted { map }),
                Effect::OpenMenu { player, menu } => {
                    if let Some(selection) = self.answer(&menu) {
                        self.queue
                            .push_back(MatchEvent::MenuSelection { player, selection });
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn answer(&mut self, menu: &Menu) -> Option<MenuSelection> {
        match menu {
            Menu::MapVote { options } => options
                .choose(&mut self.rng)
                .map(|option| MenuSelection::MapVote {
                    map: option.name.clone(),
                }),
            Menu::DraftPick { pool, .. } => pool
                .choose(&mut self.rng)
                .map(|player| MenuSelection::DraftPick { player: player.id }),
            Menu::CaptainPick { team, pool } => {
                pool.first().map(|player| MenuSelection::CaptainPick {
                    team: *team,
                    player: player.id,
                })
            }
            Menu::SidePick => {
                let choice = if self.rng.gen_bool(0.5) {
                    SideChoice::Stay
                } else {
                    SideChoice::Switch
                };
                Some(MenuSelection::Side { choice })
            }
            Menu::TimeoutVote { .. } => {
                let ballot = if self.rng.gen_bool(0.8) {
                    Ballot::Yes
                } else {
                    Ballot::No
                };
                Some(MenuSelection::TimeoutBallot { ballot })
            }
        }
    }

    fn play_round(&mut self) -> Result<()> {
        self.send(MatchEvent::RoundPrestart)?;
        // a timeout started in freeze time runs to the end first
        while self.phase() == MatchPhase::Timeout {
            self.wait(1)?;
        }
        self.wait(15)?;
        self.send(MatchEvent::FreezeTimeEnded)?;
        self.send(MatchEvent::RoundStart)?;
        self.wait(60)?;
        let winner = if self.rng.gen_bool(0.5) {
            Team::CT
        } else {
            Team::T
        };
        self.send(MatchEvent::RoundEnded { winner })
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::with_defaults(),
    };
    config.service.rng_seed = Some(cli.seed);
    validate_config(&config)?;
    Ok(config)
}

fn run(cli: &Cli, config: &AppConfig) -> Result<Simulation> {
    let mut sim = Simulation::new(config, cli.seed, cli.json);
    let vote_window = config.mix.vote_duration_seconds + 10;

    info!("Connecting {} players and {} bots", cli.players, cli.bots);
    for id in 1..=cli.players {
        sim.join(PlayerInfo::human(id, format!("player{}", id), Team::Spectator))?;
    }
    for id in 1..=cli.bots {
        let team = if id % 2 == 0 { Team::T } else { Team::CT };
        sim.join(PlayerInfo::bot(1000 + id, format!("bot{}", id), team))?;
    }
    sim.wait(3)?;

    // warmup: everyone readies, then the map vote runs its course
    let ready_up = |sim: &mut Simulation| -> Result<()> {
        if cli.bots > 0 {
            return sim.say(Issuer::Console, "forceready");
        }
        for id in 1..=cli.players {
            sim.say(Issuer::player(id), "!ready")?;
        }
        Ok(())
    };
    ready_up(&mut sim)?;
    sim.wait_for(MatchPhase::MapVoting, 5)?;
    sim.wait_for(MatchPhase::MapChosen, vote_window)?;
    sim.wait(config.mix.captains_announcement_seconds + 35)?;

    // chosen map is up: ready again to start the draft
    ready_up(&mut sim)?;
    sim.wait_for(MatchPhase::KnifeRound, 60)?;

    let knife_winner = if sim.rng.gen_bool(0.5) {
        Team::CT
    } else {
        Team::T
    };
    sim.send(MatchEvent::RoundEnded {
        winner: knife_winner,
    })?;
    sim.wait_for(MatchPhase::Match, 10)?;

    let half = (cli.rounds / 2).max(1);
    for round in 1..=cli.rounds {
        if round == 2 && !cli.no_timeout {
            let caller = sim
                .orchestrator
                .draft()
                .playing(Team::CT)
                .iter()
                .map(|p| p.id)
                .find(|id| *id <= cli.players);
            match caller {
                Some(id) => sim.say(Issuer::player(id), "!timeout")?,
                None => warn!("No human on CT to call a timeout"),
            }
            sim.wait(config.mix.timeout_vote_seconds)?;
        }
        if round == 4 && cli.leaver {
            let leaver = sim
                .orchestrator
                .draft()
                .playing(Team::T)
                .iter()
                .map(|p| p.id)
                .find(|id| *id <= cli.players);
            if let Some(id) = leaver {
                if let Some(player) = sim.leave(id)? {
                    sim.wait(30)?;
                    sim.join(player)?;
                }
            }
        }
        sim.play_round()?;
        if round == half {
            sim.send(MatchEvent::Halftime)?;
        }
    }

    sim.send(MatchEvent::MatchEnded)?;
    sim.wait_for(MatchPhase::Warmup, 30)?;
    sim.wait(10)?;
    Ok(sim)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.as_str().into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if cli.players + cli.bots < 2 {
        bail!("A match needs at least two players");
    }
    let config = load_config(&cli)?;

    if !cli.json {
        println!("🎮 mix-scrims match simulation");
        println!(
            "   Players: {}, bots: {}, seed: {}, rounds: {}",
            cli.players, cli.bots, cli.seed, cli.rounds
        );
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let sim = run(&cli, &config)?;

    if !cli.json {
        let status = sim.orchestrator.status();
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("✅ Simulation finished in {}", status.phase);
        println!("   Effects: {}", sim.effects_seen);
        println!(
            "   Connected: {}, played maps: {}",
            sim.directory.connected_count(),
            sim.orchestrator
                .history()
                .maps()
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!(
            "   Counters: {}",
            serde_json::to_string_pretty(sim.orchestrator.stats())?
        );
    }
    Ok(())
}
