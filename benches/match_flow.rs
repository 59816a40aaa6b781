//! Performance benchmarks for the match flow

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mix_scrims::amqp::messages::{BridgeMessage, MessageEnvelope, BRIDGE_ROUTING_KEY};
use mix_scrims::amqp::{handlers::process_delivery, MockEffectPublisher};
use mix_scrims::config::{default_map_catalog, AppConfig};
use mix_scrims::match_flow::{Effect, MatchEvent, MenuSelection, Menu};
use mix_scrims::service::AppState;
use mix_scrims::voting::MapVoteTally;
use mix_scrims::{
    InMemoryPlayerDirectory, Issuer, MatchOrchestrator, MatchPhase, PlayerInfo, SideChoice, Team,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;

fn ten_players() -> Arc<InMemoryPlayerDirectory> {
    Arc::new(InMemoryPlayerDirectory::with_players((1..=10).map(|id| {
        let team = if id % 2 == 1 { Team::CT } else { Team::T };
        PlayerInfo::human(id, format!("player{}", id), team)
    })))
}

/// Answer every draft and side menu with the first option
fn answer_menus(orchestrator: &mut MatchOrchestrator, mut effects: Vec<Effect>) {
    while !effects.is_empty() {
        let mut next = Vec::new();
        for effect in effects {
            let Effect::OpenMenu { player, menu } = effect else {
                continue;
            };
            let selection = match menu {
                Menu::DraftPick { pool, .. } => match pool.first() {
                    Some(pick) => MenuSelection::DraftPick { player: pick.id },
                    None => continue,
                },
                Menu::SidePick => MenuSelection::Side {
                    choice: SideChoice::Stay,
                },
                _ => continue,
            };
            next.extend(orchestrator.handle(MatchEvent::MenuSelection { player, selection }));
        }
        effects = next;
    }
}

/// Warmup to the final reset with ten human players
fn play_full_match(seed: u64) -> MatchOrchestrator {
    let config = AppConfig::with_defaults();
    let mut orchestrator = MatchOrchestrator::with_seed(&config, ten_players(), seed);

    for id in 1..=10 {
        orchestrator.handle(MatchEvent::Command {
            issuer: Issuer::player(id),
            line: "!ready".to_string(),
        });
    }
    orchestrator.advance(Duration::from_secs(35));
    let map = orchestrator
        .vote_options()
        .first()
        .map(|m| m.name.clone())
        .unwrap_or_default();
    orchestrator.handle(MatchEvent::MapStarted { map });
    orchestrator.advance(Duration::from_secs(60));

    let mut effects = Vec::new();
    for id in 1..=10 {
        effects.extend(orchestrator.handle(MatchEvent::Command {
            issuer: Issuer::player(id),
            line: "!ready".to_string(),
        }));
    }
    answer_menus(&mut orchestrator, effects);

    let effects = orchestrator.handle(MatchEvent::RoundEnded { winner: Team::CT });
    answer_menus(&mut orchestrator, effects);
    orchestrator.advance(Duration::from_secs(1));

    for round in 1..=24 {
        orchestrator.handle(MatchEvent::RoundPrestart);
        orchestrator.handle(MatchEvent::RoundStart);
        orchestrator.advance(Duration::from_secs(75));
        let winner = if round % 3 == 0 { Team::T } else { Team::CT };
        orchestrator.handle(MatchEvent::RoundEnded { winner });
        if round == 12 {
            orchestrator.handle(MatchEvent::Halftime);
        }
    }
    orchestrator.handle(MatchEvent::MatchEnded);
    orchestrator.advance(Duration::from_secs(20));
    debug_assert_eq!(orchestrator.phase(), MatchPhase::Warmup);
    orchestrator
}

fn bench_vote_resolution(c: &mut Criterion) {
    let maps = default_map_catalog();
    let mut group = c.benchmark_group("map_vote_resolution");

    for voters in [10u64, 32, 64] {
        let mut tally = MapVoteTally::new();
        for voter in 0..voters {
            tally.register_vote(voter, &maps[(voter as usize * 7) % maps.len()]);
        }
        group.bench_with_input(BenchmarkId::from_parameter(voters), &tally, |b, tally| {
            let mut rng = StdRng::seed_from_u64(1);
            b.iter(|| black_box(tally.resolve(&maps, &mut rng)))
        });
    }

    group.bench_function("no_ballots", |b| {
        let tally = MapVoteTally::new();
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| black_box(tally.resolve(&maps, &mut rng)))
    });
    group.finish();
}

fn bench_full_match(c: &mut Criterion) {
    c.bench_function("full_match_lifecycle_10_players", |b| {
        let mut seed = 0u64;
        b.iter(|| {
            seed = seed.wrapping_add(1);
            black_box(play_full_match(seed).stats().phase_transitions)
        })
    });
}

fn bench_timeline_advance(c: &mut Criterion) {
    c.bench_function("idle_warmup_tick", |b| {
        let config = AppConfig::with_defaults();
        let mut orchestrator = MatchOrchestrator::with_seed(&config, ten_players(), 3);
        orchestrator.handle(MatchEvent::MapStarted {
            map: "de_mirage".to_string(),
        });
        b.iter(|| black_box(orchestrator.advance(Duration::from_millis(100))))
    });
}

fn bench_bridge_delivery(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let app_state =
        AppState::without_broker(AppConfig::with_defaults(), Arc::new(MockEffectPublisher::new()))
            .unwrap();
    let bridge = app_state.bridge();

    let payload = MessageEnvelope::new(
        BridgeMessage::Game {
            event: MatchEvent::Command {
                issuer: Issuer::Console,
                line: "maps".to_string(),
            },
        },
        BRIDGE_ROUTING_KEY.to_string(),
    )
    .to_bytes()
    .unwrap();

    c.bench_function("bridge_delivery_command", |b| {
        b.iter(|| rt.block_on(async { black_box(process_delivery(&bridge, &payload).await) }))
    });
}

criterion_group!(
    benches,
    bench_vote_resolution,
    bench_full_match,
    bench_timeline_advance,
    bench_bridge_delivery
);
criterion_main!(benches);
