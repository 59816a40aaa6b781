//! Bridge and service tests without a broker

use mix_scrims::amqp::handlers::process_delivery;
use mix_scrims::amqp::messages::{BridgeMessage, MessageEnvelope, BRIDGE_ROUTING_KEY};
use mix_scrims::amqp::MockEffectPublisher;
use mix_scrims::config::AppConfig;
use mix_scrims::match_flow::{Menu, Notice};
use mix_scrims::service::{AppState, HealthCheck, HealthStatus};
use mix_scrims::{Effect, Issuer, MatchEvent, MatchPhase, PlayerDirectory, PlayerInfo, Team};
use std::sync::Arc;

fn offline_app(minimum_ready: usize) -> (AppState, Arc<MockEffectPublisher>) {
    let mut config = AppConfig::with_defaults();
    config.service.rng_seed = Some(11);
    config.mix.minimum_ready_players = minimum_ready;
    let publisher = Arc::new(MockEffectPublisher::new());
    let state = AppState::without_broker(config, publisher.clone()).unwrap();
    (state, publisher)
}

fn delivery(message: BridgeMessage) -> Vec<u8> {
    MessageEnvelope::new(message, BRIDGE_ROUTING_KEY.to_string())
        .to_bytes()
        .unwrap()
}

fn command(player: u64, line: &str) -> Vec<u8> {
    delivery(BridgeMessage::Game {
        event: MatchEvent::Command {
            issuer: Issuer::player(player),
            line: line.to_string(),
        },
    })
}

#[tokio::test]
async fn test_deliveries_drive_lobby_into_map_vote() {
    let (state, publisher) = offline_app(2);
    let bridge = state.bridge();

    for (id, name, team) in [(1, "Alice", Team::CT), (2, "Bob", Team::T)] {
        let name = process_delivery(
            &bridge,
            &delivery(BridgeMessage::PlayerConnected {
                player: PlayerInfo::human(id, name, team),
            }),
        )
        .await
        .unwrap();
        assert_eq!(name, "player_connected");
    }
    assert_eq!(state.directory().connected_count(), 2);

    process_delivery(&bridge, &command(1, "!ready")).await.unwrap();
    process_delivery(&bridge, &command(2, ".r")).await.unwrap();

    assert_eq!(
        state.orchestrator().lock().await.phase(),
        MatchPhase::MapVoting
    );

    let published = publisher.published();
    assert!(published.iter().any(|e| matches!(
        e,
        Effect::Broadcast {
            notice: Notice::MapVotingStarted { .. }
        }
    )));
    let vote_menus = published
        .iter()
        .filter(|e| matches!(e, Effect::OpenMenu { menu: Menu::MapVote { .. }, .. }))
        .count();
    assert_eq!(vote_menus, 2);

    println!("✅ Bridge deliveries into map vote test passed");
}

#[tokio::test]
async fn test_malformed_deliveries_are_rejected() {
    let (state, publisher) = offline_app(2);
    let bridge = state.bridge();

    assert!(process_delivery(&bridge, b"not json").await.is_err());
    assert!(process_delivery(&bridge, &command(1, "   ")).await.is_err());
    assert!(process_delivery(
        &bridge,
        &delivery(BridgeMessage::PlayerConnected {
            player: PlayerInfo::human(3, " ", Team::CT),
        })
    )
    .await
    .is_err());

    assert!(publisher.published().is_empty());
    assert_eq!(state.directory().connected_count(), 0);
    assert_eq!(state.orchestrator().lock().await.phase(), MatchPhase::Warmup);

    println!("✅ Malformed delivery test passed");
}

#[tokio::test]
async fn test_disconnect_leaves_directory_and_ready_roster() {
    let (state, _publisher) = offline_app(4);
    let bridge = state.bridge();

    process_delivery(
        &bridge,
        &delivery(BridgeMessage::PlayerConnected {
            player: PlayerInfo::human(5, "Carol", Team::CT),
        }),
    )
    .await
    .unwrap();
    process_delivery(&bridge, &command(5, "!r")).await.unwrap();
    assert_eq!(state.orchestrator().lock().await.ready().len(), 1);

    process_delivery(
        &bridge,
        &delivery(BridgeMessage::PlayerDisconnected {
            player_id: 5,
            name: "Carol".to_string(),
        }),
    )
    .await
    .unwrap();

    assert!(!state.directory().is_connected(5));
    assert!(state.orchestrator().lock().await.ready().is_empty());

    println!("✅ Disconnect mirroring test passed");
}

#[tokio::test]
async fn test_health_reports_match_snapshot() {
    let (state, _publisher) = offline_app(2);
    let bridge = state.bridge();

    process_delivery(
        &bridge,
        &delivery(BridgeMessage::PlayerConnected {
            player: PlayerInfo::human(1, "Alice", Team::CT),
        }),
    )
    .await
    .unwrap();
    process_delivery(&bridge, &command(1, "!ready")).await.unwrap();

    let target = state.health_target();
    assert!(!target.is_running().await);

    let health = HealthCheck::check(&target).await.unwrap();
    assert_eq!(health.status, HealthStatus::Unhealthy);
    assert_eq!(health.status_snapshot.connected, 1);
    assert_eq!(health.status_snapshot.ready, 1);
    assert_eq!(health.status_snapshot.required, 2);
    assert_eq!(health.stats.commands_accepted, 1);

    let json = health.to_json().unwrap();
    assert!(json.contains("\"amqp_connection\""));

    println!("✅ Health snapshot test passed");
}

#[tokio::test]
async fn test_concurrent_deliveries_are_serialized() {
    let (state, publisher) = offline_app(10);
    let bridge = Arc::new(state.bridge());

    let handles: Vec<_> = (1..=10u64)
        .map(|id| {
            let bridge = bridge.clone();
            tokio::spawn(async move {
                let team = if id % 2 == 1 { Team::CT } else { Team::T };
                process_delivery(
                    bridge.as_ref(),
                    &delivery(BridgeMessage::PlayerConnected {
                        player: PlayerInfo::human(id, format!("player{}", id), team),
                    }),
                )
                .await?;
                process_delivery(bridge.as_ref(), &command(id, "!ready")).await
            })
        })
        .collect();

    let results = futures::future::join_all(handles).await;
    for result in results {
        tokio_test::assert_ok!(result.unwrap());
    }

    let orchestrator = state.orchestrator();
    let orchestrator = orchestrator.lock().await;
    assert_eq!(orchestrator.phase(), MatchPhase::MapVoting);
    assert_eq!(orchestrator.stats().commands_accepted, 10);
    drop(orchestrator);

    let ready_notices = publisher
        .published()
        .iter()
        .filter(|e| matches!(e, Effect::Broadcast { notice: Notice::PlayerReady { .. } }))
        .count();
    assert_eq!(ready_notices, 10);

    println!("✅ Concurrent delivery test passed");
}
