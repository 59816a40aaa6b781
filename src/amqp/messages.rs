//! AMQP message definitions and serialization

use crate::error::{Result, ServiceError};
use crate::match_flow::{Effect, MatchEvent};
use crate::types::{PlayerId, PlayerInfo, Team};
use serde::{Deserialize, Serialize};

/// Default queue the game-server bridge publishes into
pub const EVENTS_QUEUE: &str = "mix.events";
/// Default topic exchange effects are published on
pub const EFFECTS_EXCHANGE: &str = "mix.effects";

/// Routing key prefix for published effects, e.g. `effect.broadcast`
pub const EFFECT_ROUTING_PREFIX: &str = "effect";
/// Routing key stamped on inbound envelopes
pub const BRIDGE_ROUTING_KEY: &str = "bridge.event";

/// Message envelope with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope<T> {
    pub payload: T,
    pub correlation_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub routing_key: String,
}

impl<T> MessageEnvelope<T>
where
    T: Serialize + serde::de::DeserializeOwned,
{
    pub fn new(payload: T, routing_key: String) -> Self {
        Self {
            payload,
            correlation_id: crate::utils::generate_correlation_id().to_string(),
            timestamp: crate::utils::current_timestamp(),
            routing_key,
        }
    }

    /// Serialize the envelope to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            ServiceError::Internal {
                message: format!("Failed to serialize message: {}", e),
            }
            .into()
        })
    }

    /// Deserialize envelope from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            ServiceError::InvalidMessage {
                reason: format!("Failed to deserialize message: {}", e),
            }
            .into()
        })
    }
}

/// What the game-server bridge sends.
///
/// Presence updates are mirrored into the player directory before the
/// matching game event reaches the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
    PlayerConnected { player: PlayerInfo },
    PlayerDisconnected { player_id: PlayerId, name: String },
    /// The engine moved a player; directory only, no orchestrator event
    PlayerTeamChanged { player_id: PlayerId, team: Team },
    Game { event: MatchEvent },
}

impl BridgeMessage {
    pub fn name(&self) -> &'static str {
        match self {
            BridgeMessage::PlayerConnected { .. } => "player_connected",
            BridgeMessage::PlayerDisconnected { .. } => "player_disconnected",
            BridgeMessage::PlayerTeamChanged { .. } => "player_team_changed",
            BridgeMessage::Game { event } => event.name(),
        }
    }
}

/// Message serialization and validation utilities
pub struct MessageUtils;

impl MessageUtils {
    /// Decode an inbound delivery and validate its payload
    pub fn decode_bridge_message(bytes: &[u8]) -> Result<MessageEnvelope<BridgeMessage>> {
        let envelope = MessageEnvelope::<BridgeMessage>::from_bytes(bytes)?;
        Self::validate_bridge_message(&envelope.payload)?;
        Ok(envelope)
    }

    pub fn validate_bridge_message(message: &BridgeMessage) -> Result<()> {
        match message {
            BridgeMessage::PlayerConnected { player } if player.name.trim().is_empty() => {
                Err(ServiceError::InvalidMessage {
                    reason: format!("Player {} has an empty name", player.id),
                }
                .into())
            }
            BridgeMessage::Game {
                event: MatchEvent::Command { line, .. },
            } if line.trim().is_empty() => Err(ServiceError::InvalidMessage {
                reason: "Command line cannot be empty".to_string(),
            }
            .into()),
            BridgeMessage::Game {
                event: MatchEvent::MapStarted { map },
            } if map.trim().is_empty() => Err(ServiceError::InvalidMessage {
                reason: "Map name cannot be empty".to_string(),
            }
            .into()),
            _ => Ok(()),
        }
    }

    /// Serialize any AMQP message to bytes
    pub fn serialize_message<T: Serialize>(message: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(message).map_err(|e| {
            ServiceError::Internal {
                message: format!("Failed to serialize message: {}", e),
            }
            .into()
        })
    }

    pub fn effect_routing_key(effect: &Effect) -> String {
        format!("{}.{}", EFFECT_ROUTING_PREFIX, effect.kind())
    }
}
