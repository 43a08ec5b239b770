//! Wire protocol and entity types shared between the arena server and its clients.
//!
//! Every WebSocket text frame carries one JSON object of the shape
//! `{"event": "<name>", "data": <payload>}`. Field names follow the browser
//! client's camelCase convention.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Connection-scoped player identifier. A player's id is the id of the
/// connection that joined it.
pub type PlayerId = u32;

/// Identifier for brainrots, powerups and bullets.
pub type EntityId = u64;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PowerupKind {
    Speed,
    Shield,
    Invincible,
    Health,
}

impl PowerupKind {
    pub const ALL: [PowerupKind; 4] = [
        PowerupKind::Speed,
        PowerupKind::Shield,
        PowerupKind::Invincible,
        PowerupKind::Health,
    ];

    /// Timed powerups occupy the player's single powerup slot; health is instant.
    pub fn is_timed(self) -> bool {
        !matches!(self, PowerupKind::Health)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub rotation: f32,
    pub health: i32,
    pub max_health: i32,
    pub ammo: u32,
    pub max_ammo: u32,
    pub score: u32,
    pub kills: u32,
    pub deaths: u32,
    pub streak: u32,
    pub is_alive: bool,
    pub powerup: Option<PowerupKind>,
    /// Remaining duration of the active powerup in milliseconds.
    pub powerup_time: i64,
    pub invincible: bool,
    pub shield: bool,
    pub speed_boost: bool,
    pub crouching: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: String, x: f32, y: f32, max_health: i32, max_ammo: u32) -> Self {
        Self {
            id,
            name,
            x,
            y,
            z: 0.0,
            rotation: 0.0,
            health: max_health,
            max_health,
            ammo: max_ammo,
            max_ammo,
            score: 0,
            kills: 0,
            deaths: 0,
            streak: 0,
            is_alive: true,
            powerup: None,
            powerup_time: 0,
            invincible: false,
            shield: false,
            speed_boost: false,
            crouching: false,
        }
    }

    /// Subtracts `amount` from health, clamped to `[0, max_health]`.
    ///
    /// Returns true only on the hit that takes the player from alive to dead.
    /// Dead players ignore further damage.
    pub fn apply_damage(&mut self, amount: i32) -> bool {
        if !self.is_alive {
            return false;
        }

        self.health = self.health.saturating_sub(amount).clamp(0, self.max_health);

        if self.health == 0 {
            self.is_alive = false;
            self.deaths += 1;
            self.streak = 0;
            return true;
        }

        false
    }

    pub fn heal(&mut self, amount: i32) {
        self.health = self.health.saturating_add(amount).clamp(0, self.max_health);
    }

    /// Consumes one round. Returns false when the magazine is empty.
    pub fn consume_ammo(&mut self) -> bool {
        if self.ammo == 0 {
            return false;
        }
        self.ammo -= 1;
        true
    }

    pub fn reload(&mut self) {
        self.ammo = self.max_ammo;
    }

    /// Activates a timed powerup, replacing whichever one was active.
    pub fn grant_powerup(&mut self, kind: PowerupKind, duration_ms: i64) {
        self.clear_powerup();
        match kind {
            PowerupKind::Speed => self.speed_boost = true,
            PowerupKind::Shield => self.shield = true,
            PowerupKind::Invincible => self.invincible = true,
            PowerupKind::Health => return,
        }
        self.powerup = Some(kind);
        self.powerup_time = duration_ms;
    }

    pub fn clear_powerup(&mut self) {
        self.powerup = None;
        self.powerup_time = 0;
        self.speed_boost = false;
        self.shield = false;
        self.invincible = false;
    }

    /// Counts the active powerup down by `elapsed_ms`, clearing it on expiry.
    /// Returns true if the powerup expired during this call.
    pub fn decay_powerup(&mut self, elapsed_ms: i64) -> bool {
        if self.powerup_time <= 0 {
            return false;
        }

        self.powerup_time -= elapsed_ms;
        if self.powerup_time <= 0 {
            self.clear_powerup();
            return true;
        }

        false
    }
}

/// Collectible worth score when picked up.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Brainrot {
    pub id: EntityId,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub collected: bool,
    pub owner: Option<PlayerId>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Powerup {
    pub id: EntityId,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    #[serde(rename = "type")]
    pub kind: PowerupKind,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bullet {
    pub id: EntityId,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub rotation: f32,
    pub player_id: PlayerId,
    pub damage: i32,
}

/// Full world state. `game_active` is only present in the join-time snapshot.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub players: Vec<Player>,
    pub brainrots: Vec<Brainrot>,
    pub powerups: Vec<Powerup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_active: Option<bool>,
    pub game_time: u64,
}

/// Events sent by browser clients.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    JoinGame {
        #[serde(default)]
        name: Option<String>,
    },
    PlayerMove {
        x: f32,
        y: f32,
        #[serde(default)]
        z: f32,
        #[serde(default)]
        rotation: f32,
        #[serde(default)]
        crouching: bool,
    },
    Shoot {},
    #[serde(rename_all = "camelCase")]
    PlayerHit {
        player_id: PlayerId,
        #[serde(default)]
        killer_id: Option<PlayerId>,
        damage: i32,
    },
    #[serde(rename_all = "camelCase")]
    CollectBrainrot { brainrot_id: EntityId },
    #[serde(rename_all = "camelCase")]
    CollectPowerup { powerup_id: EntityId },
    Reload {},
    ChatMessage { text: String },
}

/// Events pushed by the server.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    GameFull,
    GameState(Snapshot),
    PlayerJoined(Player),
    GameStarted,
    BulletFired(Bullet),
    #[serde(rename_all = "camelCase")]
    PlayerDied {
        player_id: PlayerId,
        killer_id: Option<PlayerId>,
    },
    #[serde(rename_all = "camelCase")]
    BrainrotCollected {
        brainrot_id: EntityId,
        player_id: PlayerId,
    },
    NewBrainrotSpawned(Brainrot),
    #[serde(rename_all = "camelCase")]
    PowerupCollected {
        powerup_id: EntityId,
        player_id: PlayerId,
        #[serde(rename = "type")]
        kind: PowerupKind,
    },
    NewPowerupSpawned(Powerup),
    ChatMessage {
        name: String,
        text: String,
        time: u64,
    },
    GameUpdate(Snapshot),
    PlayerLeft(PlayerId),
}

impl ServerEvent {
    /// Wire name of the event, as it appears in the `event` field.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::GameFull => "gameFull",
            ServerEvent::GameState(_) => "gameState",
            ServerEvent::PlayerJoined(_) => "playerJoined",
            ServerEvent::GameStarted => "gameStarted",
            ServerEvent::BulletFired(_) => "bulletFired",
            ServerEvent::PlayerDied { .. } => "playerDied",
            ServerEvent::BrainrotCollected { .. } => "brainrotCollected",
            ServerEvent::NewBrainrotSpawned(_) => "newBrainrotSpawned",
            ServerEvent::PowerupCollected { .. } => "powerupCollected",
            ServerEvent::NewPowerupSpawned(_) => "newPowerupSpawned",
            ServerEvent::ChatMessage { .. } => "chatMessage",
            ServerEvent::GameUpdate(_) => "gameUpdate",
            ServerEvent::PlayerLeft(_) => "playerLeft",
        }
    }
}

/// Decodes one client frame. Payload-less events may omit `data` or send `null`.
pub fn decode_client_event(text: &str) -> Result<ClientEvent, serde_json::Error> {
    let mut value: Value = serde_json::from_str(text)?;
    if let Value::Object(map) = &mut value {
        let missing = map.get("data").map_or(true, Value::is_null);
        if missing {
            map.insert("data".to_string(), Value::Object(Default::default()));
        }
    }
    serde_json::from_value(value)
}

pub fn encode_server_event(event: &ServerEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

pub fn encode_client_event(event: &ClientEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

pub fn decode_server_event(text: &str) -> Result<ServerEvent, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use serde_json::json;

    fn player() -> Player {
        Player::new(1, "tester".to_string(), 100.0, 200.0, 100, 30)
    }

    #[test]
    fn test_player_creation() {
        let player = player();
        assert_eq!(player.id, 1);
        assert_eq!(player.health, 100);
        assert_eq!(player.ammo, 30);
        assert!(player.is_alive);
        assert!(player.powerup.is_none());
        assert_eq!(player.z, 0.0);
    }

    #[test]
    fn test_damage_clamps_and_kills_once() {
        let mut player = player();
        assert!(!player.apply_damage(60));
        assert_eq!(player.health, 40);

        assert!(player.apply_damage(1000));
        assert_eq!(player.health, 0);
        assert!(!player.is_alive);
        assert_eq!(player.deaths, 1);

        assert!(!player.apply_damage(25));
        assert_eq!(player.health, 0);
        assert_eq!(player.deaths, 1);
    }

    #[test]
    fn test_negative_damage_never_exceeds_max_health() {
        let mut player = player();
        player.apply_damage(-500);
        assert_eq!(player.health, player.max_health);
    }

    #[test]
    fn test_death_resets_streak() {
        let mut player = player();
        player.streak = 4;
        player.apply_damage(100);
        assert_eq!(player.streak, 0);
    }

    #[test]
    fn test_heal_is_clamped() {
        let mut player = player();
        player.health = 60;
        player.heal(50);
        assert_eq!(player.health, 100);
    }

    #[test]
    fn test_ammo_consumption_and_reload() {
        let mut player = player();
        player.ammo = 1;
        assert!(player.consume_ammo());
        assert_eq!(player.ammo, 0);
        assert!(!player.consume_ammo());
        assert_eq!(player.ammo, 0);

        player.reload();
        assert_eq!(player.ammo, player.max_ammo);
    }

    #[test]
    fn test_single_active_powerup() {
        let mut player = player();
        player.grant_powerup(PowerupKind::Shield, 10_000);
        player.grant_powerup(PowerupKind::Speed, 10_000);

        assert_eq!(player.powerup, Some(PowerupKind::Speed));
        assert!(player.speed_boost);
        assert!(!player.shield);
        assert!(!player.invincible);
    }

    #[test]
    fn test_health_powerup_does_not_occupy_slot() {
        let mut player = player();
        player.grant_powerup(PowerupKind::Invincible, 10_000);
        player.grant_powerup(PowerupKind::Health, 10_000);
        assert!(player.powerup.is_none());
        assert!(!player.invincible);
    }

    #[test]
    fn test_powerup_decay() {
        let mut player = player();
        player.grant_powerup(PowerupKind::Invincible, 250);

        assert!(!player.decay_powerup(100));
        assert_eq!(player.powerup_time, 150);
        assert!(!player.decay_powerup(100));
        assert!(player.decay_powerup(100));

        assert!(player.powerup.is_none());
        assert!(!player.invincible);
        assert_eq!(player.powerup_time, 0);
        assert!(!player.decay_powerup(100));
    }

    #[test]
    fn test_player_wire_field_names() {
        let value = serde_json::to_value(player()).unwrap();
        for key in ["maxHealth", "maxAmmo", "isAlive", "powerupTime", "speedBoost"] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(value["powerup"], json!(null));
    }

    #[test]
    fn test_decode_join_without_name() {
        let event = decode_client_event(r#"{"event":"joinGame","data":{}}"#).unwrap();
        assert_eq!(event, ClientEvent::JoinGame { name: None });
    }

    #[test]
    fn test_decode_payloadless_events() {
        assert_eq!(
            decode_client_event(r#"{"event":"shoot"}"#).unwrap(),
            ClientEvent::Shoot {}
        );
        assert_eq!(
            decode_client_event(r#"{"event":"reload","data":null}"#).unwrap(),
            ClientEvent::Reload {}
        );
    }

    #[test]
    fn test_decode_move_defaults() {
        let event =
            decode_client_event(r#"{"event":"playerMove","data":{"x":412.5,"y":96.25}}"#).unwrap();
        match event {
            ClientEvent::PlayerMove {
                x,
                y,
                z,
                rotation,
                crouching,
            } => {
                assert_approx_eq!(x, 412.5);
                assert_approx_eq!(y, 96.25);
                assert_approx_eq!(z, 0.0);
                assert_approx_eq!(rotation, 0.0);
                assert!(!crouching);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_player_hit() {
        let event = decode_client_event(
            r#"{"event":"playerHit","data":{"playerId":2,"killerId":1,"damage":25}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::PlayerHit {
                player_id: 2,
                killer_id: Some(1),
                damage: 25
            }
        );
    }

    #[test]
    fn test_decode_rejects_unknown_event() {
        assert!(decode_client_event(r#"{"event":"teleport","data":{}}"#).is_err());
        assert!(decode_client_event("not json").is_err());
    }

    #[test]
    fn test_powerup_collected_wire_shape() {
        let event = ServerEvent::PowerupCollected {
            powerup_id: 7,
            player_id: 3,
            kind: PowerupKind::Shield,
        };
        let value: Value = serde_json::from_str(&encode_server_event(&event).unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"event": "powerupCollected", "data": {"powerupId": 7, "playerId": 3, "type": "shield"}})
        );
    }

    #[test]
    fn test_unit_and_newtype_events() {
        let full: Value = serde_json::to_value(ServerEvent::GameFull).unwrap();
        assert_eq!(full["event"], "gameFull");

        let left: Value = serde_json::to_value(ServerEvent::PlayerLeft(9)).unwrap();
        assert_eq!(left, json!({"event": "playerLeft", "data": 9}));
    }

    #[test]
    fn test_update_snapshot_omits_game_active() {
        let snapshot = Snapshot {
            players: vec![],
            brainrots: vec![],
            powerups: vec![],
            game_active: None,
            game_time: 1200,
        };
        let value = serde_json::to_value(ServerEvent::GameUpdate(snapshot)).unwrap();
        assert!(value["data"].get("gameActive").is_none());
        assert_eq!(value["data"]["gameTime"], 1200);
    }

    #[test]
    fn test_event_name_matches_wire_tag() {
        let events = vec![
            ServerEvent::GameStarted,
            ServerEvent::PlayerDied {
                player_id: 1,
                killer_id: None,
            },
            ServerEvent::ChatMessage {
                name: "a".to_string(),
                text: "b".to_string(),
                time: 0,
            },
        ];
        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["event"], event.name());
        }
    }
}
