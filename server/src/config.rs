//! Tunable game rules. Defaults match the classic brainrot arena ruleset.

use std::ops::Range;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Players allowed in the session at once
    pub max_players: usize,
    /// Player count that starts a round when no round is running
    pub start_threshold: usize,
    pub brainrot_count: usize,
    pub powerup_count: usize,
    pub brainrot_respawn_delay: Duration,
    pub powerup_respawn_delay: Duration,
    pub tick_period: Duration,
    /// Spawn area on the x axis
    pub spawn_x: Range<f32>,
    /// Spawn area on the y axis
    pub spawn_y: Range<f32>,
    pub max_health: i32,
    pub max_ammo: u32,
    pub bullet_damage: i32,
    /// Distance in front of the shooter at which bullets appear
    pub muzzle_offset: f32,
    pub bullet_lifetime: Duration,
    pub kill_score: u32,
    pub streak_bonus: u32,
    pub streak_threshold: u32,
    pub brainrot_score: u32,
    pub powerup_duration: Duration,
    pub health_powerup_amount: i32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_players: 10,
            start_threshold: 2,
            brainrot_count: 10,
            powerup_count: 5,
            brainrot_respawn_delay: Duration::from_millis(2000),
            powerup_respawn_delay: Duration::from_millis(5000),
            tick_period: Duration::from_millis(100),
            spawn_x: 100.0..900.0,
            spawn_y: 100.0..700.0,
            max_health: 100,
            max_ammo: 30,
            bullet_damage: 25,
            muzzle_offset: 15.0,
            bullet_lifetime: Duration::from_millis(3000),
            kill_score: 10,
            streak_bonus: 50,
            streak_threshold: 3,
            brainrot_score: 50,
            powerup_duration: Duration::from_millis(10_000),
            health_powerup_amount: 50,
        }
    }
}

impl GameConfig {
    pub fn tick_millis(&self) -> i64 {
        self.tick_period.as_millis() as i64
    }

    /// Score a killer earns for a kill that brought their streak to `streak`.
    pub fn kill_reward(&self, streak: u32) -> u32 {
        if streak >= self.streak_threshold {
            self.kill_score + self.streak_bonus
        } else {
            self.kill_score
        }
    }
}

/// Transport-level settings for the WebSocket server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_connections: usize,
    /// Seed for spawn randomness. `None` seeds from entropy.
    pub seed: Option<u64>,
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            max_connections: 64,
            seed: None,
            game: GameConfig::default(),
        }
    }
}
