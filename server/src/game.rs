use crate::config::GameConfig;
use log::info;
use shared::{Brainrot, Bullet, EntityId, Player, PlayerId, Powerup, PowerupKind, Snapshot};
use std::collections::HashMap;
use std::time::Instant;

/// A bullet together with the game time (ms) it was fired at.
#[derive(Debug, Clone)]
pub struct TrackedBullet {
    pub bullet: Bullet,
    pub fired_at: u64,
}

/// Authoritative world state for one session.
#[derive(Debug, Clone)]
pub struct GameState {
    pub tick: u32,
    pub players: HashMap<PlayerId, Player>,
    pub brainrots: Vec<Brainrot>,
    pub powerups: Vec<Powerup>,
    pub bullets: Vec<TrackedBullet>,
    pub active: bool,
    /// Milliseconds since the current round started
    pub game_time: u64,
    started_at: Option<Instant>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    pub fn new() -> Self {
        Self {
            tick: 0,
            players: HashMap::new(),
            brainrots: Vec::new(),
            powerups: Vec::new(),
            bullets: Vec::new(),
            active: false,
            game_time: 0,
            started_at: None,
        }
    }

    /// Inserts a player, replacing any previous entry with the same id.
    pub fn add_player(&mut self, player: Player) {
        info!(
            "Added player {} ({}) at ({:.1}, {:.1})",
            player.id, player.name, player.x, player.y
        );
        self.players.insert(player.id, player);
    }

    /// Removes a player and returns it.
    ///
    /// Brainrots they own keep the dangling owner id; it is only used for
    /// display and is never looked up again.
    pub fn remove_player(&mut self, player_id: &PlayerId) -> Option<Player> {
        let removed = self.players.remove(player_id);
        if removed.is_some() {
            info!("Removed player {}", player_id);
        }
        removed
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Returns the player only if they exist and are alive.
    pub fn living_player_mut(&mut self, player_id: PlayerId) -> Option<&mut Player> {
        self.players
            .get_mut(&player_id)
            .filter(|player| player.is_alive)
    }

    /// Clears all world entities and starts the round clock at `now`.
    /// Players are kept.
    pub fn begin_round(&mut self, now: Instant) {
        self.brainrots.clear();
        self.powerups.clear();
        self.bullets.clear();
        self.active = true;
        self.game_time = 0;
        self.started_at = Some(now);
    }

    /// Stops the round clock. World entities stay until the next
    /// [`GameState::begin_round`]; bullets in flight are dropped.
    pub fn end_round(&mut self) {
        self.active = false;
        self.bullets.clear();
    }

    /// Recomputes `game_time` as the time elapsed since the round started.
    /// Does nothing before the first round.
    pub fn advance_clock(&mut self, now: Instant) {
        if let Some(started_at) = self.started_at {
            self.game_time = now.saturating_duration_since(started_at).as_millis() as u64;
        }
    }

    /// Places a fresh, uncollected brainrot and returns a copy for broadcasting.
    pub fn spawn_brainrot(&mut self, id: EntityId, x: f32, y: f32) -> Brainrot {
        let brainrot = Brainrot {
            id,
            x,
            y,
            z: 0.0,
            collected: false,
            owner: None,
        };
        self.brainrots.push(brainrot.clone());
        brainrot
    }

    pub fn spawn_powerup(&mut self, id: EntityId, x: f32, y: f32, kind: PowerupKind) -> Powerup {
        let powerup = Powerup {
            id,
            x,
            y,
            z: 0.0,
            kind,
        };
        self.powerups.push(powerup.clone());
        powerup
    }

    /// Marks a brainrot as collected by `player_id`. Returns false if it does
    /// not exist or was already collected.
    pub fn collect_brainrot(&mut self, brainrot_id: EntityId, player_id: PlayerId) -> bool {
        match self
            .brainrots
            .iter_mut()
            .find(|b| b.id == brainrot_id && !b.collected)
        {
            Some(brainrot) => {
                brainrot.collected = true;
                brainrot.owner = Some(player_id);
                true
            }
            None => false,
        }
    }

    /// Brainrots still available for pickup.
    pub fn live_brainrots(&self) -> usize {
        self.brainrots.iter().filter(|b| !b.collected).count()
    }

    /// Removes a powerup from the world. Returns `None` if someone else
    /// already took it.
    pub fn take_powerup(&mut self, powerup_id: EntityId) -> Option<Powerup> {
        let index = self.powerups.iter().position(|p| p.id == powerup_id)?;
        Some(self.powerups.remove(index))
    }

    /// Fires a bullet from the player's muzzle if they are alive and have ammo.
    ///
    /// The bullet is returned for broadcasting either way, but it is only
    /// tracked for expiry while a round is running. Outside a round the clock
    /// is frozen and nothing would ever prune it.
    pub fn fire_bullet(
        &mut self,
        player_id: PlayerId,
        bullet_id: EntityId,
        config: &GameConfig,
    ) -> Option<Bullet> {
        let player = self.players.get_mut(&player_id).filter(|p| p.is_alive)?;
        if !player.consume_ammo() {
            return None;
        }

        let (dx, dy) = muzzle_offset(player.rotation, config.muzzle_offset);
        let bullet = Bullet {
            id: bullet_id,
            x: player.x + dx,
            y: player.y + dy,
            z: player.z,
            rotation: player.rotation,
            player_id,
            damage: config.bullet_damage,
        };

        if self.active {
            self.bullets.push(TrackedBullet {
                bullet: bullet.clone(),
                fired_at: self.game_time,
            });
        }
        Some(bullet)
    }

    /// Drops bullets older than `lifetime_ms`. Returns how many were removed.
    pub fn prune_bullets(&mut self, lifetime_ms: u64) -> usize {
        let now = self.game_time;
        let before = self.bullets.len();
        self.bullets
            .retain(|tracked| now.saturating_sub(tracked.fired_at) < lifetime_ms);
        before - self.bullets.len()
    }

    /// Counts every player's powerup down by one tick. Returns players whose
    /// powerup expired.
    pub fn decay_powerups(&mut self, elapsed_ms: i64) -> Vec<PlayerId> {
        self.players
            .values_mut()
            .filter_map(|player| player.decay_powerup(elapsed_ms).then_some(player.id))
            .collect()
    }

    /// Players ordered by id so snapshots are stable.
    pub fn sorted_players(&self) -> Vec<Player> {
        let mut players: Vec<Player> = self.players.values().cloned().collect();
        players.sort_by_key(|p| p.id);
        players
    }

    /// Full-state snapshot. The join-time snapshot also reports whether a
    /// round is running.
    pub fn snapshot(&self, include_active: bool) -> Snapshot {
        Snapshot {
            players: self.sorted_players(),
            brainrots: self.brainrots.clone(),
            powerups: self.powerups.clone(),
            game_active: include_active.then_some(self.active),
            game_time: self.game_time,
        }
    }
}

/// Offset along the facing direction at which a projectile appears.
pub fn muzzle_offset(rotation: f32, distance: f32) -> (f32, f32) {
    (rotation.cos() * distance, rotation.sin() * distance)
}
