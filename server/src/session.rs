//! One running arena: player lifecycle, event handling, the periodic tick and
//! respawn completion.
//!
//! `GameSession` never touches the network. Every operation appends
//! [`Effect`]s to an ordered queue that the owner drains with
//! [`GameSession::take_effects`] and carries out: deliver an event, arm a
//! respawn timer, or cancel all armed timers. The owner must call every
//! operation from a single task.

use crate::config::GameConfig;
use crate::error::JoinRejected;
use crate::game::GameState;
use crate::ids::{IdSource, SequentialIds};
use crate::utils::{display_name, get_timestamp};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{ClientEvent, EntityId, Player, PlayerId, PowerupKind, ServerEvent};
use std::time::{Duration, Instant};

/// Which connections an outbound event goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Client(PlayerId),
    All,
    AllExcept(PlayerId),
}

impl Target {
    pub fn includes(&self, client_id: PlayerId) -> bool {
        match *self {
            Target::Client(id) => id == client_id,
            Target::All => true,
            Target::AllExcept(id) => id != client_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnKind {
    Brainrot,
    Powerup,
}

/// A respawn armed during round `round`. It is stale once that round has
/// ended, even if its timer already fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSpawn {
    pub kind: SpawnKind,
    pub round: u64,
}

/// Work the owner of a session must carry out after each operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Deliver `event` to every connection in `target`.
    Send { target: Target, event: ServerEvent },
    /// Call [`GameSession::spawn_due`] with `spawn` once `delay` has passed.
    ScheduleSpawn { spawn: PendingSpawn, delay: Duration },
    /// Abort every armed respawn timer.
    CancelSpawns,
}

pub struct GameSession {
    config: GameConfig,
    state: GameState,
    ids: Box<dyn IdSource>,
    rng: StdRng,
    effects: Vec<Effect>,
    /// Bumped whenever a round starts or ends
    round: u64,
}

impl GameSession {
    /// Creates an idle session with no players, seeding spawn randomness from
    /// the operating system.
    pub fn new(config: GameConfig) -> Self {
        Self::with_parts(config, Box::new(SequentialIds::new()), StdRng::from_entropy())
    }

    /// Deterministic session for replays and tests.
    pub fn with_seed(config: GameConfig, seed: u64) -> Self {
        Self::with_parts(
            config,
            Box::new(SequentialIds::new()),
            StdRng::seed_from_u64(seed),
        )
    }

    /// Builds a session from an explicit id source and random generator.
    ///
    /// Both are owned by the session for its whole lifetime, so entity ids
    /// and spawn positions follow deterministically from what is passed in.
    pub fn with_parts(config: GameConfig, ids: Box<dyn IdSource>, rng: StdRng) -> Self {
        Self {
            config,
            state: GameState::new(),
            ids,
            rng,
            effects: Vec::new(),
            round: 0,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Read-only view of the entity store.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Direct access to the entity store. Changes made here produce no
    /// effects; nothing is broadcast until the next tick.
    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    /// Generation of the current round. Respawns armed under an older
    /// generation are discarded by [`GameSession::spawn_due`].
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Drains the effects produced since the last call, in order.
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    fn send(&mut self, target: Target, event: ServerEvent) {
        self.effects.push(Effect::Send { target, event });
    }

    fn random_position(&mut self) -> (f32, f32) {
        let x = self.rng.gen_range(self.config.spawn_x.clone());
        let y = self.rng.gen_range(self.config.spawn_y.clone());
        (x, y)
    }

    fn pending_spawn(&self, kind: SpawnKind) -> PendingSpawn {
        PendingSpawn {
            kind,
            round: self.round,
        }
    }

    fn random_powerup_kind(&mut self) -> PowerupKind {
        PowerupKind::ALL[self.rng.gen_range(0..PowerupKind::ALL.len())]
    }

    /// Adds a player for `client_id`.
    ///
    /// The joiner receives the full snapshot, everyone else a `playerJoined`.
    /// Reaching the start threshold with no round running starts a new round.
    pub fn join(
        &mut self,
        client_id: PlayerId,
        requested_name: Option<String>,
        now: Instant,
    ) -> Result<PlayerId, JoinRejected> {
        if self.state.players.contains_key(&client_id) {
            debug!("Ignoring duplicate join from client {}", client_id);
            return Err(JoinRejected::AlreadyJoined);
        }

        if self.state.player_count() >= self.config.max_players {
            info!(
                "Rejecting client {}: game full ({} players)",
                client_id,
                self.state.player_count()
            );
            self.send(Target::Client(client_id), ServerEvent::GameFull);
            return Err(JoinRejected::GameFull);
        }

        let (x, y) = self.random_position();
        let player = Player::new(
            client_id,
            display_name(requested_name),
            x,
            y,
            self.config.max_health,
            self.config.max_ammo,
        );
        self.state.add_player(player.clone());

        let snapshot = self.state.snapshot(true);
        self.send(Target::Client(client_id), ServerEvent::GameState(snapshot));
        self.send(Target::AllExcept(client_id), ServerEvent::PlayerJoined(player));

        if self.state.player_count() >= self.config.start_threshold && !self.state.active {
            self.start_round(now);
            self.send(Target::All, ServerEvent::GameStarted);
        }

        Ok(client_id)
    }

    /// Removes the player owned by `client_id`, if any. The round stops once
    /// the last player is gone; world entities are left as they are.
    pub fn leave(&mut self, client_id: PlayerId) -> Option<Player> {
        let player = self.state.remove_player(&client_id)?;
        self.send(Target::AllExcept(client_id), ServerEvent::PlayerLeft(client_id));

        if self.state.player_count() == 0 && self.state.active {
            info!("Last player left, stopping round");
            self.state.end_round();
            self.round += 1;
            self.effects.push(Effect::CancelSpawns);
        }

        Some(player)
    }

    /// Resets world entities and starts the round clock.
    fn start_round(&mut self, now: Instant) {
        self.effects.push(Effect::CancelSpawns);
        self.round += 1;
        self.state.begin_round(now);

        for _ in 0..self.config.brainrot_count {
            self.spawn_brainrot();
        }
        for _ in 0..self.config.powerup_count {
            self.spawn_powerup();
        }

        info!(
            "Round started with {} players, {} brainrots, {} powerups",
            self.state.player_count(),
            self.state.brainrots.len(),
            self.state.powerups.len()
        );
    }

    fn spawn_brainrot(&mut self) -> shared::Brainrot {
        let id = self.ids.next_id();
        let (x, y) = self.random_position();
        self.state.spawn_brainrot(id, x, y)
    }

    fn spawn_powerup(&mut self) -> shared::Powerup {
        let id = self.ids.next_id();
        let (x, y) = self.random_position();
        let kind = self.random_powerup_kind();
        self.state.spawn_powerup(id, x, y, kind)
    }

    /// Completes a respawn timer by creating one replacement entity and
    /// announcing it to everyone.
    ///
    /// Timers armed before the latest round start or stop are dropped, so a
    /// message that was already queued when the round reset cannot add an
    /// extra entity to the fresh world.
    pub fn spawn_due(&mut self, spawn: PendingSpawn) {
        if spawn.round != self.round {
            debug!(
                "Dropping stale {:?} respawn from round {} (now {})",
                spawn.kind, spawn.round, self.round
            );
            return;
        }

        match spawn.kind {
            SpawnKind::Brainrot => {
                let brainrot = self.spawn_brainrot();
                debug!("Respawned brainrot {}", brainrot.id);
                self.send(Target::All, ServerEvent::NewBrainrotSpawned(brainrot));
            }
            SpawnKind::Powerup => {
                let powerup = self.spawn_powerup();
                debug!("Respawned {:?} powerup {}", powerup.kind, powerup.id);
                self.send(Target::All, ServerEvent::NewPowerupSpawned(powerup));
            }
        }
    }

    /// Routes one inbound client event. Events from unknown or dead players
    /// are dropped without telling the sender.
    pub fn handle_event(&mut self, client_id: PlayerId, event: ClientEvent, now: Instant) {
        match event {
            ClientEvent::JoinGame { name } => {
                if let Err(reason) = self.join(client_id, name, now) {
                    debug!("Join from client {} refused: {}", client_id, reason);
                }
            }
            ClientEvent::PlayerMove {
                x,
                y,
                z,
                rotation,
                crouching,
            } => self.handle_move(client_id, x, y, z, rotation, crouching),
            ClientEvent::Shoot {} => self.handle_shoot(client_id),
            ClientEvent::PlayerHit {
                player_id,
                killer_id,
                damage,
            } => self.handle_hit(client_id, player_id, killer_id, damage),
            ClientEvent::CollectBrainrot { brainrot_id } => {
                self.handle_collect_brainrot(client_id, brainrot_id)
            }
            ClientEvent::CollectPowerup { powerup_id } => {
                self.handle_collect_powerup(client_id, powerup_id)
            }
            ClientEvent::Reload {} => self.handle_reload(client_id),
            ClientEvent::ChatMessage { text } => self.handle_chat(client_id, text),
        }
    }

    fn handle_move(
        &mut self,
        client_id: PlayerId,
        x: f32,
        y: f32,
        z: f32,
        rotation: f32,
        crouching: bool,
    ) {
        if let Some(player) = self.state.living_player_mut(client_id) {
            player.x = x;
            player.y = y;
            player.z = z;
            player.rotation = rotation;
            player.crouching = crouching;
        }
    }

    fn handle_shoot(&mut self, client_id: PlayerId) {
        let can_fire = self
            .state
            .players
            .get(&client_id)
            .map_or(false, |p| p.is_alive && p.ammo > 0);
        if !can_fire {
            debug!("Dropping shot from client {}", client_id);
            return;
        }

        let bullet_id = self.ids.next_id();
        if let Some(bullet) = self.state.fire_bullet(client_id, bullet_id, &self.config) {
            self.send(Target::All, ServerEvent::BulletFired(bullet));
        }
    }

    /// Applies client-reported damage. Hit detection happens on the clients;
    /// the server only enforces health bounds and scoring.
    fn handle_hit(
        &mut self,
        client_id: PlayerId,
        victim_id: PlayerId,
        killer_id: Option<PlayerId>,
        damage: i32,
    ) {
        if !self.state.players.contains_key(&client_id) {
            debug!("Dropping hit report from unknown client {}", client_id);
            return;
        }

        let died = match self.state.living_player_mut(victim_id) {
            Some(victim) => victim.apply_damage(damage),
            None => return,
        };
        if !died {
            return;
        }

        if let Some(killer) = killer_id
            .filter(|&id| id != victim_id)
            .and_then(|id| self.state.players.get_mut(&id))
        {
            killer.kills += 1;
            killer.streak += 1;
            killer.score += self.config.kill_reward(killer.streak);
        }

        info!("Player {} killed by {:?}", victim_id, killer_id);
        self.send(
            Target::All,
            ServerEvent::PlayerDied {
                player_id: victim_id,
                killer_id,
            },
        );
    }

    fn handle_collect_brainrot(&mut self, client_id: PlayerId, brainrot_id: EntityId) {
        if self.state.living_player_mut(client_id).is_none() {
            return;
        }
        if !self.state.collect_brainrot(brainrot_id, client_id) {
            debug!(
                "Client {} tried to collect missing brainrot {}",
                client_id, brainrot_id
            );
            return;
        }

        if let Some(player) = self.state.players.get_mut(&client_id) {
            player.score += self.config.brainrot_score;
        }

        self.send(
            Target::All,
            ServerEvent::BrainrotCollected {
                brainrot_id,
                player_id: client_id,
            },
        );
        let spawn = self.pending_spawn(SpawnKind::Brainrot);
        self.effects.push(Effect::ScheduleSpawn {
            spawn,
            delay: self.config.brainrot_respawn_delay,
        });
    }

    fn handle_collect_powerup(&mut self, client_id: PlayerId, powerup_id: EntityId) {
        if self.state.living_player_mut(client_id).is_none() {
            return;
        }
        let Some(powerup) = self.state.take_powerup(powerup_id) else {
            debug!(
                "Client {} tried to collect missing powerup {}",
                client_id, powerup_id
            );
            return;
        };

        let duration_ms = self.config.powerup_duration.as_millis() as i64;
        let heal_amount = self.config.health_powerup_amount;
        if let Some(player) = self.state.players.get_mut(&client_id) {
            if powerup.kind.is_timed() {
                player.grant_powerup(powerup.kind, duration_ms);
            } else {
                player.heal(heal_amount);
            }
        }

        self.send(
            Target::All,
            ServerEvent::PowerupCollected {
                powerup_id,
                player_id: client_id,
                kind: powerup.kind,
            },
        );
        let spawn = self.pending_spawn(SpawnKind::Powerup);
        self.effects.push(Effect::ScheduleSpawn {
            spawn,
            delay: self.config.powerup_respawn_delay,
        });
    }

    fn handle_reload(&mut self, client_id: PlayerId) {
        if let Some(player) = self.state.living_player_mut(client_id) {
            player.reload();
        }
    }

    fn handle_chat(&mut self, client_id: PlayerId, text: String) {
        let Some(name) = self.state.players.get(&client_id).map(|p| p.name.clone()) else {
            return;
        };
        self.send(
            Target::All,
            ServerEvent::ChatMessage {
                name,
                text,
                time: get_timestamp(),
            },
        );
    }

    /// One fixed-period step: advance the round clock, count powerups down,
    /// expire old bullets and broadcast the full state. Does nothing while no
    /// round is running.
    pub fn tick(&mut self, now: Instant) {
        if !self.state.active {
            return;
        }

        self.state.tick += 1;
        self.state.advance_clock(now);

        let expired = self.state.decay_powerups(self.config.tick_millis());
        for player_id in expired {
            debug!("Powerup expired for player {}", player_id);
        }
        self.state
            .prune_bullets(self.config.bullet_lifetime.as_millis() as u64);

        let snapshot = self.state.snapshot(false);
        self.send(Target::All, ServerEvent::GameUpdate(snapshot));

        if self.state.tick % 100 == 0 {
            debug!(
                "Tick {}: {} players, {} live brainrots, {} powerups, {} bullets",
                self.state.tick,
                self.state.player_count(),
                self.state.live_brainrots(),
                self.state.powerups.len(),
                self.state.bullets.len()
            );
        }
    }
}
