use std::collections::HashMap;

use smallvec::SmallVec;
use tracing::{debug, warn};

use arena_core::constants::{BULLET_DAMAGE, BULLET_SPEED, MAX_HEALTH, RESPAWN_MS, WIN_SCORE};
use arena_core::{Bullet, BulletId, BulletSweep, GamePhase, PlayerId, Scores, Team};

/// Authoritative per-player record. Position, velocity and facing are
/// client-simulated and trusted; health, death and respawn are server-owned.
#[derive(Clone, Debug)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub team: Team,
    pub x: f32,
    pub y: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub flip_x: bool,
    pub health: i32,
    pub is_dead: bool,
    pub respawn_timer_ms: f64,
    pub is_dashing: bool,
    pub last_move_seq: u64,
}

impl Player {
    pub fn new(id: PlayerId, name: String, team: Team) -> Self {
        let (x, y) = team.spawn();
        Self {
            id,
            name,
            team,
            x,
            y,
            velocity_x: 0.0,
            velocity_y: 0.0,
            flip_x: false,
            health: MAX_HEALTH,
            is_dead: false,
            respawn_timer_ms: 0.0,
            is_dashing: false,
            last_move_seq: 0,
        }
    }

    fn respawn(&mut self) {
        let (x, y) = self.team.spawn();
        self.x = x;
        self.y = y;
        self.velocity_x = 0.0;
        self.velocity_y = 0.0;
        self.health = MAX_HEALTH;
        self.is_dead = false;
        self.respawn_timer_ms = 0.0;
    }
}

#[derive(Clone, Debug)]
pub enum SimEvent {
    PlayerKilled {
        killer_id: PlayerId,
        victim_id: PlayerId,
        killer_name: String,
        victim_name: String,
    },
    MatchEnded {
        winning_team: Team,
        scores: Scores,
    },
}

pub type EventVec = SmallVec<[SimEvent; 8]>;

#[derive(Clone, Copy, Debug)]
pub struct MoveUpdate {
    pub seq: u64,
    pub x: f32,
    pub y: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub flip_x: bool,
}

/// Full authoritative room state. Mutated only by the room task.
pub struct RoomState {
    pub players: HashMap<PlayerId, Player>,
    pub bullets: Vec<Bullet>,
    pub scores: Scores,
    pub phase: GamePhase,
    pub game_time_ms: f64,
    pub winning_team: Option<Team>,
    next_shot_seq: HashMap<PlayerId, u64>,
}

impl RoomState {
    pub fn new() -> Self {
        Self {
            players: HashMap::new(),
            bullets: Vec::new(),
            scores: Scores::default(),
            phase: GamePhase::Waiting,
            game_time_ms: 0.0,
            winning_team: None,
            next_shot_seq: HashMap::new(),
        }
    }

    pub fn live_count(&self, team: Team) -> usize {
        self.players
            .values()
            .filter(|p| p.team == team && !p.is_dead)
            .count()
    }

    pub fn member_count(&self, team: Team) -> usize {
        self.players.values().filter(|p| p.team == team).count()
    }

    pub fn start_if_waiting(&mut self) {
        if self.phase == GamePhase::Waiting {
            self.phase = GamePhase::Playing;
        }
    }
}

impl Default for RoomState {
    fn default() -> Self {
        Self::new()
    }
}

/// One fixed-rate tick. Order matters for event determinism: respawn timers
/// first, then bullet sweeps in insertion order, then removal.
pub fn simulate_tick(state: &mut RoomState, dt_ms: f64, events: &mut EventVec) {
    if !dt_ms.is_finite() {
        warn!(dt_ms, "skipping tick: non-finite delta");
        return;
    }
    if state.phase != GamePhase::Playing {
        return;
    }

    state.game_time_ms += dt_ms;

    for player in state.players.values_mut() {
        if player.is_dead && player.respawn_timer_ms > 0.0 {
            player.respawn_timer_ms -= dt_ms;
            if player.respawn_timer_ms <= 0.0 {
                player.respawn();
            }
        }
    }

    let dt_secs = (dt_ms / 1000.0) as f32;
    let mut removals: Vec<usize> = Vec::new();

    for idx in 0..state.bullets.len() {
        let bullet = state.bullets[idx];
        if !bullet.x.is_finite() || !bullet.velocity_x.is_finite() {
            warn!(bullet_id = %bullet.id, "removing bullet with non-finite state");
            removals.push(idx);
            continue;
        }

        let outcome = {
            let candidates = state.players.iter().filter_map(|(id, p)| {
                (!p.is_dead && p.team != bullet.owner_team && *id != bullet.owner_id)
                    .then_some((*id, p.x, p.y))
            });
            bullet.sweep(dt_secs, candidates)
        };

        match outcome {
            BulletSweep::HitPlayer(victim) => {
                resolve_hit(state, &bullet, victim, events);
                removals.push(idx);
            }
            BulletSweep::HitPlatform { .. } | BulletSweep::OffWorld { .. } => {
                removals.push(idx);
            }
            BulletSweep::Flying { next_x } => {
                state.bullets[idx].x = next_x;
            }
        }
    }

    removals.sort_unstable_by(|a, b| b.cmp(a));
    removals.dedup();
    for idx in removals {
        state.bullets.remove(idx);
    }
}

fn resolve_hit(state: &mut RoomState, bullet: &Bullet, victim_id: PlayerId, events: &mut EventVec) {
    let Some(victim) = state.players.get_mut(&victim_id) else {
        return;
    };

    victim.health -= BULLET_DAMAGE;
    if victim.health > 0 {
        return;
    }
    victim.health = 0;
    victim.is_dead = true;
    victim.respawn_timer_ms = RESPAWN_MS;
    let victim_name = victim.name.clone();

    let killer_name = state
        .players
        .get(&bullet.owner_id)
        .map(|p| p.name.clone())
        .unwrap_or_else(|| format!("player{}", bullet.owner_id.0));
    events.push(SimEvent::PlayerKilled {
        killer_id: bullet.owner_id,
        victim_id,
        killer_name,
        victim_name,
    });

    let team_score = state.scores.add_kill(bullet.owner_team);
    // First crossing fixes the winner; later hits this tick still land but
    // cannot change it.
    if state.phase == GamePhase::Playing && team_score >= WIN_SCORE {
        state.phase = GamePhase::Ended;
        state.winning_team = Some(bullet.owner_team);
        events.push(SimEvent::MatchEnded {
            winning_team: bullet.owner_team,
            scores: state.scores,
        });
    }
}

/// Spawns a bullet for a live shooter. The velocity is computed here from
/// the shooter's facing; clients cannot supply one.
pub fn handle_shoot(state: &mut RoomState, shooter: PlayerId, x: f32, y: f32) -> Option<Bullet> {
    if state.phase != GamePhase::Playing {
        return None;
    }
    if !x.is_finite() || !y.is_finite() {
        warn!(player_id = shooter.0, "dropping shoot with non-finite position");
        return None;
    }
    let Some(player) = state.players.get(&shooter) else {
        return None;
    };
    if player.is_dead {
        return None;
    }

    let velocity_x = if player.flip_x {
        -BULLET_SPEED
    } else {
        BULLET_SPEED
    };
    if !x.is_finite() || !y.is_finite() || !velocity_x.is_finite() {
        warn!(player_id = shooter.0, "dropping shoot: bullet failed re-validation");
        return None;
    }

    let seq = next_seq(state.next_shot_seq.entry(shooter).or_insert(0));
    let bullet = Bullet {
        id: BulletId {
            owner: shooter,
            seq,
        },
        x,
        y,
        velocity_x,
        owner_id: shooter,
        owner_team: player.team,
    };
    state.bullets.push(bullet);
    Some(bullet)
}

fn next_seq(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

/// Lifetime-expiry safety net. Returns the bullet's last position, or None
/// when the tick already removed it; a second trigger is a no-op.
pub fn expire_bullet(state: &mut RoomState, id: BulletId) -> Option<f32> {
    let idx = state.bullets.iter().position(|b| b.id == id)?;
    let bullet = state.bullets.remove(idx);
    debug!(bullet_id = %id, "bullet expired by lifetime timer");
    Some(bullet.x)
}

pub fn apply_move(state: &mut RoomState, id: PlayerId, mv: &MoveUpdate) {
    if !(mv.x.is_finite()
        && mv.y.is_finite()
        && mv.velocity_x.is_finite()
        && mv.velocity_y.is_finite())
    {
        warn!(player_id = id.0, "dropping move with non-finite fields");
        return;
    }
    let Some(player) = state.players.get_mut(&id) else {
        return;
    };
    if player.is_dead || mv.seq < player.last_move_seq {
        return;
    }
    player.last_move_seq = mv.seq;
    player.x = mv.x;
    player.y = mv.y;
    player.velocity_x = mv.velocity_x;
    player.velocity_y = mv.velocity_y;
    player.flip_x = mv.flip_x;
}

pub fn apply_dash(state: &mut RoomState, id: PlayerId, is_dashing: bool) {
    let Some(player) = state.players.get_mut(&id) else {
        return;
    };
    if player.is_dead {
        return;
    }
    player.is_dashing = is_dashing;
}
