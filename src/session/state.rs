//! Per-connection session state machine.
//!
//! Transport-free: the server feeds parsed messages in and drains typed
//! replies out; the cadence timer calls [`Session::on_tick`]. States are
//! {Idle, Single, AiPlaying, Comparing}; messages invalid for the current
//! state are rejected with protocol errors and leave the state unchanged.

use std::collections::VecDeque;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use crate::agents::{plan_actions, Agent, AgentKind};
use crate::env::Environment;
use crate::session::protocol::{
    version_compatible, ClientMessage, CompareSide, CompareSummary, Comparison, EfficiencyStats,
    ErrorCode, ServerMessage,
};
use crate::types::{Action, GameEvent};

/// Base cadence of the AI timer; the effective period is
/// `BASE_TICK_MS / speed`, floored at one millisecond.
pub const BASE_TICK_MS: u64 = 50;

/// Agent-driven single play.
struct AiRun {
    agent: Agent,
    plan: VecDeque<Action>,
    pieces_placed: u32,
    max_pieces: Option<u32>,
}

/// One side of a comparison.
struct CompareSideState {
    name: String,
    agent: Agent,
    env: Environment,
    pieces: u32,
    clearing_locks: u32,
    topped_out: bool,
}

impl CompareSideState {
    fn finished(&self, max_pieces: u32) -> bool {
        self.topped_out || self.pieces >= max_pieces
    }

    fn stats(&self) -> EfficiencyStats {
        let score = self.env.score();
        let lines = self.env.lines_total();
        EfficiencyStats {
            score,
            lines,
            pieces: self.pieces,
            points_per_line: if lines > 0 {
                score as f64 / lines as f64
            } else {
                0.0
            },
            avg_lines_per_clear: if self.clearing_locks > 0 {
                lines as f64 / self.clearing_locks as f64
            } else {
                0.0
            },
        }
    }

    fn summary(&self) -> CompareSummary {
        CompareSummary {
            agent: self.name.clone(),
            score: self.env.score(),
            lines: self.env.lines_total(),
            pieces: self.pieces,
            topped_out: self.topped_out,
        }
    }
}

struct CompareRun {
    sides: [CompareSideState; 2],
    max_pieces: u32,
}

enum Mode {
    Idle,
    Single,
    AiPlaying(AiRun),
    Comparing(CompareRun),
}

impl Mode {
    fn name(&self) -> &'static str {
        match self {
            Mode::Idle => "idle",
            Mode::Single => "single",
            Mode::AiPlaying(_) => "ai_playing",
            Mode::Comparing(_) => "comparing",
        }
    }
}

/// Derive a seed when the client omits one.
fn choose_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1)
}

pub struct Session {
    env: Option<Environment>,
    mode: Mode,
    speed: f64,
}

impl Session {
    pub fn new() -> Self {
        Self {
            env: None,
            mode: Mode::Idle,
            speed: 1.0,
        }
    }

    /// Cadence period while an AI timer should be running.
    pub fn cadence(&self) -> Option<Duration> {
        match self.mode {
            Mode::AiPlaying(_) | Mode::Comparing(_) => {
                let ms = (BASE_TICK_MS as f64 / self.speed).max(1.0);
                Some(Duration::from_millis(ms as u64))
            }
            _ => None,
        }
    }

    /// Dispatch one inbound message; replies preserve event order.
    pub fn handle_message(&mut self, msg: ClientMessage) -> Vec<ServerMessage> {
        match msg {
            ClientMessage::Hello { version } => {
                if version_compatible(&version) {
                    vec![ServerMessage::hello()]
                } else {
                    vec![ServerMessage::error(
                        ErrorCode::VersionMismatch,
                        format!("client version {version} is not compatible"),
                    )]
                }
            }

            ClientMessage::Reset { seed } => match self.mode {
                Mode::Idle | Mode::Single => {
                    let seed = seed.unwrap_or_else(choose_seed);
                    let mut env = Environment::new(seed);
                    let data = env.observation();
                    self.env = Some(env);
                    self.mode = Mode::Single;
                    info!(seed, "episode reset");
                    vec![ServerMessage::Obs {
                        done: data.episode.top_out,
                        data,
                        reward: 0.0,
                        info: Default::default(),
                    }]
                }
                _ => vec![self.invalid_state("reset")],
            },

            ClientMessage::Step { action } => match self.mode {
                Mode::Idle => vec![ServerMessage::error(
                    ErrorCode::GameNotInitialized,
                    "reset before stepping",
                )],
                Mode::Single => {
                    let Some(parsed) = Action::parse(&action) else {
                        return vec![ServerMessage::error(
                            ErrorCode::InvalidAction,
                            format!("unknown action {action}"),
                        )];
                    };
                    let Some(env) = self.env.as_mut() else {
                        return vec![ServerMessage::error(
                            ErrorCode::GameNotInitialized,
                            "reset before stepping",
                        )];
                    };
                    if env.done() {
                        return vec![ServerMessage::error(
                            ErrorCode::GameOver,
                            "episode is over; reset to continue",
                        )];
                    }
                    let result = env.step(parsed);
                    vec![ServerMessage::Obs {
                        data: result.observation,
                        reward: result.reward,
                        done: result.done,
                        info: result.info,
                    }]
                }
                _ => vec![self.invalid_state("step")],
            },

            ClientMessage::Subscribe { stream } => {
                debug!(stream = %stream, "subscribe requested (reserved)");
                vec![]
            }

            ClientMessage::AiPlay {
                agent_type,
                speed,
                seed,
                max_pieces,
            } => match self.mode {
                Mode::Idle | Mode::Single => {
                    let Some(kind) = AgentKind::parse(&agent_type) else {
                        return vec![ServerMessage::error(
                            ErrorCode::InvalidMessage,
                            format!("unknown agent type {agent_type}"),
                        )];
                    };
                    let Some(speed) = valid_speed(speed) else {
                        return vec![ServerMessage::error(
                            ErrorCode::InvalidMessage,
                            "speed must be a positive number",
                        )];
                    };

                    let needs_fresh =
                        seed.is_some() || self.env.as_ref().map_or(true, Environment::done);
                    if needs_fresh {
                        let seed = seed.unwrap_or_else(choose_seed);
                        self.env = Some(Environment::new(seed));
                    }
                    let Some(env) = self.env.as_mut() else {
                        return vec![ServerMessage::error(
                            ErrorCode::GameNotInitialized,
                            "no episode to play",
                        )];
                    };
                    self.speed = speed;
                    self.mode = Mode::AiPlaying(AiRun {
                        agent: Agent::new(kind, env.seed()),
                        plan: VecDeque::new(),
                        pieces_placed: 0,
                        max_pieces,
                    });
                    info!(agent = %agent_type, speed, "ai play started");

                    let data = env.observation();
                    vec![ServerMessage::Obs {
                        done: data.episode.top_out,
                        data,
                        reward: 0.0,
                        info: Default::default(),
                    }]
                }
                _ => vec![self.invalid_state("ai_play")],
            },

            ClientMessage::AiStop => match self.mode {
                Mode::AiPlaying(ref mut run) => {
                    // Drain the queued frame actions for the current
                    // placement before handing control back, so the engine
                    // is never left half-moved.
                    let plan = std::mem::take(&mut run.plan);
                    let mut replies = Vec::new();
                    if let Some(env) = self.env.as_mut() {
                        let mut last = None;
                        for action in plan {
                            if env.done() {
                                break;
                            }
                            last = Some(env.step(action));
                        }
                        if let Some(result) = last {
                            replies.push(ServerMessage::Obs {
                                data: result.observation,
                                reward: result.reward,
                                done: result.done,
                                info: result.info,
                            });
                        }
                    }
                    self.mode = Mode::Single;
                    info!("ai play stopped");
                    replies
                }
                _ => vec![self.invalid_state("ai_stop")],
            },

            ClientMessage::CompareStart {
                agent1,
                agent2,
                speed,
                max_pieces,
                seed,
            } => match self.mode {
                Mode::Idle | Mode::Single => {
                    let (Some(kind1), Some(kind2)) =
                        (AgentKind::parse(&agent1), AgentKind::parse(&agent2))
                    else {
                        return vec![ServerMessage::error(
                            ErrorCode::InvalidMessage,
                            format!("unknown agent type in ({agent1}, {agent2})"),
                        )];
                    };
                    let Some(speed) = valid_speed(speed) else {
                        return vec![ServerMessage::error(
                            ErrorCode::InvalidMessage,
                            "speed must be a positive number",
                        )];
                    };

                    // Both sides share one seed so their piece streams
                    // coincide; agents get distinct seeds so two random
                    // players do not mirror each other.
                    let seed = seed.unwrap_or_else(choose_seed);
                    let side = |name: &str, kind, agent_seed| CompareSideState {
                        name: name.to_string(),
                        agent: Agent::new(kind, agent_seed),
                        env: Environment::new(seed),
                        pieces: 0,
                        clearing_locks: 0,
                        topped_out: false,
                    };
                    self.speed = speed;
                    let mut run = CompareRun {
                        sides: [
                            side(&agent1, kind1, seed ^ 0x1),
                            side(&agent2, kind2, seed ^ 0x2),
                        ],
                        max_pieces,
                    };
                    info!(%agent1, %agent2, seed, max_pieces, "comparison started");
                    let first = compare_obs(&mut run);
                    self.mode = Mode::Comparing(run);
                    vec![first]
                }
                _ => vec![self.invalid_state("compare_start")],
            },

            ClientMessage::CompareStop => match self.mode {
                Mode::Comparing(_) => {
                    self.mode = if self.env.is_some() {
                        Mode::Single
                    } else {
                        Mode::Idle
                    };
                    info!("comparison stopped");
                    vec![]
                }
                _ => vec![self.invalid_state("compare_stop")],
            },

            ClientMessage::CompareSetSpeed { speed } => match self.mode {
                Mode::Comparing(_) => {
                    let Some(speed) = valid_speed(speed) else {
                        return vec![ServerMessage::error(
                            ErrorCode::InvalidMessage,
                            "speed must be a positive number",
                        )];
                    };
                    self.speed = speed;
                    vec![]
                }
                _ => vec![self.invalid_state("compare_set_speed")],
            },
        }
    }

    /// One cadence firing: a single frame action in AI play, one piece
    /// per side in comparison mode.
    pub fn on_tick(&mut self) -> Vec<ServerMessage> {
        match &mut self.mode {
            Mode::AiPlaying(_) => self.ai_tick(),
            Mode::Comparing(_) => self.compare_tick(),
            _ => vec![],
        }
    }

    fn ai_tick(&mut self) -> Vec<ServerMessage> {
        let Mode::AiPlaying(run) = &mut self.mode else {
            return vec![];
        };
        let Some(env) = self.env.as_mut() else {
            self.mode = Mode::Idle;
            return vec![];
        };

        if env.done() {
            self.mode = Mode::Single;
            return vec![];
        }

        if run.plan.is_empty() {
            let obs = env.observation();
            let Some(current) = obs.current else {
                self.mode = Mode::Single;
                return vec![];
            };
            match run.agent.decide(&obs) {
                Some(placement) => {
                    run.plan.extend(plan_actions(&current, &placement));
                }
                None => {
                    // Contained policy failure: stop the loop, leave the
                    // episode in its last valid state.
                    warn!("agent produced no decision; stopping ai play");
                    self.mode = Mode::Single;
                    return vec![];
                }
            }
        }

        let action = run.plan.pop_front().unwrap_or(Action::Noop);
        let result = env.step(action);
        if result.info.events.contains(&GameEvent::Lock) {
            run.pieces_placed += 1;
        }

        let reached_cap = run
            .max_pieces
            .is_some_and(|cap| run.pieces_placed >= cap);
        let finished = result.done || reached_cap;

        let reply = ServerMessage::Obs {
            data: result.observation,
            reward: result.reward,
            done: result.done,
            info: result.info,
        };
        if finished {
            info!(pieces = run.pieces_placed, "ai play finished");
            self.mode = Mode::Single;
        }
        vec![reply]
    }

    fn compare_tick(&mut self) -> Vec<ServerMessage> {
        let Mode::Comparing(run) = &mut self.mode else {
            return vec![];
        };

        for side in &mut run.sides {
            if !side.finished(run.max_pieces) {
                advance_one_piece(side);
            }
        }

        let update = compare_obs(run);
        if run.sides.iter().all(|s| s.finished(run.max_pieces)) {
            let complete = compare_complete(run);
            self.mode = if self.env.is_some() {
                Mode::Single
            } else {
                Mode::Idle
            };
            info!("comparison complete");
            vec![update, complete]
        } else {
            vec![update]
        }
    }

    fn invalid_state(&self, what: &str) -> ServerMessage {
        ServerMessage::error(
            ErrorCode::InvalidMessage,
            format!("{what} is not valid in state {}", self.mode.name()),
        )
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

fn valid_speed(speed: f64) -> Option<f64> {
    (speed.is_finite() && speed > 0.0).then_some(speed)
}

/// Plan and fully execute the next placement for one comparison side.
fn advance_one_piece(side: &mut CompareSideState) {
    let obs = side.env.observation();
    let Some(current) = obs.current else {
        side.topped_out = true;
        return;
    };
    let Some(placement) = side.agent.decide(&obs) else {
        side.topped_out = true;
        return;
    };

    let mut cleared = false;
    let mut locked = false;
    for action in plan_actions(&current, &placement) {
        let result = side.env.step(action);
        if result.info.events.contains(&GameEvent::Lock) {
            locked = true;
            cleared |= result.info.events.contains(&GameEvent::Clear);
        }
        if result.done {
            side.topped_out = true;
            break;
        }
    }
    if locked {
        side.pieces += 1;
        if cleared {
            side.clearing_locks += 1;
        }
    }
}

fn compare_obs(run: &mut CompareRun) -> ServerMessage {
    let stats1 = run.sides[0].stats();
    let stats2 = run.sides[1].stats();
    let leader = match stats1.score.cmp(&stats2.score) {
        std::cmp::Ordering::Greater => "agent1",
        std::cmp::Ordering::Less => "agent2",
        std::cmp::Ordering::Equal => "tie",
    };

    let [side1, side2] = &mut run.sides;
    let game1 = CompareSide {
        agent: side1.name.clone(),
        pieces: side1.pieces,
        done: side1.topped_out,
        data: side1.env.observation(),
    };
    let game2 = CompareSide {
        agent: side2.name.clone(),
        pieces: side2.pieces,
        done: side2.topped_out,
        data: side2.env.observation(),
    };

    ServerMessage::CompareObs {
        game1,
        game2,
        comparison: Comparison {
            leader: leader.to_string(),
            game1: stats1,
            game2: stats2,
        },
    }
}

fn compare_complete(run: &CompareRun) -> ServerMessage {
    let score1 = run.sides[0].env.score();
    let score2 = run.sides[1].env.score();
    let winner = match score1.cmp(&score2) {
        std::cmp::Ordering::Greater => "agent1".to_string(),
        std::cmp::Ordering::Less => "agent2".to_string(),
        std::cmp::Ordering::Equal => "TIE".to_string(),
    };
    ServerMessage::CompareComplete {
        winner,
        game1: run.sides[0].summary(),
        game2: run.sides[1].summary(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::protocol::parse_client_message;

    fn msg(line: &str) -> ClientMessage {
        parse_client_message(line).expect("valid test message")
    }

    fn expect_error(replies: &[ServerMessage], code: ErrorCode) {
        match replies {
            [ServerMessage::Error { code: got, .. }] => assert_eq!(*got, code),
            other => panic!("expected {code:?}, got {other:?}"),
        }
    }

    #[test]
    fn hello_round_trip() {
        let mut session = Session::new();
        let replies = session.handle_message(msg(r#"{"type":"hello","version":"1.2.0"}"#));
        assert!(matches!(replies[0], ServerMessage::Hello { .. }));
    }

    #[test]
    fn hello_version_mismatch() {
        let mut session = Session::new();
        let replies = session.handle_message(msg(r#"{"type":"hello","version":"2.0.0"}"#));
        expect_error(&replies, ErrorCode::VersionMismatch);
    }

    #[test]
    fn step_before_reset_is_rejected() {
        let mut session = Session::new();
        let replies = session.handle_message(msg(r#"{"type":"step","action":"LEFT"}"#));
        expect_error(&replies, ErrorCode::GameNotInitialized);
    }

    #[test]
    fn reset_then_step() {
        let mut session = Session::new();
        let replies = session.handle_message(msg(r#"{"type":"reset","seed":42}"#));
        match &replies[0] {
            ServerMessage::Obs { data, done, .. } => {
                assert_eq!(data.episode.seed, 42);
                assert!(!done);
            }
            other => panic!("expected obs, got {other:?}"),
        }

        let replies = session.handle_message(msg(r#"{"type":"step","action":"RIGHT"}"#));
        match &replies[0] {
            ServerMessage::Obs { data, .. } => assert_eq!(data.tick, 1),
            other => panic!("expected obs, got {other:?}"),
        }
    }

    #[test]
    fn unknown_action_is_invalid_action() {
        let mut session = Session::new();
        session.handle_message(msg(r#"{"type":"reset","seed":1}"#));
        let replies = session.handle_message(msg(r#"{"type":"step","action":"JUMP"}"#));
        expect_error(&replies, ErrorCode::InvalidAction);
    }

    #[test]
    fn step_after_top_out_is_game_over() {
        let mut session = Session::new();
        session.handle_message(msg(r#"{"type":"reset","seed":3}"#));
        // Hard-drop until the episode tops out.
        loop {
            let replies = session.handle_message(msg(r#"{"type":"step","action":"HARD"}"#));
            match &replies[0] {
                ServerMessage::Obs { done: true, .. } => break,
                ServerMessage::Obs { .. } => continue,
                other => panic!("unexpected reply: {other:?}"),
            }
        }
        let replies = session.handle_message(msg(r#"{"type":"step","action":"HARD"}"#));
        expect_error(&replies, ErrorCode::GameOver);
    }

    #[test]
    fn ai_play_then_stop() {
        let mut session = Session::new();
        let replies = session.handle_message(msg(
            r#"{"type":"ai_play","agent_type":"dellacherie","speed":10.0,"seed":5}"#,
        ));
        assert!(matches!(replies[0], ServerMessage::Obs { .. }));
        assert!(session.cadence().is_some());

        // A few cadence firings emit observations.
        for _ in 0..5 {
            let replies = session.on_tick();
            assert!(matches!(replies[0], ServerMessage::Obs { .. }));
        }

        let replies = session.handle_message(msg(r#"{"type":"ai_stop"}"#));
        // Any queued frame actions were completed first; a drained plan
        // ends in its hard drop, so a reply carries the lock.
        match replies.as_slice() {
            [] => {}
            [ServerMessage::Obs { info, .. }] => {
                assert!(info.events.contains(&GameEvent::Lock));
            }
            other => panic!("unexpected replies: {other:?}"),
        }
        assert!(session.cadence().is_none());

        // Control is back with the client in single play.
        let replies = session.handle_message(msg(r#"{"type":"step","action":"NOOP"}"#));
        assert!(matches!(replies[0], ServerMessage::Obs { .. }));
    }

    #[test]
    fn ai_stop_completes_the_in_flight_placement() {
        let mut session = Session::new();
        session.handle_message(msg(r#"{"type":"ai_play","agent_type":"dellacherie","seed":5}"#));

        // Tick until a placement plan is mid-flight.
        for _ in 0..200 {
            session.on_tick();
            if matches!(&session.mode, Mode::AiPlaying(run) if !run.plan.is_empty()) {
                break;
            }
        }
        let Mode::AiPlaying(run) = &session.mode else {
            panic!("ai play ended before a plan was mid-flight");
        };
        assert!(!run.plan.is_empty(), "no mid-flight plan to cancel");

        // Stopping mid-placement finishes the placement: the final
        // observation reports the lock, leaving no half-moved piece.
        let replies = session.handle_message(msg(r#"{"type":"ai_stop"}"#));
        match replies.as_slice() {
            [ServerMessage::Obs { info, .. }] => {
                assert!(info.events.contains(&GameEvent::Lock));
            }
            other => panic!("expected a final observation, got {other:?}"),
        }
        assert!(session.cadence().is_none());
    }

    #[test]
    fn ai_play_rejects_unknown_agent() {
        let mut session = Session::new();
        let replies =
            session.handle_message(msg(r#"{"type":"ai_play","agent_type":"alphabrick"}"#));
        expect_error(&replies, ErrorCode::InvalidMessage);
    }

    #[test]
    fn ai_play_honors_max_pieces() {
        let mut session = Session::new();
        session.handle_message(msg(
            r#"{"type":"ai_play","agent_type":"random","seed":8,"max_pieces":3}"#,
        ));
        let mut ticks = 0;
        while session.cadence().is_some() {
            session.on_tick();
            ticks += 1;
            assert!(ticks < 1000, "ai play never finished");
        }
    }

    #[test]
    fn step_rejected_while_ai_playing() {
        let mut session = Session::new();
        session.handle_message(msg(r#"{"type":"ai_play","agent_type":"random","seed":4}"#));
        let replies = session.handle_message(msg(r#"{"type":"step","action":"LEFT"}"#));
        expect_error(&replies, ErrorCode::InvalidMessage);
    }

    #[test]
    fn compare_runs_to_completion() {
        let mut session = Session::new();
        let replies = session.handle_message(msg(
            r#"{"type":"compare_start","agent1":"random","agent2":"dellacherie","speed":10.0,"max_pieces":5,"seed":7}"#,
        ));
        assert!(matches!(replies[0], ServerMessage::CompareObs { .. }));

        let mut complete = None;
        for _ in 0..100 {
            for reply in session.on_tick() {
                if let ServerMessage::CompareComplete { winner, .. } = reply {
                    complete = Some(winner);
                }
            }
            if complete.is_some() {
                break;
            }
        }
        let winner = complete.expect("comparison finished");
        assert!(["agent1", "agent2", "TIE"].contains(&winner.as_str()));
        assert!(session.cadence().is_none());
    }

    #[test]
    fn compare_sides_share_the_piece_stream() {
        let mut session = Session::new();
        let replies = session.handle_message(msg(
            r#"{"type":"compare_start","agent1":"random","agent2":"random","max_pieces":3,"seed":99}"#,
        ));
        match &replies[0] {
            ServerMessage::CompareObs { game1, game2, .. } => {
                assert_eq!(game1.data.episode.seed, game2.data.episode.seed);
                assert_eq!(game1.data.next_queue, game2.data.next_queue);
                assert_eq!(
                    game1.data.current.map(|c| c.kind),
                    game2.data.current.map(|c| c.kind)
                );
            }
            other => panic!("expected compare_obs, got {other:?}"),
        }
    }

    #[test]
    fn compare_set_speed_only_while_comparing() {
        let mut session = Session::new();
        let replies = session.handle_message(msg(r#"{"type":"compare_set_speed","speed":2.0}"#));
        expect_error(&replies, ErrorCode::InvalidMessage);

        session.handle_message(msg(
            r#"{"type":"compare_start","agent1":"random","agent2":"random","max_pieces":2,"seed":1}"#,
        ));
        let replies = session.handle_message(msg(r#"{"type":"compare_set_speed","speed":2.0}"#));
        assert!(replies.is_empty());
    }
}
