use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use zatacka_core::player::PlayerId;
use zatacka_core::render::Renderer;
use zatacka_engine::{MatchController, MatchEvent, MatchPhase, MatchSummary, RoundEvent};

/// Commands sent to a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Raw key symbol; buffered and applied at the next tick.
    Input(char),
    Forfeit(PlayerId),
    /// Abort the match and end the session.
    Stop,
}

/// Broadcasts sent from the session to its observer.
#[derive(Debug, Clone)]
pub enum SessionBroadcast {
    Event(MatchEvent),
    /// MessagePack round state after a tick.
    /// Uses `Bytes` for zero-copy cloning across observers.
    Snapshot(Bytes),
    /// The loop has exited. Always the last broadcast.
    Ended(MatchSummary),
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Overrides the interval of the match's speed tier.
    pub tick_interval: Option<Duration>,
    /// Pause after each round, however it ended; no ticks run and inputs
    /// are discarded.
    pub between_rounds: Duration,
    /// Broadcast a round-state snapshot after every tick.
    pub snapshots: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval: None,
            between_rounds: Duration::from_secs(3),
            snapshots: true,
        }
    }
}

/// Spawn a match tick loop as a tokio task.
///
/// A controller still in setup is started by the task. The task hands the
/// controller back when the match has finished or was stopped.
pub fn spawn_match_session<R>(
    controller: MatchController,
    renderer: R,
    config: SessionConfig,
) -> (
    mpsc::UnboundedSender<SessionCommand>,
    mpsc::UnboundedReceiver<SessionBroadcast>,
    JoinHandle<MatchController>,
)
where
    R: Renderer + Send + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (broadcast_tx, broadcast_rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        run_session_loop(controller, renderer, config, cmd_rx, broadcast_tx).await
    });

    (cmd_tx, broadcast_rx, handle)
}

async fn run_session_loop<R: Renderer>(
    mut controller: MatchController,
    mut renderer: R,
    config: SessionConfig,
    mut cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
    broadcast_tx: mpsc::UnboundedSender<SessionBroadcast>,
) -> MatchController {
    let match_id = controller.match_id();

    if controller.phase() == MatchPhase::Setup {
        match controller.start(&mut renderer) {
            Ok(events) => send_events(&broadcast_tx, events),
            Err(e) => {
                tracing::error!(%match_id, error = %e, "Failed to start match");
                let _ = broadcast_tx.send(SessionBroadcast::Ended(controller.summary()));
                return controller;
            },
        }
    }

    let tick_interval = config
        .tick_interval
        .unwrap_or_else(|| controller.settings().speed_tier().tick_interval());
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut input_buffer: Vec<char> = Vec::new();

    while controller.phase() == MatchPhase::InProgress {
        let round_over = tokio::select! {
            _ = interval.tick() => {
                for symbol in input_buffer.drain(..) {
                    if let Err(e) = controller.handle_symbol(symbol) {
                        tracing::debug!(%match_id, ?symbol, error = %e, "Ignored input");
                    }
                }

                let events = match controller.tick(&mut renderer) {
                    Ok(events) => events,
                    Err(e) => {
                        tracing::error!(%match_id, error = %e, "Tick failed");
                        break;
                    },
                };
                let round_over = round_completed(&controller, &events);
                send_events(&broadcast_tx, events);

                if config.snapshots {
                    match controller.snapshot() {
                        Ok(data) => {
                            let _ = broadcast_tx.send(SessionBroadcast::Snapshot(Bytes::from(data)));
                        },
                        Err(e) => tracing::error!(%match_id, error = %e, "Failed to encode snapshot"),
                    }
                }
                round_over
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SessionCommand::Input(symbol)) => {
                        input_buffer.push(symbol);
                        false
                    },
                    Some(SessionCommand::Forfeit(player_id)) => {
                        forfeit(&mut controller, &mut renderer, player_id, &broadcast_tx)
                    },
                    Some(SessionCommand::Stop) | None => {
                        abort(&mut controller, &broadcast_tx);
                        break;
                    },
                }
            }
        };

        if round_over && !config.between_rounds.is_zero() {
            input_buffer.clear();
            if !pause_between_rounds(
                &mut controller,
                &mut renderer,
                config.between_rounds,
                &mut cmd_rx,
                &broadcast_tx,
            )
            .await
            {
                break;
            }
            interval.reset();
        }
    }

    tracing::info!(%match_id, phase = ?controller.phase(), "Session ended");
    let _ = broadcast_tx.send(SessionBroadcast::Ended(controller.summary()));
    controller
}

/// Returns `false` when the session was stopped during the pause.
async fn pause_between_rounds<R: Renderer>(
    controller: &mut MatchController,
    renderer: &mut R,
    duration: Duration,
    cmd_rx: &mut mpsc::UnboundedReceiver<SessionCommand>,
    broadcast_tx: &mpsc::UnboundedSender<SessionBroadcast>,
) -> bool {
    let mut pause_end = tokio::time::Instant::now() + duration;
    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SessionCommand::Stop) | None => {
                        abort(controller, broadcast_tx);
                        return false;
                    },
                    Some(SessionCommand::Forfeit(player_id)) => {
                        if forfeit(controller, renderer, player_id, broadcast_tx) {
                            pause_end = tokio::time::Instant::now() + duration;
                        }
                        if controller.phase() != MatchPhase::InProgress {
                            return false;
                        }
                    },
                    Some(SessionCommand::Input(symbol)) => {
                        tracing::debug!(?symbol, "Dropped input between rounds");
                    },
                }
            }
            _ = tokio::time::sleep_until(pause_end) => {
                return true;
            }
        }
    }
}

/// Returns whether the forfeit ended a round of a match that goes on.
fn forfeit<R: Renderer>(
    controller: &mut MatchController,
    renderer: &mut R,
    player_id: PlayerId,
    broadcast_tx: &mpsc::UnboundedSender<SessionBroadcast>,
) -> bool {
    match controller.forfeit(player_id, renderer) {
        Ok(events) => {
            let round_over = round_completed(controller, &events);
            send_events(broadcast_tx, events);
            round_over
        },
        Err(e) => {
            tracing::warn!(player_id, error = %e, "Forfeit rejected");
            false
        },
    }
}

fn round_completed(controller: &MatchController, events: &[MatchEvent]) -> bool {
    controller.phase() == MatchPhase::InProgress
        && events
            .iter()
            .any(|e| matches!(e, MatchEvent::Round(RoundEvent::RoundCompleted { .. })))
}

fn abort(controller: &mut MatchController, broadcast_tx: &mpsc::UnboundedSender<SessionBroadcast>) {
    match controller.abort() {
        Ok(events) => send_events(broadcast_tx, events),
        Err(e) => tracing::debug!(error = %e, "Nothing to abort"),
    }
}

fn send_events(broadcast_tx: &mpsc::UnboundedSender<SessionBroadcast>, events: Vec<MatchEvent>) {
    for event in events {
        let _ = broadcast_tx.send(SessionBroadcast::Event(event));
    }
}
