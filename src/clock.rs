//! Countdown and round-clock background tasks.
//!
//! Both tasks capture the session generation at spawn time and re-check it
//! before anything they do, so a reset (which bumps the generation)
//! silently kills them. A leaked clock can therefore never finish a
//! session it does not belong to.

use std::sync::Arc;
use std::time::Duration;

use crate::protocol::ServerMessage;
use crate::session::machine::SessionEvent;
use crate::session::AppState;
use crate::types::CLOCK_RUNNING_OUT_THRESHOLD;

/// Spawn the cosmetic get-ready countdown; dispatches CountdownFinished
/// when it elapses.
pub fn spawn_countdown(state: Arc<AppState>, generation: u64) {
    tokio::spawn(async move {
        let seconds = state.config().await.countdown_seconds;
        tokio::time::sleep(Duration::from_secs(seconds as u64)).await;
        state
            .dispatch(generation, SessionEvent::CountdownFinished)
            .await;
    });
}

/// Spawn the round clock: one tick per second broadcast to clients, with a
/// running-out signal near the end, then ClockExpired.
pub fn spawn_round_clock(state: Arc<AppState>, generation: u64) {
    tokio::spawn(async move {
        let mut seconds_left = state.config().await.game_seconds;

        while seconds_left > 0 {
            tokio::time::sleep(Duration::from_secs(1)).await;
            if generation != state.generation() {
                return;
            }
            seconds_left -= 1;

            // No receivers connected is fine
            let _ = state.sender().send(ServerMessage::ClockTick {
                seconds_left,
                running_out: seconds_left <= CLOCK_RUNNING_OUT_THRESHOLD,
            });
        }

        state.dispatch(generation, SessionEvent::ClockExpired).await;
    });
}
