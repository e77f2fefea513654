//! Periodic ticker driving the running countdown.

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::{
    services::sync_service,
    state::{SharedState, TaskSlot, clock::ClockAccumulator, mutation::Mutation},
};

/// Start the ticker in [`TaskSlot::Ticker`], replacing any previous one.
pub fn spawn_ticker(state: &SharedState) {
    let period = state.config().clock.tick_interval;
    let task_state = state.clone();
    state.replace_task(TaskSlot::Ticker, tokio::spawn(run(task_state, period)));
    info!(?period, "clock ticker started");
}

async fn run(state: SharedState, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut accumulator = ClockAccumulator::default();
    let mut last = Instant::now();

    loop {
        ticker.tick().await;
        let now = Instant::now();
        let elapsed = now.duration_since(last);
        last = now;

        if !state.document_lock().read().await.is_running {
            accumulator.clear();
            continue;
        }

        let seconds = accumulator.accumulate(elapsed);
        if seconds == 0 {
            continue;
        }
        let outcome = sync_service::mutate(&state, Mutation::Tick { seconds }).await;
        if outcome.rejection.is_none() && !outcome.document.is_running {
            debug!(
                entry_index = outcome.document.current_entry_index,
                "clock ran out on the last entry"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::sleep;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::local_cache::LocalCache,
        state::{
            AppState,
            tournament::{ScheduleEntry, TournamentTemplate},
        },
    };

    fn config(minutes: &[u32]) -> AppConfig {
        AppConfig {
            template: TournamentTemplate {
                schedule: minutes
                    .iter()
                    .zip(1..)
                    .map(|(minutes, id)| ScheduleEntry::level(id, 10, 20, 0, *minutes))
                    .collect(),
                ..TournamentTemplate::default()
            },
            ..AppConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn running_clock_follows_wall_time() {
        let state = AppState::new(config(&[1, 2]), LocalCache::in_memory());
        sync_service::init(&state).await;

        sync_service::mutate(&state, Mutation::StartClock).await;
        sleep(Duration::from_millis(3_100)).await;
        assert_eq!(state.document().await.time_remaining_seconds, 57);

        sync_service::mutate(&state, Mutation::PauseClock).await;
        sleep(Duration::from_secs(10)).await;
        assert_eq!(state.document().await.time_remaining_seconds, 57);
        sync_service::dispose(&state);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_crosses_entries_and_stops_at_the_end() {
        let state = AppState::new(config(&[1, 1]), LocalCache::in_memory());
        sync_service::init(&state).await;

        sync_service::mutate(&state, Mutation::StartClock).await;
        sleep(Duration::from_millis(63_100)).await;
        let document = state.document().await;
        assert_eq!(document.current_entry_index, 1);
        assert_eq!(document.time_remaining_seconds, 57);

        sleep(Duration::from_secs(120)).await;
        let document = state.document().await;
        assert_eq!(document.time_remaining_seconds, 0);
        assert!(!document.is_running);
        sync_service::dispose(&state);
    }
}
