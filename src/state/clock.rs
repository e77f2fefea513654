//! Countdown rules for the blind schedule.

use std::time::Duration;

use crate::state::{
    mutation::{Rejection, Step},
    tournament::TournamentDocument,
};

pub(crate) fn start(doc: &mut TournamentDocument) -> Result<(), Rejection> {
    if doc.schedule.is_empty() {
        return Err(Rejection::EmptySchedule);
    }
    if doc.is_running {
        return Err(Rejection::AlreadyRunning);
    }
    if doc.time_remaining_seconds == 0 && doc.upcoming_entry().is_none() {
        return Err(Rejection::ClockExhausted);
    }
    doc.is_running = true;
    Ok(())
}

pub(crate) fn pause(doc: &mut TournamentDocument) -> Result<(), Rejection> {
    if !doc.is_running {
        return Err(Rejection::NotRunning);
    }
    doc.is_running = false;
    Ok(())
}

pub(crate) fn reset(doc: &mut TournamentDocument) -> Result<(), Rejection> {
    let duration = doc
        .current_entry()
        .map(|entry| entry.duration_seconds())
        .ok_or(Rejection::EmptySchedule)?;
    doc.is_running = false;
    doc.time_remaining_seconds = duration;
    Ok(())
}

pub(crate) fn advance_entry(doc: &mut TournamentDocument, step: Step) -> Result<(), Rejection> {
    if doc.schedule.is_empty() {
        return Err(Rejection::EmptySchedule);
    }
    let target = match step {
        Step::Next if doc.current_entry_index + 1 < doc.schedule.len() => {
            doc.current_entry_index + 1
        }
        Step::Next => return Err(Rejection::ScheduleBoundary("last")),
        Step::Previous if doc.current_entry_index > 0 => doc.current_entry_index - 1,
        Step::Previous => return Err(Rejection::ScheduleBoundary("first")),
    };

    doc.current_entry_index = target;
    doc.time_remaining_seconds = doc.schedule[target].duration_seconds();
    doc.is_running = false;
    Ok(())
}

/// Consume `seconds` of running time, crossing as many entries as needed.
pub(crate) fn tick(doc: &mut TournamentDocument, seconds: u64) -> Result<(), Rejection> {
    if !doc.is_running {
        return Err(Rejection::NotRunning);
    }
    if doc.schedule.is_empty() {
        doc.is_running = false;
        return Err(Rejection::EmptySchedule);
    }

    let mut left = seconds;
    loop {
        if left < doc.time_remaining_seconds {
            doc.time_remaining_seconds -= left;
            return Ok(());
        }
        left -= doc.time_remaining_seconds;

        match doc.schedule.get(doc.current_entry_index + 1) {
            Some(next) => {
                doc.current_entry_index += 1;
                doc.time_remaining_seconds = next.duration_seconds();
            }
            None => {
                doc.time_remaining_seconds = 0;
                doc.is_running = false;
                return Ok(());
            }
        }
    }
}

/// Converts irregular ticker wake-ups into whole elapsed seconds.
///
/// The fractional remainder is carried over so the countdown tracks wall
/// time rather than callback cadence.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClockAccumulator {
    carry: Duration,
}

impl ClockAccumulator {
    /// Add `elapsed` and return how many whole seconds are now due.
    pub fn accumulate(&mut self, elapsed: Duration) -> u64 {
        self.carry += elapsed;
        let whole = self.carry.as_secs();
        self.carry -= Duration::from_secs(whole);
        whole
    }

    /// Drop any carried fraction, e.g. when the clock is paused.
    pub fn clear(&mut self) {
        self.carry = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        mutation::Mutation,
        tournament::{ScheduleEntry, TournamentTemplate},
    };

    fn document(minutes: &[u32]) -> TournamentDocument {
        let template = TournamentTemplate {
            schedule: minutes
                .iter()
                .zip(1..)
                .map(|(minutes, id)| ScheduleEntry::level(id, 10, 20, 0, *minutes))
                .collect(),
            ..TournamentTemplate::default()
        };
        TournamentDocument::from_template(&template, 0)
    }

    #[test]
    fn tick_crosses_into_next_entry() {
        let mut doc = document(&[1, 2]);
        start(&mut doc).unwrap();

        tick(&mut doc, 60 + 3).unwrap();

        assert_eq!(doc.current_entry_index, 1);
        assert_eq!(doc.time_remaining_seconds, 120 - 3);
        assert!(doc.is_running);
    }

    #[test]
    fn large_tick_crosses_several_entries() {
        let mut doc = document(&[1, 1, 5]);
        start(&mut doc).unwrap();

        tick(&mut doc, 125).unwrap();

        assert_eq!(doc.current_entry_index, 2);
        assert_eq!(doc.time_remaining_seconds, 300 - 5);
    }

    #[test]
    fn last_entry_expiry_stops_at_zero() {
        let mut doc = document(&[1]);
        start(&mut doc).unwrap();

        tick(&mut doc, 500).unwrap();
        assert_eq!(doc.time_remaining_seconds, 0);
        assert!(!doc.is_running);

        assert_eq!(tick(&mut doc, 1), Err(Rejection::NotRunning));
        assert_eq!(start(&mut doc), Err(Rejection::ClockExhausted));

        reset(&mut doc).unwrap();
        assert_eq!(doc.time_remaining_seconds, 60);
        start(&mut doc).unwrap();
    }

    #[test]
    fn advance_entry_stops_and_resets_time() {
        let mut doc = document(&[1, 2]);
        start(&mut doc).unwrap();
        tick(&mut doc, 10).unwrap();

        advance_entry(&mut doc, Step::Next).unwrap();
        assert_eq!(doc.current_entry_index, 1);
        assert_eq!(doc.time_remaining_seconds, 120);
        assert!(!doc.is_running);

        assert_eq!(
            advance_entry(&mut doc, Step::Next),
            Err(Rejection::ScheduleBoundary("last"))
        );
        advance_entry(&mut doc, Step::Previous).unwrap();
        assert_eq!(
            advance_entry(&mut doc, Step::Previous),
            Err(Rejection::ScheduleBoundary("first"))
        );
    }

    #[test]
    fn start_twice_is_rejected() {
        let doc = document(&[1]);
        let running = doc.apply(&Mutation::StartClock, 10).unwrap();
        assert_eq!(
            running.apply(&Mutation::StartClock, 20),
            Err(Rejection::AlreadyRunning)
        );
    }

    #[test]
    fn accumulator_carries_fractions() {
        let mut acc = ClockAccumulator::default();
        assert_eq!(acc.accumulate(Duration::from_millis(600)), 0);
        assert_eq!(acc.accumulate(Duration::from_millis(600)), 1);
        assert_eq!(acc.accumulate(Duration::from_millis(2_900)), 3);
        assert_eq!(acc.accumulate(Duration::from_millis(100)), 0);

        acc.clear();
        assert_eq!(acc.accumulate(Duration::from_millis(900)), 0);
    }
}
