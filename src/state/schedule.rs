//! Schedule editing transitions.

use crate::state::{
    mutation::{EntryPatch, EntryType, Rejection},
    tournament::{
        DEFAULT_ENTRY_MINUTES, DEFAULT_PAUSE_LABEL, EntryId, EntryKind, ScheduleEntry,
        TournamentDocument,
    },
};

/// Merge `patch` over `base`, switching kind when asked.
fn merge(base: &ScheduleEntry, patch: &EntryPatch) -> Result<ScheduleEntry, Rejection> {
    let current = match base.kind {
        EntryKind::Level { .. } => EntryType::Level,
        EntryKind::Pause { .. } => EntryType::Pause,
    };
    let target = patch.kind.unwrap_or(current);
    let duration_minutes = patch.duration_minutes.unwrap_or(base.duration_minutes);
    if duration_minutes == 0 {
        return Err(Rejection::InvalidEntry("duration must be positive"));
    }

    let kind = match (target, &base.kind) {
        (
            EntryType::Level,
            EntryKind::Level {
                small_blind,
                big_blind,
                ante,
            },
        ) => EntryKind::Level {
            small_blind: patch.small_blind.unwrap_or(*small_blind),
            big_blind: patch.big_blind.unwrap_or(*big_blind),
            ante: patch.ante.unwrap_or(*ante),
        },
        (EntryType::Level, EntryKind::Pause { .. }) => EntryKind::Level {
            small_blind: patch.small_blind.unwrap_or_default(),
            big_blind: patch.big_blind.unwrap_or_default(),
            ante: patch.ante.unwrap_or_default(),
        },
        (EntryType::Pause, EntryKind::Pause { label }) => EntryKind::Pause {
            label: patch.label.clone().unwrap_or_else(|| label.clone()),
        },
        (EntryType::Pause, EntryKind::Level { .. }) => EntryKind::Pause {
            label: patch
                .label
                .clone()
                .unwrap_or_else(|| DEFAULT_PAUSE_LABEL.to_string()),
        },
    };

    let kind = match kind {
        EntryKind::Level {
            small_blind,
            big_blind,
            ..
        } if small_blind > big_blind => {
            return Err(Rejection::InvalidEntry(
                "small blind must not exceed big blind",
            ));
        }
        EntryKind::Pause { label } if label.trim().is_empty() => EntryKind::Pause {
            label: DEFAULT_PAUSE_LABEL.to_string(),
        },
        other => other,
    };

    Ok(ScheduleEntry {
        id: base.id,
        duration_minutes,
        kind,
    })
}

pub(crate) fn add_entry(doc: &mut TournamentDocument, patch: &EntryPatch) -> Result<(), Rejection> {
    let id = doc.schedule.iter().map(|entry| entry.id).max().unwrap_or(0) + 1;
    let blank = ScheduleEntry::level(id, 0, 0, 0, DEFAULT_ENTRY_MINUTES);
    let entry = merge(&blank, patch)?;
    let was_empty = doc.schedule.is_empty();

    doc.schedule.push(entry);
    doc.schedule.sort_by_key(|entry| entry.id);

    if was_empty {
        doc.current_entry_index = 0;
        doc.time_remaining_seconds = doc.schedule[0].duration_seconds();
    }
    Ok(())
}

pub(crate) fn update_entry(
    doc: &mut TournamentDocument,
    id: EntryId,
    patch: &EntryPatch,
) -> Result<(), Rejection> {
    if *patch == EntryPatch::default() {
        return Err(Rejection::EmptyPatch);
    }
    let slot = doc
        .schedule
        .iter_mut()
        .find(|entry| entry.id == id)
        .ok_or(Rejection::UnknownEntry(id))?;
    *slot = merge(slot, patch)?;
    Ok(())
}

/// Removing an entry before the running one keeps the clock on the same
/// entry; removing the running entry moves it to its successor (or the new
/// last entry) with a full countdown.
pub(crate) fn remove_entry(doc: &mut TournamentDocument, id: EntryId) -> Result<(), Rejection> {
    let position = doc
        .schedule
        .iter()
        .position(|entry| entry.id == id)
        .ok_or(Rejection::UnknownEntry(id))?;
    doc.schedule.remove(position);

    if doc.schedule.is_empty() {
        doc.current_entry_index = 0;
        doc.time_remaining_seconds = 0;
        doc.is_running = false;
        return Ok(());
    }

    if position < doc.current_entry_index {
        doc.current_entry_index -= 1;
    } else if position == doc.current_entry_index {
        doc.current_entry_index = doc.current_entry_index.min(doc.schedule.len() - 1);
        doc.time_remaining_seconds = doc.schedule[doc.current_entry_index].duration_seconds();
    }
    Ok(())
}
