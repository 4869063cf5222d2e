//! crates/booklog_core/src/progress.rs
//!
//! Pure, side-effect-free derivations over a book's session collection.
//! Nothing here touches storage; callers pass in whatever slice of sessions
//! they have loaded.

use chrono::{NaiveDate, TimeZone};

use crate::domain::ReadingSession;

/// The highest end page among a book's finalized sessions, or `0` if none
/// have finished. A new live session starts on this page.
pub fn last_known_end_page(sessions: &[ReadingSession]) -> i64 {
    sessions
        .iter()
        .filter_map(|s| s.end_page)
        .max()
        .unwrap_or(0)
}

/// The page the reader is currently on: the end page of the most recently
/// started session if it has finished, otherwise that session's start page.
/// `0` when the book has no sessions at all.
pub fn current_page(sessions: &[ReadingSession]) -> i64 {
    sessions
        .iter()
        .max_by_key(|s| s.started_at)
        .map(|s| s.end_page.unwrap_or(s.start_page))
        .unwrap_or(0)
}

/// Percentage of the book implied by [`current_page`], rounded and clamped
/// to 0..=100. Defined as `0` whenever `total_pages` is not positive.
pub fn percent_complete(sessions: &[ReadingSession], total_pages: i64) -> i64 {
    if total_pages <= 0 {
        return 0;
    }
    let pct = (current_page(sessions) as f64 / total_pages as f64 * 100.0).round() as i64;
    pct.clamp(0, 100)
}

/// All of one calendar day's sessions, newest first.
#[derive(Debug, Clone)]
pub struct DayGroup {
    pub day: NaiveDate,
    pub sessions: Vec<ReadingSession>,
}

/// Partitions sessions by the calendar day of their start timestamp in `tz`.
/// Groups are ordered newest day first; sessions within a group are ordered
/// by start time descending.
pub fn group_by_day<Tz: TimeZone>(sessions: &[ReadingSession], tz: &Tz) -> Vec<DayGroup> {
    let mut sorted: Vec<ReadingSession> = sessions.to_vec();
    sorted.sort_by(|a, b| b.started_at.cmp(&a.started_at));

    let mut groups: Vec<DayGroup> = Vec::new();
    for session in sorted {
        let day = session.started_at.with_timezone(tz).date_naive();
        match groups.last_mut() {
            Some(group) if group.day == day => group.sessions.push(session),
            _ => groups.push(DayGroup {
                day,
                sessions: vec![session],
            }),
        }
    }
    groups
}

/// Pages covered across one day: the span from the day's earliest session's
/// start page to its latest session's end page (start page while active),
/// where earliest/latest are by start time. This is deliberately a span, not
/// a sum of per-session deltas, so re-reads within a day don't double-count;
/// it under-counts when sessions are non-monotonic.
pub fn pages_read_in_group(group: &DayGroup) -> i64 {
    let earliest = group.sessions.iter().min_by_key(|s| s.started_at);
    let latest = group.sessions.iter().max_by_key(|s| s.started_at);
    match (earliest, latest) {
        (Some(first), Some(last)) => {
            (last.end_page.unwrap_or(last.start_page) - first.start_page).max(0)
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use uuid::Uuid;

    // Midday UTC keeps the calendar day stable for any sane local offset.
    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap()
    }

    fn finalized(book_id: Uuid, started_at: DateTime<Utc>, start: i64, end: i64) -> ReadingSession {
        let mut s = ReadingSession::started(book_id, started_at, start);
        s.end_page = Some(end);
        s.ended_at = Some(started_at);
        s
    }

    #[test]
    fn last_known_end_page_defaults_to_zero() {
        assert_eq!(last_known_end_page(&[]), 0);
        let book = Uuid::new_v4();
        let active = ReadingSession::started(book, at(1, 12), 5);
        assert_eq!(last_known_end_page(&[active]), 0);
    }

    #[test]
    fn last_known_end_page_is_bare_max() {
        let book = Uuid::new_v4();
        let sessions = vec![
            finalized(book, at(1, 12), 0, 20),
            finalized(book, at(2, 12), 20, 45),
            finalized(book, at(3, 12), 10, 15), // correction pass, lower end
        ];
        // max of end pages, no +1
        assert_eq!(last_known_end_page(&sessions), 45);
    }

    #[test]
    fn current_page_follows_latest_started_session() {
        let book = Uuid::new_v4();
        let sessions = vec![
            finalized(book, at(1, 12), 0, 20),
            finalized(book, at(2, 12), 20, 45),
        ];
        assert_eq!(current_page(&sessions), 45);

        // An active session contributes its start page.
        let mut with_active = sessions.clone();
        with_active.push(ReadingSession::started(book, at(3, 12), 45));
        assert_eq!(current_page(&with_active), 45);

        assert_eq!(current_page(&[]), 0);
    }

    #[test]
    fn percent_complete_clamps_and_handles_bad_totals() {
        let book = Uuid::new_v4();
        let sessions = vec![finalized(book, at(1, 12), 0, 45)];
        assert_eq!(percent_complete(&sessions, 100), 45);
        assert_eq!(percent_complete(&sessions, 0), 0);
        assert_eq!(percent_complete(&sessions, -5), 0);
        // Reading past the stated page count clamps at 100.
        assert_eq!(percent_complete(&sessions, 30), 100);
        assert_eq!(percent_complete(&[], 100), 0);
    }

    #[test]
    fn pages_read_formula() {
        let book = Uuid::new_v4();
        assert_eq!(finalized(book, at(1, 12), 10, 10).pages_read(), 1);
        assert_eq!(finalized(book, at(1, 12), 0, 20).pages_read(), 21);
        assert_eq!(finalized(book, at(1, 12), 30, 10).pages_read(), 0);
        assert_eq!(ReadingSession::started(book, at(1, 12), 10).pages_read(), 0);
    }

    #[test]
    fn group_by_day_is_a_partition_sorted_descending() {
        let book = Uuid::new_v4();
        let sessions = vec![
            finalized(book, at(1, 10), 0, 10),
            finalized(book, at(1, 14), 15, 30),
            finalized(book, at(2, 12), 30, 45),
            finalized(book, at(4, 12), 45, 50),
        ];
        let groups = group_by_day(&sessions, &Utc);
        assert_eq!(groups.len(), 3);

        // Newest day first, sessions within a day newest first.
        assert!(groups[0].day > groups[1].day);
        assert!(groups[1].day > groups[2].day);
        assert_eq!(groups[2].sessions.len(), 2);
        assert!(groups[2].sessions[0].started_at > groups[2].sessions[1].started_at);

        // Every session lands in exactly one group.
        let total: usize = groups.iter().map(|g| g.sessions.len()).sum();
        assert_eq!(total, sessions.len());
        let mut seen: Vec<Uuid> = groups
            .iter()
            .flat_map(|g| g.sessions.iter().map(|s| s.id))
            .collect();
        seen.sort();
        let mut expected: Vec<Uuid> = sessions.iter().map(|s| s.id).collect();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn pages_read_in_group_is_a_span_not_a_sum() {
        let book = Uuid::new_v4();
        // Two sessions same day with a gap: A(0-10) then B(15-30).
        let sessions = vec![
            finalized(book, at(1, 9), 0, 10),
            finalized(book, at(1, 15), 15, 30),
        ];
        let groups = group_by_day(&sessions, &Utc);
        assert_eq!(groups.len(), 1);
        assert_eq!(pages_read_in_group(&groups[0]), 30);
    }

    #[test]
    fn pages_read_in_group_floors_at_zero() {
        let book = Uuid::new_v4();
        // Non-monotonic day: jumped backwards for a re-read.
        let sessions = vec![
            finalized(book, at(1, 9), 50, 60),
            finalized(book, at(1, 15), 10, 20),
        ];
        let groups = group_by_day(&sessions, &Utc);
        assert_eq!(pages_read_in_group(&groups[0]), 0);
    }

    #[test]
    fn two_day_scenario() {
        // Book with 100 pages; A(0-20) on day 1, B(20-45) on day 2.
        let book = Uuid::new_v4();
        let sessions = vec![
            finalized(book, at(1, 12), 0, 20),
            finalized(book, at(2, 12), 20, 45),
        ];
        assert_eq!(current_page(&sessions), 45);
        assert_eq!(percent_complete(&sessions, 100), 45);

        let groups = group_by_day(&sessions, &Utc);
        assert_eq!(groups.len(), 2);
        assert_eq!(pages_read_in_group(&groups[0]), 25); // day 2
        assert_eq!(pages_read_in_group(&groups[1]), 20); // day 1
    }
}
