use time::OffsetDateTime;

/// User-facing "time since last visit" signals, derived from the repository's
/// last-access timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisitSnapshot {
    pub last_visited_at: Option<OffsetDateTime>,
    pub days_since_last_visit: Option<i64>,
}

impl VisitSnapshot {
    /// Gap between the previously recorded access and now, in whole days,
    /// clamped at zero. No recorded access means no gap to report.
    pub fn from_gap(last_access: Option<OffsetDateTime>, now: OffsetDateTime) -> Self {
        match last_access {
            None => Self::default(),
            Some(last) => {
                let gap = now - last;
                let days = if gap.is_negative() { 0 } else { gap.whole_days() };
                Self {
                    last_visited_at: Some(last),
                    days_since_last_visit: Some(days),
                }
            }
        }
    }

    /// The user is visiting right now; the gap collapses to zero.
    pub fn fresh(now: OffsetDateTime) -> Self {
        Self {
            last_visited_at: Some(now),
            days_since_last_visit: Some(0),
        }
    }
}

pub fn visit_message(days_since_last_visit: Option<i64>) -> String {
    match days_since_last_visit {
        None => "Welcome! This looks like your first visit.".to_string(),
        Some(0) => "You already stopped by today.".to_string(),
        Some(1) => "Welcome back after a day away.".to_string(),
        Some(days) => format!("Welcome back after {days} days."),
    }
}
