use once_cell::sync::Lazy;
use time::format_description::well_known::Rfc3339;
use time::{format_description, Date, Duration, OffsetDateTime};

static YMD_FORMAT: Lazy<Vec<format_description::FormatItem<'static>>> = Lazy::new(|| {
    format_description::parse("[year]-[month]-[day]").expect("valid date format description")
});

/// Countdown label for an entry's remaining lifetime.
///
/// An entry whose expiry instant has been reached is reported as expired
/// (the comparison is inclusive, matching the sweep).
pub fn format_remaining(expires_at: OffsetDateTime, now: OffsetDateTime) -> String {
    let remaining = expires_at - now;
    if remaining <= Duration::ZERO {
        return "expired".to_string();
    }

    let total_minutes = remaining.whole_minutes();
    let days = total_minutes / (60 * 24);
    let hours = (total_minutes % (60 * 24)) / 60;
    let minutes = total_minutes % 60;

    if days > 0 {
        format!("{days}d {hours}h left")
    } else if hours > 0 {
        format!("{hours}h {minutes}m left")
    } else {
        let minutes = minutes.max(1);
        format!("{minutes}m left")
    }
}

/// Coarse "how long ago" label for timestamps shown in listings.
pub fn format_relative(instant: OffsetDateTime, now: OffsetDateTime) -> String {
    let diff = now - instant;
    if diff.is_negative() || diff < Duration::seconds(45) {
        return "just now".to_string();
    }
    if diff < Duration::minutes(90) {
        let mins = diff.whole_minutes().max(1);
        return format!("{mins}m ago");
    }
    if diff < Duration::hours(36) {
        let hours = diff.whole_hours().max(1);
        return format!("{hours}h ago");
    }
    if diff < Duration::days(10) {
        let days = diff.whole_days().max(1);
        return format!("{days}d ago");
    }
    format_date_ymd(instant)
}

pub fn format_timestamp(instant: OffsetDateTime) -> String {
    instant
        .format(&Rfc3339)
        .unwrap_or_else(|_| instant.unix_timestamp().to_string())
}

pub fn format_date_ymd(instant: OffsetDateTime) -> String {
    format_day(instant.date())
}

pub fn format_day(date: Date) -> String {
    date.format(&*YMD_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

pub fn parse_date_ymd(input: &str) -> Option<Date> {
    Date::parse(input.trim(), &*YMD_FORMAT).ok()
}
