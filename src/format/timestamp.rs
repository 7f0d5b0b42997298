// Proleptic Gregorian conversion from unix seconds to ISO-8601.
//
// Kept free of chrono so record timestamps render identically on every
// platform; negative inputs clamp to the epoch.

const DAYS_PER_MONTH: [i64; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

const fn is_leap_year(year: i64) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

const fn days_in_year(year: i64) -> i64 {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}

fn days_in_month(year: i64, month: usize) -> i64 {
    if month == 1 && is_leap_year(year) {
        29
    } else {
        DAYS_PER_MONTH[month]
    }
}

/// Render `secs` (unix seconds) as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn write_iso8601(out: &mut impl std::fmt::Write, secs: i64) -> std::fmt::Result {
    let secs = secs.max(0);

    let mut remaining_days = secs / 86_400;
    let day_secs = secs % 86_400;
    let hour = day_secs / 3600;
    let minute = (day_secs % 3600) / 60;
    let second = day_secs % 60;

    let mut year = 1970;
    while remaining_days >= days_in_year(year) {
        remaining_days -= days_in_year(year);
        year += 1;
    }

    let mut month = 0;
    while remaining_days >= days_in_month(year, month) {
        remaining_days -= days_in_month(year, month);
        month += 1;
    }
    let day = remaining_days + 1;

    write!(
        out,
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        year,
        month + 1,
        day,
        hour,
        minute,
        second
    )
}

/// Convenience wrapper returning an owned string.
pub fn iso8601(secs: i64) -> String {
    let mut out = String::with_capacity(20);
    // Writing into a String cannot fail
    let _ = write_iso8601(&mut out, secs);
    out
}
