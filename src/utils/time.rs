use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Third Friday of the given month, the standard monthly options expiration.
pub fn third_friday(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, Weekday::Fri, 3)
}

/// Third Friday of the month after `today`'s month.
pub fn following_third_friday(today: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };
    third_friday(year, month)
}

/// Planned exit date, a fixed number of days ahead of expiration.
pub fn exit_date(expiration: NaiveDate, days_before: i64) -> NaiveDate {
    expiration - Duration::days(days_before)
}
