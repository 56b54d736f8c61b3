//! Client cache headers

use axum::http::{header, HeaderMap, HeaderValue};
use chrono::{DateTime, Duration, Utc};

const SECONDS_PER_DAY: u64 = 86_400;

/// `Expires` in HTTP date format
pub fn http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// `Expires` = now + `days`, `Cache-Control: max-age=<days in seconds>`
pub fn set_cache_control(headers: &mut HeaderMap, days: u32, now: DateTime<Utc>) {
    let expires = now + Duration::days(i64::from(days));
    let max_age = u64::from(days) * SECONDS_PER_DAY;

    if let Ok(value) = HeaderValue::from_str(&http_date(expires)) {
        headers.insert(header::EXPIRES, value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("max-age={max_age}")) {
        headers.insert(header::CACHE_CONTROL, value);
    }
}

pub fn set_no_cache(headers: &mut HeaderMap) {
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
}

/// `attachment; filename="..."`, quotes dropped and non-ASCII replaced
pub fn content_disposition(filename: &str) -> HeaderValue {
    let safe: String = filename
        .chars()
        .filter(|c| *c != '"' && *c != '\\' && !c.is_control())
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    HeaderValue::from_str(&format!("attachment; filename=\"{safe}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
