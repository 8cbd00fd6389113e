//! Time utilities for resolving time-window expressions.
//!
//! This module turns the `t0`/`t1` tokens found in archived attribute names
//! into absolute epoch seconds, and renders resolved instants either as
//! numeric epochs or as local `YYYY-MM-DDTHH:MM:SS` strings.

use regex::Regex;
use time::{
    macros::format_description, Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset,
};

/// Seconds per duration unit accepted in relative expressions.
const SECONDS_PER_MINUTE: f64 = 60.0;
const SECONDS_PER_HOUR: f64 = 3_600.0;
const SECONDS_PER_DAY: f64 = 86_400.0;
const SECONDS_PER_WEEK: f64 = 604_800.0;

/// Result of resolving a time expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedTime {
    /// Original string left as-is (format not recognized)
    Raw(String),
    /// Absolute epoch seconds (bare number or local date-time)
    Absolute(f64),
    /// Epoch seconds computed from an offset against "now"
    Relative(f64),
}

impl ResolvedTime {
    /// Epoch seconds if the expression could be resolved.
    pub const fn epoch(&self) -> Option<f64> {
        match self {
            Self::Absolute(v) | Self::Relative(v) => Some(*v),
            Self::Raw(_) => None,
        }
    }
}

/// Resolver for time expressions anchored to a fixed UTC offset.
///
/// The offset stands in for "local time"; it is injected rather than read
/// from the host so resolution stays deterministic.
#[derive(Debug, Clone)]
pub struct TimeResolver {
    offset: UtcOffset,
    relative: Regex,
    term: Regex,
    local: Regex,
}

impl Default for TimeResolver {
    fn default() -> Self {
        Self::new(UtcOffset::UTC)
    }
}

impl TimeResolver {
    /// Create a resolver whose local time is `offset`.
    ///
    /// # Parameters
    ///
    /// - `offset` - UTC offset used to read and render local date-times
    ///
    /// # Returns
    ///
    /// Returns a new `TimeResolver` instance.
    pub fn new(offset: UtcOffset) -> Self {
        Self {
            offset,
            relative: Regex::new(r"^([+-])?\s*((?:(?:\d+(?:\.\d*)?|\.\d+)\s*[wdhms]\s*)+)$")
                .expect("valid relative time regex"),
            term: Regex::new(r"(\d+(?:\.\d*)?|\.\d+)\s*([wdhms])").expect("valid term regex"),
            local: Regex::new(
                r"^(\d{4})[-/](\d{1,2})[-/](\d{1,2})(?:[T ](\d{1,2})(?::(\d{1,2})(?::(\d{1,2}))?)?)?$",
            )
            .expect("valid local time regex"),
        }
    }

    /// UTC offset used as local time.
    pub const fn offset(&self) -> UtcOffset {
        self.offset
    }

    /// Resolve a time expression against `now`.
    ///
    /// Supports:
    /// - bare numbers ("999", "1542681831.7") as absolute epoch seconds
    /// - "now", "now-15m", "-1d", "-2h30m", "-0.5d", "+1w"
    /// - local date-times "2016-06-22", "2016-06-22T00", "2016/06/22T00:00:00"
    ///
    /// # Parameters
    ///
    /// - `input` - Time expression string to resolve
    /// - `now` - Epoch seconds used as the anchor of relative expressions
    ///
    /// # Returns
    ///
    /// Returns `ResolvedTime` containing the epoch value or the raw string if unparseable.
    pub fn resolve_expr(&self, input: &str, now: f64) -> ResolvedTime {
        let s = input.trim();

        if let Ok(v) = s.parse::<f64>() {
            if v.is_finite() {
                return ResolvedTime::Absolute(v);
            }
            return ResolvedTime::Raw(s.to_string());
        }

        if s == "now" {
            return ResolvedTime::Relative(now);
        }

        let (body, sign_required) =
            s.strip_prefix("now").map_or((s, false), |rest| (rest.trim_start(), true));
        if let Some(offset) = self.parse_relative(body, sign_required) {
            let epoch = now + offset;
            if offset.is_finite() && epoch.is_finite() {
                return ResolvedTime::Relative(epoch);
            }
            return ResolvedTime::Raw(s.to_string());
        }

        if let Some(v) = self.parse_local(s) {
            return ResolvedTime::Absolute(v);
        }

        ResolvedTime::Raw(s.to_string())
    }

    /// Resolve a time expression to epoch seconds.
    pub fn resolve(&self, input: &str, now: f64) -> Option<f64> {
        self.resolve_expr(input, now).epoch()
    }

    /// Resolve a time expression to its canonical local-time string.
    pub fn resolve_local(&self, input: &str, now: f64) -> Option<String> {
        self.resolve(input, now).and_then(|v| self.format_local(v))
    }

    /// Render epoch seconds as `YYYY-MM-DDTHH:MM:SS` in the resolver's offset.
    ///
    /// Fractional seconds are truncated toward the past.
    pub fn format_local(&self, epoch: f64) -> Option<String> {
        let secs = epoch.floor();
        if !secs.is_finite() {
            return None;
        }
        let dt = OffsetDateTime::from_unix_timestamp(secs as i64).ok()?.to_offset(self.offset);
        dt.format(format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]")).ok()
    }

    /// Parse a signed duration made of `<number><unit>` terms into seconds.
    fn parse_relative(&self, s: &str, sign_required: bool) -> Option<f64> {
        let caps = self.relative.captures(s)?;
        let sign = caps.get(1).map(|m| m.as_str());
        if sign_required && sign.is_none() {
            return None;
        }

        let mut total = 0.0;
        for term in self.term.captures_iter(&caps[2]) {
            let n: f64 = term[1].parse().ok()?;
            let unit = match &term[2] {
                "s" => 1.0,
                "m" => SECONDS_PER_MINUTE,
                "h" => SECONDS_PER_HOUR,
                "d" => SECONDS_PER_DAY,
                "w" => SECONDS_PER_WEEK,
                _ => return None,
            };
            total += n * unit;
        }

        Some(if sign == Some("-") { -total } else { total })
    }

    /// Parse a local date-time, or any leading prefix of one, into epoch seconds.
    fn parse_local(&self, s: &str) -> Option<f64> {
        let caps = self.local.captures(s)?;
        let field = |i: usize| caps.get(i).map_or(Some(0), |m| m.as_str().parse::<u8>().ok());

        let year: i32 = caps[1].parse().ok()?;
        let month = Month::try_from(field(2)?).ok()?;
        let date = Date::from_calendar_date(year, month, field(3)?).ok()?;
        let time = Time::from_hms(field(4)?, field(5)?, field(6)?).ok()?;

        let local = PrimitiveDateTime::new(date, time).assume_offset(self.offset);
        Some(local.unix_timestamp() as f64)
    }
}

/// Render epoch seconds using the shortest decimal that round-trips.
pub fn format_epoch(epoch: f64) -> String {
    format!("{epoch}")
}

/// Epoch seconds for `fixed_now`, or for the current instant when `None`.
pub fn epoch_now(fixed_now: Option<OffsetDateTime>) -> f64 {
    let now = fixed_now.unwrap_or_else(OffsetDateTime::now_utc);
    let nanos = now.unix_timestamp_nanos() as f64;
    nanos / 1e9
}

/// Parse a `±HH:MM` UTC offset.
///
/// # Errors
///
/// Returns error message if the string is not a valid offset.
pub fn parse_utc_offset(s: &str) -> Result<UtcOffset, String> {
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }
    UtcOffset::parse(s.trim(), format_description!("[offset_hour sign:mandatory]:[offset_minute]"))
        .map_err(|e| format!("invalid utc offset '{s}': {e}"))
}
