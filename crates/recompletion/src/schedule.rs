//! Human-readable schedule expressions ("6 months", "next monday",
//! "first day of next month", "2027-01-01 09:00").
//!
//! Expressions are resolved against a reference time. Items are applied
//! left to right to a cursor that starts at the reference, so
//! `"tomorrow 9:00"` and `"1 year 2 months"` compose the way they read.

use std::sync::LazyLock;

use chrono::{
    DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
    Weekday,
};
use regex::Regex;

/// Returned by [`parse_schedule`] when an expression cannot be resolved.
pub const UNPARSEABLE: i64 = 0;

static RE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"@-?\d+|\d{4}-\d{1,2}-\d{1,2}|\d{1,2}(?::\d{2}(?::\d{2})?)?\s*(?:am|pm)\b|\d{1,2}:\d{2}(?::\d{2})?|[+-]?\d+(?:st|nd|rd|th)?|[+-]|[a-z]+",
    )
    .unwrap()
});

static RE_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\s,.]*$").unwrap());

static RE_CLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})(?::(\d{2})(?::(\d{2}))?)?\s*(am|pm)?$").unwrap()
});

/// Resolves `expression` against `reference` and returns a unix timestamp,
/// or [`UNPARSEABLE`] when the expression is not understood.
pub fn parse_schedule(expression: &str, reference: DateTime<Utc>) -> i64 {
    try_parse_schedule(expression, reference)
        .map(|t| t.timestamp())
        .unwrap_or(UNPARSEABLE)
}

/// Resolves `expression` against the current time.
pub fn calculate_schedule_time(expression: &str) -> i64 {
    parse_schedule(expression, Utc::now())
}

/// Like [`parse_schedule`] but keeps the chrono type.
pub fn try_parse_schedule(expression: &str, reference: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let input = expression.trim().to_lowercase();
    if input.is_empty() {
        return None;
    }

    // RFC 3339 carries its own offset; everything else goes through the tokenizer.
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&input.to_uppercase()) {
        return after_epoch(parsed.with_timezone(&Utc));
    }

    let tokens = tokenize(&input)?;
    let resolved = Resolver::new(&tokens, reference).resolve()?;
    after_epoch(resolved)
}

fn after_epoch(value: DateTime<Utc>) -> Option<DateTime<Utc>> {
    (value.timestamp() > 0).then_some(value)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Epoch(i64),
    Date(NaiveDate),
    Clock(NaiveTime),
    Number { value: i64, signed: bool, ordinal: bool },
    Sign(i64),
    Word(String),
}

fn tokenize(input: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut last_end = 0;

    for m in RE_TOKEN.find_iter(input) {
        if !RE_SEPARATOR.is_match(&input[last_end..m.start()]) {
            return None;
        }
        last_end = m.end();
        tokens.push(classify(m.as_str())?);
    }

    if !RE_SEPARATOR.is_match(&input[last_end..]) || tokens.is_empty() {
        return None;
    }
    Some(tokens)
}

fn classify(raw: &str) -> Option<Token> {
    if let Some(epoch) = raw.strip_prefix('@') {
        return epoch.parse().ok().map(Token::Epoch);
    }
    if raw.len() >= 8 && raw.as_bytes()[4] == b'-' {
        return NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .map(Token::Date);
    }
    let leading_digit = raw.starts_with(|c: char| c.is_ascii_digit());
    if leading_digit && (raw.contains(':') || raw.ends_with("am") || raw.ends_with("pm")) {
        return parse_clock(raw).map(Token::Clock);
    }
    match raw {
        "+" => return Some(Token::Sign(1)),
        "-" => return Some(Token::Sign(-1)),
        _ => {}
    }
    if raw.starts_with(|c: char| c.is_ascii_digit() || c == '+' || c == '-') {
        let digits = raw.trim_end_matches(|c: char| c.is_ascii_alphabetic());
        let ordinal = digits.len() != raw.len();
        let signed = raw.starts_with(['+', '-']);
        return digits.parse().ok().map(|value| Token::Number {
            value,
            signed,
            ordinal,
        });
    }
    Some(Token::Word(raw.to_string()))
}

fn parse_clock(raw: &str) -> Option<NaiveTime> {
    let caps = RE_CLOCK.captures(raw.trim())?;
    let mut hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = caps.get(2).map_or(Ok(0), |m| m.as_str().parse()).ok()?;
    let second: u32 = caps.get(3).map_or(Ok(0), |m| m.as_str().parse()).ok()?;

    match caps.get(4).map(|m| m.as_str()) {
        Some("am") if hour == 12 => hour = 0,
        Some("pm") if hour < 12 => hour += 12,
        Some(_) if hour > 12 => return None,
        _ => {}
    }
    NaiveTime::from_hms_opt(hour, minute, second)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Fortnight,
    Month,
    Year,
}

fn unit_of(word: &str) -> Option<Unit> {
    let unit = match word {
        "sec" | "secs" | "second" | "seconds" => Unit::Second,
        "min" | "mins" | "minute" | "minutes" => Unit::Minute,
        "hour" | "hours" => Unit::Hour,
        "day" | "days" => Unit::Day,
        "week" | "weeks" => Unit::Week,
        "fortnight" | "fortnights" => Unit::Fortnight,
        "month" | "months" => Unit::Month,
        "year" | "years" => Unit::Year,
        _ => return None,
    };
    Some(unit)
}

fn weekday_of(word: &str) -> Option<Weekday> {
    let day = match word {
        "mon" | "monday" => Weekday::Mon,
        "tue" | "tues" | "tuesday" => Weekday::Tue,
        "wed" | "wednesday" => Weekday::Wed,
        "thu" | "thur" | "thurs" | "thursday" => Weekday::Thu,
        "fri" | "friday" => Weekday::Fri,
        "sat" | "saturday" => Weekday::Sat,
        "sun" | "sunday" => Weekday::Sun,
        _ => return None,
    };
    Some(day)
}

fn month_of(word: &str) -> Option<u32> {
    let month = match word {
        "jan" | "january" => 1,
        "feb" | "february" => 2,
        "mar" | "march" => 3,
        "apr" | "april" => 4,
        "may" => 5,
        "jun" | "june" => 6,
        "jul" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dec" | "december" => 12,
        _ => return None,
    };
    Some(month)
}

fn add_units(cursor: DateTime<Utc>, unit: Unit, amount: i64) -> Option<DateTime<Utc>> {
    let seconds = match unit {
        Unit::Second => amount,
        Unit::Minute => amount.checked_mul(60)?,
        Unit::Hour => amount.checked_mul(3_600)?,
        Unit::Day => amount.checked_mul(86_400)?,
        Unit::Week => amount.checked_mul(7 * 86_400)?,
        Unit::Fortnight => amount.checked_mul(14 * 86_400)?,
        Unit::Month => return add_months(cursor, amount),
        Unit::Year => return add_months(cursor, amount.checked_mul(12)?),
    };
    cursor.checked_add_signed(Duration::try_seconds(seconds)?)
}

/// Month arithmetic clamps to the end of the target month (Jan 31 + 1 month = Feb 28/29).
fn add_months(cursor: DateTime<Utc>, amount: i64) -> Option<DateTime<Utc>> {
    let months = Months::new(u32::try_from(amount.unsigned_abs()).ok()?);
    if amount >= 0 {
        cursor.checked_add_months(months)
    } else {
        cursor.checked_sub_months(months)
    }
}

fn at(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&NaiveDateTime::new(date, time))
}

fn at_midnight(cursor: DateTime<Utc>) -> DateTime<Utc> {
    at(cursor.date_naive(), NaiveTime::MIN)
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

struct Resolver<'a> {
    tokens: &'a [Token],
    pos: usize,
    cursor: DateTime<Utc>,
}

impl<'a> Resolver<'a> {
    fn new(tokens: &'a [Token], reference: DateTime<Utc>) -> Self {
        Self {
            tokens,
            pos: 0,
            cursor: reference,
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_word(&self) -> Option<&'a str> {
        match self.peek() {
            Some(Token::Word(w)) => Some(w.as_str()),
            _ => None,
        }
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn expect_word(&mut self, expected: &str) -> Option<()> {
        match self.next()? {
            Token::Word(w) if w == expected => Some(()),
            _ => None,
        }
    }

    fn resolve(mut self) -> Option<DateTime<Utc>> {
        while let Some(token) = self.next() {
            self.cursor = match token {
                Token::Epoch(secs) => Utc.timestamp_opt(*secs, 0).single()?,
                Token::Date(date) => at(*date, NaiveTime::MIN),
                Token::Clock(time) => at(self.cursor.date_naive(), *time),
                Token::Sign(sign) => match self.next()? {
                    Token::Number { value, signed: false, ordinal: false } => {
                        self.relative(sign.checked_mul(*value)?)?
                    }
                    _ => return None,
                },
                Token::Number { value, ordinal, .. } => self.number(*value, *ordinal)?,
                Token::Word(word) => self.word(word)?,
            };
        }
        Some(self.cursor)
    }

    /// `N unit [ago]`, `N month [year]` or a bare year.
    fn number(&mut self, value: i64, ordinal: bool) -> Option<DateTime<Utc>> {
        if let Some(word) = self.peek_word() {
            if !ordinal && unit_of(word).is_some() {
                return self.relative(value);
            }
            if let Some(month) = month_of(word) {
                self.pos += 1;
                let year = self.optional_year();
                return self.calendar_date(year, month, u32::try_from(value).ok()?);
            }
        }
        None
    }

    /// Consumes a unit word (and a trailing `ago`) and applies `amount` of it.
    fn relative(&mut self, amount: i64) -> Option<DateTime<Utc>> {
        let unit = unit_of(self.peek_word()?)?;
        self.pos += 1;
        let amount = if self.peek_word() == Some("ago") {
            self.pos += 1;
            amount.checked_neg()?
        } else {
            amount
        };
        add_units(self.cursor, unit, amount)
    }

    fn optional_year(&mut self) -> Option<i32> {
        match self.peek() {
            Some(Token::Number {
                value,
                signed: false,
                ordinal: false,
            }) if (1000..=9999).contains(value) => {
                self.pos += 1;
                i32::try_from(*value).ok()
            }
            _ => None,
        }
    }

    fn optional_day(&mut self) -> Option<u32> {
        match self.peek() {
            Some(Token::Number {
                value,
                signed: false,
                ..
            }) if (1..=31).contains(value) => {
                self.pos += 1;
                u32::try_from(*value).ok()
            }
            _ => None,
        }
    }

    fn calendar_date(&self, year: Option<i32>, month: u32, day: u32) -> Option<DateTime<Utc>> {
        let year = year.unwrap_or_else(|| self.cursor.year());
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        Some(at(date, NaiveTime::MIN))
    }

    fn word(&mut self, word: &str) -> Option<DateTime<Utc>> {
        match word {
            "now" | "at" | "and" | "in" => Some(self.cursor),
            "today" | "midnight" => Some(at_midnight(self.cursor)),
            "noon" => Some(at(
                self.cursor.date_naive(),
                NaiveTime::from_hms_opt(12, 0, 0)?,
            )),
            "tomorrow" => at_midnight(self.cursor).checked_add_signed(Duration::days(1)),
            "yesterday" => at_midnight(self.cursor).checked_sub_signed(Duration::days(1)),
            "a" | "an" => self.relative(1),
            "first" | "last" if self.is_day_of() => self.day_of(word == "first"),
            "next" => self.shift(1),
            "last" | "previous" => self.shift(-1),
            "this" => self.shift(0),
            _ => {
                if let Some(day) = weekday_of(word) {
                    return self.weekday(day, 0);
                }
                if let Some(month) = month_of(word) {
                    let day = self.optional_day().unwrap_or(1);
                    let year = self.optional_year();
                    return self.calendar_date(year, month, day);
                }
                None
            }
        }
    }

    fn is_day_of(&self) -> bool {
        matches!(
            (self.tokens.get(self.pos), self.tokens.get(self.pos + 1)),
            (Some(Token::Word(a)), Some(Token::Word(b))) if a == "day" && b == "of"
        )
    }

    /// `first|last day of <month spec>`.
    fn day_of(&mut self, first: bool) -> Option<DateTime<Utc>> {
        self.expect_word("day")?;
        self.expect_word("of")?;

        let (year, month) = match self.next()? {
            Token::Word(w) if w == "next" || w == "last" || w == "previous" || w == "this" => {
                let offset = match w.as_str() {
                    "next" => 1,
                    "this" => 0,
                    _ => -1,
                };
                self.expect_word("month")?;
                let first_of_month = at(
                    NaiveDate::from_ymd_opt(self.cursor.year(), self.cursor.month(), 1)?,
                    self.cursor.time(),
                );
                let shifted = add_months(first_of_month, offset)?;
                (shifted.year(), shifted.month())
            }
            Token::Word(w) => {
                let month = month_of(w)?;
                (self.optional_year().unwrap_or_else(|| self.cursor.year()), month)
            }
            _ => return None,
        };

        let date = if first {
            NaiveDate::from_ymd_opt(year, month, 1)?
        } else {
            last_day_of_month(year, month)?
        };
        Some(at(date, self.cursor.time()))
    }

    /// `next|last|this` followed by a unit or a weekday.
    fn shift(&mut self, direction: i64) -> Option<DateTime<Utc>> {
        let word = self.peek_word()?;
        if let Some(day) = weekday_of(word) {
            self.pos += 1;
            return self.weekday(day, direction);
        }
        let unit = unit_of(word)?;
        self.pos += 1;
        add_units(self.cursor, unit, direction)
    }

    /// Moves to the given weekday at midnight. `direction` 0 allows today,
    /// 1 means strictly after today, -1 strictly before.
    fn weekday(&self, target: Weekday, direction: i64) -> Option<DateTime<Utc>> {
        let current = i64::from(self.cursor.weekday().num_days_from_monday());
        let target = i64::from(target.num_days_from_monday());
        let days = match direction {
            0 => (target - current).rem_euclid(7),
            d if d > 0 => match (target - current).rem_euclid(7) {
                0 => 7,
                n => n,
            },
            _ => match (current - target).rem_euclid(7) {
                0 => -7,
                n => -n,
            },
        };
        at_midnight(self.cursor).checked_add_signed(Duration::days(days))
    }
}
