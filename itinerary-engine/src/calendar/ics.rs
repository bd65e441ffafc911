//! RFC 5545 text writer.

use chrono::{DateTime, Datelike, Utc};
use tracing::debug;

use crate::domain::Item;

use super::tz::{self, StandardRule};
use super::{CalendarError, CalendarExport, SkipReason, Skipped};

const PRODID: &str = "-//itinerary-engine//EN";
const UID_DOMAIN: &str = "itinerary-engine";
/// Octets per physical line, excluding CRLF.
const FOLD_AT: usize = 75;

/// Escape a TEXT value: backslash, semicolon, comma and newlines.
pub fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str("\\n");
            }
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

/// Fold a content line into physical lines of at most 75 octets.
///
/// Continuation lines start with a single space. Splits never fall inside
/// a UTF-8 sequence. The result has no trailing CRLF.
pub fn fold_line(line: &str) -> String {
    if line.len() <= FOLD_AT {
        return line.to_string();
    }

    let mut out = String::with_capacity(line.len() + line.len() / FOLD_AT * 3);
    let mut width = 0;
    let mut limit = FOLD_AT;
    for c in line.chars() {
        let len = c.len_utf8();
        if width + len > limit {
            out.push_str("\r\n ");
            width = 0;
            // The leading space counts towards the next line.
            limit = FOLD_AT - 1;
        }
        out.push(c);
        width += len;
    }
    out
}

struct Writer {
    out: String,
}

impl Writer {
    fn new() -> Self {
        Self { out: String::new() }
    }

    fn line(&mut self, name: &str, value: &str) {
        self.out.push_str(&fold_line(&format!("{name}:{value}")));
        self.out.push_str("\r\n");
    }

    fn text(&mut self, name: &str, value: &str) {
        self.line(name, &escape_text(value));
    }

    fn timestamp(&mut self, name: &str, at: DateTime<Utc>) {
        self.line(name, &at.format("%Y%m%dT%H%M%SZ").to_string());
    }

    fn timezone(&mut self, rule: &StandardRule) {
        let offset = tz::format_offset(rule.offset_secs);
        self.line("BEGIN", "VTIMEZONE");
        self.line("TZID", &rule.tzid);
        self.line("BEGIN", "STANDARD");
        self.line("DTSTART", "19700101T000000");
        self.line("TZOFFSETFROM", &offset);
        self.line("TZOFFSETTO", &offset);
        self.text("TZNAME", &rule.name);
        self.line("END", "STANDARD");
        self.line("END", "VTIMEZONE");
    }
}

/// An item's event window, or the reason it has none.
fn event_times(
    item: &Item,
    zone: Option<chrono_tz::Tz>,
) -> Result<(DateTime<Utc>, Option<DateTime<Utc>>), SkipReason> {
    let start = match (item.start, item.end) {
        (None, None) => return Err(SkipReason::MissingTimes),
        (None, Some(_)) => return Err(SkipReason::MissingStart),
        (Some(start), _) => start,
    };
    let start = tz::to_utc(zone, start).ok_or(SkipReason::NonexistentLocalTime)?;
    let end = match item.end {
        None => None,
        Some(end) => Some(tz::to_utc(zone, end).ok_or(SkipReason::NonexistentLocalTime)?),
    };
    if end.is_some_and(|end| end < start) {
        return Err(SkipReason::EndBeforeStart);
    }
    Ok((start, end))
}

/// Serialize `items` as a calendar named `title`.
///
/// `timezone` is the IANA zone the items' wall-clock times are in; `None`
/// means they are already UTC. `generated_at` becomes every event's
/// `DTSTAMP`, which keeps exports reproducible.
pub fn export(
    title: &str,
    items: &[&Item],
    timezone: Option<&str>,
    generated_at: DateTime<Utc>,
) -> Result<CalendarExport, CalendarError> {
    let zone = tz::resolve(timezone)?;

    let mut events = Vec::new();
    let mut skipped = Vec::new();
    for item in items {
        match event_times(item, zone) {
            Ok((start, end)) => events.push((*item, start, end)),
            Err(reason) => {
                debug!(item = %item.id, ?reason, "item left out of calendar");
                skipped.push(Skipped {
                    item_id: item.id.clone(),
                    reason,
                });
            }
        }
    }

    let mut w = Writer::new();
    w.line("BEGIN", "VCALENDAR");
    w.line("VERSION", "2.0");
    w.line("PRODID", PRODID);
    w.line("CALSCALE", "GREGORIAN");
    w.line("METHOD", "PUBLISH");
    w.text("X-WR-CALNAME", title);

    let mut approximate_timezone = false;
    if let Some(zone) = zone {
        let year = events
            .first()
            .map(|(_, start, _)| start.year())
            .unwrap_or_else(|| generated_at.year());
        let rule = tz::standard_rule(zone, year);
        approximate_timezone = rule.observes_dst;
        w.line("X-WR-TIMEZONE", &rule.tzid);
        w.timezone(&rule);
    }

    for (item, start, end) in &events {
        w.line("BEGIN", "VEVENT");
        w.line("UID", &format!("{}@{UID_DOMAIN}", item.id));
        w.timestamp("DTSTAMP", generated_at);
        w.timestamp("DTSTART", *start);
        if let Some(end) = end {
            w.timestamp("DTEND", *end);
        }
        w.text("SUMMARY", &item.title);
        if let Some(note) = &item.note {
            w.text("DESCRIPTION", note);
        }
        if let Some(address) = &item.address {
            w.text("LOCATION", address);
        }
        if let Some(c) = &item.coordinate {
            w.line("GEO", &format!("{:.6};{:.6}", c.lat(), c.lng()));
        }
        w.line("END", "VEVENT");
    }
    w.line("END", "VCALENDAR");

    Ok(CalendarExport {
        ics: w.out,
        events: events.len(),
        skipped,
        approximate_timezone,
    })
}
