//! Timezone resolution and the single-rule `VTIMEZONE` approximation.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::{OffsetComponents, Tz};

use super::CalendarError;

/// The one rule written into `VTIMEZONE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct StandardRule {
    pub tzid: String,
    /// Seconds east of UTC.
    pub offset_secs: i32,
    pub name: String,
    /// The zone changes offset during the sampled year.
    pub observes_dst: bool,
}

pub(super) fn resolve(name: Option<&str>) -> Result<Option<Tz>, CalendarError> {
    match name {
        None => Ok(None),
        Some(name) => name
            .parse::<Tz>()
            .map(Some)
            .map_err(|_| CalendarError::UnknownTimezone(name.to_string())),
    }
}

/// Convert a wall-clock time to UTC. Times without a zone are taken as UTC.
///
/// Returns `None` for times skipped by a daylight-saving gap; ambiguous
/// times resolve to the earlier instant.
pub(super) fn to_utc(zone: Option<Tz>, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    match zone {
        None => Some(local.and_utc()),
        Some(tz) => tz
            .from_local_datetime(&local)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc)),
    }
}

/// Sample the zone through `year` and derive its standard-time rule.
pub(super) fn standard_rule(tz: Tz, year: i32) -> StandardRule {
    let samples: Vec<_> = (1..=12)
        .flat_map(|month| [1, 15].map(|day| (month, day)))
        .filter_map(|(month, day)| NaiveDate::from_ymd_opt(year, month, day))
        .filter_map(|date| date.and_hms_opt(12, 0, 0))
        .map(|noon| tz.offset_from_utc_datetime(&noon))
        .collect();

    let observes_dst = samples
        .windows(2)
        .any(|pair| pair[0].fix() != pair[1].fix());
    let standard = samples
        .iter()
        .find(|offset| offset.dst_offset().num_seconds() == 0)
        .or(samples.first());

    match standard {
        Some(offset) => StandardRule {
            tzid: tz.name().to_string(),
            offset_secs: offset.base_utc_offset().num_seconds() as i32,
            name: offset.to_string(),
            observes_dst,
        },
        None => StandardRule {
            tzid: tz.name().to_string(),
            offset_secs: 0,
            name: "UTC".to_string(),
            observes_dst,
        },
    }
}

/// `+HHMM` / `-HHMM` as used by `TZOFFSETFROM` and `TZOFFSETTO`.
pub(super) fn format_offset(secs: i32) -> String {
    let sign = if secs < 0 { '-' } else { '+' };
    let abs = secs.unsigned_abs();
    format!("{sign}{:02}{:02}", abs / 3600, (abs % 3600) / 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_offset_zone() {
        let rule = standard_rule(chrono_tz::Asia::Ho_Chi_Minh, 2025);
        assert_eq!(rule.tzid, "Asia/Ho_Chi_Minh");
        assert_eq!(rule.offset_secs, 7 * 3600);
        assert!(!rule.observes_dst);
    }

    #[test]
    fn dst_zone_uses_standard_offset() {
        let rule = standard_rule(chrono_tz::Europe::Paris, 2025);
        assert_eq!(rule.offset_secs, 3600);
        assert!(rule.observes_dst);

        let rule = standard_rule(chrono_tz::America::New_York, 2025);
        assert_eq!(rule.offset_secs, -5 * 3600);
        assert!(rule.observes_dst);
    }

    #[test]
    fn offsets_format() {
        assert_eq!(format_offset(7 * 3600), "+0700");
        assert_eq!(format_offset(-(3 * 3600 + 30 * 60)), "-0330");
        assert_eq!(format_offset(0), "+0000");
    }

    #[test]
    fn unknown_zone_rejected() {
        assert_eq!(
            resolve(Some("Mars/Olympus")),
            Err(CalendarError::UnknownTimezone("Mars/Olympus".into()))
        );
        assert_eq!(resolve(None), Ok(None));
    }

    #[test]
    fn gap_times_do_not_exist() {
        // Clocks in Paris jump from 02:00 to 03:00 on 2025-03-30.
        let gap = NaiveDate::from_ymd_opt(2025, 3, 30)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        assert_eq!(to_utc(Some(chrono_tz::Europe::Paris), gap), None);

        // 02:30 on the fall-back night happens twice; the first one wins.
        let twice = NaiveDate::from_ymd_opt(2025, 10, 26)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        let utc = to_utc(Some(chrono_tz::Europe::Paris), twice).unwrap();
        assert_eq!(utc.to_rfc3339(), "2025-10-26T00:30:00+00:00");
    }
}
