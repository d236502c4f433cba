//! Settlement-period arithmetic.
//!
//! The GB market divides each UTC day into 48 half-hour settlement periods.
//! Everything here is a pure function of the supplied instant, so the tests
//! can pin exact boundaries.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use serde::Serialize;

pub const PERIODS_PER_DAY: u32 = 48;

/// The settlement period an instant falls in, with its exact boundaries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementPeriod {
    pub settlement_date: NaiveDate,
    pub settlement_period: u32,
    pub period_start_utc: DateTime<Utc>,
    pub period_end_utc: DateTime<Utc>,
    pub periods_per_day: u32,
    pub next_sp: u32,
}

/// Settlement period for the current wall-clock instant.
pub fn current_settlement_period() -> SettlementPeriod {
    settlement_period_at(Utc::now())
}

/// Settlement period for `now`: minutes since UTC midnight divided by 30,
/// plus one, capped at 48. Boundaries land on exact half-hour instants and
/// `next_sp` wraps from 48 back to 1.
pub fn settlement_period_at(now: DateTime<Utc>) -> SettlementPeriod {
    let minutes = now.hour() * 60 + now.minute();
    let sp = (minutes / 30 + 1).min(PERIODS_PER_DAY);

    let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let start = midnight + Duration::minutes(((sp - 1) * 30) as i64);

    SettlementPeriod {
        settlement_date: now.date_naive(),
        settlement_period: sp,
        period_start_utc: start,
        period_end_utc: start + Duration::minutes(30),
        periods_per_day: PERIODS_PER_DAY,
        next_sp: sp % PERIODS_PER_DAY + 1,
    }
}

/// Current UTC calendar date, the default for `date` query parameters.
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

/// Previous UTC calendar date, the default for `date_from` parameters.
pub fn yesterday_utc() -> NaiveDate {
    today_utc() - Duration::days(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 17, h, m, s).unwrap()
    }

    #[test]
    fn midnight_is_period_one() {
        let sp = settlement_period_at(at(0, 0, 0));
        assert_eq!(sp.settlement_period, 1);
        assert_eq!(sp.period_start_utc, at(0, 0, 0));
        assert_eq!(sp.period_end_utc, at(0, 30, 0));
        assert_eq!(sp.next_sp, 2);
        assert_eq!(sp.periods_per_day, 48);
    }

    #[test]
    fn last_second_of_day_is_period_48() {
        let sp = settlement_period_at(at(23, 59, 59));
        assert_eq!(sp.settlement_period, 48);
        assert_eq!(sp.period_start_utc, at(23, 30, 0));
        assert_eq!(sp.next_sp, 1);
    }

    #[test]
    fn boundary_instant_starts_the_next_period() {
        let sp = settlement_period_at(at(0, 30, 0));
        assert_eq!(sp.settlement_period, 2);
        assert_eq!(sp.period_start_utc, at(0, 30, 0));
        assert_eq!(sp.period_end_utc, at(1, 0, 0));
    }

    #[test]
    fn mid_afternoon_period() {
        // 13:45 falls in SP 28, which runs 13:30 to 14:00.
        let sp = settlement_period_at(at(13, 45, 0));
        assert_eq!(sp.settlement_period, 28);
        assert_eq!(sp.period_start_utc, at(13, 30, 0));
        assert_eq!(sp.period_end_utc, at(14, 0, 0));
        assert_eq!(sp.next_sp, 29);
    }

    #[test]
    fn final_period_end_crosses_midnight() {
        let sp = settlement_period_at(at(23, 45, 0));
        assert_eq!(
            sp.period_end_utc,
            Utc.with_ymd_and_hms(2025, 2, 18, 0, 0, 0).unwrap()
        );
        assert_eq!(sp.settlement_date, NaiveDate::from_ymd_opt(2025, 2, 17).unwrap());
    }
}
