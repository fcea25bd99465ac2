//! # Report Periods
//!
//! Date-range filtering over closed registries.
//!
//! ```text
//! Weekly  (anchor Wed 2026-03-11):  Mon 03-09 ──────────► Fri 03-13
//! Monthly (anchor 2026-02-17):      Sun 02-01 ──────────► Sat 02-28
//! ```
//!
//! Records are matched on the calendar date (UTC) of `createdAt`; records
//! without one never match.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::ledger::aggregate_transfers;
use crate::money::Money;
use crate::types::{DailyRegistry, ProductTotals, ReportRecord};

/// Which window of dates a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportPeriod {
    /// Monday through Friday of the anchor's week.
    #[default]
    Weekly,
    /// First through last day of the anchor's month.
    Monthly,
}

impl ReportPeriod {
    /// The other period, as the report screen's toggle does.
    pub fn toggled(self) -> Self {
        match self {
            ReportPeriod::Weekly => ReportPeriod::Monthly,
            ReportPeriod::Monthly => ReportPeriod::Weekly,
        }
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportPeriod::Weekly => f.write_str("weekly"),
            ReportPeriod::Monthly => f.write_str("monthly"),
        }
    }
}

impl FromStr for ReportPeriod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekly" | "semanal" => Ok(ReportPeriod::Weekly),
            "monthly" | "mensual" => Ok(ReportPeriod::Monthly),
            other => Err(ValidationError::InvalidFormat {
                field: "period".to_string(),
                reason: format!("unknown period '{}'", other),
            }),
        }
    }
}

/// Inclusive `(start, end)` dates of the period containing `anchor`.
pub fn period_range(period: ReportPeriod, anchor: NaiveDate) -> (NaiveDate, NaiveDate) {
    match period {
        ReportPeriod::Weekly => {
            let back = anchor.weekday().num_days_from_monday() as u64;
            let monday = anchor - Days::new(back);
            (monday, monday + Days::new(4))
        }
        ReportPeriod::Monthly => {
            let first = anchor.with_day(1).unwrap_or(anchor);
            let next_month = if first.month() == 12 {
                NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
            };
            let last = next_month
                .and_then(|d| d.pred_opt())
                .unwrap_or(first);
            (first, last)
        }
    }
}

/// True when the record's `createdAt` date falls inside the period.
pub fn in_period(registry: &DailyRegistry, period: ReportPeriod, anchor: NaiveDate) -> bool {
    let (start, end) = period_range(period, anchor);
    registry
        .created_at
        .map(|ts| {
            let day = ts.date_naive();
            day >= start && day <= end
        })
        .unwrap_or(false)
}

/// Records of the period, oldest first.
pub fn filter_records<'a>(
    records: &'a [ReportRecord],
    period: ReportPeriod,
    anchor: NaiveDate,
) -> Vec<&'a ReportRecord> {
    let mut matched: Vec<&ReportRecord> = records
        .iter()
        .filter(|r| in_period(&r.registry, period, anchor))
        .collect();
    matched.sort_by_key(|r| r.registry.created_at);
    matched
}

/// Units left across both locations when the registry was closed.
pub fn final_stock_total(registry: &DailyRegistry) -> i64 {
    registry.final_stock.grand_total()
}

/// What a report card shows for one closed day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub id: String,
    pub date: NaiveDate,
    pub total: Money,
    pub final_stock_total: i64,
    /// Units sold per location and product.
    pub sales: ProductTotals,
    /// Units moved out of each location, per product.
    pub transfers_by_source: ProductTotals,
}

pub fn summarize(record: &ReportRecord) -> ReportSummary {
    let registry = &record.registry;
    ReportSummary {
        id: record.id.clone(),
        date: registry.date,
        total: registry.total,
        final_stock_total: final_stock_total(registry),
        sales: registry.sales.clone(),
        transfers_by_source: aggregate_transfers(&registry.transfers),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(id: &str, y: i32, m: u32, d: u32) -> ReportRecord {
        let mut registry = DailyRegistry::open(date(y, m, d));
        registry.created_at = Some(Utc.with_ymd_and_hms(y, m, d, 20, 0, 0).unwrap());
        ReportRecord {
            id: id.to_string(),
            registry,
        }
    }

    #[test]
    fn test_weekly_range_is_monday_to_friday() {
        // 2026-03-11 is a Wednesday
        assert_eq!(
            period_range(ReportPeriod::Weekly, date(2026, 3, 11)),
            (date(2026, 3, 9), date(2026, 3, 13))
        );
        // Sunday belongs to the week that started the previous Monday
        assert_eq!(
            period_range(ReportPeriod::Weekly, date(2026, 3, 15)),
            (date(2026, 3, 9), date(2026, 3, 13))
        );
    }

    #[test]
    fn test_monthly_range() {
        assert_eq!(
            period_range(ReportPeriod::Monthly, date(2026, 2, 17)),
            (date(2026, 2, 1), date(2026, 2, 28))
        );
        assert_eq!(
            period_range(ReportPeriod::Monthly, date(2026, 12, 3)),
            (date(2026, 12, 1), date(2026, 12, 31))
        );
    }

    #[test]
    fn test_filter_weekly_excludes_weekend() {
        let records = vec![
            record("sat", 2026, 3, 14),
            record("fri", 2026, 3, 13),
            record("mon", 2026, 3, 9),
            record("prev", 2026, 3, 6),
        ];
        let ids: Vec<&str> = filter_records(&records, ReportPeriod::Weekly, date(2026, 3, 10))
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["mon", "fri"]);
    }

    #[test]
    fn test_record_without_created_at_never_matches() {
        let mut r = record("x", 2026, 3, 10);
        r.registry.created_at = None;
        assert!(filter_records(&[r], ReportPeriod::Monthly, date(2026, 3, 10)).is_empty());
    }

    #[test]
    fn test_period_parse() {
        assert_eq!("semanal".parse::<ReportPeriod>().unwrap(), ReportPeriod::Weekly);
        assert_eq!("Monthly".parse::<ReportPeriod>().unwrap(), ReportPeriod::Monthly);
        assert_eq!(ReportPeriod::Weekly.toggled(), ReportPeriod::Monthly);
        assert!("daily".parse::<ReportPeriod>().is_err());
    }

    #[test]
    fn test_summarize_groups_transfers_by_source() {
        use crate::types::{Location, TransferLine};

        let mut r = record("day1", 2026, 3, 10);
        r.registry.total = Money::from_cents(7000);
        r.registry.final_stock.set(Location::A, "chapata", 3);
        r.registry.final_stock.set(Location::B, "chapata", 1);
        r.registry.sales.add(Location::A, "chapata", 2);
        r.registry.transfers = vec![
            TransferLine {
                from: Location::A,
                to: Location::B,
                product: "chapata".into(),
                qty: 2,
                ts: 1,
            },
            TransferLine {
                from: Location::A,
                to: Location::B,
                product: "chapata".into(),
                qty: 1,
                ts: 2,
            },
        ];

        let summary = summarize(&r);
        assert_eq!(summary.id, "day1");
        assert_eq!(summary.final_stock_total, 4);
        assert_eq!(summary.total.cents(), 7000);
        assert_eq!(summary.sales.get(Location::A, "chapata"), 2);
        assert_eq!(summary.transfers_by_source.get(Location::A, "chapata"), 3);
        assert_eq!(summary.transfers_by_source.get(Location::B, "chapata"), 0);
    }
}
