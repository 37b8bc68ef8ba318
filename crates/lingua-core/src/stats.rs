//! Progress statistics derived from activity markers and results.
//!
//! Dates are counted as a set everywhere, so a duplicated marker for the
//! same day never inflates "days practiced" or a streak.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::models::{PendingResult, ACTIVITY_DATE_FORMAT};

/// Streak and practice-day summary for one learner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSummary {
    pub days_practiced: usize,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub practiced_today: bool,
}

/// Accuracy for one language
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageAccuracy {
    pub language: String,
    pub quizzes: usize,
    pub correct: u64,
    pub total: u64,
}

impl LanguageAccuracy {
    /// Fraction of correct answers in `0.0..=1.0`
    #[allow(clippy::cast_precision_loss)] // counts stay far below 2^52
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

fn distinct_dates<I, S>(dates: I) -> BTreeSet<NaiveDate>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    dates
        .into_iter()
        .filter_map(|date| {
            let date = date.as_ref();
            NaiveDate::parse_from_str(date.trim(), ACTIVITY_DATE_FORMAT)
                .map_err(|error| tracing::debug!("Ignoring activity date {date:?}: {error}"))
                .ok()
        })
        .collect()
}

/// Number of distinct practice days. Unparseable dates are ignored.
pub fn days_practiced<I, S>(dates: I) -> usize
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    distinct_dates(dates).len()
}

/// Summarize practice days as seen on `today`.
///
/// The current streak counts consecutive days ending today, or ending
/// yesterday when today has no activity yet.
pub fn summarize<I, S>(dates: I, today: NaiveDate) -> ProgressSummary
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let dates = distinct_dates(dates);

    let mut longest = 0_u32;
    let mut run = 0_u32;
    let mut previous: Option<NaiveDate> = None;
    for date in &dates {
        run = match previous {
            Some(prev) if prev.checked_add_days(Days::new(1)) == Some(*date) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(*date);
    }

    let practiced_today = dates.contains(&today);
    let mut cursor = if practiced_today {
        Some(today)
    } else {
        today.checked_sub_days(Days::new(1))
    };
    let mut current = 0_u32;
    while let Some(day) = cursor.filter(|day| dates.contains(day)) {
        current += 1;
        cursor = day.checked_sub_days(Days::new(1));
    }

    ProgressSummary {
        days_practiced: dates.len(),
        current_streak: current,
        longest_streak: longest,
        practiced_today,
    }
}

/// Per-language accuracy, ordered by language tag
pub fn accuracy_by_language<'a, I>(results: I) -> Vec<LanguageAccuracy>
where
    I: IntoIterator<Item = &'a PendingResult>,
{
    let mut by_language: BTreeMap<&str, LanguageAccuracy> = BTreeMap::new();
    for result in results {
        let entry = by_language
            .entry(result.subject_language.as_str())
            .or_insert_with(|| LanguageAccuracy {
                language: result.subject_language.clone(),
                quizzes: 0,
                correct: 0,
                total: 0,
            });
        entry.quizzes += 1;
        entry.correct += u64::from(result.correct_count);
        entry.total += u64::from(result.total_count);
    }
    by_language.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TestType;
    use pretty_assertions::assert_eq;

    fn day(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, ACTIVITY_DATE_FORMAT).unwrap()
    }

    #[test]
    fn duplicates_do_not_inflate_days_practiced() {
        assert_eq!(days_practiced(["2024-03-09"]), 1);
        assert_eq!(days_practiced(["2024-03-09", "2024-03-09"]), 1);
        assert_eq!(days_practiced(["2024-03-09", "2024-03-10", "bogus"]), 2);
    }

    #[test]
    fn empty_history() {
        assert_eq!(
            summarize(Vec::<String>::new(), day("2024-03-10")),
            ProgressSummary::default()
        );
    }

    #[test]
    fn streak_including_today() {
        let summary = summarize(
            ["2024-03-08", "2024-03-09", "2024-03-10", "2024-03-10"],
            day("2024-03-10"),
        );
        assert_eq!(
            summary,
            ProgressSummary {
                days_practiced: 3,
                current_streak: 3,
                longest_streak: 3,
                practiced_today: true,
            }
        );
    }

    #[test]
    fn streak_survives_until_today_is_practiced() {
        let summary = summarize(["2024-03-08", "2024-03-09"], day("2024-03-10"));
        assert_eq!(summary.current_streak, 2);
        assert!(!summary.practiced_today);
    }

    #[test]
    fn broken_streak_keeps_longest() {
        let summary = summarize(
            ["2024-02-01", "2024-02-02", "2024-02-03", "2024-03-09"],
            day("2024-03-12"),
        );
        assert_eq!(summary.current_streak, 0);
        assert_eq!(summary.longest_streak, 3);
        assert_eq!(summary.days_practiced, 4);
    }

    #[test]
    fn streak_across_month_boundary() {
        let summary = summarize(["2024-02-28", "2024-02-29", "2024-03-01"], day("2024-03-01"));
        assert_eq!(summary.current_streak, 3);
    }

    #[test]
    fn accuracy_grouped_by_language() {
        let results = [
            PendingResult::new("es", TestType::Words, 5, 10, 0).unwrap(),
            PendingResult::new("es", TestType::Phrases, 8, 10, 0).unwrap(),
            PendingResult::new("de", TestType::Words, 1, 4, 0).unwrap(),
        ];
        let accuracy = accuracy_by_language(&results);

        assert_eq!(accuracy.len(), 2);
        assert_eq!(accuracy[0].language, "de");
        assert_eq!(accuracy[1].quizzes, 2);
        assert!((accuracy[1].ratio() - 0.65).abs() < f64::EPSILON);
    }
}
