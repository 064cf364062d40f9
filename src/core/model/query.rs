use std::{collections::HashSet, fmt, str::FromStr};
use time::{Duration, OffsetDateTime};

use crate::{
    core::model::{Book, BookId, BookStatus},
    error::{Error, Result},
};

/// A read-only projection of the book list. Views are recomputed from the
/// whole list every time they are asked for.
pub trait BookListQuery {
    type Output;

    fn execute(&self, books: &[Book]) -> Self::Output;
}

pub struct ByStatus(pub BookStatus);

impl BookListQuery for ByStatus {
    type Output = Vec<Book>;

    fn execute(&self, books: &[Book]) -> Self::Output {
        let Self(status) = self;
        books
            .iter()
            .filter(|book| book.info.status == *status)
            .cloned()
            .collect()
    }
}

pub struct Reading;

impl BookListQuery for Reading {
    type Output = Vec<Book>;

    fn execute(&self, books: &[Book]) -> Self::Output {
        ByStatus(BookStatus::Reading).execute(books)
    }
}

pub struct Finished;

impl BookListQuery for Finished {
    type Output = Vec<Book>;

    fn execute(&self, books: &[Book]) -> Self::Output {
        ByStatus(BookStatus::Finished).execute(books)
    }
}

pub struct Later;

impl BookListQuery for Later {
    type Output = Vec<Book>;

    fn execute(&self, books: &[Book]) -> Self::Output {
        ByStatus(BookStatus::Later).execute(books)
    }
}

pub struct BookById(pub BookId);

impl BookListQuery for BookById {
    type Output = Option<Book>;

    fn execute(&self, books: &[Book]) -> Self::Output {
        let Self(id) = self;
        books.iter().find(|book| &book.id == id).cloned()
    }
}

/// Titles in first-seen order, each once.
pub struct DistinctTitles;

impl BookListQuery for DistinctTitles {
    type Output = Vec<String>;

    fn execute(&self, books: &[Book]) -> Self::Output {
        let mut seen = HashSet::new();
        books
            .iter()
            .filter(|book| seen.insert(book.info.title.as_str()))
            .map(|book| book.info.title.clone())
            .collect()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Period {
    Week,
    Month,
    Year,
}

impl Period {
    const WEEK: &str = "week";
    const MONTH: &str = "month";
    const YEAR: &str = "year";

    pub const ALL: [Period; 3] = [Period::Week, Period::Month, Period::Year];

    pub fn name(&self) -> &'static str {
        match self {
            Period::Week => Self::WEEK,
            Period::Month => Self::MONTH,
            Period::Year => Self::YEAR,
        }
    }

    /// Half-open `[start, end)` interval of the period containing `now`, in
    /// `now`'s offset. Weeks start on Sunday.
    pub fn bounds(&self, now: OffsetDateTime) -> (OffsetDateTime, OffsetDateTime) {
        let today = now.date();
        let (first_day, length_in_days) = match self {
            Period::Week => (
                today - Duration::days(today.weekday().number_days_from_sunday().into()),
                7,
            ),
            Period::Month => (
                today - Duration::days(i64::from(today.day()) - 1),
                time::util::days_in_year_month(today.year(), today.month()).into(),
            ),
            Period::Year => (
                today - Duration::days(i64::from(today.ordinal()) - 1),
                time::util::days_in_year(today.year()).into(),
            ),
        };

        let start = first_day.midnight().assume_offset(now.offset());
        (start, start + Duration::days(length_in_days))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            Self::WEEK => Ok(Period::Week),
            Self::MONTH => Ok(Period::Month),
            Self::YEAR => Ok(Period::Year),
            otherwise => Err(Error::Generic(format!("{otherwise} is not a period"))),
        }
    }
}

/// Books finished inside the period that contains `now`.
pub struct FinishedWithin(pub Period, pub OffsetDateTime);

impl BookListQuery for FinishedWithin {
    type Output = Vec<Book>;

    fn execute(&self, books: &[Book]) -> Self::Output {
        let Self(period, now) = self;
        let (start, end) = period.bounds(*now);
        books
            .iter()
            .filter(|book| {
                book.info
                    .finished_at
                    .is_some_and(|finished_at| start <= finished_at && finished_at < end)
            })
            .cloned()
            .collect()
    }
}

/// Percentage of the goal reached by all finished books, capped at 100.
pub struct GoalProgress(pub Option<u32>);

impl BookListQuery for GoalProgress {
    type Output = f64;

    fn execute(&self, books: &[Book]) -> Self::Output {
        match self {
            Self(Some(goal)) if *goal > 0 => {
                let finished = Finished.execute(books).len() as f64;
                (finished / f64::from(*goal) * 100.0).min(100.0)
            }
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::BookInfo;
    use time::macros::datetime;

    fn book(id: &str, title: &str, status: BookStatus, finished_at: Option<OffsetDateTime>) -> Book {
        Book {
            id: BookId::from(id),
            info: BookInfo {
                title: title.to_owned(),
                author: "Someone".to_owned(),
                cover_image: None,
                status,
                start_time: None,
                total_time: None,
                finished_at,
                total_readers: None,
            },
        }
    }

    fn shelf() -> Vec<Book> {
        vec![
            book("1", "Dune", BookStatus::Reading, None),
            book("2", "Emma", BookStatus::Finished, Some(datetime!(2024-05-14 12:00 UTC))),
            book("3", "Ulysses", BookStatus::Later, None),
            book("4", "Dune", BookStatus::Finished, Some(datetime!(2024-02-01 00:00 UTC))),
            book("5", "Beloved", BookStatus::Later, None),
        ]
    }

    #[test]
    fn status_views_partition_the_list() {
        let books = shelf();
        let reading = Reading.execute(&books);
        let finished = Finished.execute(&books);
        let later = Later.execute(&books);

        assert_eq!(reading.len() + finished.len() + later.len(), books.len());

        let ids = |view: &[Book]| view.iter().map(|b| b.id.clone()).collect::<HashSet<_>>();
        assert!(ids(&reading).is_disjoint(&ids(&finished)));
        assert!(ids(&reading).is_disjoint(&ids(&later)));
        assert!(ids(&finished).is_disjoint(&ids(&later)));

        // Insertion order is kept
        assert_eq!(later.iter().map(|b| b.id.as_str()).collect::<Vec<_>>(), ["3", "5"]);
    }

    #[test]
    fn week_starts_on_sunday() {
        // A Wednesday
        let now = datetime!(2024-05-15 18:30 +02:00);
        let (start, end) = Period::Week.bounds(now);
        assert_eq!(start, datetime!(2024-05-12 00:00 +02:00));
        assert_eq!(end, datetime!(2024-05-19 00:00 +02:00));
    }

    #[test]
    fn month_and_year_bounds() {
        let now = datetime!(2024-02-29 23:59 UTC);
        assert_eq!(
            Period::Month.bounds(now),
            (datetime!(2024-02-01 00:00 UTC), datetime!(2024-03-01 00:00 UTC))
        );
        assert_eq!(
            Period::Year.bounds(now),
            (datetime!(2024-01-01 00:00 UTC), datetime!(2025-01-01 00:00 UTC))
        );
    }

    #[test]
    fn finished_within_a_period() {
        let books = shelf();
        let now = datetime!(2024-05-15 09:00 UTC);

        let week = FinishedWithin(Period::Week, now).execute(&books);
        assert_eq!(week.iter().map(|b| b.id.as_str()).collect::<Vec<_>>(), ["2"]);

        let year = FinishedWithin(Period::Year, now).execute(&books);
        assert_eq!(year.len(), 2);
    }

    #[test]
    fn goal_progress_is_capped() {
        let books = shelf();
        assert_eq!(GoalProgress(None).execute(&books), 0.0);
        assert_eq!(GoalProgress(Some(0)).execute(&books), 0.0);
        assert_eq!(GoalProgress(Some(4)).execute(&books), 50.0);
        assert_eq!(GoalProgress(Some(1)).execute(&books), 100.0);
    }

    #[test]
    fn distinct_titles_in_first_seen_order() {
        assert_eq!(
            DistinctTitles.execute(&shelf()),
            ["Dune", "Emma", "Ulysses", "Beloved"]
        );
    }

    #[test]
    fn periods_parse() {
        assert_eq!("month".parse::<Period>().ok(), Some(Period::Month));
        assert!("decade".parse::<Period>().is_err());
    }
}
