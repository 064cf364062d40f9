use std::fmt;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    validation,
};

pub mod query;

pub const PLACEHOLDER_COVER: &str = "/placeholder.jpg";

#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookId(pub String);

impl BookId {
    /// A random identifier for books entered by hand.
    pub fn fresh() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        let Self(id) = self;
        id
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self(id) = self;
        write!(f, "{id}")
    }
}

impl From<&str> for BookId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    Reading,
    Finished,
    Later,
}

impl BookStatus {
    const READING: &str = "reading";
    const FINISHED: &str = "finished";
    const LATER: &str = "later";

    pub fn name(&self) -> &'static str {
        match self {
            BookStatus::Reading => Self::READING,
            BookStatus::Finished => Self::FINISHED,
            BookStatus::Later => Self::LATER,
        }
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for BookStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            Self::READING => Ok(BookStatus::Reading),
            Self::FINISHED => Ok(BookStatus::Finished),
            Self::LATER => Ok(BookStatus::Later),
            otherwise => Err(Error::MalformedDocument(format!(
                "unknown status {otherwise}"
            ))),
        }
    }
}

/// The statuses a book may be created with.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InitialStatus {
    Reading,
    Later,
}

impl From<InitialStatus> for BookStatus {
    fn from(value: InitialStatus) -> Self {
        match value {
            InitialStatus::Reading => BookStatus::Reading,
            InitialStatus::Later => BookStatus::Later,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Book {
    pub id: BookId,
    pub info: BookInfo,
}

/// A book record without its identifier. This is also what gets sent when
/// a book is added.
#[derive(Clone, Debug, PartialEq)]
pub struct BookInfo {
    pub title: String,
    pub author: String,
    pub cover_image: Option<String>,
    pub status: BookStatus,
    pub start_time: Option<OffsetDateTime>,
    pub total_time: Option<Duration>,
    pub finished_at: Option<OffsetDateTime>,

    // Local annotation, see BookStore::annotate_total_readers
    pub total_readers: Option<u64>,
}

impl BookInfo {
    pub fn new(
        title: &str,
        author: &str,
        cover_image: Option<String>,
        initial: InitialStatus,
        now: OffsetDateTime,
    ) -> Result<Self> {
        Ok(Self {
            title: validation::title(title)?.to_owned(),
            author: validation::author(author)?.to_owned(),
            cover_image: cover_image.filter(|uri| !uri.trim().is_empty()),
            status: initial.into(),
            start_time: (initial == InitialStatus::Reading).then_some(now),
            total_time: None,
            finished_at: None,
            total_readers: None,
        })
    }

    pub fn from_candidate(
        candidate: &Candidate,
        initial: InitialStatus,
        now: OffsetDateTime,
    ) -> Result<Self> {
        Self::new(
            &candidate.title,
            &candidate.author,
            candidate.thumbnail.clone(),
            initial,
            now,
        )
    }

    pub fn cover_or_placeholder(&self) -> &str {
        self.cover_image.as_deref().unwrap_or(PLACEHOLDER_COVER)
    }

    /// Time spent since reading started, zero for clocks running behind.
    pub fn elapsed(&self, now: OffsetDateTime) -> Option<Duration> {
        self.start_time
            .map(|start| (now - start).max(Duration::ZERO))
    }

    /// later → reading. The start time is kept when one already exists.
    pub fn start_reading(&self, id: &BookId, now: OffsetDateTime) -> Result<BookPatch> {
        self.expect_status(id, BookStatus::Later, BookStatus::Reading)?;
        Ok(BookPatch {
            status: Some(BookStatus::Reading),
            start_time: self.start_time.is_none().then_some(now),
            ..Default::default()
        })
    }

    /// reading → finished. Total time and finish time are fixed here and
    /// never recomputed.
    pub fn finish_reading(&self, id: &BookId, now: OffsetDateTime) -> Result<BookPatch> {
        self.expect_status(id, BookStatus::Reading, BookStatus::Finished)?;
        let total_time = self.elapsed(now).unwrap_or_else(|| {
            tracing::warn!(%id, "finishing a book without a start time");
            Duration::ZERO
        });

        Ok(BookPatch {
            status: Some(BookStatus::Finished),
            total_time: Some(total_time),
            finished_at: Some(now),
            ..Default::default()
        })
    }

    fn expect_status(&self, id: &BookId, from: BookStatus, to: BookStatus) -> Result<()> {
        if self.status == from {
            Ok(())
        } else {
            Err(Error::Transition {
                id: id.to_string(),
                from: self.status,
                to,
            })
        }
    }
}

/// A partial set of field values. Absent fields are left alone.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BookPatch {
    pub status: Option<BookStatus>,
    pub start_time: Option<OffsetDateTime>,
    pub total_time: Option<Duration>,
    pub finished_at: Option<OffsetDateTime>,
}

impl BookPatch {
    pub fn apply(&self, info: &mut BookInfo) {
        let Self {
            status,
            start_time,
            total_time,
            finished_at,
        } = self;

        if let Some(status) = status {
            info.status = *status;
        }
        if start_time.is_some() {
            info.start_time = *start_time;
        }
        if total_time.is_some() {
            info.total_time = *total_time;
        }
        if finished_at.is_some() {
            info.finished_at = *finished_at;
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// A search hit from the book catalog.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub volume_id: String,
    pub title: String,
    pub author: String,
    pub thumbnail: Option<String>,
}

impl From<api_client::model::SearchCandidate> for Candidate {
    fn from(
        api_client::model::SearchCandidate {
            id,
            title,
            author,
            thumbnail,
        }: api_client::model::SearchCandidate,
    ) -> Self {
        Self {
            volume_id: id,
            title,
            author,
            thumbnail,
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self(id) = self;
        write!(f, "{id}")
    }
}

/// A signed in account together with the tokens remote calls need.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub id_token: String,
    pub refresh_token: String,

    /// When `id_token` stops being accepted. Unknown for sessions persisted
    /// before expiries were recorded.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

impl User {
    /// How long before its expiry a token is already treated as stale.
    pub const TOKEN_MARGIN: Duration = Duration::minutes(5);

    pub fn greeting_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or("Guest")
    }

    pub fn needs_refresh(&self, now: OffsetDateTime) -> bool {
        self.expires_at
            .map_or(true, |expires_at| expires_at - Self::TOKEN_MARGIN <= now)
    }
}

/// The `users/{uid}` document written once at registration.
#[derive(Clone, Debug, PartialEq)]
pub struct UserProfile {
    pub uid: UserId,
    pub name: String,
    pub email: String,
    pub created_at: OffsetDateTime,
}

/// "{hours}h {minutes}m", the way reading time is shown everywhere.
pub fn hours_minutes(duration: Duration) -> String {
    let minutes = duration.whole_minutes().max(0);
    format!("{}h {}m", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn later_book() -> BookInfo {
        BookInfo::new(
            "Dune",
            "Frank Herbert",
            None,
            InitialStatus::Later,
            datetime!(2024-03-01 10:00 UTC),
        )
        .expect("a valid book")
    }

    #[test]
    fn new_books_start_timing_only_when_reading() {
        let now = datetime!(2024-03-01 10:00 UTC);
        let reading = BookInfo::new("Dune", "Frank Herbert", None, InitialStatus::Reading, now)
            .expect("a valid book");
        assert_eq!(reading.start_time, Some(now));
        assert_eq!(reading.status, BookStatus::Reading);

        let later = later_book();
        assert_eq!(later.start_time, None);
        assert_eq!(later.cover_or_placeholder(), PLACEHOLDER_COVER);
    }

    #[test]
    fn blank_fields_are_rejected() {
        let now = datetime!(2024-03-01 10:00 UTC);
        assert!(BookInfo::new(" ", "Frank Herbert", None, InitialStatus::Later, now).is_err());
        assert!(BookInfo::new("Dune", "", None, InitialStatus::Later, now).is_err());
    }

    #[test]
    fn start_then_finish() {
        let id = BookId::from("b1");
        let started = datetime!(2024-03-02 08:00 UTC);
        let finished = datetime!(2024-03-04 09:30 UTC);

        let mut book = later_book();
        book.start_reading(&id, started).expect("later → reading").apply(&mut book);
        assert_eq!(book.start_time, Some(started));

        let patch = book.finish_reading(&id, finished).expect("reading → finished");
        patch.apply(&mut book);
        assert_eq!(book.status, BookStatus::Finished);
        assert_eq!(book.finished_at, Some(finished));
        assert_eq!(book.total_time, Some(finished - started));
        assert_eq!(book.start_time, Some(started));

        let again = book.finish_reading(&id, datetime!(2024-03-05 00:00 UTC));
        assert!(matches!(again, Err(Error::Transition { .. })));
    }

    #[test]
    fn restarting_keeps_the_first_start_time() {
        let id = BookId::from("b1");
        let first = datetime!(2024-01-01 00:00 UTC);
        let mut book = later_book();
        book.start_time = Some(first);

        let patch = book
            .start_reading(&id, datetime!(2024-02-01 00:00 UTC))
            .expect("later → reading");
        assert_eq!(patch.start_time, None);
        patch.apply(&mut book);
        assert_eq!(book.start_time, Some(first));
    }

    #[test]
    fn statuses_parse_from_their_wire_names() {
        assert_eq!("later".parse::<BookStatus>().ok(), Some(BookStatus::Later));
        assert!("paused".parse::<BookStatus>().is_err());
        assert_eq!(BookStatus::Finished.to_string(), "finished");
    }

    #[test]
    fn reading_time_display() {
        assert_eq!(hours_minutes(Duration::minutes(125)), "2h 5m");
        assert_eq!(hours_minutes(Duration::seconds(59)), "0h 0m");
        assert_eq!(hours_minutes(Duration::minutes(-3)), "0h 0m");
    }

    #[test]
    fn tokens_are_refreshed_ahead_of_their_expiry() {
        let now = datetime!(2024-03-01 10:00 UTC);
        let mut user = User {
            id: UserId("u1".to_owned()),
            email: "reader@example.com".to_owned(),
            display_name: None,
            id_token: "id".to_owned(),
            refresh_token: "refresh".to_owned(),
            expires_at: Some(datetime!(2024-03-01 11:00 UTC)),
        };
        assert!(!user.needs_refresh(now));

        user.expires_at = Some(datetime!(2024-03-01 10:03 UTC));
        assert!(user.needs_refresh(now));

        user.expires_at = None;
        assert!(user.needs_refresh(now));
    }
}
