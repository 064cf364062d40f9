use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::Duration,
};
use time::OffsetDateTime;
use tokio::{sync::watch, task::AbortHandle};
use tracing::debug;

use crate::core::model::{hours_minutes, Book, BookId, BookStatus};

pub type Displays = BTreeMap<BookId, String>;

/// Keeps one timer task per book being read, each publishing the book's
/// elapsed reading time as display text.
///
/// Must be used from inside a tokio runtime.
pub struct ReadingTicker {
    period: Duration,
    timers: HashMap<BookId, AbortHandle>,
    displays: Arc<watch::Sender<Displays>>,
}

impl ReadingTicker {
    const MIN_PERIOD: Duration = Duration::from_millis(100);

    pub fn new(period: Duration) -> Self {
        let (displays, _rx) = watch::channel(Displays::new());
        Self {
            period: period.max(Self::MIN_PERIOD),
            timers: HashMap::new(),
            displays: Arc::new(displays),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Displays> {
        self.displays.subscribe()
    }

    pub fn display(&self, id: &BookId) -> Option<String> {
        self.displays.borrow().get(id).cloned()
    }

    pub fn running(&self) -> usize {
        self.timers.len()
    }

    /// Cancels every timer, then starts one per book currently being read.
    pub fn sync(&mut self, books: &[Book]) {
        self.clear();

        for book in books.iter().filter(|book| book.info.status == BookStatus::Reading) {
            // A reading book always has a start time unless the document was
            // written by hand; count from now in that case.
            let start = book.info.start_time.unwrap_or_else(OffsetDateTime::now_utc);
            let handle = tokio::spawn(tick(
                book.id.clone(),
                start,
                self.period,
                Arc::clone(&self.displays),
            ));
            self.timers.insert(book.id.clone(), handle.abort_handle());
        }

        let timers = &self.timers;
        self.displays
            .send_if_modified(|displays| {
                let before = displays.len();
                displays.retain(|id, _| timers.contains_key(id));
                before != displays.len()
            });
        debug!(running = self.timers.len(), "reading timers synced");
    }

    pub fn clear(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
    }
}

impl Drop for ReadingTicker {
    fn drop(&mut self) {
        self.clear()
    }
}

async fn tick(
    id: BookId,
    start: OffsetDateTime,
    period: Duration,
    displays: Arc<watch::Sender<Displays>>,
) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let elapsed = (OffsetDateTime::now_utc() - start).max(time::Duration::ZERO);
        let display = hours_minutes(elapsed);
        displays.send_if_modified(|displays| {
            if displays.get(&id) == Some(&display) {
                false
            } else {
                displays.insert(id.clone(), display);
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{BookInfo, InitialStatus};

    fn book(id: &str, status: BookStatus, started_minutes_ago: i64) -> Book {
        let start = OffsetDateTime::now_utc() - time::Duration::minutes(started_minutes_ago);
        let mut info = BookInfo::new("Dune", "Frank Herbert", None, InitialStatus::Reading, start)
            .expect("a valid book");
        info.status = status;
        Book {
            id: BookId::from(id),
            info,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn one_timer_per_reading_book() {
        let mut ticker = ReadingTicker::new(Duration::from_secs(1));
        let books = vec![
            book("a", BookStatus::Reading, 90),
            book("b", BookStatus::Finished, 10),
            book("c", BookStatus::Reading, 5),
        ];

        ticker.sync(&books);
        assert_eq!(ticker.running(), 2);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(ticker.display(&BookId::from("a")).as_deref(), Some("1h 30m"));
        assert_eq!(ticker.display(&BookId::from("c")).as_deref(), Some("0h 5m"));
        assert_eq!(ticker.display(&BookId::from("b")), None);
    }

    #[tokio::test(start_paused = true)]
    async fn resync_drops_timers_of_books_no_longer_read() {
        let mut ticker = ReadingTicker::new(Duration::from_secs(30));
        let mut books = vec![book("a", BookStatus::Reading, 1), book("b", BookStatus::Reading, 2)];
        ticker.sync(&books);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(ticker.display(&BookId::from("a")).is_some());

        books[0].info.status = BookStatus::Finished;
        ticker.sync(&books);
        assert_eq!(ticker.running(), 1);
        assert_eq!(ticker.display(&BookId::from("a")), None);

        ticker.sync(&[]);
        assert_eq!(ticker.running(), 0);
        assert!(ticker.subscribe().borrow().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn a_zero_period_still_ticks() {
        let mut ticker = ReadingTicker::new(Duration::ZERO);
        ticker.sync(&[book("a", BookStatus::Reading, 5)]);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(ticker.display(&BookId::from("a")).as_deref(), Some("0h 5m"));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_ticker_stops_its_timers() {
        let mut ticker = ReadingTicker::new(Duration::from_secs(1));
        ticker.sync(&[book("a", BookStatus::Reading, 90)]);
        let mut displays = ticker.subscribe();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(displays.borrow_and_update().contains_key(&BookId::from("a")));

        drop(ticker);
        tokio::time::sleep(Duration::from_secs(120)).await;
        // Every task held a sender, so a closed channel means none survived
        assert!(displays.has_changed().is_err());
    }
}
