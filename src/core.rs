use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    error::Result,
    infrastructure::DocumentStore,
};
use model::{
    query::{BookById, BookListQuery, DistinctTitles},
    Book, BookId, BookInfo, BookPatch, User,
};

pub mod model;

/// The in-memory mirror of the signed in user's books.
///
/// Every operation goes to the document store first and touches the list
/// only once the remote call succeeded, so a failure leaves the list as it
/// was. Mutations replace the snapshot held by a watch channel; views
/// subscribe to it and recompute.
pub struct BookStore<D> {
    documents: D,
    books: watch::Sender<Vec<Book>>,
}

impl<D> BookStore<D>
where
    D: DocumentStore,
{
    pub fn new(documents: D) -> Self {
        let (books, _rx) = watch::channel(vec![]);
        Self { documents, books }
    }

    pub fn documents(&self) -> &D {
        &self.documents
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Book>> {
        self.books.subscribe()
    }

    pub fn snapshot(&self) -> Vec<Book> {
        self.books.borrow().clone()
    }

    pub fn issue<Q>(&self, query: Q) -> Q::Output
    where
        Q: BookListQuery,
    {
        query.execute(&self.books.borrow())
    }

    /// Replaces the whole list with the remote collection.
    pub async fn load_all(&self, user: &User) -> Result<()> {
        let books = self.documents.fetch_books(user).await?;
        info!(user = %user.id, count = books.len(), "loaded books");
        self.books.send_replace(books);
        Ok(())
    }

    /// Persists `info` under a store assigned identifier and appends it.
    pub async fn add(&self, user: &User, info: BookInfo) -> Result<Book> {
        let id = self.documents.add_book(user, None, &info).await?;
        Ok(self.append(Book { id, info }))
    }

    /// Like `add`, but under a random identifier chosen here.
    pub async fn add_manual(&self, user: &User, info: BookInfo) -> Result<Book> {
        let id = BookId::fresh();
        let id = self.documents.add_book(user, Some(&id), &info).await?;
        Ok(self.append(Book { id, info }))
    }

    fn append(&self, book: Book) -> Book {
        info!(id = %book.id, title = %book.info.title, status = %book.info.status, "added book");
        self.books.send_modify(|books| books.push(book.clone()));
        book
    }

    /// A record missing from the list is skipped without complaint.
    pub async fn update_fields(&self, user: &User, id: &BookId, patch: BookPatch) -> Result<()> {
        self.documents.update_book(user, id, &patch).await?;

        self.books.send_if_modified(|books| {
            if let Some(book) = books.iter_mut().find(|book| &book.id == id) {
                patch.apply(&mut book.info);
                true
            } else {
                debug!(%id, "updated book is not in the list");
                false
            }
        });
        Ok(())
    }

    pub async fn remove(&self, user: &User, id: &BookId) -> Result<()> {
        self.documents.remove_book(user, id).await?;

        self.books.send_if_modified(|books| {
            let before = books.len();
            books.retain(|book| &book.id != id);
            before != books.len()
        });
        info!(%id, "removed book");
        Ok(())
    }

    pub async fn start_reading(&self, user: &User, id: &BookId, now: OffsetDateTime) -> Result<()> {
        let Some(book) = self.issue(BookById(id.clone())) else {
            debug!(%id, "no such book to start");
            return Ok(());
        };
        let patch = book.info.start_reading(id, now)?;
        self.update_fields(user, id, patch).await
    }

    pub async fn finish_reading(&self, user: &User, id: &BookId, now: OffsetDateTime) -> Result<()> {
        let Some(book) = self.issue(BookById(id.clone())) else {
            debug!(%id, "no such book to finish");
            return Ok(());
        };
        let patch = book.info.finish_reading(id, now)?;
        self.update_fields(user, id, patch).await
    }

    pub fn clear(&self) {
        self.books.send_replace(vec![]);
    }

    pub async fn total_readers(&self, user: &User, title: &str) -> Result<u64> {
        self.documents.count_readers(user, title).await
    }

    /// One count per distinct title in `books`. Failures are logged and
    /// leave that title unannotated.
    pub async fn annotate_total_readers(&self, user: &User, books: &[Book]) {
        for title in DistinctTitles.execute(books) {
            match self.total_readers(user, &title).await {
                Ok(count) => {
                    self.books.send_modify(|books| {
                        books
                            .iter_mut()
                            .filter(|book| book.info.title == title)
                            .for_each(|book| book.info.total_readers = Some(count))
                    });
                }
                Err(error) => warn!(%error, %title, "counting readers failed"),
            }
        }
    }
}
