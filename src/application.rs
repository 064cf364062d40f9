use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{info, warn};

use api_client::{CatalogClient, DocumentClient, IdentityClient};

use crate::{
    config::Config,
    core::{
        model::{
            query::{BookListQuery, FinishedWithin, GoalProgress, Period},
            Book, BookId, BookInfo, Candidate, InitialStatus, User, UserProfile,
        },
        BookStore,
    },
    error::Result,
    infrastructure::{
        persistence::LocalStorage,
        remote::{RemoteCatalog, RemoteDocuments, RemoteIdentity},
        BookCatalog, DocumentStore, IdentityProvider,
    },
    preferences::Theme,
    routes::{self, Guarded, Route},
    search::DebouncedSearch,
    session::Session,
    ticker::ReadingTicker,
    validation,
};

/// Everything a front end talks to: the session, the book list, the
/// catalog and the device-local preferences.
pub struct Application<I, D, C> {
    config: Config,
    storage: LocalStorage,
    session: Session<I>,
    books: BookStore<D>,
    catalog: Arc<C>,
}

pub type RemoteApplication = Application<RemoteIdentity, RemoteDocuments, RemoteCatalog>;

impl RemoteApplication {
    pub fn from_config(config: Config) -> Result<Self> {
        let storage = LocalStorage::try_new(config.data_dir.join("store"))?;
        let identity = RemoteIdentity::new(IdentityClient::new(
            &config.identity_url,
            &config.token_url,
            &config.api_key,
        ));
        let documents =
            RemoteDocuments::new(DocumentClient::new(&config.firestore_url, &config.project_id));
        let catalog = RemoteCatalog::new(CatalogClient::new(
            &config.books_url,
            config.books_api_key.as_deref(),
        ));

        Ok(Self::new(config, storage, identity, documents, catalog))
    }
}

impl<I, D, C> Application<I, D, C>
where
    I: IdentityProvider,
    D: DocumentStore,
    C: BookCatalog + Send + Sync + 'static,
{
    pub fn new(config: Config, storage: LocalStorage, identity: I, documents: D, catalog: C) -> Self {
        Self {
            config,
            session: Session::new(identity, storage.clone()),
            storage,
            books: BookStore::new(documents),
            catalog: Arc::new(catalog),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Session<I> {
        &self.session
    }

    pub fn books(&self) -> &BookStore<D> {
        &self.books
    }

    pub fn issue<Q>(&self, query: Q) -> Q::Output
    where
        Q: BookListQuery,
    {
        self.books.issue(query)
    }

    /// Restores the persisted session without touching the book list.
    pub async fn restore(&self) -> Result<Option<User>> {
        self.session.restore().await
    }

    /// Restores the persisted session and, when there is one, its books. A
    /// failed load leaves the list empty and the session usable.
    pub async fn start(&self) -> Result<Option<User>> {
        let user = self.restore().await?;
        if user.is_some() {
            if let Err(error) = self.reload().await {
                warn!(%error, "books could not be loaded");
            }
        }
        Ok(user)
    }

    pub fn guard(&self, route: Route) -> Guarded {
        routes::guard(route, &self.session.current())
    }

    pub async fn check_email(&self, email: &str) -> Result<(String, Route)> {
        self.session.check_email(email).await
    }

    /// Creates the account and its profile document.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User> {
        let user = self.session.register(name, email, password).await?;
        let profile = UserProfile {
            uid: user.id.clone(),
            name: user.greeting_name().to_owned(),
            email: user.email.clone(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.books.documents().save_profile(&user, &profile).await?;
        self.books.clear();
        Ok(user)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        let user = self.session.sign_in(email, password).await?;
        self.books.load_all(&user).await?;
        Ok(user)
    }

    pub fn sign_out(&self) -> Result<()> {
        self.session.sign_out()?;
        self.books.clear();
        Ok(())
    }

    pub async fn reload(&self) -> Result<()> {
        self.books.load_all(&self.session.fresh_user().await?).await
    }

    pub async fn search(&self, query_text: &str) -> Result<Vec<Candidate>> {
        self.catalog.search(query_text).await
    }

    pub fn debounced_search(&self) -> DebouncedSearch<C> {
        DebouncedSearch::new(Arc::clone(&self.catalog), self.config.search_debounce)
    }

    pub fn reading_ticker(&self) -> ReadingTicker {
        ReadingTicker::new(self.config.tick_period)
    }

    pub async fn add_candidate(&self, candidate: &Candidate, initial: InitialStatus) -> Result<Book> {
        let user = self.session.fresh_user().await?;
        let info = BookInfo::from_candidate(candidate, initial, OffsetDateTime::now_utc())?;
        self.books.add(&user, info).await
    }

    pub async fn add_manual(
        &self,
        title: &str,
        author: &str,
        cover_image: Option<String>,
        initial: InitialStatus,
    ) -> Result<Book> {
        let user = self.session.fresh_user().await?;
        let info = BookInfo::new(title, author, cover_image, initial, OffsetDateTime::now_utc())?;
        self.books.add_manual(&user, info).await
    }

    pub async fn start_reading(&self, id: &BookId) -> Result<()> {
        let user = self.session.fresh_user().await?;
        self.books
            .start_reading(&user, id, OffsetDateTime::now_utc())
            .await
    }

    pub async fn finish_reading(&self, id: &BookId) -> Result<()> {
        let user = self.session.fresh_user().await?;
        self.books
            .finish_reading(&user, id, OffsetDateTime::now_utc())
            .await
    }

    pub async fn remove(&self, id: &BookId) -> Result<()> {
        let user = self.session.fresh_user().await?;
        self.books.remove(&user, id).await
    }

    pub async fn annotate_total_readers(&self) -> Result<()> {
        let user = self.session.fresh_user().await?;
        self.books
            .annotate_total_readers(&user, &self.books.snapshot())
            .await;
        Ok(())
    }

    /// Books finished in the week, month or year containing today, local
    /// time.
    pub fn finished_within(&self, period: Period) -> Vec<Book> {
        self.issue(FinishedWithin(period, local_now()))
    }

    pub fn goal(&self) -> Result<Option<u32>> {
        self.storage.goal()
    }

    pub fn set_goal(&self, goal: Option<u32>) -> Result<()> {
        let goal = goal.map(validation::goal).transpose()?;
        self.storage.set_goal(goal)?;
        info!(?goal, "reading goal set");
        Ok(())
    }

    pub fn goal_progress(&self) -> Result<f64> {
        Ok(self.issue(GoalProgress(self.goal()?)))
    }

    pub fn theme(&self) -> Result<Theme> {
        self.storage.theme()
    }

    pub fn toggle_theme(&self) -> Result<Theme> {
        let theme = self.theme()?.toggled();
        self.storage.set_theme(theme)?;
        info!(%theme, "theme changed");
        Ok(theme)
    }
}

fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|error| {
        warn!(%error, "local offset unknown, using UTC");
        OffsetDateTime::now_utc()
    })
}
