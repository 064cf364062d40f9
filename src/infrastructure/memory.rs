//! In-process stand-ins for the remote services, used by the test suites
//! to observe calls and to inject failures.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard,
    },
};
use time::{Duration, OffsetDateTime};

use crate::{
    core::model::{Book, BookId, BookInfo, BookPatch, BookStatus, Candidate, User, UserId, UserProfile},
    error::{Error, Result},
    infrastructure::{BookCatalog, DocumentStore, IdentityProvider, SignInMethods},
};

const PASSWORD_METHOD: &str = "password";

fn locked<A>(mutex: &Mutex<A>) -> MutexGuard<'_, A> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
pub struct MemoryDocuments {
    books: Mutex<HashMap<UserId, Vec<Book>>>,
    profiles: Mutex<HashMap<UserId, UserProfile>>,
    failing: AtomicBool,
    next_id: AtomicUsize,
}

impl MemoryDocuments {
    /// While set, every call fails before touching anything.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn books_of(&self, user: &User) -> Vec<Book> {
        locked(&self.books).get(&user.id).cloned().unwrap_or_default()
    }

    pub fn profile_of(&self, user: &User) -> Option<UserProfile> {
        locked(&self.profiles).get(&user.id).cloned()
    }

    /// Seeds a record as if another client had written it.
    pub fn insert(&self, user: &User, book: Book) {
        locked(&self.books).entry(user.id.clone()).or_default().push(book);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(Error::Generic("document store unavailable".to_owned()))
        } else {
            Ok(())
        }
    }
}

impl DocumentStore for MemoryDocuments {
    async fn fetch_books(&self, user: &User) -> Result<Vec<Book>> {
        self.check()?;
        Ok(self.books_of(user))
    }

    async fn add_book(&self, user: &User, id: Option<&BookId>, info: &BookInfo) -> Result<BookId> {
        self.check()?;
        let id = id.cloned().unwrap_or_else(|| {
            BookId(format!("doc-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1))
        });
        let mut info = info.clone();
        info.total_readers = None;
        self.insert(user, Book { id: id.clone(), info });
        Ok(id)
    }

    async fn update_book(&self, user: &User, id: &BookId, patch: &BookPatch) -> Result<()> {
        self.check()?;
        let mut books = locked(&self.books);
        let book = books
            .get_mut(&user.id)
            .and_then(|books| books.iter_mut().find(|book| &book.id == id))
            .ok_or_else(|| Error::Generic(format!("no document {id}")))?;
        patch.apply(&mut book.info);
        Ok(())
    }

    async fn remove_book(&self, user: &User, id: &BookId) -> Result<()> {
        self.check()?;
        if let Some(books) = locked(&self.books).get_mut(&user.id) {
            books.retain(|book| &book.id != id);
        }
        Ok(())
    }

    async fn count_readers(&self, _user: &User, title: &str) -> Result<u64> {
        self.check()?;
        let count = locked(&self.books)
            .values()
            .flatten()
            .filter(|book| book.info.title == title && book.info.status == BookStatus::Reading)
            .count();
        Ok(count as u64)
    }

    async fn save_profile(&self, user: &User, profile: &UserProfile) -> Result<()> {
        self.check()?;
        locked(&self.profiles).insert(user.id.clone(), profile.clone());
        Ok(())
    }
}

struct Account {
    password: String,
    user: User,
}

/// Accounts keyed by email. Clones share their accounts, the way two runs
/// of the program share one provider.
#[derive(Clone)]
pub struct MemoryIdentity {
    accounts: Arc<Mutex<HashMap<String, Account>>>,
    issued: Arc<AtomicUsize>,
    refreshes: Arc<AtomicUsize>,
    offline: Arc<AtomicBool>,
    token_lifetime: Duration,
}

impl Default for MemoryIdentity {
    fn default() -> Self {
        Self::with_token_lifetime(Duration::hours(1))
    }
}

impl MemoryIdentity {
    pub fn with_token_lifetime(token_lifetime: Duration) -> Self {
        Self {
            accounts: Arc::default(),
            issued: Arc::default(),
            refreshes: Arc::default(),
            offline: Arc::default(),
            token_lifetime,
        }
    }

    /// While set, every call fails the way an unreachable network does.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    fn token(&self, kind: &str) -> String {
        format!("{kind}-{}", self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn expiry(&self) -> Option<OffsetDateTime> {
        Some(OffsetDateTime::now_utc() + self.token_lifetime)
    }

    fn reachable(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(Error::Generic("network unreachable".to_owned()))
        } else {
            Ok(())
        }
    }

    fn rejected(message: &str) -> Error {
        Error::Rejected(message.to_owned())
    }
}

impl IdentityProvider for MemoryIdentity {
    async fn create_account(&self, email: &str, password: &str) -> Result<User> {
        self.reachable()?;
        let mut accounts = locked(&self.accounts);
        if accounts.contains_key(email) {
            return Err(Self::rejected("EMAIL_EXISTS"));
        }

        let user = User {
            id: UserId(format!("uid-{}", accounts.len() + 1)),
            email: email.to_owned(),
            display_name: None,
            id_token: self.token("id"),
            refresh_token: self.token("refresh"),
            expires_at: self.expiry(),
        };
        accounts.insert(
            email.to_owned(),
            Account {
                password: password.to_owned(),
                user: user.clone(),
            },
        );
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        self.reachable()?;
        let accounts = locked(&self.accounts);
        match accounts.get(email) {
            Some(account) if account.password == password => Ok(User {
                id_token: self.token("id"),
                expires_at: self.expiry(),
                ..account.user.clone()
            }),
            Some(_) => Err(Self::rejected("INVALID_PASSWORD")),
            None => Err(Self::rejected("EMAIL_NOT_FOUND")),
        }
    }

    async fn set_display_name(&self, user: &User, name: &str) -> Result<User> {
        self.reachable()?;
        let mut accounts = locked(&self.accounts);
        let account = accounts
            .get_mut(&user.email)
            .ok_or_else(|| Self::rejected("USER_NOT_FOUND"))?;
        account.user.display_name = Some(name.to_owned());
        Ok(User {
            display_name: Some(name.to_owned()),
            ..user.clone()
        })
    }

    async fn sign_in_methods(&self, email: &str) -> Result<SignInMethods> {
        self.reachable()?;
        let registered = locked(&self.accounts).contains_key(email);
        Ok(SignInMethods {
            methods: if registered {
                vec![PASSWORD_METHOD.to_owned()]
            } else {
                vec![]
            },
            registered,
        })
    }

    async fn refresh(&self, user: &User) -> Result<User> {
        self.reachable()?;
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let accounts = locked(&self.accounts);
        let account = accounts
            .get(&user.email)
            .filter(|account| account.user.refresh_token == user.refresh_token)
            .ok_or_else(|| Self::rejected("INVALID_REFRESH_TOKEN"))?;
        Ok(User {
            id_token: self.token("id"),
            expires_at: self.expiry(),
            ..account.user.clone()
        })
    }
}

/// Answers every query with the same candidates and records what was asked.
#[derive(Default)]
pub struct MemoryCatalog {
    results: Vec<Candidate>,
    failing: bool,
    queries: Mutex<Vec<String>>,
}

impl MemoryCatalog {
    pub fn with_results(results: Vec<Candidate>) -> Self {
        Self {
            results,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn requests(&self) -> usize {
        locked(&self.queries).len()
    }

    pub fn queries(&self) -> Vec<String> {
        locked(&self.queries).clone()
    }
}

impl BookCatalog for MemoryCatalog {
    async fn search(&self, query_text: &str) -> Result<Vec<Candidate>> {
        locked(&self.queries).push(query_text.to_owned());
        if self.failing {
            Err(Error::Generic("catalog unavailable".to_owned()))
        } else {
            Ok(self.results.clone())
        }
    }
}
