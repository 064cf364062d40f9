use std::future::Future;

use crate::{
    core::model::{Book, BookId, BookInfo, BookPatch, Candidate, User, UserProfile},
    error::Result,
};

pub mod memory;
pub mod persistence;
pub mod remote;

// The futures are Send so that front ends can drive these from spawned tasks.

/// Per-user book collections plus the profile documents.
pub trait DocumentStore {
    fn fetch_books(&self, user: &User) -> impl Future<Output = Result<Vec<Book>>> + Send;

    /// Persists `info`. With `id` the document is created under that
    /// identifier, otherwise the store assigns one.
    fn add_book(
        &self,
        user: &User,
        id: Option<&BookId>,
        info: &BookInfo,
    ) -> impl Future<Output = Result<BookId>> + Send;

    fn update_book(
        &self,
        user: &User,
        id: &BookId,
        patch: &BookPatch,
    ) -> impl Future<Output = Result<()>> + Send;

    fn remove_book(&self, user: &User, id: &BookId) -> impl Future<Output = Result<()>> + Send;

    /// How many books titled `title` are being read, across every user.
    fn count_readers(&self, user: &User, title: &str) -> impl Future<Output = Result<u64>> + Send;

    fn save_profile(&self, user: &User, profile: &UserProfile) -> impl Future<Output = Result<()>> + Send;
}

pub trait IdentityProvider {
    fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<User>> + Send;

    fn sign_in(&self, email: &str, password: &str) -> impl Future<Output = Result<User>> + Send;

    /// Returns the user with the name applied, tokens may have rotated.
    fn set_display_name(&self, user: &User, name: &str) -> impl Future<Output = Result<User>> + Send;

    fn sign_in_methods(&self, email: &str) -> impl Future<Output = Result<SignInMethods>> + Send;

    /// Trades a persisted session for one with a fresh id token.
    fn refresh(&self, user: &User) -> impl Future<Output = Result<User>> + Send;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignInMethods {
    pub methods: Vec<String>,
    pub registered: bool,
}

impl SignInMethods {
    pub fn is_registered(&self) -> bool {
        self.registered || !self.methods.is_empty()
    }
}

pub trait BookCatalog {
    fn search(&self, query_text: &str) -> impl Future<Output = Result<Vec<Candidate>>> + Send;
}
