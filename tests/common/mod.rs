#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use montse::{
    config::Config,
    core::model::Candidate,
    infrastructure::{
        memory::{MemoryCatalog, MemoryDocuments, MemoryIdentity},
        persistence::LocalStorage,
    },
    Application,
};
use tempfile::TempDir;

pub type MemoryApplication = Application<MemoryIdentity, MemoryDocuments, MemoryCatalog>;

pub const EMAIL: &str = "reader@example.com";
pub const PASSWORD: &str = "correct horse";

pub fn config(data_dir: PathBuf) -> Config {
    Config {
        api_key: "test".to_owned(),
        project_id: "montse-test".to_owned(),
        books_api_key: None,
        data_dir,
        tick_period: Duration::from_secs(1),
        search_debounce: Duration::from_millis(500),
        identity_url: "http://localhost".to_owned(),
        token_url: "http://localhost".to_owned(),
        firestore_url: "http://localhost".to_owned(),
        books_url: "http://localhost".to_owned(),
    }
}

pub fn dune() -> Candidate {
    Candidate {
        volume_id: "nrRKDwAAQBAJ".to_owned(),
        title: "Dune".to_owned(),
        author: "Frank Herbert".to_owned(),
        thumbnail: Some("http://books.example.com/dune.jpg".to_owned()),
    }
}

pub fn application() -> (MemoryApplication, TempDir) {
    let directory = tempfile::tempdir().expect("a temporary directory");
    let application = application_in(directory.path(), MemoryIdentity::default());
    (application, directory)
}

/// An application over an existing data directory. Passing a clone of an
/// earlier run's identity provider keeps its accounts.
pub fn application_in(data_dir: &Path, identity: MemoryIdentity) -> MemoryApplication {
    let storage = LocalStorage::try_new(data_dir).expect("a keyspace");
    Application::new(
        config(data_dir.to_owned()),
        storage,
        identity,
        MemoryDocuments::default(),
        MemoryCatalog::with_results(vec![dune()]),
    )
}

/// A started application with a registered, signed in reader.
pub async fn signed_in() -> (MemoryApplication, TempDir) {
    let (application, directory) = application();
    application.start().await.expect("a clean start");
    application
        .register("Reader", EMAIL, PASSWORD)
        .await
        .expect("a new account");
    (application, directory)
}
