pub mod application;
pub mod config;
pub mod core;
pub mod error;
pub mod infrastructure;
pub mod logging;
pub mod preferences;
pub mod routes;
pub mod search;
pub mod session;
pub mod ticker;
pub mod validation;

pub use application::{Application, RemoteApplication};
