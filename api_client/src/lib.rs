pub mod catalog;
pub mod documents;
pub mod error;
pub mod identity;
pub mod model;

pub use catalog::CatalogClient;
pub use documents::DocumentClient;
pub use identity::IdentityClient;
