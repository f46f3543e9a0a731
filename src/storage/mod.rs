pub mod db;
pub mod models;

pub use db::{CredentialStore, StoreError};
pub use models::CredentialPair;
