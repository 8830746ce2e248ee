pub mod auth;
pub mod client;
pub mod errors;
pub mod provisioner;
pub mod types;

pub use auth::{AccessToken, ClientCredentials, StaticToken, TokenProvider};
pub use client::GraphClient;
pub use errors::GraphError;
pub use provisioner::FolderProvisioner;
pub use types::{DriveItem, FolderRef};
