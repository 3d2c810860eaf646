//! OAuth2 authorization-code flow, token persistence and refresh.

pub mod endpoint;
pub mod error;
pub mod flow;
pub mod manager;
pub mod store;
pub mod token;

pub use endpoint::TokenEndpoint;
pub use error::{AuthError, ProviderError};
pub use flow::{AuthorizationFlow, AuthorizationRequest, OAuthConfig};
pub use manager::{RefreshPolicy, RequestToken, TokenManager};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use token::TokenRecord;
