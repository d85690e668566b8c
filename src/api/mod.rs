pub mod groups;
pub mod items;
pub mod members;

mod http;

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::Credentials;
use crate::config::ApiConfig;
use crate::domain::group::{Group, GroupDraft, GroupRole};
use crate::domain::item::{Item, ItemDraft};
use crate::domain::member::Member;
use crate::domain::record::{RecordId, ScopeId};

pub use groups::GroupsApi;
pub use items::ItemsApi;
pub use members::MembersApi;

/// How calls to the record store fail. Status codes the taxonomy cares
/// about get their own variants; everything else lands in `Http`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("the record store rejected the caller's token")]
    Unauthorized,
    #[error("the record store denied the operation")]
    Forbidden,
    #[error("no such record on the server")]
    NotFound,
    #[error("record store answered with unexpected status {status}")]
    Http { status: u16 },
    #[error("could not reach the record store: {0}")]
    Network(#[from] reqwest::Error),
    #[error("record store answer did not match the expected shape: {detail}")]
    Decode { detail: String },
}

/// Remote operations on the caller's group roster.
///
/// Mutations return unit on purpose: the server's row is picked up by the
/// refetch that follows a commit, never parsed out of the mutation response.
#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn list(&self, creds: &Credentials) -> Result<Vec<Group>, ApiError>;
    async fn create(&self, draft: &GroupDraft, creds: &Credentials) -> Result<(), ApiError>;
    async fn rename(&self, group: &RecordId, name: &str, creds: &Credentials)
    -> Result<(), ApiError>;
    async fn delete(&self, group: &RecordId, creds: &Credentials) -> Result<(), ApiError>;
    /// Removes the caller's own membership.
    async fn leave(&self, group: &RecordId, creds: &Credentials) -> Result<(), ApiError>;
}

/// Remote operations on one group's member list.
#[async_trait]
pub trait MemberStore: Send + Sync {
    async fn list(&self, scope: &ScopeId, creds: &Credentials) -> Result<Vec<Member>, ApiError>;
    async fn set_role(
        &self,
        scope: &ScopeId,
        member: &RecordId,
        role: GroupRole,
        creds: &Credentials,
    ) -> Result<(), ApiError>;
    async fn invite(&self, scope: &ScopeId, email: &str, creds: &Credentials)
    -> Result<(), ApiError>;
    async fn remove(
        &self,
        scope: &ScopeId,
        member: &RecordId,
        creds: &Credentials,
    ) -> Result<(), ApiError>;
}

/// Remote operations on one group's items.
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn list(&self, scope: &ScopeId, creds: &Credentials) -> Result<Vec<Item>, ApiError>;
    async fn create(
        &self,
        scope: &ScopeId,
        draft: &ItemDraft,
        creds: &Credentials,
    ) -> Result<(), ApiError>;
    async fn update(
        &self,
        scope: &ScopeId,
        item: &RecordId,
        draft: &ItemDraft,
        creds: &Credentials,
    ) -> Result<(), ApiError>;
    async fn delete(
        &self,
        scope: &ScopeId,
        item: &RecordId,
        creds: &Credentials,
    ) -> Result<(), ApiError>;
}

/// One configured client per record family, all sharing a connection pool.
pub struct Api {
    pub groups: GroupsApi,
    pub members: MembersApi,
    pub items: ItemsApi,
}

impl Api {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let transport = http::Transport::new(config)?;
        Ok(Self {
            groups: GroupsApi::new(transport.clone()),
            members: MembersApi::new(transport.clone()),
            items: ItemsApi::new(transport),
        })
    }
}
