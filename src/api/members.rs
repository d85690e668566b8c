use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::auth::Credentials;
use crate::domain::group::GroupRole;
use crate::domain::member::Member;
use crate::domain::record::{RecordId, ScopeId};

use super::http::{Transport, decode};
use super::{ApiError, MemberStore};

/// Client for the `/groups/{id}/members` resource.
#[derive(Clone)]
pub struct MembersApi {
    transport: Transport,
}

impl MembersApi {
    pub(crate) fn new(transport: Transport) -> Self {
        Self { transport }
    }
}

/// Member row as the server sends it. Username is mandatory because every
/// policy decision keys on it; profile fields are optional and normalized.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberDto {
    id_user: String,
    username: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    role: GroupRole,
}

impl MemberDto {
    fn into_member(self) -> Result<Member, ApiError> {
        if self.id_user.is_empty() {
            return Err(ApiError::Decode {
                detail: "member row with empty idUser".to_string(),
            });
        }
        if self.username.is_empty() {
            return Err(ApiError::Decode {
                detail: "member row with empty username".to_string(),
            });
        }
        let display_name = self.name.unwrap_or_else(|| self.username.clone());
        Ok(Member {
            id: RecordId::new(self.id_user),
            username: self.username,
            display_name,
            email: self.email.unwrap_or_default(),
            role: self.role,
        })
    }
}

#[derive(Serialize)]
struct RoleBody {
    role: GroupRole,
}

#[derive(Serialize)]
struct InviteBody<'a> {
    email: &'a str,
}

#[async_trait]
impl MemberStore for MembersApi {
    async fn list(&self, scope: &ScopeId, creds: &Credentials) -> Result<Vec<Member>, ApiError> {
        let path = format!("groups/{}/members", scope);
        let response = self.transport.get(&path, creds).await?;
        let rows: Vec<MemberDto> = decode(response).await?;
        rows.into_iter().map(MemberDto::into_member).collect()
    }

    async fn set_role(
        &self,
        scope: &ScopeId,
        member: &RecordId,
        role: GroupRole,
        creds: &Credentials,
    ) -> Result<(), ApiError> {
        let path = format!("groups/{}/members/{}/role", scope, member);
        self.transport
            .send_json(Method::PATCH, &path, creds, &RoleBody { role })
            .await?;
        Ok(())
    }

    async fn invite(
        &self,
        scope: &ScopeId,
        email: &str,
        creds: &Credentials,
    ) -> Result<(), ApiError> {
        let path = format!("groups/{}/invites", scope);
        self.transport
            .send_json(Method::POST, &path, creds, &InviteBody { email })
            .await?;
        Ok(())
    }

    async fn remove(
        &self,
        scope: &ScopeId,
        member: &RecordId,
        creds: &Credentials,
    ) -> Result<(), ApiError> {
        let path = format!("groups/{}/members/{}", scope, member);
        self.transport.send_empty(Method::DELETE, &path, creds).await?;
        Ok(())
    }
}
