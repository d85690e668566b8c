use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::auth::Credentials;
use crate::domain::group::{Group, GroupDraft, GroupRole};
use crate::domain::record::RecordId;

use super::http::{Transport, decode};
use super::{ApiError, GroupStore};

/// Client for the `/groups` resource.
#[derive(Clone)]
pub struct GroupsApi {
    transport: Transport,
}

impl GroupsApi {
    pub(crate) fn new(transport: Transport) -> Self {
        Self { transport }
    }
}

/// Roster row as the server sends it. Each row carries the caller's own
/// role in that group.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupDto {
    id_group: String,
    name: String,
    owner_group: String,
    role: GroupRole,
}

impl GroupDto {
    fn into_group(self) -> Result<Group, ApiError> {
        if self.id_group.is_empty() {
            return Err(ApiError::Decode {
                detail: "group row with empty idGroup".to_string(),
            });
        }
        Ok(Group {
            id: RecordId::new(self.id_group),
            name: self.name,
            owner: self.owner_group,
            my_role: self.role,
        })
    }
}

#[derive(Serialize)]
struct GroupBody<'a> {
    name: &'a str,
}

#[async_trait]
impl GroupStore for GroupsApi {
    async fn list(&self, creds: &Credentials) -> Result<Vec<Group>, ApiError> {
        let response = self.transport.get("groups", creds).await?;
        let rows: Vec<GroupDto> = decode(response).await?;
        rows.into_iter().map(GroupDto::into_group).collect()
    }

    async fn create(&self, draft: &GroupDraft, creds: &Credentials) -> Result<(), ApiError> {
        self.transport
            .send_json(Method::POST, "groups", creds, &GroupBody { name: &draft.name })
            .await?;
        Ok(())
    }

    async fn rename(
        &self,
        group: &RecordId,
        name: &str,
        creds: &Credentials,
    ) -> Result<(), ApiError> {
        let path = format!("groups/{}", group);
        self.transport
            .send_json(Method::PATCH, &path, creds, &GroupBody { name })
            .await?;
        Ok(())
    }

    async fn delete(&self, group: &RecordId, creds: &Credentials) -> Result<(), ApiError> {
        let path = format!("groups/{}", group);
        self.transport.send_empty(Method::DELETE, &path, creds).await?;
        Ok(())
    }

    async fn leave(&self, group: &RecordId, creds: &Credentials) -> Result<(), ApiError> {
        let path = format!("groups/{}/members/me", group);
        self.transport.send_empty(Method::DELETE, &path, creds).await?;
        Ok(())
    }
}
