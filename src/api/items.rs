use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::auth::Credentials;
use crate::domain::item::{Item, ItemDraft};
use crate::domain::record::{RecordId, ScopeId};

use super::http::{Transport, decode};
use super::{ApiError, ItemStore};

/// Client for the `/items/group/{id}` resource.
#[derive(Clone)]
pub struct ItemsApi {
    transport: Transport,
}

impl ItemsApi {
    pub(crate) fn new(transport: Transport) -> Self {
        Self { transport }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemDto {
    id_item: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    amount: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    creator: Option<String>,
}

impl ItemDto {
    fn into_item(self) -> Result<Item, ApiError> {
        if self.id_item.is_empty() {
            return Err(ApiError::Decode {
                detail: "item row with empty idItem".to_string(),
            });
        }
        Ok(Item {
            id: RecordId::new(self.id_item),
            name: self.name,
            description: self.description.unwrap_or_default(),
            amount: self.amount,
            created_at: self.created_at,
            updated_at: self.updated_at,
            creator: self.creator.unwrap_or_default(),
        })
    }
}

#[derive(Serialize)]
struct ItemBody<'a> {
    name: &'a str,
    description: &'a str,
    amount: i64,
}

impl<'a> ItemBody<'a> {
    fn from_draft(draft: &'a ItemDraft) -> Self {
        Self {
            name: &draft.name,
            description: &draft.description,
            amount: draft.amount,
        }
    }
}

#[async_trait]
impl ItemStore for ItemsApi {
    async fn list(&self, scope: &ScopeId, creds: &Credentials) -> Result<Vec<Item>, ApiError> {
        let path = format!("items/group/{}", scope);
        let response = self.transport.get(&path, creds).await?;
        let rows: Vec<ItemDto> = decode(response).await?;
        rows.into_iter().map(ItemDto::into_item).collect()
    }

    async fn create(
        &self,
        scope: &ScopeId,
        draft: &ItemDraft,
        creds: &Credentials,
    ) -> Result<(), ApiError> {
        let path = format!("items/group/{}", scope);
        self.transport
            .send_json(Method::POST, &path, creds, &ItemBody::from_draft(draft))
            .await?;
        Ok(())
    }

    async fn update(
        &self,
        scope: &ScopeId,
        item: &RecordId,
        draft: &ItemDraft,
        creds: &Credentials,
    ) -> Result<(), ApiError> {
        let path = format!("items/group/{}/{}", scope, item);
        self.transport
            .send_json(Method::PUT, &path, creds, &ItemBody::from_draft(draft))
            .await?;
        Ok(())
    }

    async fn delete(
        &self,
        scope: &ScopeId,
        item: &RecordId,
        creds: &Credentials,
    ) -> Result<(), ApiError> {
        let path = format!("items/group/{}/{}", scope, item);
        self.transport.send_empty(Method::DELETE, &path, creds).await?;
        Ok(())
    }
}
