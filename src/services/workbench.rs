use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::api::{Api, ApiError, GroupStore, ItemStore, MemberStore};
use crate::auth::AuthError;
use crate::auth::session::Session;
use crate::domain::group::{Group, GroupDraft, GroupRole};
use crate::domain::item::{Item, ItemDraft};
use crate::domain::member::Member;
use crate::domain::record::{Record, RecordId, ScopeId};
use crate::domain::validate::{ValidationError, check_email};

use super::mutation::{
    MutationController, MutationIntent, MutationOutcome, RecordFetcher, SubmitError,
};
use super::notify::{Notifier, TracingNotifier};
use super::policy::{self, PolicyDenied};

/// Why a console operation could not start or finish.
#[derive(Debug, thiserror::Error)]
pub enum WorkbenchError {
    #[error("sign in to continue")]
    AuthRequired,
    #[error("no group selected")]
    NoGroupSelected,
    #[error(transparent)]
    Denied(#[from] PolicyDenied),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("another change for record {target} is still pending")]
    Conflict { target: RecordId },
    #[error("record {target} is gone; the list was refreshed")]
    Vanished { target: RecordId },
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Remote(#[from] ApiError),
}

impl From<SubmitError> for WorkbenchError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::ConflictInFlight { target } => WorkbenchError::Conflict { target },
            SubmitError::RecordNotFound { target } => WorkbenchError::Vanished { target },
        }
    }
}

/// Session failures inside a fetch or a remote op surface through the
/// store's error space: a token we cannot refresh reads as Unauthorized.
fn credentials_error(err: AuthError) -> ApiError {
    match err {
        AuthError::Network(inner) => ApiError::Network(inner),
        AuthError::Decode { detail } => ApiError::Decode { detail },
        AuthError::Rejected { .. } | AuthError::SessionExpired => ApiError::Unauthorized,
    }
}

fn find_record<R: Record>(rows: &[R], id: &RecordId) -> Result<R, WorkbenchError> {
    rows.iter()
        .find(|row| row.record_id() == id)
        .cloned()
        .ok_or_else(|| WorkbenchError::Vanished { target: id.clone() })
}

struct RosterFetcher {
    store: Arc<dyn GroupStore>,
    session: Arc<Session>,
}

#[async_trait]
impl RecordFetcher<Group> for RosterFetcher {
    async fn fetch(&self, _scope: &ScopeId) -> Result<Vec<Group>, ApiError> {
        let creds = self.session.credentials().await.map_err(credentials_error)?;
        self.store.list(&creds).await
    }
}

struct MemberFetcher {
    store: Arc<dyn MemberStore>,
    session: Arc<Session>,
}

#[async_trait]
impl RecordFetcher<Member> for MemberFetcher {
    async fn fetch(&self, scope: &ScopeId) -> Result<Vec<Member>, ApiError> {
        let creds = self.session.credentials().await.map_err(credentials_error)?;
        self.store.list(scope, &creds).await
    }
}

struct ItemFetcher {
    store: Arc<dyn ItemStore>,
    session: Arc<Session>,
}

#[async_trait]
impl RecordFetcher<Item> for ItemFetcher {
    async fn fetch(&self, scope: &ScopeId) -> Result<Vec<Item>, ApiError> {
        let creds = self.session.credentials().await.map_err(credentials_error)?;
        self.store.list(scope, &creds).await
    }
}

#[derive(Clone)]
struct AuthState {
    session: Arc<Session>,
    roster: Arc<MutationController<Group>>,
}

/// The selected group with live member and item snapshots. Replaced
/// wholesale when the selection changes; work still in flight settles into
/// the discarded instance and never leaks into the new one.
pub struct GroupContext {
    group: Group,
    members: MutationController<Member>,
    items: MutationController<Item>,
}

impl GroupContext {
    pub fn group(&self) -> &Group {
        &self.group
    }

    pub fn members(&self) -> Vec<Member> {
        self.members.snapshot()
    }

    pub fn items(&self) -> Vec<Item> {
        self.items.snapshot()
    }

    /// True while a mutation for this member is in flight; render the row
    /// inert until it settles.
    pub fn member_locked(&self, id: &RecordId) -> bool {
        self.members.is_locked(id)
    }

    pub fn item_locked(&self, id: &RecordId) -> bool {
        self.items.is_locked(id)
    }
}

/// Root handle of the console: owns the session, the group roster, and the
/// active group context, and runs every user flow against them.
pub struct Workbench {
    groups: Arc<dyn GroupStore>,
    members: Arc<dyn MemberStore>,
    items: Arc<dyn ItemStore>,
    notifier: Arc<dyn Notifier>,
    auth: Mutex<Option<AuthState>>,
    selected: Mutex<Option<Arc<GroupContext>>>,
}

impl Workbench {
    pub fn new(api: Arc<Api>) -> Self {
        Self::with_stores(
            Arc::new(api.groups.clone()),
            Arc::new(api.members.clone()),
            Arc::new(api.items.clone()),
            Arc::new(TracingNotifier),
        )
    }

    /// Wires explicit collaborators. Tests script the stores through this.
    pub fn with_stores(
        groups: Arc<dyn GroupStore>,
        members: Arc<dyn MemberStore>,
        items: Arc<dyn ItemStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            groups,
            members,
            items,
            notifier,
            auth: Mutex::new(None),
            selected: Mutex::new(None),
        }
    }

    /// Installs a session and loads the caller's group roster.
    pub async fn sign_in(&self, session: Arc<Session>) -> Result<(), WorkbenchError> {
        let fetcher = Arc::new(RosterFetcher {
            store: self.groups.clone(),
            session: session.clone(),
        });
        let roster = Arc::new(MutationController::new(
            ScopeId::new(session.identity().username.clone()),
            fetcher,
            self.notifier.clone(),
        ));
        roster.load().await?;
        info!(username = %session.identity().username, "signed in");
        *self.auth.lock() = Some(AuthState { session, roster });
        *self.selected.lock() = None;
        Ok(())
    }

    /// Drops the session and revokes its refresh token best-effort.
    pub async fn sign_out(&self) {
        let state = self.auth.lock().take();
        *self.selected.lock() = None;
        if let Some(state) = state {
            info!(username = %state.session.identity().username, "signed out");
            state.session.revoke().await;
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.auth.lock().is_some()
    }

    fn auth_state(&self) -> Result<AuthState, WorkbenchError> {
        self.auth.lock().clone().ok_or(WorkbenchError::AuthRequired)
    }

    fn current_selection(&self) -> Result<Arc<GroupContext>, WorkbenchError> {
        self.selected
            .lock()
            .clone()
            .ok_or(WorkbenchError::NoGroupSelected)
    }

    /// The roster as currently rendered; empty when signed out.
    pub fn groups(&self) -> Vec<Group> {
        self.auth
            .lock()
            .as_ref()
            .map(|state| state.roster.snapshot())
            .unwrap_or_default()
    }

    pub fn group_locked(&self, id: &RecordId) -> bool {
        self.auth
            .lock()
            .as_ref()
            .is_some_and(|state| state.roster.is_locked(id))
    }

    pub fn selection(&self) -> Option<Arc<GroupContext>> {
        self.selected.lock().clone()
    }

    /// Makes a group current and loads its collections. The member list is
    /// an admin view, so non-admin selections load items alone.
    pub async fn select_group(&self, group_id: &RecordId) -> Result<(), WorkbenchError> {
        let state = self.auth_state()?;
        let group = find_record(&state.roster.snapshot(), group_id)?;
        let scope = ScopeId::of_group(&group.id);
        let members = MutationController::new(
            scope.clone(),
            Arc::new(MemberFetcher {
                store: self.members.clone(),
                session: state.session.clone(),
            }),
            self.notifier.clone(),
        );
        let items = MutationController::new(
            scope,
            Arc::new(ItemFetcher {
                store: self.items.clone(),
                session: state.session.clone(),
            }),
            self.notifier.clone(),
        );
        items.load().await?;
        if group.my_role == GroupRole::Admin {
            members.load().await?;
        }
        info!(group = %group.id, name = %group.name, "group selected");
        *self.selected.lock() = Some(Arc::new(GroupContext {
            group,
            members,
            items,
        }));
        Ok(())
    }

    pub fn clear_selection(&self) {
        *self.selected.lock() = None;
    }

    fn drop_selection_of(&self, group_id: &RecordId) {
        let mut selected = self.selected.lock();
        if selected
            .as_ref()
            .is_some_and(|ctx| ctx.group.id == *group_id)
        {
            *selected = None;
        }
    }

    pub async fn refresh_groups(&self) -> Result<Vec<Group>, WorkbenchError> {
        let state = self.auth_state()?;
        state.roster.load().await?;
        Ok(state.roster.snapshot())
    }

    /// Creates a group and refetches the roster; creation has no existing
    /// row to apply against, so it is not an optimistic intent.
    pub async fn create_group(&self, draft: GroupDraft) -> Result<(), WorkbenchError> {
        let state = self.auth_state()?;
        draft.validate()?;
        let creds = state.session.credentials().await?;
        self.groups.create(&draft, &creds).await?;
        self.notifier.success("create group");
        if let Err(err) = state.roster.load().await {
            warn!(error = %err, "roster refresh after create failed");
        }
        Ok(())
    }

    pub async fn rename_group(
        &self,
        group_id: &RecordId,
        new_name: &str,
    ) -> Result<MutationOutcome, WorkbenchError> {
        let state = self.auth_state()?;
        let draft = GroupDraft::new(new_name);
        draft.validate()?;
        let group = find_record(&state.roster.snapshot(), group_id)?;
        policy::can_rename_group(&group, &draft.name)?;

        let applied_name = draft.name.clone();
        let store = self.groups.clone();
        let session = state.session.clone();
        let id = group_id.clone();
        let name = draft.name;
        let intent = MutationIntent::update(
            group_id.clone(),
            "rename group",
            move |g: &mut Group| g.name = applied_name,
            move || async move {
                let creds = session.credentials().await.map_err(credentials_error)?;
                store.rename(&id, &name, &creds).await
            },
        );
        Ok(state.roster.submit(intent).await?)
    }

    pub async fn delete_group(
        &self,
        group_id: &RecordId,
    ) -> Result<MutationOutcome, WorkbenchError> {
        let state = self.auth_state()?;
        let group = find_record(&state.roster.snapshot(), group_id)?;
        policy::can_delete_group(&group)?;

        let store = self.groups.clone();
        let session = state.session.clone();
        let id = group_id.clone();
        let intent = MutationIntent::remove(group_id.clone(), "delete group", move || async move {
            let creds = session.credentials().await.map_err(credentials_error)?;
            store.delete(&id, &creds).await
        });
        let outcome = state.roster.submit(intent).await?;
        if outcome.is_committed() {
            self.drop_selection_of(group_id);
        }
        Ok(outcome)
    }

    pub async fn leave_group(
        &self,
        group_id: &RecordId,
    ) -> Result<MutationOutcome, WorkbenchError> {
        let state = self.auth_state()?;
        let group = find_record(&state.roster.snapshot(), group_id)?;
        policy::can_leave_group(&state.session.actor(), &group)?;

        let store = self.groups.clone();
        let session = state.session.clone();
        let id = group_id.clone();
        let intent = MutationIntent::remove(group_id.clone(), "leave group", move || async move {
            let creds = session.credentials().await.map_err(credentials_error)?;
            store.leave(&id, &creds).await
        });
        let outcome = state.roster.submit(intent).await?;
        if outcome.is_committed() {
            self.drop_selection_of(group_id);
        }
        Ok(outcome)
    }

    pub async fn refresh_members(&self) -> Result<Vec<Member>, WorkbenchError> {
        self.auth_state()?;
        let ctx = self.current_selection()?;
        policy::can_manage_members(ctx.group.my_role)?;
        ctx.members.load().await?;
        Ok(ctx.members.snapshot())
    }

    /// Flips one member between USER and ADMIN, optimistically.
    pub async fn toggle_member_role(
        &self,
        member_id: &RecordId,
    ) -> Result<MutationOutcome, WorkbenchError> {
        let state = self.auth_state()?;
        let ctx = self.current_selection()?;
        policy::can_manage_members(ctx.group.my_role)?;
        let member = find_record(&ctx.members.snapshot(), member_id)?;
        let new_role = member.role.toggled();
        policy::can_change_role(&state.session.actor(), &member, new_role, &ctx.group)?;

        let store = self.members.clone();
        let session = state.session.clone();
        let scope = ScopeId::of_group(&ctx.group.id);
        let id = member_id.clone();
        let intent = MutationIntent::update(
            member_id.clone(),
            "change member role",
            move |m: &mut Member| m.role = new_role,
            move || async move {
                let creds = session.credentials().await.map_err(credentials_error)?;
                store.set_role(&scope, &id, new_role, &creds).await
            },
        );
        Ok(ctx.members.submit(intent).await?)
    }

    pub async fn remove_member(
        &self,
        member_id: &RecordId,
    ) -> Result<MutationOutcome, WorkbenchError> {
        let state = self.auth_state()?;
        let ctx = self.current_selection()?;
        policy::can_manage_members(ctx.group.my_role)?;
        let member = find_record(&ctx.members.snapshot(), member_id)?;
        policy::can_remove_member(&state.session.actor(), &member, &ctx.group)?;

        let store = self.members.clone();
        let session = state.session.clone();
        let scope = ScopeId::of_group(&ctx.group.id);
        let id = member_id.clone();
        let intent =
            MutationIntent::remove(member_id.clone(), "remove member", move || async move {
                let creds = session.credentials().await.map_err(credentials_error)?;
                store.remove(&scope, &id, &creds).await
            });
        Ok(ctx.members.submit(intent).await?)
    }

    /// Sends an invitation; the member list only changes once the invitee
    /// accepts, so nothing is applied locally.
    pub async fn invite_member(&self, email: &str) -> Result<(), WorkbenchError> {
        let state = self.auth_state()?;
        let ctx = self.current_selection()?;
        check_email(email)?;
        policy::can_manage_members(ctx.group.my_role)?;
        let creds = state.session.credentials().await?;
        self.members
            .invite(&ScopeId::of_group(&ctx.group.id), email.trim(), &creds)
            .await?;
        self.notifier.success("invite member");
        Ok(())
    }

    pub async fn refresh_items(&self) -> Result<Vec<Item>, WorkbenchError> {
        self.auth_state()?;
        let ctx = self.current_selection()?;
        ctx.items.load().await?;
        Ok(ctx.items.snapshot())
    }

    pub async fn create_item(&self, draft: ItemDraft) -> Result<(), WorkbenchError> {
        let state = self.auth_state()?;
        let ctx = self.current_selection()?;
        draft.validate()?;
        let creds = state.session.credentials().await?;
        self.items
            .create(&ScopeId::of_group(&ctx.group.id), &draft, &creds)
            .await?;
        self.notifier.success("create item");
        if let Err(err) = ctx.items.load().await {
            warn!(error = %err, "item refresh after create failed");
        }
        Ok(())
    }

    pub async fn update_item(
        &self,
        item_id: &RecordId,
        draft: ItemDraft,
    ) -> Result<MutationOutcome, WorkbenchError> {
        let state = self.auth_state()?;
        let ctx = self.current_selection()?;
        draft.validate()?;

        let store = self.items.clone();
        let session = state.session.clone();
        let scope = ScopeId::of_group(&ctx.group.id);
        let id = item_id.clone();
        let body = draft.clone();
        let intent = MutationIntent::update(
            item_id.clone(),
            "update item",
            move |item: &mut Item| {
                item.name = draft.name;
                item.description = draft.description;
                item.amount = draft.amount;
            },
            move || async move {
                let creds = session.credentials().await.map_err(credentials_error)?;
                store.update(&scope, &id, &body, &creds).await
            },
        );
        Ok(ctx.items.submit(intent).await?)
    }

    pub async fn delete_item(
        &self,
        item_id: &RecordId,
    ) -> Result<MutationOutcome, WorkbenchError> {
        let state = self.auth_state()?;
        let ctx = self.current_selection()?;

        let store = self.items.clone();
        let session = state.session.clone();
        let scope = ScopeId::of_group(&ctx.group.id);
        let id = item_id.clone();
        let intent = MutationIntent::remove(item_id.clone(), "delete item", move || async move {
            let creds = session.credentials().await.map_err(credentials_error)?;
            store.delete(&scope, &id, &creds).await
        });
        Ok(ctx.items.submit(intent).await?)
    }
}
