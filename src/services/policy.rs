use crate::domain::actor::Actor;
use crate::domain::group::{Group, GroupRole};
use crate::domain::member::Member;

/// Every reason a mutation is refused before it leaves the client. The
/// server enforces the same rules; these checks exist so a forbidden
/// change never even applies speculatively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The caller is not an admin of the scope group.
    NotAdmin,
    /// The target row belongs to the group owner.
    OwnerProtected,
    /// The caller targeted their own membership.
    SelfMutation,
    /// The change would not alter anything.
    NoChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyDenied {
    pub reason: DenyReason,
}

impl PolicyDenied {
    fn new(reason: DenyReason) -> Self {
        Self { reason }
    }
}

impl std::fmt::Display for PolicyDenied {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.reason {
            DenyReason::NotAdmin => write!(f, "Only group admins can do that"),
            DenyReason::OwnerProtected => {
                write!(f, "The group owner cannot be changed or removed")
            }
            DenyReason::SelfMutation => write!(f, "You cannot change your own membership"),
            DenyReason::NoChange => write!(f, "Nothing would change"),
        }
    }
}

impl std::error::Error for PolicyDenied {}

/// Member management as a whole is an admin capability.
pub fn can_manage_members(my_role: GroupRole) -> Result<(), PolicyDenied> {
    if my_role != GroupRole::Admin {
        return Err(PolicyDenied::new(DenyReason::NotAdmin));
    }
    Ok(())
}

/// Role changes additionally protect the owner row, the caller's own row,
/// and refuse no-op assignments. Identity is compared by username only.
pub fn can_change_role(
    actor: &Actor,
    target: &Member,
    new_role: GroupRole,
    group: &Group,
) -> Result<(), PolicyDenied> {
    can_manage_members(group.my_role)?;
    if target.username == group.owner {
        return Err(PolicyDenied::new(DenyReason::OwnerProtected));
    }
    if target.username == actor.username {
        return Err(PolicyDenied::new(DenyReason::SelfMutation));
    }
    if target.role == new_role {
        return Err(PolicyDenied::new(DenyReason::NoChange));
    }
    Ok(())
}

pub fn can_remove_member(
    actor: &Actor,
    target: &Member,
    group: &Group,
) -> Result<(), PolicyDenied> {
    can_manage_members(group.my_role)?;
    if target.username == group.owner {
        return Err(PolicyDenied::new(DenyReason::OwnerProtected));
    }
    if target.username == actor.username {
        return Err(PolicyDenied::new(DenyReason::SelfMutation));
    }
    Ok(())
}

pub fn can_rename_group(group: &Group, new_name: &str) -> Result<(), PolicyDenied> {
    if group.my_role != GroupRole::Admin {
        return Err(PolicyDenied::new(DenyReason::NotAdmin));
    }
    if group.name == new_name {
        return Err(PolicyDenied::new(DenyReason::NoChange));
    }
    Ok(())
}

pub fn can_delete_group(group: &Group) -> Result<(), PolicyDenied> {
    if group.my_role != GroupRole::Admin {
        return Err(PolicyDenied::new(DenyReason::NotAdmin));
    }
    Ok(())
}

/// Anyone may walk away from a group except its owner.
pub fn can_leave_group(actor: &Actor, group: &Group) -> Result<(), PolicyDenied> {
    if group.owner == actor.username {
        return Err(PolicyDenied::new(DenyReason::OwnerProtected));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::domain::record::RecordId;

    use super::*;

    fn actor() -> Actor {
        Actor {
            username: "ana".to_string(),
            display_name: "Ana Lima".to_string(),
        }
    }

    fn group(owner: &str, my_role: GroupRole) -> Group {
        Group {
            id: RecordId::new("g-1"),
            name: "Chess club".to_string(),
            owner: owner.to_string(),
            my_role,
        }
    }

    fn member(username: &str, role: GroupRole) -> Member {
        Member {
            id: RecordId::new(format!("u-{}", username)),
            username: username.to_string(),
            display_name: username.to_string(),
            email: format!("{}@example.com", username),
            role,
        }
    }

    #[rstest]
    // Admin promoting an ordinary member: allowed.
    #[case("bob", GroupRole::Admin, "carla", GroupRole::User, GroupRole::Admin, None)]
    // Demoting another admin: allowed.
    #[case("bob", GroupRole::Admin, "davi", GroupRole::Admin, GroupRole::User, None)]
    // Non-admin caller: refused outright.
    #[case("bob", GroupRole::User, "carla", GroupRole::User, GroupRole::Admin, Some(DenyReason::NotAdmin))]
    // The owner's row is untouchable, even to promote.
    #[case("bob", GroupRole::Admin, "bob", GroupRole::Admin, GroupRole::User, Some(DenyReason::OwnerProtected))]
    // The caller's own row is untouchable.
    #[case("bob", GroupRole::Admin, "ana", GroupRole::User, GroupRole::Admin, Some(DenyReason::SelfMutation))]
    // Assigning the role the target already has: refused as a no-op.
    #[case("bob", GroupRole::Admin, "carla", GroupRole::User, GroupRole::User, Some(DenyReason::NoChange))]
    fn test_role_change_matrix(
        #[case] owner: &str,
        #[case] my_role: GroupRole,
        #[case] target_name: &str,
        #[case] target_role: GroupRole,
        #[case] new_role: GroupRole,
        #[case] denied: Option<DenyReason>,
    ) {
        let group = group(owner, my_role);
        let target = member(target_name, target_role);
        let result = can_change_role(&actor(), &target, new_role, &group);
        match denied {
            None => assert!(result.is_ok()),
            Some(reason) => assert_eq!(result, Err(PolicyDenied { reason })),
        }
    }

    #[rstest]
    #[case("bob", GroupRole::Admin, "carla", None)]
    #[case("bob", GroupRole::User, "carla", Some(DenyReason::NotAdmin))]
    #[case("bob", GroupRole::Admin, "bob", Some(DenyReason::OwnerProtected))]
    #[case("bob", GroupRole::Admin, "ana", Some(DenyReason::SelfMutation))]
    fn test_removal_matrix(
        #[case] owner: &str,
        #[case] my_role: GroupRole,
        #[case] target_name: &str,
        #[case] denied: Option<DenyReason>,
    ) {
        let group = group(owner, my_role);
        let target = member(target_name, GroupRole::User);
        let result = can_remove_member(&actor(), &target, &group);
        match denied {
            None => assert!(result.is_ok()),
            Some(reason) => assert_eq!(result, Err(PolicyDenied { reason })),
        }
    }

    #[test]
    fn test_owner_protection_ignores_display_names() {
        // Same display name as the owner but a different username: fair game.
        let group = group("bob", GroupRole::Admin);
        let mut target = member("carla", GroupRole::User);
        target.display_name = "bob".to_string();
        assert!(can_change_role(&actor(), &target, GroupRole::Admin, &group).is_ok());
    }

    #[test]
    fn test_rename_refuses_the_current_name() {
        let admin_view = group("bob", GroupRole::Admin);
        assert!(can_rename_group(&admin_view, "Chess society").is_ok());
        assert_eq!(
            can_rename_group(&admin_view, "Chess club"),
            Err(PolicyDenied { reason: DenyReason::NoChange })
        );
        let user_view = group("bob", GroupRole::User);
        assert_eq!(
            can_rename_group(&user_view, "Chess society"),
            Err(PolicyDenied { reason: DenyReason::NotAdmin })
        );
    }

    #[test]
    fn test_delete_needs_admin() {
        assert!(can_delete_group(&group("bob", GroupRole::Admin)).is_ok());
        assert_eq!(
            can_delete_group(&group("bob", GroupRole::User)),
            Err(PolicyDenied { reason: DenyReason::NotAdmin })
        );
    }

    #[test]
    fn test_owner_cannot_leave_their_own_group() {
        assert_eq!(
            can_leave_group(&actor(), &group("ana", GroupRole::Admin)),
            Err(PolicyDenied { reason: DenyReason::OwnerProtected })
        );
        assert!(can_leave_group(&actor(), &group("bob", GroupRole::User)).is_ok());
    }
}
