use serde::{Deserialize, Serialize};

/// The signed-in user as policy checks see them. Username is the canonical
/// identity; display names are free-form and never compared.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub username: String,
    pub display_name: String,
}
