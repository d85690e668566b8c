pub mod actor;
pub mod group;
pub mod item;
pub mod member;
pub mod record;
pub mod validate;
