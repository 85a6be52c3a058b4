//! CLI command implementations.

pub mod add_group;
pub mod add_user;
pub mod inspect;
pub mod run;
pub mod schedule;
