//! `stash_core`: virtual paginated item containers with upgrade modules.
//!
//! No IO. The host supplies a `RecordStore` and a `Host` on every call and
//! drives time by calling `StashEngine::advance` once per scheduling quantum.

pub mod admin;
mod burst;
pub mod catalog;
mod codec;
mod controller;
mod engine;
mod error;
mod host;
mod id;
pub mod inventory;
pub mod layout;
pub mod modules;
mod render;
mod scheduler;
mod session;
pub mod sort;
mod store;
mod tick;
mod types;

pub use catalog::{CookRecipe, FluidFill, FoodProps, ItemCatalog, ItemDef, TrackInfo};
pub use codec::{decode_contents, decode_item, encode_contents, encode_item};
pub use controller::{Click, Intent, Outcome};
pub use engine::StashEngine;
pub use error::{Result, StashError};
pub use host::{give_or_drop, Handover, Host, LooseItem};
pub use id::{generate_uuid, new_container_id, new_module_id};
pub use session::{ScreenSession, Session};
pub use store::RecordStore;
pub use types::*;

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

#[cfg(test)]
mod tests;
