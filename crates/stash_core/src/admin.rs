//! Operator-facing operations: void audit listing and recovery, container
//! item recreation and icon refresh.

use crate::codec::decode_item;
use crate::host::{give_or_drop, Host};
use crate::store::RecordStore;
use crate::{
    tags, ActorId, ContainerId, ContainerTypeDef, Content, ItemStack, Result, StashError, TagValue,
    VoidEntry,
};

/// The physical item standing for container `id`.
pub fn container_item(def: &ContainerTypeDef, id: ContainerId) -> ItemStack {
    ItemStack::new(def.display_material.clone(), 1)
        .with_name(def.name.clone())
        .with_tag(tags::CONTAINER_ID, TagValue::Text(id.to_string()))
        .with_tag(tags::CONTAINER_TYPE, TagValue::Text(def.id.clone()))
}

pub fn parse_container_id(raw: &str) -> Result<ContainerId> {
    ContainerId::parse(raw)
}

pub fn list_void_entries(
    store: &mut dyn RecordStore,
    actor: Option<ActorId>,
    include_recovered: bool,
) -> Result<Vec<VoidEntry>> {
    store.void_entries(actor, include_recovered)
}

/// Hand a voided item back to `target`, overflowing into the world.
///
/// The row is marked recovered before the item is handed over, so a row is
/// never recovered twice.
pub fn recover_void_entry(
    store: &mut dyn RecordStore,
    host: &mut dyn Host,
    id: i64,
    target: ActorId,
    recovered_by: &str,
) -> Result<ItemStack> {
    let entry = store
        .void_entry(id)?
        .ok_or(StashError::AuditEntryNotFound(id))?;
    if entry.is_recovered() {
        return Err(StashError::AlreadyRecovered(id));
    }
    if !host.is_online(target) {
        return Err(StashError::ActorOffline(target.to_string()));
    }
    let item = decode_item(&entry.payload).ok_or(StashError::CorruptPayload(id))?;
    if !store.mark_recovered(id, recovered_by)? {
        return Err(StashError::AlreadyRecovered(id));
    }
    let handover = give_or_drop(host, target, item.clone());
    tracing::info!(
        audit_id = id,
        actor = %target,
        recovered_by,
        kind = %item.kind,
        given = handover.given,
        dropped = handover.dropped,
        "void entry recovered"
    );
    Ok(item)
}

/// A fresh item for a persisted container, e.g. after the original was lost.
pub fn recreate_container_item(
    store: &mut dyn RecordStore,
    content: &Content,
    id: ContainerId,
) -> Result<ItemStack> {
    let record = store.load(id)?.ok_or(StashError::UnknownContainer(id))?;
    let def = content
        .container_def(&record.type_id)
        .ok_or_else(|| StashError::UnknownContainerType(record.type_id.clone()))?;
    tracing::info!(container = %id, type_id = %def.id, "container item recreated");
    Ok(container_item(def, id))
}

/// Re-skin a container item from its current type definition. Returns true if it changed.
pub fn refresh_container_icon(content: &Content, item: &mut ItemStack) -> Result<bool> {
    let (Some(id), Some(type_id)) = (item.container_id(), item.container_type()) else {
        return Err(StashError::InvalidIdentifier(item.kind.clone()));
    };
    let def = content
        .container_def(type_id)
        .ok_or_else(|| StashError::UnknownContainerType(type_id.to_string()))?;
    let mut fresh = container_item(def, id);
    fresh.amount = item.amount;
    if fresh == *item {
        return Ok(false);
    }
    *item = fresh;
    Ok(true)
}
