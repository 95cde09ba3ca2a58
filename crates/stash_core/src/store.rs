use crate::{ActorId, ContainerId, ContainerRecord, NewVoidEntry, Result, VoidEntry};

/// Backing Record Store. Calls are synchronous and run on the scheduling loop.
///
/// Implementations stamp `created_at_ms`/`updated_at_ms` on the record they
/// are handed, and map their own failures into `StashError::Store`.
pub trait RecordStore {
    fn load(&mut self, id: ContainerId) -> Result<Option<ContainerRecord>>;

    fn insert(&mut self, record: &mut ContainerRecord) -> Result<()>;

    /// Replace the container row and its socket rows.
    fn save(&mut self, record: &mut ContainerRecord) -> Result<()>;

    /// Append an audit row; returns its id.
    fn append_void_entry(&mut self, entry: &NewVoidEntry) -> Result<i64>;

    fn void_entry(&mut self, id: i64) -> Result<Option<VoidEntry>>;

    /// Newest first. `actor` filters by the actor the item was voided from.
    fn void_entries(
        &mut self,
        actor: Option<ActorId>,
        include_recovered: bool,
    ) -> Result<Vec<VoidEntry>>;

    /// Set the recovery fields. Returns false if the row was already recovered.
    fn mark_recovered(&mut self, id: i64, recovered_by: &str) -> Result<bool>;
}
