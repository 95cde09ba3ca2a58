//! The engine: record cache, open sessions, timers and the per-quantum driver.
//!
//! Everything runs on the host's single scheduling loop. The host calls
//! `advance` once per quantum and forwards open/click/close intents as they
//! arrive; the engine never blocks except on synchronous store calls.

use std::collections::HashMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::admin;
use crate::burst::BurstGuard;
use crate::host::{give_or_drop, Host};
use crate::id::new_container_id;
use crate::layout::layout;
use crate::modules::{self, CueChange, ModuleState};
use crate::render::{commit_visible, render};
use crate::scheduler::SaveScheduler;
use crate::session::{Session, SessionRegistry};
use crate::sort::SortMode;
use crate::store::RecordStore;
use crate::{
    ActorId, ContainerId, ContainerRecord, Content, EngineEvent, EventEnvelope, ItemStack,
    ModuleId, ModuleKind, Owner, PersistReason, Result, StashError,
};

/// Sequenced event buffer drained by the host.
#[derive(Debug, Default)]
pub(crate) struct EventLog {
    events: Vec<EventEnvelope>,
    next_seq: u64,
}

impl EventLog {
    pub(crate) fn emit(&mut self, quantum: u64, event: EngineEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(EventEnvelope {
            seq,
            quantum,
            event,
        });
    }

    fn drain(&mut self) -> Vec<EventEnvelope> {
        std::mem::take(&mut self.events)
    }
}

pub struct StashEngine {
    pub(crate) content: Content,
    pub(crate) quantum: u64,
    pub(crate) records: HashMap<ContainerId, ContainerRecord>,
    pub(crate) sessions: SessionRegistry,
    pub(crate) bursts: BurstGuard,
    pub(crate) saves: SaveScheduler,
    /// Earliest quantum at which each actor may be auto-fed again.
    pub(crate) feeding_cooldowns: HashMap<ActorId, u64>,
    pub(crate) next_background_at: u64,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) log: EventLog,
}

/// Return the cached record, loading it from the store on a miss. Never creates.
pub(crate) fn cached<'a>(
    records: &'a mut HashMap<ContainerId, ContainerRecord>,
    store: &mut dyn RecordStore,
    id: ContainerId,
) -> Result<Option<&'a mut ContainerRecord>> {
    if !records.contains_key(&id) {
        match store.load(id)? {
            Some(record) => {
                records.insert(id, record);
            }
            None => return Ok(None),
        }
    }
    Ok(records.get_mut(&id))
}

/// Clamp every tank's state to its pool invariant.
fn clamp_tanks(record: &mut ContainerRecord, content: &Content) {
    for module in record.sockets.values_mut() {
        let Some(def) = content.installed_def(module) else {
            continue;
        };
        if def.kind != ModuleKind::Tank || module.state.is_none() {
            continue;
        }
        if let ModuleState::Tank(mut tank) = modules::load_state(module, ModuleKind::Tank) {
            tank.clamp(def.capacity);
            modules::store_state(module, &ModuleState::Tank(tank));
        }
    }
}

/// Normalize and write the record through the store.
pub(crate) fn persist(
    store: &mut dyn RecordStore,
    record: &mut ContainerRecord,
    content: &Content,
    reason: PersistReason,
    quantum: u64,
    log: &mut EventLog,
) -> Result<()> {
    if let Some(def) = content.container_def(&record.type_id) {
        if record.normalize(def.canonical_size()) {
            tracing::debug!(container = %record.id, size = def.canonical_size(), "logical contents resized");
        }
    }
    clamp_tanks(record, content);
    if let Err(err) = store.save(record) {
        tracing::error!(container = %record.id, ?reason, %err, "container save failed");
        return Err(err);
    }
    tracing::info!(container = %record.id, ?reason, "container persisted");
    log.emit(
        quantum,
        EngineEvent::Persisted {
            container: record.id,
            reason,
        },
    );
    Ok(())
}

/// Forward a playback transition to the host's cue player.
pub(crate) fn apply_cue(
    host: &mut dyn Host,
    log: &mut EventLog,
    quantum: u64,
    radius: f64,
    actor: ActorId,
    module: ModuleId,
    change: CueChange,
) {
    match change {
        CueChange::None => {}
        CueChange::Started(sound) => {
            host.start_cue(actor, &sound, radius);
            log.emit(quantum, EngineEvent::TrackStarted { actor, module, sound });
        }
        CueChange::Stopped(sound) => {
            host.stop_cue(actor, &sound);
            log.emit(quantum, EngineEvent::TrackStopped { actor, module, sound });
        }
        CueChange::Switched { from, to } => {
            host.stop_cue(actor, &from);
            log.emit(quantum, EngineEvent::TrackStopped { actor, module, sound: from });
            host.start_cue(actor, &to, radius);
            log.emit(quantum, EngineEvent::TrackStarted { actor, module, sound: to });
        }
    }
}

impl StashEngine {
    pub fn new(content: Content, seed: u64) -> Self {
        let next_background_at = content.constants.tick_interval_quanta.max(1);
        Self {
            content,
            quantum: 0,
            records: HashMap::new(),
            sessions: SessionRegistry::default(),
            bursts: BurstGuard::default(),
            saves: SaveScheduler::default(),
            feeding_cooldowns: HashMap::new(),
            next_background_at,
            rng: ChaCha8Rng::seed_from_u64(seed),
            log: EventLog::default(),
        }
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn quantum(&self) -> u64 {
        self.quantum
    }

    pub fn drain_events(&mut self) -> Vec<EventEnvelope> {
        self.log.drain()
    }

    pub fn session(&self, actor: ActorId) -> Option<&Session> {
        self.sessions.get(actor)
    }

    pub fn sub_screen(&self, actor: ActorId) -> Option<&crate::session::ScreenSession> {
        self.sessions.screen(actor)
    }

    /// The cached copy of a record, if one is loaded.
    pub fn record(&self, id: ContainerId) -> Option<&ContainerRecord> {
        self.records.get(&id)
    }

    pub fn pending_save(&self, actor: ActorId, container: ContainerId) -> Option<u64> {
        self.saves.pending(actor, container)
    }

    pub fn is_burst_blocked(&self, actor: ActorId) -> bool {
        self.bursts.is_blocked(actor, self.quantum)
    }

    pub(crate) fn evict_if_unused(&mut self, container: ContainerId) {
        if !self.sessions.references(container) {
            self.records.remove(&container);
        }
    }

    pub(crate) fn show(&self, host: &mut dyn Host, actor: ActorId) {
        if let Some(session) = self.sessions.get(actor) {
            host.show_view(actor, &session.title, &session.visible);
        }
    }

    /// Mint a new container of `type_id` and return its physical item.
    pub fn create_container(
        &mut self,
        store: &mut dyn RecordStore,
        type_id: &str,
        owner: Option<Owner>,
    ) -> Result<ItemStack> {
        let def = self
            .content
            .container_def(type_id)
            .ok_or_else(|| StashError::UnknownContainerType(type_id.to_string()))?;
        let id = new_container_id(&mut self.rng);
        let mut record = ContainerRecord::new(id, type_id, def.canonical_size());
        record.owner = owner;
        store.insert(&mut record)?;
        tracing::info!(container = %id, type_id, "container created");
        Ok(admin::container_item(def, id))
    }

    /// Open the main grid view of the container `item` stands for.
    ///
    /// Returns false when the item is not a usable container, the actor is
    /// busy in a module sub-screen, or another actor already has the grid open.
    /// A container without a record is created.
    pub fn open(
        &mut self,
        store: &mut dyn RecordStore,
        host: &mut dyn Host,
        actor: ActorId,
        item: &ItemStack,
    ) -> Result<bool> {
        let (Some(id), Some(type_id)) = (item.container_id(), item.container_type()) else {
            tracing::warn!(actor = %actor, kind = %item.kind, "open refused: item is not a container");
            return Ok(false);
        };
        let type_id = type_id.to_string();
        let def = self
            .content
            .container_def(&type_id)
            .cloned()
            .ok_or_else(|| StashError::UnknownContainerType(type_id.clone()))?;
        if !def.enabled {
            tracing::debug!(actor = %actor, type_id, "open refused: container type disabled");
            return Ok(false);
        }
        if self.sessions.screen(actor).is_some() {
            tracing::warn!(actor = %actor, "open refused: module screen still open");
            return Ok(false);
        }
        if self.sessions.get(actor).is_some() {
            self.close(store, host, actor)?;
        }

        if self.sessions.has_main_view(id) {
            tracing::debug!(actor = %actor, container = %id, "open refused: container already open elsewhere");
            return Ok(false);
        }

        let owner = Owner {
            id: actor,
            name: host.actor_name(actor).unwrap_or_default(),
        };
        let record = match cached(&mut self.records, store, id)? {
            Some(record) => record,
            None => {
                let mut record = ContainerRecord::new(id, type_id.clone(), def.canonical_size());
                record.owner = Some(owner.clone());
                store.insert(&mut record)?;
                tracing::info!(container = %id, type_id, "container record created on first open");
                self.records.entry(id).or_insert(record)
            }
        };
        if record.type_id != type_id {
            tracing::info!(container = %id, from = %record.type_id, to = %type_id, "container type changed");
            record.type_id.clone_from(&type_id);
        }
        if record.owner.is_none() {
            record.owner = Some(owner);
        }

        let paginated = def.paginated();
        let mut session = Session {
            actor,
            container: id,
            type_id,
            title: String::new(),
            layout: layout(def.display_size(), true, def.upgrade_sockets as usize, paginated),
            paginated,
            page: 0,
            sort_mode: SortMode::default(),
            visible: Vec::new(),
            valid_slots: 0,
            last_storage_edit: None,
        };
        render(&mut session, record, &def, &self.content);
        host.show_view(actor, &session.title, &session.visible);
        self.sessions.insert(session);

        tracing::debug!(actor = %actor, container = %id, "session opened");
        self.log.emit(
            self.quantum,
            EngineEvent::SessionOpened {
                actor,
                container: id,
            },
        );
        Ok(true)
    }

    /// Close the actor's main view: cancel the pending save and persist now.
    pub fn close(
        &mut self,
        store: &mut dyn RecordStore,
        host: &mut dyn Host,
        actor: ActorId,
    ) -> Result<()> {
        let Some(session) = self.sessions.remove(actor) else {
            return Ok(());
        };
        let container = session.container;
        self.saves.cancel(actor, container);

        if let Some(held) = host.cursor(actor) {
            host.set_cursor(actor, None);
            give_or_drop(host, actor, held);
        }

        if let Some(record) = self.records.get_mut(&container) {
            commit_visible(&session, record);
            persist(
                store,
                record,
                &self.content,
                PersistReason::Close,
                self.quantum,
                &mut self.log,
            )?;
        }
        tracing::debug!(actor = %actor, container = %container, "session closed");
        self.log
            .emit(self.quantum, EngineEvent::SessionClosed { actor, container });
        self.evict_if_unused(container);
        Ok(())
    }

    /// Purge everything held for an actor that left. The main view is flushed
    /// and an open module screen is routed back as if the actor closed it.
    pub fn disconnect(
        &mut self,
        store: &mut dyn RecordStore,
        host: &mut dyn Host,
        actor: ActorId,
    ) -> Result<()> {
        let closed = self.close(store, host, actor);
        let routed = match (self.sessions.screen(actor).copied(), host.sub_screen_slots(actor)) {
            (None, _) => Ok(()),
            (Some(_), Some(slots)) => self.close_sub_screen(store, host, actor, slots),
            (Some(screen), None) => {
                // Nothing to route: the module keeps the state it had when the screen opened.
                tracing::warn!(actor = %actor, module = %screen.module, "module screen slots unavailable on disconnect");
                self.sessions.close_screen(actor);
                self.evict_if_unused(screen.container);
                Ok(())
            }
        };
        if let Some(held) = host.cursor(actor) {
            host.set_cursor(actor, None);
            give_or_drop(host, actor, held);
        }
        self.bursts.forget(actor);
        self.saves.cancel_actor(actor);
        self.feeding_cooldowns.remove(&actor);
        tracing::debug!(actor = %actor, "actor disconnected");
        closed.and(routed)
    }

    /// Run one scheduling quantum: fire due saves, then the background pass if it is due.
    pub fn advance(&mut self, store: &mut dyn RecordStore, host: &mut dyn Host) -> Result<()> {
        self.fire_due_saves(store, host)?;
        if self.quantum >= self.next_background_at {
            self.next_background_at =
                self.quantum + self.content.constants.tick_interval_quanta.max(1);
            self.background_pass(store, host)?;
        }
        self.quantum += 1;
        Ok(())
    }

    fn fire_due_saves(&mut self, store: &mut dyn RecordStore, host: &mut dyn Host) -> Result<()> {
        let now = self.quantum;
        let constants = &self.content.constants;
        for (actor, container) in self.saves.take_due(now) {
            let Some(session) = self.sessions.get(actor).filter(|s| s.container == container)
            else {
                continue;
            };
            let quiet = session
                .last_storage_edit
                .is_none_or(|t| now.saturating_sub(t) >= constants.quiet_window_quanta);
            let safe = quiet && !self.bursts.is_blocked(actor, now) && host.cursor(actor).is_none();
            if !safe {
                tracing::debug!(actor = %actor, container = %container, "save deferred: state not settled");
                self.saves
                    .arm(actor, container, now + constants.debounce_quanta.max(1));
                self.log
                    .emit(now, EngineEvent::SaveDeferred { actor, container });
                continue;
            }
            if let Some(record) = self.records.get_mut(&container) {
                commit_visible(session, record);
                persist(
                    store,
                    record,
                    &self.content,
                    PersistReason::Debounced,
                    now,
                    &mut self.log,
                )?;
            }
        }
        Ok(())
    }

    /// Hand a voided item back to an online actor and mark the audit row recovered.
    pub fn recover_void_entry(
        &mut self,
        store: &mut dyn RecordStore,
        host: &mut dyn Host,
        audit_id: i64,
        target: ActorId,
        recovered_by: &str,
    ) -> Result<ItemStack> {
        let item = admin::recover_void_entry(store, host, audit_id, target, recovered_by)?;
        self.log.emit(
            self.quantum,
            EngineEvent::VoidEntryRecovered {
                audit_id,
                actor: target,
            },
        );
        Ok(item)
    }
}
