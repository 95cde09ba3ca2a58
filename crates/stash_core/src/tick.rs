//! Background tick engine.
//!
//! Every `tick_interval_quanta` the engine walks the containers carried by
//! online actors and advances their ticking modules by one step. Records are
//! loaded through the cache and never created here.

use std::collections::HashSet;

use crate::catalog::ItemCatalog;
use crate::codec::encode_item;
use crate::engine::{apply_cue, cached, persist, EventLog, StashEngine};
use crate::host::{give_or_drop, Host, LooseItem};
use crate::inventory::{insert_into, room_for, take_one};
use crate::modules::feeding::select_candidate;
use crate::modules::magnet::collectable;
use crate::modules::{self, DiscardState, ModuleState};
use crate::store::RecordStore;
use crate::{
    ActorId, ContainerId, ContainerRecord, Content, EngineEvent, ItemStack, Location, ModuleId,
    ModuleKind, NewVoidEntry, Owner, PersistReason, Result, SocketIndex,
};

/// The container's enabled discard module, if it has one.
fn active_discard(record: &ContainerRecord, content: &Content) -> Option<(SocketIndex, DiscardState)> {
    record.sockets.iter().find_map(|(&index, module)| {
        let def = content
            .installed_def(module)
            .filter(|d| d.enabled && d.kind == ModuleKind::Discard)?;
        if !module.is_enabled() {
            return None;
        }
        match modules::load_state(module, def.kind) {
            ModuleState::Discard(state) => Some((index, state)),
            _ => None,
        }
    })
}

/// Append `item` to the void audit log. On failure the item is dropped at the
/// actor's feet instead of being lost.
#[allow(clippy::too_many_arguments)]
fn void_item(
    store: &mut dyn RecordStore,
    host: &mut dyn Host,
    log: &mut EventLog,
    quantum: u64,
    record: &ContainerRecord,
    module: ModuleId,
    actor: ActorId,
    item: ItemStack,
    location: Option<Location>,
) -> Result<i64> {
    let entry = NewVoidEntry {
        actor: Some(Owner {
            id: actor,
            name: host.actor_name(actor).unwrap_or_default(),
        }),
        container_id: record.id,
        container_type: record.type_id.clone(),
        module_id: module,
        item_kind: item.kind.clone(),
        amount: item.amount,
        payload: encode_item(&item),
        location,
    };
    match store.append_void_entry(&entry) {
        Ok(audit_id) => {
            tracing::info!(actor = %actor, container = %record.id, kind = %item.kind, amount = item.amount, audit_id, "item voided");
            log.emit(
                quantum,
                EngineEvent::ItemVoided {
                    container: record.id,
                    module,
                    audit_id,
                    kind: item.kind,
                    amount: item.amount,
                },
            );
            Ok(audit_id)
        }
        Err(err) => {
            tracing::error!(actor = %actor, container = %record.id, kind = %item.kind, %err, "void audit append failed, dropping item");
            host.drop_near(actor, item);
            Err(err)
        }
    }
}

/// Move as much of a loose item as fits into `contents`. Returns the units taken.
fn absorb_loose(
    host: &mut dyn Host,
    actor: ActorId,
    contents: &mut [Option<ItemStack>],
    loose: LooseItem,
    catalog: &ItemCatalog,
) -> u32 {
    let max = catalog.max_stack(&loose.stack.kind);
    let room = room_for(contents, &loose.stack, max).min(loose.stack.amount);
    if room == 0 || !host.take_loose_item(loose.entity, room) {
        return 0;
    }
    if let Some(leftover) = insert_into(contents, loose.stack.with_amount(room), max, |_| true) {
        give_or_drop(host, actor, leftover);
    }
    room
}

fn carried_containers(host: &dyn Host, actor: ActorId) -> Vec<ContainerId> {
    let mut ids: Vec<ContainerId> = host
        .carried_items(actor)
        .iter()
        .filter_map(ItemStack::container_id)
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

impl StashEngine {
    pub(crate) fn background_pass(
        &mut self,
        store: &mut dyn RecordStore,
        host: &mut dyn Host,
    ) -> Result<()> {
        let d = self.content.constants.tick_interval_quanta.max(1);
        let mut actors = host.online_actors();
        actors.sort();

        let mut visited = HashSet::new();
        let mut touched = Vec::new();
        for actor in actors {
            for container in carried_containers(host, actor) {
                if !visited.insert(container) {
                    continue;
                }
                if cached(&mut self.records, store, container)?.is_none() {
                    tracing::debug!(actor = %actor, container = %container, "carried container has no record yet");
                    continue;
                }
                touched.push(container);
                self.tick_container(store, host, actor, container, d)?;
            }
        }
        for container in touched {
            self.evict_if_unused(container);
        }
        Ok(())
    }

    fn tick_container(
        &mut self,
        store: &mut dyn RecordStore,
        host: &mut dyn Host,
        actor: ActorId,
        container: ContainerId,
        d: u64,
    ) -> Result<()> {
        let Some(record) = self.records.get(&container) else {
            return Ok(());
        };
        let open = self.sessions.has_main_view(container);
        let due: Vec<(SocketIndex, ModuleKind)> = record
            .sockets
            .iter()
            .filter_map(|(&index, module)| {
                let def = self.content.installed_def(module)?;
                let runs = def.enabled
                    && def.kind.ticks()
                    && module.is_enabled()
                    && !self.sessions.module_screen_open(module.module_id)
                    && !(open && def.kind.mutation_sensitive());
                runs.then_some((index, def.kind))
            })
            .collect();

        let mut changed = false;
        for (index, kind) in due {
            changed |= match kind {
                ModuleKind::Cooking => self.tick_cooking(container, index, d),
                ModuleKind::Feeding => self.tick_feeding(host, actor, container, index),
                ModuleKind::Magnet => self.tick_magnet(store, host, actor, container, index),
                ModuleKind::Playback => self.tick_playback(host, actor, container, index, d),
                ModuleKind::Tank | ModuleKind::Discard => false,
            };
        }

        if changed {
            if let Some(record) = self.records.get_mut(&container) {
                persist(
                    store,
                    record,
                    &self.content,
                    PersistReason::Background,
                    self.quantum,
                    &mut self.log,
                )?;
            }
        }
        Ok(())
    }

    fn tick_cooking(&mut self, container: ContainerId, index: SocketIndex, d: u64) -> bool {
        let catalog = &self.content.items;
        let Some(module) = self
            .records
            .get_mut(&container)
            .and_then(|r| r.sockets.get_mut(&index))
        else {
            return false;
        };
        let ModuleState::Cooking(mut cooking) = modules::load_state(module, ModuleKind::Cooking)
        else {
            return false;
        };
        let before = cooking.clone();
        let crafts = cooking.step(u32::try_from(d).unwrap_or(u32::MAX), catalog);
        if cooking == before {
            return false;
        }
        modules::store_state(module, &ModuleState::Cooking(cooking));
        if crafts > 0 {
            tracing::debug!(container = %container, module = %module.module_id, crafts, "crafts completed");
            self.log.emit(
                self.quantum,
                EngineEvent::CraftCompleted {
                    container,
                    module: module.module_id,
                    crafts,
                },
            );
        }
        true
    }

    fn tick_feeding(
        &mut self,
        host: &mut dyn Host,
        actor: ActorId,
        container: ContainerId,
        index: SocketIndex,
    ) -> bool {
        let now = self.quantum;
        let policy = &self.content.constants.feeding;
        let catalog = &self.content.items;
        if self.feeding_cooldowns.get(&actor).is_some_and(|&t| now < t) {
            return false;
        }
        let current = host.satiation(actor);
        if current >= policy.floor {
            return false;
        }
        let Some(record) = self.records.get_mut(&container) else {
            return false;
        };
        let Some(ModuleState::Feeding(mut feeding)) = record
            .sockets
            .get(&index)
            .map(|m| modules::load_state(m, ModuleKind::Feeding))
        else {
            return false;
        };
        let Some(slot) =
            select_candidate(&record.contents, catalog, policy, &feeding.filter, current)
        else {
            return false;
        };
        let Some(eaten) = take_one(&mut record.contents[slot]) else {
            return false;
        };
        let Some(food) = catalog.food(&eaten.kind) else {
            return false;
        };
        host.feed(actor, food);

        if let Some(remainder) = catalog.craft_remainder(&eaten.kind) {
            let remainder = ItemStack::new(remainder.clone(), 1);
            let accepted = self
                .content
                .container_def(&record.type_id)
                .is_some_and(|def| def.accepts(&remainder));
            let leftover = if accepted {
                let max = catalog.max_stack(&remainder.kind);
                insert_into(&mut record.contents, remainder, max, |_| true)
            } else {
                Some(remainder)
            };
            if let Some(leftover) = leftover {
                give_or_drop(host, actor, leftover);
            }
        }

        feeding.fed_total += 1;
        let Some(module) = record.sockets.get_mut(&index) else {
            return true;
        };
        modules::store_state(module, &ModuleState::Feeding(feeding));
        self.feeding_cooldowns
            .insert(actor, now + policy.cooldown_quanta);

        tracing::info!(actor = %actor, container = %container, kind = %eaten.kind, satiation = current, "actor auto-fed");
        self.log.emit(
            now,
            EngineEvent::AutoFed {
                actor,
                container,
                kind: eaten.kind,
            },
        );
        true
    }

    /// Pull nearby loose items into storage, or into the void log when the
    /// container's discard module lists their kind.
    fn tick_magnet(
        &mut self,
        store: &mut dyn RecordStore,
        host: &mut dyn Host,
        actor: ActorId,
        container: ContainerId,
        index: SocketIndex,
    ) -> bool {
        let constants = &self.content.constants;
        let catalog = &self.content.items;
        let Some(record) = self.records.get_mut(&container) else {
            return false;
        };
        let Some(def) = self.content.container_def(&record.type_id) else {
            return false;
        };
        let mut discard = active_discard(record, &self.content);
        let nearby = host.nearby_items(actor, constants.magnet_radius);

        let mut budget = constants.magnet_per_step_cap;
        let mut collected = 0_u32;
        let mut voided = false;
        for loose in nearby {
            if budget == 0 {
                break;
            }
            if !collectable(&loose.stack) {
                continue;
            }

            if let Some((discard_index, state)) = discard
                .as_mut()
                .filter(|(_, state)| state.intercepts(&loose.stack.kind))
            {
                let Some(discard_id) = record.sockets.get(&*discard_index).map(|m| m.module_id) else {
                    continue;
                };
                if !host.take_loose_item(loose.entity, loose.stack.amount) {
                    continue;
                }
                budget -= 1;
                match void_item(
                    store,
                    host,
                    &mut self.log,
                    self.quantum,
                    record,
                    discard_id,
                    actor,
                    loose.stack,
                    Some(loose.location),
                ) {
                    Ok(_) => {
                        state.voided_total += 1;
                        voided = true;
                    }
                    // The item is back in the world; stop pulling until the store recovers.
                    Err(_) => break,
                }
                continue;
            }

            if !def.accepts(&loose.stack) {
                continue;
            }
            let absorbed = absorb_loose(host, actor, &mut record.contents, loose, catalog);
            if absorbed > 0 {
                budget -= 1;
                collected += absorbed;
            }
        }

        if voided {
            if let Some((discard_index, state)) = discard {
                if let Some(module) = record.sockets.get_mut(&discard_index) {
                    modules::store_state(module, &ModuleState::Discard(state));
                }
            }
        }
        if collected > 0 {
            if let Some(module) = record.sockets.get_mut(&index) {
                if let ModuleState::Magnet(mut magnet) =
                    modules::load_state(module, ModuleKind::Magnet)
                {
                    magnet.collected_total += u64::from(collected);
                    modules::store_state(module, &ModuleState::Magnet(magnet));
                }
            }
            tracing::debug!(actor = %actor, container = %container, collected, "loose items collected");
            self.log.emit(
                self.quantum,
                EngineEvent::ItemsCollected {
                    container,
                    amount: collected,
                },
            );
        }
        voided || collected > 0
    }

    fn tick_playback(
        &mut self,
        host: &mut dyn Host,
        actor: ActorId,
        container: ContainerId,
        index: SocketIndex,
        d: u64,
    ) -> bool {
        let catalog = &self.content.items;
        let Some(module) = self
            .records
            .get_mut(&container)
            .and_then(|r| r.sockets.get_mut(&index))
        else {
            return false;
        };
        let ModuleState::Playback(mut playback) = modules::load_state(module, ModuleKind::Playback)
        else {
            return false;
        };
        if !playback.playing {
            return false;
        }
        let change = playback.step(d, catalog, &mut self.rng);
        modules::store_state(module, &ModuleState::Playback(playback));
        apply_cue(
            host,
            &mut self.log,
            self.quantum,
            self.content.constants.playback_cue_radius,
            actor,
            module.module_id,
            change,
        );
        true
    }

    /// Offer an item the actor is picking up to the discard modules of the
    /// containers they carry. Returns true when the item was voided and must
    /// not be given to the actor. Containers with an open grid are skipped.
    ///
    /// On a store failure the item has already been dropped back at the actor's feet.
    pub fn intercept_pickup(
        &mut self,
        store: &mut dyn RecordStore,
        host: &mut dyn Host,
        actor: ActorId,
        item: &ItemStack,
        location: Option<Location>,
    ) -> Result<bool> {
        if !collectable(item) {
            return Ok(false);
        }
        for container in carried_containers(host, actor) {
            if self.sessions.has_main_view(container) {
                continue;
            }
            let Some(record) = cached(&mut self.records, store, container)? else {
                continue;
            };
            let Some((index, mut state)) = active_discard(record, &self.content)
                .filter(|(_, state)| state.intercepts(&item.kind))
            else {
                self.evict_if_unused(container);
                continue;
            };
            let Some(module_id) = record.sockets.get(&index).map(|m| m.module_id) else {
                continue;
            };

            void_item(
                store,
                host,
                &mut self.log,
                self.quantum,
                record,
                module_id,
                actor,
                item.clone(),
                location,
            )?;
            state.voided_total += 1;
            if let Some(module) = record.sockets.get_mut(&index) {
                modules::store_state(module, &ModuleState::Discard(state));
            }
            persist(
                store,
                record,
                &self.content,
                PersistReason::Background,
                self.quantum,
                &mut self.log,
            )?;
            self.evict_if_unused(container);
            return Ok(true);
        }
        Ok(false)
    }
}
