//! Upgrade socket operations: install, remove, toggle, mode cycling and the
//! module-specific primary/secondary interactions.

use super::{Click, Outcome};
use crate::codec::encode_item;
use crate::engine::{apply_cue, persist, StashEngine};
use crate::host::{give_or_drop, Host};
use crate::modules::{self, decode_state, encode_state, CueChange, ModuleState};
use crate::render::{commit_visible, render};
use crate::store::RecordStore;
use crate::{
    tags, ActorId, ContainerId, EngineEvent, InstalledModule, ItemStack, ModuleKind,
    ModuleTypeDef, PersistReason, Result, SocketIndex, TagValue,
};

/// Hand one unit of `held` over for `replacement`, keeping the rest on the cursor.
fn swap_one(host: &mut dyn Host, actor: ActorId, held: ItemStack, replacement: ItemStack) {
    if held.amount <= 1 {
        host.set_cursor(actor, Some(replacement));
    } else {
        let rest = held.amount - 1;
        host.set_cursor(actor, Some(held.with_amount(rest)));
        give_or_drop(host, actor, replacement);
    }
}

impl StashEngine {
    fn module_def_at(&self, container: ContainerId, index: SocketIndex) -> Option<ModuleTypeDef> {
        let module = self.records.get(&container)?.sockets.get(&index)?;
        self.content.installed_def(module).cloned()
    }

    fn module_at(&mut self, container: ContainerId, index: SocketIndex) -> Option<&mut InstalledModule> {
        self.records.get_mut(&container)?.sockets.get_mut(&index)
    }

    pub(super) fn socket_click(
        &mut self,
        store: &mut dyn RecordStore,
        host: &mut dyn Host,
        actor: ActorId,
        socket: usize,
        click: Click,
    ) -> Result<Outcome> {
        let Ok(index) = SocketIndex::try_from(socket) else {
            return Ok(Outcome::Rejected);
        };
        let Some(container) = self.sessions.get(actor).map(|s| s.container) else {
            return Ok(Outcome::Rejected);
        };
        let Some(record) = self.records.get(&container) else {
            return Ok(Outcome::Rejected);
        };
        let occupied = record.sockets.contains_key(&index);

        let outcome = match (click, occupied) {
            (Click::Primary, false) => self.install(host, actor, container, index),
            (_, false) => Outcome::Rejected,
            (Click::Primary, true) => self.module_primary(host, actor, container, index),
            (Click::Secondary, true) => {
                return self.module_secondary(store, host, actor, container, index);
            }
            (Click::ShiftPrimary, true) => self.remove_module(host, actor, container, index),
            (Click::ShiftSecondary, true) => self.toggle_module(host, actor, container, index),
            (Click::Drop, true) => self.cycle_module_mode(container, index),
        };
        if outcome == Outcome::Applied {
            self.flush_socket_change(store, host, actor)?;
        }
        Ok(outcome)
    }

    /// Sockets hold physical items, so every socket change is written through at once.
    fn flush_socket_change(
        &mut self,
        store: &mut dyn RecordStore,
        host: &mut dyn Host,
        actor: ActorId,
    ) -> Result<()> {
        let Some(session) = self.sessions.get_mut(actor) else {
            return Ok(());
        };
        let (Some(record), Some(def)) = (
            self.records.get_mut(&session.container),
            self.content.container_def(&session.type_id),
        ) else {
            return Ok(());
        };
        commit_visible(session, record);
        self.saves.cancel(actor, session.container);
        persist(
            store,
            record,
            &self.content,
            PersistReason::SocketChange,
            self.quantum,
            &mut self.log,
        )?;
        render(session, record, def, &self.content);
        host.show_view(actor, &session.title, &session.visible);
        Ok(())
    }

    fn install(
        &mut self,
        host: &mut dyn Host,
        actor: ActorId,
        container: ContainerId,
        index: SocketIndex,
    ) -> Outcome {
        let Some(held) = host.cursor(actor) else {
            return Outcome::Rejected;
        };
        let (Some(module_id), Some(type_id)) = (held.module_id(), held.module_type()) else {
            tracing::debug!(actor = %actor, kind = %held.kind, "install refused: cursor item is not a module");
            return Outcome::Rejected;
        };
        if held.amount != 1 {
            tracing::debug!(actor = %actor, module = %module_id, amount = held.amount, "install refused: module item is stacked");
            return Outcome::Rejected;
        }
        let type_id = type_id.to_string();
        let Some(def) = self.content.module_def(&type_id).filter(|d| d.enabled) else {
            tracing::warn!(actor = %actor, type_id, "install refused: unknown or disabled module type");
            return Outcome::Rejected;
        };
        let Some(record) = self.records.get_mut(&container) else {
            return Outcome::Rejected;
        };
        if record.has_module_type(&type_id) || record.socket_of(module_id).is_some() {
            tracing::warn!(actor = %actor, container = %container, type_id, "install refused: module type already installed");
            return Outcome::Rejected;
        }

        let mut item = held;
        let carried = match item.tags.remove(tags::MODULE_STATE) {
            Some(TagValue::Bytes(bytes)) => Some(bytes),
            _ => None,
        };
        let state = carried.map(|bytes| encode_state(&decode_state(def.kind, Some(&bytes))));
        record.sockets.insert(
            index,
            InstalledModule {
                module_id,
                snapshot: encode_item(&item),
                state,
            },
        );
        host.set_cursor(actor, None);

        tracing::info!(actor = %actor, container = %container, socket = index, module = %module_id, type_id, "module installed");
        self.log.emit(
            self.quantum,
            EngineEvent::ModuleInstalled {
                container,
                socket: index,
                module: module_id,
                kind: def.kind,
            },
        );
        Outcome::Applied
    }

    fn remove_module(
        &mut self,
        host: &mut dyn Host,
        actor: ActorId,
        container: ContainerId,
        index: SocketIndex,
    ) -> Outcome {
        let kind = self.module_def_at(container, index).map(|d| d.kind);
        let Some(record) = self.records.get_mut(&container) else {
            return Outcome::Rejected;
        };
        let Some(installed) = record.sockets.get(&index) else {
            return Outcome::Rejected;
        };
        if self.sessions.module_screen_open(installed.module_id) {
            tracing::debug!(actor = %actor, module = %installed.module_id, "remove refused: module screen open");
            return Outcome::Rejected;
        }
        let Some(mut item) = installed.display_item() else {
            tracing::warn!(container = %container, socket = index, "module snapshot unreadable, leaving it installed");
            return Outcome::Rejected;
        };
        let Some(mut module) = record.sockets.remove(&index) else {
            return Outcome::Rejected;
        };

        if kind == Some(ModuleKind::Playback) {
            if let ModuleState::Playback(mut playback) =
                modules::load_state(&module, ModuleKind::Playback)
            {
                let change = playback.stop(&self.content.items);
                if change != CueChange::None {
                    modules::store_state(&mut module, &ModuleState::Playback(playback));
                    apply_cue(
                        host,
                        &mut self.log,
                        self.quantum,
                        self.content.constants.playback_cue_radius,
                        actor,
                        module.module_id,
                        change,
                    );
                }
            }
        }
        if let Some(state) = module.state.take() {
            item.tags
                .insert(tags::MODULE_STATE.to_string(), TagValue::Bytes(state));
        }
        give_or_drop(host, actor, item);

        tracing::info!(actor = %actor, container = %container, socket = index, module = %module.module_id, "module removed");
        self.log.emit(
            self.quantum,
            EngineEvent::ModuleRemoved {
                container,
                socket: index,
                module: module.module_id,
            },
        );
        Outcome::Applied
    }

    fn toggle_module(
        &mut self,
        host: &mut dyn Host,
        actor: ActorId,
        container: ContainerId,
        index: SocketIndex,
    ) -> Outcome {
        let Some(def) = self.module_def_at(container, index).filter(|d| d.toggleable) else {
            return Outcome::Rejected;
        };
        let catalog = &self.content.items;
        let Some(module) = self
            .records
            .get_mut(&container)
            .and_then(|r| r.sockets.get_mut(&index))
        else {
            return Outcome::Rejected;
        };
        let Some(mut item) = module.display_item() else {
            return Outcome::Rejected;
        };
        let enabled = !item.module_enabled();
        item.set_module_enabled(enabled);
        module.snapshot = encode_item(&item);

        if !enabled && def.kind == ModuleKind::Playback {
            if let ModuleState::Playback(mut playback) =
                modules::load_state(module, ModuleKind::Playback)
            {
                let change = playback.stop(catalog);
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
            }
        }

        tracing::info!(container = %container, module = %module.module_id, enabled, "module toggled");
        let module_id = module.module_id;
        self.log.emit(
            self.quantum,
            EngineEvent::ModuleToggled {
                container,
                module: module_id,
                enabled,
            },
        );
        Outcome::Applied
    }

    fn cycle_module_mode(&mut self, container: ContainerId, index: SocketIndex) -> Outcome {
        let Some(def) = self.module_def_at(container, index) else {
            return Outcome::Rejected;
        };
        let Some(module) = self.module_at(container, index) else {
            return Outcome::Rejected;
        };
        let state = match modules::load_state(module, def.kind) {
            ModuleState::Tank(mut tank) => {
                tank.clamp(def.capacity);
                if !tank.toggle_mode() {
                    return Outcome::Rejected;
                }
                ModuleState::Tank(tank)
            }
            ModuleState::Playback(mut playback) => {
                playback.mode = playback.mode.next();
                ModuleState::Playback(playback)
            }
            _ => return Outcome::Rejected,
        };
        modules::store_state(module, &state);
        tracing::debug!(container = %container, socket = index, "module mode changed");
        Outcome::Applied
    }

    fn module_primary(
        &mut self,
        host: &mut dyn Host,
        actor: ActorId,
        container: ContainerId,
        index: SocketIndex,
    ) -> Outcome {
        match self.module_def_at(container, index) {
            Some(def) if def.kind == ModuleKind::Tank => self.tank_primary(host, actor, &def, container, index),
            Some(def) if def.kind == ModuleKind::Playback => {
                self.playback_toggle(host, actor, container, index)
            }
            _ => Outcome::Rejected,
        }
    }

    fn module_secondary(
        &mut self,
        store: &mut dyn RecordStore,
        host: &mut dyn Host,
        actor: ActorId,
        container: ContainerId,
        index: SocketIndex,
    ) -> Result<Outcome> {
        let Some(def) = self.module_def_at(container, index) else {
            return Ok(Outcome::Rejected);
        };
        if !def.has_secondary_action {
            tracing::debug!(actor = %actor, module_type = %def.id, "module has no secondary action");
            return Ok(Outcome::Rejected);
        }
        if let Some(screen) = def.screen {
            return self.open_sub_screen(store, host, actor, container, index, screen);
        }
        let outcome = match def.kind {
            ModuleKind::Tank => self.tank_secondary(host, actor, &def, container, index),
            _ => Outcome::Rejected,
        };
        if outcome == Outcome::Applied {
            self.flush_socket_change(store, host, actor)?;
        }
        Ok(outcome)
    }

    /// Deposit a full container or withdraw into an empty one; in bottled mode,
    /// move one unit from the actor's own pool into the tank.
    fn tank_primary(
        &mut self,
        host: &mut dyn Host,
        actor: ActorId,
        def: &ModuleTypeDef,
        container: ContainerId,
        index: SocketIndex,
    ) -> Outcome {
        let catalog = &self.content.items;
        let Some(module) = self
            .records
            .get_mut(&container)
            .and_then(|r| r.sockets.get_mut(&index))
        else {
            return Outcome::Rejected;
        };
        let ModuleState::Tank(mut tank) = modules::load_state(module, ModuleKind::Tank) else {
            return Outcome::Rejected;
        };
        tank.clamp(def.capacity);

        if tank.bottled_mode {
            let available = host.bottled_resource(actor);
            if available == 0 || !tank.bottle(def.capacity) {
                return Outcome::Rejected;
            }
            host.set_bottled_resource(actor, available - 1);
        } else {
            let Some(held) = host.cursor(actor) else {
                return Outcome::Rejected;
            };
            let replacement = if let Some(fill) = catalog.fluid(&held.kind) {
                if !tank.fill(&fill.fluid, def.capacity) {
                    return Outcome::Rejected;
                }
                ItemStack::new(fill.empty.clone(), 1)
            } else {
                let Some(filled) = tank
                    .fluid_kind
                    .as_deref()
                    .and_then(|fluid| catalog.filled_kind(&held.kind, fluid))
                    .cloned()
                else {
                    return Outcome::Rejected;
                };
                tank.drain();
                ItemStack::new(filled, 1)
            };
            swap_one(host, actor, held, replacement);
        }

        tracing::debug!(actor = %actor, container = %container, fluid = tank.fluid_units, bottled = tank.bottled_units, "tank changed");
        modules::store_state(module, &ModuleState::Tank(tank));
        Outcome::Applied
    }

    /// Bottled mode only: move one unit back into the actor's own pool.
    fn tank_secondary(
        &mut self,
        host: &mut dyn Host,
        actor: ActorId,
        def: &ModuleTypeDef,
        container: ContainerId,
        index: SocketIndex,
    ) -> Outcome {
        let Some(module) = self.module_at(container, index) else {
            return Outcome::Rejected;
        };
        let ModuleState::Tank(mut tank) = modules::load_state(module, ModuleKind::Tank) else {
            return Outcome::Rejected;
        };
        tank.clamp(def.capacity);
        if !tank.unbottle() {
            return Outcome::Rejected;
        }
        let pool = host.bottled_resource(actor);
        host.set_bottled_resource(actor, pool.saturating_add(1));
        modules::store_state(module, &ModuleState::Tank(tank));
        Outcome::Applied
    }

    fn playback_toggle(
        &mut self,
        host: &mut dyn Host,
        actor: ActorId,
        container: ContainerId,
        index: SocketIndex,
    ) -> Outcome {
        let catalog = &self.content.items;
        let Some(module) = self
            .records
            .get_mut(&container)
            .and_then(|r| r.sockets.get_mut(&index))
        else {
            return Outcome::Rejected;
        };
        if !module.is_enabled() {
            return Outcome::Rejected;
        }
        let ModuleState::Playback(mut playback) = modules::load_state(module, ModuleKind::Playback)
        else {
            return Outcome::Rejected;
        };
        let change = if playback.playing {
            playback.stop(catalog)
        } else {
            playback.start(catalog, &mut self.rng)
        };
        if change == CueChange::None {
            return Outcome::Rejected;
        }
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
        Outcome::Applied
    }
}
