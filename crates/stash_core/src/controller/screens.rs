//! Module sub-screens: cooking slots, kind filters and playback programs.
//!
//! Opening a sub-screen closes the main view; the sub-screen keeps the record
//! cached until the host reports it closed with whatever the actor left in it.

use super::Outcome;
use crate::catalog::ItemCatalog;
use crate::engine::{cached, persist, StashEngine};
use crate::host::{give_or_drop, Host};
use crate::modules::{self, DiscardState, FeedingState, ModuleState};
use crate::render::{roles, ui_item};
use crate::session::ScreenSession;
use crate::store::RecordStore;
use crate::{
    ActorId, ContainerId, EngineEvent, ItemKind, ItemStack, PersistReason, Result, ScreenKind,
    SocketIndex,
};

/// Ghost items standing for the kinds on a filter list.
fn filter_slots(filter: &[ItemKind], catalog: &ItemCatalog, screen: ScreenKind) -> Vec<Option<ItemStack>> {
    let mut slots: Vec<Option<ItemStack>> = filter
        .iter()
        .take(screen.slot_count())
        .map(|kind| {
            let name = catalog.get(kind).map_or(kind.as_str(), |d| d.display_name.as_str());
            Some(ui_item(kind, roles::FILTER, name))
        })
        .collect();
    slots.resize(screen.slot_count(), None);
    slots
}

fn screen_slots(state: &ModuleState, screen: ScreenKind, catalog: &ItemCatalog) -> Option<Vec<Option<ItemStack>>> {
    match (screen, state) {
        (ScreenKind::Cooking, ModuleState::Cooking(cooking)) => Some(vec![
            cooking.input.clone(),
            cooking.fuel.clone(),
            cooking.output.clone(),
        ]),
        (ScreenKind::Filter, ModuleState::Feeding(feeding)) => {
            Some(filter_slots(&feeding.filter, catalog, screen))
        }
        (ScreenKind::Filter, ModuleState::Discard(discard)) => {
            Some(filter_slots(&discard.filter, catalog, screen))
        }
        (ScreenKind::Program, ModuleState::Playback(playback)) => {
            let mut slots: Vec<Option<ItemStack>> =
                playback.program.iter().cloned().map(Some).collect();
            slots.resize(screen.slot_count().max(slots.len()), None);
            Some(slots)
        }
        _ => None,
    }
}

/// Write the closed screen's slots into `state`. Returns the real items the
/// module does not keep.
fn route_slots(
    state: &mut ModuleState,
    screen: ScreenKind,
    slots: Vec<Option<ItemStack>>,
    catalog: &ItemCatalog,
) -> Vec<ItemStack> {
    let mut returned = Vec::new();
    match (screen, state) {
        (ScreenKind::Cooking, ModuleState::Cooking(cooking)) => {
            let mut real = slots.into_iter().map(|s| s.filter(|item| !item.is_ui()));
            cooking.input = real.next().flatten();
            cooking.fuel = real.next().flatten();
            cooking.output = real.next().flatten();
            returned.extend(real.flatten());
            if cooking
                .fuel
                .as_ref()
                .is_some_and(|fuel| catalog.fuel_quanta(&fuel.kind).is_none())
            {
                returned.extend(cooking.fuel.take());
            }
        }
        (
            ScreenKind::Filter,
            ModuleState::Feeding(FeedingState { filter, .. })
            | ModuleState::Discard(DiscardState { filter, .. }),
        ) => {
            filter.clear();
            for item in slots.into_iter().flatten() {
                if !filter.contains(&item.kind) {
                    filter.push(item.kind.clone());
                }
                if !item.is_ui() {
                    returned.push(item);
                }
            }
        }
        (ScreenKind::Program, ModuleState::Playback(playback)) => {
            playback.program.clear();
            for item in slots.into_iter().flatten().filter(|item| !item.is_ui()) {
                if catalog.track(&item.kind).is_some() {
                    playback.program.push(item);
                } else {
                    returned.push(item);
                }
            }
        }
        _ => returned.extend(slots.into_iter().flatten().filter(|item| !item.is_ui())),
    }
    returned
}

impl StashEngine {
    pub(super) fn open_sub_screen(
        &mut self,
        store: &mut dyn RecordStore,
        host: &mut dyn Host,
        actor: ActorId,
        container: ContainerId,
        index: SocketIndex,
        screen: ScreenKind,
    ) -> Result<Outcome> {
        let Some(module) = self.records.get(&container).and_then(|r| r.sockets.get(&index)) else {
            return Ok(Outcome::Rejected);
        };
        let Some(def) = self.content.installed_def(module) else {
            return Ok(Outcome::Rejected);
        };
        if self.sessions.module_screen_open(module.module_id) {
            tracing::debug!(actor = %actor, module = %module.module_id, "screen refused: already open elsewhere");
            return Ok(Outcome::Rejected);
        }
        let state = modules::load_state(module, def.kind);
        let Some(slots) = screen_slots(&state, screen, &self.content.items) else {
            tracing::warn!(module_type = %def.id, ?screen, "screen does not fit the module kind");
            return Ok(Outcome::Rejected);
        };
        let module_id = module.module_id;
        let title = def.name.clone();

        // Registered before the main view closes so the record stays cached.
        self.sessions.open_screen(
            actor,
            ScreenSession {
                container,
                module: module_id,
                screen,
            },
        );
        self.close(store, host, actor)?;
        host.show_sub_screen(actor, screen, &title, &slots);

        tracing::debug!(actor = %actor, module = %module_id, ?screen, "module screen opened");
        self.log.emit(
            self.quantum,
            EngineEvent::SubScreenOpened {
                actor,
                module: module_id,
                screen,
            },
        );
        Ok(Outcome::Applied)
    }

    /// Route the slots of a closed module screen back into the module.
    /// Items the module does not keep go back to the actor.
    pub fn close_sub_screen(
        &mut self,
        store: &mut dyn RecordStore,
        host: &mut dyn Host,
        actor: ActorId,
        slots: Vec<Option<ItemStack>>,
    ) -> Result<()> {
        let Some(screen) = self.sessions.close_screen(actor) else {
            for item in slots.into_iter().flatten().filter(|item| !item.is_ui()) {
                give_or_drop(host, actor, item);
            }
            return Ok(());
        };

        let catalog = &self.content.items;
        let record = cached(&mut self.records, store, screen.container)?;
        let module = record.and_then(|record| {
            let kind = record
                .sockets
                .values()
                .find(|m| m.module_id == screen.module)
                .and_then(|m| self.content.installed_def(m))
                .map(|d| d.kind)?;
            let module = record.sockets.values_mut().find(|m| m.module_id == screen.module)?;
            Some((kind, module))
        });

        let returned = match module {
            Some((kind, module)) => {
                let mut state = modules::load_state(module, kind);
                let returned = route_slots(&mut state, screen.screen, slots, catalog);
                modules::store_state(module, &state);
                returned
            }
            None => {
                tracing::warn!(actor = %actor, module = %screen.module, "module gone while its screen was open");
                slots.into_iter().flatten().filter(|item| !item.is_ui()).collect()
            }
        };
        for item in returned {
            give_or_drop(host, actor, item);
        }

        if let Some(record) = self.records.get_mut(&screen.container) {
            persist(
                store,
                record,
                &self.content,
                PersistReason::SubScreen,
                self.quantum,
                &mut self.log,
            )?;
        }
        tracing::debug!(actor = %actor, module = %screen.module, screen = ?screen.screen, "module screen closed");
        self.log.emit(
            self.quantum,
            EngineEvent::SubScreenClosed {
                actor,
                module: screen.module,
                screen: screen.screen,
            },
        );
        self.evict_if_unused(screen.container);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::PlaybackState;
    use crate::test_fixtures::base_content;

    #[test]
    fn cooking_screen_returns_non_fuel_from_fuel_slot() {
        let content = base_content();
        let mut state = ModuleState::Cooking(Box::default());
        let returned = route_slots(
            &mut state,
            ScreenKind::Cooking,
            vec![
                Some(ItemStack::new("raw_iron", 4)),
                Some(ItemStack::new("stone", 2)),
                None,
            ],
            &content.items,
        );
        assert_eq!(returned, vec![ItemStack::new("stone", 2)]);
        let ModuleState::Cooking(cooking) = state else {
            panic!("state kind changed");
        };
        assert_eq!(cooking.input, Some(ItemStack::new("raw_iron", 4)));
        assert!(cooking.fuel.is_none());
    }

    #[test]
    fn filter_screen_keeps_kinds_and_returns_real_items() {
        let content = base_content();
        let mut state = ModuleState::Feeding(FeedingState {
            filter: vec!["apple".to_string()],
            fed_total: 3,
        });
        let slots = screen_slots(&state, ScreenKind::Filter, &content.items).unwrap();
        assert_eq!(slots.len(), 9);
        assert!(slots[0].as_ref().is_some_and(ItemStack::is_ui));

        let mut edited = slots;
        edited[1] = Some(ItemStack::new("bread", 5));
        edited[2] = Some(ItemStack::new("apple", 1));
        let returned = route_slots(&mut state, ScreenKind::Filter, edited, &content.items);
        assert_eq!(
            returned,
            vec![ItemStack::new("bread", 5), ItemStack::new("apple", 1)]
        );
        assert_eq!(
            state,
            ModuleState::Feeding(FeedingState {
                filter: vec!["apple".to_string(), "bread".to_string()],
                fed_total: 3,
            })
        );
    }

    #[test]
    fn program_screen_keeps_only_tracks() {
        let content = base_content();
        let mut state = ModuleState::Playback(PlaybackState::default());
        let returned = route_slots(
            &mut state,
            ScreenKind::Program,
            vec![
                Some(ItemStack::new("disc_cat", 1)),
                Some(ItemStack::new("dirt", 3)),
                None,
                Some(ItemStack::new("disc_far", 1)),
            ],
            &content.items,
        );
        assert_eq!(returned, vec![ItemStack::new("dirt", 3)]);
        let ModuleState::Playback(playback) = state else {
            panic!("state kind changed");
        };
        assert_eq!(
            playback.program,
            vec![ItemStack::new("disc_cat", 1), ItemStack::new("disc_far", 1)]
        );
    }

    #[test]
    fn mismatched_screen_returns_everything() {
        let content = base_content();
        let mut state = ModuleState::Cooking(Box::default());
        let returned = route_slots(
            &mut state,
            ScreenKind::Program,
            vec![Some(ItemStack::new("disc_cat", 1))],
            &content.items,
        );
        assert_eq!(returned, vec![ItemStack::new("disc_cat", 1)]);
        assert_eq!(state, ModuleState::Cooking(Box::default()));
    }
}
