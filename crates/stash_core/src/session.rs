//! Ephemeral per-actor view state. Nothing here is persisted.

use std::collections::HashMap;

use crate::{layout::SlotLayout, sort::SortMode, ActorId, ContainerId, ItemStack, ModuleId, ScreenKind};

/// One open grid view of a container.
#[derive(Debug, Clone)]
pub struct Session {
    pub actor: ActorId,
    pub container: ContainerId,
    pub type_id: String,
    pub title: String,
    pub layout: SlotLayout,
    pub paginated: bool,
    pub page: usize,
    pub sort_mode: SortMode,
    /// The grid as last drawn, including edits not yet committed to logical contents.
    pub visible: Vec<Option<ItemStack>>,
    /// Valid storage slots on the current page.
    pub valid_slots: usize,
    pub last_storage_edit: Option<u64>,
}

impl Session {
    pub fn is_storage_slot(&self, slot: usize) -> bool {
        slot < self.valid_slots
    }
}

/// A module's dedicated sub-view, routed back to the module on close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSession {
    pub container: ContainerId,
    pub module: ModuleId,
    pub screen: ScreenKind,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    main: HashMap<ActorId, Session>,
    screens: HashMap<ActorId, ScreenSession>,
}

impl SessionRegistry {
    pub fn get(&self, actor: ActorId) -> Option<&Session> {
        self.main.get(&actor)
    }

    pub fn get_mut(&mut self, actor: ActorId) -> Option<&mut Session> {
        self.main.get_mut(&actor)
    }

    pub fn insert(&mut self, session: Session) {
        self.main.insert(session.actor, session);
    }

    pub fn remove(&mut self, actor: ActorId) -> Option<Session> {
        self.main.remove(&actor)
    }

    pub fn screen(&self, actor: ActorId) -> Option<&ScreenSession> {
        self.screens.get(&actor)
    }

    pub fn open_screen(&mut self, actor: ActorId, screen: ScreenSession) {
        self.screens.insert(actor, screen);
    }

    pub fn close_screen(&mut self, actor: ActorId) -> Option<ScreenSession> {
        self.screens.remove(&actor)
    }

    /// True while any actor has the container's main grid open.
    pub fn has_main_view(&self, container: ContainerId) -> bool {
        self.main.values().any(|s| s.container == container)
    }

    pub fn module_screen_open(&self, module: ModuleId) -> bool {
        self.screens.values().any(|s| s.module == module)
    }

    /// True while any view, main or sub-screen, references the container.
    pub fn references(&self, container: ContainerId) -> bool {
        self.has_main_view(container) || self.screens.values().any(|s| s.container == container)
    }
}
