//! Projection between logical contents and the visible grid.

use crate::layout::{page_count, page_offset, valid_slots};
use crate::modules::{self, ModuleState};
use crate::session::Session;
use crate::sort::SortMode;
use crate::{
    tags, Content, ContainerRecord, ContainerTypeDef, InstalledModule, ItemStack, ModuleKind,
    TagValue,
};

pub(crate) mod roles {
    pub const BORDER: &str = "border";
    pub const BLOCKED: &str = "blocked";
    pub const PREV: &str = "prev_page";
    pub const NEXT: &str = "next_page";
    pub const SORT: &str = "sort";
    pub const SOCKET: &str = "socket";
    pub const FILTER: &str = "filter";
}

pub(crate) fn ui_item(kind: &str, role: &str, name: &str) -> ItemStack {
    ItemStack::new(kind, 1)
        .with_name(name)
        .with_tag(tags::UI_ROLE, TagValue::Text(role.to_string()))
}

fn sort_button(content: &Content, active: SortMode) -> ItemStack {
    let mut button = ui_item(&content.constants.ui.sort, roles::SORT, "Sort");
    button.lore = SortMode::ALL
        .iter()
        .map(|&mode| {
            if mode == active {
                format!("> {}", mode.label())
            } else {
                format!("  {}", mode.label())
            }
        })
        .collect();
    button.lore.push("Click to sort, right-click to change mode".to_string());
    button
}

/// Redraw only the sort button, leaving uncommitted storage slots alone.
pub(crate) fn redraw_sort_button(session: &mut Session, content: &Content) {
    if let Some(slot) = session
        .layout
        .sort_button
        .filter(|&slot| slot < session.visible.len())
    {
        session.visible[slot] = Some(sort_button(content, session.sort_mode));
    }
}

/// Socket icon for an installed module. Tanks are redrawn from their state.
pub(crate) fn module_icon(module: &InstalledModule, content: &Content) -> Option<ItemStack> {
    let mut icon = module.display_item()?;
    if let Some(def) = content.installed_def(module) {
        if def.kind.dynamic_icon() {
            if let ModuleState::Tank(tank) = modules::load_state(module, ModuleKind::Tank) {
                icon = tank.reskin(&icon, def.capacity, &content.constants.ui, &content.items);
            }
        }
    }
    if !icon.module_enabled() {
        icon.lore.push("Disabled".to_string());
    }
    Some(icon)
}

pub(crate) fn title(def: &ContainerTypeDef, session: &Session, logical_len: usize) -> String {
    if session.paginated {
        format!(
            "{} ({}/{})",
            def.name,
            session.page + 1,
            page_count(logical_len).max(1)
        )
    } else {
        def.name.clone()
    }
}

fn window_offset(session: &Session) -> usize {
    if session.paginated {
        page_offset(session.page)
    } else {
        0
    }
}

/// Redraw the whole grid from the record. Normalizes the record's logical
/// length first; returns true if that changed the record.
pub(crate) fn render(
    session: &mut Session,
    record: &mut ContainerRecord,
    def: &ContainerTypeDef,
    content: &Content,
) -> bool {
    let normalized = record.normalize(def.canonical_size());
    let len = record.contents.len();
    let pages = page_count(len).max(1);
    if session.paginated && session.page >= pages {
        session.page = pages - 1;
    }

    let ui = &content.constants.ui;
    let window = session.layout.storage_area;
    let offset = window_offset(session);
    let valid = valid_slots(len, if session.paginated { session.page } else { 0 }, window);

    let mut visible: Vec<Option<ItemStack>> = vec![None; session.layout.display_size];
    for (i, slot) in visible.iter_mut().enumerate().take(window) {
        *slot = if i < valid {
            record.contents[offset + i].clone()
        } else {
            Some(ui_item(&ui.blocked, roles::BLOCKED, " "))
        };
    }

    if let Some(start) = session.layout.nav_row_start {
        for slot in &mut visible[start..] {
            *slot = Some(ui_item(&ui.border, roles::BORDER, " "));
        }
        if let Some(prev) = session.layout.prev_button.filter(|_| session.page > 0) {
            visible[prev] = Some(ui_item(&ui.prev_page, roles::PREV, "Previous page"));
        }
        if let Some(next) = session
            .layout
            .next_button
            .filter(|_| session.page + 1 < pages)
        {
            visible[next] = Some(ui_item(&ui.next_page, roles::NEXT, "Next page"));
        }
        if let Some(sort) = session.layout.sort_button {
            visible[sort] = Some(sort_button(content, session.sort_mode));
        }
        for (index, &slot) in session.layout.socket_slots.iter().enumerate() {
            let socket = u8::try_from(index).ok();
            let icon = socket
                .and_then(|s| record.sockets.get(&s))
                .map(|module| {
                    module_icon(module, content).unwrap_or_else(|| {
                        ui_item(&ui.socket, roles::SOCKET, "Damaged module")
                    })
                })
                .unwrap_or_else(|| ui_item(&ui.socket, roles::SOCKET, "Empty socket"));
            visible[slot] = Some(icon);
        }
    }

    session.visible = visible;
    session.valid_slots = valid;
    session.title = title(def, session, len);
    normalized
}

/// Copy the valid part of the visible window back into logical contents.
pub(crate) fn commit_visible(session: &Session, record: &mut ContainerRecord) {
    let offset = window_offset(session);
    let valid = valid_slots(
        record.contents.len(),
        if session.paginated { session.page } else { 0 },
        session.layout.storage_area,
    )
    .min(session.valid_slots);
    for i in 0..valid {
        record.contents[offset + i] = session.visible[i].clone().filter(|item| !item.is_ui());
    }
}
