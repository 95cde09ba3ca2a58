//! The host application as seen by the engine: actors, their cursors and
//! inventories, the grid views it renders, loose world items and audio cues.

use crate::{catalog::FoodProps, ActorId, ItemStack, Location, ScreenKind};

/// An item lying in the world, addressed by the host's entity handle.
#[derive(Debug, Clone, PartialEq)]
pub struct LooseItem {
    pub entity: u64,
    pub stack: ItemStack,
    pub location: Location,
}

pub trait Host {
    fn is_online(&self, actor: ActorId) -> bool;

    fn online_actors(&self) -> Vec<ActorId>;

    fn actor_name(&self, actor: ActorId) -> Option<String>;

    fn location(&self, actor: ActorId) -> Option<Location>;

    /// The item held on the actor's cursor while a view is open.
    fn cursor(&self, actor: ActorId) -> Option<ItemStack>;

    fn set_cursor(&mut self, actor: ActorId, item: Option<ItemStack>);

    fn inventory_slot(&self, actor: ActorId, slot: usize) -> Option<ItemStack>;

    fn set_inventory_slot(&mut self, actor: ActorId, slot: usize, item: Option<ItemStack>);

    /// Everything the actor carries, container items included.
    fn carried_items(&self, actor: ActorId) -> Vec<ItemStack>;

    /// Put `item` into the actor's inventory. Returns what did not fit.
    fn give(&mut self, actor: ActorId, item: ItemStack) -> Option<ItemStack>;

    /// Spawn `item` in the world at the actor's feet.
    fn drop_near(&mut self, actor: ActorId, item: ItemStack);

    /// Show (or redraw) the main grid view.
    fn show_view(&mut self, actor: ActorId, title: &str, grid: &[Option<ItemStack>]);

    fn show_sub_screen(
        &mut self,
        actor: ActorId,
        screen: ScreenKind,
        title: &str,
        slots: &[Option<ItemStack>],
    );

    /// Current contents of the actor's open module screen, or `None` when the
    /// host is not showing one.
    fn sub_screen_slots(&self, actor: ActorId) -> Option<Vec<Option<ItemStack>>>;

    fn nearby_items(&self, actor: ActorId, radius: f64) -> Vec<LooseItem>;

    /// Remove `amount` units of a loose item from the world. False if it is gone.
    fn take_loose_item(&mut self, entity: u64, amount: u32) -> bool;

    fn satiation(&self, actor: ActorId) -> u32;

    fn feed(&mut self, actor: ActorId, food: &FoodProps);

    /// The actor's own pool of the resource a tank can bottle.
    fn bottled_resource(&self, actor: ActorId) -> u32;

    fn set_bottled_resource(&mut self, actor: ActorId, units: u32);

    /// Start an ambient cue that follows `origin` and plays for everyone else within `radius`.
    fn start_cue(&mut self, origin: ActorId, sound: &str, radius: f64);

    fn stop_cue(&mut self, origin: ActorId, sound: &str);
}

/// Amounts handed over by `give_or_drop`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Handover {
    pub given: u32,
    pub dropped: u32,
}

/// Give `item` to the actor; whatever doesn't fit lands in the world. Never destroys.
pub fn give_or_drop(host: &mut dyn Host, actor: ActorId, item: ItemStack) -> Handover {
    let total = item.amount;
    match host.give(actor, item) {
        None => Handover {
            given: total,
            dropped: 0,
        },
        Some(rest) => {
            let dropped = rest.amount;
            tracing::debug!(actor = %actor, kind = %rest.kind, dropped, "inventory full, dropping overflow");
            host.drop_near(actor, rest);
            Handover {
                given: total.saturating_sub(dropped),
                dropped,
            }
        }
    }
}
