//! Shared test fixtures for stash_core and downstream crates.
//!
//! `base_content()` provides three container types, one module type of every
//! kind and a small item catalog with compressed timings. `MemoryStore` and
//! `FakeHost` stand in for the backing store and the host application.

use std::collections::{BTreeMap, HashMap};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

use crate::catalog::{CookRecipe, FluidFill, FoodProps, ItemCatalog, ItemDef, TrackInfo};
use crate::host::{Host, LooseItem};
use crate::inventory::insert_into;
use crate::store::RecordStore;
use crate::{
    tags, ActorId, Constants, ContainerId, ContainerRecord, ContainerTypeDef, Content,
    FeedingMode, FeedingPolicy, ItemStack, Location, ModuleId, ModuleKind, ModuleTypeDef,
    NewVoidEntry, Result, ScreenKind, StashError, TagValue, UiKinds, VoidEntry,
};

pub const INVENTORY_SLOTS: usize = 36;

fn food(nutrition: u32, richness: f32, adverse: bool) -> Option<FoodProps> {
    Some(FoodProps {
        nutrition,
        richness,
        adverse,
    })
}

fn items() -> ItemCatalog {
    let basic = ItemDef::basic;
    let mut defs = vec![
        basic("stone", "Stone"),
        basic("dirt", "Dirt"),
        basic("diamond", "Diamond"),
        basic("apple", "Apple"),
        basic("cookie", "Cookie"),
        basic("carrot", "Carrot"),
        basic("bread", "Bread"),
        basic("golden_carrot", "Golden Carrot"),
        basic("rotten_flesh", "Rotten Flesh"),
        basic("mushroom_stew", "Mushroom Stew"),
        basic("bowl", "Bowl"),
        basic("raw_iron", "Raw Iron"),
        basic("iron_ingot", "Iron Ingot"),
        basic("coal", "Coal"),
        basic("bucket", "Bucket"),
        basic("water_bucket", "Water Bucket"),
        basic("lava_bucket", "Lava Bucket"),
        basic("disc_cat", "Music Disc (cat)"),
        basic("disc_blocks", "Music Disc (blocks)"),
        basic("disc_far", "Music Disc (far)"),
    ];
    for def in &mut defs {
        match def.id.as_str() {
            "apple" => def.food = food(4, 2.4, false),
            "cookie" => def.food = food(2, 0.4, false),
            "carrot" => def.food = food(3, 3.6, false),
            "bread" => def.food = food(5, 6.0, false),
            "golden_carrot" => def.food = food(6, 14.4, false),
            "rotten_flesh" => def.food = food(4, 0.8, true),
            "mushroom_stew" => {
                def.food = food(6, 7.2, false);
                def.craft_remainder = Some("bowl".to_string());
                def.max_stack = 1;
            }
            "raw_iron" => {
                def.cooking = Some(CookRecipe {
                    output: "iron_ingot".to_string(),
                    output_amount: 1,
                    cook_quanta: 20,
                });
            }
            "coal" => def.fuel_quanta = Some(80),
            "bucket" => def.max_stack = 16,
            "water_bucket" => {
                def.max_stack = 1;
                def.fluid = Some(FluidFill {
                    fluid: "water".to_string(),
                    empty: "bucket".to_string(),
                });
            }
            "lava_bucket" => {
                def.max_stack = 1;
                def.fuel_quanta = Some(200);
                def.craft_remainder = Some("bucket".to_string());
                def.fluid = Some(FluidFill {
                    fluid: "lava".to_string(),
                    empty: "bucket".to_string(),
                });
            }
            "disc_cat" | "disc_blocks" | "disc_far" => {
                let (sound, duration_quanta) = match def.id.as_str() {
                    "disc_cat" => ("music.cat", 100),
                    "disc_blocks" => ("music.blocks", 150),
                    _ => ("music.far", 80),
                };
                def.max_stack = 1;
                def.track = Some(TrackInfo {
                    sound: sound.to_string(),
                    duration_quanta,
                });
            }
            _ => {}
        }
    }
    ItemCatalog::new(defs)
}

fn container_def(id: &str, rows: u32, sockets: u32, material: &str) -> ContainerTypeDef {
    ContainerTypeDef {
        id: id.to_string(),
        name: format!("Test {id}"),
        rows,
        upgrade_sockets: sockets,
        display_material: material.to_string(),
        enabled: true,
        allowed_items: Vec::new(),
    }
}

fn module_def(id: &str, kind: ModuleKind, material: &str, screen: Option<ScreenKind>) -> ModuleTypeDef {
    ModuleTypeDef {
        id: id.to_string(),
        name: format!("Test {id}"),
        kind,
        display_material: material.to_string(),
        enabled: true,
        toggleable: true,
        has_secondary_action: screen.is_some() || kind == ModuleKind::Tank,
        screen,
        capacity: if kind == ModuleKind::Tank { 4 } else { 0 },
    }
}

pub fn base_content() -> Content {
    let mut ore_pouch = container_def("ore_pouch", 1, 0, "bundle");
    ore_pouch.allowed_items = vec![
        "stone".to_string(),
        "raw_iron".to_string(),
        "coal".to_string(),
    ];
    let containers = [
        container_def("small", 3, 2, "chest"),
        container_def("large", 6, 5, "barrel"),
        ore_pouch,
    ];
    let modules = [
        module_def("tank", ModuleKind::Tank, "cauldron", None),
        module_def("furnace", ModuleKind::Cooking, "furnace", Some(ScreenKind::Cooking)),
        module_def("feeder", ModuleKind::Feeding, "cake", Some(ScreenKind::Filter)),
        module_def("magnet", ModuleKind::Magnet, "hopper", None),
        module_def("void", ModuleKind::Discard, "cactus", Some(ScreenKind::Filter)),
        module_def("jukebox", ModuleKind::Playback, "jukebox", Some(ScreenKind::Program)),
    ];

    Content {
        content_version: "test".to_string(),
        constants: Constants {
            debounce_quanta: 4,
            quiet_window_quanta: 2,
            burst_quantum_threshold: 4,
            burst_window_quanta: 10,
            burst_window_threshold: 12,
            burst_cooldown_quanta: 20,
            tick_interval_quanta: 20,
            feeding: FeedingPolicy {
                floor: 18,
                cooldown_quanta: 40,
                mode: FeedingMode::Best,
                avoid_adverse: true,
                priority: Vec::new(),
            },
            magnet_radius: 6.0,
            magnet_per_step_cap: 8,
            playback_cue_radius: 16.0,
            ui: UiKinds {
                border: "gray_stained_glass_pane".to_string(),
                blocked: "black_stained_glass_pane".to_string(),
                prev_page: "arrow".to_string(),
                next_page: "spectral_arrow".to_string(),
                sort: "comparator".to_string(),
                socket: "item_frame".to_string(),
                bottled: "experience_bottle".to_string(),
            },
        },
        containers: containers.into_iter().map(|d| (d.id.clone(), d)).collect(),
        modules: modules.into_iter().map(|d| (d.id.clone(), d)).collect(),
        items: items(),
    }
}

pub fn make_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(42)
}

pub fn actor(n: u32) -> ActorId {
    ActorId(Uuid::from_u128((0xA << 120) | u128::from(n)))
}

pub fn container(n: u32) -> ContainerId {
    ContainerId(Uuid::from_u128((0xC << 120) | u128::from(n)))
}

pub fn module_id(n: u32) -> ModuleId {
    ModuleId(Uuid::from_u128((0xD << 120) | u128::from(n)))
}

/// A physical module item of `type_id`, as a host would mint it.
pub fn module_item(content: &Content, type_id: &str, n: u32) -> ItemStack {
    let material = content
        .module_def(type_id)
        .map_or("stone", |d| d.display_material.as_str());
    ItemStack::new(material, 1)
        .with_name(format!("Module {type_id}"))
        .with_tag(tags::MODULE_ID, TagValue::Text(module_id(n).to_string()))
        .with_tag(tags::MODULE_TYPE, TagValue::Text(type_id.to_string()))
}

pub fn origin() -> Location {
    Location {
        world: "overworld".to_string(),
        x: 0.0,
        y: 64.0,
        z: 0.0,
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory `RecordStore` that counts container writes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub records: HashMap<ContainerId, ContainerRecord>,
    pub void_rows: Vec<VoidEntry>,
    pub saves: usize,
    /// Fail every write with a store error.
    pub fail_writes: bool,
    clock_ms: i64,
}

impl MemoryStore {
    fn now(&mut self) -> i64 {
        self.clock_ms += 1;
        self.clock_ms
    }

    fn check_writable(&self, op: &'static str) -> Result<()> {
        if self.fail_writes {
            return Err(StashError::store(op, "disk is read-only"));
        }
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    fn load(&mut self, id: ContainerId) -> Result<Option<ContainerRecord>> {
        Ok(self.records.get(&id).cloned())
    }

    fn insert(&mut self, record: &mut ContainerRecord) -> Result<()> {
        self.check_writable("insert container")?;
        let now = self.now();
        record.created_at_ms = now;
        record.updated_at_ms = now;
        self.records.insert(record.id, record.clone());
        Ok(())
    }

    fn save(&mut self, record: &mut ContainerRecord) -> Result<()> {
        self.check_writable("save container")?;
        record.updated_at_ms = self.now();
        self.saves += 1;
        self.records.insert(record.id, record.clone());
        Ok(())
    }

    fn append_void_entry(&mut self, entry: &NewVoidEntry) -> Result<i64> {
        self.check_writable("append void entry")?;
        let id = self.void_rows.len() as i64 + 1;
        let created_at_ms = self.now();
        self.void_rows.push(VoidEntry {
            id,
            created_at_ms,
            actor_id: entry.actor.as_ref().map(|a| a.id),
            actor_name: entry.actor.as_ref().map(|a| a.name.clone()),
            container_id: entry.container_id,
            container_type: entry.container_type.clone(),
            module_id: entry.module_id,
            item_kind: entry.item_kind.clone(),
            amount: entry.amount,
            payload: entry.payload.clone(),
            location: entry.location.as_ref().map(ToString::to_string),
            recovered_at_ms: None,
            recovered_by: None,
        });
        Ok(id)
    }

    fn void_entry(&mut self, id: i64) -> Result<Option<VoidEntry>> {
        Ok(self.void_rows.iter().find(|r| r.id == id).cloned())
    }

    fn void_entries(
        &mut self,
        actor: Option<ActorId>,
        include_recovered: bool,
    ) -> Result<Vec<VoidEntry>> {
        Ok(self
            .void_rows
            .iter()
            .rev()
            .filter(|r| actor.is_none() || r.actor_id == actor)
            .filter(|r| include_recovered || !r.is_recovered())
            .cloned()
            .collect())
    }

    fn mark_recovered(&mut self, id: i64, recovered_by: &str) -> Result<bool> {
        self.check_writable("mark recovered")?;
        let now = self.now();
        let row = self
            .void_rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StashError::AuditEntryNotFound(id))?;
        if row.is_recovered() {
            return Ok(false);
        }
        row.recovered_at_ms = Some(now);
        row.recovered_by = Some(recovered_by.to_string());
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// FakeHost
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FakeActor {
    pub name: String,
    pub online: bool,
    pub location: Location,
    pub cursor: Option<ItemStack>,
    pub inventory: Vec<Option<ItemStack>>,
    pub satiation: u32,
    pub bottled: u32,
    pub fed: Vec<FoodProps>,
    pub dropped: Vec<ItemStack>,
    pub view: Option<(String, Vec<Option<ItemStack>>)>,
    pub screen: Option<(ScreenKind, String, Vec<Option<ItemStack>>)>,
}

impl FakeActor {
    fn new(name: String) -> Self {
        Self {
            name,
            online: true,
            location: origin(),
            cursor: None,
            inventory: vec![None; INVENTORY_SLOTS],
            satiation: 20,
            bottled: 0,
            fed: Vec::new(),
            dropped: Vec::new(),
            view: None,
            screen: None,
        }
    }
}

/// In-memory host: actors, their cursors and inventories, loose world items and cues.
#[derive(Debug)]
pub struct FakeHost {
    pub actors: BTreeMap<ActorId, FakeActor>,
    pub loose: Vec<LooseItem>,
    /// Currently playing cues by origin.
    pub cues: Vec<(ActorId, String)>,
    catalog: ItemCatalog,
    next_entity: u64,
}

impl FakeHost {
    pub fn with_actors(ns: &[u32]) -> Self {
        let actors = ns
            .iter()
            .map(|&n| (actor(n), FakeActor::new(format!("actor{n}"))))
            .collect();
        Self {
            actors,
            loose: Vec::new(),
            cues: Vec::new(),
            catalog: base_content().items,
            next_entity: 1,
        }
    }

    pub fn actor_mut(&mut self, id: ActorId) -> &mut FakeActor {
        self.actors.get_mut(&id).expect("unknown test actor")
    }

    pub fn actor_ref(&self, id: ActorId) -> &FakeActor {
        self.actors.get(&id).expect("unknown test actor")
    }

    /// Put `item` into the first free inventory slots.
    pub fn stock(&mut self, id: ActorId, item: ItemStack) {
        let leftover = self.give(id, item);
        assert!(leftover.is_none(), "test inventory overflow");
    }

    pub fn spawn_loose(&mut self, stack: ItemStack, distance: f64) -> u64 {
        let entity = self.next_entity;
        self.next_entity += 1;
        let mut location = origin();
        location.x = distance;
        self.loose.push(LooseItem {
            entity,
            stack,
            location,
        });
        entity
    }

    pub fn inventory_total(&self, id: ActorId, kind: &str) -> u32 {
        self.actor_ref(id)
            .inventory
            .iter()
            .flatten()
            .filter(|s| s.kind == kind)
            .map(|s| s.amount)
            .sum()
    }

    pub fn dropped_total(&self, id: ActorId, kind: &str) -> u32 {
        self.actor_ref(id)
            .dropped
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.amount)
            .sum()
    }

    /// Units of `kind` the actor has anywhere: cursor, inventory or dropped at their feet.
    pub fn holdings(&self, id: ActorId, kind: &str) -> u32 {
        let cursor = self
            .actor_ref(id)
            .cursor
            .as_ref()
            .filter(|s| s.kind == kind)
            .map_or(0, |s| s.amount);
        cursor + self.inventory_total(id, kind) + self.dropped_total(id, kind)
    }

    pub fn view(&self, id: ActorId) -> &[Option<ItemStack>] {
        self.actor_ref(id)
            .view
            .as_ref()
            .map_or(&[], |(_, grid)| grid.as_slice())
    }
}

fn distance(a: &Location, b: &Location) -> f64 {
    let (dx, dy, dz) = (a.x - b.x, a.y - b.y, a.z - b.z);
    (dx * dx + dy * dy + dz * dz).sqrt()
}

impl Host for FakeHost {
    fn is_online(&self, actor: ActorId) -> bool {
        self.actors.get(&actor).is_some_and(|a| a.online)
    }

    fn online_actors(&self) -> Vec<ActorId> {
        self.actors
            .iter()
            .filter(|(_, a)| a.online)
            .map(|(id, _)| *id)
            .collect()
    }

    fn actor_name(&self, actor: ActorId) -> Option<String> {
        self.actors.get(&actor).map(|a| a.name.clone())
    }

    fn location(&self, actor: ActorId) -> Option<Location> {
        self.actors.get(&actor).map(|a| a.location.clone())
    }

    fn cursor(&self, actor: ActorId) -> Option<ItemStack> {
        self.actors.get(&actor).and_then(|a| a.cursor.clone())
    }

    fn set_cursor(&mut self, actor: ActorId, item: Option<ItemStack>) {
        if let Some(a) = self.actors.get_mut(&actor) {
            a.cursor = item;
        }
    }

    fn inventory_slot(&self, actor: ActorId, slot: usize) -> Option<ItemStack> {
        self.actors
            .get(&actor)
            .and_then(|a| a.inventory.get(slot).cloned().flatten())
    }

    fn set_inventory_slot(&mut self, actor: ActorId, slot: usize, item: Option<ItemStack>) {
        if let Some(s) = self
            .actors
            .get_mut(&actor)
            .and_then(|a| a.inventory.get_mut(slot))
        {
            *s = item;
        }
    }

    fn carried_items(&self, actor: ActorId) -> Vec<ItemStack> {
        self.actors.get(&actor).map_or_else(Vec::new, |a| {
            a.inventory
                .iter()
                .flatten()
                .chain(a.cursor.iter())
                .cloned()
                .collect()
        })
    }

    fn give(&mut self, actor: ActorId, item: ItemStack) -> Option<ItemStack> {
        let max = self.catalog.max_stack(&item.kind);
        match self.actors.get_mut(&actor) {
            Some(a) => insert_into(&mut a.inventory, item, max, |_| true),
            None => Some(item),
        }
    }

    fn drop_near(&mut self, actor: ActorId, item: ItemStack) {
        if let Some(a) = self.actors.get_mut(&actor) {
            a.dropped.push(item);
        }
    }

    fn show_view(&mut self, actor: ActorId, title: &str, grid: &[Option<ItemStack>]) {
        if let Some(a) = self.actors.get_mut(&actor) {
            a.view = Some((title.to_string(), grid.to_vec()));
        }
    }

    fn show_sub_screen(
        &mut self,
        actor: ActorId,
        screen: ScreenKind,
        title: &str,
        slots: &[Option<ItemStack>],
    ) {
        if let Some(a) = self.actors.get_mut(&actor) {
            a.view = None;
            a.screen = Some((screen, title.to_string(), slots.to_vec()));
        }
    }

    fn sub_screen_slots(&self, actor: ActorId) -> Option<Vec<Option<ItemStack>>> {
        self.actors
            .get(&actor)
            .and_then(|a| a.screen.as_ref())
            .map(|(_, _, slots)| slots.clone())
    }

    fn nearby_items(&self, actor: ActorId, radius: f64) -> Vec<LooseItem> {
        let Some(at) = self.actors.get(&actor).map(|a| &a.location) else {
            return Vec::new();
        };
        self.loose
            .iter()
            .filter(|l| l.location.world == at.world && distance(&l.location, at) <= radius)
            .cloned()
            .collect()
    }

    fn take_loose_item(&mut self, entity: u64, amount: u32) -> bool {
        let Some(pos) = self.loose.iter().position(|l| l.entity == entity) else {
            return false;
        };
        let stack = &mut self.loose[pos].stack;
        if amount > stack.amount {
            return false;
        }
        stack.amount -= amount;
        if stack.amount == 0 {
            self.loose.remove(pos);
        }
        true
    }

    fn satiation(&self, actor: ActorId) -> u32 {
        self.actors.get(&actor).map_or(0, |a| a.satiation)
    }

    fn feed(&mut self, actor: ActorId, food: &FoodProps) {
        if let Some(a) = self.actors.get_mut(&actor) {
            a.satiation = (a.satiation + food.nutrition).min(20);
            a.fed.push(food.clone());
        }
    }

    fn bottled_resource(&self, actor: ActorId) -> u32 {
        self.actors.get(&actor).map_or(0, |a| a.bottled)
    }

    fn set_bottled_resource(&mut self, actor: ActorId, units: u32) {
        if let Some(a) = self.actors.get_mut(&actor) {
            a.bottled = units;
        }
    }

    fn start_cue(&mut self, origin: ActorId, sound: &str, _radius: f64) {
        self.cues.push((origin, sound.to_string()));
    }

    fn stop_cue(&mut self, origin: ActorId, sound: &str) {
        if let Some(pos) = self
            .cues
            .iter()
            .position(|(o, s)| *o == origin && s == sound)
        {
            self.cues.remove(pos);
        }
    }
}
