//! Type definitions for `stash_core`.
//!
//! IDs, item stacks, the container record, type definitions loaded from
//! content, engine constants and the event log.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::ItemCatalog;

// ---------------------------------------------------------------------------
// Type aliases
// ---------------------------------------------------------------------------

pub type ItemKind = String;
pub type SocketIndex = u8;

/// Width of one grid row.
pub const ROW_WIDTH: usize = 9;
/// Storage rows shown at once; more rows than this turns pagination on.
pub const MAX_VISIBLE_ROWS: u32 = 5;
/// Storage slots per page of a paginated view.
pub const PAGE_SIZE: usize = MAX_VISIBLE_ROWS as usize * ROW_WIDTH;

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn parse(raw: &str) -> Result<Self, crate::StashError> {
                Uuid::parse_str(raw.trim())
                    .map(Self)
                    .map_err(|_| crate::StashError::InvalidIdentifier(raw.to_string()))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

uuid_id!(ContainerId);
uuid_id!(ModuleId);
uuid_id!(ActorId);

// ---------------------------------------------------------------------------
// Item stacks and identity tags
// ---------------------------------------------------------------------------

/// Metadata keys this engine reads from an item's tag map.
pub mod tags {
    pub const CONTAINER_ID: &str = "stash:container_id";
    pub const CONTAINER_TYPE: &str = "stash:container_type";
    pub const MODULE_ID: &str = "stash:module_id";
    pub const MODULE_TYPE: &str = "stash:module_type";
    pub const MODULE_ENABLED: &str = "stash:module_enabled";
    pub const MODULE_STATE: &str = "stash:module_state";
    /// Marks engine-drawn grid decorations. These never count as storage.
    pub const UI_ROLE: &str = "stash:ui";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagValue {
    Text(String),
    Byte(u8),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub kind: ItemKind,
    pub amount: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lore: Vec<String>,
    /// Distinguishing attributes (enchantments, trims, ...). Only counted, never interpreted.
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, TagValue>,
}

impl ItemStack {
    pub fn new(kind: impl Into<ItemKind>, amount: u32) -> Self {
        Self {
            kind: kind.into(),
            amount,
            name: None,
            lore: Vec::new(),
            attributes: Vec::new(),
            tags: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_tag(mut self, key: &str, value: TagValue) -> Self {
        self.tags.insert(key.to_string(), value);
        self
    }

    #[must_use]
    pub fn with_amount(mut self, amount: u32) -> Self {
        self.amount = amount;
        self
    }

    /// Two stacks may merge when everything but the amount matches.
    pub fn is_similar(&self, other: &ItemStack) -> bool {
        self.kind == other.kind
            && self.name == other.name
            && self.lore == other.lore
            && self.attributes == other.attributes
            && self.tags == other.tags
    }

    pub fn tag_text(&self, key: &str) -> Option<&str> {
        match self.tags.get(key) {
            Some(TagValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn tag_bytes(&self, key: &str) -> Option<&[u8]> {
        match self.tags.get(key) {
            Some(TagValue::Bytes(b)) => Some(b.as_slice()),
            _ => None,
        }
    }

    pub fn container_id(&self) -> Option<ContainerId> {
        self.tag_text(tags::CONTAINER_ID)
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .map(ContainerId)
    }

    pub fn container_type(&self) -> Option<&str> {
        self.tag_text(tags::CONTAINER_TYPE)
    }

    pub fn module_id(&self) -> Option<ModuleId> {
        self.tag_text(tags::MODULE_ID)
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .map(ModuleId)
    }

    pub fn module_type(&self) -> Option<&str> {
        self.tag_text(tags::MODULE_TYPE)
    }

    pub fn is_container(&self) -> bool {
        self.tags.contains_key(tags::CONTAINER_ID) || self.tags.contains_key(tags::CONTAINER_TYPE)
    }

    pub fn is_module(&self) -> bool {
        self.tags.contains_key(tags::MODULE_ID) || self.tags.contains_key(tags::MODULE_TYPE)
    }

    pub fn is_ui(&self) -> bool {
        self.tags.contains_key(tags::UI_ROLE)
    }

    /// Modules default to enabled until toggled.
    pub fn module_enabled(&self) -> bool {
        !matches!(self.tags.get(tags::MODULE_ENABLED), Some(TagValue::Byte(0)))
    }

    pub fn set_module_enabled(&mut self, enabled: bool) {
        self.tags.insert(
            tags::MODULE_ENABLED.to_string(),
            TagValue::Byte(u8::from(enabled)),
        );
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{:.1},{:.1},{:.1}", self.world, self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Container record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: ActorId,
    pub name: String,
}

/// One occupied socket. `snapshot` is the byte-exact display item;
/// `state` is the module-owned blob, absent until the module first persists state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledModule {
    pub module_id: ModuleId,
    pub snapshot: Vec<u8>,
    pub state: Option<Vec<u8>>,
}

impl InstalledModule {
    pub fn display_item(&self) -> Option<ItemStack> {
        crate::codec::decode_item(&self.snapshot)
    }

    pub fn module_type(&self) -> Option<String> {
        self.display_item()
            .and_then(|item| item.module_type().map(str::to_string))
    }

    /// False when toggled off or when the snapshot is unreadable.
    pub fn is_enabled(&self) -> bool {
        self.display_item().is_some_and(|item| item.module_enabled())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerRecord {
    pub id: ContainerId,
    pub type_id: String,
    pub owner: Option<Owner>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    /// Logical contents. Renormalized to `rows * 9` on every render and save.
    pub contents: Vec<Option<ItemStack>>,
    pub sockets: BTreeMap<SocketIndex, InstalledModule>,
}

impl ContainerRecord {
    pub fn new(id: ContainerId, type_id: impl Into<String>, size: usize) -> Self {
        Self {
            id,
            type_id: type_id.into(),
            owner: None,
            created_at_ms: 0,
            updated_at_ms: 0,
            contents: vec![None; size],
            sockets: BTreeMap::new(),
        }
    }

    /// Truncate or pad logical contents to `size`. Returns true if the length changed.
    pub fn normalize(&mut self, size: usize) -> bool {
        if self.contents.len() == size {
            return false;
        }
        self.contents.resize(size, None);
        true
    }

    pub fn socket_of(&self, module_id: ModuleId) -> Option<SocketIndex> {
        self.sockets
            .iter()
            .find(|(_, m)| m.module_id == module_id)
            .map(|(idx, _)| *idx)
    }

    /// Module types are singleton per container; this scans the snapshots.
    pub fn has_module_type(&self, module_type: &str) -> bool {
        self.sockets
            .values()
            .any(|m| m.module_type().as_deref() == Some(module_type))
    }

    pub fn item_count(&self) -> u64 {
        self.contents
            .iter()
            .flatten()
            .map(|s| u64::from(s.amount))
            .sum()
    }
}

// ---------------------------------------------------------------------------
// Void / recovery audit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct NewVoidEntry {
    pub actor: Option<Owner>,
    pub container_id: ContainerId,
    pub container_type: String,
    pub module_id: ModuleId,
    pub item_kind: ItemKind,
    pub amount: u32,
    /// Byte-exact encoded item stack.
    pub payload: Vec<u8>,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoidEntry {
    pub id: i64,
    pub created_at_ms: i64,
    pub actor_id: Option<ActorId>,
    pub actor_name: Option<String>,
    pub container_id: ContainerId,
    pub container_type: String,
    pub module_id: ModuleId,
    pub item_kind: ItemKind,
    pub amount: u32,
    #[serde(skip)]
    pub payload: Vec<u8>,
    pub location: Option<String>,
    pub recovered_at_ms: Option<i64>,
    pub recovered_by: Option<String>,
}

impl VoidEntry {
    pub fn is_recovered(&self) -> bool {
        self.recovered_at_ms.is_some()
    }
}

// ---------------------------------------------------------------------------
// Content types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerTypeDef {
    pub id: String,
    pub name: String,
    pub rows: u32,
    #[serde(default)]
    pub upgrade_sockets: u32,
    pub display_material: ItemKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Kinds allowed into storage. Empty allows everything except containers.
    #[serde(default)]
    pub allowed_items: Vec<ItemKind>,
}

impl ContainerTypeDef {
    pub fn canonical_size(&self) -> usize {
        self.rows as usize * ROW_WIDTH
    }

    pub fn paginated(&self) -> bool {
        self.rows > MAX_VISIBLE_ROWS
    }

    /// Storage rows plus the nav row.
    pub fn display_size(&self) -> usize {
        let storage_rows = self.rows.min(MAX_VISIBLE_ROWS) as usize;
        (storage_rows + 1) * ROW_WIDTH
    }

    pub fn accepts(&self, item: &ItemStack) -> bool {
        if item.is_container() || item.is_ui() {
            return false;
        }
        self.allowed_items.is_empty() || self.allowed_items.iter().any(|k| *k == item.kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    Tank,
    Cooking,
    Feeding,
    Magnet,
    Discard,
    Playback,
}

impl ModuleKind {
    /// Modules that write logical contents; skipped by the background pass
    /// while the container is open in a session.
    pub fn mutation_sensitive(self) -> bool {
        matches!(self, Self::Feeding | Self::Magnet)
    }

    /// Modules the background pass advances.
    pub fn ticks(self) -> bool {
        matches!(
            self,
            Self::Cooking | Self::Feeding | Self::Magnet | Self::Playback
        )
    }

    /// Socket icon is recomputed from state instead of drawn from the snapshot.
    pub fn dynamic_icon(self) -> bool {
        matches!(self, Self::Tank)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Tank => "tank",
            Self::Cooking => "cooking",
            Self::Feeding => "feeding",
            Self::Magnet => "magnet",
            Self::Discard => "discard",
            Self::Playback => "playback",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenKind {
    /// Input, fuel and output slots.
    Cooking,
    /// Ordered kind allow-list.
    Filter,
    /// Track items making up a playback program.
    Program,
}

impl ScreenKind {
    pub fn slot_count(self) -> usize {
        match self {
            Self::Cooking => 3,
            Self::Filter | Self::Program => ROW_WIDTH,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleTypeDef {
    pub id: String,
    pub name: String,
    pub kind: ModuleKind,
    pub display_material: ItemKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub toggleable: bool,
    #[serde(default)]
    pub has_secondary_action: bool,
    #[serde(default)]
    pub screen: Option<ScreenKind>,
    /// Tank capacity in units. Ignored by other kinds.
    #[serde(default)]
    pub capacity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedingMode {
    /// Minimize overshoot past the floor.
    Best,
    /// First kind of the priority list found in storage.
    Ordered,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedingPolicy {
    pub floor: u32,
    pub cooldown_quanta: u64,
    pub mode: FeedingMode,
    #[serde(default)]
    pub avoid_adverse: bool,
    /// Fallback priority for `Ordered` when a module's own list is empty.
    #[serde(default)]
    pub priority: Vec<ItemKind>,
}

/// Item kinds used to draw the nav row and fillers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiKinds {
    pub border: ItemKind,
    pub blocked: ItemKind,
    pub prev_page: ItemKind,
    pub next_page: ItemKind,
    pub sort: ItemKind,
    pub socket: ItemKind,
    pub bottled: ItemKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constants {
    /// Delay between the last storage edit and the debounced save.
    pub debounce_quanta: u64,
    /// Storage edits this recent block page changes and debounced saves.
    pub quiet_window_quanta: u64,
    /// Clicks in one quantum that trip the burst guard.
    pub burst_quantum_threshold: u32,
    pub burst_window_quanta: u64,
    /// Clicks within `burst_window_quanta` that trip the burst guard.
    pub burst_window_threshold: u32,
    pub burst_cooldown_quanta: u64,
    /// Background pass period; also the step duration handed to modules.
    pub tick_interval_quanta: u64,
    pub feeding: FeedingPolicy,
    pub magnet_radius: f64,
    pub magnet_per_step_cap: u32,
    pub playback_cue_radius: f64,
    pub ui: UiKinds,
}

#[derive(Debug, Clone)]
pub struct Content {
    pub content_version: String,
    pub constants: Constants,
    pub containers: HashMap<String, ContainerTypeDef>,
    pub modules: HashMap<String, ModuleTypeDef>,
    pub items: ItemCatalog,
}

impl Content {
    pub fn container_def(&self, type_id: &str) -> Option<&ContainerTypeDef> {
        self.containers.get(type_id)
    }

    pub fn module_def(&self, type_id: &str) -> Option<&ModuleTypeDef> {
        self.modules.get(type_id)
    }

    /// Definition of the module installed in `module`, resolved through its snapshot.
    pub fn installed_def(&self, module: &InstalledModule) -> Option<&ModuleTypeDef> {
        module
            .module_type()
            .and_then(|type_id| self.modules.get(&type_id))
    }
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersistReason {
    Debounced,
    Close,
    Sort,
    SocketChange,
    SubScreen,
    Background,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    pub seq: u64,
    pub quantum: u64,
    pub event: EngineEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EngineEvent {
    SessionOpened {
        actor: ActorId,
        container: ContainerId,
    },
    SessionClosed {
        actor: ActorId,
        container: ContainerId,
    },
    Persisted {
        container: ContainerId,
        reason: PersistReason,
    },
    SaveDeferred {
        actor: ActorId,
        container: ContainerId,
    },
    BurstBlocked {
        actor: ActorId,
        until_quantum: u64,
    },
    CursorRedistributed {
        actor: ActorId,
        stored: u32,
        given: u32,
        dropped: u32,
    },
    PageChanged {
        actor: ActorId,
        container: ContainerId,
        page: usize,
    },
    Sorted {
        container: ContainerId,
        mode: crate::sort::SortMode,
    },
    ModuleInstalled {
        container: ContainerId,
        socket: SocketIndex,
        module: ModuleId,
        kind: ModuleKind,
    },
    ModuleRemoved {
        container: ContainerId,
        socket: SocketIndex,
        module: ModuleId,
    },
    ModuleToggled {
        container: ContainerId,
        module: ModuleId,
        enabled: bool,
    },
    SubScreenOpened {
        actor: ActorId,
        module: ModuleId,
        screen: ScreenKind,
    },
    SubScreenClosed {
        actor: ActorId,
        module: ModuleId,
        screen: ScreenKind,
    },
    ItemVoided {
        container: ContainerId,
        module: ModuleId,
        audit_id: i64,
        kind: ItemKind,
        amount: u32,
    },
    CraftCompleted {
        container: ContainerId,
        module: ModuleId,
        crafts: u32,
    },
    AutoFed {
        actor: ActorId,
        container: ContainerId,
        kind: ItemKind,
    },
    ItemsCollected {
        container: ContainerId,
        amount: u32,
    },
    TrackStarted {
        actor: ActorId,
        module: ModuleId,
        sound: String,
    },
    TrackStopped {
        actor: ActorId,
        module: ModuleId,
        sound: String,
    },
    VoidEntryRecovered {
        audit_id: i64,
        actor: ActorId,
    },
}
