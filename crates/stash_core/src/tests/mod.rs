//! Engine-level tests driven through `MemoryStore` and `FakeHost`.

mod sockets;

use crate::modules::{self, encode_state, ModuleState};
use crate::test_fixtures::{actor, base_content, module_id, module_item, FakeHost, MemoryStore};
use crate::{
    encode_item, ActorId, Click, ContainerId, ContainerRecord, InstalledModule, Intent, ItemStack,
    ModuleKind, Outcome, SocketIndex, StashEngine,
};

pub(crate) struct World {
    pub engine: StashEngine,
    pub store: MemoryStore,
    pub host: FakeHost,
}

impl World {
    pub fn new() -> Self {
        Self {
            engine: StashEngine::new(base_content(), 7),
            store: MemoryStore::default(),
            host: FakeHost::with_actors(&[1, 2]),
        }
    }

    /// A fresh container of `type_id`, carried by actor 1.
    pub fn carried(&mut self, type_id: &str) -> (ContainerId, ItemStack) {
        let item = self
            .engine
            .create_container(&mut self.store, type_id, None)
            .unwrap();
        self.host.stock(actor(1), item.clone());
        (item.container_id().unwrap(), item)
    }

    pub fn open(&mut self, who: ActorId, item: &ItemStack) -> bool {
        self.engine
            .open(&mut self.store, &mut self.host, who, item)
            .unwrap()
    }

    pub fn close(&mut self, who: ActorId) {
        self.engine
            .close(&mut self.store, &mut self.host, who)
            .unwrap();
    }

    pub fn click(&mut self, who: ActorId, slot: usize, click: Click) -> Outcome {
        self.engine
            .handle(&mut self.store, &mut self.host, who, Intent::Click { slot, click })
            .unwrap()
    }

    pub fn intent(&mut self, who: ActorId, intent: Intent) -> Outcome {
        self.engine
            .handle(&mut self.store, &mut self.host, who, intent)
            .unwrap()
    }

    pub fn advance(&mut self, quanta: u64) {
        for _ in 0..quanta {
            self.engine.advance(&mut self.store, &mut self.host).unwrap();
        }
    }

    pub fn hold(&mut self, who: ActorId, item: ItemStack) {
        self.host.actor_mut(who).cursor = Some(item);
    }

    pub fn cursor(&self, who: ActorId) -> Option<ItemStack> {
        self.host.actor_ref(who).cursor.clone()
    }

    /// Write a module straight into the stored record.
    pub fn install(
        &mut self,
        container: ContainerId,
        socket: SocketIndex,
        type_id: &str,
        n: u32,
        state: Option<ModuleState>,
    ) {
        let item = module_item(self.engine.content(), type_id, n);
        let record = self.store.records.get_mut(&container).unwrap();
        record.sockets.insert(
            socket,
            InstalledModule {
                module_id: module_id(n),
                snapshot: encode_item(&item),
                state: state.map(|s| encode_state(&s)),
            },
        );
    }

    pub fn stored(&self, container: ContainerId) -> &ContainerRecord {
        &self.store.records[&container]
    }

    pub fn stored_state(&self, container: ContainerId, socket: SocketIndex, kind: ModuleKind) -> ModuleState {
        modules::load_state(&self.stored(container).sockets[&socket], kind)
    }

    pub fn put(&mut self, container: ContainerId, slot: usize, item: ItemStack) {
        self.store.records.get_mut(&container).unwrap().contents[slot] = Some(item);
    }
}
