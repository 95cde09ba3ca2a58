//! Record store round-trips against a temporary SQLite file.

use stash_core::modules::{encode_state, ModuleState, TankState};
use stash_core::test_fixtures::{
    actor, base_content, container, module_id, module_item, origin, FakeHost,
};
use stash_core::{
    encode_item, Click, ContainerRecord, InstalledModule, Intent, ItemStack, NewVoidEntry, Outcome,
    Owner, RecordStore, StashEngine, StashError,
};
use stash_store::SqliteStore;
use tempfile::TempDir;

fn temp_store() -> (TempDir, SqliteStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("stash.db")).unwrap();
    (dir, store)
}

fn voided(n: u32, kind: &str, amount: u32) -> NewVoidEntry {
    let item = ItemStack::new(kind, amount);
    NewVoidEntry {
        actor: Some(Owner {
            id: actor(n),
            name: format!("actor{n}"),
        }),
        container_id: container(1),
        container_type: "small".to_string(),
        module_id: module_id(5),
        item_kind: item.kind.clone(),
        amount,
        payload: encode_item(&item),
        location: Some(origin()),
    }
}

#[test]
fn record_with_sockets_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stash.db");
    let content = base_content();

    let mut record = ContainerRecord::new(container(1), "small", 27);
    record.owner = Some(Owner {
        id: actor(1),
        name: "ana".to_string(),
    });
    record.contents[0] = Some(ItemStack::new("stone", 12));
    record.contents[26] = Some(ItemStack::new("apple", 3).with_name("Lunch"));
    let tank = TankState {
        fluid_units: 2,
        fluid_kind: Some("water".to_string()),
        ..TankState::default()
    };
    record.sockets.insert(
        1,
        InstalledModule {
            module_id: module_id(1),
            snapshot: encode_item(&module_item(&content, "tank", 1)),
            state: Some(encode_state(&ModuleState::Tank(tank))),
        },
    );

    {
        let mut store = SqliteStore::open(&path).unwrap();
        store.insert(&mut record).unwrap();
        assert!(record.created_at_ms > 0);
        assert_eq!(record.created_at_ms, record.updated_at_ms);
    }

    let mut store = SqliteStore::open(&path).unwrap();
    let loaded = store.load(container(1)).unwrap().unwrap();
    assert_eq!(loaded, record);
    assert_eq!(loaded.sockets[&1].display_item().unwrap().kind, "cauldron");
}

#[test]
fn save_replaces_socket_rows() {
    let (_dir, mut store) = temp_store();
    let content = base_content();
    let mut record = ContainerRecord::new(container(2), "large", 54);
    for (socket, (type_id, n)) in [("tank", 1), ("magnet", 2)].into_iter().enumerate() {
        record.sockets.insert(
            socket as u8,
            InstalledModule {
                module_id: module_id(n),
                snapshot: encode_item(&module_item(&content, type_id, n)),
                state: None,
            },
        );
    }
    store.insert(&mut record).unwrap();

    record.sockets.remove(&0);
    record.contents[53] = Some(ItemStack::new("diamond", 1));
    store.save(&mut record).unwrap();

    let loaded = store.load(container(2)).unwrap().unwrap();
    assert_eq!(loaded.sockets.len(), 1);
    assert_eq!(loaded.sockets[&1].module_id, module_id(2));
    assert_eq!(loaded.contents[53], Some(ItemStack::new("diamond", 1)));
    assert!(loaded.updated_at_ms >= loaded.created_at_ms);

    let summaries = store.list_containers().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].socket_count, 1);
    assert_eq!(summaries[0].type_id, "large");
}

#[test]
fn missing_container_loads_as_none() {
    let (_dir, mut store) = temp_store();
    assert!(store.load(container(9)).unwrap().is_none());
}

#[test]
fn corrupt_contents_blob_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stash.db");
    let mut store = SqliteStore::open(&path).unwrap();
    let mut record = ContainerRecord::new(container(3), "small", 27);
    record.contents[4] = Some(ItemStack::new("stone", 1));
    store.insert(&mut record).unwrap();
    drop(store);

    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute(
        "UPDATE containers SET contents = ?1 WHERE id = ?2",
        (vec![0xFF_u8, 0x00, 0x13, 0x37], container(3).to_string()),
    )
    .unwrap();
    drop(conn);

    let mut store = SqliteStore::open(&path).unwrap();
    let loaded = store.load(container(3)).unwrap().unwrap();
    assert!(loaded.contents.iter().all(Option::is_none));
}

#[test]
fn void_entries_are_newest_first_and_filterable() {
    let (_dir, mut store) = temp_store();
    let first = store.append_void_entry(&voided(1, "dirt", 4)).unwrap();
    let second = store.append_void_entry(&voided(2, "stone", 9)).unwrap();
    let third = store.append_void_entry(&voided(1, "dirt", 1)).unwrap();
    assert!(first < second && second < third);

    let all = store.void_entries(None, false).unwrap();
    assert_eq!(
        all.iter().map(|e| e.id).collect::<Vec<_>>(),
        vec![third, second, first]
    );
    assert_eq!(all[1].actor_name.as_deref(), Some("actor2"));
    assert_eq!(all[1].location.as_deref(), Some("overworld@0.0,64.0,0.0"));

    let mine = store.void_entries(Some(actor(1)), false).unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|e| e.actor_id == Some(actor(1))));

    assert!(store.mark_recovered(first, "op").unwrap());
    let open_rows = store.void_entries(Some(actor(1)), false).unwrap();
    assert_eq!(open_rows.len(), 1);
    assert_eq!(open_rows[0].id, third);
    assert_eq!(store.void_entries(Some(actor(1)), true).unwrap().len(), 2);
}

#[test]
fn recovery_fields_are_set_at_most_once() {
    let (_dir, mut store) = temp_store();
    let id = store.append_void_entry(&voided(1, "diamond", 2)).unwrap();

    assert!(store.mark_recovered(id, "first-op").unwrap());
    assert!(!store.mark_recovered(id, "second-op").unwrap());
    let row = store.void_entry(id).unwrap().unwrap();
    assert!(row.is_recovered());
    assert_eq!(row.recovered_by.as_deref(), Some("first-op"));
    assert_eq!(
        stash_core::decode_item(&row.payload),
        Some(ItemStack::new("diamond", 2))
    );

    assert!(matches!(
        store.mark_recovered(404, "op"),
        Err(StashError::AuditEntryNotFound(404))
    ));
    assert!(store.void_entry(404).unwrap().is_none());
}

#[test]
fn engine_session_persists_through_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stash.db");
    let mut store = SqliteStore::open(&path).unwrap();
    let mut host = FakeHost::with_actors(&[1]);
    let mut engine = StashEngine::new(base_content(), 11);

    let item = engine.create_container(&mut store, "small", None).unwrap();
    let id = item.container_id().unwrap();
    host.stock(actor(1), item.clone());
    assert!(engine.open(&mut store, &mut host, actor(1), &item).unwrap());

    host.actor_mut(actor(1)).cursor = Some(ItemStack::new("bread", 5));
    let outcome = engine
        .handle(
            &mut store,
            &mut host,
            actor(1),
            Intent::Click {
                slot: 7,
                click: Click::Primary,
            },
        )
        .unwrap();
    assert_eq!(outcome, Outcome::Applied);

    host.actor_mut(actor(1)).cursor = Some(module_item(engine.content(), "magnet", 1));
    let outcome = engine
        .handle(
            &mut store,
            &mut host,
            actor(1),
            Intent::Click {
                slot: 30,
                click: Click::Primary,
            },
        )
        .unwrap();
    assert_eq!(outcome, Outcome::Applied);
    engine.close(&mut store, &mut host, actor(1)).unwrap();
    drop(store);

    let mut store = SqliteStore::open(&path).unwrap();
    let loaded = store.load(id).unwrap().unwrap();
    assert_eq!(loaded.contents[7], Some(ItemStack::new("bread", 5)));
    assert_eq!(loaded.sockets[&0].module_id, module_id(1));
}
