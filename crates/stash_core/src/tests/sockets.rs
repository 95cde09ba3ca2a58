use super::World;
use crate::modules::{CookingState, ModuleState, PlayMode, PlaybackState, TankState};
use crate::test_fixtures::{actor, module_id, module_item};
use crate::{tags, Click, EngineEvent, ItemStack, ModuleKind, Outcome, ScreenKind};

const SOCKET_0: usize = 30;
const SOCKET_1: usize = 31;

fn tank(state: &ModuleState) -> TankState {
    match state {
        ModuleState::Tank(tank) => tank.clone(),
        other => panic!("expected a tank, got {other:?}"),
    }
}

fn playback(state: &ModuleState) -> PlaybackState {
    match state {
        ModuleState::Playback(playback) => playback.clone(),
        other => panic!("expected playback, got {other:?}"),
    }
}

#[test]
fn install_writes_through_and_types_are_singletons() {
    let mut w = World::new();
    let (id, item) = w.carried("small");
    assert!(w.open(actor(1), &item));

    let tank_a = module_item(w.engine.content(), "tank", 1);
    w.hold(actor(1), tank_a);
    assert_eq!(w.click(actor(1), SOCKET_0, Click::Primary), Outcome::Applied);
    assert_eq!(w.store.saves, 1);
    assert_eq!(w.stored(id).sockets[&0].module_id, module_id(1));
    assert_eq!(w.cursor(actor(1)), None);
    assert!(w.host.view(actor(1))[SOCKET_0]
        .as_ref()
        .is_some_and(|icon| icon.kind == "cauldron"));

    let tank_b = module_item(w.engine.content(), "tank", 2);
    w.hold(actor(1), tank_b.clone());
    assert_eq!(w.click(actor(1), SOCKET_1, Click::Primary), Outcome::Rejected);
    assert_eq!(w.cursor(actor(1)), Some(tank_b));

    w.hold(actor(1), ItemStack::new("stone", 1));
    assert_eq!(w.click(actor(1), SOCKET_1, Click::Primary), Outcome::Rejected);
    assert_eq!(w.stored(id).sockets.len(), 1);
}

#[test]
fn tank_fills_drains_and_switches_pools_only_when_empty() {
    let mut w = World::new();
    let (id, item) = w.carried("small");
    w.install(id, 0, "tank", 1, None);
    assert!(w.open(actor(1), &item));

    w.hold(actor(1), ItemStack::new("water_bucket", 1));
    assert_eq!(w.click(actor(1), SOCKET_0, Click::Primary), Outcome::Applied);
    assert_eq!(w.cursor(actor(1)), Some(ItemStack::new("bucket", 1)));
    let state = tank(&w.stored_state(id, 0, ModuleKind::Tank));
    assert_eq!(state.fluid_units, 1);
    assert_eq!(state.fluid_kind.as_deref(), Some("water"));

    // A pool with units in it pins the mode.
    assert_eq!(w.click(actor(1), SOCKET_0, Click::Drop), Outcome::Rejected);

    assert_eq!(w.click(actor(1), SOCKET_0, Click::Primary), Outcome::Applied);
    assert_eq!(w.cursor(actor(1)), Some(ItemStack::new("water_bucket", 1)));
    assert!(tank(&w.stored_state(id, 0, ModuleKind::Tank)).is_empty());
    w.advance(1);

    assert_eq!(w.click(actor(1), SOCKET_0, Click::Drop), Outcome::Applied);
    w.host.actor_mut(actor(1)).bottled = 3;
    assert_eq!(w.click(actor(1), SOCKET_0, Click::Primary), Outcome::Applied);
    assert_eq!(w.host.actor_ref(actor(1)).bottled, 2);
    let state = tank(&w.stored_state(id, 0, ModuleKind::Tank));
    assert!(state.bottled_mode);
    assert_eq!((state.bottled_units, state.fluid_units), (1, 0));

    assert_eq!(w.click(actor(1), SOCKET_0, Click::Secondary), Outcome::Applied);
    assert_eq!(w.host.actor_ref(actor(1)).bottled, 3);
    assert!(tank(&w.stored_state(id, 0, ModuleKind::Tank)).is_empty());
}

#[test]
fn draining_into_a_stack_hands_back_one_filled() {
    let mut w = World::new();
    let (id, item) = w.carried("small");
    let state = TankState {
        fluid_units: 2,
        fluid_kind: Some("water".to_string()),
        ..TankState::default()
    };
    w.install(id, 0, "tank", 1, Some(ModuleState::Tank(state)));
    assert!(w.open(actor(1), &item));

    w.hold(actor(1), ItemStack::new("bucket", 3));
    assert_eq!(w.click(actor(1), SOCKET_0, Click::Primary), Outcome::Applied);
    assert_eq!(w.cursor(actor(1)), Some(ItemStack::new("bucket", 2)));
    assert_eq!(w.host.inventory_total(actor(1), "water_bucket"), 1);
    assert_eq!(tank(&w.stored_state(id, 0, ModuleKind::Tank)).fluid_units, 1);

    // Lava does not mix into water.
    w.hold(actor(1), ItemStack::new("lava_bucket", 1));
    assert_eq!(w.click(actor(1), SOCKET_0, Click::Primary), Outcome::Rejected);
    assert_eq!(w.cursor(actor(1)), Some(ItemStack::new("lava_bucket", 1)));
}

#[test]
fn removal_carries_state_to_the_next_install() {
    let mut w = World::new();
    let (id, item) = w.carried("small");
    let state = TankState {
        fluid_units: 2,
        fluid_kind: Some("lava".to_string()),
        ..TankState::default()
    };
    w.install(id, 0, "tank", 1, Some(ModuleState::Tank(state.clone())));
    assert!(w.open(actor(1), &item));

    assert_eq!(w.click(actor(1), SOCKET_0, Click::ShiftPrimary), Outcome::Applied);
    assert!(w.stored(id).sockets.is_empty());
    let removed = w
        .host
        .actor_ref(actor(1))
        .inventory
        .iter()
        .flatten()
        .find(|s| s.is_module())
        .cloned()
        .unwrap();
    assert!(removed.tag_bytes(tags::MODULE_STATE).is_some());

    w.hold(actor(1), removed);
    assert_eq!(w.click(actor(1), SOCKET_1, Click::Primary), Outcome::Applied);
    assert_eq!(w.stored_state(id, 1, ModuleKind::Tank), ModuleState::Tank(state));
    let snapshot = w.stored(id).sockets[&1].display_item().unwrap();
    assert!(snapshot.tag_bytes(tags::MODULE_STATE).is_none());
}

#[test]
fn toggle_flips_the_enabled_flag() {
    let mut w = World::new();
    let (id, item) = w.carried("small");
    w.install(id, 0, "magnet", 1, None);
    assert!(w.open(actor(1), &item));

    assert_eq!(w.click(actor(1), SOCKET_0, Click::ShiftSecondary), Outcome::Applied);
    assert!(!w.stored(id).sockets[&0].is_enabled());
    assert!(w.host.view(actor(1))[SOCKET_0]
        .as_ref()
        .is_some_and(|icon| icon.lore.iter().any(|l| l == "Disabled")));

    assert_eq!(w.click(actor(1), SOCKET_0, Click::ShiftSecondary), Outcome::Applied);
    assert!(w.stored(id).sockets[&0].is_enabled());
    let toggles = w
        .engine
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e.event, EngineEvent::ModuleToggled { .. }))
        .count();
    assert_eq!(toggles, 2);

    // Magnets have no secondary action.
    assert_eq!(w.click(actor(1), SOCKET_0, Click::Secondary), Outcome::Rejected);
}

#[test]
fn playback_plays_from_the_socket_and_stops_when_disabled() {
    let mut w = World::new();
    let (id, item) = w.carried("small");
    let program = PlaybackState {
        program: vec![ItemStack::new("disc_cat", 1), ItemStack::new("disc_far", 1)],
        ..PlaybackState::default()
    };
    w.install(id, 0, "jukebox", 1, Some(ModuleState::Playback(program)));
    assert!(w.open(actor(1), &item));

    assert_eq!(w.click(actor(1), SOCKET_0, Click::Primary), Outcome::Applied);
    assert_eq!(w.host.cues, vec![(actor(1), "music.cat".to_string())]);
    assert!(playback(&w.stored_state(id, 0, ModuleKind::Playback)).playing);

    assert_eq!(w.click(actor(1), SOCKET_0, Click::Drop), Outcome::Applied);
    assert_eq!(
        playback(&w.stored_state(id, 0, ModuleKind::Playback)).mode,
        PlayMode::RepeatOne
    );
    w.advance(1);

    assert_eq!(w.click(actor(1), SOCKET_0, Click::ShiftSecondary), Outcome::Applied);
    assert!(w.host.cues.is_empty());
    assert!(!playback(&w.stored_state(id, 0, ModuleKind::Playback)).playing);
    assert_eq!(w.click(actor(1), SOCKET_0, Click::Primary), Outcome::Rejected);
}

#[test]
fn program_screen_routes_tracks_into_the_module() {
    let mut w = World::new();
    let (id, item) = w.carried("small");
    w.install(id, 0, "jukebox", 1, None);
    assert!(w.open(actor(1), &item));

    assert_eq!(w.click(actor(1), SOCKET_0, Click::Secondary), Outcome::Applied);
    assert!(w.engine.session(actor(1)).is_none());
    assert_eq!(w.engine.sub_screen(actor(1)).unwrap().screen, ScreenKind::Program);
    let (screen, _, slots) = w.host.actor_ref(actor(1)).screen.clone().unwrap();
    assert_eq!(screen, ScreenKind::Program);
    assert_eq!(slots.len(), 9);

    // A second actor can neither open the same screen nor pull the module.
    assert!(w.open(actor(2), &item));
    assert_eq!(w.click(actor(2), SOCKET_0, Click::Secondary), Outcome::Rejected);
    assert_eq!(w.click(actor(2), SOCKET_0, Click::ShiftPrimary), Outcome::Rejected);
    w.close(actor(2));

    let edited = vec![
        Some(ItemStack::new("disc_blocks", 1)),
        Some(ItemStack::new("dirt", 2)),
        None,
    ];
    w.engine
        .close_sub_screen(&mut w.store, &mut w.host, actor(1), edited)
        .unwrap();
    assert!(w.engine.sub_screen(actor(1)).is_none());
    assert_eq!(
        playback(&w.stored_state(id, 0, ModuleKind::Playback)).program,
        vec![ItemStack::new("disc_blocks", 1)]
    );
    assert_eq!(w.host.inventory_total(actor(1), "dirt"), 2);
    assert!(w.engine.record(id).is_none());
}

#[test]
fn closing_without_a_screen_hands_items_back() {
    let mut w = World::new();
    w.engine
        .close_sub_screen(
            &mut w.store,
            &mut w.host,
            actor(1),
            vec![Some(ItemStack::new("apple", 2))],
        )
        .unwrap();
    assert_eq!(w.host.inventory_total(actor(1), "apple"), 2);
}

#[test]
fn an_open_module_screen_blocks_opening_a_main_view() {
    let mut w = World::new();
    let (id, item) = w.carried("small");
    w.install(id, 0, "furnace", 1, None);
    assert!(w.open(actor(1), &item));
    assert_eq!(w.click(actor(1), SOCKET_0, Click::Secondary), Outcome::Applied);
    assert!(!w.open(actor(1), &item));
}

#[test]
fn stacked_module_items_are_not_installed() {
    let mut w = World::new();
    let (id, item) = w.carried("small");
    assert!(w.open(actor(1), &item));

    let pair = module_item(w.engine.content(), "tank", 1).with_amount(2);
    w.hold(actor(1), pair.clone());
    assert_eq!(w.click(actor(1), SOCKET_0, Click::Primary), Outcome::Rejected);
    assert_eq!(w.cursor(actor(1)), Some(pair));
    assert!(w.engine.record(id).unwrap().sockets.is_empty());
}

#[test]
fn disconnect_routes_the_open_cooking_screen() {
    let mut w = World::new();
    let (id, item) = w.carried("small");
    let cooking = CookingState {
        input: Some(ItemStack::new("raw_iron", 4)),
        fuel: Some(ItemStack::new("coal", 2)),
        ..CookingState::default()
    };
    w.install(id, 0, "furnace", 1, Some(ModuleState::Cooking(Box::new(cooking))));
    assert!(w.open(actor(1), &item));
    assert_eq!(w.click(actor(1), SOCKET_0, Click::Secondary), Outcome::Applied);

    // The actor takes the ore out of the input slot and leaves.
    let screen = w.host.actor_mut(actor(1)).screen.as_mut().unwrap();
    assert_eq!(screen.2[0], Some(ItemStack::new("raw_iron", 4)));
    screen.2[0] = None;
    w.hold(actor(1), ItemStack::new("raw_iron", 4));
    w.engine
        .disconnect(&mut w.store, &mut w.host, actor(1))
        .unwrap();

    assert!(w.engine.sub_screen(actor(1)).is_none());
    assert!(w.engine.record(id).is_none());
    let ModuleState::Cooking(state) = w.stored_state(id, 0, ModuleKind::Cooking) else {
        panic!("expected cooking state");
    };
    assert_eq!(state.input, None);
    assert_eq!(state.fuel, Some(ItemStack::new("coal", 2)));
    assert_eq!(w.host.holdings(actor(1), "raw_iron"), 4);
    assert!(w
        .engine
        .drain_events()
        .iter()
        .any(|e| matches!(e.event, EngineEvent::SubScreenClosed { .. })));
}
