use rand::Rng;
use uuid::Uuid;

use crate::{ContainerId, ModuleId};

/// Generate a v4-format UUID from the engine's RNG so seeded runs stay reproducible.
pub fn generate_uuid(rng: &mut impl Rng) -> Uuid {
    let bytes: [u8; 16] = rng.gen();
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

pub fn new_container_id(rng: &mut impl Rng) -> ContainerId {
    ContainerId(generate_uuid(rng))
}

pub fn new_module_id(rng: &mut impl Rng) -> ModuleId {
    ModuleId(generate_uuid(rng))
}
