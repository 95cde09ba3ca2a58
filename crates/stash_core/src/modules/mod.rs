//! Module state machines and their versioned state blobs.
//!
//! Every installed module owns one state blob in the container record. The
//! blob is an envelope `{version, body}`; bodies of older versions go through
//! `migrate`, anything undecodable falls back to the kind's default state.

pub mod cooking;
pub mod feeding;
pub mod magnet;
pub mod playback;
pub mod tank;

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::{InstalledModule, ModuleKind};

pub use cooking::CookingState;
pub use feeding::FeedingState;
pub use magnet::{DiscardState, MagnetState};
pub use playback::{CueChange, PlayMode, PlaybackState};
pub use tank::TankState;

pub const STATE_FORMAT_VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleState {
    Tank(TankState),
    Cooking(Box<CookingState>),
    Feeding(FeedingState),
    Magnet(MagnetState),
    Discard(DiscardState),
    Playback(PlaybackState),
}

impl ModuleState {
    pub fn default_for(kind: ModuleKind) -> Self {
        match kind {
            ModuleKind::Tank => Self::Tank(TankState::default()),
            ModuleKind::Cooking => Self::Cooking(Box::default()),
            ModuleKind::Feeding => Self::Feeding(FeedingState::default()),
            ModuleKind::Magnet => Self::Magnet(MagnetState::default()),
            ModuleKind::Discard => Self::Discard(DiscardState::default()),
            ModuleKind::Playback => Self::Playback(PlaybackState::default()),
        }
    }

    pub fn kind(&self) -> ModuleKind {
        match self {
            Self::Tank(_) => ModuleKind::Tank,
            Self::Cooking(_) => ModuleKind::Cooking,
            Self::Feeding(_) => ModuleKind::Feeding,
            Self::Magnet(_) => ModuleKind::Magnet,
            Self::Discard(_) => ModuleKind::Discard,
            Self::Playback(_) => ModuleKind::Playback,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct StateEnvelope {
    version: u16,
    body: Vec<u8>,
}

/// Decode a body written by an older format. No older formats exist yet.
fn migrate(version: u16, body: &[u8]) -> Option<ModuleState> {
    match version {
        STATE_FORMAT_VERSION => codec::decode(body),
        _ => None,
    }
}

pub fn encode_state(state: &ModuleState) -> Vec<u8> {
    codec::encode(&StateEnvelope {
        version: STATE_FORMAT_VERSION,
        body: codec::encode(state),
    })
}

/// Decode a state blob for a module of `kind`, defaulting on absence, corruption,
/// unknown versions and kind mismatches.
pub fn decode_state(kind: ModuleKind, bytes: Option<&[u8]>) -> ModuleState {
    let Some(bytes) = bytes.filter(|b| !b.is_empty()) else {
        return ModuleState::default_for(kind);
    };
    let decoded = codec::decode::<StateEnvelope>(bytes).and_then(|env| {
        let state = migrate(env.version, &env.body);
        if state.is_none() {
            tracing::warn!(version = env.version, kind = kind.label(), "unreadable module state version");
        }
        state
    });
    match decoded {
        Some(state) if state.kind() == kind => state,
        Some(state) => {
            tracing::warn!(
                expected = kind.label(),
                found = state.kind().label(),
                "module state of another kind, resetting"
            );
            ModuleState::default_for(kind)
        }
        None => {
            tracing::warn!(kind = kind.label(), len = bytes.len(), "corrupt module state, resetting");
            ModuleState::default_for(kind)
        }
    }
}

pub fn load_state(module: &InstalledModule, kind: ModuleKind) -> ModuleState {
    decode_state(kind, module.state.as_deref())
}

pub fn store_state(module: &mut InstalledModule, state: &ModuleState) {
    module.state = Some(encode_state(state));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_survives_encoding() {
        let state = ModuleState::Tank(TankState {
            fluid_units: 3,
            fluid_kind: Some("water".to_string()),
            bottled_units: 0,
            bottled_mode: false,
        });
        let bytes = encode_state(&state);
        assert_eq!(decode_state(ModuleKind::Tank, Some(&bytes)), state);
    }

    #[test]
    fn absent_or_corrupt_state_defaults() {
        assert_eq!(
            decode_state(ModuleKind::Cooking, None),
            ModuleState::Cooking(Box::default())
        );
        assert_eq!(
            decode_state(ModuleKind::Magnet, Some(&[0xde, 0xad, 0xbe, 0xef])),
            ModuleState::Magnet(MagnetState::default())
        );
    }

    #[test]
    fn foreign_kind_resets() {
        let bytes = encode_state(&ModuleState::Magnet(MagnetState { collected_total: 9 }));
        assert_eq!(
            decode_state(ModuleKind::Discard, Some(&bytes)),
            ModuleState::Discard(DiscardState::default())
        );
    }

    #[test]
    fn unknown_version_defaults() {
        let bytes = codec::encode(&StateEnvelope {
            version: STATE_FORMAT_VERSION + 7,
            body: codec::encode(&ModuleState::Magnet(MagnetState { collected_total: 9 })),
        });
        assert_eq!(
            decode_state(ModuleKind::Magnet, Some(&bytes)),
            ModuleState::Magnet(MagnetState::default())
        );
    }
}
