//! Byte encodings for everything the store keeps as a blob: item stacks,
//! logical contents and (via `modules`) module state.
//!
//! Decoding never fails loudly. Corrupt or foreign blobs decode to `None` or
//! an empty value so a damaged record still opens.

use bincode::Options;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::ItemStack;

/// Refuse to allocate for blobs larger than this while decoding.
const MAX_BLOB_BYTES: u64 = 4 * 1024 * 1024;

pub const CONTENTS_FORMAT_VERSION: u16 = 1;

#[derive(Serialize, Deserialize)]
struct ContentsBlob {
    version: u16,
    slots: Vec<Option<ItemStack>>,
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Vec<u8> {
    match bincode::DefaultOptions::new().serialize(value) {
        Ok(bytes) => bytes,
        Err(err) => {
            // Plain derive types cannot fail to serialize; keep the engine running regardless.
            tracing::error!(%err, "blob encode failed");
            Vec::new()
        }
    }
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Option<T> {
    bincode::DefaultOptions::new()
        .with_limit(MAX_BLOB_BYTES)
        .deserialize(bytes)
        .ok()
}

pub fn encode_item(item: &ItemStack) -> Vec<u8> {
    encode(item)
}

pub fn decode_item(bytes: &[u8]) -> Option<ItemStack> {
    let item = decode::<ItemStack>(bytes);
    if item.is_none() && !bytes.is_empty() {
        tracing::warn!(len = bytes.len(), "undecodable item payload");
    }
    item
}

pub fn encode_contents(slots: &[Option<ItemStack>]) -> Vec<u8> {
    encode(&ContentsBlob {
        version: CONTENTS_FORMAT_VERSION,
        slots: slots.to_vec(),
    })
}

/// Decode logical contents. Unknown versions and corrupt bytes yield no items.
pub fn decode_contents(bytes: &[u8]) -> Vec<Option<ItemStack>> {
    if bytes.is_empty() {
        return Vec::new();
    }
    match decode::<ContentsBlob>(bytes) {
        Some(blob) if blob.version == CONTENTS_FORMAT_VERSION => blob.slots,
        Some(blob) => {
            tracing::warn!(version = blob.version, "unsupported contents format, treating as empty");
            Vec::new()
        }
        None => {
            tracing::warn!(len = bytes.len(), "corrupt contents blob, treating as empty");
            Vec::new()
        }
    }
}
