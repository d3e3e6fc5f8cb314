//! Public item formatting
//!
//! Converts an internal [`Record`] into the item JSON served to clients. One
//! record can expand into several items: the parent plus one child item per
//! note. Fields outside the known set are dropped with a diagnostic rather
//! than merged into the output.

use crate::record::{Record, KNOWN_CREATOR_TYPES, KNOWN_FIELDS, KNOWN_ITEM_TYPES};
use rand::Rng;
use serde_json::{json, Map, Value};
use tracing::debug;

/// Alphabet for public object keys (no 0/1/O, matching common catalog keys)
const KEY_ALPHABET: &[u8] = b"23456789ABCDEFGHIJKLMNPQRSTUVWXYZ";

const KEY_LENGTH: usize = 8;

/// Generate a fresh 8-character object key
pub fn generate_object_key() -> String {
    let mut rng = rand::thread_rng();
    (0..KEY_LENGTH)
        .map(|_| KEY_ALPHABET[rng.gen_range(0..KEY_ALPHABET.len())] as char)
        .collect()
}

/// Convert a record into its public item array.
///
/// The first element is always the parent item (`key`, `version: 0`,
/// `itemType`, creators, tags and the surviving scalar fields); each note on
/// the record appends a `note` item pointing at the parent's key.
pub fn to_api_items(record: &Record) -> Vec<Value> {
    let key = generate_object_key();

    let mut item = Map::new();
    item.insert("key".into(), json!(key));
    item.insert("version".into(), json!(0));

    let item_type = if KNOWN_ITEM_TYPES.contains(record.item_type.as_str()) {
        record.item_type.as_str()
    } else {
        debug!(item_type = %record.item_type, "unknown item type; formatting as webpage");
        "webpage"
    };
    item.insert("itemType".into(), json!(item_type));

    if !record.creators.is_empty() {
        item.insert("creators".into(), Value::Array(format_creators(record)));
    }

    if !record.tags.is_empty() {
        let tags: Vec<Value> = record
            .tags
            .iter()
            .filter(|t| !t.is_empty())
            .map(|t| json!({ "tag": t, "type": 1 }))
            .collect();
        item.insert("tags".into(), Value::Array(tags));
    }

    for (name, value) in &record.fields {
        if !KNOWN_FIELDS.contains(name.as_str()) {
            debug!(field = %name, "discarded unknown field");
            continue;
        }
        let value = if name == "accessDate" && value == "CURRENT_TIMESTAMP" {
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
        } else {
            value.clone()
        };
        item.insert(name.clone(), json!(value));
    }

    let mut items = vec![Value::Object(item)];
    for note in &record.notes {
        if note.is_empty() {
            debug!("discarded empty note");
            continue;
        }
        items.push(json!({
            "itemType": "note",
            "parentItem": key,
            "note": note,
        }));
    }

    items
}

fn format_creators(record: &Record) -> Vec<Value> {
    let mut creators = Vec::new();
    for creator in &record.creators {
        let first = creator.first_name.as_deref().unwrap_or("");
        let last = creator.last_name.as_deref().unwrap_or("");
        if first.is_empty() && last.is_empty() {
            debug!("silently dropping empty creator");
            continue;
        }

        let mut entry = Map::new();
        if creator.single_field || first.is_empty() {
            entry.insert("name".into(), json!(last));
        } else {
            entry.insert("firstName".into(), json!(first));
            entry.insert("lastName".into(), json!(last));
        }

        let creator_type = match creator.creator_type.as_deref() {
            Some(t) if KNOWN_CREATOR_TYPES.contains(t) => t,
            Some(t) => {
                debug!(creator_type = %t, "invalid creator type; falling back to author");
                "author"
            }
            None => "author",
        };
        entry.insert("creatorType".into(), json!(creator_type));

        creators.push(Value::Object(entry));
    }
    creators
}
