//! On-disk layout of the knowledge file.
//!
//! A single JSON object mapping string-encoded integer ids to entry text,
//! pretty-printed with keys in ascending numeric order:
//!
//! ```json
//! {
//!   "0": "first finding",
//!   "1": "second finding"
//! }
//! ```

use sleuth_core::KnowledgeEntry;
use sleuth_core::error::KnowledgeError;
use std::collections::BTreeMap;

pub type EntryMap = BTreeMap<u64, String>;

/// Parse file contents. Empty or whitespace-only input is an empty store.
pub fn decode(bytes: &[u8]) -> Result<EntryMap, KnowledgeError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(EntryMap::new());
    }
    serde_json::from_slice(bytes).map_err(|e| KnowledgeError::Corrupt(e.to_string()))
}

pub fn encode(entries: &EntryMap) -> Result<Vec<u8>, KnowledgeError> {
    serde_json::to_vec_pretty(entries).map_err(|e| KnowledgeError::Storage(e.to_string()))
}

/// Id for the next entry: one past the highest, or `base` when empty.
pub fn next_id(entries: &EntryMap, base: u64) -> u64 {
    entries
        .last_key_value()
        .map(|(id, _)| id + 1)
        .unwrap_or(base)
}

pub fn to_entries(entries: EntryMap) -> Vec<KnowledgeEntry> {
    entries
        .into_iter()
        .map(|(id, text)| KnowledgeEntry { id, text })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_numeric_strings_in_numeric_order() {
        let mut map = EntryMap::new();
        map.insert(10, "ten".into());
        map.insert(2, "two".into());
        let text = String::from_utf8(encode(&map).unwrap()).unwrap();
        assert!(text.find("\"2\"").unwrap() < text.find("\"10\"").unwrap());

        let back = decode(text.as_bytes()).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn empty_input_is_empty_store() {
        assert!(decode(b"").unwrap().is_empty());
        assert!(decode(b"  \n").unwrap().is_empty());
        assert!(decode(b"{}").unwrap().is_empty());
    }

    #[test]
    fn non_numeric_keys_are_corrupt() {
        assert!(matches!(
            decode(br#"{"abc": "x"}"#),
            Err(KnowledgeError::Corrupt(_))
        ));
        assert!(matches!(decode(b"[1,2]"), Err(KnowledgeError::Corrupt(_))));
        assert!(matches!(
            decode(br#"{"1": 5}"#),
            Err(KnowledgeError::Corrupt(_))
        ));
    }

    #[test]
    fn next_id_respects_base() {
        let mut map = EntryMap::new();
        assert_eq!(next_id(&map, 0), 0);
        assert_eq!(next_id(&map, 1), 1);
        map.insert(4, "x".into());
        assert_eq!(next_id(&map, 0), 5);
    }
}
