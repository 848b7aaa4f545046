//! Character vocabularies.
//!
//! Maps between token strings (single characters plus the reserved
//! `<pad>`, `<sos>` and `<eos>` markers) and embedding indices.

use std::collections::{BTreeMap, HashMap};

use crate::inference::model_loader::ModelError;

pub const PAD_TOKEN: &str = "<pad>";
pub const SOS_TOKEN: &str = "<sos>";
pub const EOS_TOKEN: &str = "<eos>";

/// Index used for a reserved token the vocabulary does not list.
const PAD_FALLBACK: u32 = 0;
const SOS_FALLBACK: u32 = 1;
const EOS_FALLBACK: u32 = 2;

/// Index assigned to characters missing from the vocabulary.
pub const UNKNOWN_INDEX: u32 = 0;

/// Bidirectional token ↔ index mapping.
#[derive(Debug, Clone)]
pub struct Vocab {
    token_to_index: HashMap<String, u32>,
    index_to_token: HashMap<u32, String>,
    pad: u32,
    sos: u32,
    eos: u32,
}

impl Vocab {
    /// Build a vocabulary from a `token -> index` table.
    ///
    /// Two tokens sharing an index is rejected since decoding would be ambiguous.
    pub fn from_map(token_to_index: HashMap<String, u32>) -> Result<Self, ModelError> {
        let mut index_to_token = HashMap::with_capacity(token_to_index.len());
        for (token, &idx) in &token_to_index {
            if let Some(prev) = index_to_token.insert(idx, token.clone()) {
                return Err(ModelError::InvalidVocab(format!(
                    "index {idx} assigned to both {prev:?} and {token:?}"
                )));
            }
        }

        let lookup = |token: &str, fallback: u32| token_to_index.get(token).copied().unwrap_or(fallback);
        let pad = lookup(PAD_TOKEN, PAD_FALLBACK);
        let sos = lookup(SOS_TOKEN, SOS_FALLBACK);
        let eos = lookup(EOS_TOKEN, EOS_FALLBACK);

        Ok(Self {
            token_to_index,
            index_to_token,
            pad,
            sos,
            eos,
        })
    }

    /// Number of entries in the mapping.
    pub fn len(&self) -> usize {
        self.token_to_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.token_to_index.is_empty()
    }

    pub fn pad(&self) -> u32 {
        self.pad
    }

    pub fn sos(&self) -> u32 {
        self.sos
    }

    pub fn eos(&self) -> u32 {
        self.eos
    }

    /// Index of a single character, [`UNKNOWN_INDEX`] if absent.
    pub fn index_of_char(&self, c: char) -> u32 {
        let mut buf = [0u8; 4];
        let key: &str = c.encode_utf8(&mut buf);
        self.token_to_index
            .get(key)
            .copied()
            .unwrap_or(UNKNOWN_INDEX)
    }

    /// Token string for an index, if the vocabulary has one.
    pub fn token(&self, idx: u32) -> Option<&str> {
        self.index_to_token.get(&idx).map(String::as_str)
    }

    /// The `token -> index` table, ordered by token for stable serialization.
    pub fn to_map(&self) -> BTreeMap<String, u32> {
        self.token_to_index
            .iter()
            .map(|(t, &i)| (t.clone(), i))
            .collect()
    }
}
