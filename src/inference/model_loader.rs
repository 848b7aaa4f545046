//! Checkpoint loading and configuration.
//!
//! A checkpoint is a single safetensors file. Tensor names follow the
//! state dict of the trained encoder-decoder (`encoder.embedding.weight`,
//! `decoder.rnn.weight_ih_l0`, `decoder.fc.bias`, ...). The header
//! metadata carries three JSON documents: `cfg` (the architecture record),
//! `src_char2idx` and `tgt_char2idx` (the two vocabularies).

use std::collections::HashMap;
use std::path::Path;

use candle_core::{DType, Device, Tensor};
use safetensors::SafeTensors;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::inference::rnn::CellKind;
use crate::inference::vocab::Vocab;

pub const META_CONFIG: &str = "cfg";
pub const META_SRC_VOCAB: &str = "src_char2idx";
pub const META_TGT_VOCAB: &str = "tgt_char2idx";

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Checkpoint file not found: {0}")]
    FileNotFound(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid safetensors file: {0}")]
    InvalidFormat(#[from] safetensors::SafeTensorError),

    #[error("Checkpoint metadata is missing {0:?}")]
    MissingMetadata(String),

    #[error("Checkpoint metadata {key:?} is not valid JSON: {source}")]
    InvalidMetadata {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid vocabulary: {0}")]
    InvalidVocab(String),

    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),

    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),
}

/// Architecture record stored with the weights.
///
/// Keys use the names the training script wrote. Anything beyond the five
/// architectural fields (learning rate, batch size, ...) is kept in `extra`
/// so it can be reported back verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seq2SeqConfig {
    /// Embedding width (E).
    #[serde(rename = "EMB_DIM")]
    pub emb_dim: usize,

    /// Recurrent hidden size (H).
    #[serde(rename = "HIDDEN")]
    pub hidden: usize,

    /// Stacked recurrent layers, shared by encoder and decoder.
    #[serde(rename = "NUM_LAYERS")]
    pub num_layers: usize,

    /// "LSTM", "GRU", anything else is a plain tanh RNN.
    #[serde(rename = "RNN_CELL")]
    pub rnn_cell: String,

    /// Fixed encoder input length and decode step cap (L).
    #[serde(rename = "MAX_LEN")]
    pub max_len: usize,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Seq2SeqConfig {
    pub fn cell_kind(&self) -> CellKind {
        CellKind::from_name(&self.rnn_cell)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.emb_dim == 0 || self.hidden == 0 || self.num_layers == 0 {
            return Err(ModelError::InvalidConfig(format!(
                "EMB_DIM={}, HIDDEN={}, NUM_LAYERS={} must all be positive",
                self.emb_dim, self.hidden, self.num_layers
            )));
        }
        Ok(())
    }
}

/// Everything read from a checkpoint file.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub config: Seq2SeqConfig,
    pub src_vocab: Vocab,
    pub tgt_vocab: Vocab,

    /// Weight tensors by state-dict name, f32 on CPU.
    pub tensors: HashMap<String, Tensor>,
}

impl Checkpoint {
    /// Load a checkpoint from a safetensors file.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        if !path.exists() {
            return Err(ModelError::FileNotFound(path.display().to_string()));
        }

        let bytes = std::fs::read(path)?;
        let checkpoint = Self::from_bytes(&bytes)?;

        info!(
            path = %path.display(),
            cell = checkpoint.config.rnn_cell,
            emb_dim = checkpoint.config.emb_dim,
            hidden = checkpoint.config.hidden,
            layers = checkpoint.config.num_layers,
            max_len = checkpoint.config.max_len,
            vocab_src = checkpoint.src_vocab.len(),
            vocab_tgt = checkpoint.tgt_vocab.len(),
            tensors = checkpoint.tensors.len(),
            "Loaded checkpoint"
        );

        Ok(checkpoint)
    }

    /// Parse a checkpoint from an in-memory safetensors buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let (_, metadata) = SafeTensors::read_metadata(bytes)?;
        let header = metadata
            .metadata()
            .as_ref()
            .ok_or_else(|| ModelError::MissingMetadata("__metadata__".to_string()))?;

        let config: Seq2SeqConfig = parse_metadata(header, META_CONFIG)?;
        config.validate()?;
        let src_vocab = Vocab::from_map(parse_metadata(header, META_SRC_VOCAB)?)?;
        let tgt_vocab = Vocab::from_map(parse_metadata(header, META_TGT_VOCAB)?)?;

        let tensors = candle_core::safetensors::load_buffer(bytes, &Device::Cpu)?
            .into_iter()
            .map(|(name, t)| Ok((name, t.to_dtype(DType::F32)?)))
            .collect::<Result<HashMap<_, _>, candle_core::Error>>()?;

        Ok(Self {
            config,
            src_vocab,
            tgt_vocab,
            tensors,
        })
    }

    /// Write the checkpoint back out as safetensors with the JSON metadata header.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let to_json = |key: &str, value: serde_json::Result<String>| {
            value.map_err(|source| ModelError::InvalidMetadata {
                key: key.to_string(),
                source,
            })
        };

        let mut header = HashMap::new();
        header.insert(
            META_CONFIG.to_string(),
            to_json(META_CONFIG, serde_json::to_string(&self.config))?,
        );
        header.insert(
            META_SRC_VOCAB.to_string(),
            to_json(META_SRC_VOCAB, serde_json::to_string(&self.src_vocab.to_map()))?,
        );
        header.insert(
            META_TGT_VOCAB.to_string(),
            to_json(META_TGT_VOCAB, serde_json::to_string(&self.tgt_vocab.to_map()))?,
        );

        safetensors::serialize_to_file(
            self.tensors.iter().map(|(name, t)| (name.as_str(), t)),
            &Some(header),
            path,
        )?;
        Ok(())
    }
}

fn parse_metadata<T: DeserializeOwned>(
    header: &HashMap<String, String>,
    key: &str,
) -> Result<T, ModelError> {
    let raw = header
        .get(key)
        .ok_or_else(|| ModelError::MissingMetadata(key.to_string()))?;
    serde_json::from_str(raw).map_err(|source| ModelError::InvalidMetadata {
        key: key.to_string(),
        source,
    })
}

/// Target tokens of the stub checkpoint: `<pad>`, `<sos>`, `<eos>`, `घ`, `र`, `क`.
const STUB_TGT: [&str; 6] = ["<pad>", "<sos>", "<eos>", "घ", "र", "क"];
const STUB_SRC: [&str; 7] = ["<pad>", "<sos>", "<eos>", "g", "h", "a", "r"];

/// Decoder transitions of [`stub_checkpoint`]: `<sos> → घ → र → <eos>`.
pub const STUB_GHAR: [(u32, u32); 6] = [(0, 2), (1, 3), (2, 2), (3, 4), (4, 2), (5, 5)];

/// Create a checkpoint for testing without a real model file.
///
/// Every word decodes to "घर". See [`stub_checkpoint_with_transitions`].
pub fn stub_checkpoint() -> Result<Checkpoint, ModelError> {
    stub_checkpoint_with_transitions(&STUB_GHAR, 8)
}

/// Tiny single-layer tanh-RNN checkpoint whose decoder is a fixed state machine.
///
/// The decoder embeds each target token as a scaled one-hot vector, the
/// recurrent layer passes it through unchanged (no hidden-to-hidden weight),
/// and `fc` maps the one-hot of `from` onto the logit of `to` for every
/// `(from, to)` pair. The encoder is all zeros and has no influence.
pub fn stub_checkpoint_with_transitions(
    transitions: &[(u32, u32)],
    max_len: usize,
) -> Result<Checkpoint, ModelError> {
    let dev = Device::Cpu;
    let v_src = STUB_SRC.len();
    let v_tgt = STUB_TGT.len();
    let hidden = v_tgt;
    let emb = v_tgt;

    let mut fc = vec![0f32; v_tgt * hidden];
    for &(from, to) in transitions {
        fc[to as usize * hidden + from as usize] = 10.0;
    }

    let zeros = |shape: (usize, usize)| Tensor::zeros(shape, DType::F32, &dev);
    let zeros1 = |n: usize| Tensor::zeros(n, DType::F32, &dev);

    let mut tensors = HashMap::new();
    tensors.insert("encoder.embedding.weight".to_string(), zeros((v_src, emb))?);
    tensors.insert("decoder.embedding.weight".to_string(), Tensor::eye(v_tgt, DType::F32, &dev)?.affine(3.0, 0.0)?);
    for side in ["encoder", "decoder"] {
        let ih = if side == "decoder" {
            Tensor::eye(hidden, DType::F32, &dev)?
        } else {
            zeros((hidden, emb))?
        };
        tensors.insert(format!("{side}.rnn.weight_ih_l0"), ih);
        tensors.insert(format!("{side}.rnn.weight_hh_l0"), zeros((hidden, hidden))?);
        tensors.insert(format!("{side}.rnn.bias_ih_l0"), zeros1(hidden)?);
        tensors.insert(format!("{side}.rnn.bias_hh_l0"), zeros1(hidden)?);
    }
    tensors.insert("decoder.fc.weight".to_string(), Tensor::from_vec(fc, (v_tgt, hidden), &dev)?);
    tensors.insert("decoder.fc.bias".to_string(), zeros1(v_tgt)?);

    let vocab = |tokens: &[&str]| {
        Vocab::from_map(
            tokens
                .iter()
                .enumerate()
                .map(|(i, t)| (t.to_string(), i as u32))
                .collect(),
        )
    };

    Ok(Checkpoint {
        config: Seq2SeqConfig {
            emb_dim: emb,
            hidden,
            num_layers: 1,
            rnn_cell: "RNN".to_string(),
            max_len,
            extra: serde_json::Map::new(),
        },
        src_vocab: vocab(&STUB_SRC)?,
        tgt_vocab: vocab(&STUB_TGT)?,
        tensors,
    })
}
