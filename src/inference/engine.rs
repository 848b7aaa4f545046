//! Transliteration engine: word encoding and the greedy decode loop.
//!
//! The engine is built once from a checkpoint and is read-only afterwards,
//! so a single instance is shared by every request.

use std::time::Instant;

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use tracing::{debug, warn};

use crate::inference::model_loader::{Checkpoint, ModelError, Seq2SeqConfig};
use crate::inference::seq2seq::{parameter_names, Seq2Seq};
use crate::inference::vocab::Vocab;

/// The inference engine.
#[derive(Debug, Clone)]
pub struct Transliterator {
    model: Seq2Seq,
    config: Seq2SeqConfig,
    src_vocab: Vocab,
    tgt_vocab: Vocab,
    device: Device,

    /// Total element count of the weights the model reads.
    parameter_count: usize,
}

impl Transliterator {
    /// Build the network from checkpoint weights on the CPU.
    pub fn from_checkpoint(checkpoint: &Checkpoint) -> Result<Self, ModelError> {
        let device = Device::Cpu;
        let vb = VarBuilder::from_tensors(checkpoint.tensors.clone(), DType::F32, &device);
        let model = Seq2Seq::new(
            &checkpoint.config,
            checkpoint.src_vocab.len(),
            checkpoint.tgt_vocab.len(),
            vb,
        )?;

        // Seq2Seq::new has already checked every name is present.
        let parameter_count = parameter_names(&checkpoint.config)
            .iter()
            .filter_map(|name| checkpoint.tensors.get(name))
            .map(|t| t.elem_count())
            .sum();

        Ok(Self {
            model,
            config: checkpoint.config.clone(),
            src_vocab: checkpoint.src_vocab.clone(),
            tgt_vocab: checkpoint.tgt_vocab.clone(),
            device,
            parameter_count,
        })
    }

    pub fn config(&self) -> &Seq2SeqConfig {
        &self.config
    }

    pub fn src_vocab(&self) -> &Vocab {
        &self.src_vocab
    }

    pub fn tgt_vocab(&self) -> &Vocab {
        &self.tgt_vocab
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    /// Recurrent layers in the built network.
    pub fn num_layers(&self) -> usize {
        self.model.encoder.num_layers()
    }

    /// Map a word to encoder input ids.
    ///
    /// At most `MAX_LEN - 2` characters are kept, wrapped in `<sos>`/`<eos>`
    /// and right-padded with `<pad>` to `MAX_LEN`.
    pub fn encode_word(&self, word: &str) -> Vec<u32> {
        let max_len = self.config.max_len;
        let mut ids = Vec::with_capacity(max_len.max(2));
        ids.push(self.src_vocab.sos());
        ids.extend(
            word.chars()
                .take(max_len.saturating_sub(2))
                .map(|c| self.src_vocab.index_of_char(c)),
        );
        ids.push(self.src_vocab.eos());
        if ids.len() < max_len {
            ids.resize(max_len, self.src_vocab.pad());
        }
        ids
    }

    /// Transliterate a single word with greedy decoding.
    ///
    /// Decoding stops at `<eos>` or after `MAX_LEN` steps, whichever comes first.
    pub fn transliterate_word(&self, word: &str) -> Result<String, ModelError> {
        let src = self.encode_word(word);
        let mut states = self.model.encoder.forward(&src, &self.device)?;

        let eos = self.tgt_vocab.eos();
        let mut token = self.tgt_vocab.sos();
        let mut out = String::new();

        for _ in 0..self.config.max_len {
            let (logits, next) = self.model.decoder.step(token, &states, &self.device)?;
            states = next;

            let top = logits.squeeze(0)?.argmax(0)?.to_scalar::<u32>()?;
            if top == eos {
                break;
            }
            out.push_str(self.tgt_vocab.token(top).unwrap_or(""));
            token = top;
        }

        Ok(out)
    }

    /// Transliterate every whitespace-separated word and join with single spaces.
    ///
    /// A word that fails is logged and passed through unchanged.
    pub fn transliterate_sentence(&self, text: &str) -> String {
        let started = Instant::now();
        let words: Vec<String> = text
            .split_whitespace()
            .map(|w| match self.transliterate_word(w) {
                Ok(out) => out,
                Err(e) => {
                    warn!(word = w, error = %e, "Transliteration failed, echoing input");
                    w.to_string()
                }
            })
            .collect();

        debug!(
            words = words.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Sentence transliterated"
        );

        words.join(" ")
    }
}
