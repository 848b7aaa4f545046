//! Encoder-decoder network.

use candle_core::{Device, Result, Tensor};
use candle_nn::{embedding, linear, Embedding, Linear, Module, VarBuilder};

use crate::inference::model_loader::Seq2SeqConfig;
use crate::inference::rnn::{LayerState, StackedRnn};

/// Embedding followed by a stacked RNN over the whole source sequence.
#[derive(Debug, Clone)]
pub struct Encoder {
    embedding: Embedding,
    rnn: StackedRnn,
}

impl Encoder {
    pub fn new(cfg: &Seq2SeqConfig, vocab_size: usize, vb: VarBuilder) -> Result<Self> {
        let embedding = embedding(vocab_size, cfg.emb_dim, vb.pp("embedding"))?;
        let rnn = StackedRnn::new(
            cfg.cell_kind(),
            cfg.emb_dim,
            cfg.hidden,
            cfg.num_layers,
            vb.pp("rnn"),
        )?;
        Ok(Self { embedding, rnn })
    }

    pub fn num_layers(&self) -> usize {
        self.rnn.num_layers()
    }

    /// Run the source ids through the network and return the final per-layer state.
    ///
    /// Every position is consumed, padding included.
    pub fn forward(&self, ids: &[u32], device: &Device) -> Result<Vec<LayerState>> {
        let ids = Tensor::new(ids, device)?;
        let embedded = self.embedding.forward(&ids)?;
        let mut states = self.rnn.zero_state(device)?;
        for t in 0..embedded.dim(0)? {
            let x = embedded.get(t)?.unsqueeze(0)?;
            let (_, next) = self.rnn.step(&x, &states)?;
            states = next;
        }
        Ok(states)
    }
}

/// Embedding, stacked RNN and output projection for one target token at a time.
#[derive(Debug, Clone)]
pub struct Decoder {
    embedding: Embedding,
    rnn: StackedRnn,
    fc: Linear,
}

impl Decoder {
    pub fn new(cfg: &Seq2SeqConfig, vocab_size: usize, vb: VarBuilder) -> Result<Self> {
        let embedding = embedding(vocab_size, cfg.emb_dim, vb.pp("embedding"))?;
        let rnn = StackedRnn::new(
            cfg.cell_kind(),
            cfg.emb_dim,
            cfg.hidden,
            cfg.num_layers,
            vb.pp("rnn"),
        )?;
        let fc = linear(cfg.hidden, vocab_size, vb.pp("fc"))?;
        Ok(Self { embedding, rnn, fc })
    }

    /// One decode step. Returns `[1, vocab]` logits and the updated state.
    pub fn step(
        &self,
        token: u32,
        states: &[LayerState],
        device: &Device,
    ) -> Result<(Tensor, Vec<LayerState>)> {
        let x = self.embedding.forward(&Tensor::new(&[token], device)?)?;
        let (out, next) = self.rnn.step(&x, states)?;
        let logits = self.fc.forward(&out)?;
        Ok((logits, next))
    }
}

/// The full model.
#[derive(Debug, Clone)]
pub struct Seq2Seq {
    pub encoder: Encoder,
    pub decoder: Decoder,
}

impl Seq2Seq {
    /// Build the model from a var builder rooted at the state dict (`encoder.*`, `decoder.*`).
    pub fn new(
        cfg: &Seq2SeqConfig,
        src_vocab_size: usize,
        tgt_vocab_size: usize,
        vb: VarBuilder,
    ) -> Result<Self> {
        Ok(Self {
            encoder: Encoder::new(cfg, src_vocab_size, vb.pp("encoder"))?,
            decoder: Decoder::new(cfg, tgt_vocab_size, vb.pp("decoder"))?,
        })
    }
}

/// State-dict names of every tensor a model with this configuration reads.
pub fn parameter_names(cfg: &Seq2SeqConfig) -> Vec<String> {
    let mut names = Vec::new();
    for side in ["encoder", "decoder"] {
        names.push(format!("{side}.embedding.weight"));
        for k in 0..cfg.num_layers {
            for kind in ["weight_ih", "weight_hh", "bias_ih", "bias_hh"] {
                names.push(format!("{side}.rnn.{kind}_l{k}"));
            }
        }
    }
    names.push("decoder.fc.weight".to_string());
    names.push("decoder.fc.bias".to_string());
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::model_loader::stub_checkpoint;
    use crate::inference::rnn::CellKind;
    use candle_core::DType;
    use std::collections::HashMap;

    fn config(cell: &str, layers: usize) -> Seq2SeqConfig {
        Seq2SeqConfig {
            emb_dim: 3,
            hidden: 5,
            num_layers: layers,
            rnn_cell: cell.to_string(),
            max_len: 6,
            extra: serde_json::Map::new(),
        }
    }

    /// Zero weights with the right shapes for `cfg`.
    fn zero_tensors(cfg: &Seq2SeqConfig, v_src: usize, v_tgt: usize) -> HashMap<String, Tensor> {
        let dev = Device::Cpu;
        let rows = cfg.cell_kind().gate_multiplier() * cfg.hidden;
        parameter_names(cfg)
            .into_iter()
            .map(|name| {
                let shape: Vec<usize> = if name == "encoder.embedding.weight" {
                    vec![v_src, cfg.emb_dim]
                } else if name == "decoder.embedding.weight" {
                    vec![v_tgt, cfg.emb_dim]
                } else if name == "decoder.fc.weight" {
                    vec![v_tgt, cfg.hidden]
                } else if name == "decoder.fc.bias" {
                    vec![v_tgt]
                } else if name.contains("weight_ih_l0") {
                    vec![rows, cfg.emb_dim]
                } else if name.contains("weight_") {
                    vec![rows, cfg.hidden]
                } else {
                    vec![rows]
                };
                let t = Tensor::zeros(shape, DType::F32, &dev).unwrap();
                (name, t)
            })
            .collect()
    }

    #[test]
    fn test_builds_every_cell_kind() {
        for (cell, layers) in [("LSTM", 2), ("GRU", 1), ("RNN", 3)] {
            let cfg = config(cell, layers);
            let vb = VarBuilder::from_tensors(zero_tensors(&cfg, 7, 9), DType::F32, &Device::Cpu);
            let model = Seq2Seq::new(&cfg, 7, 9, vb).unwrap();

            let states = model.encoder.forward(&[1, 3, 4, 2, 0, 0], &Device::Cpu).unwrap();
            assert_eq!(states.len(), layers);
            assert_eq!(
                matches!(states[0], LayerState::Lstm { .. }),
                cfg.cell_kind() == CellKind::Lstm
            );

            let (logits, next) = model.decoder.step(1, &states, &Device::Cpu).unwrap();
            assert_eq!(logits.dims(), &[1, 9]);
            assert_eq!(next.len(), layers);
        }
    }

    #[test]
    fn test_missing_tensor_fails() {
        let cfg = config("GRU", 2);
        let mut ts = zero_tensors(&cfg, 4, 4);
        ts.remove("decoder.rnn.bias_hh_l1");
        let vb = VarBuilder::from_tensors(ts, DType::F32, &Device::Cpu);
        assert!(Seq2Seq::new(&cfg, 4, 4, vb).is_err());
    }

    #[test]
    fn test_wrong_shape_fails() {
        let cfg = config("LSTM", 1);
        let mut ts = zero_tensors(&cfg, 4, 4);
        ts.insert(
            "encoder.rnn.weight_hh_l0".to_string(),
            Tensor::zeros((5, 5), DType::F32, &Device::Cpu).unwrap(),
        );
        let vb = VarBuilder::from_tensors(ts, DType::F32, &Device::Cpu);
        assert!(Seq2Seq::new(&cfg, 4, 4, vb).is_err());
    }

    #[test]
    fn test_stub_decoder_transitions() {
        let ck = stub_checkpoint().unwrap();
        let vb = VarBuilder::from_tensors(ck.tensors.clone(), DType::F32, &Device::Cpu);
        let model = Seq2Seq::new(
            &ck.config,
            ck.src_vocab.len(),
            ck.tgt_vocab.len(),
            vb,
        )
        .unwrap();

        let states = model.encoder.forward(&[1, 3, 4, 2], &Device::Cpu).unwrap();
        let (logits, _) = model.decoder.step(ck.tgt_vocab.sos(), &states, &Device::Cpu).unwrap();
        let top = logits.squeeze(0).unwrap().argmax(0).unwrap().to_scalar::<u32>().unwrap();
        assert_eq!(ck.tgt_vocab.token(top), Some("घ"));
    }
}
