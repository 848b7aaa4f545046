//! Recurrent layers with PyTorch weight layout.
//!
//! Each layer owns `weight_ih_l{k}`, `weight_hh_l{k}`, `bias_ih_l{k}` and
//! `bias_hh_l{k}`, with gates stacked along the first dimension in the
//! order PyTorch uses (LSTM: i, f, g, o; GRU: r, z, n).

use candle_core::{Result, Tensor, D};
use candle_nn::{ops, Linear, Module, VarBuilder};

/// Recurrent cell type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Lstm,
    Gru,
    /// Elman RNN with tanh non-linearity.
    Rnn,
}

impl CellKind {
    /// "LSTM" and "GRU" select those cells; any other name falls back to a plain RNN.
    pub fn from_name(name: &str) -> Self {
        match name {
            "LSTM" => CellKind::Lstm,
            "GRU" => CellKind::Gru,
            _ => CellKind::Rnn,
        }
    }

    /// Number of gate blocks stacked in each weight matrix (g).
    pub fn gate_multiplier(self) -> usize {
        match self {
            CellKind::Lstm => 4,
            CellKind::Gru => 3,
            CellKind::Rnn => 1,
        }
    }
}

impl std::fmt::Display for CellKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellKind::Lstm => write!(f, "LSTM"),
            CellKind::Gru => write!(f, "GRU"),
            CellKind::Rnn => write!(f, "RNN"),
        }
    }
}

/// Per-layer recurrent state. Tensors are `[1, hidden]`.
#[derive(Debug, Clone)]
pub enum LayerState {
    Hidden(Tensor),
    Lstm { h: Tensor, c: Tensor },
}

impl LayerState {
    /// Output of the layer for the current step.
    pub fn h(&self) -> &Tensor {
        match self {
            LayerState::Hidden(h) => h,
            LayerState::Lstm { h, .. } => h,
        }
    }
}

/// One recurrent layer.
#[derive(Debug, Clone)]
pub struct RecurrentLayer {
    kind: CellKind,
    hidden: usize,
    ih: Linear,
    hh: Linear,
}

impl RecurrentLayer {
    pub fn new(
        kind: CellKind,
        in_dim: usize,
        hidden: usize,
        layer_idx: usize,
        vb: &VarBuilder,
    ) -> Result<Self> {
        let rows = kind.gate_multiplier() * hidden;
        let w_ih = vb.get((rows, in_dim), &format!("weight_ih_l{layer_idx}"))?;
        let w_hh = vb.get((rows, hidden), &format!("weight_hh_l{layer_idx}"))?;
        let b_ih = vb.get(rows, &format!("bias_ih_l{layer_idx}"))?;
        let b_hh = vb.get(rows, &format!("bias_hh_l{layer_idx}"))?;
        Ok(Self {
            kind,
            hidden,
            ih: Linear::new(w_ih, Some(b_ih)),
            hh: Linear::new(w_hh, Some(b_hh)),
        })
    }

    pub fn zero_state(&self, device: &candle_core::Device) -> Result<LayerState> {
        let zeros = || Tensor::zeros((1, self.hidden), candle_core::DType::F32, device);
        Ok(match self.kind {
            CellKind::Lstm => LayerState::Lstm {
                h: zeros()?,
                c: zeros()?,
            },
            _ => LayerState::Hidden(zeros()?),
        })
    }

    /// Advance one time step. `x` is `[1, in_dim]`.
    pub fn step(&self, x: &Tensor, state: &LayerState) -> Result<LayerState> {
        let gi = self.ih.forward(x)?;
        let gh = self.hh.forward(state.h())?;

        match (self.kind, state) {
            (CellKind::Lstm, LayerState::Lstm { c, .. }) => {
                let gates = gi.add(&gh)?.chunk(4, D::Minus1)?;
                let i = ops::sigmoid(&gates[0])?;
                let f = ops::sigmoid(&gates[1])?;
                let g = gates[2].tanh()?;
                let o = ops::sigmoid(&gates[3])?;
                let c = f.mul(c)?.add(&i.mul(&g)?)?;
                let h = o.mul(&c.tanh()?)?;
                Ok(LayerState::Lstm { h, c })
            }
            (CellKind::Gru, LayerState::Hidden(h)) => {
                let gi = gi.chunk(3, D::Minus1)?;
                let gh = gh.chunk(3, D::Minus1)?;
                let r = ops::sigmoid(&gi[0].add(&gh[0])?)?;
                let z = ops::sigmoid(&gi[1].add(&gh[1])?)?;
                let n = gi[2].add(&r.mul(&gh[2])?)?.tanh()?;
                // (1 - z) * n + z * h
                let h = n.add(&z.mul(&h.sub(&n)?)?)?;
                Ok(LayerState::Hidden(h))
            }
            (CellKind::Rnn, LayerState::Hidden(_)) => {
                Ok(LayerState::Hidden(gi.add(&gh)?.tanh()?))
            }
            (kind, _) => candle_core::bail!("state does not match {kind} cell"),
        }
    }
}

/// A stack of recurrent layers, each feeding its output to the next.
#[derive(Debug, Clone)]
pub struct StackedRnn {
    layers: Vec<RecurrentLayer>,
}

impl StackedRnn {
    pub fn new(
        kind: CellKind,
        in_dim: usize,
        hidden: usize,
        num_layers: usize,
        vb: VarBuilder,
    ) -> Result<Self> {
        let layers = (0..num_layers)
            .map(|k| {
                let layer_in = if k == 0 { in_dim } else { hidden };
                RecurrentLayer::new(kind, layer_in, hidden, k, &vb)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { layers })
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn zero_state(&self, device: &candle_core::Device) -> Result<Vec<LayerState>> {
        self.layers.iter().map(|l| l.zero_state(device)).collect()
    }

    /// Advance every layer by one step. Returns the top layer's output and the new states.
    pub fn step(&self, x: &Tensor, states: &[LayerState]) -> Result<(Tensor, Vec<LayerState>)> {
        if states.len() != self.layers.len() {
            candle_core::bail!(
                "expected {} layer states, got {}",
                self.layers.len(),
                states.len()
            );
        }

        let mut input = x.clone();
        let mut next = Vec::with_capacity(states.len());
        for (layer, state) in self.layers.iter().zip(states) {
            let s = layer.step(&input, state)?;
            input = s.h().clone();
            next.push(s);
        }
        Ok((input, next))
    }
}
