//! Static model metadata: vocabulary sizes, parameter counts and MAC estimates.
//!
//! Computed once at startup and served as-is by the `/model_info` route.

use serde::Serialize;

use crate::inference::engine::Transliterator;
use crate::inference::model_loader::Seq2SeqConfig;

pub const PARAMS_FORMULA: &str = "(V_src + V_tgt)×E + 2×g×(E×H + H² + H) + H×V_tgt + V_tgt";
pub const MACS_FORMULA: &str = "2×L×g×(E×H + H²)";

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub config: Seq2SeqConfig,
    pub vocab_src: usize,
    pub vocab_tgt: usize,
    pub torch_params: CountSummary,
    pub params_formula: FormulaSummary,
    pub macs: MacSummary,
    pub gate_multiplier: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CountSummary {
    pub count: u64,
    pub formatted: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormulaSummary {
    pub count: u64,
    pub formatted: String,
    pub formula: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MacSummary {
    pub simple: u64,
    pub theoretical: u64,
    pub formatted: String,
    pub formula: String,
}

impl ModelInfo {
    pub fn from_engine(engine: &Transliterator) -> Self {
        Self::compute(
            engine.config(),
            engine.src_vocab().len(),
            engine.tgt_vocab().len(),
            engine.parameter_count(),
        )
    }

    pub fn compute(cfg: &Seq2SeqConfig, vocab_src: usize, vocab_tgt: usize, actual_params: usize) -> Self {
        let e = cfg.emb_dim as u64;
        let h = cfg.hidden as u64;
        let l = cfg.max_len as u64;
        let v_src = vocab_src as u64;
        let v_tgt = vocab_tgt as u64;
        let g = cfg.cell_kind().gate_multiplier() as u64;

        let params = (v_src + v_tgt) * e + 2 * g * (e * h + h * h + h) + h * v_tgt + v_tgt;
        let macs = 2 * l * g * (e * h + h * h);
        let macs_simple = l * (h * (e + h));
        let actual = actual_params as u64;

        Self {
            config: cfg.clone(),
            vocab_src,
            vocab_tgt,
            torch_params: CountSummary {
                count: actual,
                formatted: format_large_number(actual),
            },
            params_formula: FormulaSummary {
                count: params,
                formatted: format_large_number(params),
                formula: PARAMS_FORMULA.to_string(),
            },
            macs: MacSummary {
                simple: macs_simple,
                theoretical: macs,
                formatted: format_large_number(macs),
                formula: MACS_FORMULA.to_string(),
            },
            gate_multiplier: g as usize,
        }
    }
}

/// Human-readable count: `1250000 -> "1.25M"`, `5300 -> "5.30K"`, `999 -> "999"`.
pub fn format_large_number(n: u64) -> String {
    let v = n as f64;
    if v >= 1e6 {
        format!("{:.2}M", v / 1e6)
    } else if v >= 1e3 {
        format!("{:.2}K", v / 1e3)
    } else {
        n.to_string()
    }
}
