//! Seq2seq transliteration model.
//!
//! - [`model_loader`]: Checkpoint loading, architecture record and test stubs
//! - [`vocab`]: Character/index vocabularies with reserved tokens
//! - [`rnn`]: LSTM, GRU and tanh-RNN layers
//! - [`seq2seq`]: Encoder and decoder networks
//! - [`engine`]: Word encoding and greedy decoding
//! - [`info`]: Parameter and MAC estimates for the metadata route

pub mod engine;
pub mod info;
pub mod model_loader;
pub mod rnn;
pub mod seq2seq;
pub mod vocab;
