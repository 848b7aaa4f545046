//! translit-serve: seq2seq character transliteration over HTTP.
//!
//! Loads an encoder-decoder recurrent network (LSTM, GRU or plain RNN)
//! from a safetensors checkpoint and transliterates words with greedy
//! decoding, e.g. Latin-script Hindi to Devanagari.

pub mod config;
pub mod inference;
pub mod server;
