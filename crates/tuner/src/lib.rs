//! tuner — streams an internet radio station to the default audio output.
//!
//! One worker thread per session drives the whole pipeline: network chunks
//! pass a pause/stop gate, feed the incremental decoder, and every decoded
//! frame is written to the blocking audio sink before the next chunk is
//! accepted. [`player::RadioPlayer`] is the public control surface
//! (play / pause / resume / stop plus change events).

pub mod cli;
pub mod events;
pub mod player;

mod control;
mod net;
