//! AudioGen core: pinned text-to-speech requests and a local audio library.
//!
//! # Modules
//! * [`config`]    : settings file, directories, credentials.
//! * [`models`]    : generation config, library records, voice catalog.
//! * [`security`]  : certificate public-key pinning.
//! * [`network`]   : HTTPS transport and client-side rate limiting.
//! * [`storage`]   : content-addressed file store and `index.json`.
//! * [`generation`]: the orchestrator tying it all together.

pub mod config;
pub mod generation;
pub mod models;
pub mod network;
pub mod security;
pub mod storage;
