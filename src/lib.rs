pub mod backend;
pub mod budget;
pub mod chunker;
pub mod config;
pub mod fragments;
pub mod ir;
pub mod logging;
pub mod pacing;
pub mod pipeline;
pub mod progress;
pub mod protocol;
pub mod store;
pub mod terminology;

#[cfg(test)]
pub(crate) mod test_utils;
