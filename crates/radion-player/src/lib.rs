pub mod engine;
pub mod ipc;
pub mod player;
mod poller;
pub mod snapshot;
pub mod version;
