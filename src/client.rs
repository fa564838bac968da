//! Insert client.
//!
//! Developer-friendly goal: keep the public surface small and predictable.
//! Implementation details are split into submodules under `src/client/`.

pub mod builder;
pub mod insert;

pub use builder::InsertClientBuilder;
pub use insert::InsertClient;
