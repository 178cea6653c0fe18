// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! Storage and generation backends are injected through these traits so the
//! pipeline can be exercised against SQLite, HTTP, or deterministic fakes.
//! All traits use `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod generator;
pub mod journal;
pub mod runs;
pub mod tasks;

pub use adapter::PluginAdapter;
pub use generator::GenerationService;
pub use journal::JournalStore;
pub use runs::RunStore;
pub use tasks::TaskStore;
