// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic window signatures.
//!
//! A signature has three colon-separated parts:
//!
//! 1. `data`: SHA-256 over the window's canonical message encoding.
//! 2. `logic`: SHA-256 over the configuration version string.
//! 3. `engine`: the target model identifier, verbatim.
//!
//! The data and logic parts are fixed-width hex, so the final part may
//! itself contain colons without making two inputs collide.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::types::{Window, format_timestamp};

/// Idempotency key for one window under one configuration and model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature(String);

impl Signature {
    /// Computes the signature of `window` under `config_version` and `model_id`.
    pub fn compute(window: &Window, config_version: &str, model_id: &str) -> Self {
        let mut data = Sha256::new();
        for message in window.messages() {
            let timestamp = format_timestamp(&message.timestamp);
            // Length prefixes keep field boundaries unambiguous.
            for field in [
                timestamp.as_bytes(),
                message.author_id.as_bytes(),
                message.body.as_bytes(),
            ] {
                data.update((field.len() as u64).to_be_bytes());
                data.update(field);
            }
        }
        let data_hash = hex::encode(data.finalize());
        let logic_hash = hex::encode(Sha256::digest(config_version.as_bytes()));
        Self(format!("{data_hash}:{logic_hash}:{model_id}"))
    }

    /// Wraps a signature previously produced by [`Signature::compute`].
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters of the data hash, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Signature {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;
    use chrono::{TimeZone, Utc};

    fn window(bodies: &[&str]) -> Window {
        let messages = bodies
            .iter()
            .enumerate()
            .map(|(i, body)| {
                Message::new(
                    Utc.with_ymd_and_hms(2026, 1, 1, 10, i as u32, 0).unwrap(),
                    "alice",
                    *body,
                )
            })
            .collect();
        Window::new(messages).unwrap()
    }

    #[test]
    fn identical_inputs_produce_identical_signatures() {
        let a = Signature::compute(&window(&["hi", "there"]), "v1", "model-a");
        let b = Signature::compute(&window(&["hi", "there"]), "v1", "model-a");
        assert_eq!(a, b);
    }

    #[test]
    fn any_input_change_changes_the_signature() {
        let base = Signature::compute(&window(&["hi", "there"]), "v1", "model-a");
        assert_ne!(
            base,
            Signature::compute(&window(&["hi", "there!"]), "v1", "model-a")
        );
        assert_ne!(
            base,
            Signature::compute(&window(&["hi", "there"]), "v2", "model-a")
        );
        assert_ne!(
            base,
            Signature::compute(&window(&["hi", "there"]), "v1", "model-b")
        );
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        let a = Signature::compute(&window(&["ab", "c"]), "v1", "m");
        let b = Signature::compute(&window(&["a", "bc"]), "v1", "m");
        assert_ne!(a, b);
    }

    #[test]
    fn signature_has_three_parts() {
        let sig = Signature::compute(&window(&["x"]), "v1", "gemini:flash");
        let parts: Vec<&str> = sig.as_str().splitn(3, ':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 64);
        assert_eq!(parts[1].len(), 64);
        assert_eq!(parts[2], "gemini:flash");
        assert_eq!(sig.short().len(), 12);
    }
}
