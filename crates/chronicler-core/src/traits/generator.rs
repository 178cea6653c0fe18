// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Downstream generation service trait.

use async_trait::async_trait;

use crate::error::GenerationError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Credential, GenerationRequest, GenerationResponse};

/// The expensive, size-limited external call a window is driven through.
///
/// Implementations must classify every failure as
/// [`GenerationError::Overflow`], [`GenerationError::Transient`], or
/// [`GenerationError::Rejected`]; retry and rotation live in the caller.
#[async_trait]
pub trait GenerationService: PluginAdapter {
    /// Largest serialized request body the service accepts, if known.
    ///
    /// Lets the pipeline treat a window as overflowing without spending a call.
    fn max_request_bytes(&self) -> Option<usize> {
        None
    }

    /// Issues one request under the given credential.
    async fn generate(
        &self,
        request: &GenerationRequest,
        credential: &Credential,
    ) -> Result<GenerationResponse, GenerationError>;
}
