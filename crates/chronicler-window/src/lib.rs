// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Windowing engine.
//!
//! [`pack`] groups an ordered message stream into windows whose byte totals
//! fit a budget. [`split`] halves a window that the downstream service still
//! rejects as too large. Both are pure and deterministic.

use chronicler_core::{Message, Window};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("window budget must be greater than zero")]
    InvalidBudget,

    /// A window of one message cannot be made smaller.
    #[error("window of {message_count} message ({byte_size} bytes) cannot be split further")]
    Unsplittable {
        message_count: usize,
        byte_size: usize,
    },
}

/// Packs `messages` greedily, in order, into windows of at most `budget` bytes.
///
/// A window is closed as soon as the next message would push it past the
/// budget. A single message larger than the budget gets a window of its own.
/// Input order is never changed.
pub fn pack<I>(messages: I, budget: usize) -> Result<Vec<Window>, WindowError>
where
    I: IntoIterator<Item = Message>,
{
    if budget == 0 {
        return Err(WindowError::InvalidBudget);
    }

    let mut windows = Vec::new();
    let mut current: Vec<Message> = Vec::new();
    let mut current_bytes = 0usize;

    for message in messages {
        if !current.is_empty() && current_bytes.saturating_add(message.byte_size) > budget {
            windows.extend(Window::new(std::mem::take(&mut current)));
            current_bytes = 0;
        }
        current_bytes = current_bytes.saturating_add(message.byte_size);
        current.push(message);
    }
    windows.extend(Window::new(current));

    Ok(windows)
}

/// Bisects a window at its midpoint index.
///
/// Splitting is by message count so a burst of messages sharing one
/// timestamp still shrinks. The left half gets the smaller share when the
/// count is odd.
pub fn split(window: Window) -> Result<(Window, Window), WindowError> {
    let unsplittable = WindowError::Unsplittable {
        message_count: window.len(),
        byte_size: window.byte_total(),
    };
    let mut left = window.into_messages();
    let right = left.split_off(left.len() / 2);
    match (Window::new(left), Window::new(right)) {
        (Some(left), Some(right)) => Ok((left, right)),
        _ => Err(unsplittable),
    }
}

/// The largest message in `messages`, for checking an input against a budget.
pub fn largest_message(messages: &[Message]) -> Option<&Message> {
    messages.iter().max_by_key(|m| m.byte_size)
}
