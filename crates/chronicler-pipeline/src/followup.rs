// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Follow-up tasks derived from a successfully processed window.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use chronicler_config::model::PipelineConfig;
use chronicler_core::{GenerationResponse, Signature, TaskPayload, Window};

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"'`]+"#).unwrap());

/// Which follow-up kinds to enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowupPolicy {
    pub banners: bool,
    pub profiles: bool,
    pub urls: bool,
}

impl From<&PipelineConfig> for FollowupPolicy {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            banners: config.enable_banners,
            profiles: config.enable_profiles,
            urls: config.enable_url_enrichment,
        }
    }
}

impl Default for FollowupPolicy {
    fn default() -> Self {
        Self {
            banners: true,
            profiles: true,
            urls: true,
        }
    }
}

/// Builds the tasks for one window: a banner per reported artifact, a
/// profile update per distinct author, and an enrichment per distinct URL.
pub fn derive_tasks(
    window: &Window,
    signature: &Signature,
    response: &GenerationResponse,
    policy: FollowupPolicy,
) -> Vec<TaskPayload> {
    let window_signature = signature.to_string();
    let mut tasks = Vec::new();

    if policy.banners {
        let mut seen = BTreeSet::new();
        tasks.extend(
            response
                .artifacts
                .iter()
                .filter(|a| seen.insert(a.as_str()))
                .map(|artifact_id| TaskPayload::GenerateBanner {
                    artifact_id: artifact_id.clone(),
                    window_signature: window_signature.clone(),
                }),
        );
    }

    if policy.profiles {
        tasks.extend(
            window
                .authors()
                .into_iter()
                .map(|author_id| TaskPayload::UpdateProfile {
                    author_id: author_id.to_string(),
                    window_signature: window_signature.clone(),
                }),
        );
    }

    if policy.urls {
        tasks.extend(
            extract_urls(window)
                .into_iter()
                .map(|url| TaskPayload::EnrichUrl {
                    url,
                    window_signature: window_signature.clone(),
                }),
        );
    }

    tasks
}

/// Distinct URLs in message bodies, in first-appearance order.
pub fn extract_urls(window: &Window) -> Vec<String> {
    let mut seen = BTreeSet::new();
    window
        .messages()
        .iter()
        .flat_map(|m| URL_PATTERN.find_iter(&m.body))
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?', ')', ']']))
        .filter(|url| seen.insert(url.to_string()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use chronicler_core::{Message, TaskKind};

    fn window(messages: &[(&str, &str)]) -> Window {
        let ts = Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap();
        Window::new(
            messages
                .iter()
                .map(|(author, body)| Message::new(ts, *author, *body))
                .collect(),
        )
        .unwrap()
    }

    fn kinds(tasks: &[TaskPayload]) -> Vec<TaskKind> {
        tasks.iter().map(TaskPayload::kind).collect()
    }

    #[test]
    fn extracts_distinct_urls_without_trailing_punctuation() {
        let w = window(&[
            ("a", "see https://example.com/post. and http://x.org/a?b=1,"),
            ("b", "again https://example.com/post"),
        ]);
        assert_eq!(
            extract_urls(&w),
            vec!["https://example.com/post", "http://x.org/a?b=1"]
        );
    }

    #[test]
    fn derives_every_kind_in_order() {
        let w = window(&[("alice", "hi https://a.io"), ("bob", "yo"), ("alice", "x")]);
        let sig = Signature::from_raw("d:l:m");
        let response = GenerationResponse {
            result_reference: "r".into(),
            artifacts: vec!["post-1".into(), "post-1".into()],
        };
        let tasks = derive_tasks(&w, &sig, &response, FollowupPolicy::default());
        assert_eq!(
            kinds(&tasks),
            vec![
                TaskKind::GenerateBanner,
                TaskKind::UpdateProfile,
                TaskKind::UpdateProfile,
                TaskKind::EnrichUrl,
            ]
        );
        assert!(tasks.iter().all(|t| t.window_signature() == "d:l:m"));
    }

    #[test]
    fn disabled_kinds_are_skipped() {
        let w = window(&[("alice", "https://a.io")]);
        let sig = Signature::from_raw("d:l:m");
        let response = GenerationResponse {
            result_reference: "r".into(),
            artifacts: vec!["post-1".into()],
        };
        let policy = FollowupPolicy {
            banners: false,
            profiles: true,
            urls: false,
        };
        let tasks = derive_tasks(&w, &sig, &response, policy);
        assert_eq!(kinds(&tasks), vec![TaskKind::UpdateProfile]);
    }
}
