//! Per-model planning and preview budgets.
//!
//! A [`ModelProfile`] is selected by prefix-matching the model name against a
//! fixed, ordered table. The first matching entry wins; names matching no
//! prefix get [`DEFAULT_PROFILE`].
//!
//! | prefix | max chunk bytes | sample rows | preview chars |
//! |--------|-----------------|-------------|---------------|
//! | `claude` | 6,000,000 | 1 | 200 |
//! | `o1` | 600,000 | 2 | 300 |
//! | `gpt-4`, `gpt-3` | 2,500,000 | 3 | 500 |
//! | *(default)* | 800,000 | 3 | 500 |

use serde::Serialize;

/// Chunk budget and preview verbosity for one family of models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelProfile {
    /// Short label for display (`"claude"`, `"default"`, ...).
    pub name: &'static str,
    /// Upper bound on the summed estimated size of a multi-item chunk.
    pub max_chunk_bytes: usize,
    /// Number of tabular sample rows rendered per table.
    pub sample_preview_rows: usize,
    /// Number of content characters rendered per page or document.
    pub content_preview_chars: usize,
}

pub const CLAUDE_PROFILE: ModelProfile = ModelProfile {
    name: "claude",
    max_chunk_bytes: 6_000_000,
    sample_preview_rows: 1,
    content_preview_chars: 200,
};

pub const O1_PROFILE: ModelProfile = ModelProfile {
    name: "o1",
    max_chunk_bytes: 600_000,
    sample_preview_rows: 2,
    content_preview_chars: 300,
};

pub const GPT_PROFILE: ModelProfile = ModelProfile {
    name: "gpt",
    max_chunk_bytes: 2_500_000,
    sample_preview_rows: 3,
    content_preview_chars: 500,
};

pub const DEFAULT_PROFILE: ModelProfile = ModelProfile {
    name: "default",
    max_chunk_bytes: 800_000,
    sample_preview_rows: 3,
    content_preview_chars: 500,
};

/// Ordered prefix table. Order matters: the first match wins.
pub const PROFILE_TABLE: &[(&str, &ModelProfile)] = &[
    ("claude", &CLAUDE_PROFILE),
    ("o1", &O1_PROFILE),
    ("gpt-4", &GPT_PROFILE),
    ("gpt-3", &GPT_PROFILE),
];

/// Look up the profile for a model name by prefix.
pub fn profile_for(model_name: &str) -> &'static ModelProfile {
    PROFILE_TABLE
        .iter()
        .find(|(prefix, _)| model_name.starts_with(prefix))
        .map(|(_, profile)| *profile)
        .unwrap_or(&DEFAULT_PROFILE)
}
