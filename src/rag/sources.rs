use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::LazyLock;

use crate::embeddings::Chunk;

static CITATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bsource:\s*\**\s*([^\s,;()\[\]*]+)").expect("valid regex")
});

/// Where a retrieved chunk came from, as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// File name without its directory
    pub name: String,
    /// Zero-based page, if the source is paged
    pub page: Option<u32>,
}

impl SourceRef {
    #[inline]
    pub fn from_chunk(chunk: &Chunk) -> Self {
        let name = chunk.source.file_name().map_or_else(
            || chunk.source.to_string_lossy().into_owned(),
            |name| name.to_string_lossy().into_owned(),
        );
        Self {
            name,
            page: chunk.page,
        }
    }
}

/// Render one line per source, each preceded by a newline
///
/// Pages are shown one-based. An empty slice renders as an empty string.
#[inline]
pub fn format_sources(sources: &[SourceRef], markdown: bool) -> String {
    let mut output = String::new();
    for source in sources {
        let label = if markdown { "**Source:**" } else { "Source:" };
        let _ = write!(output, "\n- {} {}", label, source.name);
        if let Some(page) = source.page {
            let _ = write!(output, " (Page: {})", u64::from(page) + 1);
        }
    }
    output
}

/// File names the answer cites as `Source: <file>` that were not supplied
///
/// Advisory only: the answer is returned either way.
#[inline]
pub fn uncited_sources(answer: &str, supplied: &[SourceRef]) -> Vec<String> {
    let mut unknown: Vec<String> = Vec::new();

    for captures in CITATION.captures_iter(answer).flatten() {
        let Some(cited) = captures.get(1) else {
            continue;
        };
        let cited = cited.as_str().trim_end_matches(['.', ':', '!', '?']);
        if cited.is_empty() {
            continue;
        }

        let known = supplied
            .iter()
            .any(|source| source.name.eq_ignore_ascii_case(cited));
        if !known && !unknown.iter().any(|u| u == cited) {
            unknown.push(cited.to_string());
        }
    }
    unknown
}
