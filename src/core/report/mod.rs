use askama::Template;

use crate::core::config::FeedRegistry;
use crate::core::feed::types::Entry;
use crate::core::stats::{LedgerSnapshot, Tally};

#[derive(Debug, thiserror::Error)]
#[error("failed to render page: {0}")]
pub struct ReportError(#[from] askama::Error);

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate<'a> {
    feeds: Vec<&'a str>,
}

#[derive(Template)]
#[template(path = "stats.html")]
struct StatsTemplate<'a> {
    sections: Vec<EntrySection<'a>>,
    tallies: Vec<TallyTable<'a>>,
}

struct EntrySection<'a> {
    heading: &'static str,
    entries: &'a [Entry],
}

struct TallyTable<'a> {
    heading: &'static str,
    column: &'static str,
    rows: &'a [Tally],
}

pub fn render_index(registry: &FeedRegistry) -> Result<String, ReportError> {
    let feeds = registry.iter().map(|feed| feed.name.as_str()).collect();
    Ok(IndexTemplate { feeds }.render()?)
}

/// Blocked entries come before passed ones, followed by the four tallies.
pub fn render_stats(snapshot: &LedgerSnapshot) -> Result<String, ReportError> {
    let page = StatsTemplate {
        sections: vec![
            EntrySection {
                heading: "Blocked",
                entries: &snapshot.blocked,
            },
            EntrySection {
                heading: "Passed",
                entries: &snapshot.passed,
            },
        ],
        tallies: vec![
            TallyTable {
                heading: "Blocked categories",
                column: "Category",
                rows: &snapshot.blocked_categories,
            },
            TallyTable {
                heading: "Passed categories",
                column: "Category",
                rows: &snapshot.passed_categories,
            },
            TallyTable {
                heading: "Blocked creators",
                column: "Creator",
                rows: &snapshot.blocked_creators,
            },
            TallyTable {
                heading: "Passed creators",
                column: "Creator",
                rows: &snapshot.passed_creators,
            },
        ],
    };
    Ok(page.render()?)
}
