use crate::core::config::CompiledFeed;
use crate::core::feed::dedup::unique_by_guid;
use crate::core::feed::parser::{parse_feed_bytes, FeedParseError};
use crate::core::feed::types::{Entry, FetchedDocument};
use crate::core::filter::classify;
use crate::core::stats::StatisticsLedger;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("feed from {url} could not be parsed: {source}")]
    Parse {
        url: String,
        #[source]
        source: FeedParseError,
    },
}

/// Parses every document, merges them in order and returns the entries that
/// pass the feed's rules. Every unique entry is recorded in the ledger.
///
/// All documents are parsed before the ledger is touched, so a malformed
/// source leaves the statistics unchanged.
pub fn merge_and_filter(
    feed: &CompiledFeed,
    documents: &[FetchedDocument],
    ledger: &StatisticsLedger,
) -> Result<Vec<Entry>, PipelineError> {
    let mut merged = Vec::new();
    for document in documents {
        let entries = parse_feed_bytes(&document.body).map_err(|source| PipelineError::Parse {
            url: document.url.clone(),
            source,
        })?;
        merged.extend(entries);
    }

    Ok(filter_entries(feed, merged, ledger))
}

/// Deduplicates by guid, classifies and records each survivor, and keeps the
/// passed ones in their original order.
pub fn filter_entries<I>(feed: &CompiledFeed, entries: I, ledger: &StatisticsLedger) -> Vec<Entry>
where
    I: IntoIterator<Item = Entry>,
{
    let mut unique_count = 0_usize;
    let mut passed_entries = Vec::new();

    for entry in unique_by_guid(entries) {
        unique_count += 1;
        let passed = classify(&entry, &feed.exclude, &feed.include);
        ledger.record(&entry, passed);
        if passed {
            passed_entries.push(entry);
        } else {
            tracing::debug!(
                feed = %feed.name,
                title = %entry.title,
                creator = %entry.creator,
                "entry blocked"
            );
        }
    }

    tracing::info!(
        feed = %feed.name,
        unique = unique_count,
        passed = passed_entries.len(),
        blocked = unique_count - passed_entries.len(),
        "feed filtered"
    );
    passed_entries
}
