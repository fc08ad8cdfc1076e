use std::collections::HashSet;

use super::types::Entry;

/// Iterator adapter yielding only the first entry seen for each guid.
#[derive(Debug)]
pub struct UniqueByGuid<I> {
    inner: I,
    seen_guids: HashSet<String>,
}

impl<I> Iterator for UniqueByGuid<I>
where
    I: Iterator<Item = Entry>,
{
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        let seen_guids = &mut self.seen_guids;
        self.inner
            .by_ref()
            .find(|entry| seen_guids.insert(entry.guid.clone()))
    }
}

pub fn unique_by_guid<I>(entries: I) -> UniqueByGuid<I::IntoIter>
where
    I: IntoIterator<Item = Entry>,
{
    UniqueByGuid {
        inner: entries.into_iter(),
        seen_guids: HashSet::new(),
    }
}
