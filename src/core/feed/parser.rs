use roxmltree::Node;

use super::types::Entry;

pub const DC_NAMESPACE: &str = "http://purl.org/dc/elements/1.1/";

const TRACKING_MARKER: &str = "?utm";

#[derive(Debug, thiserror::Error)]
pub enum FeedParseError {
    #[error("feed payload is empty")]
    EmptyPayload,
    #[error("feed payload is not valid utf-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("xml feed parse error: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("item #{index} has no <{field}> element")]
    MissingField { field: &'static str, index: usize },
}

/// Parses an RSS 2.0 document into its items, in document order.
pub fn parse_feed_bytes(raw: &[u8]) -> Result<Vec<Entry>, FeedParseError> {
    let trimmed = trim_leading_ascii_whitespace(raw);
    if trimmed.is_empty() {
        return Err(FeedParseError::EmptyPayload);
    }
    parse_feed(std::str::from_utf8(trimmed)?)
}

pub fn parse_feed(content: &str) -> Result<Vec<Entry>, FeedParseError> {
    let doc = roxmltree::Document::parse(content)?;

    doc.root_element()
        .children()
        .filter(|node| is_plain_element(node, "channel"))
        .flat_map(|channel| channel.children())
        .filter(|node| is_plain_element(node, "item"))
        .enumerate()
        .map(|(index, item)| entry_from_item(item, index))
        .collect()
}

/// Cuts a link at the first `?utm` marker. Anything else in the query is kept.
pub fn cleanup_link(link: &str) -> &str {
    match link.find(TRACKING_MARKER) {
        Some(position) => &link[..position],
        None => link,
    }
}

fn entry_from_item(item: Node<'_, '_>, index: usize) -> Result<Entry, FeedParseError> {
    let required = |field: &'static str| {
        item.children()
            .find(|node| is_plain_element(node, field))
            .ok_or(FeedParseError::MissingField { field, index })
    };

    let guid = required("guid")?;
    let guid_permalink = guid.attribute("isPermaLink").map(ToString::to_string);
    let creator = item
        .children()
        .find(|node| node.has_tag_name((DC_NAMESPACE, "creator")))
        .ok_or(FeedParseError::MissingField {
            field: "dc:creator",
            index,
        })?;
    let categories = item
        .children()
        .filter(|node| is_plain_element(node, "category"))
        .map(text_of)
        .collect();

    Ok(Entry {
        title: text_of(required("title")?),
        guid: text_of(guid),
        guid_permalink,
        link: cleanup_link(&text_of(required("link")?)).to_string(),
        description: text_of(required("description")?),
        pub_date: text_of(required("pubDate")?),
        categories,
        creator: text_of(creator),
    })
}

fn is_plain_element(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().namespace().is_none() && node.tag_name().name() == name
}

// Text and CDATA children are merged; an empty element yields "".
fn text_of(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(|child| child.is_text())
        .filter_map(|child| child.text())
        .collect()
}

fn trim_leading_ascii_whitespace(raw: &[u8]) -> &[u8] {
    let mut index = 0;
    while index < raw.len() && raw[index].is_ascii_whitespace() {
        index += 1;
    }
    &raw[index..]
}
