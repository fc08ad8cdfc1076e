use std::borrow::Cow;

use quick_xml::escape::escape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::Writer;

use super::parser::DC_NAMESPACE;
use super::types::Entry;

#[derive(Debug, thiserror::Error)]
pub enum FeedRenderError {
    #[error("failed to write feed xml: {0}")]
    Write(String),
    #[error("rendered feed is not valid utf-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Renders entries as an RSS 2.0 document that `parse_feed` reads back unchanged.
pub fn render_feed<'a, I>(channel_title: &str, entries: I) -> Result<String, FeedRenderError>
where
    I: IntoIterator<Item = &'a Entry>,
{
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut rss_start = BytesStart::new("rss");
    rss_start.push_attribute(("version", "2.0"));
    rss_start.push_attribute(("xmlns:dc", DC_NAMESPACE));
    write(&mut writer, Event::Start(rss_start))?;
    write(&mut writer, Event::Start(BytesStart::new("channel")))?;
    write_text_element(&mut writer, "title", channel_title)?;

    for entry in entries {
        write(&mut writer, Event::Start(BytesStart::new("item")))?;
        write_text_element(&mut writer, "title", &entry.title)?;

        let mut guid_start = BytesStart::new("guid");
        if let Some(permalink) = &entry.guid_permalink {
            guid_start.push_attribute(Attribute {
                key: QName(b"isPermaLink"),
                value: Cow::Owned(escape_attribute(permalink).into_bytes()),
            });
        }
        write(&mut writer, Event::Start(guid_start))?;
        write(&mut writer, Event::Text(BytesText::from_escaped(escape_text(&entry.guid))))?;
        write(&mut writer, Event::End(BytesEnd::new("guid")))?;

        write_text_element(&mut writer, "link", &entry.link)?;
        write_text_element(&mut writer, "description", &entry.description)?;
        write_text_element(&mut writer, "pubDate", &entry.pub_date)?;
        for category in &entry.categories {
            write_text_element(&mut writer, "category", category)?;
        }
        write_text_element(&mut writer, "dc:creator", &entry.creator)?;
        write(&mut writer, Event::End(BytesEnd::new("item")))?;
    }

    write(&mut writer, Event::End(BytesEnd::new("channel")))?;
    write(&mut writer, Event::End(BytesEnd::new("rss")))?;

    let mut output = String::from_utf8(writer.into_inner())?;
    output.push('\n');
    Ok(output)
}

fn write_text_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    text: &str,
) -> Result<(), FeedRenderError> {
    write(writer, Event::Start(BytesStart::new(name)))?;
    write(writer, Event::Text(BytesText::from_escaped(escape_text(text))))?;
    write(writer, Event::End(BytesEnd::new(name)))
}

// Parsers fold a raw CR into LF, so it goes out as a character reference.
fn escape_text(raw: &str) -> String {
    escape(raw).replace('\r', "&#13;")
}

// Attribute values are also whitespace-normalized on parse.
fn escape_attribute(raw: &str) -> String {
    escape_text(raw)
        .replace('\n', "&#10;")
        .replace('\t', "&#9;")
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), FeedRenderError> {
    writer
        .write_event(event)
        .map_err(|error| FeedRenderError::Write(error.to_string()))
}
