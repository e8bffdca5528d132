use anyhow::Context;
use quick_xml::Reader;
use quick_xml::events::Event;

/// Text content of every element whose local name (namespace prefix
/// ignored) is `local_name`, in document order. Nested markup inside a
/// matched element is skipped; text and CDATA are concatenated.
pub fn element_texts(xml: &str, local_name: &str) -> anyhow::Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut out = Vec::new();
    let mut current: Option<String> = None;
    let mut depth = 0_usize;

    loop {
        let event = reader
            .read_event()
            .with_context(|| format!("malformed XML at byte {}", reader.buffer_position()))?;
        match event {
            Event::Start(start) => {
                if current.is_some() {
                    depth += 1;
                } else if start.local_name().as_ref() == local_name.as_bytes() {
                    current = Some(String::new());
                    depth = 0;
                }
            }
            Event::Empty(empty) => {
                if current.is_none() && empty.local_name().as_ref() == local_name.as_bytes() {
                    out.push(String::new());
                }
            }
            Event::Text(text) => {
                if let Some(buf) = current.as_mut() {
                    buf.push_str(&text.unescape().context("invalid XML text escape")?);
                }
            }
            Event::CData(cdata) => {
                if let Some(buf) = current.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&cdata));
                }
            }
            Event::End(_) => {
                if current.is_some() {
                    if depth == 0 {
                        if let Some(done) = current.take() {
                            out.push(done.trim().to_string());
                        }
                    } else {
                        depth -= 1;
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out)
}

/// Title of the first `<item>` of an RSS feed.
pub fn first_rss_item_title(xml: &str) -> anyhow::Result<Option<String>> {
    first_child_text(xml, "item", "title")
}

/// Text of the first `child` element found inside a `parent` element.
fn first_child_text(xml: &str, parent: &str, child: &str) -> anyhow::Result<Option<String>> {
    let mut reader = Reader::from_str(xml);
    let mut in_parent = false;
    let mut capture: Option<String> = None;

    loop {
        let event = reader
            .read_event()
            .with_context(|| format!("malformed XML at byte {}", reader.buffer_position()))?;
        match event {
            Event::Start(start) => {
                let name = start.local_name();
                if name.as_ref() == parent.as_bytes() {
                    in_parent = true;
                } else if in_parent && name.as_ref() == child.as_bytes() {
                    capture = Some(String::new());
                }
            }
            Event::Text(text) => {
                if let Some(buf) = capture.as_mut() {
                    buf.push_str(&text.unescape().context("invalid XML text escape")?);
                }
            }
            Event::CData(cdata) => {
                if let Some(buf) = capture.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&cdata));
                }
            }
            Event::End(end) => {
                let name = end.local_name();
                if name.as_ref() == child.as_bytes()
                    && let Some(done) = capture.take()
                {
                    return Ok(Some(done.trim().to_string()));
                }
                if name.as_ref() == parent.as_bytes() {
                    in_parent = false;
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}
