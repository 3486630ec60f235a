//! XMP packet reading and in-place editing.
//!
//! Packets are edited as text: elements the writer owns are removed and
//! re-inserted at the end of the first `rdf:Description`; everything else in
//! the packet is left byte-for-byte as found.

pub const DC_SUBJECT: &str = "dc:subject";
pub const LR_HIERARCHICAL_SUBJECT: &str = "lr:hierarchicalSubject";
pub const XMP_RATING: &str = "xmp:Rating";
pub const XMP_CREATE_DATE: &str = "xmp:CreateDate";

const DESCRIPTION_OPEN: &str = "<rdf:Description";
const DESCRIPTION_CLOSE: &str = "</rdf:Description>";

fn namespace_uri(prefix: &str) -> Option<&'static str> {
    match prefix {
        "dc" => Some("http://purl.org/dc/elements/1.1/"),
        "xmp" => Some("http://ns.adobe.com/xap/1.0/"),
        "lr" => Some("http://ns.adobe.com/lightroom/1.0/"),
        _ => None,
    }
}

/// Items of an `rdf:Bag`/`rdf:Seq` property, trimmed, in document order.
pub fn bag(xmp: &str, element: &str) -> Vec<String> {
    let Some((start, end)) = element_span(xmp, element) else {
        return Vec::new();
    };

    let mut items = Vec::new();
    let mut rest = &xmp[start..end];
    while let Some(open) = find_tag(rest, "rdf:li", 0) {
        let after = &rest[open..];
        let Some(gt) = after.find('>') else { break };
        if after[..gt].ends_with('/') {
            rest = &after[gt + 1..];
            continue;
        }
        let body = &after[gt + 1..];
        let Some(close) = body.find("</rdf:li>") else { break };
        let text = xml_unescape(body[..close].trim());
        if !text.is_empty() {
            items.push(text);
        }
        rest = &body[close + "</rdf:li>".len()..];
    }
    items
}

/// A simple property, in either attribute (`xmp:Rating="3"`) or element form.
pub fn property(xmp: &str, name: &str) -> Option<String> {
    if let Some((_, _, value)) = find_attribute(xmp, name) {
        let value = xml_unescape(value.trim());
        return if value.is_empty() { None } else { Some(value) };
    }

    let (start, end) = element_span(xmp, name)?;
    let element = &xmp[start..end];
    let body_start = element.find('>')? + 1;
    let body_end = element.rfind("</")?;
    let body = element.get(body_start..body_end)?;

    // rdf:Alt / rdf:Seq wrappers: take the first item
    let text = if body.contains("<rdf:li") {
        let li = find_tag(body, "rdf:li", 0)?;
        let open_end = li + body[li..].find('>')? + 1;
        let close = body[open_end..].find("</rdf:li>")? + open_end;
        &body[open_end..close]
    } else {
        body
    };

    let text = xml_unescape(text.trim());
    if text.is_empty() { None } else { Some(text) }
}

/// Replace a bag property. An empty list removes it.
/// Returns `None` when there is no packet and nothing to write.
pub fn set_bag(existing: Option<&str>, element: &str, items: &[String]) -> Option<String> {
    if existing.is_none() && items.is_empty() {
        return None;
    }
    let mut xmp = prepare(existing, element);
    remove_element(&mut xmp, element);

    if !items.is_empty() {
        let mut rendered = format!("  <{element}><rdf:Bag>\n");
        for item in items {
            rendered.push_str(&format!("    <rdf:li>{}</rdf:li>\n", xml_escape(item)));
        }
        rendered.push_str(&format!("  </rdf:Bag></{element}>\n"));
        insert_into_description(&mut xmp, &rendered);
    }
    Some(xmp)
}

/// Replace a simple property. `None` removes it.
pub fn set_property(existing: Option<&str>, name: &str, value: Option<&str>) -> Option<String> {
    if existing.is_none() && value.is_none() {
        return None;
    }
    let mut xmp = prepare(existing, name);
    remove_element(&mut xmp, name);
    while let Some((start, end, _)) = find_attribute(&xmp, name) {
        xmp.replace_range(start..end, "");
    }

    if let Some(value) = value {
        let rendered = format!("  <{name}>{}</{name}>\n", xml_escape(value));
        insert_into_description(&mut xmp, &rendered);
    }
    Some(xmp)
}

fn fresh_packet() -> String {
    let mut xmp = String::new();
    xmp.push_str("<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\n");
    xmp.push_str("<x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\n");
    xmp.push_str("<rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\n");
    xmp.push_str("<rdf:Description rdf:about=\"\">\n");
    xmp.push_str("</rdf:Description>\n");
    xmp.push_str("</rdf:RDF>\n");
    xmp.push_str("</x:xmpmeta>\n");
    xmp.push_str("<?xpacket end=\"w\"?>");
    xmp
}

/// Make sure the packet has an open first `rdf:Description` declaring the
/// namespace of `qualified_name`.
fn prepare(existing: Option<&str>, qualified_name: &str) -> String {
    let mut xmp = match existing {
        Some(text) if text.contains(DESCRIPTION_OPEN) => text.to_string(),
        Some(text) if text.contains("</rdf:RDF>") => {
            let mut xmp = text.to_string();
            if let Some(pos) = xmp.find("</rdf:RDF>") {
                xmp.insert_str(pos, "<rdf:Description rdf:about=\"\">\n</rdf:Description>\n");
            }
            xmp
        }
        Some(_) => {
            log::debug!("XMP packet has no rdf:RDF element, replacing it");
            fresh_packet()
        }
        None => fresh_packet(),
    };

    open_first_description(&mut xmp);

    if let Some((prefix, _)) = qualified_name.split_once(':') {
        ensure_namespace(&mut xmp, prefix);
    }
    xmp
}

/// End of the first `rdf:Description` start tag (index just past `>`).
fn first_description_head(xmp: &str) -> Option<(usize, usize)> {
    let start = find_tag(xmp, "rdf:Description", 0)?;
    let end = start + xmp[start..].find('>')? + 1;
    Some((start, end))
}

fn open_first_description(xmp: &mut String) {
    let Some((_, end)) = first_description_head(xmp) else { return };
    if xmp[..end].ends_with("/>") {
        xmp.replace_range(end - 2..end, ">");
        xmp.insert_str(end - 1, "\n</rdf:Description>");
    }
}

fn ensure_namespace(xmp: &mut String, prefix: &str) {
    let Some(uri) = namespace_uri(prefix) else { return };
    let Some((start, end)) = first_description_head(xmp) else { return };

    let declaration = format!("xmlns:{prefix}=");
    if xmp[..end].contains(&declaration) {
        return;
    }

    let head = &xmp[start..end];
    let insert_at = match head.find("rdf:about=\"\"") {
        Some(pos) => start + pos + "rdf:about=\"\"".len(),
        None => start + DESCRIPTION_OPEN.len(),
    };
    xmp.insert_str(insert_at, &format!("\n  xmlns:{prefix}=\"{uri}\""));
}

fn insert_into_description(xmp: &mut String, rendered: &str) {
    let Some((_, head_end)) = first_description_head(xmp) else { return };
    let Some(close) = xmp[head_end..].find(DESCRIPTION_CLOSE).map(|p| p + head_end) else {
        return;
    };
    // Insert at the start of the closing tag's line so its indentation is kept.
    let line_start = xmp[..close].rfind('\n').map_or(0, |p| p + 1);
    let indent_only = xmp[line_start..close].chars().all(|c| c == ' ' || c == '\t');
    let at = if line_start >= head_end && indent_only {
        line_start
    } else {
        close
    };
    xmp.insert_str(at, rendered);
}

/// Find `<tag` followed by a tag-name boundary, starting at `from`.
fn find_tag(xml: &str, tag: &str, from: usize) -> Option<usize> {
    let needle = format!("<{tag}");
    let mut search = from;
    while let Some(pos) = xml.get(search..)?.find(&needle) {
        let at = search + pos;
        match xml.as_bytes().get(at + needle.len()) {
            Some(b'>' | b'/' | b' ' | b'\t' | b'\r' | b'\n') => return Some(at),
            _ => search = at + needle.len(),
        }
    }
    None
}

/// Span of a non-self-closing element, from `<tag` to the end of `</tag>`.
fn element_span(xml: &str, tag: &str) -> Option<(usize, usize)> {
    let start = find_tag(xml, tag, 0)?;
    let gt = start + xml[start..].find('>')?;
    if xml[..gt].ends_with('/') {
        return None;
    }
    let close = format!("</{tag}>");
    let end = gt + xml[gt..].find(&close)? + close.len();
    Some((start, end))
}

/// Find an attribute `name="value"` (or single-quoted). Returns the span of
/// the attribute including its leading whitespace, and the raw value.
fn find_attribute<'a>(xml: &'a str, name: &str) -> Option<(usize, usize, &'a str)> {
    let mut search = 0;
    while let Some(pos) = xml.get(search..)?.find(name) {
        let at = search + pos;
        search = at + name.len();

        let preceded_by_space = at > 0 && xml.as_bytes()[at - 1].is_ascii_whitespace();
        let rest = &xml[search..];
        let Some(rest) = rest.strip_prefix('=') else { continue };
        let Some(quote) = rest.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            continue;
        };
        if !preceded_by_space {
            continue;
        }
        let value_start = search + 2;
        let Some(len) = xml[value_start..].find(quote) else { continue };
        let value = &xml[value_start..value_start + len];

        let mut start = at;
        while start > 0 && xml.as_bytes()[start - 1].is_ascii_whitespace() {
            start -= 1;
        }
        return Some((start, value_start + len + 1, value));
    }
    None
}

/// Remove every occurrence of an element, with its indentation and trailing newline.
fn remove_element(xml: &mut String, tag: &str) {
    let close = format!("</{tag}>");
    while let Some(start) = find_tag(xml, tag, 0) {
        let Some(gt) = xml[start..].find('>').map(|p| p + start) else { break };
        let end = if xml[..gt].ends_with('/') {
            gt + 1
        } else {
            match xml[gt..].find(&close) {
                Some(pos) => gt + pos + close.len(),
                None => break,
            }
        };
        let end = if xml.as_bytes().get(end) == Some(&b'\n') { end + 1 } else { end };

        let line_start = xml[..start].rfind('\n').map_or(0, |p| p + 1);
        let start = if xml[line_start..start].chars().all(|c| c == ' ' || c == '\t') {
            line_start
        } else {
            start
        };
        xml.replace_range(start..end, "");
    }
}

/// Escape special XML characters.
fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn xml_unescape(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };
        let entity = &tail[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
