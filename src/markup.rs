//! Lightweight tag scanning for feed and search-result markup
//!
//! This is not a conforming XML/HTML parser. It pulls the few elements the
//! dashboard needs out of well-formed-enough documents and tolerates the rest.

/// Find the next opening `<name` tag at or after `from`; returns the byte
/// offsets of `<` and of the closing `>` of that tag
pub fn find_open_tag(text: &str, name: &str, from: usize) -> Option<(usize, usize)> {
    let needle = format!("<{}", name);
    let mut cursor = from;

    while let Some(found) = text.get(cursor..)?.find(&needle) {
        let start = cursor + found;
        let after = start + needle.len();
        let boundary = text[after..].chars().next();

        if matches!(boundary, Some(c) if c == '>' || c == '/' || c.is_whitespace()) {
            let end = after + text[after..].find('>')?;
            return Some((start, end));
        }
        cursor = after;
    }

    None
}

/// Inner text of every `<name>...</name>` element, in document order
pub fn elements<'a>(text: &'a str, name: &str) -> Vec<&'a str> {
    let close = format!("</{}>", name);
    let mut found = Vec::new();
    let mut cursor = 0;

    while let Some((_, tag_end)) = find_open_tag(text, name, cursor) {
        let body_start = tag_end + 1;
        match text[body_start..].find(&close) {
            Some(len) => {
                found.push(&text[body_start..body_start + len]);
                cursor = body_start + len + close.len();
            }
            None => break,
        }
    }

    found
}

/// Unescaped, trimmed text of the first `<name>` element with a body
pub fn element_text(text: &str, name: &str) -> Option<String> {
    let close = format!("</{}>", name);
    let mut cursor = 0;

    while let Some((_, tag_end)) = find_open_tag(text, name, cursor) {
        cursor = tag_end + 1;
        if text[..tag_end].ends_with('/') {
            // Self-closing, no body
            continue;
        }
        let len = text[cursor..].find(&close)?;
        return Some(unescape(&text[cursor..cursor + len]).trim().to_string());
    }

    None
}

/// Value of attribute `attr` on the first `<name ...>` tag that carries it
pub fn element_attr(text: &str, name: &str, attr: &str) -> Option<String> {
    let mut cursor = 0;

    while let Some((start, end)) = find_open_tag(text, name, cursor) {
        if let Some(value) = attr_value(&text[start..=end], attr) {
            return Some(value);
        }
        cursor = end + 1;
    }

    None
}

/// Value of attribute `attr` inside a single tag such as `<a href="x">`
pub fn attr_value(tag: &str, attr: &str) -> Option<String> {
    let mut cursor = 0;

    while let Some(found) = tag[cursor..].find(attr) {
        let start = cursor + found;
        cursor = start + attr.len();

        let preceded_by_space = tag[..start].ends_with(|c: char| c.is_whitespace());
        let rest = tag[cursor..].trim_start();
        if !preceded_by_space || !rest.starts_with('=') {
            continue;
        }

        let rest = rest[1..].trim_start();
        let quote = rest.chars().next()?;
        if quote == '"' || quote == '\'' {
            let value = &rest[1..];
            let end = value.find(quote)?;
            return Some(unescape(&value[..end]));
        }

        let end = rest
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .unwrap_or(rest.len());
        return Some(unescape(&rest[..end]));
    }

    None
}

/// Drop CDATA markers and decode the common named/numeric entities
pub fn unescape(raw: &str) -> String {
    let text = raw.replace("<![CDATA[", "").replace("]]>", "");
    let mut out = String::with_capacity(text.len());
    let mut rest = text.as_str();

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, end))
        });

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Remove tags and collapse runs of whitespace
pub fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;

    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_open_tag_respects_name_boundary() {
        let text = "<titles>x</titles><title lang=\"en\">y</title>";
        let (start, end) = find_open_tag(text, "title", 0).unwrap();
        assert_eq!(&text[start..=end], "<title lang=\"en\">");
    }

    #[test]
    fn test_elements_collects_each_block() {
        let xml = "<channel><item><title>A</title></item><item><title>B</title></item></channel>";
        let items = elements(xml, "item");
        assert_eq!(items, vec!["<title>A</title>", "<title>B</title>"]);
    }

    #[test]
    fn test_element_text_handles_cdata_and_entities() {
        let xml = "<title><![CDATA[Patch Tuesday & more]]></title>";
        assert_eq!(element_text(xml, "title").unwrap(), "Patch Tuesday & more");

        let xml = "<title>Q&amp;A &#8211; part &#x31;</title>";
        assert_eq!(element_text(xml, "title").unwrap(), "Q&A \u{2013} part 1");
    }

    #[test]
    fn test_element_text_skips_self_closing_tags() {
        let xml = r#"<link rel="self" href="a"/><link>https://b.example</link>"#;
        assert_eq!(element_text(xml, "link").unwrap(), "https://b.example");
        assert_eq!(element_text(r#"<link href="a"/>"#, "link"), None);
    }

    #[test]
    fn test_attr_value_variants() {
        assert_eq!(attr_value(r#"<a href="/x?a=1&amp;b=2">"#, "href").unwrap(), "/x?a=1&b=2");
        assert_eq!(attr_value("<a href='single'>", "href").unwrap(), "single");
        assert_eq!(attr_value("<a href=bare>", "href").unwrap(), "bare");
        assert_eq!(attr_value(r#"<a data-href="no" href="yes">"#, "href").unwrap(), "yes");
        assert_eq!(attr_value("<a>", "href"), None);
    }

    #[test]
    fn test_unescape_leaves_unknown_entities() {
        assert_eq!(unescape("fish &chips; & &bogus;"), "fish &chips; & &bogus;");
        assert_eq!(unescape("&lt;b&gt;"), "<b>");
    }

    #[test]
    fn test_strip_tags_collapses_whitespace() {
        assert_eq!(strip_tags("<p>Hello <b>world</b></p>\n<br/>again"), "Hello world again");
    }
}
