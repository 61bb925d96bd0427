use super::*;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Lenient fragment parser for the listing markup this crate inspects.
/// Unknown constructs are skipped rather than rejected; only unterminated
/// tags are reported as parse errors.
pub(crate) fn parse_fragment(html: &str) -> Result<Dom> {
    let mut dom = Dom::new();
    let root = dom.root;
    parse_into(&mut dom, root, html)?;
    Ok(dom)
}

pub(crate) fn parse_into(dom: &mut Dom, parent: NodeId, html: &str) -> Result<()> {
    let chars: Vec<char> = html.chars().collect();
    let mut i = 0usize;
    let mut open_stack: Vec<NodeId> = vec![parent];

    while i < chars.len() {
        if chars[i] == '<' {
            if starts_with(&chars, i, "<!--") {
                i = match find_seq(&chars, i + 4, "-->") {
                    Some(end) => end + 3,
                    None => chars.len(),
                };
                continue;
            }
            if starts_with(&chars, i, "<!") {
                // doctype or other declaration
                i = match find_char(&chars, i, '>') {
                    Some(end) => end + 1,
                    None => chars.len(),
                };
                continue;
            }
            if starts_with(&chars, i, "</") {
                let end = find_char(&chars, i, '>')
                    .ok_or_else(|| Error::HtmlParse("unterminated close tag".into()))?;
                let name: String = chars[i + 2..end]
                    .iter()
                    .collect::<String>()
                    .trim()
                    .to_ascii_lowercase();
                close_tag(dom, &mut open_stack, &name);
                i = end + 1;
                continue;
            }
            let end = find_char(&chars, i, '>')
                .ok_or_else(|| Error::HtmlParse("unterminated open tag".into()))?;
            let inner: String = chars[i + 1..end].iter().collect();
            let self_closing = inner.trim_end().ends_with('/');
            let inner = inner.trim_end().trim_end_matches('/');
            let (tag_name, attrs) = parse_open_tag(inner);
            if tag_name.is_empty() {
                i = end + 1;
                continue;
            }
            open_element(dom, &mut open_stack, &tag_name, attrs, self_closing);
            i = end + 1;
            continue;
        }

        let text_end = find_char(&chars, i, '<').unwrap_or(chars.len());
        let raw: String = chars[i..text_end].iter().collect();
        if !raw.trim().is_empty() {
            let decoded = decode_character_references(&raw);
            let current = *open_stack.last().unwrap_or(&parent);
            dom.create_text(current, &decoded);
        }
        i = text_end;
    }
    Ok(())
}

fn open_element(
    dom: &mut Dom,
    open_stack: &mut Vec<NodeId>,
    tag_name: &str,
    attrs: HashMap<String, String>,
    self_closing: bool,
) {
    apply_implied_structure(dom, open_stack, tag_name);
    let parent = *open_stack.last().expect("open stack never empties");
    let id = dom.create_element(Some(parent), tag_name, attrs);
    if !self_closing && !VOID_ELEMENTS.contains(&tag_name) {
        open_stack.push(id);
    }
}

/// Minimal tree-construction quirks: rows directly under a table gain an
/// implied tbody, and a new row or cell auto-closes the one still open.
fn apply_implied_structure(dom: &mut Dom, open_stack: &mut Vec<NodeId>, tag_name: &str) {
    match tag_name {
        "tr" => {
            while let Some(top) = current_tag(dom, open_stack) {
                match top {
                    "td" | "th" | "tr" => {
                        open_stack.pop();
                    }
                    _ => break,
                }
            }
            if current_tag(dom, open_stack) == Some("table") {
                let table = *open_stack.last().expect("checked above");
                let tbody = dom.create_element(Some(table), "tbody", HashMap::new());
                open_stack.push(tbody);
            }
        }
        "td" | "th" => {
            while let Some(top) = current_tag(dom, open_stack) {
                match top {
                    "td" | "th" => {
                        open_stack.pop();
                    }
                    _ => break,
                }
            }
        }
        "tbody" | "thead" | "tfoot" => {
            while let Some(top) = current_tag(dom, open_stack) {
                match top {
                    "td" | "th" | "tr" | "tbody" | "thead" | "tfoot" => {
                        open_stack.pop();
                    }
                    _ => break,
                }
            }
        }
        _ => {}
    }
}

fn current_tag<'a>(dom: &'a Dom, open_stack: &[NodeId]) -> Option<&'a str> {
    open_stack.last().and_then(|id| dom.tag_name(*id))
}

fn close_tag(dom: &mut Dom, open_stack: &mut Vec<NodeId>, name: &str) {
    // index 0 is the fragment parent and must never be closed
    let Some(position) = open_stack
        .iter()
        .rposition(|id| dom.tag_name(*id) == Some(name))
        .filter(|position| *position > 0)
    else {
        // stray close tag, ignore
        return;
    };
    open_stack.truncate(position);
}

fn parse_open_tag(src: &str) -> (String, HashMap<String, String>) {
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0usize;
    let mut name = String::new();
    while i < chars.len() && is_name_char(chars[i]) {
        name.push(chars[i].to_ascii_lowercase());
        i += 1;
    }
    let mut attrs = HashMap::new();
    while i < chars.len() {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i >= chars.len() {
            break;
        }
        let mut attr_name = String::new();
        while i < chars.len() && is_name_char(chars[i]) {
            attr_name.push(chars[i].to_ascii_lowercase());
            i += 1;
        }
        if attr_name.is_empty() {
            i += 1;
            continue;
        }
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i >= chars.len() || chars[i] != '=' {
            attrs.insert(attr_name, String::new());
            continue;
        }
        i += 1;
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        let mut value = String::new();
        if i < chars.len() && (chars[i] == '"' || chars[i] == '\'') {
            let quote = chars[i];
            i += 1;
            while i < chars.len() && chars[i] != quote {
                value.push(chars[i]);
                i += 1;
            }
            i += 1;
        } else {
            while i < chars.len() && !chars[i].is_whitespace() {
                value.push(chars[i]);
                i += 1;
            }
        }
        attrs.insert(attr_name, decode_character_references(&value));
    }
    (name, attrs)
}

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == ':'
}

pub(crate) fn decode_character_references(src: &str) -> String {
    if !src.contains('&') {
        return src.to_string();
    }
    let chars: Vec<char> = src.chars().collect();
    let mut out = String::new();
    let mut i = 0usize;
    while i < chars.len() {
        if chars[i] != '&' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let Some(end) = find_char(&chars, i, ';') else {
            out.push('&');
            i += 1;
            continue;
        };
        let entity: String = chars[i + 1..end].iter().collect();
        let decoded = match entity.as_str() {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some(' '),
            _ => decode_numeric_reference(&entity),
        };
        match decoded {
            Some(ch) => {
                out.push(ch);
                i = end + 1;
            }
            None => {
                out.push('&');
                i += 1;
            }
        }
    }
    out
}

fn decode_numeric_reference(entity: &str) -> Option<char> {
    let value = entity.strip_prefix('#')?;
    let codepoint = if let Some(hex) = value.strip_prefix('x').or_else(|| value.strip_prefix('X')) {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        value.parse::<u32>().ok()?
    };
    char::from_u32(codepoint)
}

fn starts_with(chars: &[char], at: usize, pattern: &str) -> bool {
    pattern
        .chars()
        .enumerate()
        .all(|(offset, ch)| chars.get(at + offset) == Some(&ch))
}

fn find_char(chars: &[char], from: usize, target: char) -> Option<usize> {
    chars[from..]
        .iter()
        .position(|ch| *ch == target)
        .map(|offset| from + offset)
}

fn find_seq(chars: &[char], from: usize, pattern: &str) -> Option<usize> {
    let mut i = from;
    while i < chars.len() {
        if starts_with(chars, i, pattern) {
            return Some(i);
        }
        i += 1;
    }
    None
}
