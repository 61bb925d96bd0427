use super::*;

/// Result of classifying one listing row. Derived on demand, never stored
/// beyond the row's own flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub relevant: bool,
    pub out_of_range: bool,
}

const ICON_TAGS: &[&str] = &["img", "svg", "use", "i"];
const ICON_SOURCE_ATTRS: &[&str] = &["src", "href", "xlink:href"];
const ICON_TEXT_ATTRS: &[&str] = &["alt", "title"];

/// The layered row heuristic. Cheapest and most authoritative signals come
/// first; the first positive layer wins. Rows whose review state is not in
/// the configured set are never inspected further. Missing structure always
/// degrades to `false`.
pub(crate) fn classify(dom: &Dom, row: NodeId, config: &MarkerConfig) -> Classification {
    if dom.element(row).is_none() {
        return Classification {
            relevant: false,
            out_of_range: false,
        };
    }
    let relevant = is_relevant_state(dom, row, config);
    if !relevant {
        return Classification {
            relevant: false,
            out_of_range: false,
        };
    }
    let out_of_range = has_existing_mark(dom, row)
        || has_explicit_data_flag(dom, row)
        || has_class_hint(dom, row, config)
        || has_icon_hint(dom, row, config)
        || has_text_hint(dom, row, config)
        || status_column_fallback(dom, row, config);
    Classification {
        relevant: true,
        out_of_range,
    }
}

fn is_relevant_state(dom: &Dom, row: NodeId, config: &MarkerConfig) -> bool {
    if let Some(state) = dom.attr(row, "data-review-state") {
        let normalized = state.to_ascii_lowercase().replace('_', " ");
        if config
            .review_state_keywords
            .iter()
            .any(|keyword| normalized.contains(keyword))
        {
            return true;
        }
    }
    let text = dom.text_content(row).to_ascii_lowercase();
    config
        .review_state_keywords
        .iter()
        .any(|keyword| text.contains(keyword))
}

/// Layer 1: the server (or an earlier pass) already left the mark.
fn has_existing_mark(dom: &Dom, row: NodeId) -> bool {
    dom.has_class(row, ALERT_CLASS) || dom.attr(row, ALERT_ATTR) == Some("1")
}

/// Layer 2: explicit data flags on the row or a descendant.
fn has_explicit_data_flag(dom: &Dom, row: NodeId) -> bool {
    if dom.attr(row, "data-has-oor") == Some("1") {
        return true;
    }
    dom.descendant_elements(row)
        .iter()
        .any(|id| dom.attr(*id, "data-oor") == Some("1"))
}

/// Layer 3: alert-styled classes on the row itself or on any cell.
fn has_class_hint(dom: &Dom, row: NodeId, config: &MarkerConfig) -> bool {
    if class_token_hit(dom, row, config) {
        return true;
    }
    cells(dom, row)
        .iter()
        .any(|cell| class_token_hit(dom, *cell, config))
}

fn class_token_hit(dom: &Dom, id: NodeId, config: &MarkerConfig) -> bool {
    dom.class_tokens(id)
        .iter()
        .any(|token| config.class_hints.iter().any(|hint| *token == hint.as_str()))
}

/// Layer 4: alert iconography meant for human eyes.
fn has_icon_hint(dom: &Dom, row: NodeId, config: &MarkerConfig) -> bool {
    for id in dom.descendant_elements(row) {
        let Some(tag) = dom.tag_name(id) else {
            continue;
        };
        if !ICON_TAGS.contains(&tag) {
            continue;
        }
        let mut haystack = String::new();
        for attr in ICON_SOURCE_ATTRS.iter().chain(ICON_TEXT_ATTRS) {
            if let Some(value) = dom.attr(id, attr) {
                haystack.push_str(&value.to_ascii_lowercase());
                haystack.push(' ');
            }
        }
        // icon-font elements carry the hint in their class list
        if tag == "i" {
            if let Some(class) = dom.attr(id, "class") {
                haystack.push_str(&class.to_ascii_lowercase());
            }
        }
        if config
            .icon_hints
            .iter()
            .any(|hint| haystack.contains(hint.as_str()))
        {
            return true;
        }
    }
    false
}

/// Layer 5: free text in any cell, multi-language.
fn has_text_hint(dom: &Dom, row: NodeId, config: &MarkerConfig) -> bool {
    let text = dom.text_content(row).to_ascii_lowercase();
    config
        .text_hints
        .iter()
        .any(|hint| text.contains(hint.as_str()))
}

/// Layer 6: last resort, scoped to columns whose own naming suggests they
/// hold status/alert/range content. Re-applies the marker and class checks
/// deep inside just those cells, where shorter hints are safe.
fn status_column_fallback(dom: &Dom, row: NodeId, config: &MarkerConfig) -> bool {
    for cell in cells(dom, row) {
        if !is_status_column(dom, cell, config) {
            continue;
        }
        for id in dom.descendant_elements(cell) {
            if dom.attr(id, "data-oor") == Some("1") || class_token_hit(dom, id, config) {
                return true;
            }
        }
        let text = dom.text_content(cell).to_ascii_lowercase();
        if config
            .text_hints
            .iter()
            .any(|hint| text.contains(hint.as_str()))
        {
            return true;
        }
    }
    false
}

fn is_status_column(dom: &Dom, cell: NodeId, config: &MarkerConfig) -> bool {
    let mut names = dom
        .class_tokens(cell)
        .iter()
        .map(|token| token.to_ascii_lowercase())
        .collect::<Vec<_>>();
    for attr in ["data-column", "headers", "data-field"] {
        if let Some(value) = dom.attr(cell, attr) {
            names.push(value.to_ascii_lowercase());
        }
    }
    names.iter().any(|name| {
        config
            .status_column_hints
            .iter()
            .any(|hint| name.contains(hint.as_str()))
    })
}

pub(crate) fn cells(dom: &Dom, row: NodeId) -> Vec<NodeId> {
    dom.children(row)
        .iter()
        .copied()
        .filter(|id| matches!(dom.tag_name(*id), Some("td") | Some("th")))
        .collect()
}
