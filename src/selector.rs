use super::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SelectorAttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
    StartsWith { key: String, value: String },
    EndsWith { key: String, value: String },
    Contains { key: String, value: String },
    Includes { key: String, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SelectorStep {
    pub(crate) tag: Option<String>,
    pub(crate) universal: bool,
    pub(crate) id: Option<String>,
    pub(crate) classes: Vec<String>,
    pub(crate) attrs: Vec<SelectorAttrCondition>,
}

impl SelectorStep {
    fn is_empty(&self) -> bool {
        !self.universal
            && self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SelectorCombinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorPart {
    pub(crate) combinator: SelectorCombinator,
    pub(crate) step: SelectorStep,
}

/// A comma-separated selector list, each alternative a combinator chain.
pub(crate) type SelectorList = Vec<Vec<SelectorPart>>;

pub(crate) fn parse_selector_list(src: &str) -> Result<SelectorList> {
    let mut list = Vec::new();
    for alternative in split_top_level(src) {
        let alternative = alternative.trim();
        if alternative.is_empty() {
            return Err(Error::UnsupportedSelector(src.to_string()));
        }
        list.push(parse_chain(alternative, src)?);
    }
    if list.is_empty() {
        return Err(Error::UnsupportedSelector(src.to_string()));
    }
    Ok(list)
}

fn split_top_level(src: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_brackets = false;
    let mut quote: Option<char> = None;
    for ch in src.chars() {
        if let Some(active) = quote {
            current.push(ch);
            if ch == active {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => {
                quote = Some(ch);
                current.push(ch);
            }
            '[' => {
                in_brackets = true;
                current.push(ch);
            }
            ']' => {
                in_brackets = false;
                current.push(ch);
            }
            ',' if !in_brackets => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    parts.push(current);
    parts
}

fn parse_chain(src: &str, original: &str) -> Result<Vec<SelectorPart>> {
    let mut chain = Vec::new();
    let mut pending = SelectorCombinator::Descendant;
    for token in tokenize_chain(src) {
        match token.as_str() {
            ">" => {
                if chain.is_empty() {
                    return Err(Error::UnsupportedSelector(original.to_string()));
                }
                pending = SelectorCombinator::Child;
            }
            compound => {
                chain.push(SelectorPart {
                    combinator: pending,
                    step: parse_step(compound, original)?,
                });
                pending = SelectorCombinator::Descendant;
            }
        }
    }
    if chain.is_empty() {
        return Err(Error::UnsupportedSelector(original.to_string()));
    }
    Ok(chain)
}

fn tokenize_chain(src: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_brackets = false;
    for ch in src.chars() {
        match ch {
            '[' => {
                in_brackets = true;
                current.push(ch);
            }
            ']' => {
                in_brackets = false;
                current.push(ch);
            }
            '>' if !in_brackets => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(">".to_string());
            }
            ch if ch.is_whitespace() && !in_brackets => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn parse_step(src: &str, original: &str) -> Result<SelectorStep> {
    let chars: Vec<char> = src.chars().collect();
    let mut step = SelectorStep::default();
    let mut i = 0usize;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                step.universal = true;
                i += 1;
            }
            '#' => {
                let (name, next) = read_name(&chars, i + 1);
                if name.is_empty() {
                    return Err(Error::UnsupportedSelector(original.to_string()));
                }
                step.id = Some(name);
                i = next;
            }
            '.' => {
                let (name, next) = read_name(&chars, i + 1);
                if name.is_empty() {
                    return Err(Error::UnsupportedSelector(original.to_string()));
                }
                step.classes.push(name);
                i = next;
            }
            '[' => {
                let end = chars[i..]
                    .iter()
                    .position(|ch| *ch == ']')
                    .map(|offset| i + offset)
                    .ok_or_else(|| Error::UnsupportedSelector(original.to_string()))?;
                let inner: String = chars[i + 1..end].iter().collect();
                step.attrs.push(parse_attr_condition(&inner, original)?);
                i = end + 1;
            }
            ':' => {
                return Err(Error::UnsupportedSelector(original.to_string()));
            }
            ch if is_tag_char(ch) => {
                if step.tag.is_some() || step.id.is_some() || !step.classes.is_empty() {
                    return Err(Error::UnsupportedSelector(original.to_string()));
                }
                let (name, next) = read_name(&chars, i);
                step.tag = Some(name.to_ascii_lowercase());
                i = next;
            }
            _ => return Err(Error::UnsupportedSelector(original.to_string())),
        }
    }
    if step.is_empty() {
        return Err(Error::UnsupportedSelector(original.to_string()));
    }
    Ok(step)
}

fn read_name(chars: &[char], from: usize) -> (String, usize) {
    let mut name = String::new();
    let mut i = from;
    while i < chars.len() && is_tag_char(chars[i]) {
        name.push(chars[i]);
        i += 1;
    }
    (name, i)
}

fn is_tag_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'
}

fn parse_attr_condition(src: &str, original: &str) -> Result<SelectorAttrCondition> {
    let src = src.trim();
    let operators = [("*=", 2usize), ("^=", 2), ("$=", 2), ("~=", 2), ("=", 1)];
    for (operator, width) in operators {
        if let Some(position) = src.find(operator) {
            let key = src[..position].trim().to_ascii_lowercase();
            let value = unquote(src[position + width..].trim());
            if key.is_empty() {
                return Err(Error::UnsupportedSelector(original.to_string()));
            }
            return Ok(match operator {
                "*=" => SelectorAttrCondition::Contains { key, value },
                "^=" => SelectorAttrCondition::StartsWith { key, value },
                "$=" => SelectorAttrCondition::EndsWith { key, value },
                "~=" => SelectorAttrCondition::Includes { key, value },
                _ => SelectorAttrCondition::Eq { key, value },
            });
        }
    }
    if src.is_empty() {
        return Err(Error::UnsupportedSelector(original.to_string()));
    }
    Ok(SelectorAttrCondition::Exists {
        key: src.to_ascii_lowercase(),
    })
}

fn unquote(src: &str) -> String {
    let bytes = src.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        if (first == b'"' || first == b'\'') && bytes[bytes.len() - 1] == first {
            return src[1..src.len() - 1].to_string();
        }
    }
    src.to_string()
}

fn matches_step(dom: &Dom, id: NodeId, step: &SelectorStep) -> bool {
    let Some(element) = dom.element(id) else {
        return false;
    };
    if let Some(tag) = &step.tag {
        if element.tag_name != *tag {
            return false;
        }
    }
    if let Some(wanted) = &step.id {
        if element.attrs.get("id") != Some(wanted) {
            return false;
        }
    }
    for class in &step.classes {
        if !dom.has_class(id, class) {
            return false;
        }
    }
    for condition in &step.attrs {
        let matched = match condition {
            SelectorAttrCondition::Exists { key } => element.attrs.contains_key(key),
            SelectorAttrCondition::Eq { key, value } => {
                element.attrs.get(key).map(String::as_str) == Some(value.as_str())
            }
            SelectorAttrCondition::StartsWith { key, value } => element
                .attrs
                .get(key)
                .is_some_and(|actual| actual.starts_with(value)),
            SelectorAttrCondition::EndsWith { key, value } => element
                .attrs
                .get(key)
                .is_some_and(|actual| actual.ends_with(value)),
            SelectorAttrCondition::Contains { key, value } => element
                .attrs
                .get(key)
                .is_some_and(|actual| actual.contains(value)),
            SelectorAttrCondition::Includes { key, value } => element
                .attrs
                .get(key)
                .is_some_and(|actual| actual.split_ascii_whitespace().any(|token| token == value)),
        };
        if !matched {
            return false;
        }
    }
    true
}

fn matches_chain(dom: &Dom, id: NodeId, chain: &[SelectorPart], scope: NodeId) -> bool {
    let Some((last, rest)) = chain.split_last() else {
        return false;
    };
    if !matches_step(dom, id, &last.step) {
        return false;
    }
    matches_prefix(dom, id, rest, last.combinator, scope)
}

fn matches_prefix(
    dom: &Dom,
    id: NodeId,
    chain: &[SelectorPart],
    combinator: SelectorCombinator,
    scope: NodeId,
) -> bool {
    let Some((last, rest)) = chain.split_last() else {
        return true;
    };
    match combinator {
        SelectorCombinator::Child => {
            let Some(parent) = dom.parent(id) else {
                return false;
            };
            if parent == scope {
                return false;
            }
            matches_step(dom, parent, &last.step)
                && matches_prefix(dom, parent, rest, last.combinator, scope)
        }
        SelectorCombinator::Descendant => {
            let mut current = dom.parent(id);
            while let Some(ancestor) = current {
                if ancestor == scope {
                    return false;
                }
                if matches_step(dom, ancestor, &last.step)
                    && matches_prefix(dom, ancestor, rest, last.combinator, scope)
                {
                    return true;
                }
                current = dom.parent(ancestor);
            }
            false
        }
    }
}

/// All element descendants of `scope` matching the selector list, in
/// document order, without duplicates across alternatives.
pub(crate) fn query_all(dom: &Dom, scope: NodeId, list: &SelectorList) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for id in dom.descendant_elements(scope) {
        if list.iter().any(|chain| matches_chain(dom, id, chain, scope)) && seen.insert(id) {
            out.push(id);
        }
    }
    out
}

pub(crate) fn query_first(dom: &Dom, scope: NodeId, list: &SelectorList) -> Option<NodeId> {
    // id-only fast path through the document index
    if let [chain] = list.as_slice() {
        if let [part] = chain.as_slice() {
            let step = &part.step;
            if step.tag.is_none()
                && !step.universal
                && step.classes.is_empty()
                && step.attrs.is_empty()
            {
                if let Some(wanted) = &step.id {
                    return dom.element_by_id(wanted);
                }
            }
        }
    }
    dom.descendant_elements(scope)
        .into_iter()
        .find(|id| list.iter().any(|chain| matches_chain(dom, *id, chain, scope)))
}
