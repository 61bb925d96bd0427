use super::*;

/// Host-supplied batch lookup for rows local heuristics could not settle.
/// The error type is a plain message: resolver failures are logged and
/// retried on a later scan, never surfaced.
pub trait Resolver {
    fn resolve(&mut self, uids: &[String]) -> std::result::Result<ResolverOutcome, String>;
}

impl<F> Resolver for F
where
    F: FnMut(&[String]) -> std::result::Result<ResolverOutcome, String>,
{
    fn resolve(&mut self, uids: &[String]) -> std::result::Result<ResolverOutcome, String> {
        self(uids)
    }
}

/// The shapes a host resolver may answer with. All normalize to the set of
/// UIDs confirmed out-of-range.
#[derive(Debug, Clone)]
pub enum ResolverOutcome {
    Set(HashSet<String>),
    List(Vec<String>),
    Keyed(HashMap<String, bool>),
}

impl ResolverOutcome {
    pub(crate) fn into_set(self) -> HashSet<String> {
        match self {
            Self::Set(set) => set,
            Self::List(list) => list.into_iter().collect(),
            Self::Keyed(map) => map
                .into_iter()
                .filter(|(_, confirmed)| *confirmed)
                .map(|(uid, _)| uid)
                .collect(),
        }
    }
}

const UID_ATTR_CANDIDATES: &[&str] = &[
    "data-uid",
    "data-sample-uid",
    "data-uid-sample",
    "data-sampleuid",
];

/// Best-effort sample UID extraction: explicit attributes first, then the
/// last path segment of the row's primary link.
pub(crate) fn sample_uid(dom: &Dom, row: NodeId) -> Option<String> {
    for attr in UID_ATTR_CANDIDATES {
        if let Some(value) = dom.attr(row, attr) {
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    let link = dom.descendant_elements(row).into_iter().find(|id| {
        dom.tag_name(*id) == Some("a")
            && dom.attr(*id, "href").is_some()
            && ancestor_cell(dom, *id, row)
    })?;
    let href = dom.attr(link, "href")?;
    let path = href
        .split(['#', '?'])
        .next()
        .unwrap_or(href);
    path.split('/')
        .filter(|part| !part.is_empty())
        .next_back()
        .map(str::to_string)
}

fn ancestor_cell(dom: &Dom, id: NodeId, row: NodeId) -> bool {
    let mut current = dom.parent(id);
    while let Some(ancestor) = current {
        if ancestor == row {
            return false;
        }
        if matches!(dom.tag_name(ancestor), Some("td") | Some("th")) && dom.parent(ancestor) == Some(row)
        {
            return true;
        }
        current = dom.parent(ancestor);
    }
    false
}

/// One scan pass's unresolved rows, grouped by UID in first-seen order.
/// Created when a resolver is configured and local heuristics were
/// inconclusive; consumed when the batch settles.
#[derive(Debug, Default)]
pub(crate) struct PendingBatch {
    pub(crate) uids: Vec<String>,
    pub(crate) rows_by_uid: HashMap<String, Vec<NodeId>>,
}

impl PendingBatch {
    pub(crate) fn insert(&mut self, uid: String, row: NodeId) {
        match self.rows_by_uid.get_mut(&uid) {
            Some(rows) => rows.push(row),
            None => {
                self.uids.push(uid.clone());
                self.rows_by_uid.insert(uid, vec![row]);
            }
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.uids.is_empty()
    }
}
