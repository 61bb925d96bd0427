use super::*;

/// Per-pass counters, returned from every scan for hosts and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub tables_found: usize,
    pub rows_marked: usize,
    pub rows_processed: usize,
}

impl Engine {
    /// One full scanner pass over the document. Already-processed rows are
    /// skipped, so repeat passes cost only the unprocessed remainder and a
    /// second pass on an unchanged document mutates nothing.
    pub fn scan(&mut self) -> ScanStats {
        self.scan_from(self.dom.root)
    }

    /// Scanner pass restricted to the subtree matching `selector`, for
    /// hosts that know which fragment was re-rendered.
    pub fn scan_subtree(&mut self, selector: &str) -> Result<ScanStats> {
        let list = parse_selector_list(selector)?;
        let root = query_first(&self.dom, self.dom.root, &list)
            .ok_or_else(|| Error::SelectorNotFound(selector.to_string()))?;
        Ok(self.scan_from(root))
    }

    pub(crate) fn scan_from(&mut self, root: NodeId) -> ScanStats {
        let mut stats = ScanStats::default();
        let mut pending = PendingBatch::default();
        for table in self.candidate_tables(root) {
            stats.tables_found += 1;
            self.scan_table(table, &mut stats, &mut pending);
        }
        if !pending.is_empty() {
            self.settle_batch(pending, &mut stats);
        }
        self.scan_count += 1;
        self.last_stats = Some(stats);
        let line = format!(
            "[scan] pass={} tables={} marked={} processed={}",
            self.scan_count, stats.tables_found, stats.rows_marked, stats.rows_processed
        );
        self.trace.line(line);
        stats
    }

    /// Structural selectors tried in order; a bad configured selector is
    /// logged and skipped rather than aborting the pass.
    fn candidate_tables(&mut self, root: NodeId) -> Vec<NodeId> {
        let mut tables = Vec::new();
        let mut seen = HashSet::new();
        for selector in self.config.table_selectors.clone() {
            let list = match parse_selector_list(&selector) {
                Ok(list) => list,
                Err(err) => {
                    self.trace.line(format!("[scan] bad selector {selector}: {err}"));
                    continue;
                }
            };
            for table in query_all(&self.dom, root, &list) {
                if seen.insert(table) && self.table_qualifies(table) {
                    tables.push(table);
                }
            }
        }
        tables
    }

    /// Header keyword gate for pages hosting several unrelated tables: at
    /// least `header_keyword_threshold` distinct keywords must appear
    /// across header cells.
    fn table_qualifies(&self, table: NodeId) -> bool {
        let threshold = self.config.header_keyword_threshold;
        if threshold == 0 {
            return true;
        }
        let mut header_text = String::new();
        for section in self.dom.children(table).to_vec() {
            if self.dom.tag_name(section) == Some("thead") {
                header_text.push_str(&self.dom.text_content(section).to_ascii_lowercase());
                header_text.push(' ');
            }
        }
        let hits = self
            .config
            .header_keywords
            .iter()
            .filter(|keyword| header_text.contains(keyword.as_str()))
            .count();
        hits >= threshold
    }

    fn scan_table(&mut self, table: NodeId, stats: &mut ScanStats, pending: &mut PendingBatch) {
        let Some(tbody) = self
            .dom
            .children(table)
            .iter()
            .copied()
            .find(|id| self.dom.tag_name(*id) == Some("tbody"))
        else {
            return;
        };
        let rows: Vec<NodeId> = self
            .dom
            .children(tbody)
            .iter()
            .copied()
            .filter(|id| self.dom.tag_name(*id) == Some("tr"))
            .collect();
        for row in rows {
            if self.dom.attr(row, PROCESSED_ATTR) == Some("1") {
                continue;
            }
            if is_group_header(&self.dom, row) {
                continue;
            }
            let classification = classify(&self.dom, row, &self.config);
            if !classification.relevant {
                self.flag_processed(row, stats);
                continue;
            }
            if classification.out_of_range {
                self.mark_row(row, stats);
                self.flag_processed(row, stats);
                continue;
            }
            // local heuristics inconclusive
            if self.resolver.is_some() {
                match sample_uid(&self.dom, row) {
                    Some(uid) => pending.insert(uid, row),
                    None => {
                        // can never be consulted, do not re-batch forever
                        self.trace.line("[resolve] row without uid left unmarked".into());
                        self.flag_processed(row, stats);
                    }
                }
            } else {
                self.flag_processed(row, stats);
            }
        }
    }

    fn settle_batch(&mut self, pending: PendingBatch, stats: &mut ScanStats) {
        let Some(resolver) = self.resolver.as_mut() else {
            return;
        };
        let outcome = resolver.resolve(&pending.uids);
        match outcome {
            Ok(outcome) => {
                let confirmed = outcome.into_set();
                self.trace.line(format!(
                    "[resolve] batch uids={} confirmed={}",
                    pending.uids.len(),
                    confirmed.len()
                ));
                for uid in &pending.uids {
                    let rows = pending.rows_by_uid.get(uid).cloned().unwrap_or_default();
                    for row in rows {
                        if confirmed.contains(uid) {
                            self.mark_row(row, stats);
                        }
                        self.flag_processed(row, stats);
                    }
                }
            }
            Err(message) => {
                // leave every batched row unprocessed so a later scan retries
                self.trace.line(format!(
                    "[resolve] batch failed uids={}: {message}",
                    pending.uids.len()
                ));
            }
        }
    }

    fn flag_processed(&mut self, row: NodeId, stats: &mut ScanStats) {
        if self.dom.attr(row, PROCESSED_ATTR) != Some("1") {
            self.dom.set_attr(row, PROCESSED_ATTR, "1");
            stats.rows_processed += 1;
        }
    }

    /// The only externally observable side effect: a stable class, a
    /// boolean attribute, one invisible marker child, and the same marking
    /// mirrored onto the row's category group header.
    pub(crate) fn mark_row(&mut self, row: NodeId, stats: &mut ScanStats) {
        if self.apply_mark(row) {
            stats.rows_marked += 1;
        }
        if let Some(header) = self.group_header_for(row) {
            self.apply_mark(header);
        }
    }

    fn apply_mark(&mut self, row: NodeId) -> bool {
        let already = self.dom.has_class(row, ALERT_CLASS)
            && self.dom.attr(row, ALERT_ATTR) == Some("1");
        self.dom.add_class(row, ALERT_CLASS);
        self.dom.set_attr(row, ALERT_ATTR, "1");
        let has_marker = self
            .dom
            .children(row)
            .iter()
            .any(|id| self.dom.attr(*id, MARKER_ATTR).is_some());
        if !has_marker {
            let mut attrs = HashMap::new();
            attrs.insert("class".to_string(), MARKER_CLASS.to_string());
            attrs.insert(MARKER_ATTR.to_string(), "1".to_string());
            attrs.insert("style".to_string(), "display:none".to_string());
            self.dom.create_element(Some(row), "span", attrs);
        }
        !already
    }

    /// The category group header sharing this row's grouping attribute in
    /// the same table body. The bounded exception to row-local mutation.
    fn group_header_for(&self, row: NodeId) -> Option<NodeId> {
        let category = self.dom.attr(row, CATEGORY_ATTR)?.to_string();
        let tbody = self.dom.parent(row)?;
        self.dom
            .children(tbody)
            .iter()
            .copied()
            .find(|id| {
                *id != row
                    && self.dom.tag_name(*id) == Some("tr")
                    && is_group_header(&self.dom, *id)
                    && self.dom.attr(*id, CATEGORY_ATTR) == Some(category.as_str())
            })
    }
}

pub(crate) fn is_group_header(dom: &Dom, row: NodeId) -> bool {
    dom.attr(row, GROUP_HEADER_ATTR) == Some("1") || dom.has_class(row, GROUP_HEADER_CLASS)
}
