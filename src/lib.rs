//! Deterministic engine that flags out-of-range (OOR) rows in a LIMS
//! sample-listing table. The embedding host drives it explicitly: load or
//! mutate the listing markup, report triggers (DOM mutations, AJAX
//! completions, render-finished signals), and advance the virtual clock.
//! Marked rows gain a stable class and attribute the host stylesheet keys
//! on; everything else is row-local and idempotent.

use std::collections::{HashMap, HashSet, VecDeque};
use std::error::Error as StdError;
use std::fmt;

mod classify;
mod config;
mod dom;
mod html;
mod resolve;
mod scan;
mod schedule;
mod selector;
mod trace;

pub use classify::Classification;
pub use config::{Capabilities, FlagStore, MarkerConfig, MemoryFlagStore};
pub use resolve::{Resolver, ResolverOutcome};
pub use scan::ScanStats;
pub use schedule::PendingTimer;

use classify::classify;
use config::{
    ALERT_ATTR, ALERT_CLASS, CATEGORY_ATTR, FLAG_DEBUG, FLAG_ENABLED, FLAG_MIGRATED,
    GROUP_HEADER_ATTR, GROUP_HEADER_CLASS, LEGACY_FLAG_ENABLED, MARKER_ATTR, MARKER_CLASS,
    PROCESSED_ATTR,
};
use dom::{Dom, NodeId};
use html::parse_fragment;
use resolve::{sample_uid, PendingBatch};
use schedule::{ScanState, ScheduledTask};
use selector::{parse_selector_list, query_all, query_first};
use trace::TraceState;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    HtmlParse(String),
    UnsupportedSelector(String),
    SelectorNotFound(String),
    Scheduler(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HtmlParse(msg) => write!(f, "html parse error: {msg}"),
            Self::UnsupportedSelector(selector) => write!(f, "unsupported selector: {selector}"),
            Self::SelectorNotFound(selector) => write!(f, "selector not found: {selector}"),
            Self::Scheduler(msg) => write!(f, "scheduler error: {msg}"),
        }
    }
}

impl StdError for Error {}

pub struct Engine {
    dom: Dom,
    config: MarkerConfig,
    resolver: Option<Box<dyn Resolver>>,
    flag_store: Option<Box<dyn FlagStore>>,
    route_re: Option<fancy_regex::Regex>,
    endpoint_re: Option<fancy_regex::Regex>,
    location: String,
    trace: TraceState,
    task_queue: Vec<ScheduledTask>,
    now_ms: i64,
    timer_step_limit: usize,
    next_timer_id: i64,
    next_task_order: i64,
    scan_state: ScanState,
    rearm: bool,
    scan_count: usize,
    last_stats: Option<ScanStats>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("location", &self.location)
            .field("now_ms", &self.now_ms)
            .field("scan_count", &self.scan_count)
            .field("last_stats", &self.last_stats)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Builds an engine with explicit configuration and host capabilities.
    /// Persisted flags (when a store is present) override the constructed
    /// `enabled`/`debug` values, after a one-time legacy-key migration.
    pub fn new(config: MarkerConfig, capabilities: Capabilities) -> Self {
        let Capabilities {
            resolver,
            flag_store,
        } = capabilities;
        let mut engine = Self {
            dom: Dom::new(),
            config,
            resolver,
            flag_store,
            route_re: None,
            endpoint_re: None,
            location: String::new(),
            trace: TraceState::default(),
            task_queue: Vec::new(),
            now_ms: 0,
            timer_step_limit: 10_000,
            next_timer_id: 1,
            next_task_order: 0,
            scan_state: ScanState::Idle,
            rearm: false,
            scan_count: 0,
            last_stats: None,
        };
        engine.load_persisted_flags();
        engine.trace.enabled = engine.config.debug;
        engine.compile_patterns();
        engine
    }

    /// Default configuration, no capabilities, initial content loaded and
    /// an initial scan scheduled.
    pub fn from_html(html: &str) -> Result<Self> {
        let mut engine = Self::new(MarkerConfig::default(), Capabilities::default());
        engine.config.route_pattern = None;
        engine.compile_patterns();
        engine.load_html(html)?;
        Ok(engine)
    }

    /// A bad persisted value or pattern never breaks the page: pattern
    /// compile failures are logged and that one gate degrades.
    fn compile_patterns(&mut self) {
        self.route_re = match &self.config.route_pattern {
            Some(pattern) => match fancy_regex::Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(err) => {
                    self.trace
                        .line(format!("[flags] bad route pattern {pattern}: {err}"));
                    None
                }
            },
            None => None,
        };
        self.endpoint_re = match fancy_regex::Regex::new(&self.config.endpoint_pattern) {
            Ok(re) => Some(re),
            Err(err) => {
                self.trace.line(format!(
                    "[flags] bad endpoint pattern {}: {err}",
                    self.config.endpoint_pattern
                ));
                None
            }
        };
    }

    fn load_persisted_flags(&mut self) {
        let Some(store) = self.flag_store.as_mut() else {
            return;
        };
        if store.get(FLAG_MIGRATED).is_none() {
            if let Some(legacy) = store.get(LEGACY_FLAG_ENABLED) {
                store.set(FLAG_ENABLED, &legacy);
            }
            store.set(FLAG_MIGRATED, "1");
        }
        if let Some(enabled) = store.get(FLAG_ENABLED) {
            self.config.enabled = enabled == "1";
        }
        if let Some(debug) = store.get(FLAG_DEBUG) {
            self.config.debug = debug == "1";
        }
    }

    pub fn config(&self) -> &MarkerConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    // --- document and location -------------------------------------------

    /// Replaces the whole document and schedules the initial scan, the way
    /// a page load does.
    pub fn load_html(&mut self, html: &str) -> Result<()> {
        self.dom = parse_fragment(html)?;
        self.request_scan("load");
        Ok(())
    }

    /// Sets the current location. Only the path decides route gating.
    pub fn set_location(&mut self, url: &str) {
        self.location = url.to_string();
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    // --- host-driven DOM mutation ----------------------------------------

    /// Parses `html` and grafts it under the first node matching
    /// `parent_selector`. Added nodes count as a mutation trigger, the way
    /// an observed childList mutation does.
    pub fn insert_html(&mut self, parent_selector: &str, html: &str) -> Result<usize> {
        let list = parse_selector_list(parent_selector)?;
        let parent = query_first(&self.dom, self.dom.root, &list)
            .ok_or_else(|| Error::SelectorNotFound(parent_selector.to_string()))?;
        let fragment = parse_fragment(html)?;
        let added = self.dom.graft(&fragment, fragment.root, parent);
        if added > 0 {
            self.request_scan("mutation");
        }
        Ok(added)
    }

    /// Replaces the children of the first node matching `selector`, the
    /// way a listing re-render swaps a table body.
    pub fn replace_children(&mut self, selector: &str, html: &str) -> Result<usize> {
        let list = parse_selector_list(selector)?;
        let target = query_first(&self.dom, self.dom.root, &list)
            .ok_or_else(|| Error::SelectorNotFound(selector.to_string()))?;
        self.dom.detach_children(target);
        let fragment = parse_fragment(html)?;
        let added = self.dom.graft(&fragment, fragment.root, target);
        if added > 0 {
            self.request_scan("mutation");
        }
        Ok(added)
    }

    // --- manual control surface ------------------------------------------

    /// Operator command: clear processed flags and scan immediately,
    /// bypassing the debounce window and the route gate. Alert marks are
    /// never cleared.
    pub fn rescan(&mut self) -> ScanStats {
        if !self.config.enabled {
            return ScanStats::default();
        }
        let rows: Vec<NodeId> = self
            .dom
            .descendant_elements(self.dom.root)
            .into_iter()
            .filter(|id| self.dom.attr(*id, PROCESSED_ATTR).is_some())
            .collect();
        for row in rows {
            if let Some(element) = self.dom.element_mut(row) {
                element.attrs.remove(PROCESSED_ATTR);
            }
        }
        self.trace.line("[scan] manual rescan".into());
        self.scan()
    }

    pub fn enable(&mut self) {
        self.config.enabled = true;
        if let Some(store) = self.flag_store.as_mut() {
            store.set(FLAG_ENABLED, "1");
        }
        self.trace.line("[flags] enabled".into());
    }

    /// Disables the engine and drops any pending scheduled work.
    pub fn disable(&mut self) {
        self.config.enabled = false;
        self.task_queue.clear();
        self.scan_state = ScanState::Idle;
        self.rearm = false;
        if let Some(store) = self.flag_store.as_mut() {
            store.set(FLAG_ENABLED, "0");
        }
        self.trace.line("[flags] disabled".into());
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.config.debug = debug;
        self.trace.enabled = debug;
        if let Some(store) = self.flag_store.as_mut() {
            store.set(FLAG_DEBUG, if debug { "1" } else { "0" });
        }
    }

    // --- introspection ----------------------------------------------------

    pub fn scan_count(&self) -> usize {
        self.scan_count
    }

    pub fn last_scan_stats(&self) -> Option<ScanStats> {
        self.last_stats
    }

    pub fn trace_logs(&self) -> Vec<String> {
        self.trace.logs.iter().cloned().collect()
    }

    pub fn query_count(&self, selector: &str) -> Result<usize> {
        let list = parse_selector_list(selector)?;
        Ok(query_all(&self.dom, self.dom.root, &list).len())
    }

    pub fn row_is_marked(&self, selector: &str) -> Result<bool> {
        let row = self.require_first(selector)?;
        Ok(self.dom.has_class(row, ALERT_CLASS) && self.dom.attr(row, ALERT_ATTR) == Some("1"))
    }

    pub fn row_is_processed(&self, selector: &str) -> Result<bool> {
        let row = self.require_first(selector)?;
        Ok(self.dom.attr(row, PROCESSED_ATTR) == Some("1"))
    }

    pub fn row_has_marker_element(&self, selector: &str) -> Result<bool> {
        let row = self.require_first(selector)?;
        Ok(self
            .dom
            .children(row)
            .iter()
            .any(|id| self.dom.attr(*id, MARKER_ATTR).is_some()))
    }

    pub fn marked_row_count(&self) -> usize {
        self.count_rows_with(|dom, id| dom.has_class(id, ALERT_CLASS))
    }

    pub fn processed_row_count(&self) -> usize {
        self.count_rows_with(|dom, id| dom.attr(id, PROCESSED_ATTR) == Some("1"))
    }

    fn count_rows_with(&self, predicate: impl Fn(&Dom, NodeId) -> bool) -> usize {
        self.dom
            .descendant_elements(self.dom.root)
            .into_iter()
            .filter(|id| self.dom.tag_name(*id) == Some("tr") && predicate(&self.dom, *id))
            .count()
    }

    /// Classifies the first row matching `selector` without touching it.
    pub fn classify_row(&self, selector: &str) -> Result<Classification> {
        let row = self.require_first(selector)?;
        Ok(classify(&self.dom, row, &self.config))
    }

    pub fn sample_uid_of(&self, selector: &str) -> Result<Option<String>> {
        let row = self.require_first(selector)?;
        Ok(sample_uid(&self.dom, row))
    }

    fn require_first(&self, selector: &str) -> Result<NodeId> {
        let list = parse_selector_list(selector)?;
        query_first(&self.dom, self.dom.root, &list)
            .ok_or_else(|| Error::SelectorNotFound(selector.to_string()))
    }
}

#[cfg(test)]
mod tests;
