use super::*;

pub(crate) const ALERT_CLASS: &str = "row-flag-alert";
pub(crate) const ALERT_ATTR: &str = "data-row-alert";
pub(crate) const PROCESSED_ATTR: &str = "data-oor-processed";
pub(crate) const MARKER_CLASS: &str = "oor-marker";
pub(crate) const MARKER_ATTR: &str = "data-oor-marker";
pub(crate) const CATEGORY_ATTR: &str = "data-category";
pub(crate) const GROUP_HEADER_ATTR: &str = "data-group-header";
pub(crate) const GROUP_HEADER_CLASS: &str = "category-header";

pub(crate) const FLAG_ENABLED: &str = "oor.enabled";
pub(crate) const FLAG_DEBUG: &str = "oor.debug";
pub(crate) const FLAG_MIGRATED: &str = "oor.migrated";
pub(crate) const LEGACY_FLAG_ENABLED: &str = "infolabsa.enabled";

/// Origin-scoped persistent key-value storage, as the host page provides it.
/// Absence of a store degrades persistence only; toggles still work in memory.
pub trait FlagStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
}

#[derive(Debug, Default, Clone)]
pub struct MemoryFlagStore {
    entries: HashMap<String, String>,
}

impl MemoryFlagStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FlagStore for MemoryFlagStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }
}

/// All heuristic keyword/selector lists are data, not code; the historical
/// strict/relaxed variants are presets over this one shape.
#[derive(Debug, Clone)]
pub struct MarkerConfig {
    pub enabled: bool,
    pub debug: bool,
    pub debounce_ms: i64,
    pub settle_delays_ms: Vec<i64>,
    /// Route pattern gating every trigger and scan; `None` disables gating.
    pub route_pattern: Option<String>,
    /// Listing data-fetch endpoint pattern for AJAX completion triggers.
    pub endpoint_pattern: String,
    pub table_selectors: Vec<String>,
    pub header_keywords: Vec<String>,
    /// Minimum distinct header keyword hits for a table to qualify;
    /// zero accepts every structural selector match.
    pub header_keyword_threshold: usize,
    pub review_state_keywords: Vec<String>,
    pub text_hints: Vec<String>,
    pub icon_hints: Vec<String>,
    pub class_hints: Vec<String>,
    pub status_column_hints: Vec<String>,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debug: false,
            debounce_ms: 100,
            settle_delays_ms: vec![16, 250, 1000],
            route_pattern: Some(r"/samples/?(\?|$)".to_string()),
            endpoint_pattern: r"/folderitems(\?|$)".to_string(),
            table_selectors: vec![
                "table.listing".to_string(),
                "table.listing-table".to_string(),
                "table#listing".to_string(),
                "table.table".to_string(),
            ],
            header_keywords: [
                "sample",
                "sample id",
                "status",
                "state",
                "result",
                "muestra",
                "estado",
                "resultado",
            ]
            .map(String::from)
            .to_vec(),
            header_keyword_threshold: 0,
            review_state_keywords: [
                "to be verified",
                "pending verification",
                "por verificar",
                "verified",
                "verificada",
                "verificado",
            ]
            .map(String::from)
            .to_vec(),
            text_hints: [
                "fuera de rango",
                "out of range",
                "out-of-range",
                "oor",
                "range violation",
                "critical",
                "panic",
            ]
            .map(String::from)
            .to_vec(),
            icon_hints: ["exclamation", "warning"].map(String::from).to_vec(),
            class_hints: [
                "oor",
                "out-of-range",
                "outofrange",
                "range-alert",
                "alert",
                "critical",
                "exceptional",
            ]
            .map(String::from)
            .to_vec(),
            status_column_hints: ["status", "state", "alert", "range", "estado"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl MarkerConfig {
    /// Header-qualified tables only, route-gated. For pages that host
    /// several unrelated tables next to the listing.
    pub fn strict() -> Self {
        Self {
            header_keyword_threshold: 2,
            ..Self::default()
        }
    }

    /// Every structural selector match qualifies, on any route.
    pub fn relaxed() -> Self {
        Self {
            route_pattern: None,
            ..Self::default()
        }
    }
}

/// Optional host-supplied capabilities, injected at construction.
#[derive(Default)]
pub struct Capabilities {
    pub resolver: Option<Box<dyn Resolver>>,
    pub flag_store: Option<Box<dyn FlagStore>>,
}

impl Capabilities {
    pub fn with_resolver(mut self, resolver: Box<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_flag_store(mut self, flag_store: Box<dyn FlagStore>) -> Self {
        self.flag_store = Some(flag_store);
        self
    }
}
