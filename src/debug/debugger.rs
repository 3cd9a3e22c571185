use std::sync::{Arc, OnceLock, RwLock};

use serde::Serialize;

use crate::state::{StateKey, StateTree};

type NameFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;
type Logger = Arc<dyn Fn(&MutationRecord) + Send + Sync>;

/// One observed state change.
///
/// Produced once per intercepted mutation and consumed immediately by the
/// active filters and logger; never retained afterwards.
#[derive(Clone, Debug, Serialize)]
pub struct MutationRecord {
    /// Id of the store that committed the change.
    pub store_name: String,
    /// Name of the action that ran (`$patch` / `$reset` for patches and
    /// resets).
    pub action_name: String,
    /// The tree before the mutation.
    pub old_state: StateTree,
    /// The tree after the mutation.
    pub new_state: StateTree,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl MutationRecord {
    /// Keys whose value differs between the old and new tree.
    pub fn changed_keys(&self) -> Vec<StateKey> {
        let mut keys = Vec::new();
        for key in self.old_state.keys().chain(self.new_state.keys()) {
            if keys.iter().any(|seen| seen == key) {
                continue;
            }
            if self.old_state.get(key) != self.new_state.get(key) {
                keys.push(key.clone());
            }
        }
        keys
    }
}

/// Filters and logger applied while the debugger is enabled.
///
/// All filters use AND semantics; an absent filter always passes. The state
/// filter is evaluated per changed key and passes when any changed key
/// passes.
///
/// # Examples
///
/// ```
/// use storekit::debug::DebuggerConfig;
///
/// let config = DebuggerConfig::new()
///     .store_filter(|name| name == "auth")
///     .action_filter(|name| name != "set_loading");
/// ```
#[derive(Clone, Default)]
pub struct DebuggerConfig {
    store_filter: Option<NameFilter>,
    action_filter: Option<NameFilter>,
    state_filter: Option<NameFilter>,
    logger: Option<Logger>,
}

impl DebuggerConfig {
    /// An empty configuration: everything passes, records go to the
    /// default structured logger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only log mutations from stores whose id passes the filter.
    pub fn store_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.store_filter = Some(Arc::new(filter));
        self
    }

    /// Only log mutations whose action name passes the filter.
    pub fn action_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.action_filter = Some(Arc::new(filter));
        self
    }

    /// Only log mutations where some changed key passes the filter.
    pub fn state_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.state_filter = Some(Arc::new(filter));
        self
    }

    /// Replace the default logger.
    pub fn logger<F>(mut self, logger: F) -> Self
    where
        F: Fn(&MutationRecord) + Send + Sync + 'static,
    {
        self.logger = Some(Arc::new(logger));
        self
    }

    fn passes(&self, record: &MutationRecord) -> bool {
        if let Some(filter) = &self.store_filter {
            if !filter(&record.store_name) {
                return false;
            }
        }
        if let Some(filter) = &self.action_filter {
            if !filter(&record.action_name) {
                return false;
            }
        }
        if let Some(filter) = &self.state_filter {
            if !record.changed_keys().iter().any(|key| filter(key)) {
                return false;
            }
        }
        true
    }
}

/// A toggleable observer of store mutations.
///
/// While enabled, every mutation on every store reporting to this debugger
/// produces exactly one [`MutationRecord`], evaluated against the active
/// filters; records that pass are handed to the active logger,
/// synchronously, before the mutating call returns. Each
/// [`enable`](StoreDebugger::enable) replaces the whole configuration;
/// [`disable`](StoreDebugger::disable) detaches it entirely.
///
/// Stores report to [`StoreDebugger::global`] unless an isolated instance
/// is injected through `StoreOptions`, which keeps tests independent of
/// process-wide state.
#[derive(Default)]
pub struct StoreDebugger {
    config: RwLock<Option<DebuggerConfig>>,
}

impl StoreDebugger {
    /// Create a disabled, isolated debugger.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide debugger instance.
    pub fn global() -> Arc<StoreDebugger> {
        static GLOBAL: OnceLock<Arc<StoreDebugger>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(StoreDebugger::new())))
    }

    /// Start observing with the given configuration, replacing any active
    /// one.
    pub fn enable(&self, config: DebuggerConfig) {
        *self.config.write().unwrap() = Some(config);
    }

    /// Stop observing. No records are produced or logged afterwards, even
    /// for stores created while enabled.
    pub fn disable(&self) {
        *self.config.write().unwrap() = None;
    }

    /// Whether a configuration is active.
    pub fn is_enabled(&self) -> bool {
        self.config.read().unwrap().is_some()
    }

    /// Evaluate one record against the active configuration.
    pub(crate) fn observe(&self, record: &MutationRecord) {
        let config = self.config.read().unwrap().clone();
        let Some(config) = config else {
            return;
        };
        if !config.passes(record) {
            return;
        }
        match &config.logger {
            Some(logger) => logger(record),
            None => log_record(record),
        }
    }
}

/// Default structured logger.
fn log_record(record: &MutationRecord) {
    tracing::debug!(
        store = %record.store_name,
        action = %record.action_name,
        changed = ?record.changed_keys(),
        timestamp = record.timestamp,
        "state mutation"
    );
}

/// Enable the process-wide debugger.
pub fn enable_store_debugger(config: DebuggerConfig) {
    StoreDebugger::global().enable(config);
}

/// Disable the process-wide debugger.
pub fn disable_store_debugger() {
    StoreDebugger::global().disable();
}
