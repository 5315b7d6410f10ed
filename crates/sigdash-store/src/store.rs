//! File-backed client state store.

use crate::error::{PersistenceError, PersistenceResult};
use crate::state::{invalid, AlertCondition, ClientState, Preferences, PriceAlert};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use sigdash_core::{normalize_symbol, parse_symbol};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

const MAX_GROUP_NAME: usize = 64;

/// Client state shared by the dashboard and the CLI.
///
/// Reads are served from memory. Every mutation is applied to a copy,
/// written to disk, and only then published, so memory never runs ahead
/// of the file. Mutations are serialized on `write_lock`; the state lock
/// is never held across file IO, so readers do not wait on the disk.
pub struct StateStore {
    path: PathBuf,
    state: RwLock<ClientState>,
    write_lock: Mutex<()>,
}

impl StateStore {
    /// Load state from `path`. A missing file yields defaults (and creates
    /// the parent directory); a file that does not parse is an error.
    pub fn open(path: impl Into<PathBuf>) -> PersistenceResult<Self> {
        let path = path.into();

        let state = match fs::read_to_string(&path) {
            Ok(raw) => {
                let state: ClientState = serde_json::from_str(&raw)?;
                info!(
                    path = %path.display(),
                    watchlists = state.watchlists.len(),
                    alerts = state.alerts.len(),
                    "Loaded client state"
                );
                state
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)?;
                }
                info!(path = %path.display(), "No client state file, using defaults");
                ClientState::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> ClientState {
        self.state.read().clone()
    }

    pub fn preferences(&self) -> Preferences {
        self.state.read().preferences.clone()
    }

    /// Edit preferences in place; rejected edits leave state untouched.
    pub fn update_preferences(
        &self,
        f: impl FnOnce(&mut Preferences),
    ) -> PersistenceResult<Preferences> {
        self.mutate(|state| {
            f(&mut state.preferences);
            state.preferences.default_symbol = normalize_symbol(&state.preferences.default_symbol);
            state.preferences.validate()?;
            Ok(state.preferences.clone())
        })
    }

    pub fn watchlists(&self) -> BTreeMap<String, Vec<String>> {
        self.state.read().watchlists.clone()
    }

    /// Add `symbol` to `group`, creating the group if needed.
    /// Returns false when the symbol was already there.
    pub fn add_to_watchlist(&self, group: &str, symbol: &str) -> PersistenceResult<bool> {
        let group = group_name(group)?;
        let symbol = symbol_name(symbol)?;
        self.mutate(|state| {
            let symbols = state.watchlists.entry(group.clone()).or_default();
            if symbols.contains(&symbol) {
                return Ok(false);
            }
            symbols.push(symbol.clone());
            debug!(%group, %symbol, "Added to watchlist");
            Ok(true)
        })
    }

    /// Remove `symbol` from `group`. The group is kept even when it
    /// becomes empty.
    pub fn remove_from_watchlist(&self, group: &str, symbol: &str) -> PersistenceResult<bool> {
        let symbol = normalize_symbol(symbol);
        let group = group.trim().to_string();
        if !self.watchlist_contains(&group, &symbol) {
            return Ok(false);
        }
        self.mutate(|state| {
            let removed = state.watchlists.get_mut(&group).is_some_and(|symbols| {
                let before = symbols.len();
                symbols.retain(|s| *s != symbol);
                symbols.len() != before
            });
            Ok(removed)
        })
    }

    pub fn delete_watchlist(&self, group: &str) -> PersistenceResult<bool> {
        let group = group.trim().to_string();
        if !self.state.read().watchlists.contains_key(&group) {
            return Ok(false);
        }
        self.mutate(|state| Ok(state.watchlists.remove(&group).is_some()))
    }

    /// Every symbol in any group, deduplicated and sorted.
    pub fn watched_symbols(&self) -> Vec<String> {
        let state = self.state.read();
        state
            .watchlists
            .values()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn alerts(&self) -> Vec<PriceAlert> {
        self.state.read().alerts.clone()
    }

    pub fn enabled_alerts(&self) -> Vec<PriceAlert> {
        self.state
            .read()
            .alerts
            .iter()
            .filter(|a| a.enabled)
            .cloned()
            .collect()
    }

    pub fn create_alert(
        &self,
        symbol: &str,
        condition: AlertCondition,
        threshold: f64,
    ) -> PersistenceResult<PriceAlert> {
        let symbol = symbol_name(symbol)?;
        condition.validate_threshold(threshold)?;

        let alert = PriceAlert {
            id: Uuid::new_v4(),
            symbol,
            condition,
            threshold,
            enabled: true,
            created_at_ms: Utc::now().timestamp_millis(),
        };

        self.mutate(|state| {
            state.alerts.push(alert.clone());
            Ok(())
        })?;
        info!(id = %alert.id, symbol = %alert.symbol, condition = %alert.condition, threshold, "Alert created");
        Ok(alert)
    }

    /// Flip an alert's `enabled` flag; returns the new value, or `None`
    /// when no alert has this id.
    pub fn toggle_alert(&self, id: Uuid) -> PersistenceResult<Option<bool>> {
        if !self.state.read().alerts.iter().any(|a| a.id == id) {
            return Ok(None);
        }
        self.mutate(|state| {
            Ok(state.alerts.iter_mut().find(|a| a.id == id).map(|alert| {
                alert.enabled = !alert.enabled;
                alert.enabled
            }))
        })
    }

    pub fn delete_alert(&self, id: Uuid) -> PersistenceResult<bool> {
        if !self.state.read().alerts.iter().any(|a| a.id == id) {
            return Ok(false);
        }
        self.mutate(|state| {
            let before = state.alerts.len();
            state.alerts.retain(|a| a.id != id);
            Ok(state.alerts.len() != before)
        })
    }

    fn watchlist_contains(&self, group: &str, symbol: &str) -> bool {
        self.state
            .read()
            .watchlists
            .get(group)
            .is_some_and(|symbols| symbols.iter().any(|s| s == symbol))
    }

    /// Apply `f` to a copy, persist it, then publish it.
    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut ClientState) -> PersistenceResult<R>,
    ) -> PersistenceResult<R> {
        let _writer = self.write_lock.lock();
        // Only holders of `write_lock` replace the state, so this copy stays
        // current until we publish
        let mut next = self.state.read().clone();
        let result = f(&mut next)?;
        if next != *self.state.read() {
            save(&self.path, &next)?;
            *self.state.write() = next;
        }
        Ok(result)
    }
}

/// Write-then-rename so a crash never leaves a truncated file.
fn save(path: &Path, state: &ClientState) -> PersistenceResult<()> {
    let json = serde_json::to_string_pretty(state)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, json)?;
    if let Err(e) = fs::rename(&tmp, path) {
        warn!(error = %e, path = %path.display(), "Failed to replace client state file");
        let _ = fs::remove_file(&tmp);
        return Err(PersistenceError::Io(e));
    }
    debug!(path = %path.display(), "Client state saved");
    Ok(())
}

fn group_name(group: &str) -> PersistenceResult<String> {
    let group = group.trim();
    if group.is_empty() || group.len() > MAX_GROUP_NAME || group.contains('/') {
        return Err(invalid(&format!("invalid watchlist name: {group:?}")));
    }
    Ok(group.to_string())
}

fn symbol_name(symbol: &str) -> PersistenceResult<String> {
    parse_symbol(symbol).map_err(|e| invalid(&e.to_string()))
}
