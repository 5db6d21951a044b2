//! # Query registry: process-wide attribute directory.
//!
//! Maps a globally unique attribute name to the capability that owns it, and each
//! capability to its descriptors in registration order.
//!
//! ## Architecture
//! ```text
//! execute("CCON=1") ──► QueryLine::parse ──► dispatch(name, mode, value)
//!                                               │
//!                        names: "CCON" ──► owner slot ──► Weak<dyn Querible>
//!                                               │            (upgrade, lock released)
//!                                               ▼
//!                                   owner.query("CCON", Write("1"))
//!                                               │
//!                                   QueryTable checks access, runs handler
//! ```
//!
//! ## Rules
//! - Names are unique across the whole process; the uniqueness check and the insert
//!   happen in one critical section.
//! - The registry holds weak references only: a capability that is gone answers
//!   `NotFound` and its names are reclaimed.
//! - Direction checks belong to the capability; the registry forwards every mode.
//! - The owner is called outside the registry lock, so handlers may use the registry.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, warn};

use super::descriptor::{QueryDescriptor, QueryMode, QueryRequest, QueryTable, Querible};
use super::protocol::{QueryLine, QueryResponse};
use crate::error::QueryError;
use crate::sync::lock;

/// Identity of a capability: address of its data.
type OwnerKey = usize;

fn key_of(owner: &Arc<dyn Querible>) -> OwnerKey {
    Arc::as_ptr(owner) as *const () as usize
}

struct OwnerSlot {
    key: OwnerKey,
    label: String,
    owner: Weak<dyn Querible>,
    descriptors: Vec<QueryDescriptor>,
}

#[derive(Default)]
struct State {
    /// Name → owner key.
    names: HashMap<String, OwnerKey>,
    /// Owners in first-registration order.
    owners: Vec<OwnerSlot>,
}

impl State {
    fn slot_mut(&mut self, key: OwnerKey) -> Option<&mut OwnerSlot> {
        self.owners.iter_mut().find(|s| s.key == key)
    }

    fn remove_name(&mut self, name: &str) -> Option<QueryDescriptor> {
        let key = self.names.remove(name)?;
        let slot = self.slot_mut(key)?;
        let pos = slot.descriptors.iter().position(|d| d.name == name)?;
        let descriptor = slot.descriptors.remove(pos);
        self.owners.retain(|s| !s.descriptors.is_empty());
        Some(descriptor)
    }

    fn remove_owner(&mut self, key: OwnerKey) -> usize {
        let Some(pos) = self.owners.iter().position(|s| s.key == key) else {
            return 0;
        };
        let slot = self.owners.remove(pos);
        for d in &slot.descriptors {
            self.names.remove(&d.name);
        }
        slot.descriptors.len()
    }
}

/// Process-wide attribute directory, passed around through the context.
#[derive(Default)]
pub struct QueryRegistry {
    state: Mutex<State>,
}

impl QueryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `descriptor.name` for `owner`.
    ///
    /// ### Errors
    /// - [`QueryError::MissingOwner`] if `owner` is `None`.
    /// - [`QueryError::Duplicate`] if the name is claimed anywhere in the process.
    /// - [`QueryError::OutOfMemory`] if the name table cannot grow.
    pub fn register(
        &self,
        owner: Option<&Arc<dyn Querible>>,
        descriptor: QueryDescriptor,
    ) -> Result<(), QueryError> {
        let Some(owner) = owner else {
            return Err(QueryError::MissingOwner {
                name: descriptor.name,
            });
        };
        let key = key_of(owner);

        let mut state = lock(&self.state);
        self.reclaim_dead(&mut state);
        if state.names.contains_key(&descriptor.name) {
            return Err(QueryError::Duplicate {
                name: descriptor.name,
            });
        }

        state
            .names
            .try_reserve(1)
            .map_err(|_| QueryError::OutOfMemory)?;
        state.names.insert(descriptor.name.clone(), key);
        let name = descriptor.name.clone();
        match state.slot_mut(key) {
            Some(slot) => slot.descriptors.push(descriptor),
            None => state.owners.push(OwnerSlot {
                key,
                label: owner.owner().to_string(),
                owner: Arc::downgrade(owner),
                descriptors: vec![descriptor],
            }),
        }
        drop(state);

        debug!(query = %name, owner = owner.owner(), "query registered");
        Ok(())
    }

    /// Registers every descriptor of `table` for `owner`, in table order.
    ///
    /// On the first failure the names registered by this call are released again and
    /// the error is returned.
    pub fn register_table<T: Querible>(
        &self,
        owner: &Arc<T>,
        table: &QueryTable<T>,
    ) -> Result<(), QueryError> {
        let owner: Arc<dyn Querible> = owner.clone();
        let mut done: Vec<&str> = Vec::with_capacity(table.len());

        for descriptor in table.descriptors() {
            if let Err(e) = self.register(Some(&owner), descriptor.clone()) {
                for name in done {
                    let _ = self.unregister(name, true);
                }
                warn!(owner = owner.owner(), error = %e, "query table registration rolled back");
                return Err(e);
            }
            done.push(&descriptor.name);
        }
        Ok(())
    }

    /// Releases `name`.
    ///
    /// With `release = true` the registry drops the descriptor and returns `None`;
    /// otherwise the descriptor is handed back to the caller.
    ///
    /// ### Errors
    /// [`QueryError::NotFound`] if the name is not claimed.
    pub fn unregister(
        &self,
        name: &str,
        release: bool,
    ) -> Result<Option<QueryDescriptor>, QueryError> {
        let removed = lock(&self.state).remove_name(name);
        match removed {
            Some(descriptor) => {
                debug!(query = %name, "query unregistered");
                Ok(if release { None } else { Some(descriptor) })
            }
            None => Err(QueryError::NotFound {
                name: name.to_string(),
            }),
        }
    }

    /// Releases every name owned by `owner`. Returns how many were released.
    pub fn unregister_owner(&self, owner: &Arc<dyn Querible>) -> usize {
        let n = lock(&self.state).remove_owner(key_of(owner));
        if n > 0 {
            debug!(owner = owner.owner(), count = n, "owner queries unregistered");
        }
        n
    }

    /// Resolves the owner of `name` and forwards the request to it.
    ///
    /// ### Errors
    /// - [`QueryError::NotFound`] if the name is unclaimed or its owner is gone.
    /// - Whatever the owner returns, e.g. [`QueryError::ModeNotSupported`].
    pub fn dispatch(
        &self,
        name: &str,
        mode: QueryMode,
        value: Option<&str>,
    ) -> Result<String, QueryError> {
        let owner = {
            let mut state = lock(&self.state);
            let key = state.names.get(name).copied();
            let weak = key
                .and_then(|k| state.owners.iter().find(|s| s.key == k))
                .map(|s| s.owner.clone());
            match weak.and_then(|w| w.upgrade()) {
                Some(owner) => owner,
                None => {
                    if let Some(k) = key {
                        state.remove_owner(k);
                    }
                    return Err(QueryError::NotFound {
                        name: name.to_string(),
                    });
                }
            }
        };
        owner.query(name, QueryRequest::from_mode(mode, value))
    }

    /// Parses one protocol line and serves it.
    pub fn execute(&self, line: &str, radix: &str) -> QueryResponse {
        match QueryLine::parse(line, radix) {
            Ok(parsed) => {
                let outcome = self.dispatch(&parsed.name, parsed.mode, parsed.value.as_deref());
                if let Err(e) = &outcome {
                    debug!(query = %parsed.name, error = e.as_label(), "query failed");
                }
                QueryResponse {
                    name: parsed.name,
                    mode: Some(parsed.mode),
                    outcome,
                }
            }
            Err(e) => QueryResponse {
                name: line.trim().to_string(),
                mode: None,
                outcome: Err(e),
            },
        }
    }

    /// Copy of the descriptor registered under `name`.
    pub fn descriptor(&self, name: &str) -> Option<QueryDescriptor> {
        let state = lock(&self.state);
        let key = *state.names.get(name)?;
        state
            .owners
            .iter()
            .find(|s| s.key == key)?
            .descriptors
            .iter()
            .find(|d| d.name == name)
            .cloned()
    }

    /// Number of claimed names.
    pub fn len(&self) -> usize {
        lock(&self.state).names.len()
    }

    /// Returns `true` if no name is claimed.
    pub fn is_empty(&self) -> bool {
        lock(&self.state).names.is_empty()
    }

    /// Deterministic listing, grouped by owner in registration order.
    ///
    /// ```text
    /// <radix><name:<10> <R|-><W|-> <description:<40>
    ///     <supported values>            (writable attributes only)
    /// Total: <n>
    /// ```
    /// Every line ends with CRLF.
    pub fn list(&self, owner: Option<&Arc<dyn Querible>>, radix: &str) -> String {
        let wanted = owner.map(key_of);
        let state = lock(&self.state);

        let mut out = String::new();
        let mut total = 0usize;
        for slot in state
            .owners
            .iter()
            .filter(|s| wanted.is_none_or(|k| k == s.key) && s.owner.strong_count() > 0)
        {
            for d in &slot.descriptors {
                let _ = write!(
                    out,
                    "{radix}{:<10} {} {:<40}\r\n",
                    d.name,
                    d.access.flags(),
                    d.description
                );
                if d.access.can_write() {
                    let _ = write!(out, "    {}\r\n", d.values_help);
                }
                total += 1;
            }
        }
        let _ = write!(out, "Total: {total}\r\n");
        out
    }

    /// Owner labels in registration order (diagnostics).
    pub fn owners(&self) -> Vec<String> {
        lock(&self.state)
            .owners
            .iter()
            .map(|s| s.label.clone())
            .collect()
    }

    fn reclaim_dead(&self, state: &mut State) {
        let dead: Vec<OwnerKey> = state
            .owners
            .iter()
            .filter(|s| s.owner.strong_count() == 0)
            .map(|s| s.key)
            .collect();
        for key in dead {
            state.remove_owner(key);
        }
    }
}
