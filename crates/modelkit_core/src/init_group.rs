//! Named groups of run-once initializers.
//!
//! # Responsibility
//! - Register setup functions under unique names.
//! - Run each registered function at most once, on demand or in bulk.
//! - Choose the receiver an initializer sees (the group or its api object).
//!
//! # Invariants
//! - A name is registered at most once; the first registration wins.
//! - `has_run` flips `false -> true` exactly once per entry and never resets.
//! - An entry is marked as run before its initializer is called, so a nested
//!   `need` of the same name reports [`NeedOutcome::AlreadyRun`].
//! - Bulk runs follow registration order and never stop on a failure.
//! - Run metadata lives on the registration entry, not on the callable, so
//!   one callable can be shared by several groups.

use crate::naming::is_valid_name;
use crate::options::Options;
use indexmap::IndexMap;
use log::{debug, error, warn};
use serde_json::Value;
use std::cell::Cell;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::rc::{Rc, Weak};

/// Value or failure reported by one initializer invocation.
pub type InitResult = Result<Value, String>;

/// Shared initializer callable.
pub type Initializer<A> = Rc<dyn Fn(InitReceiver<'_, A>, &Options) -> InitResult>;

/// Receiver handed to an initializer when it runs.
pub enum InitReceiver<'a, A: ?Sized> {
    /// The group that owns the initializer; lets it `need` its siblings.
    Group(&'a InitGroup<A>),
    /// The api object attached to the group.
    Api(&'a A),
}

impl<A: ?Sized> InitReceiver<'_, A> {
    /// Returns whether the initializer was bound to the group's api object.
    pub fn is_api(&self) -> bool {
        matches!(self, Self::Api(_))
    }
}

/// Outcome of one `need` call for a registered initializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NeedOutcome {
    /// The initializer ran in this call and returned this value.
    Completed(Value),
    /// The initializer ran in this call and reported a failure.
    ///
    /// The entry is still marked as run.
    Failed(String),
    /// The initializer already ran earlier; nothing was invoked.
    AlreadyRun,
}

/// Registration record for one initializer.
pub struct InitEntry<A: ?Sized> {
    name: String,
    initializer: Initializer<A>,
    has_run: Cell<bool>,
    bind_to_api: bool,
}

impl<A: ?Sized> InitEntry<A> {
    /// Name the entry was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_run(&self) -> bool {
        self.has_run.get()
    }

    /// Whether the initializer asked for the group's api object as receiver.
    pub fn bind_to_api(&self) -> bool {
        self.bind_to_api
    }
}

impl<A: ?Sized> Debug for InitEntry<A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitEntry")
            .field("name", &self.name)
            .field("has_run", &self.has_run.get())
            .field("bind_to_api", &self.bind_to_api)
            .finish_non_exhaustive()
    }
}

/// Named collection of run-once initializers.
pub struct InitGroup<A: ?Sized> {
    name: String,
    api: Option<Weak<A>>,
    entries: IndexMap<String, InitEntry<A>>,
}

impl<A: ?Sized> InitGroup<A> {
    /// Creates an empty group without an api object.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api: None,
            entries: IndexMap::new(),
        }
    }

    /// Creates an empty group that can bind initializers to `api`.
    ///
    /// The group only keeps a weak reference; it never extends the lifetime
    /// of the api object.
    pub fn with_api(name: impl Into<String>, api: &Rc<A>) -> Self {
        let mut group = Self::new(name);
        group.set_api(api);
        group
    }

    /// Attaches (or replaces) the api object used by api-bound initializers.
    pub fn set_api(&mut self, api: &Rc<A>) {
        self.api = Some(Rc::downgrade(api));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the api object when one is attached and still alive.
    pub fn api(&self) -> Option<Rc<A>> {
        self.api.as_ref().and_then(Weak::upgrade)
    }

    /// Registers a closure under `name`.
    ///
    /// # Errors
    /// - [`InitGroupError::InvalidName`] when `name` is empty.
    /// - [`InitGroupError::DuplicateInitializer`] when `name` is taken; the
    ///   existing registration is left untouched.
    ///
    /// Both failures are also logged.
    pub fn add<F>(
        &mut self,
        name: &str,
        initializer: F,
        api_is_this: bool,
    ) -> Result<(), InitGroupError>
    where
        F: Fn(InitReceiver<'_, A>, &Options) -> InitResult + 'static,
    {
        self.add_shared(name, Rc::new(initializer), api_is_this)
    }

    /// Registers an already shared initializer under `name`.
    ///
    /// Same rules as [`InitGroup::add`].
    pub fn add_shared(
        &mut self,
        name: &str,
        initializer: Initializer<A>,
        api_is_this: bool,
    ) -> Result<(), InitGroupError> {
        if !is_valid_name(name) {
            error!(
                "event=init_add module=init_group status=error group={} reason=invalid_name name={:?}",
                self.name, name
            );
            return Err(InitGroupError::InvalidName(name.to_string()));
        }
        if self.entries.contains_key(name) {
            error!(
                "event=init_add module=init_group status=error group={} reason=duplicate name={}",
                self.name, name
            );
            return Err(InitGroupError::DuplicateInitializer {
                group: self.name.clone(),
                name: name.to_string(),
            });
        }

        self.entries.insert(
            name.to_string(),
            InitEntry {
                name: name.to_string(),
                initializer,
                has_run: Cell::new(false),
                bind_to_api: api_is_this,
            },
        );
        debug!(
            "event=init_add module=init_group status=ok group={} name={} bind_to_api={}",
            self.name, name, api_is_this
        );
        Ok(())
    }

    /// Ensures the initializer registered as `name` has run.
    ///
    /// Runs it at most once and hands back its return value. The receiver is
    /// the api object when the entry was registered with `api_is_this` and
    /// the api is attached and alive; otherwise it is the group itself.
    /// `conf` is passed through untouched.
    ///
    /// # Errors
    /// - [`InitGroupError::UnknownInitializer`] when nothing is registered
    ///   under `name` (also logged).
    pub fn need(&self, name: &str, conf: &Options) -> Result<NeedOutcome, InitGroupError> {
        let Some(entry) = self.entries.get(name) else {
            error!(
                "event=init_need module=init_group status=error group={} reason=unknown name={:?}",
                self.name, name
            );
            return Err(InitGroupError::UnknownInitializer {
                group: self.name.clone(),
                name: name.to_string(),
            });
        };
        if entry.has_run.replace(true) {
            return Ok(NeedOutcome::AlreadyRun);
        }

        let api = if entry.bind_to_api { self.api() } else { None };
        let result = match api.as_deref() {
            Some(api) => (entry.initializer)(InitReceiver::Api(api), conf),
            None => (entry.initializer)(InitReceiver::Group(self), conf),
        };

        match result {
            Ok(value) => {
                debug!(
                    "event=init_need module=init_group status=ok group={} name={} receiver={}",
                    self.name,
                    name,
                    if api.is_some() { "api" } else { "group" }
                );
                Ok(NeedOutcome::Completed(value))
            }
            Err(reason) => {
                warn!(
                    "event=init_need module=init_group status=error group={} name={} reason={:?}",
                    self.name, name, reason
                );
                Ok(NeedOutcome::Failed(reason))
            }
        }
    }

    /// Runs every registered initializer once, in registration order.
    ///
    /// Failures are logged by [`InitGroup::need`] and do not stop the sweep.
    pub fn run(&self, conf: &Options) {
        for name in self.entries.keys() {
            let _ = self.need(name, conf);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn entry(&self, name: &str) -> Option<&InitEntry<A>> {
        self.entries.get(name)
    }

    /// Returns `None` for unknown names.
    pub fn has_run(&self, name: &str) -> Option<bool> {
        self.entries.get(name).map(InitEntry::has_run)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Names that have not run yet, in registration order.
    pub fn pending(&self) -> Vec<&str> {
        self.entries
            .values()
            .filter(|entry| !entry.has_run())
            .map(InitEntry::name)
            .collect()
    }
}

impl<A: ?Sized> Debug for InitGroup<A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitGroup")
            .field("name", &self.name)
            .field("has_api", &self.api().is_some())
            .field("entries", &self.entries.values().collect::<Vec<_>>())
            .finish()
    }
}

/// Initializer registration and lookup errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitGroupError {
    InvalidName(String),
    DuplicateInitializer { group: String, name: String },
    UnknownInitializer { group: String, name: String },
}

impl Display for InitGroupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(value) => write!(f, "initializer name is invalid: {value:?}"),
            Self::DuplicateInitializer { group, name } => {
                write!(f, "initializer `{name}` already registered in group `{group}`")
            }
            Self::UnknownInitializer { group, name } => {
                write!(f, "initializer `{name}` is not registered in group `{group}`")
            }
        }
    }
}

impl Error for InitGroupError {}
