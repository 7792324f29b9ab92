//! Host-side lifecycle driver.
//!
//! # Responsibility
//! - Keep the attached extensions and init groups of one host.
//! - Run the phases in order: pre-init sweep, init groups, post-init sweep.
//!
//! # Invariants
//! - Every registered extension is bound to the driven host.
//! - Group names are unique within one lifecycle.
//! - `initialize` succeeds at most once.
//! - Extensions and groups can only be added before `initialize` starts.

use crate::extension::LifecycleHooks;
use crate::host::{Host, HostId};
use crate::init_group::InitGroup;
use crate::options::Options;
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::{Rc, Weak};

/// Lifecycle progress of one host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Extensions may still be attached and groups populated.
    Constructed,
    PreInit,
    RunningGroups,
    PostInit,
    /// Every phase completed.
    Ready,
}

/// Drives construct -> pre-init -> init groups -> post-init for one host.
pub struct Lifecycle<H> {
    host: Weak<H>,
    host_id: HostId,
    extensions: Vec<Rc<dyn LifecycleHooks<H>>>,
    groups: Vec<InitGroup<H>>,
    phase: LifecyclePhase,
}

impl<H: Host> Lifecycle<H> {
    pub fn new(host: &Rc<H>) -> Self {
        Self {
            host: Rc::downgrade(host),
            host_id: host.host_id(),
            extensions: Vec::new(),
            groups: Vec::new(),
            phase: LifecyclePhase::Constructed,
        }
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    pub fn host_id(&self) -> HostId {
        self.host_id
    }

    /// Registers an attached extension for the pre/post-init sweeps.
    ///
    /// # Errors
    /// - [`LifecycleError::Sealed`] once `initialize` has started.
    /// - [`LifecycleError::ForeignExtension`] when the extension is bound to
    ///   another host.
    pub fn register_extension(
        &mut self,
        extension: Rc<dyn LifecycleHooks<H>>,
    ) -> Result<(), LifecycleError> {
        self.ensure_open("extension", extension.extension_name())?;
        if extension.bound_host() != self.host_id {
            return Err(LifecycleError::ForeignExtension(
                extension.extension_name().to_string(),
            ));
        }
        self.extensions.push(extension);
        Ok(())
    }

    /// Creates a group whose api object is the driven host.
    ///
    /// # Errors
    /// - [`LifecycleError::Sealed`] once `initialize` has started.
    /// - [`LifecycleError::DuplicateGroup`] when the name is already used.
    /// - [`LifecycleError::HostDropped`] when the host no longer exists.
    pub fn new_group(&mut self, name: &str) -> Result<&mut InitGroup<H>, LifecycleError> {
        self.ensure_open("group", name)?;
        let host = self.host.upgrade().ok_or(LifecycleError::HostDropped)?;
        self.add_group(InitGroup::with_api(name, &host))
    }

    /// Adds a prepared group; it runs after previously added groups.
    ///
    /// Fails like [`Self::new_group`].
    pub fn add_group(&mut self, group: InitGroup<H>) -> Result<&mut InitGroup<H>, LifecycleError> {
        self.ensure_open("group", group.name())?;
        if self.group(group.name()).is_some() {
            return Err(LifecycleError::DuplicateGroup(group.name().to_string()));
        }
        self.groups.push(group);
        let index = self.groups.len() - 1;
        Ok(&mut self.groups[index])
    }

    fn ensure_open(&self, kind: &str, name: &str) -> Result<(), LifecycleError> {
        if self.phase == LifecyclePhase::Constructed {
            return Ok(());
        }
        error!(
            "event=lifecycle_register module=lifecycle status=error host={} reason=sealed kind={} name={:?} phase={:?}",
            self.host_id, kind, name, self.phase
        );
        Err(LifecycleError::Sealed(name.to_string()))
    }

    pub fn group(&self, name: &str) -> Option<&InitGroup<H>> {
        self.groups.iter().find(|group| group.name() == name)
    }

    pub fn group_mut(&mut self, name: &str) -> Option<&mut InitGroup<H>> {
        self.groups.iter_mut().find(|group| group.name() == name)
    }

    /// Group names in run order.
    pub fn group_names(&self) -> Vec<&str> {
        self.groups.iter().map(InitGroup::name).collect()
    }

    pub fn extension_count(&self) -> usize {
        self.extensions.len()
    }

    /// Runs every phase with `config`.
    ///
    /// # Errors
    /// - [`LifecycleError::AlreadyInitialized`] on any call after the first.
    /// - [`LifecycleError::HostDropped`] when the host no longer exists.
    pub fn initialize(&mut self, config: &Options) -> Result<(), LifecycleError> {
        if self.phase != LifecyclePhase::Constructed {
            error!(
                "event=lifecycle_init module=lifecycle status=error host={} reason=already_initialized",
                self.host_id
            );
            return Err(LifecycleError::AlreadyInitialized);
        }
        let host = self.host.upgrade().ok_or(LifecycleError::HostDropped)?;

        self.phase = LifecyclePhase::PreInit;
        for extension in &self.extensions {
            extension.pre_init(&host, config);
        }

        self.phase = LifecyclePhase::RunningGroups;
        for group in &self.groups {
            group.run(config);
        }

        self.phase = LifecyclePhase::PostInit;
        for extension in &self.extensions {
            extension.post_init(&host, config);
        }

        self.phase = LifecyclePhase::Ready;
        info!(
            "event=lifecycle_init module=lifecycle status=ok host={} extensions={} groups={}",
            self.host_id,
            self.extensions.len(),
            self.groups.len()
        );
        Ok(())
    }
}

/// Lifecycle driver errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    AlreadyInitialized,
    /// Registration attempted after `initialize` started.
    Sealed(String),
    DuplicateGroup(String),
    ForeignExtension(String),
    HostDropped,
}

impl Display for LifecycleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyInitialized => write!(f, "lifecycle already initialized"),
            Self::Sealed(name) => {
                write!(f, "cannot register `{name}`: lifecycle already initialized")
            }
            Self::DuplicateGroup(name) => write!(f, "init group already registered: {name}"),
            Self::ForeignExtension(name) => {
                write!(f, "extension `{name}` is attached to a different host")
            }
            Self::HostDropped => write!(f, "host no longer exists"),
        }
    }
}

impl Error for LifecycleError {}
