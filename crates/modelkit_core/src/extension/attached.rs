//! Extension attachment and forwarding-method installation.

use crate::extension::forward::{ForwardTarget, Forwarder, InvokeError, ReceiverKind};
use crate::extension::spec::{HandledMethodOptions, HandledMethods};
use crate::extension::{Extension, Receiver};
use crate::host::{Host, HostId};
use crate::naming::is_valid_name;
use crate::options::Options;
use log::{debug, error, info};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::rc::{Rc, Weak};

/// An extension bound to its host.
///
/// Holds only a weak reference to the host; the host owns the forwarders
/// that point back here.
pub struct AttachedExtension<H, E> {
    parent: Weak<H>,
    parent_id: HostId,
    extension: E,
}

impl<H: Host, E: Extension<H>> AttachedExtension<H, E> {
    /// Binds `extension` to `parent`.
    ///
    /// Runs [`Extension::setup`] and installs the forwarding methods declared
    /// by [`Extension::handled_methods`] before returning.
    ///
    /// # Errors
    /// - [`ExtensionError::InvalidParent`] when the host has a nil identity.
    /// - [`ExtensionError::MissingCapability`] when the host lacks one of the
    ///   extension's required capabilities.
    ///
    /// Neither failure runs `setup` or touches the host.
    /// Installing declared methods may fail as [`Self::add_handled_method`] does;
    /// the host's method table is then restored to its state before the call.
    pub fn attach(parent: &Rc<H>, mut extension: E) -> Result<Rc<Self>, ExtensionError> {
        let parent_id = parent.host_id();
        if parent_id.is_nil() {
            error!(
                "event=extension_attach module=extension status=error extension={} reason=invalid_parent",
                extension.name()
            );
            return Err(ExtensionError::InvalidParent {
                extension: extension.name().to_string(),
            });
        }
        let provided = parent.capabilities();
        if let Some(missing) = extension
            .required_capabilities()
            .iter()
            .find(|capability| !provided.contains(*capability))
        {
            error!(
                "event=extension_attach module=extension status=error extension={} reason=missing_capability capability={}",
                extension.name(),
                missing
            );
            return Err(ExtensionError::MissingCapability {
                extension: extension.name().to_string(),
                capability: missing.to_string(),
            });
        }

        extension.setup(parent);

        let handle = Rc::new(Self {
            parent: Rc::downgrade(parent),
            parent_id,
            extension,
        });
        let declared = handle.extension.handled_methods().into_entries();
        let mut installed = Vec::with_capacity(declared.len());
        for (src, options) in declared {
            match handle.install_forwarder(&src, options) {
                Ok(change) => installed.push(change),
                Err(err) => {
                    let restored = installed.len();
                    handle.roll_back(parent, installed);
                    error!(
                        "event=extension_attach module=extension status=error extension={} reason=declared_method src={} restored={}",
                        handle.extension.name(),
                        src,
                        restored
                    );
                    return Err(err);
                }
            }
        }
        info!(
            "event=extension_attach module=extension status=ok extension={} host={} methods={}",
            handle.extension.name(),
            parent_id,
            installed.len()
        );
        Ok(handle)
    }

    /// Undoes `installed` in reverse order, putting back replaced forwarders.
    fn roll_back(&self, parent: &H, installed: Vec<(String, Option<Forwarder<H>>)>) {
        let table = parent.method_table();
        for (dest, replaced) in installed.into_iter().rev() {
            match replaced {
                Some(previous) => {
                    table.install(&dest, previous);
                }
                None => {
                    table.remove(&dest);
                }
            }
        }
    }

    /// The wrapped extension.
    pub fn extension(&self) -> &E {
        &self.extension
    }

    pub fn parent_id(&self) -> HostId {
        self.parent_id
    }

    /// The host, if it is still alive.
    pub fn parent(&self) -> Option<Rc<H>> {
        self.parent.upgrade()
    }

    /// Installs a forwarder on the host for the extension method `src`.
    ///
    /// The forwarder is installed as `options.dest_name` (default `src`) and
    /// calls `src` with the host as receiver when `options.model_is_this`,
    /// otherwise with this extension.
    ///
    /// # Errors
    /// - [`ExtensionError::MissingMethod`] when the extension has no `src`.
    /// - [`ExtensionError::InvalidMethodName`] when the destination name is empty.
    /// - [`ExtensionError::ParentDropped`] when the host no longer exists.
    /// - [`ExtensionError::DestinationExists`] when the host already has the
    ///   destination and `options.can_replace` is unset; the host is unchanged.
    pub fn add_handled_method(
        self: &Rc<Self>,
        src: &str,
        options: HandledMethodOptions,
    ) -> Result<(), ExtensionError> {
        self.install_forwarder(src, options).map(|_| ())
    }

    /// Installs one forwarder and returns its destination together with the
    /// forwarder it replaced.
    fn install_forwarder(
        self: &Rc<Self>,
        src: &str,
        options: HandledMethodOptions,
    ) -> Result<(String, Option<Forwarder<H>>), ExtensionError> {
        if self.extension.handled_method(src).is_none() {
            return Err(ExtensionError::MissingMethod {
                extension: self.extension.name().to_string(),
                method: src.to_string(),
            });
        }

        let dest = options.dest_name.as_deref().unwrap_or(src);
        if !is_valid_name(dest) {
            return Err(ExtensionError::InvalidMethodName(dest.to_string()));
        }
        let parent = self.parent().ok_or_else(|| ExtensionError::ParentDropped {
            extension: self.extension.name().to_string(),
        })?;
        if parent.has_method(dest) && !options.can_replace {
            return Err(ExtensionError::DestinationExists {
                extension: self.extension.name().to_string(),
                dest: dest.to_string(),
            });
        }

        let receiver = if options.model_is_this {
            ReceiverKind::Parent
        } else {
            ReceiverKind::Extension
        };
        let target = Rc::clone(self) as Rc<dyn ForwardTarget<H>>;
        let replaced = parent
            .method_table()
            .install(dest, Forwarder::new(target, src, receiver));
        debug!(
            "event=method_install module=extension status=ok extension={} src={} dest={} receiver={:?} replaced={}",
            self.extension.name(),
            src,
            dest,
            receiver,
            replaced.is_some()
        );
        Ok((dest.to_string(), replaced))
    }

    /// Installs every forwarder in `methods`, in declaration order.
    ///
    /// Stops at the first failure; forwarders installed before it stay.
    /// Returns the number installed.
    pub fn add_handled_methods(
        self: &Rc<Self>,
        methods: HandledMethods,
    ) -> Result<usize, ExtensionError> {
        let entries = methods.into_entries();
        let count = entries.len();
        for (src, options) in entries {
            self.add_handled_method(&src, options)?;
        }
        Ok(count)
    }

    /// Installs forwarders from a JSON declaration.
    ///
    /// A declaration that is neither a list of names nor a map of specs is
    /// logged and nothing is installed.
    pub fn add_handled_methods_from_value(
        self: &Rc<Self>,
        methods: &Value,
    ) -> Result<usize, ExtensionError> {
        match HandledMethods::from_value(methods) {
            Ok(methods) => self.add_handled_methods(methods),
            Err(reason) => {
                error!(
                    "event=method_install module=extension status=error extension={} reason=malformed_spec details={:?}",
                    self.extension.name(),
                    reason
                );
                Err(ExtensionError::BulkSpec(reason))
            }
        }
    }
}

impl<H: Host, E: Extension<H>> ForwardTarget<H> for AttachedExtension<H, E> {
    fn extension_name(&self) -> &str {
        self.extension.name()
    }

    fn bound_host(&self) -> HostId {
        self.parent_id
    }

    fn call_method(
        &self,
        method: &str,
        receiver: ReceiverKind,
        host: &H,
        args: &[Value],
    ) -> Result<Value, InvokeError> {
        let Some(handled) = self.extension.handled_method(method) else {
            return Err(InvokeError::MissingSource {
                extension: self.extension.name().to_string(),
                method: method.to_string(),
            });
        };
        let receiver = match receiver {
            ReceiverKind::Extension => Receiver::Extension {
                extension: &self.extension,
                parent: host,
            },
            ReceiverKind::Parent => Receiver::Parent(host),
        };
        handled(receiver, args).map_err(|source| InvokeError::Method {
            method: method.to_string(),
            source,
        })
    }
}

impl<H, E: Debug> Debug for AttachedExtension<H, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachedExtension")
            .field("parent_id", &self.parent_id)
            .field("parent_alive", &(self.parent.strong_count() > 0))
            .field("extension", &self.extension)
            .finish()
    }
}

/// Object-safe view of an attached extension's lifecycle hooks.
pub trait LifecycleHooks<H> {
    fn extension_name(&self) -> &str;

    fn bound_host(&self) -> HostId;

    fn pre_init(&self, host: &H, config: &Options);

    fn post_init(&self, host: &H, config: &Options);
}

impl<H: Host, E: Extension<H>> LifecycleHooks<H> for AttachedExtension<H, E> {
    fn extension_name(&self) -> &str {
        self.extension.name()
    }

    fn bound_host(&self) -> HostId {
        self.parent_id
    }

    fn pre_init(&self, host: &H, config: &Options) {
        self.extension.pre_init(host, config);
    }

    fn post_init(&self, host: &H, config: &Options) {
        self.extension.post_init(host, config);
    }
}

/// Attachment and forwarding-installation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionError {
    InvalidParent { extension: String },
    MissingCapability { extension: String, capability: String },
    MissingMethod { extension: String, method: String },
    InvalidMethodName(String),
    DestinationExists { extension: String, dest: String },
    ParentDropped { extension: String },
    BulkSpec(String),
}

impl Display for ExtensionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidParent { extension } => {
                write!(f, "extension `{extension}` requires a constructed host as parent")
            }
            Self::MissingCapability {
                extension,
                capability,
            } => write!(
                f,
                "extension `{extension}` requires host capability `{capability}`"
            ),
            Self::MissingMethod { extension, method } => {
                write!(f, "extension `{extension}` has no method `{method}`")
            }
            Self::InvalidMethodName(value) => write!(f, "method name is invalid: {value:?}"),
            Self::DestinationExists { extension, dest } => write!(
                f,
                "extension `{extension}` cannot install `{dest}`: already defined on host"
            ),
            Self::ParentDropped { extension } => {
                write!(f, "host of extension `{extension}` no longer exists")
            }
            Self::BulkSpec(details) => write!(f, "malformed handled-method declaration: {details}"),
        }
    }
}

impl Error for ExtensionError {}

#[cfg(test)]
mod tests {
    use super::{AttachedExtension, ExtensionError};
    use crate::extension::{
        Extension, HandledMethod, HandledMethodOptions, HandledMethods, InvokeError, MethodError,
        MethodResult, MethodSpec, Receiver,
    };
    use crate::host::{Host, HostId, MethodTable};
    use serde_json::{json, Value};
    use std::rc::Rc;

    struct Node {
        id: HostId,
        methods: MethodTable<Self>,
    }

    impl Node {
        fn new() -> Rc<Self> {
            Rc::new(Self {
                id: HostId::new(),
                methods: MethodTable::new(),
            })
        }
    }

    impl Host for Node {
        fn host_id(&self) -> HostId {
            self.id
        }

        fn method_table(&self) -> &MethodTable<Self> {
            &self.methods
        }
    }

    struct Pinger;

    impl Extension<Node> for Pinger {
        fn name(&self) -> &str {
            "pinger"
        }

        fn handled_method(&self, name: &str) -> Option<HandledMethod<Node, Self>> {
            match name {
                "ping" => Some(ping),
                _ => None,
            }
        }
    }

    fn ping(_receiver: Receiver<'_, Node, Pinger>, _args: &[Value]) -> MethodResult {
        Ok(json!("pong"))
    }

    #[test]
    fn forwarder_moved_to_another_host_is_rejected() {
        let home = Node::new();
        let away = Node::new();
        let handle = AttachedExtension::attach(&home, Pinger).expect("attach");
        handle
            .add_handled_method("ping", HandledMethodOptions::new())
            .expect("install ping");

        let forwarder = home.method_table().get("ping").expect("installed");
        away.method_table().install("ping", forwarder);

        assert_eq!(home.invoke("ping", &[]).expect("home call"), json!("pong"));
        let err = away.invoke("ping", &[]).expect_err("foreign host must fail");
        assert_eq!(
            err,
            InvokeError::ForeignHost {
                method: "ping".to_string(),
                expected: home.host_id(),
                actual: away.host_id(),
            }
        );
    }

    #[derive(Debug)]
    struct Declaring {
        declared: HandledMethods,
    }

    impl Extension<Node> for Declaring {
        fn name(&self) -> &str {
            "declaring"
        }

        fn handled_method(&self, name: &str) -> Option<HandledMethod<Node, Self>> {
            match name {
                "hello" => Some(hello),
                _ => None,
            }
        }

        fn handled_methods(&self) -> HandledMethods {
            self.declared.clone()
        }
    }

    fn hello(_receiver: Receiver<'_, Node, Declaring>, _args: &[Value]) -> MethodResult {
        Ok(json!("hi"))
    }

    #[test]
    fn failed_attach_leaves_no_forwarders_behind() {
        let node = Node::new();
        let err = AttachedExtension::attach(
            &node,
            Declaring {
                declared: HandledMethods::mapped([("hello", "a"), ("teleport", "b")]),
            },
        )
        .expect_err("undeclared source must fail the attach");

        assert_eq!(
            err,
            ExtensionError::MissingMethod {
                extension: "declaring".to_string(),
                method: "teleport".to_string(),
            }
        );
        assert!(node.method_table().is_empty());
        assert!(matches!(
            node.invoke("a", &[]),
            Err(InvokeError::UnknownMethod(_))
        ));
    }

    #[test]
    fn failed_attach_restores_replaced_forwarders() {
        let node = Node::new();
        AttachedExtension::attach(&node, Pinger)
            .expect("attach pinger")
            .add_handled_method("ping", HandledMethodOptions::new())
            .expect("install ping");

        let replacing = HandledMethodOptions::new().dest_name("ping").can_replace(true);
        let err = AttachedExtension::attach(
            &node,
            Declaring {
                declared: HandledMethods::mapped([
                    ("hello", MethodSpec::from(replacing)),
                    ("missing", MethodSpec::from("later")),
                ]),
            },
        )
        .expect_err("missing source must fail the attach");

        assert!(matches!(err, ExtensionError::MissingMethod { .. }));
        assert_eq!(node.method_table().names(), vec!["ping".to_string()]);
        assert_eq!(node.invoke("ping", &[]).expect("call"), json!("pong"));
    }

    struct Installer;

    impl Extension<Node> for Installer {
        fn name(&self) -> &str {
            "installer"
        }

        fn handled_method(&self, name: &str) -> Option<HandledMethod<Node, Self>> {
            match name {
                "install_more" => Some(install_more),
                _ => None,
            }
        }
    }

    fn install_more(receiver: Receiver<'_, Node, Installer>, _args: &[Value]) -> MethodResult {
        let table = receiver.parent().method_table();
        let forwarder = table
            .get("ping")
            .ok_or_else(|| MethodError::new("ping is not installed"))?;
        table.install("ping_again", forwarder);
        Ok(json!(table.len()))
    }

    #[test]
    fn forwarded_method_may_install_more_forwarders() {
        let node = Node::new();
        AttachedExtension::attach(&node, Pinger)
            .expect("attach pinger")
            .add_handled_method("ping", HandledMethodOptions::new())
            .expect("install ping");
        AttachedExtension::attach(&node, Installer)
            .expect("attach installer")
            .add_handled_method("install_more", HandledMethodOptions::new())
            .expect("install install_more");

        assert_eq!(node.invoke("install_more", &[]).expect("call"), json!(3));
        assert_eq!(node.invoke("ping_again", &[]).expect("call"), json!("pong"));
    }
}
