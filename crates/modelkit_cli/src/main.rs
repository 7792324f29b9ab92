//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `modelkit_core` linkage.
//! - Drive one demo model through the full lifecycle with deterministic output.
//!
//! Usage: `modelkit [options.json]`. File logging is enabled when
//! `MODELKIT_LOG_DIR` is set.

use log::warn;
use modelkit_core::{
    AttachedExtension, Extension, HandledMethod, HandledMethods, Host, HostId, InitReceiver,
    Lifecycle, LogSettings, MethodError, MethodResult, MethodTable, Options, Receiver,
};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::process::ExitCode;
use std::rc::Rc;

struct DemoModel {
    id: HostId,
    methods: MethodTable<Self>,
    ready: RefCell<Vec<String>>,
}

impl DemoModel {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            id: HostId::new(),
            methods: MethodTable::new(),
            ready: RefCell::new(Vec::new()),
        })
    }

    fn mark_ready(&self, what: &str) {
        self.ready.borrow_mut().push(what.to_string());
    }
}

impl Host for DemoModel {
    fn host_id(&self) -> HostId {
        self.id
    }

    fn method_table(&self) -> &MethodTable<Self> {
        &self.methods
    }

    fn capabilities(&self) -> &[&'static str] {
        &["session"]
    }
}

struct SessionExtension {
    endpoint: String,
}

impl Extension<DemoModel> for SessionExtension {
    fn name(&self) -> &str {
        "session"
    }

    fn required_capabilities(&self) -> &[&'static str] {
        &["session"]
    }

    fn setup(&mut self, _parent: &DemoModel) {
        self.endpoint = "local://demo".to_string();
    }

    fn pre_init(&self, _parent: &DemoModel, config: &Options) {
        if config.is_empty() {
            warn!("event=demo_pre_init module=cli status=ok options=empty");
        }
    }

    fn post_init(&self, parent: &DemoModel, _config: &Options) {
        parent.mark_ready("session");
    }

    fn handled_method(&self, name: &str) -> Option<HandledMethod<DemoModel, Self>> {
        match name {
            "connect" => Some(connect),
            "ready" => Some(ready),
            _ => None,
        }
    }

    fn handled_methods(&self) -> HandledMethods {
        HandledMethods::mapped([("connect", "connect"), ("ready", "status")])
    }
}

fn connect(receiver: Receiver<'_, DemoModel, SessionExtension>, args: &[Value]) -> MethodResult {
    let session = receiver
        .extension()
        .ok_or_else(|| MethodError::new("connect needs the session receiver"))?;
    let user = args.first().and_then(Value::as_str).unwrap_or("guest");
    Ok(json!(format!("{user}@{}", session.endpoint)))
}

fn ready(receiver: Receiver<'_, DemoModel, SessionExtension>, _args: &[Value]) -> MethodResult {
    Ok(json!(receiver.parent().ready.borrow().clone()))
}

fn load_options() -> Result<Options, String> {
    match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .map_err(|err| format!("failed to read options `{path}`: {err}"))?;
            Options::from_json_str(&raw).map_err(|err| err.to_string())
        }
        None => Ok(Options::new()),
    }
}

fn run() -> Result<(), String> {
    if let Some(settings) = LogSettings::from_env()? {
        modelkit_core::init_logging(&settings)?;
    }
    let options = load_options()?;

    let model = DemoModel::new();
    let mut lifecycle = Lifecycle::new(&model);
    let extension = SessionExtension {
        endpoint: String::new(),
    };
    let session =
        AttachedExtension::attach(&model, extension).map_err(|err| err.to_string())?;
    lifecycle
        .register_extension(session)
        .map_err(|err| err.to_string())?;

    let order = Rc::new(RefCell::new(Vec::<String>::new()));
    let group = lifecycle.new_group("core").map_err(|err| err.to_string())?;
    for name in ["config", "storage", "session"] {
        let order = Rc::clone(&order);
        group
            .add(
                name,
                move |receiver: InitReceiver<'_, DemoModel>, _options: &Options| {
                    order.borrow_mut().push(name.to_string());
                    if let InitReceiver::Api(model) = receiver {
                        model.mark_ready(name);
                    }
                    Ok(Value::Null)
                },
                true,
            )
            .map_err(|err| err.to_string())?;
    }
    lifecycle.initialize(&options).map_err(|err| err.to_string())?;

    let greeting = model
        .invoke("connect", &[json!("demo")])
        .map_err(|err| err.to_string())?;
    let status = model.invoke("status", &[]).map_err(|err| err.to_string())?;

    println!("init_order={}", order.borrow().join(","));
    println!("connect={greeting}");
    println!("status={status}");
    Ok(())
}

fn main() -> ExitCode {
    println!("modelkit_core ping={}", modelkit_core::ping());
    println!("modelkit_core version={}", modelkit_core::core_version());

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("modelkit: {err}");
            ExitCode::FAILURE
        }
    }
}
