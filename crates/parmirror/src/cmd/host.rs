use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use parmirror_host::{LinkConfig, LinkSender, MemoryOperation, RelayLink, SyncEngine};
use parmirror_proto::ParamValue;
use serde::Deserialize;

use crate::cmd::{parse_duration, HostArgs};
use crate::exit::{io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::OutputFormat;

/// On-disk operation definition accepted by `--operation`.
#[derive(Deserialize)]
struct OperationFile {
    id: String,
    title: String,
    schema: serde_json::Value,
    state: BTreeMap<String, ParamValue>,
}

pub fn run(args: HostArgs, _format: OutputFormat) -> CliResult<i32> {
    let retry_delay = parse_duration(&args.retry_delay)?;
    let operation = match &args.operation {
        Some(path) => load_operation(path)?,
        None => demo_operation(),
    };
    let id = operation.id().clone();
    tracing::info!(operation = %id, "hosting operation");

    let sender = LinkSender::new();
    let mut engine = SyncEngine::new(operation.clone(), operation, sender.clone());
    engine.set_operation(Some(id));
    engine.set_active(true);

    let config = LinkConfig::new(&args.addr).with_retry_delay(retry_delay);
    let handle = RelayLink::spawn(config, Arc::new(Mutex::new(engine)), sender);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }

    handle.shutdown();
    Ok(SUCCESS)
}

fn load_operation(path: &Path) -> CliResult<MemoryOperation> {
    let raw = std::fs::read_to_string(path)
        .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
    let file: OperationFile = serde_json::from_str(&raw).map_err(|err| {
        CliError::new(
            DATA_INVALID,
            format!("{} is not a valid operation file: {err}", path.display()),
        )
    })?;
    Ok(MemoryOperation::new(
        file.id, file.title, file.schema, file.state,
    ))
}

/// A small built-in operation, enough to exercise a UI client.
fn demo_operation() -> MemoryOperation {
    let schema = serde_json::json!({
        "Test Page": {
            "slider1": {
                "label": "Test Slider",
                "style": "Float",
                "normMin": 0,
                "normMax": 10,
                "size": 1,
                "enable": true
            },
            "xy_pad": {
                "label": "2D Pad",
                "style": "XY",
                "normMin": 0,
                "normMax": 1,
                "size": 2,
                "enable": true
            }
        }
    });
    let state = BTreeMap::from([
        ("slider1".to_string(), ParamValue::Number(5.0)),
        ("xy_padx".to_string(), ParamValue::Number(0.5)),
        ("xy_pady".to_string(), ParamValue::Number(0.5)),
    ]);
    MemoryOperation::new("test_op", "Debug Controller", schema, state)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
