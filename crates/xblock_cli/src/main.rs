//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `xblock_core` linkage.
//! - Given an XML file, parse it through the workbench runtime and print the
//!   re-serialized markup.

use log::info;
use std::process::ExitCode;
use std::sync::Arc;
use xblock_core::fields::CONTENT_FIELD;
use xblock_core::serialization::export_xml;
use xblock_core::{
    init_logging_from_config, BlockClass, BlockError, ClassRegistry, Field,
    MemoryKeyValueStore, Runtime, RuntimeConfig, Scope, WorkbenchRuntime,
};

fn main() -> ExitCode {
    println!("xblock_core version={}", xblock_core::core_version());

    let Some(path) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };
    match run(&path) {
        Ok(markup) => {
            print!("{markup}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(path: &str) -> Result<String, String> {
    let config = RuntimeConfig::from_env().map_err(|err| err.to_string())?;
    init_logging_from_config(&config).map_err(|err| err.to_string())?;

    let text = std::fs::read_to_string(path).map_err(|err| format!("{path}: {err}"))?;

    // Any tag is accepted; its attributes, text and children are carried through.
    let mut registry = ClassRegistry::from_config(&config);
    registry.set_default_class(
        BlockClass::builder("raw")
            .family(config.entry_point.as_str())
            .field(Field::string(CONTENT_FIELD, Scope::Content))
            .has_children(true)
            .build(),
    );
    let runtime = WorkbenchRuntime::builder(Arc::new(MemoryKeyValueStore::new()), registry)
        .config(&config)
        .build();

    let markup = reserialize(&runtime, &text).map_err(|err| err.to_string())?;
    info!("event=cli_roundtrip module=cli status=ok path={path}");
    Ok(markup)
}

fn reserialize(runtime: &WorkbenchRuntime, text: &str) -> Result<String, BlockError> {
    let usage_id = xblock_core::parse_xml_str(runtime, text)?;
    let mut block = runtime.get_block(&usage_id)?;
    export_xml(&mut block, &mut runtime.export_context())
}
