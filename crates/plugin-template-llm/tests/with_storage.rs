//! Both reference plugins under one loader, linked by an optional dependency.

use std::sync::Arc;

use serde_json::{Value, json};

use keystone_core::config::PluginConfig;
use keystone_core::types::EncounterRequest;
use keystone_plugin::{BuiltinModules, LoadOptions, PluginLoader};
use plugin_memory_storage::MemoryStoragePlugin;
use plugin_template_llm::TemplateLlmPlugin;

fn write_manifest(root: &std::path::Path, manifest: Value) {
    let dir = root.join(manifest["name"].as_str().unwrap());
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("plugin.json"), manifest.to_string()).unwrap();
}

fn loader(tmp: &std::path::Path, with_storage: bool) -> PluginLoader {
    let root = tmp.join("plugins");
    write_manifest(
        &root,
        json!({
            "name": "template-llm",
            "version": "0.1.0",
            "main": "builtin:template-llm",
            "dependencies": [{ "name": "memory-storage", "optional": true }]
        }),
    );
    if with_storage {
        write_manifest(
            &root,
            json!({
                "name": "memory-storage",
                "version": "0.1.0",
                "main": "builtin:memory-storage"
            }),
        );
    }

    let config = PluginConfig {
        directory: root.to_string_lossy().into_owned(),
        data_directory: tmp.join("data").to_string_lossy().into_owned(),
        ..PluginConfig::default()
    };
    let builtins = BuiltinModules::new()
        .with("memory-storage", || Arc::new(MemoryStoragePlugin::new()))
        .with("template-llm", || Arc::new(TemplateLlmPlugin::new()));
    PluginLoader::with_builtins(config, builtins)
}

async fn storage_linked(loader: &PluginLoader) -> Value {
    let plugin = loader.llm_provider().await.expect("llm provider");
    let encounter = plugin
        .as_llm_provider()
        .unwrap()
        .generate_encounter(&EncounterRequest {
            prompt: "approach".into(),
            ..EncounterRequest::default()
        })
        .await
        .unwrap();
    encounter.metadata["storageLinked"].clone()
}

#[tokio::test]
async fn optional_storage_is_linked_when_present() {
    let tmp = tempfile::tempdir().unwrap();
    let loader = loader(tmp.path(), true);

    let report = loader
        .load_all(LoadOptions { skip_errors: false })
        .await
        .unwrap();
    // Optional edges do not order; discovery order puts storage first.
    assert_eq!(report.activated, vec!["memory-storage", "template-llm"]);
    assert_eq!(storage_linked(&loader).await, json!(true));

    let session = loader
        .hooks()
        .trigger("before-create-session", json!({ "userId": "alice" }))
        .await;
    assert_eq!(session["difficulty"], "normal");

    let report = loader.shutdown_all().await;
    assert_eq!(report.stopped, vec!["template-llm", "memory-storage"]);
}

#[tokio::test]
async fn missing_optional_storage_is_tolerated() {
    let tmp = tempfile::tempdir().unwrap();
    let loader = loader(tmp.path(), false);

    let report = loader
        .load_all(LoadOptions { skip_errors: false })
        .await
        .unwrap();
    assert_eq!(report.activated, vec!["template-llm"]);
    assert!(loader.storage_provider().await.is_none());
    assert_eq!(storage_linked(&loader).await, json!(false));
}
