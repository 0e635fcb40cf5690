//! Reference runtime wiring the in-memory collaborators together.

use super::{IdGenerator, IdReader, MemoryIdManager, Runtime, Service};
use crate::block::{Block, BlockClass};
use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::fields::ScopeIds;
use crate::kvs::KeyValueStore;
use crate::plugin::ClassRegistry;
use crate::serialization::{ChildResolution, ExportContext, MemoryPointerStore, PointerResolver};
use log::info;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

/// Runtime over a shared store, class registry, id manager and pointer store.
///
/// Every block it constructs holds an `Arc` back to the runtime; the runtime
/// itself holds no blocks.
pub struct WorkbenchRuntime {
    this: Weak<WorkbenchRuntime>,
    user_id: Option<String>,
    store: Arc<dyn KeyValueStore>,
    registry: Arc<ClassRegistry>,
    ids: Arc<MemoryIdManager>,
    pointers: Arc<MemoryPointerStore>,
    services: BTreeMap<String, Service>,
    child_resolution: ChildResolution,
}

impl WorkbenchRuntime {
    pub fn builder(store: Arc<dyn KeyValueStore>, registry: ClassRegistry) -> WorkbenchRuntimeBuilder {
        WorkbenchRuntimeBuilder {
            user_id: None,
            store,
            registry: Arc::new(registry),
            ids: Arc::new(MemoryIdManager::new()),
            pointers: Arc::new(MemoryPointerStore::new()),
            services: BTreeMap::new(),
            child_resolution: ChildResolution::default(),
        }
    }

    /// Runtime acting for `user_id` over the same store, classes and ids.
    pub fn for_user(&self, user_id: impl Into<String>) -> Arc<WorkbenchRuntime> {
        WorkbenchRuntimeBuilder {
            user_id: Some(user_id.into()),
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            ids: Arc::clone(&self.ids),
            pointers: Arc::clone(&self.pointers),
            services: self.services.clone(),
            child_resolution: self.child_resolution,
        }
        .build()
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    pub fn pointer_store(&self) -> &Arc<MemoryPointerStore> {
        &self.pointers
    }

    /// Export context honoring this runtime's child resolution policy.
    pub fn export_context(&self) -> ExportContext {
        ExportContext::new(self.child_resolution)
    }
}

impl Runtime for WorkbenchRuntime {
    fn key_value_store(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.store)
    }

    fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    fn id_reader(&self) -> &dyn IdReader {
        self.ids.as_ref()
    }

    fn id_generator(&self) -> &dyn IdGenerator {
        self.ids.as_ref()
    }

    fn load_block_type(&self, block_type: &str) -> RuntimeResult<Arc<BlockClass>> {
        Ok(self.registry.load_class(block_type)?)
    }

    fn construct_block(&self, class: Arc<BlockClass>, scope_ids: ScopeIds) -> RuntimeResult<Block> {
        let runtime: Arc<dyn Runtime> = self.this.upgrade().ok_or(RuntimeError::Detached)?;
        Ok(Block::new(runtime, class, scope_ids))
    }

    fn pointer_resolver(&self) -> Option<&dyn PointerResolver> {
        Some(self.pointers.as_ref())
    }

    fn service(&self, name: &str) -> Option<Service> {
        self.services.get(name).cloned()
    }
}

pub struct WorkbenchRuntimeBuilder {
    user_id: Option<String>,
    store: Arc<dyn KeyValueStore>,
    registry: Arc<ClassRegistry>,
    ids: Arc<MemoryIdManager>,
    pointers: Arc<MemoryPointerStore>,
    services: BTreeMap<String, Service>,
    child_resolution: ChildResolution,
}

impl WorkbenchRuntimeBuilder {
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn pointer_store(mut self, pointers: Arc<MemoryPointerStore>) -> Self {
        self.pointers = pointers;
        self
    }

    pub fn service(mut self, name: impl Into<String>, service: Service) -> Self {
        self.services.insert(name.into(), service);
        self
    }

    pub fn child_resolution(mut self, resolution: ChildResolution) -> Self {
        self.child_resolution = resolution;
        self
    }

    /// Applies the runtime-relevant parts of `config`. The entry point is
    /// applied where the registry is made, through `ClassRegistry::from_config`.
    pub fn config(self, config: &RuntimeConfig) -> Self {
        self.child_resolution(config.child_resolution)
    }

    pub fn build(self) -> Arc<WorkbenchRuntime> {
        info!(
            "event=runtime_init module=runtime status=ok classes={} services={} child_resolution={:?}",
            self.registry.len(),
            self.services.len(),
            self.child_resolution
        );
        Arc::new_cyclic(|this| WorkbenchRuntime {
            this: this.clone(),
            user_id: self.user_id,
            store: self.store,
            registry: self.registry,
            ids: self.ids,
            pointers: self.pointers,
            services: self.services,
            child_resolution: self.child_resolution,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::WorkbenchRuntime;
    use crate::block::{BlockClass, HandlerRequest};
    use crate::error::{BlockError, RuntimeError};
    use crate::fields::{Field, Scope};
    use crate::kvs::MemoryKeyValueStore;
    use crate::plugin::ClassRegistry;
    use crate::runtime::{Fragment, Runtime, Service};
    use serde_json::json;
    use std::sync::Arc;

    fn registry() -> ClassRegistry {
        let mut registry = ClassRegistry::new();
        registry
            .register(
                BlockClass::builder("counter")
                    .field(Field::integer("count", Scope::UserState))
                    .view("student_view", |block, _| {
                        Ok(Fragment::new(format!("count={}", block.get("count")?)))
                    })
                    .build(),
            )
            .expect("counter");
        registry
    }

    #[test]
    fn get_block_round_trips_ids() {
        let runtime = WorkbenchRuntime::builder(Arc::new(MemoryKeyValueStore::new()), registry())
            .user_id("ada")
            .build();
        let block = runtime.create_block("counter").expect("create");
        let loaded = runtime.get_block(block.usage_id()).expect("load");
        assert_eq!(loaded.scope_ids(), block.scope_ids());
        assert_eq!(loaded.scope_ids().user_id(), Some("ada"));
    }

    #[test]
    fn unknown_usage_is_a_resolution_error() {
        let runtime =
            WorkbenchRuntime::builder(Arc::new(MemoryKeyValueStore::new()), registry()).build();
        let err = runtime.get_block("missing").expect_err("unknown usage");
        assert!(matches!(
            err,
            BlockError::Runtime(RuntimeError::NoSuchUsage(_))
        ));
    }

    #[test]
    fn render_uses_class_view() {
        let runtime =
            WorkbenchRuntime::builder(Arc::new(MemoryKeyValueStore::new()), registry()).build();
        let mut block = runtime.create_block("counter").expect("create");
        block.set("count", 2).expect("set");

        let fragment = block.render("student_view", &json!({})).expect("render");
        assert_eq!(fragment.content, "count=2");
        assert!(matches!(
            block.render("studio_view", &json!({})),
            Err(BlockError::NoSuchView { .. })
        ));
    }

    #[test]
    fn services_are_shared_with_user_runtimes() {
        let service: Service = Arc::new("en".to_string());
        let runtime = WorkbenchRuntime::builder(Arc::new(MemoryKeyValueStore::new()), registry())
            .service("i18n", service)
            .build();
        let user_runtime = runtime.for_user("bob");

        let found = user_runtime.service("i18n").expect("service");
        assert_eq!(found.downcast_ref::<String>().map(String::as_str), Some("en"));
        assert!(user_runtime.service("user").is_none());
    }

    #[test]
    fn handle_saves_after_dispatch() {
        let mut registry = ClassRegistry::new();
        registry
            .register(
                BlockClass::builder("counter")
                    .field(Field::integer("count", Scope::UserState))
                    .handler("increment", |block, _| {
                        let next = block.get("count")?.as_i64().unwrap_or_default() + 1;
                        block.set("count", next)?;
                        Ok(json!({ "count": next }))
                    })
                    .build(),
            )
            .expect("counter");
        let runtime =
            WorkbenchRuntime::builder(Arc::new(MemoryKeyValueStore::new()), registry).build();
        let mut block = runtime.create_block("counter").expect("create");

        let result = runtime
            .handle(&mut block, "increment", &HandlerRequest::default())
            .expect("handle");
        assert_eq!(result, json!({ "count": 1 }));
        assert!(!block.is_dirty("count"));

        let mut reloaded = runtime.get_block(block.usage_id()).expect("reload");
        assert_eq!(reloaded.get("count").expect("count"), json!(1));
    }
}
