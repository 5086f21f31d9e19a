//! Shared mock backend for environ tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use windlass_environs::{
    ApiInfo, Environ, EnvironConfig, EnvironError, EnvironProvider, HardwareCharacteristics,
    Instance, InstanceId, InstanceLookup, Result, StartInstanceParams, StartedInstance,
    StateInfo, certs, collect_instances, state_info,
};
use windlass_storage::{MemStorage, RetryPolicy, Storage, StorageError};

/// Storage wrapper that can be told to reject writes to one object.
pub struct PoisonedStorage {
    inner: MemStorage,
    fail_put: StdMutex<Option<(String, String)>>,
}

impl PoisonedStorage {
    pub fn new(namespace: &str) -> Self {
        Self {
            inner: MemStorage::new(namespace),
            fail_put: StdMutex::new(None),
        }
    }

    /// Fail non-empty writes to `name` with `message`. Empty writes
    /// (slot reservation) still succeed.
    pub fn fail_puts_to(&self, name: &str, message: &str) {
        *self.fail_put.lock().unwrap() = Some((name.to_string(), message.to_string()));
    }
}

#[async_trait]
impl Storage for PoisonedStorage {
    async fn put(&self, name: &str, data: &[u8]) -> windlass_storage::Result<()> {
        if let Some((target, message)) = self.fail_put.lock().unwrap().clone() {
            if target == name && !data.is_empty() {
                return Err(StorageError::Backend(message));
            }
        }
        self.inner.put(name, data).await
    }

    async fn get(&self, name: &str) -> windlass_storage::Result<Vec<u8>> {
        self.inner.get(name).await
    }

    async fn list(&self, prefix: &str) -> windlass_storage::Result<Vec<String>> {
        self.inner.list(prefix).await
    }

    async fn remove(&self, name: &str) -> windlass_storage::Result<()> {
        self.inner.remove(name).await
    }

    async fn remove_all(&self) -> windlass_storage::Result<()> {
        self.inner.remove_all().await
    }

    fn url(&self, name: &str) -> windlass_storage::Result<String> {
        self.inner.url(name)
    }
}

pub struct MockInstance {
    pub id: InstanceId,
}

#[async_trait]
impl Instance for MockInstance {
    fn id(&self) -> InstanceId {
        self.id.clone()
    }

    async fn dns_name(&self) -> Result<Option<String>> {
        Ok(Some(format!("{}.dummy.example", self.id)))
    }
}

#[derive(Clone)]
enum StartBehavior {
    Succeed {
        id: InstanceId,
        hardware: Option<HardwareCharacteristics>,
    },
    Fail(String),
}

/// An in-memory backend with scriptable failures, recording every stop
/// call it receives.
pub struct MockEnviron {
    config: Mutex<EnvironConfig>,
    storage: Arc<PoisonedStorage>,
    provider: Arc<MockProvider>,
    start: StdMutex<StartBehavior>,
    stop_error: StdMutex<Option<String>>,
    pub stops: StdMutex<Vec<Vec<InstanceId>>>,
    live: StdMutex<Vec<InstanceId>>,
}

impl MockEnviron {
    pub fn new() -> Arc<Self> {
        Self::with_config(env_config())
    }

    pub fn with_config(config: EnvironConfig) -> Arc<Self> {
        let namespace = config.name().to_string();
        Arc::new(Self {
            config: Mutex::new(config),
            storage: Arc::new(PoisonedStorage::new(&namespace)),
            provider: Arc::new(MockProvider),
            start: StdMutex::new(StartBehavior::Succeed {
                id: InstanceId::from("i-default"),
                hardware: None,
            }),
            stop_error: StdMutex::new(None),
            stops: StdMutex::new(Vec::new()),
            live: StdMutex::new(Vec::new()),
        })
    }

    pub fn poisoned_storage(&self) -> &PoisonedStorage {
        &self.storage
    }

    pub fn set_start_success(&self, id: &str, hardware: Option<&str>) {
        *self.start.lock().unwrap() = StartBehavior::Succeed {
            id: InstanceId::from(id),
            hardware: hardware.map(|h| h.parse().unwrap()),
        };
    }

    pub fn set_start_failure(&self, message: &str) {
        *self.start.lock().unwrap() = StartBehavior::Fail(message.to_string());
    }

    pub fn set_stop_failure(&self, message: &str) {
        *self.stop_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn add_live_instance(&self, id: &str) {
        self.live.lock().unwrap().push(InstanceId::from(id));
    }
}

#[async_trait]
impl Environ for MockEnviron {
    async fn config(&self) -> EnvironConfig {
        self.config.lock().await.clone()
    }

    async fn set_config(&self, config: EnvironConfig) -> Result<()> {
        *self.config.lock().await = config;
        Ok(())
    }

    fn storage(&self) -> Arc<dyn Storage> {
        self.storage.clone()
    }

    async fn start_instance(&self, params: StartInstanceParams) -> Result<StartedInstance> {
        params.machine_config.agent_params()?;
        let behavior = self.start.lock().unwrap().clone();
        match behavior {
            StartBehavior::Fail(message) => Err(EnvironError::Provider(message)),
            StartBehavior::Succeed { id, hardware } => {
                self.live.lock().unwrap().push(id.clone());
                Ok(StartedInstance {
                    instance: Arc::new(MockInstance { id }),
                    hardware,
                })
            }
        }
    }

    async fn stop_instances(&self, ids: &[InstanceId]) -> Result<()> {
        self.stops.lock().unwrap().push(ids.to_vec());
        if let Some(message) = self.stop_error.lock().unwrap().clone() {
            return Err(EnvironError::Provider(message));
        }
        self.live.lock().unwrap().retain(|id| !ids.contains(id));
        Ok(())
    }

    async fn instances(&self, ids: &[InstanceId]) -> Result<InstanceLookup> {
        let live = self.live.lock().unwrap().clone();
        let found: HashMap<InstanceId, Arc<dyn Instance>> = live
            .into_iter()
            .filter(|id| ids.contains(id))
            .map(|id| {
                (
                    id.clone(),
                    Arc::new(MockInstance { id }) as Arc<dyn Instance>,
                )
            })
            .collect();
        collect_instances(ids, found)
    }

    async fn all_instances(&self) -> Result<Vec<Arc<dyn Instance>>> {
        let live = self.live.lock().unwrap().clone();
        Ok(live
            .into_iter()
            .map(|id| Arc::new(MockInstance { id }) as Arc<dyn Instance>)
            .collect())
    }

    async fn state_info(&self) -> Result<(StateInfo, ApiInfo)> {
        state_info(self, RetryPolicy::none()).await
    }

    async fn destroy(&self) -> Result<()> {
        self.live.lock().unwrap().clear();
        self.storage.remove_all().await?;
        Ok(())
    }

    fn provider(&self) -> Arc<dyn EnvironProvider> {
        self.provider.clone()
    }
}

/// The provider behind [`MockEnviron`]. Its backend-specific identity
/// token (`mock-token`) is generated at prepare time and immutable
/// afterwards.
pub struct MockProvider;

#[async_trait]
impl EnvironProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn prepare(&self, config: EnvironConfig) -> Result<Arc<dyn Environ>> {
        let validated = self.validate(&config, None)?;
        Ok(MockEnviron::with_config(validated))
    }

    async fn open(&self, config: EnvironConfig) -> Result<Arc<dyn Environ>> {
        if config.attr("mock-token").is_none() {
            return Err(EnvironError::Missing("mock-token"));
        }
        let validated = self.validate(&config, None)?;
        Ok(MockEnviron::with_config(validated))
    }

    fn validate(
        &self,
        new: &EnvironConfig,
        old: Option<&EnvironConfig>,
    ) -> Result<EnvironConfig> {
        let validated = match new.attr("mock-token") {
            None => {
                let mut updates = BTreeMap::new();
                updates.insert(
                    "mock-token".to_string(),
                    json!(format!("token-{}", new.name())),
                );
                new.with_updates(updates)?
            }
            Some(token) if token.as_str().is_none() => {
                return Err(EnvironError::InvalidConfig(
                    "mock-token must be a string".to_string(),
                ));
            }
            Some(_) => new.clone(),
        };
        if let Some(old) = old {
            if old.attr("mock-token") != validated.attr("mock-token") {
                return Err(EnvironError::InvalidConfig(
                    "mock-token cannot be changed".to_string(),
                ));
            }
        }
        Ok(validated)
    }

    fn boilerplate_config(&self) -> String {
        concat!(
            "# In-memory mock environment, for tests.\n",
            "name: sample\n",
            "type: mock\n",
            "admin-secret: change-me\n",
        )
        .to_string()
    }

    fn secret_attrs(&self, config: &EnvironConfig) -> Result<BTreeMap<String, String>> {
        let mut secrets = BTreeMap::new();
        if let Some(secret) = config.admin_secret() {
            secrets.insert("admin-secret".to_string(), secret);
        }
        if let Some(token) = config.attr("mock-token").and_then(|t| t.as_str()) {
            secrets.insert("mock-token".to_string(), token.to_string());
        }
        Ok(secrets)
    }

    async fn public_address(&self) -> Result<String> {
        Ok(String::new())
    }

    async fn private_address(&self) -> Result<String> {
        Ok("10.0.0.1".to_string())
    }
}

/// A complete environment config, CA pair included, for bootstrap
/// tests.
pub fn env_config() -> EnvironConfig {
    let (ca_cert, ca_key) = certs::new_ca("staging").unwrap();
    let mut attrs = BTreeMap::new();
    attrs.insert("name".to_string(), json!("staging"));
    attrs.insert("type".to_string(), json!("mock"));
    attrs.insert("admin-secret".to_string(), json!("sekrit"));
    attrs.insert("ca-cert".to_string(), json!(ca_cert));
    attrs.insert("ca-private-key".to_string(), json!(ca_key));
    attrs.insert("authorized-keys".to_string(), json!("ssh-ed25519 AAAA dev"));
    EnvironConfig::new(attrs).unwrap()
}
