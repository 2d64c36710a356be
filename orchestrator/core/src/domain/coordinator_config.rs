// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Coordinator Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) for a hybrid
// coordinator process, covering:
// - HTTP server binding
// - Vector index, embedding and cache backends
// - Session, augmentation and resilience tuning
// - Learning (value scoring, telemetry) and self-healing
// - Observability settings

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::error::CoordinatorError;

pub const API_VERSION: &str = "hybrid-coordinator/v1";
pub const KIND: &str = "CoordinatorConfig";

/// Top-level coordinator configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfigManifest {
    /// API version (must be "hybrid-coordinator/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "CoordinatorConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: CoordinatorConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordinatorConfigSpec {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
    #[serde(default)]
    pub augmentation: AugmentationConfig,
    #[serde(default)]
    pub resilience: ResilienceConfig,
    #[serde(default)]
    pub learning: LearningConfig,
    #[serde(default)]
    pub healing: HealingConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Hard limit applied by the HTTP layer to every request
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreType {
    Qdrant,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(rename = "type", default = "default_vector_store_type")]
    pub store_type: VectorStoreType,

    /// Base URL of the index (required for qdrant)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Timeout of a single remote call, independent of retry backoff
    #[serde(default = "default_call_timeout", with = "humantime_serde")]
    pub call_timeout: Duration,

    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingType {
    Hashing,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(rename = "type", default = "default_embedding_type")]
    pub embedding_type: EmbeddingType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    #[serde(default = "default_one_hour", with = "humantime_serde")]
    pub ttl: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle time after which a session is evicted
    #[serde(default = "default_one_hour", with = "humantime_serde")]
    pub ttl: Duration,

    /// Tokens a session may receive over its lifetime
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarizationKind {
    /// Fall back to the item's stored summary
    PayloadSummary,
    /// Cut the full text at the remaining budget
    Truncate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AugmentationConfig {
    /// Overall deadline of one augmentation call across all collections and retries
    #[serde(default = "default_request_deadline", with = "humantime_serde")]
    pub request_deadline: Duration,

    #[serde(default = "default_summarization")]
    pub summarization: SummarizationKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResilienceConfig {
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay", with = "humantime_serde")]
    pub base_delay: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_recovery_timeout", with = "humantime_serde")]
    pub recovery_timeout: Duration,

    /// Per-dependency tuning, keyed by dependency id
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub overrides: HashMap<String, BreakerOverride>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BreakerOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<u32>,

    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub recovery_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Composite value score at or above which an interaction becomes a pattern
    #[serde(default = "default_promotion_threshold")]
    pub promotion_threshold: f64,

    /// Similarity to an existing pattern at or above which novelty is zero
    #[serde(default = "default_novelty_threshold")]
    pub novelty_threshold: f64,

    #[serde(default = "default_telemetry_path")]
    pub telemetry_path: PathBuf,

    #[serde(default = "default_maintenance_interval", with = "humantime_serde")]
    pub maintenance_interval: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_healing_interval", with = "humantime_serde")]
    pub interval: Duration,

    #[serde(default = "default_cooldown", with = "humantime_serde")]
    pub cooldown: Duration,

    /// Containers carrying this label are monitored in addition to `services`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<String>,

    /// Path to Docker socket
    /// Default: "/var/run/docker.sock" on Linux/Mac
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_socket_path: Option<String>,

    /// Number of healing actions kept for `/healing/statistics`
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    #[serde(default)]
    pub services: Vec<MonitoredServiceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoredServiceConfig {
    /// Container name or id
    pub id: String,

    /// Services restarted before this one for dependency-class faults
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Optional HTTP liveness endpoint, must answer 2xx
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Prometheus exporter port
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8091
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_vector_store_type() -> VectorStoreType {
    VectorStoreType::Qdrant
}

fn default_call_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_search_limit() -> usize {
    10
}

fn default_score_threshold() -> f64 {
    0.3
}

fn default_embedding_type() -> EmbeddingType {
    EmbeddingType::Hashing
}

fn default_dimension() -> usize {
    384
}

fn default_cache_capacity() -> usize {
    1024
}

fn default_one_hour() -> Duration {
    Duration::from_secs(3600)
}

fn default_token_budget() -> usize {
    32_000
}

fn default_request_deadline() -> Duration {
    Duration::from_secs(12)
}

fn default_summarization() -> SummarizationKind {
    SummarizationKind::PayloadSummary
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_promotion_threshold() -> f64 {
    0.7
}

fn default_novelty_threshold() -> f64 {
    0.9
}

fn default_telemetry_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".hcoord").join("telemetry.jsonl"))
        .unwrap_or_else(|| PathBuf::from("./hcoord-telemetry.jsonl"))
}

fn default_maintenance_interval() -> Duration {
    Duration::from_secs(300)
}

fn default_healing_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_cooldown() -> Duration {
    Duration::from_secs(60)
}

fn default_history_limit() -> usize {
    200
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

fn default_metrics_port() -> u16 {
    9091
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_api_port(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            store_type: default_vector_store_type(),
            url: Some("http://localhost:6333".to_string()),
            call_timeout: default_call_timeout(),
            search_limit: default_search_limit(),
            score_threshold: default_score_threshold(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            embedding_type: default_embedding_type(),
            endpoint: None,
            model: None,
            dimension: default_dimension(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl: default_one_hour(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: default_one_hour(),
            token_budget: default_token_budget(),
        }
    }
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            request_deadline: default_request_deadline(),
            summarization: default_summarization(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout: default_recovery_timeout(),
            overrides: HashMap::new(),
        }
    }
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            promotion_threshold: default_promotion_threshold(),
            novelty_threshold: default_novelty_threshold(),
            telemetry_path: default_telemetry_path(),
            maintenance_interval: default_maintenance_interval(),
        }
    }
}

impl Default for HealingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: default_healing_interval(),
            cooldown: default_cooldown(),
            label_selector: None,
            docker_socket_path: None,
            history_limit: default_history_limit(),
            services: vec![],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Default for CoordinatorConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "hybrid-coordinator".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: CoordinatorConfigSpec::default(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Effective (failure_threshold, recovery_timeout) for one dependency
    pub fn settings_for(&self, dependency: &str) -> (u32, Duration) {
        match self.overrides.get(dependency) {
            Some(o) => (
                o.failure_threshold.unwrap_or(self.failure_threshold),
                o.recovery_timeout.unwrap_or(self.recovery_timeout),
            ),
            None => (self.failure_threshold, self.recovery_timeout),
        }
    }
}

impl CoordinatorConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        std::fs::write(path, self.to_yaml_string()?)?;
        Ok(())
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. HCOORD_CONFIG_PATH environment variable
    /// 2. ./hcoord-config.yaml (working directory)
    /// 3. ~/.hcoord/config.yaml (user home)
    /// 4. /etc/hcoord/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("HCOORD_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./hcoord-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".hcoord").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/hcoord/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path fails if missing or invalid
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            Self::from_yaml_file(config_path)?
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("HCOORD_VECTOR_URL") {
            tracing::info!("Environment override: HCOORD_VECTOR_URL={}", url);
            self.spec.vector_store.url = Some(url);
        }

        if let Ok(path) = std::env::var("HCOORD_TELEMETRY_PATH") {
            tracing::info!("Environment override: HCOORD_TELEMETRY_PATH={}", path);
            self.spec.learning.telemetry_path = PathBuf::from(path);
        }

        if let Ok(val) = std::env::var("HCOORD_HEALING_ENABLED") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => {
                    tracing::info!("Environment override: HCOORD_HEALING_ENABLED=true");
                    self.spec.healing.enabled = true;
                }
                "false" | "0" | "no" | "off" => {
                    tracing::info!("Environment override: HCOORD_HEALING_ENABLED=false");
                    self.spec.healing.enabled = false;
                }
                _ => {
                    tracing::warn!(
                        "Invalid value for HCOORD_HEALING_ENABLED: '{}'. Expected true/false. Ignoring.",
                        val
                    );
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), CoordinatorError> {
        let invalid = |msg: String| Err(CoordinatorError::Configuration(msg));

        if self.api_version != API_VERSION {
            return invalid(format!("Invalid apiVersion: '{}'. Must be '{}'", self.api_version, API_VERSION));
        }
        if self.kind != KIND {
            return invalid(format!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND));
        }
        if self.metadata.name.is_empty() {
            return invalid("metadata.name cannot be empty".to_string());
        }

        let spec = &self.spec;
        if spec.vector_store.store_type == VectorStoreType::Qdrant
            && spec.vector_store.url.as_deref().map_or(true, str::is_empty)
        {
            return invalid("spec.vector_store.url is required for type qdrant".to_string());
        }
        if spec.vector_store.search_limit == 0 {
            return invalid("spec.vector_store.search_limit must be greater than zero".to_string());
        }
        if spec.embedding.embedding_type == EmbeddingType::Ollama && spec.embedding.endpoint.is_none() {
            return invalid("spec.embedding.endpoint is required for type ollama".to_string());
        }
        if spec.embedding.dimension == 0 {
            return invalid("spec.embedding.dimension must be greater than zero".to_string());
        }
        if spec.cache.capacity == 0 {
            return invalid("spec.cache.capacity must be greater than zero".to_string());
        }
        if spec.resilience.retry.max_attempts == 0 {
            return invalid("spec.resilience.retry.max_attempts must be at least 1".to_string());
        }
        if spec.resilience.circuit_breaker.failure_threshold == 0 {
            return invalid("spec.resilience.circuit_breaker.failure_threshold must be at least 1".to_string());
        }
        for (dependency, o) in &spec.resilience.circuit_breaker.overrides {
            if o.failure_threshold == Some(0) {
                return invalid(format!("circuit breaker override '{}' has a zero failure_threshold", dependency));
            }
        }
        if !(0.0..=1.0).contains(&spec.learning.promotion_threshold) {
            return invalid(format!(
                "spec.learning.promotion_threshold must be within [0, 1], got {}",
                spec.learning.promotion_threshold
            ));
        }
        if !(0.0..=1.0).contains(&spec.learning.novelty_threshold) {
            return invalid(format!(
                "spec.learning.novelty_threshold must be within [0, 1], got {}",
                spec.learning.novelty_threshold
            ));
        }

        let mut seen = HashSet::new();
        for service in &spec.healing.services {
            if service.id.is_empty() {
                return invalid("healing service id cannot be empty".to_string());
            }
            if !seen.insert(service.id.as_str()) {
                return invalid(format!("duplicate healing service id '{}'", service.id));
            }
        }
        for service in &spec.healing.services {
            for dependency in &service.dependencies {
                if !seen.contains(dependency.as_str()) {
                    return invalid(format!(
                        "service '{}' depends on undeclared service '{}'",
                        service.id, dependency
                    ));
                }
            }
        }

        Ok(())
    }
}
