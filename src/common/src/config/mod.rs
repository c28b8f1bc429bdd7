use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

/// Default configuration file, looked up relative to the working directory
pub const CONFIG_FILE: &str = "otel-prometheus.toml";

/// Prefix for environment overrides, e.g. `OTEL_PROMETHEUS__HTTP__LISTEN_ADDR`
pub const ENV_PREFIX: &str = "OTEL_PROMETHEUS__";

/// How OpenTelemetry metric names are translated into Prometheus names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationStrategy {
    /// Escape names for classic Prometheus compatibility and append unit and type suffixes.
    #[default]
    UnderscoreEscapingWithSuffixes,
    /// Escape names to `_`, but never attach unit or type suffixes.
    UnderscoreEscapingWithoutSuffixes,
    /// Keep UTF-8 names when the scraper accepts them, still attaching suffixes.
    NoUtf8EscapingWithSuffixes,
    /// Pass names through untouched when the scraper accepts UTF-8, without suffixes.
    NoTranslation,
}

impl TranslationStrategy {
    /// Whether unit and type suffixes are appended to metric names
    pub fn adds_suffixes(&self) -> bool {
        matches!(
            self,
            TranslationStrategy::UnderscoreEscapingWithSuffixes
                | TranslationStrategy::NoUtf8EscapingWithSuffixes
        )
    }

    /// Whether escaping schemes other than `underscores` may be negotiated
    pub fn allows_utf8(&self) -> bool {
        matches!(
            self,
            TranslationStrategy::NoUtf8EscapingWithSuffixes | TranslationStrategy::NoTranslation
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Socket address the scrape endpoint binds to
    pub listen_addr: String,
    /// Request path serving the exposition document
    pub path: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_addr: String::from("0.0.0.0:9464"),
            path: String::from("/metrics"),
        }
    }
}

/// Options controlling how scrapes are rendered
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Do not append unit suffixes and omit `# UNIT` lines
    pub without_units: bool,
    /// Do not append type suffixes such as `_total`
    pub without_type_suffix: bool,
    /// Do not add `otel_scope_*` labels
    pub without_scope_info: bool,
    /// Do not emit `target_info` series
    pub without_target_info: bool,
    /// Resource attribute keys copied onto every series as constant labels
    pub resource_constant_labels: Vec<String>,
    /// Offer gzip and deflate response encodings
    pub compression: bool,
    pub translation_strategy: TranslationStrategy,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            without_units: false,
            without_type_suffix: false,
            without_scope_info: false,
            without_target_info: false,
            resource_constant_labels: Vec::new(),
            compression: true,
            translation_strategy: TranslationStrategy::default(),
        }
    }
}

/// Resource describing this process in its own metrics
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub service_name: String,
    pub service_namespace: Option<String>,
    pub service_instance_id: Option<String>,
    /// Additional resource attributes
    pub attributes: HashMap<String, String>,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            service_name: String::from("otel-prometheus"),
            service_namespace: None,
            service_instance_id: None,
            attributes: HashMap::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Configuration {
    /// Scrape endpoint configuration
    pub http: HttpConfig,
    /// Exposition options
    pub exporter: ExporterConfig,
    /// Resource used by the self-monitoring reader
    pub resource: ResourceConfig,
}

impl Configuration {
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::load_from(CONFIG_FILE)
    }

    pub fn load_from(path: &str) -> Result<Self, Box<figment::Error>> {
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }
}
