// Configuration loading and parsing (storymap.toml, credentials.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("no defaults/ or config/ directory under {0}; run from the storymap checkout or pass --base-dir")]
    NoConfigDir(PathBuf),

    #[error("failed to seed {path} from defaults: {source}")]
    Seed {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory the relative paths below are resolved against.
    pub base_dir: PathBuf,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub data_paths: DataPaths,
    pub classification: ClassificationConfig,
    pub sitemap: SitemapConfig,
    pub teaser: TeaserConfig,
    pub credentials: CredentialsConfig,
}

impl Config {
    /// Resolve a configured path against `base_dir` unless it is absolute.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base_dir.join(p)
        }
    }

    pub fn db_path(&self) -> PathBuf {
        if self.database.path == ":memory:" {
            return PathBuf::from(":memory:");
        }
        self.resolve(&self.database.path)
    }

    /// The page cache directory. An empty setting falls back to the
    /// platform cache directory.
    pub fn cache_dir(&self) -> PathBuf {
        if !self.data_paths.cache_dir.trim().is_empty() {
            return self.resolve(&self.data_paths.cache_dir);
        }
        directories::ProjectDirs::from("org", "publicsource", "storymap")
            .map(|dirs| dirs.cache_dir().join("pages"))
            .unwrap_or_else(|| self.base_dir.join("cache"))
    }

    /// True when teaser generation is switched on and has a key to use.
    pub fn teaser_enabled(&self) -> bool {
        self.teaser.enabled
            && self
                .credentials
                .anthropic_api_key
                .as_deref()
                .is_some_and(|k| !k.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// storymap.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct StorymapFile {
    server: ServerConfig,
    database: DatabaseConfig,
    data_paths: DataPaths,
    #[serde(default)]
    classification: ClassificationConfig,
    #[serde(default)]
    sitemap: SitemapConfig,
    #[serde(default)]
    teaser: TeaserConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted upload body, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    /// Static `{stories, filters}` snapshot: seeds an empty store and is the
    /// dashboard's offline fallback.
    pub stories_fallback: String,
    /// Enhanced geographic data (neighborhoods, municipalities, context rules).
    pub geography: String,
    /// Page cache directory; empty means the platform cache directory.
    #[serde(default)]
    pub cache_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    pub min_confidence: f64,
    pub fuzzy_threshold: f64,
    pub fetch_concurrency: usize,
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        ClassificationConfig {
            min_confidence: 0.4,
            fuzzy_threshold: 0.9,
            fetch_concurrency: 4,
            fetch_timeout_secs: 30,
            user_agent: "Mozilla/5.0 (compatible; storymap/0.1)".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SitemapConfig {
    pub urls: Vec<String>,
    pub batch_size: usize,
    /// Pause between sitemap fetches.
    pub polite_delay_ms: u64,
    /// Pause between pipeline batches.
    pub batch_delay_ms: u64,
}

impl Default for SitemapConfig {
    fn default() -> Self {
        SitemapConfig {
            urls: vec![
                "https://www.publicsource.org/sitemap-1.xml".into(),
                "https://www.publicsource.org/sitemap-2.xml".into(),
                "https://www.publicsource.org/sitemap-3.xml".into(),
                "https://www.publicsource.org/sitemap-4.xml".into(),
                "https://www.publicsource.org/sitemap-5.xml".into(),
            ],
            batch_size: 50,
            polite_delay_ms: 1000,
            batch_delay_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TeaserConfig {
    pub enabled: bool,
    pub model: String,
    pub max_tokens: u32,
}

impl Default for TeaserConfig {
    fn default() -> Self {
        TeaserConfig {
            enabled: false,
            model: "claude-3-5-sonnet-20241022".into(),
            max_tokens: 80,
        }
    }
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub anthropic_api_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/storymap.toml` and
/// (optionally) `config/credentials.toml`, relative to `base_dir`.
///
/// Does not copy defaults; `load_config_in` does.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- storymap.toml (required) ---
    let main_path = config_dir.join("storymap.toml");
    let main_text = read_file(&main_path)?;
    let file: StorymapFile = toml::from_str(&main_text).map_err(|e| ConfigError::ParseError {
        path: main_path.clone(),
        source: e,
    })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        base_dir: base_dir.to_path_buf(),
        server: file.server,
        database: file.database,
        data_paths: file.data_paths,
        classification: file.classification,
        sitemap: file.sitemap,
        teaser: file.teaser,
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

/// Seed `config/` with every shipped default that is not there yet.
/// `.example` templates (credentials) are never copied. Returns the files
/// written; an existing file is never overwritten.
pub fn seed_config_dir(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");
    let seed_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| ConfigError::Seed { path, source }
    };

    if !defaults_dir.is_dir() {
        return if config_dir.is_dir() {
            Ok(Vec::new())
        } else {
            Err(ConfigError::NoConfigDir(base_dir.to_path_buf()))
        };
    }

    std::fs::create_dir_all(&config_dir).map_err(seed_err(&config_dir))?;

    let mut seeded = Vec::new();
    for entry in std::fs::read_dir(&defaults_dir).map_err(seed_err(&defaults_dir))? {
        let shipped = entry.map_err(seed_err(&defaults_dir))?.path();
        let Some(name) = shipped.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !shipped.is_file() || name.ends_with(".example") {
            continue;
        }
        let target = config_dir.join(name);
        if copy_if_missing(&shipped, &target).map_err(seed_err(&target))? {
            seeded.push(target);
        }
    }
    seeded.sort();
    Ok(seeded)
}

/// Copy `from` to `to` unless `to` already exists.
fn copy_if_missing(from: &Path, to: &Path) -> std::io::Result<bool> {
    let mut dest = match std::fs::OpenOptions::new().write(true).create_new(true).open(to) {
        Ok(dest) => dest,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e),
    };
    let mut src = std::fs::File::open(from)?;
    std::io::copy(&mut src, &mut dest)?;
    Ok(true)
}

/// Copy any missing defaults into `base_dir/config`, then load.
pub fn load_config_in(base_dir: &Path) -> Result<Config, ConfigError> {
    for path in seed_config_dir(base_dir)? {
        tracing::info!("seeded {} from defaults", path.display());
    }
    load_config_from(base_dir)
}

/// Load configuration relative to the current working directory.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    load_config_in(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port", "must be greater than 0"));
    }
    if config.server.max_upload_bytes == 0 {
        return Err(invalid("server.max_upload_bytes", "must be greater than 0"));
    }
    if config.database.path.trim().is_empty() {
        return Err(invalid("database.path", "must not be empty"));
    }

    let c = &config.classification;
    let fractions: &[(&str, f64)] = &[
        ("classification.min_confidence", c.min_confidence),
        ("classification.fuzzy_threshold", c.fuzzy_threshold),
    ];
    for (name, val) in fractions {
        if !(0.0..=1.0).contains(val) {
            return Err(invalid(
                name,
                format!("must be between 0.0 and 1.0 inclusive, got {val}"),
            ));
        }
    }

    let counts: &[(&str, usize)] = &[
        ("classification.fetch_concurrency", c.fetch_concurrency),
        ("sitemap.batch_size", config.sitemap.batch_size),
    ];
    for (name, val) in counts {
        if *val == 0 {
            return Err(invalid(name, "must be > 0"));
        }
    }
    if c.fetch_timeout_secs == 0 {
        return Err(invalid("classification.fetch_timeout_secs", "must be > 0"));
    }

    if let Some(url) = config
        .sitemap
        .urls
        .iter()
        .find(|u| !(u.starts_with("http://") || u.starts_with("https://")))
    {
        return Err(invalid("sitemap.urls", format!("not an http(s) URL: {url}")));
    }

    if config.teaser.enabled && config.teaser.model.trim().is_empty() {
        return Err(invalid("teaser.model", "must be set when teaser.enabled = true"));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// The workspace root, located from this crate's manifest directory.
    fn project_root() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .ancestors()
            .find(|dir| dir.join("defaults/storymap.toml").exists())
            .map(Path::to_path_buf)
            .expect("cannot locate defaults/ above the crate directory")
    }

    /// Fresh temp dir with `config/storymap.toml` copied from the defaults.
    fn temp_base(name: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::copy(
            project_root().join("defaults/storymap.toml"),
            tmp.join("config/storymap.toml"),
        )
        .unwrap();
        tmp
    }

    fn rewrite(base: &Path, from: &str, to: &str) {
        let path = base.join("config/storymap.toml");
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains(from), "defaults no longer contain {from:?}");
        fs::write(&path, text.replace(from, to)).unwrap();
    }

    fn expect_validation(base: &Path, field: &str) {
        match load_config_from(base).unwrap_err() {
            ConfigError::ValidationError { field: f, .. } => assert_eq!(f, field),
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn load_valid_config_from_defaults() {
        let tmp = temp_base("storymap_config_defaults");
        let config = load_config_from(&tmp).expect("should load valid config");

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.database.path, "data/storymap.db");
        assert_eq!(config.data_paths.stories_fallback, "data/stories.json");
        assert_eq!(config.data_paths.geography, "data/enhanced_geographic_data.json");
        assert!((config.classification.min_confidence - 0.4).abs() < f64::EPSILON);
        assert!((config.classification.fuzzy_threshold - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.sitemap.urls.len(), 5);
        assert_eq!(config.sitemap.batch_size, 50);
        assert!(!config.teaser.enabled);
        assert!(!config.teaser_enabled());
        assert_eq!(config.db_path(), tmp.join("data/storymap.db"));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn optional_sections_take_defaults() {
        let tmp = std::env::temp_dir().join("storymap_config_minimal");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(
            tmp.join("config/storymap.toml"),
            r#"
[server]
host = "0.0.0.0"
port = 8080

[database]
path = ":memory:"

[data_paths]
stories_fallback = "stories.json"
geography = "geo.json"
"#,
        )
        .unwrap();

        let config = load_config_from(&tmp).expect("should load minimal config");
        assert_eq!(config.server.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.classification.fetch_concurrency, 4);
        assert_eq!(config.sitemap.batch_delay_ms, 5000);
        assert_eq!(config.teaser.max_tokens, 80);
        assert_eq!(config.db_path(), PathBuf::from(":memory:"));
        assert!(config.data_paths.cache_dir.is_empty());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn credentials_enable_teasers() {
        let tmp = temp_base("storymap_config_creds");
        rewrite(&tmp, "enabled = false", "enabled = true");
        assert!(!load_config_from(&tmp).unwrap().teaser_enabled());

        fs::write(
            tmp.join("config/credentials.toml"),
            "anthropic_api_key = \"sk-ant-test-key\"\n",
        )
        .unwrap();
        let config = load_config_from(&tmp).expect("should load with credentials.toml");
        assert_eq!(config.credentials.anthropic_api_key.as_deref(), Some("sk-ant-test-key"));
        assert!(config.teaser_enabled());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let tmp = temp_base("storymap_config_confidence");
        rewrite(&tmp, "min_confidence = 0.4", "min_confidence = 1.5");
        expect_validation(&tmp, "classification.min_confidence");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_batch_size() {
        let tmp = temp_base("storymap_config_batch");
        rewrite(&tmp, "batch_size = 50", "batch_size = 0");
        expect_validation(&tmp, "sitemap.batch_size");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_concurrency() {
        let tmp = temp_base("storymap_config_concurrency");
        rewrite(&tmp, "fetch_concurrency = 4", "fetch_concurrency = 0");
        expect_validation(&tmp, "classification.fetch_concurrency");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn file_not_found_for_missing_storymap_toml() {
        let tmp = std::env::temp_dir().join("storymap_config_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();

        match load_config_from(&tmp).unwrap_err() {
            ConfigError::FileNotFound { path } => assert!(path.ends_with("storymap.toml")),
            other => panic!("expected FileNotFound, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn parse_error_for_invalid_toml() {
        let tmp = std::env::temp_dir().join("storymap_config_invalid");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("config/storymap.toml"), "this is not valid [[[ toml").unwrap();

        match load_config_from(&tmp).unwrap_err() {
            ConfigError::ParseError { path, .. } => assert!(path.ends_with("storymap.toml")),
            other => panic!("expected ParseError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn seed_config_dir_copies_missing_defaults() {
        let tmp = std::env::temp_dir().join("storymap_config_ensure_copies");
        let _ = fs::remove_dir_all(&tmp);
        let defaults_dir = tmp.join("defaults");
        fs::create_dir_all(&defaults_dir).unwrap();
        fs::copy(
            project_root().join("defaults/storymap.toml"),
            defaults_dir.join("storymap.toml"),
        )
        .unwrap();
        fs::write(
            defaults_dir.join("credentials.toml.example"),
            "anthropic_api_key = \"sk-ant-...\"\n",
        )
        .unwrap();

        let copied = seed_config_dir(&tmp).expect("should succeed");
        assert_eq!(copied.len(), 1);
        assert!(tmp.join("config/storymap.toml").exists());
        assert!(!tmp.join("config/credentials.toml.example").exists());

        // Second run leaves the existing file alone.
        fs::write(tmp.join("config/storymap.toml"), "# custom\n").unwrap();
        assert!(seed_config_dir(&tmp).unwrap().is_empty());
        assert_eq!(
            fs::read_to_string(tmp.join("config/storymap.toml")).unwrap(),
            "# custom\n"
        );

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn seed_config_dir_needs_defaults_or_config() {
        let tmp = std::env::temp_dir().join("storymap_config_both_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        match seed_config_dir(&tmp).unwrap_err() {
            ConfigError::NoConfigDir(dir) => assert_eq!(dir, tmp),
            other => panic!("expected NoConfigDir, got: {other}"),
        }

        // An existing config/ without defaults/ is fine.
        fs::create_dir_all(tmp.join("config")).unwrap();
        assert!(seed_config_dir(&tmp).unwrap().is_empty());

        let _ = fs::remove_dir_all(&tmp);
    }
}
