use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Which backend holds processed-file records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Database,
}

impl StoreBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "memory" | "mem" => Some(Self::Memory),
            "database" | "db" => Some(Self::Database),
            _ => None,
        }
    }
}

/// Configuration for processed-file lifecycle and uploads
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Time-to-live of a registered artifact (default: 15 minutes)
    pub artifact_ttl: Duration,

    /// Delay between a completed download and physical deletion (default: 5 seconds)
    pub download_grace: Duration,

    /// Interval of the background sweep (default: 60 seconds)
    pub sweep_interval: Duration,

    /// Directory holding artifact bytes; uploads live in `<temp_dir>/uploads`
    pub temp_dir: PathBuf,

    /// Maximum upload size in bytes (default: 25 MB)
    pub max_file_size: usize,

    /// Maximum files accepted by a single upload request (default: 10)
    pub max_files_per_upload: usize,

    /// Lowercase extensions accepted by the upload endpoint, without the dot
    pub allowed_extensions: Vec<String>,

    pub store_backend: StoreBackend,
    pub database_url: Option<String>,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            artifact_ttl: Duration::from_secs(15 * 60),
            download_grace: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(60),
            temp_dir: PathBuf::from("temp"),
            max_file_size: 25 * 1024 * 1024, // 25 MB
            max_files_per_upload: 10,
            allowed_extensions: ["pdf", "png", "jpg", "jpeg", "doc", "docx", "xls", "xlsx", "csv"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            store_backend: StoreBackend::Memory,
            database_url: None,
            allowed_origins: vec![
                "http://localhost:5000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:5000".to_string(),
            ],
        }
    }
}

impl LifecycleConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, falling back to defaults
    /// for keys that are missing or unparsable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();
        let secs = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
        };
        let number = |key: &str| lookup(key).and_then(|v| v.trim().parse::<usize>().ok());

        Self {
            // A zero TTL would let an artifact expire at its own creation instant
            artifact_ttl: secs("ARTIFACT_TTL_SECS")
                .filter(|d| !d.is_zero())
                .unwrap_or(default.artifact_ttl),

            download_grace: secs("DOWNLOAD_GRACE_SECS").unwrap_or(default.download_grace),

            sweep_interval: secs("SWEEP_INTERVAL_SECS")
                .filter(|d| !d.is_zero())
                .unwrap_or(default.sweep_interval),

            temp_dir: lookup("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.temp_dir),

            max_file_size: number("MAX_FILE_SIZE").unwrap_or(default.max_file_size),

            max_files_per_upload: number("MAX_FILES_PER_UPLOAD")
                .unwrap_or(default.max_files_per_upload),

            allowed_extensions: lookup("ALLOWED_EXTENSIONS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(default.allowed_extensions),

            store_backend: lookup("STORE_BACKEND")
                .and_then(|v| StoreBackend::parse(&v))
                .unwrap_or(default.store_backend),

            database_url: lookup("DATABASE_URL"),

            allowed_origins: lookup("ALLOWED_ORIGINS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Short timings for local runs and tests
    pub fn development() -> Self {
        Self {
            artifact_ttl: Duration::from_secs(60),
            download_grace: Duration::from_millis(200),
            sweep_interval: Duration::from_secs(5),
            ..Self::default()
        }
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.temp_dir.join("uploads")
    }

    pub fn is_extension_allowed(&self, filename: &str) -> bool {
        std::path::Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let e = e.to_lowercase();
                self.allowed_extensions.iter().any(|a| *a == e)
            })
            .unwrap_or(false)
    }
}
