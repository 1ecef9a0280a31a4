//! # Configuración del Servidor
//! src/config.rs
//!
//! La configuración se lee una sola vez al arrancar y después es inmutable.
//! Viene de tres archivos TOML más algunos overrides por CLI/entorno.
//!
//! ## Archivo principal
//!
//! ```toml
//! server.address = "127.0.0.1"
//! server.domainName = "localhost"
//! server.port = 5721
//! server.workerThreads = 10
//! server.documentRoot = "../webroot"
//! server.mimeConfig = "mime.toml"
//! server.workers = "workers.toml"
//! session.timeout = 600
//! ```
//!
//! `server.mimeConfig` apunta a una tabla extensión → tipo MIME y
//! `server.workers` a una tabla path → nombre de worker. Las rutas
//! relativas se resuelven contra el directorio del archivo principal.
//!
//! ## Ejemplos de uso
//!
//! ```bash
//! ./smart_http_server --config config/server.toml --port 8080
//! HTTP_PORT=8080 WORKER_THREADS=4 ./smart_http_server
//! ```

use crate::workers::WorkerRegistry;
use clap::Parser;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errores al cargar la configuración (fatales al arrancar)
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Argumentos de línea de comandos
#[derive(Debug, Clone, Parser)]
#[command(name = "smart_http_server")]
#[command(about = "Servidor HTTP/1.1 con sesiones, workers y scripts")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// Archivo de configuración principal
    #[arg(short, long, default_value = "./config/server.toml", env = "SMART_HTTP_CONFIG")]
    pub config: PathBuf,

    /// Sobrescribe server.port
    #[arg(short, long, env = "HTTP_PORT")]
    pub port: Option<u16>,

    /// Sobrescribe server.workerThreads
    #[arg(long, env = "WORKER_THREADS")]
    pub workers: Option<usize>,

    /// Sobrescribe server.documentRoot
    #[arg(long = "document-root", env = "DOCUMENT_ROOT")]
    pub document_root: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    server: RawServer,
    session: RawSession,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawServer {
    address: String,
    domain_name: String,
    port: u16,
    worker_threads: usize,
    document_root: PathBuf,
    mime_config: PathBuf,
    workers: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSession {
    timeout: u64,
    #[serde(default = "default_sweep_interval")]
    sweep_interval: u64,
}

fn default_sweep_interval() -> u64 {
    300
}

/// Configuración del servidor
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// IP en la que escucha
    pub address: String,

    /// Dominio por defecto cuando el request no trae Host
    pub domain_name: String,

    /// Puerto (0 = lo elige el sistema operativo)
    pub port: u16,

    /// Tamaño del pool de threads que atienden conexiones
    pub worker_threads: usize,

    /// Vida de una sesión sin uso
    pub session_timeout: Duration,

    /// Cada cuánto se borran las sesiones vencidas
    pub sweep_interval: Duration,

    /// Directorio raíz de los archivos servidos (absoluto)
    pub document_root: PathBuf,

    /// Extensión → tipo MIME
    pub mime_types: HashMap<String, String>,

    /// Path → nombre del worker registrado
    pub workers: HashMap<String, String>,
}

impl ServerConfig {
    /// Carga la configuración indicada por la CLI y aplica sus overrides
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = Self::load(&cli.config)?;

        if let Some(port) = cli.port {
            config.port = port;
        }
        if let Some(workers) = cli.workers {
            config.worker_threads = workers;
        }
        if let Some(ref root) = cli.document_root {
            config.document_root = root.clone();
        }

        config.canonicalize_document_root()?;
        Ok(config)
    }

    /// Carga el archivo principal y las tablas auxiliares
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let raw: RawConfig = read_toml(path)?;

        let mime_types: HashMap<String, String> = read_toml(&base.join(&raw.server.mime_config))?;
        let workers: HashMap<String, String> = read_toml(&base.join(&raw.server.workers))?;

        Ok(Self {
            address: raw.server.address,
            domain_name: raw.server.domain_name,
            port: raw.server.port,
            worker_threads: raw.server.worker_threads,
            session_timeout: Duration::from_secs(raw.session.timeout),
            sweep_interval: Duration::from_secs(raw.session.sweep_interval),
            document_root: base.join(raw.server.document_root),
            mime_types: mime_types
                .into_iter()
                .map(|(ext, mime)| (ext.to_ascii_lowercase(), mime))
                .collect(),
            workers,
        })
    }

    /// Convierte el document root en una ruta absoluta sin `..` ni symlinks
    pub fn canonicalize_document_root(&mut self) -> Result<(), ConfigError> {
        self.document_root = fs::canonicalize(&self.document_root).map_err(|source| ConfigError::Io {
            path: self.document_root.clone(),
            source,
        })?;
        Ok(())
    }

    /// Obtiene la dirección completa para bind (address:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use smart_http_server::config::ServerConfig;
    ///
    /// let config = ServerConfig::default();
    /// assert_eq!(config.bind_address(), "127.0.0.1:5721");
    /// ```
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Valida la configuración contra los workers disponibles
    pub fn validate(&self, registry: &WorkerRegistry) -> Result<(), ConfigError> {
        if self.worker_threads == 0 {
            return Err(ConfigError::Invalid("server.workerThreads must be >= 1".to_string()));
        }
        if self.session_timeout.is_zero() {
            return Err(ConfigError::Invalid("session.timeout must be > 0".to_string()));
        }
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::Invalid("session.sweepInterval must be > 0".to_string()));
        }
        if !self.document_root.is_dir() {
            return Err(ConfigError::Invalid(format!(
                "server.documentRoot is not a directory: {}",
                self.document_root.display()
            )));
        }
        for (path, name) in &self.workers {
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid(format!("worker path must start with '/': {}", path)));
            }
            if registry.get(name).is_none() {
                return Err(ConfigError::Invalid(format!("unknown worker '{}' for path {}", name, path)));
            }
        }
        Ok(())
    }

    /// Registra un resumen de la configuración
    pub fn log_summary(&self) {
        log::info!("Configuration:");
        log::info!("   Address:       {}", self.bind_address());
        log::info!("   Domain:        {}", self.domain_name);
        log::info!("   Workers:       {} threads", self.worker_threads);
        log::info!("   Document root: {}", self.document_root.display());
        log::info!(
            "   Sessions:      timeout {}s, sweep every {}s",
            self.session_timeout.as_secs(),
            self.sweep_interval.as_secs()
        );
        log::info!("   MIME types:    {}", self.mime_types.len());
        log::info!("   Named workers: {}", self.workers.len());
    }
}

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Toml {
        path: path.to_path_buf(),
        source,
    })
}

impl Default for ServerConfig {
    /// Configuración por defecto
    fn default() -> Self {
        let mime_types = [
            ("html", "text/html"),
            ("htm", "text/html"),
            ("txt", "text/plain"),
            ("css", "text/css"),
            ("js", "application/javascript"),
            ("gif", "image/gif"),
            ("png", "image/png"),
            ("jpg", "image/jpeg"),
        ]
        .into_iter()
        .map(|(ext, mime)| (ext.to_string(), mime.to_string()))
        .collect();

        Self {
            address: "127.0.0.1".to_string(),
            domain_name: "localhost".to_string(),
            port: 5721,
            worker_threads: 10,
            session_timeout: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(300),
            document_root: PathBuf::from("./webroot"),
            mime_types,
            workers: HashMap::new(),
        }
    }
}
