//! # Sistema de Routing
//! src/router/mod.rs
//!
//! Este módulo decide qué hacer con el path de un request. La decisión se
//! toma una sola vez por path y las reglas se evalúan en orden:
//!
//! ```text
//! 1. /private/...           (solo requests directos) → Blocked (404)
//! 2. /ext/<Nombre>                                   → ExtensionWorker
//! 3. path en server.workers                          → NamedWorker
//! 4. fuera del document root                         → Forbidden (403)
//! 5. no es un archivo legible                        → NotFound (404)
//! 6. extensión .smscr                                → Script
//! 7. cualquier otro archivo                          → StaticFile
//! ```
//!
//! La ejecución de la decisión vive en `server::client`.

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::http::RequestContext;
use regex::Regex;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Extensión de los archivos que ejecuta el motor de scripts
pub const SCRIPT_EXTENSION: &str = "smscr";

/// Tipo MIME cuando la extensión no está en la tabla
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Prefijo de los paths que un cliente no puede pedir directamente
pub const PRIVATE_PREFIX: &str = "/private";

/// Re-entrada al dispatch para un path interno
///
/// Lo usan workers y scripts para delegar en otro path reutilizando el
/// mismo `RequestContext`. Los paths internos pueden estar en `/private`.
pub trait Dispatcher {
    fn dispatch_request(&self, path: &str, ctx: &mut RequestContext<'_>) -> Result<(), ServerError>;
}

/// Resultado del routing de un path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Path privado pedido por un cliente
    Blocked,
    /// `/ext/<Nombre>`
    ExtensionWorker(String),
    /// Path registrado en la tabla de workers (guarda el nombre del worker)
    NamedWorker(String),
    /// El path se escapa del document root
    Forbidden,
    /// No existe o no es un archivo regular legible
    NotFound,
    /// Archivo a ejecutar con el motor de scripts
    Script(PathBuf),
    /// Archivo a mandar tal cual
    StaticFile(PathBuf),
}

/// Router que mapea paths a decisiones
pub struct Router {
    document_root: PathBuf,
    workers: std::collections::HashMap<String, String>,
    mime_types: std::collections::HashMap<String, String>,
    ext_pattern: Regex,
}

impl Router {
    /// Crea el router a partir de la configuración
    ///
    /// `config.document_root` debe ser absoluto.
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            document_root: config.document_root.clone(),
            workers: config.workers.clone(),
            mime_types: config.mime_types.clone(),
            ext_pattern: Regex::new(r"^/ext/([A-Za-z_][A-Za-z0-9_]*)$").expect("valid /ext/ pattern"),
        }
    }

    /// Decide qué hacer con un path
    ///
    /// `direct` es `true` para requests de clientes y `false` para
    /// re-dispatch interno.
    pub fn decide(&self, path: &str, direct: bool) -> RouteDecision {
        if direct && path.starts_with(PRIVATE_PREFIX) {
            return RouteDecision::Blocked;
        }

        if let Some(captures) = self.ext_pattern.captures(path) {
            return RouteDecision::ExtensionWorker(captures[1].to_string());
        }

        if let Some(name) = self.workers.get(path) {
            return RouteDecision::NamedWorker(name.clone());
        }

        let Some(resolved) = self.resolve_path(path) else {
            return RouteDecision::Forbidden;
        };

        let is_readable_file = fs::metadata(&resolved)
            .map(|meta| meta.is_file())
            .unwrap_or(false);
        if !is_readable_file {
            return RouteDecision::NotFound;
        }

        // Un symlink dentro del root no puede apuntar afuera
        match fs::canonicalize(&resolved) {
            Ok(real) if real.starts_with(&self.document_root) => {}
            Ok(_) => return RouteDecision::Forbidden,
            Err(_) => return RouteDecision::NotFound,
        }

        if extension_of(&resolved).as_deref() == Some(SCRIPT_EXTENSION) {
            RouteDecision::Script(resolved)
        } else {
            RouteDecision::StaticFile(resolved)
        }
    }

    /// Une el path al document root resolviendo `.` y `..` sin tocar el disco
    ///
    /// Retorna `None` si el resultado queda fuera del document root.
    pub fn resolve_path(&self, url_path: &str) -> Option<PathBuf> {
        let mut resolved = self.document_root.clone();

        for component in Path::new(url_path.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::ParentDir => {
                    if !resolved.pop() {
                        return None;
                    }
                }
                Component::CurDir => {}
                // Raíces o prefijos (C:\) no pueden venir de una URL válida
                Component::RootDir | Component::Prefix(_) => return None,
            }
        }

        resolved.starts_with(&self.document_root).then_some(resolved)
    }

    /// Tipo MIME según la extensión del archivo
    pub fn mime_type(&self, path: &Path) -> &str {
        extension_of(path)
            .and_then(|ext| self.mime_types.get(&ext))
            .map(|mime| mime.as_str())
            .unwrap_or(DEFAULT_MIME_TYPE)
    }
}

/// Extensión en minúsculas, sin el punto
fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        fs::create_dir_all(root.join("private/pages")).unwrap();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("index.html"), "<h1>hi</h1>").unwrap();
        fs::write(root.join("data.bin"), [0u8, 1, 2]).unwrap();
        fs::write(root.join("page.smscr"), "{$= \"x\" $}").unwrap();
        fs::write(root.join("private/pages/calc.smscr"), "calc").unwrap();

        let mut config = ServerConfig {
            document_root: root,
            ..ServerConfig::default()
        };
        config.workers.insert("/hello".to_string(), "HelloWorker".to_string());

        (dir, Router::new(&config))
    }

    #[test]
    fn test_private_blocked_only_for_direct_requests() {
        let (_dir, router) = setup();
        assert_eq!(router.decide("/private/pages/calc.smscr", true), RouteDecision::Blocked);
        assert!(matches!(
            router.decide("/private/pages/calc.smscr", false),
            RouteDecision::Script(_)
        ));
    }

    #[test]
    fn test_extension_worker() {
        let (_dir, router) = setup();
        assert_eq!(
            router.decide("/ext/EchoParams", true),
            RouteDecision::ExtensionWorker("EchoParams".to_string())
        );
        // Identificadores inválidos no matchean el patrón
        assert_eq!(router.decide("/ext/Echo.Params", true), RouteDecision::NotFound);
        assert_eq!(router.decide("/ext/a/b", true), RouteDecision::NotFound);
    }

    #[test]
    fn test_named_worker() {
        let (_dir, router) = setup();
        assert_eq!(
            router.decide("/hello", true),
            RouteDecision::NamedWorker("HelloWorker".to_string())
        );
    }

    #[test]
    fn test_traversal_is_forbidden() {
        let (_dir, router) = setup();
        assert_eq!(router.decide("/../../etc/passwd", true), RouteDecision::Forbidden);
        assert_eq!(router.decide("/sub/../../x", true), RouteDecision::Forbidden);
        assert!(router.resolve_path("/../x").is_none());
    }

    #[test]
    fn test_dot_segments_inside_root_are_allowed() {
        let (_dir, router) = setup();
        assert!(matches!(router.decide("/sub/../index.html", true), RouteDecision::StaticFile(_)));
        assert!(matches!(router.decide("/./index.html", true), RouteDecision::StaticFile(_)));
    }

    #[test]
    fn test_missing_and_directories_not_found() {
        let (_dir, router) = setup();
        assert_eq!(router.decide("/nope.html", true), RouteDecision::NotFound);
        assert_eq!(router.decide("/sub", true), RouteDecision::NotFound);
        assert_eq!(router.decide("/", true), RouteDecision::NotFound);
    }

    #[test]
    fn test_script_and_static() {
        let (_dir, router) = setup();
        assert!(matches!(router.decide("/page.smscr", true), RouteDecision::Script(_)));
        match router.decide("/index.html", true) {
            RouteDecision::StaticFile(path) => assert!(path.ends_with("index.html")),
            other => panic!("unexpected decision {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_is_forbidden() {
        let (dir, router) = setup();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), "secret").unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), dir.path().join("link.txt")).unwrap();

        assert_eq!(router.decide("/link.txt", true), RouteDecision::Forbidden);
    }

    #[test]
    fn test_mime_types() {
        let (_dir, router) = setup();
        assert_eq!(router.mime_type(Path::new("/a/index.HTML")), "text/html");
        assert_eq!(router.mime_type(Path::new("/a/data.bin")), DEFAULT_MIME_TYPE);
        assert_eq!(router.mime_type(Path::new("/a/noext")), DEFAULT_MIME_TYPE);
    }
}
