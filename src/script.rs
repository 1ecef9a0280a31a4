//! # Motor de Scripts
//! src/script.rs
//!
//! El lenguaje de scripts (`.smscr`) no vive en este crate. El servidor
//! solo define la frontera: un motor recibe el texto del script y el
//! `RequestContext` del request, lee parámetros y escribe la salida.
//!
//! ```text
//! Router → Script(path) → fs::read_to_string → ScriptEngine::execute(src, ctx)
//! ```

use crate::http::RequestContext;

/// Errores reportados por un motor de scripts
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// El script no se pudo parsear
    #[error("script parse error: {0}")]
    Parse(String),

    /// El script falló durante la ejecución
    #[error("script execution error: {0}")]
    Execution(String),
}

/// Motor externo que ejecuta scripts contra un contexto de request
pub trait ScriptEngine: Send + Sync {
    /// Parsea y ejecuta `source`, escribiendo su salida en `ctx`
    fn execute(&self, source: &str, ctx: &mut RequestContext<'_>) -> Result<(), ScriptError>;
}
