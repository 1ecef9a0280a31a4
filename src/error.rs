//! # Errores del Servidor
//! src/error.rs
//!
//! Errores que pueden ocurrir mientras se atiende un request, después de
//! haberlo parseado: violaciones del contrato del `RequestContext`,
//! workers que no existen, fallos del motor de scripts y errores de I/O.

use crate::script::ScriptError;

/// Error general del manejo de un request
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Se intentó modificar status/headers/cookies después del primer write
    #[error("header already sent")]
    HeaderAlreadySent,

    /// Valor de header con CR o LF
    #[error("invalid header value: {0:?}")]
    InvalidHeaderValue(String),

    /// Nombre de encoding no soportado por el contexto
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// `/ext/<Nombre>` o un worker configurado que no está registrado
    #[error("unknown worker: {0}")]
    UnknownWorker(String),

    /// Fallo al parsear o ejecutar un script
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// Error de I/O (el cliente cerró la conexión, disco, etc.)
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
