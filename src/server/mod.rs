//! # Módulo del Servidor HTTP
//! src/server/mod.rs
//!
//! Este módulo implementa el servidor TCP que:
//! 1. Escucha en un puerto (`tcp`)
//! 2. Reparte las conexiones en un pool de tamaño fijo (`pool`)
//! 3. Atiende cada conexión: parseo, sesión, routing y respuesta (`client`)

pub mod client;
pub mod pool;
pub mod tcp;

// Re-exportar para facilitar el uso
pub use client::{ClientWorker, ServerState};
pub use pool::ThreadPool;
pub use tcp::{Server, ServerHandle};
