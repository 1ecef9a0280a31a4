//! # Workers
//!
//! Un worker es un handler enchufable identificado por un nombre. Se llega
//! a él de dos formas:
//!
//! - `/ext/<Nombre>`: el nombre sale directo de la URL
//! - un path de la tabla `server.workers` (ej: `/hello` → `HelloWorker`)
//!
//! En ambos casos el nombre se busca en un [`WorkerRegistry`] armado al
//! arrancar; no hay carga dinámica de código.
//!
//! ## Categorías de workers
//!
//! - **basic**: los workers de ejemplo que trae el servidor

pub mod basic;

use crate::error::ServerError;
use crate::http::RequestContext;
use crate::router::Dispatcher;
use std::collections::HashMap;
use std::sync::Arc;

/// Handler de un request
///
/// Recibe el contexto del request y el dispatcher de la conexión, para
/// poder delegar en otro path (por ejemplo un script en `/private`).
pub trait Worker: Send + Sync {
    fn process_request(
        &self,
        ctx: &mut RequestContext<'_>,
        dispatcher: &dyn Dispatcher,
    ) -> Result<(), ServerError>;
}

/// Registro nombre → worker
#[derive(Clone, Default)]
pub struct WorkerRegistry {
    workers: HashMap<String, Arc<dyn Worker>>,
}

impl WorkerRegistry {
    /// Crea un registro vacío
    pub fn new() -> Self {
        Self::default()
    }

    /// Crea un registro con todos los workers de `basic`
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("EchoParams", basic::EchoParams);
        registry.register("HelloWorker", basic::HelloWorker);
        registry.register("SumWorker", basic::SumWorker);
        registry.register("BgColorWorker", basic::BgColorWorker);
        registry.register("Home", basic::Home);
        registry.register("SessionInfo", basic::SessionInfo);
        registry
    }

    /// Registra un worker; un nombre repetido reemplaza al anterior
    ///
    /// # Ejemplo
    /// ```
    /// use smart_http_server::workers::{WorkerRegistry, basic::HelloWorker};
    ///
    /// let mut registry = WorkerRegistry::new();
    /// registry.register("Hello", HelloWorker);
    /// assert!(registry.get("Hello").is_some());
    /// ```
    pub fn register<W: Worker + 'static>(&mut self, name: &str, worker: W) {
        self.workers.insert(name.to_string(), Arc::new(worker));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Worker>> {
        self.workers.get(name).cloned()
    }

    /// Como `get`, pero un nombre desconocido es un error de resolución
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Worker>, ServerError> {
        self.get(name)
            .ok_or_else(|| ServerError::UnknownWorker(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}
