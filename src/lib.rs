//! # Smart HTTP Server
//! src/lib.rs
//!
//! Servidor HTTP/1.0 y HTTP/1.1 (solo GET) implementado desde cero sobre
//! `std::net`: un thread de accept, un pool de workers de tamaño fijo y
//! sesiones por cookie con limpieza periódica.
//!
//! ## Arquitectura
//!
//! El servidor está dividido en módulos especializados:
//! - `http`: parser de requests, cookies, códigos de estado y `RequestContext`
//! - `session`: store de sesiones (`sid`) y el thread que las expira
//! - `router`: decide qué hacer con cada path
//! - `workers`: handlers enchufables por nombre (`/ext/<Nombre>`)
//! - `script`: interfaz del motor que ejecuta archivos `.smscr`
//! - `server`: listener, pool de threads y manejo de conexiones
//! - `config`: CLI y archivos TOML
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use smart_http_server::config::ServerConfig;
//! use smart_http_server::server::Server;
//! use smart_http_server::workers::WorkerRegistry;
//!
//! let config = ServerConfig::load("config/server.toml".as_ref()).unwrap();
//! let server = Server::new(config, WorkerRegistry::with_defaults()).unwrap();
//! server.run().expect("Error al iniciar servidor");
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod router;
pub mod script;
pub mod server;
pub mod session;
pub mod workers;
