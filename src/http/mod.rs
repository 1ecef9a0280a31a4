//! # Módulo HTTP
//!
//! Este módulo implementa el protocolo HTTP desde cero, sin usar
//! librerías de alto nivel. Incluye:
//!
//! - Lectura y parsing de requests (solo GET, HTTP/1.0 y HTTP/1.1)
//! - El contexto de request que genera la respuesta de forma diferida
//! - Cookies de salida
//! - Códigos de estado
//!
//! ### Formato de Request
//!
//! ```text
//! GET /path?query=value HTTP/1.1\r\n
//! Header-Name: Header-Value\r\n
//! \r\n
//! ```
//!
//! ### Formato de Response
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Content-Type: text/html; charset=UTF-8\r\n
//! Set-Cookie: sid=ABCDEFGHIJKLMNOPQRST; Domain=localhost; Path=/; HttpOnly\r\n
//! \r\n
//! <html>...
//! ```
//!
//! No hay conexiones persistentes: cada respuesta termina cerrando el socket.

pub mod context;   // Contexto de request y respuesta diferida
pub mod cookie;    // Cookies de salida
pub mod request;   // Lectura y parsing de requests
pub mod status;    // Códigos de estado HTTP

// Re-exportamos los tipos principales para facilitar su uso
pub use context::{Encoding, RequestContext};
pub use cookie::Cookie;
pub use request::{ParseError, Request};
pub use status::StatusCode;
