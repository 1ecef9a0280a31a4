//! # Sesiones
//!
//! Cada cliente recibe un id opaco de 20 letras en la cookie `sid`. El
//! servidor guarda por sesión el host dueño, el vencimiento y un mapa
//! clave/valor que los workers ven como parámetros persistentes.
//!
//! - `store`: el mapa compartido y la resolución de sesiones por request
//! - `sweeper`: el thread que borra las sesiones vencidas

pub mod store;
pub mod sweeper;

pub use store::{Session, SessionData, SessionStore, SESSION_COOKIE};
pub use sweeper::SessionSweeper;
