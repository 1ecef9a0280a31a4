//! # Almacén de Sesiones
//! src/session/store.rs
//!
//! Mapa compartido `sid → Session` protegido con un `RwLock`. Los workers
//! del pool lo leen y escriben en cada request y el sweeper lo recorre
//! periódicamente para borrar las sesiones vencidas.

use crate::http::Cookie;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Nombre de la cookie que lleva el id de sesión
pub const SESSION_COOKIE: &str = "sid";

/// Largo del id de sesión (letras A-Z)
pub const SESSION_ID_LEN: usize = 20;

/// Datos clave/valor de una sesión, compartidos con el `RequestContext`
pub type SessionData = Arc<Mutex<HashMap<String, String>>>;

/// Registro de una sesión
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub host: String,
    pub expires_at: Instant,
    pub data: SessionData,
}

impl Session {
    pub fn new(id: &str, host: &str, expires_at: Instant) -> Self {
        Self {
            id: id.to_string(),
            host: host.to_string(),
            expires_at,
            data: SessionData::default(),
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Almacén de sesiones thread-safe
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    timeout: Duration,
}

impl SessionStore {
    /// Crea un almacén vacío; `timeout` es la vida de una sesión sin uso
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Devuelve la sesión del request, creando una si hace falta
    ///
    /// Si se creó una sesión nueva también retorna la cookie `sid` que hay
    /// que mandarle al cliente.
    pub fn resolve_session(&self, cookie_headers: &[&str], host: &str) -> (Session, Option<Cookie>) {
        let now = Instant::now();
        let candidate = extract_session_id(cookie_headers);

        if let Some(ref sid) = candidate {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(session) = sessions.get_mut(sid) {
                if session.host == host && !session.is_expired(now) {
                    session.expires_at = now + self.timeout;
                    return (session.clone(), None);
                }
                log::debug!("Discarding session {} (expired or host mismatch)", sid);
                sessions.remove(sid);
            }
        }

        let session = self.create_session(host, now);
        let cookie = Cookie::new(SESSION_COOKIE, &session.id)
            .with_domain(host)
            .with_path("/")
            .http_only();
        (session, Some(cookie))
    }

    fn create_session(&self, host: &str, now: Instant) -> Session {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);

        let mut id = generate_session_id();
        while sessions.contains_key(&id) {
            id = generate_session_id();
        }

        let session = Session::new(&id, host, now + self.timeout);
        sessions.insert(id, session.clone());
        log::debug!("Created session {} for host {}", session.id, host);
        session
    }

    /// Borra todas las sesiones vencidas; retorna cuántas se borraron
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        before - sessions.len()
    }

    pub fn get(&self, id: &str) -> Option<Session> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.get(id).cloned()
    }

    pub fn insert(&self, session: Session) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.insert(session.id.clone(), session);
    }

    pub fn remove(&self, id: &str) -> Option<Session> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(id)
    }

    pub fn len(&self) -> usize {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Busca `sid=<id>` en los headers Cookie
///
/// Cada header se separa por ';' y luego por '='. Se toma la última
/// aparición y se le quitan las comillas.
pub fn extract_session_id(cookie_headers: &[&str]) -> Option<String> {
    cookie_headers
        .iter()
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            (name.trim() == SESSION_COOKIE).then(|| value.trim().trim_matches('"').to_string())
        })
        .filter(|sid| !sid.is_empty())
        .last()
}

/// Genera un id de 20 letras mayúsculas
fn generate_session_id() -> String {
    let mut rng = rand::thread_rng();
    (0..SESSION_ID_LEN)
        .map(|_| rng.gen_range(b'A'..=b'Z') as char)
        .collect()
}
