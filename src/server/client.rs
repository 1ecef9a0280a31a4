//! # Conexión de un Cliente
//! src/server/client.rs
//!
//! `ClientWorker` atiende una conexión de principio a fin dentro de un
//! thread del pool: lee el request, resuelve la sesión, decide la ruta y
//! la ejecuta. Tiene dos puntos de entrada que comparten el mismo
//! `RequestContext`:
//!
//! - [`ClientWorker::run`]: request externo recién aceptado
//! - [`Dispatcher::dispatch_request`]: re-dispatch interno (workers)
//!
//! El socket se cierra cuando se suelta el `ClientWorker`, pase lo que pase.

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::http::request::read_request_lines;
use crate::http::{ParseError, Request, RequestContext, StatusCode};
use crate::router::{Dispatcher, RouteDecision, Router};
use crate::script::ScriptEngine;
use crate::session::{SessionData, SessionStore};
use crate::workers::WorkerRegistry;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::net::TcpStream;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Tamaño de los bloques en que se manda un archivo estático
const FILE_CHUNK_SIZE: usize = 1024;

/// Estado compartido por todas las conexiones (solo lectura salvo sesiones)
pub struct ServerState {
    pub config: Arc<ServerConfig>,
    pub router: Router,
    pub registry: WorkerRegistry,
    pub sessions: Arc<SessionStore>,
    pub script_engine: Option<Arc<dyn ScriptEngine>>,
}

/// Manejador de una conexión
pub struct ClientWorker {
    stream: TcpStream,
    state: Arc<ServerState>,
}

impl ClientWorker {
    pub fn new(stream: TcpStream, state: Arc<ServerState>) -> Self {
        Self { stream, state }
    }

    /// Atiende la conexión y la cierra
    ///
    /// Los errores de I/O (cliente que se desconecta) se registran y se
    /// descartan acá: nunca llegan al pool.
    pub fn run(self) {
        let start = Instant::now();
        let peer = self
            .stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        match self.handle() {
            Ok(()) => log::debug!("{} served in {:.2}ms", peer, start.elapsed().as_secs_f64() * 1000.0),
            Err(ServerError::Io(e)) => log::debug!("{} I/O error: {}", peer, e),
            Err(e) => log::warn!("{} request failed: {}", peer, e),
        }
    }

    fn handle(&self) -> Result<(), ServerError> {
        let reader = BufReader::new(self.stream.try_clone()?);

        let lines = match read_request_lines(reader) {
            Ok(Some(lines)) => lines,
            Ok(None) => return Ok(()),
            Err(ParseError::Io(e)) => return Err(e.into()),
            Err(e) => return self.reject(&e),
        };

        let request = match Request::from_lines(&lines) {
            Ok(request) => request,
            Err(e) => return self.reject(&e),
        };
        log::debug!("GET {}", request.path());

        let host = request.host_or(&self.state.config.domain_name).to_string();
        let cookie_headers = request.headers_named("Cookie");
        let (session, cookie) = self.state.sessions.resolve_session(&cookie_headers, &host);

        let mut output = &self.stream;
        let mut ctx = RequestContext::new(
            &mut output,
            request.query_params().clone(),
            session.data.clone(),
            cookie.into_iter().collect(),
        );

        match self.dispatch(request.path(), &mut ctx, true) {
            Ok(()) => {}
            Err(ServerError::Io(e)) => return Err(ServerError::Io(e)),
            Err(e @ ServerError::UnknownWorker(_)) => {
                log::warn!("Dispatch error for {}: {}", request.path(), e);
                respond_error(&mut ctx, StatusCode::NotFound)?;
            }
            Err(e) => {
                log::warn!("Error handling {}: {}", request.path(), e);
                respond_error(&mut ctx, StatusCode::InternalServerError)?;
            }
        }

        ctx.finish()
    }

    /// Responde a un request que no pasó el parser
    fn reject(&self, error: &ParseError) -> Result<(), ServerError> {
        log::debug!("Rejecting request: {}", error);
        let mut output = &self.stream;
        let mut ctx = RequestContext::new(&mut output, HashMap::new(), SessionData::default(), Vec::new());
        respond_error(&mut ctx, error.status())?;
        ctx.finish()
    }

    /// Decide y ejecuta la ruta de `path`
    fn dispatch(&self, path: &str, ctx: &mut RequestContext<'_>, direct: bool) -> Result<(), ServerError> {
        match self.state.router.decide(path, direct) {
            RouteDecision::Blocked | RouteDecision::NotFound => respond_error(ctx, StatusCode::NotFound),
            RouteDecision::Forbidden => respond_error(ctx, StatusCode::Forbidden),
            RouteDecision::ExtensionWorker(name) | RouteDecision::NamedWorker(name) => {
                let worker = self.state.registry.resolve(&name)?;
                worker.process_request(ctx, self)
            }
            RouteDecision::Script(file) => self.run_script(&file, ctx),
            RouteDecision::StaticFile(file) => self.serve_file(&file, ctx),
        }
    }

    /// Ejecuta un script; cualquier fallo se responde con 404
    fn run_script(&self, file: &Path, ctx: &mut RequestContext<'_>) -> Result<(), ServerError> {
        let Some(ref engine) = self.state.script_engine else {
            log::warn!("No script engine configured for {}", file.display());
            return respond_error(ctx, StatusCode::NotFound);
        };

        let source = match fs::read_to_string(file) {
            Ok(source) => source,
            Err(e) => {
                log::warn!("Cannot read script {}: {}", file.display(), e);
                return respond_error(ctx, StatusCode::NotFound);
            }
        };

        match engine.execute(&source, ctx) {
            Ok(()) => Ok(()),
            Err(e) => {
                log::warn!("Script {} failed: {}", file.display(), e);
                respond_error(ctx, StatusCode::NotFound)
            }
        }
    }

    /// Manda un archivo en bloques de 1 KiB
    fn serve_file(&self, file: &Path, ctx: &mut RequestContext<'_>) -> Result<(), ServerError> {
        let mut source = match File::open(file) {
            Ok(source) => source,
            Err(e) => {
                log::debug!("Cannot open {}: {}", file.display(), e);
                return respond_error(ctx, StatusCode::NotFound);
            }
        };

        if !ctx.is_header_generated() {
            ctx.set_mime_type(self.state.router.mime_type(file))?;
            ctx.set_content_length(source.metadata()?.len())?;
        }

        let mut buffer = [0u8; FILE_CHUNK_SIZE];
        loop {
            let read = source.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            ctx.write(&buffer[..read])?;
        }
        Ok(())
    }
}

impl Dispatcher for ClientWorker {
    fn dispatch_request(&self, path: &str, ctx: &mut RequestContext<'_>) -> Result<(), ServerError> {
        self.dispatch(path, ctx, false)
    }
}

/// Responde con un error y un body JSON `{"error": "..."}`
///
/// Si el header ya se mandó no hay nada que hacer: solo se registra.
fn respond_error(ctx: &mut RequestContext<'_>, status: StatusCode) -> Result<(), ServerError> {
    if ctx.is_header_generated() {
        log::debug!("Cannot send {}: header already sent", status);
        return Ok(());
    }

    let body = serde_json::json!({ "error": status.reason_phrase() }).to_string();
    ctx.set_status(status)?;
    ctx.set_mime_type("application/json")?;
    ctx.set_content_length(body.len() as u64)?;
    ctx.write_str(&body)
}
