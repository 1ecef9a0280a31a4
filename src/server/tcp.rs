//! # Servidor TCP Concurrente
//! src/server/tcp.rs
//!
//! El thread de accept espera conexiones con un listener no bloqueante que
//! se revisa cada `ACCEPT_POLL`, así puede notar un pedido de parada sin
//! que llegue otra conexión. Cada conexión aceptada se entrega al
//! [`ThreadPool`]; si todos los workers están ocupados queda en la cola.
//!
//! ```text
//! accept thread ──> ThreadPool ──> ClientWorker::run
//! session-sweeper ──> SessionStore::sweep_expired
//! ```

use super::client::{ClientWorker, ServerState};
use super::pool::ThreadPool;
use crate::config::{ConfigError, ServerConfig};
use crate::router::Router;
use crate::script::ScriptEngine;
use crate::session::{SessionStore, SessionSweeper};
use crate::workers::WorkerRegistry;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Cada cuánto se revisa el listener y el flag de parada
const ACCEPT_POLL: Duration = Duration::from_millis(100);

/// Timeout de lectura/escritura de cada conexión
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Servidor HTTP concurrente
pub struct Server {
    config: Arc<ServerConfig>,
    registry: WorkerRegistry,
    sessions: Arc<SessionStore>,
    script_engine: Option<Arc<dyn ScriptEngine>>,
}

impl Server {
    /// Crea el servidor validando la configuración contra el registro
    ///
    /// El document root se canonicaliza acá: el router compara contra él
    /// los paths ya resueltos por el sistema de archivos.
    pub fn new(mut config: ServerConfig, registry: WorkerRegistry) -> Result<Self, ConfigError> {
        config.validate(&registry)?;
        config.canonicalize_document_root()?;
        let sessions = Arc::new(SessionStore::new(config.session_timeout));

        Ok(Self {
            config: Arc::new(config),
            registry,
            sessions,
            script_engine: None,
        })
    }

    /// Motor que ejecuta los archivos `.smscr`
    ///
    /// Sin motor, pedir un script responde 404.
    pub fn with_script_engine(mut self, engine: Arc<dyn ScriptEngine>) -> Self {
        self.script_engine = Some(engine);
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Store de sesiones compartido con las conexiones
    pub fn sessions(&self) -> Arc<SessionStore> {
        Arc::clone(&self.sessions)
    }

    /// Hace bind y arranca los threads de accept y de limpieza
    pub fn start(self) -> io::Result<ServerHandle> {
        let listener = TcpListener::bind(self.config.bind_address())?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        log::info!("Server listening on {}", local_addr);

        let pool = ThreadPool::new(self.config.worker_threads)?;
        log::info!("Thread pool started with {} workers", pool.size());

        let sweeper = SessionSweeper::spawn(Arc::clone(&self.sessions), self.config.sweep_interval)?;

        let state = Arc::new(ServerState {
            router: Router::new(&self.config),
            registry: self.registry,
            sessions: self.sessions,
            script_engine: self.script_engine,
            config: self.config,
        });

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let accept_thread = thread::Builder::new()
            .name("http-accept".to_string())
            .spawn(move || accept_loop(listener, pool, state, flag))?;

        Ok(ServerHandle {
            local_addr,
            running,
            accept_thread: Some(accept_thread),
            sweeper: Some(sweeper),
        })
    }

    /// Arranca y bloquea hasta que el servidor termine
    pub fn run(self) -> io::Result<()> {
        self.start()?.join();
        Ok(())
    }
}

fn accept_loop(listener: TcpListener, mut pool: ThreadPool, state: Arc<ServerState>, running: Arc<AtomicBool>) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                log::debug!("New connection from {}", peer);
                if let Err(e) = prepare_stream(&stream) {
                    log::warn!("Cannot configure connection from {}: {}", peer, e);
                    continue;
                }

                let client = ClientWorker::new(stream, Arc::clone(&state));
                if let Err(e) = pool.execute(move || client.run()) {
                    log::error!("Cannot queue connection from {}: {}", peer, e);
                }
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(e) => {
                log::warn!("Error accepting connection: {}", e);
                thread::sleep(ACCEPT_POLL);
            }
        }
    }

    drop(listener);
    log::info!("Listener closed, waiting for active connections");
    pool.shutdown();
    log::info!("Server stopped");
}

/// Vuelve el socket a modo bloqueante con timeouts
fn prepare_stream(stream: &TcpStream) -> io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(CONNECTION_TIMEOUT))?;
    stream.set_write_timeout(Some(CONNECTION_TIMEOUT))
}

/// Handle de un servidor en marcha
pub struct ServerHandle {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
    sweeper: Option<SessionSweeper>,
}

impl ServerHandle {
    /// Dirección real del listener (útil con puerto 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Deja de aceptar, espera las conexiones en curso y detiene la limpieza
    pub fn stop(mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.wait();
    }

    /// Bloquea hasta que el thread de accept termine
    pub fn join(mut self) {
        self.wait();
    }

    fn wait(&mut self) {
        if let Some(handle) = self.accept_thread.take() {
            if handle.join().is_err() {
                log::error!("Accept thread terminated abnormally");
            }
        }
        if let Some(mut sweeper) = self.sweeper.take() {
            sweeper.stop();
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::{Read, Write};
    use std::time::Instant;

    fn test_config(root: &std::path::Path) -> ServerConfig {
        ServerConfig {
            port: 0,
            worker_threads: 2,
            document_root: fs::canonicalize(root).unwrap(),
            ..ServerConfig::default()
        }
    }

    fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        write!(stream, "GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path).unwrap();
        let mut buf = String::new();
        stream.read_to_string(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.worker_threads = 0;
        assert!(Server::new(config, WorkerRegistry::with_defaults()).is_err());
    }

    #[test]
    fn test_relative_document_root_from_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("config");
        fs::create_dir_all(&conf).unwrap();
        fs::create_dir_all(dir.path().join("webroot")).unwrap();
        fs::write(dir.path().join("webroot/index.html"), "<p>root</p>").unwrap();
        fs::write(conf.join("mime.toml"), "html = \"text/html\"\n").unwrap();
        fs::write(conf.join("workers.toml"), "").unwrap();
        fs::write(
            conf.join("server.toml"),
            r#"
server.address = "127.0.0.1"
server.domainName = "localhost"
server.port = 0
server.workerThreads = 2
server.documentRoot = "../webroot"
server.mimeConfig = "mime.toml"
server.workers = "workers.toml"
session.timeout = 60
"#,
        )
        .unwrap();

        let config = ServerConfig::load(&conf.join("server.toml")).unwrap();
        assert!(config.document_root.ends_with("config/../webroot"));

        let server = Server::new(config, WorkerRegistry::with_defaults()).unwrap();
        assert!(server.config().document_root.is_absolute());
        assert_eq!(server.config().document_root, fs::canonicalize(dir.path().join("webroot")).unwrap());

        let handle = server.start().unwrap();
        let text = get(handle.local_addr(), "/index.html");
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"), "got: {}", text);
        assert!(text.ends_with("<p>root</p>"));
        handle.stop();
    }

    #[test]
    fn test_start_serve_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "hola").unwrap();

        let server = Server::new(test_config(dir.path()), WorkerRegistry::with_defaults()).unwrap();
        let handle = server.start().unwrap();
        assert!(handle.is_running());
        assert_ne!(handle.local_addr().port(), 0);

        let text = get(handle.local_addr(), "/a.txt");
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.ends_with("hola"));

        let start = Instant::now();
        handle.stop();
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_more_clients_than_workers() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "x").unwrap();

        let mut config = test_config(dir.path());
        config.worker_threads = 1;
        let handle = Server::new(config, WorkerRegistry::with_defaults()).unwrap().start().unwrap();
        let addr = handle.local_addr();

        let clients: Vec<_> = (0..5)
            .map(|_| thread::spawn(move || get(addr, "/a.txt")))
            .collect();
        for client in clients {
            assert!(client.join().unwrap().starts_with("HTTP/1.1 200 OK"));
        }

        handle.stop();
    }
}
