//! Tests de integración para el servidor HTTP
//! tests/integration_test.rs
//!
//! Cada test levanta su propio servidor en `127.0.0.1:0` con un document
//! root temporal, así no hace falta tener nada corriendo.

use smart_http_server::config::ServerConfig;
use smart_http_server::http::RequestContext;
use smart_http_server::script::{ScriptEngine, ScriptError};
use smart_http_server::server::{Server, ServerHandle};
use smart_http_server::workers::WorkerRegistry;
use std::fs;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Motor de prueba: reemplaza `{name}` por el parámetro temporal `name`
struct TemplateEngine;

impl ScriptEngine for TemplateEngine {
    fn execute(&self, source: &str, ctx: &mut RequestContext<'_>) -> Result<(), ScriptError> {
        if source.starts_with("!error") {
            return Err(ScriptError::Parse("unexpected token".to_string()));
        }

        let mut output = source.to_string();
        for name in ["a", "b", "sum", "background"] {
            if let Some(value) = ctx.temporary_parameter(name) {
                output = output.replace(&format!("{{{}}}", name), value);
            }
        }
        ctx.write_str(&output)
            .map_err(|e| ScriptError::Execution(e.to_string()))
    }
}

struct TestServer {
    _root: TempDir,
    handle: Option<ServerHandle>,
}

impl TestServer {
    fn start() -> Self {
        let root = tempfile::tempdir().unwrap();
        let path = root.path();
        fs::create_dir_all(path.join("private/pages")).unwrap();
        fs::write(path.join("index.html"), "<h1>Welcome</h1>").unwrap();
        fs::write(path.join("notes.txt"), "x".repeat(3000)).unwrap();
        fs::write(path.join("broken.smscr"), "!error").unwrap();
        fs::write(path.join("private/secret.html"), "secret").unwrap();
        fs::write(path.join("private/pages/calc.smscr"), "{a}+{b}={sum}").unwrap();
        fs::write(path.join("private/pages/home.smscr"), "bg={background}").unwrap();

        let mut config = ServerConfig {
            port: 0,
            worker_threads: 4,
            document_root: fs::canonicalize(path).unwrap(),
            ..ServerConfig::default()
        };
        config.workers.insert("/index2.html".to_string(), "Home".to_string());
        config.workers.insert("/setbgcolor".to_string(), "BgColorWorker".to_string());

        let handle = Server::new(config, WorkerRegistry::with_defaults())
            .unwrap()
            .with_script_engine(Arc::new(TemplateEngine))
            .start()
            .unwrap();

        Self {
            _root: root,
            handle: Some(handle),
        }
    }

    /// Manda bytes crudos y retorna la response completa
    fn send_raw(&self, raw: &[u8]) -> String {
        let addr = self.handle.as_ref().unwrap().local_addr();
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        stream.write_all(raw).unwrap();
        stream.flush().unwrap();

        let mut response = Vec::new();
        stream.read_to_end(&mut response).unwrap();
        String::from_utf8_lossy(&response).into_owned()
    }

    fn get(&self, path: &str) -> String {
        self.send_raw(format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path).as_bytes())
    }

    fn get_with_cookie(&self, path: &str, sid: &str) -> String {
        self.send_raw(
            format!("GET {} HTTP/1.1\r\nHost: localhost\r\nCookie: sid=\"{}\"\r\n\r\n", path, sid).as_bytes(),
        )
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

/// Helper: extrae el body de una response HTTP
fn extract_body(response: &str) -> &str {
    match response.find("\r\n\r\n") {
        Some(pos) => &response[pos + 4..],
        None => "",
    }
}

/// Helper: id de sesión del header Set-Cookie, si hay
fn session_cookie(response: &str) -> Option<String> {
    let line = response.lines().find(|l| l.starts_with("Set-Cookie: "))?;
    let start = line.find("sid=")? + 4;
    Some(line[start..start + 20].to_string())
}

#[test]
fn test_static_file() {
    let server = TestServer::start();
    let response = server.get("/index.html");

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "got: {}", response);
    assert!(response.contains("Content-Type: text/html; charset=UTF-8\r\n"));
    assert!(response.contains("Content-Length: 16\r\n"));
    assert_eq!(extract_body(&response), "<h1>Welcome</h1>");
}

#[test]
fn test_large_file_is_complete() {
    let server = TestServer::start();
    let response = server.get("/notes.txt");

    assert!(response.contains("Content-Type: text/plain; charset=UTF-8\r\n"));
    assert_eq!(extract_body(&response).len(), 3000);
}

#[test]
fn test_http_10_and_bare_lf() {
    let server = TestServer::start();
    let response = server.send_raw(b"GET /index.html HTTP/1.0\n\n");
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "got: {}", response);
}

#[test]
fn test_protocol_errors() {
    let server = TestServer::start();

    let response = server.send_raw(b"POST /index.html HTTP/1.1\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"), "got: {}", response);
    assert!(response.contains("Content-Type: application/json"));

    let response = server.send_raw(b"GET /nope.html HTTP/2.0\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 505 "), "got: {}", response);

    let response = server.send_raw(b"GET /index.html\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 400 "), "got: {}", response);
}

#[test]
fn test_path_traversal_forbidden() {
    let server = TestServer::start();
    let response = server.get("/../../etc/passwd");
    assert!(response.starts_with("HTTP/1.1 403 Forbidden\r\n"), "got: {}", response);
}

#[test]
fn test_missing_file_not_found() {
    let server = TestServer::start();
    let response = server.get("/missing.html");
    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"), "got: {}", response);

    let json: serde_json::Value = serde_json::from_str(extract_body(&response)).unwrap();
    assert_eq!(json["error"], "Not Found");
}

#[test]
fn test_private_blocked_for_clients() {
    let server = TestServer::start();
    assert!(server.get("/private/secret.html").starts_with("HTTP/1.1 404 "));
    assert!(server.get("/private/pages/calc.smscr").starts_with("HTTP/1.1 404 "));
}

#[test]
fn test_worker_dispatches_to_private_script() {
    let server = TestServer::start();
    let response = server.get("/ext/SumWorker?a=20&b=22");

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "got: {}", response);
    assert_eq!(extract_body(&response), "20+22=42");
}

#[test]
fn test_script_failure_not_found() {
    let server = TestServer::start();
    let response = server.get("/broken.smscr");
    assert!(response.starts_with("HTTP/1.1 404 "), "got: {}", response);
}

#[test]
fn test_unknown_extension_worker_not_found() {
    let server = TestServer::start();
    let response = server.get("/ext/DoesNotExist");
    assert!(response.starts_with("HTTP/1.1 404 "), "got: {}", response);
}

#[test]
fn test_query_params_decoded() {
    let server = TestServer::start();
    let response = server.get("/ext/EchoParams?name=Ana+Mar%C3%ADa");
    assert!(response.contains("<td>Ana María</td>"), "got: {}", response);
}

#[test]
fn test_session_cookie_issued_and_reused() {
    let server = TestServer::start();

    let first = server.get("/index.html");
    let sid = session_cookie(&first).expect("first request should get a session");
    assert!(sid.chars().all(|c| c.is_ascii_uppercase()));
    assert!(first.contains("; Domain=localhost; Path=/; HttpOnly"));

    let second = server.get_with_cookie("/index.html", &sid);
    assert!(session_cookie(&second).is_none(), "session should be reused: {}", second);

    let stale = server.get_with_cookie("/index.html", "AAAAAAAAAAAAAAAAAAAA");
    let fresh = session_cookie(&stale).expect("unknown sid gets a new session");
    assert_ne!(fresh, "AAAAAAAAAAAAAAAAAAAA");
}

#[test]
fn test_session_data_persists_between_requests() {
    let server = TestServer::start();

    let first = server.get("/index2.html");
    assert_eq!(extract_body(&first), "bg=7F7F7F");
    let sid = session_cookie(&first).unwrap();

    let update = server.get_with_cookie("/setbgcolor?bgcolor=00FF00", &sid);
    assert!(update.contains("Color updated."));

    let home = server.get_with_cookie("/index2.html", &sid);
    assert_eq!(extract_body(&home), "bg=00FF00");
}

#[test]
fn test_concurrent_clients() {
    let server = Arc::new(TestServer::start());

    let clients: Vec<_> = (0..16)
        .map(|_| {
            let server = Arc::clone(&server);
            std::thread::spawn(move || server.get("/index.html"))
        })
        .collect();

    for client in clients {
        let response = client.join().unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    }
}
