//! # Parsing de Requests HTTP
//! src/http/request.rs
//!
//! Este módulo implementa el parser HTTP desde cero, en dos pasos:
//!
//! 1. [`read_request_lines`] lee el socket byte a byte hasta la línea vacía
//!    que termina el bloque de headers y lo separa en líneas lógicas.
//! 2. [`Request::from_lines`] valida la request line y extrae path, query
//!    parameters y headers.
//!
//! ## Formato de un Request
//!
//! ```text
//! GET /path?param1=value1&param2=value2 HTTP/1.1\r\n
//! Host: localhost:5721\r\n
//! Cookie: sid=ABCDEFGHIJKLMNOPQRST\r\n
//! \r\n
//! ```
//!
//! Algunos clientes simples mandan `\n` en vez de `\r\n`, así que ambos
//! terminadores (`\r\n\r\n` y `\n\n`) se aceptan.

use super::StatusCode;
use std::collections::HashMap;
use std::io::{self, Read};

/// Tamaño máximo del bloque de headers (request line incluida)
pub const MAX_HEADER_SIZE: usize = 8 * 1024;

/// Errores que pueden ocurrir durante el parsing
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// El stream terminó antes de la línea vacía
    #[error("incomplete HTTP request")]
    Incomplete,

    /// El bloque de headers supera `MAX_HEADER_SIZE`
    #[error("request header block too large")]
    TooLarge,

    /// La request line no tiene exactamente 3 partes
    #[error("invalid request line: {0}")]
    InvalidRequestLine(String),

    /// Método distinto de GET
    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// Versión distinta de HTTP/1.0 y HTTP/1.1
    #[error("unsupported HTTP version: {0}")]
    UnsupportedVersion(String),

    /// Error leyendo del socket
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ParseError {
    /// Código de estado con el que se responde a este error
    pub fn status(&self) -> StatusCode {
        match self {
            ParseError::UnsupportedMethod(_) => StatusCode::MethodNotAllowed,
            ParseError::UnsupportedVersion(_) => StatusCode::HttpVersionNotSupported,
            _ => StatusCode::BadRequest,
        }
    }
}

/// Estados del scanner que busca el fin del bloque de headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Dentro de una línea
    Text,
    /// Se vio `\r`
    Cr,
    /// Se vio el `\n` que cierra una línea
    Lf,
    /// Se vio `\n\r`
    LfCr,
    /// Se vio la línea vacía
    Done,
}

impl ScanState {
    fn next(self, byte: u8) -> ScanState {
        match (self, byte) {
            (ScanState::Lf, b'\n') | (ScanState::LfCr, b'\n') => ScanState::Done,
            (ScanState::Lf, b'\r') => ScanState::LfCr,
            (_, b'\r') => ScanState::Cr,
            (_, b'\n') => ScanState::Lf,
            _ => ScanState::Text,
        }
    }
}

/// Lee el bloque de headers de un stream
///
/// # Retorna
///
/// * `Ok(None)` - El peer cerró la conexión sin mandar nada
/// * `Ok(Some(lines))` - Líneas lógicas, la request line primero
/// * `Err(ParseError::Incomplete)` - El stream terminó antes de la línea vacía
///
/// # Ejemplo
///
/// ```
/// use smart_http_server::http::request::read_request_lines;
///
/// let raw: &[u8] = b"GET / HTTP/1.1\nHost: example.com\n\n";
/// let lines = read_request_lines(raw).unwrap().unwrap();
/// assert_eq!(lines, vec!["GET / HTTP/1.1", "Host: example.com"]);
/// ```
pub fn read_request_lines<R: Read>(reader: R) -> Result<Option<Vec<String>>, ParseError> {
    let mut buffer = Vec::with_capacity(1024);
    let mut state = ScanState::Text;
    let mut seen_any = false;

    for byte in reader.bytes() {
        let byte = byte?;
        seen_any = true;

        state = state.next(byte);
        if byte != b'\r' {
            buffer.push(byte);
        }
        if state == ScanState::Done {
            return Ok(Some(split_header_lines(&buffer)));
        }
        if buffer.len() > MAX_HEADER_SIZE {
            return Err(ParseError::TooLarge);
        }
    }

    if seen_any {
        Err(ParseError::Incomplete)
    } else {
        Ok(None)
    }
}

/// Separa el bloque en líneas lógicas uniendo las líneas de continuación
///
/// Una línea que empieza con espacio o tab continúa el header anterior.
fn split_header_lines(block: &[u8]) -> Vec<String> {
    // Los headers son ISO-8859-1: cada byte es un char
    let text: String = block.iter().map(|&b| b as char).collect();

    let mut lines: Vec<String> = Vec::new();
    for line in text.split('\n') {
        if line.is_empty() {
            continue;
        }
        let continues = line.starts_with(' ') || line.starts_with('\t');
        match lines.last_mut() {
            Some(previous) if continues => previous.push_str(line),
            _ => lines.push(line.to_string()),
        }
    }
    lines
}

/// Representa un request GET ya validado
#[derive(Debug, Clone)]
pub struct Request {
    /// Path de la petición sin query (ej: "/index.html")
    path: String,

    /// Query parameters parseados (ej: {"name": "Ana"})
    query_params: HashMap<String, String>,

    /// Headers en el orden recibido (puede haber nombres repetidos)
    headers: Vec<(String, String)>,

    /// Versión HTTP ("HTTP/1.0" o "HTTP/1.1")
    version: String,
}

impl Request {
    /// Valida las líneas producidas por [`read_request_lines`]
    ///
    /// El método se valida antes que la versión.
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use smart_http_server::http::Request;
    ///
    /// let lines = vec!["GET /hello?name=Ana HTTP/1.1".to_string()];
    /// let request = Request::from_lines(&lines).unwrap();
    ///
    /// assert_eq!(request.path(), "/hello");
    /// assert_eq!(request.query_param("name"), Some("Ana"));
    /// ```
    pub fn from_lines(lines: &[String]) -> Result<Self, ParseError> {
        let request_line = lines
            .first()
            .ok_or_else(|| ParseError::InvalidRequestLine(String::new()))?;

        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(ParseError::InvalidRequestLine(request_line.clone()));
        }

        if parts[0] != "GET" {
            return Err(ParseError::UnsupportedMethod(parts[0].to_string()));
        }

        let version = parts[2];
        if version != "HTTP/1.0" && version != "HTTP/1.1" {
            return Err(ParseError::UnsupportedVersion(version.to_string()));
        }

        let (path, query_params) = Self::parse_path_and_query(parts[1]);
        let headers = Self::parse_headers(&lines[1..]);

        Ok(Request {
            path,
            query_params,
            headers,
            version: version.to_string(),
        })
    }

    /// Parsea el path y extrae los query parameters
    ///
    /// Ejemplo: "/sum?a=1&b=2"
    /// Retorna: ("/sum", {"a": "1", "b": "2"})
    fn parse_path_and_query(target: &str) -> (String, HashMap<String, String>) {
        match target.split_once('?') {
            Some((path, query)) => (path.to_string(), parse_query_string(query)),
            None => (target.to_string(), HashMap::new()),
        }
    }

    /// Parsea los headers `Name: Value`
    ///
    /// Las líneas sin ':' se ignoran: solo importan Host y Cookie.
    fn parse_headers(lines: &[String]) -> Vec<(String, String)> {
        lines
            .iter()
            .filter_map(|line| {
                let (name, value) = line.split_once(':')?;
                Some((name.trim().to_string(), value.trim().to_string()))
            })
            .collect()
    }

    // === Métodos públicos para acceder a los campos ===

    /// Obtiene el path del request
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Obtiene todos los query parameters
    pub fn query_params(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    /// Obtiene un query parameter específico
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(|s| s.as_str())
    }

    /// Obtiene el primer header con ese nombre (sin distinguir mayúsculas)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Obtiene todos los valores de los headers con ese nombre
    pub fn headers_named(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Obtiene la versión HTTP
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Host del request sin el puerto, o `default` si no hay header Host
    ///
    /// Los literales IPv6 (`[::1]:8080`) conservan los corchetes.
    pub fn host_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self.header("Host").map(strip_port) {
            Some(host) if !host.is_empty() => host,
            _ => default,
        }
    }
}

/// Quita un `:puerto` final; en `[v6]:puerto` solo mira después del `]`
fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, _)) => name,
        None => host,
    }
}

/// Parsea una query string en un HashMap
///
/// Ejemplo: "a=1&debug&b="
/// Retorna: {"a": "1", "debug": "", "b": ""}
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    for param in query.split('&') {
        if param.is_empty() {
            continue;
        }

        let (key, value) = param.split_once('=').unwrap_or((param, ""));
        params.insert(url_decode(key), url_decode(value));
    }

    params
}

/// Decodifica un componente de la URL (`+` y `%XX`)
///
/// Si la secuencia no es UTF-8 válido se deja tal cual.
fn url_decode(s: &str) -> String {
    let spaced = s.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}
