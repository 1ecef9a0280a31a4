//! # Contexto de Request
//! src/http/context.rs
//!
//! `RequestContext` reemplaza a una respuesta armada en memoria: acumula
//! status, headers y cookies, y los emite recién en el primer `write`.
//! A partir de ahí cada `write` manda bytes directo al socket.
//!
//! ## Formato del header generado
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Content-Type: text/html; charset=UTF-8\r\n
//! Content-Length: 13\r\n
//! Set-Cookie: sid=ABCDEFGHIJKLMNOPQRST; Domain=localhost; Path=/; HttpOnly\r\n
//! \r\n
//! ```
//!
//! El header siempre se codifica en ISO-8859-1, sin importar el encoding
//! configurado para el body.
//!
//! ## Parámetros
//!
//! - **request**: query parameters, solo lectura
//! - **temporary**: viven lo que dura el request (workers → scripts)
//! - **persistent**: son los datos de la sesión, sobreviven al request

use super::{Cookie, StatusCode};
use crate::error::ServerError;
use crate::session::SessionData;
use std::collections::HashMap;
use std::io::Write;
use std::sync::PoisonError;

/// Encodings soportados para el body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Latin1,
}

impl Encoding {
    /// Busca un encoding por nombre (sin distinguir mayúsculas)
    pub fn from_name(name: &str) -> Result<Self, ServerError> {
        match name.to_ascii_uppercase().as_str() {
            "UTF-8" | "UTF8" => Ok(Encoding::Utf8),
            "ISO-8859-1" | "ISO_8859_1" | "LATIN1" => Ok(Encoding::Latin1),
            _ => Err(ServerError::UnsupportedEncoding(name.to_string())),
        }
    }

    /// Nombre canónico, el que va en `charset=`
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Latin1 => "ISO-8859-1",
        }
    }

    /// Codifica texto; en ISO-8859-1 los caracteres fuera de rango pasan a '?'
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Encoding::Utf8 => text.as_bytes().to_vec(),
            Encoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
        }
    }
}

/// Contexto de un request: parámetros de entrada y respuesta diferida
pub struct RequestContext<'a> {
    output: &'a mut dyn Write,

    parameters: HashMap<String, String>,
    temporary_parameters: HashMap<String, String>,
    persistent_parameters: SessionData,
    output_cookies: Vec<Cookie>,

    status_code: u16,
    status_text: String,
    mime_type: String,
    encoding: Encoding,
    content_length: Option<u64>,

    /// Se activa en el primer write; desde ahí el header es inmutable
    header_generated: bool,
}

impl<'a> RequestContext<'a> {
    /// Crea un contexto con los valores por defecto (200 OK, text/html, UTF-8)
    ///
    /// # Ejemplo
    /// ```
    /// use smart_http_server::http::RequestContext;
    /// use std::collections::HashMap;
    ///
    /// let mut out = Vec::new();
    /// {
    ///     let mut ctx = RequestContext::new(&mut out, HashMap::new(), Default::default(), Vec::new());
    ///     ctx.write_str("Hola").unwrap();
    /// }
    /// let text = String::from_utf8(out).unwrap();
    /// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    /// assert!(text.ends_with("\r\n\r\nHola"));
    /// ```
    pub fn new(
        output: &'a mut dyn Write,
        parameters: HashMap<String, String>,
        persistent_parameters: SessionData,
        output_cookies: Vec<Cookie>,
    ) -> Self {
        Self {
            output,
            parameters,
            temporary_parameters: HashMap::new(),
            persistent_parameters,
            output_cookies,
            status_code: StatusCode::Ok.as_u16(),
            status_text: StatusCode::Ok.reason_phrase().to_string(),
            mime_type: "text/html".to_string(),
            encoding: Encoding::Utf8,
            content_length: None,
            header_generated: false,
        }
    }

    // === Parámetros del request (solo lectura) ===

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(|s| s.as_str())
    }

    /// Nombres de los parámetros, ordenados
    pub fn parameter_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.parameters.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    // === Parámetros temporales ===

    pub fn temporary_parameter(&self, name: &str) -> Option<&str> {
        self.temporary_parameters.get(name).map(|s| s.as_str())
    }

    pub fn set_temporary_parameter(&mut self, name: &str, value: &str) {
        self.temporary_parameters.insert(name.to_string(), value.to_string());
    }

    pub fn remove_temporary_parameter(&mut self, name: &str) {
        self.temporary_parameters.remove(name);
    }

    pub fn temporary_parameter_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.temporary_parameters.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    // === Parámetros persistentes (datos de la sesión) ===

    pub fn persistent_parameter(&self, name: &str) -> Option<String> {
        let data = self.persistent_parameters.lock().unwrap_or_else(PoisonError::into_inner);
        data.get(name).cloned()
    }

    pub fn set_persistent_parameter(&mut self, name: &str, value: &str) {
        let mut data = self.persistent_parameters.lock().unwrap_or_else(PoisonError::into_inner);
        data.insert(name.to_string(), value.to_string());
    }

    pub fn remove_persistent_parameter(&mut self, name: &str) {
        let mut data = self.persistent_parameters.lock().unwrap_or_else(PoisonError::into_inner);
        data.remove(name);
    }

    pub fn persistent_parameter_names(&self) -> Vec<String> {
        let data = self.persistent_parameters.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = data.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    // === Metadatos de la respuesta ===

    /// Falla si el header ya se mandó
    fn ensure_header_pending(&self) -> Result<(), ServerError> {
        if self.header_generated {
            Err(ServerError::HeaderAlreadySent)
        } else {
            Ok(())
        }
    }

    pub fn set_status_code(&mut self, code: u16) -> Result<(), ServerError> {
        self.ensure_header_pending()?;
        self.status_code = code;
        Ok(())
    }

    pub fn set_status_text(&mut self, text: &str) -> Result<(), ServerError> {
        self.ensure_header_pending()?;
        check_header_value(text)?;
        self.status_text = text.to_string();
        Ok(())
    }

    /// Atajo para código + texto estándar
    pub fn set_status(&mut self, status: StatusCode) -> Result<(), ServerError> {
        self.set_status_code(status.as_u16())?;
        self.set_status_text(status.reason_phrase())
    }

    pub fn set_mime_type(&mut self, mime_type: &str) -> Result<(), ServerError> {
        self.ensure_header_pending()?;
        check_header_value(mime_type)?;
        self.mime_type = mime_type.to_string();
        Ok(())
    }

    pub fn set_encoding(&mut self, encoding: &str) -> Result<(), ServerError> {
        self.ensure_header_pending()?;
        self.encoding = Encoding::from_name(encoding)?;
        Ok(())
    }

    pub fn set_content_length(&mut self, length: u64) -> Result<(), ServerError> {
        self.ensure_header_pending()?;
        self.content_length = Some(length);
        Ok(())
    }

    pub fn add_cookie(&mut self, cookie: Cookie) -> Result<(), ServerError> {
        self.ensure_header_pending()?;
        if cookie.has_line_break() {
            return Err(ServerError::InvalidHeaderValue(cookie.to_header_value()));
        }
        self.output_cookies.push(cookie);
        Ok(())
    }

    /// Quita de la cola todas las cookies con ese nombre
    pub fn remove_cookie(&mut self, name: &str) -> Result<(), ServerError> {
        self.ensure_header_pending()?;
        self.output_cookies.retain(|c| c.name() != name);
        Ok(())
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn output_cookies(&self) -> &[Cookie] {
        &self.output_cookies
    }

    pub fn is_header_generated(&self) -> bool {
        self.header_generated
    }

    // === Escritura ===

    /// Arma el bloque de headers
    fn header_block(&self) -> String {
        let mut header = format!("HTTP/1.1 {} {}\r\n", self.status_code, self.status_text);

        if self.mime_type.starts_with("text/") {
            header.push_str(&format!(
                "Content-Type: {}; charset={}\r\n",
                self.mime_type,
                self.encoding.name()
            ));
        } else {
            header.push_str(&format!("Content-Type: {}\r\n", self.mime_type));
        }

        if let Some(length) = self.content_length {
            header.push_str(&format!("Content-Length: {}\r\n", length));
        }

        if !self.output_cookies.is_empty() {
            let cookies: Vec<String> = self.output_cookies.iter().map(Cookie::to_header_value).collect();
            header.push_str(&format!("Set-Cookie: {}\r\n", cookies.join(", ")));
        }

        header.push_str("\r\n");
        header
    }

    fn generate_header(&mut self) -> Result<(), ServerError> {
        let header = Encoding::Latin1.encode(&self.header_block());
        self.output.write_all(&header)?;
        self.header_generated = true;
        Ok(())
    }

    /// Escribe bytes del body; la primera llamada manda antes el header
    pub fn write(&mut self, data: &[u8]) -> Result<(), ServerError> {
        if !self.header_generated {
            self.generate_header()?;
        }
        self.output.write_all(data)?;
        Ok(())
    }

    /// Escribe texto codificado con el encoding del contexto
    pub fn write_str(&mut self, text: &str) -> Result<(), ServerError> {
        let bytes = self.encoding.encode(text);
        self.write(&bytes)
    }

    /// Manda el header si nadie escribió nada y hace flush
    pub fn finish(&mut self) -> Result<(), ServerError> {
        if !self.header_generated {
            self.generate_header()?;
        }
        self.output.flush()?;
        Ok(())
    }
}

/// Un valor con CR o LF partiría el bloque de headers
fn check_header_value(value: &str) -> Result<(), ServerError> {
    if value.contains(['\r', '\n']) {
        Err(ServerError::InvalidHeaderValue(value.to_string()))
    } else {
        Ok(())
    }
}
