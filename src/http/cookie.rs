//! # Cookies de Salida
//! src/http/cookie.rs
//!
//! Cookies que el servidor manda en `Set-Cookie`. Del lado de entrada
//! solo se lee el id de sesión (ver `session::store`).

/// Cookie pendiente de enviar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    name: String,
    value: String,
    max_age: Option<u32>,
    domain: Option<String>,
    path: Option<String>,
    http_only: bool,
}

impl Cookie {
    /// Crea una cookie sin atributos
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            max_age: None,
            domain: None,
            path: None,
            http_only: false,
        }
    }

    /// `true` si algún campo tiene un salto de línea (no se puede mandar)
    pub fn has_line_break(&self) -> bool {
        [Some(&self.name), Some(&self.value), self.domain.as_ref(), self.path.as_ref()]
            .into_iter()
            .flatten()
            .any(|field| field.contains(['\r', '\n']))
    }

    pub fn with_max_age(mut self, seconds: u32) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn with_domain(mut self, domain: &str) -> Self {
        self.domain = Some(domain.to_string());
        self
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    pub fn http_only(mut self) -> Self {
        self.http_only = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Serializa la cookie para el header `Set-Cookie`
    ///
    /// Formato: `name=value; Domain=..; Path=..; Max-Age=..; HttpOnly`,
    /// omitiendo los atributos que no están definidos.
    ///
    /// # Ejemplo
    /// ```
    /// use smart_http_server::http::Cookie;
    ///
    /// let cookie = Cookie::new("sid", "ABC").with_path("/").http_only();
    /// assert_eq!(cookie.to_header_value(), "sid=ABC; Path=/; HttpOnly");
    /// ```
    pub fn to_header_value(&self) -> String {
        let mut parts = vec![format!("{}={}", self.name, self.value)];

        if let Some(ref domain) = self.domain {
            parts.push(format!("Domain={}", domain));
        }
        if let Some(ref path) = self.path {
            parts.push(format!("Path={}", path));
        }
        if let Some(max_age) = self.max_age {
            parts.push(format!("Max-Age={}", max_age));
        }
        if self.http_only {
            parts.push("HttpOnly".to_string());
        }

        parts.join("; ")
    }
}
