//! # Workers Básicos
//!
//! Workers de ejemplo que trae el servidor:
//! - EchoParams: tabla HTML con los parámetros del request
//! - HelloWorker: saluda usando el parámetro `name`
//! - SumWorker: suma `a` y `b` y delega en un script privado
//! - BgColorWorker: guarda un color de fondo en la sesión
//! - Home: página de inicio con el color de la sesión
//! - SessionInfo: datos de la sesión en JSON

use super::Worker;
use crate::error::ServerError;
use crate::http::RequestContext;
use crate::router::Dispatcher;

/// Script que muestra el resultado de SumWorker
pub const CALC_SCRIPT: &str = "/private/pages/calc.smscr";

/// Script de la página de inicio
pub const HOME_SCRIPT: &str = "/private/pages/home.smscr";

/// Color de fondo cuando la sesión no tiene uno
pub const DEFAULT_BACKGROUND: &str = "7F7F7F";

/// Escapa texto para meterlo dentro de HTML
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Handler para /ext/EchoParams
///
/// Devuelve una tabla HTML con cada parámetro del request.
pub struct EchoParams;

impl Worker for EchoParams {
    fn process_request(&self, ctx: &mut RequestContext<'_>, _: &dyn Dispatcher) -> Result<(), ServerError> {
        ctx.set_mime_type("text/html")?;

        let mut html = String::from("<html><body>\n<table border=\"1\">\n<tr><th>Name</th><th>Value</th></tr>\n");
        for name in ctx.parameter_names() {
            let value = ctx.parameter(name).unwrap_or_default();
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td></tr>\n",
                escape_html(name),
                escape_html(value)
            ));
        }
        html.push_str("</table>\n</body></html>\n");

        ctx.write_str(&html)
    }
}

/// Handler para /ext/HelloWorker?name=NOMBRE
///
/// # Ejemplo de response
/// ```text
/// Hello Ana, your name has 3 letters.
/// ```
pub struct HelloWorker;

impl Worker for HelloWorker {
    fn process_request(&self, ctx: &mut RequestContext<'_>, _: &dyn Dispatcher) -> Result<(), ServerError> {
        ctx.set_mime_type("text/html")?;

        let body = match ctx.parameter("name").map(str::trim) {
            Some(name) if !name.is_empty() => format!(
                "<p>Hello {}, your name has {} letters.</p>",
                escape_html(name),
                name.chars().count()
            ),
            _ => "<p>You did not send me your name!</p>".to_string(),
        };

        ctx.write_str(&format!("<html><body>\n{}\n</body></html>\n", body))
    }
}

/// Handler para /ext/SumWorker?a=N&b=M
///
/// Valores inválidos o ausentes se reemplazan por a=1, b=2. El resultado
/// se deja en los parámetros temporales `a`, `b` y `sum` y la salida la
/// genera el script privado [`CALC_SCRIPT`].
pub struct SumWorker;

impl SumWorker {
    fn int_param(ctx: &RequestContext<'_>, name: &str, default: i64) -> i64 {
        ctx.parameter(name)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }
}

impl Worker for SumWorker {
    fn process_request(&self, ctx: &mut RequestContext<'_>, dispatcher: &dyn Dispatcher) -> Result<(), ServerError> {
        let a = Self::int_param(ctx, "a", 1);
        let b = Self::int_param(ctx, "b", 2);

        ctx.set_temporary_parameter("a", &a.to_string());
        ctx.set_temporary_parameter("b", &b.to_string());
        ctx.set_temporary_parameter("sum", &a.saturating_add(b).to_string());

        dispatcher.dispatch_request(CALC_SCRIPT, ctx)
    }
}

/// Handler para /ext/BgColorWorker?bgcolor=RRGGBB
///
/// Solo acepta exactamente 6 dígitos hexadecimales.
pub struct BgColorWorker;

impl BgColorWorker {
    fn is_valid_color(color: &str) -> bool {
        color.len() == 6 && color.chars().all(|c| c.is_ascii_hexdigit())
    }
}

impl Worker for BgColorWorker {
    fn process_request(&self, ctx: &mut RequestContext<'_>, _: &dyn Dispatcher) -> Result<(), ServerError> {
        let color = ctx.parameter("bgcolor").map(str::to_string);

        let message = match color {
            Some(ref color) if Self::is_valid_color(color) => {
                ctx.set_persistent_parameter("bgcolor", color);
                "Color updated."
            }
            _ => "Color not updated.",
        };

        ctx.set_mime_type("text/html")?;
        ctx.write_str(&format!(
            "<html><body>\n<p>{}</p>\n<a href=\"/index2.html\">Home</a>\n</body></html>\n",
            message
        ))
    }
}

/// Handler para /index2.html
///
/// Pasa el color de la sesión al script de inicio como `background`.
pub struct Home;

impl Worker for Home {
    fn process_request(&self, ctx: &mut RequestContext<'_>, dispatcher: &dyn Dispatcher) -> Result<(), ServerError> {
        let background = ctx
            .persistent_parameter("bgcolor")
            .unwrap_or_else(|| DEFAULT_BACKGROUND.to_string());
        ctx.set_temporary_parameter("background", &background);

        dispatcher.dispatch_request(HOME_SCRIPT, ctx)
    }
}

/// Handler para /ext/SessionInfo
///
/// # Ejemplo de response
/// ```json
/// {"persistent": {"bgcolor": "FF0000"}}
/// ```
pub struct SessionInfo;

impl Worker for SessionInfo {
    fn process_request(&self, ctx: &mut RequestContext<'_>, _: &dyn Dispatcher) -> Result<(), ServerError> {
        let persistent: serde_json::Map<String, serde_json::Value> = ctx
            .persistent_parameter_names()
            .into_iter()
            .filter_map(|name| {
                let value = ctx.persistent_parameter(&name)?;
                Some((name, serde_json::Value::String(value)))
            })
            .collect();

        let body = serde_json::json!({ "persistent": persistent });

        ctx.set_mime_type("application/json")?;
        ctx.write_str(&body.to_string())
    }
}
