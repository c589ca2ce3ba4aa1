use axum::response::Html;
use tera::{Context, Tera};

use crate::handlers::ErrorResponse;

lazy_static::lazy_static! {
    pub static ref TEMPLATES: Tera = {
        match Tera::new("api/templates/**/*.html") {
            Ok(t) => t,
            Err(e) => {
                tracing::error!("Template parsing error: {}", e);
                std::process::exit(1);
            }
        }
    };
}

/// Render a template into an HTML response
pub fn render(name: &str, context: &Context) -> Result<Html<String>, ErrorResponse> {
    TEMPLATES.render(name, context).map(Html).map_err(|e| {
        tracing::error!(template = name, error = ?e, "Template rendering failed");
        ErrorResponse::new("template_error", format!("Failed to render {}", name))
    })
}
