//! Custodio: servidor HTTP de archivos con control de acceso por ruta y
//! usuario.
//!
//! GET transmite archivos o lista directorios, PUT recibe subidas. Un árbol
//! de reglas opcional decide cada petición; sin configuración de acceso el
//! servidor atiende todo sin mirar credenciales.

pub mod auth;
pub mod error;
pub mod metrics;
pub mod storage;

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::HeaderMap;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use auth::AccessManager;

/// Estado compartido del servidor. Se construye una vez al arrancar y se
/// pasa por `Arc` a cada handler; ningún handler lo muta.
pub struct AppState {
    pub storage_path: PathBuf,
    pub access: AccessManager,
    pub log_headers: bool,
    pub start_time: std::time::SystemTime,
}

impl AppState {
    pub fn log_headers_if_needed(&self, headers: &HeaderMap) {
        if self.log_headers {
            println!(
                "📋 [{}] {:#?}",
                chrono::Local::now().format("%d/%b/%Y %H:%M:%S"),
                headers
            );
        }
    }
}

/// Construye el router completo. Las rutas `/api/*` son fijas y tienen
/// prioridad sobre el comodín; el resto del espacio de rutas es el árbol de
/// archivos.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/storage", get(storage::get_storage_info))
        .route("/api/metrics", get(metrics::serve_metrics))
        .route("/", get(storage::serve_root).put(storage::upload_root))
        .route("/*path", get(storage::serve_path).put(storage::upload_path))
        .layer(cors)
        .with_state(state)
}
