//! Módulo de almacenamiento para Custodio.
//!
//! Traduce rutas de petición a rutas bajo la raíz de almacenamiento y
//! atiende las operaciones de archivo: GET transmite archivos o lista
//! directorios, PUT recibe subidas en streaming.

use std::collections::BTreeMap;
use std::path::{Path as StdPath, PathBuf};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use serde::Serialize;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use crate::auth::{challenge_response, check_access, split_segments, Permission};
use crate::error::{CustodioError, Result};
use crate::metrics;
use crate::AppState;

#[derive(Serialize)]
pub struct StorageInfo {
    pub total_space_bytes: u64,
    pub used_space_bytes: u64,
    pub storage_path: String,
    pub uptime_seconds: u64,
}

/// Une los segmentos normalizados de `raw` bajo la raíz. Al descartar `..`
/// la ruta resultante nunca sale de la raíz; la misma normalización decide
/// los permisos, así que regla y archivo siempre hablan de la misma ruta.
pub fn resolve_path(root: &StdPath, raw: &str) -> PathBuf {
    let mut full = root.to_path_buf();
    for seg in split_segments(raw) {
        full.push(seg);
    }
    full
}

/// Lista un directorio (no recursivo) como mapa nombre -> tipo de entrada.
pub fn list_directory(path: &StdPath) -> std::io::Result<BTreeMap<String, String>> {
    let mut entries = BTreeMap::new();
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        let kind = if entry.path().is_dir() {
            "directory"
        } else {
            "file"
        };
        entries.insert(name, kind.to_string());
    }
    Ok(entries)
}

pub async fn serve_root(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    serve_impl(&state, "", &headers).await
}

pub async fn serve_path(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Response {
    serve_impl(&state, &path, &headers).await
}

async fn serve_impl(state: &AppState, raw_path: &str, headers: &HeaderMap) -> Response {
    state.log_headers_if_needed(headers);

    let full = resolve_path(&state.storage_path, raw_path);
    if !full.starts_with(&state.storage_path) {
        return challenge_response();
    }

    // Un directorio existente se lista; cualquier otra cosa se lee.
    let perm = if full.is_dir() {
        Permission::List
    } else {
        Permission::Read
    };

    if check_access(headers, &state.access, raw_path, perm).is_err() {
        metrics::SOLICITUDES_DENEGADAS.inc();
        return challenge_response();
    }
    metrics::SOLICITUDES_PERMITIDAS.inc();

    if full.is_dir() {
        match list_directory(&full) {
            Ok(listing) => {
                metrics::LISTADOS_SERVIDOS.inc();
                (StatusCode::OK, Json(listing)).into_response()
            }
            Err(err) => {
                eprintln!("❌ Error al listar {}: {}", full.display(), err);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    } else {
        // Abrir el archivo de forma asíncrona; si no existe, 404
        let file = match File::open(&full).await {
            Ok(file) => file,
            Err(_) => return StatusCode::NOT_FOUND.into_response(),
        };
        metrics::DESCARGAS_SERVIDAS.inc();

        let stream = ReaderStream::new(file);
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(Body::from_stream(stream))
            .unwrap()
    }
}

pub async fn upload_root(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    upload_impl(&state, "", &headers, body).await
}

pub async fn upload_path(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    upload_impl(&state, &path, &headers, body).await
}

async fn upload_impl(state: &AppState, raw_path: &str, headers: &HeaderMap, body: Body) -> Response {
    state.log_headers_if_needed(headers);

    let full = resolve_path(&state.storage_path, raw_path);
    if !full.starts_with(&state.storage_path) {
        return challenge_response();
    }

    if check_access(headers, &state.access, raw_path, Permission::Write).is_err() {
        metrics::SOLICITUDES_DENEGADAS.inc();
        return challenge_response();
    }
    metrics::SOLICITUDES_PERMITIDAS.inc();

    if full.is_dir() {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    match write_stream(&full, body).await {
        Ok(written) => {
            metrics::SUBIDAS_COMPLETADAS.inc();
            println!("📤 Subida completada: {} ({} bytes)", full.display(), written);
            StatusCode::OK.into_response()
        }
        Err(err) => {
            // El error de sistema se registra pero no se expone al cliente
            eprintln!("❌ Error al escribir {}: {}", full.display(), err);
            StatusCode::METHOD_NOT_ALLOWED.into_response()
        }
    }
}

/// Vuelca el cuerpo de la petición a disco por bloques, creando los
/// directorios intermedios que falten. Una conexión cortada a medias deja
/// el archivo parcial, igual que un corte durante la escritura.
async fn write_stream(path: &StdPath, body: Body) -> Result<u64> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut file = File::create(path).await?;
    let mut stream = body.into_data_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| CustodioError::Http(e.to_string()))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(written)
}

pub async fn get_storage_info(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    state.log_headers_if_needed(&headers);

    if check_access(&headers, &state.access, "api/storage", Permission::Read).is_err() {
        metrics::SOLICITUDES_DENEGADAS.inc();
        return challenge_response();
    }
    metrics::SOLICITUDES_PERMITIDAS.inc();

    match fs2::statvfs(&state.storage_path) {
        Ok(stats) => {
            let total_space = stats.total_space();
            let free_space = stats.free_space();

            let info = StorageInfo {
                total_space_bytes: total_space,
                used_space_bytes: total_space - free_space,
                storage_path: state.storage_path.to_str().unwrap_or_default().to_string(),
                uptime_seconds: std::time::SystemTime::now()
                    .duration_since(state.start_time)
                    .unwrap_or_default()
                    .as_secs(),
            };
            (StatusCode::OK, Json(info)).into_response()
        }
        Err(err) => {
            eprintln!("❌ Error al obtener info de almacenamiento: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
