use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use lazy_static::lazy_static;
use prometheus::{register_int_counter, Encoder, IntCounter, TextEncoder};

use crate::auth::{challenge_response, check_access, Permission};
use crate::AppState;

lazy_static! {
    // Contadores del despacho de peticiones
    pub static ref SOLICITUDES_PERMITIDAS: IntCounter = register_int_counter!(
        "custodio_solicitudes_permitidas_total",
        "Número total de peticiones autorizadas"
    ).expect("No se pudo crear el contador SOLICITUDES_PERMITIDAS");

    pub static ref SOLICITUDES_DENEGADAS: IntCounter = register_int_counter!(
        "custodio_solicitudes_denegadas_total",
        "Número total de peticiones rechazadas con desafío 401"
    ).expect("No se pudo crear el contador SOLICITUDES_DENEGADAS");

    // Contadores de operaciones de archivo completadas
    pub static ref SUBIDAS_COMPLETADAS: IntCounter = register_int_counter!(
        "custodio_subidas_completadas_total",
        "Número total de subidas escritas a disco"
    ).expect("No se pudo crear el contador SUBIDAS_COMPLETADAS");

    pub static ref DESCARGAS_SERVIDAS: IntCounter = register_int_counter!(
        "custodio_descargas_servidas_total",
        "Número total de archivos transmitidos"
    ).expect("No se pudo crear el contador DESCARGAS_SERVIDAS");

    pub static ref LISTADOS_SERVIDOS: IntCounter = register_int_counter!(
        "custodio_listados_servidos_total",
        "Número total de listados de directorio servidos"
    ).expect("No se pudo crear el contador LISTADOS_SERVIDOS");
}

/// Gather all metrics and encode them in Prometheus format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub async fn serve_metrics(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    state.log_headers_if_needed(&headers);

    if check_access(&headers, &state.access, "api/metrics", Permission::Read).is_err() {
        SOLICITUDES_DENEGADAS.inc();
        return challenge_response();
    }
    SOLICITUDES_PERMITIDAS.inc();

    match gather_metrics() {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(err) => {
            eprintln!("❌ Error al codificar métricas: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
