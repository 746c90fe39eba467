use std::{env, net::SocketAddr, path::Path, path::PathBuf, sync::Arc};

use dotenvy::dotenv;

use custodio::auth::{AccessConfig, AccessManager};
use custodio::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let listen_addr = env::var("LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let storage_path = env::var("STORAGE_PATH").unwrap_or_else(|_| ".".to_string());
    let access_config_path = env::var("ACCESS_CONFIG").ok();
    let log_headers = env::var("LOG_HEADERS")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    // La capa de permisos sólo existe si se indica un archivo de acceso;
    // un archivo ilegible deja la capa activa pero sin reglas (todo abierto)
    let access = match &access_config_path {
        Some(path) => AccessManager::with_config(AccessConfig::load(Path::new(path))),
        None => AccessManager::disabled(),
    };

    let state = Arc::new(AppState {
        storage_path: PathBuf::from(&storage_path),
        access,
        log_headers,
        start_time: std::time::SystemTime::now(),
    });

    let app = build_router(state.clone());

    let addr: SocketAddr = listen_addr.parse()?;
    if state.access.is_enabled() {
        println!("🚀 Custodio escuchando en http://{} con restricciones de acceso", addr);
    } else {
        println!("🚀 Custodio escuchando en http://{} sin restricciones de acceso", addr);
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
