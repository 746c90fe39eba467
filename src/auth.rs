//! Módulo de autenticación y autorización para Custodio.
//!
//! Mantiene el árbol de reglas por ruta, la tabla de usuarios y la decisión
//! de acceso por petición. El árbol se construye una sola vez al arrancar y
//! después se comparte en modo sólo lectura entre todos los handlers.

use std::collections::HashMap;
use std::path::Path as StdPath;

use axum::body::Body;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;

use crate::error::Result;

/// Operación que una regla puede conceder o negar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    Read,
    Write,
    List,
}

/// Conjunto de permisos de una regla, parseado de un subconjunto de "rwl".
///
/// El orden y los duplicados son irrelevantes; caracteres desconocidos se
/// ignoran.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PermissionSet {
    read: bool,
    write: bool,
    list: bool,
}

impl PermissionSet {
    pub fn parse(perms: &str) -> Self {
        let mut set = Self::default();
        for c in perms.chars() {
            match c {
                'r' => set.read = true,
                'w' => set.write = true,
                'l' => set.list = true,
                _ => {}
            }
        }
        set
    }

    pub fn contains(&self, perm: Permission) -> bool {
        match perm {
            Permission::Read => self.read,
            Permission::Write => self.write,
            Permission::List => self.list,
        }
    }
}

/// Divide una ruta en segmentos útiles, descartando vacíos, `.` y `..`.
///
/// Tanto la inserción de reglas como el recorrido por petición usan esta
/// misma normalización, así que una ruta nunca puede salirse de la raíz.
pub fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
}

/// Nodo del árbol de reglas: un segmento de ruta con sus reglas por usuario
/// y sus hijos, poseídos en exclusiva. El nodo raíz tiene segmento vacío.
#[derive(Debug, Default)]
pub struct PathConfig {
    segment: String,
    rules: HashMap<String, PermissionSet>,
    children: HashMap<String, PathConfig>,
}

impl PathConfig {
    fn new(segment: &str) -> Self {
        // Invariante: un segmento nunca contiene separador de ruta.
        debug_assert!(!segment.contains('/'));
        Self {
            segment: segment.to_string(),
            rules: HashMap::new(),
            children: HashMap::new(),
        }
    }

    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// Inserta (sobrescribe) la regla de `user` en el nodo final de `path`,
    /// creando los nodos intermedios que falten.
    pub fn insert(&mut self, path: &str, user: &str, perms: PermissionSet) {
        let mut node = self;
        for seg in split_segments(path) {
            node = node
                .children
                .entry(seg.to_string())
                .or_insert_with(|| PathConfig::new(seg));
        }
        node.rules.insert(user.to_string(), perms);
    }

    /// Recorre el árbol desde la raíz hasta el nodo más profundo que casa con
    /// `path`. Un hijo ausente corta el recorrido sin error; el resultado
    /// siempre contiene al menos la raíz.
    pub fn walk(&self, path: &str) -> Vec<&PathConfig> {
        let mut nodes = vec![self];
        let mut node = self;
        for seg in split_segments(path) {
            match node.children.get(seg) {
                Some(child) => {
                    node = child;
                    nodes.push(child);
                }
                None => break,
            }
        }
        nodes
    }
}

#[derive(Deserialize)]
struct AccessFile {
    paths: Vec<PathEntry>,
    users: Vec<UserEntry>,
}

#[derive(Deserialize)]
struct PathEntry {
    path: String,
    user: String,
    perms: String,
}

#[derive(Deserialize)]
struct UserEntry {
    user: String,
    psw: String,
}

/// Credenciales extraídas de un encabezado `Authorization: Basic`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub psw: String,
}

/// Configuración de acceso: árbol de reglas + tabla de usuarios en claro.
///
/// Las contraseñas se guardan y comparan en texto plano, igual que viajan
/// (Base64 no es cifrado).
#[derive(Debug, Default)]
pub struct AccessConfig {
    root: PathConfig,
    users: HashMap<String, String>,
}

impl AccessConfig {
    /// Carga la configuración desde un archivo JSON. Cualquier fallo se
    /// registra y deja la configuración vacía: el servidor arranca igual,
    /// con acceso permisivo.
    pub fn load(path: &StdPath) -> Self {
        match Self::try_load(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!(
                    "❌ Error al leer la configuración de acceso {}: {}",
                    path.display(),
                    err
                );
                Self::default()
            }
        }
    }

    fn try_load(path: &StdPath) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let file: AccessFile = serde_json::from_str(&text)?;

        let mut config = Self::default();
        for entry in &file.paths {
            config.add_rule(&entry.path, &entry.user, PermissionSet::parse(&entry.perms));
        }
        for entry in &file.users {
            config.add_user(&entry.user, &entry.psw);
        }
        Ok(config)
    }

    pub fn add_rule(&mut self, path: &str, user: &str, perms: PermissionSet) {
        self.root.insert(path, user, perms);
    }

    /// Registra un usuario; entradas duplicadas pisan la anterior. El id `*`
    /// está reservado para el llamante anónimo y nunca se almacena.
    pub fn add_user(&mut self, user: &str, psw: &str) {
        if user == "*" {
            eprintln!("⚠️ Ignorando entrada de usuario '*': identidad reservada");
            return;
        }
        self.users.insert(user.to_string(), psw.to_string());
    }

    /// Comprueba usuario y contraseña por igualdad exacta de cadenas.
    pub fn verify(&self, user: &str, psw: &str) -> bool {
        self.users.get(user).map(|e| e == psw).unwrap_or(false)
    }

    /// Decide si `creds` puede ejecutar `perm` sobre `path`.
    ///
    /// Función total: cualquier combinación de entradas produce un veredicto,
    /// nunca un pánico. La decisión arranca en permitido (árbol sin reglas =
    /// acceso abierto) y cada nodo del recorrido que tenga una regla para la
    /// identidad efectiva —o para `*` como respaldo en ese mismo nodo— la
    /// sobrescribe por completo: el nodo más profundo siempre gana.
    pub fn allows(&self, path: &str, perm: Permission, creds: Option<&Credentials>) -> bool {
        let identity = match creds {
            None => "*",
            Some(c) => match self.users.get(&c.user) {
                // Usuario desconocido: se degrada a anónimo, no es un error.
                None => "*",
                Some(expected) if *expected == c.psw => c.user.as_str(),
                // Contraseña incorrecta de un usuario conocido: rechazo
                // inmediato, sin recorrer el árbol.
                Some(_) => return false,
            },
        };

        let mut decision = true;
        for node in self.root.walk(path) {
            if let Some(set) = node.rules.get(identity).or_else(|| node.rules.get("*")) {
                decision = set.contains(perm);
            }
        }
        decision
    }
}

/// Capa de acceso opcional. Sin configuración (arranque sin `ACCESS_CONFIG`)
/// no se inspecciona ningún encabezado y todo está permitido.
#[derive(Debug, Default)]
pub struct AccessManager {
    config: Option<AccessConfig>,
}

impl AccessManager {
    pub fn disabled() -> Self {
        Self { config: None }
    }

    pub fn with_config(config: AccessConfig) -> Self {
        Self {
            config: Some(config),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_some()
    }

    pub fn is_authorised(
        &self,
        path: &str,
        perm: Permission,
        creds: Option<&Credentials>,
    ) -> bool {
        match &self.config {
            None => true,
            Some(config) => config.allows(path, perm, creds),
        }
    }
}

/// Decodifica el payload de `Authorization: Basic`. Devuelve `None` si el
/// Base64 no decodifica, no es UTF-8, o no separa exactamente un par
/// `usuario:contraseña`.
pub fn decode_basic(payload: &str) -> Option<Credentials> {
    let bytes = BASE64.decode(payload.trim()).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    let items: Vec<&str> = text.split(':').collect();
    if items.len() != 2 {
        return None;
    }
    Some(Credentials {
        user: items[0].to_string(),
        psw: items[1].to_string(),
    })
}

/// Comprueba si la petición puede ejecutar `perm` sobre `path`.
///
/// Un encabezado ausente es el llamante anónimo; un encabezado que no sea
/// `Basic` o no decodifique es rechazo inmediato, sin consultar las reglas.
pub fn check_access(
    headers: &HeaderMap,
    access: &AccessManager,
    path: &str,
    perm: Permission,
) -> std::result::Result<(), StatusCode> {
    if !access.is_enabled() {
        return Ok(());
    }

    let creds = match headers.get(header::AUTHORIZATION) {
        None => None,
        Some(value) => {
            let raw = value.to_str().unwrap_or("").trim();
            let Some(payload) = raw.strip_prefix("Basic ") else {
                println!("🚫 Authorization con esquema no soportado: '{}'", path);
                return Err(StatusCode::UNAUTHORIZED);
            };
            match decode_basic(payload) {
                Some(c) => Some(c),
                None => {
                    println!("🚫 Encabezado Authorization mal formado: '{}'", path);
                    return Err(StatusCode::UNAUTHORIZED);
                }
            }
        }
    };

    if access.is_authorised(path, perm, creds.as_ref()) {
        Ok(())
    } else {
        let quien = creds.as_ref().map(|c| c.user.as_str()).unwrap_or("*");
        println!("🚫 Acceso denegado: {:?} sobre '{}' para '{}'", perm, path, quien);
        Err(StatusCode::UNAUTHORIZED)
    }
}

/// Respuesta de desafío: 401 con `WWW-Authenticate` para que el cliente
/// reintente con credenciales Basic.
pub fn challenge_response() -> Response {
    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header(header::WWW_AUTHENTICATE, "Basic realm=\"Test\"")
        .header(header::CONTENT_TYPE, "text/html")
        .body(Body::from("Not authenticated\n"))
        .unwrap()
}
