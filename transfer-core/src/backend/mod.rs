//! The `Backend` trait, the register catalogue it exposes, and the `sdm://` URI-driven factory
//! registry used to open one.

pub mod dummy;
pub mod logical_name_mapping;
pub mod rebot;
pub mod shared_dummy;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use transfer_types::{AccessModeFlags, Error, RegisterPath, Result};

/// Static description of one addressable register, as recorded in a numeric-address map, a
/// logical-name map, or synthesised by a backend that has no map file at all.
#[derive(Debug, Clone)]
pub struct RegisterInfo {
    pub path: RegisterPath,
    pub bar: u8,
    pub address: u32,
    pub n_elements: usize,
    pub n_channels: usize,
    pub width: u8,
    pub fractional_bits: i32,
    pub signed: bool,
    pub readable: bool,
    pub writeable: bool,
}

impl RegisterInfo {
    pub fn scalar(path: impl Into<String>, bar: u8, address: u32) -> Self {
        Self {
            path: RegisterPath::new(path.into()),
            bar,
            address,
            n_elements: 1,
            n_channels: 1,
            width: 32,
            fractional_bits: 0,
            signed: true,
            readable: true,
            writeable: true,
        }
    }

    pub fn access_mode(&self) -> AccessModeFlags {
        AccessModeFlags::empty()
    }
}

/// A backend's complete set of addressable registers, keyed by canonical path.
#[derive(Debug, Clone, Default)]
pub struct RegisterCatalogue {
    registers: HashMap<RegisterPath, RegisterInfo>,
}

impl RegisterCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, info: RegisterInfo) {
        self.registers.insert(info.path.clone(), info);
    }

    pub fn get(&self, path: &RegisterPath) -> Result<&RegisterInfo> {
        self.registers
            .get(path)
            .ok_or_else(|| Error::RegisterDoesNotExist(path.to_string()))
    }

    pub fn contains(&self, path: &RegisterPath) -> bool {
        self.registers.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &RegisterPath> {
        self.registers.keys()
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }
}

/// A driver for one class of devices: performs raw, address-based, little-endian 32-bit word
/// I/O. Implementations must serialise concurrent wire access (typically behind an internal
/// `Mutex`).
pub trait Backend: Send + Sync + std::fmt::Debug {
    fn open(&self) -> Result<()>;
    fn close(&self) -> Result<()>;
    fn is_open(&self) -> bool;

    fn read(&self, bar: u8, address: u32, data: &mut [i32]) -> Result<()>;
    fn write(&self, bar: u8, address: u32, data: &[i32]) -> Result<()>;

    fn register_catalogue(&self) -> RegisterCatalogue;

    fn read_device_info(&self) -> Result<String> {
        Err(Error::NotImplemented("read_device_info".to_string()))
    }

    /// Lets [`crate::device`] downcast to a concrete backend where the generic `Backend`
    /// interface isn't enough — currently only [`logical_name_mapping::LogicalNameMappingBackend`]
    /// needs this, to resolve a logical path to its [`crate::map::lmap::LogicalTarget`].
    fn as_any(&self) -> &dyn std::any::Any;
}

/// A parsed `sdm://<host>/<backendType>[=p1,p2,...][/mapFile]` connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdmUri {
    pub host: String,
    pub backend_type: String,
    pub parameters: Vec<String>,
    pub map_file: Option<String>,
}

/// Parses an `sdm://` connection string. Fails with `WrongParameter` on anything else.
pub fn parse_sdm_uri(uri: &str) -> Result<SdmUri> {
    let rest = uri
        .strip_prefix("sdm://")
        .ok_or_else(|| Error::WrongParameter(format!("not an sdm:// uri: {uri}")))?;
    let mut segments = rest.splitn(2, '/');
    let host = segments.next().unwrap_or_default().to_string();
    let tail = segments.next().unwrap_or_default();
    let mut tail_parts = tail.splitn(2, '/');
    let backend_segment = tail_parts
        .next()
        .ok_or_else(|| Error::WrongParameter(format!("missing backend type in: {uri}")))?;
    let map_file = tail_parts.next().filter(|s| !s.is_empty()).map(str::to_string);

    let (backend_type, parameters) = match backend_segment.split_once('=') {
        Some((ty, params)) => (
            ty.to_string(),
            params.split(',').map(str::to_string).collect(),
        ),
        None => (backend_segment.to_string(), Vec::new()),
    };
    if backend_type.is_empty() {
        return Err(Error::WrongParameter(format!("empty backend type in: {uri}")));
    }
    Ok(SdmUri {
        host,
        backend_type,
        parameters,
        map_file,
    })
}

type BackendFactory = fn(&SdmUri) -> Result<Arc<dyn Backend>>;

fn registry() -> &'static Mutex<HashMap<String, BackendFactory>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, BackendFactory>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map: HashMap<String, BackendFactory> = HashMap::new();
        map.insert("dummy".to_string(), dummy::create as BackendFactory);
        map.insert(
            "shareddummy".to_string(),
            shared_dummy::create as BackendFactory,
        );
        map.insert("rebot".to_string(), rebot::create as BackendFactory);
        map.insert(
            "lmap".to_string(),
            logical_name_mapping::create as BackendFactory,
        );
        Mutex::new(map)
    })
}

fn instance_cache() -> &'static Mutex<HashMap<String, Arc<dyn Backend>>> {
    static CACHE: OnceLock<Mutex<HashMap<String, Arc<dyn Backend>>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Registers a new backend type under `name`. Additive only: registering an existing name
/// overwrites it, matching the original's "latest registration wins" plugin semantics.
pub fn register_backend_type(name: impl Into<String>, factory: BackendFactory) {
    registry()
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .insert(name.into(), factory);
}

/// Opens (or returns the cached instance for) the backend named by `uri`. Two calls with the
/// same uri return the same `Arc`, so two `Device` handles to the same alias share state.
pub fn create_backend(uri: &str) -> Result<Arc<dyn Backend>> {
    if let Some(cached) = instance_cache()
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .get(uri)
    {
        return Ok(Arc::clone(cached));
    }
    let parsed = parse_sdm_uri(uri)?;
    let factory = {
        let guard = registry().lock().unwrap_or_else(|e| e.into_inner());
        *guard
            .get(&parsed.backend_type)
            .ok_or_else(|| Error::NotImplemented(format!("unknown backend type '{}'", parsed.backend_type)))?
    };
    let backend = factory(&parsed)?;
    instance_cache()
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .insert(uri.to_string(), Arc::clone(&backend));
    Ok(backend)
}

pub(crate) fn check_alignment(address: u32, n_words: usize) -> Result<()> {
    if address % 4 != 0 {
        return Err(Error::WrongParameter(format!(
            "address {address:#x} is not 4-byte aligned"
        )));
    }
    let _ = n_words;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_with_parameters_and_no_map_file() {
        let parsed = parse_sdm_uri("sdm://./handshaking=PARENT,PAYLOAD,BUSY").unwrap();
        assert_eq!(parsed.host, ".");
        assert_eq!(parsed.backend_type, "handshaking");
        assert_eq!(parsed.parameters, vec!["PARENT", "PAYLOAD", "BUSY"]);
        assert_eq!(parsed.map_file, None);
    }

    #[test]
    fn parses_backend_with_map_file() {
        let parsed = parse_sdm_uri("sdm://./dummy=file.map/extra.map").unwrap();
        assert_eq!(parsed.backend_type, "dummy");
        assert_eq!(parsed.parameters, vec!["file.map"]);
        assert_eq!(parsed.map_file.as_deref(), Some("extra.map"));
    }

    #[test]
    fn rejects_non_sdm_uris() {
        assert!(parse_sdm_uri("http://example.org").is_err());
    }

    #[test]
    fn dummy_backend_is_cached_per_uri() {
        let a = create_backend("sdm://./dummy=cache-test.map").unwrap();
        let b = create_backend("sdm://./dummy=cache-test.map").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
