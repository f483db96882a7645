//! `LogicalNameMappingBackend`: resolves a logical register path to one of the five target
//! kinds in [`crate::map::lmap`], delegating raw word I/O to the wrapped inner backend for
//! register/range/channel targets. Constants and variables never touch a backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use transfer_types::{Error, RegisterPath, Result};

use crate::backend::{Backend, RegisterCatalogue, RegisterInfo, SdmUri};
use crate::map::lmap::{self, LogicalNameMap, LogicalTarget};

#[derive(Debug)]
pub struct LogicalNameMappingBackend {
    inner: Option<Arc<dyn Backend>>,
    map: LogicalNameMap,
    open: AtomicBool,
    /// Backing store for `INT_VARIABLE` targets, keyed by path, since they are writeable but
    /// don't belong to any wire-level backend.
    variables: Mutex<std::collections::HashMap<RegisterPath, i64>>,
}

impl LogicalNameMappingBackend {
    pub fn new(map: LogicalNameMap, inner: Option<Arc<dyn Backend>>) -> Self {
        let mut variables = std::collections::HashMap::new();
        for path in map.paths() {
            if let Ok(LogicalTarget::IntVariable(v)) = map.get(path) {
                variables.insert(path.clone(), *v);
            }
        }
        Self {
            inner,
            map,
            open: AtomicBool::new(false),
            variables: Mutex::new(variables),
        }
    }

    pub fn target(&self, path: &RegisterPath) -> Result<&LogicalTarget> {
        self.map.get(path)
    }

    pub fn inner(&self) -> Option<&Arc<dyn Backend>> {
        self.inner.as_ref()
    }

    pub fn read_variable(&self, path: &RegisterPath) -> Result<i64> {
        self.variables
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .copied()
            .ok_or_else(|| Error::RegisterDoesNotExist(path.to_string()))
    }

    pub fn write_variable(&self, path: &RegisterPath, value: i64) -> Result<()> {
        let mut vars = self.variables.lock().unwrap_or_else(|e| e.into_inner());
        if !vars.contains_key(path) {
            return Err(Error::RegisterDoesNotExist(path.to_string()));
        }
        vars.insert(path.clone(), value);
        Ok(())
    }
}

impl Backend for LogicalNameMappingBackend {
    fn open(&self) -> Result<()> {
        if let Some(inner) = &self.inner {
            inner.open()?;
        }
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if let Some(inner) = &self.inner {
            inner.close()?;
        }
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn read(&self, _bar: u8, _address: u32, _data: &mut [i32]) -> Result<()> {
        Err(Error::NotImplemented(
            "logical name mapping backends resolve registers by path; use a register accessor"
                .to_string(),
        ))
    }

    fn write(&self, _bar: u8, _address: u32, _data: &[i32]) -> Result<()> {
        Err(Error::NotImplemented(
            "logical name mapping backends resolve registers by path; use a register accessor"
                .to_string(),
        ))
    }

    fn register_catalogue(&self) -> RegisterCatalogue {
        let mut catalogue = RegisterCatalogue::new();
        for path in self.map.paths() {
            let Ok(target) = self.map.get(path) else { continue };
            let mut info = RegisterInfo::scalar(path.to_string(), 0, 0);
            info.writeable = target.is_writeable();
            catalogue.insert(info);
        }
        catalogue
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub(crate) fn create(uri: &SdmUri) -> Result<Arc<dyn Backend>> {
    let lmap_file = uri.parameters.first().ok_or_else(|| {
        Error::WrongParameter("lmap backend requires a map-file parameter".to_string())
    })?;
    let map = lmap::load_file(lmap_file)?;
    Ok(Arc::new(LogicalNameMappingBackend::new(map, None)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <logicalNameMap>
          <redirectedRegister name="/scale">
            <targetType>INT_CONSTANT</targetType>
            <value>42</value>
          </redirectedRegister>
          <redirectedRegister name="/offset">
            <targetType>INT_VARIABLE</targetType>
            <value>7</value>
          </redirectedRegister>
        </logicalNameMap>
    "#;

    #[test]
    fn constant_target_is_read_only_in_the_catalogue() {
        let backend = LogicalNameMappingBackend::new(lmap::parse(SAMPLE).unwrap(), None);
        let catalogue = backend.register_catalogue();
        let info = catalogue.get(&RegisterPath::new("/scale")).unwrap();
        assert!(!info.writeable);
    }

    #[test]
    fn variable_target_is_writeable_and_stateful() {
        let backend = LogicalNameMappingBackend::new(lmap::parse(SAMPLE).unwrap(), None);
        let path = RegisterPath::new("/offset");
        assert_eq!(backend.read_variable(&path).unwrap(), 7);
        backend.write_variable(&path, 9).unwrap();
        assert_eq!(backend.read_variable(&path).unwrap(), 9);
    }
}
