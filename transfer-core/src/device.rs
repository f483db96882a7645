//! [`Device`]: the top-level handle applications open, plus [`create_accessor`], the free
//! function that stands in for the original's generic `Backend::register_accessor::<T>()` (kept
//! off the `Backend` trait itself so `Arc<dyn Backend>` stays object safe).

use std::sync::{Arc, Mutex};

use transfer_types::{AccessModeFlags, Error, RegisterPath, Result};

use crate::accessor::{NDRegisterAccessor, OneDRegisterAccessor, ScalarRegisterAccessor};
use crate::backend::logical_name_mapping::LogicalNameMappingBackend;
use crate::backend::{self, Backend, RegisterCatalogue};
use crate::converter::FixedPointConverter;
use crate::cooked::CookedAccessor;
use crate::decorators::{CopyRegisterDecorator, IntConstantAccessor, IntVariableAccessor};
use crate::map::lmap::LogicalTarget;
use crate::raw::RawAccessor;
use crate::value::UserValue;

/// An open connection to one backend, opened from an `sdm://` uri or a dmap alias.
#[derive(Debug, Clone)]
pub struct Device {
    backend: Arc<dyn Backend>,
}

impl Device {
    /// Opens `uri_or_alias`. Strings starting with `sdm://` are used directly; anything else is
    /// looked up in the dmap file.
    pub fn open(uri_or_alias: &str) -> Result<Self> {
        let uri = if uri_or_alias.starts_with("sdm://") {
            uri_or_alias.to_string()
        } else {
            crate::map::dmap::resolve_alias(uri_or_alias)?
        };
        let backend = backend::create_backend(&uri)?;
        backend.open()?;
        Ok(Self { backend })
    }

    pub fn close(&self) -> Result<()> {
        self.backend.close()
    }

    pub fn is_open(&self) -> bool {
        self.backend.is_open()
    }

    pub fn register_catalogue(&self) -> RegisterCatalogue {
        self.backend.register_catalogue()
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn get_scalar<T: UserValue>(&self, path: &RegisterPath) -> Result<ScalarRegisterAccessor<T>> {
        Ok(ScalarRegisterAccessor::new(create_accessor::<T>(
            &self.backend,
            path,
            AccessModeFlags::empty(),
        )?))
    }

    pub fn get_one_d<T: UserValue>(&self, path: &RegisterPath) -> Result<OneDRegisterAccessor<T>> {
        Ok(OneDRegisterAccessor::new(create_accessor::<T>(
            &self.backend,
            path,
            AccessModeFlags::empty(),
        )?))
    }

    pub fn get_accessor<T: UserValue>(
        &self,
        path: &RegisterPath,
        mode: AccessModeFlags,
    ) -> Result<Arc<Mutex<dyn NDRegisterAccessor<T>>>> {
        create_accessor::<T>(&self.backend, path, mode)
    }
}

/// Builds the typed accessor for `path` on `backend`: a plain `RawAccessor`+`CookedAccessor<T>`
/// pair for a numeric-addressed backend, or one of the five logical-name accessor kinds for a
/// [`LogicalNameMappingBackend`].
pub fn create_accessor<T: UserValue>(
    backend: &Arc<dyn Backend>,
    path: &RegisterPath,
    mode: AccessModeFlags,
) -> Result<Arc<Mutex<dyn NDRegisterAccessor<T>>>> {
    if let Some(lnm) = backend.as_any().downcast_ref::<LogicalNameMappingBackend>() {
        return create_logical_accessor::<T>(backend, lnm, path, mode);
    }
    create_raw_backed_accessor::<T>(backend, path, mode)
}

fn create_raw_backed_accessor<T: UserValue>(
    backend: &Arc<dyn Backend>,
    path: &RegisterPath,
    mode: AccessModeFlags,
) -> Result<Arc<Mutex<dyn NDRegisterAccessor<T>>>> {
    let catalogue = backend.register_catalogue();
    let info = catalogue.get(path)?;
    let converter = FixedPointConverter::new(info.width, info.fractional_bits, info.signed)?;
    let raw = Arc::new(Mutex::new(RawAccessor::new(
        Arc::clone(backend),
        path.clone(),
        info.bar,
        info.address,
        info.n_elements,
        info.readable,
        info.writeable,
    )));
    let cooked = CookedAccessor::<T>::new(
        raw,
        converter,
        0,
        info.n_elements,
        path.clone(),
        mode,
        info.readable,
        info.writeable,
    );
    Ok(Arc::new(Mutex::new(cooked)))
}

/// Resolves a logical-name target. The `device` field on `Register`/`Range`/`Channel` targets is
/// not used to cross to a separately-opened `Device` — every logical path in this port resolves
/// against the single inner backend the `LogicalNameMappingBackend` was opened with. Multi-device
/// logical maps are out of scope here; see `DESIGN.md`.
fn create_logical_accessor<T: UserValue>(
    backend: &Arc<dyn Backend>,
    lnm: &LogicalNameMappingBackend,
    path: &RegisterPath,
    mode: AccessModeFlags,
) -> Result<Arc<Mutex<dyn NDRegisterAccessor<T>>>> {
    let target = lnm.target(path)?.clone();
    match target {
        LogicalTarget::IntConstant(value) => {
            Ok(Arc::new(Mutex::new(IntConstantAccessor::<T>::new(path.clone(), value))))
        }
        LogicalTarget::IntVariable(_) => Ok(Arc::new(Mutex::new(IntVariableAccessor::<T>::new(
            path.clone(),
            Arc::clone(backend),
        )))),
        LogicalTarget::Register { register, .. } => {
            let inner = lnm.inner().ok_or_else(|| {
                Error::NotImplemented(format!("{path}: logical register target has no inner backend"))
            })?;
            create_raw_backed_accessor::<T>(inner, &RegisterPath::new(register), mode)
        }
        LogicalTarget::Range {
            register,
            first_index,
            length,
            ..
        } => {
            let inner = lnm.inner().ok_or_else(|| {
                Error::NotImplemented(format!("{path}: logical range target has no inner backend"))
            })?;
            let whole = create_raw_backed_accessor::<T>(inner, &RegisterPath::new(register), mode)?;
            Ok(Arc::new(Mutex::new(CopyRegisterDecorator::new(
                whole,
                0,
                first_index,
                1,
                length,
            ))))
        }
        LogicalTarget::Channel { register, channel, .. } => {
            let inner = lnm.inner().ok_or_else(|| {
                Error::NotImplemented(format!("{path}: logical channel target has no inner backend"))
            })?;
            let whole = create_raw_backed_accessor::<T>(inner, &RegisterPath::new(register), mode)?;
            Ok(Arc::new(Mutex::new(CopyRegisterDecorator::new(whole, 0, channel, 1, 1))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RegisterInfo;

    fn dummy_with_one_register() -> Arc<dyn Backend> {
        let mut catalogue = RegisterCatalogue::new();
        catalogue.insert(RegisterInfo::scalar("/value", 0, 0x20));
        let backend: Arc<dyn Backend> = Arc::new(crate::backend::dummy::DummyBackend::new(catalogue));
        backend.open().unwrap();
        backend.write(0, 0x20, &[5]).unwrap();
        backend
    }

    #[test]
    fn builds_a_cooked_accessor_from_the_catalogue() {
        let backend = dummy_with_one_register();
        let accessor = create_accessor::<i32>(&backend, &RegisterPath::new("/value"), AccessModeFlags::empty()).unwrap();
        accessor.lock().unwrap().read().unwrap();
        assert_eq!(accessor.lock().unwrap().channel(0)[0], 5);
    }

    #[test]
    fn resolves_a_logical_constant() {
        let xml = r#"
            <logicalNameMap>
              <redirectedRegister name="/scale">
                <targetType>INT_CONSTANT</targetType>
                <value>7</value>
              </redirectedRegister>
            </logicalNameMap>
        "#;
        let map = crate::map::lmap::parse(xml).unwrap();
        let backend: Arc<dyn Backend> = Arc::new(LogicalNameMappingBackend::new(map, None));
        let accessor =
            create_accessor::<i32>(&backend, &RegisterPath::new("/scale"), AccessModeFlags::empty()).unwrap();
        accessor.lock().unwrap().read().unwrap();
        assert_eq!(accessor.lock().unwrap().channel(0)[0], 7);
    }
}
