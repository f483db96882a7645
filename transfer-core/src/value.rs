//! The `UserValue` trait binds each of the eleven supported native types to its [`DataType`] tag
//! and to the type-erased [`UserType`] representation, replacing the original's compile-time
//! `TemplateUserTypeMap` vtable-filling macro with a small, explicit dispatch table.

use transfer_types::{DataType, UserType};

/// A native type in the closed, eleven-member set of types an [`NDRegisterAccessor`] can be
/// instantiated over.
///
/// [`NDRegisterAccessor`]: crate::accessor::NDRegisterAccessor
pub trait UserValue: Clone + PartialEq + std::fmt::Debug + Default + Send + Sync + 'static {
    /// The runtime tag identifying this type.
    const DATA_TYPE: DataType;

    /// Wraps `self` into the type-erased representation.
    fn to_user_type(&self) -> UserType;

    /// Unwraps a type-erased value into `Self`, converting numerically (saturating) if the
    /// tags don't match, or parsing/formatting through `String`.
    fn from_user_type(value: &UserType) -> Self;
}

macro_rules! impl_user_value_numeric {
    ($t:ty, $tag:ident, $variant:ident) => {
        impl UserValue for $t {
            const DATA_TYPE: DataType = DataType::$tag;

            fn to_user_type(&self) -> UserType {
                UserType::$variant(*self)
            }

            fn from_user_type(value: &UserType) -> Self {
                match value {
                    UserType::$variant(v) => *v,
                    other => {
                        let f = other.to_f64().unwrap_or_default();
                        saturating_from_f64(f)
                    }
                }
            }
        }
    };
}

trait SaturatingFromF64 {
    fn saturating_from_f64(v: f64) -> Self;
}

fn saturating_from_f64<T: SaturatingFromF64>(v: f64) -> T {
    T::saturating_from_f64(v)
}

macro_rules! impl_saturating_from_f64_int {
    ($t:ty) => {
        impl SaturatingFromF64 for $t {
            fn saturating_from_f64(v: f64) -> Self {
                v.trunc().clamp(<$t>::MIN as f64, <$t>::MAX as f64) as $t
            }
        }
    };
}

impl_saturating_from_f64_int!(i8);
impl_saturating_from_f64_int!(u8);
impl_saturating_from_f64_int!(i16);
impl_saturating_from_f64_int!(u16);
impl_saturating_from_f64_int!(i32);
impl_saturating_from_f64_int!(u32);
impl_saturating_from_f64_int!(i64);
impl_saturating_from_f64_int!(u64);

impl SaturatingFromF64 for f32 {
    fn saturating_from_f64(v: f64) -> Self {
        v as f32
    }
}

impl SaturatingFromF64 for f64 {
    fn saturating_from_f64(v: f64) -> Self {
        v
    }
}

impl_user_value_numeric!(i8, I8, I8);
impl_user_value_numeric!(u8, U8, U8);
impl_user_value_numeric!(i16, I16, I16);
impl_user_value_numeric!(u16, U16, U16);
impl_user_value_numeric!(i32, I32, I32);
impl_user_value_numeric!(u32, U32, U32);
impl_user_value_numeric!(i64, I64, I64);
impl_user_value_numeric!(u64, U64, U64);
impl_user_value_numeric!(f32, F32, F32);
impl_user_value_numeric!(f64, F64, F64);

impl UserValue for String {
    const DATA_TYPE: DataType = DataType::String;

    fn to_user_type(&self) -> UserType {
        UserType::String(self.clone())
    }

    fn from_user_type(value: &UserType) -> Self {
        match value {
            UserType::String(s) => s.clone(),
            other => other
                .to_f64()
                .map(|f| f.to_string())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_round_trips_through_user_type() {
        let v: i16 = 42;
        assert_eq!(i16::from_user_type(&v.to_user_type()), 42);
    }

    #[test]
    fn cross_type_conversion_saturates() {
        let big = UserType::I64(100_000);
        assert_eq!(u8::from_user_type(&big), u8::MAX);
    }

    #[test]
    fn string_conversion_formats_numerics() {
        let v = UserType::F64(3.5);
        assert_eq!(String::from_user_type(&v), "3.5");
    }
}
