use strum::{Display, EnumIter};

/// The closed, eleven-member set of user-visible value types supported by the transfer
/// subsystem, mirroring the original implementation's `SupportedUserTypes` fusion map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display)]
pub enum DataType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    String,
}

impl DataType {
    /// All eleven supported types, in the original's declaration order.
    pub const ALL: [DataType; 11] = [
        DataType::I8,
        DataType::U8,
        DataType::I16,
        DataType::U16,
        DataType::I32,
        DataType::U32,
        DataType::I64,
        DataType::U64,
        DataType::F32,
        DataType::F64,
        DataType::String,
    ];

    /// `true` for the string type, where arithmetic convenience operators aren't provided.
    pub fn is_string(&self) -> bool {
        matches!(self, DataType::String)
    }
}

/// A tagged-union value carrying one of the eleven supported payloads.
///
/// Used wherever the original relied on `boost::any`-like dispatch, e.g. `get_as_cooked` /
/// `set_as_cooked` against an accessor whose compile-time type differs from the caller's.
#[derive(Debug, Clone, PartialEq)]
pub enum UserType {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
}

impl UserType {
    /// The runtime type tag of this value.
    pub fn data_type(&self) -> DataType {
        match self {
            UserType::I8(_) => DataType::I8,
            UserType::U8(_) => DataType::U8,
            UserType::I16(_) => DataType::I16,
            UserType::U16(_) => DataType::U16,
            UserType::I32(_) => DataType::I32,
            UserType::U32(_) => DataType::U32,
            UserType::I64(_) => DataType::I64,
            UserType::U64(_) => DataType::U64,
            UserType::F32(_) => DataType::F32,
            UserType::F64(_) => DataType::F64,
            UserType::String(_) => DataType::String,
        }
    }

    /// Converts to an `f64`, the common numeric denominator used by the fixed-point converter.
    /// Strings parse via `f64::from_str`; non-finite or unparsable strings yield `None`.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            UserType::I8(v) => Some(*v as f64),
            UserType::U8(v) => Some(*v as f64),
            UserType::I16(v) => Some(*v as f64),
            UserType::U16(v) => Some(*v as f64),
            UserType::I32(v) => Some(*v as f64),
            UserType::U32(v) => Some(*v as f64),
            UserType::I64(v) => Some(*v as f64),
            UserType::U64(v) => Some(*v as f64),
            UserType::F32(v) => Some(*v as f64),
            UserType::F64(v) => Some(*v),
            UserType::String(s) => s.trim().parse::<f64>().ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn all_matches_iter_order() {
        let iterated: Vec<DataType> = DataType::iter().collect();
        assert_eq!(iterated, DataType::ALL.to_vec());
    }

    #[test]
    fn only_string_is_is_string() {
        assert!(DataType::String.is_string());
        assert!(!DataType::F64.is_string());
    }

    #[test]
    fn user_type_round_trips_data_type() {
        let v = UserType::I32(-7);
        assert_eq!(v.data_type(), DataType::I32);
        assert_eq!(v.to_f64(), Some(-7.0));
    }
}
