//! Translation between 32-bit raw device words and the eleven supported user-visible types.

use transfer_types::{DataType, Error, Result, UserType};

fn mask(width: u8) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1u32 << width) - 1
    }
}

/// Stateless-per-instance translator between raw 32-bit device words and cooked user values.
///
/// Constructed from `(width, fractional_bits, is_signed)`. The raw value is sign-extended (if
/// signed) from `width` bits and interpreted as a fixed-point number with `fractional_bits`
/// fractional bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPointConverter {
    width: u8,
    fractional_bits: i32,
    is_signed: bool,
}

impl FixedPointConverter {
    /// Builds a converter. Fails with `WrongParameter` if `width` is zero or exceeds 32 bits.
    pub fn new(width: u8, fractional_bits: i32, is_signed: bool) -> Result<Self> {
        if width == 0 || width > 32 {
            return Err(Error::WrongParameter(format!(
                "fixed-point width must be in 1..=32, got {width}"
            )));
        }
        if fractional_bits.unsigned_abs() > 62 {
            return Err(Error::WrongParameter(format!(
                "fractional bit count out of supported range: {fractional_bits}"
            )));
        }
        Ok(Self {
            width,
            fractional_bits,
            is_signed,
        })
    }

    /// A converter for a plain 32-bit integer register with no fractional scaling.
    pub fn raw32(is_signed: bool) -> Self {
        Self {
            width: 32,
            fractional_bits: 0,
            is_signed,
        }
    }

    /// Number of significant bits in the raw word.
    pub fn width(&self) -> u8 {
        self.width
    }

    /// Number of fractional bits of the fixed-point representation.
    pub fn fractional_bits(&self) -> i32 {
        self.fractional_bits
    }

    /// Whether the raw word is interpreted as signed.
    pub fn is_signed(&self) -> bool {
        self.is_signed
    }

    fn decode_to_f64(&self, raw: i32) -> f64 {
        let masked = (raw as u32) & mask(self.width);
        let unscaled: i64 = if self.is_signed && (masked >> (self.width - 1)) & 1 == 1 {
            masked as i64 - (1i64 << self.width)
        } else {
            masked as i64
        };
        unscaled as f64 * 2f64.powi(-self.fractional_bits)
    }

    fn encode_from_f64(&self, value: f64) -> i32 {
        let scaled = (value * 2f64.powi(self.fractional_bits)).round();
        let clamped = scaled.clamp(i64::MIN as f64, i64::MAX as f64) as i64;
        let masked = (clamped as u64 as u32) & mask(self.width);
        masked as i32
    }

    /// Converts a raw device word into the user value described by `target`.
    pub fn to_cooked(&self, raw: i32, target: DataType) -> UserType {
        let value = self.decode_to_f64(raw);
        match target {
            DataType::F32 => UserType::F32(value as f32),
            DataType::F64 => UserType::F64(value),
            DataType::String => {
                let digits = self.fractional_bits.max(0) as usize;
                UserType::String(format!("{value:.digits$}"))
            }
            DataType::I8 => UserType::I8(value.trunc().clamp(i8::MIN as f64, i8::MAX as f64) as i8),
            DataType::U8 => UserType::U8(value.trunc().clamp(u8::MIN as f64, u8::MAX as f64) as u8),
            DataType::I16 => UserType::I16(value.trunc().clamp(i16::MIN as f64, i16::MAX as f64) as i16),
            DataType::U16 => UserType::U16(value.trunc().clamp(u16::MIN as f64, u16::MAX as f64) as u16),
            DataType::I32 => UserType::I32(value.trunc().clamp(i32::MIN as f64, i32::MAX as f64) as i32),
            DataType::U32 => UserType::U32(value.trunc().clamp(u32::MIN as f64, u32::MAX as f64) as u32),
            DataType::I64 => UserType::I64(value.trunc().clamp(i64::MIN as f64, i64::MAX as f64) as i64),
            DataType::U64 => UserType::U64(value.trunc().clamp(u64::MIN as f64, u64::MAX as f64) as u64),
        }
    }

    /// Converts a user value back into a raw device word. Fails with `WrongParameter` when a
    /// string value cannot be parsed as a number.
    pub fn to_raw(&self, cooked: &UserType) -> Result<i32> {
        let value = match cooked {
            UserType::String(s) => s.trim().parse::<f64>().map_err(|_| {
                Error::WrongParameter(format!("cannot parse '{s}' as a number"))
            })?,
            other => other.to_f64().unwrap_or_default(),
        };
        Ok(self.encode_from_f64(value))
    }

    /// Vectorised [`Self::to_cooked`].
    pub fn to_cooked_buffer(&self, raws: &[i32], target: DataType, dst: &mut Vec<UserType>) {
        dst.clear();
        dst.extend(raws.iter().map(|r| self.to_cooked(*r, target)));
    }

    /// Vectorised [`Self::to_raw`].
    pub fn to_raw_buffer(&self, srcs: &[UserType], dst: &mut Vec<i32>) -> Result<()> {
        dst.clear();
        for v in srcs {
            dst.push(self.to_raw(v)?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn scalar_round_trip_s1() {
        // S1: 32-bit unsigned register, write 0xDEADBEEF, read back as i32.
        let conv = FixedPointConverter::new(32, 0, true).unwrap();
        let cooked = conv.to_cooked(0xDEADBEEFu32 as i32, DataType::I32);
        assert_eq!(cooked, UserType::I32(-559038737));
    }

    #[test]
    fn rejects_invalid_width() {
        assert!(FixedPointConverter::new(0, 0, true).is_err());
        assert!(FixedPointConverter::new(33, 0, true).is_err());
    }

    #[quickcheck]
    fn round_trip_signed(raw16: i16, fractional_bits: u8) -> bool {
        let fb = (fractional_bits % 8) as i32;
        let conv = FixedPointConverter::new(16, fb, true).unwrap();
        let raw = raw16 as i32 & 0xFFFF;
        let cooked = conv.to_cooked(raw, DataType::F64);
        conv.to_raw(&cooked).unwrap() == raw
    }

    #[quickcheck]
    fn round_trip_unsigned(raw: u16, fractional_bits: u8) -> bool {
        let fb = (fractional_bits % 8) as i32;
        let conv = FixedPointConverter::new(16, fb, false).unwrap();
        let raw = raw as i32;
        let cooked = conv.to_cooked(raw, DataType::F64);
        conv.to_raw(&cooked).unwrap() == raw
    }

    #[test]
    fn string_round_trip_is_idempotent() {
        let conv = FixedPointConverter::new(16, 4, true).unwrap();
        for raw in [-32768i32, -1, 0, 1, 32767] {
            let masked = (raw as u32 & mask(16)) as i32;
            let s = conv.to_cooked(masked, DataType::String);
            let back = conv.to_raw(&s).unwrap();
            assert_eq!(back, masked);
        }
    }

    #[test]
    fn integer_cooked_truncates_and_saturates() {
        let conv = FixedPointConverter::new(32, 4, true).unwrap();
        // raw encodes 9000.5 in Q28.4, far beyond i8 range -> saturate.
        let raw = conv.encode_from_f64(9000.9);
        assert_eq!(conv.to_cooked(raw, DataType::I8), UserType::I8(i8::MAX));
        // truncation toward zero, not rounding.
        let raw_small = conv.encode_from_f64(3.9);
        assert_eq!(conv.to_cooked(raw_small, DataType::I32), UserType::I32(3));
    }
}
