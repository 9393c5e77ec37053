//! Codecs for scalar host types.

use std::any::type_name;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::codec::registry::CodecRegistry;
use crate::codec::{Codec, CodecRef, FieldType, WireType};
use crate::error::{CodecError, Result};
use crate::generator::TaggedGenerator;
use crate::parser::TaggedParser;
use crate::token::Token;
use crate::types::{Bytes, Module};

/// Wire width an integer codec writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Width {
    /// `@int` when the value fits in 32 bits, `@long` otherwise.
    Fit,
    Long,
    Double,
}

impl From<FieldType> for Width {
    fn from(hint: FieldType) -> Self {
        match hint {
            FieldType::Int => Width::Fit,
            FieldType::Long => Width::Long,
            FieldType::Double => Width::Double,
        }
    }
}

/// Integer codec for any host integer that widens losslessly to `i64`.
///
/// Decoding accepts `@int`, `@long`, and integral `@double` values, and
/// rejects anything outside the host type's range.
pub struct IntCodec<T> {
    width: Width,
    _marker: PhantomData<fn() -> T>,
}

impl<T> IntCodec<T> {
    fn new(width: Width) -> Self {
        Self {
            width,
            _marker: PhantomData,
        }
    }
}

fn read_integer(parser: &TaggedParser<'_>) -> Result<i64> {
    match parser.current() {
        Some(Token::Int | Token::Long) => parser.as_i64(),
        Some(Token::Double) => {
            let v = parser.as_f64()?;
            if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
                Ok(v as i64)
            } else {
                Err(parser.malformed(format!("{v} is not an integer")))
            }
        }
        _ => Err(parser.mismatch("@int")),
    }
}

impl<T> Codec<T> for IntCodec<T>
where
    T: Copy + Into<i64> + TryFrom<i64>,
{
    fn decode(&self, parser: &mut TaggedParser<'_>) -> Result<T> {
        let wide = read_integer(parser)?;
        T::try_from(wide).map_err(|_| {
            parser.malformed(format!("{wide} is out of range for {}", type_name::<T>()))
        })
    }

    fn encode(&self, gen: &mut TaggedGenerator, value: &T) -> Result<()> {
        let wide: i64 = (*value).into();
        match self.width {
            Width::Fit => match i32::try_from(wide) {
                Ok(v) => gen.write_int(v),
                Err(_) => gen.write_long(wide),
            },
            Width::Long => gen.write_long(wide),
            Width::Double => gen.write_double(wide as f64),
        }
    }
}

macro_rules! integer_wire_type {
    ($($ty:ty),+) => {
        $(
            impl WireType for $ty {
                fn build_codec(_registry: &CodecRegistry) -> Result<CodecRef<Self>> {
                    Ok(Arc::new(IntCodec::<$ty>::new(Width::Fit)))
                }

                fn build_hinted(_registry: &CodecRegistry, hint: FieldType) -> Result<CodecRef<Self>> {
                    Ok(Arc::new(IntCodec::<$ty>::new(hint.into())))
                }
            }
        )+
    };
}

integer_wire_type!(i8, i16, i32, i64, u8, u16, u32);

pub struct F64Codec;

impl Codec<f64> for F64Codec {
    fn decode(&self, parser: &mut TaggedParser<'_>) -> Result<f64> {
        parser.as_f64()
    }

    fn encode(&self, gen: &mut TaggedGenerator, value: &f64) -> Result<()> {
        gen.write_double(*value)
    }
}

pub struct F32Codec;

impl Codec<f32> for F32Codec {
    /// Integers must be exactly representable and finite doubles must
    /// stay finite; rounding of fractional doubles is accepted.
    fn decode(&self, parser: &mut TaggedParser<'_>) -> Result<f32> {
        match parser.current() {
            Some(Token::Int | Token::Long) => {
                let wide = parser.as_i64()?;
                let narrow = wide as f32;
                if narrow as i128 == i128::from(wide) {
                    Ok(narrow)
                } else {
                    Err(parser.malformed(format!("{wide} is not exactly representable as f32")))
                }
            }
            _ => {
                let wide = parser.as_f64()?;
                let narrow = wide as f32;
                if wide.is_finite() && narrow.is_infinite() {
                    Err(parser.malformed(format!("{wide} is out of range for f32")))
                } else {
                    Ok(narrow)
                }
            }
        }
    }

    fn encode(&self, gen: &mut TaggedGenerator, value: &f32) -> Result<()> {
        gen.write_double(f64::from(*value))
    }
}

fn float_hint<T>(hint: FieldType) -> Result<()> {
    match hint {
        FieldType::Double => Ok(()),
        other => Err(CodecError::unsupported(
            type_name::<T>(),
            format!("floating point values cannot be encoded as {other}"),
        )),
    }
}

impl WireType for f64 {
    fn build_codec(_registry: &CodecRegistry) -> Result<CodecRef<Self>> {
        Ok(Arc::new(F64Codec))
    }

    fn build_hinted(_registry: &CodecRegistry, hint: FieldType) -> Result<CodecRef<Self>> {
        float_hint::<f64>(hint)?;
        Ok(Arc::new(F64Codec))
    }
}

impl WireType for f32 {
    fn build_codec(_registry: &CodecRegistry) -> Result<CodecRef<Self>> {
        Ok(Arc::new(F32Codec))
    }

    fn build_hinted(_registry: &CodecRegistry, hint: FieldType) -> Result<CodecRef<Self>> {
        float_hint::<f32>(hint)?;
        Ok(Arc::new(F32Codec))
    }
}

pub struct BoolCodec;

impl Codec<bool> for BoolCodec {
    fn decode(&self, parser: &mut TaggedParser<'_>) -> Result<bool> {
        parser.as_bool()
    }

    fn encode(&self, gen: &mut TaggedGenerator, value: &bool) -> Result<()> {
        gen.write_bool(*value)
    }
}

impl WireType for bool {
    fn build_codec(_registry: &CodecRegistry) -> Result<CodecRef<Self>> {
        Ok(Arc::new(BoolCodec))
    }
}

pub struct StringCodec;

impl Codec<String> for StringCodec {
    fn decode(&self, parser: &mut TaggedParser<'_>) -> Result<String> {
        parser.as_str().map(str::to_owned)
    }

    fn encode(&self, gen: &mut TaggedGenerator, value: &String) -> Result<()> {
        gen.write_string(value)
    }
}

impl WireType for String {
    fn build_codec(_registry: &CodecRegistry) -> Result<CodecRef<Self>> {
        Ok(Arc::new(StringCodec))
    }
}

pub struct DateCodec;

impl Codec<NaiveDate> for DateCodec {
    fn decode(&self, parser: &mut TaggedParser<'_>) -> Result<NaiveDate> {
        parser.as_date()
    }

    fn encode(&self, gen: &mut TaggedGenerator, value: &NaiveDate) -> Result<()> {
        gen.write_date(*value)
    }
}

impl WireType for NaiveDate {
    fn build_codec(_registry: &CodecRegistry) -> Result<CodecRef<Self>> {
        Ok(Arc::new(DateCodec))
    }
}

/// Instants are normalized to UTC on both sides.
pub struct TimeCodec;

impl Codec<DateTime<Utc>> for TimeCodec {
    fn decode(&self, parser: &mut TaggedParser<'_>) -> Result<DateTime<Utc>> {
        parser.as_instant()
    }

    fn encode(&self, gen: &mut TaggedGenerator, value: &DateTime<Utc>) -> Result<()> {
        gen.write_time(*value)
    }
}

impl WireType for DateTime<Utc> {
    fn build_codec(_registry: &CodecRegistry) -> Result<CodecRef<Self>> {
        Ok(Arc::new(TimeCodec))
    }
}

pub struct ModuleCodec;

impl Codec<Module> for ModuleCodec {
    fn decode(&self, parser: &mut TaggedParser<'_>) -> Result<Module> {
        parser.as_module()
    }

    fn encode(&self, gen: &mut TaggedGenerator, value: &Module) -> Result<()> {
        gen.write_module(value.name())
    }
}

impl WireType for Module {
    fn build_codec(_registry: &CodecRegistry) -> Result<CodecRef<Self>> {
        Ok(Arc::new(ModuleCodec))
    }
}

pub struct BytesCodec;

impl Codec<Bytes> for BytesCodec {
    fn decode(&self, parser: &mut TaggedParser<'_>) -> Result<Bytes> {
        parser.as_bytes().map(|b| Bytes(b.to_vec()))
    }

    fn encode(&self, gen: &mut TaggedGenerator, value: &Bytes) -> Result<()> {
        gen.write_bytes(&value.0)
    }
}

impl WireType for Bytes {
    fn build_codec(_registry: &CodecRegistry) -> Result<CodecRef<Self>> {
        Ok(Arc::new(BytesCodec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode<T: WireType>(value: T) -> String {
        CodecRegistry::new().encode(&value).unwrap()
    }

    fn decode<T: WireType>(text: &str) -> Result<T> {
        CodecRegistry::new().decode_str(text)
    }

    #[test]
    fn i64_picks_narrowest_tag() {
        assert_eq!(encode(5i64), r#"{"@int":"5"}"#);
        assert_eq!(encode(i32::MAX as i64 + 1), r#"{"@long":"2147483648"}"#);
        assert_eq!(encode(i64::MIN), r#"{"@long":"-9223372036854775808"}"#);
    }

    #[test]
    fn u32_above_i32_range_upgrades_to_long() {
        assert_eq!(encode(u32::MAX), r#"{"@long":"4294967295"}"#);
        assert_eq!(decode::<u32>(r#"{"@long":"4294967295"}"#).unwrap(), u32::MAX);
    }

    #[test]
    fn narrow_integers_reject_out_of_range() {
        assert!(matches!(
            decode::<i8>(r#"{"@int":"200"}"#),
            Err(CodecError::MalformedStream { .. })
        ));
        assert!(matches!(
            decode::<i32>(r#"{"@long":"2147483648"}"#),
            Err(CodecError::MalformedStream { .. })
        ));
        assert!(matches!(
            decode::<u16>(r#"{"@int":"-1"}"#),
            Err(CodecError::MalformedStream { .. })
        ));
    }

    #[test]
    fn integers_accept_integral_doubles() {
        assert_eq!(decode::<i64>(r#"{"@double":"12.0"}"#).unwrap(), 12);
        assert!(matches!(
            decode::<i64>(r#"{"@double":"12.5"}"#),
            Err(CodecError::MalformedStream { .. })
        ));
    }

    #[test]
    fn integer_from_string_is_a_mismatch() {
        assert!(matches!(
            decode::<i32>(r#""12""#),
            Err(CodecError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn double_hint_on_integer() {
        let registry = CodecRegistry::new();
        let codec = registry.get_hinted::<i32>(FieldType::Double).unwrap();
        let mut gen = TaggedGenerator::new();
        codec.encode(&mut gen, &3).unwrap();
        assert_eq!(gen.finish_string(), r#"{"@double":"3.0"}"#);
    }

    #[test]
    fn float_rejects_integer_hint() {
        let registry = CodecRegistry::new();
        assert!(matches!(
            registry.get_hinted::<f64>(FieldType::Long),
            Err(CodecError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn doubles_widen_from_integers() {
        assert_eq!(decode::<f64>(r#"{"@int":"2"}"#).unwrap(), 2.0);
        assert_eq!(decode::<f32>(r#"{"@double":"1.5"}"#).unwrap(), 1.5);
    }

    #[test]
    fn f32_rejects_lossy_values() {
        assert!(matches!(
            decode::<f32>(r#"{"@double":"1e300"}"#),
            Err(CodecError::MalformedStream { .. })
        ));
        assert!(matches!(
            decode::<f32>(r#"{"@long":"16777217"}"#),
            Err(CodecError::MalformedStream { .. })
        ));
        assert!(matches!(
            decode::<f32>(r#"{"@long":"9223372036854775807"}"#),
            Err(CodecError::MalformedStream { .. })
        ));
        assert_eq!(decode::<f32>(r#"{"@long":"16777216"}"#).unwrap(), 16_777_216.0);
        assert_eq!(decode::<f32>(r#"{"@double":"-Infinity"}"#).unwrap(), f32::NEG_INFINITY);
        assert!(decode::<f32>(r#"{"@double":"NaN"}"#).unwrap().is_nan());
    }

    #[test]
    fn special_doubles() {
        assert_eq!(encode(f64::INFINITY), r#"{"@double":"Infinity"}"#);
        assert_eq!(encode(f64::NEG_INFINITY), r#"{"@double":"-Infinity"}"#);
        assert!(decode::<f64>(r#"{"@double":"NaN"}"#).unwrap().is_nan());
    }

    #[test]
    fn strings_bools_modules_bytes() {
        assert_eq!(encode(String::from("@int")), r#""@int""#);
        assert!(decode::<bool>("true").unwrap());
        assert_eq!(encode(Module::new("Users")), r#"{"@mod":"Users"}"#);
        assert_eq!(encode(Bytes(vec![1, 2, 3])), r#"{"@bytes":"AQID"}"#);
        assert_eq!(
            decode::<Bytes>(r#"{"@bytes":"AQID"}"#).unwrap(),
            Bytes(vec![1, 2, 3])
        );
    }

    #[test]
    fn dates_and_times() {
        let date = NaiveDate::from_ymd_opt(2023, 2, 28).unwrap();
        assert_eq!(encode(date), r#"{"@date":"2023-02-28"}"#);
        let time: DateTime<Utc> = decode(r#"{"@time":"2023-02-28T10:10:10.000001+02:00"}"#).unwrap();
        assert_eq!(encode(time), r#"{"@time":"2023-02-28T08:10:10.000001Z"}"#);
    }
}
