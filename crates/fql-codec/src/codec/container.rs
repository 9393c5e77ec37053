//! Codecs that wrap other codecs: optionals, boxes, lists, maps and pages.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::marker::PhantomData;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::codec::registry::CodecRegistry;
use crate::codec::{Codec, CodecRef, FieldType, RefInfo, WireType};
use crate::error::Result;
use crate::generator::TaggedGenerator;
use crate::parser::TaggedParser;
use crate::token::{needs_escape, Token};
use crate::types::Page;

/// Wire `null` decodes to `None`.
pub struct OptionCodec<T> {
    inner: CodecRef<T>,
}

impl<T: Send + Sync> Codec<Option<T>> for OptionCodec<T> {
    fn decode(&self, parser: &mut TaggedParser<'_>) -> Result<Option<T>> {
        if parser.current() == Some(Token::Null) {
            return Ok(None);
        }
        self.inner.decode(parser).map(Some)
    }

    fn encode(&self, gen: &mut TaggedGenerator, value: &Option<T>) -> Result<()> {
        match value {
            Some(v) => self.inner.encode(gen, v),
            None => gen.write_null(),
        }
    }
}

impl<T: WireType> WireType for Option<T> {
    const NULLABLE: bool = true;

    fn build_codec(registry: &CodecRegistry) -> Result<CodecRef<Self>> {
        Ok(Arc::new(OptionCodec {
            inner: registry.get::<T>()?,
        }))
    }

    fn build_hinted(registry: &CodecRegistry, hint: FieldType) -> Result<CodecRef<Self>> {
        Ok(Arc::new(OptionCodec {
            inner: registry.get_hinted::<T>(hint)?,
        }))
    }

    fn from_ref(info: RefInfo) -> Result<Self> {
        T::from_ref(info).map(Some)
    }
}

pub struct BoxCodec<T> {
    inner: CodecRef<T>,
}

impl<T: Send + Sync> Codec<Box<T>> for BoxCodec<T> {
    fn decode(&self, parser: &mut TaggedParser<'_>) -> Result<Box<T>> {
        self.inner.decode(parser).map(Box::new)
    }

    fn encode(&self, gen: &mut TaggedGenerator, value: &Box<T>) -> Result<()> {
        self.inner.encode(gen, value)
    }
}

impl<T: WireType> WireType for Box<T> {
    const NULLABLE: bool = T::NULLABLE;

    fn build_codec(registry: &CodecRegistry) -> Result<CodecRef<Self>> {
        Ok(Arc::new(BoxCodec {
            inner: registry.get::<T>()?,
        }))
    }

    fn build_hinted(registry: &CodecRegistry, hint: FieldType) -> Result<CodecRef<Self>> {
        Ok(Arc::new(BoxCodec {
            inner: registry.get_hinted::<T>(hint)?,
        }))
    }

    fn from_ref(info: RefInfo) -> Result<Self> {
        T::from_ref(info).map(Box::new)
    }
}

/// Reads array elements until the closing bracket. The parser must sit on
/// `StartArray`.
pub(crate) fn read_array<T>(
    parser: &mut TaggedParser<'_>,
    mut element: impl FnMut(&mut TaggedParser<'_>) -> Result<T>,
) -> Result<Vec<T>> {
    parser.expect(Token::StartArray)?;
    let mut items = Vec::new();
    loop {
        if parser.next_token()? == Token::EndArray {
            return Ok(items);
        }
        items.push(element(parser)?);
    }
}

pub struct ListCodec<T> {
    inner: CodecRef<T>,
}

impl<T: Send + Sync> Codec<Vec<T>> for ListCodec<T> {
    fn decode(&self, parser: &mut TaggedParser<'_>) -> Result<Vec<T>> {
        read_array(parser, |p| self.inner.decode(p))
    }

    fn encode(&self, gen: &mut TaggedGenerator, value: &Vec<T>) -> Result<()> {
        gen.write_start_array()?;
        for item in value {
            self.inner.encode(gen, item)?;
        }
        gen.write_end_array()
    }
}

impl<T: WireType> WireType for Vec<T> {
    fn build_codec(registry: &CodecRegistry) -> Result<CodecRef<Self>> {
        Ok(Arc::new(ListCodec {
            inner: registry.get::<T>()?,
        }))
    }

    /// The hint applies to the elements.
    fn build_hinted(registry: &CodecRegistry, hint: FieldType) -> Result<CodecRef<Self>> {
        Ok(Arc::new(ListCodec {
            inner: registry.get_hinted::<T>(hint)?,
        }))
    }
}

/// Reads `name: value` pairs until `end`. The parser must sit on the
/// container's start token; `entry` is called positioned on each value.
pub(crate) fn read_fields(
    parser: &mut TaggedParser<'_>,
    end: Token,
    mut entry: impl FnMut(&mut TaggedParser<'_>, String) -> Result<()>,
) -> Result<()> {
    loop {
        let token = parser.next_token()?;
        if token == end {
            return Ok(());
        }
        let name = parser.field_name()?.to_owned();
        parser.next_token()?;
        entry(parser, name)?;
    }
}

/// The end token for a value read field by field: a plain object, or a
/// document whose fields are taken as data.
pub(crate) fn keyed_end(parser: &TaggedParser<'_>) -> Result<Token> {
    match parser.current() {
        Some(Token::StartObject) => Ok(Token::EndObject),
        Some(Token::StartDocument) => Ok(Token::EndDocument),
        _ => Err(parser.mismatch("object")),
    }
}

/// String-keyed maps. Entries keep whatever order the map type keeps;
/// a repeated key on the wire overwrites the earlier value.
pub struct MapCodec<M, T> {
    inner: CodecRef<T>,
    _marker: PhantomData<fn() -> M>,
}

impl<M, T> MapCodec<M, T> {
    fn new(inner: CodecRef<T>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }
}

impl<M, T> Codec<M> for MapCodec<M, T>
where
    M: Default + Extend<(String, T)>,
    for<'a> &'a M: IntoIterator<Item = (&'a String, &'a T)>,
    T: Send + Sync,
{
    fn decode(&self, parser: &mut TaggedParser<'_>) -> Result<M> {
        let end = keyed_end(parser)?;
        let mut map = M::default();
        read_fields(parser, end, |p, name| {
            let value = self.inner.decode(p).map_err(|e| e.in_field(&name))?;
            map.extend(std::iter::once((name, value)));
            Ok(())
        })?;
        Ok(map)
    }

    fn encode(&self, gen: &mut TaggedGenerator, value: &M) -> Result<()> {
        let escaped = needs_escape(value.into_iter().map(|(k, _)| k.as_str()));
        if escaped {
            gen.write_start_escaped_object()?;
        } else {
            gen.write_start_object()?;
        }
        for (key, item) in value {
            gen.write_field_name(key)?;
            self.inner.encode(gen, item)?;
        }
        if escaped {
            gen.write_end_escaped_object()
        } else {
            gen.write_end_object()
        }
    }
}

macro_rules! map_wire_type {
    ($map:ident $(, $s:ident)?) => {
        impl<T: WireType $(, $s: BuildHasher + Default + Send + Sync + 'static)?> WireType
            for $map<String, T $(, $s)?>
        {
            fn build_codec(registry: &CodecRegistry) -> Result<CodecRef<Self>> {
                Ok(Arc::new(MapCodec::<Self, T>::new(registry.get::<T>()?)))
            }

            /// The hint applies to the values.
            fn build_hinted(registry: &CodecRegistry, hint: FieldType) -> Result<CodecRef<Self>> {
                Ok(Arc::new(MapCodec::<Self, T>::new(registry.get_hinted::<T>(hint)?)))
            }
        }
    };
}

map_wire_type!(IndexMap, S);
map_wire_type!(HashMap, S);
map_wire_type!(BTreeMap);

/// Reads the body of a page whose start token the parser sits on.
pub(crate) fn read_page<T>(
    parser: &mut TaggedParser<'_>,
    end: Token,
    mut element: impl FnMut(&mut TaggedParser<'_>) -> Result<T>,
) -> Result<Page<T>> {
    let mut page = Page::default();
    read_fields(parser, end, |p, name| {
        match name.as_str() {
            "data" => page.data = read_array(p, &mut element)?,
            "after" => {
                page.after = match p.current() {
                    Some(Token::Null) => None,
                    _ => Some(p.as_str()?.to_owned()),
                }
            }
            _ => p.skip()?,
        }
        Ok(())
    })?;
    Ok(page)
}

pub(crate) fn write_page<T>(
    gen: &mut TaggedGenerator,
    page: &Page<T>,
    mut element: impl FnMut(&mut TaggedGenerator, &T) -> Result<()>,
) -> Result<()> {
    gen.write_start_set()?;
    gen.write_field_name("data")?;
    gen.write_start_array()?;
    for item in &page.data {
        element(gen, item)?;
    }
    gen.write_end_array()?;
    if let Some(after) = &page.after {
        gen.write_field_name("after")?;
        gen.write_string(after)?;
    }
    gen.write_end_set()
}

/// Pages decode from `@set` (object or bare cursor), from a plain object
/// with the same fields, and from any single value, which becomes a
/// one-element last page.
pub struct PageCodec<T> {
    inner: CodecRef<T>,
}

impl<T: Send + Sync> Codec<Page<T>> for PageCodec<T> {
    fn decode(&self, parser: &mut TaggedParser<'_>) -> Result<Page<T>> {
        match parser.current() {
            Some(Token::StartSet) => read_page(parser, Token::EndSet, |p| self.inner.decode(p)),
            Some(Token::StartObject) => {
                read_page(parser, Token::EndObject, |p| self.inner.decode(p))
            }
            _ => Ok(Page {
                data: vec![self.inner.decode(parser)?],
                after: None,
            }),
        }
    }

    fn encode(&self, gen: &mut TaggedGenerator, value: &Page<T>) -> Result<()> {
        write_page(gen, value, |g, item| self.inner.encode(g, item))
    }
}

impl<T: WireType> WireType for Page<T> {
    fn build_codec(registry: &CodecRegistry) -> Result<CodecRef<Self>> {
        Ok(Arc::new(PageCodec {
            inner: registry.get::<T>()?,
        }))
    }
}
