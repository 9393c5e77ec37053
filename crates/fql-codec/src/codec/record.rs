//! Record mapping: host structs described field by field.
//!
//! A [`Record`] lists its fields once in [`Record::describe`]. Building its
//! codec turns that description into a [`MappingInfo`]: each field gets a
//! wire name, an optional type hint, and a codec resolved through the
//! registry. Fields that lead back to the record itself (directly or
//! through containers) receive the registry's placeholder.

use std::any::type_name;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::codec::container::{keyed_end, read_fields};
use crate::codec::registry::CodecRegistry;
use crate::codec::{Codec, CodecRef, FieldType, WireType};
use crate::error::{CodecError, Result};
use crate::generator::TaggedGenerator;
use crate::options::{DecodeOptions, DuplicateFields};
use crate::parser::TaggedParser;
use crate::token::is_reserved;

/// A host struct that maps to a wire object.
///
/// Missing fields keep their [`Default`] value unless the registry is
/// configured with [`DecodeOptions::require_fields`].
pub trait Record: Default + Send + Sync + 'static {
    /// Declares the fields in encoding order.
    fn describe(fields: &mut FieldSet<Self>);
}

type Binder<R> =
    Box<dyn FnOnce(&CodecRegistry, Option<FieldType>) -> Result<Box<dyn FieldBinding<R>>>>;

/// One declared field, before its codec is resolved.
pub struct FieldSpec<R> {
    name: String,
    type_name: &'static str,
    hint: Option<FieldType>,
    nullable: bool,
    binder: Binder<R>,
}

impl<R> FieldSpec<R> {
    /// Overrides the wire type the field's value is written as.
    pub fn hint(&mut self, hint: FieldType) -> &mut Self {
        self.hint = Some(hint);
        self
    }
}

/// Collects field declarations from [`Record::describe`].
pub struct FieldSet<R> {
    specs: Vec<FieldSpec<R>>,
}

impl<R: Record> FieldSet<R> {
    fn new() -> Self {
        Self { specs: Vec::new() }
    }

    /// Declares a field named `name` on the wire, reached through the two
    /// accessors.
    pub fn field<F: WireType>(
        &mut self,
        name: &str,
        get: fn(&R) -> &F,
        get_mut: fn(&mut R) -> &mut F,
    ) -> &mut FieldSpec<R> {
        let binder: Binder<R> = Box::new(move |registry: &CodecRegistry, hint: Option<FieldType>| {
            let codec = match hint {
                Some(hint) => registry.get_hinted::<F>(hint)?,
                None => registry.get::<F>()?,
            };
            Ok(Box::new(Accessor {
                get,
                get_mut,
                codec,
            }) as Box<dyn FieldBinding<R>>)
        });
        self.specs.push(FieldSpec {
            name: name.to_string(),
            type_name: type_name::<F>(),
            hint: None,
            nullable: F::NULLABLE,
            binder,
        });
        let last = self.specs.len() - 1;
        &mut self.specs[last]
    }
}

/// Reads and writes one field of `R` with a resolved codec.
trait FieldBinding<R>: Send + Sync {
    fn decode_into(&self, parser: &mut TaggedParser<'_>, record: &mut R) -> Result<()>;
    fn encode_from(&self, gen: &mut TaggedGenerator, record: &R) -> Result<()>;
}

struct Accessor<R, F> {
    get: fn(&R) -> &F,
    get_mut: fn(&mut R) -> &mut F,
    codec: CodecRef<F>,
}

impl<R, F> FieldBinding<R> for Accessor<R, F>
where
    R: Send + Sync,
    F: Send + Sync,
{
    fn decode_into(&self, parser: &mut TaggedParser<'_>, record: &mut R) -> Result<()> {
        *(self.get_mut)(record) = self.codec.decode(parser)?;
        Ok(())
    }

    fn encode_from(&self, gen: &mut TaggedGenerator, record: &R) -> Result<()> {
        self.codec.encode(gen, (self.get)(record))
    }
}

/// A resolved field.
pub struct FieldInfo<R> {
    name: String,
    type_name: &'static str,
    hint: Option<FieldType>,
    nullable: bool,
    binding: Box<dyn FieldBinding<R>>,
}

impl<R> FieldInfo<R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host type of the field.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn hint(&self) -> Option<FieldType> {
        self.hint
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }
}

/// Resolved field layout of a record type.
pub struct MappingInfo<R> {
    type_name: &'static str,
    fields: Vec<FieldInfo<R>>,
    by_name: HashMap<String, usize>,
    escaped: bool,
}

impl<R: Record> MappingInfo<R> {
    /// Runs [`Record::describe`] and resolves each field's codec.
    pub fn build(registry: &CodecRegistry) -> Result<Self> {
        let type_name = type_name::<R>();
        let mut set = FieldSet::<R>::new();
        R::describe(&mut set);

        let mut by_name = HashMap::with_capacity(set.specs.len());
        for (i, spec) in set.specs.iter().enumerate() {
            if by_name.insert(spec.name.clone(), i).is_some() {
                return Err(CodecError::SchemaConflict {
                    type_name,
                    field: spec.name.clone(),
                });
            }
        }
        let escaped = set.specs.iter().any(|spec| is_reserved(&spec.name));

        let mut fields = Vec::with_capacity(set.specs.len());
        for spec in set.specs {
            let binding = (spec.binder)(registry, spec.hint)?;
            fields.push(FieldInfo {
                name: spec.name,
                type_name: spec.type_name,
                hint: spec.hint,
                nullable: spec.nullable,
                binding,
            });
        }
        debug!(ty = type_name, fields = fields.len(), escaped, "built record mapping");
        Ok(Self {
            type_name,
            fields,
            by_name,
            escaped,
        })
    }
}

impl<R> MappingInfo<R> {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn fields(&self) -> &[FieldInfo<R>] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldInfo<R>> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    /// Whether any wire name spells a reserved tag, forcing `@object` on encode.
    pub fn needs_escape(&self) -> bool {
        self.escaped
    }
}

pub struct RecordCodec<R> {
    mapping: MappingInfo<R>,
    options: DecodeOptions,
}

impl<R: Record> RecordCodec<R> {
    pub fn build(registry: &CodecRegistry) -> Result<CodecRef<R>> {
        Ok(Arc::new(Self {
            mapping: MappingInfo::build(registry)?,
            options: registry.options(),
        }))
    }

    pub fn mapping(&self) -> &MappingInfo<R> {
        &self.mapping
    }
}

impl<R: Record> Codec<R> for RecordCodec<R> {
    fn decode(&self, parser: &mut TaggedParser<'_>) -> Result<R> {
        let end = keyed_end(parser)?;
        let mapping = &self.mapping;
        let mut record = R::default();
        let mut seen = vec![false; mapping.fields.len()];
        read_fields(parser, end, |p, name| {
            let Some(&i) = mapping.by_name.get(&name) else {
                trace!(ty = mapping.type_name, field = %name, "skipping unknown field");
                return p.skip();
            };
            if seen[i] {
                match self.options.duplicate_fields {
                    DuplicateFields::Reject => {
                        return Err(p.malformed(format!("duplicate field `{name}`")));
                    }
                    DuplicateFields::LastWins => {
                        warn!(ty = mapping.type_name, field = %name, "duplicate field overwrites earlier value");
                    }
                }
            }
            seen[i] = true;
            mapping.fields[i]
                .binding
                .decode_into(p, &mut record)
                .map_err(|e| e.in_field(&name))
        })?;

        if self.options.require_fields {
            if let Some(missing) = mapping
                .fields
                .iter()
                .zip(&seen)
                .find(|(field, seen)| !**seen && !field.nullable)
            {
                return Err(parser.malformed(format!(
                    "missing field `{}` of {}",
                    missing.0.name, mapping.type_name
                )));
            }
        }
        Ok(record)
    }

    fn encode(&self, gen: &mut TaggedGenerator, value: &R) -> Result<()> {
        if self.mapping.escaped {
            gen.write_start_escaped_object()?;
        } else {
            gen.write_start_object()?;
        }
        for field in &self.mapping.fields {
            gen.write_field_name(&field.name)?;
            field.binding.encode_from(gen, value)?;
        }
        if self.mapping.escaped {
            gen.write_end_escaped_object()
        } else {
            gen.write_end_object()
        }
    }
}
