//! Process-wide store of codecs, keyed by host type.
//!
//! Lookups of finished codecs take a read lock only. Construction is
//! serialized by a reentrant build lock: building a record resolves its
//! field codecs on the same thread, and a field that leads back to a type
//! still under construction receives a [`LazyCodec`] placeholder that is
//! filled once the outer build completes. Codecs built during one
//! top-level resolution are staged and become visible to other threads
//! only when the whole resolution succeeds.

use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::{ReentrantMutex, RwLock};
use tracing::{debug, trace, warn};

use crate::codec::{Codec, CodecRef, FieldType, WireType};
use crate::error::{CodecError, Result};
use crate::generator::TaggedGenerator;
use crate::options::{DecodeOptions, ParserOptions};
use crate::parser::TaggedParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CodecKey {
    type_id: TypeId,
    hint: Option<FieldType>,
}

impl CodecKey {
    fn of<T: 'static>(hint: Option<FieldType>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            hint,
        }
    }
}

type Entry = Box<dyn Any + Send + Sync>;
type Slot<T> = Arc<OnceLock<CodecRef<T>>>;

#[derive(Default)]
struct BuildState {
    depth: usize,
    staged: HashMap<CodecKey, Entry>,
    placeholders: HashMap<CodecKey, Entry>,
}

pub struct CodecRegistry {
    cache: RwLock<HashMap<CodecKey, Entry>>,
    build: ReentrantMutex<RefCell<BuildState>>,
    options: DecodeOptions,
    parser_options: ParserOptions,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::with_options(DecodeOptions::default())
    }

    pub fn with_options(options: DecodeOptions) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            build: ReentrantMutex::new(RefCell::new(BuildState::default())),
            options,
            parser_options: ParserOptions::default(),
        }
    }

    pub fn with_parser_options(mut self, parser_options: ParserOptions) -> Self {
        self.parser_options = parser_options;
        self
    }

    /// The shared registry used when callers do not bring their own.
    pub fn global() -> &'static CodecRegistry {
        static GLOBAL: OnceLock<CodecRegistry> = OnceLock::new();
        GLOBAL.get_or_init(CodecRegistry::new)
    }

    pub fn options(&self) -> DecodeOptions {
        self.options
    }

    pub fn parser_options(&self) -> ParserOptions {
        self.parser_options
    }

    /// A parser over `input` configured like the ones this registry uses.
    pub fn parser<'a>(&self, input: &'a [u8]) -> TaggedParser<'a> {
        TaggedParser::with_options(input, self.parser_options)
    }

    /// Number of finished codecs.
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The codec for `T`, building and memoizing it on first use.
    pub fn get<T: WireType>(&self) -> Result<CodecRef<T>> {
        self.resolve::<T>(None)
    }

    /// The codec for `T` encoding as `hint` instead of its natural wire type.
    pub fn get_hinted<T: WireType>(&self, hint: FieldType) -> Result<CodecRef<T>> {
        self.resolve::<T>(Some(hint))
    }

    fn lookup<T: 'static>(&self, key: &CodecKey) -> Option<CodecRef<T>> {
        self.cache
            .read()
            .get(key)
            .and_then(|entry| entry.downcast_ref::<CodecRef<T>>())
            .cloned()
    }

    fn resolve<T: WireType>(&self, hint: Option<FieldType>) -> Result<CodecRef<T>> {
        let key = CodecKey::of::<T>(hint);
        if let Some(codec) = self.lookup::<T>(&key) {
            return Ok(codec);
        }

        let guard = self.build.lock();
        // Another thread may have committed it while we waited.
        if let Some(codec) = self.lookup::<T>(&key) {
            return Ok(codec);
        }
        let slot: Slot<T> = {
            let mut state = guard.borrow_mut();
            if let Some(codec) = state
                .staged
                .get(&key)
                .and_then(|entry| entry.downcast_ref::<CodecRef<T>>())
            {
                return Ok(codec.clone());
            }
            if let Some(slot) = state
                .placeholders
                .get(&key)
                .and_then(|entry| entry.downcast_ref::<Slot<T>>())
            {
                trace!(ty = type_name::<T>(), "handing out placeholder for cyclic codec");
                return Ok(Arc::new(LazyCodec {
                    slot: slot.clone(),
                    type_name: type_name::<T>(),
                }));
            }
            let slot: Slot<T> = Arc::new(OnceLock::new());
            state.placeholders.insert(key, Box::new(slot.clone()));
            state.depth += 1;
            slot
        };
        let _frame = BuildFrame {
            state: &guard,
            key,
        };

        // The build lock stays held; nested resolutions re-enter it.
        let built = match hint {
            None => T::build_codec(self),
            Some(hint) => T::build_hinted(self, hint),
        };

        let mut state = guard.borrow_mut();
        let outermost = state.depth == 1;
        match built {
            Ok(codec) => {
                let _ = slot.set(codec.clone());
                state.staged.insert(key, Box::new(codec.clone()));
                if outermost {
                    let staged = std::mem::take(&mut state.staged);
                    let count = staged.len();
                    self.cache.write().extend(staged);
                    debug!(ty = type_name::<T>(), count, "committed codecs");
                }
                Ok(codec)
            }
            Err(err) => {
                if outermost {
                    let dropped = std::mem::take(&mut state.staged).len();
                    debug!(ty = type_name::<T>(), dropped, error = %err, "codec build rolled back");
                }
                Err(err)
            }
        }
    }

    // ----------------------------------------------------------------
    // Whole-value helpers

    /// Decodes one complete top-level value of type `T`.
    pub fn decode<T: WireType>(&self, input: &[u8]) -> Result<T> {
        let codec = self.get::<T>()?;
        let mut parser = self.parser(input);
        parser.next_token()?;
        let value = codec.decode(&mut parser)?;
        if parser.advance()?.is_some() {
            return Err(parser.malformed("value did not consume its closing token"));
        }
        Ok(value)
    }

    pub fn decode_str<T: WireType>(&self, input: &str) -> Result<T> {
        self.decode(input.as_bytes())
    }

    /// Decodes the value the parser is positioned on.
    pub fn decode_value<T: WireType>(&self, parser: &mut TaggedParser<'_>) -> Result<T> {
        self.get::<T>()?.decode(parser)
    }

    /// Encodes any registered host value into a generator.
    pub fn encode_value<T: WireType>(&self, gen: &mut TaggedGenerator, value: &T) -> Result<()> {
        self.get::<T>()?.encode(gen, value)
    }

    /// Encodes one complete top-level value to text.
    pub fn encode<T: WireType>(&self, value: &T) -> Result<String> {
        let mut gen = TaggedGenerator::new();
        self.encode_value(&mut gen, value)?;
        Ok(gen.finish_string())
    }
}

/// One in-progress resolution. Dropping it, on return or while unwinding
/// from a panicking build, retires the placeholder and, at the outermost
/// level, discards whatever is still staged.
struct BuildFrame<'a> {
    state: &'a RefCell<BuildState>,
    key: CodecKey,
}

impl Drop for BuildFrame<'_> {
    fn drop(&mut self) {
        let Ok(mut state) = self.state.try_borrow_mut() else {
            return;
        };
        state.placeholders.remove(&self.key);
        state.depth -= 1;
        if state.depth == 0 && !state.staged.is_empty() {
            warn!(dropped = state.staged.len(), "codec build abandoned");
            state.staged.clear();
        }
    }
}

/// Stand-in handed to a codec that refers back to a type still being built.
pub struct LazyCodec<T> {
    slot: Slot<T>,
    type_name: &'static str,
}

impl<T> LazyCodec<T> {
    fn target(&self) -> Result<&CodecRef<T>> {
        self.slot.get().ok_or_else(|| {
            CodecError::unsupported(self.type_name, "codec used before its construction finished")
        })
    }
}

impl<T: Send + Sync> Codec<T> for LazyCodec<T> {
    fn decode(&self, parser: &mut TaggedParser<'_>) -> Result<T> {
        self.target()?.decode(parser)
    }

    fn encode(&self, gen: &mut TaggedGenerator, value: &T) -> Result<()> {
        self.target()?.encode(gen, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::record::{FieldSet, Record};
    use crate::wire_record;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    #[derive(Debug, Default, PartialEq)]
    struct Node {
        label: String,
        next: Option<Box<Node>>,
    }

    impl Record for Node {
        fn describe(fields: &mut FieldSet<Self>) {
            fields.field("label", |n| &n.label, |n| &mut n.label);
            fields.field("next", |n| &n.next, |n| &mut n.next);
        }
    }

    wire_record!(Node);

    #[derive(Debug, Default)]
    struct Clash {
        a: i32,
        b: i32,
    }

    impl Record for Clash {
        fn describe(fields: &mut FieldSet<Self>) {
            fields.field("a", |c| &c.a, |c| &mut c.a);
            fields.field("a", |c| &c.b, |c| &mut c.b);
        }
    }

    wire_record!(Clash);

    #[derive(Debug, Default)]
    struct HoldsClash {
        inner: Vec<Clash>,
    }

    impl Record for HoldsClash {
        fn describe(fields: &mut FieldSet<Self>) {
            fields.field("inner", |h| &h.inner, |h| &mut h.inner);
        }
    }

    wire_record!(HoldsClash);

    static FLAKY_PANICKED: AtomicBool = AtomicBool::new(false);

    #[derive(Debug, Default, PartialEq)]
    struct Flaky {
        n: i32,
        next: Option<Box<Flaky>>,
    }

    impl Record for Flaky {
        fn describe(fields: &mut FieldSet<Self>) {
            fields.field("n", |f| &f.n, |f| &mut f.n);
            fields.field("next", |f| &f.next, |f| &mut f.next);
            if !FLAKY_PANICKED.swap(true, Ordering::SeqCst) {
                panic!("describe failed");
            }
        }
    }

    wire_record!(Flaky);

    #[test]
    fn codecs_are_memoized() {
        let registry = CodecRegistry::new();
        let a = registry.get::<Vec<i32>>().unwrap();
        let b = registry.get::<Vec<i32>>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn hinted_codecs_are_separate_entries() {
        let registry = CodecRegistry::new();
        let natural = registry.get::<i32>().unwrap();
        let long = registry.get_hinted::<i32>(FieldType::Long).unwrap();
        assert!(!Arc::ptr_eq(&natural, &long));
        let mut gen = TaggedGenerator::new();
        long.encode(&mut gen, &7).unwrap();
        assert_eq!(gen.finish_string(), r#"{"@long":"7"}"#);
    }

    #[test]
    fn self_referential_record_resolves() {
        let registry = CodecRegistry::new();
        let list = Node {
            label: "a".into(),
            next: Some(Box::new(Node {
                label: "b".into(),
                next: None,
            })),
        };
        let text = registry.encode(&list).unwrap();
        assert_eq!(
            text,
            r#"{"label":"a","next":{"label":"b","next":null}}"#
        );
        assert_eq!(registry.decode_str::<Node>(&text).unwrap(), list);
    }

    #[test]
    fn failed_build_leaves_no_entries() {
        let registry = CodecRegistry::new();
        let err = registry.get::<HoldsClash>().err().unwrap();
        assert!(matches!(err, CodecError::SchemaConflict { .. }));
        assert!(registry.is_empty());
        // Deterministic: asking again fails the same way.
        assert_eq!(registry.get::<HoldsClash>().err().unwrap(), err);
    }

    #[test]
    fn panicking_build_leaves_registry_usable() {
        let registry = CodecRegistry::new();
        let caught = panic::catch_unwind(AssertUnwindSafe(|| registry.get::<Flaky>()));
        assert!(caught.is_err());
        assert!(registry.is_empty());

        let value: Flaky = registry
            .decode_str(r#"{"n":1,"next":{"n":2,"next":null}}"#)
            .unwrap();
        assert_eq!(value.next.unwrap().n, 2);
        assert!(registry.get::<Vec<i32>>().is_ok());
        assert!(registry.len() >= 3);
    }

    #[test]
    fn concurrent_resolution_yields_one_codec() {
        let registry = Arc::new(CodecRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || registry.get::<Node>().unwrap())
            })
            .collect();
        let codecs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for codec in &codecs[1..] {
            assert!(Arc::ptr_eq(&codecs[0], codec));
        }
    }

    #[test]
    fn trailing_tokens_after_value_are_rejected() {
        let registry = CodecRegistry::new();
        assert!(matches!(
            registry.decode_str::<i32>(r#"{"@int":"1"} 2"#),
            Err(CodecError::MalformedStream { .. })
        ));
    }
}
