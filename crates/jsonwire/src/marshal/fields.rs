//! Struct field descriptors and the process-wide shape cache.
//!
//! Each struct type's field list is computed once from its tag strings and
//! cached in a concurrent mapping keyed by `TypeId`. Every entry carries
//! its own one-shot latch, so concurrent first uses race safely and a
//! reader never observes a partially built shape. Recursive types need no
//! special handling here: field accessors dispatch through the trait at
//! call time, never at construction time, so building a shape never
//! demands another shape.

use std::any::{Any, TypeId};
use std::collections::hash_map::Entry;
use std::sync::{Arc, OnceLock, RwLock};

use fxhash::FxHashMap;

use crate::error::{Action, Error, SemanticError};
use crate::marshal::tag::{self, TagError};
use crate::marshal::{FieldFormat, MarshalJson, UnmarshalJson};

/// Per-field configuration derived from its tag string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldOptions {
    /// Member-name matching ignores case for this field.
    pub nocase: bool,
    /// The field's members are promoted into the parent object.
    pub inline: bool,
    /// The field collects members no other field claims (implies
    /// `inline`).
    pub unknown: bool,
    /// Omit the member when the field value is zero.
    pub omitzero: bool,
    /// Omit the member when the field encodes to a JSON-empty value
    /// (`null`, `""`, `[]`, `{}`).
    pub omitempty: bool,
    /// Stringify numbers within this field's subtree.
    pub string: bool,
    /// Representation override for the field's value.
    pub format: Option<FieldFormat>,
}

/// What the `json_struct!` macro records per field before tags are
/// parsed.
pub struct RawField<T: ?Sized> {
    /// The Rust field name, the fallback member name.
    pub rust_name: &'static str,
    /// The unparsed tag string.
    pub tag: &'static str,
    /// Type-erased shared accessor.
    pub get: for<'x> fn(&'x T) -> &'x (dyn MarshalJson + 'x),
    /// Type-erased mutable accessor.
    pub get_mut: for<'x> fn(&'x mut T) -> &'x mut (dyn UnmarshalJson + 'x),
}

/// One participating field.
pub struct StructField<T: ?Sized> {
    pub(crate) name: Box<str>,
    pub(crate) opts: FieldOptions,
    pub(crate) get: for<'x> fn(&'x T) -> &'x (dyn MarshalJson + 'x),
    pub(crate) get_mut: for<'x> fn(&'x mut T) -> &'x mut (dyn UnmarshalJson + 'x),
}

impl<T: ?Sized> StructField<T> {
    /// The JSON member name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parsed field options.
    #[must_use]
    pub fn options(&self) -> &FieldOptions {
        &self.opts
    }
}

/// The computed shape of one struct type: its fields in declaration
/// order, a name index, and the inline/unknown bookkeeping.
pub struct StructFields<T: ?Sized> {
    pub(crate) fields: Vec<StructField<T>>,
    by_name: FxHashMap<Box<str>, usize>,
    has_nocase: bool,
    pub(crate) inline: Vec<usize>,
    pub(crate) unknown: Option<usize>,
}

impl<T: ?Sized> StructFields<T> {
    /// Finds the field claiming `name`, consulting case-insensitive
    /// matches when a field (or the option bundle) asks for them.
    pub(crate) fn lookup(&self, name: &str, nocase_all: bool) -> Option<usize> {
        if let Some(&i) = self.by_name.get(name) {
            return Some(i);
        }
        if self.has_nocase || nocase_all {
            for (i, f) in self.fields.iter().enumerate() {
                if f.opts.inline || f.opts.unknown {
                    continue;
                }
                if (f.opts.nocase || nocase_all) && f.name.eq_ignore_ascii_case(name) {
                    return Some(i);
                }
            }
        }
        None
    }
}

impl<T: ?Sized> std::fmt::Debug for StructFields<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructFields")
            .field("fields", &self.fields)
            .field("by_name", &self.by_name)
            .field("has_nocase", &self.has_nocase)
            .field("inline", &self.inline)
            .field("unknown", &self.unknown)
            .finish()
    }
}

impl<T: ?Sized> std::fmt::Debug for StructField<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructField")
            .field("name", &self.name)
            .field("opts", &self.opts)
            .finish()
    }
}

type Shared<T> = Arc<OnceLock<Result<Arc<StructFields<T>>, Error>>>;
type CacheMap = FxHashMap<TypeId, Arc<dyn Any + Send + Sync>>;

static STRUCT_CACHE: OnceLock<RwLock<CacheMap>> = OnceLock::new();

/// Returns the cached shape for `T`, building it on first use.
///
/// Concurrent callers agree on one entry: the map hands every caller the
/// same per-type latch, and the latch runs the builder at most once.
pub fn struct_fields<T: 'static>(
    raw: impl FnOnce() -> Vec<RawField<T>>,
) -> Result<Arc<StructFields<T>>, Error> {
    let cache = STRUCT_CACHE.get_or_init(|| RwLock::new(CacheMap::default()));
    let id = TypeId::of::<T>();
    let latch: Shared<T> = {
        let existing = {
            let map = cache.read().unwrap_or_else(std::sync::PoisonError::into_inner);
            map.get(&id).cloned()
        };
        let any = match existing {
            Some(any) => any,
            None => {
                let mut map = cache.write().unwrap_or_else(std::sync::PoisonError::into_inner);
                match map.entry(id) {
                    Entry::Occupied(e) => Arc::clone(e.get()),
                    Entry::Vacant(e) => {
                        let fresh: Shared<T> = Arc::new(OnceLock::new());
                        Arc::clone(e.insert(fresh))
                    }
                }
            }
        };
        match any.downcast::<OnceLock<Result<Arc<StructFields<T>>, Error>>>() {
            Ok(latch) => latch,
            // TypeIds cannot collide; fall back to an uncached build all
            // the same rather than panic.
            Err(_) => return build_fields(raw()).map(Arc::new),
        }
    };
    latch.get_or_init(|| build_fields(raw()).map(Arc::new)).clone()
}

fn shape_error(reason: String) -> Error {
    SemanticError::new(Action::Marshal, "struct").with_reason(reason).into()
}

fn build_fields<T: ?Sized>(raw: Vec<RawField<T>>) -> Result<StructFields<T>, Error> {
    let mut fields = Vec::new();
    let mut by_name = FxHashMap::default();
    let mut has_nocase = false;
    let mut inline = Vec::new();
    let mut unknown = None;
    for rf in raw {
        let parsed = tag::parse_tag(rf.tag).map_err(|e: TagError| {
            shape_error(format!("field {:?} has a malformed tag: {e}", rf.rust_name))
        })?;
        if parsed.ignored {
            continue;
        }
        let format = match &parsed.format {
            None => None,
            Some(name) => Some(FieldFormat::parse(name).ok_or_else(|| {
                shape_error(format!("field {:?} has unknown format {name:?}", rf.rust_name))
            })?),
        };
        let opts = FieldOptions {
            nocase: parsed.nocase,
            inline: parsed.inline,
            unknown: parsed.unknown,
            omitzero: parsed.omitzero,
            omitempty: parsed.omitempty,
            string: parsed.string,
            format,
        };
        let name = parsed.name.unwrap_or_else(|| rf.rust_name.to_string());
        let idx = fields.len();
        if opts.unknown {
            if unknown.is_some() {
                return Err(shape_error(format!(
                    "field {:?} duplicates the unknown-members field",
                    rf.rust_name
                )));
            }
            unknown = Some(idx);
        }
        if opts.inline {
            inline.push(idx);
        } else {
            if by_name.insert(name.clone().into_boxed_str(), idx).is_some() {
                return Err(shape_error(format!("duplicate member name {name:?}")));
            }
            has_nocase |= opts.nocase;
        }
        fields.push(StructField {
            name: name.into_boxed_str(),
            opts,
            get: rf.get,
            get_mut: rf.get_mut,
        });
    }
    if fields.is_empty() {
        return Err(shape_error("struct has no marshalable fields".to_string()));
    }
    Ok(StructFields { fields, by_name, has_nocase, inline, unknown })
}
