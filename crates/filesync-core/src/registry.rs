//! Process-wide type registry — stable numeric ids for payload shapes.
//!
//! A shared numeric table removes any need to put shape names on the wire
//! while still letting handlers accept heterogeneous payloads. Both peers
//! must register the same shapes in the same order; register everything at
//! process start. Registering a shape after frames have been exchanged is a
//! programmer error (ids would drift between processes).

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{LazyLock, RwLock};

use crate::wire::{TypeId, WireError};

// ── Shapes ───────────────────────────────────────────────────────────────────

/// Description of a payload's structure.
///
/// `Int`/`UInt` are the platform-word variants; they occupy 4 bytes on the
/// wire regardless of the host word size. `Seq(U8)` doubles as the byte
/// sequence shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Shape {
    Null,
    Int,
    I8,
    I16,
    I32,
    I64,
    UInt,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Bool,
    Str,
    Seq(Box<Shape>),
    Record(&'static RecordShape),
}

impl Shape {
    /// The byte-sequence shape, `seq<u8>`.
    pub fn bytes() -> Shape {
        Shape::Seq(Box::new(Shape::U8))
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Null => write!(f, "null"),
            Shape::Int => write!(f, "int"),
            Shape::I8 => write!(f, "i8"),
            Shape::I16 => write!(f, "i16"),
            Shape::I32 => write!(f, "i32"),
            Shape::I64 => write!(f, "i64"),
            Shape::UInt => write!(f, "uint"),
            Shape::U8 => write!(f, "u8"),
            Shape::U16 => write!(f, "u16"),
            Shape::U32 => write!(f, "u32"),
            Shape::U64 => write!(f, "u64"),
            Shape::F32 => write!(f, "f32"),
            Shape::F64 => write!(f, "f64"),
            Shape::Bool => write!(f, "bool"),
            Shape::Str => write!(f, "string"),
            Shape::Seq(elem) => write!(f, "seq<{elem}>"),
            Shape::Record(record) => write!(f, "record {}", record.name),
        }
    }
}

/// An ordered list of named fields. Declared `static` once per record type;
/// identity (not structure) is what makes two record shapes equal.
#[derive(Debug)]
pub struct RecordShape {
    pub name: &'static str,
    pub fields: &'static [FieldShape],
}

/// One field of a record. Non-exported fields are skipped on encode and left
/// at their default on decode; they exist so the wire walk matches the
/// declared field order.
#[derive(Debug)]
pub struct FieldShape {
    pub name: &'static str,
    pub shape: fn() -> Shape,
    pub exported: bool,
}

impl PartialEq for RecordShape {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for RecordShape {}

impl Hash for RecordShape {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self as *const RecordShape as usize).hash(state);
    }
}

// ── Registry ─────────────────────────────────────────────────────────────────

struct Registry {
    by_shape: HashMap<Shape, TypeId>,
    by_id: HashMap<TypeId, Shape>,
    next_id: TypeId,
}

impl Registry {
    fn with_primitives() -> Self {
        let mut registry = Registry {
            by_shape: HashMap::with_capacity(64),
            by_id: HashMap::with_capacity(64),
            next_id: 0,
        };
        // Order is part of the protocol: both peers derive the same ids.
        for shape in [
            Shape::Null,
            Shape::Int,
            Shape::I8,
            Shape::I16,
            Shape::I32,
            Shape::I64,
            Shape::UInt,
            Shape::U8,
            Shape::U16,
            Shape::U32,
            Shape::U64,
            Shape::F32,
            Shape::F64,
            Shape::Bool,
            Shape::Str,
        ] {
            registry.register(shape);
        }
        // Byte sequence first, then the remaining element kinds. seq<u8>
        // appears once even though two primitive spellings map to it.
        for elem in [
            Shape::U8,
            Shape::Int,
            Shape::I8,
            Shape::I16,
            Shape::I32,
            Shape::I64,
            Shape::UInt,
            Shape::U16,
            Shape::U32,
            Shape::U64,
            Shape::F32,
            Shape::F64,
            Shape::Bool,
            Shape::Str,
        ] {
            registry.register(Shape::Seq(Box::new(elem)));
        }
        registry
    }

    fn register(&mut self, shape: Shape) -> TypeId {
        if let Some(&id) = self.by_shape.get(&shape) {
            return id;
        }
        let id = self.next_id;
        self.by_shape.insert(shape.clone(), id);
        self.by_id.insert(id, shape.clone());
        self.next_id += 1;
        // A record's sequence shape rides along, enabling list payloads.
        if matches!(shape, Shape::Record(_)) {
            self.register(Shape::Seq(Box::new(shape)));
        }
        id
    }
}

static REGISTRY: LazyLock<RwLock<Registry>> =
    LazyLock::new(|| RwLock::new(Registry::with_primitives()));

/// Register a shape, returning its id. Idempotent: a shape already present
/// keeps its id. Record shapes also register the sequence of that record.
pub fn register(shape: Shape) -> TypeId {
    REGISTRY
        .write()
        .expect("type registry lock poisoned")
        .register(shape)
}

/// Look up the id of a registered shape.
pub fn id_of(shape: &Shape) -> Result<TypeId, WireError> {
    REGISTRY
        .read()
        .expect("type registry lock poisoned")
        .by_shape
        .get(shape)
        .copied()
        .ok_or_else(|| WireError::UnregisteredShape(shape.to_string()))
}

/// Look up the shape registered under an id.
pub fn shape_of(id: TypeId) -> Result<Shape, WireError> {
    REGISTRY
        .read()
        .expect("type registry lock poisoned")
        .by_id
        .get(&id)
        .cloned()
        .ok_or(WireError::UnregisteredType(id))
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn shape_u8() -> Shape {
        Shape::U8
    }

    fn shape_str() -> Shape {
        Shape::Str
    }

    static TEST_RECORD: RecordShape = RecordShape {
        name: "RegistryProbe",
        fields: &[
            FieldShape {
                name: "tag",
                shape: shape_u8,
                exported: true,
            },
            FieldShape {
                name: "label",
                shape: shape_str,
                exported: true,
            },
        ],
    };

    #[test]
    fn primitives_have_stable_ids() {
        assert_eq!(id_of(&Shape::Null).unwrap(), 0);
        assert_eq!(id_of(&Shape::Int).unwrap(), 1);
        assert_eq!(id_of(&Shape::I64).unwrap(), 5);
        assert_eq!(id_of(&Shape::UInt).unwrap(), 6);
        assert_eq!(id_of(&Shape::U8).unwrap(), 7);
        assert_eq!(id_of(&Shape::Str).unwrap(), 14);
        assert_eq!(id_of(&Shape::bytes()).unwrap(), 15);
        assert_eq!(id_of(&Shape::Seq(Box::new(Shape::Int))).unwrap(), 16);
        assert_eq!(id_of(&Shape::Seq(Box::new(Shape::Str))).unwrap(), 28);
    }

    #[test]
    fn register_is_idempotent() {
        let first = register(Shape::Record(&TEST_RECORD));
        let second = register(Shape::Record(&TEST_RECORD));
        assert_eq!(first, second);
    }

    #[test]
    fn record_registration_brings_its_sequence() {
        register(Shape::Record(&TEST_RECORD));
        let seq = Shape::Seq(Box::new(Shape::Record(&TEST_RECORD)));
        assert!(id_of(&seq).is_ok());
    }

    #[test]
    fn round_trip_through_ids() {
        let id = register(Shape::Record(&TEST_RECORD));
        assert_eq!(shape_of(id).unwrap(), Shape::Record(&TEST_RECORD));
    }

    #[test]
    fn unknown_id_is_rejected() {
        assert!(matches!(
            shape_of(u16::MAX),
            Err(WireError::UnregisteredType(_))
        ));
    }
}
