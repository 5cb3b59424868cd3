//! Unified type pool.
//!
//! All types live in one pool and are referenced by `TypeId`. Structural
//! duplicates are interned to the same index, so equality is an integer
//! compare. Primitives occupy fixed pre-interned indices (the contract
//! declared on `weft_ir::TypeId`).

use rustc_hash::FxHashMap;

use weft_ir::{Name, TypeId};

use crate::decl::ClassDecl;
use crate::tag::Tag;

/// Index of a class/interface declaration registered with the pool.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct DeclId(u32);

impl DeclId {
    #[inline]
    pub const fn new(index: u32) -> Self {
        DeclId(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Interned payload for one pool entry.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
enum TypeData {
    Primitive(Tag),
    Reserved,
    Function { params: Vec<TypeId>, ret: TypeId },
    Param { index: u32, name: Name },
    PersistentList(TypeId),
    Pair(TypeId, TypeId),
    Lazy(TypeId),
    Declared(DeclId),
    Applied { base: TypeId, args: Vec<TypeId> },
}

/// The type pool plus the declaration table it resolves into.
#[derive(Clone, Debug)]
pub struct Pool {
    entries: Vec<TypeData>,
    interned: FxHashMap<TypeData, TypeId>,
    decls: Vec<ClassDecl>,
}

impl Pool {
    /// Create a pool with primitives pre-interned at their fixed indices.
    pub fn new() -> Self {
        let mut entries = Vec::with_capacity(TypeId::FIRST_DYNAMIC as usize);
        for tag in [Tag::Int, Tag::Float, Tag::Bool, Tag::Str, Tag::Char, Tag::Unit] {
            entries.push(TypeData::Primitive(tag));
        }
        while entries.len() < TypeId::FIRST_DYNAMIC as usize {
            entries.push(TypeData::Reserved);
        }
        Pool {
            entries,
            interned: FxHashMap::default(),
            decls: Vec::new(),
        }
    }

    fn intern(&mut self, data: TypeData) -> TypeId {
        if let Some(&id) = self.interned.get(&data) {
            return id;
        }
        let raw = u32::try_from(self.entries.len()).unwrap_or_else(|_| {
            panic!("type pool exceeded u32::MAX entries");
        });
        let id = TypeId::from_raw(raw);
        self.entries.push(data.clone());
        self.interned.insert(data, id);
        id
    }

    // ── Construction ────────────────────────────────────────────────

    /// Intern a function type.
    pub fn function(&mut self, params: &[TypeId], ret: TypeId) -> TypeId {
        self.intern(TypeData::Function {
            params: params.to_vec(),
            ret,
        })
    }

    /// Intern a generic type parameter of the enclosing declaration.
    pub fn type_param(&mut self, index: u32, name: Name) -> TypeId {
        self.intern(TypeData::Param { index, name })
    }

    /// Intern a persistent (immutable) list of `elem`.
    pub fn persistent_list(&mut self, elem: TypeId) -> TypeId {
        self.intern(TypeData::PersistentList(elem))
    }

    /// Intern a two-element product type.
    pub fn pair(&mut self, first: TypeId, second: TypeId) -> TypeId {
        self.intern(TypeData::Pair(first, second))
    }

    /// Intern a deferred-reference wrapper around `inner`.
    pub fn lazy(&mut self, inner: TypeId) -> TypeId {
        self.intern(TypeData::Lazy(inner))
    }

    /// Register a declaration and intern its declared type.
    pub fn declare(&mut self, decl: ClassDecl) -> (DeclId, TypeId) {
        let raw = u32::try_from(self.decls.len()).unwrap_or_else(|_| {
            panic!("declaration table exceeded u32::MAX entries");
        });
        let decl_id = DeclId::new(raw);
        self.decls.push(decl);
        let ty = self.intern(TypeData::Declared(decl_id));
        (decl_id, ty)
    }

    /// Replace a declaration's fields.
    ///
    /// Self-referential declarations are built in two steps: declare to
    /// obtain the type index, then fill in fields that mention it.
    pub fn update_fields(&mut self, id: DeclId, fields: Vec<crate::FieldDecl>) {
        self.decls[id.index()].fields = fields;
    }

    /// Intern a generic instantiation of a declared type.
    pub fn applied(&mut self, base: TypeId, args: &[TypeId]) -> TypeId {
        self.intern(TypeData::Applied {
            base,
            args: args.to_vec(),
        })
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// The kind tag at an index.
    ///
    /// # Panics
    /// Panics on an out-of-bounds index; `TypeId`s are only produced by
    /// this pool.
    pub fn tag(&self, id: TypeId) -> Tag {
        match &self.entries[id.raw() as usize] {
            TypeData::Primitive(tag) => *tag,
            TypeData::Reserved => Tag::Reserved,
            TypeData::Function { .. } => Tag::Function,
            TypeData::Param { .. } => Tag::Param,
            TypeData::PersistentList(_) => Tag::PersistentList,
            TypeData::Pair(_, _) => Tag::Pair,
            TypeData::Lazy(_) => Tag::Lazy,
            TypeData::Declared(decl_id) => match self.decls[decl_id.index()].kind {
                crate::ClassKind::Interface => Tag::Interface,
                _ => Tag::Class,
            },
            TypeData::Applied { .. } => Tag::Applied,
        }
    }

    /// The declaration behind a `Class`/`Interface` type.
    pub fn decl_of(&self, id: TypeId) -> Option<DeclId> {
        match &self.entries[id.raw() as usize] {
            TypeData::Declared(decl_id) => Some(*decl_id),
            TypeData::Applied { base, .. } => self.decl_of(*base),
            _ => None,
        }
    }

    /// A registered declaration.
    pub fn class_decl(&self, id: DeclId) -> &ClassDecl {
        &self.decls[id.index()]
    }

    /// Generic parameter position and name, for `Param` types.
    pub fn param_info(&self, id: TypeId) -> Option<(u32, Name)> {
        match &self.entries[id.raw() as usize] {
            TypeData::Param { index, name } => Some((*index, *name)),
            _ => None,
        }
    }

    /// Element type of a persistent list.
    pub fn list_elem(&self, id: TypeId) -> Option<TypeId> {
        match &self.entries[id.raw() as usize] {
            TypeData::PersistentList(elem) => Some(*elem),
            _ => None,
        }
    }

    /// Components of a pair.
    pub fn pair_parts(&self, id: TypeId) -> Option<(TypeId, TypeId)> {
        match &self.entries[id.raw() as usize] {
            TypeData::Pair(a, b) => Some((*a, *b)),
            _ => None,
        }
    }

    /// Referent of a lazy wrapper.
    pub fn lazy_inner(&self, id: TypeId) -> Option<TypeId> {
        match &self.entries[id.raw() as usize] {
            TypeData::Lazy(inner) => Some(*inner),
            _ => None,
        }
    }

    /// Base and arguments of a generic instantiation.
    pub fn applied_parts(&self, id: TypeId) -> Option<(TypeId, &[TypeId])> {
        match &self.entries[id.raw() as usize] {
            TypeData::Applied { base, args } => Some((*base, args.as_slice())),
            _ => None,
        }
    }

    /// Number of pool entries (including pre-interned primitives).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        // Primitives are always present.
        false
    }

    /// Number of registered declarations.
    pub fn decl_count(&self) -> usize {
        self.decls.len()
    }

    /// Iterate over registered declaration ids.
    pub fn decl_ids(&self) -> impl Iterator<Item = DeclId> {
        // Declaration indices always fit u32 by declare's guard.
        let len = u32::try_from(self.decls.len()).unwrap_or(u32::MAX);
        (0..len).map(DeclId::new)
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}
