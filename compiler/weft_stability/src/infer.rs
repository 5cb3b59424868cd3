//! The stability inference walk.
//!
//! Walks the type pool to compute a [`Stability`] verdict per type, with
//! memoization and cycle detection for recursive declarations. Inference
//! never fails: anything it cannot pin down degrades toward "unstable",
//! which costs re-invocations but never misses an update.

use std::cell::RefCell;

use rustc_hash::{FxHashMap, FxHashSet};

use weft_ir::{Name, TypeId};
use weft_types::{ClassKind, DeclId, Pool, StabilityAnnotation, Tag};

use crate::Stability;

/// Stability inferencer over a type pool.
///
/// Wraps a `Pool` reference with verdict caching and cycle detection.
///
/// # Interior Mutability
///
/// Uses `RefCell` for the caches and the in-flight set because callers
/// query through `&self`; verdicts are deterministic pure functions of
/// the type graph, so racing recomputation would only repeat work.
pub struct StabilityInferencer<'pool> {
    pool: &'pool Pool,
    type_cache: RefCell<FxHashMap<TypeId, Stability>>,
    decl_cache: RefCell<FxHashMap<DeclId, Stability>>,
    /// Declarations currently being folded, for cycle detection. A
    /// re-entrant reference closes the cycle optimistically as stable;
    /// the declaration's other fields still decide the real verdict.
    in_flight: RefCell<FxHashSet<DeclId>>,
}

impl<'pool> StabilityInferencer<'pool> {
    /// Create an inferencer for the given type pool.
    pub fn new(pool: &'pool Pool) -> Self {
        Self {
            pool,
            type_cache: RefCell::new(FxHashMap::default()),
            decl_cache: RefCell::new(FxHashMap::default()),
            in_flight: RefCell::new(FxHashSet::default()),
        }
    }

    /// Access the underlying pool.
    pub fn pool(&self) -> &'pool Pool {
        self.pool
    }

    /// Verdict for a type.
    pub fn stability_of(&self, ty: TypeId) -> Stability {
        if !ty.is_some() {
            tracing::warn!("stability query on TypeId::NONE, degrading to unstable");
            return Stability::UNSTABLE;
        }

        // Fast path: primitives never hit the cache.
        if ty.is_primitive() {
            return Stability::STABLE;
        }

        if let Some(cached) = self.type_cache.borrow().get(&ty) {
            return cached.clone();
        }

        let result = self.compute(ty);

        self.type_cache.borrow_mut().insert(ty, result.clone());
        result
    }

    /// Verdict for a declaration, before generic substitution.
    ///
    /// `Parameter` leaves in the result refer to the declaration's own
    /// type parameters.
    pub fn declared_stability(&self, decl_id: DeclId) -> Stability {
        if let Some(cached) = self.decl_cache.borrow().get(&decl_id) {
            return cached.clone();
        }

        let result = self.compute_declared(decl_id);

        // A verdict computed while the declaration participates in a
        // cycle is still deterministic, so caching it is safe.
        self.decl_cache.borrow_mut().insert(decl_id, result.clone());
        result
    }

    fn compute(&self, ty: TypeId) -> Stability {
        match self.pool.tag(ty) {
            Tag::Int | Tag::Float | Tag::Bool | Tag::Str | Tag::Char | Tag::Unit => {
                Stability::STABLE
            }

            // Never produced by construction; degrade conservatively.
            Tag::Reserved => Stability::UNSTABLE,

            // Function values carry no externally mutable state of their
            // own; captured state is the capture site's concern.
            Tag::Function => Stability::STABLE,

            // An unconstrained generic parameter propagates to the
            // instantiation site.
            Tag::Param => match self.pool.param_info(ty) {
                Some((_, name)) => Stability::Parameter(name),
                None => Stability::UNSTABLE,
            },

            // Known immutable wrappers follow their arguments.
            Tag::PersistentList => match self.pool.list_elem(ty) {
                Some(elem) => self.stability_of(elem),
                None => Stability::UNSTABLE,
            },
            Tag::Pair => match self.pool.pair_parts(ty) {
                Some((a, b)) => {
                    Stability::combine(vec![self.stability_of(a), self.stability_of(b)])
                }
                None => Stability::UNSTABLE,
            },
            Tag::Lazy => match self.pool.lazy_inner(ty) {
                Some(inner) => self.stability_of(inner),
                None => Stability::UNSTABLE,
            },

            Tag::Class | Tag::Interface => match self.pool.decl_of(ty) {
                Some(decl_id) => self.declared_stability(decl_id),
                None => Stability::UNSTABLE,
            },

            Tag::Applied => match (self.pool.applied_parts(ty), self.pool.decl_of(ty)) {
                (Some((_, args)), Some(decl_id)) => {
                    let raw = self.declared_stability(decl_id);
                    let decl = self.pool.class_decl(decl_id);
                    let mut subst = FxHashMap::default();
                    for (i, &param) in decl.type_params.iter().enumerate() {
                        let arg = args.get(i).copied().unwrap_or(TypeId::NONE);
                        subst.insert(param, self.stability_of(arg));
                    }
                    substitute(raw, &subst)
                }
                _ => Stability::UNSTABLE,
            },
        }
    }

    fn compute_declared(&self, decl_id: DeclId) -> Stability {
        let decl = self.pool.class_decl(decl_id);

        // An explicit annotation always wins — including over the
        // cross-module deferral below. The annotation is an ABI promise,
        // so the current unit may inline the verdict.
        match decl.annotation {
            StabilityAnnotation::Stable => return Stability::STABLE,
            StabilityAnnotation::Unstable => return Stability::UNSTABLE,
            StabilityAnnotation::None => {}
        }

        // Other compilation units resolve via their generated mask at
        // load time, even when knowably stable over there.
        if decl.origin.is_external() {
            return Stability::Runtime(decl_id);
        }

        // The declared type alone guarantees nothing about concrete
        // instances.
        if decl.kind == ClassKind::Interface {
            return Stability::Uncertain(decl_id);
        }

        // Cycle: close optimistically and let the declaration's other
        // fields decide.
        if !self.in_flight.borrow_mut().insert(decl_id) {
            tracing::debug!(decl = decl_id.raw(), "closing recursive type cycle");
            return Stability::STABLE;
        }

        // Fold observable fields. Value classes are the single-field
        // case of the same fold.
        let mut parts = Vec::with_capacity(decl.fields.len());
        for field in &decl.fields {
            // Accessor-only properties have no storage the runtime could
            // miss changes on.
            if !field.has_backing_field() {
                continue;
            }
            // Delegated properties are judged by the delegate holder,
            // mutable or not: writes route through the holder.
            if field.is_delegated() {
                parts.push(self.stability_of(field.delegate));
                continue;
            }
            // A bare read-write field is disqualifying whatever its type:
            // nothing tells the runtime when it is reassigned.
            if field.is_mutable() {
                parts.push(Stability::UNSTABLE);
                continue;
            }
            parts.push(self.stability_of(field.ty));
        }

        self.in_flight.borrow_mut().remove(&decl_id);
        Stability::combine(parts)
    }
}

/// Replace `Parameter` leaves using the given substitution.
fn substitute(verdict: Stability, subst: &FxHashMap<Name, Stability>) -> Stability {
    match verdict {
        Stability::Parameter(name) => match subst.get(&name) {
            Some(replacement) => replacement.clone(),
            None => Stability::Parameter(name),
        },
        Stability::Combined(parts) => Stability::combine(
            parts
                .into_iter()
                .map(|part| substitute(part, subst))
                .collect(),
        ),
        other => other,
    }
}
