//! Stability inference.
//!
//! Classifies every type reachable from a declaration into a *stability
//! verdict*: can a value of this type change without the runtime being
//! told? Stable parameters let the restart wrapper skip re-invocations;
//! anything else forces a runtime comparison or a full re-run.
//!
//! Worst case under imprecision is extra re-invocation, never a missed
//! update: every unresolvable case degrades toward "unstable".

mod infer;
mod mask;
mod report;

pub use infer::StabilityInferencer;
pub use mask::{class_mask, MaskExpr, PARAM_BIT_BASE, UNSTABLE_BIT};
pub use report::stability_report;

use weft_ir::Name;
use weft_types::DeclId;

/// Compile-time stability verdict for a type.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum Stability {
    /// Definitively stable or unstable, independent of type parameters
    /// and other modules.
    Certain(bool),
    /// Exactly as stable as the named generic parameter at the use site.
    Parameter(Name),
    /// Declared in another compilation unit; resolved at load time via
    /// that declaration's generated stability mask.
    Runtime(DeclId),
    /// Interface or abstract type; the concrete runtime type is unknown.
    Uncertain(DeclId),
    /// Aggregate of a product type's field verdicts.
    Combined(Vec<Stability>),
}

impl Stability {
    /// The verdict for a type with no observable state.
    pub const STABLE: Stability = Stability::Certain(true);
    /// The conservative bottom of the lattice.
    pub const UNSTABLE: Stability = Stability::Certain(false);

    /// Combine field verdicts, order-independently.
    ///
    /// Any certain-unstable part dominates; certain-stable parts vanish;
    /// a single survivor is returned unwrapped; no survivors means
    /// certain-stable.
    pub fn combine(parts: Vec<Stability>) -> Stability {
        let mut flat = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                Stability::Certain(false) => return Stability::UNSTABLE,
                Stability::Certain(true) => {}
                Stability::Combined(inner) => {
                    for p in inner {
                        if p.known_unstable() {
                            return Stability::UNSTABLE;
                        }
                        if !matches!(p, Stability::Certain(true)) && !flat.contains(&p) {
                            flat.push(p);
                        }
                    }
                }
                other => {
                    if !flat.contains(&other) {
                        flat.push(other);
                    }
                }
            }
        }
        match flat.len() {
            0 => Stability::STABLE,
            1 => flat.swap_remove(0),
            _ => Stability::Combined(flat),
        }
    }

    /// Whether the type is definitely stable at compile time.
    pub fn known_stable(&self) -> bool {
        match self {
            Stability::Certain(stable) => *stable,
            Stability::Combined(parts) => parts.iter().all(Stability::known_stable),
            _ => false,
        }
    }

    /// Whether the type is definitely unstable at compile time.
    pub fn known_unstable(&self) -> bool {
        match self {
            Stability::Certain(stable) => !*stable,
            Stability::Combined(parts) => parts.iter().any(Stability::known_unstable),
            _ => false,
        }
    }

    /// Whether any part is an unknown-concrete-type interface.
    pub fn is_uncertain(&self) -> bool {
        match self {
            Stability::Uncertain(_) => true,
            Stability::Combined(parts) => parts.iter().any(Stability::is_uncertain),
            _ => false,
        }
    }

    /// Whether the verdict carries a residual runtime expression.
    pub fn has_runtime_part(&self) -> bool {
        match self {
            Stability::Runtime(_) => true,
            Stability::Combined(parts) => parts.iter().any(Stability::has_runtime_part),
            _ => false,
        }
    }
}
