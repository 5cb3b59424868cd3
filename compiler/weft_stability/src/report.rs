//! Human-readable stability reports.
//!
//! Inference ambiguity and cross-module deferral are never errors; they
//! are recorded here for diagnostics and tooling instead.

use weft_ir::StringInterner;
use weft_types::Pool;

use crate::{Stability, StabilityInferencer};

/// Describe a verdict in one phrase.
fn describe(verdict: &Stability, pool: &Pool, interner: &StringInterner) -> String {
    match verdict {
        Stability::Certain(true) => "stable".to_owned(),
        Stability::Certain(false) => "unstable".to_owned(),
        Stability::Parameter(name) => format!("parameter({})", interner.resolve(*name)),
        Stability::Runtime(decl) => format!(
            "runtime({})",
            interner.resolve(pool.class_decl(*decl).name)
        ),
        Stability::Uncertain(decl) => format!(
            "uncertain({})",
            interner.resolve(pool.class_decl(*decl).name)
        ),
        Stability::Combined(parts) => {
            let joined: Vec<String> = parts
                .iter()
                .map(|part| describe(part, pool, interner))
                .collect();
            joined.join(" | ")
        }
    }
}

/// Render a per-declaration stability report for a pool.
///
/// One line per declaration plus one indented line per stored field.
pub fn stability_report(
    pool: &Pool,
    interner: &StringInterner,
    inferencer: &StabilityInferencer<'_>,
) -> String {
    let mut out = String::new();
    for decl_id in pool.decl_ids() {
        let decl = pool.class_decl(decl_id);
        let verdict = inferencer.declared_stability(decl_id);
        out.push_str(&format!(
            "{} {}: {}\n",
            decl.kind,
            interner.resolve(decl.name),
            describe(&verdict, pool, interner)
        ));
        for field in &decl.fields {
            if !field.has_backing_field() {
                continue;
            }
            let field_verdict = if field.is_delegated() {
                inferencer.stability_of(field.delegate)
            } else if field.is_mutable() {
                Stability::UNSTABLE
            } else {
                inferencer.stability_of(field.ty)
            };
            out.push_str(&format!(
                "  {} {}: {}\n",
                if field.is_mutable() { "var" } else { "val" },
                interner.resolve(field.name),
                describe(&field_verdict, pool, interner)
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use weft_ir::TypeId;
    use weft_types::{ClassDecl, ClassKind, FieldDecl};

    use super::*;

    #[test]
    fn report_lists_declarations_and_fields() {
        let interner = StringInterner::new();
        let mut pool = Pool::new();
        let decl = ClassDecl::new(interner.intern("Row"), ClassKind::Class).with_fields(vec![
            FieldDecl::val(interner.intern("width"), TypeId::INT),
            FieldDecl::var(interner.intern("label"), TypeId::STR),
        ]);
        pool.declare(decl);
        let inf = StabilityInferencer::new(&pool);
        let report = stability_report(&pool, &interner, &inf);
        assert!(report.contains("class Row: unstable"));
        assert!(report.contains("  val width: stable"));
        assert!(report.contains("  var label: unstable"));
    }

    #[test]
    fn report_names_generic_parameters() {
        let interner = StringInterner::new();
        let mut pool = Pool::new();
        let t = interner.intern("T");
        let t_ty = pool.type_param(0, t);
        let decl = ClassDecl::new(interner.intern("Holder"), ClassKind::Class)
            .with_type_params(vec![t])
            .with_fields(vec![FieldDecl::val(interner.intern("value"), t_ty)]);
        pool.declare(decl);
        let inf = StabilityInferencer::new(&pool);
        let report = stability_report(&pool, &interner, &inf);
        assert!(report.contains("class Holder: parameter(T)"));
    }
}
