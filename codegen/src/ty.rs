//! The type half of the emission mapping table (spec §4.6).

use transpiler_hir::{ArrayLen, Extent, FloatWidth, PointerMarker, Refinement, Ty};
use transpiler_session::diagnostics::DiagnosticsHandler;

use crate::Ctx;

/// `RegionId`'s `Display` already renders as `region<n>` (via `entity_impl!`'s display prefix),
/// which doubles as a perfectly valid Rust lifetime identifier once prefixed with `'`.
fn region_name(region: transpiler_hir::RegionId) -> String {
    format!("'{region}")
}

/// Renders a pointer's marker as the corresponding Rust type wrapped around `inner` (spec §4.6's
/// pointer rows), recording a diagnostic and falling back to a raw pointer for any marker the
/// verifier should never have let through (spec §4.6 "codegen never rejects").
fn emit_pointer(
    inner: &str,
    marker: &PointerMarker,
    is_const: bool,
    decl_context: &str,
    diagnostics: &mut DiagnosticsHandler,
) -> String {
    let base = match &marker.refinement {
        Refinement::Owning(_) => format!("Box<{inner}>"),
        Refinement::OwningArray(_, ArrayLen::Dynamic) => format!("Vec<{inner}>"),
        Refinement::OwningArray(_, ArrayLen::Static(n)) => format!("Box<[{inner}; {n}]>"),
        Refinement::Borrow { mutable: false, region } => {
            format!("&{} {inner}", region_name(*region))
        }
        Refinement::Borrow { mutable: true, region } => {
            format!("&{} mut {inner}", region_name(*region))
        }
        Refinement::RawEscape { reason } => {
            let qual = if is_const { "const" } else { "mut" };
            diagnostics.note(
                "N-CODEGEN-0001",
                format!("`{decl_context}` emits a raw pointer escape hatch: {reason}"),
            );
            format!("*{qual} {inner}")
        }
        Refinement::Unclassified => {
            diagnostics.error(
                "E-CODEGEN-0001",
                format!("`{decl_context}` reached codegen unclassified; emitting a raw pointer placeholder"),
            );
            let qual = if is_const { "const" } else { "mut" };
            format!("*{qual} {inner}")
        }
    };
    if marker.nullable && !matches!(marker.refinement, Refinement::RawEscape { .. } | Refinement::Unclassified) {
        format!("Option<{base}>")
    } else {
        base
    }
}

/// Renders `ty` as a Rust type, resolving record/union/enum/alias references through the
/// translation unit's type registry and consulting the tagged-union hints for whether a union has
/// a known discriminant field.
pub fn emit_ty(ty: &Ty, ctx: &Ctx, decl_context: &str, diagnostics: &mut DiagnosticsHandler) -> String {
    match ty {
        Ty::Int { signed: true, width } => format!("i{}", width.bits()),
        Ty::Int { signed: false, width } => format!("u{}", width.bits()),
        Ty::Float(FloatWidth::F32) => "f32".to_string(),
        Ty::Float(FloatWidth::F64) => "f64".to_string(),
        Ty::Bool => "bool".to_string(),
        Ty::Char => "u8".to_string(),
        Ty::Void => "()".to_string(),
        Ty::Record(id) => ctx
            .unit
            .record(*id)
            .map(|r| r.name.as_str().to_string())
            .unwrap_or_else(|| "()".to_string()),
        Ty::Union(id) => {
            let name = ctx.unit.union(*id).map(|u| u.name.as_str().to_string()).unwrap_or_default();
            match ctx.hints.discriminant_for(&name) {
                Some(_) => name,
                None => format!("{name}Raw"),
            }
        }
        Ty::Enum(id) => {
            ctx.unit.enum_(*id).map(|e| e.name.as_str().to_string()).unwrap_or_else(|| "i32".to_string())
        }
        Ty::Alias(id) => {
            let name = ctx.unit.types.alias_name(*id);
            // `pthread_t` never carries useful payload beyond "is a thread running", so it is
            // represented directly as the join handle its only legal uses (`pthread_create`'s
            // output, `pthread_join`'s input) actually need (spec §9 "Concurrency").
            if name.as_str() == "pthread_t" {
                "Option<::std::thread::JoinHandle<()>>".to_string()
            } else {
                name.as_str().to_string()
            }
        }
        Ty::Pointer(inner, quals, marker) => {
            let inner_ty = emit_ty(inner, ctx, decl_context, diagnostics);
            emit_pointer(&inner_ty, marker, quals.is_const, decl_context, diagnostics)
        }
        Ty::Array(inner, Extent::Known(n)) => {
            format!("[{}; {n}]", emit_ty(inner, ctx, decl_context, diagnostics))
        }
        Ty::Array(inner, Extent::Unknown) => {
            diagnostics.note(
                "N-CODEGEN-0002",
                format!("`{decl_context}` has an array of unknown extent; emitting `Vec` as the closest fit"),
            );
            format!("Vec<{}>", emit_ty(inner, ctx, decl_context, diagnostics))
        }
        Ty::Function(params, ret, variadic) => {
            let mut param_tys: Vec<String> =
                params.iter().map(|p| emit_ty(p, ctx, decl_context, diagnostics)).collect();
            if *variadic {
                diagnostics.note(
                    "N-CODEGEN-0009",
                    format!(
                        "`{decl_context}` has a variadic function type; the `...` trailer is not representable as a \
                         safe `fn` pointer type, so it is emitted as a trailing `&[Box<dyn core::any::Any>]` parameter"
                    ),
                );
                param_tys.push("&[Box<dyn core::any::Any>]".to_string());
            }
            format!("fn({}) -> {}", param_tys.join(", "), emit_ty(ret, ctx, decl_context, diagnostics))
        }
        Ty::Unsupported(reason) => {
            diagnostics.error(
                "E-CODEGEN-0002",
                format!("`{decl_context}` has a type codegen cannot render ({reason}); emitting `()` placeholder"),
            );
            "/* unsupported type */ ()".to_string()
        }
    }
}
