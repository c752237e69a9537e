//! Expression emission. Every HIR expression renders to a single Rust expression string; compound
//! forms that need a temporary (post-increment, pointer difference) render as a block expression
//! so they still compose inside a larger expression.

use transpiler_hir::{BinOp, Expr, ExprKind, Ident, Literal, PromotionKind, Refinement, Ty, UnOp};
use transpiler_session::{
    catalog::{AllocatorRole, SyncRole},
    diagnostics::DiagnosticsHandler,
};

use crate::{rust_ident, ty::emit_ty, Ctx};

fn emit_literal(lit: &Literal) -> String {
    match lit {
        Literal::Int(v) => v.to_string(),
        Literal::Float(v) => {
            if v.fract() == 0.0 {
                format!("{v:.1}")
            } else {
                format!("{v}")
            }
        }
        Literal::Bool(b) => b.to_string(),
        Literal::Char(c) => format!("{c:?}"),
        Literal::Str(s) => format!("{s:?}"),
        Literal::Null => "None".to_string(),
    }
}

fn bin_op_str(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Rem => "%",
        BinOp::BitAnd => "&",
        BinOp::BitOr => "|",
        BinOp::BitXor => "^",
        BinOp::Shl => "<<",
        BinOp::Shr => ">>",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::LogicalAnd => "&&",
        BinOp::LogicalOr => "||",
        BinOp::PointerDiff => unreachable!("handled separately"),
    }
}

/// The allocator/releaser call mapping of spec §4.6's last two rows. Returns `None` when `callee`
/// is not a recognized catalog entry, so the caller falls back to an ordinary function call.
fn emit_catalog_call(callee: &Ident, args: &[Expr], ctx: &Ctx, diagnostics: &mut DiagnosticsHandler) -> Option<String> {
    let role = ctx.catalog.role(callee.as_str())?;
    let rendered_args: Vec<String> = args.iter().map(|a| emit_expr(a, None, ctx, diagnostics)).collect();
    Some(match role {
        AllocatorRole::AllocatesOne => "Box::new(::core::default::Default::default())".to_string(),
        AllocatorRole::AllocatesArray => match rendered_args.first() {
            Some(count) => format!("vec![::core::default::Default::default(); ({count}) as usize]"),
            None => "Vec::new()".to_string(),
        },
        AllocatorRole::Reallocates => {
            let (target, new_size) = (
                rendered_args.first().cloned().unwrap_or_default(),
                rendered_args.get(1).cloned().unwrap_or_default(),
            );
            format!(
                "{{ let mut __v = {target}; __v.resize(({new_size}) as usize, ::core::default::Default::default()); __v }}"
            )
        }
        AllocatorRole::Releases => {
            let arg = rendered_args.first().cloned().unwrap_or_default();
            format!("drop({arg})")
        }
    })
}

/// Renders the place a pointer expression points at: `&x` unwraps directly to `x`'s place (through
/// [`emit_place`], so a synchronized global still renders as its guard dereference); any other
/// pointer-valued expression falls back to an explicit `*`. Used by the thread-spawn mapping below
/// to write the returned join handle through the caller's `pthread_t*` argument.
fn emit_pointer_target(expr: &Expr, ctx: &Ctx, diagnostics: &mut DiagnosticsHandler) -> String {
    if let ExprKind::AddrOf(inner) = &expr.kind {
        emit_place(inner, ctx, diagnostics)
    } else {
        format!("(*{})", emit_expr(expr, None, ctx, diagnostics))
    }
}

/// The POSIX-threading call mapping of spec §9's concurrency rows. Returns `None` when `callee`
/// is not a recognized catalog entry, so the caller falls back to an ordinary function call.
///
/// `pthread_mutex_*` calls are elided rather than lowered: the global they guard is already
/// wrapped in its own `Mutex` by the same write-analysis that decides `Decl::Global` emission
/// (spec §9 "Global mutable state"), and every read or write of that global already takes its
/// guard at the access site, so the original lock/unlock call sites have nothing left to do.
/// Condition-variable calls are recognized (so they do not fall through as unresolved calls) but
/// are not lowered; see `DESIGN.md`.
fn emit_sync_call(callee: &Ident, args: &[Expr], ctx: &Ctx, diagnostics: &mut DiagnosticsHandler) -> Option<String> {
    let role = ctx.sync_catalog.role(callee.as_str())?;
    Some(match role {
        SyncRole::ThreadSpawn => {
            let handle_target = args.first().map(|a| emit_pointer_target(a, ctx, diagnostics)).unwrap_or_default();
            let start_routine = args.get(2).map(|a| emit_expr(a, None, ctx, diagnostics)).unwrap_or_default();
            let arg = args.get(3).map(|a| emit_expr(a, None, ctx, diagnostics)).unwrap_or_default();
            diagnostics.note(
                "N-CODEGEN-0010",
                format!(
                    "`{callee}` lowered to `std::thread::spawn`; the spawned handle is stored as \
                     `Option<::std::thread::JoinHandle<()>>`"
                ),
            );
            format!("{{ {handle_target} = Some(::std::thread::spawn(move || {{ {start_routine}({arg}); }})); 0 }}")
        }
        SyncRole::ThreadJoin => {
            let handle = args.first().map(|a| emit_expr(a, None, ctx, diagnostics)).unwrap_or_default();
            format!("{{ if let Some(__h) = {handle} {{ let _ = __h.join(); }} 0 }}")
        }
        SyncRole::MutexOp => {
            diagnostics.note(
                "N-CODEGEN-0011",
                format!("`{callee}` elided: the global it guards is already represented as its own `Mutex`"),
            );
            "()".to_string()
        }
        SyncRole::CondOp => {
            diagnostics.error(
                "E-CODEGEN-0006",
                format!("`{callee}` has no condition-variable lowering; manual review needed"),
            );
            format!("todo!(\"condition variable call `{callee}` is not lowered\")")
        }
    })
}

/// Renders a reference to `ident` for reading: a local or parameter renders as its bare
/// identifier; a global renders as its declared name directly, or — when [`Ctx::globals`] marks it
/// `synchronized` — as a cloned read through its `Mutex` guard, since the declaration itself is
/// never a bare `static mut` (spec §9 "Global mutable state").
fn emit_name_read(ident: &Ident, ctx: &Ctx) -> String {
    match ctx.globals.get(ident) {
        Some(info) if info.synchronized => format!("{}.lock().unwrap().clone()", info.rust_name),
        Some(info) => info.rust_name.clone(),
        None => rust_ident(ident),
    }
}

/// Renders `expr` as an assignable place: the target of `=`/compound-assignment and the operand of
/// `++`/`--`. Identical to [`emit_name_read`] for locals and plain globals; for a `synchronized`
/// global this yields the dereferenced lock guard instead of a cloned value, so the place can be
/// written through directly.
fn emit_place(expr: &Expr, ctx: &Ctx, diagnostics: &mut DiagnosticsHandler) -> String {
    if let ExprKind::Name(ident) = &expr.kind {
        if let Some(info) = ctx.globals.get(ident) {
            return if info.synchronized {
                format!("(*{}.lock().unwrap())", info.rust_name)
            } else {
                info.rust_name.clone()
            };
        }
    }
    emit_expr(expr, None, ctx, diagnostics)
}

/// Renders `expr` to a Rust expression. `expected` is the type the surrounding context wants this
/// expression to produce (a declaration's type, an assignment's left side, a matched parameter or
/// return type); `AddrOf` consults it to decide between `&` and `&mut`, since the HIR's address-of
/// node does not itself carry mutability.
pub fn emit_expr(expr: &Expr, expected: Option<&Ty>, ctx: &Ctx, diagnostics: &mut DiagnosticsHandler) -> String {
    match &expr.kind {
        ExprKind::Literal(lit) => emit_literal(lit),
        ExprKind::Name(ident) => emit_name_read(ident, ctx),
        ExprKind::Member { base, field, .. } => {
            format!("{}.{}", emit_expr(base, None, ctx, diagnostics), rust_ident(field))
        }
        ExprKind::Index { base, index } => {
            format!("{}[({}) as usize]", emit_expr(base, None, ctx, diagnostics), emit_expr(index, None, ctx, diagnostics))
        }
        ExprKind::Unary { op: op @ (UnOp::PreIncrement | UnOp::PreDecrement | UnOp::PostIncrement | UnOp::PostDecrement), operand } => {
            let place = emit_place(operand, ctx, diagnostics);
            match op {
                UnOp::PreIncrement => format!("{{ {place} += 1; {place} }}"),
                UnOp::PreDecrement => format!("{{ {place} -= 1; {place} }}"),
                UnOp::PostIncrement => format!("{{ let __prev = {place}; {place} += 1; __prev }}"),
                UnOp::PostDecrement => format!("{{ let __prev = {place}; {place} -= 1; __prev }}"),
                _ => unreachable!(),
            }
        }
        ExprKind::Unary { op, operand } => {
            let rendered = emit_expr(operand, None, ctx, diagnostics);
            match op {
                UnOp::Neg => format!("(-{rendered})"),
                UnOp::Not => format!("(!{rendered})"),
                UnOp::BitNot => format!("(!{rendered})"),
                UnOp::PreIncrement | UnOp::PreDecrement | UnOp::PostIncrement | UnOp::PostDecrement => unreachable!(),
            }
        }
        ExprKind::Binary { op: BinOp::PointerDiff, lhs, rhs } => {
            // spec §9: pointer difference is lowered into index subtraction at codegen time.
            format!(
                "(({}) as isize - ({}) as isize)",
                emit_expr(lhs, None, ctx, diagnostics),
                emit_expr(rhs, None, ctx, diagnostics)
            )
        }
        ExprKind::Binary { op, lhs, rhs } => {
            format!(
                "({} {} {})",
                emit_expr(lhs, None, ctx, diagnostics),
                bin_op_str(*op),
                emit_expr(rhs, None, ctx, diagnostics)
            )
        }
        ExprKind::Ternary { cond, then_branch, else_branch } => {
            format!(
                "(if {} {{ {} }} else {{ {} }})",
                emit_expr(cond, None, ctx, diagnostics),
                emit_expr(then_branch, expected, ctx, diagnostics),
                emit_expr(else_branch, expected, ctx, diagnostics)
            )
        }
        ExprKind::Cast { expr: inner, to } => {
            format!("({} as {})", emit_expr(inner, None, ctx, diagnostics), emit_ty(to, ctx, "cast", diagnostics))
        }
        ExprKind::Promotion { expr: inner, kind: PromotionKind::BoolToInt } => {
            format!("({} as i32)", emit_expr(inner, None, ctx, diagnostics))
        }
        ExprKind::Promotion { expr: inner, .. } => emit_expr(inner, expected, ctx, diagnostics),
        ExprKind::AddrOf(inner) => {
            let wants_mut = matches!(
                expected.and_then(Ty::as_pointer),
                Some((_, _, marker)) if matches!(&marker.refinement, Refinement::Borrow { mutable: true, .. })
            );
            let rendered = emit_place(inner, ctx, diagnostics);
            if wants_mut {
                format!("(&mut {rendered})")
            } else {
                format!("(&{rendered})")
            }
        }
        ExprKind::Deref(inner) => format!("(*{})", emit_expr(inner, None, ctx, diagnostics)),
        ExprKind::Call { callee, args } => {
            if let ExprKind::Name(name) = &callee.kind {
                if let Some(rendered) = emit_sync_call(name, args, ctx, diagnostics) {
                    return rendered;
                }
                if let Some(rendered) = emit_catalog_call(name, args, ctx, diagnostics) {
                    return rendered;
                }
                let rendered_args: Vec<String> =
                    args.iter().map(|a| emit_expr(a, None, ctx, diagnostics)).collect();
                return format!("{}({})", rust_ident(name), rendered_args.join(", "));
            }
            let rendered_args: Vec<String> = args.iter().map(|a| emit_expr(a, None, ctx, diagnostics)).collect();
            format!("({})({})", emit_expr(callee, None, ctx, diagnostics), rendered_args.join(", "))
        }
        ExprKind::CompoundLiteral { ty, fields } => {
            let ty_name = emit_ty(ty, ctx, "compound literal", diagnostics);
            let rendered_fields: Vec<String> = fields
                .iter()
                .map(|(name, value)| format!("{}: {}", rust_ident(name), emit_expr(value, None, ctx, diagnostics)))
                .collect();
            format!("{ty_name} {{ {} }}", rendered_fields.join(", "))
        }
        ExprKind::Sequence(exprs) => {
            let rendered: Vec<String> = exprs.iter().map(|e| emit_expr(e, None, ctx, diagnostics)).collect();
            format!("{{ {} }}", rendered.join("; "))
        }
        ExprKind::Assign { lhs, rhs, compound: None } => {
            format!(
                "{} = {}",
                emit_place(lhs, ctx, diagnostics),
                emit_expr(rhs, Some(&lhs.ty), ctx, diagnostics)
            )
        }
        ExprKind::Assign { lhs, rhs, compound: Some(op) } => {
            format!(
                "{} {}= {}",
                emit_place(lhs, ctx, diagnostics),
                bin_op_str(*op),
                emit_expr(rhs, None, ctx, diagnostics)
            )
        }
        ExprKind::Unsupported(reason) => {
            diagnostics.error("E-CODEGEN-0003", format!("expression codegen cannot render ({reason})"));
            "todo!(\"unsupported expression\")".to_string()
        }
    }
}
