//! Codegen (spec §4.6): renders a [`TranslationUnit`] plus the ownership/lifetime decisions
//! already recorded on its `Refinement` markers as target-language source text.
//!
//! Emission walks the HIR once, writing into an incremental, indentation-aware string buffer
//! rather than building an intermediate AST to pretty-print. See `DESIGN.md` for the rationale.

pub mod expr;
pub mod stmt;
pub mod ty;

use rustc_hash::FxHashMap;
use transpiler_hir::{Decl, Expr, ExprKind, Function, Ident, Stmt, StmtKind, TranslationUnit, Ty, UnOp};
use transpiler_session::{
    catalog::{AllocatorCatalog, SyncCatalog},
    diagnostics::DiagnosticsHandler,
    TaggedUnionHints,
};

use crate::{expr::emit_expr, stmt::emit_stmt, ty::emit_ty};

/// What a [`Decl::Global`] was emitted as, so every reference to it (in [`expr`]) renders the same
/// way as its declaration. A global is always `Sync`-wrapped for interior mutability, never a bare
/// `static mut` (referencing a mutable static outside `unsafe` is rejected by the compiler, and a
/// raw escape hatch here would defeat the whole point of this pipeline). `synchronized` is `false`
/// only when no function anywhere in the unit ever writes to the global, in which case it is
/// emitted as a plain immutable `static` and no wrapper is needed at all.
pub struct GlobalInfo {
    pub rust_name: String,
    pub synchronized: bool,
}

fn global_rust_name(global: &transpiler_hir::Global) -> String {
    match &global.function_scoped {
        Some(owner) => format!("{}__{}", rust_ident(owner), rust_ident(&global.name)),
        None => rust_ident(&global.name),
    }
}

/// Counts how many functions in `unit` write through `target` anywhere in their body, and uses
/// that count to decide each global's representation (spec §9 "Global mutable state"). Walking
/// the HIR directly rather than consulting [`transpiler_hir::Effects`] here because nothing in
/// this pipeline currently populates `writes_globals` — see `DESIGN.md`.
fn collect_globals(unit: &TranslationUnit) -> FxHashMap<Ident, GlobalInfo> {
    let mut globals = FxHashMap::default();
    for (ident, decl) in unit.decls_in_order() {
        if let Decl::Global(global) = decl {
            let mutators = unit.functions().filter(|f| stmt_writes(&f.body, ident)).count();
            globals.insert(
                ident.clone(),
                GlobalInfo { rust_name: global_rust_name(global), synchronized: mutators >= 1 },
            );
        }
    }
    globals
}

fn is_name(expr: &Expr, target: &Ident) -> bool {
    matches!(&expr.kind, ExprKind::Name(ident) if ident == target)
}

/// `true` if evaluating `expr` ever writes through `target`. Conservative about `&target`: since a
/// taken address can be written through anywhere downstream, it counts as a write.
fn expr_writes(expr: &Expr, target: &Ident) -> bool {
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Name(_) | ExprKind::Unsupported(_) => false,
        ExprKind::Member { base, .. } => expr_writes(base, target),
        ExprKind::Index { base, index } => expr_writes(base, target) || expr_writes(index, target),
        ExprKind::Unary { op: UnOp::PreIncrement | UnOp::PreDecrement | UnOp::PostIncrement | UnOp::PostDecrement, operand } => {
            is_name(operand, target) || expr_writes(operand, target)
        }
        ExprKind::Unary { operand, .. } => expr_writes(operand, target),
        ExprKind::Binary { lhs, rhs, .. } => expr_writes(lhs, target) || expr_writes(rhs, target),
        ExprKind::Ternary { cond, then_branch, else_branch } => {
            expr_writes(cond, target) || expr_writes(then_branch, target) || expr_writes(else_branch, target)
        }
        ExprKind::Cast { expr: inner, .. } | ExprKind::Promotion { expr: inner, .. } | ExprKind::Deref(inner) => {
            expr_writes(inner, target)
        }
        ExprKind::AddrOf(inner) => is_name(inner, target) || expr_writes(inner, target),
        ExprKind::Call { callee, args } => expr_writes(callee, target) || args.iter().any(|a| expr_writes(a, target)),
        ExprKind::CompoundLiteral { fields, .. } => fields.iter().any(|(_, e)| expr_writes(e, target)),
        ExprKind::Sequence(exprs) => exprs.iter().any(|e| expr_writes(e, target)),
        ExprKind::Assign { lhs, rhs, .. } => is_name(lhs, target) || expr_writes(lhs, target) || expr_writes(rhs, target),
    }
}

fn stmt_writes(stmt: &Stmt, target: &Ident) -> bool {
    match &stmt.kind {
        StmtKind::Block(stmts) => stmts.iter().any(|s| stmt_writes(s, target)),
        StmtKind::Decl(local) => local.init.as_ref().is_some_and(|e| expr_writes(e, target)),
        StmtKind::Expr(e) => expr_writes(e, target),
        StmtKind::If { cond, then_branch, else_branch } => {
            expr_writes(cond, target)
                || stmt_writes(then_branch, target)
                || else_branch.as_ref().is_some_and(|s| stmt_writes(s, target))
        }
        StmtKind::While { cond, body } => expr_writes(cond, target) || stmt_writes(body, target),
        StmtKind::For { init, cond, step, body } => {
            init.as_ref().is_some_and(|s| stmt_writes(s, target))
                || cond.as_ref().is_some_and(|e| expr_writes(e, target))
                || step.as_ref().is_some_and(|e| expr_writes(e, target))
                || stmt_writes(body, target)
        }
        StmtKind::DoWhile { body, cond } => stmt_writes(body, target) || expr_writes(cond, target),
        StmtKind::Switch { scrutinee, cases, default } => {
            expr_writes(scrutinee, target)
                || cases.iter().any(|c| c.body.iter().any(|s| stmt_writes(s, target)))
                || default.as_ref().is_some_and(|stmts| stmts.iter().any(|s| stmt_writes(s, target)))
        }
        StmtKind::Return(e) => e.as_ref().is_some_and(|e| expr_writes(e, target)),
        StmtKind::Labeled(_, inner) => stmt_writes(inner, target),
        StmtKind::Break | StmtKind::Continue | StmtKind::Goto(_) | StmtKind::Unsupported(_) => false,
    }
}

/// Everything a single declaration's emission needs to resolve type references and allocator
/// calls. Borrowed for the lifetime of one [`emit_unit`] call; `return_ty` is swapped in per
/// function so `return` statements can pick up their enclosing function's expected type.
#[derive(Clone, Copy)]
pub struct Ctx<'a> {
    pub unit: &'a TranslationUnit,
    pub hints: &'a TaggedUnionHints,
    pub catalog: &'a AllocatorCatalog,
    pub sync_catalog: &'a SyncCatalog,
    pub globals: &'a FxHashMap<Ident, GlobalInfo>,
    pub return_ty: Option<&'a Ty>,
}

impl<'a> Ctx<'a> {
    pub fn new(
        unit: &'a TranslationUnit,
        hints: &'a TaggedUnionHints,
        catalog: &'a AllocatorCatalog,
        sync_catalog: &'a SyncCatalog,
        globals: &'a FxHashMap<Ident, GlobalInfo>,
    ) -> Self {
        Self { unit, hints, catalog, sync_catalog, globals, return_ty: None }
    }

    fn for_function(&self, function: &'a Function) -> Self {
        Self { return_ty: Some(&function.return_ty), ..*self }
    }
}

/// Renders an [`Ident`] as a Rust identifier: shadowed bindings (`disambiguator > 0`) get a
/// numeric suffix so two C declarations named `i` in nested scopes never collide once flattened
/// into one Rust item or function body.
pub fn rust_ident(ident: &Ident) -> String {
    if ident.disambiguator == 0 {
        sanitize(ident.as_str())
    } else {
        format!("{}_{}", sanitize(ident.as_str()), ident.disambiguator)
    }
}

fn sanitize(name: &str) -> String {
    const RESERVED: &[&str] = &[
        "as", "break", "const", "continue", "crate", "else", "enum", "extern", "false", "fn",
        "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref",
        "return", "self", "Self", "static", "struct", "super", "trait", "true", "type", "unsafe",
        "use", "where", "while", "async", "await", "dyn", "type", "box", "final", "override",
        "priv", "typeof", "unsized", "virtual", "yield", "try",
    ];
    if RESERVED.contains(&name) {
        format!("r#{name}")
    } else {
        name.to_string()
    }
}

/// A minimal indentation-tracking text buffer, so line-oriented emission doesn't have to
/// hand-roll indentation math inline.
#[derive(Debug, Default)]
pub struct Writer {
    buf: String,
    indent: usize,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    pub fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.buf.push_str("    ");
        }
        self.buf.push_str(text);
        self.buf.push('\n');
    }

    /// Appends `text` to the end of the buffer without a leading indent or trailing newline; used
    /// to stitch an `else` onto the closing brace `line` just emitted.
    pub fn push(&mut self, text: &str) {
        self.buf.push_str(text);
    }

    /// Removes the newline `line` just appended, so a following `push`/`line` call continues the
    /// same source line (used for `if { ... } else { ... }` and labeled-loop emission).
    pub fn rewind_line_break(&mut self) {
        if self.buf.ends_with('\n') {
            self.buf.pop();
        }
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

fn emit_function<'a>(function: &'a Function, ctx: &Ctx<'a>, diagnostics: &mut DiagnosticsHandler, out: &mut Writer) {
    let fn_ctx = ctx.for_function(function);
    let mut params: Vec<String> = function
        .params
        .iter()
        .map(|p| format!("{}: {}", rust_ident(&p.name), emit_ty(&p.ty, &fn_ctx, function.name.as_str(), diagnostics)))
        .collect();
    if function.is_variadic {
        // spec §9 "Variadic functions": no safe Rust function item is variadic, so the `...`
        // trailer becomes an explicit trailing parameter instead.
        diagnostics.note(
            "N-CODEGEN-0009",
            format!(
                "`{}` is variadic; its `...` trailer is emitted as a trailing `variadic_args: &[Box<dyn core::any::Any>]` parameter",
                function.name
            ),
        );
        params.push("variadic_args: &[Box<dyn core::any::Any>]".to_string());
    }
    let ret = emit_ty(&function.return_ty, &fn_ctx, function.name.as_str(), diagnostics);
    let ret_suffix = if matches!(function.return_ty, Ty::Void) { String::new() } else { format!(" -> {ret}") };
    out.line(&format!("pub fn {}({}){ret_suffix} ", rust_ident(&function.name), params.join(", ")));
    out.rewind_line_break();
    out.push("");
    emit_stmt(&function.body, out, &fn_ctx, diagnostics);
}

fn emit_record(record: &transpiler_hir::Record, ctx: &Ctx, diagnostics: &mut DiagnosticsHandler, out: &mut Writer) {
    out.line("#[derive(Debug, Default, Clone)]");
    out.line(&format!("pub struct {} {{", rust_ident(&record.name)));
    out.indent();
    for field in &record.fields {
        let ty = emit_ty(&field.ty, ctx, record.name.as_str(), diagnostics);
        if let Some(width) = field.bit_width {
            diagnostics.note(
                "N-CODEGEN-0005",
                format!("`{}` field `{}` is a {width}-bit bit-field; emitted as a full-width plain field", record.name, field.name),
            );
        }
        out.line(&format!("pub {}: {ty},", rust_ident(&field.name)));
    }
    out.dedent();
    out.line("}");
}

fn emit_union(union: &transpiler_hir::Union, ctx: &Ctx, diagnostics: &mut DiagnosticsHandler, out: &mut Writer) {
    match ctx.hints.discriminant_for(union.name.as_str()) {
        Some(discriminant) => {
            out.line("#[derive(Debug, Clone)]");
            out.line(&format!("pub enum {} {{", rust_ident(&union.name)));
            out.indent();
            for field in &union.fields {
                let ty = emit_ty(&field.ty, ctx, union.name.as_str(), diagnostics);
                out.line(&format!("{}({ty}),", rust_ident(&field.name)));
            }
            out.dedent();
            out.line("}");
            diagnostics.note(
                "N-CODEGEN-0006",
                format!("`{}` emitted as a tagged sum type keyed on hinted discriminant `{discriminant}`", union.name),
            );
        }
        None => {
            diagnostics.note(
                "N-CODEGEN-0007",
                format!("`{}` has no tagged-union hint; emitted as an untagged `union` escape hatch", union.name),
            );
            out.line("#[repr(C)]");
            out.line(&format!("pub union {} {{", rust_ident(&union.name)));
            out.indent();
            for field in &union.fields {
                let ty = emit_ty(&field.ty, ctx, union.name.as_str(), diagnostics);
                out.line(&format!(
                    "pub {}: ::core::mem::ManuallyDrop<{ty}>,",
                    rust_ident(&field.name)
                ));
            }
            out.dedent();
            out.line("}");
        }
    }
}

fn emit_enum(decl_enum: &transpiler_hir::Enum, out: &mut Writer) {
    out.line("#[derive(Debug, Copy, Clone, PartialEq, Eq)]");
    out.line("#[repr(i64)]");
    out.line(&format!("pub enum {} {{", rust_ident(&decl_enum.name)));
    out.indent();
    for (variant, value) in &decl_enum.variants {
        out.line(&format!("{} = {value},", rust_ident(variant)));
    }
    out.dedent();
    out.line("}");
}

/// Emits every [`Decl`] in `unit`, in source order, as one Rust source file (spec §4.6's
/// determinism requirement). The leading comment block summarizes demotions and unsupported
/// constructs recorded along the way (spec §7's "self-documenting about where manual review is
/// needed").
pub fn emit_unit<'a>(
    unit: &'a TranslationUnit,
    hints: &'a TaggedUnionHints,
    catalog: &'a AllocatorCatalog,
    sync_catalog: &'a SyncCatalog,
    diagnostics: &mut DiagnosticsHandler,
) -> String {
    let globals = collect_globals(unit);
    let ctx = Ctx::new(unit, hints, catalog, sync_catalog, &globals);
    let mut out = Writer::new();
    let notes_before = diagnostics.records().len();

    for (ident, decl) in unit.decls_in_order() {
        match decl {
            Decl::Function(function) => emit_function(function, &ctx, diagnostics, &mut out),
            Decl::Record(record) => emit_record(record, &ctx, diagnostics, &mut out),
            Decl::Union(union) => emit_union(union, &ctx, diagnostics, &mut out),
            Decl::Enum(decl_enum) => emit_enum(decl_enum, &mut out),
            Decl::Alias(alias) => {
                let ty = emit_ty(&alias.ty, &ctx, alias.name.as_str(), diagnostics);
                out.line(&format!("pub type {} = {ty};", rust_ident(&alias.name)));
            }
            Decl::Global(global) => {
                let ty = emit_ty(&global.ty, &ctx, global.name.as_str(), diagnostics);
                let info = ctx.globals.get(ident).expect("collected by collect_globals for every Decl::Global");
                let init = global
                    .init
                    .as_ref()
                    .map(|e| emit_expr(e, Some(&global.ty), &ctx, diagnostics))
                    .unwrap_or_else(|| "::core::default::Default::default()".to_string());
                if info.synchronized {
                    out.line(&format!(
                        "pub static {}: ::std::sync::Mutex<{ty}> = ::std::sync::Mutex::new({init});",
                        info.rust_name
                    ));
                    diagnostics.note(
                        "N-CODEGEN-0008",
                        format!(
                            "`{}` is written to by at least one function; emitted as a `Mutex`-guarded singleton rather than a bare static",
                            global.name
                        ),
                    );
                } else {
                    out.line(&format!("pub static {}: {ty} = {init};", info.rust_name));
                }
            }
            Decl::Constant(constant) => {
                let ty = emit_ty(&constant.ty, &ctx, constant.name.as_str(), diagnostics);
                let value = emit_expr(&constant.value, Some(&constant.ty), &ctx, diagnostics);
                out.line(&format!("pub const {}: {ty} = {value};", rust_ident(&constant.name)));
            }
            Decl::Unsupported { name, reason, .. } => {
                diagnostics.error(
                    "E-CODEGEN-0005",
                    format!("declaration `{name}` could not be lowered ({reason}); emitted as a stub"),
                );
                out.line(&format!("// `{name}` unsupported: {reason}"));
                out.line(&format!("pub fn {}() {{ todo!(\"unsupported declaration: {reason}\") }}", rust_ident(name)));
            }
        }
        out.line("");
    }

    let mut header = Writer::new();
    header.line("// generated — do not edit by hand");
    let new_notes = &diagnostics.records()[notes_before..];
    if new_notes.is_empty() {
        header.line("// no demotions or unsupported constructs were recorded for this unit");
    } else {
        header.line("// review needed — demotions and unsupported constructs recorded during emission:");
        for record in new_notes {
            header.line(&format!("//   [{}] {}", record.code, record.message));
        }
    }
    header.line("");
    header.push(&out.finish());
    header.finish()
}

#[cfg(test)]
mod tests {
    use transpiler_hir::{adapter::TranslationUnitBuilder, BinOp, Decl, Function, Global, Param, Stmt, StmtKind, Ty, ValueCategory};
    use transpiler_session::{diagnostics::DiagnosticsHandler, AllocatorCatalog, Span, SyncCatalog, TaggedUnionHints};

    use super::*;

    fn name_expr(ident: &Ident, ty: Ty) -> Expr {
        Expr { kind: ExprKind::Name(ident.clone()), ty, category: ValueCategory::LValue, region: None, span: Span::UNKNOWN }
    }

    #[test]
    fn global_written_by_a_function_is_emitted_as_a_mutex() {
        let int_ty = Ty::Int { signed: true, width: transpiler_hir::IntWidth::W32 };
        let mut builder = TranslationUnitBuilder::new("t");
        let counter = builder.declare("counter", |name| {
            Decl::Global(Global { name, ty: int_ty.clone(), init: None, function_scoped: None })
        });
        builder.declare("bump", |name| {
            let assign = Stmt::new(
                StmtKind::Expr(Expr {
                    kind: ExprKind::Assign {
                        lhs: Box::new(name_expr(&counter, int_ty.clone())),
                        rhs: Box::new(Expr {
                            kind: ExprKind::Literal(transpiler_hir::Literal::Int(1)),
                            ty: int_ty.clone(),
                            category: ValueCategory::RValue,
                            region: None,
                            span: Span::UNKNOWN,
                        }),
                        compound: Some(BinOp::Add),
                    },
                    ty: int_ty.clone(),
                    category: ValueCategory::RValue,
                    region: None,
                    span: Span::UNKNOWN,
                }),
                Span::UNKNOWN,
            );
            Decl::Function(Function::new(
                name,
                Vec::<Param>::new(),
                Ty::Void,
                Stmt::block(vec![assign, Stmt::new(StmtKind::Return(None), Span::UNKNOWN)], Span::UNKNOWN),
                Span::UNKNOWN,
            ))
        });
        let unit = builder.finish();

        let hints = TaggedUnionHints::default();
        let catalog = AllocatorCatalog::default();
        let sync_catalog = SyncCatalog::default();
        let mut diagnostics = DiagnosticsHandler::default();
        let source = emit_unit(&unit, &hints, &catalog, &sync_catalog, &mut diagnostics);

        assert!(!source.contains("static mut"), "must never emit a bare mutable static: {source}");
        assert!(source.contains("::std::sync::Mutex"), "a written-to global must be Mutex-wrapped: {source}");
        assert!(source.contains("(*counter.lock().unwrap()) += 1"), "writes must go through the guard: {source}");
    }

    #[test]
    fn global_never_written_is_emitted_as_a_plain_static() {
        let int_ty = Ty::Int { signed: true, width: transpiler_hir::IntWidth::W32 };
        let mut builder = TranslationUnitBuilder::new("t");
        builder.declare("limit", |name| {
            Decl::Global(Global { name, ty: int_ty.clone(), init: None, function_scoped: None })
        });
        let unit = builder.finish();

        let hints = TaggedUnionHints::default();
        let catalog = AllocatorCatalog::default();
        let sync_catalog = SyncCatalog::default();
        let mut diagnostics = DiagnosticsHandler::default();
        let source = emit_unit(&unit, &hints, &catalog, &sync_catalog, &mut diagnostics);

        assert!(!source.contains("static mut"));
        assert!(!source.contains("Mutex"));
        assert!(source.contains("pub static limit: i32"));
    }

    #[test]
    fn variadic_function_gets_a_trailing_container_parameter() {
        let mut builder = TranslationUnitBuilder::new("t");
        builder.declare("log_all", |name| {
            Decl::Function(
                Function::new(name, Vec::<Param>::new(), Ty::Void, Stmt::new(StmtKind::Return(None), Span::UNKNOWN), Span::UNKNOWN)
                    .variadic(),
            )
        });
        let unit = builder.finish();

        let hints = TaggedUnionHints::default();
        let catalog = AllocatorCatalog::default();
        let sync_catalog = SyncCatalog::default();
        let mut diagnostics = DiagnosticsHandler::default();
        let source = emit_unit(&unit, &hints, &catalog, &sync_catalog, &mut diagnostics);

        assert!(source.contains("variadic_args: &[Box<dyn core::any::Any>]"), "{source}");
        assert!(diagnostics.records().iter().any(|r| r.code == "N-CODEGEN-0009"));
    }

    #[test]
    fn mutex_lock_and_unlock_calls_are_elided() {
        let int_ty = Ty::Int { signed: true, width: transpiler_hir::IntWidth::W32 };
        let ptr_ty = Ty::pointer_to(int_ty.clone(), transpiler_hir::Qualifiers::default(), false);
        let mut builder = TranslationUnitBuilder::new("t");
        let lock = builder.declare("lock", |name| {
            Decl::Global(Global { name, ty: int_ty.clone(), init: None, function_scoped: None })
        });
        let call = |callee: &str, arg: Ident, arg_ty: Ty| {
            Stmt::new(
                StmtKind::Expr(Expr {
                    kind: ExprKind::Call {
                        callee: Box::new(Expr {
                            kind: ExprKind::Name(Ident::new(callee)),
                            ty: Ty::Function(vec![ptr_ty.clone()], Box::new(Ty::Void), false),
                            category: ValueCategory::RValue,
                            region: None,
                            span: Span::UNKNOWN,
                        }),
                        args: vec![Expr {
                            kind: ExprKind::AddrOf(Box::new(name_expr(&arg, arg_ty.clone()))),
                            ty: ptr_ty.clone(),
                            category: ValueCategory::RValue,
                            region: None,
                            span: Span::UNKNOWN,
                        }],
                    },
                    ty: Ty::Void,
                    category: ValueCategory::RValue,
                    region: None,
                    span: Span::UNKNOWN,
                }),
                Span::UNKNOWN,
            )
        };
        builder.declare("critical_section", |name| {
            let body = Stmt::block(
                vec![
                    call("pthread_mutex_lock", lock.clone(), int_ty.clone()),
                    call("pthread_mutex_unlock", lock.clone(), int_ty.clone()),
                    Stmt::new(StmtKind::Return(None), Span::UNKNOWN),
                ],
                Span::UNKNOWN,
            );
            Decl::Function(Function::new(name, Vec::<Param>::new(), Ty::Void, body, Span::UNKNOWN))
        });
        let unit = builder.finish();

        let hints = TaggedUnionHints::default();
        let catalog = AllocatorCatalog::default();
        let sync_catalog = SyncCatalog::default();
        let mut diagnostics = DiagnosticsHandler::default();
        let source = emit_unit(&unit, &hints, &catalog, &sync_catalog, &mut diagnostics);

        assert!(!source.contains("pthread_mutex"), "lock/unlock calls must not survive emission: {source}");
        assert!(diagnostics.records().iter().any(|r| r.code == "N-CODEGEN-0011"));
    }
}
