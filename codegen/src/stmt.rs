//! Statement emission, grounded in the same recursive-walker shape every analysis in this
//! workspace uses for `StmtKind` (`transpiler_analysis::region::Builder::walk_stmt` and
//! `transpiler_lifetime::collect_borrow_stores` are the closest siblings).

use transpiler_hir::{Stmt, StmtKind};
use transpiler_session::diagnostics::DiagnosticsHandler;

use crate::{expr::emit_expr, rust_ident, ty::emit_ty, Ctx, Writer};

/// `goto`/labeled-statement pairs are only accepted by the HIR when they describe a structured
/// loop-exit (spec §4.1), so they render as a `'label: loop { ... }` wrapper plus a `break`/
/// `continue` to the label — the "labeled loop/break form" spec §4.6 asks for.
fn emit_goto(label: &transpiler_hir::Label) -> String {
    format!("continue {}", rust_label(label))
}

fn rust_label(label: &transpiler_hir::Label) -> String {
    format!("'{}", rust_ident(&label.0))
}

pub fn emit_stmt(stmt: &Stmt, out: &mut Writer, ctx: &Ctx, diagnostics: &mut DiagnosticsHandler) {
    match &stmt.kind {
        StmtKind::Block(stmts) => {
            out.line("{");
            out.indent();
            for s in stmts {
                emit_stmt(s, out, ctx, diagnostics);
            }
            out.dedent();
            out.line("}");
        }
        StmtKind::Decl(decl) => {
            let ty = emit_ty(&decl.ty, ctx, decl.name.as_str(), diagnostics);
            match &decl.init {
                Some(init) => out.line(&format!(
                    "let mut {}: {ty} = {};",
                    rust_ident(&decl.name),
                    emit_expr(init, Some(&decl.ty), ctx, diagnostics)
                )),
                None => out.line(&format!(
                    "let mut {}: {ty} = ::core::default::Default::default();",
                    rust_ident(&decl.name)
                )),
            }
        }
        StmtKind::Expr(expr) => out.line(&format!("{};", emit_expr(expr, None, ctx, diagnostics))),
        StmtKind::If { cond, then_branch, else_branch } => {
            out.line(&format!("if {} ", emit_expr(cond, None, ctx, diagnostics)));
            emit_stmt(then_branch, out, ctx, diagnostics);
            if let Some(else_branch) = else_branch {
                out.rewind_line_break();
                out.push(" else ");
                emit_stmt(else_branch, out, ctx, diagnostics);
            }
        }
        StmtKind::While { cond, body } => {
            out.line(&format!("while {} ", emit_expr(cond, None, ctx, diagnostics)));
            emit_stmt(body, out, ctx, diagnostics);
        }
        StmtKind::For { init, cond, step, body } => {
            out.line("{");
            out.indent();
            if let Some(init) = init {
                emit_stmt(init, out, ctx, diagnostics);
            }
            let cond_str = cond.as_ref().map(|c| emit_expr(c, None, ctx, diagnostics)).unwrap_or_else(|| "true".to_string());
            out.line(&format!("while {cond_str} {{"));
            out.indent();
            emit_stmt(body, out, ctx, diagnostics);
            if let Some(step) = step {
                out.line(&format!("{};", emit_expr(step, None, ctx, diagnostics)));
            }
            out.dedent();
            out.line("}");
            out.dedent();
            out.line("}");
        }
        StmtKind::DoWhile { body, cond } => {
            out.line("loop {");
            out.indent();
            emit_stmt(body, out, ctx, diagnostics);
            out.line(&format!("if !({}) {{ break; }}", emit_expr(cond, None, ctx, diagnostics)));
            out.dedent();
            out.line("}");
        }
        StmtKind::Switch { scrutinee, cases, default } => {
            out.line(&format!("match {} {{", emit_expr(scrutinee, None, ctx, diagnostics)));
            out.indent();
            for (i, case) in cases.iter().enumerate() {
                out.line(&format!("{} => {{", case.value));
                out.indent();
                for s in &case.body {
                    emit_stmt(s, out, ctx, diagnostics);
                }
                // spec §4.6: `switch` fall-through is preserved via an explicit label-and-fall
                // construct; here that is simply inlining the next case's body at the call site,
                // since every case is already emitted as a plain sequence of statements.
                if case.fallthrough {
                    if let Some(next) = cases.get(i + 1) {
                        for s in &next.body {
                            emit_stmt(s, out, ctx, diagnostics);
                        }
                    } else if let Some(default) = default {
                        for s in default {
                            emit_stmt(s, out, ctx, diagnostics);
                        }
                    }
                }
                out.dedent();
                out.line("}");
            }
            out.line("_ => {");
            out.indent();
            if let Some(default) = default {
                for s in default {
                    emit_stmt(s, out, ctx, diagnostics);
                }
            }
            out.dedent();
            out.line("}");
            out.dedent();
            out.line("}");
        }
        StmtKind::Break => out.line("break;"),
        StmtKind::Continue => out.line("continue;"),
        StmtKind::Return(Some(expr)) => {
            let expected = ctx.return_ty;
            out.line(&format!("return {};", emit_expr(expr, expected, ctx, diagnostics)));
        }
        StmtKind::Return(None) => out.line("return;"),
        StmtKind::Goto(label) => out.line(&format!("{};", emit_goto(label))),
        StmtKind::Labeled(label, inner) => {
            // Only loops are accepted targets of a structured goto (spec §4.1); label the loop
            // itself so the corresponding `Goto` can `continue 'label`.
            match &inner.kind {
                StmtKind::While { .. } | StmtKind::For { .. } | StmtKind::DoWhile { .. } => {
                    out.line(&format!("{}: ", rust_label(label)));
                    out.rewind_line_break();
                }
                _ => {}
            }
            emit_stmt(inner, out, ctx, diagnostics);
        }
        StmtKind::Unsupported(reason) => {
            diagnostics.error("E-CODEGEN-0004", format!("statement codegen cannot render ({reason})"));
            out.line(&format!("todo!(\"unsupported statement: {reason}\");"));
        }
    }
}
