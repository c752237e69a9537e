//! Def-use chains (spec §4.2): for every variable, the set of definitions reaching each use.
//!
//! Computed as a classic reaching-definitions dataflow problem (a join semi-lattice of definition
//! sites ordered by set union) at block granularity, then refined by a single linear scan within
//! each block. This is coarser than tracking reaching definitions per-statement across the whole
//! function, but spec §4.2 only asks for "the set of definitions reaching each use", which this
//! answers exactly — a definition in the same block before a use always shadows any inbound one.

use rustc_hash::{FxHashMap, FxHashSet};
use transpiler_hir::{BlockId, Expr, ExprKind, Function, Ident, Stmt, StmtKind};

use crate::{
    cfg::{Cfg, Terminator},
    lattice::{ChangeResult, Lattice},
};

/// One place a variable is (re)defined: a local declaration with an initializer, or an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DefSite {
    pub var: Ident,
    pub block: BlockId,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct DefSet(FxHashSet<DefSite>);

impl Lattice for DefSet {
    fn bottom() -> Self {
        Self::default()
    }

    fn join(&mut self, other: &Self) -> ChangeResult {
        let before = self.0.len();
        self.0.extend(other.0.iter().cloned());
        ChangeResult::from(self.0.len() != before)
    }
}

/// Def-use chains for one function: for every use of a variable, which definitions may reach it.
#[derive(Debug, Default)]
pub struct DefUseChains {
    /// Reaching-definitions set on entry to each block.
    block_in: FxHashMap<BlockId, FxHashSet<DefSite>>,
    /// Resolved chains, keyed by the (block, statement index) of the use.
    uses: FxHashMap<(BlockId, usize), FxHashSet<DefSite>>,
}

impl DefUseChains {
    pub fn reaching(&self, block: BlockId, stmt_index: usize) -> impl Iterator<Item = &DefSite> {
        self.uses.get(&(block, stmt_index)).into_iter().flatten()
    }

    pub fn block_entry_defs(&self, block: BlockId) -> impl Iterator<Item = &DefSite> {
        self.block_in.get(&block).into_iter().flatten()
    }
}

fn defined_var(stmt: &Stmt) -> Option<&Ident> {
    match &stmt.kind {
        StmtKind::Decl(decl) if decl.init.is_some() => Some(&decl.name),
        StmtKind::Expr(expr) => assigned_var(expr),
        _ => None,
    }
}

fn assigned_var(expr: &Expr) -> Option<&Ident> {
    match &expr.kind {
        ExprKind::Assign { lhs, .. } => match &lhs.kind {
            ExprKind::Name(ident) => Some(ident),
            _ => None,
        },
        _ => None,
    }
}

fn collect_uses<'a>(expr: &'a Expr, sink: &mut Vec<&'a Ident>) {
    match &expr.kind {
        ExprKind::Name(ident) => sink.push(ident),
        ExprKind::Member { base, .. } => collect_uses(base, sink),
        ExprKind::Index { base, index } => {
            collect_uses(base, sink);
            collect_uses(index, sink);
        }
        ExprKind::Unary { operand, .. } => collect_uses(operand, sink),
        ExprKind::Binary { lhs, rhs, .. } => {
            collect_uses(lhs, sink);
            collect_uses(rhs, sink);
        }
        ExprKind::Ternary { cond, then_branch, else_branch } => {
            collect_uses(cond, sink);
            collect_uses(then_branch, sink);
            collect_uses(else_branch, sink);
        }
        ExprKind::Cast { expr, .. } | ExprKind::Promotion { expr, .. } => collect_uses(expr, sink),
        ExprKind::AddrOf(inner) | ExprKind::Deref(inner) => collect_uses(inner, sink),
        ExprKind::Call { callee, args } => {
            collect_uses(callee, sink);
            for arg in args {
                collect_uses(arg, sink);
            }
        }
        ExprKind::CompoundLiteral { fields, .. } => {
            for (_, value) in fields {
                collect_uses(value, sink);
            }
        }
        ExprKind::Sequence(exprs) => {
            for e in exprs {
                collect_uses(e, sink);
            }
        }
        ExprKind::Assign { lhs, rhs, .. } => {
            // The right-hand side is always a use; the left-hand side is a use only when it is
            // not a bare name (e.g. `*p = x` uses `p`, but `x = 1` does not "use" `x`).
            if !matches!(lhs.kind, ExprKind::Name(_)) {
                collect_uses(lhs, sink);
            }
            collect_uses(rhs, sink);
        }
        ExprKind::Literal(_) | ExprKind::Unsupported(_) => {}
    }
}

/// Computes reaching-definitions for every block of `cfg`, then resolves per-statement use sites.
pub fn compute(cfg: &Cfg, _function: &Function) -> DefUseChains {
    let block_ids: Vec<BlockId> = cfg.blocks().map(|(id, _)| id).collect();

    let mut gen: FxHashMap<BlockId, FxHashSet<DefSite>> = FxHashMap::default();
    let mut kill: FxHashMap<BlockId, FxHashSet<Ident>> = FxHashMap::default();
    for &block in &block_ids {
        let bb = cfg.block(block);
        let mut defs = FxHashSet::default();
        let mut killed = FxHashSet::default();
        for (index, stmt) in bb.stmts.iter().enumerate() {
            if let Some(var) = defined_var(stmt) {
                defs.insert(DefSite { var: var.clone(), block, index });
                killed.insert(var.clone());
            }
        }
        gen.insert(block, defs);
        kill.insert(block, killed);
    }

    let mut in_sets: FxHashMap<BlockId, DefSet> =
        block_ids.iter().map(|&b| (b, DefSet::bottom())).collect();
    let mut out_sets: FxHashMap<BlockId, DefSet> = block_ids
        .iter()
        .map(|&b| (b, DefSet(gen[&b].clone())))
        .collect();

    let mut worklist: Vec<BlockId> = block_ids.clone();
    while let Some(block) = worklist.pop() {
        let mut new_in = DefSet::bottom();
        for pred in cfg.predecessors(block) {
            if let Some(pred_out) = out_sets.get(&pred) {
                new_in.join(pred_out);
            }
        }
        let changed_in = in_sets
            .get(&block)
            .map(|existing| existing != &new_in)
            .unwrap_or(true);
        if changed_in {
            in_sets.insert(block, new_in.clone());
        }

        let killed = &kill[&block];
        let mut new_out = DefSet(gen[&block].clone());
        for def in new_in.0.iter().filter(|d| !killed.contains(&d.var)) {
            new_out.0.insert(def.clone());
        }
        let changed_out = out_sets
            .get(&block)
            .map(|existing| existing != &new_out)
            .unwrap_or(true);
        if changed_out {
            out_sets.insert(block, new_out);
            for succ in cfg.successors(block) {
                worklist.push(succ);
            }
        }
    }

    let mut chains = DefUseChains::default();
    for &block in &block_ids {
        chains.block_in.insert(block, in_sets[&block].0.clone());

        let bb = cfg.block(block);
        let mut live: FxHashSet<DefSite> = in_sets[&block].0.clone();
        for (index, stmt) in bb.stmts.iter().enumerate() {
            let mut uses = Vec::new();
            if let StmtKind::Expr(expr) = &stmt.kind {
                collect_uses(expr, &mut uses);
            } else if let StmtKind::Decl(decl) = &stmt.kind {
                if let Some(init) = &decl.init {
                    collect_uses(init, &mut uses);
                }
            }
            if !uses.is_empty() {
                let mut reaching = FxHashSet::default();
                for used in &uses {
                    for def in live.iter().filter(|d| &d.var == *used) {
                        reaching.insert(def.clone());
                    }
                }
                chains.uses.insert((block, index), reaching);
            }
            if let Some(var) = defined_var(stmt) {
                live.retain(|d| d.var != *var);
                live.insert(DefSite { var: var.clone(), block, index });
            }
        }

        // The terminator's return value (if any) is a use evaluated after every statement in the
        // block, so it is recorded one index past the last statement.
        if let Terminator::Return(Some(value)) = &bb.terminator {
            let mut uses = Vec::new();
            collect_uses(value, &mut uses);
            if !uses.is_empty() {
                let mut reaching = FxHashSet::default();
                for used in &uses {
                    for def in live.iter().filter(|d| &d.var == *used) {
                        reaching.insert(def.clone());
                    }
                }
                chains.uses.insert((block, bb.stmts.len()), reaching);
            }
        }
    }

    chains
}

#[cfg(test)]
mod tests {
    use transpiler_hir::{ExprKind, Literal, Param, ValueCategory};
    use transpiler_session::Span;

    use super::*;
    use crate::cfg::build_cfg;

    fn int_literal(v: i128) -> Expr {
        Expr::new(
            ExprKind::Literal(Literal::Int(v)),
            transpiler_hir::Ty::Int { signed: true, width: transpiler_hir::IntWidth::W32 },
            ValueCategory::RValue,
            Span::UNKNOWN,
        )
    }

    fn name(ident: &Ident) -> Expr {
        Expr::new(
            ExprKind::Name(ident.clone()),
            transpiler_hir::Ty::Int { signed: true, width: transpiler_hir::IntWidth::W32 },
            ValueCategory::LValue,
            Span::UNKNOWN,
        )
    }

    #[test]
    fn use_after_straight_line_decl_sees_exactly_one_definition() {
        let x = Ident::new("x");
        let body = Stmt::block(
            vec![
                Stmt::new(
                    StmtKind::Decl(transpiler_hir::LocalDecl {
                        name: x.clone(),
                        ty: transpiler_hir::Ty::Int {
                            signed: true,
                            width: transpiler_hir::IntWidth::W32,
                        },
                        init: Some(int_literal(1)),
                    }),
                    Span::UNKNOWN,
                ),
                Stmt::new(StmtKind::Return(Some(name(&x))), Span::UNKNOWN),
            ],
            Span::UNKNOWN,
        );
        let function =
            Function::new(Ident::new("f"), Vec::<Param>::new(), transpiler_hir::Ty::Void, body, Span::UNKNOWN);
        let cfg = build_cfg(&function).expect("structured body lowers");
        let chains = compute(&cfg, &function);

        let (entry, entry_block) = cfg.blocks().next().expect("at least one block");
        let use_index = entry_block.stmts.len();
        let reaching: Vec<_> = chains.reaching(entry, use_index).collect();
        assert_eq!(reaching.len(), 1);
        assert_eq!(reaching[0].var, x);
    }
}
