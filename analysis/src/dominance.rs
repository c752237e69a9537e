//! Dominance information over a function's [`Cfg`] (spec §4.2), used to narrow borrow regions
//! (spec §4.4) and to let liveness-style analyses skip blocks whose inputs cannot have changed.

use petgraph::algo::dominators::{self, Dominators};
use transpiler_hir::BlockId;

use crate::cfg::Cfg;

pub struct DominanceInfo {
    doms: Dominators<BlockId>,
}

impl DominanceInfo {
    pub fn compute(cfg: &Cfg) -> Self {
        let doms = dominators::simple_fast(cfg.graph(), cfg.entry);
        Self { doms }
    }

    /// Returns `true` if `a` dominates `b` (reflexive: every block dominates itself).
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        self.doms.dominates(a, b)
    }

    pub fn immediate_dominator(&self, block: BlockId) -> Option<BlockId> {
        self.doms.immediate_dominator(block)
    }
}

#[cfg(test)]
mod tests {
    use transpiler_hir::{Function, Ident, Param, Stmt, StmtKind, Ty};
    use transpiler_session::Span;

    use super::*;
    use crate::cfg::build_cfg;

    #[test]
    fn entry_dominates_every_reachable_block() {
        let body = Stmt::block(vec![Stmt::new(StmtKind::Return(None), Span::UNKNOWN)], Span::UNKNOWN);
        let function = Function::new(Ident::new("f"), Vec::<Param>::new(), Ty::Void, body, Span::UNKNOWN);
        let cfg = build_cfg(&function).unwrap();
        let dom = DominanceInfo::compute(&cfg);
        for (block, _) in cfg.blocks() {
            assert!(dom.dominates(cfg.entry, block));
        }
    }
}
