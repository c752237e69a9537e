//! Region tree (spec §4.2 "nested lexical regions indexed by block entry/exit"; spec §4.4 uses the
//! same [`RegionId`] space for lifetime parameters).
//!
//! Regions mirror C block scoping: every `{ ... }` compound statement opens a region nested inside
//! its enclosing one, and a `for` loop gets its own region so the loop variable's scope is
//! distinguished from the block containing the loop. Parameters and top-level locals live in the
//! function's root region. Lifetime inference (spec §4.4) asks this tree "does region A outlive
//! region B" by walking up B's ancestor chain looking for A — a region's scope, once entered,
//! remains live for exactly as long as every region nested inside it.

use cranelift_entity::PrimaryMap;
use transpiler_hir::{Function, Ident, RegionId, Stmt, StmtKind};

#[derive(Debug, Clone, Default)]
pub struct RegionInfo {
    pub parent: Option<RegionId>,
    pub declares: Vec<Ident>,
}

#[derive(Debug)]
pub struct RegionTree {
    regions: PrimaryMap<RegionId, RegionInfo>,
    pub root: RegionId,
}

impl RegionTree {
    pub fn info(&self, region: RegionId) -> &RegionInfo {
        &self.regions[region]
    }

    pub fn parent(&self, region: RegionId) -> Option<RegionId> {
        self.regions[region].parent
    }

    /// `true` if `region` is `ancestor` itself or is lexically nested inside it.
    pub fn is_ancestor(&self, ancestor: RegionId, mut region: RegionId) -> bool {
        loop {
            if region == ancestor {
                return true;
            }
            match self.regions[region].parent {
                Some(parent) => region = parent,
                None => return false,
            }
        }
    }

    /// `a` outlives `b` iff `a`'s scope encloses (or is) `b`'s, per spec §4.4's constraint form
    /// "A must outlive B".
    pub fn outlives(&self, a: RegionId, b: RegionId) -> bool {
        self.is_ancestor(a, b)
    }

    pub fn declaring_region(&self, var: &Ident) -> Option<RegionId> {
        self.regions
            .iter()
            .find(|(_, info)| info.declares.contains(var))
            .map(|(id, _)| id)
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }
}

struct Builder {
    regions: PrimaryMap<RegionId, RegionInfo>,
}

impl Builder {
    fn new_region(&mut self, parent: Option<RegionId>) -> RegionId {
        self.regions.push(RegionInfo { parent, declares: Vec::new() })
    }

    fn walk_block(&mut self, stmts: &[Stmt], region: RegionId) {
        for stmt in stmts {
            self.walk_stmt(stmt, region);
        }
    }

    fn walk_stmt(&mut self, stmt: &Stmt, region: RegionId) {
        match &stmt.kind {
            StmtKind::Block(body) => {
                let child = self.new_region(Some(region));
                self.walk_block(body, child);
            }
            StmtKind::Decl(decl) => {
                self.regions[region].declares.push(decl.name.clone());
            }
            StmtKind::If { then_branch, else_branch, .. } => {
                self.walk_stmt(then_branch, region);
                if let Some(else_branch) = else_branch {
                    self.walk_stmt(else_branch, region);
                }
            }
            StmtKind::While { body, .. } => self.walk_stmt(body, region),
            StmtKind::For { init, body, .. } => {
                // The loop's own scope: `init`'s declaration (if any) must outlive the body but
                // not the enclosing block, matching C's `for (int i = 0; ...)` scoping.
                let loop_region = self.new_region(Some(region));
                if let Some(init) = init {
                    self.walk_stmt(init, loop_region);
                }
                self.walk_stmt(body, loop_region);
            }
            StmtKind::DoWhile { body, .. } => self.walk_stmt(body, region),
            StmtKind::Switch { cases, default, .. } => {
                for case in cases {
                    let case_region = self.new_region(Some(region));
                    self.walk_block(&case.body, case_region);
                }
                if let Some(default) = default {
                    let default_region = self.new_region(Some(region));
                    self.walk_block(default, default_region);
                }
            }
            StmtKind::Labeled(_, inner) => self.walk_stmt(inner, region),
            StmtKind::Expr(_)
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Return(_)
            | StmtKind::Goto(_)
            | StmtKind::Unsupported(_) => {}
        }
    }
}

/// Builds the region tree for `function`, seeding the root region with its parameters.
pub fn compute(function: &Function) -> RegionTree {
    let mut builder = Builder { regions: PrimaryMap::new() };
    let root = builder.new_region(None);
    for param in &function.params {
        builder.regions[root].declares.push(param.name.clone());
    }
    if let StmtKind::Block(body) = &function.body.kind {
        builder.walk_block(body, root);
    } else {
        builder.walk_stmt(&function.body, root);
    }
    RegionTree { regions: builder.regions, root }
}

#[cfg(test)]
mod tests {
    use transpiler_hir::{Param, Ty};
    use transpiler_session::Span;

    use super::*;

    #[test]
    fn nested_block_outlived_by_function_root() {
        let inner_decl = Stmt::new(
            StmtKind::Decl(transpiler_hir::LocalDecl {
                name: Ident::new("y"),
                ty: Ty::Int { signed: true, width: transpiler_hir::IntWidth::W32 },
                init: None,
            }),
            Span::UNKNOWN,
        );
        let body = Stmt::block(
            vec![Stmt::new(StmtKind::Block(vec![inner_decl]), Span::UNKNOWN)],
            Span::UNKNOWN,
        );
        let function = Function::new(
            Ident::new("f"),
            vec![Param::new(Ident::new("x"), Ty::Int { signed: true, width: transpiler_hir::IntWidth::W32 })],
            Ty::Void,
            body,
            Span::UNKNOWN,
        );
        let tree = compute(&function);
        assert_eq!(tree.region_count(), 2);
        let y = Ident::new("y");
        let inner = tree.declaring_region(&y).expect("y is declared somewhere");
        assert!(tree.outlives(tree.root, inner));
        assert!(!tree.outlives(inner, tree.root));
    }

    #[test]
    fn for_loop_gets_its_own_region_for_the_induction_variable() {
        let init = Stmt::new(
            StmtKind::Decl(transpiler_hir::LocalDecl {
                name: Ident::new("i"),
                ty: Ty::Int { signed: true, width: transpiler_hir::IntWidth::W32 },
                init: None,
            }),
            Span::UNKNOWN,
        );
        let body = Stmt::block(
            vec![Stmt::new(
                StmtKind::For {
                    init: Some(Box::new(init)),
                    cond: None,
                    step: None,
                    body: Box::new(Stmt::block(Vec::new(), Span::UNKNOWN)),
                },
                Span::UNKNOWN,
            )],
            Span::UNKNOWN,
        );
        let function = Function::new(Ident::new("f"), Vec::<Param>::new(), Ty::Void, body, Span::UNKNOWN);
        let tree = compute(&function);
        let i = Ident::new("i");
        let loop_region = tree.declaring_region(&i).expect("i is declared in the loop region");
        assert_ne!(loop_region, tree.root);
        assert!(tree.outlives(tree.root, loop_region));
    }
}
