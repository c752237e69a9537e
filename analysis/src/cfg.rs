//! Control-flow graph construction (spec §4.2 "CFG").
//!
//! The HIR body of a function is a structured statement tree (blocks, `if`, `while`, ...); this
//! module flattens it into basic blocks and edges, marking back-edges as they are introduced
//! (rather than rediscovering them later via dominance), and prunes unreachable blocks once
//! construction finishes.

use cranelift_entity::PrimaryMap;
use petgraph::graphmap::DiGraphMap;
use transpiler_hir::{BlockId, Expr, Function, Stmt, StmtKind};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EdgeKind {
    /// Falls through to the only successor (sequential flow, or an unconditional branch target).
    Fallthrough,
    BranchTrue,
    BranchFalse,
    /// A back-edge: the target is a loop header the source can reach again.
    Back,
    SwitchCase(i128),
    SwitchDefault,
}

impl EdgeKind {
    pub fn is_back(self) -> bool {
        matches!(self, EdgeKind::Back)
    }
}

#[derive(Debug, Clone, Default)]
pub enum Terminator {
    #[default]
    Fallthrough,
    Return(Option<Expr>),
    /// A block with no successors that isn't a `return` (e.g. after `goto`-free infinite loop
    /// exhaustiveness is otherwise confirmed impossible to reach this point).
    Unreachable,
}

/// A maximal run of simple (non-branching) statements, terminated by how control leaves it.
#[derive(Debug, Clone, Default)]
pub struct BasicBlock {
    pub stmts: Vec<Stmt>,
    pub terminator: Terminator,
}

/// The control-flow graph of one function (spec §4.2).
pub struct Cfg {
    pub entry: BlockId,
    pub exit: BlockId,
    blocks: PrimaryMap<BlockId, BasicBlock>,
    graph: DiGraphMap<BlockId, EdgeKind>,
}

impl Cfg {
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id]
    }

    /// Iterates blocks still reachable from `entry` after pruning (spec §4.2). Blocks removed by
    /// [`prune_unreachable`] remain allocated in the underlying arena but are skipped here.
    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &BasicBlock)> {
        self.blocks.iter().filter(move |(id, _)| self.graph.contains_node(*id))
    }

    pub fn graph(&self) -> &DiGraphMap<BlockId, EdgeKind> {
        &self.graph
    }

    pub fn successors(&self, id: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.graph.neighbors(id)
    }

    pub fn predecessors(&self, id: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.graph.neighbors_directed(id, petgraph::Direction::Incoming)
    }

    pub fn edge_kind(&self, from: BlockId, to: BlockId) -> Option<EdgeKind> {
        self.graph.edge_weight(from, to).copied()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_back_edge(&self, from: BlockId, to: BlockId) -> bool {
        self.edge_kind(from, to).is_some_and(EdgeKind::is_back)
    }
}

struct LoopTargets {
    continue_target: BlockId,
    break_target: BlockId,
}

struct Builder {
    blocks: PrimaryMap<BlockId, BasicBlock>,
    graph: DiGraphMap<BlockId, EdgeKind>,
    exit: BlockId,
    loop_stack: Vec<LoopTargets>,
}

impl Builder {
    fn new_block(&mut self) -> BlockId {
        self.blocks.push(BasicBlock::default())
    }

    fn edge(&mut self, from: BlockId, to: BlockId, kind: EdgeKind) {
        self.graph.add_edge(from, to, kind);
    }

    /// Lowers `stmts` starting at `current`, returning the block execution falls off the end of
    /// (or `None` if every path out of `stmts` already terminated).
    fn lower_block(&mut self, stmts: &[Stmt], mut current: BlockId) -> Option<BlockId> {
        for stmt in stmts {
            current = self.lower_stmt(stmt, current)?;
        }
        Some(current)
    }

    fn lower_stmt(&mut self, stmt: &Stmt, current: BlockId) -> Option<BlockId> {
        match &stmt.kind {
            StmtKind::Block(body) => self.lower_block(body, current),
            StmtKind::Decl(_) | StmtKind::Expr(_) => {
                self.blocks[current].stmts.push(stmt.clone());
                Some(current)
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                self.blocks[current].stmts.push(cond_marker(cond, stmt));
                let then_entry = self.new_block();
                self.edge(current, then_entry, EdgeKind::BranchTrue);
                let then_exit = self.lower_stmt(then_branch, then_entry);

                let else_exit = if let Some(else_branch) = else_branch {
                    let else_entry = self.new_block();
                    self.edge(current, else_entry, EdgeKind::BranchFalse);
                    self.lower_stmt(else_branch, else_entry)
                } else {
                    Some(current)
                };
                // When there is no else branch, the false edge falls straight to the join block;
                // wire it explicitly so the join block has a clean set of predecessors.
                let join = self.new_block();
                if else_branch.is_none() {
                    self.edge(current, join, EdgeKind::BranchFalse);
                }
                if let Some(exit) = then_exit {
                    self.edge(exit, join, EdgeKind::Fallthrough);
                }
                if else_branch.is_some() {
                    if let Some(exit) = else_exit {
                        self.edge(exit, join, EdgeKind::Fallthrough);
                    }
                }
                // If both arms terminated (e.g. both `return`), `join` ends up with no
                // predecessors and is removed by `prune_unreachable` once construction finishes.
                Some(join)
            }
            StmtKind::While { cond, body } => {
                let header = self.new_block();
                self.edge(current, header, EdgeKind::Fallthrough);
                self.blocks[header].stmts.push(cond_marker(cond, stmt));
                let body_entry = self.new_block();
                self.edge(header, body_entry, EdgeKind::BranchTrue);
                let exit_block = self.new_block();
                self.edge(header, exit_block, EdgeKind::BranchFalse);

                self.loop_stack.push(LoopTargets {
                    continue_target: header,
                    break_target: exit_block,
                });
                let body_exit = self.lower_stmt(body, body_entry);
                self.loop_stack.pop();
                if let Some(exit) = body_exit {
                    self.edge(exit, header, EdgeKind::Back);
                }
                Some(exit_block)
            }
            StmtKind::For { init, cond, step, body } => {
                let mut current = current;
                if let Some(init) = init {
                    current = self.lower_stmt(init, current)?;
                }
                let header = self.new_block();
                self.edge(current, header, EdgeKind::Fallthrough);
                if let Some(cond) = cond {
                    self.blocks[header].stmts.push(cond_marker(cond, stmt));
                }
                let body_entry = self.new_block();
                self.edge(header, body_entry, EdgeKind::BranchTrue);
                let exit_block = self.new_block();
                self.edge(header, exit_block, EdgeKind::BranchFalse);

                let step_block = self.new_block();
                self.loop_stack.push(LoopTargets {
                    continue_target: step_block,
                    break_target: exit_block,
                });
                let body_exit = self.lower_stmt(body, body_entry);
                self.loop_stack.pop();
                if let Some(exit) = body_exit {
                    self.edge(exit, step_block, EdgeKind::Fallthrough);
                }
                if let Some(step) = step {
                    self.blocks[step_block].stmts.push(Stmt::new(
                        StmtKind::Expr(step.clone()),
                        step.span,
                    ));
                }
                self.edge(step_block, header, EdgeKind::Back);
                Some(exit_block)
            }
            StmtKind::DoWhile { body, cond } => {
                let body_entry = self.new_block();
                self.edge(current, body_entry, EdgeKind::Fallthrough);
                let header = self.new_block();
                let exit_block = self.new_block();

                self.loop_stack.push(LoopTargets {
                    continue_target: header,
                    break_target: exit_block,
                });
                let body_exit = self.lower_stmt(body, body_entry);
                self.loop_stack.pop();
                if let Some(exit) = body_exit {
                    self.edge(exit, header, EdgeKind::Fallthrough);
                }
                self.blocks[header].stmts.push(cond_marker(cond, stmt));
                self.edge(header, body_entry, EdgeKind::Back);
                self.edge(header, exit_block, EdgeKind::BranchFalse);
                Some(exit_block)
            }
            StmtKind::Switch { scrutinee, cases, default } => {
                self.blocks[current].stmts.push(cond_marker(scrutinee, stmt));
                let join = self.new_block();
                let exit_block = join;
                self.loop_stack.push(LoopTargets {
                    continue_target: current,
                    break_target: exit_block,
                });

                let mut fallthrough_from: Option<BlockId> = None;
                for case in cases {
                    let case_entry = self.new_block();
                    self.edge(current, case_entry, EdgeKind::SwitchCase(case.value));
                    if let Some(prev) = fallthrough_from.take() {
                        self.edge(prev, case_entry, EdgeKind::Fallthrough);
                    }
                    let case_exit = self.lower_block(&case.body, case_entry);
                    if case.fallthrough {
                        fallthrough_from = case_exit;
                    } else if let Some(exit) = case_exit {
                        self.edge(exit, exit_block, EdgeKind::Fallthrough);
                    }
                }
                if let Some(default) = default {
                    let default_entry = self.new_block();
                    self.edge(current, default_entry, EdgeKind::SwitchDefault);
                    if let Some(prev) = fallthrough_from.take() {
                        self.edge(prev, default_entry, EdgeKind::Fallthrough);
                    }
                    if let Some(exit) = self.lower_block(default, default_entry) {
                        self.edge(exit, exit_block, EdgeKind::Fallthrough);
                    }
                } else {
                    self.edge(current, exit_block, EdgeKind::SwitchDefault);
                }
                self.loop_stack.pop();
                Some(exit_block)
            }
            StmtKind::Break => {
                let target = self
                    .loop_stack
                    .last()
                    .expect("break outside of a loop/switch is rejected before CFG construction")
                    .break_target;
                self.edge(current, target, EdgeKind::Fallthrough);
                None
            }
            StmtKind::Continue => {
                let target = self
                    .loop_stack
                    .last()
                    .expect("continue outside of a loop is rejected before CFG construction")
                    .continue_target;
                self.edge(current, target, EdgeKind::Back);
                None
            }
            StmtKind::Return(value) => {
                self.blocks[current].terminator = Terminator::Return(value.clone());
                self.edge(current, self.exit, EdgeKind::Fallthrough);
                None
            }
            StmtKind::Labeled(_, inner) => self.lower_stmt(inner, current),
            StmtKind::Goto(_) | StmtKind::Unsupported(_) => {
                // Structured `goto`/unsupported constructs never reach here: the HIR construction
                // contract (spec §4.1) only produces these nodes for forms that are rejected
                // before the CFG is built, and the caller marks the whole function untranslatable
                // instead (spec §4.2 "Failure semantics").
                self.blocks[current].terminator = Terminator::Unreachable;
                None
            }
        }
    }
}

/// Wraps a condition/scrutinee expression as a pseudo-statement so it lives in the block that
/// evaluates it, without inventing a new `Stmt` variant just for this purpose.
fn cond_marker(expr: &Expr, owner: &Stmt) -> Stmt {
    Stmt::new(StmtKind::Expr(expr.clone()), owner.span)
}

/// Builds the CFG for `function`, pruning blocks unreachable from the entry.
///
/// Returns `None` if the body contains a `goto` or other construct the HIR marked
/// `Unsupported`/`Goto` reaching a point the builder cannot structurally lower — per spec §4.2,
/// the caller should mark the function untranslatable in that case.
pub fn build_cfg(function: &Function) -> Option<Cfg> {
    let mut blocks = PrimaryMap::new();
    let entry = blocks.push(BasicBlock::default());
    let exit = blocks.push(BasicBlock::default());
    let mut builder = Builder {
        blocks,
        graph: DiGraphMap::new(),
        exit,
        loop_stack: Vec::new(),
    };
    builder.graph.add_node(entry);
    builder.graph.add_node(exit);

    let StmtKind::Block(body) = &function.body.kind else {
        return None;
    };
    if let Some(fallthrough) = builder.lower_block(body, entry) {
        builder.edge(fallthrough, exit, EdgeKind::Fallthrough);
    }

    let cfg = Cfg {
        entry,
        exit,
        blocks: builder.blocks,
        graph: builder.graph,
    };
    Some(prune_unreachable(cfg))
}

/// Removes blocks unreachable from `entry` (spec §4.2 "Unreachable nodes are pruned after
/// construction").
fn prune_unreachable(mut cfg: Cfg) -> Cfg {
    let reachable = petgraph::algo::dijkstra(&cfg.graph, cfg.entry, None, |_| 1usize);
    let unreachable: Vec<BlockId> =
        cfg.graph.nodes().filter(|node| !reachable.contains_key(node)).collect();
    for node in unreachable {
        cfg.graph.remove_node(node);
    }
    cfg
}

#[cfg(test)]
mod tests {
    use transpiler_hir::{Expr, ExprKind, Ident, Literal, Param, Stmt, StmtKind, Ty, ValueCategory};
    use transpiler_session::Span;

    use super::*;

    fn int_literal(v: i128) -> Expr {
        Expr::new(
            ExprKind::Literal(Literal::Int(v)),
            Ty::Int { signed: true, width: transpiler_hir::IntWidth::W32 },
            ValueCategory::RValue,
            Span::UNKNOWN,
        )
    }

    #[test]
    fn straight_line_function_has_one_block_besides_exit() {
        let body = Stmt::block(
            vec![Stmt::new(StmtKind::Return(Some(int_literal(0))), Span::UNKNOWN)],
            Span::UNKNOWN,
        );
        let function = Function::new(Ident::new("f"), Vec::<Param>::new(), Ty::Void, body, Span::UNKNOWN);
        let cfg = build_cfg(&function).expect("structured body lowers");
        assert!(cfg.block_count() >= 2);
        assert!(matches!(cfg.block(cfg.entry).terminator, Terminator::Return(_)));
    }

    #[test]
    fn while_loop_has_a_back_edge() {
        let cond = int_literal(1);
        let body = Stmt::block(
            vec![Stmt::new(
                StmtKind::While {
                    cond,
                    body: Box::new(Stmt::block(
                        vec![Stmt::new(StmtKind::Break, Span::UNKNOWN)],
                        Span::UNKNOWN,
                    )),
                },
                Span::UNKNOWN,
            )],
            Span::UNKNOWN,
        );
        let function = Function::new(Ident::new("f"), Vec::<Param>::new(), Ty::Void, body, Span::UNKNOWN);
        let cfg = build_cfg(&function).expect("structured body lowers");
        let has_back_edge = cfg
            .blocks()
            .flat_map(|(id, _)| cfg.successors(id).map(move |succ| (id, succ)))
            .any(|(from, to)| cfg.is_back_edge(from, to));
        assert!(has_back_edge, "while loop must contribute at least one back-edge");
    }
}
