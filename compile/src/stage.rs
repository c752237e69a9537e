//! A small `Stage`/`Chain` combinator: each stage declares an `Input`/`Output` pair and a `run`
//! method threaded with the ambient session, and `.next()` composes two stages into one.
//!
//! There is no `next_optional`/`collect` here, because this pipeline has no optional stage and no
//! fan-in — every unit runs the same five stages in the same order (see `DESIGN.md`).

use transpiler_session::{diagnostics::FatalError, Session};

pub type StageResult<T> = Result<T, FatalError>;

/// One step of the pipeline. `session` carries the catalog, tagged-union hints and the
/// diagnostics stream every stage reads from or writes into; it is reborrowed down the chain
/// rather than being part of `Input`/`Output`, since it outlives any single stage's data.
pub trait Stage {
    type Input;
    type Output;

    fn run(&mut self, input: Self::Input, session: &mut Session) -> StageResult<Self::Output>;

    fn next<S>(self, stage: S) -> Chain<Self, S>
    where
        Self: Sized,
        S: Stage<Input = Self::Output>,
    {
        Chain {
            first: self,
            second: stage,
        }
    }
}

pub struct Chain<A, B> {
    first: A,
    second: B,
}

impl<A, B> Stage for Chain<A, B>
where
    A: Stage,
    B: Stage<Input = A::Output>,
{
    type Input = A::Input;
    type Output = B::Output;

    fn run(&mut self, input: Self::Input, session: &mut Session) -> StageResult<Self::Output> {
        let mid = self.first.run(input, session)?;
        self.second.run(mid, session)
    }
}
