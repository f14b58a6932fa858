use crate::{Outcome, Result, util::attach};
use futures::{Stream, stream::FusedStream};
use std::{
    pin::Pin,
    task::{Context, Poll},
};

/// A resource owning producer: acquire the state once, produce at most one item per
/// demand, dispose the state exactly once.
pub trait Generator {
    type State;
    type Item;

    /// Acquire the state. Called on the first demand.
    fn open(&mut self) -> Result<Self::State>;

    /// Produce the next item, `None` when the sequence is over.
    fn pull(
        &mut self,
        state: &mut Self::State,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<Self::Item>>>;

    /// Dispose the state. `outcome` is `Failure` after an error or a cancellation.
    fn close(&mut self, state: Self::State, outcome: Outcome) -> Result<()>;
}

enum Phase<S> {
    Unopened,
    Active(S),
    Done,
}

/// Stream adapter over a [`Generator`].
///
/// Emits zero or more items followed by either the end of the stream or one error.
/// Dropping it while active is a cancellation: the state is closed right away and
/// nothing else is emitted.
pub struct Generated<G: Generator> {
    generator: G,
    phase: Phase<G::State>,
}

impl<G: Generator> Generated<G> {
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            phase: Phase::Unopened,
        }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Active(..))
    }

    /// Stop early, disposing the state if it was acquired.
    pub fn cancel(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.phase, Phase::Done) {
            Phase::Active(state) => {
                log::debug!("Cancelling an active stream");
                self.generator.close(state, Outcome::Failure)
            }
            _ => Ok(()),
        }
    }
}

// The state is never pinned structurally.
impl<G: Generator> Unpin for Generated<G> {}

impl<G: Generator> Stream for Generated<G> {
    type Item = Result<G::Item>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Phase::Unopened = this.phase {
            match this.generator.open() {
                Ok(state) => this.phase = Phase::Active(state),
                Err(e) => {
                    this.phase = Phase::Done;
                    return Poll::Ready(Some(Err(e)));
                }
            }
        }
        let Phase::Active(state) = &mut this.phase else {
            return Poll::Ready(None);
        };
        let result = match this.generator.pull(state, cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Ok(Some(item))) => return Poll::Ready(Some(Ok(item))),
            Poll::Ready(result) => result,
        };
        let Phase::Active(state) = std::mem::replace(&mut this.phase, Phase::Done) else {
            return Poll::Ready(None);
        };
        match result {
            Ok(..) => match this.generator.close(state, Outcome::Success) {
                Ok(()) => Poll::Ready(None),
                Err(e) => Poll::Ready(Some(Err(e))),
            },
            Err(e) => Poll::Ready(Some(Err(
                match this.generator.close(state, Outcome::Failure) {
                    Ok(()) => e,
                    Err(c) => attach(e, c),
                },
            ))),
        }
    }
}

impl<G: Generator> FusedStream for Generated<G> {
    fn is_terminated(&self) -> bool {
        matches!(self.phase, Phase::Done)
    }
}

impl<G: Generator> Drop for Generated<G> {
    fn drop(&mut self) {
        if let Err(e) = self.cancel() {
            log::error!("{:#}", e);
        }
    }
}
