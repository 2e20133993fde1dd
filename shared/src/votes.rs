//! Up/down vote state machine for one viewer on one idea.
//!
//! [`cast_vote`] is the pure transition; [`VoteTally`] wraps it for a client
//! that applies the transition speculatively and later settles it against the
//! store's answer.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{VoteResponse, VoteType};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteError {
    #[error("sign in to vote")]
    Unauthenticated,

    #[error("a vote on this idea is already in flight")]
    Busy,

    #[error("vote could not be saved: {0}")]
    StoreMutationFailed(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCounters {
    pub upvotes: i64,
    pub downvotes: i64,
}

impl VoteCounters {
    pub fn new(upvotes: i64, downvotes: i64) -> Self {
        Self { upvotes, downvotes }
    }

    pub fn score(&self) -> i64 {
        self.upvotes - self.downvotes
    }

    fn slot(&mut self, vote_type: VoteType) -> &mut i64 {
        match vote_type {
            VoteType::Up => &mut self.upvotes,
            VoteType::Down => &mut self.downvotes,
        }
    }

    fn increment(&mut self, vote_type: VoteType) {
        *self.slot(vote_type) += 1;
    }

    fn decrement(&mut self, vote_type: VoteType) {
        let slot = self.slot(vote_type);
        *slot = (*slot - 1).max(0);
    }
}

/// The write the store must perform for a transition. Votes are unique on
/// (idea_id, user_id); an upsert replaces any existing row for the pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StoreMutation {
    Delete {
        idea_id: Uuid,
        user_id: Uuid,
    },
    Upsert {
        idea_id: Uuid,
        user_id: Uuid,
        vote_type: VoteType,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteTransition {
    pub vote_state: Option<VoteType>,
    pub counters: VoteCounters,
    pub mutation: StoreMutation,
}

/// Computes the result of `viewer` pressing `target` while holding `current`.
///
/// Pressing the held direction retracts the vote; anything else moves the
/// vote to `target`, releasing the opposite one if it was held.
pub fn cast_vote(
    idea_id: Uuid,
    viewer: Option<Uuid>,
    target: VoteType,
    current: Option<VoteType>,
    counters: VoteCounters,
) -> Result<VoteTransition, VoteError> {
    let user_id = viewer.ok_or(VoteError::Unauthenticated)?;
    let mut counters = counters;

    if current == Some(target) {
        counters.decrement(target);
        return Ok(VoteTransition {
            vote_state: None,
            counters,
            mutation: StoreMutation::Delete { idea_id, user_id },
        });
    }

    if let Some(previous) = current {
        counters.decrement(previous);
    }
    counters.increment(target);

    Ok(VoteTransition {
        vote_state: Some(target),
        counters,
        mutation: StoreMutation::Upsert {
            idea_id,
            user_id,
            vote_type: target,
        },
    })
}

/// A speculative vote waiting for the store's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingVote {
    pub mutation: StoreMutation,
    prior_state: Option<VoteType>,
    prior_counters: VoteCounters,
}

/// Client-side vote state for one idea as seen by one viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteTally {
    idea_id: Uuid,
    state: Option<VoteType>,
    counters: VoteCounters,
    pending: bool,
}

impl VoteTally {
    pub fn new(idea_id: Uuid, state: Option<VoteType>, counters: VoteCounters) -> Self {
        Self {
            idea_id,
            state,
            counters,
            pending: false,
        }
    }

    pub fn state(&self) -> Option<VoteType> {
        self.state
    }

    pub fn counters(&self) -> VoteCounters {
        self.counters
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Applies the transition locally and returns the mutation to send.
    pub fn begin(
        &mut self,
        viewer: Option<Uuid>,
        target: VoteType,
    ) -> Result<PendingVote, VoteError> {
        if self.pending {
            return Err(VoteError::Busy);
        }
        let transition = cast_vote(self.idea_id, viewer, target, self.state, self.counters)?;
        let pending = PendingVote {
            mutation: transition.mutation,
            prior_state: self.state,
            prior_counters: self.counters,
        };
        self.state = transition.vote_state;
        self.counters = transition.counters;
        self.pending = true;
        Ok(pending)
    }

    /// Adopts the store's authoritative state.
    pub fn commit(&mut self, _pending: PendingVote, confirmed: &VoteResponse) {
        self.state = confirmed.user_vote;
        self.counters = confirmed.counters();
        self.pending = false;
    }

    /// Restores the state held before [`VoteTally::begin`].
    pub fn rollback(&mut self, pending: PendingVote) {
        self.state = pending.prior_state;
        self.counters = pending.prior_counters;
        self.pending = false;
    }

    /// Commits on success, rolls back on failure.
    pub fn settle(
        &mut self,
        pending: PendingVote,
        outcome: Result<VoteResponse, String>,
    ) -> Result<(), VoteError> {
        match outcome {
            Ok(confirmed) => {
                self.commit(pending, &confirmed);
                Ok(())
            }
            Err(message) => {
                self.rollback(pending);
                Err(VoteError::StoreMutationFailed(message))
            }
        }
    }
}
