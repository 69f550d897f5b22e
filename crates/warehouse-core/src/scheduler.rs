//! Random activation: every registered entity acts once per tick in a fresh order.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::entity::EntityId;

/// Shuffles the registration-order handles at the start of each tick.
#[derive(Debug, Default)]
pub struct RandomActivation {
    order: Vec<EntityId>,
}

impl RandomActivation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Activation order for the next tick: a permutation of `registered`.
    pub fn plan<R: Rng + ?Sized>(&mut self, registered: &[EntityId], rng: &mut R) -> &[EntityId] {
        self.order.clear();
        self.order.extend_from_slice(registered);
        self.order.shuffle(rng);
        &self.order
    }
}
