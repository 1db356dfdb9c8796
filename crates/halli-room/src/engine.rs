//! The card engine: pure, synchronous Halli Galli state.
//!
//! Everything here is deterministic given the injected random generator,
//! which keeps the actual game rules testable without timers or tasks.
//! The room actor owns an instance and drives it from its command loop.
//!
//! State per seat: a face-down hand count, the top card of the face-up
//! pile (only the top matters for the bell), and the face-up pile size
//! (the whole pile matters for payouts). Invariant from game start until
//! a payout: the total number of cards across hands and piles never
//! changes.

use rand::seq::SliceRandom;
use rand::Rng;

/// The visible top card of a seat's face-up pile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceUp {
    /// Fruit kind, `0..fruit_variation`.
    pub fruit: u8,
    /// Printed fruit count, 1–5.
    pub count: u8,
}

/// Result of one reveal step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reveal {
    /// A card was turned over at `seat`.
    Card { seat: usize, fruit: u8, count: u8 },
    /// No seat holds a card any more; the game is over.
    Exhausted,
}

/// Result of adjudicating a bell slap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BellVerdict {
    /// The slap was correct: every face-up card moved to the slapper.
    Correct { hands: Vec<u32> },
    /// The slap was wrong: the slapper paid one card to each seat marked
    /// `true` in `received`.
    Wrong { received: Vec<bool>, hands: Vec<u32> },
}

/// Authoritative card state for one running game.
#[derive(Debug, Clone)]
pub struct GameState {
    hands: Vec<u32>,
    face_tops: Vec<Option<FaceUp>>,
    pile_sizes: Vec<u32>,
    next_seat: usize,
    bell_rung: bool,
    time_expired: bool,
}

impl GameState {
    /// Deals `starting_cards` to each of `seats` seats, all face-up
    /// slots empty, reveal cursor on seat 0.
    pub fn new(seats: usize, starting_cards: u32) -> Self {
        Self {
            hands: vec![starting_cards; seats],
            face_tops: vec![None; seats],
            pile_sizes: vec![0; seats],
            next_seat: 0,
            bell_rung: false,
            time_expired: false,
        }
    }

    pub fn seats(&self) -> usize {
        self.hands.len()
    }

    pub fn hands(&self) -> &[u32] {
        &self.hands
    }

    pub fn face_tops(&self) -> &[Option<FaceUp>] {
        &self.face_tops
    }

    /// Total cards in play (hands plus piles). Constant between payouts.
    pub fn total_cards(&self) -> u32 {
        self.hands.iter().sum::<u32>() + self.pile_sizes.iter().sum::<u32>()
    }

    pub fn bell_rung(&self) -> bool {
        self.bell_rung
    }

    /// Latches the bell for the current revealed configuration. Returns
    /// `false` if a slap was already adjudicated this round.
    pub fn latch_bell(&mut self) -> bool {
        if self.bell_rung {
            return false;
        }
        self.bell_rung = true;
        true
    }

    pub fn set_time_expired(&mut self) {
        self.time_expired = true;
    }

    pub fn time_expired(&self) -> bool {
        self.time_expired
    }

    /// One reveal step.
    ///
    /// Finds the next seat holding cards by advancing the cursor
    /// cyclically; a full cycle without a card-holder means the game is
    /// exhausted (the caller returns the piles and ends the game). On a
    /// reveal the bell latch is cleared — after the face slot updates —
    /// so exactly one slap can be adjudicated against the new
    /// configuration.
    pub fn reveal<R: Rng>(&mut self, fruit_variation: u8, rng: &mut R) -> Reveal {
        let seats = self.seats();
        let mut seat = self.next_seat;
        let mut stepped = 0;
        while self.hands[seat] == 0 {
            seat = (seat + 1) % seats;
            stepped += 1;
            if stepped == seats {
                return Reveal::Exhausted;
            }
        }

        let fruit = rng.random_range(0..fruit_variation);
        let count = rng.random_range(1..=5u8);

        self.hands[seat] -= 1;
        self.pile_sizes[seat] += 1;
        self.face_tops[seat] = Some(FaceUp { fruit, count });
        self.next_seat = (seat + 1) % seats;
        self.bell_rung = false;

        Reveal::Card { seat, fruit, count }
    }

    /// Whether the current face-up configuration makes a slap correct:
    /// some fruit's total across the visible tops equals `bell_target`.
    pub fn is_bell_time(&self, bell_target: u8) -> bool {
        let mut totals = [0u32; u8::MAX as usize + 1];
        for top in self.face_tops.iter().flatten() {
            totals[top.fruit as usize] += u32::from(top.count);
        }
        totals.iter().any(|&t| t == u32::from(bell_target))
    }

    /// Adjudicates a slap by `slapper`. The caller has already taken the
    /// bell latch.
    ///
    /// Correct: every face-up pile moves into the slapper's hand and the
    /// face slots clear. Wrong: the slapper gives one card to each other
    /// seat; with fewer cards than seats, a uniformly random subset of
    /// that size receives instead. Piles are untouched on a wrong slap.
    pub fn adjudicate<R: Rng>(
        &mut self,
        slapper: usize,
        bell_target: u8,
        rng: &mut R,
    ) -> BellVerdict {
        if self.is_bell_time(bell_target) {
            let collected: u32 = self.pile_sizes.iter().sum();
            self.hands[slapper] += collected;
            for top in self.face_tops.iter_mut() {
                *top = None;
            }
            for size in self.pile_sizes.iter_mut() {
                *size = 0;
            }
            BellVerdict::Correct {
                hands: self.hands.clone(),
            }
        } else {
            let mut receivers: Vec<usize> =
                (0..self.seats()).filter(|&s| s != slapper).collect();
            let available = self.hands[slapper] as usize;
            if available < receivers.len() {
                receivers.shuffle(rng);
                receivers.truncate(available);
            }

            let mut received = vec![false; self.seats()];
            for &seat in &receivers {
                if self.hands[slapper] == 0 {
                    break;
                }
                self.hands[slapper] -= 1;
                self.hands[seat] += 1;
                received[seat] = true;
            }

            BellVerdict::Wrong {
                received,
                hands: self.hands.clone(),
            }
        }
    }

    /// Returns every face-up pile to the seat it sits in front of and
    /// clears the face slots. Used when the reveal loop exhausts and at
    /// game end.
    pub fn return_piles(&mut self) {
        for seat in 0..self.seats() {
            self.hands[seat] += self.pile_sizes[seat];
            self.pile_sizes[seat] = 0;
            self.face_tops[seat] = None;
        }
    }

    /// Competition ranking of the hands, descending: ties share the
    /// better rank and the next rank is skipped (1, 2, 2, 4).
    pub fn ranks(&self) -> Vec<u32> {
        let mut order: Vec<usize> = (0..self.seats()).collect();
        order.sort_by(|&a, &b| self.hands[b].cmp(&self.hands[a]));

        let mut ranks = vec![0u32; self.seats()];
        let mut current_rank = 1;
        let mut current_cards = None;
        for (i, &seat) in order.iter().enumerate() {
            if current_cards != Some(self.hands[seat]) {
                current_rank = i as u32 + 1;
                current_cards = Some(self.hands[seat]);
            }
            ranks[seat] = current_rank;
        }
        ranks
    }

    #[cfg(test)]
    pub(crate) fn set_hands_for_test(&mut self, hands: &[u32]) {
        self.hands = hands.to_vec();
    }

    #[cfg(test)]
    pub(crate) fn set_face_for_test(&mut self, seat: usize, top: Option<FaceUp>, pile: u32) {
        self.face_tops[seat] = top;
        self.pile_sizes[seat] = pile;
    }
}

// =========================================================================
// Tests
// =========================================================================
