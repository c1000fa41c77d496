use std::collections::BTreeMap;

/// Ranks run 1 (best) through 4 (worst), one per provider card.
pub const RANK_COUNT: u8 = 4;

/// The Part B rank assignment: a partial, injective mapping from provider to
/// rank, mutated only through [`RankBoard::pick`].
///
/// The board never rejects a pick. Every interaction is resolved by toggling,
/// moving, or auto-completing, so the mapping can be incomplete but is never
/// inconsistent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankBoard {
    providers: Vec<String>,
    assignment: BTreeMap<String, u8>,
}

impl RankBoard {
    /// Build an empty board over a fixed provider set. The caller supplies
    /// one provider per rank; the set does not change for the lifetime of
    /// the board.
    pub fn new<I, S>(providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let providers: Vec<String> = providers.into_iter().map(Into::into).collect();
        debug_assert_eq!(
            providers.len(),
            RANK_COUNT as usize,
            "rank board expects one provider per rank"
        );
        Self {
            providers,
            assignment: BTreeMap::new(),
        }
    }

    pub fn providers(&self) -> &[String] {
        &self.providers
    }

    pub fn rank_of(&self, provider: &str) -> Option<u8> {
        self.assignment.get(provider).copied()
    }

    pub fn holder_of(&self, rank: u8) -> Option<&str> {
        self.assignment
            .iter()
            .find(|(_, held)| **held == rank)
            .map(|(provider, _)| provider.as_str())
    }

    /// Number of providers currently holding a rank.
    pub fn chosen_count(&self) -> usize {
        self.assignment.len()
    }

    /// True when every provider holds a rank (a total bijection).
    pub fn is_complete(&self) -> bool {
        self.assignment.len() == self.providers.len()
    }

    /// Snapshot of the current provider -> rank mapping.
    pub fn ranks(&self) -> BTreeMap<String, u8> {
        self.assignment.clone()
    }

    /// Apply one rank-pill click.
    ///
    /// Clicking the rank a provider already holds toggles it off, the only
    /// way to clear a single assignment. Clicking any other rank moves that
    /// rank to this provider, unassigning whoever held it. When exactly one
    /// provider and one rank remain unmatched afterwards, the final pairing
    /// is forced.
    ///
    /// Inputs are constrained by the rendered pills; an unknown provider or
    /// out-of-range rank is a caller bug, not a runtime error.
    pub fn pick(&mut self, provider: &str, rank: u8) {
        debug_assert!(
            (1..=RANK_COUNT).contains(&rank),
            "rank {rank} outside 1..={RANK_COUNT}"
        );
        debug_assert!(
            self.providers.iter().any(|known| known == provider),
            "unknown provider {provider}"
        );

        if self.rank_of(provider) == Some(rank) {
            self.assignment.remove(provider);
        } else {
            if let Some(holder) = self.holder_of(rank).map(str::to_string) {
                self.assignment.remove(&holder);
            }
            self.assignment.insert(provider.to_string(), rank);
        }

        self.auto_complete();
    }

    fn auto_complete(&mut self) {
        let mut unassigned = self
            .providers
            .iter()
            .filter(|provider| !self.assignment.contains_key(*provider));
        let (Some(provider), None) = (unassigned.next(), unassigned.next()) else {
            return;
        };

        let mut unused = (1..=RANK_COUNT).filter(|rank| self.holder_of(*rank).is_none());
        let (Some(rank), None) = (unused.next(), unused.next()) else {
            return;
        };

        self.assignment.insert(provider.clone(), rank);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn board() -> RankBoard {
        RankBoard::new(["chatgpt", "google", "stability", "bfl"])
    }

    fn assert_injective(board: &RankBoard) {
        let held: Vec<u8> = board.ranks().values().copied().collect();
        let distinct: BTreeSet<u8> = held.iter().copied().collect();
        assert_eq!(held.len(), distinct.len(), "duplicate rank in {held:?}");
    }

    #[test]
    fn toggle_clears_a_single_assignment() {
        let mut board = board();
        board.pick("chatgpt", 1);
        assert_eq!(board.rank_of("chatgpt"), Some(1));

        board.pick("chatgpt", 1);
        assert_eq!(board.rank_of("chatgpt"), None);
        assert_eq!(board.chosen_count(), 0);
    }

    #[test]
    fn move_steals_the_rank_and_unassigns_the_holder() {
        let mut board = board();
        board.pick("chatgpt", 1);
        board.pick("google", 1);

        assert_eq!(board.rank_of("google"), Some(1));
        assert_eq!(board.rank_of("chatgpt"), None);
        assert_eq!(board.chosen_count(), 1);
    }

    #[test]
    fn reassigning_a_provider_frees_its_previous_rank() {
        let mut board = board();
        board.pick("chatgpt", 1);
        board.pick("chatgpt", 2);

        assert_eq!(board.rank_of("chatgpt"), Some(2));
        assert_eq!(board.holder_of(1), None);
    }

    #[test]
    fn third_assignment_forces_the_fourth() {
        let mut board = board();
        board.pick("chatgpt", 1);
        board.pick("google", 2);
        assert_eq!(board.chosen_count(), 2);

        board.pick("stability", 3);
        assert_eq!(board.rank_of("bfl"), Some(4));
        assert!(board.is_complete());
    }

    #[test]
    fn auto_complete_pairs_whatever_remains() {
        let mut board = board();
        board.pick("bfl", 2);
        board.pick("stability", 4);
        board.pick("chatgpt", 3);

        assert_eq!(board.rank_of("google"), Some(1));
        assert!(board.is_complete());
    }

    #[test]
    fn completed_board_still_allows_free_reassignment() {
        let mut board = board();
        board.pick("chatgpt", 1);
        board.pick("google", 2);
        board.pick("stability", 3);
        assert!(board.is_complete());

        // Swap ranks 1 and 2 by moving; the board drops to three chosen.
        board.pick("google", 1);
        assert_eq!(board.rank_of("google"), Some(1));
        assert_eq!(board.rank_of("chatgpt"), None);
        assert_eq!(board.chosen_count(), 3);
        assert_injective(&board);
    }

    #[test]
    fn injectivity_holds_under_arbitrary_pick_sequences() {
        let providers = ["chatgpt", "google", "stability", "bfl"];
        let mut board = board();

        // A deterministic walk that exercises toggles, moves, and
        // auto-completion in combination.
        let mut step: usize = 7;
        for _ in 0..200 {
            let provider = providers[step % providers.len()];
            let rank = (step % RANK_COUNT as usize) as u8 + 1;
            board.pick(provider, rank);
            assert_injective(&board);
            step = step.wrapping_mul(31).wrapping_add(17);
        }
    }
}
