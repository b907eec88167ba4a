use std::cmp::Reverse;

use itertools::Itertools;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::algorithm::scoring::ScoredCandidate;
use crate::nuclear::constants::{LEADERBOARD_CAPACITY, LIGHT_NUCLIDE_MASS_LIMIT};
use crate::nuclear::nuclide::NuclideId;

/// The value a leaderboard is ranked by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankKey {
    MatchFraction,
    NaturalAbundance,
}

impl RankKey {
    pub fn value(&self, candidate: &ScoredCandidate) -> f64 {
        match self {
            RankKey::MatchFraction => candidate.match_fraction,
            RankKey::NaturalAbundance => candidate.natural_abundance,
        }
    }
}

/// Fixed-capacity collection of the best candidates seen so far.
///
/// # Description
///
/// A nuclide is held at most once. Until the board is full, new nuclides are appended.
/// Afterwards a new nuclide replaces the first entry holding the minimum value, and only
/// if its own value is strictly larger, so ties keep the earlier entry.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    key: RankKey,
    capacity: usize,
    entries: Vec<ScoredCandidate>,
}

impl Leaderboard {
    pub fn new(key: RankKey, capacity: usize) -> Self {
        Leaderboard {
            key,
            capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn key(&self) -> RankKey {
        self.key
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, nuclide: NuclideId) -> bool {
        self.entries.iter().any(|entry| entry.nuclide == nuclide)
    }

    /// offer a candidate to the board
    ///
    /// Arguments:
    ///
    /// * `candidate` - scored candidate, eligibility is checked by the caller
    ///
    /// Returns:
    ///
    /// * `bool` - true if the candidate took a slot
    ///
    /// # Examples
    ///
    /// ```
    /// use gammacore::algorithm::ranking::{Leaderboard, RankKey};
    /// use gammacore::algorithm::scoring::ScoredCandidate;
    /// use gammacore::nuclear::nuclide::NuclideId;
    ///
    /// let candidate = |z: u32, a: u32, fraction: f64| ScoredCandidate {
    ///     nuclide: NuclideId::new(z, a, 0),
    ///     name: NuclideId::new(z, a, 0).to_string(),
    ///     match_count: 1,
    ///     known_line_count: 1,
    ///     match_fraction: fraction,
    ///     natural_abundance: 0.5,
    ///     atomic_mass: a as f64,
    /// };
    ///
    /// let mut board = Leaderboard::new(RankKey::MatchFraction, 2);
    /// assert!(board.offer(&candidate(19, 40, 0.2)));
    /// assert!(board.offer(&candidate(37, 87, 0.6)));
    /// assert!(!board.offer(&candidate(19, 40, 0.9))); // already held
    /// assert!(!board.offer(&candidate(57, 138, 0.2))); // ties keep the existing entry
    /// assert!(board.offer(&candidate(71, 176, 0.3))); // evicts K40
    /// assert_eq!(board.names(), vec!["Lu176", "Rb87"]);
    /// ```
    pub fn offer(&mut self, candidate: &ScoredCandidate) -> bool {
        if self.capacity == 0 || self.contains(candidate.nuclide) {
            return false;
        }
        if self.entries.len() < self.capacity {
            self.entries.push(candidate.clone());
            return true;
        }

        let key = self.key;
        let Some(min_index) = self.entries.iter().position_min_by_key(|entry| OrderedFloat(key.value(entry))) else {
            return false;
        };
        if key.value(candidate) > key.value(&self.entries[min_index]) {
            self.entries[min_index] = candidate.clone();
            true
        } else {
            false
        }
    }

    /// Entries in slot order.
    pub fn entries(&self) -> &[ScoredCandidate] {
        &self.entries
    }

    /// Entries by descending value, ties in slot order.
    pub fn ranked(&self) -> Vec<&ScoredCandidate> {
        let key = self.key;
        self.entries
            .iter()
            .sorted_by_key(|entry| Reverse(OrderedFloat(key.value(entry))))
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.name.as_str()).collect()
    }
}

/// Options for ranking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Slots per leaderboard.
    pub capacity: usize,
    /// Atomic mass (u) up to which a nuclide counts as light.
    pub light_mass_limit: f64,
    /// Champion challengers must also improve on the champion's match fraction.
    pub require_improving_match: bool,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            capacity: LEADERBOARD_CAPACITY,
            light_mass_limit: LIGHT_NUCLIDE_MASS_LIMIT,
            require_improving_match: false,
        }
    }
}

/// whether a candidate may become the overall champion
///
/// Ground-state, naturally occurring (abundance in (0, 1)) and matching at least one line.
pub fn is_champion_eligible(candidate: &ScoredCandidate) -> bool {
    !candidate.is_metastable() && candidate.is_naturally_occurring() && candidate.match_fraction > 0.0
}

/// priority rule between the current champion and an eligible challenger
///
/// Arguments:
///
/// * `champion` - current champion
/// * `challenger` - eligible candidate
///
/// Returns:
///
/// * `bool` - true if the challenger has a lower priority number, or otherwise a strictly higher abundance
///
pub fn challenger_wins(champion: &ScoredCandidate, challenger: &ScoredCandidate) -> bool {
    challenger.priority_number() < champion.priority_number()
        || challenger.natural_abundance > champion.natural_abundance
}

/// Running state of one analysis: four leaderboards and the overall champion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankingState {
    config: RankingConfig,
    best_match: Leaderboard,
    best_abundance: Leaderboard,
    light_best_match: Leaderboard,
    light_best_abundance: Leaderboard,
    best_overall: Option<ScoredCandidate>,
    ranked: usize,
}

impl RankingState {
    pub fn new(config: RankingConfig) -> Self {
        let capacity = config.capacity;
        RankingState {
            config,
            best_match: Leaderboard::new(RankKey::MatchFraction, capacity),
            best_abundance: Leaderboard::new(RankKey::NaturalAbundance, capacity),
            light_best_match: Leaderboard::new(RankKey::MatchFraction, capacity),
            light_best_abundance: Leaderboard::new(RankKey::NaturalAbundance, capacity),
            best_overall: None,
            ranked: 0,
        }
    }

    /// fold one scored candidate into the state
    ///
    /// Arguments:
    ///
    /// * `candidate` - next candidate in discovery order
    ///
    /// Returns:
    ///
    /// * `RankingState` - the updated state; metastable candidates leave it unchanged
    ///
    pub fn accumulate(mut self, candidate: &ScoredCandidate) -> Self {
        if candidate.is_metastable() {
            log::debug!("{} is metastable, not ranked", candidate.name);
            return self;
        }
        self.ranked += 1;

        if candidate.is_naturally_occurring() {
            self.best_match.offer(candidate);
            self.best_abundance.offer(candidate);
            if candidate.is_light(self.config.light_mass_limit) {
                self.light_best_match.offer(candidate);
                self.light_best_abundance.offer(candidate);
            }
        }

        self.best_overall = self.next_champion(candidate);
        self
    }

    fn next_champion(&mut self, candidate: &ScoredCandidate) -> Option<ScoredCandidate> {
        let current = self.best_overall.take();
        if !is_champion_eligible(candidate) {
            return current;
        }
        match current {
            None => Some(candidate.clone()),
            Some(champion) => {
                if self.config.require_improving_match && candidate.match_fraction <= champion.match_fraction {
                    return Some(champion);
                }
                if challenger_wins(&champion, candidate) {
                    log::debug!("{} replaces {} as best overall", candidate.name, champion.name);
                    Some(candidate.clone())
                } else {
                    Some(champion)
                }
            }
        }
    }

    /// Folds `candidates` in order into a fresh state.
    pub fn from_candidates<'a, I>(config: RankingConfig, candidates: I) -> Self
    where
        I: IntoIterator<Item = &'a ScoredCandidate>,
    {
        candidates
            .into_iter()
            .fold(RankingState::new(config), |state, candidate| state.accumulate(candidate))
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    pub fn best_match(&self) -> &Leaderboard {
        &self.best_match
    }

    pub fn best_abundance(&self) -> &Leaderboard {
        &self.best_abundance
    }

    pub fn light_best_match(&self) -> &Leaderboard {
        &self.light_best_match
    }

    /// the natural-candidate leaderboard used for presentation
    pub fn light_best_abundance(&self) -> &Leaderboard {
        &self.light_best_abundance
    }

    pub fn best_overall(&self) -> Option<&ScoredCandidate> {
        self.best_overall.as_ref()
    }

    /// number of non-metastable candidates folded in
    pub fn ranked(&self) -> usize {
        self.ranked
    }

    pub fn leaderboards(&self) -> [&Leaderboard; 4] {
        [&self.best_match, &self.best_abundance, &self.light_best_match, &self.light_best_abundance]
    }
}

impl Default for RankingState {
    fn default() -> Self {
        RankingState::new(RankingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;

    fn candidate(z: u32, a: u32, state: u32, match_fraction: f64, abundance: f64, mass: f64) -> ScoredCandidate {
        let nuclide = NuclideId::new(z, a, state);
        ScoredCandidate {
            nuclide,
            name: nuclide.to_string(),
            match_count: 1,
            known_line_count: 1,
            match_fraction,
            natural_abundance: abundance,
            atomic_mass: mass,
        }
    }

    #[test]
    fn test_min_eviction_replaces_first_minimum_only_on_strict_improvement() {
        let mut board = Leaderboard::new(RankKey::NaturalAbundance, 3);
        board.offer(&candidate(19, 40, 0, 1.0, 0.2, 39.9));
        board.offer(&candidate(37, 87, 0, 1.0, 0.1, 86.9));
        board.offer(&candidate(57, 138, 0, 1.0, 0.1, 137.9));

        // equal to the minimum: rejected
        assert!(!board.offer(&candidate(71, 176, 0, 1.0, 0.1, 175.9)));
        // larger: replaces Rb87, the first of the two minima
        assert!(board.offer(&candidate(71, 176, 0, 1.0, 0.15, 175.9)));
        assert_eq!(board.names(), vec!["K40", "Lu176", "La138"]);

        let ranked: Vec<&str> = board.ranked().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(ranked, vec!["K40", "Lu176", "La138"]);
    }

    #[test]
    fn test_zero_capacity_board_stays_empty() {
        let mut board = Leaderboard::new(RankKey::MatchFraction, 0);
        assert!(!board.offer(&candidate(19, 40, 0, 1.0, 0.2, 39.9)));
        assert!(board.is_empty());
    }

    #[test]
    fn test_leaderboard_never_holds_a_nuclide_twice() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut board = Leaderboard::new(RankKey::MatchFraction, 10);
        for _ in 0..2000 {
            let a = rng.gen_range(20..60);
            board.offer(&candidate(19, a, 0, rng.gen_range(0.0..1.0), 0.5, a as f64));

            let names: HashSet<&str> = board.names().into_iter().collect();
            assert_eq!(names.len(), board.len());
            assert!(board.len() <= 10);
        }
    }

    #[test]
    fn test_eligibility_of_the_four_boards() {
        let config = RankingConfig::default();
        let candidates = [
            candidate(19, 40, 0, 1.0, 0.35, 39.0), // light and natural
            candidate(92, 238, 0, 0.5, 0.992742, 238.05), // heavy and natural
            candidate(55, 137, 0, 1.0, 0.0, 136.9), // synthetic
            candidate(90, 232, 0, 1.0, 1.0, 232.04), // abundance of exactly 1
            candidate(43, 99, 1, 1.0, 0.5, 98.9), // metastable
        ];
        let state = RankingState::from_candidates(config, &candidates);

        assert_eq!(state.best_match().names(), vec!["K40", "U238"]);
        assert_eq!(state.best_abundance().names(), vec!["K40", "U238"]);
        assert_eq!(state.light_best_match().names(), vec!["K40"]);
        assert_eq!(state.light_best_abundance().names(), vec!["K40"]);
        assert_eq!(state.ranked(), 4);
    }

    #[test]
    fn test_metastable_candidates_never_rank() {
        let metastable = candidate(43, 99, 1, 1.0, 0.5, 98.9);
        let state = RankingState::default().accumulate(&metastable);

        assert!(state.best_overall().is_none());
        for board in state.leaderboards() {
            assert!(board.is_empty());
        }
        assert_eq!(state, RankingState::default());
    }

    #[test]
    fn test_champion_priority_rule() {
        let k40 = candidate(19, 40, 0, 0.2, 0.000117, 39.96);
        let rb87 = candidate(37, 87, 0, 0.9, 0.2783, 86.9);
        let v50 = candidate(23, 50, 0, 0.1, 0.0025, 49.9);
        let no_match = candidate(3, 6, 0, 0.0, 0.0759, 6.0);

        // first eligible candidate wins
        let state = RankingState::default().accumulate(&k40);
        assert_eq!(state.best_overall().unwrap().name, "K40");

        // heavier but more abundant: replaces
        let state = state.accumulate(&rb87);
        assert_eq!(state.best_overall().unwrap().name, "Rb87");

        // lighter: replaces regardless of abundance
        let state = state.accumulate(&v50);
        assert_eq!(state.best_overall().unwrap().name, "V50");

        // lighter but matching nothing: not eligible
        let state = state.accumulate(&no_match);
        assert_eq!(state.best_overall().unwrap().name, "V50");

        // the same nuclide again changes nothing
        let state = state.accumulate(&v50);
        assert_eq!(state.best_overall().unwrap().name, "V50");
    }

    #[test]
    fn test_priority_follows_mass_number_not_atomic_number() {
        // Ar40 has the lower atomic number (18 < 19) but the higher mass number (40 > 39);
        // the priority number is the mass number, so K39 takes over despite its lower abundance
        let ar40 = candidate(18, 40, 0, 0.5, 0.996035, 39.962);
        let k39 = candidate(19, 39, 0, 0.5, 0.932581, 38.964);
        assert_eq!(ar40.priority_number(), 40);
        assert_eq!(k39.priority_number(), 39);
        assert!(challenger_wins(&ar40, &k39));

        let state = RankingState::default().accumulate(&ar40).accumulate(&k39);
        assert_eq!(state.best_overall().unwrap().name, "K39");
    }

    #[test]
    fn test_improving_match_gate() {
        let config = RankingConfig {
            require_improving_match: true,
            ..RankingConfig::default()
        };
        let k40 = candidate(19, 40, 0, 0.5, 0.000117, 39.96);
        let v50 = candidate(23, 50, 0, 0.5, 0.0025, 49.9);
        let li6 = candidate(3, 6, 0, 0.25, 0.0759, 6.0);
        let rb87 = candidate(37, 87, 0, 0.75, 0.2783, 86.9);

        let state = RankingState::from_candidates(config, [&k40, &v50, &li6]);
        assert_eq!(state.best_overall().unwrap().name, "K40");

        let state = state.accumulate(&rb87);
        assert_eq!(state.best_overall().unwrap().name, "Rb87");
    }
}
