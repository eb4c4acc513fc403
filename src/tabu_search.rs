use serde::Deserialize;

use crate::cost::Cost;
use crate::model::{CourseId, Model, RoomId};
use crate::solver::SolverState;
use crate::swap::{self, PredictStrategy, ResolvedSwap, SwapIter, SwapMove, SwapResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TabuSearchParams {
    /// Stop after this many consecutive non-improving iterations.
    pub max_idle: u64,
    /// Iterations a recorded placement stays banned.
    pub tabu_tenure: u32,
    /// The effective tenure of a placement grows as
    /// `tenure * coeff^insertions`, penalizing frequently revisited ones.
    pub frequency_penalty_coeff: f64,
    /// Pick uniformly among the moves tied for the best delta instead of
    /// keeping the first one seen.
    pub random_pick: bool,
    /// Perform an improving move as soon as one is seen.
    pub steepest: bool,
    /// Clear the tabu table whenever a new global best is found.
    pub clear_on_best: bool,
}

impl Default for TabuSearchParams {
    fn default() -> Self {
        TabuSearchParams {
            max_idle: 400,
            tabu_tenure: 120,
            frequency_penalty_coeff: 1.2,
            random_pick: true,
            steepest: true,
            clear_on_best: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct TabuEntry {
    time: u64,
    count: u32,
}

/// Bans are keyed per placed endpoint (course, room, day, slot); this is
/// finer than a per-move key and lets the frequency penalty accumulate on
/// the placements a run keeps coming back to.
struct TabuList {
    n_rooms: usize,
    n_days: usize,
    n_slots: usize,
    tenure: u32,
    frequency_penalty_coeff: f64,
    entries: Vec<TabuEntry>,
}

impl TabuList {
    fn new(model: &Model, tenure: u32, frequency_penalty_coeff: f64) -> Self {
        TabuList {
            n_rooms: model.n_rooms(),
            n_days: model.n_days(),
            n_slots: model.n_slots(),
            tenure,
            frequency_penalty_coeff,
            entries: vec![
                TabuEntry::default();
                model.n_courses() * model.n_rooms() * model.n_days() * model.n_slots()
            ],
        }
    }

    fn index(&self, c: CourseId, r: RoomId, day: usize, slot: usize) -> usize {
        ((c.raw_index() * self.n_rooms + r.raw_index()) * self.n_days + day) * self.n_slots + slot
    }

    fn placement_allowed(&self, c: CourseId, r: RoomId, day: usize, slot: usize, time: u64) -> bool {
        let entry = self.entries[self.index(c, r, day, slot)];
        if entry.count == 0 {
            return true;
        }
        let ban_until = entry.time as f64
            + self.tenure as f64 * self.frequency_penalty_coeff.powi(entry.count as i32);
        ban_until < time as f64
    }

    /// A move is banned iff either of the placements it produces is.
    fn move_allowed(&self, resolved: &ResolvedSwap, mv: &SwapMove, time: u64) -> bool {
        self.placement_allowed(resolved.c1, mv.r2, mv.d2, mv.s2, time)
            && resolved.c2.map_or(true, |c2| {
                self.placement_allowed(c2, resolved.r1, resolved.d1, resolved.s1, time)
            })
    }

    fn insert(&mut self, c: CourseId, r: RoomId, day: usize, slot: usize, time: u64) {
        let index = self.index(c, r, day, slot);
        self.entries[index].time = time;
        self.entries[index].count += 1;
    }

    /// Records the two vacated placements of a just-performed move.
    fn insert_move(&mut self, resolved: &ResolvedSwap, mv: &SwapMove, time: u64) {
        self.insert(resolved.c1, resolved.r1, resolved.d1, resolved.s1, time);
        if let Some(c2) = resolved.c2 {
            self.insert(c2, mv.r2, mv.d2, mv.s2, time);
        }
    }

    fn clear(&mut self) {
        self.entries.fill(TabuEntry::default());
    }
}

pub fn tabu_search(state: &mut SolverState, params: &TabuSearchParams) {
    log::debug!("ts.max_idle = {}", params.max_idle);
    log::debug!("ts.tabu_tenure = {}", params.tabu_tenure);
    log::debug!("ts.frequency_penalty_coeff = {}", params.frequency_penalty_coeff);
    log::debug!("ts.random_pick = {}", params.random_pick);
    log::debug!("ts.steepest = {}", params.steepest);
    log::debug!("ts.clear_on_best = {}", params.clear_on_best);

    let mut tabu = TabuList::new(
        state.current.model(),
        params.tabu_tenure,
        params.frequency_penalty_coeff,
    );

    let mut local_best_cost = state.current_cost;
    let mut idle: u64 = 0;
    let mut iteration: u64 = 0;
    let mut candidates: Vec<SwapMove> = Vec::new();
    let mut result = SwapResult::default();

    while idle < params.max_idle {
        if state.timed_out() {
            break;
        }

        let mut best_delta = Cost::MAX;
        candidates.clear();

        for mv in SwapIter::new(&state.current) {
            swap::predict(
                &state.current,
                &mv,
                PredictStrategy::Always,
                PredictStrategy::IfFeasible,
                &mut result,
            );
            if !result.feasible {
                continue;
            }
            let delta = result.delta.total();
            if delta > best_delta {
                continue;
            }

            let resolved = swap::resolve(&state.current, &mv);
            let aspiration = state.current_cost + delta < state.best_cost();
            if !aspiration && !tabu.move_allowed(&resolved, &mv, iteration) {
                continue;
            }

            if delta < best_delta {
                best_delta = delta;
                candidates.clear();
            }
            if params.random_pick || candidates.is_empty() {
                candidates.push(mv);
            }
            if delta < 0 && params.steepest {
                break;
            }
        }

        if !candidates.is_empty() {
            let pick_index = if params.random_pick {
                state.rng.usize(0..candidates.len())
            } else {
                0
            };
            let pick = candidates[pick_index];
            let resolved = swap::resolve(&state.current, &pick);

            swap::perform(&mut state.current, &pick);
            state.current_cost += best_delta;
            let new_best = state.report_move_applied();
            if new_best && params.clear_on_best {
                tabu.clear();
            }
            tabu.insert_move(&resolved, &pick, iteration);
        }

        if state.current_cost < local_best_cost {
            local_best_cost = state.current_cost;
            idle = 0;
        } else {
            idle += 1;
        }
        iteration += 1;
    }
}
