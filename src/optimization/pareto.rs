//! Pareto dominance and the size-bounded non-dominated archive.

use std::cmp::Ordering;

use rand::Rng;

use crate::domain::models::{Direction, ParetoPoint};

/// `a` dominates `b`: at least as good on every objective and strictly
/// better on one, each under its own direction.
pub fn dominates(a: &[f64], b: &[f64], directions: &[Direction]) -> bool {
    let mut strictly_better = false;
    for ((x, y), direction) in a.iter().zip(b).zip(directions) {
        if !direction.is_at_least_as_good(*x, *y) {
            return false;
        }
        if direction.is_better(*x, *y) {
            strictly_better = true;
        }
    }
    strictly_better
}

/// Crowding distance of every member, recomputed from scratch.
///
/// Boundary members of each objective get infinity; objectives on which
/// all members agree contribute nothing.
pub fn assign_crowding_distances(members: &mut [ParetoPoint]) {
    for member in members.iter_mut() {
        member.crowding_distance = 0.0;
    }
    let Some(objectives) = members.first().map(|m| m.objectives.len()) else {
        return;
    };

    let mut order: Vec<usize> = (0..members.len()).collect();
    for m in 0..objectives {
        order.sort_by(|&a, &b| {
            members[a].objectives[m]
                .partial_cmp(&members[b].objectives[m])
                .unwrap_or(Ordering::Equal)
        });
        let first = order[0];
        let last = order[order.len() - 1];
        let span = members[last].objectives[m] - members[first].objectives[m];
        if span <= 0.0 || !span.is_finite() {
            continue;
        }
        members[first].crowding_distance = f64::INFINITY;
        members[last].crowding_distance = f64::INFINITY;
        for w in 1..order.len().saturating_sub(1) {
            let gap =
                members[order[w + 1]].objectives[m] - members[order[w - 1]].objectives[m];
            members[order[w]].crowding_distance += gap / span;
        }
    }
}

/// Mutually non-dominated members, at most `max_size` of them.
#[derive(Debug, Clone)]
pub struct ParetoArchive {
    directions: Vec<Direction>,
    max_size: usize,
    members: Vec<ParetoPoint>,
}

impl ParetoArchive {
    pub fn new(directions: Vec<Direction>, max_size: usize) -> Self {
        Self {
            directions,
            max_size,
            members: Vec::with_capacity(max_size + 1),
        }
    }

    pub fn members(&self) -> &[ParetoPoint] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.max_size
    }

    pub fn directions(&self) -> &[Direction] {
        &self.directions
    }

    /// Offer an evaluated point. Returns whether the membership changed.
    pub fn offer(&mut self, position: &[f64], objectives: &[f64]) -> bool {
        let rejected = self.members.iter().any(|m| {
            m.objectives == objectives || dominates(&m.objectives, objectives, &self.directions)
        });
        if rejected {
            return false;
        }

        let before = self.members.len();
        let directions = &self.directions;
        self.members
            .retain(|m| !dominates(objectives, &m.objectives, directions));
        let removed = before - self.members.len();

        self.members.push(ParetoPoint {
            position: position.to_vec(),
            objectives: objectives.to_vec(),
            crowding_distance: 0.0,
        });
        assign_crowding_distances(&mut self.members);

        if self.members.len() > self.max_size {
            self.members.sort_by(|a, b| {
                b.crowding_distance
                    .partial_cmp(&a.crowding_distance)
                    .unwrap_or(Ordering::Equal)
            });
            self.members.truncate(self.max_size);
            assign_crowding_distances(&mut self.members);
            let kept = self
                .members
                .iter()
                .any(|m| m.objectives == objectives && m.position == position);
            return kept || removed > 0;
        }
        true
    }

    /// Member best on objective `index`; ties keep the earliest.
    pub fn best_on(&self, index: usize) -> Option<&ParetoPoint> {
        let direction = self.directions[index];
        let mut best: Option<&ParetoPoint> = None;
        for member in &self.members {
            match best {
                Some(b) if !direction.is_better(member.objectives[index], b.objectives[index]) => {}
                _ => best = Some(member),
            }
        }
        best
    }

    /// Binary tournament leader pick.
    ///
    /// With probability `crowding_weight` the more isolated member wins;
    /// otherwise the first drawn wins with probability `pressure`.
    pub fn select_leader<R: Rng>(
        &self,
        crowding_weight: f64,
        pressure: f64,
        rng: &mut R,
    ) -> Option<&ParetoPoint> {
        if self.members.is_empty() {
            return None;
        }
        let first = &self.members[rng.gen_range(0..self.members.len())];
        let second = &self.members[rng.gen_range(0..self.members.len())];
        let winner = if rng.gen::<f64>() < crowding_weight {
            if second.crowding_distance > first.crowding_distance {
                second
            } else {
                first
            }
        } else if rng.gen::<f64>() < pressure {
            first
        } else {
            second
        };
        Some(winner)
    }

    pub fn into_members(self) -> Vec<ParetoPoint> {
        self.members
    }
}
