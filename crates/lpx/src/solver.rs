//! The incremental simplex solver at the heart of the propagator.
//!
//! The solver maintains a sparse [`Tableau`] over the auxiliary (basic)
//! variables together with a backtrackable assignment and bound state for
//! every variable. Bound activations arrive from the host one decision level
//! at a time; the solver repairs the assignment by pivoting and either
//! reports it satisfiable or extracts a conflict clause over the host
//! literals it relied on. All changes within a decision level are recorded
//! on trails so that [`Solver::undo`] restores the state at the start of the
//! level exactly.

pub(crate) mod bounds;

use std::{
	cmp::Reverse,
	collections::{hash_map::Entry, BinaryHeap, HashMap},
};

use index_vec::IndexVec;
use num_traits::{Signed, Zero};
use tracing::{debug, trace};
use ustr::Ustr;

use crate::{
	actions::{InitActions, PropagationActions},
	math::{Rational, Value},
	problem::{Inequality, Relation},
	solver::bounds::{Bound, BoundRef, BoundRelation},
	tableau::Tableau,
	theory::TheoryError,
	Literal,
};

index_vec::define_index_type! {
	/// Identifies an arithmetic variable within the [`Solver`].
	///
	/// Bland's rule breaks ties towards the smallest `VarRef` on both sides
	/// of a pivot, so the ordering of this type is what guarantees
	/// termination.
	pub struct VarRef = u32;
}

#[derive(Clone, Debug)]
/// A record on the bound trail, storing the bound pointer(s) a variable held
/// before the change.
enum BoundTrailEntry {
	/// Both sides were tightened together by an equality bound.
	Equal(VarRef, Option<BoundRef>, Option<BoundRef>),
	/// The lower bound of the variable was replaced.
	Lower(VarRef, Option<BoundRef>),
	/// The upper bound of the variable was replaced.
	Upper(VarRef, Option<BoundRef>),
}

#[derive(Clone, Debug)]
/// The outcome of one round of pivot selection.
enum Selection<V> {
	/// A pivot candidate, moving the basic variable of `row` onto `target`
	/// by adjusting the non-basic variable of `col`.
	Pivot {
		/// The tableau row of the violating basic variable.
		row: usize,
		/// The tableau column selected by Bland's rule.
		col: usize,
		/// The bound value the basic variable has to land on.
		target: V,
	},
	/// All variables satisfy their bounds.
	Satisfiable,
	/// Some row certifies infeasibility; the conflict clause is complete.
	Unsatisfiable,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
/// The phase selection heuristic applied when the host asks the propagator
/// to make a search decision.
pub enum SelectionHeuristic {
	/// Prefer the phase whose bounds would not immediately conflict with an
	/// active bound.
	Conflict,
	/// Prefer the phase whose bounds agree with the current assignment.
	Match,
	#[default]
	/// Leave the decision to the host.
	None,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
/// Solving statistics of one [`Solver`].
pub struct Statistics {
	/// The number of pivots performed.
	pivots: u64,
}

#[derive(Clone, Debug)]
/// A solver for finding an assignment satisfying a set of inequalities, or
/// a conflict clause showing that none exists under the active bounds.
pub struct Solver<V: Value> {
	/// The bound store; bounds are referenced by index from variables and
	/// the trail.
	bounds: IndexVec<BoundRef, Bound<V>>,
	/// The bounds installed under each host literal.
	bound_index: HashMap<Literal, Vec<BoundRef>>,
	/// Trail of replaced bound pointers, segmented by `trail_offsets`.
	bound_trail: Vec<BoundTrailEntry>,
	/// The conflict clause of the most recent failure.
	conflict_clause: Vec<Literal>,
	/// Queue of basic variables whose value violates a bound.
	conflicts: BinaryHeap<Reverse<VarRef>>,
	/// Mapping from input symbols to variables.
	indices: HashMap<Ustr, VarRef>,
	/// The number of basic variables (tableau rows).
	n_basic: usize,
	/// The number of non-basic variables (tableau columns).
	n_non_basic: usize,
	/// Whether to eagerly submit clauses between mutually exclusive bounds.
	propagate_conflicts: bool,
	/// Problem statistics.
	statistics: Statistics,
	/// The tableau of coefficients.
	tableau: Tableau,
	/// Trail of assignment changes `(previous level, variable, previous
	/// value)`, segmented by `trail_offsets`.
	value_trail: Vec<(u32, VarRef, V)>,
	/// The variable at each tableau position; columns `[0, n)` before rows
	/// `[n, n + m)`. Kept in sync with [`Variable::position`].
	var_at_pos: Vec<VarRef>,
	/// The state of all variables, indexed by [`VarRef`].
	variables: IndexVec<VarRef, Variable<V>>,
	/// Trail lengths at the start of each decision level.
	trail_offsets: Vec<TrailOffset>,
}

#[derive(Clone, Copy, Debug)]
/// The prefix lengths of both trails at the moment a decision level began.
struct TrailOffset {
	/// The decision level.
	level: u32,
	/// Length of the bound trail when the level began.
	bound: usize,
	/// Length of the value trail when the level began.
	value: usize,
}

#[derive(Clone, Debug)]
/// The current state of one arithmetic variable.
struct Variable<V> {
	/// All bounds installed on this variable, active or not.
	bounds: Vec<BoundRef>,
	/// The decision level at which the value was last modified.
	level: u32,
	/// The currently active tightest lower bound, if any.
	lower_bound: Option<BoundRef>,
	/// The tableau position: column `j` when non-basic, `n + i` for row `i`
	/// when basic.
	position: usize,
	/// Whether the variable is in the conflict queue.
	queued: bool,
	/// The currently active tightest upper bound, if any.
	upper_bound: Option<BoundRef>,
	/// The current assignment.
	value: V,
}

impl Statistics {
	/// The number of pivots performed so far.
	pub fn pivots(&self) -> u64 {
		self.pivots
	}

	/// Reset all statistics to zero.
	pub fn reset(&mut self) {
		*self = Self::default();
	}
}

impl<V: Value> Variable<V> {
	/// A fresh variable at value zero without bounds.
	fn new() -> Self {
		Self {
			bounds: Vec::new(),
			level: 0,
			lower_bound: None,
			position: 0,
			queued: false,
			upper_bound: None,
			value: V::zero(),
		}
	}
}

impl<V: Value> Solver<V> {
	/// Create an empty solver. The problem is installed with
	/// [`Self::prepare`].
	pub fn new(propagate_conflicts: bool) -> Self {
		Self {
			bounds: IndexVec::new(),
			bound_index: HashMap::new(),
			bound_trail: Vec::new(),
			conflict_clause: Vec::new(),
			conflicts: BinaryHeap::new(),
			indices: HashMap::new(),
			n_basic: 0,
			n_non_basic: 0,
			propagate_conflicts,
			statistics: Statistics::default(),
			tableau: Tableau::default(),
			value_trail: Vec::new(),
			var_at_pos: Vec::new(),
			variables: IndexVec::new(),
			trail_offsets: Vec::new(),
		}
	}

	/// Install the inequalities into the tableau and bound store.
	///
	/// Inequalities whose literal is already false are skipped. An
	/// inequality without variables either holds trivially or forces the
	/// negation of its literal as a unit clause. A single-term inequality
	/// becomes a bound on the (non-basic) variable itself, with the relation
	/// mirrored when the coefficient is negative. Everything else introduces
	/// an auxiliary basic variable holding the row.
	///
	/// Returns `Ok(false)` when an added clause made the problem trivially
	/// unsatisfiable.
	pub fn prepare(
		&mut self,
		init: &mut impl InitActions,
		inequalities: &[Inequality],
	) -> Result<bool, TheoryError> {
		let mut basic: Vec<VarRef> = Vec::new();

		for iq in inequalities {
			if init.is_false(iq.lit) {
				continue;
			}
			let row = self.add_row(iq);
			if row.is_empty() {
				// the inequality `0 rel rhs` is decided statically
				let zero = Rational::zero();
				let holds = match iq.rel {
					Relation::Less => zero < iq.rhs,
					Relation::LessEqual => zero <= iq.rhs,
					Relation::Greater => zero > iq.rhs,
					Relation::GreaterEqual => zero >= iq.rhs,
					Relation::Equal => zero == iq.rhs,
				};
				if !holds && !init.add_clause(&[!iq.lit]) {
					return Ok(false);
				}
			} else if row.len() == 1 {
				let (j, co) = &row[0];
				let var = self.var_at_pos[*j];
				let rel = if co.is_negative() { iq.rel.invert() } else { iq.rel };
				let value = V::bound_value(&iq.rhs / co, rel)
					.ok_or(TheoryError::StrictRelation(iq.rel))?;
				self.install_bound(var, iq.lit, value, BoundRelation::from_relation(rel));
			} else {
				let i = basic.len();
				let var = self.variables.push(Variable::new());
				basic.push(var);
				let value = V::bound_value(iq.rhs.clone(), iq.rel)
					.ok_or(TheoryError::StrictRelation(iq.rel))?;
				self.install_bound(var, iq.lit, value, BoundRelation::from_relation(iq.rel));
				for (j, co) in &row {
					self.tableau.set(i, *j, co);
				}
			}
		}

		// assign tableau rows to the auxiliary variables
		self.n_basic = basic.len();
		for (i, var) in basic.into_iter().enumerate() {
			self.variables[var].position = self.n_non_basic + i;
			self.var_at_pos.push(var);
		}

		for i in 0..self.n_basic {
			self.enqueue(i);
		}

		debug_assert!(self.check_tableau());
		debug_assert!(self.check_basic());
		debug_assert!(self.check_non_basic());

		Ok(true)
	}

	/// Activate the bounds attached to the newly true literals and repair
	/// the assignment. Returns `false` on infeasibility, in which case
	/// [`Self::reason`] holds the conflict clause.
	pub fn solve(&mut self, actions: &mut impl PropagationActions, changes: &[Literal]) -> bool {
		let level = actions.decision_level();

		if self.trail_offsets.last().map_or(true, |off| off.level < level) {
			self.trail_offsets.push(TrailOffset {
				level,
				bound: self.bound_trail.len(),
				value: self.value_trail.len(),
			});
		}

		for &lit in changes {
			let Some(brs) = self.bound_index.get(&lit).cloned() else {
				continue;
			};
			for br in brs {
				let var = self.bounds[br].variable;
				if !self.activate(actions, br) {
					self.bound_conflict(var);
					debug!(clause = ?self.conflict_clause, "conflicting bounds");
					return false;
				}
				if self.propagate_conflicts {
					self.propagate_bound_conflicts(actions, br);
				}
				let pos = self.variables[var].position;
				if pos < self.n_non_basic {
					// a non-basic variable is clamped onto the violated side
					let x = &self.variables[var];
					let target = if let Some(lb) =
						x.lower_bound.filter(|&lb| x.value < self.bounds[lb].value)
					{
						Some(self.bounds[lb].value.clone())
					} else if let Some(ub) =
						x.upper_bound.filter(|&ub| x.value > self.bounds[ub].value)
					{
						Some(self.bounds[ub].value.clone())
					} else {
						None
					};
					if let Some(target) = target {
						self.update_value(level, pos, target);
					}
				} else {
					self.enqueue(pos - self.n_non_basic);
				}
			}
		}

		debug_assert!(self.check_tableau());
		debug_assert!(self.check_basic());
		debug_assert!(self.check_non_basic());

		loop {
			match self.select() {
				Selection::Satisfiable => return true,
				Selection::Unsatisfiable => return false,
				Selection::Pivot { row, col, target } => self.pivot_step(level, row, col, target),
			}
		}
	}

	/// Rewind the trails to the state at the start of the current decision
	/// level, restoring the preceding satisfying assignment.
	pub fn undo(&mut self) {
		let Some(offset) = self.trail_offsets.pop() else {
			return;
		};

		for entry in self.bound_trail.drain(offset.bound..) {
			match entry {
				BoundTrailEntry::Lower(var, prev) => self.variables[var].lower_bound = prev,
				BoundTrailEntry::Upper(var, prev) => self.variables[var].upper_bound = prev,
				BoundTrailEntry::Equal(var, prev_lower, prev_upper) => {
					let x = &mut self.variables[var];
					x.lower_bound = prev_lower;
					x.upper_bound = prev_upper;
				}
			}
		}

		for (level, var, value) in self.value_trail.drain(offset.value..) {
			let x = &mut self.variables[var];
			x.level = level;
			x.value = value;
		}

		while let Some(Reverse(var)) = self.conflicts.pop() {
			self.variables[var].queued = false;
		}

		trace!(level = offset.level, "undo");
		debug_assert!(self.check_solution());
	}

	/// Adjust the phase of a decision literal according to the selection
	/// heuristic, returning the fallback when the heuristic does not apply.
	pub fn adjust(&self, heuristic: SelectionHeuristic, fallback: Literal) -> Literal {
		if matches!(heuristic, SelectionHeuristic::None) {
			return fallback;
		}
		for lit in [fallback, !fallback] {
			let Some(brs) = self.bound_index.get(&lit) else {
				continue;
			};
			if brs.is_empty() {
				continue;
			}
			let acceptable = brs.iter().all(|&br| {
				let bound = &self.bounds[br];
				match heuristic {
					SelectionHeuristic::Match => {
						bound.compare(&self.variables[bound.variable].value)
					}
					SelectionHeuristic::Conflict => !self.crosses_active(bound),
					SelectionHeuristic::None => unreachable!(),
				}
			});
			if acceptable {
				return lit;
			}
		}
		fallback
	}

	/// The conflict clause of the most recent failed [`Self::solve`] call.
	pub fn reason(&self) -> &[Literal] {
		&self.conflict_clause
	}

	/// The solving statistics.
	pub fn statistics(&self) -> &Statistics {
		&self.statistics
	}

	/// Look up the variable a symbol was mapped to, if any.
	pub fn lookup(&self, symbol: Ustr) -> Option<VarRef> {
		self.indices.get(&symbol).copied()
	}

	/// The current value of a variable.
	pub fn value(&self, var: VarRef) -> &V {
		&self.variables[var].value
	}

	/// Activate a bound, tightening the side(s) its relation indicates.
	/// Returns `false` when the variable's bounds now cross.
	fn activate(&mut self, actions: &impl PropagationActions, br: BoundRef) -> bool {
		let var = self.bounds[br].variable;
		match self.bounds[br].relation {
			BoundRelation::LessEqual => self.tighten_upper(actions, var, br),
			BoundRelation::GreaterEqual => self.tighten_lower(actions, var, br),
			BoundRelation::Equal => {
				// both sides tighten together; one trail record restores both
				let prev_lower = self.variables[var].lower_bound;
				let prev_upper = self.variables[var].upper_bound;
				let tightens_lower = self.tightens_lower(var, br);
				let tightens_upper = self.tightens_upper(var, br);
				let trail_lower = tightens_lower && self.needs_trail(actions, prev_lower);
				let trail_upper = tightens_upper && self.needs_trail(actions, prev_upper);
				match (trail_lower, trail_upper) {
					(true, true) => self
						.bound_trail
						.push(BoundTrailEntry::Equal(var, prev_lower, prev_upper)),
					(true, false) => self.bound_trail.push(BoundTrailEntry::Lower(var, prev_lower)),
					(false, true) => self.bound_trail.push(BoundTrailEntry::Upper(var, prev_upper)),
					(false, false) => {}
				}
				if tightens_lower {
					self.variables[var].lower_bound = Some(br);
				}
				if tightens_upper {
					self.variables[var].upper_bound = Some(br);
				}
				self.bounds_consistent(var)
			}
		}
	}

	/// Turn a row into tableau form, merging repeated variables and
	/// dropping zero coefficients. Creates non-basic variables for symbols
	/// not seen before.
	fn add_row(&mut self, iq: &Inequality) -> Vec<(usize, Rational)> {
		let mut order: Vec<Ustr> = Vec::new();
		let mut cos: HashMap<Ustr, Rational> = HashMap::new();
		for term in &iq.lhs {
			if term.co.is_zero() {
				continue;
			}
			match cos.entry(term.var) {
				Entry::Occupied(mut e) => {
					*e.get_mut() += &term.co;
					if e.get().is_zero() {
						let _ = e.remove();
					}
				}
				Entry::Vacant(e) => {
					let _ = e.insert(term.co.clone());
					order.push(term.var);
				}
			}
		}
		order
			.into_iter()
			.filter_map(|sym| {
				cos.remove(&sym)
					.map(|co| (self.add_non_basic(sym), co))
			})
			.collect()
	}

	/// The column of the non-basic variable for a symbol, creating the
	/// variable when the symbol is new.
	fn add_non_basic(&mut self, symbol: Ustr) -> usize {
		if let Some(&var) = self.indices.get(&symbol) {
			return self.variables[var].position;
		}
		let var = self.variables.push(Variable::new());
		let _ = self.indices.insert(symbol, var);
		let col = self.n_non_basic;
		self.variables[var].position = col;
		self.var_at_pos.push(var);
		self.n_non_basic += 1;
		col
	}

	/// Record and store the assignment of a variable.
	fn assign(
		variables: &mut IndexVec<VarRef, Variable<V>>,
		value_trail: &mut Vec<(u32, VarRef, V)>,
		level: u32,
		var: VarRef,
		value: V,
		add: bool,
	) {
		// the assignment on the previous level was satisfying; storing it
		// literally is what makes undo exact
		let x = &mut variables[var];
		if x.level != level {
			value_trail.push((x.level, var, x.value.clone()));
			x.level = level;
		}
		if add {
			x.value += &value;
		} else {
			x.value = value;
		}
	}

	/// Build the two-literal conflict clause for crossing bounds on `var`.
	fn bound_conflict(&mut self, var: VarRef) {
		self.conflict_clause.clear();
		let x = &self.variables[var];
		if let Some(ub) = x.upper_bound {
			self.conflict_clause.push(!self.bounds[ub].literal);
		}
		if let Some(lb) = x.lower_bound {
			self.conflict_clause.push(!self.bounds[lb].literal);
		}
	}

	/// Whether the active bounds of `var` admit at least one value.
	fn bounds_consistent(&self, var: VarRef) -> bool {
		let x = &self.variables[var];
		match (x.lower_bound, x.upper_bound) {
			(Some(lb), Some(ub)) => self.bounds[lb].value <= self.bounds[ub].value,
			_ => true,
		}
	}

	/// Whether a bound that is about to be activated crosses an active
	/// bound on the other side of its variable.
	fn crosses_active(&self, bound: &Bound<V>) -> bool {
		let x = &self.variables[bound.variable];
		let lower_crosses = || x.lower_bound.is_some_and(|lb| self.bounds[lb].value > bound.value);
		let upper_crosses = || x.upper_bound.is_some_and(|ub| self.bounds[ub].value < bound.value);
		match bound.relation {
			BoundRelation::LessEqual => lower_crosses(),
			BoundRelation::GreaterEqual => upper_crosses(),
			BoundRelation::Equal => lower_crosses() || upper_crosses(),
		}
	}

	/// Queue the basic variable of row `i` if its value violates a bound.
	fn enqueue(&mut self, i: usize) {
		debug_assert!(i < self.n_basic);
		let var = self.var_at_pos[self.n_non_basic + i];
		Self::enqueue_var(&mut self.conflicts, &mut self.variables, &self.bounds, var);
	}

	/// Queue a basic variable if its value violates a bound.
	fn enqueue_var(
		conflicts: &mut BinaryHeap<Reverse<VarRef>>,
		variables: &mut IndexVec<VarRef, Variable<V>>,
		bounds: &IndexVec<BoundRef, Bound<V>>,
		var: VarRef,
	) {
		if !variables[var].queued && Self::in_conflict(variables, bounds, var) {
			conflicts.push(Reverse(var));
			variables[var].queued = true;
		}
	}

	/// Whether the value of `var` violates one of its active bounds.
	fn in_conflict(
		variables: &IndexVec<VarRef, Variable<V>>,
		bounds: &IndexVec<BoundRef, Bound<V>>,
		var: VarRef,
	) -> bool {
		let x = &variables[var];
		x.lower_bound.is_some_and(|lb| x.value < bounds[lb].value)
			|| x.upper_bound.is_some_and(|ub| x.value > bounds[ub].value)
	}

	/// Store a new bound and index it under its literal and variable.
	fn install_bound(&mut self, var: VarRef, lit: Literal, value: V, relation: BoundRelation) {
		let br = self.bounds.push(Bound {
			value,
			variable: var,
			literal: lit,
			relation,
		});
		self.bound_index.entry(lit).or_default().push(br);
		self.variables[var].bounds.push(br);
	}

	/// Whether replacing `prev` needs a trail record: only when the
	/// previous bound was not itself installed at the current level.
	fn needs_trail(&self, actions: &impl PropagationActions, prev: Option<BoundRef>) -> bool {
		match prev {
			None => true,
			Some(pb) => {
				actions.literal_level(self.bounds[pb].literal) < actions.decision_level()
			}
		}
	}

	/// Swap the basic variable of `row` against the non-basic variable of
	/// `col`, landing the basic variable exactly on `target`.
	fn pivot_step(&mut self, level: u32, row: usize, col: usize, target: V) {
		let a_ij = self.tableau.get(row, col);
		debug_assert!(!a_ij.is_zero());
		let var_i = self.var_at_pos[self.n_non_basic + row];
		let var_j = self.var_at_pos[col];

		// adjust the assignment along column j
		let delta = (target.clone() - &self.variables[var_i].value).div_rational(&a_ij);
		Self::assign(
			&mut self.variables,
			&mut self.value_trail,
			level,
			var_i,
			target,
			false,
		);
		Self::assign(
			&mut self.variables,
			&mut self.value_trail,
			level,
			var_j,
			delta.clone(),
			true,
		);
		self.tableau.update_col(col, |k, num, den| {
			if k != row {
				let var_k = self.var_at_pos[self.n_non_basic + k];
				let coeff = Rational::new(num.clone(), den.clone());
				Self::assign(
					&mut self.variables,
					&mut self.value_trail,
					level,
					var_k,
					delta.mul_rational(&coeff),
					true,
				);
				Self::enqueue_var(&mut self.conflicts, &mut self.variables, &self.bounds, var_k);
			}
		});

		// swap the roles of x_i and x_j
		self.var_at_pos.swap(col, self.n_non_basic + row);
		self.variables[var_i].position = col;
		self.variables[var_j].position = self.n_non_basic + row;
		self.enqueue(row);

		// invert the tableau
		self.tableau.pivot(row, col);
		self.statistics.pivots += 1;
		trace!(row, col, pivots = self.statistics.pivots, "pivot");

		debug_assert!(self.check_tableau());
		debug_assert!(self.check_non_basic());
	}

	/// Eagerly submit binary clauses between the just activated bound and
	/// mutually exclusive sibling bounds on the same variable.
	fn propagate_bound_conflicts(
		&mut self,
		actions: &mut impl PropagationActions,
		br: BoundRef,
	) {
		let var = self.bounds[br].variable;
		for other in self.variables[var].bounds.clone() {
			if other == br {
				continue;
			}
			let bound = &self.bounds[br];
			let sibling = &self.bounds[other];
			if bound.literal != sibling.literal
				&& bound.conflicts(sibling)
				&& actions.truth_value(sibling.literal).is_none()
			{
				let clause = [!bound.literal, !sibling.literal];
				trace!(clause = ?clause, "bound conflict clause");
				if !actions.add_clause(&clause) {
					return;
				}
			}
		}
	}

	/// Select the next pivot by Bland's rule: the queued basic variable
	/// with the smallest index, and within its row the non-basic variable
	/// with the smallest index that still has room to move in the required
	/// direction. When no column qualifies the row certifies
	/// infeasibility.
	fn select(&mut self) -> Selection<V> {
		while let Some(Reverse(var)) = self.conflicts.pop() {
			self.variables[var].queued = false;
			let pos = self.variables[var].position;
			if pos < self.n_non_basic {
				// the queue may still hold variables that became non-basic
				continue;
			}
			let row = pos - self.n_non_basic;

			let x = &self.variables[var];
			if let Some(lb) = x.lower_bound.filter(|&lb| x.value < self.bounds[lb].value) {
				self.conflict_clause.clear();
				self.conflict_clause.push(!self.bounds[lb].literal);
				let target = self.bounds[lb].value.clone();
				if let Some(col) = self.select_column(row, false) {
					return Selection::Pivot { row, col, target };
				}
				debug!(clause = ?self.conflict_clause, "infeasible row");
				return Selection::Unsatisfiable;
			}
			let x = &self.variables[var];
			if let Some(ub) = x.upper_bound.filter(|&ub| x.value > self.bounds[ub].value) {
				self.conflict_clause.clear();
				self.conflict_clause.push(!self.bounds[ub].literal);
				let target = self.bounds[ub].value.clone();
				if let Some(col) = self.select_column(row, true) {
					return Selection::Pivot { row, col, target };
				}
				debug!(clause = ?self.conflict_clause, "infeasible row");
				return Selection::Unsatisfiable;
			}
		}

		debug_assert!(self.check_solution());
		Selection::Satisfiable
	}

	/// Scan `row` for the pivot column by Bland's rule. `decrease` tells
	/// whether the basic variable has to decrease (it violates its upper
	/// bound) or increase. Blocking bound literals of scanned variables are
	/// appended to the conflict clause, completing it in case no column
	/// qualifies.
	fn select_column(&mut self, row: usize, decrease: bool) -> Option<usize> {
		let mut best: Option<(VarRef, usize)> = None;
		let Self {
			tableau,
			variables,
			bounds,
			var_at_pos,
			conflict_clause,
			..
		} = self;
		tableau.update_row(row, |j, num, _| {
			let var = var_at_pos[j];
			// den_i > 0, so the direction is decided by the numerator
			let up = if decrease { num.is_negative() } else { num.is_positive() };
			if best.map_or(true, |(b, _)| var < b)
				&& Self::room_to_move(variables, bounds, conflict_clause, var, up)
			{
				best = Some((var, j));
			}
		});
		best.map(|(_, col)| col)
	}

	/// Whether the non-basic variable `var` can move in the given
	/// direction; appends the literal of the blocking bound otherwise.
	fn room_to_move(
		variables: &IndexVec<VarRef, Variable<V>>,
		bounds: &IndexVec<BoundRef, Bound<V>>,
		clause: &mut Vec<Literal>,
		var: VarRef,
		up: bool,
	) -> bool {
		let x = &variables[var];
		if up {
			match x.upper_bound {
				Some(ub) if x.value >= bounds[ub].value => {
					clause.push(!bounds[ub].literal);
					false
				}
				_ => true,
			}
		} else {
			match x.lower_bound {
				Some(lb) if x.value <= bounds[lb].value => {
					clause.push(!bounds[lb].literal);
					false
				}
				_ => true,
			}
		}
	}

	/// Record and store the assignment of a variable, see [`Self::assign`].
	fn set_value(&mut self, level: u32, var: VarRef, value: V, add: bool) {
		Self::assign(
			&mut self.variables,
			&mut self.value_trail,
			level,
			var,
			value,
			add,
		);
	}

	/// Tighten the lower bound of `var` with `br` if it is stricter, and
	/// report whether the bounds still admit a value.
	fn tighten_lower(
		&mut self,
		actions: &impl PropagationActions,
		var: VarRef,
		br: BoundRef,
	) -> bool {
		if self.tightens_lower(var, br) {
			let prev = self.variables[var].lower_bound;
			if self.needs_trail(actions, prev) {
				self.bound_trail.push(BoundTrailEntry::Lower(var, prev));
			}
			self.variables[var].lower_bound = Some(br);
		}
		self.bounds_consistent(var)
	}

	/// Tighten the upper bound of `var` with `br` if it is stricter, and
	/// report whether the bounds still admit a value.
	fn tighten_upper(
		&mut self,
		actions: &impl PropagationActions,
		var: VarRef,
		br: BoundRef,
	) -> bool {
		if self.tightens_upper(var, br) {
			let prev = self.variables[var].upper_bound;
			if self.needs_trail(actions, prev) {
				self.bound_trail.push(BoundTrailEntry::Upper(var, prev));
			}
			self.variables[var].upper_bound = Some(br);
		}
		self.bounds_consistent(var)
	}

	/// Whether `br` is strictly tighter than the active lower bound.
	fn tightens_lower(&self, var: VarRef, br: BoundRef) -> bool {
		match self.variables[var].lower_bound {
			None => true,
			Some(lb) => self.bounds[br].value > self.bounds[lb].value,
		}
	}

	/// Whether `br` is strictly tighter than the active upper bound.
	fn tightens_upper(&self, var: VarRef, br: BoundRef) -> bool {
		match self.variables[var].upper_bound {
			None => true,
			Some(ub) => self.bounds[br].value < self.bounds[ub].value,
		}
	}

	/// Move the non-basic variable of column `j` to `target`, adjusting all
	/// basic variables along the column and queueing the ones that now
	/// violate a bound.
	fn update_value(&mut self, level: u32, j: usize, target: V) {
		let var_j = self.var_at_pos[j];
		let delta = target.clone() - &self.variables[var_j].value;
		self.tableau.update_col(j, |i, num, den| {
			let var_i = self.var_at_pos[self.n_non_basic + i];
			let coeff = Rational::new(num.clone(), den.clone());
			Self::assign(
				&mut self.variables,
				&mut self.value_trail,
				level,
				var_i,
				delta.mul_rational(&coeff),
				true,
			);
			Self::enqueue_var(&mut self.conflicts, &mut self.variables, &self.bounds, var_i);
		});
		self.set_value(level, var_j, target, false);
	}

	/// Check that every basic variable equals its row combination of the
	/// non-basic values.
	pub(crate) fn check_tableau(&mut self) -> bool {
		for i in 0..self.n_basic {
			let basic = self.var_at_pos[self.n_non_basic + i];
			let mut sum = V::zero();
			let Self {
				tableau,
				variables,
				var_at_pos,
				..
			} = &mut *self;
			tableau.update_row(i, |j, num, den| {
				let coeff = Rational::new(num.clone(), den.clone());
				sum += &variables[var_at_pos[j]].value.mul_rational(&coeff);
			});
			if sum != self.variables[basic].value {
				return false;
			}
		}
		true
	}

	/// Check that basic variables with violated bounds are queued.
	pub(crate) fn check_basic(&self) -> bool {
		(0..self.n_basic).all(|i| {
			let var = self.var_at_pos[self.n_non_basic + i];
			!Self::in_conflict(&self.variables, &self.bounds, var) || self.variables[var].queued
		})
	}

	/// Check that all non-basic variables satisfy their bounds.
	pub(crate) fn check_non_basic(&self) -> bool {
		(0..self.n_non_basic).all(|j| {
			!Self::in_conflict(&self.variables, &self.bounds, self.var_at_pos[j])
		})
	}

	/// Check that the current assignment satisfies all bounds and the
	/// tableau equations.
	pub(crate) fn check_solution(&mut self) -> bool {
		let bounded = (0..self.variables.len())
			.map(VarRef::new)
			.all(|var| !Self::in_conflict(&self.variables, &self.bounds, var));
		bounded && self.check_tableau() && self.check_basic()
	}
}
