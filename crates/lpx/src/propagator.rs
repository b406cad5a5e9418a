//! The theory propagator façade, dispatching host callbacks to one simplex
//! [`Solver`] per worker thread.
//!
//! The façade owns the immutable list of parsed inequalities and the symbol
//! table; each worker thread gets its own solver with its own tableau,
//! bounds, and trails, so no locking is needed. Facts (literals assigned at
//! decision level zero) are recorded so that solvers created by a later
//! solving step can replay them through the check callback.

use std::collections::HashMap;

use itertools::Itertools;
use tracing::debug;
use ustr::Ustr;

use crate::{
	actions::{InitActions, ModelActions, ModelSymbol, PropagationActions},
	math::Value,
	problem::Inequality,
	solver::{SelectionHeuristic, Solver},
	theory::TheoryError,
	Literal,
};

#[derive(Clone, Debug)]
/// A theory propagator over the value domain `V`, holding one simplex
/// solver per worker thread.
pub struct Propagator<V: Value> {
	/// Facts assigned at decision level zero, for replay in later solving
	/// steps.
	facts: Vec<Literal>,
	/// The number of facts recorded before the current solving step.
	facts_offset: usize,
	/// The phase selection heuristic for decide callbacks.
	heuristic: SelectionHeuristic,
	/// The accumulated list of parsed inequalities.
	inequalities: Vec<Inequality>,
	/// Whether solvers eagerly submit clauses between conflicting bounds.
	propagate_conflicts: bool,
	/// Per thread: the number of facts already replayed, and the solver.
	solvers: Vec<(usize, Solver<V>)>,
	/// Mapping from variable symbols to their index in `var_vec`.
	var_map: HashMap<Ustr, usize>,
	/// All variable symbols, sorted.
	var_vec: Vec<Ustr>,
}

impl<V: Value> Propagator<V> {
	/// Create a propagator with the given configuration.
	pub fn new(heuristic: SelectionHeuristic, propagate_conflicts: bool) -> Self {
		Self {
			facts: Vec::new(),
			facts_offset: 0,
			heuristic,
			inequalities: Vec::new(),
			propagate_conflicts,
			solvers: Vec::new(),
			var_map: HashMap::new(),
			var_vec: Vec::new(),
		}
	}

	/// Initialize the propagator for a (new) solving step.
	///
	/// The inequalities extend the ones from previous steps; solvers are
	/// recreated from scratch and facts from previous steps are replayed
	/// lazily through [`Self::check`]. Watches are added for all bound
	/// literals.
	pub fn init(
		&mut self,
		init: &mut impl InitActions,
		inequalities: Vec<Inequality>,
	) -> Result<(), TheoryError> {
		self.facts_offset = self.facts.len();
		if self.facts_offset > 0 {
			init.request_partial_check();
		}

		self.inequalities.extend(inequalities);
		self.var_vec = self
			.inequalities
			.iter()
			.flat_map(|iq| iq.lhs.iter().map(|term| term.var))
			.unique()
			.sorted()
			.collect();
		self.var_map = self
			.var_vec
			.iter()
			.enumerate()
			.map(|(index, &sym)| (sym, index))
			.collect();

		for iq in &self.inequalities {
			init.add_watch(iq.lit);
		}

		self.solvers.clear();
		for _ in 0..init.number_of_threads() {
			let mut solver = Solver::new(self.propagate_conflicts);
			let complete = solver.prepare(init, &self.inequalities)?;
			self.solvers.push((0, solver));
			if !complete {
				// the problem is trivially unsatisfiable
				return Ok(());
			}
		}
		debug!(
			inequalities = self.inequalities.len(),
			variables = self.var_vec.len(),
			threads = self.solvers.len(),
			"theory initialized"
		);
		Ok(())
	}

	/// Activate the bounds of newly true literals and run the simplex
	/// engine, submitting a conflict clause to the host on infeasibility.
	pub fn propagate(&mut self, actions: &mut impl PropagationActions, changes: &[Literal]) {
		if actions.decision_level() == 0 && actions.thread_id() == 0 {
			self.facts.extend_from_slice(changes);
		}
		let (_, solver) = &mut self.solvers[actions.thread_id()];
		if !solver.solve(actions, changes) {
			let clause = solver.reason().to_vec();
			let _ = actions.add_clause(&clause);
		}
	}

	/// Replay facts accumulated before the current solving step, for
	/// solvers that have not seen them through [`Self::propagate`].
	pub fn check(&mut self, actions: &mut impl PropagationActions) {
		if actions.decision_level() != 0 {
			return;
		}
		let facts_offset = self.facts_offset;
		let (offset, solver) = &mut self.solvers[actions.thread_id()];
		if *offset < facts_offset {
			let lits = self.facts[*offset..facts_offset].to_vec();
			*offset = facts_offset;
			if !solver.solve(actions, &lits) {
				let clause = solver.reason().to_vec();
				let _ = actions.add_clause(&clause);
			}
		}
	}

	/// Rewind the outgoing decision level of a worker thread.
	pub fn undo(&mut self, thread_id: usize) {
		if let Some((_, solver)) = self.solvers.get_mut(thread_id) {
			solver.undo();
		}
	}

	/// Adjust the phase of a decision literal according to the configured
	/// heuristic; returns the fallback when the heuristic does not apply.
	pub fn decide(&self, thread_id: usize, fallback: Literal) -> Literal {
		self.solvers
			.get(thread_id)
			.map_or(fallback, |(_, solver)| solver.adjust(self.heuristic, fallback))
	}

	/// Extend a model with the arithmetic assignment of the thread that
	/// found it.
	pub fn on_model(&self, model: &mut impl ModelActions) {
		let thread_id = model.thread_id();
		let mut symbols = Vec::new();
		let mut next = self.next_value(thread_id, 0);
		while let Some(index) = next {
			if let Some(value) = self.value_text(thread_id, index) {
				symbols.push(ModelSymbol {
					variable: self.var_vec[index],
					value,
				});
			}
			next = self.next_value(thread_id, index + 1);
		}
		model.extend(symbols);
	}

	/// The symbol at an index of the symbol table.
	pub fn get_symbol(&self, index: usize) -> Ustr {
		self.var_vec[index]
	}

	/// The value of the symbol at `index` in the assignment of a worker
	/// thread, `None` when the thread never saw the variable.
	pub fn get_value(&self, thread_id: usize, index: usize) -> Option<V> {
		let &sym = self.var_vec.get(index)?;
		let (_, solver) = self.solvers.get(thread_id)?;
		solver.lookup(sym).map(|var| solver.value(var).clone())
	}

	/// Whether the symbol at `index` has a value in the assignment of a
	/// worker thread.
	pub fn has_value(&self, thread_id: usize, index: usize) -> bool {
		self.var_vec.get(index).is_some_and(|&sym| {
			self.solvers
				.get(thread_id)
				.is_some_and(|(_, solver)| solver.lookup(sym).is_some())
		})
	}

	/// Look up the symbol table index of a symbol.
	pub fn lookup_symbol(&self, symbol: Ustr) -> Option<usize> {
		self.var_map.get(&symbol).copied()
	}

	/// The first index at or after `start` that has a value in the
	/// assignment of a worker thread.
	pub fn next_value(&self, thread_id: usize, start: usize) -> Option<usize> {
		(start..self.var_vec.len()).find(|&index| self.has_value(thread_id, index))
	}

	/// The size of the symbol table.
	pub fn n_values(&self) -> usize {
		self.var_vec.len()
	}

	/// The total number of pivots performed across all worker solvers.
	pub fn pivots(&self) -> u64 {
		self.solvers
			.iter()
			.map(|(_, solver)| solver.statistics().pivots())
			.sum()
	}

	/// The value of the symbol at `index` rendered as a string.
	pub(crate) fn value_text(&self, thread_id: usize, index: usize) -> Option<String> {
		self.get_value(thread_id, index).map(|value| value.to_string())
	}
}

#[cfg(test)]
mod tests {
	use expect_test::expect;
	use itertools::Itertools;
	use ustr::ustr;

	use crate::{
		math::Rational,
		problem::Relation,
		propagator::Propagator,
		solver::SelectionHeuristic,
		tests::{iq, lit, lits, TestHost, TestModel},
	};

	/// A propagator over a fixed assignment with all literals true.
	fn fixed_point() -> (Propagator<Rational>, TestHost) {
		let iqs = vec![
			iq(&[(1, "x")], Relation::GreaterEqual, 5, 1),
			iq(&[(1, "y")], Relation::LessEqual, 3, 2),
			iq(&[(1, "y")], Relation::GreaterEqual, 3, 3),
		];
		let mut host = TestHost::new();
		let mut prop = Propagator::<Rational>::new(SelectionHeuristic::None, false);
		prop.init(&mut host, iqs.clone()).unwrap();
		let step_lits = lits(&iqs);
		host.enter_level(1, &step_lits);
		prop.propagate(&mut host, &step_lits);
		assert!(host.clauses.is_empty());
		(prop, host)
	}

	#[test]
	fn test_init_watches() {
		let iqs = vec![
			iq(&[(1, "x"), (1, "y")], Relation::LessEqual, 2, 1),
			iq(&[(1, "x")], Relation::GreaterEqual, 0, 2),
		];
		let mut host = TestHost::new();
		host.threads = 2;
		let mut prop = Propagator::<Rational>::new(SelectionHeuristic::None, false);
		prop.init(&mut host, iqs).unwrap();
		assert_eq!(host.watches, vec![lit(1), lit(2)]);
		assert!(!host.partial_check);
		assert_eq!(prop.n_values(), 2);
		assert_eq!(prop.lookup_symbol(ustr("x")), Some(0));
		assert_eq!(prop.get_symbol(1), ustr("y"));
	}

	#[test]
	fn test_fact_replay_requests_partial_check() {
		let mut host = TestHost::new();
		let mut prop = Propagator::<Rational>::new(SelectionHeuristic::None, false);
		prop.init(&mut host, vec![iq(&[(1, "x")], Relation::GreaterEqual, 1, 1)])
			.unwrap();
		host.enter_level(0, &[lit(1)]);
		prop.propagate(&mut host, &[lit(1)]);
		assert!(host.clauses.is_empty());

		// the next solving step replays the recorded fact through check
		prop.init(&mut host, vec![iq(&[(1, "x")], Relation::LessEqual, 0, 2)])
			.unwrap();
		assert!(host.partial_check);
		prop.check(&mut host);
		assert!(host.clauses.is_empty());
		host.enter_level(0, &[lit(2)]);
		prop.propagate(&mut host, &[lit(2)]);
		// x >= 1 from the replayed fact conflicts with x <= 0
		assert_eq!(host.clauses.len(), 1);
	}

	#[test]
	fn test_on_model() {
		let (prop, _) = fixed_point();
		let mut model = TestModel::default();
		prop.on_model(&mut model);
		expect![[r#"__lpx(x,"5") __lpx(y,"3")"#]]
			.assert_eq(&model.symbols.iter().map(ToString::to_string).join(" "));
	}

	#[test]
	fn test_value_iteration() {
		let (prop, _) = fixed_point();
		assert_eq!(prop.n_values(), 2);
		assert_eq!(prop.next_value(0, 0), Some(0));
		assert_eq!(prop.next_value(0, 1), Some(1));
		assert_eq!(prop.next_value(0, 2), None);
		assert!(prop.has_value(0, 0));
		assert!(!prop.has_value(0, 7));
		assert_eq!(prop.get_value(0, 0), Some(Rational::from_integer(5.into())));
		assert_eq!(prop.decide(0, lit(9)), lit(9));
	}
}
