//! Shared test harness: a scripted stand-in for the host Boolean solver,
//! builders for inequalities, and the end-to-end solving scenarios.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use ustr::ustr;

use crate::{
	actions::{InitActions, ModelActions, ModelSymbol, PropagationActions, StatisticsActions},
	math::{Rational, Value},
	problem::{Inequality, Relation, Term},
	solver::Solver,
	Literal,
};

#[derive(Debug)]
/// A scripted host solver: records clauses and watches, and answers
/// assignment queries from a table of literal levels.
pub(crate) struct TestHost {
	/// All clauses the propagator submitted.
	pub(crate) clauses: Vec<Vec<Literal>>,
	/// Literals that are false at initialization.
	pub(crate) false_lits: HashSet<Literal>,
	/// The current decision level.
	pub(crate) level: u32,
	/// The level each (true) literal was assigned at.
	pub(crate) levels: HashMap<Literal, u32>,
	/// Whether the propagator requested checks on partial assignments.
	pub(crate) partial_check: bool,
	/// The number of worker threads reported to the propagator.
	pub(crate) threads: usize,
	/// All watches the propagator added.
	pub(crate) watches: Vec<Literal>,
}

impl TestHost {
	/// A single threaded host with an empty assignment.
	pub(crate) fn new() -> Self {
		Self {
			clauses: Vec::new(),
			false_lits: HashSet::new(),
			level: 0,
			levels: HashMap::new(),
			partial_check: false,
			threads: 1,
			watches: Vec::new(),
		}
	}

	/// Assign a literal true at the given level.
	pub(crate) fn assign(&mut self, lit: Literal, level: u32) {
		let _ = self.levels.insert(lit, level);
	}

	/// Enter a decision level, assigning all literals true at it.
	pub(crate) fn enter_level(&mut self, level: u32, lits: &[Literal]) {
		self.level = level;
		for &lit in lits {
			self.assign(lit, level);
		}
	}
}

impl InitActions for TestHost {
	fn add_clause(&mut self, clause: &[Literal]) -> bool {
		self.clauses.push(clause.to_vec());
		true
	}

	fn add_watch(&mut self, lit: Literal) {
		self.watches.push(lit);
	}

	fn is_false(&self, lit: Literal) -> bool {
		self.false_lits.contains(&lit)
	}

	fn number_of_threads(&self) -> usize {
		self.threads
	}

	fn request_partial_check(&mut self) {
		self.partial_check = true;
	}
}

impl PropagationActions for TestHost {
	fn add_clause(&mut self, clause: &[Literal]) -> bool {
		self.clauses.push(clause.to_vec());
		true
	}

	fn decision_level(&self) -> u32 {
		self.level
	}

	fn literal_level(&self, lit: Literal) -> u32 {
		self.levels.get(&lit).copied().unwrap_or(0)
	}

	fn thread_id(&self) -> usize {
		0
	}

	fn truth_value(&self, lit: Literal) -> Option<bool> {
		if self.levels.contains_key(&lit) {
			Some(true)
		} else if self.levels.contains_key(&!lit) {
			Some(false)
		} else {
			None
		}
	}
}

#[derive(Debug, Default)]
/// A model sink collecting extended symbols.
pub(crate) struct TestModel {
	/// The symbols the propagator injected.
	pub(crate) symbols: Vec<ModelSymbol>,
}

impl ModelActions for TestModel {
	fn extend(&mut self, symbols: Vec<ModelSymbol>) {
		self.symbols.extend(symbols);
	}

	fn thread_id(&self) -> usize {
		0
	}
}

#[derive(Debug, Default)]
/// A statistics sink backed by a path map.
pub(crate) struct TestStatistics {
	/// The entries written so far.
	pub(crate) entries: HashMap<Vec<String>, f64>,
}

impl StatisticsActions for TestStatistics {
	fn set_value(&mut self, path: &[&str], value: f64) {
		let _ = self
			.entries
			.insert(path.iter().map(|s| (*s).to_owned()).collect(), value);
	}

	fn value(&self, path: &[&str]) -> f64 {
		let path: Vec<String> = path.iter().map(|s| (*s).to_owned()).collect();
		self.entries.get(&path).copied().unwrap_or(0.0)
	}
}

/// Build an inequality from integer coefficients.
pub(crate) fn iq(lhs: &[(i64, &str)], rel: Relation, rhs: i64, lit_code: i32) -> Inequality {
	Inequality {
		lhs: lhs
			.iter()
			.map(|&(co, var)| Term {
				co: Rational::from_integer(co.into()),
				var: ustr(var),
			})
			.collect(),
		rhs: Rational::from_integer(rhs.into()),
		rel,
		lit: lit(lit_code),
	}
}

/// Build a literal from its integer code.
pub(crate) fn lit(code: i32) -> Literal {
	Literal::new(code).unwrap()
}

/// The distinct literals of a list of inequalities, in order of appearance.
pub(crate) fn lits(iqs: &[Inequality]) -> Vec<Literal> {
	iqs.iter().map(|iq| iq.lit).unique().collect()
}

/// Prepare the inequalities, assert all their literals at level one, and
/// solve. Returns the verdict together with solver and host for inspection.
pub(crate) fn run_with<V: Value>(iqs: &[Inequality]) -> (bool, Solver<V>, TestHost) {
	let mut host = TestHost::new();
	let mut solver = Solver::<V>::new(false);
	assert!(solver.prepare(&mut host, iqs).unwrap());
	let lits = lits(iqs);
	host.enter_level(1, &lits);
	let sat = solver.solve(&mut host, &lits);
	(sat, solver, host)
}

/// Evaluate all inequalities under the solver's current assignment.
pub(crate) fn satisfies<V: Value>(solver: &Solver<V>, iqs: &[Inequality]) -> bool {
	iqs.iter().all(|iq| {
		let mut sum = V::zero();
		for term in &iq.lhs {
			let var = solver.lookup(term.var).expect("variable is known");
			sum += &solver.value(var).mul_rational(&term.co);
		}
		let rhs = V::bound_value(iq.rhs.clone(), Relation::Equal).expect("non-strict value");
		match iq.rel {
			Relation::LessEqual => sum <= rhs,
			Relation::GreaterEqual => sum >= rhs,
			Relation::Equal => sum == rhs,
			Relation::Less => sum < rhs,
			Relation::Greater => sum > rhs,
		}
	})
}

mod solving {
	use tracing_test::traced_test;

	use crate::{
		math::{ExtendedRational, Rational},
		problem::Relation,
		propagator::Propagator,
		solver::SelectionHeuristic,
		tests::{iq, lits, run_with, satisfies, TestHost},
		Inequality,
	};

	/// Solve over plain rationals.
	fn run(iqs: &[Inequality]) -> bool {
		let (sat, solver, _) = run_with::<Rational>(iqs);
		if sat {
			assert!(satisfies(&solver, iqs));
		}
		sat
	}

	/// Solve over extended rationals.
	fn run_q(iqs: &[Inequality]) -> bool {
		let (sat, solver, _) = run_with::<ExtendedRational>(iqs);
		if sat {
			assert!(satisfies(&solver, iqs));
		}
		sat
	}

	/// Run a sequence of solving steps, all literals being facts, and count
	/// the satisfiable steps.
	fn run_m(steps: &[Vec<Inequality>]) -> usize {
		let mut prop = Propagator::<Rational>::new(SelectionHeuristic::None, false);
		let mut host = TestHost::new();
		let mut models = 0;
		for step in steps {
			prop.init(&mut host, step.clone()).unwrap();
			let before = host.clauses.len();
			prop.check(&mut host);
			let step_lits = lits(step);
			host.enter_level(0, &step_lits);
			prop.propagate(&mut host, &step_lits);
			if host.clauses.len() == before {
				models += 1;
			}
		}
		models
	}

	#[test]
	#[traced_test]
	fn test_solve_non_strict() {
		assert!(run(&[
			iq(&[(1, "x1"), (1, "x2")], Relation::LessEqual, 20, 1),
			iq(&[(1, "x1"), (1, "x3")], Relation::Equal, 5, 2),
			iq(&[(1, "x2"), (1, "x3")], Relation::GreaterEqual, 10, 3),
		]));

		assert!(!run(&[
			iq(&[(1, "x")], Relation::GreaterEqual, 2, 1),
			iq(&[(1, "x")], Relation::LessEqual, 0, 2),
		]));

		assert!(!run(&[
			iq(&[(-1, "x")], Relation::LessEqual, -2, 1),
			iq(&[(1, "x")], Relation::LessEqual, 0, 2),
		]));

		assert!(!run(&[
			iq(&[(4, "x")], Relation::LessEqual, 4, 1),
			iq(&[(1, "x")], Relation::GreaterEqual, 2, 2),
		]));

		assert!(!run(&[
			iq(&[(1, "x"), (1, "y")], Relation::GreaterEqual, 2, 1),
			iq(&[(1, "x"), (1, "y")], Relation::LessEqual, 0, 2),
			iq(&[(1, "y")], Relation::Equal, 0, 3),
		]));

		assert!(run(&[
			iq(&[(1, "x"), (1, "y")], Relation::GreaterEqual, 2, 1),
			iq(&[(2, "x"), (-1, "y")], Relation::GreaterEqual, 0, 2),
			iq(&[(-1, "x"), (2, "y")], Relation::GreaterEqual, 1, 3),
		]));
	}

	#[test]
	#[traced_test]
	fn test_solve_strict() {
		assert!(run_q(&[
			iq(&[(1, "x1"), (1, "x2")], Relation::Less, 20, 1),
			iq(&[(1, "x1"), (1, "x3")], Relation::Equal, 5, 2),
			iq(&[(1, "x2"), (1, "x3")], Relation::Greater, 10, 3),
		]));

		assert!(!run_q(&[
			iq(&[(1, "x")], Relation::Greater, 2, 1),
			iq(&[(1, "x")], Relation::Less, 0, 2),
		]));

		assert!(!run_q(&[
			iq(&[(-1, "x")], Relation::Less, -2, 1),
			iq(&[(1, "x")], Relation::Less, 0, 2),
		]));

		assert!(!run_q(&[
			iq(&[(4, "x")], Relation::Less, 4, 1),
			iq(&[(1, "x")], Relation::Greater, 2, 2),
		]));

		assert!(run_q(&[
			iq(&[(1, "x"), (1, "y")], Relation::Greater, 2, 1),
			iq(&[(2, "x"), (-1, "y")], Relation::Greater, 0, 2),
			iq(&[(-1, "x"), (2, "y")], Relation::Greater, 1, 3),
		]));

		// a cycle of strict differences has no rational solution
		assert!(!run_q(&[
			iq(&[(1, "x"), (-1, "y")], Relation::Greater, 0, 1),
			iq(&[(1, "y"), (-1, "z")], Relation::Greater, 0, 2),
			iq(&[(1, "z"), (-1, "x")], Relation::Greater, 0, 3),
		]));
	}

	#[test]
	#[traced_test]
	fn test_solve_multi_shot() {
		let steps = vec![
			vec![
				iq(&[(1, "x1"), (1, "x2")], Relation::LessEqual, 20, 1),
				iq(&[(1, "x1"), (1, "x2")], Relation::GreaterEqual, 10, 1),
			],
			vec![
				iq(&[(1, "x1")], Relation::GreaterEqual, 30, 2),
				iq(&[(1, "x3")], Relation::GreaterEqual, 1, 3),
			],
			vec![iq(&[(1, "x2")], Relation::GreaterEqual, 10, 4)],
		];
		assert_eq!(run_m(&steps), 2);
	}
}
