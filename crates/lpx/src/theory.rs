//! Configuration and lifecycle of the theory.
//!
//! A [`Theory`] is the opaque handle a host embeds: it is configured with
//! string key/value pairs, registered (which fixes the value domain based on
//! the `strict` flag), and then drives one of the two [`Propagator`]
//! instantiations through the host callbacks.

use delegate::delegate;
use thiserror::Error;
use ustr::Ustr;

use crate::{
	actions::{InitActions, ModelActions, PropagationActions, StatisticsActions},
	math::{ExtendedRational, Rational},
	problem::{Inequality, Relation},
	propagator::Propagator,
	solver::SelectionHeuristic,
	Literal,
};

/// The statistics path under which the pivot count is published.
const PIVOTS_PATH: &[&str] = &["Simplex", "Pivots"];

#[derive(Debug, Default)]
/// The opaque theory handle: configuration plus, once registered, the
/// propagator over the configured value domain.
pub struct Theory {
	/// Whether clauses between mutually exclusive bounds are submitted
	/// eagerly.
	propagate_conflicts: bool,
	/// The registered propagator, if any.
	prop: Option<TheoryPropagator>,
	/// The phase selection heuristic for decide callbacks.
	select: SelectionHeuristic,
	/// Whether strict inequalities are accepted (extended rational domain).
	strict: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
/// Usage errors of the theory: bad configuration or input outside the
/// configured value domain. Infeasibility is never an error; it is returned
/// to the host as a conflict clause.
pub enum TheoryError {
	#[error("invalid value `{value}` for configuration key `{key}`")]
	/// A configuration value could not be parsed.
	InvalidValue {
		/// The configuration key.
		key: String,
		/// The rejected value.
		value: String,
	},
	#[error("strict relation `{0}` requires strict mode")]
	/// A strict inequality arrived while the value domain is plain
	/// rational.
	StrictRelation(Relation),
	#[error("unknown configuration key `{0}`")]
	/// An unrecognized configuration key.
	UnknownKey(String),
}

#[derive(Debug)]
/// The propagator in either of its two value-domain instantiations.
enum TheoryPropagator {
	/// Strict mode: values are extended rationals c + k·ε.
	Extended(Propagator<ExtendedRational>),
	/// Default mode: values are plain rationals.
	Rational(Propagator<Rational>),
}

/// Parse a Boolean configuration value.
fn parse_bool(key: &str, value: &str) -> Result<bool, TheoryError> {
	match value {
		"no" | "off" | "0" => Ok(false),
		"yes" | "on" | "1" => Ok(true),
		_ => Err(TheoryError::InvalidValue {
			key: key.to_owned(),
			value: value.to_owned(),
		}),
	}
}

impl Theory {
	/// Create an unconfigured theory handle.
	pub fn new() -> Self {
		Self::default()
	}

	/// Set a configuration value. Recognized keys are `strict`,
	/// `propagate-conflicts` (both Boolean), and `select` (`none`, `match`
	/// or `conflict`). Configuration takes effect at registration.
	pub fn configure(&mut self, key: &str, value: &str) -> Result<(), TheoryError> {
		match key {
			"strict" => self.strict = parse_bool(key, value)?,
			"propagate-conflicts" => self.propagate_conflicts = parse_bool(key, value)?,
			"select" => {
				self.select = match value {
					"none" => SelectionHeuristic::None,
					"match" => SelectionHeuristic::Match,
					"conflict" => SelectionHeuristic::Conflict,
					_ => {
						return Err(TheoryError::InvalidValue {
							key: key.to_owned(),
							value: value.to_owned(),
						})
					}
				}
			}
			_ => return Err(TheoryError::UnknownKey(key.to_owned())),
		}
		Ok(())
	}

	/// Instantiate the propagator for the configured value domain. Called
	/// implicitly by [`Self::init`] when omitted.
	pub fn register(&mut self) {
		self.prop = Some(if self.strict {
			TheoryPropagator::Extended(Propagator::new(self.select, self.propagate_conflicts))
		} else {
			TheoryPropagator::Rational(Propagator::new(self.select, self.propagate_conflicts))
		});
	}

	/// Initialize the propagator for a (new) solving step, see
	/// [`Propagator::init`].
	pub fn init(
		&mut self,
		init: &mut impl InitActions,
		inequalities: Vec<Inequality>,
	) -> Result<(), TheoryError> {
		if self.prop.is_none() {
			self.register();
		}
		match self.prop.as_mut().expect("registered above") {
			TheoryPropagator::Extended(prop) => prop.init(init, inequalities),
			TheoryPropagator::Rational(prop) => prop.init(init, inequalities),
		}
	}

	/// Forward a propagate callback, see [`Propagator::propagate`].
	pub fn propagate(&mut self, actions: &mut impl PropagationActions, changes: &[Literal]) {
		if let Some(prop) = self.prop.as_mut() {
			match prop {
				TheoryPropagator::Extended(prop) => prop.propagate(actions, changes),
				TheoryPropagator::Rational(prop) => prop.propagate(actions, changes),
			}
		}
	}

	/// Forward a check callback, see [`Propagator::check`].
	pub fn check(&mut self, actions: &mut impl PropagationActions) {
		if let Some(prop) = self.prop.as_mut() {
			match prop {
				TheoryPropagator::Extended(prop) => prop.check(actions),
				TheoryPropagator::Rational(prop) => prop.check(actions),
			}
		}
	}

	/// Forward an undo callback for the outgoing decision level.
	pub fn undo(&mut self, thread_id: usize) {
		if let Some(prop) = self.prop.as_mut() {
			prop.undo(thread_id);
		}
	}

	/// Forward a decide callback, returning the (possibly phase adjusted)
	/// decision literal.
	pub fn decide(&self, thread_id: usize, fallback: Literal) -> Literal {
		self.prop
			.as_ref()
			.map_or(fallback, |prop| prop.decide(thread_id, fallback))
	}

	/// Extend a model with the arithmetic assignment, see
	/// [`Propagator::on_model`].
	pub fn on_model(&self, model: &mut impl ModelActions) {
		if let Some(prop) = self.prop.as_ref() {
			match prop {
				TheoryPropagator::Extended(prop) => prop.on_model(model),
				TheoryPropagator::Rational(prop) => prop.on_model(model),
			}
		}
	}

	/// Publish the pivot count under `Simplex`/`Pivots`, step-local and
	/// accumulated.
	pub fn on_statistics(
		&self,
		step: &mut impl StatisticsActions,
		accu: &mut impl StatisticsActions,
	) {
		let Some(prop) = self.prop.as_ref() else {
			return;
		};
		let pivots = prop.pivots() as f64;
		step.set_value(PIVOTS_PATH, pivots);
		let previous = accu.value(PIVOTS_PATH);
		accu.set_value(PIVOTS_PATH, previous + pivots);
	}

	/// Look up the symbol table index of a symbol.
	pub fn lookup_symbol(&self, symbol: Ustr) -> Option<usize> {
		self.prop.as_ref().and_then(|prop| prop.lookup_symbol(symbol))
	}

	/// The symbol at an index of the symbol table.
	pub fn get_symbol(&self, index: usize) -> Option<Ustr> {
		let prop = self.prop.as_ref()?;
		(index < prop.n_values()).then(|| prop.get_symbol(index))
	}

	/// Whether the symbol at `index` has a value in the assignment of a
	/// worker thread.
	pub fn has_value(&self, thread_id: usize, index: usize) -> bool {
		self.prop
			.as_ref()
			.is_some_and(|prop| prop.has_value(thread_id, index))
	}

	/// The value of the symbol at `index` in the assignment of a worker
	/// thread, rendered exactly as a string.
	pub fn get_value(&self, thread_id: usize, index: usize) -> Option<String> {
		self.prop
			.as_ref()
			.and_then(|prop| prop.value_text(thread_id, index))
	}

	/// The first index at or after `start` with a value in the assignment
	/// of a worker thread.
	pub fn next_value(&self, thread_id: usize, start: usize) -> Option<usize> {
		self.prop
			.as_ref()
			.and_then(|prop| prop.next_value(thread_id, start))
	}

	/// The size of the symbol table.
	pub fn n_values(&self) -> usize {
		self.prop.as_ref().map_or(0, TheoryPropagator::n_values)
	}
}

impl TheoryPropagator {
	delegate! {
		to match self {
			TheoryPropagator::Extended(prop) => prop,
			TheoryPropagator::Rational(prop) => prop,
		} {
			/// Adjust the phase of a decision literal.
			fn decide(&self, thread_id: usize, fallback: Literal) -> Literal;
			/// The symbol at an index of the symbol table.
			fn get_symbol(&self, index: usize) -> Ustr;
			/// Whether the symbol at `index` has a value in a thread.
			fn has_value(&self, thread_id: usize, index: usize) -> bool;
			/// Look up the symbol table index of a symbol.
			fn lookup_symbol(&self, symbol: Ustr) -> Option<usize>;
			/// The size of the symbol table.
			fn n_values(&self) -> usize;
			/// The first index at or after `start` with a value.
			fn next_value(&self, thread_id: usize, start: usize) -> Option<usize>;
			/// The total number of pivots across all worker solvers.
			fn pivots(&self) -> u64;
			/// Rewind the outgoing decision level of a worker thread.
			fn undo(&mut self, thread_id: usize);
			/// The value of the symbol at `index` rendered as a string.
			fn value_text(&self, thread_id: usize, index: usize) -> Option<String>;
		}
	}
}
