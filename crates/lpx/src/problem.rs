//! The parsed-input contract of the engine: linear inequalities over named
//! variables, each tagged with the host literal that activates it.

use std::fmt;

use itertools::Itertools;
use num_traits::One;
use ustr::Ustr;

use crate::{math::Rational, Literal};

#[derive(Clone, Debug, PartialEq)]
/// A linear inequality `lhs rel rhs` guarded by a host literal.
///
/// Constant terms are expected to have been folded into `rhs` by the
/// parser; the left hand side only contains variable terms. The strict
/// relations [`Relation::Less`] and [`Relation::Greater`] are only valid in
/// strict mode.
pub struct Inequality {
	/// The terms of the left hand side.
	pub lhs: Vec<Term>,
	/// The right hand side constant.
	pub rhs: Rational,
	/// The relation between left and right hand side.
	pub rel: Relation,
	/// The host literal whose truth activates the inequality.
	pub lit: Literal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// The relation of an [`Inequality`].
pub enum Relation {
	/// Non-strict less-than-or-equal relation.
	LessEqual,
	/// Non-strict greater-than-or-equal relation.
	GreaterEqual,
	/// Equality relation.
	Equal,
	/// Strict less-than relation, requires strict mode.
	Less,
	/// Strict greater-than relation, requires strict mode.
	Greater,
}

#[derive(Clone, Debug, PartialEq)]
/// A single term `co * var` on the left hand side of an [`Inequality`].
pub struct Term {
	/// The rational coefficient of the term.
	pub co: Rational,
	/// The symbol naming the arithmetic variable.
	pub var: Ustr,
}

impl fmt::Display for Inequality {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.lhs.is_empty() {
			write!(f, "0")?;
		} else {
			write!(f, "{}", self.lhs.iter().format(" + "))?;
		}
		write!(f, " {} {}", self.rel, self.rhs)
	}
}

impl Relation {
	/// Mirror the relation, as required when dividing an inequality by a
	/// negative coefficient.
	pub fn invert(self) -> Relation {
		match self {
			Relation::LessEqual => Relation::GreaterEqual,
			Relation::GreaterEqual => Relation::LessEqual,
			Relation::Equal => Relation::Equal,
			Relation::Less => Relation::Greater,
			Relation::Greater => Relation::Less,
		}
	}

	/// Whether the relation is strict and requires an infinitesimal to be
	/// represented as a non-strict bound.
	pub fn is_strict(self) -> bool {
		matches!(self, Relation::Less | Relation::Greater)
	}
}

impl fmt::Display for Relation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Relation::LessEqual => "<=",
			Relation::GreaterEqual => ">=",
			Relation::Equal => "=",
			Relation::Less => "<",
			Relation::Greater => ">",
		};
		write!(f, "{s}")
	}
}

impl fmt::Display for Term {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.co == -Rational::one() {
			write!(f, "-")?;
		} else if !self.co.is_one() {
			write!(f, "{}*", self.co)?;
		}
		write!(f, "{}", self.var)
	}
}

#[cfg(test)]
mod tests {
	use ustr::ustr;

	use crate::{
		math::tests::rat,
		problem::{Inequality, Relation, Term},
		Literal,
	};

	#[test]
	fn test_invert() {
		assert_eq!(Relation::LessEqual.invert(), Relation::GreaterEqual);
		assert_eq!(Relation::GreaterEqual.invert(), Relation::LessEqual);
		assert_eq!(Relation::Equal.invert(), Relation::Equal);
		assert_eq!(Relation::Less.invert(), Relation::Greater);
		assert_eq!(Relation::Greater.invert(), Relation::Less);
	}

	#[test]
	fn test_display() {
		let iq = Inequality {
			lhs: vec![
				Term {
					co: rat(1, 1),
					var: ustr("x"),
				},
				Term {
					co: rat(-1, 1),
					var: ustr("y"),
				},
				Term {
					co: rat(2, 3),
					var: ustr("z"),
				},
			],
			rhs: rat(7, 2),
			rel: Relation::LessEqual,
			lit: Literal::new(1).unwrap(),
		};
		assert_eq!(iq.to_string(), "x + -y + 2/3*z <= 7/2");

		let empty = Inequality {
			lhs: Vec::new(),
			rhs: rat(-1, 1),
			rel: Relation::GreaterEqual,
			lit: Literal::new(2).unwrap(),
		};
		assert_eq!(empty.to_string(), "0 >= -1");
	}
}
