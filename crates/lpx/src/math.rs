//! Arbitrary precision arithmetic primitives for the simplex engine.
//!
//! All numeric state in the engine is exact: tableau cells are
//! [`Integer`] numerators paired with a per-row denominator, and variable
//! assignments and bounds are values of a [`Value`] domain, which is either
//! [`Rational`] or [`ExtendedRational`] depending on whether strict
//! inequalities have to be represented.

pub(crate) mod extended;

use std::{
	fmt::{Debug, Display},
	ops::{AddAssign, Neg, Sub, SubAssign},
};

use num_integer::Integer as _;
use num_traits::Zero;

pub use crate::math::extended::ExtendedRational;
use crate::problem::Relation;

/// Type alias for the unbounded signed integers backing the tableau.
pub type Integer = num_bigint::BigInt;

/// Type alias for arbitrary precision rational numbers.
///
/// Values of this type are canonical by construction: the fraction is
/// reduced and the denominator is positive.
pub type Rational = num_rational::Ratio<Integer>;

/// The value domain of variable assignments and bounds.
///
/// The simplex core is generic over this trait so that the same engine
/// solves both non-strict problems (over [`Rational`]) and strict problems
/// (over [`ExtendedRational`], where a strict bound is offset by an
/// infinitesimal ε).
pub trait Value:
	Clone
	+ Debug
	+ Display
	+ Ord
	+ Zero
	+ Neg<Output = Self>
	+ for<'a> AddAssign<&'a Self>
	+ for<'a> SubAssign<&'a Self>
	+ for<'a> Sub<&'a Self, Output = Self>
{
	/// Convert the right hand side of an inequality into a bound value.
	///
	/// Returns `None` when the relation is strict and the domain has no
	/// infinitesimal to represent it with.
	fn bound_value(rhs: Rational, rel: Relation) -> Option<Self>;

	/// Scale the value by a rational factor.
	fn mul_rational(&self, factor: &Rational) -> Self;

	/// Divide the value by a (non-zero) rational factor.
	fn div_rational(&self, factor: &Rational) -> Self;

	/// The ε-less projection of the value, used for tableau row arithmetic.
	fn rational(&self) -> &Rational;
}

/// Compute the greatest common divisor `g` of `a` and `b` together with the
/// quotients `a / g` and `b / g`.
pub(crate) fn gcd_div(a: &Integer, b: &Integer) -> (Integer, Integer, Integer) {
	let g = a.gcd(b);
	(a / &g, b / &g, g)
}

impl Value for Rational {
	fn bound_value(rhs: Rational, rel: Relation) -> Option<Self> {
		match rel {
			Relation::Less | Relation::Greater => None,
			Relation::LessEqual | Relation::GreaterEqual | Relation::Equal => Some(rhs),
		}
	}

	fn mul_rational(&self, factor: &Rational) -> Self {
		self * factor
	}

	fn div_rational(&self, factor: &Rational) -> Self {
		self / factor
	}

	fn rational(&self) -> &Rational {
		self
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use num_traits::Zero;

	use crate::{
		math::{gcd_div, Integer, Rational, Value},
		problem::Relation,
	};

	/// Construct a rational number from a numerator and denominator.
	pub(crate) fn rat(num: i64, den: i64) -> Rational {
		Rational::new(Integer::from(num), Integer::from(den))
	}

	#[test]
	fn test_gcd_div() {
		let (ag, bg, g) = gcd_div(&Integer::from(12), &Integer::from(18));
		assert_eq!(g, Integer::from(6));
		assert_eq!(ag, Integer::from(2));
		assert_eq!(bg, Integer::from(3));

		let (ag, bg, g) = gcd_div(&Integer::from(-4), &Integer::from(6));
		assert_eq!(g, Integer::from(2));
		assert_eq!(ag, Integer::from(-2));
		assert_eq!(bg, Integer::from(3));
	}

	#[test]
	fn test_rational_canonical() {
		let x = rat(2, 4);
		assert_eq!(x, rat(1, 2));
		let y = rat(1, -2);
		assert!(y < Rational::zero());
		assert_eq!(y.denom(), &Integer::from(2));
	}

	#[test]
	fn test_rational_bound_value() {
		assert_eq!(
			<Rational as Value>::bound_value(rat(3, 1), Relation::LessEqual),
			Some(rat(3, 1))
		);
		assert_eq!(<Rational as Value>::bound_value(rat(3, 1), Relation::Less), None);
		assert_eq!(<Rational as Value>::bound_value(rat(3, 1), Relation::Greater), None);
	}
}
