//! Extended rational numbers of the form c + k·ε, where ε is a symbolic
//! positive infinitesimal. They form the value domain of the engine in
//! strict mode, where a constraint `x < v` becomes the non-strict bound
//! `x ≤ v - ε`.

use std::{
	fmt,
	ops::{Add, AddAssign, Neg, Sub, SubAssign},
};

use num_traits::{One, Zero};

use crate::{
	math::{Rational, Value},
	problem::Relation,
};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
/// An extended rational c + k·ε.
///
/// Comparison is lexicographic on `(c, k)`, which matches the standard
/// ordering of c + k·ε for any sufficiently small positive ε. Addition and
/// subtraction are componentwise; scaling by a [`Rational`] scales both
/// components.
pub struct ExtendedRational {
	/// The rational constant.
	c: Rational,
	/// The coefficient of the infinitesimal ε.
	k: Rational,
}

impl ExtendedRational {
	/// Create an extended rational from its constant and ε coefficient.
	pub fn new(c: Rational, k: Rational) -> Self {
		Self { c, k }
	}

	/// The coefficient of ε.
	pub fn epsilon_coefficient(&self) -> &Rational {
		&self.k
	}
}

impl Add for ExtendedRational {
	type Output = ExtendedRational;

	fn add(mut self, rhs: ExtendedRational) -> Self::Output {
		self += &rhs;
		self
	}
}

impl AddAssign<&ExtendedRational> for ExtendedRational {
	fn add_assign(&mut self, rhs: &ExtendedRational) {
		self.c += &rhs.c;
		self.k += &rhs.k;
	}
}

impl fmt::Display for ExtendedRational {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if !self.c.is_zero() || self.k.is_zero() {
			write!(f, "{}", self.c)?;
		}
		if !self.k.is_zero() {
			if !self.c.is_zero() {
				write!(f, "+")?;
			}
			if !self.k.is_one() {
				write!(f, "{}*", self.k)?;
			}
			write!(f, "e")?;
		}
		Ok(())
	}
}

impl From<Rational> for ExtendedRational {
	fn from(c: Rational) -> Self {
		Self {
			c,
			k: Rational::zero(),
		}
	}
}

impl Neg for ExtendedRational {
	type Output = ExtendedRational;

	fn neg(self) -> Self::Output {
		Self {
			c: -self.c,
			k: -self.k,
		}
	}
}

impl Sub for ExtendedRational {
	type Output = ExtendedRational;

	fn sub(mut self, rhs: ExtendedRational) -> Self::Output {
		self -= &rhs;
		self
	}
}

impl Sub<&ExtendedRational> for ExtendedRational {
	type Output = ExtendedRational;

	fn sub(mut self, rhs: &ExtendedRational) -> Self::Output {
		self -= rhs;
		self
	}
}

impl SubAssign<&ExtendedRational> for ExtendedRational {
	fn sub_assign(&mut self, rhs: &ExtendedRational) {
		self.c -= &rhs.c;
		self.k -= &rhs.k;
	}
}

impl Value for ExtendedRational {
	fn bound_value(rhs: Rational, rel: Relation) -> Option<Self> {
		let k = match rel {
			Relation::Less => -Rational::one(),
			Relation::Greater => Rational::one(),
			Relation::LessEqual | Relation::GreaterEqual | Relation::Equal => Rational::zero(),
		};
		Some(Self { c: rhs, k })
	}

	fn mul_rational(&self, factor: &Rational) -> Self {
		Self {
			c: &self.c * factor,
			k: &self.k * factor,
		}
	}

	fn div_rational(&self, factor: &Rational) -> Self {
		Self {
			c: &self.c / factor,
			k: &self.k / factor,
		}
	}

	fn rational(&self) -> &Rational {
		&self.c
	}
}

impl Zero for ExtendedRational {
	fn zero() -> Self {
		Self {
			c: Rational::zero(),
			k: Rational::zero(),
		}
	}

	fn is_zero(&self) -> bool {
		self.c.is_zero() && self.k.is_zero()
	}
}
