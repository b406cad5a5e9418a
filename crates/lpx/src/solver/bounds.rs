//! Bounds on arithmetic variables and the relations they enforce.
//!
//! A bound becomes active when the host solver assigns its literal true. The
//! solver owns all bounds in a flat store and refers to them by [`BoundRef`],
//! both from variables and from the trail.

use crate::{math::Value, problem::Relation, solver::VarRef, Literal};

index_vec::define_index_type! {
	/// Identifies a [`Bound`] within the solver's bound store.
	pub struct BoundRef = u32;
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// A one-sided (or two-sided, for equality) constraint on a variable,
/// attached to a host literal.
pub(crate) struct Bound<V> {
	/// The bound value.
	pub(crate) value: V,
	/// The variable the bound constrains.
	pub(crate) variable: VarRef,
	/// The host literal whose truth activates the bound.
	pub(crate) literal: Literal,
	/// Which side(s) of the variable the bound tightens.
	pub(crate) relation: BoundRelation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// The side of a variable constrained by a [`Bound`].
pub(crate) enum BoundRelation {
	/// The bound is an upper bound.
	LessEqual,
	/// The bound is a lower bound.
	GreaterEqual,
	/// The bound fixes the variable, tightening both sides.
	Equal,
}

impl<V: Value> Bound<V> {
	/// Whether `value` satisfies the bound.
	pub(crate) fn compare(&self, value: &V) -> bool {
		match self.relation {
			BoundRelation::LessEqual => *value <= self.value,
			BoundRelation::GreaterEqual => *value >= self.value,
			BoundRelation::Equal => *value == self.value,
		}
	}

	/// Whether the bound excludes all values admitted by `other`, making the
	/// two bounds mutually exclusive.
	pub(crate) fn conflicts(&self, other: &Self) -> bool {
		match (self.relation, other.relation) {
			(BoundRelation::LessEqual, BoundRelation::GreaterEqual | BoundRelation::Equal) => {
				other.value > self.value
			}
			(BoundRelation::GreaterEqual, BoundRelation::LessEqual | BoundRelation::Equal) => {
				other.value < self.value
			}
			(BoundRelation::Equal, BoundRelation::LessEqual) => self.value > other.value,
			(BoundRelation::Equal, BoundRelation::GreaterEqual) => self.value < other.value,
			(BoundRelation::Equal, BoundRelation::Equal) => self.value != other.value,
			(BoundRelation::LessEqual, BoundRelation::LessEqual)
			| (BoundRelation::GreaterEqual, BoundRelation::GreaterEqual) => false,
		}
	}
}

impl BoundRelation {
	/// The side tightened by an inequality with the given relation. Strict
	/// relations tighten the same side as their non-strict counterparts, the
	/// strictness being encoded in the bound value instead.
	pub(crate) fn from_relation(rel: Relation) -> Self {
		match rel {
			Relation::Less | Relation::LessEqual => BoundRelation::LessEqual,
			Relation::Greater | Relation::GreaterEqual => BoundRelation::GreaterEqual,
			Relation::Equal => BoundRelation::Equal,
		}
	}
}

#[cfg(test)]
mod tests {
	use crate::{
		math::{tests::rat, Rational},
		problem::Relation,
		solver::{
			bounds::{Bound, BoundRelation},
			VarRef,
		},
		Literal,
	};

	/// Construct a bound on a throwaway variable.
	fn bound(value: Rational, relation: BoundRelation) -> Bound<Rational> {
		Bound {
			value,
			variable: VarRef::new(0),
			literal: Literal::new(1).unwrap(),
			relation,
		}
	}

	#[test]
	fn test_compare() {
		let ub = bound(rat(3, 1), BoundRelation::LessEqual);
		assert!(ub.compare(&rat(3, 1)));
		assert!(ub.compare(&rat(-7, 2)));
		assert!(!ub.compare(&rat(4, 1)));

		let eq = bound(rat(3, 1), BoundRelation::Equal);
		assert!(eq.compare(&rat(3, 1)));
		assert!(!eq.compare(&rat(2, 1)));
	}

	#[test]
	fn test_conflicts() {
		let le = bound(rat(3, 1), BoundRelation::LessEqual);
		let ge = bound(rat(5, 1), BoundRelation::GreaterEqual);
		assert!(le.conflicts(&ge));
		assert!(ge.conflicts(&le));
		assert!(!le.conflicts(&bound(rat(2, 1), BoundRelation::GreaterEqual)));
		assert!(!le.conflicts(&bound(rat(1, 1), BoundRelation::LessEqual)));

		let eq = bound(rat(4, 1), BoundRelation::Equal);
		assert!(eq.conflicts(&le));
		assert!(eq.conflicts(&ge));
		assert!(eq.conflicts(&bound(rat(5, 1), BoundRelation::Equal)));
		assert!(!eq.conflicts(&bound(rat(4, 1), BoundRelation::Equal)));
	}

	#[test]
	fn test_from_relation() {
		assert_eq!(
			BoundRelation::from_relation(Relation::Less),
			BoundRelation::LessEqual
		);
		assert_eq!(
			BoundRelation::from_relation(Relation::GreaterEqual),
			BoundRelation::GreaterEqual
		);
		assert_eq!(
			BoundRelation::from_relation(Relation::Equal),
			BoundRelation::Equal
		);
	}
}
