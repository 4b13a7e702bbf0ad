/*
 * Copyright (c) 2022, 2023 Frank Fischer <frank-fischer@shadow-soft.de>
 *
 * This program is free software: you can redistribute it and/or
 * modify it under the terms of the GNU General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful, but
 * WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
 * General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see  <http://www.gnu.org/licenses/>
 */

//! Numeric kinds and tolerance-aware comparisons.
//!
//! All solvers are parameterized over a set of numeric kinds: a flow
//! type, a cost type and an objective type. The kinds are bundled in a
//! single trait ([`NumKinds`]) so that a solver is instantiated once
//! per kind set, e.g. `NetSimplex<(i64, i64, i64)>` for all-integer
//! data or `NetSimplex<(f64, f64, f64)>` for floating-point data.
//!
//! Comparisons of floating quantities against zero must not be exact.
//! The [`Tolerance`] type bundles an epsilon with the usual family of
//! sign tests; integer instantiations simply use a zero epsilon.

use num_traits::{Bounded, FromPrimitive, NumAssign, NumCast, Signed, ToPrimitive};
use std::fmt::Debug;

/// External name of a node or an arc.
///
/// Both node and arc names are 0-based and stable across topology
/// edits. `Index::MAX` serves as the "no such entity" sentinel, e.g.
/// as terminator of sparse index sets.
pub type Index = u32;

/// A signed index used internally to carry an orientation.
///
/// Every valid `Index` must be representable with both signs.
pub type SIndex = i64;

/// Base trait for flow, cost and objective values.
///
/// This is a pure bundle of `num_traits` bounds; it is implemented for
/// all signed primitive integer and floating point types.
pub trait Num:
    NumAssign + NumCast + Signed + Bounded + FromPrimitive + ToPrimitive + PartialOrd + Copy + Default + Debug + 'static
{
}

impl<T> Num for T where
    T: NumAssign
        + NumCast
        + Signed
        + Bounded
        + FromPrimitive
        + ToPrimitive
        + PartialOrd
        + Copy
        + Default
        + Debug
        + 'static
{
}

/// The value treated as "infinity" for a numeric type.
///
/// This is `T::max_value()`, which is the natural choice for integer
/// kinds. Capacities and costs equal to (or exceeding) this value are
/// considered unbounded resp. non-existing. For floating-point kinds
/// `T::infinity()` would work, too, but `max_value` keeps the sentinel
/// uniform across kinds.
pub fn infinite<T: Num>() -> T {
    T::max_value()
}

/// The smaller of two values.
///
/// `Num` only requires `PartialOrd` (not `Ord`, which floating-point
/// types cannot implement), so this is a free function rather than
/// `Ord::min`.
pub fn min<T: Num>(a: T, b: T) -> T {
    if a < b {
        a
    } else {
        b
    }
}

/// The larger of two values.
///
/// See [`min`] for why this is a free function rather than `Ord::max`.
pub fn max<T: Num>(a: T, b: T) -> T {
    if a > b {
        a
    } else {
        b
    }
}

/// A set of numeric kinds for one solver instantiation.
///
/// `Flow` is the type of flows, capacities and deficits, `Cost` the
/// type of (linear and quadratic) costs, potentials and reduced costs,
/// and `Obj` the type of objective values. `Obj` should be wide enough
/// to hold sums of `Cost * Flow` products.
///
/// The cast helpers are only ever applied to finite values.
pub trait NumKinds: 'static {
    type Flow: Num;
    type Cost: Num;
    type Obj: Num;

    fn flow_as_cost(x: Self::Flow) -> Self::Cost {
        NumCast::from(x).unwrap()
    }

    fn cost_as_flow(c: Self::Cost) -> Self::Flow {
        NumCast::from(c).unwrap()
    }

    fn flow_as_obj(x: Self::Flow) -> Self::Obj {
        NumCast::from(x).unwrap()
    }

    fn cost_as_obj(c: Self::Cost) -> Self::Obj {
        NumCast::from(c).unwrap()
    }
}

impl<F, C, O> NumKinds for (F, C, O)
where
    F: Num,
    C: Num,
    O: Num,
{
    type Flow = F;
    type Cost = C;
    type Obj = O;
}

/// The flow type of a kind set.
pub type Flow<K> = <K as NumKinds>::Flow;
/// The cost type of a kind set.
pub type Cost<K> = <K as NumKinds>::Cost;
/// The objective type of a kind set.
pub type Obj<K> = <K as NumKinds>::Obj;

/// Tolerance-aware sign tests.
///
/// A value `x` with `|x| <= eps` is considered zero. The default
/// tolerance is exact (`eps == 0`), which is the right choice for
/// integer kinds.
#[derive(Clone, Copy, Debug, Default)]
pub struct Tolerance<T> {
    eps: T,
}

impl<T: Num> Tolerance<T> {
    pub fn new(eps: T) -> Self {
        Tolerance { eps: eps.abs() }
    }

    /// The exact tolerance (`eps == 0`).
    pub fn exact() -> Self {
        Tolerance { eps: T::zero() }
    }

    pub fn eps(&self) -> T {
        self.eps
    }

    /// `x == 0` within tolerance.
    pub fn etz(&self, x: T) -> bool {
        x.abs() <= self.eps
    }

    /// `x > 0` beyond tolerance.
    pub fn gtz(&self, x: T) -> bool {
        x > self.eps
    }

    /// `x < 0` beyond tolerance.
    pub fn ltz(&self, x: T) -> bool {
        x < -self.eps
    }

    /// `x >= 0` within tolerance.
    pub fn gez(&self, x: T) -> bool {
        x >= -self.eps
    }

    /// `x <= 0` within tolerance.
    pub fn lez(&self, x: T) -> bool {
        x <= self.eps
    }

    /// `x == y` within tolerance.
    pub fn eq(&self, x: T, y: T) -> bool {
        self.etz(x - y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_tolerance() {
        let tol = Tolerance::<i64>::exact();
        assert!(tol.etz(0));
        assert!(!tol.etz(1));
        assert!(tol.gtz(1));
        assert!(!tol.gtz(0));
        assert!(tol.ltz(-1));
        assert!(tol.gez(0));
        assert!(tol.lez(0));
    }

    #[test]
    fn float_tolerance() {
        let tol = Tolerance::new(1e-6);
        assert!(tol.etz(5e-7));
        assert!(tol.etz(-5e-7));
        assert!(!tol.gtz(5e-7));
        assert!(tol.gtz(2e-6));
        assert!(tol.ltz(-2e-6));
        assert!(tol.eq(1.0, 1.0 + 1e-7));
    }

    #[test]
    fn infinite_is_max() {
        assert_eq!(infinite::<i64>(), i64::max_value());
        assert_eq!(infinite::<f64>(), f64::MAX);
    }
}
