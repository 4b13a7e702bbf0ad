// Copyright (c) 2022, 2023 Frank Fischer <frank-fischer@shadow-soft.de>
//
// This program is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see  <http://www.gnu.org/licenses/>
//

//! A library of min-cost-flow solvers behind one mutable interface.
//!
//! The [`mcf::Mcf`] trait describes a min-cost-flow instance that can
//! be loaded, edited arc by arc and node by node, solved, queried and
//! re-solved; edits between solves let the solvers warm start. Three
//! solvers implement it:
//!
//! - [`mcf::NetSimplex`]: primal and dual network simplex with
//!   selectable pricing rules; the primal variant also handles
//!   separable convex quadratic arc costs.
//! - [`mcf::RelaxIv`]: a relaxation (primal-dual ascent) method for
//!   linear costs, particularly strong at reoptimization.
//! - [`mcf::SptTree`]: a shortest-path-tree specialization for
//!   uncapacitated single-source instances.
//!
//! [`mcf::McfClone`] runs two solvers in lockstep for differential
//! testing.
//!
//! All solvers are parameterized over a [`num::NumKinds`] set of flow,
//! cost and objective types and compare floating quantities through a
//! [`num::Tolerance`].
//!
//! # Example
//!
//! ```
//! use rs_mcf::mcf::{Mcf, NetSimplex, Status};
//!
//! // one supply node, one demand node, a single arc of cost 3
//! let mut spx = NetSimplex::<(i64, i64, i64)>::new(2, 1);
//! spx.load_net(2, 1, 2, 1, &[1], &[3], &[-1, 1], &[0], &[1]).unwrap();
//! assert_eq!(spx.solve(), Status::Optimal);
//! assert_eq!(spx.objective(), 3);
//! assert_eq!(spx.flow(0), 1);
//! ```

// # Numeric kinds

pub mod num;
pub use crate::num::{Index, NumKinds, Tolerance};

// # Data structures

pub mod collections;

// # Solvers

pub mod mcf;
pub use crate::mcf::{Mcf, McfClone, McfError, McfState, NetSimplex, Param, ParValue, RelaxIv, SptTree, Status};

/// The default numeric kind set: 64-bit integer flows, costs and
/// objective values.
pub type IntKinds = (i64, i64, i64);

/// Floating-point numeric kinds; remember to configure the `EpsFlw`
/// and `EpsCst` tolerances.
pub type FltKinds = (f64, f64, f64);
