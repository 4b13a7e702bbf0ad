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

//! The uniform Minimum Cost Flow solver interface.
//!
//! All solvers of this crate implement the [`Mcf`] trait: a mutable
//! min-cost-flow instance that can be loaded, edited incrementally,
//! solved (possibly warm-started after edits) and queried for primal
//! and dual solutions.
//!
//! The problem solved is
//!
//! ```text
//!     min  sum( C[a]*x[a] + Q[a]*x[a]^2/2 )
//!     s.t. sum( x[a] : a leaves v ) - sum( x[a] : a enters v ) = -b[v]
//!          0 <= x[a] <= U[a]
//! ```
//!
//! where `b[v]` is the *deficit* of node `v` (positive for demand
//! nodes, negative for supply nodes). A problem is feasible only if
//! the deficits of the live nodes sum to zero; this is not checked on
//! input but reported as [`Status::Infeasible`] by [`Mcf::solve`].
//!
//! Node and arc names are 0-based and stable: deleting an arc frees
//! its name for reuse by a later [`Mcf::add_arc`] (smallest freed name
//! first) but never renumbers other arcs.

pub mod clone;
pub mod relax;
pub mod simplex;
pub mod spt;

pub use self::clone::McfClone;
pub use self::relax::RelaxIv;
pub use self::simplex::NetSimplex;
pub use self::spt::SptTree;

use crate::num::{Cost, Flow, Index, NumKinds, Obj};
use num_traits::Zero;

use std::error;
use std::fmt;
use std::time::{Duration, Instant};

#[cfg(feature = "serialize")]
use serde_derive::{Deserialize, Serialize};

/// The outcome of the latest call to [`Mcf::solve`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Status {
    /// The problem has not been solved yet (or an edit invalidated the
    /// previous solution).
    Unsolved,
    /// An optimal solution has been found.
    Optimal,
    /// The problem is infeasible.
    Infeasible,
    /// The objective is unbounded below (a negative cost cycle of
    /// unbounded capacity exists).
    Unbounded,
    /// The iteration or time cap was hit; calling [`Mcf::solve`] again
    /// resumes the computation.
    Stopped,
}

/// Keys of the solver parameter registry.
///
/// Not every solver supports every key; setting an unsupported key
/// fails with [`McfError::UnsupportedParam`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Param {
    /// Iteration cap for one `solve` call, 0 meaning none (int).
    MaxIter,
    /// Time cap in seconds for one `solve` call, 0 meaning none (float).
    MaxTime,
    /// Tolerance for comparisons of flow quantities (float).
    EpsFlw,
    /// Tolerance for comparisons of cost quantities (float).
    EpsCst,
    /// Whether to attempt a warm start after data edits (bool as int).
    Reopt,
    /// Network simplex: primal (1) or dual (0) algorithm.
    AlgPrimal,
    /// Network simplex: pricing rule (see [`simplex::Pricing`]).
    AlgPricing,
    /// Network simplex: number of candidate groups.
    NumCandList,
    /// Network simplex: size of the hot list.
    HotListSize,
    /// Quadratic simplex: pivots between objective recomputations.
    RecomputeFOLimits,
    /// Quadratic simplex: optimality tolerance (float).
    EpsOpt,
    /// Relaxation: use the auction crash initialization (bool as int).
    Auction,
    /// SPT solver: frontier data structure (see [`spt::SptVariant`]).
    SptVariant,
}

/// A parameter value, either integral or floating.
#[derive(Clone, Copy, PartialEq, Debug)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum ParValue {
    Int(i64),
    Flt(f64),
}

impl ParValue {
    pub fn as_int(&self) -> i64 {
        match *self {
            ParValue::Int(v) => v,
            ParValue::Flt(v) => v as i64,
        }
    }

    pub fn as_flt(&self) -> f64 {
        match *self {
            ParValue::Int(v) => v as f64,
            ParValue::Flt(v) => v,
        }
    }
}

/// Error raised by the editing and configuration operations.
///
/// Genuine problem outcomes (infeasible, unbounded, stopped) are *not*
/// errors; they are reported via [`Status`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum McfError {
    /// An arc or node name outside the current live range.
    InvalidName(Index),
    /// A topology operation that is not allowed in the current state,
    /// e.g. reopening a deleted arc.
    IllegalTopologyOp,
    /// The operation would exceed the configured `nmax`/`mmax`.
    CapacityExceeded,
    /// The parameter key (or value) is not supported by this solver.
    UnsupportedParam(Param),
    /// An external backend reported a failure.
    ExternalBackend,
    /// Numerical difficulties were detected.
    Numerical,
}

impl fmt::Display for McfError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            McfError::InvalidName(nm) => write!(f, "invalid entity name: {}", nm),
            McfError::IllegalTopologyOp => write!(f, "illegal topology operation"),
            McfError::CapacityExceeded => write!(f, "node or arc capacity exceeded"),
            McfError::UnsupportedParam(p) => write!(f, "unsupported parameter: {:?}", p),
            McfError::ExternalBackend => write!(f, "external backend failure"),
            McfError::Numerical => write!(f, "numerical difficulties"),
        }
    }
}

impl error::Error for McfError {}

pub type Result<T> = std::result::Result<T, McfError>;

/// An opaque snapshot of a solver's solution state.
///
/// A snapshot taken with [`Mcf::state`] can be restored with
/// [`Mcf::put_state`] on the same instance (same data, same topology)
/// to return to a previously visited solution, e.g. when backtracking
/// in an enclosing branch-and-bound. The snapshot holds the flow
/// vector plus the solver-specific dual information: reduced costs
/// for the relaxation solver, basis tags for the network simplex.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serialize",
    serde(bound(
        serialize = "K::Flow: serde::Serialize, K::Cost: serde::Serialize",
        deserialize = "K::Flow: serde::Deserialize<'de>, K::Cost: serde::Deserialize<'de>"
    ))
)]
pub struct McfState<K: NumKinds> {
    pub(crate) flows: Vec<Flow<K>>,
    pub(crate) red_costs: Option<Vec<Cost<K>>>,
    pub(crate) basis: Option<Vec<i8>>,
}

/// Accumulating wall-clock timer for `solve` calls.
#[derive(Clone, Debug, Default)]
pub(crate) struct Timer {
    enabled: bool,
    total: Duration,
}

impl Timer {
    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.total = Duration::default();
    }

    pub(crate) fn start(&self) -> Option<Instant> {
        if self.enabled {
            Some(Instant::now())
        } else {
            None
        }
    }

    pub(crate) fn stop(&mut self, started: Option<Instant>) {
        if let Some(t) = started {
            self.total += t.elapsed();
        }
    }

    pub(crate) fn total(&self) -> Duration {
        self.total
    }
}

/// Copy a range of entity values into `out`.
///
/// If `nms` is given it must be strictly increasing and terminated by
/// `Index::MAX`; only the names in `[start, stop)` are read and their
/// values are written consecutively. Otherwise the dense range
/// `[start, min(stop, count))` is read.
pub(crate) fn read_range<T>(
    out: &mut [T],
    nms: Option<&[Index]>,
    start: Index,
    stop: Index,
    count: Index,
    f: impl Fn(Index) -> T,
) {
    let stop = stop.min(count);
    if let Some(nms) = nms {
        let mut k = 0;
        for &i in nms {
            if i >= stop {
                break;
            }
            if i >= start {
                out[k] = f(i);
                k += 1;
            }
        }
    } else {
        for i in start..stop {
            out[(i - start) as usize] = f(i);
        }
    }
}

/// Apply new entity values from `vals` to a range.
///
/// The counterpart of [`read_range`] for the `chg_*` operations.
pub(crate) fn write_range<T: Copy, E>(
    vals: &[T],
    nms: Option<&[Index]>,
    start: Index,
    stop: Index,
    count: Index,
    mut f: impl FnMut(Index, T) -> std::result::Result<(), E>,
) -> std::result::Result<(), E> {
    let stop = stop.min(count);
    if let Some(nms) = nms {
        let mut k = 0;
        for &i in nms {
            if i >= stop {
                break;
            }
            if i >= start {
                f(i, vals[k])?;
                k += 1;
            }
        }
    } else {
        for i in start..stop {
            f(i, vals[(i - start) as usize])?;
        }
    }
    Ok(())
}

/// The uniform interface of the min-cost-flow solvers.
///
/// The lifecycle of an instance is: construct with capacity hints,
/// [`load_net`][Mcf::load_net], optionally edit, [`solve`][Mcf::solve],
/// query, edit, re-solve, and so on. Edits between solves allow the
/// solvers to warm start where possible.
///
/// The single-entity read methods (`flow`, `cost`, ...) panic if the
/// name is outside `[0, num_arcs())` resp. `[0, num_nodes())`; the
/// editing methods report such names as [`McfError::InvalidName`]
/// instead. Closed arcs read zero flow and infinite reduced cost;
/// deleted arcs read `Index::MAX` endpoints.
pub trait Mcf {
    type Kinds: NumKinds;

    /// Install a complete network.
    ///
    /// `nmax` and `mmax` are capacities bounding all subsequent edits;
    /// `n` and `m` are the actual counts. `caps`, `costs`, `starts`
    /// and `ends` must hold `m` entries, `deficits` must hold `n`
    /// entries. Arcs with infinite cost are installed *closed*; arcs
    /// that additionally have infinite capacity are installed
    /// *deleted* (their slots are free for reuse). `m == 0` yields an
    /// empty but usable instance.
    fn load_net(
        &mut self,
        nmax: Index,
        mmax: Index,
        n: Index,
        m: Index,
        caps: &[Flow<Self::Kinds>],
        costs: &[Cost<Self::Kinds>],
        deficits: &[Flow<Self::Kinds>],
        starts: &[Index],
        ends: &[Index],
    ) -> Result<()>;

    /// Best-effort capacity tightening.
    ///
    /// May change the capacities reported by [`ucap`][Mcf::ucap] but
    /// never the optimal value. Invalidates any prior solution.
    fn pre_process(&mut self) -> Result<()> {
        Ok(())
    }

    /// Set a parameter of the registry (see [`Param`]).
    fn set_par(&mut self, par: Param, val: ParValue) -> Result<()>;

    /// Read a parameter of the registry.
    fn get_par(&self, par: Param) -> Result<ParValue>;

    /// Solve the instance and return the resulting status.
    ///
    /// Problem outcomes are reported via [`Status`], never as errors.
    /// With an iteration or time cap the computation may stop early
    /// with [`Status::Stopped`]; the state stays consistent and a
    /// further call resumes.
    fn solve(&mut self) -> Status;

    /// The status of the latest solve.
    fn status(&self) -> Status;

    /// Number of node names in use (including logically deleted ones).
    fn num_nodes(&self) -> Index;

    /// Number of arc names in use (live, closed and deleted).
    fn num_arcs(&self) -> Index;

    /// The flow on one arc.
    fn flow(&self, arc: Index) -> Flow<Self::Kinds>;

    /// Read a range of flows (see the trait docs for the `nms` form).
    fn flows(&self, out: &mut [Flow<Self::Kinds>], nms: Option<&[Index]>, start: Index, stop: Index) {
        read_range(out, nms, start, stop, self.num_arcs(), |a| self.flow(a));
    }

    /// Read the flow vector in sparse form.
    ///
    /// Only components that are nonzero beyond the flow tolerance are
    /// written to `out`, their names to `nms` in strictly increasing
    /// order, terminated with `Index::MAX` (if there is room). Returns
    /// the number of nonzeroes. For an extreme flow this is at most
    /// `num_nodes() - 1`.
    fn flows_sparse(&self, out: &mut [Flow<Self::Kinds>], nms: &mut [Index]) -> usize;

    /// The reduced cost of one arc (infinite for closed arcs).
    fn reduced_cost(&self, arc: Index) -> Cost<Self::Kinds>;

    /// Read a range of reduced costs.
    fn reduced_costs(&self, out: &mut [Cost<Self::Kinds>], nms: Option<&[Index]>, start: Index, stop: Index) {
        read_range(out, nms, start, stop, self.num_arcs(), |a| self.reduced_cost(a));
    }

    /// The potential of one node (infinite if unreachable).
    fn potential(&self, node: Index) -> Cost<Self::Kinds>;

    /// Read a range of potentials.
    fn potentials(&self, out: &mut [Cost<Self::Kinds>], nms: Option<&[Index]>, start: Index, stop: Index) {
        read_range(out, nms, start, stop, self.num_nodes(), |v| self.potential(v));
    }

    /// The objective value of the latest solution.
    ///
    /// Infinite if the problem is infeasible, negative infinite if it
    /// is unbounded.
    fn objective(&self) -> Obj<Self::Kinds>;

    /// The tail node of an arc (`Index::MAX` if the arc is deleted).
    fn start_node(&self, arc: Index) -> Index;

    /// The head node of an arc (`Index::MAX` if the arc is deleted).
    fn end_node(&self, arc: Index) -> Index;

    /// Read ranges of arc endpoints.
    fn arcs(&self, starts: &mut [Index], ends: &mut [Index], nms: Option<&[Index]>, start: Index, stop: Index) {
        read_range(starts, nms, start, stop, self.num_arcs(), |a| self.start_node(a));
        read_range(ends, nms, start, stop, self.num_arcs(), |a| self.end_node(a));
    }

    /// The linear cost of an arc.
    fn cost(&self, arc: Index) -> Cost<Self::Kinds>;

    /// Read a range of linear costs.
    fn costs(&self, out: &mut [Cost<Self::Kinds>], nms: Option<&[Index]>, start: Index, stop: Index) {
        read_range(out, nms, start, stop, self.num_arcs(), |a| self.cost(a));
    }

    /// The quadratic cost coefficient of an arc (zero for solvers
    /// without quadratic support).
    fn qcoef(&self, _arc: Index) -> Cost<Self::Kinds> {
        Cost::<Self::Kinds>::zero()
    }

    /// Read a range of quadratic cost coefficients.
    fn qcoefs(&self, out: &mut [Cost<Self::Kinds>], nms: Option<&[Index]>, start: Index, stop: Index) {
        read_range(out, nms, start, stop, self.num_arcs(), |a| self.qcoef(a));
    }

    /// The upper capacity of an arc.
    fn ucap(&self, arc: Index) -> Flow<Self::Kinds>;

    /// Read a range of upper capacities.
    fn ucaps(&self, out: &mut [Flow<Self::Kinds>], nms: Option<&[Index]>, start: Index, stop: Index) {
        read_range(out, nms, start, stop, self.num_arcs(), |a| self.ucap(a));
    }

    /// The deficit of a node (positive demand, negative supply).
    fn deficit(&self, node: Index) -> Flow<Self::Kinds>;

    /// Read a range of deficits.
    fn deficits(&self, out: &mut [Flow<Self::Kinds>], nms: Option<&[Index]>, start: Index, stop: Index) {
        read_range(out, nms, start, stop, self.num_nodes(), |v| self.deficit(v));
    }

    /// Whether an arc is currently closed (but not deleted).
    fn is_closed_arc(&self, arc: Index) -> bool;

    /// Whether an arc slot is deleted (available for reuse).
    fn is_deleted_arc(&self, arc: Index) -> bool;

    /// Capture the current solution state.
    fn state(&self) -> McfState<Self::Kinds>;

    /// Restore a solution state captured by [`state`][Mcf::state].
    ///
    /// The instance must hold the same data and topology as when the
    /// snapshot was taken.
    fn put_state(&mut self, state: &McfState<Self::Kinds>) -> Result<()>;

    /// Change the linear cost of one arc.
    fn chg_cost(&mut self, arc: Index, cost: Cost<Self::Kinds>) -> Result<()>;

    /// Change a range of linear costs.
    fn chg_costs(
        &mut self,
        costs: &[Cost<Self::Kinds>],
        nms: Option<&[Index]>,
        start: Index,
        stop: Index,
    ) -> Result<()> {
        write_range(costs, nms, start, stop, self.num_arcs(), |a, c| self.chg_cost(a, c))
    }

    /// Change the quadratic coefficient of one arc.
    ///
    /// Solvers without quadratic support accept only zero.
    fn chg_qcoef(&mut self, _arc: Index, q: Cost<Self::Kinds>) -> Result<()> {
        if q.is_zero() {
            Ok(())
        } else {
            Err(McfError::UnsupportedParam(Param::EpsOpt))
        }
    }

    /// Change a range of quadratic coefficients.
    fn chg_qcoefs(
        &mut self,
        qs: &[Cost<Self::Kinds>],
        nms: Option<&[Index]>,
        start: Index,
        stop: Index,
    ) -> Result<()> {
        write_range(qs, nms, start, stop, self.num_arcs(), |a, q| self.chg_qcoef(a, q))
    }

    /// Change the upper capacity of one arc.
    fn chg_ucap(&mut self, arc: Index, cap: Flow<Self::Kinds>) -> Result<()>;

    /// Change a range of upper capacities.
    fn chg_ucaps(
        &mut self,
        caps: &[Flow<Self::Kinds>],
        nms: Option<&[Index]>,
        start: Index,
        stop: Index,
    ) -> Result<()> {
        write_range(caps, nms, start, stop, self.num_arcs(), |a, u| self.chg_ucap(a, u))
    }

    /// Change the deficit of one node.
    fn chg_dfct(&mut self, node: Index, deficit: Flow<Self::Kinds>) -> Result<()>;

    /// Change a range of deficits.
    fn chg_dfcts(
        &mut self,
        deficits: &[Flow<Self::Kinds>],
        nms: Option<&[Index]>,
        start: Index,
        stop: Index,
    ) -> Result<()> {
        write_range(deficits, nms, start, stop, self.num_nodes(), |v, b| self.chg_dfct(v, b))
    }

    /// Close an arc: it behaves as if it had zero capacity but can be
    /// reopened later.
    fn close_arc(&mut self, arc: Index) -> Result<()>;

    /// Reopen a closed arc. Fails with [`McfError::IllegalTopologyOp`]
    /// on a deleted arc.
    fn open_arc(&mut self, arc: Index) -> Result<()>;

    /// Delete an arc; its name becomes available for reuse.
    fn del_arc(&mut self, arc: Index) -> Result<()>;

    /// Logically delete a node: its incident arcs are closed and its
    /// deficit is set to zero. The name remains reserved.
    fn del_node(&mut self, node: Index) -> Result<()>;

    /// Create a new arc and return its name (the smallest freed name,
    /// or a fresh one).
    fn add_arc(
        &mut self,
        start: Index,
        end: Index,
        cap: Flow<Self::Kinds>,
        cost: Cost<Self::Kinds>,
    ) -> Result<Index>;

    /// Create a new node with the given deficit and return its name.
    fn add_node(&mut self, deficit: Flow<Self::Kinds>) -> Result<Index>;

    /// Reassign the endpoints of an arc. `None` keeps the respective
    /// endpoint.
    fn change_arc(&mut self, arc: Index, new_start: Option<Index>, new_end: Option<Index>) -> Result<()>;

    /// Enable or disable time accounting (resets the accumulated time).
    fn set_timing(&mut self, enabled: bool);

    /// The wall-clock time accumulated over all [`solve`][Mcf::solve]
    /// calls since timing was enabled.
    fn solve_time(&self) -> Duration;
}
