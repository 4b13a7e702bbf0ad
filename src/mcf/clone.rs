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

//! An adapter that drives two solvers in lockstep.
//!
//! [`McfClone`] forwards every operation to a *master* and a *slave*
//! solver and answers every query from the master. It performs no
//! consistency checks itself; it exists so that an external
//! differential harness can compare two solvers on identical
//! operation sequences, including incremental edits and warm starts.
//!
//! Mutations are applied master first, except [`Mcf::add_node`] and
//! [`Mcf::add_arc`], where the slave goes first so that the name
//! returned by the master is authoritative either way.

use crate::mcf::{Mcf, McfState, Param, ParValue, Result, Status};
use crate::num::{Cost, Flow, Index, Obj};

use std::time::Duration;

/// A solver pair behaving like its master.
pub struct McfClone<M, S> {
    master: M,
    slave: S,
}

impl<M, S> McfClone<M, S>
where
    M: Mcf,
    S: Mcf<Kinds = M::Kinds>,
{
    pub fn new(master: M, slave: S) -> Self {
        McfClone { master, slave }
    }

    pub fn master(&self) -> &M {
        &self.master
    }

    pub fn slave(&self) -> &S {
        &self.slave
    }

    pub fn into_inner(self) -> (M, S) {
        (self.master, self.slave)
    }
}

impl<M, S> Mcf for McfClone<M, S>
where
    M: Mcf,
    S: Mcf<Kinds = M::Kinds>,
{
    type Kinds = M::Kinds;

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
    ) -> Result<()> {
        self.master
            .load_net(nmax, mmax, n, m, caps, costs, deficits, starts, ends)?;
        self.slave.load_net(nmax, mmax, n, m, caps, costs, deficits, starts, ends)
    }

    fn pre_process(&mut self) -> Result<()> {
        self.master.pre_process()?;
        self.slave.pre_process()
    }

    fn set_par(&mut self, par: Param, val: ParValue) -> Result<()> {
        let master = self.master.set_par(par, val);
        // a parameter may be meaningful for only one of the two
        let slave = self.slave.set_par(par, val);
        master.or(slave)
    }

    fn get_par(&self, par: Param) -> Result<ParValue> {
        self.master.get_par(par)
    }

    fn solve(&mut self) -> Status {
        let status = self.master.solve();
        self.slave.solve();
        status
    }

    fn status(&self) -> Status {
        self.master.status()
    }

    fn num_nodes(&self) -> Index {
        self.master.num_nodes()
    }

    fn num_arcs(&self) -> Index {
        self.master.num_arcs()
    }

    fn flow(&self, arc: Index) -> Flow<Self::Kinds> {
        self.master.flow(arc)
    }

    fn flows_sparse(&self, out: &mut [Flow<Self::Kinds>], nms: &mut [Index]) -> usize {
        self.master.flows_sparse(out, nms)
    }

    fn reduced_cost(&self, arc: Index) -> Cost<Self::Kinds> {
        self.master.reduced_cost(arc)
    }

    fn potential(&self, node: Index) -> Cost<Self::Kinds> {
        self.master.potential(node)
    }

    fn objective(&self) -> Obj<Self::Kinds> {
        self.master.objective()
    }

    fn start_node(&self, arc: Index) -> Index {
        self.master.start_node(arc)
    }

    fn end_node(&self, arc: Index) -> Index {
        self.master.end_node(arc)
    }

    fn cost(&self, arc: Index) -> Cost<Self::Kinds> {
        self.master.cost(arc)
    }

    fn qcoef(&self, arc: Index) -> Cost<Self::Kinds> {
        self.master.qcoef(arc)
    }

    fn ucap(&self, arc: Index) -> Flow<Self::Kinds> {
        self.master.ucap(arc)
    }

    fn deficit(&self, node: Index) -> Flow<Self::Kinds> {
        self.master.deficit(node)
    }

    fn is_closed_arc(&self, arc: Index) -> bool {
        self.master.is_closed_arc(arc)
    }

    fn is_deleted_arc(&self, arc: Index) -> bool {
        self.master.is_deleted_arc(arc)
    }

    fn state(&self) -> McfState<Self::Kinds> {
        self.master.state()
    }

    fn put_state(&mut self, state: &McfState<Self::Kinds>) -> Result<()> {
        // the snapshot layout is master-specific, so the slave cannot
        // restore it; it re-solves from its own state instead
        self.master.put_state(state)
    }

    fn chg_cost(&mut self, arc: Index, cost: Cost<Self::Kinds>) -> Result<()> {
        self.master.chg_cost(arc, cost)?;
        self.slave.chg_cost(arc, cost)
    }

    fn chg_qcoef(&mut self, arc: Index, q: Cost<Self::Kinds>) -> Result<()> {
        self.master.chg_qcoef(arc, q)?;
        self.slave.chg_qcoef(arc, q)
    }

    fn chg_ucap(&mut self, arc: Index, cap: Flow<Self::Kinds>) -> Result<()> {
        self.master.chg_ucap(arc, cap)?;
        self.slave.chg_ucap(arc, cap)
    }

    fn chg_dfct(&mut self, node: Index, deficit: Flow<Self::Kinds>) -> Result<()> {
        self.master.chg_dfct(node, deficit)?;
        self.slave.chg_dfct(node, deficit)
    }

    fn close_arc(&mut self, arc: Index) -> Result<()> {
        self.master.close_arc(arc)?;
        self.slave.close_arc(arc)
    }

    fn open_arc(&mut self, arc: Index) -> Result<()> {
        self.master.open_arc(arc)?;
        self.slave.open_arc(arc)
    }

    fn del_arc(&mut self, arc: Index) -> Result<()> {
        self.master.del_arc(arc)?;
        self.slave.del_arc(arc)
    }

    fn del_node(&mut self, node: Index) -> Result<()> {
        self.master.del_node(node)?;
        self.slave.del_node(node)
    }

    fn add_arc(
        &mut self,
        start: Index,
        end: Index,
        cap: Flow<Self::Kinds>,
        cost: Cost<Self::Kinds>,
    ) -> Result<Index> {
        self.slave.add_arc(start, end, cap, cost)?;
        self.master.add_arc(start, end, cap, cost)
    }

    fn add_node(&mut self, deficit: Flow<Self::Kinds>) -> Result<Index> {
        self.slave.add_node(deficit)?;
        self.master.add_node(deficit)
    }

    fn change_arc(&mut self, arc: Index, new_start: Option<Index>, new_end: Option<Index>) -> Result<()> {
        self.master.change_arc(arc, new_start, new_end)?;
        self.slave.change_arc(arc, new_start, new_end)
    }

    fn set_timing(&mut self, enabled: bool) {
        self.master.set_timing(enabled);
        self.slave.set_timing(enabled);
    }

    /// The sum of the times of both solvers.
    fn solve_time(&self) -> Duration {
        self.master.solve_time() + self.slave.solve_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcf::{NetSimplex, RelaxIv};

    #[test]
    fn clone_answers_like_the_master() {
        let mut both = McfClone::new(NetSimplex::<(i64, i64, i64)>::new(4, 4), RelaxIv::new(4, 4));
        both.load_net(
            4,
            4,
            4,
            4,
            &[5, 5, 5, 5],
            &[1, 1, 4, 4],
            &[-3, 0, 0, 3],
            &[0, 1, 0, 2],
            &[1, 3, 2, 3],
        )
        .unwrap();
        assert_eq!(both.solve(), Status::Optimal);
        assert_eq!(both.objective(), 6);
        assert_eq!(both.master().objective(), both.slave().objective());

        both.chg_cost(0, 9).unwrap();
        assert_eq!(both.solve(), Status::Optimal);
        assert_eq!(both.master().objective(), both.slave().objective());
    }

    #[test]
    fn add_arc_names_agree() {
        let mut both = McfClone::new(NetSimplex::<(i64, i64, i64)>::new(3, 4), RelaxIv::new(3, 4));
        both.load_net(3, 4, 3, 2, &[5, 5], &[1, 1], &[-1, 0, 1], &[0, 1], &[1, 2])
            .unwrap();
        both.del_arc(0).unwrap();
        let name = both.add_arc(0, 1, 5, 2).unwrap();
        assert_eq!(name, 0);
        assert_eq!(both.master().start_node(0), both.slave().start_node(0));
        assert_eq!(both.solve(), Status::Optimal);
        assert_eq!(both.objective(), 3);
    }
}
