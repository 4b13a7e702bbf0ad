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

//! A shortest-path-tree solver for uncapacitated single-source
//! instances.
//!
//! [`SptTree`] solves min-cost-flow instances with exactly one supply
//! node and effectively unbounded arc capacities: such an instance
//! decomposes into shortest paths from the source to every demand
//! node. The solver computes a shortest path tree with one of four
//! frontier disciplines ([`SptVariant`]) and reconstructs the flow by
//! walking the predecessor chains of the demand nodes.
//!
//! Capacities are ignored. If the instance has arcs with binding
//! capacities or several supply nodes, the result is that of the
//! shortest-path relaxation, not of the original problem.
//!
//! The topology of an instance cannot be edited (such operations fail
//! with [`McfError::IllegalTopologyOp`]); costs and deficits can.
//!
//! A directed cycle of negative cost makes the label-correcting
//! variants loop forever; the label-setting variants (`Dijkstra`,
//! `Heap`) require nonnegative costs. This is not checked.

use crate::collections::{DHeap, ItemPriQueue};
use crate::mcf::{Mcf, McfError, McfState, Param, ParValue, Result, Status, Timer};
use crate::num::{infinite, Cost, Flow, Index, NumKinds, Obj, Tolerance};

use log::debug;
use num_traits::{FromPrimitive, ToPrimitive, Zero};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

const NONE: Index = Index::MAX;
const NO_POS: usize = usize::MAX;

/// The data structure holding the frontier of the tree computation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SptVariant {
    /// FIFO list, label-correcting.
    LQueue,
    /// Two-ended list in Pallottino's discipline, label-correcting.
    LDeque,
    /// Unordered list with minimum extraction by scan, label-setting
    /// (requires nonnegative costs).
    Dijkstra,
    /// d-ary heap (arity 2), label-setting (requires nonnegative
    /// costs).
    Heap,
}

enum LoopExit {
    Done,
    Capped,
}

/// Shortest-path-tree min-cost-flow solver.
///
/// The graph may be directed (default) or undirected; an undirected
/// instance is represented internally by duplicating every arc in the
/// forward star of both endpoints. The duplication is invisible in the
/// public interface: arc names always refer to the loaded arcs.
pub struct SptTree<K: NumKinds = (i64, i64, i64)> {
    nmax: Index,
    mmax: Index,
    n: Index,
    m: Index,
    directed: bool,

    // problem data by arc name; a closed arc has infinite cost
    costs: Vec<Cost<K>>,
    caps: Vec<Flow<K>>,
    starts: Vec<Index>,
    ends: Vec<Index>,
    deleted: Vec<bool>,
    // node deficits
    deficits: Vec<Flow<K>>,

    // forward star: arcs leaving v occupy positions strt_fs[v]..strt_fs[v+1]
    strt_fs: Vec<usize>,
    fs_cost: Vec<Cost<K>>,
    fs_head: Vec<Index>,
    // arc name -> FS positions (two for undirected instances) and back
    dict: Vec<[usize; 2]>,
    dict_inv: Vec<Index>,

    // the tree of the latest computation
    pi: Vec<Cost<K>>,
    pred_node: Vec<Index>,
    pred_arc: Vec<Index>,
    scanned: Vec<bool>,
    flows: Vec<Flow<K>>,
    fo: Obj<K>,
    status: Status,

    variant: SptVariant,
    eps_flw: Tolerance<Flow<K>>,
    eps_cst: Tolerance<Cost<K>>,
    max_iter: usize,
    max_time: f64,
    reopt: bool,
    timer: Timer,
}

impl<K: NumKinds> SptTree<K> {
    /// Create a solver for directed instances.
    pub fn new(nmax: Index, mmax: Index) -> Self {
        Self::with_directedness(nmax, mmax, true)
    }

    /// Create a solver for undirected instances.
    ///
    /// Every arc can be traversed in both directions at its cost.
    pub fn undirected(nmax: Index, mmax: Index) -> Self {
        Self::with_directedness(nmax, mmax, false)
    }

    fn with_directedness(nmax: Index, mmax: Index, directed: bool) -> Self {
        SptTree {
            nmax,
            mmax,
            n: 0,
            m: 0,
            directed,
            costs: vec![],
            caps: vec![],
            starts: vec![],
            ends: vec![],
            deleted: vec![],
            deficits: vec![],
            strt_fs: vec![],
            fs_cost: vec![],
            fs_head: vec![],
            dict: vec![],
            dict_inv: vec![],
            pi: vec![],
            pred_node: vec![],
            pred_arc: vec![],
            scanned: vec![],
            flows: vec![],
            fo: Obj::<K>::zero(),
            status: Status::Unsolved,
            variant: SptVariant::Heap,
            eps_flw: Tolerance::exact(),
            eps_cst: Tolerance::exact(),
            max_iter: 0,
            max_time: 0.0,
            reopt: false,
            timer: Timer::default(),
        }
    }

    /// Select the frontier data structure.
    pub fn set_variant(&mut self, variant: SptVariant) {
        self.variant = variant;
        self.status = Status::Unsolved;
    }

    pub fn variant(&self) -> SptVariant {
        self.variant
    }

    /// The origin used by the latest computation: the first node with
    /// negative deficit.
    fn origin(&self) -> Option<Index> {
        (0..self.n).find(|&v| self.eps_flw.ltz(self.deficits[v as usize]))
    }

    fn destinations(&self) -> Vec<Index> {
        (0..self.n)
            .filter(|&v| self.eps_flw.gtz(self.deficits[v as usize]))
            .collect()
    }

    /// Rebuild the forward-star representation from the arc arrays.
    fn build_fs(&mut self) {
        let n = self.n as usize;
        let entries = if self.directed { 1 } else { 2 };

        let mut count = vec![0usize; n + 1];
        for a in 0..self.m as usize {
            if self.deleted[a] {
                continue;
            }
            count[self.starts[a] as usize + 1] += 1;
            if !self.directed {
                count[self.ends[a] as usize + 1] += 1;
            }
        }
        for v in 0..n {
            count[v + 1] += count[v];
        }
        self.strt_fs = count;

        let total = self.strt_fs[n];
        self.fs_cost = vec![Cost::<K>::zero(); total];
        self.fs_head = vec![NONE; total];
        self.dict = vec![[NO_POS; 2]; self.mmax as usize];
        self.dict_inv = vec![NONE; total];

        let mut next = self.strt_fs.clone();
        for a in 0..self.m as usize {
            if self.deleted[a] {
                continue;
            }
            let pos = next[self.starts[a] as usize];
            next[self.starts[a] as usize] += 1;
            self.fs_cost[pos] = self.costs[a];
            self.fs_head[pos] = self.ends[a];
            self.dict[a][0] = pos;
            self.dict_inv[pos] = a as Index;
            if !self.directed {
                let pos = next[self.ends[a] as usize];
                next[self.ends[a] as usize] += 1;
                self.fs_cost[pos] = self.costs[a];
                self.fs_head[pos] = self.starts[a];
                self.dict[a][1] = pos;
                self.dict_inv[pos] = a as Index;
            }
        }
        debug!("spt: forward star rebuilt, {} entries ({} per arc)", total, entries);
    }

    fn check_arc(&self, arc: Index) -> Result<()> {
        if arc >= self.m || self.deleted[arc as usize] {
            Err(McfError::InvalidName(arc))
        } else {
            Ok(())
        }
    }

    fn check_node(&self, node: Index) -> Result<()> {
        if node >= self.n {
            Err(McfError::InvalidName(node))
        } else {
            Ok(())
        }
    }

    fn init_labels(&mut self, origin: Index) {
        let n = self.n as usize;
        self.pi = vec![infinite::<Cost<K>>(); n];
        self.pred_node = vec![NONE; n];
        self.pred_arc = vec![NONE; n];
        self.scanned = vec![false; n];
        self.pi[origin as usize] = Cost::<K>::zero();
    }

    /// Relax all arcs leaving `u`, pushing improved nodes via `insert`.
    fn scan_node(&mut self, u: Index, mut insert: impl FnMut(&mut Self, Index, Cost<K>, bool)) {
        let du = self.pi[u as usize];
        for pos in self.strt_fs[u as usize]..self.strt_fs[u as usize + 1] {
            let c = self.fs_cost[pos];
            if c == infinite::<Cost<K>>() {
                continue;
            }
            let v = self.fs_head[pos];
            let dv = du + c;
            if dv < self.pi[v as usize] {
                let first = self.pi[v as usize] == infinite::<Cost<K>>();
                self.pi[v as usize] = dv;
                self.pred_node[v as usize] = u;
                self.pred_arc[v as usize] = self.dict_inv[pos];
                insert(&mut *self, v, dv, first);
            }
        }
    }

    fn capped(&self, iter: usize, started: Instant) -> bool {
        (self.max_iter > 0 && iter >= self.max_iter)
            || (self.max_time > 0.0 && started.elapsed().as_secs_f64() >= self.max_time)
    }

    /// Label-correcting search with a FIFO queue or Pallottino's
    /// two-ended discipline.
    fn run_list(&mut self, deque: bool, started: Instant) -> LoopExit {
        let n = self.n as usize;
        let mut in_queue = vec![false; n];
        let mut queue = VecDeque::new();
        for v in 0..n as Index {
            if self.pi[v as usize] < infinite::<Cost<K>>() && !self.scanned[v as usize] {
                queue.push_back(v);
                in_queue[v as usize] = true;
            }
        }

        let mut iter = 0usize;
        while let Some(u) = queue.pop_front() {
            in_queue[u as usize] = false;
            iter += 1;
            self.scan_node(u, |spt, v, _dv, _first| {
                if !in_queue[v as usize] {
                    // a node that already left the queue once goes to
                    // the front (Pallottino)
                    if deque && spt.scanned[v as usize] {
                        queue.push_front(v);
                    } else {
                        queue.push_back(v);
                    }
                    in_queue[v as usize] = true;
                }
            });
            self.scanned[u as usize] = true;
            if self.capped(iter, started) && !queue.is_empty() {
                // nodes still queued are rescheduled on resume
                for &v in queue.iter() {
                    self.scanned[v as usize] = false;
                }
                return LoopExit::Capped;
            }
        }
        LoopExit::Done
    }

    /// Label-setting search, extraction by minimum scan over a list.
    fn run_dijkstra(&mut self, single_dest: Option<Index>, started: Instant) -> LoopExit {
        let n = self.n as usize;
        let mut list: Vec<Index> = (0..n as Index)
            .filter(|&v| self.pi[v as usize] < infinite::<Cost<K>>() && !self.scanned[v as usize])
            .collect();

        let mut iter = 0usize;
        while !list.is_empty() {
            let mut best = 0;
            for i in 1..list.len() {
                if self.pi[list[i] as usize] < self.pi[list[best] as usize] {
                    best = i;
                }
            }
            let u = list.swap_remove(best);
            iter += 1;
            self.scanned[u as usize] = true;
            if single_dest == Some(u) {
                return LoopExit::Done;
            }
            self.scan_node(u, |spt, v, _dv, first| {
                if first && !spt.scanned[v as usize] {
                    list.push(v);
                }
            });
            if self.capped(iter, started) && !list.is_empty() {
                return LoopExit::Capped;
            }
        }
        LoopExit::Done
    }

    /// Label-setting search with the d-ary heap.
    fn run_heap(&mut self, single_dest: Option<Index>, started: Instant) -> LoopExit {
        let n = self.n as usize;
        let mut heap = DHeap::<Index, Cost<K>, u32>::new();
        let mut items: Vec<Option<u32>> = vec![None; n];
        for v in 0..n as Index {
            if self.pi[v as usize] < infinite::<Cost<K>>() && !self.scanned[v as usize] {
                items[v as usize] = Some(heap.push(v, self.pi[v as usize]));
            }
        }

        let mut iter = 0usize;
        while let Some((u, _)) = heap.pop_min() {
            items[u as usize] = None;
            iter += 1;
            self.scanned[u as usize] = true;
            if single_dest == Some(u) {
                return LoopExit::Done;
            }
            self.scan_node(u, |spt, v, dv, _first| {
                if spt.scanned[v as usize] {
                    return;
                }
                match items[v as usize] {
                    Some(ref mut item) => {
                        heap.decrease_key(item, dv);
                    }
                    None => items[v as usize] = Some(heap.push(v, dv)),
                }
            });
            if self.capped(iter, started) && !heap.is_empty() {
                return LoopExit::Capped;
            }
        }
        LoopExit::Done
    }

    /// Accumulate the demand of every destination along its
    /// predecessor path. Returns `false` if a destination is
    /// unreachable.
    fn reconstruct_flows(&mut self) -> bool {
        self.flows = vec![Flow::<K>::zero(); self.mmax as usize];
        let mut pulled = Flow::<K>::zero();

        for d in self.destinations() {
            if self.pi[d as usize] == infinite::<Cost<K>>() {
                debug!("spt: destination {} unreachable", d);
                return false;
            }
            let b = self.deficits[d as usize];
            pulled += b;
            let mut v = d;
            while self.pred_node[v as usize] != NONE {
                let a = self.pred_arc[v as usize];
                self.flows[a as usize] += b;
                v = self.pred_node[v as usize];
            }
        }

        // all supply must sit on the origin
        let supply: Flow<K> = (0..self.n as usize)
            .map(|v| self.deficits[v])
            .filter(|&b| self.eps_flw.ltz(b))
            .fold(Flow::<K>::zero(), |s, b| s + b);
        self.eps_flw.etz(pulled + supply)
    }

    fn compute_fo(&mut self) {
        let mut fo = Obj::<K>::zero();
        for a in 0..self.m as usize {
            if self.deleted[a] || self.costs[a] == infinite::<Cost<K>>() {
                continue;
            }
            if !self.eps_flw.etz(self.flows[a]) {
                fo += K::cost_as_obj(self.costs[a]) * K::flow_as_obj(self.flows[a]);
            }
        }
        self.fo = fo;
    }
}

impl<K: NumKinds> Mcf for SptTree<K> {
    type Kinds = K;

    fn load_net(
        &mut self,
        nmax: Index,
        mmax: Index,
        n: Index,
        m: Index,
        caps: &[Flow<K>],
        costs: &[Cost<K>],
        deficits: &[Flow<K>],
        starts: &[Index],
        ends: &[Index],
    ) -> Result<()> {
        if nmax > 0 {
            self.nmax = nmax;
        }
        if mmax > 0 {
            self.mmax = mmax;
        }
        if n > self.nmax || m > self.mmax {
            return Err(McfError::CapacityExceeded);
        }

        self.n = n;
        self.m = m;
        self.costs = vec![Cost::<K>::zero(); self.mmax as usize];
        self.caps = vec![Flow::<K>::zero(); self.mmax as usize];
        self.starts = vec![NONE; self.mmax as usize];
        self.ends = vec![NONE; self.mmax as usize];
        self.deleted = vec![false; self.mmax as usize];
        self.deficits = vec![Flow::<K>::zero(); self.nmax as usize];

        for a in 0..m as usize {
            if starts[a] >= n || ends[a] >= n {
                return Err(McfError::InvalidName(a as Index));
            }
            self.costs[a] = costs[a];
            self.caps[a] = caps[a];
            self.starts[a] = starts[a];
            self.ends[a] = ends[a];
            if costs[a] == infinite::<Cost<K>>() && caps[a] == infinite::<Flow<K>>() {
                self.deleted[a] = true;
                self.starts[a] = NONE;
                self.ends[a] = NONE;
            }
        }
        self.deficits[..n as usize].copy_from_slice(&deficits[..n as usize]);

        self.build_fs();
        self.pi = vec![infinite::<Cost<K>>(); n as usize];
        self.pred_node = vec![NONE; n as usize];
        self.pred_arc = vec![NONE; n as usize];
        self.scanned = vec![false; n as usize];
        self.flows = vec![Flow::<K>::zero(); self.mmax as usize];
        self.fo = Obj::<K>::zero();
        self.status = Status::Unsolved;
        Ok(())
    }

    fn set_par(&mut self, par: Param, val: ParValue) -> Result<()> {
        match par {
            Param::MaxIter => self.max_iter = val.as_int().max(0) as usize,
            Param::MaxTime => self.max_time = val.as_flt(),
            Param::EpsFlw => {
                self.eps_flw = Tolerance::new(Flow::<K>::from_f64(val.as_flt()).ok_or(McfError::Numerical)?)
            }
            Param::EpsCst => {
                self.eps_cst = Tolerance::new(Cost::<K>::from_f64(val.as_flt()).ok_or(McfError::Numerical)?)
            }
            Param::Reopt => self.reopt = val.as_int() != 0,
            Param::SptVariant => {
                self.set_variant(match val.as_int() {
                    0 => SptVariant::LQueue,
                    1 => SptVariant::LDeque,
                    2 => SptVariant::Dijkstra,
                    3 => SptVariant::Heap,
                    _ => return Err(McfError::UnsupportedParam(par)),
                });
            }
            _ => return Err(McfError::UnsupportedParam(par)),
        }
        Ok(())
    }

    fn get_par(&self, par: Param) -> Result<ParValue> {
        Ok(match par {
            Param::MaxIter => ParValue::Int(self.max_iter as i64),
            Param::MaxTime => ParValue::Flt(self.max_time),
            Param::EpsFlw => ParValue::Flt(self.eps_flw.eps().to_f64().unwrap_or(0.0)),
            Param::EpsCst => ParValue::Flt(self.eps_cst.eps().to_f64().unwrap_or(0.0)),
            Param::Reopt => ParValue::Int(self.reopt as i64),
            Param::SptVariant => ParValue::Int(match self.variant {
                SptVariant::LQueue => 0,
                SptVariant::LDeque => 1,
                SptVariant::Dijkstra => 2,
                SptVariant::Heap => 3,
            }),
            _ => return Err(McfError::UnsupportedParam(par)),
        })
    }

    fn solve(&mut self) -> Status {
        let started_timer = self.timer.start();
        let started = Instant::now();

        let origin = match self.origin() {
            Some(o) => o,
            None => {
                // no supply: feasible iff there is no demand either
                self.flows = vec![Flow::<K>::zero(); self.mmax as usize];
                self.status = if self.destinations().is_empty() {
                    self.fo = Obj::<K>::zero();
                    Status::Optimal
                } else {
                    self.fo = infinite::<Obj<K>>();
                    Status::Infeasible
                };
                self.timer.stop(started_timer);
                return self.status;
            }
        };

        if self.status != Status::Stopped {
            self.init_labels(origin);
        }

        let dests = self.destinations();
        // with a unique destination the label-setting variants may
        // stop as soon as it is extracted
        let single_dest = match self.variant {
            SptVariant::Dijkstra | SptVariant::Heap if dests.len() == 1 => Some(dests[0]),
            _ => None,
        };

        debug!(
            "spt: solving from origin {} to {} destinations ({:?})",
            origin,
            dests.len(),
            self.variant
        );

        let exit = match self.variant {
            SptVariant::LQueue => self.run_list(false, started),
            SptVariant::LDeque => self.run_list(true, started),
            SptVariant::Dijkstra => self.run_dijkstra(single_dest, started),
            SptVariant::Heap => self.run_heap(single_dest, started),
        };

        self.status = match exit {
            LoopExit::Capped => Status::Stopped,
            LoopExit::Done => {
                if self.reconstruct_flows() {
                    self.compute_fo();
                    Status::Optimal
                } else {
                    self.fo = infinite::<Obj<K>>();
                    Status::Infeasible
                }
            }
        };
        self.timer.stop(started_timer);
        self.status
    }

    fn status(&self) -> Status {
        self.status
    }

    fn num_nodes(&self) -> Index {
        self.n
    }

    fn num_arcs(&self) -> Index {
        self.m
    }

    fn flow(&self, arc: Index) -> Flow<K> {
        self.flows[arc as usize]
    }

    fn flows_sparse(&self, out: &mut [Flow<K>], nms: &mut [Index]) -> usize {
        let mut k = 0;
        for a in 0..self.m as usize {
            if !self.deleted[a] && !self.eps_flw.etz(self.flows[a]) {
                out[k] = self.flows[a];
                nms[k] = a as Index;
                k += 1;
            }
        }
        if k < nms.len() {
            nms[k] = NONE;
        }
        k
    }

    fn reduced_cost(&self, arc: Index) -> Cost<K> {
        let a = arc as usize;
        if self.deleted[a] || self.costs[a] == infinite::<Cost<K>>() {
            return infinite::<Cost<K>>();
        }
        let (pu, pv) = (self.pi[self.starts[a] as usize], self.pi[self.ends[a] as usize]);
        if pu == infinite::<Cost<K>>() || pv == infinite::<Cost<K>>() {
            return infinite::<Cost<K>>();
        }
        self.costs[a] - (pv - pu)
    }

    fn potential(&self, node: Index) -> Cost<K> {
        self.pi[node as usize]
    }

    fn objective(&self) -> Obj<K> {
        self.fo
    }

    fn start_node(&self, arc: Index) -> Index {
        self.starts[arc as usize]
    }

    fn end_node(&self, arc: Index) -> Index {
        self.ends[arc as usize]
    }

    fn cost(&self, arc: Index) -> Cost<K> {
        self.costs[arc as usize]
    }

    fn ucap(&self, arc: Index) -> Flow<K> {
        self.caps[arc as usize]
    }

    fn deficit(&self, node: Index) -> Flow<K> {
        self.deficits[node as usize]
    }

    fn is_closed_arc(&self, arc: Index) -> bool {
        let a = arc as usize;
        arc < self.m && !self.deleted[a] && self.costs[a] == infinite::<Cost<K>>()
    }

    fn is_deleted_arc(&self, arc: Index) -> bool {
        arc < self.m && self.deleted[arc as usize]
    }

    fn state(&self) -> McfState<K> {
        McfState {
            flows: self.flows[..self.m as usize].to_vec(),
            red_costs: Some(self.pi.clone()),
            basis: None,
        }
    }

    fn put_state(&mut self, state: &McfState<K>) -> Result<()> {
        if state.flows.len() != self.m as usize {
            return Err(McfError::IllegalTopologyOp);
        }
        let pi = state.red_costs.as_ref().ok_or(McfError::IllegalTopologyOp)?;
        if pi.len() != self.n as usize {
            return Err(McfError::IllegalTopologyOp);
        }
        self.flows[..self.m as usize].copy_from_slice(&state.flows);
        self.pi = pi.clone();
        self.compute_fo();
        self.status = Status::Optimal;
        Ok(())
    }

    fn chg_cost(&mut self, arc: Index, cost: Cost<K>) -> Result<()> {
        self.check_arc(arc)?;
        let a = arc as usize;
        self.costs[a] = cost;
        for &pos in self.dict[a].iter() {
            if pos != NO_POS {
                self.fs_cost[pos] = cost;
            }
        }
        self.status = Status::Unsolved;
        Ok(())
    }

    fn chg_ucap(&mut self, arc: Index, cap: Flow<K>) -> Result<()> {
        // capacities do not constrain the shortest path relaxation
        self.check_arc(arc)?;
        self.caps[arc as usize] = cap;
        Ok(())
    }

    fn chg_dfct(&mut self, node: Index, deficit: Flow<K>) -> Result<()> {
        self.check_node(node)?;
        self.deficits[node as usize] = deficit;
        self.status = Status::Unsolved;
        Ok(())
    }

    fn close_arc(&mut self, arc: Index) -> Result<()> {
        self.check_arc(arc)?;
        Err(McfError::IllegalTopologyOp)
    }

    fn open_arc(&mut self, arc: Index) -> Result<()> {
        if arc >= self.m {
            return Err(McfError::InvalidName(arc));
        }
        Err(McfError::IllegalTopologyOp)
    }

    fn del_arc(&mut self, arc: Index) -> Result<()> {
        self.check_arc(arc)?;
        Err(McfError::IllegalTopologyOp)
    }

    fn del_node(&mut self, node: Index) -> Result<()> {
        self.check_node(node)?;
        Err(McfError::IllegalTopologyOp)
    }

    fn add_arc(&mut self, _start: Index, _end: Index, _cap: Flow<K>, _cost: Cost<K>) -> Result<Index> {
        Err(McfError::IllegalTopologyOp)
    }

    fn add_node(&mut self, _deficit: Flow<K>) -> Result<Index> {
        Err(McfError::IllegalTopologyOp)
    }

    fn change_arc(&mut self, arc: Index, _new_start: Option<Index>, _new_end: Option<Index>) -> Result<()> {
        self.check_arc(arc)?;
        Err(McfError::IllegalTopologyOp)
    }

    fn set_timing(&mut self, enabled: bool) {
        self.timer.set_enabled(enabled);
    }

    fn solve_time(&self) -> Duration {
        self.timer.total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Spt = SptTree<(i64, i64, i64)>;

    /// 0 supplies 3 units; 1 and 3 demand over a diamond.
    fn diamond() -> Spt {
        let mut spt = Spt::new(4, 5);
        spt.load_net(
            4,
            5,
            4,
            5,
            &[100, 100, 100, 100, 100],
            &[1, 4, 1, 1, 5],
            &[-3, 1, 0, 2],
            &[0, 0, 1, 2, 0],
            &[1, 2, 2, 3, 3],
        )
        .unwrap();
        spt
    }

    #[test]
    fn all_variants_agree() {
        for variant in [
            SptVariant::LQueue,
            SptVariant::LDeque,
            SptVariant::Dijkstra,
            SptVariant::Heap,
        ]
        .iter()
        {
            let mut spt = diamond();
            spt.set_variant(*variant);
            assert_eq!(spt.solve(), Status::Optimal, "variant {:?}", variant);
            // shortest distances from node 0
            assert_eq!(spt.potential(0), 0);
            assert_eq!(spt.potential(1), 1);
            assert_eq!(spt.potential(2), 2);
            assert_eq!(spt.potential(3), 3);
            // 1 unit to node 1, 2 units to node 3 via 0->1->2->3
            assert_eq!(spt.flow(0), 3);
            assert_eq!(spt.flow(2), 2);
            assert_eq!(spt.flow(3), 2);
            assert_eq!(spt.objective(), 1 * 1 + 2 * 3);
        }
    }

    #[test]
    fn tree_arcs_have_zero_reduced_cost() {
        let mut spt = diamond();
        assert_eq!(spt.solve(), Status::Optimal);
        for a in 0..spt.num_arcs() {
            let rc = spt.reduced_cost(a);
            assert!(rc >= 0);
            if spt.flow(a) > 0 {
                assert_eq!(rc, 0);
            }
        }
    }

    #[test]
    fn unreachable_destination_is_infeasible() {
        let mut spt = Spt::new(3, 1);
        spt.load_net(3, 1, 3, 1, &[10], &[2], &[-1, 1, 0], &[0], &[1]).unwrap();
        assert_eq!(spt.solve(), Status::Optimal);

        let mut spt = Spt::new(3, 1);
        spt.load_net(3, 1, 3, 1, &[10], &[2], &[-1, 0, 1], &[0], &[1]).unwrap();
        assert_eq!(spt.solve(), Status::Infeasible);
        assert_eq!(spt.objective(), infinite::<i64>());
        // partial potentials are still available
        assert_eq!(spt.potential(1), 2);
        assert_eq!(spt.potential(2), infinite::<i64>());
    }

    #[test]
    fn undirected_arcs_work_both_ways() {
        let mut spt = SptTree::<(i64, i64, i64)>::undirected(3, 2);
        // arcs 1->0 and 1->2, but the instance is undirected
        spt.load_net(3, 2, 3, 2, &[10, 10], &[3, 4], &[-1, 0, 1], &[1, 1], &[0, 2])
            .unwrap();
        assert_eq!(spt.solve(), Status::Optimal);
        assert_eq!(spt.potential(2), 7);
        assert_eq!(spt.objective(), 7);
        assert_eq!(spt.flow(0), 1);
        assert_eq!(spt.flow(1), 1);
    }

    #[test]
    fn closed_arcs_are_skipped() {
        let mut spt = Spt::new(3, 3);
        spt.load_net(
            3,
            3,
            3,
            3,
            &[10, 10, 10],
            &[1, infinite::<i64>(), 10],
            &[-1, 0, 1],
            &[0, 1, 0],
            &[1, 2, 2],
        )
        .unwrap();
        assert!(spt.is_closed_arc(1));
        assert_eq!(spt.solve(), Status::Optimal);
        // must take the expensive direct arc
        assert_eq!(spt.potential(2), 10);
        assert_eq!(spt.reduced_cost(1), infinite::<i64>());
    }

    #[test]
    fn cost_edit_resets_status() {
        let mut spt = diamond();
        assert_eq!(spt.solve(), Status::Optimal);
        spt.chg_cost(4, 2).unwrap();
        assert_eq!(spt.status(), Status::Unsolved);
        assert_eq!(spt.solve(), Status::Optimal);
        // now the direct arc 0->3 is cheapest
        assert_eq!(spt.potential(3), 2);
        assert_eq!(spt.objective(), 1 + 2 * 2);
    }

    #[test]
    fn topology_edits_are_rejected() {
        let mut spt = diamond();
        assert_eq!(spt.close_arc(0), Err(McfError::IllegalTopologyOp));
        assert_eq!(spt.del_arc(0), Err(McfError::IllegalTopologyOp));
        assert_eq!(spt.add_node(0), Err(McfError::IllegalTopologyOp));
        assert_eq!(spt.close_arc(99), Err(McfError::InvalidName(99)));
    }
}
