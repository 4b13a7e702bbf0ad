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

//! A relaxation (primal-dual) solver for linear min-cost-flow.
//!
//! [`RelaxIv`] keeps a *pseudoflow*: a flow vector within the arc
//! bounds that satisfies complementary slackness with the current
//! potentials but not necessarily flow conservation. An arc with
//! reduced cost beyond the cost tolerance is pinned to the matching
//! bound; arcs with reduced cost within the tolerance are *balanced*
//! and form the subgraph along which flow may move freely.
//!
//! The residual deficit of a node is its unmet demand,
//! `dfct[v] = b[v] + outflow - inflow`, zero for all nodes exactly
//! when the pseudoflow is a flow. The solver repeatedly picks a node
//! with positive deficit and searches the balanced subgraph for a
//! node with negative deficit; either flow is augmented along the
//! path found, or the scanned set yields a dual ascent step that
//! brings new arcs into the balanced subgraph. If no ascent step
//! exists the instance is infeasible.
//!
//! All edits warm start: the pseudoflow and the reduced costs are
//! kept, the invariants are re-established and the next solve resumes
//! from them. The algorithm is exact for integer kinds; for floating
//! kinds convergence is governed by the tolerances and is not
//! guaranteed.

use crate::mcf::{Mcf, McfError, McfState, Param, ParValue, Result, Status, Timer};
use crate::num::{infinite, max, min, Cost, Flow, Index, NumKinds, Obj, SIndex, Tolerance};

use log::{debug, trace, warn};
use num_traits::{FromPrimitive, One, ToPrimitive, Zero};
use std::time::{Duration, Instant};

const NONE: Index = Index::MAX;

enum SearchResult {
    Augmented,
    Ascended,
    NoCut,
}

/// Relaxation min-cost-flow solver (linear costs only).
pub struct RelaxIv<K: NumKinds = (i64, i64, i64)> {
    nmax: Index,
    mmax: Index,
    n: Index,
    m: Index,

    // arc data; a deleted slot has start == NONE and its end field
    // threads the free-name list (smallest first); a closed arc keeps
    // its cost but reads an infinite reduced cost
    start: Vec<Index>,
    end: Vec<Index>,
    cap: Vec<Flow<K>>,
    x: Vec<Flow<K>>,
    cost: Vec<Cost<K>>,
    rc: Vec<Cost<K>>,

    // node data
    b: Vec<Flow<K>>,
    dfct: Vec<Flow<K>>,
    pi: Vec<Cost<K>>,

    // forward/backward star lists
    fou: Vec<Index>,
    nxtou: Vec<Index>,
    fin: Vec<Index>,
    nxtin: Vec<Index>,

    // doubly linked lists of the balanced arcs per node
    tfstou: Vec<Index>,
    tnxtou: Vec<Index>,
    tprvou: Vec<Index>,
    tfstin: Vec<Index>,
    tnxtin: Vec<Index>,
    tprvin: Vec<Index>,
    balanced: Vec<bool>,

    first_free: Index,

    // search workspace
    scan_stamp: Vec<u64>,
    stamp: u64,
    prdcsr: Vec<SIndex>,
    queue: Vec<Index>,

    crash: bool,
    reopt: bool,
    need_cold: bool,
    eps_flw: Tolerance<Flow<K>>,
    eps_cst: Tolerance<Cost<K>>,
    max_iter: usize,
    max_time: f64,

    status: Status,
    fo: Obj<K>,
    iters: u64,
    num_augm: u64,
    timer: Timer,
}

impl<K: NumKinds> RelaxIv<K> {
    pub fn new(nmax: Index, mmax: Index) -> Self {
        let mut rlx = RelaxIv {
            nmax: 0,
            mmax: 0,
            n: 0,
            m: 0,
            start: vec![],
            end: vec![],
            cap: vec![],
            x: vec![],
            cost: vec![],
            rc: vec![],
            b: vec![],
            dfct: vec![],
            pi: vec![],
            fou: vec![],
            nxtou: vec![],
            fin: vec![],
            nxtin: vec![],
            tfstou: vec![],
            tnxtou: vec![],
            tprvou: vec![],
            tfstin: vec![],
            tnxtin: vec![],
            tprvin: vec![],
            balanced: vec![],
            first_free: NONE,
            scan_stamp: vec![],
            stamp: 0,
            prdcsr: vec![],
            queue: vec![],
            crash: false,
            reopt: true,
            need_cold: true,
            eps_flw: Tolerance::exact(),
            eps_cst: Tolerance::exact(),
            max_iter: 0,
            max_time: 0.0,
            status: Status::Unsolved,
            fo: Obj::<K>::zero(),
            iters: 0,
            num_augm: 0,
            timer: Timer::default(),
        };
        rlx.alloc(nmax, mmax);
        rlx
    }

    /// Total number of single-node and multinode iterations.
    pub fn iterations(&self) -> u64 {
        self.iters
    }

    /// Number of flow augmentation steps.
    pub fn augmentations(&self) -> u64 {
        self.num_augm
    }

    fn alloc(&mut self, nmax: Index, mmax: Index) {
        self.nmax = nmax;
        self.mmax = mmax;
        let na = nmax as usize;
        let ma = mmax as usize;
        self.start = vec![NONE; ma];
        self.end = vec![NONE; ma];
        self.cap = vec![Flow::<K>::zero(); ma];
        self.x = vec![Flow::<K>::zero(); ma];
        self.cost = vec![Cost::<K>::zero(); ma];
        self.rc = vec![Cost::<K>::zero(); ma];
        self.b = vec![Flow::<K>::zero(); na];
        self.dfct = vec![Flow::<K>::zero(); na];
        self.pi = vec![Cost::<K>::zero(); na];
        self.fou = vec![NONE; na];
        self.nxtou = vec![NONE; ma];
        self.fin = vec![NONE; na];
        self.nxtin = vec![NONE; ma];
        self.tfstou = vec![NONE; na];
        self.tnxtou = vec![NONE; ma];
        self.tprvou = vec![NONE; ma];
        self.tfstin = vec![NONE; na];
        self.tnxtin = vec![NONE; ma];
        self.tprvin = vec![NONE; ma];
        self.balanced = vec![false; ma];
        self.scan_stamp = vec![0; na];
        self.prdcsr = vec![0; na];
        self.first_free = NONE;
        self.stamp = 0;
    }

    fn check_arc(&self, arc: Index) -> Result<()> {
        if arc >= self.m || self.start[arc as usize] == NONE {
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

    fn is_closed(&self, a: usize) -> bool {
        self.rc[a] == infinite::<Cost<K>>()
    }

    fn residual(&self, a: usize) -> Flow<K> {
        if self.cap[a] == infinite::<Flow<K>>() {
            infinite::<Flow<K>>()
        } else {
            self.cap[a] - self.x[a]
        }
    }

    // ---------------------------------------------------------------
    // adjacency and balanced lists
    // ---------------------------------------------------------------

    fn link_arc(&mut self, a: Index) {
        let (t, h) = (self.start[a as usize], self.end[a as usize]);
        self.nxtou[a as usize] = self.fou[t as usize];
        self.fou[t as usize] = a;
        self.nxtin[a as usize] = self.fin[h as usize];
        self.fin[h as usize] = a;
    }

    fn unlink_arc(&mut self, a: Index) {
        let t = self.start[a as usize] as usize;
        let mut cur = self.fou[t];
        if cur == a {
            self.fou[t] = self.nxtou[a as usize];
        } else {
            while self.nxtou[cur as usize] != a {
                cur = self.nxtou[cur as usize];
            }
            self.nxtou[cur as usize] = self.nxtou[a as usize];
        }
        let h = self.end[a as usize] as usize;
        let mut cur = self.fin[h];
        if cur == a {
            self.fin[h] = self.nxtin[a as usize];
        } else {
            while self.nxtin[cur as usize] != a {
                cur = self.nxtin[cur as usize];
            }
            self.nxtin[cur as usize] = self.nxtin[a as usize];
        }
    }

    fn bal_insert(&mut self, a: Index) {
        let au = a as usize;
        let (t, h) = (self.start[au] as usize, self.end[au] as usize);
        self.tprvou[au] = NONE;
        self.tnxtou[au] = self.tfstou[t];
        if self.tfstou[t] != NONE {
            self.tprvou[self.tfstou[t] as usize] = a;
        }
        self.tfstou[t] = a;
        self.tprvin[au] = NONE;
        self.tnxtin[au] = self.tfstin[h];
        if self.tfstin[h] != NONE {
            self.tprvin[self.tfstin[h] as usize] = a;
        }
        self.tfstin[h] = a;
        self.balanced[au] = true;
    }

    fn bal_remove(&mut self, a: Index) {
        let au = a as usize;
        let (t, h) = (self.start[au] as usize, self.end[au] as usize);
        if self.tprvou[au] == NONE {
            self.tfstou[t] = self.tnxtou[au];
        } else {
            self.tnxtou[self.tprvou[au] as usize] = self.tnxtou[au];
        }
        if self.tnxtou[au] != NONE {
            self.tprvou[self.tnxtou[au] as usize] = self.tprvou[au];
        }
        if self.tprvin[au] == NONE {
            self.tfstin[h] = self.tnxtin[au];
        } else {
            self.tnxtin[self.tprvin[au] as usize] = self.tnxtin[au];
        }
        if self.tnxtin[au] != NONE {
            self.tprvin[self.tnxtin[au] as usize] = self.tprvin[au];
        }
        self.balanced[au] = false;
    }

    /// Update the reduced cost of an arc, splicing it into or out of
    /// the balanced lists when it crosses the tolerance threshold.
    fn set_rc(&mut self, a: Index, rc: Cost<K>) {
        let au = a as usize;
        self.rc[au] = rc;
        let now = rc != infinite::<Cost<K>>() && self.eps_cst.etz(rc);
        if now != self.balanced[au] {
            if now {
                self.bal_insert(a);
            } else {
                self.bal_remove(a);
            }
        }
    }

    fn rebuild_balanced_lists(&mut self) {
        for v in 0..self.n as usize {
            self.tfstou[v] = NONE;
            self.tfstin[v] = NONE;
        }
        for a in 0..self.m as usize {
            self.balanced[a] = false;
        }
        for a in 0..self.m {
            let au = a as usize;
            if self.start[au] != NONE && !self.is_closed(au) && self.eps_cst.etz(self.rc[au]) {
                self.bal_insert(a);
            }
        }
    }

    // ---------------------------------------------------------------
    // pseudoflow maintenance
    // ---------------------------------------------------------------

    fn set_flow(&mut self, a: usize, nx: Flow<K>) {
        let delta = nx - self.x[a];
        self.dfct[self.start[a] as usize] += delta;
        self.dfct[self.end[a] as usize] -= delta;
        self.x[a] = nx;
    }

    fn recompute_dfct(&mut self) {
        for v in 0..self.n as usize {
            self.dfct[v] = self.b[v];
        }
        for a in 0..self.m as usize {
            if self.start[a] != NONE {
                self.dfct[self.start[a] as usize] += self.x[a];
                self.dfct[self.end[a] as usize] -= self.x[a];
            }
        }
    }

    /// Force every live arc to the bound dictated by its reduced
    /// cost. Returns `false` on a negative reduced cost arc of
    /// infinite capacity (the dual direction is unbounded).
    fn enforce_complementarity(&mut self) -> bool {
        for a in 0..self.m as usize {
            if self.start[a] == NONE || self.is_closed(a) {
                continue;
            }
            if self.eps_cst.gtz(self.rc[a]) {
                if !self.x[a].is_zero() {
                    self.set_flow(a, Flow::<K>::zero());
                }
            } else if self.eps_cst.ltz(self.rc[a]) {
                if self.cap[a] == infinite::<Flow<K>>() {
                    return false;
                }
                if self.x[a] != self.cap[a] {
                    self.set_flow(a, self.cap[a]);
                }
            }
        }
        true
    }

    fn cold_init(&mut self) {
        for v in 0..self.n as usize {
            self.pi[v] = Cost::<K>::zero();
        }
        for a in 0..self.m as usize {
            if self.start[a] == NONE {
                continue;
            }
            self.x[a] = Flow::<K>::zero();
            if !self.is_closed(a) {
                self.rc[a] = self.cost[a];
            }
        }
        self.need_cold = false;
    }

    // ---------------------------------------------------------------
    // single-node relaxation
    // ---------------------------------------------------------------

    /// Move flow over the balanced arcs incident to `v` towards a zero
    /// deficit.
    ///
    /// A demand node first pulls over incoming balanced arcs with
    /// residual capacity, then cancels outgoing flow; a supply node
    /// mirrors this, preferring to push out before cancelling inflow.
    fn push_at(&mut self, v: Index) {
        let demand = self.eps_flw.gtz(self.dfct[v as usize]);
        if demand {
            self.pull_in(v);
            self.cancel_out(v);
        } else {
            self.push_out(v);
            self.cancel_in(v);
        }
    }

    fn pull_in(&mut self, v: Index) {
        let mut a = self.tfstin[v as usize];
        while a != NONE {
            let au = a as usize;
            if !self.eps_flw.gtz(self.dfct[v as usize]) {
                return;
            }
            let d = min(self.dfct[v as usize], self.residual(au));
            if self.eps_flw.gtz(d) {
                self.set_flow(au, self.x[au] + d);
            }
            a = self.tnxtin[au];
        }
    }

    fn cancel_out(&mut self, v: Index) {
        let mut a = self.tfstou[v as usize];
        while a != NONE {
            let au = a as usize;
            if !self.eps_flw.gtz(self.dfct[v as usize]) {
                return;
            }
            let d = min(self.dfct[v as usize], self.x[au]);
            if self.eps_flw.gtz(d) {
                self.set_flow(au, self.x[au] - d);
            }
            a = self.tnxtou[au];
        }
    }

    fn push_out(&mut self, v: Index) {
        let mut a = self.tfstou[v as usize];
        while a != NONE {
            let au = a as usize;
            if !self.eps_flw.ltz(self.dfct[v as usize]) {
                return;
            }
            let d = min(-self.dfct[v as usize], self.residual(au));
            if self.eps_flw.gtz(d) {
                self.set_flow(au, self.x[au] + d);
            }
            a = self.tnxtou[au];
        }
    }

    fn cancel_in(&mut self, v: Index) {
        let mut a = self.tfstin[v as usize];
        while a != NONE {
            let au = a as usize;
            if !self.eps_flw.ltz(self.dfct[v as usize]) {
                return;
            }
            let d = min(-self.dfct[v as usize], self.x[au]);
            if self.eps_flw.gtz(d) {
                self.set_flow(au, self.x[au] - d);
            }
            a = self.tnxtin[au];
        }
    }

    /// Move the price of `v` to the next breakpoint: the smallest
    /// reduced-cost magnitude over the incident non-balanced arcs that
    /// would become usable. `extra` is added to the step (used by the
    /// auction crash). Returns `false` if no breakpoint exists (a dual
    /// ascent ray proving infeasibility).
    fn next_breakpoint(&mut self, v: Index, extra: Cost<K>) -> bool {
        let demand = self.eps_flw.gtz(self.dfct[v as usize]);
        let inf = infinite::<Cost<K>>();
        let mut delta = inf;

        // a demand node raises its price: incoming arcs at the lower
        // bound and outgoing saturated arcs approach the balanced
        // band; a supply node lowers it, with the mirrored cut; a
        // self-loop is unaffected by the node's own price
        let mut a = self.fin[v as usize];
        while a != NONE {
            let au = a as usize;
            let rc = self.rc[au];
            if rc != inf && self.start[au] != self.end[au] {
                if demand && self.eps_cst.gtz(rc) && rc < delta {
                    delta = rc;
                } else if !demand && self.eps_cst.ltz(rc) && -rc < delta {
                    delta = -rc;
                }
            }
            a = self.nxtin[au];
        }
        let mut a = self.fou[v as usize];
        while a != NONE {
            let au = a as usize;
            let rc = self.rc[au];
            if rc != inf && self.start[au] != self.end[au] {
                if demand && self.eps_cst.ltz(rc) && -rc < delta {
                    delta = -rc;
                } else if !demand && self.eps_cst.gtz(rc) && rc < delta {
                    delta = rc;
                }
            }
            a = self.nxtou[au];
        }

        if delta == inf {
            return false;
        }
        if !extra.is_zero() {
            // the overshoot must not push an uncapacitated arc past the
            // balanced band, since such an arc cannot be saturated
            let step = delta + extra;
            let mut safe = true;
            // the arcs shifting downwards: incoming for a demand node,
            // outgoing for a supply node
            let mut a = if demand { self.fin[v as usize] } else { self.fou[v as usize] };
            while a != NONE {
                let au = a as usize;
                if self.rc[au] != inf && self.cap[au] == infinite::<Flow<K>>() && self.rc[au] < step {
                    safe = false;
                    break;
                }
                a = if demand { self.nxtin[au] } else { self.nxtou[au] };
            }
            if safe {
                delta = step;
            }
        }

        if demand {
            self.pi[v as usize] += delta;
        } else {
            self.pi[v as usize] -= delta;
        }
        // shift the reduced costs of all incident arcs and restore
        // the bounds of those pushed out of the balanced band
        let mut a = self.fin[v as usize];
        while a != NONE {
            let au = a as usize;
            if self.rc[au] != inf {
                let rc = if demand { self.rc[au] - delta } else { self.rc[au] + delta };
                self.set_rc(a, rc);
                self.enforce_arc(au);
            }
            a = self.nxtin[au];
        }
        let mut a = self.fou[v as usize];
        while a != NONE {
            let au = a as usize;
            if self.rc[au] != inf {
                let rc = if demand { self.rc[au] + delta } else { self.rc[au] - delta };
                self.set_rc(a, rc);
                self.enforce_arc(au);
            }
            a = self.nxtou[au];
        }
        true
    }

    fn enforce_arc(&mut self, a: usize) {
        if self.eps_cst.gtz(self.rc[a]) {
            if !self.x[a].is_zero() {
                self.set_flow(a, Flow::<K>::zero());
            }
        } else if self.eps_cst.ltz(self.rc[a]) && self.cap[a] != infinite::<Flow<K>>() && self.x[a] != self.cap[a] {
            self.set_flow(a, self.cap[a]);
        }
    }

    /// One pass of single-node relaxation iterations over all nodes.
    ///
    /// With `extra` nonzero this is the auction-style crash: every
    /// price step overshoots the breakpoint by that amount, spreading
    /// the imbalances instead of resolving them exactly.
    fn single_node_pass(&mut self, extra: Cost<K>) -> Option<Status> {
        for v in 0..self.n {
            // price changes strictly increase the dual value, so the
            // loop terminates for integer kinds; the guard covers
            // floating kinds
            let mut guard = 0usize;
            while !self.eps_flw.etz(self.dfct[v as usize]) {
                self.iters += 1;
                self.push_at(v);
                if self.eps_flw.etz(self.dfct[v as usize]) {
                    break;
                }
                guard += 1;
                if guard > 2 * self.m as usize + 2 {
                    break;
                }
                if !self.next_breakpoint(v, extra) {
                    // no breakpoint left: for the crash this only means
                    // the node cannot be resolved locally
                    if extra.is_zero() {
                        debug!("relax: dual ascent ray at node {}", v);
                        return Some(Status::Infeasible);
                    }
                    break;
                }
            }
        }
        None
    }

    // ---------------------------------------------------------------
    // multinode iterations
    // ---------------------------------------------------------------

    /// Search the balanced subgraph from the positive-deficit node `u`
    /// for a negative-deficit node; augment if one is found, otherwise
    /// perform a dual ascent step over the scanned set.
    fn search(&mut self, u: Index) -> SearchResult {
        self.stamp += 1;
        let stamp = self.stamp;
        self.queue.clear();
        self.queue.push(u);
        self.scan_stamp[u as usize] = stamp;
        self.prdcsr[u as usize] = 0;

        let mut qi = 0;
        while qi < self.queue.len() {
            let v = self.queue[qi];
            qi += 1;
            // pull over incoming balanced arcs with residual capacity
            let mut a = self.tfstin[v as usize];
            while a != NONE {
                let au = a as usize;
                let w = self.start[au];
                if self.scan_stamp[w as usize] != stamp && self.eps_flw.gtz(self.residual(au)) {
                    self.scan_stamp[w as usize] = stamp;
                    self.prdcsr[w as usize] = a as SIndex + 1;
                    if self.eps_flw.ltz(self.dfct[w as usize]) {
                        self.augment(u, w);
                        return SearchResult::Augmented;
                    }
                    self.queue.push(w);
                }
                a = self.tnxtin[au];
            }
            // or reduce outgoing balanced arcs that carry flow
            let mut a = self.tfstou[v as usize];
            while a != NONE {
                let au = a as usize;
                let w = self.end[au];
                if self.scan_stamp[w as usize] != stamp && self.eps_flw.gtz(self.x[au]) {
                    self.scan_stamp[w as usize] = stamp;
                    self.prdcsr[w as usize] = -(a as SIndex + 1);
                    if self.eps_flw.ltz(self.dfct[w as usize]) {
                        self.augment(u, w);
                        return SearchResult::Augmented;
                    }
                    self.queue.push(w);
                }
                a = self.tnxtou[au];
            }
        }

        self.ascend(stamp)
    }

    /// Dual ascent over the scanned set: raise the prices of the
    /// scanned (demand side) nodes by the smallest reduced-cost
    /// magnitude over the cut, bringing at least one new arc into the
    /// balanced subgraph.
    fn ascend(&mut self, stamp: u64) -> SearchResult {
        let inf = infinite::<Cost<K>>();
        let mut delta = inf;
        for qi in 0..self.queue.len() {
            let v = self.queue[qi];
            let mut a = self.fin[v as usize];
            while a != NONE {
                let au = a as usize;
                let rc = self.rc[au];
                if self.scan_stamp[self.start[au] as usize] != stamp && rc != inf && self.eps_cst.gtz(rc) && rc < delta
                {
                    delta = rc;
                }
                a = self.nxtin[au];
            }
            let mut a = self.fou[v as usize];
            while a != NONE {
                let au = a as usize;
                let rc = self.rc[au];
                if self.scan_stamp[self.end[au] as usize] != stamp && rc != inf && self.eps_cst.ltz(rc) && -rc < delta
                {
                    delta = -rc;
                }
                a = self.nxtou[au];
            }
        }
        if delta == inf {
            return SearchResult::NoCut;
        }

        trace!("relax: ascent by {:?} over {} nodes", delta, self.queue.len());
        for qi in 0..self.queue.len() {
            let v = self.queue[qi];
            self.pi[v as usize] += delta;
        }
        // only the reduced costs of the cut arcs change
        for qi in 0..self.queue.len() {
            let v = self.queue[qi];
            let mut a = self.fin[v as usize];
            while a != NONE {
                let au = a as usize;
                if self.scan_stamp[self.start[au] as usize] != stamp && self.rc[au] != inf {
                    let rc = self.rc[au] - delta;
                    self.set_rc(a, rc);
                }
                a = self.nxtin[au];
            }
            let mut a = self.fou[v as usize];
            while a != NONE {
                let au = a as usize;
                if self.scan_stamp[self.end[au] as usize] != stamp && self.rc[au] != inf {
                    let rc = self.rc[au] + delta;
                    self.set_rc(a, rc);
                }
                a = self.nxtou[au];
            }
        }
        SearchResult::Ascended
    }

    /// Augment flow along the predecessor path from the sink back to
    /// the search root `u`.
    fn augment(&mut self, u: Index, sink: Index) {
        let mut delta = min(self.dfct[u as usize], -self.dfct[sink as usize]);
        let mut w = sink;
        while w != u {
            let p = self.prdcsr[w as usize];
            let a = (p.abs() - 1) as usize;
            if p > 0 {
                delta = min(delta, self.residual(a));
                w = self.end[a];
            } else {
                delta = min(delta, self.x[a]);
                w = self.start[a];
            }
        }

        trace!("relax: augmenting {:?} from {} to {}", delta, sink, u);
        let mut w = sink;
        while w != u {
            let p = self.prdcsr[w as usize];
            let a = (p.abs() - 1) as usize;
            if p > 0 {
                self.set_flow(a, self.x[a] + delta);
                w = self.end[a];
            } else {
                self.set_flow(a, self.x[a] - delta);
                w = self.start[a];
            }
        }
        self.num_augm += 1;
    }

    fn compute_fo(&self) -> Obj<K> {
        let mut fo = Obj::<K>::zero();
        for a in 0..self.m as usize {
            if self.start[a] != NONE && !self.eps_flw.etz(self.x[a]) {
                fo += K::cost_as_obj(self.cost[a]) * K::flow_as_obj(self.x[a]);
            }
        }
        fo
    }
}

impl<K: NumKinds> Mcf for RelaxIv<K> {
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
        let nmax = if nmax > 0 { nmax } else { self.nmax };
        let mmax = if mmax > 0 { mmax } else { self.mmax };
        if n > nmax || m > mmax {
            return Err(McfError::CapacityExceeded);
        }
        self.alloc(nmax, mmax);
        self.n = n;
        self.m = m;

        let mut free: Vec<Index> = vec![];
        for a in 0..m as usize {
            if starts[a] >= n || ends[a] >= n {
                return Err(McfError::InvalidName(a as Index));
            }
            if costs[a] == infinite::<Cost<K>>() && caps[a] == infinite::<Flow<K>>() {
                free.push(a as Index);
                continue;
            }
            self.start[a] = starts[a];
            self.end[a] = ends[a];
            self.cap[a] = caps[a];
            self.cost[a] = costs[a];
            self.rc[a] = if costs[a] == infinite::<Cost<K>>() {
                infinite::<Cost<K>>()
            } else {
                costs[a]
            };
            self.link_arc(a as Index);
        }
        self.first_free = NONE;
        for &a in free.iter().rev() {
            self.end[a as usize] = self.first_free;
            self.first_free = a;
        }
        self.b[..n as usize].copy_from_slice(&deficits[..n as usize]);

        self.status = Status::Unsolved;
        self.need_cold = true;
        self.iters = 0;
        self.num_augm = 0;
        debug!("relax: loaded {} nodes, {} arcs", n, m);
        Ok(())
    }

    /// Capacity tightening: no arc can carry more than its tail can
    /// emit or its head can absorb. May detect infeasibility early.
    fn pre_process(&mut self) -> Result<()> {
        let inf = infinite::<Flow<K>>();
        let mut out_bound = vec![Flow::<K>::zero(); self.n as usize];
        let mut in_bound = vec![Flow::<K>::zero(); self.n as usize];
        for v in 0..self.n as usize {
            out_bound[v] = max(-self.b[v], Flow::<K>::zero());
            in_bound[v] = max(self.b[v], Flow::<K>::zero());
        }
        for a in 0..self.m as usize {
            if self.start[a] == NONE || self.is_closed(a) {
                continue;
            }
            let (t, h) = (self.start[a] as usize, self.end[a] as usize);
            if out_bound[h] != inf {
                if self.cap[a] == inf {
                    out_bound[h] = inf;
                } else {
                    out_bound[h] += self.cap[a];
                }
            }
            if in_bound[t] != inf {
                if self.cap[a] == inf {
                    in_bound[t] = inf;
                } else {
                    in_bound[t] += self.cap[a];
                }
            }
        }
        // a supply node must be able to emit its surplus, a demand
        // node to absorb its need
        for v in 0..self.n as usize {
            let mut can_out = Flow::<K>::zero();
            let mut can_in = Flow::<K>::zero();
            let mut a = self.fou[v];
            while a != NONE {
                if !self.is_closed(a as usize) && can_out != inf {
                    let c = self.cap[a as usize];
                    if c == inf {
                        can_out = inf;
                    } else {
                        can_out += c;
                    }
                }
                a = self.nxtou[a as usize];
            }
            let mut a = self.fin[v];
            while a != NONE {
                if !self.is_closed(a as usize) && can_in != inf {
                    let c = self.cap[a as usize];
                    if c == inf {
                        can_in = inf;
                    } else {
                        can_in += c;
                    }
                }
                a = self.nxtin[a as usize];
            }
            if (can_out != inf && -self.b[v] > can_out) || (can_in != inf && self.b[v] > can_in) {
                warn!("relax: node {} cannot satisfy its deficit", v);
                self.status = Status::Infeasible;
                return Ok(());
            }
        }
        for a in 0..self.m as usize {
            if self.start[a] == NONE || self.is_closed(a) || self.cap[a] == inf {
                continue;
            }
            let bound = min(out_bound[self.start[a] as usize], in_bound[self.end[a] as usize]);
            if bound != inf && bound < self.cap[a] {
                self.cap[a] = bound;
                if self.x[a] > bound {
                    self.x[a] = bound;
                }
            }
        }
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
            Param::Auction => self.crash = val.as_int() != 0,
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
            Param::Auction => ParValue::Int(self.crash as i64),
            _ => return Err(McfError::UnsupportedParam(par)),
        })
    }

    fn solve(&mut self) -> Status {
        let t = self.timer.start();
        let started = Instant::now();

        let cold = self.need_cold || !self.reopt;
        if self.status != Status::Stopped && cold {
            self.cold_init();
        }
        if !self.enforce_complementarity() {
            warn!("relax: negative reduced cost on an uncapacitated arc");
            self.status = Status::Unbounded;
            self.timer.stop(t);
            return self.status;
        }
        self.recompute_dfct();
        self.rebuild_balanced_lists();

        if self.status != Status::Stopped {
            if self.crash && cold {
                let _ = self.single_node_pass(Cost::<K>::one());
            }
            if let Some(st) = self.single_node_pass(Cost::<K>::zero()) {
                self.status = st;
                self.fo = infinite::<Obj<K>>();
                self.timer.stop(t);
                return self.status;
            }
        }

        let mut iter = 0usize;
        self.status = loop {
            if (self.max_iter > 0 && iter >= self.max_iter)
                || (self.max_time > 0.0 && started.elapsed().as_secs_f64() >= self.max_time)
            {
                break Status::Stopped;
            }
            let u = (0..self.n).find(|&v| self.eps_flw.gtz(self.dfct[v as usize]));
            match u {
                None => {
                    if (0..self.n).any(|v| self.eps_flw.ltz(self.dfct[v as usize])) {
                        // the deficits do not sum to zero
                        break Status::Infeasible;
                    }
                    break Status::Optimal;
                }
                Some(u) => {
                    iter += 1;
                    self.iters += 1;
                    match self.search(u) {
                        SearchResult::Augmented => {}
                        SearchResult::Ascended => {}
                        SearchResult::NoCut => break Status::Infeasible,
                    }
                }
            }
        };

        self.fo = match self.status {
            Status::Optimal => self.compute_fo(),
            Status::Infeasible => infinite::<Obj<K>>(),
            _ => self.fo,
        };
        debug!(
            "relax: {:?} after {} iterations, {} augmentations",
            self.status, self.iters, self.num_augm
        );
        self.timer.stop(t);
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
        assert!(arc < self.m);
        self.x[arc as usize]
    }

    fn flows_sparse(&self, out: &mut [Flow<K>], nms: &mut [Index]) -> usize {
        let mut k = 0;
        for a in 0..self.m as usize {
            if self.start[a] != NONE && !self.eps_flw.etz(self.x[a]) {
                out[k] = self.x[a];
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
        assert!(arc < self.m);
        if self.start[arc as usize] == NONE {
            infinite::<Cost<K>>()
        } else {
            self.rc[arc as usize]
        }
    }

    fn potential(&self, node: Index) -> Cost<K> {
        assert!(node < self.n);
        self.pi[node as usize]
    }

    fn objective(&self) -> Obj<K> {
        match self.status {
            Status::Infeasible => infinite::<Obj<K>>(),
            Status::Unbounded => -infinite::<Obj<K>>(),
            _ => self.fo,
        }
    }

    fn start_node(&self, arc: Index) -> Index {
        assert!(arc < self.m);
        self.start[arc as usize]
    }

    fn end_node(&self, arc: Index) -> Index {
        assert!(arc < self.m);
        if self.start[arc as usize] == NONE {
            NONE
        } else {
            self.end[arc as usize]
        }
    }

    fn cost(&self, arc: Index) -> Cost<K> {
        assert!(arc < self.m);
        if self.start[arc as usize] == NONE {
            infinite::<Cost<K>>()
        } else {
            self.cost[arc as usize]
        }
    }

    fn ucap(&self, arc: Index) -> Flow<K> {
        assert!(arc < self.m);
        if self.start[arc as usize] == NONE {
            Flow::<K>::zero()
        } else {
            self.cap[arc as usize]
        }
    }

    fn deficit(&self, node: Index) -> Flow<K> {
        assert!(node < self.n);
        self.b[node as usize]
    }

    fn is_closed_arc(&self, arc: Index) -> bool {
        arc < self.m && self.start[arc as usize] != NONE && self.is_closed(arc as usize)
    }

    fn is_deleted_arc(&self, arc: Index) -> bool {
        arc < self.m && self.start[arc as usize] == NONE
    }

    fn state(&self) -> McfState<K> {
        McfState {
            flows: self.x[..self.m as usize].to_vec(),
            red_costs: Some(self.rc[..self.m as usize].to_vec()),
            basis: None,
        }
    }

    fn put_state(&mut self, state: &McfState<K>) -> Result<()> {
        if state.flows.len() != self.m as usize {
            return Err(McfError::IllegalTopologyOp);
        }
        let rc = state.red_costs.as_ref().ok_or(McfError::IllegalTopologyOp)?;
        if rc.len() != self.m as usize {
            return Err(McfError::IllegalTopologyOp);
        }
        self.x[..self.m as usize].copy_from_slice(&state.flows);
        self.rc[..self.m as usize].copy_from_slice(rc);
        self.need_cold = false;
        self.status = Status::Unsolved;
        Ok(())
    }

    fn chg_cost(&mut self, arc: Index, cost: Cost<K>) -> Result<()> {
        self.check_arc(arc)?;
        let a = arc as usize;
        if !self.is_closed(a) {
            self.rc[a] += cost - self.cost[a];
        }
        self.cost[a] = cost;
        self.status = Status::Unsolved;
        if !self.reopt {
            self.need_cold = true;
        }
        Ok(())
    }

    fn chg_ucap(&mut self, arc: Index, cap: Flow<K>) -> Result<()> {
        self.check_arc(arc)?;
        let a = arc as usize;
        self.cap[a] = cap;
        if cap != infinite::<Flow<K>>() && self.x[a] > cap {
            self.x[a] = cap;
        }
        self.status = Status::Unsolved;
        if !self.reopt {
            self.need_cold = true;
        }
        Ok(())
    }

    fn chg_dfct(&mut self, node: Index, deficit: Flow<K>) -> Result<()> {
        self.check_node(node)?;
        self.b[node as usize] = deficit;
        self.status = Status::Unsolved;
        Ok(())
    }

    fn close_arc(&mut self, arc: Index) -> Result<()> {
        self.check_arc(arc)?;
        let a = arc as usize;
        self.x[a] = Flow::<K>::zero();
        self.rc[a] = infinite::<Cost<K>>();
        self.status = Status::Unsolved;
        Ok(())
    }

    fn open_arc(&mut self, arc: Index) -> Result<()> {
        if arc >= self.m {
            return Err(McfError::InvalidName(arc));
        }
        let a = arc as usize;
        if self.start[a] == NONE {
            return Err(McfError::IllegalTopologyOp);
        }
        if self.is_closed(a) {
            self.rc[a] = self.cost[a] + self.pi[self.start[a] as usize] - self.pi[self.end[a] as usize];
            self.x[a] = Flow::<K>::zero();
            self.status = Status::Unsolved;
        }
        Ok(())
    }

    fn del_arc(&mut self, arc: Index) -> Result<()> {
        self.check_arc(arc)?;
        let a = arc as usize;
        self.unlink_arc(arc);
        self.x[a] = Flow::<K>::zero();
        self.start[a] = NONE;
        if self.first_free == NONE || arc < self.first_free {
            self.end[a] = self.first_free;
            self.first_free = arc;
        } else {
            let mut cur = self.first_free;
            while self.end[cur as usize] != NONE && self.end[cur as usize] < arc {
                cur = self.end[cur as usize];
            }
            self.end[a] = self.end[cur as usize];
            self.end[cur as usize] = arc;
        }
        self.status = Status::Unsolved;
        Ok(())
    }

    fn del_node(&mut self, node: Index) -> Result<()> {
        self.check_node(node)?;
        let mut a = self.fou[node as usize];
        while a != NONE {
            self.x[a as usize] = Flow::<K>::zero();
            self.rc[a as usize] = infinite::<Cost<K>>();
            a = self.nxtou[a as usize];
        }
        let mut a = self.fin[node as usize];
        while a != NONE {
            self.x[a as usize] = Flow::<K>::zero();
            self.rc[a as usize] = infinite::<Cost<K>>();
            a = self.nxtin[a as usize];
        }
        self.b[node as usize] = Flow::<K>::zero();
        self.status = Status::Unsolved;
        Ok(())
    }

    fn add_arc(&mut self, start: Index, end: Index, cap: Flow<K>, cost: Cost<K>) -> Result<Index> {
        if start >= self.n || end >= self.n {
            return Err(McfError::InvalidName(start.max(end)));
        }
        let name = if self.first_free != NONE {
            let name = self.first_free;
            self.first_free = self.end[name as usize];
            name
        } else if self.m < self.mmax {
            let name = self.m;
            self.m += 1;
            name
        } else {
            return Err(McfError::CapacityExceeded);
        };
        let a = name as usize;
        self.start[a] = start;
        self.end[a] = end;
        self.cap[a] = cap;
        self.cost[a] = cost;
        self.x[a] = Flow::<K>::zero();
        self.rc[a] = if cost == infinite::<Cost<K>>() {
            infinite::<Cost<K>>()
        } else {
            cost + self.pi[start as usize] - self.pi[end as usize]
        };
        self.balanced[a] = false;
        self.link_arc(name);
        self.status = Status::Unsolved;
        Ok(name)
    }

    fn add_node(&mut self, deficit: Flow<K>) -> Result<Index> {
        if self.n >= self.nmax {
            return Err(McfError::CapacityExceeded);
        }
        let v = self.n;
        self.n += 1;
        self.b[v as usize] = deficit;
        self.pi[v as usize] = Cost::<K>::zero();
        if !self.eps_flw.etz(deficit) {
            self.status = Status::Unsolved;
        }
        Ok(v)
    }

    fn change_arc(&mut self, arc: Index, new_start: Option<Index>, new_end: Option<Index>) -> Result<()> {
        self.check_arc(arc)?;
        if let Some(s) = new_start {
            self.check_node(s)?;
        }
        if let Some(e) = new_end {
            self.check_node(e)?;
        }
        let a = arc as usize;
        self.unlink_arc(arc);
        self.x[a] = Flow::<K>::zero();
        if let Some(s) = new_start {
            self.start[a] = s;
        }
        if let Some(e) = new_end {
            self.end[a] = e;
        }
        self.link_arc(arc);
        if !self.is_closed(a) {
            self.rc[a] = self.cost[a] + self.pi[self.start[a] as usize] - self.pi[self.end[a] as usize];
        }
        self.status = Status::Unsolved;
        Ok(())
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

    type Rlx = RelaxIv<(i64, i64, i64)>;

    #[test]
    fn minimal_transport() {
        let mut rlx = Rlx::new(2, 1);
        rlx.load_net(2, 1, 2, 1, &[1], &[3], &[-1, 1], &[0], &[1]).unwrap();
        assert_eq!(rlx.solve(), Status::Optimal);
        assert_eq!(rlx.flow(0), 1);
        assert_eq!(rlx.objective(), 3);
        assert_eq!(rlx.reduced_cost(0), 0);
        assert_eq!(rlx.potential(1) - rlx.potential(0), 3);
    }

    #[test]
    fn capacity_binding_is_infeasible() {
        let mut rlx = Rlx::new(3, 2);
        rlx.load_net(3, 2, 3, 2, &[1, 2], &[1, 1], &[-2, 0, 2], &[0, 1], &[1, 2])
            .unwrap();
        assert_eq!(rlx.solve(), Status::Infeasible);
        assert_eq!(rlx.objective(), infinite::<i64>());
    }

    fn two_routes() -> Rlx {
        let mut rlx = Rlx::new(4, 4);
        rlx.load_net(
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
        rlx
    }

    #[test]
    fn picks_the_cheap_route() {
        let mut rlx = two_routes();
        assert_eq!(rlx.solve(), Status::Optimal);
        assert_eq!(rlx.objective(), 6);
        assert_eq!(rlx.flow(0), 3);
        assert_eq!(rlx.flow(1), 3);
        assert_eq!(rlx.flow(2), 0);
    }

    #[test]
    fn auction_crash_agrees() {
        let mut rlx = two_routes();
        rlx.set_par(Param::Auction, ParValue::Int(1)).unwrap();
        assert_eq!(rlx.solve(), Status::Optimal);
        assert_eq!(rlx.objective(), 6);
    }

    #[test]
    fn complementary_slackness_holds() {
        let mut rlx = two_routes();
        assert_eq!(rlx.solve(), Status::Optimal);
        for a in 0..rlx.num_arcs() {
            let rc = rlx.reduced_cost(a);
            if rc > 0 {
                assert_eq!(rlx.flow(a), 0, "arc {}", a);
            }
            if rc < 0 {
                assert_eq!(rlx.flow(a), rlx.ucap(a), "arc {}", a);
            }
        }
    }

    #[test]
    fn warm_start_after_cost_change() {
        let mut rlx = two_routes();
        assert_eq!(rlx.solve(), Status::Optimal);
        let augm_before = rlx.augmentations();
        // make the cheap route expensive
        rlx.chg_cost(0, 9).unwrap();
        assert_eq!(rlx.status(), Status::Unsolved);
        assert_eq!(rlx.solve(), Status::Optimal);
        assert_eq!(rlx.objective(), 24);

        let mut cold = two_routes();
        cold.chg_cost(0, 9).unwrap();
        assert_eq!(cold.solve(), Status::Optimal);
        assert_eq!(cold.objective(), 24);
        // warm start keeps the earlier counters accumulating
        assert!(rlx.augmentations() >= augm_before);
    }

    #[test]
    fn warm_start_after_deficit_change() {
        let mut rlx = two_routes();
        assert_eq!(rlx.solve(), Status::Optimal);
        rlx.chg_dfct(3, 5).unwrap();
        rlx.chg_dfct(0, -5).unwrap();
        assert_eq!(rlx.solve(), Status::Optimal);
        // the cheap route still has capacity for the extra units
        assert_eq!(rlx.objective(), 10);
    }

    #[test]
    fn state_round_trip() {
        let mut rlx = two_routes();
        assert_eq!(rlx.solve(), Status::Optimal);
        let fo = rlx.objective();
        let state = rlx.state();

        rlx.chg_dfct(3, 5).unwrap();
        rlx.chg_dfct(0, -5).unwrap();
        assert_eq!(rlx.solve(), Status::Optimal);

        rlx.chg_dfct(3, 3).unwrap();
        rlx.chg_dfct(0, -3).unwrap();
        rlx.put_state(&state).unwrap();
        assert_eq!(rlx.solve(), Status::Optimal);
        assert_eq!(rlx.objective(), fo);
    }

    #[test]
    fn close_open_delete() {
        let mut rlx = two_routes();
        assert_eq!(rlx.solve(), Status::Optimal);
        rlx.close_arc(0).unwrap();
        assert!(rlx.is_closed_arc(0));
        assert_eq!(rlx.reduced_cost(0), infinite::<i64>());
        assert_eq!(rlx.solve(), Status::Optimal);
        assert_eq!(rlx.objective(), 24);
        rlx.open_arc(0).unwrap();
        assert_eq!(rlx.solve(), Status::Optimal);
        assert_eq!(rlx.objective(), 6);

        rlx.del_arc(1).unwrap();
        assert!(rlx.is_deleted_arc(1));
        assert_eq!(rlx.open_arc(1), Err(McfError::IllegalTopologyOp));
        let name = rlx.add_arc(1, 3, 5, 1).unwrap();
        assert_eq!(name, 1);
        assert_eq!(rlx.solve(), Status::Optimal);
        assert_eq!(rlx.objective(), 6);
    }

    #[test]
    fn pre_process_detects_bottleneck() {
        let mut rlx = Rlx::new(3, 2);
        rlx.load_net(3, 2, 3, 2, &[1, 2], &[1, 1], &[-2, 0, 2], &[0, 1], &[1, 2])
            .unwrap();
        rlx.pre_process().unwrap();
        assert_eq!(rlx.status(), Status::Infeasible);
    }

    #[test]
    fn unbounded_on_negative_uncapacitated_cycle() {
        let mut rlx = Rlx::new(2, 2);
        rlx.load_net(
            2,
            2,
            2,
            2,
            &[infinite::<i64>(), infinite::<i64>()],
            &[-2, 1],
            &[0, 0],
            &[0, 1],
            &[1, 0],
        )
        .unwrap();
        assert_eq!(rlx.solve(), Status::Unbounded);
        assert_eq!(rlx.objective(), -infinite::<i64>());
    }
}
