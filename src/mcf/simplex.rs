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

//! A primal and dual network simplex solver.
//!
//! [`NetSimplex`] maintains a basis tree over the nodes plus an
//! artificial root. Every non-root node stores the basic arc
//! connecting it to its parent, its depth and intrusive links into a
//! preorder thread of the tree; pivoting moves a subtree by cutting
//! and pasting contiguous segments of that thread.
//!
//! The primal algorithm supports linear and separable quadratic arc
//! costs, the dual algorithm only linear costs. The pricing rule is
//! selectable ([`Pricing`]); the candidate-list rule is the default.
//!
//! The initial basis consists of one artificial arc per node between
//! the node and the root, carrying the node imbalance at a large cost.
//! An instance is infeasible exactly if an artificial arc still
//! carries flow when no eligible pivot remains.

use crate::mcf::{read_range, Mcf, McfError, McfState, Param, ParValue, Result, Status, Timer};
use crate::num::{infinite, Cost, Flow, Index, NumKinds, Obj, Tolerance};
use num_traits::Signed;

use log::{debug, trace, warn};
use num_traits::{FromPrimitive, One, ToPrimitive, Zero};
use std::time::{Duration, Instant};

const NONE: Index = Index::MAX;

/// Pricing rules for the pivot selection.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Pricing {
    /// Full scan for the most violated arc (most negative reduced
    /// cost); the classic textbook rule.
    Dantzig,
    /// Round-robin scan resuming at a cursor, returning the first
    /// violating arc.
    FirstEligible,
    /// A bounded hot list refilled from groups of arcs and sorted by
    /// violation; the default and usually the fastest rule.
    CandidateList,
}

/// Lifecycle and basis state of an arc slot.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Ident {
    Basic,
    AtLower,
    AtUpper,
    Closed,
    Deleted,
}

impl Ident {
    fn as_i8(self) -> i8 {
        match self {
            Ident::Basic => 0,
            Ident::AtLower => 1,
            Ident::AtUpper => 2,
            Ident::Closed => 3,
            Ident::Deleted => 4,
        }
    }

    fn from_i8(v: i8) -> Option<Ident> {
        Some(match v {
            0 => Ident::Basic,
            1 => Ident::AtLower,
            2 => Ident::AtUpper,
            3 => Ident::Closed,
            4 => Ident::Deleted,
            _ => return None,
        })
    }
}

/// Result of the ratio test along the pivot cycle.
struct RatioResult<K: NumKinds> {
    /// The feasible step.
    theta: Flow<K>,
    /// The chain node whose basic arc blocks, `NONE` if the entering
    /// arc blocks itself.
    block_node: Index,
    /// Whether the blocking node lies on the `from` side chain.
    block_from_side: bool,
    /// Whether the blocking arc hits its upper bound (else the lower).
    block_at_upper: bool,
    /// The apex (common ancestor) of the cycle.
    apex: Index,
    /// Sum of the quadratic coefficients along the cycle.
    qcycle: Cost<K>,
}

/// Primal and dual network simplex min-cost-flow solver.
///
/// Real arcs occupy slots `0..mmax`, the artificial arc of node `v`
/// occupies slot `mmax + v`; the artificial root is node slot `nmax`.
pub struct NetSimplex<K: NumKinds = (i64, i64, i64)> {
    nmax: Index,
    mmax: Index,
    n: Index,
    m: Index,

    // arc arrays, real arcs followed by artificial arcs
    tail: Vec<Index>,
    head: Vec<Index>,
    flow: Vec<Flow<K>>,
    cost: Vec<Cost<K>>,
    qcost: Vec<Cost<K>>,
    upper: Vec<Flow<K>>,
    ident: Vec<Ident>,

    // node arrays, the artificial root lives in slot nmax
    balance: Vec<Flow<K>>,
    potential: Vec<Cost<K>>,
    sum_q: Vec<Cost<K>>,
    basic_arc: Vec<Index>,
    parent: Vec<Index>,
    prev_t: Vec<Index>,
    next_t: Vec<Index>,
    sub_level: Vec<i32>,

    // forward/backward star lists over the real arcs
    first_out: Vec<Index>,
    first_in: Vec<Index>,
    next_out: Vec<Index>,
    next_in: Vec<Index>,

    // per-node timestamp of the last dual iteration whose subtree T2
    // contained the node
    when_in_t2: Vec<u64>,
    iteration: u64,

    // deleted arc names, smallest first, threaded through head[]
    first_free: Index,
    num_quadratic: Index,

    use_primal: bool,
    pricing: Pricing,
    forced_groups: Index,
    forced_hot: Index,
    num_groups: Index,
    hot_size: Index,
    group_pos: Index,
    arc_cursor: Index,
    node_cursor: Index,
    candidates: Vec<(Index, Cost<K>)>,
    dual_candidates: Vec<(Index, Flow<K>)>,
    ignored: Vec<Index>,
    recompute_fo_limit: u32,
    pivots_since_fo: u32,

    max_iter: usize,
    max_time: f64,
    reopt: bool,
    eps_flw: Tolerance<Flow<K>>,
    eps_cst: Tolerance<Cost<K>>,
    eps_q: Tolerance<Cost<K>>,
    eps_opt: f64,

    status: Status,
    need_new_basis: bool,
    max_art_cost: Cost<K>,
    fo: Obj<K>,
    niter: usize,
    timer: Timer,
}

impl<K: NumKinds> NetSimplex<K> {
    pub fn new(nmax: Index, mmax: Index) -> Self {
        let mut spx = NetSimplex {
            nmax: 0,
            mmax: 0,
            n: 0,
            m: 0,
            tail: vec![],
            head: vec![],
            flow: vec![],
            cost: vec![],
            qcost: vec![],
            upper: vec![],
            ident: vec![],
            balance: vec![],
            potential: vec![],
            sum_q: vec![],
            basic_arc: vec![],
            parent: vec![],
            prev_t: vec![],
            next_t: vec![],
            sub_level: vec![],
            first_out: vec![],
            first_in: vec![],
            next_out: vec![],
            next_in: vec![],
            when_in_t2: vec![],
            iteration: 0,
            first_free: NONE,
            num_quadratic: 0,
            use_primal: true,
            pricing: Pricing::CandidateList,
            forced_groups: 0,
            forced_hot: 0,
            num_groups: 0,
            hot_size: 0,
            group_pos: 0,
            arc_cursor: 0,
            node_cursor: 0,
            candidates: vec![],
            dual_candidates: vec![],
            ignored: vec![],
            recompute_fo_limit: 100,
            pivots_since_fo: 0,
            max_iter: 0,
            max_time: 0.0,
            reopt: false,
            eps_flw: Tolerance::exact(),
            eps_cst: Tolerance::exact(),
            eps_q: Tolerance::exact(),
            eps_opt: 0.0,
            status: Status::Unsolved,
            need_new_basis: true,
            max_art_cost: Cost::<K>::zero(),
            fo: Obj::<K>::zero(),
            niter: 0,
            timer: Timer::default(),
        };
        spx.alloc(nmax, mmax);
        spx
    }

    /// Select the algorithm (primal or dual) and the pricing rule.
    ///
    /// The default is the primal algorithm with the candidate-list
    /// rule, the best setting on most instances.
    pub fn set_alg(&mut self, use_primal: bool, pricing: Pricing) {
        self.use_primal = use_primal;
        self.pricing = pricing;
        self.need_new_basis = true;
        self.status = Status::Unsolved;
    }

    /// Number of pivots performed by the latest `solve` call.
    pub fn num_iterations(&self) -> usize {
        self.niter
    }

    fn alloc(&mut self, nmax: Index, mmax: Index) {
        self.nmax = nmax;
        self.mmax = mmax;
        let na = nmax as usize + 1;
        let ma = mmax as usize + nmax as usize;
        self.tail = vec![NONE; ma];
        self.head = vec![NONE; ma];
        self.flow = vec![Flow::<K>::zero(); ma];
        self.cost = vec![Cost::<K>::zero(); ma];
        self.qcost = vec![Cost::<K>::zero(); ma];
        self.upper = vec![Flow::<K>::zero(); ma];
        self.ident = vec![Ident::Deleted; ma];
        self.next_out = vec![NONE; ma];
        self.next_in = vec![NONE; ma];
        self.balance = vec![Flow::<K>::zero(); na];
        self.potential = vec![Cost::<K>::zero(); na];
        self.sum_q = vec![Cost::<K>::zero(); na];
        self.basic_arc = vec![NONE; na];
        self.parent = vec![NONE; na];
        self.prev_t = vec![NONE; na];
        self.next_t = vec![NONE; na];
        self.sub_level = vec![0; na];
        self.first_out = vec![NONE; na];
        self.first_in = vec![NONE; na];
        self.when_in_t2 = vec![0; na];
        self.first_free = NONE;
    }

    fn root(&self) -> Index {
        self.nmax
    }

    fn dummy_arc(&self, v: Index) -> Index {
        self.mmax + v
    }

    fn quadratic(&self) -> bool {
        self.num_quadratic > 0
    }

    fn check_arc(&self, arc: Index) -> Result<()> {
        if arc >= self.m || self.ident[arc as usize] == Ident::Deleted {
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

    // ---------------------------------------------------------------
    // adjacency lists
    // ---------------------------------------------------------------

    fn link_arc(&mut self, a: Index) {
        let (t, h) = (self.tail[a as usize], self.head[a as usize]);
        self.next_out[a as usize] = self.first_out[t as usize];
        self.first_out[t as usize] = a;
        self.next_in[a as usize] = self.first_in[h as usize];
        self.first_in[h as usize] = a;
    }

    fn unlink_arc(&mut self, a: Index) {
        let t = self.tail[a as usize] as usize;
        let mut cur = self.first_out[t];
        if cur == a {
            self.first_out[t] = self.next_out[a as usize];
        } else {
            while self.next_out[cur as usize] != a {
                cur = self.next_out[cur as usize];
            }
            self.next_out[cur as usize] = self.next_out[a as usize];
        }
        let h = self.head[a as usize] as usize;
        let mut cur = self.first_in[h];
        if cur == a {
            self.first_in[h] = self.next_in[a as usize];
        } else {
            while self.next_in[cur as usize] != a {
                cur = self.next_in[cur as usize];
            }
            self.next_in[cur as usize] = self.next_in[a as usize];
        }
    }

    // ---------------------------------------------------------------
    // reduced costs and potentials
    // ---------------------------------------------------------------

    fn red_cost(&self, a: usize) -> Cost<K> {
        let mut rc = self.cost[a] + self.potential[self.tail[a] as usize] - self.potential[self.head[a] as usize];
        if !self.qcost[a].is_zero() {
            rc += self.qcost[a] * K::flow_as_cost(self.flow[a]);
        }
        rc
    }

    /// Recompute potentials (and quadratic path sums) of the whole
    /// tree from the root.
    fn compute_potentials(&mut self) {
        let r = self.root() as usize;
        self.potential[r] = Cost::<K>::zero();
        self.sum_q[r] = Cost::<K>::zero();
        let mut v = self.next_t[r];
        while v != NONE {
            self.compute_node_potential(v);
            v = self.next_t[v as usize];
        }
    }

    fn compute_node_potential(&mut self, v: Index) {
        let a = self.basic_arc[v as usize] as usize;
        let p = self.parent[v as usize] as usize;
        let mut c = self.cost[a];
        if !self.qcost[a].is_zero() {
            c += self.qcost[a] * K::flow_as_cost(self.flow[a]);
        }
        self.potential[v as usize] = if self.head[a] == v {
            self.potential[p] + c
        } else {
            self.potential[p] - c
        };
        self.sum_q[v as usize] = self.sum_q[p] + self.qcost[a];
    }

    /// Update the potentials of the subtree just re-rooted at `k2`.
    ///
    /// In the linear case all potentials of the subtree shift by the
    /// same amount; in the quadratic case they depend on the flows and
    /// are recomputed elsewhere.
    fn update_potentials(&mut self, k2: Index) {
        let level = self.sub_level[k2 as usize];
        let a = self.basic_arc[k2 as usize] as usize;
        let k1 = self.parent[k2 as usize] as usize;
        let pi_new = if self.head[a] == k2 {
            self.potential[k1] + self.cost[a]
        } else {
            self.potential[k1] - self.cost[a]
        };
        let delta = pi_new - self.potential[k2 as usize];
        let mut v = k2;
        loop {
            self.potential[v as usize] += delta;
            v = self.next_t[v as usize];
            if v == NONE || self.sub_level[v as usize] <= level {
                break;
            }
        }
    }

    // ---------------------------------------------------------------
    // basis construction
    // ---------------------------------------------------------------

    fn compute_art_cost(&mut self) {
        let mut maxc = Cost::<K>::zero();
        for a in 0..self.m as usize {
            if self.ident[a] != Ident::Deleted && self.ident[a] != Ident::Closed {
                let c = self.cost[a].abs();
                if c > maxc && c < infinite::<Cost<K>>() {
                    maxc = c;
                }
            }
        }
        let n = Cost::<K>::from_u32(self.n.max(1)).unwrap();
        self.max_art_cost = n * (Cost::<K>::one() + maxc);
    }

    /// Build the all-artificial starting basis of the primal
    /// algorithm: every node hangs off the root via its artificial
    /// arc, oriented to carry the node imbalance as a nonnegative
    /// flow; real arcs rest at their lower bound.
    fn build_primal_basis(&mut self) {
        self.compute_art_cost();
        let r = self.root();

        for a in 0..self.m as usize {
            match self.ident[a] {
                Ident::Deleted | Ident::Closed => self.flow[a] = Flow::<K>::zero(),
                _ => {
                    self.ident[a] = Ident::AtLower;
                    self.flow[a] = Flow::<K>::zero();
                }
            }
        }

        self.init_tree_of_dummies();
        for v in 0..self.n {
            let d = self.dummy_arc(v) as usize;
            let b = self.balance[v as usize];
            if b > Flow::<K>::zero() {
                // demand: the artificial arc feeds the node
                self.tail[d] = r;
                self.head[d] = v;
                self.flow[d] = b;
            } else {
                self.tail[d] = v;
                self.head[d] = r;
                self.flow[d] = -b;
            }
            self.cost[d] = self.max_art_cost;
            self.qcost[d] = Cost::<K>::zero();
            self.upper[d] = infinite::<Flow<K>>();
            self.ident[d] = Ident::Basic;
        }
        self.compute_potentials();
        self.need_new_basis = false;
    }

    /// Build the starting basis of the dual algorithm: all artificial
    /// arcs point towards the root, hence all potentials are equal and
    /// a real arc is dual feasible at the bound matching the sign of
    /// its cost. Returns `false` if a negative cost arc has infinite
    /// capacity (no dual feasible start exists).
    fn build_dual_basis(&mut self) -> bool {
        self.compute_art_cost();
        let r = self.root();

        for a in 0..self.m as usize {
            match self.ident[a] {
                Ident::Deleted | Ident::Closed => self.flow[a] = Flow::<K>::zero(),
                _ => {
                    if self.eps_cst.ltz(self.cost[a]) {
                        if self.upper[a] == infinite::<Flow<K>>() {
                            return false;
                        }
                        self.ident[a] = Ident::AtUpper;
                        self.flow[a] = self.upper[a];
                    } else {
                        self.ident[a] = Ident::AtLower;
                        self.flow[a] = Flow::<K>::zero();
                    }
                }
            }
        }

        self.init_tree_of_dummies();
        for v in 0..self.n {
            let d = self.dummy_arc(v) as usize;
            self.tail[d] = v;
            self.head[d] = r;
            self.cost[d] = self.max_art_cost;
            self.qcost[d] = Cost::<K>::zero();
            self.upper[d] = infinite::<Flow<K>>();
            self.ident[d] = Ident::Basic;
        }
        self.rebuild_basic_flows();
        self.compute_potentials();
        self.need_new_basis = false;
        true
    }

    /// Hang every node directly below the root and thread the preorder
    /// list as root, 0, 1, ..., n-1.
    fn init_tree_of_dummies(&mut self) {
        let r = self.root();
        let n = self.n;
        self.parent[r as usize] = NONE;
        self.basic_arc[r as usize] = NONE;
        self.sub_level[r as usize] = 0;
        self.prev_t[r as usize] = NONE;
        self.next_t[r as usize] = if n > 0 { 0 } else { NONE };
        for v in 0..n {
            self.parent[v as usize] = r;
            self.basic_arc[v as usize] = self.dummy_arc(v);
            self.sub_level[v as usize] = 1;
            self.prev_t[v as usize] = if v == 0 { r } else { v - 1 };
            self.next_t[v as usize] = if v + 1 < n { v + 1 } else { NONE };
        }
    }

    /// Recompute the flows on all basic arcs from the balances and the
    /// fixed non-basic flows by folding the tree bottom-up (reverse
    /// preorder). Returns `false` if some basic flow falls outside its
    /// bounds.
    fn rebuild_basic_flows(&mut self) -> bool {
        let r = self.root();
        let na = self.nmax as usize + 1;
        // net outflow still required through the unassigned tree arcs
        let mut need_out = vec![Flow::<K>::zero(); na];
        for v in 0..self.n {
            need_out[v as usize] = -self.balance[v as usize];
        }
        for a in 0..self.m as usize {
            match self.ident[a] {
                Ident::AtUpper => {
                    need_out[self.tail[a] as usize] -= self.upper[a];
                    need_out[self.head[a] as usize] += self.upper[a];
                    self.flow[a] = self.upper[a];
                }
                Ident::AtLower | Ident::Closed => self.flow[a] = Flow::<K>::zero(),
                _ => {}
            }
        }
        for v in 0..self.n {
            let d = self.dummy_arc(v) as usize;
            if self.ident[d] != Ident::Basic {
                self.flow[d] = Flow::<K>::zero();
            }
        }

        let mut ok = true;
        let mut last = r;
        while self.next_t[last as usize] != NONE {
            last = self.next_t[last as usize];
        }
        let mut v = last;
        while v != r {
            let a = self.basic_arc[v as usize] as usize;
            let x = need_out[v as usize];
            if self.tail[a] == v {
                self.flow[a] = x;
            } else {
                self.flow[a] = -x;
            }
            if self.eps_flw.ltz(self.flow[a])
                || (self.upper[a] != infinite::<Flow<K>>() && self.eps_flw.gtz(self.flow[a] - self.upper[a]))
            {
                ok = false;
            }
            need_out[self.parent[v as usize] as usize] += x;
            v = self.prev_t[v as usize];
        }
        ok
    }

    // ---------------------------------------------------------------
    // pricing
    // ---------------------------------------------------------------

    /// Direction and violation of an arc, `None` if not eligible.
    ///
    /// The direction is `+1` if the flow should increase and `-1` if
    /// it should decrease.
    fn eligible(&self, a: usize) -> Option<(i8, Cost<K>)> {
        if self.quadratic() {
            match self.ident[a] {
                Ident::Basic | Ident::Closed | Ident::Deleted => return None,
                _ => {}
            }
            if self.ignored.contains(&(a as Index)) {
                return None;
            }
            let rc = self.red_cost(a);
            if self.eps_q.ltz(rc) && self.flow[a] < self.upper[a] {
                Some((1, -rc))
            } else if self.eps_q.gtz(rc) && self.flow[a] > Flow::<K>::zero() {
                Some((-1, rc))
            } else {
                None
            }
        } else {
            match self.ident[a] {
                Ident::AtLower => {
                    let rc = self.red_cost(a);
                    if self.eps_cst.ltz(rc) {
                        Some((1, -rc))
                    } else {
                        None
                    }
                }
                Ident::AtUpper => {
                    let rc = self.red_cost(a);
                    if self.eps_cst.gtz(rc) {
                        Some((-1, rc))
                    } else {
                        None
                    }
                }
                _ => None,
            }
        }
    }

    fn init_candidate_lists(&mut self) {
        let groups = if self.forced_groups > 0 {
            self.forced_groups
        } else {
            (self.m / 200).max(10).min(2500)
        };
        self.num_groups = groups.max(1);
        self.hot_size = if self.forced_hot > 0 {
            self.forced_hot
        } else {
            (groups / 10).max(5).min(200)
        };
        self.group_pos = 0;
        self.candidates.clear();
        self.dual_candidates.clear();
        self.arc_cursor = 0;
        self.node_cursor = 0;
    }

    fn find_entering(&mut self) -> Option<(Index, i8)> {
        match self.pricing {
            Pricing::Dantzig => {
                let mut best: Option<(Index, i8, Cost<K>)> = None;
                for a in 0..self.m as usize {
                    if let Some((dir, viol)) = self.eligible(a) {
                        if best.as_ref().map(|b| viol > b.2).unwrap_or(true) {
                            best = Some((a as Index, dir, viol));
                        }
                    }
                }
                best.map(|(a, dir, _)| (a, dir))
            }
            Pricing::FirstEligible => {
                if self.m == 0 {
                    return None;
                }
                let start = self.arc_cursor % self.m;
                let mut a = start;
                loop {
                    if let Some((dir, _)) = self.eligible(a as usize) {
                        self.arc_cursor = (a + 1) % self.m;
                        return Some((a, dir));
                    }
                    a = (a + 1) % self.m;
                    if a == start {
                        return None;
                    }
                }
            }
            Pricing::CandidateList => self.candidate_list_entering(),
        }
    }

    /// The candidate-list rule: drop stale entries from the hot list,
    /// refill it group by group, sort by violation and return the
    /// head.
    fn candidate_list_entering(&mut self) -> Option<(Index, i8)> {
        let mut kept = std::mem::take(&mut self.candidates);
        kept.retain(|&(a, _)| self.eligible(a as usize).is_some());
        for e in kept.iter_mut() {
            e.1 = self
                .eligible(e.0 as usize)
                .map(|(_, v)| v)
                .unwrap_or_else(Cost::<K>::zero);
        }
        self.candidates = kept;

        let groups = self.num_groups.max(1);
        let mut scanned = 0;
        while (self.candidates.len() as Index) < self.hot_size && scanned < groups {
            let g = self.group_pos;
            self.group_pos = (self.group_pos + 1) % groups;
            scanned += 1;
            let mut a = g;
            while a < self.m {
                if !self.candidates.iter().any(|&(c, _)| c == a) {
                    if let Some((_, viol)) = self.eligible(a as usize) {
                        self.candidates.push((a, viol));
                    }
                }
                a += groups;
            }
        }

        self.candidates
            .sort_unstable_by(|x, y| y.1.partial_cmp(&x.1).unwrap_or(std::cmp::Ordering::Equal));
        self.candidates.truncate(self.hot_size as usize);
        self.candidates
            .first()
            .map(|&(a, _)| a)
            .and_then(|a| self.eligible(a as usize).map(|(dir, _)| (a, dir)))
    }

    // ---------------------------------------------------------------
    // primal pivot
    // ---------------------------------------------------------------

    /// Ratio test along the cycle of the entering arc, walking the
    /// tree chains of `from` and `to` up to their common ancestor.
    ///
    /// The cycle pushes flow out of `from` through the entering arc
    /// into `to` and back along the tree path `to -> apex -> from`.
    /// Ties are broken in favour of the deeper blocking arc, which
    /// keeps the basis strongly feasible under degeneracy.
    fn ratio_test(&self, from: Index, to: Index, cap_k: Flow<K>, q_k: Cost<K>) -> RatioResult<K> {
        let mut theta = cap_k;
        let mut block_node = NONE;
        let mut block_from_side = false;
        let mut block_at_upper = false;
        let mut block_level = i32::min_value();

        let inf = infinite::<Flow<K>>();
        let (mut u, mut v) = (from, to);
        while u != v {
            let from_side = self.sub_level[u as usize] >= self.sub_level[v as usize];
            let w = if from_side { u } else { v };
            let a = self.basic_arc[w as usize] as usize;
            // on the from side the cycle runs parent -> w, on the to
            // side w -> parent
            let increases = if from_side { self.tail[a] != w } else { self.tail[a] == w };
            let step = if increases {
                if self.upper[a] == inf {
                    inf
                } else {
                    self.upper[a] - self.flow[a]
                }
            } else {
                self.flow[a]
            };
            let replace =
                step < theta || (self.eps_flw.eq(step, theta) && self.sub_level[w as usize] > block_level);
            if replace {
                theta = step;
                block_node = w;
                block_from_side = from_side;
                block_at_upper = increases;
                block_level = self.sub_level[w as usize];
            }
            if from_side {
                u = self.parent[u as usize];
            } else {
                v = self.parent[v as usize];
            }
        }

        let two = Cost::<K>::one() + Cost::<K>::one();
        let qcycle = q_k + self.sum_q[from as usize] + self.sum_q[to as usize] - two * self.sum_q[u as usize];
        RatioResult {
            theta,
            block_node,
            block_from_side,
            block_at_upper,
            apex: u,
            qcycle,
        }
    }

    /// Add `theta` to the flows along the tree part of the cycle
    /// `from -> entering -> to -> apex -> from` (the entering arc
    /// itself is not touched).
    fn apply_cycle(&mut self, from: Index, to: Index, apex: Index, theta: Flow<K>) {
        let mut u = from;
        while u != apex {
            let a = self.basic_arc[u as usize] as usize;
            if self.tail[a] == u {
                self.flow[a] -= theta;
            } else {
                self.flow[a] += theta;
            }
            u = self.parent[u as usize];
        }
        let mut v = to;
        while v != apex {
            let a = self.basic_arc[v as usize] as usize;
            if self.tail[a] == v {
                self.flow[a] += theta;
            } else {
                self.flow[a] -= theta;
            }
            v = self.parent[v as usize];
        }
    }

    /// Re-root the subtree cut off by the leaving arc at `k2` and
    /// reattach it below `k1` via the entering arc.
    ///
    /// Walking up the old path `k2 -> h2`, each node's remaining
    /// subtree is cut out of the preorder thread as one contiguous
    /// segment (adjusting the levels by the re-rooting delta) and
    /// pasted after the previously moved segment, so every processed
    /// node becomes a child of its old child.
    fn update_tree(&mut self, h2: Index, in_arc: Index, k1: Index, k2: Index) {
        let mut node = k2;
        let mut new_parent = k1;
        let mut new_arc = in_arc;
        let mut paste_after = k1;
        loop {
            let old_parent = self.parent[node as usize];
            let old_arc = self.basic_arc[node as usize];
            let old_level = self.sub_level[node as usize];
            let delta = self.sub_level[new_parent as usize] + 1 - old_level;

            // the segment [node..last] is the remaining subtree of node
            let mut last = node;
            self.sub_level[node as usize] += delta;
            loop {
                let nx = self.next_t[last as usize];
                if nx == NONE || self.sub_level[nx as usize] <= old_level {
                    break;
                }
                last = nx;
                self.sub_level[nx as usize] += delta;
            }

            // splice the segment out ...
            let before = self.prev_t[node as usize];
            let after = self.next_t[last as usize];
            self.next_t[before as usize] = after;
            if after != NONE {
                self.prev_t[after as usize] = before;
            }
            // ... and back in after paste_after
            let succ = self.next_t[paste_after as usize];
            self.next_t[paste_after as usize] = node;
            self.prev_t[node as usize] = paste_after;
            self.next_t[last as usize] = succ;
            if succ != NONE {
                self.prev_t[succ as usize] = last;
            }

            self.parent[node as usize] = new_parent;
            self.basic_arc[node as usize] = new_arc;
            paste_after = last;

            if node == h2 {
                break;
            }
            new_parent = node;
            new_arc = old_arc;
            node = old_parent;
        }
    }

    /// Perform one primal pivot on the entering arc `k`.
    ///
    /// Returns `false` if the ratio test proves unboundedness.
    fn primal_pivot(&mut self, k: Index, dir: i8) -> bool {
        let ka = k as usize;
        let inf = infinite::<Flow<K>>();
        let (from, to) = if dir > 0 {
            (self.tail[ka], self.head[ka])
        } else {
            (self.head[ka], self.tail[ka])
        };
        let cap_k = if dir > 0 {
            if self.upper[ka] == inf {
                inf
            } else {
                self.upper[ka] - self.flow[ka]
            }
        } else {
            self.flow[ka]
        };

        let rt = self.ratio_test(from, to, cap_k, self.qcost[ka]);
        let mut theta = rt.theta;
        let mut interior = false;

        if self.quadratic() && self.eps_cst.gtz(rt.qcycle) {
            // the 1-d quadratic along the cycle may have an interior
            // optimum before any bound blocks
            let rc_abs = self.red_cost(ka).abs();
            let theta_opt = K::cost_as_flow(rc_abs / rt.qcycle);
            if theta_opt < theta {
                theta = theta_opt;
                interior = true;
            }
        }
        if !interior && theta == inf {
            return false;
        }

        trace!("pivot: arc {} dir {} theta {:?}", k, dir, theta);

        self.apply_cycle(from, to, rt.apex, theta);
        if dir > 0 {
            self.flow[ka] += theta;
        } else {
            self.flow[ka] -= theta;
        }

        if interior {
            // the entering arc stops at the zero of its reduced cost
            // and the basis does not change
            if theta.is_zero() {
                self.ignored.push(k);
            }
            if self.eps_flw.etz(self.flow[ka]) {
                self.ident[ka] = Ident::AtLower;
            } else if self.eps_flw.etz(self.upper[ka] - self.flow[ka]) {
                self.ident[ka] = Ident::AtUpper;
            }
            self.compute_potentials();
            return true;
        }

        if rt.block_node == NONE {
            // the entering arc blocks itself: bound swap
            self.ident[ka] = if dir > 0 { Ident::AtUpper } else { Ident::AtLower };
            if self.quadratic() {
                self.compute_potentials();
            }
            return true;
        }

        let w = rt.block_node;
        let out_arc = self.basic_arc[w as usize];
        self.ident[out_arc as usize] = if rt.block_at_upper {
            Ident::AtUpper
        } else {
            Ident::AtLower
        };
        self.ident[ka] = Ident::Basic;

        // the entering endpoint inside the cut-off subtree becomes its
        // new root
        let (k1, k2) = if rt.block_from_side { (to, from) } else { (from, to) };
        self.update_tree(w, k, k1, k2);
        if self.quadratic() {
            self.compute_potentials();
        } else {
            self.update_potentials(k2);
        }
        true
    }

    fn primal_loop(&mut self, started: Instant) -> Status {
        let mut iter = 0usize;
        loop {
            if (self.max_iter > 0 && iter >= self.max_iter)
                || (self.max_time > 0.0 && started.elapsed().as_secs_f64() >= self.max_time)
            {
                return Status::Stopped;
            }
            match self.find_entering() {
                Some((k, dir)) => {
                    iter += 1;
                    self.niter += 1;
                    self.pivots_since_fo += 1;
                    if !self.primal_pivot(k, dir) {
                        return Status::Unbounded;
                    }
                    if self.quadratic() && self.pivots_since_fo >= self.recompute_fo_limit {
                        self.fo = self.compute_fo();
                        self.pivots_since_fo = 0;
                        trace!("objective refreshed: {:?}", self.fo);
                    }
                }
                None => {
                    if self.quadratic() && !self.ignored.is_empty() {
                        // end of the sweep: retry the skipped arcs once
                        self.ignored.clear();
                        if self.find_entering().is_some() {
                            continue;
                        }
                    }
                    break;
                }
            }
        }
        if self.dummies_feasible() {
            Status::Optimal
        } else {
            Status::Infeasible
        }
    }

    fn dummies_feasible(&self) -> bool {
        (0..self.n).all(|v| self.eps_flw.etz(self.flow[self.dummy_arc(v) as usize]))
    }

    // ---------------------------------------------------------------
    // dual simplex
    // ---------------------------------------------------------------

    /// Primal infeasibility of the basic arc of `v`, if any.
    fn infeasibility(&self, v: Index) -> Option<Flow<K>> {
        let a = self.basic_arc[v as usize] as usize;
        let x = self.flow[a];
        if self.eps_flw.ltz(x) {
            Some(-x)
        } else if self.upper[a] != infinite::<Flow<K>>() && self.eps_flw.gtz(x - self.upper[a]) {
            Some(x - self.upper[a])
        } else {
            None
        }
    }

    fn find_leaving(&mut self) -> Option<Index> {
        match self.pricing {
            Pricing::Dantzig => {
                let mut best: Option<(Index, Flow<K>)> = None;
                for v in 0..self.n {
                    if let Some(inf) = self.infeasibility(v) {
                        if best.as_ref().map(|b| inf > b.1).unwrap_or(true) {
                            best = Some((v, inf));
                        }
                    }
                }
                best.map(|(v, _)| v)
            }
            Pricing::FirstEligible => {
                if self.n == 0 {
                    return None;
                }
                let start = self.node_cursor % self.n;
                let mut v = start;
                loop {
                    if self.infeasibility(v).is_some() {
                        self.node_cursor = (v + 1) % self.n;
                        return Some(v);
                    }
                    v = (v + 1) % self.n;
                    if v == start {
                        return None;
                    }
                }
            }
            Pricing::CandidateList => {
                let mut kept = std::mem::take(&mut self.dual_candidates);
                kept.retain(|&(v, _)| self.infeasibility(v).is_some());
                for e in kept.iter_mut() {
                    e.1 = self.infeasibility(e.0).unwrap_or_else(Flow::<K>::zero);
                }
                self.dual_candidates = kept;

                let groups = self.num_groups.max(1);
                let mut scanned = 0;
                while (self.dual_candidates.len() as Index) < self.hot_size && scanned < groups {
                    let g = self.group_pos;
                    self.group_pos = (self.group_pos + 1) % groups;
                    scanned += 1;
                    let mut v = g;
                    while v < self.n {
                        if !self.dual_candidates.iter().any(|&(c, _)| c == v) {
                            if let Some(inf) = self.infeasibility(v) {
                                self.dual_candidates.push((v, inf));
                            }
                        }
                        v += groups;
                    }
                }
                self.dual_candidates
                    .sort_unstable_by(|x, y| y.1.partial_cmp(&x.1).unwrap_or(std::cmp::Ordering::Equal));
                self.dual_candidates.truncate(self.hot_size as usize);
                self.dual_candidates.first().map(|&(v, _)| v)
            }
        }
    }

    /// One dual pivot around the primal infeasible basic arc of `w`.
    ///
    /// Returns `false` if no entering arc can restore feasibility
    /// (the instance is infeasible).
    fn dual_pivot(&mut self, w: Index) -> bool {
        let h_arc = self.basic_arc[w as usize];
        let ha = h_arc as usize;
        let f = self.flow[ha];
        let (bound_ident, bstar) = if self.eps_flw.ltz(f) {
            (Ident::AtLower, Flow::<K>::zero())
        } else {
            (Ident::AtUpper, self.upper[ha])
        };

        // stamp the subtree T2 below w
        self.iteration += 1;
        let stamp = self.iteration;
        let level = self.sub_level[w as usize];
        {
            let mut v = w;
            loop {
                self.when_in_t2[v as usize] = stamp;
                v = self.next_t[v as usize];
                if v == NONE || self.sub_level[v as usize] <= level {
                    break;
                }
            }
        }

        // flow that the entering arc must additionally carry into T2
        let sigma: Flow<K> = if self.head[ha] == w {
            Flow::<K>::one()
        } else {
            -Flow::<K>::one()
        };
        let delta_in = sigma * (f - bstar);
        let wants_inflow = delta_in > Flow::<K>::zero();

        // scan the cut for the entering arc of least reduced-cost
        // magnitude; the artificial arc of every T2 node crosses the
        // cut as well
        let mut best: Option<(Index, i8, Cost<K>)> = None;
        let mut consider = |spx: &Self, a: Index, best: &mut Option<(Index, i8, Cost<K>)>| {
            let au = a as usize;
            let into_t2 = spx.when_in_t2[spx.head[au] as usize] == stamp;
            let out_of_t2 = spx.when_in_t2[spx.tail[au] as usize] == stamp;
            if into_t2 == out_of_t2 {
                // not a cut arc
                return;
            }
            let dir: i8 = match (wants_inflow, into_t2, spx.ident[au]) {
                (true, true, Ident::AtLower) => 1,
                (true, false, Ident::AtUpper) => -1,
                (false, true, Ident::AtUpper) => -1,
                (false, false, Ident::AtLower) => 1,
                _ => return,
            };
            let rc = spx.red_cost(au).abs();
            if best.as_ref().map(|b| rc < b.2).unwrap_or(true) {
                *best = Some((a, dir, rc));
            }
        };
        let mut v = w;
        loop {
            let mut a = self.first_out[v as usize];
            while a != NONE {
                consider(self, a, &mut best);
                a = self.next_out[a as usize];
            }
            let mut a = self.first_in[v as usize];
            while a != NONE {
                consider(self, a, &mut best);
                a = self.next_in[a as usize];
            }
            if v < self.n {
                consider(self, self.dummy_arc(v), &mut best);
            }
            v = self.next_t[v as usize];
            if v == NONE || self.sub_level[v as usize] <= level {
                break;
            }
        }

        let (e, dir, _) = match best {
            Some(b) => b,
            None => return false,
        };
        let ea = e as usize;
        let theta = delta_in.abs();

        let (from, to) = if dir > 0 {
            (self.tail[ea], self.head[ea])
        } else {
            (self.head[ea], self.tail[ea])
        };
        let (mut u, mut vv) = (from, to);
        while u != vv {
            if self.sub_level[u as usize] >= self.sub_level[vv as usize] {
                u = self.parent[u as usize];
            } else {
                vv = self.parent[vv as usize];
            }
        }
        self.apply_cycle(from, to, u, theta);
        if dir > 0 {
            self.flow[ea] += theta;
        } else {
            self.flow[ea] -= theta;
        }

        self.ident[ha] = bound_ident;
        self.ident[ea] = Ident::Basic;
        let (k1, k2) = if self.when_in_t2[self.tail[ea] as usize] == stamp {
            (self.head[ea], self.tail[ea])
        } else {
            (self.tail[ea], self.head[ea])
        };
        self.update_tree(w, e, k1, k2);
        self.update_potentials(k2);
        true
    }

    fn dual_loop(&mut self, started: Instant) -> Status {
        let mut iter = 0usize;
        loop {
            if (self.max_iter > 0 && iter >= self.max_iter)
                || (self.max_time > 0.0 && started.elapsed().as_secs_f64() >= self.max_time)
            {
                return Status::Stopped;
            }
            match self.find_leaving() {
                Some(w) => {
                    iter += 1;
                    self.niter += 1;
                    if !self.dual_pivot(w) {
                        return Status::Infeasible;
                    }
                }
                None => break,
            }
        }
        if self.dummies_feasible() {
            Status::Optimal
        } else {
            Status::Infeasible
        }
    }

    // ---------------------------------------------------------------
    // objective
    // ---------------------------------------------------------------

    fn compute_fo(&self) -> Obj<K> {
        let two = Obj::<K>::one() + Obj::<K>::one();
        let mut fo = Obj::<K>::zero();
        for a in 0..self.m as usize {
            match self.ident[a] {
                Ident::Deleted | Ident::Closed => continue,
                _ => {}
            }
            let x = K::flow_as_obj(self.flow[a]);
            fo += K::cost_as_obj(self.cost[a]) * x;
            if !self.qcost[a].is_zero() {
                fo += K::cost_as_obj(self.qcost[a]) * x * x / two;
            }
        }
        fo
    }

    /// Rebuild the basis tree from the `Basic` tags of a restored
    /// state.
    fn rebuild_tree_from_idents(&mut self) -> Result<()> {
        let r = self.root();
        let na = self.nmax as usize + 1;
        let ma = self.mmax as usize + self.nmax as usize;
        let mut adj: Vec<Vec<Index>> = vec![vec![]; na];
        for a in 0..ma {
            if self.ident[a] == Ident::Basic {
                adj[self.tail[a] as usize].push(a as Index);
                adj[self.head[a] as usize].push(a as Index);
            }
        }

        for v in 0..na {
            self.parent[v] = NONE;
            self.basic_arc[v] = NONE;
            self.prev_t[v] = NONE;
            self.next_t[v] = NONE;
            self.sub_level[v] = 0;
        }

        // depth-first from the root, building the preorder thread
        let mut visited = vec![false; na];
        visited[r as usize] = true;
        let mut stack = vec![r];
        let mut prev = r;
        let mut count = 1;
        while let Some(v) = stack.pop() {
            if v != r {
                self.next_t[prev as usize] = v;
                self.prev_t[v as usize] = prev;
                prev = v;
            }
            for &a in adj[v as usize].iter() {
                let au = a as usize;
                let o = if self.tail[au] == v { self.head[au] } else { self.tail[au] };
                if !visited[o as usize] {
                    visited[o as usize] = true;
                    count += 1;
                    self.parent[o as usize] = v;
                    self.basic_arc[o as usize] = a;
                    self.sub_level[o as usize] = self.sub_level[v as usize] + 1;
                    stack.push(o);
                }
            }
        }
        if count != self.n as usize + 1 {
            return Err(McfError::Numerical);
        }
        Ok(())
    }
}

impl<K: NumKinds> Mcf for NetSimplex<K> {
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
        self.num_quadratic = 0;

        let mut free: Vec<Index> = vec![];
        for a in 0..m as usize {
            if starts[a] >= n || ends[a] >= n {
                return Err(McfError::InvalidName(a as Index));
            }
            self.tail[a] = starts[a];
            self.head[a] = ends[a];
            self.cost[a] = costs[a];
            self.upper[a] = caps[a];
            self.flow[a] = Flow::<K>::zero();
            if costs[a] == infinite::<Cost<K>>() {
                if caps[a] == infinite::<Flow<K>>() {
                    self.ident[a] = Ident::Deleted;
                    self.tail[a] = NONE;
                    free.push(a as Index);
                    continue;
                }
                self.ident[a] = Ident::Closed;
            } else {
                self.ident[a] = Ident::AtLower;
            }
            self.link_arc(a as Index);
        }
        // thread the free names, smallest first
        self.first_free = NONE;
        for &a in free.iter().rev() {
            self.head[a as usize] = self.first_free;
            self.first_free = a;
        }
        self.balance[..n as usize].copy_from_slice(&deficits[..n as usize]);

        self.status = Status::Unsolved;
        self.need_new_basis = true;
        self.ignored.clear();
        self.init_candidate_lists();
        debug!("simplex: loaded {} nodes, {} arcs", n, m);
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
            Param::AlgPrimal => {
                let primal = val.as_int() != 0;
                if primal != self.use_primal {
                    self.set_alg(primal, self.pricing);
                }
            }
            Param::AlgPricing => {
                self.pricing = match val.as_int() {
                    0 => Pricing::Dantzig,
                    1 => Pricing::FirstEligible,
                    2 => Pricing::CandidateList,
                    _ => return Err(McfError::UnsupportedParam(par)),
                };
            }
            Param::NumCandList => {
                self.forced_groups = val.as_int().max(0) as Index;
                self.init_candidate_lists();
            }
            Param::HotListSize => {
                self.forced_hot = val.as_int().max(0) as Index;
                self.init_candidate_lists();
            }
            Param::RecomputeFOLimits => self.recompute_fo_limit = val.as_int().max(1) as u32,
            Param::EpsOpt => {
                self.eps_opt = val.as_flt();
                self.eps_q = Tolerance::new(Cost::<K>::from_f64(self.eps_opt).ok_or(McfError::Numerical)?);
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
            Param::AlgPrimal => ParValue::Int(self.use_primal as i64),
            Param::AlgPricing => ParValue::Int(match self.pricing {
                Pricing::Dantzig => 0,
                Pricing::FirstEligible => 1,
                Pricing::CandidateList => 2,
            }),
            Param::NumCandList => ParValue::Int(self.num_groups as i64),
            Param::HotListSize => ParValue::Int(self.hot_size as i64),
            Param::RecomputeFOLimits => ParValue::Int(self.recompute_fo_limit as i64),
            Param::EpsOpt => ParValue::Flt(self.eps_opt),
            _ => return Err(McfError::UnsupportedParam(par)),
        })
    }

    fn solve(&mut self) -> Status {
        let t = self.timer.start();
        let started = Instant::now();
        self.niter = 0;

        let mut primal = self.use_primal;
        if self.quadratic() && !primal {
            warn!("simplex: quadratic costs require the primal algorithm");
            primal = true;
        }

        if self.need_new_basis {
            if primal {
                self.build_primal_basis();
            } else if !self.build_dual_basis() {
                warn!("simplex: no dual feasible start, falling back to primal");
                primal = true;
                self.build_primal_basis();
            }
            self.init_candidate_lists();
            self.ignored.clear();
        } else if self.status != Status::Stopped {
            // data edits leave the basis intact but potentials stale
            self.compute_potentials();
        }

        self.status = if primal {
            self.primal_loop(started)
        } else {
            self.dual_loop(started)
        };
        if self.status == Status::Optimal {
            self.fo = self.compute_fo();
        }
        debug!("simplex: {:?} after {} pivots", self.status, self.niter);
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
        self.flow[arc as usize]
    }

    fn flows_sparse(&self, out: &mut [Flow<K>], nms: &mut [Index]) -> usize {
        let mut k = 0;
        for a in 0..self.m as usize {
            if self.ident[a] != Ident::Deleted && !self.eps_flw.etz(self.flow[a]) {
                out[k] = self.flow[a];
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
        match self.ident[arc as usize] {
            Ident::Closed | Ident::Deleted => infinite::<Cost<K>>(),
            _ => self.red_cost(arc as usize),
        }
    }

    fn potential(&self, node: Index) -> Cost<K> {
        assert!(node < self.n);
        self.potential[node as usize]
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
        if self.ident[arc as usize] == Ident::Deleted {
            NONE
        } else {
            self.tail[arc as usize]
        }
    }

    fn end_node(&self, arc: Index) -> Index {
        assert!(arc < self.m);
        if self.ident[arc as usize] == Ident::Deleted {
            NONE
        } else {
            self.head[arc as usize]
        }
    }

    fn cost(&self, arc: Index) -> Cost<K> {
        assert!(arc < self.m);
        if self.ident[arc as usize] == Ident::Deleted {
            infinite::<Cost<K>>()
        } else {
            self.cost[arc as usize]
        }
    }

    fn qcoef(&self, arc: Index) -> Cost<K> {
        assert!(arc < self.m);
        self.qcost[arc as usize]
    }

    fn qcoefs(&self, out: &mut [Cost<K>], nms: Option<&[Index]>, start: Index, stop: Index) {
        read_range(out, nms, start, stop, self.m, |a| self.qcost[a as usize]);
    }

    fn ucap(&self, arc: Index) -> Flow<K> {
        assert!(arc < self.m);
        if self.ident[arc as usize] == Ident::Deleted {
            Flow::<K>::zero()
        } else {
            self.upper[arc as usize]
        }
    }

    fn deficit(&self, node: Index) -> Flow<K> {
        assert!(node < self.n);
        self.balance[node as usize]
    }

    fn is_closed_arc(&self, arc: Index) -> bool {
        arc < self.m && self.ident[arc as usize] == Ident::Closed
    }

    fn is_deleted_arc(&self, arc: Index) -> bool {
        arc < self.m && self.ident[arc as usize] == Ident::Deleted
    }

    fn state(&self) -> McfState<K> {
        McfState {
            flows: self.flow[..self.m as usize].to_vec(),
            red_costs: None,
            basis: Some(self.ident.iter().map(|i| i.as_i8()).collect()),
        }
    }

    fn put_state(&mut self, state: &McfState<K>) -> Result<()> {
        if state.flows.len() != self.m as usize {
            return Err(McfError::IllegalTopologyOp);
        }
        let basis = state.basis.as_ref().ok_or(McfError::IllegalTopologyOp)?;
        if basis.len() != self.ident.len() {
            return Err(McfError::IllegalTopologyOp);
        }
        for (i, &b) in basis.iter().enumerate() {
            self.ident[i] = Ident::from_i8(b).ok_or(McfError::Numerical)?;
        }
        self.flow[..self.m as usize].copy_from_slice(&state.flows);
        self.rebuild_tree_from_idents()?;
        self.rebuild_basic_flows();
        self.compute_potentials();
        self.need_new_basis = false;
        self.status = Status::Unsolved;
        Ok(())
    }

    fn chg_cost(&mut self, arc: Index, cost: Cost<K>) -> Result<()> {
        self.check_arc(arc)?;
        self.cost[arc as usize] = cost;
        if !self.reopt {
            self.need_new_basis = true;
        }
        self.status = Status::Unsolved;
        Ok(())
    }

    fn chg_qcoef(&mut self, arc: Index, q: Cost<K>) -> Result<()> {
        self.check_arc(arc)?;
        if self.eps_cst.ltz(q) {
            return Err(McfError::UnsupportedParam(Param::EpsOpt));
        }
        let a = arc as usize;
        if self.qcost[a].is_zero() != q.is_zero() {
            if q.is_zero() {
                self.num_quadratic -= 1;
            } else {
                self.num_quadratic += 1;
            }
        }
        self.qcost[a] = q;
        self.need_new_basis = true;
        self.status = Status::Unsolved;
        Ok(())
    }

    fn chg_ucap(&mut self, arc: Index, cap: Flow<K>) -> Result<()> {
        self.check_arc(arc)?;
        let a = arc as usize;
        self.upper[a] = cap;
        if self.reopt && !self.need_new_basis {
            if self.ident[a] == Ident::AtUpper {
                self.flow[a] = cap;
            }
            if !self.rebuild_basic_flows() {
                self.need_new_basis = true;
            }
        } else {
            self.need_new_basis = true;
        }
        self.status = Status::Unsolved;
        Ok(())
    }

    fn chg_dfct(&mut self, node: Index, deficit: Flow<K>) -> Result<()> {
        self.check_node(node)?;
        self.balance[node as usize] = deficit;
        if self.reopt && !self.need_new_basis {
            if !self.rebuild_basic_flows() {
                self.need_new_basis = true;
            }
        } else {
            self.need_new_basis = true;
        }
        self.status = Status::Unsolved;
        Ok(())
    }

    fn close_arc(&mut self, arc: Index) -> Result<()> {
        self.check_arc(arc)?;
        let a = arc as usize;
        if !self.eps_flw.etz(self.flow[a]) || self.ident[a] == Ident::Basic {
            self.need_new_basis = true;
        }
        self.flow[a] = Flow::<K>::zero();
        self.ident[a] = Ident::Closed;
        self.status = Status::Unsolved;
        Ok(())
    }

    fn open_arc(&mut self, arc: Index) -> Result<()> {
        if arc >= self.m {
            return Err(McfError::InvalidName(arc));
        }
        let a = arc as usize;
        match self.ident[a] {
            Ident::Deleted => Err(McfError::IllegalTopologyOp),
            Ident::Closed => {
                self.ident[a] = Ident::AtLower;
                self.flow[a] = Flow::<K>::zero();
                if self.status == Status::Optimal && self.reopt && !self.eps_cst.ltz(self.red_cost(a)) {
                    // the reopened arc does not violate optimality
                } else {
                    self.status = Status::Unsolved;
                    if !self.reopt {
                        self.need_new_basis = true;
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn del_arc(&mut self, arc: Index) -> Result<()> {
        self.check_arc(arc)?;
        let a = arc as usize;
        if !self.eps_flw.etz(self.flow[a]) || self.ident[a] == Ident::Basic {
            self.need_new_basis = true;
            self.status = Status::Unsolved;
        }
        self.unlink_arc(arc);
        self.ident[a] = Ident::Deleted;
        self.flow[a] = Flow::<K>::zero();
        self.tail[a] = NONE;
        // insert into the free list, kept sorted by name
        if self.first_free == NONE || arc < self.first_free {
            self.head[a] = self.first_free;
            self.first_free = arc;
        } else {
            let mut cur = self.first_free;
            while self.head[cur as usize] != NONE && self.head[cur as usize] < arc {
                cur = self.head[cur as usize];
            }
            self.head[a] = self.head[cur as usize];
            self.head[cur as usize] = arc;
        }
        Ok(())
    }

    fn del_node(&mut self, node: Index) -> Result<()> {
        self.check_node(node)?;
        let mut a = self.first_out[node as usize];
        while a != NONE {
            self.ident[a as usize] = Ident::Closed;
            self.flow[a as usize] = Flow::<K>::zero();
            a = self.next_out[a as usize];
        }
        let mut a = self.first_in[node as usize];
        while a != NONE {
            self.ident[a as usize] = Ident::Closed;
            self.flow[a as usize] = Flow::<K>::zero();
            a = self.next_in[a as usize];
        }
        self.balance[node as usize] = Flow::<K>::zero();
        self.need_new_basis = true;
        self.status = Status::Unsolved;
        Ok(())
    }

    fn add_arc(&mut self, start: Index, end: Index, cap: Flow<K>, cost: Cost<K>) -> Result<Index> {
        if start >= self.n || end >= self.n {
            return Err(McfError::InvalidName(start.max(end)));
        }
        let name = if self.first_free != NONE {
            let name = self.first_free;
            self.first_free = self.head[name as usize];
            name
        } else if self.m < self.mmax {
            let name = self.m;
            self.m += 1;
            name
        } else {
            return Err(McfError::CapacityExceeded);
        };
        let a = name as usize;
        self.tail[a] = start;
        self.head[a] = end;
        self.cost[a] = cost;
        self.qcost[a] = Cost::<K>::zero();
        self.upper[a] = cap;
        self.flow[a] = Flow::<K>::zero();
        self.ident[a] = if cost == infinite::<Cost<K>>() {
            Ident::Closed
        } else {
            Ident::AtLower
        };
        self.link_arc(name);
        if self.ident[a] == Ident::AtLower {
            if self.status == Status::Optimal && self.reopt && !self.eps_cst.ltz(self.red_cost(a)) {
                // optimality is preserved
            } else {
                self.status = Status::Unsolved;
                if !self.reopt {
                    self.need_new_basis = true;
                }
            }
        }
        Ok(name)
    }

    fn add_node(&mut self, deficit: Flow<K>) -> Result<Index> {
        if self.n >= self.nmax {
            return Err(McfError::CapacityExceeded);
        }
        let v = self.n;
        self.n += 1;
        self.balance[v as usize] = deficit;
        if !self.need_new_basis {
            // attach the new node below the root via its artificial arc
            let r = self.root();
            let d = self.dummy_arc(v) as usize;
            if deficit > Flow::<K>::zero() {
                self.tail[d] = r;
                self.head[d] = v;
                self.flow[d] = deficit;
            } else {
                self.tail[d] = v;
                self.head[d] = r;
                self.flow[d] = -deficit;
            }
            self.cost[d] = self.max_art_cost;
            self.upper[d] = infinite::<Flow<K>>();
            self.ident[d] = Ident::Basic;
            self.parent[v as usize] = r;
            self.basic_arc[v as usize] = self.dummy_arc(v);
            self.sub_level[v as usize] = 1;
            let succ = self.next_t[r as usize];
            self.next_t[r as usize] = v;
            self.prev_t[v as usize] = r;
            self.next_t[v as usize] = succ;
            if succ != NONE {
                self.prev_t[succ as usize] = v;
            }
            self.compute_node_potential(v);
        }
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
        if let Some(s) = new_start {
            self.tail[a] = s;
        }
        if let Some(e) = new_end {
            self.head[a] = e;
        }
        self.link_arc(arc);
        // moving an endpoint invalidates the basis role of the arc
        self.need_new_basis = true;
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

    type Spx = NetSimplex<(i64, i64, i64)>;

    fn solve_all_rules(mut build: impl FnMut() -> Spx, expect: Status) -> Vec<Spx> {
        let mut out = vec![];
        for primal in [true, false].iter() {
            for pricing in [Pricing::Dantzig, Pricing::FirstEligible, Pricing::CandidateList].iter() {
                if !primal && *pricing == Pricing::Dantzig {
                    continue;
                }
                let mut spx = build();
                spx.set_alg(*primal, *pricing);
                assert_eq!(spx.solve(), expect, "primal={} pricing={:?}", primal, pricing);
                out.push(spx);
            }
        }
        out
    }

    #[test]
    fn minimal_transport() {
        let solved = solve_all_rules(
            || {
                let mut spx = Spx::new(2, 1);
                spx.load_net(2, 1, 2, 1, &[1], &[3], &[-1, 1], &[0], &[1]).unwrap();
                spx
            },
            Status::Optimal,
        );
        for spx in solved {
            assert_eq!(spx.flow(0), 1);
            assert_eq!(spx.objective(), 3);
            assert_eq!(spx.potential(1) - spx.potential(0), 3);
            assert_eq!(spx.reduced_cost(0), 0);
        }
    }

    #[test]
    fn capacity_binding_is_infeasible() {
        solve_all_rules(
            || {
                let mut spx = Spx::new(3, 2);
                spx.load_net(3, 2, 3, 2, &[1, 2], &[1, 1], &[-2, 0, 2], &[0, 1], &[1, 2])
                    .unwrap();
                spx
            },
            Status::Infeasible,
        );
    }

    #[test]
    fn quadratic_single_arc() {
        let mut spx = Spx::new(2, 1);
        spx.load_net(2, 1, 2, 1, &[10], &[0], &[-5, 5], &[0], &[1]).unwrap();
        spx.chg_qcoef(0, 2).unwrap();
        assert_eq!(spx.solve(), Status::Optimal);
        assert_eq!(spx.flow(0), 5);
        assert_eq!(spx.objective(), 25);
        assert_eq!(spx.potential(1) - spx.potential(0), 10);
        assert_eq!(spx.reduced_cost(0), 0);
    }

    #[test]
    fn unbounded_cycle() {
        let mut spx = Spx::new(2, 2);
        spx.load_net(
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
        assert_eq!(spx.solve(), Status::Unbounded);
        assert_eq!(spx.objective(), -infinite::<i64>());
    }

    /// A 4-node instance with two node-disjoint routes of different
    /// cost.
    fn two_routes() -> Spx {
        let mut spx = Spx::new(4, 4);
        spx.load_net(
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
        spx
    }

    #[test]
    fn close_and_reopen_recovers_objective() {
        let mut spx = two_routes();
        assert_eq!(spx.solve(), Status::Optimal);
        assert_eq!(spx.objective(), 6);

        spx.close_arc(0).unwrap();
        assert_eq!(spx.solve(), Status::Optimal);
        assert_eq!(spx.objective(), 24);

        spx.open_arc(0).unwrap();
        assert_eq!(spx.solve(), Status::Optimal);
        assert_eq!(spx.objective(), 6);
    }

    #[test]
    fn delete_reuses_smallest_name() {
        let mut spx = Spx::new(4, 6);
        spx.load_net(
            4,
            6,
            4,
            5,
            &[5, 5, 5, 5, 5],
            &[1, 1, 4, 4, 9],
            &[-3, 0, 0, 3],
            &[0, 1, 0, 2, 0],
            &[1, 3, 2, 3, 3],
        )
        .unwrap();
        spx.del_arc(2).unwrap();
        spx.del_arc(4).unwrap();
        assert!(spx.is_deleted_arc(2));
        assert_eq!(spx.start_node(2), NONE);
        let name = spx.add_arc(0, 2, 5, 4).unwrap();
        assert_eq!(name, 2);
        let name = spx.add_arc(0, 3, 5, 9).unwrap();
        assert_eq!(name, 4);
        assert_eq!(spx.solve(), Status::Optimal);
        assert_eq!(spx.objective(), 6);
    }

    #[test]
    fn state_round_trip() {
        let mut spx = two_routes();
        assert_eq!(spx.solve(), Status::Optimal);
        let fo = spx.objective();
        let flows: Vec<i64> = (0..spx.num_arcs()).map(|a| spx.flow(a)).collect();
        let state = spx.state();

        spx.close_arc(0).unwrap();
        assert_eq!(spx.solve(), Status::Optimal);
        spx.open_arc(0).unwrap();

        spx.put_state(&state).unwrap();
        assert_eq!(spx.solve(), Status::Optimal);
        assert_eq!(spx.objective(), fo);
        let flows2: Vec<i64> = (0..spx.num_arcs()).map(|a| spx.flow(a)).collect();
        assert_eq!(flows, flows2);
    }

    #[test]
    fn warm_start_matches_cold_start() {
        let mut warm = two_routes();
        warm.set_par(Param::Reopt, ParValue::Int(1)).unwrap();
        assert_eq!(warm.solve(), Status::Optimal);
        warm.chg_cost(0, 9).unwrap();
        assert_eq!(warm.solve(), Status::Optimal);

        let mut cold = two_routes();
        cold.chg_cost(0, 9).unwrap();
        assert_eq!(cold.solve(), Status::Optimal);
        assert_eq!(warm.objective(), cold.objective());
    }

    #[test]
    fn dense_and_sparse_reads_agree() {
        let mut spx = two_routes();
        assert_eq!(spx.solve(), Status::Optimal);
        let m = spx.num_arcs() as usize;
        let mut dense = vec![0i64; m];
        spx.flows(&mut dense, None, 0, m as Index);
        let mut vals = vec![0i64; m];
        let mut nms = vec![0u32; m + 1];
        let k = spx.flows_sparse(&mut vals, &mut nms);
        assert!(k < spx.num_nodes() as usize);
        let mut from_sparse = vec![0i64; m];
        for i in 0..k {
            assert!(i == 0 || nms[i] > nms[i - 1]);
            assert_ne!(vals[i], 0);
            from_sparse[nms[i] as usize] = vals[i];
        }
        assert_eq!(nms[k], NONE);
        assert_eq!(dense, from_sparse);
    }

    #[test]
    fn stopped_solve_resumes() {
        let mut spx = two_routes();
        spx.set_par(Param::MaxIter, ParValue::Int(1)).unwrap();
        let mut st = spx.solve();
        let mut guard = 0;
        while st == Status::Stopped {
            st = spx.solve();
            guard += 1;
            assert!(guard < 100);
        }
        assert_eq!(st, Status::Optimal);
        assert_eq!(spx.objective(), 6);
    }

    #[test]
    fn del_node_closes_incident_arcs() {
        let mut spx = two_routes();
        spx.del_node(1).unwrap();
        assert!(spx.is_closed_arc(0));
        assert!(spx.is_closed_arc(1));
        assert_eq!(spx.deficit(1), 0);
        assert_eq!(spx.solve(), Status::Optimal);
        assert_eq!(spx.objective(), 24);
    }
}
