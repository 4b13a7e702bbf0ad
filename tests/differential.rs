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

//! Differential tests: the network simplex and the relaxation solver
//! must agree on randomly generated instances.

use proptest::prelude::*;

use rs_mcf::mcf::simplex::Pricing;
use rs_mcf::mcf::{Mcf, NetSimplex, RelaxIv, SptTree, Status};
use rs_mcf::IntKinds;

#[derive(Debug, Clone)]
struct Instance {
    n: u32,
    arcs: Vec<(u32, u32)>,
    caps: Vec<i64>,
    costs: Vec<i64>,
    defs: Vec<i64>,
}

/// Random connected-ish instances with nonnegative costs, finite
/// capacities and balanced deficits.
fn instances() -> impl Strategy<Value = Instance> {
    (2u32..7).prop_flat_map(|n| {
        (1usize..12).prop_flat_map(move |m| {
            (
                proptest::collection::vec((0..n, 1..n), m),
                proptest::collection::vec(0i64..12, m),
                proptest::collection::vec(0i64..9, m),
                proptest::collection::vec(-4i64..5, (n - 1) as usize),
            )
                .prop_map(move |(ends, caps, costs, mut defs)| {
                    // the offset keeps the endpoints distinct
                    let arcs = ends.into_iter().map(|(t, off)| (t, (t + off) % n)).collect();
                    let sum: i64 = defs.iter().sum();
                    defs.push(-sum);
                    Instance {
                        n,
                        arcs,
                        caps,
                        costs,
                        defs,
                    }
                })
        })
    })
}

fn load(mcf: &mut dyn Mcf<Kinds = IntKinds>, inst: &Instance) {
    let starts: Vec<u32> = inst.arcs.iter().map(|a| a.0).collect();
    let ends: Vec<u32> = inst.arcs.iter().map(|a| a.1).collect();
    mcf.load_net(
        inst.n,
        inst.arcs.len() as u32,
        inst.n,
        inst.arcs.len() as u32,
        &inst.caps,
        &inst.costs,
        &inst.defs,
        &starts,
        &ends,
    )
    .unwrap();
}

proptest! {
    /// Both solvers report the same status, and the same objective on
    /// solvable instances.
    #[test]
    fn simplex_and_relaxation_agree(inst in instances()) {
        let mut spx = NetSimplex::<IntKinds>::new(inst.n, inst.arcs.len() as u32);
        load(&mut spx, &inst);
        let st_spx = spx.solve();

        let mut rlx = RelaxIv::<IntKinds>::new(inst.n, inst.arcs.len() as u32);
        load(&mut rlx, &inst);
        let st_rlx = rlx.solve();

        prop_assert_eq!(st_spx, st_rlx);
        if st_spx == Status::Optimal {
            prop_assert_eq!(spx.objective(), rlx.objective());
        }
    }

    /// The dual simplex agrees with the primal one.
    #[test]
    fn primal_and_dual_simplex_agree(inst in instances()) {
        let mut primal = NetSimplex::<IntKinds>::new(inst.n, inst.arcs.len() as u32);
        load(&mut primal, &inst);
        let st_primal = primal.solve();

        let mut dual = NetSimplex::<IntKinds>::new(inst.n, inst.arcs.len() as u32);
        dual.set_alg(false, Pricing::CandidateList);
        load(&mut dual, &inst);
        let st_dual = dual.solve();

        prop_assert_eq!(st_primal, st_dual);
        if st_primal == Status::Optimal {
            prop_assert_eq!(primal.objective(), dual.objective());
        }
    }

    /// Editing one cost and re-solving warm gives the same objective
    /// as a cold solver on the edited instance.
    #[test]
    fn warm_start_matches_cold_start(inst in instances(), arc_sel in 0usize..12, new_cost in 0i64..9) {
        let arc = (arc_sel % inst.arcs.len()) as u32;

        let mut warm = RelaxIv::<IntKinds>::new(inst.n, inst.arcs.len() as u32);
        load(&mut warm, &inst);
        warm.solve();
        warm.chg_cost(arc, new_cost).unwrap();
        let st_warm = warm.solve();

        let mut cold = RelaxIv::<IntKinds>::new(inst.n, inst.arcs.len() as u32);
        load(&mut cold, &inst);
        cold.chg_cost(arc, new_cost).unwrap();
        let st_cold = cold.solve();

        prop_assert_eq!(st_warm, st_cold);
        if st_cold == Status::Optimal {
            prop_assert_eq!(warm.objective(), cold.objective());
        }
    }

    /// On uncapacitated single-source instances the shortest-path-tree
    /// solver matches the simplex.
    #[test]
    fn spt_matches_simplex(
        n in 2u32..7,
        raw_arcs in proptest::collection::vec((0u32..7, 1u32..7, 0i64..9), 1..14),
        raw_defs in proptest::collection::vec(0i64..3, 6),
    ) {
        let arcs: Vec<(u32, u32)> = raw_arcs
            .iter()
            .map(|&(t, off, _)| (t % n, (t % n + 1 + off % (n - 1)) % n))
            .collect();
        let costs: Vec<i64> = raw_arcs.iter().map(|&(_, _, c)| c).collect();
        let m = arcs.len() as u32;
        let mut defs: Vec<i64> = (0..n as usize).map(|v| if v == 0 { 0 } else { raw_defs[v - 1] }).collect();
        defs[0] = -defs.iter().sum::<i64>();
        // effectively unbounded capacities
        let caps = vec![1000i64; m as usize];
        let starts: Vec<u32> = arcs.iter().map(|a| a.0).collect();
        let ends: Vec<u32> = arcs.iter().map(|a| a.1).collect();

        let mut spt = SptTree::<IntKinds>::new(n, m);
        spt.load_net(n, m, n, m, &caps, &costs, &defs, &starts, &ends).unwrap();
        let st_spt = spt.solve();

        let mut spx = NetSimplex::<IntKinds>::new(n, m);
        spx.load_net(n, m, n, m, &caps, &costs, &defs, &starts, &ends).unwrap();
        let st_spx = spx.solve();

        prop_assert_eq!(st_spt, st_spx);
        if st_spt == Status::Optimal {
            prop_assert_eq!(spt.objective(), spx.objective());
        }
    }
}
