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

//! Contract-level tests run against every applicable solver.

use rs_mcf::mcf::{Mcf, McfError, NetSimplex, RelaxIv, Status};
use rs_mcf::num::{infinite, Index};
use rs_mcf::IntKinds;

/// Flow conservation, objective consistency and complementary
/// slackness of a solved instance.
fn check_optimal_dyn(mcf: &dyn Mcf<Kinds = IntKinds>) {
    for v in 0..mcf.num_nodes() {
        let mut net = 0i64;
        for a in 0..mcf.num_arcs() {
            if mcf.is_deleted_arc(a) {
                continue;
            }
            if mcf.start_node(a) == v {
                net += mcf.flow(a);
            }
            if mcf.end_node(a) == v {
                net -= mcf.flow(a);
            }
        }
        assert_eq!(net, -mcf.deficit(v), "conservation at node {}", v);
    }
    let mut fo = 0i64;
    for a in 0..mcf.num_arcs() {
        if mcf.is_deleted_arc(a) || mcf.is_closed_arc(a) {
            continue;
        }
        let x = mcf.flow(a);
        fo += mcf.cost(a) * x + mcf.qcoef(a) * x * x / 2;
        let rc = mcf.reduced_cost(a);
        if rc > 0 {
            assert_eq!(x, 0, "positive reduced cost on flowing arc {}", a);
        }
        if rc < 0 {
            assert_eq!(x, mcf.ucap(a), "negative reduced cost on unsaturated arc {}", a);
        }
    }
    assert_eq!(fo, mcf.objective());
}

/// Run the same scenario against both complete solvers.
fn for_both(scenario: impl Fn(&mut dyn Mcf<Kinds = IntKinds>)) {
    let mut spx = NetSimplex::<IntKinds>::new(16, 32);
    scenario(&mut spx);
    let mut rlx = RelaxIv::<IntKinds>::new(16, 32);
    scenario(&mut rlx);
}

#[test]
fn minimal_transport() {
    for_both(|mcf| {
        mcf.load_net(2, 1, 2, 1, &[1], &[3], &[-1, 1], &[0], &[1]).unwrap();
        assert_eq!(mcf.solve(), Status::Optimal);
        assert_eq!(mcf.flow(0), 1);
        assert_eq!(mcf.objective(), 3);
        assert_eq!(mcf.potential(1) - mcf.potential(0), 3);
        assert_eq!(mcf.reduced_cost(0), 0);
        check_optimal_dyn(mcf);
    });
}

#[test]
fn capacity_binding_is_infeasible() {
    for_both(|mcf| {
        mcf.load_net(3, 2, 3, 2, &[1, 2], &[1, 1], &[-2, 0, 2], &[0, 1], &[1, 2])
            .unwrap();
        assert_eq!(mcf.solve(), Status::Infeasible);
        assert_eq!(mcf.objective(), infinite::<i64>());
    });
}

#[test]
fn empty_instance_is_usable() {
    for_both(|mcf| {
        mcf.load_net(4, 8, 4, 0, &[], &[], &[0, 0, 0, 0], &[], &[]).unwrap();
        assert_eq!(mcf.solve(), Status::Optimal);
        assert_eq!(mcf.objective(), 0);
    });
}

#[test]
fn quadratic_single_arc() {
    // quadratic costs are a primal simplex feature
    let mut spx = NetSimplex::<IntKinds>::new(2, 1);
    spx.load_net(2, 1, 2, 1, &[10], &[0], &[-5, 5], &[0], &[1]).unwrap();
    spx.chg_qcoef(0, 2).unwrap();
    assert_eq!(spx.solve(), Status::Optimal);
    assert_eq!(spx.flow(0), 5);
    assert_eq!(spx.objective(), 25);
    assert_eq!(spx.potential(1) - spx.potential(0), 10);
    check_optimal_dyn(&spx);
}

fn load_two_routes(mcf: &mut dyn Mcf<Kinds = IntKinds>) {
    mcf.load_net(
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
}

#[test]
fn close_then_reopen_recovers_the_objective() {
    for_both(|mcf| {
        load_two_routes(mcf);
        assert_eq!(mcf.solve(), Status::Optimal);
        let first = mcf.objective();
        assert_eq!(first, 6);

        // closing the used route forces the second-best solution
        mcf.close_arc(0).unwrap();
        assert_eq!(mcf.solve(), Status::Optimal);
        assert_eq!(mcf.objective(), 24);
        check_optimal_dyn(mcf);

        mcf.open_arc(0).unwrap();
        assert_eq!(mcf.solve(), Status::Optimal);
        assert_eq!(mcf.objective(), first);
        check_optimal_dyn(mcf);
    });
}

#[test]
fn delete_and_reuse_names() {
    for_both(|mcf| {
        mcf.load_net(
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
        mcf.del_arc(2).unwrap();
        assert!(mcf.is_deleted_arc(2));
        assert_eq!(mcf.start_node(2), Index::MAX);
        assert_eq!(mcf.open_arc(2), Err(McfError::IllegalTopologyOp));

        // the freed name is reused before any fresh one
        let name = mcf.add_arc(0, 2, 5, 4).unwrap();
        assert_eq!(name, 2);
        assert_eq!(mcf.solve(), Status::Optimal);
        assert_eq!(mcf.objective(), 6);
        check_optimal_dyn(mcf);
    });
}

#[test]
fn dense_and_sparse_flow_reads_agree() {
    for_both(|mcf| {
        load_two_routes(mcf);
        assert_eq!(mcf.solve(), Status::Optimal);
        let m = mcf.num_arcs() as usize;
        let mut dense = vec![0i64; m];
        mcf.flows(&mut dense, None, 0, m as Index);

        let mut vals = vec![0i64; m];
        let mut nms = vec![0 as Index; m + 1];
        let k = mcf.flows_sparse(&mut vals, &mut nms);
        assert!(k < mcf.num_nodes() as usize);
        assert_eq!(nms[k], Index::MAX);

        let mut from_sparse = vec![0i64; m];
        for i in 0..k {
            assert!(i == 0 || nms[i] > nms[i - 1]);
            assert_ne!(vals[i], 0);
            from_sparse[nms[i] as usize] = vals[i];
        }
        assert_eq!(dense, from_sparse);
    });
}

#[test]
fn subset_reads_use_the_name_list() {
    for_both(|mcf| {
        load_two_routes(mcf);
        assert_eq!(mcf.solve(), Status::Optimal);
        let nms = [1 as Index, 3, Index::MAX];
        let mut costs = [0i64; 2];
        mcf.costs(&mut costs, Some(&nms), 0, 4);
        assert_eq!(costs, [1, 4]);
        let mut caps = [0i64; 2];
        mcf.ucaps(&mut caps, Some(&nms), 0, 4);
        assert_eq!(caps, [5, 5]);
    });
}

#[test]
fn state_capture_and_restore() {
    for_both(|mcf| {
        load_two_routes(mcf);
        assert_eq!(mcf.solve(), Status::Optimal);
        let fo = mcf.objective();
        let flows: Vec<i64> = (0..mcf.num_arcs()).map(|a| mcf.flow(a)).collect();
        let state = mcf.state();

        mcf.chg_cost(0, 7).unwrap();
        assert_eq!(mcf.solve(), Status::Optimal);

        mcf.chg_cost(0, 1).unwrap();
        mcf.put_state(&state).unwrap();
        assert_eq!(mcf.solve(), Status::Optimal);
        assert_eq!(mcf.objective(), fo);
        let restored: Vec<i64> = (0..mcf.num_arcs()).map(|a| mcf.flow(a)).collect();
        assert_eq!(flows, restored);
    });
}

#[test]
fn warm_start_equals_cold_start() {
    let mut warm = NetSimplex::<IntKinds>::new(4, 4);
    load_two_routes(&mut warm);
    warm.set_par(rs_mcf::Param::Reopt, rs_mcf::ParValue::Int(1)).unwrap();
    assert_eq!(warm.solve(), Status::Optimal);
    warm.chg_cost(1, 8).unwrap();
    assert_eq!(warm.solve(), Status::Optimal);

    let mut cold = NetSimplex::<IntKinds>::new(4, 4);
    load_two_routes(&mut cold);
    cold.chg_cost(1, 8).unwrap();
    assert_eq!(cold.solve(), Status::Optimal);

    assert_eq!(warm.objective(), cold.objective());

    // the relaxation solver warm starts by default
    let mut warm = RelaxIv::<IntKinds>::new(4, 4);
    load_two_routes(&mut warm);
    assert_eq!(warm.solve(), Status::Optimal);
    warm.chg_cost(1, 8).unwrap();
    assert_eq!(warm.solve(), Status::Optimal);
    assert_eq!(warm.objective(), cold.objective());
}

#[test]
fn invalid_names_are_rejected() {
    for_both(|mcf| {
        load_two_routes(mcf);
        assert_eq!(mcf.chg_cost(99, 1), Err(McfError::InvalidName(99)));
        assert_eq!(mcf.chg_ucap(99, 1), Err(McfError::InvalidName(99)));
        assert_eq!(mcf.chg_dfct(99, 1), Err(McfError::InvalidName(99)));
        assert_eq!(mcf.del_arc(99), Err(McfError::InvalidName(99)));
        assert_eq!(mcf.add_arc(0, 99, 1, 1), Err(McfError::InvalidName(99)));
    });
}

#[test]
fn capacity_hints_are_enforced() {
    let mut spx = NetSimplex::<IntKinds>::new(2, 1);
    spx.load_net(2, 1, 2, 1, &[1], &[1], &[-1, 1], &[0], &[1]).unwrap();
    assert_eq!(spx.add_arc(0, 1, 1, 1), Err(McfError::CapacityExceeded));
    assert_eq!(spx.add_node(0), Err(McfError::CapacityExceeded));
    assert_eq!(
        spx.load_net(2, 1, 3, 1, &[1], &[1], &[-1, 1, 0], &[0], &[1]),
        Err(McfError::CapacityExceeded)
    );
}

#[test]
fn closed_arcs_on_load() {
    for_both(|mcf| {
        // the middle arc is closed (infinite cost, finite capacity),
        // the last is deleted (infinite cost and capacity)
        mcf.load_net(
            3,
            4,
            3,
            4,
            &[5, 5, 5, infinite::<i64>()],
            &[1, infinite::<i64>(), 9, infinite::<i64>()],
            &[-1, 0, 1],
            &[0, 0, 0, 1],
            &[1, 2, 2, 2],
        )
        .unwrap();
        assert!(mcf.is_closed_arc(1));
        assert!(!mcf.is_deleted_arc(1));
        assert!(mcf.is_deleted_arc(3));
        assert_eq!(mcf.reduced_cost(1), infinite::<i64>());
        assert_eq!(mcf.solve(), Status::Optimal);
        assert_eq!(mcf.flow(1), 0);
    });
}

#[cfg(feature = "serialize")]
mod serialize {
    use super::*;

    #[test]
    fn state_survives_a_serde_round_trip() {
        let mut spx = NetSimplex::<IntKinds>::new(4, 4);
        load_two_routes(&mut spx);
        assert_eq!(spx.solve(), Status::Optimal);
        let fo = spx.objective();
        let state = spx.state();

        let json = serde_json::to_string(&state).unwrap();
        let state: rs_mcf::McfState<IntKinds> = serde_json::from_str(&json).unwrap();

        spx.chg_cost(0, 7).unwrap();
        spx.chg_cost(0, 1).unwrap();
        spx.put_state(&state).unwrap();
        assert_eq!(spx.solve(), Status::Optimal);
        assert_eq!(spx.objective(), fo);
    }
}
