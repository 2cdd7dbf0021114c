// Rope constraint solver tests
// Convergence, inverse-mass symmetry, pinning and cutting

use std::sync::Arc;

use glam::Vec2;
use pool::{Executor, ThreadPool};
use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rope::{solve_distance_constraint, Edge, NodeId, Rope, RopeNode, RopeParams, StepInput};

fn weightless() -> RopeParams {
    RopeParams {
        gravity: Vec2::ZERO,
        ..Default::default()
    }
}

fn two_nodes(distance: f32, rest: f32, iterations: u32) -> Rope {
    let params = RopeParams {
        constraint_iterations: iterations,
        ..weightless()
    };
    Rope::from_parts(
        vec![RopeNode::new(Vec2::ZERO), RopeNode::new(Vec2::new(distance, 0.0))],
        vec![Edge::new(NodeId(0), NodeId(1), rest)],
        params,
    )
    .unwrap()
}

fn edge_length(rope: &Rope) -> f32 {
    rope.nodes()[0].position.distance(rope.nodes()[1].position)
}

#[test]
fn test_two_node_constraint_converges() {
    let mut errors = Vec::new();
    for n in [1u32, 5, 50] {
        let mut rope = two_nodes(2.0, 1.0, n);
        rope.simulate(None, &Executor::Sequential);
        let error = (edge_length(&rope) - 1.0).abs();
        // Each pass removes half the remaining stretch
        let expected = 0.5f32.powi(n as i32);
        assert!(
            (error - expected).abs() < 1e-5,
            "N={}: error {} expected {}",
            n,
            error,
            expected
        );
        errors.push(error);
    }
    assert!(errors[0] > errors[1] && errors[1] > errors[2], "not monotone: {:?}", errors);
    assert!(errors[2] < 1e-5);
}

#[test]
fn test_compressed_constraint_pushes_apart() {
    let mut rope = two_nodes(0.25, 1.0, 20);
    rope.simulate(None, &Executor::Sequential);
    assert!((edge_length(&rope) - 1.0).abs() < 1e-4);
}

#[test]
fn test_correction_symmetry() {
    let pa = Vec2::new(0.3, -0.2);
    let pb = Vec2::new(2.1, 1.4);
    let rest = 1.0;

    for (ma, mb) in [(1.0f32, 1.0f32), (1.0, 0.0), (0.0, 1.0), (2.0, 1.0)] {
        let (da, db) = solve_distance_constraint(pa, pb, ma, mb, rest, None);
        let wa = if ma == 0.0 { 0.0 } else { 1.0 / ma };
        let wb = if mb == 0.0 { 0.0 } else { 1.0 / mb };

        // Opposite directions, magnitudes in proportion to inverse mass
        assert!((da * wb + db * wa).length() < 1e-6, "ratio {}:{} asymmetric", ma, mb);
        // Together they remove half the stretch
        let full = (pa - pb) * (0.5 * ((pa - pb).length() - rest) / (pa - pb).length());
        assert!((db - da - full).length() < 1e-5, "ratio {}:{}", ma, mb);

        if ma == 0.0 {
            assert_eq!(da, Vec2::ZERO);
        }
        if mb == 0.0 {
            assert_eq!(db, Vec2::ZERO);
        }
    }

    let (da, db) = solve_distance_constraint(pa, pb, 1.0, 1.0, rest, None);
    assert!((da + db).length() < 1e-6, "equal masses must move equally");

    let (da, db) = solve_distance_constraint(pa, pb, 2.0, 1.0, rest, None);
    assert!((db.length() - 2.0 * da.length()).abs() < 1e-5, "heavier end moves half as far");
}

#[test]
fn test_cut_removes_exactly_one_edge() {
    let params = RopeParams {
        node_distance: 1.0,
        ..weightless()
    };
    let mut rope = Rope::rectangle(Vec2::ZERO, Vec2::new(3.0, 3.0), params).unwrap();
    let before: Vec<Edge> = rope.edges().to_vec();

    // Crosses only the horizontal link (0,0)-(1,0), i.e. nodes 0 and 3
    let removed = rope.cut(Vec2::new(0.5, -0.5), Vec2::new(0.5, 0.5));
    assert_eq!(removed, 1);

    let cut_edge = Edge::new(NodeId(0), NodeId(3), 1.0);
    let expected: Vec<Edge> = before.into_iter().filter(|e| *e != cut_edge).collect();
    assert_eq!(rope.edges(), expected.as_slice());
    assert!(!rope.neighbors(NodeId(0)).any(|n| n == NodeId(3)));
    assert!(!rope.neighbors(NodeId(3)).any(|n| n == NodeId(0)));
}

#[test]
fn test_cut_nodes_no_longer_pull_together() {
    let mut rope = two_nodes(1.0, 1.0, 4);
    assert_eq!(rope.cut(Vec2::new(0.5, -1.0), Vec2::new(0.5, 1.0)), 1);

    // Separate them; nothing should pull them back
    rope.grab(NodeId(1), Vec2::new(5.0, 0.0)).unwrap();
    rope.simulate(None, &Executor::Sequential);
    assert_eq!(rope.nodes()[0].position, Vec2::ZERO);
    assert_eq!(rope.nodes()[1].position, Vec2::new(5.0, 0.0));
}

#[test]
fn test_step_applies_cut_then_simulate_then_grab() {
    let mut rope = Rope::rectangle(Vec2::ZERO, Vec2::new(3.0, 3.0), RopeParams::default()).unwrap();
    let target = Vec2::new(-4.0, 2.0);
    let input = StepInput {
        attract: None,
        grab: Some((NodeId(0), target)),
        cut: Some((Vec2::new(2.25, -1.0), Vec2::new(2.25, 5.0))),
    };
    let removed = rope.step(&input, &Executor::Sequential).unwrap();
    assert!(removed > 0);
    // Grab runs last, so it wins over integration and relaxation
    assert_eq!(rope.nodes()[0].position, target);
    assert_eq!(rope.nodes()[0].previous_position, target);
}

#[test]
fn test_executors_agree() {
    let executors = [
        Executor::Sequential,
        Executor::pool(Arc::new(ThreadPool::with_workers(2).unwrap())),
        Executor::Rayon,
    ];
    let runs: Vec<Vec<Vec2>> = executors
        .iter()
        .map(|exec| {
            let mut rope = Rope::rectangle(Vec2::new(-4.0, -3.0), Vec2::new(4.0, 3.0), RopeParams::default()).unwrap();
            for frame in 0..120 {
                let attract = (frame % 40 < 10).then_some(Vec2::new(2.0, -6.0));
                rope.simulate(attract, exec);
            }
            rope.positions()
        })
        .collect();
    assert_eq!(runs[0], runs[1]);
    assert_eq!(runs[0], runs[2]);
}

#[test]
fn test_hanging_cloth_stays_near_rest_length() {
    let params = RopeParams {
        constraint_iterations: 20,
        ..Default::default()
    };
    let mut rope = Rope::rectangle(Vec2::new(-2.0, -2.0), Vec2::new(2.0, 2.0), params).unwrap();
    for _ in 0..300 {
        rope.simulate(None, &Executor::Sequential);
    }
    for edge in rope.edges() {
        let a = rope.nodes()[edge.a.0].position;
        let b = rope.nodes()[edge.b.0].position;
        let stretch = (a.distance(b) - edge.rest_length).abs() / edge.rest_length;
        assert!(stretch < 0.05, "edge {:?} stretched by {}", edge, stretch);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_pinned_nodes_never_move(seed in any::<u64>(), steps in 1usize..40) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let params = RopeParams {
            constraint_iterations: rng.gen_range(1..8),
            ..Default::default()
        };
        let mut rope = Rope::rectangle(Vec2::new(-3.0, -3.0), Vec2::new(3.0, 3.0), params).unwrap();
        let pinned: Vec<(usize, Vec2)> = rope
            .nodes()
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_pinned())
            .map(|(i, n)| (i, n.position))
            .collect();
        prop_assert_eq!(pinned.len(), rope.points_x());

        for _ in 0..steps {
            let attract = if rng.gen_bool(0.3) {
                Some(Vec2::new(rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0)))
            } else {
                None
            };
            rope.simulate(attract, &Executor::Sequential);
        }

        for (i, position) in pinned {
            prop_assert_eq!(rope.nodes()[i].position, position);
        }
    }

    #[test]
    fn prop_cut_only_removes_crossing_edges(
        x0 in -4.0f32..4.0, y0 in -4.0f32..4.0,
        x1 in -4.0f32..4.0, y1 in -4.0f32..4.0,
    ) {
        let mut rope = Rope::rectangle(Vec2::new(-3.0, -3.0), Vec2::new(3.0, 3.0), weightless()).unwrap();
        let before = rope.edge_count();
        let removed = rope.cut(Vec2::new(x0, y0), Vec2::new(x1, y1));
        prop_assert_eq!(rope.edge_count() + removed, before);
        // A second identical cut finds nothing left to remove
        prop_assert_eq!(rope.cut(Vec2::new(x0, y0), Vec2::new(x1, y1)), 0);
    }
}
