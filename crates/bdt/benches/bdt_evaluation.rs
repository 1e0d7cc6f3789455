use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use larreco_bdt::{Aggregation, BdtModel, DecisionNode, DecisionTree};

const TREE_COUNT: usize = 400;
const TRACK_COUNT: usize = 256;

/// Depth-3 trees alternating between the two variables.
fn boosted_model() -> BdtModel {
    let trees = (0..TREE_COUNT)
        .map(|i| {
            let shift = (i % 17) as f32;
            DecisionTree {
                nodes: vec![
                    DecisionNode::split(i % 2, 0.002 + 0.0001 * shift, 1, 4),
                    DecisionNode::split((i + 1) % 2, 20.0 + shift, 2, 3),
                    DecisionNode::leaf(-1.0),
                    DecisionNode::leaf(-0.2),
                    DecisionNode::split((i + 1) % 2, 80.0 + shift, 5, 6),
                    DecisionNode::leaf(0.4),
                    DecisionNode::leaf(1.0),
                ],
                weight: 1.0 / (1.0 + i as f32 * 0.01),
            }
        })
        .collect();

    BdtModel {
        variables: vec!["range".into(), "energy_density".into()],
        trees,
        aggregation: Aggregation::WeightedMean,
    }
}

fn tracks() -> Vec<[f32; 2]> {
    (0..TRACK_COUNT)
        .map(|i| {
            let range = 2.0 + i as f32 * 1.5;
            let density = 0.0015 + (i % 32) as f32 * 0.0002;
            [range, density]
        })
        .collect()
}

fn bench_bdt_evaluation(c: &mut Criterion) {
    let model = boosted_model();
    let tracks = tracks();

    let mut group = c.benchmark_group("bdt_evaluation");
    group.throughput(Throughput::Elements(TRACK_COUNT as u64));
    group.bench_function("evaluate_tracks", |b| {
        b.iter(|| {
            let mut acc = 0.0f32;
            for features in &tracks {
                acc += model.evaluate(black_box(features)).unwrap_or(0.0);
            }
            black_box(acc)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_bdt_evaluation);
criterion_main!(benches);
