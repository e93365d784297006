//! Micro-benchmark of a scan -> filter -> project -> aggregate pipeline.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use corvus_ast::{
    Clause, ComparisonOp, Expression as E, MatchClause, NodePattern, Pattern, Query, ReturnClause,
    ReturnItem,
};
use corvus_core::PropertyValue;
use corvus_executor::eval::Parameters;
use corvus_executor::Runner;
use corvus_graph::InMemoryGraph;

fn build_graph(nodes: u64) -> InMemoryGraph {
    let mut builder = InMemoryGraph::builder();
    for i in 0..nodes {
        builder = builder.add_labeled_node(
            i,
            "Person",
            [
                ("name", PropertyValue::from(format!("p{}", i))),
                ("age", PropertyValue::from((i % 90) as i64)),
            ],
        );
    }
    builder.build()
}

fn grouped_count(c: &mut Criterion) {
    let mut runner = Runner::new(build_graph(1_000));
    let query = Query::new(vec![
        Clause::Match(MatchClause {
            patterns: vec![Pattern::single(NodePattern::labeled("n", "Person"))],
            where_clause: Some(E::compare(
                ComparisonOp::Gt,
                E::property(E::var("n"), "age"),
                E::int(30),
            )),
        }),
        Clause::Return(ReturnClause::items(vec![
            ReturnItem::property("n", "age"),
            ReturnItem {
                expression: E::CountStar,
                alias: None,
            },
        ])),
    ]);

    c.bench_function("scan_filter_aggregate_1k", |b| {
        b.iter(|| {
            let result = runner
                .run_query(black_box(query.clone()), Parameters::new())
                .unwrap();
            black_box(result.row_count())
        })
    });
}

criterion_group!(benches, grouped_count);
criterion_main!(benches);
