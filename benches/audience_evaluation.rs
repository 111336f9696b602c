use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serde_json::json;

use optimizely_core::{
    audience::{Audience, AudienceEvaluator, ConditionTree},
    UserContext,
};

fn criterion_benchmark(c: &mut Criterion) {
    let audiences: Vec<Audience> = serde_json::from_value(json!([
        {
            "id": "mobile-adults",
            "name": "mobile adults",
            "conditions": ["and",
                {"name": "age", "type": "custom_attribute", "match": "ge", "value": 18},
                ["or",
                    {"name": "platform", "type": "custom_attribute", "value": "ios"},
                    {"name": "platform", "type": "custom_attribute", "value": "android"}
                ]
            ]
        },
        {
            "id": "new-app",
            "name": "new app version",
            "conditions": ["and",
                {"name": "app_version", "type": "custom_attribute", "match": "semver_ge", "value": "3.2.0-beta"}
            ]
        },
        {
            "id": "vip",
            "name": "vip segment",
            "conditions": ["or",
                {"name": "odp.audiences", "type": "third_party_dimension", "match": "qualified", "value": "vip"}
            ]
        }
    ]))
    .unwrap();
    let audiences: HashMap<_, _> = audiences
        .into_iter()
        .map(|audience| (audience.id.clone(), audience))
        .collect();

    let audience_conditions: ConditionTree<String> =
        serde_json::from_value(json!(["or", ["and", "mobile-adults", "new-app"], "vip"])).unwrap();

    let evaluator = AudienceEvaluator::new();

    {
        let mut group = c.benchmark_group("matching-user");
        group.throughput(Throughput::Elements(1));
        let user = UserContext::new("user-1")
            .with_attribute("age", 30.0)
            .with_attribute("platform", "android")
            .with_attribute("app_version", "3.2.1");
        group.bench_function("evaluate", |b| {
            b.iter(|| {
                evaluator.evaluate(
                    black_box(Some(&audience_conditions)),
                    black_box(&audiences),
                    black_box(&user),
                )
            })
        });
        group.finish();
    }

    {
        let mut group = c.benchmark_group("unknown-attributes");
        group.throughput(Throughput::Elements(1));
        let user = UserContext::new("user-2").with_qualified_segments(["other"]);
        group.bench_function("evaluate", |b| {
            b.iter(|| {
                evaluator.evaluate(
                    black_box(Some(&audience_conditions)),
                    black_box(&audiences),
                    black_box(&user),
                )
            })
        });
        group.finish();
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
