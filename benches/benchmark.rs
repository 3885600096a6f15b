use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::json;

use insight::catalog::DatasetKind;
use insight::executor::ResultSet;
use insight::facade::InsightFacade;
use insight::store::Dataset;
use insight::value::{Record, Value};

const DEPTS: &[&str] = &["cpsc", "math", "biol", "phys", "chem", "engl", "hist", "econ"];

fn synthetic_courses(n: usize) -> Dataset {
    let records = (0..n)
        .map(|i| {
            [
                ("courses_dept", Value::from(DEPTS[i % DEPTS.len()])),
                ("courses_id", Value::from(format!("{}", 100 + i % 400))),
                ("courses_avg", Value::from(50.0 + (i % 5000) as f64 / 100.0)),
                ("courses_pass", Value::from((i % 300) as f64)),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect::<Record>()
        })
        .collect();
    Dataset::new("courses", DatasetKind::Courses, records).expect("synthetic dataset")
}

pub fn criterion_benchmark(c: &mut Criterion) {
    for (label, n) in [("1k", 1_000usize), ("100k", 100_000), ("1M", 1_000_000)] {
        let left = ResultSet::full(n);
        let right: ResultSet = (0..n).step_by(3).collect();
        c.bench_function(&format!("intersect {}", label), |b| {
            b.iter(|| {
                let mut set = left.clone();
                set.intersect_with(black_box(&right));
                set
            })
        });
    }

    let mut facade = InsightFacade::new();
    facade.keep(synthetic_courses(64_000)).expect("keep");
    let filtered = json!({
        "WHERE": { "AND": [
            { "GT": { "courses_avg": 95 } },
            { "NOT": { "IS": { "courses_dept": "c*" } } }
        ]},
        "OPTIONS": {
            "COLUMNS": ["courses_dept", "courses_id", "courses_avg"],
            "ORDER": { "dir": "DOWN", "keys": ["courses_avg", "courses_dept"] }
        }
    });
    c.bench_function("query filtered 64k", |b| {
        b.iter(|| facade.perform_query(black_box(&filtered)).expect("query"))
    });
    let grouped = json!({
        "WHERE": {},
        "TRANSFORMATIONS": {
            "GROUP": ["courses_dept", "courses_id"],
            "APPLY": [
                { "avgAvg": { "AVG": "courses_avg" } },
                { "sections": { "COUNT": "courses_pass" } }
            ]
        },
        "OPTIONS": {
            "COLUMNS": ["courses_dept", "courses_id", "avgAvg", "sections"],
            "ORDER": "avgAvg"
        }
    });
    c.bench_function("query grouped 64k", |b| {
        b.iter(|| facade.perform_query(black_box(&grouped)).expect("query"))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
