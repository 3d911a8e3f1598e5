use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tether_di::{
    add_configuration_text, to_configuration_string, ClassSchema, ConfigurationBuilder,
    NamedParameterSchema, TypeCatalog, ValueType,
};

// ============================================================================
// Text configuration parse/serialize throughput
// ============================================================================

fn catalog(width: usize) -> Arc<TypeCatalog> {
    let mut catalog = TypeCatalog::new();
    for i in 0..width {
        catalog = catalog
            .with(ClassSchema::new(format!("bench.Api{}", i)))
            .with(
                ClassSchema::new(format!("bench.Impl{}", i))
                    .implements(format!("bench.Api{}", i))
                    .inject(&[], |_| Ok(())),
            )
            .with(NamedParameterSchema::new(format!("bench.Param{}", i), ValueType::Integer));
    }
    Arc::new(catalog)
}

fn text(width: usize) -> String {
    let mut out = String::new();
    for i in 0..width {
        out.push_str(&format!("bench.Api{i}=bench.Impl{i}\nbench.Param{i}={i}\n"));
    }
    out
}

fn benchmark_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_text");
    for width in [10usize, 100] {
        let catalog = catalog(width);
        let input = text(width);
        group.bench_with_input(BenchmarkId::from_parameter(width), &input, |b, input| {
            b.iter(|| {
                let mut builder = ConfigurationBuilder::new(catalog.clone());
                add_configuration_text(&mut builder, input).unwrap();
                black_box(builder.build())
            });
        });
    }
    group.finish();
}

fn benchmark_serialize(c: &mut Criterion) {
    let mut builder = ConfigurationBuilder::new(catalog(100));
    add_configuration_text(&mut builder, &text(100)).unwrap();
    let conf = builder.build();

    c.bench_function("serialize_100", |b| {
        b.iter(|| black_box(to_configuration_string(&conf)));
    });
}

criterion_group!(benches, benchmark_parse, benchmark_serialize);
criterion_main!(benches);
