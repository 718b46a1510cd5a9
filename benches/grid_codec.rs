use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gsw_config::{from_storage_key, generate_configs, geweke_schema, to_arg_list, GridSpec};

fn extended_grid() -> GridSpec {
    GridSpec::default().with_extended(true)
}

fn bench_generate(c: &mut Criterion) {
    let schema = geweke_schema();
    let spec = extended_grid();
    c.bench_function("grid_generate_extended", |b| {
        b.iter(|| generate_configs(&schema, black_box(&spec)).expect("grid"));
    });
}

fn bench_codec(c: &mut Criterion) {
    let schema = geweke_schema();
    let configs = generate_configs(&schema, &extended_grid()).expect("grid");
    c.bench_function("arg_list_round_trip", |b| {
        b.iter(|| {
            for config in &configs {
                let args = to_arg_list(black_box(config));
                let _ = schema.parse(&args).expect("parse");
            }
        });
    });
    c.bench_function("storage_key_round_trip", |b| {
        b.iter(|| {
            for config in &configs {
                let key = config.storage_key();
                let _ = from_storage_key(&schema, black_box(&key)).expect("decode");
            }
        });
    });
}

criterion_group!(benches, bench_generate, bench_codec);
criterion_main!(benches);
