use criterion::{Criterion, criterion_group, criterion_main};
use testenv::EnvLoader;

fn bench_load(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    for name in ["a.env", "b.env", "c.env"] {
        std::fs::write(dir.path().join(name), make_env_content(2_000))
            .expect("failed to write test file");
    }

    let single = EnvLoader::new().current_dir(dir.path()).pattern("a.env");
    c.bench_function("load_single_file", |b| {
        b.iter(|| single.load().expect("load should succeed"));
    });

    let glob = EnvLoader::new().current_dir(dir.path()).pattern("*.env");
    c.bench_function("load_glob", |b| {
        b.iter(|| glob.load().expect("load should succeed"));
    });
}

fn make_env_content(entries: usize) -> String {
    let mut content = String::with_capacity(entries * 16);
    for idx in 0..entries {
        content.push_str("KEY_");
        content.push_str(&idx.to_string());
        content.push('=');
        content.push_str("value");
        content.push('\n');
    }
    content
}

criterion_group!(benches, bench_load);
criterion_main!(benches);
