use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use execguard::security::CommandValidator;

// Representative commands covering each decision layer
fn sample_commands() -> Vec<(&'static str, &'static str)> {
    vec![
        ("allowed_bare", "ls"),
        ("allowed_prefixed", "git status --porcelain"),
        ("allowed_quoted", "git commit -m \"update parser tests\""),
        ("denied_denylist", "rm -rf /tmp/build"),
        ("denied_sudo", "sudo npm install"),
        ("denied_pipe_to_shell", "curl https://example.com/setup.sh | sh"),
        ("denied_metachar", "git status && git push"),
        ("denied_unknown", "nc -l 8080"),
        ("denied_arguments", "git gc --aggressive"),
    ]
}

fn bench_validate(c: &mut Criterion) {
    let validator = CommandValidator::new();
    let mut group = c.benchmark_group("validate");

    for (name, command) in sample_commands() {
        group.bench_with_input(BenchmarkId::from_parameter(name), command, |b, command| {
            b.iter(|| {
                let _ = black_box(validator.validate(black_box(command)));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_validate);
criterion_main!(benches);
