//! Interpreter loop benchmarks

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use laurel_runtime::vm::OutputHandle;
use laurel_runtime::Laurel;

/// A Laurel instance whose print output goes nowhere
fn quiet_laurel() -> Laurel {
    let sink: OutputHandle = Rc::new(RefCell::new(io::sink()));
    Laurel::with_output(sink)
}

fn bench_fib(c: &mut Criterion) {
    let source = r#"
        fun fib(n) {
            if (n < 2) return n;
            return fib(n - 2) + fib(n - 1);
        }
        fib(15);
    "#;
    c.bench_function("fib_15", |b| {
        b.iter(|| {
            let mut laurel = quiet_laurel();
            laurel.interpret(black_box(source)).unwrap();
        })
    });
}

fn bench_loop_arithmetic(c: &mut Criterion) {
    let source = r#"
        var total = 0;
        for (var i = 0; i < 10000; i = i + 1) {
            total = total + i * 2;
        }
    "#;
    c.bench_function("loop_arithmetic_10k", |b| {
        b.iter(|| {
            let mut laurel = quiet_laurel();
            laurel.interpret(black_box(source)).unwrap();
        })
    });
}

fn bench_method_dispatch(c: &mut Criterion) {
    let source = r#"
        class Counter {
            init() { this.n = 0; }
            bump() { this.n = this.n + 1; }
        }
        var counter = Counter();
        for (var i = 0; i < 1000; i = i + 1) {
            counter.bump();
        }
    "#;
    c.bench_function("method_dispatch_1k", |b| {
        b.iter(|| {
            let mut laurel = quiet_laurel();
            laurel.interpret(black_box(source)).unwrap();
        })
    });
}

criterion_group!(benches, bench_fib, bench_loop_arithmetic, bench_method_dispatch);
criterion_main!(benches);
