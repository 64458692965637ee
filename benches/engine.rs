use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tetris_env::core::board::Board;
use tetris_env::env::{features, moves, Environment};
use tetris_env::types::{Action, PieceKind};

fn bench_step(c: &mut Criterion) {
    let mut env = Environment::new(12345);
    c.bench_function("env_step_noop", |b| {
        b.iter(|| {
            let result = env.step(black_box(Action::Noop));
            if result.done {
                env.reset(12345);
            }
        })
    });
}

fn bench_hard_drop(c: &mut Criterion) {
    c.bench_function("env_step_hard_drop", |b| {
        let mut env = Environment::new(777);
        b.iter(|| {
            let result = env.step(black_box(Action::Hard));
            if result.done {
                env.reset(777);
            }
        })
    });
}

fn bench_clear_lines(c: &mut Criterion) {
    c.bench_function("board_clear_4_lines", |b| {
        b.iter(|| {
            let mut board = Board::new();
            for y in 16..20 {
                for x in 0..10 {
                    board.set(x, y, Some(PieceKind::I));
                }
            }
            black_box(board.clear_lines())
        })
    });
}

fn bench_features(c: &mut Criterion) {
    let mut board = Board::new();
    for x in 0..10i8 {
        for i in 0..(x % 5 + 1) {
            board.set(x, 19 - i, Some(PieceKind::J));
        }
    }
    c.bench_function("features_extract", |b| {
        b.iter(|| black_box(features::extract(&board)))
    });
}

fn bench_legal_moves(c: &mut Criterion) {
    let board = Board::new();
    c.bench_function("legal_moves_with_hold", |b| {
        b.iter(|| {
            black_box(moves::enumerate(
                &board,
                PieceKind::T,
                Some(PieceKind::I),
                false,
                PieceKind::S,
            ))
        })
    });
}

criterion_group!(
    benches,
    bench_step,
    bench_hard_drop,
    bench_clear_lines,
    bench_features,
    bench_legal_moves
);
criterion_main!(benches);
