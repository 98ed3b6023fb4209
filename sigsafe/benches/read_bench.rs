//! Guarded read overhead against a plain read

use criterion::{criterion_group, criterion_main, Criterion};
use core::hint::black_box;

fn pipe() -> [i32; 2] {
    let mut fds = [0; 2];
    assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
    fds
}

fn bench_read(c: &mut Criterion) {
    sigsafe::install_handler(libc::SIGUSR1, None).unwrap();
    sigsafe::install_tsd(0, None).unwrap();
    let [r, w] = pipe();
    let mut buf = [0u8; 1];

    c.bench_function("libc_read", |b| {
        b.iter(|| unsafe {
            libc::write(w, b"x".as_ptr().cast(), 1);
            black_box(libc::read(r, buf.as_mut_ptr().cast(), 1))
        })
    });

    c.bench_function("sigsafe_read", |b| {
        b.iter(|| {
            unsafe { libc::write(w, b"x".as_ptr().cast(), 1) };
            black_box(sigsafe::read(r, &mut buf))
        })
    });

    unsafe {
        libc::close(r);
        libc::close(w);
    }
}

fn bench_clear_received(c: &mut Criterion) {
    c.bench_function("clear_received", |b| {
        b.iter(|| black_box(sigsafe::clear_received()))
    });
}

criterion_group!(read_benchmarks, bench_read, bench_clear_received);

criterion_main!(read_benchmarks);
