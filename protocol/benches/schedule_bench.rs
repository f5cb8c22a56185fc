// Schedule arithmetic and settlement benchmarks for the peerpool protocol.
//
// Covers repayment schedule construction across loan terms, fee splitting,
// and multi-leg settlement in the token bank.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use peerpool_protocol::config::SECONDS_PER_DAY;
use peerpool_protocol::math::{percent_bps, Schedule};
use peerpool_protocol::{Address, TokenBank, TokenLedger, TransferLeg};

fn bench_schedule_compute(c: &mut Criterion) {
    let mut group = c.benchmark_group("schedule/compute");
    for days in [30u64, 90, 365, 3_650] {
        group.bench_with_input(BenchmarkId::from_parameter(days), &days, |b, &days| {
            b.iter(|| {
                Schedule::compute(
                    black_box(1_000_000_000),
                    black_box(1_250),
                    days * SECONDS_PER_DAY,
                    30 * SECONDS_PER_DAY,
                )
            });
        });
    }
    group.finish();
}

fn bench_installments(c: &mut Criterion) {
    let schedule = Schedule::compute(1_000_000_007, 900, 3_650 * SECONDS_PER_DAY, SECONDS_PER_DAY)
        .expect("valid schedule");

    let mut group = c.benchmark_group("schedule/installments");
    group.throughput(Throughput::Elements(schedule.cycles));
    group.bench_function("daily_ten_years", |b| {
        b.iter(|| black_box(&schedule).installments());
    });
    group.finish();
}

fn bench_fee_split(c: &mut Criterion) {
    c.bench_function("fees/percent_bps", |b| {
        b.iter(|| {
            let principal = black_box(987_654_321u64);
            let protocol = percent_bps(principal, 200).unwrap_or(0);
            let marketplace = percent_bps(principal, 150).unwrap_or(0);
            principal - protocol - marketplace
        });
    });
}

fn bench_settlement(c: &mut Criterion) {
    let usd = Address::new("USD");
    let issuer = Address::new("mint");
    let lender = Address::new("lender");
    let ledger = Address::new("ledger");
    let legs = [
        TransferLeg::new(&lender, &ledger, 1_000),
        TransferLeg::new(&ledger, &Address::new("treasury"), 20),
        TransferLeg::new(&ledger, &Address::new("owner"), 10),
        TransferLeg::new(&ledger, &Address::new("borrower"), 970),
    ];

    let mut bank = TokenBank::new();
    bank.create_token(usd.clone(), "USD", issuer.clone())
        .expect("create token");
    bank.mint(&issuer, &usd, &lender, u64::MAX / 2).expect("mint");
    bank.approve(&usd, &lender, &ledger, u64::MAX).expect("approve");

    c.bench_function("token/settle_four_legs", |b| {
        b.iter(|| bank.settle(&usd, &ledger, black_box(&legs)));
    });
}

criterion_group!(
    benches,
    bench_schedule_compute,
    bench_installments,
    bench_fee_split,
    bench_settlement,
);
criterion_main!(benches);
