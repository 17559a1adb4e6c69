use chrono::{TimeZone, Utc};
use clearing_engine::{clear, BookOrder, Side};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rust_decimal::Decimal;
use uuid::Uuid;

// Builds a book with bids and asks straddling a base price so every round
// has a non-trivial crossing region.
fn synthetic_book(order_count: usize) -> Vec<BookOrder> {
    let base_price = 1000i64;
    let mut orders = Vec::with_capacity(order_count);

    for i in 0..order_count {
        let side = if i % 2 == 0 { Side::Bid } else { Side::Ask };
        let offset = (i % 40) as i64 - 20;
        let price = match side {
            Side::Bid => Decimal::from(base_price + offset),
            Side::Ask => Decimal::from(base_price - offset),
        };
        let quantity = Decimal::from(((i % 7) + 1) as i64);
        orders.push(BookOrder {
            id: Uuid::new_v4(),
            trader_id: Uuid::new_v4(),
            side,
            price,
            quantity,
            iteration: None,
            created_at: Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap(),
        });
    }

    orders
}

fn bench_clearing_rounds(c: &mut Criterion) {
    let mut group = c.benchmark_group("clearing_round");
    let k = Decimal::new(5, 1);

    for order_count in [100, 1000, 10000].iter() {
        let orders = synthetic_book(*order_count);
        group.throughput(Throughput::Elements(*order_count as u64));

        group.bench_with_input(
            format!("{}_orders", order_count),
            &orders,
            |b, orders| {
                b.iter(|| clear(black_box(orders), black_box(k)));
            },
        );
    }

    group.finish();
}

fn bench_thin_book(c: &mut Criterion) {
    let mut group = c.benchmark_group("thin_book");
    let orders = synthetic_book(16);
    let k = Decimal::new(5, 1);

    group.bench_function("clear_16_orders", |b| {
        b.iter(|| clear(black_box(&orders), black_box(k)));
    });

    group.finish();
}

criterion_group!(benches, bench_clearing_rounds, bench_thin_book);
criterion_main!(benches);
