//! Criterion benchmarks for xbase-utils core operations.
//!
//! Benchmarks cover:
//! - Header parsing (DbfHeader::parse)
//! - Opening a table (header, descriptors, validation)
//! - Streaming record decode
//! - Marker counting without decoding

use byteorder::{ByteOrder, LittleEndian};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use dbf::dbf::cursor::{RecordKind, RecordQuery};
use dbf::dbf::header::DbfHeader;
use dbf::dbf::table::Table;

// ---------------------------------------------------------------------------
// Synthetic table builder (mirrors integration test helpers)
// ---------------------------------------------------------------------------

const FIELDS: &[(&str, u8, u8, u8)] = &[
    ("ID", b'I', 4, 0),
    ("NAME", b'C', 20, 0),
    ("BORN", b'D', 8, 0),
    ("PRICE", b'N', 10, 2),
    ("ACTIVE", b'L', 1, 0),
];

/// Build a table with `rows` records, every tenth one deleted.
fn build_table(rows: u32) -> Vec<u8> {
    let headerlen = 32 + FIELDS.len() * 32 + 1;
    let recordlen = 1 + FIELDS.iter().map(|f| f.2 as usize).sum::<usize>();

    let mut buf = vec![0u8; 32];
    buf[0] = 0x03;
    buf[1] = 124;
    buf[2] = 1;
    buf[3] = 1;
    LittleEndian::write_u32(&mut buf[4..8], rows);
    LittleEndian::write_u16(&mut buf[8..10], headerlen as u16);
    LittleEndian::write_u16(&mut buf[10..12], recordlen as u16);
    buf[29] = 0x03;
    for (name, field_type, length, decimals) in FIELDS {
        let mut d = vec![0u8; 32];
        d[..name.len()].copy_from_slice(name.as_bytes());
        d[11] = *field_type;
        d[16] = *length;
        d[17] = *decimals;
        buf.extend(d);
    }
    buf.push(b'\r');

    for i in 0..rows {
        buf.push(if i % 10 == 9 { b'*' } else { b' ' });
        buf.extend((i as i32).to_le_bytes());
        buf.extend(format!("{:<20}", format!("customer {}", i)).as_bytes());
        buf.extend(b"20240115");
        buf.extend(format!("{:>10}", format!("{}.{:02}", i, i % 100)).as_bytes());
        buf.push(if i % 2 == 0 { b'T' } else { b'F' });
    }
    buf.push(0x1A);
    buf
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_header_parse(c: &mut Criterion) {
    let table = build_table(1);
    let header = &table[..32];

    c.bench_function("header_parse", |b| {
        b.iter(|| DbfHeader::parse(black_box(header)))
    });
}

fn bench_table_open(c: &mut Criterion) {
    let table = build_table(1);

    c.bench_function("table_open", |b| {
        b.iter(|| Table::open(black_box(table.clone())).unwrap())
    });
}

fn bench_stream_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_decode");

    for rows in [100u32, 1_000, 10_000] {
        let data = build_table(rows);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &data, |b, data| {
            let mut table = Table::open(data.clone()).unwrap();
            b.iter(|| {
                let decoded = table
                    .iter_with(RecordKind::Active, RecordQuery::new(), |items| items.len())
                    .unwrap()
                    .count();
                black_box(decoded)
            })
        });
    }

    group.finish();
}

fn bench_projected_decode(c: &mut Criterion) {
    let data = build_table(10_000);
    let mut table = Table::open(data).unwrap();

    c.bench_function("projected_decode_10000", |b| {
        b.iter(|| {
            let query = RecordQuery::new().columns(["ID", "PRICE"]).convert_float(true);
            let decoded = table
                .iter_with(RecordKind::Active, query, |items| items.len())
                .unwrap()
                .count();
            black_box(decoded)
        })
    });
}

fn bench_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("count_markers");

    for rows in [1_000u32, 10_000] {
        let data = build_table(rows);
        group.throughput(Throughput::Elements(u64::from(rows)));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &data, |b, data| {
            let mut table = Table::open(data.clone()).unwrap();
            b.iter(|| black_box(table.count(RecordKind::Deleted).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_header_parse,
    bench_table_open,
    bench_stream_decode,
    bench_projected_decode,
    bench_count,
);
criterion_main!(benches);
