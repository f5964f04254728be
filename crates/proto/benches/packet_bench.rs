//! Packet Layer Performance Benchmarks
//!
//! Benchmarks for framing, header parsing, cipher/MAC throughput and
//! encrypted round-trips over an in-memory stream.
//!
//! Run with: `cargo bench --bench packet_bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::SeedableRng;
use wirelay_proto::ssh::crypto::{
    BlockCipher, CipherAlgorithm, CipherSlot, MacAlgorithm, MacKey, PacketMac,
};
use wirelay_proto::ssh::packet::{frame, parse_header, Direction};
use wirelay_proto::ssh::{Packetizer, PacketizerConfig};

const PAYLOAD_SIZES: [usize; 3] = [64, 1024, 32768];

/// Create a CTR slot with fixed test keys
fn create_test_slot(direction: Direction) -> CipherSlot {
    CipherSlot::from_algorithms(
        CipherAlgorithm::Aes128Ctr,
        direction,
        &[0x42; 16],
        &[0x24; 16],
        MacAlgorithm::HmacSha256,
        &[0x99; 32],
    )
    .unwrap()
}

fn bench_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame");
    let mut rng = StdRng::seed_from_u64(7);
    for size in PAYLOAD_SIZES {
        let payload = vec![0x5e; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("{}_bytes", size), |b| {
            b.iter(|| frame(black_box(&payload), 16, &mut rng).unwrap())
        });
    }
    group.finish();
}

fn bench_parse_header(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let wire = frame(&[0x5e; 1024], 16, &mut rng).unwrap();
    c.bench_function("parse_header", |b| {
        b.iter(|| parse_header(black_box(&wire[..16]), 16).unwrap())
    });
}

fn bench_cipher_and_mac(c: &mut Criterion) {
    let mut group = c.benchmark_group("engines");
    let data = vec![0u8; 32768];
    group.throughput(Throughput::Bytes(data.len() as u64));

    for algorithm in [CipherAlgorithm::Aes128Ctr, CipherAlgorithm::Aes256Cbc] {
        let key = vec![0x11; algorithm.key_size()];
        let iv = vec![0x22; algorithm.iv_size()];
        let mut engine = algorithm.encryptor(&key, &iv).unwrap();
        let mut buf = data.clone();
        group.bench_function(algorithm.name(), |b| {
            b.iter(|| engine.apply(black_box(&mut buf)).unwrap())
        });
    }

    for algorithm in [MacAlgorithm::HmacSha1, MacAlgorithm::HmacSha256, MacAlgorithm::HmacSha512] {
        let mut mac = MacKey::new(algorithm, &vec![0x33; algorithm.key_size()]).unwrap();
        group.bench_function(algorithm.name(), |b| {
            b.iter(|| mac.compute(black_box(42), black_box(&data)).unwrap())
        });
    }
    group.finish();
}

fn bench_round_trip(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let (left, right) = tokio::io::duplex(1 << 17);
    let sender = Packetizer::from_stream(left, PacketizerConfig::default()).unwrap();
    let receiver = Packetizer::from_stream(right, PacketizerConfig::default()).unwrap();
    rt.block_on(sender.install_outbound_cipher(create_test_slot(Direction::Outbound)));
    receiver.install_inbound_cipher(create_test_slot(Direction::Inbound));

    let mut group = c.benchmark_group("round_trip");
    for size in PAYLOAD_SIZES {
        let payload = vec![0x5e; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("aes128-ctr_{}_bytes", size), |b| {
            b.iter(|| {
                rt.block_on(async {
                    sender.write(black_box(&payload)).await.unwrap();
                    receiver.read().await.unwrap().unwrap()
                })
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_frame,
    bench_parse_header,
    bench_cipher_and_mac,
    bench_round_trip
);
criterion_main!(benches);
