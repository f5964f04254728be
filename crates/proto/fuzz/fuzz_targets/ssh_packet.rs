//! Fuzz target for SSH packet parsing.
//!
//! This fuzzer feeds random bytes to the header parser and to a plaintext
//! packetizer to find:
//! - Panics
//! - Oversized allocations from hostile length fields
//! - Incorrect error handling
//!
//! Run with:
//! ```bash
//! cd crates/proto
//! cargo +nightly fuzz run ssh_packet -- -max_total_time=300
//! ```

#![no_main]
use libfuzzer_sys::fuzz_target;
use wirelay_proto::ssh::packet::{parse_header, MAX_PACKET_LENGTH};
use wirelay_proto::ssh::{Packetizer, PacketizerConfig};

fuzz_target!(|data: &[u8]| {
    for block_size in [8usize, 16] {
        if let Ok(header) = parse_header(data, block_size) {
            assert!(header.packet_length() <= MAX_PACKET_LENGTH);
            assert_eq!(header.frame_length() % block_size, 0);
            assert!(header.payload_length() < header.packet_length());
        }
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    rt.block_on(async {
        let reader = Packetizer::new(
            std::io::Cursor::new(data.to_vec()),
            tokio::io::sink(),
            PacketizerConfig::default(),
        )
        .expect("default config");
        // Stop at the first error or end of input.
        while let Ok(Some(packet)) = reader.read().await {
            assert!(packet.payload().len() < MAX_PACKET_LENGTH);
        }
    });
});
