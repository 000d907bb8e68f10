//! Minimal delay estimation demo.
//!
//! Simulates a jittery 8 kHz packet stream and prints how the target delay
//! adapts to the observed arrival jitter.
//!
//! ```sh
//! cargo run -p fermata --example simple
//! ```

use std::sync::Arc;

use fermata::{DelayManager, DelayManagerConfig, TickTimer};

const SAMPLE_RATE_HZ: i32 = 8_000;
const PACKET_MS: u64 = 20;

fn main() {
    tracing_subscriber::fmt::init();

    let tick_timer = Arc::new(TickTimer::default());
    let mut delay_manager =
        DelayManager::new(DelayManagerConfig::default(), Arc::clone(&tick_timer));
    assert!(delay_manager.set_packet_audio_length(PACKET_MS as i32));

    let timestamp_step = (SAMPLE_RATE_HZ as u32 / 1000) * PACKET_MS as u32;
    let mut timestamp = 0u32;
    // Deterministic xorshift jitter: each packet arrives 0..30 ms late
    // relative to its ideal send schedule.
    let mut state = 0x2545_f491u32;

    for packet in 0u64..200 {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let jitter_ticks = u64::from(state % 4);

        // Advance the shared timer to this packet's arrival time.
        let arrival_tick = (packet + 1) * (PACKET_MS / 10) + jitter_ticks;
        tick_timer.increment_by(arrival_tick.saturating_sub(tick_timer.ticks()));

        timestamp = timestamp.wrapping_add(timestamp_step);
        let relative_delay = delay_manager.update(timestamp, SAMPLE_RATE_HZ, false);

        if packet % 20 == 0 {
            println!(
                "packet {packet:3}: relative delay {relative_delay:?}, target delay {} ms",
                delay_manager.target_delay_ms()
            );
        }
    }
}
