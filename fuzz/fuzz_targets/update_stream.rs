#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use fermata::{DelayManager, DelayManagerConfig, TickTimer};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    Update {
        timestamp_step: u16,
        ticks: u8,
        reset: bool,
    },
    SetMinimumDelay(i16),
    SetMaximumDelay(i16),
    SetBaseMinimumDelay(i16),
    SetPacketAudioLength(i16),
    Reset,
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    sample_rate_hz: i32,
    ops: Vec<Op>,
}

fuzz_target!(|input: FuzzInput| {
    let tick_timer = Arc::new(TickTimer::default());
    let mut delay_manager =
        DelayManager::new(DelayManagerConfig::default(), Arc::clone(&tick_timer));

    let mut timestamp = 0u32;
    let mut maximum_delay_ms = 0i32;
    let mut packet_len_ms = 0i32;

    for op in &input.ops {
        match *op {
            Op::Update {
                timestamp_step,
                ticks,
                reset,
            } => {
                tick_timer.increment_by(u64::from(ticks));
                timestamp = timestamp.wrapping_add(u32::from(timestamp_step));
                if let Some(relative_delay) =
                    delay_manager.update(timestamp, input.sample_rate_hz, reset)
                {
                    assert!(relative_delay >= 0);
                    // A maximum delay binds the freshly computed target as
                    // long as it covers at least one packet.
                    if maximum_delay_ms > 0 && packet_len_ms <= maximum_delay_ms {
                        assert!(delay_manager.target_delay_ms() <= maximum_delay_ms);
                    }
                }
            }
            Op::SetMinimumDelay(ms) => {
                let _ = delay_manager.set_minimum_delay(ms.into());
            }
            Op::SetMaximumDelay(ms) => {
                if delay_manager.set_maximum_delay(ms.into()) {
                    maximum_delay_ms = i32::from(ms);
                }
            }
            Op::SetBaseMinimumDelay(ms) => {
                let _ = delay_manager.set_base_minimum_delay(ms.into());
            }
            Op::SetPacketAudioLength(ms) => {
                if delay_manager.set_packet_audio_length(ms.into()) {
                    packet_len_ms = i32::from(ms);
                }
            }
            Op::Reset => {
                delay_manager.reset();
                packet_len_ms = 0;
            }
        }
    }
});
