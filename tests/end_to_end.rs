mod common;

use common::{MockOutput, OutputEvent, RecordingChip, ScriptedTransport};
use opl3sw::{BridgeConfig, Opl3Bridge, PlaybackState, QueueTransport};

const PERIOD: usize = 32;
const DEVICE_FRAMES: usize = PERIOD * 8;

fn config() -> BridgeConfig {
    BridgeConfig {
        period_frames: PERIOD,
        ..Default::default()
    }
}

fn running_bridge() -> (Opl3Bridge<RecordingChip, MockOutput>, RecordingChip, MockOutput) {
    let chip = RecordingChip::new();
    let output = MockOutput::with_capacity(DEVICE_FRAMES);
    let mut bridge =
        Opl3Bridge::new(config(), chip.clone(), output.clone()).expect("valid config");

    bridge.initialize().expect("bring-up");
    assert_eq!(bridge.state(), PlaybackState::Running);
    (bridge, chip, output)
}

#[test]
fn address_then_data_write_reaches_engine() {
    let (mut bridge, chip, _output) = running_bridge();
    let mut transport = QueueTransport::new();

    transport.push(0b00, 0x20);
    assert_eq!(bridge.poll(&mut transport), 1);
    assert_eq!(bridge.latched_register(), 0x20);
    assert!(chip.writes().is_empty());

    transport.push(0b01, 0x01);
    bridge.poll(&mut transport);
    assert_eq!(chip.writes(), vec![(0x20, 0x01)]);
}

#[test]
fn opl2_mode_register_reachable_through_upper_bank() {
    let (mut bridge, chip, _output) = running_bridge();
    let mut transport = QueueTransport::new();

    transport.push(0b10, 0x05);
    bridge.poll(&mut transport);
    assert_eq!(bridge.latched_register(), 0x105);

    transport.push(0b01, 0xFF);
    bridge.poll(&mut transport);
    assert_eq!(chip.writes(), vec![(0x105, 0xFF)]);
}

#[test]
fn enabling_opl3_mode_opens_upper_bank() {
    let (mut bridge, chip, _output) = running_bridge();
    let mut transport = QueueTransport::new();

    // Upper bank folds onto the lower one while in OPL2 mode
    transport.push(0b10, 0xB0);
    bridge.poll(&mut transport);
    assert_eq!(bridge.latched_register(), 0xB0);

    transport.extend([(0b10, 0x05), (0b11, 0x01), (0b10, 0xB0), (0b01, 0x31)]);
    while bridge.poll(&mut transport) > 0 {}

    assert_eq!(bridge.latched_register(), 0x1B0);
    assert_eq!(chip.writes(), vec![(0x105, 0x01), (0x1B0, 0x31)]);
}

#[test]
fn single_pending_write_uses_scalar_read() {
    let (mut bridge, chip, _output) = running_bridge();
    let mut transport = ScriptedTransport::default();

    transport.push(0, 0x40);
    assert_eq!(bridge.poll(&mut transport), 1);
    assert_eq!(transport.scalar_reads, 1);
    assert!(transport.bulk_reads.is_empty());
    assert!(chip.writes().is_empty());
}

#[test]
fn odd_pending_count_fetches_one_less() {
    let (mut bridge, chip, _output) = running_bridge();
    let mut transport = ScriptedTransport::default();

    transport.push(0, 0x20);
    transport.push(1, 0x01);
    transport.push(1, 0x02);

    assert_eq!(bridge.poll(&mut transport), 2);
    assert_eq!(transport.bulk_reads, vec![2]);
    assert_eq!(chip.writes(), vec![(0x20, 0x01)]);
    assert_eq!(bridge.drain_stats().odd_tail_skipped, 1);

    // The transport kept the tail; it arrives through the scalar path
    assert_eq!(bridge.poll(&mut transport), 1);
    assert_eq!(transport.scalar_reads, 1);
    assert_eq!(chip.writes(), vec![(0x20, 0x01), (0x20, 0x02)]);
}

#[test]
fn odd_tail_loss_is_bounded_to_one_write_per_tick() {
    let (mut bridge, chip, _output) = running_bridge();
    let mut transport = ScriptedTransport {
        discard_unread: true,
        ..Default::default()
    };

    transport.push(0, 0x20);
    for value in 1..=4u8 {
        transport.push(1, value);
    }

    assert_eq!(bridge.poll(&mut transport), 4);
    assert_eq!(bridge.poll(&mut transport), 0);
    assert_eq!(chip.writes(), vec![(0x20, 1), (0x20, 2), (0x20, 3)]);
}

#[test]
fn batch_is_clamped_to_capacity() {
    let chip = RecordingChip::new();
    let output = MockOutput::with_capacity(DEVICE_FRAMES);
    let config = BridgeConfig {
        batch_capacity: 4,
        ..config()
    };
    let mut bridge = Opl3Bridge::new(config, chip.clone(), output).expect("valid config");
    let mut transport = QueueTransport::new();

    transport.push(0, 0x20);
    transport.extend((0..9u8).map(|v| (1, v)));

    assert_eq!(bridge.poll(&mut transport), 4);
    assert_eq!(transport.len(), 6);
    while bridge.poll(&mut transport) > 0 {}
    assert_eq!(chip.writes().len(), 9);
}

#[test]
fn idle_device_never_opens_output() {
    let output = MockOutput::with_capacity(DEVICE_FRAMES);
    let mut bridge =
        Opl3Bridge::new(config(), RecordingChip::new(), output.clone()).expect("valid config");
    let mut transport = QueueTransport::new();

    for _ in 0..10 {
        assert_eq!(bridge.poll(&mut transport), 0);
    }
    assert!(output.events().is_empty());
    assert!(!bridge.is_initialized());
}

#[test]
fn first_activity_brings_up_audio_once() {
    let chip = RecordingChip::new();
    let output = MockOutput::with_capacity(DEVICE_FRAMES);
    let mut bridge = Opl3Bridge::new(config(), chip.clone(), output.clone()).expect("valid config");
    let mut transport = QueueTransport::new();

    transport.push(0, 0x20);
    bridge.poll(&mut transport);
    transport.push(1, 0x01);
    bridge.poll(&mut transport);

    assert_eq!(
        output.events(),
        vec![
            OutputEvent::Configure,
            OutputEvent::Prepare,
            OutputEvent::Silence,
            OutputEvent::Silence,
            OutputEvent::Start,
        ]
    );
    assert!(output.has_callback());
    assert_eq!(chip.log.lock().resets, vec![44_100]);
    assert_eq!(bridge.format().map(|f| f.period_frames), Some(PERIOD));
}

#[test]
fn failed_bring_up_defers_writes_to_next_tick() {
    let chip = RecordingChip::new();
    let output = MockOutput::with_capacity(DEVICE_FRAMES);
    output.log.lock().configure_failures = 2;
    let mut bridge = Opl3Bridge::new(config(), chip.clone(), output.clone()).expect("valid config");
    let mut transport = QueueTransport::new();
    transport.extend([(0, 0x20), (1, 0x01)]);

    assert_eq!(bridge.poll(&mut transport), 0);
    assert_eq!(bridge.poll(&mut transport), 0);
    assert!(chip.writes().is_empty());
    assert_eq!(transport.len(), 2);
    assert_eq!(bridge.drain_stats().init_failures, 2);
    assert_eq!(bridge.state(), PlaybackState::Uninitialized);

    assert_eq!(bridge.poll(&mut transport), 2);
    assert_eq!(chip.writes(), vec![(0x20, 0x01)]);
    assert_eq!(bridge.state(), PlaybackState::Running);
}

#[test]
fn ready_callback_fills_every_free_period() {
    let (bridge, chip, output) = running_bridge();

    // Two primed periods already queued
    output.fire_ready();
    assert_eq!(chip.log.lock().periods, 6);
    assert_eq!(bridge.render_stats().periods_rendered, 6);

    output.consume(100);
    output.fire_ready();
    assert_eq!(chip.log.lock().periods, 9);

    // Less than a period free: nothing rendered
    output.fire_ready();
    assert_eq!(chip.log.lock().periods, 9);
}

#[test]
fn underflow_is_followed_by_two_silent_periods() {
    let (bridge, _chip, output) = running_bridge();

    output.consume(DEVICE_FRAMES);
    output.clear_events();
    output.log.lock().underflow_next = true;
    output.fire_ready();

    let events = output.events();
    assert_eq!(
        &events[..4],
        &[
            OutputEvent::Underflow,
            OutputEvent::Prepare,
            OutputEvent::Silence,
            OutputEvent::Silence,
        ]
    );
    assert!(events[4..].iter().all(|e| *e == OutputEvent::Audio));
    assert_eq!(events[4..].len(), 6);
    assert_eq!(bridge.state(), PlaybackState::Running);
    assert_eq!(bridge.render_stats().underflows, 1);
}

#[test]
fn playback_survives_repeated_underflows() {
    let (bridge, _chip, output) = running_bridge();

    for _ in 0..3 {
        output.consume(DEVICE_FRAMES);
        output.log.lock().underflow_next = true;
        output.fire_ready();
        assert_eq!(bridge.state(), PlaybackState::Running);
    }

    output.consume(DEVICE_FRAMES);
    output.clear_events();
    output.fire_ready();
    assert!(output.events().contains(&OutputEvent::Audio));
    assert_eq!(bridge.render_stats().underflows, 3);
}

#[test]
fn shutdown_releases_output_and_allows_restart() {
    let (mut bridge, _chip, output) = running_bridge();

    bridge.shutdown();
    assert_eq!(bridge.state(), PlaybackState::Uninitialized);
    assert_eq!(output.events().last(), Some(&OutputEvent::Close));
    assert!(!output.has_callback());

    let mut transport = QueueTransport::new();
    transport.push(0, 0x20);
    bridge.poll(&mut transport);
    assert_eq!(bridge.state(), PlaybackState::Running);
}

#[test]
fn dropping_bridge_closes_output() {
    let (bridge, _chip, output) = running_bridge();
    drop(bridge);
    assert_eq!(output.events().last(), Some(&OutputEvent::Close));
}

#[test]
fn callback_after_drop_is_harmless() {
    let (bridge, _chip, output) = running_bridge();
    let callback = bridge.ready_callback();
    drop(bridge);
    callback();
    output.fire_ready();
}
