use padbridge::backends::virtual_pad::{MotorCommand, PadToken, VirtualDriver, VirtualHub, VirtualPadSpec};
use padbridge::codes::*;
use padbridge::hid::HidElement;
use padbridge::{Backend, BackendConfig, EventKind, GamepadEvent, ManualClock, WIRE_EVENT_LEN};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const HAT: u32 = 0x39;
const LEFT_Y: u32 = 0x31;

fn open(config: BackendConfig) -> (Backend<VirtualDriver>, VirtualHub, ManualClock) {
    let clock = ManualClock::new(1_000);
    let backend = Backend::<VirtualDriver>::with_clock(config, Arc::new(clock.clone())).unwrap();
    let hub = backend.driver().hub();
    (backend, hub, clock)
}

fn drain(backend: &mut Backend<VirtualDriver>) -> Vec<GamepadEvent> {
    std::iter::from_fn(|| backend.next_event()).collect()
}

fn connect(backend: &mut Backend<VirtualDriver>, hub: &VirtualHub, spec: VirtualPadSpec) -> (PadToken, u32) {
    let pad = hub.plug(spec);
    backend.poll(0);
    let ev = backend.next_event().unwrap();
    assert_eq!(ev.kind, EventKind::Connected);
    (pad, ev.device_id)
}

#[test]
fn connect_press_release_in_order() {
    let (mut backend, hub, _clock) = open(BackendConfig::default());
    let pad = hub.plug(VirtualPadSpec::gamepad("Pad"));
    hub.press(pad, 1);
    hub.release(pad, 1);
    backend.poll(0);

    let events = drain(&mut backend);
    let seq: Vec<_> = events.iter().map(|e| (e.kind, e.code, e.value)).collect();
    assert_eq!(
        seq,
        vec![
            (EventKind::Connected, 0, 0.0),
            (EventKind::ButtonPressed, BTN_SOUTH, 1.0),
            (EventKind::ButtonReleased, BTN_SOUTH, 0.0),
        ]
    );
    assert!(events.iter().all(|e| e.device_id == 0 && e.timestamp_ms == 1_000));
    assert_eq!(backend.gamepad_count(), 1);
}

#[test]
fn ids_are_stable_and_never_reused() {
    let (mut backend, hub, _clock) = open(BackendConfig::default());
    let (a, id_a) = connect(&mut backend, &hub, VirtualPadSpec::gamepad("A"));

    for _ in 0..3 {
        hub.press(a, 2);
        backend.poll(0);
        assert!(drain(&mut backend).iter().all(|e| e.device_id == id_a));
    }

    hub.unplug(a);
    backend.poll(0);
    assert_eq!(
        backend.next_event().map(|e| (e.kind, e.device_id)),
        Some((EventKind::Disconnected, id_a))
    );
    assert_eq!(backend.gamepad_count(), 0);

    let (_b, id_b) = connect(&mut backend, &hub, VirtualPadSpec::gamepad("B"));
    assert_ne!(id_a, id_b);
    assert_eq!(backend.name(id_b), "B");
    assert_eq!(backend.name(id_a), "");
}

#[test]
fn unknown_ids_return_sentinels() {
    let (mut backend, _hub, _clock) = open(BackendConfig::default());
    assert_eq!(backend.name(7), "");
    assert_eq!(backend.uuid_simple(7), "");
    assert_eq!(backend.vendor_id(7), -1);
    assert_eq!(backend.product_id(7), -1);
    assert!(!backend.is_ff_supported(7));
    assert!(backend.axes(7).is_empty());
    assert!(backend.buttons(7).is_empty());
    assert_eq!(backend.axis_range(7, AXIS_LSTICKX), None);
    assert!(!backend.set_rumble(7, 1.0, 1.0, 100));
    assert!(backend.next_event_bytes().is_empty());
}

#[test]
fn metadata_and_capabilities() {
    let (mut backend, hub, _clock) = open(BackendConfig::default());
    let (_pad, id) = connect(&mut backend, &hub, VirtualPadSpec::gamepad("Test Pad"));

    assert_eq!(backend.name(id), "Test Pad");
    assert_eq!(backend.vendor_id(id), 0x1209);
    assert_eq!(backend.product_id(id), 0x0001);
    assert_eq!(backend.uuid_simple(id), "06000000091200000100000000000000");
    assert_eq!(
        backend.axes(id),
        vec![
            AXIS_LSTICKX,
            AXIS_LSTICKY,
            AXIS_LEFTZ,
            AXIS_RSTICKX,
            AXIS_RSTICKY,
            AXIS_RIGHTZ,
            AXIS_DPADX,
            AXIS_DPADY
        ]
    );
    assert_eq!(
        backend.buttons(id),
        vec![
            BTN_SOUTH,
            BTN_EAST,
            BTN_WEST,
            BTN_NORTH,
            BTN_LT,
            BTN_RT,
            BTN_LT2,
            BTN_RT2,
            BTN_SELECT,
            BTN_START,
            BTN_MODE,
            BTN_LTHUMB,
            BTN_RTHUMB
        ]
    );
    assert_eq!(backend.axis_range(id, AXIS_LSTICKX), Some((0, 255)));
    assert_eq!(backend.axis_range(id, AXIS_DPADY), Some((-1, 1)));
    assert_eq!(backend.axis_range(id, BTN_SOUTH), None);
}

#[test]
fn stick_y_is_inverted_and_centre_is_positive_zero() {
    let (mut backend, hub, _clock) = open(BackendConfig::default());
    let (pad, _id) = connect(&mut backend, &hub, VirtualPadSpec::gamepad("Pad"));

    for raw in [0, 127, 255] {
        hub.set_value(pad, LEFT_Y, raw);
    }
    backend.poll(0);
    let values: Vec<f64> = drain(&mut backend).iter().map(|e| e.value).collect();

    assert_eq!(values.len(), 3);
    assert_eq!(values[0], 0.9921875);
    assert_eq!(values[1].to_bits(), 0.0f64.to_bits());
    assert_eq!(values[2], -1.0);
}

#[test]
fn hat_emits_dpad_edges_then_axes() {
    let (mut backend, hub, _clock) = open(BackendConfig::default());
    let (pad, id) = connect(&mut backend, &hub, VirtualPadSpec::gamepad("Pad"));

    let mut step = |raw: i32| {
        hub.set_value(pad, HAT, raw);
        backend.poll(0);
        drain(&mut backend)
            .into_iter()
            .map(|e| {
                assert_eq!(e.device_id, id);
                (e.kind, e.code, e.value)
            })
            .collect::<Vec<_>>()
    };

    // right
    assert_eq!(
        step(2),
        vec![
            (EventKind::ButtonPressed, BTN_DPAD_RIGHT, 1.0),
            (EventKind::AxisChanged, AXIS_DPADX, 1.0),
            (EventKind::AxisChanged, AXIS_DPADY, 0.0),
        ]
    );
    // down-right: x unchanged, only the y edge
    assert_eq!(
        step(3),
        vec![
            (EventKind::ButtonPressed, BTN_DPAD_DOWN, 1.0),
            (EventKind::AxisChanged, AXIS_DPADX, 1.0),
            (EventKind::AxisChanged, AXIS_DPADY, 1.0),
        ]
    );
    // neutral
    assert_eq!(
        step(8),
        vec![
            (EventKind::ButtonReleased, BTN_DPAD_RIGHT, 0.0),
            (EventKind::ButtonReleased, BTN_DPAD_DOWN, 0.0),
            (EventKind::AxisChanged, AXIS_DPADX, 0.0),
            (EventKind::AxisChanged, AXIS_DPADY, 0.0),
        ]
    );
    // up is y = -1, never inverted
    assert_eq!(
        step(0),
        vec![
            (EventKind::ButtonPressed, BTN_DPAD_UP, 1.0),
            (EventKind::AxisChanged, AXIS_DPADX, 0.0),
            (EventKind::AxisChanged, AXIS_DPADY, -1.0),
        ]
    );
}

#[test]
fn rumble_expires_on_poll() {
    let (mut backend, hub, clock) = open(BackendConfig::default());
    let spec = VirtualPadSpec::gamepad("Rumbler").with_rumble(true);
    let (pad, id) = connect(&mut backend, &hub, spec);

    assert!(backend.is_ff_supported(id));
    assert!(backend.set_rumble(id, 1.0, 0.5, 50));
    assert_eq!(
        hub.take_motor_log(),
        vec![MotorCommand::Start {
            pad,
            strong: u16::MAX,
            weak: 32768,
            duration_ms: 50,
        }]
    );

    clock.advance(49);
    backend.poll(0);
    assert!(hub.motor_log().is_empty());

    clock.advance(1);
    backend.poll(0);
    assert_eq!(hub.take_motor_log(), vec![MotorCommand::Stop { pad }]);

    // already stopped
    clock.advance(100);
    backend.poll(0);
    assert!(hub.motor_log().is_empty());
}

#[test]
fn zero_rumble_stops_immediately() {
    let (mut backend, hub, _clock) = open(BackendConfig::default());
    let (pad, id) = connect(&mut backend, &hub, VirtualPadSpec::gamepad("Pad").with_rumble(true));

    assert!(backend.set_rumble(id, 0.8, 0.8, 1_000));
    assert!(backend.set_rumble(id, 0.0, 0.0, 1_000));
    assert!(backend.set_rumble(id, 1.0, 1.0, 0));
    let log = hub.take_motor_log();
    assert_eq!(log.len(), 3);
    assert_eq!(log[1], MotorCommand::Stop { pad });
    assert_eq!(log[2], MotorCommand::Stop { pad });
}

#[test]
fn rumble_is_refused_without_capability_or_when_disabled() {
    let (mut backend, hub, _clock) = open(BackendConfig::default());
    let (_pad, id) = connect(&mut backend, &hub, VirtualPadSpec::gamepad("Plain"));
    assert!(!backend.is_ff_supported(id));
    assert!(!backend.set_rumble(id, 1.0, 1.0, 100));

    let config = BackendConfig {
        rumble: false,
        ..Default::default()
    };
    let (mut backend, hub, _clock) = open(config);
    let (_pad, id) = connect(&mut backend, &hub, VirtualPadSpec::gamepad("Pad").with_rumble(true));
    assert!(!backend.is_ff_supported(id));
    assert!(!backend.set_rumble(id, 1.0, 1.0, 100));
    assert!(hub.motor_log().is_empty());
}

#[test]
fn unplug_stops_active_rumble_before_disconnect() {
    let (mut backend, hub, _clock) = open(BackendConfig::default());
    let (pad, id) = connect(&mut backend, &hub, VirtualPadSpec::gamepad("Pad").with_rumble(true));
    assert!(backend.set_rumble(id, 1.0, 1.0, 10_000));
    hub.take_motor_log();

    hub.unplug(pad);
    backend.poll(0);
    assert_eq!(hub.take_motor_log(), vec![MotorCommand::Stop { pad }]);
    assert_eq!(backend.next_event().map(|e| e.kind), Some(EventKind::Disconnected));
    assert!(!backend.set_rumble(id, 1.0, 1.0, 100));
}

#[test]
fn read_failure_disconnects_once_and_retires_the_id() {
    let (mut backend, hub, _clock) = open(BackendConfig::default());
    let (pad, id) = connect(&mut backend, &hub, VirtualPadSpec::gamepad("Pad").with_rumble(true));
    assert!(backend.set_rumble(id, 1.0, 1.0, 10_000));
    hub.take_motor_log();

    hub.press(pad, 1);
    hub.fail(pad);
    hub.press(pad, 2);
    hub.fail(pad);
    backend.poll(0);

    let seq: Vec<_> = drain(&mut backend).iter().map(|e| (e.kind, e.device_id)).collect();
    assert_eq!(seq, vec![(EventKind::ButtonPressed, id), (EventKind::Disconnected, id)]);
    assert_eq!(hub.take_motor_log(), vec![MotorCommand::Stop { pad }]);
    assert_eq!(backend.gamepad_count(), 0);
    assert_eq!(backend.name(id), "");
    assert!(!backend.set_rumble(id, 1.0, 1.0, 100));

    // nothing more from the failed pad
    hub.press(pad, 3);
    hub.unplug(pad);
    backend.poll(0);
    assert_eq!(backend.pending(), 0);
    assert!(hub.motor_log().is_empty());

    let (_next, next_id) = connect(&mut backend, &hub, VirtualPadSpec::gamepad("Next"));
    assert_ne!(next_id, id);
}

#[test]
fn positive_timeout_waits_out_an_idle_poll() {
    let (mut backend, _hub, _clock) = open(BackendConfig::default());
    let start = Instant::now();
    backend.poll(40);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(40), "returned after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "returned after {elapsed:?}");
    assert_eq!(backend.pending(), 0);
}

#[test]
fn positive_timeout_returns_early_on_an_event() {
    let (mut backend, hub, _clock) = open(BackendConfig::default());
    let plugger = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        hub.plug(VirtualPadSpec::gamepad("Late"));
    });
    let start = Instant::now();
    backend.poll(10_000);
    plugger.join().unwrap();

    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(backend.next_event().map(|e| e.kind), Some(EventKind::Connected));
}

#[test]
fn negative_timeout_blocks_until_an_event_is_queued() {
    let (mut backend, hub, _clock) = open(BackendConfig::default());
    let start = Instant::now();
    let plugger = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        hub.plug(VirtualPadSpec::gamepad("Late"));
    });
    backend.poll(-1);
    plugger.join().unwrap();

    assert!(start.elapsed() >= Duration::from_millis(30));
    assert_eq!(backend.next_event().map(|e| e.kind), Some(EventKind::Connected));
    assert_eq!(backend.name(0), "Late");
}

#[test]
fn full_queue_drops_oldest() {
    let config = BackendConfig {
        queue_capacity: 4,
        ..Default::default()
    };
    let (mut backend, hub, _clock) = open(config);
    let pad = hub.plug(VirtualPadSpec::gamepad("Pad"));
    for cookie in 1..=5 {
        hub.press(pad, cookie);
    }
    backend.poll(0);

    assert_eq!(backend.pending(), 4);
    let codes: Vec<_> = drain(&mut backend).iter().map(|e| e.code).collect();
    // Connected and South were evicted
    assert_eq!(codes, vec![BTN_EAST, BTN_WEST, BTN_NORTH, BTN_LT]);
}

#[test]
fn wire_records_match_events() {
    let (mut backend, hub, clock) = open(BackendConfig::default());
    clock.set(1_700_000_000_123);
    let pad = hub.plug(VirtualPadSpec::gamepad("Pad"));
    hub.press(pad, 4);
    backend.poll(0);

    let connected = backend.next_event_bytes();
    assert_eq!(connected.len(), WIRE_EVENT_LEN);
    let pressed = backend.next_event_bytes();
    let ev = GamepadEvent::from_bytes(&pressed).unwrap();
    assert_eq!(ev, GamepadEvent::button(0, BTN_NORTH, true, 1_700_000_000_123));
    assert!(backend.next_event_bytes().is_empty());
}

#[test]
fn custom_elements_without_hat_have_no_dpad_axes() {
    let (mut backend, hub, _clock) = open(BackendConfig::default());
    let spec = VirtualPadSpec::new("Stick")
        .element(HidElement::axis(7, 0x30, -127, 127))
        .element(HidElement::axis(8, 0x31, -127, 127))
        .element(HidElement::button(9, 1));
    let (pad, id) = connect(&mut backend, &hub, spec);
    assert_eq!(backend.axes(id), vec![AXIS_LSTICKX, AXIS_LSTICKY]);
    assert_eq!(backend.buttons(id), vec![BTN_SOUTH]);
    assert_eq!(backend.name(id), "Stick");

    hub.set_value(pad, 7, 127);
    hub.set_value(pad, 99, 1);
    backend.poll(0);
    let events = drain(&mut backend);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].code, AXIS_LSTICKX);
    assert_eq!(events[0].value, 1.0);
}

#[test]
fn shutdown_is_idempotent() {
    let (mut backend, hub, _clock) = open(BackendConfig::default());
    let (pad, id) = connect(&mut backend, &hub, VirtualPadSpec::gamepad("Pad").with_rumble(true));
    assert!(backend.set_rumble(id, 1.0, 1.0, 10_000));
    hub.take_motor_log();

    backend.shutdown();
    backend.shutdown();
    assert_eq!(hub.take_motor_log(), vec![MotorCommand::Stop { pad }]);
    assert_eq!(backend.gamepad_count(), 0);
    assert!(!backend.set_rumble(id, 1.0, 1.0, 100));

    hub.press(pad, 1);
    backend.poll(0);
    assert_eq!(backend.pending(), 0);
}
