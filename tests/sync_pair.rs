//! Physical and virtual node linked by a loopback radio

use radiopad::controller::{
    Axis, ButtonId, ButtonSet, ControllerHandle, ControllerSettings, ControllerSnapshot, Role,
    StickPosition, Transition, WireFormat,
};
use radiopad::hardware::{HardwareButton, SimulatedBoard};
use radiopad::radio::{LogicalChannel, LoopbackRadio, Radio, RadioPacket};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(3);

struct Pair {
    physical: ControllerHandle,
    physical_board: SimulatedBoard,
    physical_radio: LoopbackRadio,
    virtual_node: ControllerHandle,
}

fn settings(format: WireFormat) -> ControllerSettings {
    ControllerSettings {
        broadcast_interval_ms: 2,
        dispatch_interval_ms: 2,
        wire_format: format,
        ..Default::default()
    }
}

fn start_pair(format: WireFormat) -> Pair {
    let settings = settings(format);
    let (physical_radio, virtual_radio) = LoopbackRadio::pair();

    let physical_board = SimulatedBoard::new();
    physical_board.set_analog(settings.pins.stick_x, 500);
    physical_board.set_analog(settings.pins.stick_y, 0);

    let physical = ControllerHandle::new(
        Arc::new(physical_board.clone()),
        Arc::new(physical_radio.clone()),
        Some(settings.clone()),
    );
    let virtual_node = ControllerHandle::new(
        Arc::new(SimulatedBoard::new()),
        Arc::new(virtual_radio),
        Some(settings),
    );

    assert_eq!(virtual_node.initialise().unwrap(), Role::Virtual);
    assert_eq!(physical.initialise().unwrap(), Role::Physical);

    Pair {
        physical,
        physical_board,
        physical_radio,
        virtual_node,
    }
}

async fn wait_for<F>(controller: &ControllerHandle, mut predicate: F) -> ControllerSnapshot
where
    F: FnMut(&ControllerSnapshot) -> bool,
{
    let mut updates = controller.subscribe();
    let snapshot = tokio::time::timeout(WAIT, updates.wait_for(|s| predicate(s)))
        .await
        .expect("timed out waiting for controller state")
        .expect("controller state channel closed");
    *snapshot
}

#[tokio::test]
async fn virtual_node_mirrors_buttons_and_stick() {
    let pair = start_pair(WireFormat::Positional);
    let pins = pair.physical.settings().pins.clone();

    pair.physical_board
        .set_hardware_button(HardwareButton::A, true);
    pair.physical_board.set_digital(pins.button_z, false);
    pair.physical_board.set_analog(pins.stick_x, 525);
    pair.physical_board.set_analog(pins.stick_y, 1023);

    let expected: ButtonSet = [ButtonId::A, ButtonId::Z].into_iter().collect();
    let snapshot = wait_for(&pair.virtual_node, |s| {
        s.buttons == expected && s.stick == StickPosition::new(5, 100)
    })
    .await;

    assert_eq!(snapshot.role, Some(Role::Virtual));
    assert!(pair.virtual_node.button_is_pressed(ButtonId::A));
    assert!(pair.virtual_node.button_is_pressed(ButtonId::Z));
    assert!(!pair.virtual_node.button_is_pressed(ButtonId::C));
    assert_eq!(pair.virtual_node.stick_position(Axis::X), 5);
    assert_eq!(pair.virtual_node.stick_position(Axis::Y), 100);

    pair.physical.shutdown();
    pair.virtual_node.shutdown();
}

#[tokio::test]
async fn hex_wire_format_works_end_to_end() {
    let pair = start_pair(WireFormat::Hex);
    let pins = pair.physical.settings().pins.clone();

    pair.physical_board.set_digital(pins.button_c, false);
    pair.physical_board.set_digital(pins.button_f, false);

    let expected: ButtonSet = [ButtonId::C, ButtonId::F].into_iter().collect();
    wait_for(&pair.virtual_node, |s| s.buttons == expected).await;

    pair.physical.shutdown();
    pair.virtual_node.shutdown();
}

#[tokio::test]
async fn dropped_messages_leave_virtual_state_stale() {
    let pair = start_pair(WireFormat::Positional);
    let pins = pair.physical.settings().pins.clone();

    pair.physical_board.set_digital(pins.button_d, false);
    wait_for(&pair.virtual_node, |s| s.buttons.contains(ButtonId::D)).await;

    pair.physical_radio.set_dropping(true);
    pair.physical_board.set_digital(pins.button_d, true);
    let dropped_before = pair.physical_radio.dropped();
    tokio::time::timeout(WAIT, async {
        while pair.physical_radio.dropped() < dropped_before + 10 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("physical node stopped broadcasting");

    assert!(pair.virtual_node.button_is_pressed(ButtonId::D));

    pair.physical_radio.set_dropping(false);
    wait_for(&pair.virtual_node, |s| !s.buttons.contains(ButtonId::D)).await;

    pair.physical.shutdown();
    pair.virtual_node.shutdown();
}

#[tokio::test]
async fn button_message_precedes_stick_message() {
    let settings = settings(WireFormat::Positional);
    let (physical_radio, listener) = LoopbackRadio::pair();
    let log = Arc::new(Mutex::new(Vec::new()));

    for channel in LogicalChannel::ALL {
        let sink = log.clone();
        listener
            .on_receive(
                channel,
                Arc::new(move |packet: RadioPacket| sink.lock().unwrap().push((channel, packet))),
            )
            .unwrap();
    }

    let board = SimulatedBoard::new();
    board.set_analog(settings.pins.stick_x, 0);
    let physical = ControllerHandle::new(
        Arc::new(board),
        Arc::new(physical_radio),
        Some(settings),
    );
    physical.initialise().unwrap();

    tokio::time::timeout(WAIT, async {
        while log.lock().unwrap().len() < 6 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("no broadcasts");
    physical.shutdown();

    let log = log.lock().unwrap();
    for pair in log.chunks(2).take(3) {
        assert_eq!(
            pair[0],
            (
                LogicalChannel::Buttons,
                RadioPacket::Value {
                    name: "-------".to_string(),
                    value: 0
                }
            )
        );
        assert_eq!(
            pair[1],
            (LogicalChannel::Stick, RadioPacket::Text("-100,2".to_string()))
        );
    }
}

#[tokio::test]
async fn malformed_stick_message_keeps_last_position() {
    let (sender, receiver) = LoopbackRadio::pair();
    let virtual_node = ControllerHandle::new(
        Arc::new(SimulatedBoard::new()),
        Arc::new(receiver),
        Some(settings(WireFormat::Positional)),
    );
    assert_eq!(virtual_node.initialise().unwrap(), Role::Virtual);

    sender.send_string(LogicalChannel::Stick, "-40,60").unwrap();
    assert_eq!(virtual_node.snapshot().stick, StickPosition::new(-40, 60));

    sender.send_string(LogicalChannel::Stick, "garbage").unwrap();
    sender.send_string(LogicalChannel::Stick, "").unwrap();
    sender.send_value(LogicalChannel::Stick, "10,10", 0).unwrap();
    assert_eq!(virtual_node.snapshot().stick, StickPosition::new(-40, 60));

    sender.send_value(LogicalChannel::Buttons, "AB", 0).unwrap();
    let expected: ButtonSet = [ButtonId::A, ButtonId::B].into_iter().collect();
    assert_eq!(virtual_node.snapshot().buttons, expected);

    virtual_node.shutdown();
}

#[tokio::test]
async fn handlers_fire_on_virtual_node_edges() {
    let (sender, receiver) = LoopbackRadio::pair();
    let virtual_node = ControllerHandle::new(
        Arc::new(SimulatedBoard::new()),
        Arc::new(receiver),
        Some(settings(WireFormat::Positional)),
    );
    virtual_node.initialise().unwrap();

    let presses = Arc::new(AtomicUsize::new(0));
    let releases = Arc::new(AtomicUsize::new(0));
    let second_presses = Arc::new(AtomicUsize::new(0));

    let counter = presses.clone();
    virtual_node.on_button(ButtonId::E, Transition::Pressed, move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();
    let counter = second_presses.clone();
    virtual_node.on_button(ButtonId::E, Transition::Pressed, move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();
    let counter = releases.clone();
    virtual_node.on_button(ButtonId::E, Transition::Released, move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    sender.send_value(LogicalChannel::Buttons, "----E--", 0).unwrap();
    wait_until(|| presses.load(Ordering::SeqCst) == 1 && second_presses.load(Ordering::SeqCst) == 1)
        .await;
    assert_eq!(releases.load(Ordering::SeqCst), 0);

    sender.send_value(LogicalChannel::Buttons, "-------", 0).unwrap();
    wait_until(|| releases.load(Ordering::SeqCst) == 1).await;

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(presses.load(Ordering::SeqCst), 1);
    assert_eq!(second_presses.load(Ordering::SeqCst), 1);
    assert_eq!(releases.load(Ordering::SeqCst), 1);

    virtual_node.shutdown();
}

#[tokio::test]
async fn shutdown_stops_broadcasting() {
    let pair = start_pair(WireFormat::Positional);
    wait_for(&pair.virtual_node, |s| s.updates > 0).await;

    pair.physical.shutdown();
    pair.virtual_node.shutdown();
    assert!(pair.physical.is_shut_down());

    // Let an in-flight cycle finish
    tokio::time::sleep(Duration::from_millis(20)).await;
    let delivered = pair.physical_radio.delivered();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(pair.physical_radio.delivered(), delivered);
}

#[tokio::test]
async fn shutdown_stops_virtual_node_updates() {
    let (sender, receiver) = LoopbackRadio::pair();
    let virtual_node = ControllerHandle::new(
        Arc::new(SimulatedBoard::new()),
        Arc::new(receiver),
        Some(settings(WireFormat::Positional)),
    );
    assert_eq!(virtual_node.initialise().unwrap(), Role::Virtual);

    virtual_node.shutdown();
    sender.send_string(LogicalChannel::Stick, "-40,60").unwrap();
    sender.send_value(LogicalChannel::Buttons, "ABCDEFZ", 0).unwrap();

    let snapshot = virtual_node.snapshot();
    assert!(virtual_node.is_shut_down());
    assert_eq!(snapshot.stick, StickPosition::default());
    assert!(snapshot.buttons.is_empty());
    assert_eq!(virtual_node.stick_position(Axis::X), 0);
    assert!(!virtual_node.button_is_pressed(ButtonId::A));
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
