//! An admin and a guest session sharing an in-memory relay.

use kurbo::Point;
use std::time::{Duration, Instant};
use tablemap_core::sync::{MemoryRelay, MemoryTransport};
use tablemap_core::{
    ConnectionState, DropEvent, DropPayload, EditorConfig, EditorSession, LayerKind, MouseButton,
    PointerEvent, Role, Tag, ToolMode,
};

fn session(role: Role, relay: &MemoryRelay, start: Instant) -> EditorSession {
    let mut session = EditorSession::new(role, EditorConfig::default()).unwrap();
    session.attach_sync(Box::new(MemoryTransport::new(relay.clone())));
    session.start_sync(start);
    session
}

fn pointer_drag(session: &mut EditorSession, from: Point, to: Point) {
    session.handle_pointer(&PointerEvent::Down {
        position: from,
        button: MouseButton::Left,
    });
    session.handle_pointer(&PointerEvent::Move { position: to });
    session.handle_pointer(&PointerEvent::Up {
        position: to,
        button: MouseButton::Left,
    });
}

fn token_positions(session: &EditorSession) -> Vec<Point> {
    session
        .scene()
        .layer(LayerKind::Tokens)
        .children
        .iter()
        .map(|n| n.attrs().position)
        .collect()
}

/// Tick both sessions every 100ms over `(from, to]`; returns how many merges the guest did.
fn run(
    admin: &mut EditorSession,
    guest: &mut EditorSession,
    t0: Instant,
    from: u64,
    to: u64,
) -> usize {
    let mut merges = 0;
    for ms in (from + 100..=to).step_by(100) {
        let now = t0 + Duration::from_millis(ms);
        admin.tick(now);
        if guest.tick(now).is_some() {
            merges += 1;
        }
    }
    merges
}

#[test]
fn test_guest_mirrors_admin_scene() {
    let relay = MemoryRelay::new();
    let t0 = Instant::now();
    let mut admin = session(Role::Admin, &relay, t0);
    let mut guest = session(Role::Guest, &relay, t0);

    admin.set_tool(ToolMode::ScaleCalibrate).unwrap();
    pointer_drag(&mut admin, Point::new(100.0, 100.0), Point::new(140.0, 144.0));
    assert_eq!(admin.mode(), ToolMode::Select);

    admin
        .handle_drop(DropEvent {
            payload: DropPayload::Token {
                url: "/static/img/characters/ranger.png".into(),
            },
            position: Point::new(300.0, 200.0),
        })
        .unwrap();
    admin.add_adhoc_token("Goblin").unwrap();

    admin.set_tool(ToolMode::Brush).unwrap();
    pointer_drag(&mut admin, Point::new(10.0, 10.0), Point::new(80.0, 40.0));
    admin.tick(t0);

    assert_eq!(run(&mut admin, &mut guest, t0, 0, 2000), 1);
    assert_eq!(relay.push_count(), 1);

    assert_eq!(token_positions(&guest), token_positions(&admin));
    assert_eq!(guest.scene().find_by_tag(Tag::Token).len(), 2);
    assert!((guest.state().cell_size - 42.0).abs() < 1e-9);
    assert!(guest.scene().layer(LayerKind::Brush).children.is_empty());
    assert_eq!(admin.scene().layer(LayerKind::Brush).children.len(), 1);
    assert_eq!(guest.mode(), ToolMode::Pan);
    assert!(
        guest
            .scene()
            .layer(LayerKind::Tokens)
            .children
            .iter()
            .all(|n| !n.attrs().draggable)
    );
    assert_eq!(guest.take_image_requests().len(), 1);
    assert_eq!(guest.connection_state(), ConnectionState::Reachable);
}

#[test]
fn test_guest_applies_each_push_once() {
    let relay = MemoryRelay::new();
    let t0 = Instant::now();
    let mut admin = session(Role::Admin, &relay, t0);
    let mut guest = session(Role::Guest, &relay, t0);

    admin.add_adhoc_token("A").unwrap();
    admin.tick(t0);
    assert_eq!(run(&mut admin, &mut guest, t0, 0, 6000), 1);
    assert_eq!(relay.fetch_count(), 3);

    admin.add_adhoc_token("B").unwrap();
    admin.tick(t0 + Duration::from_millis(6000));
    assert_eq!(run(&mut admin, &mut guest, t0, 6000, 8000), 1);
    assert_eq!(guest.scene().layer(LayerKind::Tokens).children.len(), 2);
}

#[test]
fn test_guest_recovers_after_outage() {
    let relay = MemoryRelay::new();
    let t0 = Instant::now();
    let mut admin = session(Role::Admin, &relay, t0);
    let mut guest = session(Role::Guest, &relay, t0);

    admin.add_adhoc_token("Orc").unwrap();
    admin.tick(t0);
    relay.set_offline(true);
    assert_eq!(run(&mut admin, &mut guest, t0, 0, 2000), 0);
    assert_eq!(guest.connection_state(), ConnectionState::Unreachable);
    assert!(guest.scene().layer(LayerKind::Tokens).children.is_empty());

    relay.set_offline(false);
    admin.add_adhoc_token("Elf").unwrap();
    admin.tick(t0 + Duration::from_millis(2000));
    assert_eq!(run(&mut admin, &mut guest, t0, 2000, 4000), 1);
    assert_eq!(guest.scene().layer(LayerKind::Tokens).children.len(), 2);
    assert_eq!(guest.connection_state(), ConnectionState::Reachable);
}
