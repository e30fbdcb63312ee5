use system::{
    CanvasReplica, CanvasStore, Color, Coordinate, Handoff, HandoffState, MemoryStore,
    OutboundMessage, Update, Viewport,
};

fn color(s: &str) -> Color {
    Color::new(s).expect("valid color")
}

fn paint(store: &mut MemoryStore, x: i32, y: i32, c: &str) -> Update {
    store.write(Coordinate::new(x, y), color(c)).expect("")
}

#[test]
fn last_write_to_a_cell_is_what_snapshots_show() {
    let mut store = MemoryStore::new();
    paint(&mut store, 1, 1, "red");
    paint(&mut store, 1, 1, "blue");

    let snapshot = store.snapshot(&Viewport::all()).expect("");
    assert_eq!(snapshot.sequence, 2);
    assert_eq!(snapshot.color_at(&Coordinate::new(1, 1)), Some(&color("blue")));
}

#[test]
fn write_between_subscribe_and_snapshot_is_applied_once() {
    let mut store = MemoryStore::new();
    let mut handoff = Handoff::new(Viewport::all());

    // subscribed; the write lands before the snapshot is read
    let green = paint(&mut store, 5, 5, "green");
    handoff.receive(green.clone()).expect("");
    handoff.begin_snapshot();
    let snapshot = store.snapshot(handoff.viewport()).expect("");
    assert!(snapshot.sequence >= green.sequence);

    let messages = handoff.install_snapshot(snapshot).expect("");
    assert_eq!(messages.len(), 1);
    match &messages[0] {
        OutboundMessage::Init { cells, .. } => {
            assert_eq!(cells.len(), 1);
            assert_eq!(cells[0].color, color("green"));
        }
        other => panic!("unexpected message: {:?}", other),
    }
    assert_eq!(handoff.state(), HandoffState::Live);
}

/// Every possible snapshot point within a burst of writes converges on the
/// store's state without replaying or skipping anything.
#[test]
fn every_snapshot_point_converges() {
    let viewport = Viewport::from_origin(0, 0, 4, 4);
    let writes = (0..12)
        .map(|i| (i % 6, i / 3, ["red", "green", "blue"][i as usize % 3]))
        .collect::<Vec<_>>();

    for snapshot_at in 0..=writes.len() {
        let mut store = MemoryStore::new();
        let mut handoff = Handoff::new(viewport);
        let mut replica = CanvasReplica::new();
        let mut feed = Vec::new();

        for (i, (x, y, c)) in writes.iter().enumerate() {
            if i == snapshot_at {
                for update in feed.drain(..) {
                    handoff.receive(update).expect("");
                }
                handoff.begin_snapshot();
                let snapshot = store.snapshot(&viewport).expect("");
                for message in handoff.install_snapshot(snapshot).expect("") {
                    replica.handle(&message).expect("ordered");
                }
            }
            feed.push(paint(&mut store, *x, *y, c));
        }
        if snapshot_at == writes.len() {
            for update in feed.drain(..) {
                handoff.receive(update).expect("");
            }
            handoff.begin_snapshot();
            let snapshot = store.snapshot(&viewport).expect("");
            for message in handoff.install_snapshot(snapshot).expect("") {
                replica.handle(&message).expect("ordered");
            }
        }
        for update in feed.drain(..) {
            if let Some(message) = handoff.receive(update).expect("") {
                replica.handle(&message).expect("ordered");
            }
        }

        let expected = store.snapshot(&viewport).expect("");
        assert!(replica.matches(&expected), "diverged at {}", snapshot_at);
        assert_eq!(handoff.last_applied(), expected.sequence);
        let applied = replica.applied();
        assert!(applied.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn disjoint_viewports_never_see_each_others_updates() {
    let left = Viewport::from_origin(0, 0, 10, 10);
    let right = Viewport::from_origin(100, 0, 10, 10);
    let mut store = MemoryStore::new();
    let mut sessions = [Handoff::new(left), Handoff::new(right)];
    for handoff in sessions.iter_mut() {
        let snapshot = store.snapshot(handoff.viewport()).expect("");
        handoff.install_snapshot(snapshot).expect("");
    }

    let updates = vec![
        paint(&mut store, 1, 1, "red"),
        paint(&mut store, 101, 1, "blue"),
        paint(&mut store, 2, 2, "red"),
    ];
    let mut received = [Vec::new(), Vec::new()];
    for update in updates {
        for (handoff, out) in sessions.iter_mut().zip(received.iter_mut()) {
            if let Some(message) = handoff.receive(update.clone()).expect("") {
                out.push(message);
            }
        }
    }

    let sequences = |messages: &[OutboundMessage]| {
        messages.iter().filter_map(|m| m.sequence()).collect::<Vec<_>>()
    };
    assert_eq!(sequences(&received[0][..]), vec![1, 3]);
    assert_eq!(sequences(&received[1][..]), vec![2]);
}
