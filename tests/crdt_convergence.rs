use livecoding_server::crdt::{CrdtDocument, CrdtEvent, GlobalId};

fn insert(counter: u32, site_id: u32, char: char, after: Option<(u32, u32)>) -> CrdtEvent {
    CrdtEvent::Insert {
        gid: GlobalId::new(counter, site_id),
        char,
        after_gid: after.map(|(c, s)| GlobalId::new(c, s)),
    }
}

fn delete(counter: u32, site_id: u32) -> CrdtEvent {
    CrdtEvent::Delete {
        gid: GlobalId::new(counter, site_id),
    }
}

fn materialize_in_order(events: &[CrdtEvent]) -> String {
    let mut doc = CrdtDocument::new();
    for e in events {
        doc.apply(e).unwrap();
    }
    doc.materialize()
}

/// Heap's algorithm, good enough for the small event sets these tests shuffle.
fn permutations(items: Vec<CrdtEvent>) -> Vec<Vec<CrdtEvent>> {
    fn heap(k: usize, items: &mut Vec<CrdtEvent>, out: &mut Vec<Vec<CrdtEvent>>) {
        if k == 1 {
            out.push(items.clone());
            return;
        }
        for i in 0..k {
            heap(k - 1, items, out);
            if k % 2 == 0 {
                items.swap(i, k - 1);
            } else {
                items.swap(0, k - 1);
            }
        }
    }
    let mut items = items;
    let n = items.len();
    let mut out = Vec::new();
    heap(n, &mut items, &mut out);
    out
}

/// A two-site history where both sites insert immediately after the same
/// root character. Every legal apply order (delete only ever trails its
/// target's insert) must materialize to the same string, since siblings
/// sharing an anchor break ties on descending gid rather than arrival order.
#[test]
fn concurrent_inserts_converge_across_every_apply_order() {
    let root = insert(0, 1, 'x', None);
    let from_one = insert(1, 1, 'A', Some((0, 1)));
    let from_two = insert(1, 2, 'B', Some((0, 1)));

    let baseline = materialize_in_order(&[root.clone(), from_one.clone(), from_two.clone()]);
    assert_eq!(baseline, "xBA");

    for perm in permutations(vec![root, from_one, from_two]) {
        assert_eq!(materialize_in_order(&perm), baseline, "diverged for order {perm:?}");
    }
}

/// Three sites each append one character to a shared root, all concurrently.
/// Regardless of delivery order, every replica lands on the same descending
/// gid ordering among the siblings.
#[test]
fn three_way_concurrent_insert_converges_across_every_apply_order() {
    let root = insert(0, 1, 'r', None);
    let a = insert(1, 1, 'a', Some((0, 1)));
    let b = insert(1, 2, 'b', Some((0, 1)));
    let c = insert(1, 3, 'c', Some((0, 1)));

    let baseline = materialize_in_order(&[root.clone(), a.clone(), b.clone(), c.clone()]);

    for perm in permutations(vec![root, a, b, c]) {
        assert_eq!(materialize_in_order(&perm), baseline, "diverged for order {perm:?}");
    }
}

/// A delete that races its own insert's concurrent siblings: as long as the
/// delete is applied after the insert it targets, the other apply orders
/// (including interleavings with the sibling insert) must still converge.
#[test]
fn delete_interleaved_with_concurrent_sibling_insert_converges() {
    let root = insert(0, 1, 'x', None);
    let from_one = insert(1, 1, 'A', Some((0, 1)));
    let from_two = insert(1, 2, 'B', Some((0, 1)));
    let delete_one = delete(1, 1);

    let legal_orders = [
        vec![root.clone(), from_one.clone(), from_two.clone(), delete_one.clone()],
        vec![root.clone(), from_two.clone(), from_one.clone(), delete_one.clone()],
        vec![root.clone(), from_one.clone(), delete_one.clone(), from_two.clone()],
    ];

    let baseline = materialize_in_order(&legal_orders[0]);
    assert_eq!(baseline, "xB");
    for order in &legal_orders[1..] {
        assert_eq!(materialize_in_order(order), baseline);
    }
}

/// Replaying the full history twice (simulating a reconnect that re-sends
/// the log it already has) must not change the materialized text or grow
/// the visible character count, since both insert and delete are idempotent
/// per-gid.
#[test]
fn replaying_a_mixed_history_twice_is_a_no_op() {
    let events = vec![
        insert(0, 1, 'h', None),
        insert(1, 1, 'e', Some((0, 1))),
        insert(2, 2, 'l', Some((1, 1))),
        insert(3, 1, 'l', Some((2, 2))),
        insert(4, 2, 'o', Some((3, 1))),
        delete(0, 1),
    ];

    let mut doc = CrdtDocument::new();
    for e in &events {
        doc.apply(e).unwrap();
    }
    let once = doc.materialize();
    let once_len = doc.len();

    for e in &events {
        doc.apply(e).unwrap();
    }
    assert_eq!(doc.materialize(), once);
    assert_eq!(doc.len(), once_len);
}
