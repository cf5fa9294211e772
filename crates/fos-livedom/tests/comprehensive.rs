//! Comprehensive tests for fos-livedom
//!
//! Tree invariants, range repair across mutations, the selection index
//! and document-position ordering, driven through the public API.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use fos_livedom::{
    BoundaryPoint, DocumentPosition, DomError, DomTree, MutationObserverInit, MutationRecorder,
    MutationType, NodeId, NodeOperations, RangeId,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn bounds(tree: &DomTree, id: RangeId) -> (BoundaryPoint, BoundaryPoint) {
    let range = tree.range(id).expect("live range");
    (range.start().expect("positioned"), range.end().expect("positioned"))
}

fn assert_ordered(tree: &DomTree, id: RangeId) {
    let (start, end) = bounds(tree, id);
    let order = tree.compare_points(start.node, start.offset, end.node, end.offset);
    assert!(
        matches!(order, Some(Ordering::Less | Ordering::Equal)),
        "range {id:?} out of order: {start:?} .. {end:?}"
    );
    assert!(!tree.range_is_dangling(id));
}

fn assert_child_indices(tree: &DomTree, parent: NodeId) {
    for (i, &child) in tree.children(parent).iter().enumerate() {
        assert_eq!(tree.parent(child), Some(parent));
        assert_eq!(tree.index_of(parent, child), Some(i));
        assert_eq!(tree.child_at(parent, i), Some(child));
        assert_child_indices(tree, child);
    }
}

/// doc > html > body
fn document() -> (DomTree, NodeId, NodeId) {
    init_tracing();
    let mut tree = DomTree::new();
    let doc = tree.create_document();
    let html = tree.create_element(doc, "html");
    let body = tree.create_element(doc, "body");
    tree.append_child(doc, html).unwrap();
    tree.append_child(html, body).unwrap();
    (tree, doc, body)
}

// ============================================================================
// TREE INVARIANTS
// ============================================================================

#[test]
fn test_parent_index_invariant() {
    let (mut tree, doc, body) = document();

    let mut items = Vec::new();
    for i in 0..10 {
        let item = tree.create_element(doc, "li");
        let text = tree.create_text(doc, &format!("item {i}"));
        tree.append_child(item, text).unwrap();
        tree.append_child(body, item).unwrap();
        items.push(item);
    }
    assert_child_indices(&tree, doc);
    assert!(tree.check_tree_invariants());

    let first = tree.create_element(doc, "h1");
    tree.insert_before(body, first, Some(items[0])).unwrap();
    let middle = tree.create_element(doc, "hr");
    tree.insert_before(body, middle, Some(items[5])).unwrap();
    assert_child_indices(&tree, doc);

    let replacement = tree.create_element(doc, "li");
    tree.replace_child(body, replacement, items[3]).unwrap();
    assert_eq!(tree.parent(items[3]), None);
    tree.remove_child(body, items[7]).unwrap();

    // moving within the same parent
    tree.append_child(body, items[0]).unwrap();
    tree.insert_before(body, items[9], Some(first)).unwrap();

    assert_child_indices(&tree, doc);
    assert!(tree.check_tree_invariants());
    assert_eq!(tree.first_child(body), Some(items[9]));
    assert_eq!(tree.last_child(body), Some(items[0]));
    assert_eq!(tree.child_count(body), 11);
}

#[test]
fn test_insert_remove_round_trip() {
    let (mut tree, doc, body) = document();
    let kids: Vec<NodeId> = (0..4).map(|_| tree.create_element(doc, "p")).collect();
    for &k in &kids {
        tree.append_child(body, k).unwrap();
    }
    let before: Vec<NodeId> = tree.children(body).to_vec();
    let indices: Vec<Option<usize>> = kids.iter().map(|&k| tree.index_in_parent(k)).collect();

    let x = tree.create_element(doc, "x");
    tree.insert_before(body, x, Some(kids[2])).unwrap();
    assert_eq!(tree.index_in_parent(x), Some(2));
    assert_eq!(tree.index_in_parent(kids[3]), Some(4));
    tree.remove_child(body, x).unwrap();

    assert_eq!(tree.children(body), before.as_slice());
    let after: Vec<Option<usize>> = kids.iter().map(|&k| tree.index_in_parent(k)).collect();
    assert_eq!(indices, after);
    assert!(tree.check_tree_invariants());
}

#[test]
fn test_removal_errors() {
    let (mut tree, doc, body) = document();
    let stranger = tree.create_element(doc, "div");
    let text = tree.create_text(doc, "t");
    assert_eq!(tree.remove_child(body, stranger), Err(DomError::NotFound));
    assert_eq!(tree.remove_child(text, stranger), Err(DomError::NotFound));
    assert_eq!(tree.replace_child(body, text, stranger), Err(DomError::NotFound));
    assert_eq!(tree.insert_before(body, text, Some(stranger)), Err(DomError::NotFound));
}

// ============================================================================
// RANGE ORDERING ACROSS MUTATIONS
// ============================================================================

#[test]
fn test_ranges_stay_ordered() {
    let (mut tree, doc, body) = document();
    let p1 = tree.create_element(doc, "p");
    let p2 = tree.create_element(doc, "p");
    let t1 = tree.create_text(doc, "hello world");
    let t2 = tree.create_text(doc, "second para");
    let t3 = tree.create_text(doc, "tail");
    tree.append_child(body, p1).unwrap();
    tree.append_child(body, p2).unwrap();
    tree.append_child(body, t3).unwrap();
    tree.append_child(p1, t1).unwrap();
    tree.append_child(p2, t2).unwrap();

    let ranges = [
        tree.create_range_at(t1, 2, t2, 4).unwrap(),
        tree.create_range_at(t2, 1, t3, 2).unwrap(),
        tree.create_range_at(p2, 1, p2, 1).unwrap(),
        tree.create_range_at(body, 0, body, 3).unwrap(),
    ];
    let check = |tree: &DomTree| {
        for &id in &ranges {
            assert_ordered(tree, id);
        }
        assert!(tree.check_tree_invariants());
    };

    tree.insert_data(t1, 0, "xx").unwrap();
    check(&tree);
    tree.delete_data(t2, 0, 5).unwrap();
    check(&tree);
    tree.split_text(t1, 4).unwrap();
    check(&tree);

    tree.remove_child(body, p2).unwrap();
    check(&tree);
    assert_eq!(bounds(&tree, ranges[0]).1, BoundaryPoint::new(body, 1));
    assert_eq!(
        bounds(&tree, ranges[2]),
        (BoundaryPoint::new(body, 1), BoundaryPoint::new(body, 1))
    );
    assert_eq!(bounds(&tree, ranges[3]).1, BoundaryPoint::new(body, 2));

    tree.insert_before(body, p2, Some(t3)).unwrap();
    check(&tree);
    tree.normalize(body).unwrap();
    check(&tree);

    let new_p = tree.create_element(doc, "p");
    tree.replace_child(body, new_p, p1).unwrap();
    check(&tree);
    assert_eq!(bounds(&tree, ranges[0]).0, BoundaryPoint::new(body, 0));
}

// ============================================================================
// GRAVITY
// ============================================================================

/// body > [a > [ta], section > div > [t], b]
fn gravity_tree() -> (DomTree, [NodeId; 7]) {
    let (mut tree, doc, body) = document();
    let a = tree.create_element(doc, "a");
    let ta = tree.create_text(doc, "anchor");
    let section = tree.create_element(doc, "section");
    let div = tree.create_element(doc, "div");
    let t = tree.create_text(doc, "abcdef");
    let b = tree.create_element(doc, "b");
    tree.append_child(body, a).unwrap();
    tree.append_child(a, ta).unwrap();
    tree.append_child(body, section).unwrap();
    tree.append_child(section, div).unwrap();
    tree.append_child(div, t).unwrap();
    tree.append_child(body, b).unwrap();
    (tree, [body, a, ta, section, div, t, b])
}

#[test]
fn test_non_ancestor_removal_is_noop() {
    let (mut tree, [body, a, _ta, _section, _div, t, b]) = gravity_tree();
    let id = tree.create_range_at(t, 1, t, 4).unwrap();

    tree.remove_child(body, b).unwrap();
    tree.remove_child(body, a).unwrap();
    assert_eq!(bounds(&tree, id), (BoundaryPoint::new(t, 1), BoundaryPoint::new(t, 4)));
    assert_eq!(tree.range_to_string(id).unwrap(), "bcd");
}

#[test]
fn test_ancestor_removal_repositions() {
    let (mut tree, [body, _a, ta, section, _div, t, _b]) = gravity_tree();
    let inside = tree.create_range_at(t, 1, t, 4).unwrap();
    let across = tree.create_range_at(ta, 1, t, 3).unwrap();

    tree.remove_child(body, section).unwrap();
    assert_eq!(bounds(&tree, inside), (BoundaryPoint::new(body, 1), BoundaryPoint::new(body, 1)));
    assert!(tree.range(inside).unwrap().collapsed());
    assert_eq!(bounds(&tree, across), (BoundaryPoint::new(ta, 1), BoundaryPoint::new(body, 1)));
    assert_eq!(tree.range_to_string(across).unwrap(), "nchor");
}

#[test]
fn test_disabled_gravity_dangles() {
    let (mut tree, [body, _a, _ta, section, _div, t, _b]) = gravity_tree();
    let id = tree.create_range_at(t, 1, t, 4).unwrap();
    tree.set_gravity(id, false).unwrap();

    tree.remove_child(body, section).unwrap();
    assert_eq!(bounds(&tree, id), (BoundaryPoint::new(t, 1), BoundaryPoint::new(t, 4)));
    assert!(tree.range_is_dangling(id));
    assert_eq!(tree.compare_point(id, body, 0), Err(DomError::WrongDocument));
    assert_eq!(tree.is_point_in_range(id, body, 0), Ok(false));
    assert_eq!(tree.intersects_node(id, body), Ok(false));

    tree.set_start(id, body, 0).unwrap();
    assert!(!tree.range_is_dangling(id));
    assert_eq!(bounds(&tree, id), (BoundaryPoint::new(body, 0), BoundaryPoint::new(body, 0)));
}

// ============================================================================
// SELECTION INDEX
// ============================================================================

#[test]
fn test_selection_index_survives_partial_unregistration() {
    let (mut tree, doc, body) = document();
    let mut texts = Vec::new();
    for content in ["aaaa", "bbbb", "cccc"] {
        let p = tree.create_element(doc, "p");
        let text = tree.create_text(doc, content);
        tree.append_child(p, text).unwrap();
        tree.append_child(body, p).unwrap();
        texts.push(text);
    }
    let [t1, t2, t3] = [texts[0], texts[1], texts[2]];

    let keep = tree.create_range_at(t1, 1, t2, 2).unwrap();
    let others = [
        tree.create_range_at(t1, 0, t3, 4).unwrap(),
        tree.create_range_at(t1, 3, t3, 1).unwrap(),
        tree.create_range_at(t2, 0, t3, 2).unwrap(),
    ];
    tree.set_in_selection(keep, true).unwrap();
    for &id in &others {
        tree.set_in_selection(id, true).unwrap();
    }
    assert_eq!(tree.registered_ranges(body).len(), 4);
    assert!(tree.is_node_selected(t3, 0, 4));

    for &id in &others {
        tree.set_in_selection(id, false).unwrap();
    }
    assert_eq!(tree.registered_ranges(body), &[keep]);

    assert!(tree.is_node_selected(t1, 1, 2));
    assert!(tree.is_node_selected(t2, 0, 2));
    assert!(!tree.is_node_selected(t1, 0, 1));
    assert!(!tree.is_node_selected(t2, 2, 4));
    assert!(!tree.is_node_selected(t3, 0, 4));
}

#[test]
fn test_selection_follows_range_moves() {
    let (mut tree, doc, body) = document();
    let p = tree.create_element(doc, "p");
    let text = tree.create_text(doc, "abcdef");
    tree.append_child(body, p).unwrap();
    tree.append_child(p, text).unwrap();

    let id = tree.create_range_at(text, 1, text, 3).unwrap();
    tree.set_in_selection(id, true).unwrap();
    assert_eq!(tree.registered_ranges(text), &[id]);

    // the selected text moves out as the node is split
    let tail = tree.split_text(text, 2).unwrap();
    assert_eq!(tree.registered_ranges(p), &[id]);
    assert!(tree.registered_ranges(text).is_empty());
    assert!(tree.is_node_selected(tail, 0, 1));
    assert!(!tree.is_node_selected(tail, 1, 4));

    tree.destroy_range(id).unwrap();
    assert!(tree.registered_ranges(p).is_empty());
    assert!(!tree.is_node_selected(text, 0, 2));
}

// ============================================================================
// NORMALIZE
// ============================================================================

#[test]
fn test_normalize_drops_empty_text() {
    let (mut tree, doc, body) = document();
    let div = tree.create_element(doc, "div");
    let a = tree.create_text(doc, "ab");
    let b = tree.create_text(doc, "");
    tree.append_child(body, div).unwrap();
    tree.append_child(div, a).unwrap();
    tree.append_child(div, b).unwrap();
    let id = tree.create_range_at(div, 0, div, 2).unwrap();

    tree.normalize(div).unwrap();
    assert_eq!(tree.children(div), &[a]);
    assert_eq!(bounds(&tree, id), (BoundaryPoint::new(div, 0), BoundaryPoint::new(div, 1)));
    assert_eq!(tree.range_to_string(id).unwrap(), "ab");
}

#[test]
fn test_normalize_merges_into_previous() {
    let (mut tree, doc, body) = document();
    let div = tree.create_element(doc, "div");
    let a = tree.create_text(doc, "ab");
    let b = tree.create_text(doc, "cd");
    let c = tree.create_text(doc, "ef");
    tree.append_child(body, div).unwrap();
    for node in [a, b, c] {
        tree.append_child(div, node).unwrap();
    }
    let id = tree.create_range_at(b, 1, div, 3).unwrap();

    tree.normalize(body).unwrap();
    assert_eq!(tree.children(div), &[a]);
    assert_eq!(tree.character_data(a).as_deref(), Some("abcdef"));
    assert_eq!(bounds(&tree, id), (BoundaryPoint::new(a, 3), BoundaryPoint::new(div, 1)));
    assert_eq!(tree.range_to_string(id).unwrap(), "def");
}

// ============================================================================
// DOCUMENT POSITION
// ============================================================================

#[test]
fn test_sibling_positions_are_antisymmetric() {
    let (mut tree, doc, body) = document();
    let kids: Vec<NodeId> = (0..7).map(|_| tree.create_element(doc, "span")).collect();
    for &k in &kids {
        tree.append_child(body, k).unwrap();
    }

    assert_eq!(tree.compare_document_position(kids[2], kids[5]), DocumentPosition::FOLLOWING);
    assert_eq!(tree.compare_document_position(kids[5], kids[2]), DocumentPosition::PRECEDING);

    for (i, &x) in kids.iter().enumerate() {
        for (j, &y) in kids.iter().enumerate() {
            let forward = tree.compare_document_position(x, y);
            let backward = tree.compare_document_position(y, x);
            if i == j {
                assert!(forward.is_empty());
            } else {
                assert_eq!(
                    forward.contains(DocumentPosition::FOLLOWING),
                    backward.contains(DocumentPosition::PRECEDING)
                );
                assert_eq!(forward.contains(DocumentPosition::FOLLOWING), i < j);
            }
        }
    }
}

#[test]
fn test_nested_positions() {
    let (mut tree, doc, body) = document();
    let outer = tree.create_element(doc, "div");
    let inner = tree.create_text(doc, "x");
    tree.append_child(body, outer).unwrap();
    tree.append_child(outer, inner).unwrap();

    assert_eq!(
        tree.compare_document_position(inner, body),
        DocumentPosition::PRECEDING | DocumentPosition::CONTAINS
    );
    assert_eq!(
        tree.compare_document_position(body, inner),
        DocumentPosition::FOLLOWING | DocumentPosition::CONTAINED_BY
    );
    assert_eq!(tree.compare_points(body, 1, inner, 0), Some(Ordering::Greater));
    assert_eq!(tree.compare_points(body, 0, inner, 1), Some(Ordering::Less));
}

// ============================================================================
// FRAGMENTS
// ============================================================================

fn fragment_of(tree: &mut DomTree, doc: NodeId) -> (NodeId, [NodeId; 3]) {
    let frag = tree.create_document_fragment(doc);
    let e1 = tree.create_element(doc, "e1");
    let t1 = tree.create_text(doc, "t1");
    let e2 = tree.create_element(doc, "e2");
    for node in [e1, t1, e2] {
        tree.append_child(frag, node).unwrap();
    }
    (frag, [e1, t1, e2])
}

#[test]
fn test_fragment_rejected_by_document() {
    init_tracing();
    let mut tree = DomTree::new();
    let doc = tree.create_document();
    let (frag, kids) = fragment_of(&mut tree, doc);

    assert_eq!(tree.append_child(doc, frag), Err(DomError::HierarchyRequest));
    assert_eq!(tree.children(frag), &kids);
    assert!(tree.children(doc).is_empty());

    // two elements are rejected even without the text node
    let pair = tree.create_document_fragment(doc);
    let x = tree.create_element(doc, "x");
    let y = tree.create_element(doc, "y");
    tree.append_child(pair, x).unwrap();
    tree.append_child(pair, y).unwrap();
    assert_eq!(tree.append_child(doc, pair), Err(DomError::HierarchyRequest));

    let single = tree.create_document_fragment(doc);
    let comment = tree.create_comment(doc, "c");
    let root = tree.create_element(doc, "html");
    tree.append_child(single, comment).unwrap();
    tree.append_child(single, root).unwrap();
    tree.append_child(doc, single).unwrap();
    assert_eq!(tree.children(doc), &[comment, root]);
    assert_eq!(tree.document_element(doc), Some(root));
}

#[test]
fn test_fragment_append_is_one_record() {
    let (mut tree, doc, body) = document();
    let div = tree.create_element(doc, "div");
    let existing = tree.create_element(doc, "p");
    tree.append_child(body, div).unwrap();
    tree.append_child(div, existing).unwrap();
    let (frag, kids) = fragment_of(&mut tree, doc);

    let recorder = Rc::new(RefCell::new(MutationRecorder::new()));
    recorder
        .borrow_mut()
        .observe(div, MutationObserverInit { child_list: true, ..Default::default() });
    tree.add_listener(recorder.clone());

    tree.append_child(div, frag).unwrap();
    assert_eq!(tree.children(div), &[existing, kids[0], kids[1], kids[2]]);
    assert!(tree.children(frag).is_empty());

    let records = recorder.borrow_mut().take_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].mutation_type, MutationType::ChildAppended);
    assert_eq!(records[0].added_nodes, kids.to_vec());
    assert_eq!(records[0].index, 1);
    assert_eq!(records[0].previous_sibling, Some(existing));
}

#[test]
fn test_fragment_insert_in_middle_is_positional() {
    let (mut tree, doc, body) = document();
    let anchor = tree.create_element(doc, "p");
    tree.append_child(body, anchor).unwrap();
    let (frag, kids) = fragment_of(&mut tree, doc);
    let id = tree.create_range_at(body, 0, body, 1).unwrap();

    let recorder = Rc::new(RefCell::new(MutationRecorder::new()));
    recorder
        .borrow_mut()
        .observe(body, MutationObserverInit { child_list: true, ..Default::default() });
    tree.add_listener(recorder.clone());

    tree.insert_before(body, frag, Some(anchor)).unwrap();
    assert_eq!(tree.children(body), &[kids[0], kids[1], kids[2], anchor]);

    let records = recorder.borrow().records().to_vec();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.mutation_type == MutationType::ChildInserted));
    assert_eq!(records.iter().map(|r| r.index).collect::<Vec<_>>(), vec![0, 1, 2]);

    // insertion at offset 0 leaves the start in front of the new nodes
    assert_eq!(bounds(&tree, id), (BoundaryPoint::new(body, 0), BoundaryPoint::new(body, 4)));
}

// ============================================================================
// RANGE CONTENT OPERATIONS
// ============================================================================

/// body > [t1("hello"), em > [t_em("mid")], t3("tail")]
fn inline_run(tree: &mut DomTree, doc: NodeId, body: NodeId) -> [NodeId; 4] {
    let t1 = tree.create_text(doc, "hello");
    let em = tree.create_element(doc, "em");
    let t_em = tree.create_text(doc, "mid");
    let t3 = tree.create_text(doc, "tail");
    tree.append_child(body, t1).unwrap();
    tree.append_child(body, em).unwrap();
    tree.append_child(em, t_em).unwrap();
    tree.append_child(body, t3).unwrap();
    [t1, em, t_em, t3]
}

#[test]
fn test_extract_keeps_selection_consistent() {
    let (mut tree, doc, body) = document();
    let [t1, em, t_em, t3] = inline_run(&mut tree, doc, body);

    let selected = tree.create_range_at(t1, 0, t3, 4).unwrap();
    tree.set_in_selection(selected, true).unwrap();
    let nested = tree.create_range_at(t_em, 1, t_em, 3).unwrap();
    tree.set_in_selection(nested, true).unwrap();
    assert_eq!(tree.registered_ranges(body), &[selected]);
    assert_eq!(tree.registered_ranges(t_em), &[nested]);

    let cut = tree.create_range_at(t1, 2, t3, 1).unwrap();
    let fragment = tree.extract_contents(cut).unwrap();
    assert_eq!(tree.parent(em), Some(fragment));

    // the nested range left with its element and re-registered on body
    assert_eq!(
        bounds(&tree, nested),
        (BoundaryPoint::new(body, 1), BoundaryPoint::new(body, 1))
    );
    assert!(tree.registered_ranges(t_em).is_empty());
    assert!(!tree.get(em).unwrap().is_selection_descendant());
    assert!(!tree.get(t_em).unwrap().is_selection_descendant());

    assert_eq!(tree.range_to_string(selected).unwrap(), "heail");
    assert!(tree.is_node_selected(t3, 0, 1));
    for id in [selected, nested, cut] {
        assert_ordered(&tree, id);
    }
    assert!(tree.check_tree_invariants());
}

#[test]
fn test_clone_then_delete_round_trip() {
    let (mut tree, doc, body) = document();
    let [t1, em, _t_em, t3] = inline_run(&mut tree, doc, body);
    let id = tree.create_range_at(t1, 1, t3, 3).unwrap();

    let copy = tree.clone_contents(id).unwrap();
    let before = tree.range_to_string(id).unwrap();
    tree.delete_contents(id).unwrap();
    assert_eq!(tree.children(body), &[t1, t3]);
    assert_eq!(tree.parent(em), None);

    // the copy holds what was deleted
    let whole = tree.create_range();
    tree.select_node_contents(whole, copy).unwrap();
    assert_eq!(tree.range_to_string(whole).unwrap(), before);
    assert_eq!(before, "ellomidtai");
}
