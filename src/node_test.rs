use super::*;
use crate::entry::{Record, Reference};

fn conf() -> TreeConf {
    TreeConf {
        page_size: 256,
        order: 4,
        key_size: 8,
        value_size: 16,
        cache_size: 0,
    }
}

#[test]
fn lonely_root_round_trips_through_bytes() {
    let conf = conf();
    let mut node = Node::empty_lonely_root(0);
    node.insert_record(Record::new_inline(b"b".to_vec(), b"2".to_vec())).unwrap();
    node.insert_record(Record::new_inline(b"a".to_vec(), b"1".to_vec())).unwrap();
    let bytes = node.dump(&conf).unwrap();
    assert_eq!(bytes.len(), conf.page_size as usize);
    let loaded = Node::from_page_data(&conf, &bytes, 0).unwrap();
    assert_eq!(loaded.records()[0].key, b"a");
    assert_eq!(loaded.records()[1].key, b"b");
}

#[test]
fn leaf_preserves_next_page() {
    let conf = conf();
    let mut node = Node::empty_leaf(3);
    node.insert_record(Record::new_inline(b"k".to_vec(), b"v".to_vec())).unwrap();
    node.set_next_page(9);
    let bytes = node.dump(&conf).unwrap();
    let loaded = Node::from_page_data(&conf, &bytes, 3).unwrap();
    assert_eq!(loaded.next_page(), 9);
}

#[test]
fn internal_find_next_node_page_covers_all_bands() {
    let mut node = Node::empty_internal(1);
    node.insert_reference(Reference::new(10, b"m".to_vec(), 11)).unwrap();
    node.insert_reference(Reference::new(11, b"s".to_vec(), 12)).unwrap();
    assert_eq!(node.find_next_node_page(b"a").unwrap(), 10);
    assert_eq!(node.find_next_node_page(b"m").unwrap(), 11);
    assert_eq!(node.find_next_node_page(b"q").unwrap(), 11);
    assert_eq!(node.find_next_node_page(b"z").unwrap(), 12);
}

#[test]
fn insert_reference_repairs_neighbour_fences() {
    let mut node = Node::empty_internal(1);
    node.insert_reference(Reference::new(1, b"m".to_vec(), 2)).unwrap();
    node.insert_reference(Reference::new(2, b"s".to_vec(), 3)).unwrap();
    // inserting a fence between them should rewrite the shared page link
    node.insert_reference(Reference::new(2, b"p".to_vec(), 20)).unwrap();
    let refs = node.refs();
    assert_eq!(refs[0].after, 2);
    assert_eq!(refs[1].before, 2);
    assert_eq!(refs[1].after, 20);
    assert_eq!(refs[2].before, 20);
}

#[test]
fn min_max_children_match_node_kind() {
    let order = 4;
    assert!(Node::empty_lonely_root(0).can_add_entry(order));
    let root = Node::empty_root(0);
    assert_eq!(root.min_children(order), 2);
    let internal = Node::empty_internal(0);
    assert_eq!(internal.min_children(order), 2);
    let leaf = Node::empty_leaf(0);
    assert_eq!(leaf.min_children(order), 1);
}

#[test]
fn split_lonely_root_produces_leaf_with_promoted_key() {
    let mut node = Node::empty_lonely_root(0);
    for k in [b"a", b"b", b"c", b"d"] {
        node.insert_record(Record::new_inline(k.to_vec(), b"v".to_vec())).unwrap();
    }
    let (new_node, promoted) = node.split_entries(5);
    assert_eq!(promoted, b"c");
    assert!(matches!(new_node, Node::Leaf { .. }));
    assert_eq!(node.records().len(), 2);
    assert_eq!(new_node.records().len(), 2);
}

#[test]
fn corrupt_page_rejects_unknown_tag() {
    let conf = conf();
    let mut bytes = vec![0u8; conf.page_size as usize];
    bytes[0] = 99;
    let err = Node::from_page_data(&conf, &bytes, 0).unwrap_err();
    assert!(matches!(err, TreeError::CorruptPage { .. }));
}
