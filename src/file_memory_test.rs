use super::*;
use tempfile::tempdir;

fn conf() -> TreeConf {
    TreeConf {
        page_size: 128,
        order: 4,
        key_size: 8,
        value_size: 16,
        cache_size: 4,
    }
}

#[test]
fn fresh_open_creates_lonely_root() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.db");
    let (mut fm, root_page) = FileMemory::open(&path, conf()).unwrap();
    assert_eq!(root_page, 1);
    let node = fm.get_node(root_page).unwrap();
    assert!(matches!(node, Node::LonelyRoot { .. }));
}

#[test]
fn set_node_then_commit_then_reopen_is_durable() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.db");
    let page;
    {
        let (mut fm, root_page) = FileMemory::open(&path, conf()).unwrap();
        page = root_page;
        let mut node = fm.get_node(page).unwrap();
        node.insert_record(crate::entry::Record::new_inline(b"a".to_vec(), b"1".to_vec()))
            .unwrap();
        fm.set_node(&node).unwrap();
        fm.commit().unwrap();
        fm.close().unwrap();
    }
    let (mut fm, root_page) = FileMemory::open(&path, conf()).unwrap();
    assert_eq!(root_page, page);
    let node = fm.get_node(root_page).unwrap();
    assert_eq!(node.records()[0].key, b"a");
}

#[test]
fn rollback_discards_uncommitted_writes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.db");
    let (mut fm, root_page) = FileMemory::open(&path, conf()).unwrap();
    let mut node = fm.get_node(root_page).unwrap();
    node.insert_record(crate::entry::Record::new_inline(b"x".to_vec(), b"1".to_vec()))
        .unwrap();
    fm.set_node(&node).unwrap();
    fm.rollback().unwrap();
    let reloaded = fm.get_node(root_page).unwrap();
    assert!(reloaded.records().is_empty());
}

#[test]
fn next_available_page_grows_monotonically_without_freelist() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.db");
    let (mut fm, _root) = FileMemory::open(&path, conf()).unwrap();
    let a = fm.next_available_page().unwrap();
    let b = fm.next_available_page().unwrap();
    assert_eq!(b, a + 1);
}

#[test]
fn freed_pages_are_reused_before_growing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.db");
    let (mut fm, _root) = FileMemory::open(&path, conf()).unwrap();
    let page = fm.next_available_page().unwrap();
    fm.free_page(page).unwrap();
    fm.commit().unwrap();
    let reused = fm.next_available_page().unwrap();
    assert_eq!(reused, page);
}

#[test]
fn freeing_a_page_persists_the_freelist_head_to_metadata_on_commit() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.db");
    let (mut fm, _root) = FileMemory::open(&path, conf()).unwrap();
    let page = fm.next_available_page().unwrap();
    fm.commit().unwrap();
    fm.free_page(page).unwrap();
    fm.commit().unwrap();
    let (_, _, freelist_head) = fm.get_metadata().unwrap();
    assert_eq!(freelist_head, page);
}

#[test]
fn freelist_head_survives_reopen_with_no_intervening_root_change() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.db");
    let page;
    {
        let (mut fm, _root) = FileMemory::open(&path, conf()).unwrap();
        page = fm.next_available_page().unwrap();
        fm.commit().unwrap();
        // Freeing this page never touches the root page, so only a commit
        // (not a `set_metadata` call) can persist the new free-list head.
        fm.free_page(page).unwrap();
        fm.commit().unwrap();
        fm.close().unwrap();
    }
    let (mut fm, _root) = FileMemory::open(&path, conf()).unwrap();
    let reused = fm.next_available_page().unwrap();
    assert_eq!(reused, page);
}
