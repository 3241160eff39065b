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
fn write_transaction_commit_persists() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.db");
    let (fm, root_page) = FileMemory::open(&path, conf()).unwrap();
    let lock = RwLock::new(fm);

    {
        let mut wtx = WriteTransaction::begin(&lock);
        let mut node = wtx.get_node(root_page).unwrap();
        node.insert_record(crate::entry::Record::new_inline(b"a".to_vec(), b"1".to_vec()))
            .unwrap();
        wtx.set_node(&node).unwrap();
        wtx.commit().unwrap();
    }

    let rtx = ReadTransaction::begin(&lock);
    let node = rtx.get_node(root_page).unwrap();
    assert_eq!(node.records()[0].key, b"a");
}

#[test]
fn dropped_write_transaction_rolls_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.db");
    let (fm, root_page) = FileMemory::open(&path, conf()).unwrap();
    let lock = RwLock::new(fm);

    {
        let mut wtx = WriteTransaction::begin(&lock);
        let mut node = wtx.get_node(root_page).unwrap();
        node.insert_record(crate::entry::Record::new_inline(b"a".to_vec(), b"1".to_vec()))
            .unwrap();
        wtx.set_node(&node).unwrap();
        // wtx dropped here without commit: should roll back.
    }

    let rtx = ReadTransaction::begin(&lock);
    let node = rtx.get_node(root_page).unwrap();
    assert!(node.records().is_empty());
}
