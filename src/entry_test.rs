use super::*;

#[test]
fn record_inline_round_trips() {
    let key_size = 8;
    let value_size = 16;
    let record = Record::new_inline(b"hello".to_vec(), b"world".to_vec());
    let bytes = record.dump(key_size, value_size).unwrap();
    assert_eq!(bytes.len(), record_len(key_size, value_size) as usize);
    let loaded = Record::load(&bytes, key_size, value_size).unwrap();
    assert_eq!(loaded, record);
}

#[test]
fn record_overflow_round_trips() {
    let key_size = 4;
    let value_size = 4;
    let record = Record::new_overflow(b"abcd".to_vec(), 42);
    let bytes = record.dump(key_size, value_size).unwrap();
    let loaded = Record::load(&bytes, key_size, value_size).unwrap();
    assert_eq!(loaded, record);
    match loaded.value {
        ValueLocation::Overflow(p) => assert_eq!(p, 42),
        ValueLocation::Inline(_) => panic!("expected overflow"),
    }
}

#[test]
fn record_rejects_oversized_key() {
    let record = Record::new_inline(b"too long a key".to_vec(), b"v".to_vec());
    let err = record.dump(4, 16).unwrap_err();
    assert!(matches!(err, TreeError::ValueTooLarge { which: "key", .. }));
}

#[test]
fn record_rejects_oversized_value() {
    let record = Record::new_inline(b"k".to_vec(), b"too long a value".to_vec());
    let err = record.dump(8, 4).unwrap_err();
    assert!(matches!(err, TreeError::ValueTooLarge { which: "value", .. }));
}

#[test]
fn record_ordering_is_key_only() {
    let a = Record::new_inline(b"a".to_vec(), b"zzzz".to_vec());
    let b = Record::new_inline(b"b".to_vec(), b"aaaa".to_vec());
    assert!(a < b);
}

#[test]
fn reference_round_trips() {
    let key_size = 6;
    let reference = Reference::new(1, b"middle".to_vec(), 2);
    let bytes = reference.dump(key_size).unwrap();
    assert_eq!(bytes.len(), reference_len(key_size) as usize);
    let loaded = Reference::load(&bytes, key_size).unwrap();
    assert_eq!(loaded, reference);
}

#[test]
fn reference_rejects_oversized_key() {
    let reference = Reference::new(1, b"toolongkey".to_vec(), 2);
    let err = reference.dump(4).unwrap_err();
    assert!(matches!(err, TreeError::ValueTooLarge { which: "key", .. }));
}

#[test]
fn load_rejects_truncated_buffer() {
    let bytes = vec![0u8; 3];
    let err = Record::load(&bytes, 4, 4).unwrap_err();
    assert!(matches!(err, TreeError::ReachedEndOfFile { .. }));
}
