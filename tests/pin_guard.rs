use rehash_dict::{Dict, IntKeys};

fn filled(n: u32) -> Dict<u32, (), IntKeys> {
    let mut d = Dict::with_type(IntKeys, ());
    for k in 0..n {
        d.insert_raw(k).unwrap();
    }
    d
}

#[test]
fn open_and_close_is_ok() {
    let d = filled(4);
    let it = d.safe_iter();
    assert_eq!(d.safe_iterators(), 1);
    it.close();
    assert_eq!(d.safe_iterators(), 0);
}

#[test]
fn safe_iterator_released_during_unwind() {
    let d = filled(16);
    let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let mut it = d.safe_iter();
        let _ = it.next_entry(&d);
        assert_eq!(d.safe_iterators(), 1);
        panic!("caller bailed out mid-traversal");
    }));
    assert!(res.is_err());
    assert_eq!(d.safe_iterators(), 0);
}

#[test]
fn dropped_safe_iterator_unpins_dict() {
    let mut d = filled(16);
    {
        let mut it = d.safe_iter();
        let _ = it.next_entry(&d);
        assert_eq!(d.safe_iterators(), 1);
    }
    assert_eq!(d.safe_iterators(), 0);
    // Migration resumes once unpinned.
    while d.rehash(1) {}
    d.expand(256).unwrap();
    let before = d.table_used(0);
    let _ = d.find(&0);
    assert!(d.table_used(0) < before);
}
