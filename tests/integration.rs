use std::path::Path;

use ordkv::{repair_db, DBIterator, Env, LevelDB, MemEnv, Options, ReadOption, WriteOption};

fn open(name: &str) -> LevelDB<MemEnv> {
    let mut options = Options::default();
    options.create_if_missing = true;
    LevelDB::open(options, name, MemEnv::new()).unwrap()
}

#[test]
fn put_then_get() {
    let db = open("/put_then_get");
    db.write(b"a", b"1").unwrap();
    db.write(b"b", b"2").unwrap();

    assert_eq!(db.get(&ReadOption::default(), b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(db.get(&ReadOption::default(), b"b").unwrap(), Some(b"2".to_vec()));
    assert_eq!(db.get(&ReadOption::default(), b"c").unwrap(), None);
}

#[test]
fn overwrite_returns_latest_value() {
    let db = open("/overwrite");
    db.write(b"k", b"first").unwrap();
    db.write(b"k", b"second").unwrap();

    assert_eq!(
        db.get(&ReadOption::default(), b"k").unwrap(),
        Some(b"second".to_vec())
    );
}

#[test]
fn delete_hides_the_key() {
    let db = open("/delete");
    db.write(b"k", b"v").unwrap();
    db.delete(&WriteOption::default(), b"k").unwrap();

    assert_eq!(db.get(&ReadOption::default(), b"k").unwrap(), None);
}

#[test]
fn snapshot_sees_state_as_of_its_creation() {
    let db = open("/snapshot");
    db.write(b"k", b"before").unwrap();
    let snapshot = db.get_snapshot();
    db.write(b"k", b"after").unwrap();

    let pinned = ReadOption {
        snapshot: Some(snapshot.sequence()),
        ..ReadOption::default()
    };
    assert_eq!(db.get(&pinned, b"k").unwrap(), Some(b"before".to_vec()));
    assert_eq!(
        db.get(&ReadOption::default(), b"k").unwrap(),
        Some(b"after".to_vec())
    );
    db.release_snapshot(snapshot);
}

#[test]
fn snapshot_does_not_see_a_later_delete() {
    let db = open("/snapshot_delete");
    db.write(b"k", b"v").unwrap();
    let snapshot = db.get_snapshot();
    db.delete(&WriteOption::default(), b"k").unwrap();

    let pinned = ReadOption {
        snapshot: Some(snapshot.sequence()),
        ..ReadOption::default()
    };
    assert_eq!(db.get(&pinned, b"k").unwrap(), Some(b"v".to_vec()));
    assert_eq!(db.get(&ReadOption::default(), b"k").unwrap(), None);
}

#[test]
fn iterator_returns_live_keys_in_order() {
    let db = open("/iter_order");
    db.write(b"c", b"3").unwrap();
    db.write(b"a", b"1").unwrap();
    db.write(b"b", b"2").unwrap();
    db.delete(&WriteOption::default(), b"b").unwrap();

    let mut iter = db.new_iterator(&ReadOption::default());
    iter.seek_to_first();

    let mut seen = Vec::new();
    while iter.valid() {
        seen.push((iter.key().to_vec(), iter.value().to_vec()));
        iter.next();
    }

    assert_eq!(seen, vec![(b"a".to_vec(), b"1".to_vec()), (b"c".to_vec(), b"3".to_vec())]);
}

#[test]
fn iterator_seek_positions_at_first_key_not_less_than_target() {
    let db = open("/iter_seek");
    db.write(b"a", b"1").unwrap();
    db.write(b"c", b"3").unwrap();
    db.write(b"e", b"5").unwrap();

    let mut iter = db.new_iterator(&ReadOption::default());
    iter.seek(b"b");
    assert!(iter.valid());
    assert_eq!(iter.key(), b"c");
}

#[test]
fn recovery_replays_the_log_after_an_unclean_shutdown() {
    let env = MemEnv::new();
    let db_name = "/recovery";

    {
        let mut options = Options::default();
        options.create_if_missing = true;
        let db = LevelDB::open(options, db_name, env.clone()).unwrap();
        for i in 0..1000 {
            db.write(format!("key{:04}", i).as_bytes(), format!("value{}", i).as_bytes())
                .unwrap();
        }
        // `db` is dropped here with no explicit flush or close, simulating
        // an unclean shutdown: only the write-ahead log is durable.
    }

    let options = Options::default();
    let db = LevelDB::open(options, db_name, env.clone()).unwrap();
    for i in 0..1000 {
        let key = format!("key{:04}", i);
        assert_eq!(
            db.get(&ReadOption::default(), key.as_bytes()).unwrap(),
            Some(format!("value{}", i).into_bytes())
        );
    }

    let last_sequence: u64 = db
        .get_property("leveldb.sequence")
        .unwrap()
        .parse()
        .unwrap();
    assert!(last_sequence >= 1000);
}

#[test]
fn repair_reconstructs_a_manifest_after_it_is_lost() {
    let env = MemEnv::new();
    let db_name = "/repair";

    {
        let mut options = Options::default();
        options.create_if_missing = true;
        let db = LevelDB::open(options, db_name, env.clone()).unwrap();
        for i in 0..50 {
            db.write(format!("k{:02}", i).as_bytes(), format!("v{}", i).as_bytes())
                .unwrap();
        }
    }

    let db_path = Path::new(db_name);
    let mut children = Vec::new();
    env.get_children(db_path, &mut children).unwrap();

    // The unflushed writes above only ever made it to the write-ahead log;
    // repair replays it into a table and archives the log itself, which is
    // how we confirm originals land under lost/ once CURRENT/MANIFEST-*
    // are gone.
    let logs: Vec<String> = children.iter().filter(|n| n.ends_with(".log")).cloned().collect();
    assert!(!logs.is_empty(), "expected at least one WAL file before repair");

    let manifests: Vec<String> = children
        .into_iter()
        .filter(|name| name == "CURRENT" || name.starts_with("MANIFEST-"))
        .collect();
    assert!(!manifests.is_empty(), "expected a CURRENT file and at least one manifest");
    for name in &manifests {
        env.delete_file(&db_path.join(name)).unwrap();
    }

    repair_db(db_name, Options::default(), env.clone()).unwrap();

    for name in &logs {
        assert!(
            env.file_exists(&db_path.join("lost").join(name)),
            "expected original {} to be archived under lost/",
            name
        );
    }
    assert!(env.file_exists(&db_path.join("CURRENT")));

    let options = Options::default();
    let db = LevelDB::open(options, db_name, env.clone()).unwrap();
    for i in 0..50 {
        let key = format!("k{:02}", i);
        assert_eq!(
            db.get(&ReadOption::default(), key.as_bytes()).unwrap(),
            Some(format!("v{}", i).into_bytes())
        );
    }
}
