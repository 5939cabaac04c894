mod helpers;

use helpers::{insert_memory, test_db, test_embedding};

use engram::error::EngramError;
use engram::memory::store::{add_memory, count_memories, delete_memory, get_memory, list_memories};
use engram::memory::types::{NewMemory, Source};
use std::sync::{Arc, Mutex};

#[test]
fn add_get_delete_roundtrip() {
    let mut conn = test_db();
    let id = insert_memory(&mut conn, "Round trip content for the store", &test_embedding(0));

    let record = get_memory(&conn, &id).unwrap();
    assert_eq!(record.content, "Round trip content for the store");
    assert_eq!(record.source, Source::Manual);

    delete_memory(&mut conn, &id).unwrap();
    assert!(matches!(get_memory(&conn, &id), Err(EngramError::NotFound(_))));
}

#[test]
fn delete_unknown_id_reports_not_found_without_side_effects() {
    let mut conn = test_db();
    insert_memory(&mut conn, "Survivor record", &test_embedding(0));

    let result = delete_memory(&mut conn, "no-such-id");
    assert!(matches!(result, Err(EngramError::NotFound(_))));
    assert_eq!(count_memories(&conn, true).unwrap(), 1);
}

#[test]
fn concurrent_adds_get_distinct_ids() {
    let conn = Arc::new(Mutex::new(test_db()));
    let mut handles = Vec::new();

    for worker in 0..4 {
        let conn = Arc::clone(&conn);
        handles.push(std::thread::spawn(move || {
            let mut ids = Vec::new();
            for i in 0..10 {
                let mut guard = conn.lock().unwrap();
                let result = add_memory(
                    &mut guard,
                    NewMemory::new(
                        format!("concurrent entry {worker}-{i}"),
                        Source::Manual,
                    ),
                    &test_embedding(worker * 10 + i),
                )
                .unwrap();
                ids.push(result.id);
            }
            ids
        }));
    }

    let mut all_ids = std::collections::HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(all_ids.insert(id), "duplicate id issued under concurrency");
        }
    }
    assert_eq!(all_ids.len(), 40);
}

#[test]
fn list_pagination_math() {
    let mut conn = test_db();
    for i in 0..7 {
        insert_memory(&mut conn, &format!("page entry {i}"), &test_embedding(i));
    }

    let (page, total) = list_memories(&conn, 2, 3, false).unwrap();
    assert_eq!(total, 7);
    assert_eq!(page.len(), 3);

    let (last, _) = list_memories(&conn, 3, 3, false).unwrap();
    assert_eq!(last.len(), 1);
}
