//! Ordering and pagination properties of the in-memory message store

use std::sync::Arc;

use proptest::prelude::*;
use vms_chat::backend::messaging::{MemoryMessageStore, MessageStore};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn paging_returns_every_message_once_in_order(count in 0usize..40, limit in 1usize..10) {
        let collected = runtime().block_on(async {
            let store = MemoryMessageStore::new();
            for i in 0..count {
                store.append("alice_bob", "alice", &format!("m{}", i), &[]).await.unwrap();
            }

            let mut collected = Vec::new();
            let mut cursor = None;
            loop {
                let page = store.list("alice_bob", cursor, limit).await.unwrap();
                assert!(page.messages.len() <= limit);
                collected.extend(page.messages.into_iter().map(|m| m.sequence));
                match page.next_cursor {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
            collected
        });

        let expected: Vec<i64> = (1..=count as i64).collect();
        prop_assert_eq!(collected, expected);
    }

    #[test]
    fn concurrent_senders_get_a_total_order(senders in 2usize..6, per_sender in 1usize..8) {
        let messages = runtime().block_on(async {
            let store = Arc::new(MemoryMessageStore::new());
            let mut handles = Vec::new();
            for sender in 0..senders {
                let store = store.clone();
                handles.push(tokio::spawn(async move {
                    for i in 0..per_sender {
                        store
                            .append("group", &format!("s{}", sender), &format!("{}", i), &[])
                            .await
                            .unwrap();
                    }
                }));
            }
            for handle in handles {
                handle.await.unwrap();
            }
            store.list("group", None, 1000).await.unwrap().messages
        });

        prop_assert_eq!(messages.len(), senders * per_sender);
        for pair in messages.windows(2) {
            prop_assert_eq!(pair[1].sequence, pair[0].sequence + 1);
            prop_assert!(pair[1].sent_at >= pair[0].sent_at);
        }
    }
}
