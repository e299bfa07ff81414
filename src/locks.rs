use std::sync::Arc;

use dashmap::DashMap;
use teloxide::types::ChatId;
use tokio::sync::Mutex;

/// One async mutex per chat. Every read-modify-write of a chat's dialogue
/// state happens under it, so a finished model request and a fresh user
/// message never overwrite each other.
///
/// Entries live as long as the process, like the dialogues in `InMemStorage`.
/// A lock is never removed while a task could still hold a clone of it.
#[derive(Default)]
pub struct ChatLocks {
    locks: DashMap<ChatId, Arc<Mutex<()>>>,
}

impl ChatLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, chat_id: ChatId) -> Arc<Mutex<()>> {
        self.locks.entry(chat_id).or_default().clone()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_chat_shares_a_lock() {
        let locks = ChatLocks::new();
        let a = locks.get(ChatId(1));
        let b = locks.get(ChatId(1));
        let c = locks.get(ChatId(2));
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn lock_serializes_access() {
        let locks = ChatLocks::new();
        let lock = locks.get(ChatId(7));
        let guard = lock.lock().await;
        assert!(locks.get(ChatId(7)).try_lock().is_err());
        drop(guard);
        assert!(locks.get(ChatId(7)).try_lock().is_ok());
    }

    #[tokio::test]
    async fn concurrent_lookups_agree_on_one_lock() {
        let locks = Arc::new(ChatLocks::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let locks = Arc::clone(&locks);
                tokio::spawn(async move { locks.get(ChatId(i % 2)) })
            })
            .collect();

        let mut seen = Vec::new();
        for handle in handles {
            seen.push(handle.await.unwrap());
        }
        assert_eq!(locks.len(), 2);
        assert!(seen.iter().all(|l| Arc::ptr_eq(l, &locks.get(ChatId(0))) || Arc::ptr_eq(l, &locks.get(ChatId(1)))));
    }
}
