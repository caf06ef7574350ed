//! Observable UI flags shared between features.
//!
//! A [`SharedFlag`] is cloned into every component that reads or writes
//! it. Clones share one value; independent flags are independent.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct SharedFlag {
    sender: Arc<watch::Sender<bool>>,
}

impl SharedFlag {
    pub fn new(initial: bool) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn get(&self) -> bool {
        *self.sender.borrow()
    }

    /// Returns `true` if the value changed.
    pub fn set(&self, value: bool) -> bool {
        self.sender.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        })
    }

    pub fn toggle(&self) -> bool {
        let mut now = false;
        self.sender.send_modify(|current| {
            *current = !*current;
            now = *current;
        });
        now
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

impl Default for SharedFlag {
    fn default() -> Self {
        Self::new(false)
    }
}
