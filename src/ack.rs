use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// The two acknowledgment flags of the link. Each flag keeps its own
/// guard; a read of one flag is valid only at the instant it is taken.
pub struct AckState {
    received: Mutex<bool>,
    received_cond: Condvar,
    send_requested: Mutex<bool>,
    send_cond: Condvar,
}

impl AckState {
    pub fn new() -> Self {
        Self {
            received: Mutex::new(false),
            received_cond: Condvar::new(),
            send_requested: Mutex::new(false),
            send_cond: Condvar::new(),
        }
    }

    pub fn set_received(&self) {
        *self.received.lock().unwrap() = true;
        self.received_cond.notify_all();
    }

    pub fn clear_received(&self) {
        *self.received.lock().unwrap() = false;
    }

    /// Waits until "ACK received" is set or the timeout expires.
    /// Returns whether the flag was observed set.
    pub fn wait_received(&self, timeout: Duration) -> bool {
        let guard = self.received.lock().unwrap();
        let (flag, _) = self
            .received_cond
            .wait_timeout_while(guard, timeout, |received| !*received)
            .unwrap();
        *flag
    }

    pub fn request_send(&self) {
        *self.send_requested.lock().unwrap() = true;
        self.send_cond.notify_one();
    }

    /// Waits until an ACK transmission is requested or the timeout
    /// expires; a granted request is cleared before returning.
    pub fn take_send_request(&self, timeout: Duration) -> bool {
        let guard = self.send_requested.lock().unwrap();
        let (mut flag, _) = self
            .send_cond
            .wait_timeout_while(guard, timeout, |requested| !*requested)
            .unwrap();

        let granted = *flag;
        *flag = false;
        granted
    }
}

impl Default for AckState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_send_request_is_cleared_once_taken() {
        let ack = AckState::new();

        ack.request_send();
        assert!(ack.take_send_request(Duration::from_millis(1)));
        assert!(!ack.take_send_request(Duration::from_millis(1)));
    }

    #[test]
    fn test_wait_received_times_out_when_unset() {
        let ack = AckState::new();
        assert!(!ack.wait_received(Duration::from_millis(5)));
    }

    #[test]
    fn test_wait_received_wakes_on_set() {
        let ack = Arc::new(AckState::new());

        let ack_clone = ack.clone();
        let setter = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            ack_clone.set_received();
        });

        assert!(ack.wait_received(Duration::from_secs(1)));
        setter.join().unwrap();
    }
}
