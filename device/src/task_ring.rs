// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The device-side outbound task ring: a fixed ring of four transmit
//! slots, strictly FIFO, so bytes reach the host in increasing address
//! order regardless of how `handle_events` interleaves filling and
//! draining them.

use qiprog_transport::DeviceTransport;

/// Number of transmit task slots. Fixed by the data model; not meant to be
/// tuned per backend.
pub const TASK_RING_LEN: usize = 4;
/// Capacity of one task's packet buffer. Matches the control-transfer
/// scratch buffer size; a backend advertising a larger `max_tx_packet`
/// than this is a configuration bug.
pub const TASK_BUF_LEN: usize = qiprog_protocol::SCRATCH_BUF_LEN;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum TaskState {
    Idle,
    ReadySend,
}

#[derive(Copy, Clone)]
struct Task {
    state: TaskState,
    buf: [u8; TASK_BUF_LEN],
    len: usize,
}

impl Default for Task {
    fn default() -> Self {
        Task { state: TaskState::Idle, buf: [0; TASK_BUF_LEN], len: 0 }
    }
}

/// A ring of [`TASK_RING_LEN`] tasks. `head` is the next slot to send;
/// filling always happens `pending` slots ahead of `head`, so slots are
/// drained in exactly the order they were filled.
pub struct TaskRing {
    tasks: [Task; TASK_RING_LEN],
    head: usize,
    pending: usize,
}

impl Default for TaskRing {
    fn default() -> Self {
        TaskRing { tasks: [Task::default(); TASK_RING_LEN], head: 0, pending: 0 }
    }
}

impl TaskRing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether every slot currently holds unsent data.
    pub fn is_full(&self) -> bool {
        self.pending == TASK_RING_LEN
    }

    pub fn is_empty(&self) -> bool {
        self.pending == 0
    }

    /// Fill the next free slot with `data` and mark it `ReadySend`.
    /// `data.len()` must not exceed [`TASK_BUF_LEN`]. Returns `false`
    /// (backpressure) if every slot already holds unsent data.
    pub fn fill(&mut self, data: &[u8]) -> bool {
        if self.is_full() {
            return false;
        }
        let idx = (self.head + self.pending) % TASK_RING_LEN;
        let task = &mut self.tasks[idx];
        task.buf[..data.len()].copy_from_slice(data);
        task.len = data.len();
        task.state = TaskState::ReadySend;
        self.pending += 1;
        true
    }

    /// Attempt to hand the head task's packet to `transport`. If the
    /// transport reports the full packet sent, idles the task and advances
    /// the head, returning the number of bytes sent.
    ///
    /// A head task that is `Idle` (nothing queued) is a no-op, not an
    /// error: the event loop calls this unconditionally every tick.
    pub fn try_send(&mut self, transport: &mut impl DeviceTransport) -> Option<usize> {
        let task = &mut self.tasks[self.head];
        if task.state != TaskState::ReadySend {
            return None;
        }
        let sent = transport.send_packet(&task.buf[..task.len]);
        if sent != task.len {
            // `0` means "try again later"; anything else would violate the
            // atomic-packet contract and is treated the same way here,
            // since this ring has no way to report a transport error.
            return None;
        }
        task.state = TaskState::Idle;
        task.len = 0;
        self.head = (self.head + 1) % TASK_RING_LEN;
        self.pending -= 1;
        Some(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysAccepts {
        sent: Vec<Vec<u8>>,
    }

    impl DeviceTransport for AlwaysAccepts {
        fn send_packet(&mut self, buf: &[u8]) -> usize {
            self.sent.push(buf.to_vec());
            buf.len()
        }
        fn recv_packet(&mut self, _buf: &mut [u8]) -> usize {
            0
        }
        fn max_rx_packet(&self) -> u16 {
            TASK_BUF_LEN as u16
        }
        fn max_tx_packet(&self) -> u16 {
            TASK_BUF_LEN as u16
        }
    }

    struct NeverAccepts;

    impl DeviceTransport for NeverAccepts {
        fn send_packet(&mut self, _buf: &[u8]) -> usize {
            0
        }
        fn recv_packet(&mut self, _buf: &mut [u8]) -> usize {
            0
        }
        fn max_rx_packet(&self) -> u16 {
            TASK_BUF_LEN as u16
        }
        fn max_tx_packet(&self) -> u16 {
            TASK_BUF_LEN as u16
        }
    }

    #[test]
    fn empty_ring_try_send_is_a_no_op() {
        let mut ring = TaskRing::new();
        let mut transport = AlwaysAccepts { sent: Vec::new() };
        assert_eq!(ring.try_send(&mut transport), None);
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn fifo_order_is_preserved_across_fill_and_send() {
        let mut ring = TaskRing::new();
        ring.fill(&[1, 2, 3]);
        ring.fill(&[4, 5]);
        let mut transport = AlwaysAccepts { sent: Vec::new() };
        assert_eq!(ring.try_send(&mut transport), Some(3));
        assert_eq!(ring.try_send(&mut transport), Some(2));
        assert_eq!(transport.sent, vec![vec![1, 2, 3], vec![4, 5]]);
    }

    #[test]
    fn fill_fails_once_every_slot_is_ready_send() {
        let mut ring = TaskRing::new();
        for _ in 0..TASK_RING_LEN {
            assert!(ring.fill(&[0xAA]));
        }
        assert!(ring.is_full());
        assert!(!ring.fill(&[0xBB]));
    }

    #[test]
    fn a_busy_transport_leaves_the_head_ready_for_a_later_tick() {
        let mut ring = TaskRing::new();
        ring.fill(&[9, 9]);
        let mut transport = NeverAccepts;
        assert_eq!(ring.try_send(&mut transport), None);
        assert!(!ring.is_empty());
    }
}
