//! Property tests for the mailbox's non-blocking bookkeeping: regardless of
//! the interleaving of sends and receives, FIFO order and the bounded-eviction
//! rule must hold. Blocking calls (`send_wait`/`receive_wait`/`wait`) need a
//! real task context on a real `Port` thread and are covered by the scenario
//! tests instead; this file only drives operations that are legal to call
//! from the thread that happens to be `running` right after `init_kernel`
//! (the idle task's own context, which is never scheduled away here since no
//! other task exists to contend for it).

use std::collections::VecDeque;

use edf_kernel::{init_kernel, KernelConfig};
use edf_kernel_sim::SimPort;
use quickcheck::{Gen, TestResult};

const CAPACITY: usize = 3;

#[derive(Clone, Debug)]
enum Op {
    Send(u8),
    Receive,
}

impl quickcheck::Arbitrary for Op {
    fn arbitrary(g: &mut Gen) -> Self {
        if bool::arbitrary(g) {
            Op::Send(u8::arbitrary(g))
        } else {
            Op::Receive
        }
    }
}

fn run_ops(ops: Vec<Op>) -> TestResult {
    let cfg = KernelConfig::builder().max_tasks(1).max_mailboxes(1).build();
    let port = SimPort::new_deterministic(cfg);
    let kernel = init_kernel(port, cfg).expect("init_kernel failed");
    let mb = kernel
        .create_mailbox(CAPACITY, 1)
        .expect("the only mailbox this process will ever create");

    // Mirrors the bounded FIFO the mailbox is supposed to keep, so every
    // `Receive` can be checked against what ought to come out next.
    let mut model: VecDeque<u8> = VecDeque::new();

    for op in ops {
        match op {
            Op::Send(byte) => {
                kernel
                    .send_no_wait(mb, &[byte])
                    .expect("send_no_wait never fails: it evicts instead of blocking");
                if model.len() >= CAPACITY {
                    model.pop_front();
                }
                model.push_back(byte);
            }
            Op::Receive => {
                let mut buf = [0u8; 1];
                let result = kernel.receive_no_wait(mb, &mut buf);
                match model.pop_front() {
                    Some(expected) => {
                        if result.is_err() || buf[0] != expected {
                            return TestResult::error(format!(
                                "expected {expected:?}, got {result:?} (buf={buf:?})"
                            ));
                        }
                    }
                    None => {
                        if result.is_ok() {
                            return TestResult::error("received a message the model says doesn't exist");
                        }
                    }
                }
            }
        }
    }
    TestResult::passed()
}

#[quickcheck_macros::quickcheck]
fn mailbox_no_wait_ops_match_bounded_fifo_model(ops: Vec<Op>) -> TestResult {
    run_ops(ops)
}

#[test]
fn regression_eviction_then_drain_is_oldest_first() {
    let result = run_ops(vec![
        Op::Send(1),
        Op::Send(2),
        Op::Send(3),
        Op::Send(4),
        Op::Receive,
        Op::Receive,
        Op::Receive,
        Op::Receive,
    ]);
    assert!(!result.is_failure(), "{result:?}");
}
