//! End-to-end scenarios exercising the scheduler, task lifecycle, and
//! mailbox IPC together, each driven by a deterministic tick source rather
//! than real wall-clock time.

mod common;

use std::sync::{Arc, Mutex};

use edf_kernel::{KernelConfig, KernelError};

#[test]
fn rendezvous_both_orders() {
    let cfg = KernelConfig::builder().max_tasks(4).max_mailboxes(2).build();
    let kernel = common::boot(cfg);
    let mb = kernel.create_mailbox(1, 4).unwrap();

    let sender_result = Arc::new(Mutex::new(None));
    let receiver_result = Arc::new(Mutex::new(None));
    let received_value = Arc::new(Mutex::new(None));

    {
        let result = Arc::clone(&sender_result);
        kernel
            .create_task(
                Box::new(move || {
                    let outcome = kernel
                        .wait(10)
                        .and_then(|_| kernel.send_wait(mb, &0xAAu32.to_le_bytes()));
                    *result.lock().unwrap() = Some(outcome);
                    kernel.terminate();
                }),
                2000,
            )
            .unwrap();
    }
    {
        let result = Arc::clone(&receiver_result);
        let value = Arc::clone(&received_value);
        kernel
            .create_task(
                Box::new(move || {
                    let mut buf = [0u8; 4];
                    let outcome = kernel.receive_wait(mb, &mut buf);
                    *value.lock().unwrap() = Some(u32::from_le_bytes(buf));
                    *result.lock().unwrap() = Some(outcome);
                    kernel.terminate();
                }),
                4000,
            )
            .unwrap();
    }

    common::start(kernel);
    common::tick(kernel, 10);
    common::settle();

    assert_eq!(*sender_result.lock().unwrap(), Some(Ok(())));
    assert_eq!(*receiver_result.lock().unwrap(), Some(Ok(())));
    assert_eq!(*received_value.lock().unwrap(), Some(0xAA));
    assert_eq!(kernel.no_messages(mb), Ok(()));
}

#[test]
fn queued_send_then_receive() {
    let cfg = KernelConfig::builder().max_tasks(4).max_mailboxes(2).build();
    let kernel = common::boot(cfg);
    let mb = kernel.create_mailbox(1, 4).unwrap();

    let sender_result = Arc::new(Mutex::new(None));
    let receiver_result = Arc::new(Mutex::new(None));
    let received_value = Arc::new(Mutex::new(None));

    {
        let result = Arc::clone(&sender_result);
        kernel
            .create_task(
                Box::new(move || {
                    let outcome = kernel.send_wait(mb, &0x42u32.to_le_bytes());
                    *result.lock().unwrap() = Some(outcome);
                    kernel.terminate();
                }),
                500,
            )
            .unwrap();
    }
    {
        let result = Arc::clone(&receiver_result);
        let value = Arc::clone(&received_value);
        kernel
            .create_task(
                Box::new(move || {
                    let outcome_wait = kernel.wait(20);
                    let mut buf = [0u8; 4];
                    let outcome = outcome_wait.and_then(|_| kernel.receive_wait(mb, &mut buf));
                    *value.lock().unwrap() = Some(u32::from_le_bytes(buf));
                    *result.lock().unwrap() = Some(outcome);
                    kernel.terminate();
                }),
                1000,
            )
            .unwrap();
    }

    common::start(kernel);
    common::tick(kernel, 20);
    common::settle();

    assert_eq!(*sender_result.lock().unwrap(), Some(Ok(())));
    assert_eq!(*receiver_result.lock().unwrap(), Some(Ok(())));
    assert_eq!(*received_value.lock().unwrap(), Some(0x42));
    assert_eq!(kernel.no_messages(mb), Ok(()));
}

#[test]
fn send_with_no_receiver_hits_deadline() {
    let cfg = KernelConfig::builder().max_tasks(2).max_mailboxes(2).build();
    let kernel = common::boot(cfg);
    let mb = kernel.create_mailbox(1, 4).unwrap();

    let sender_result = Arc::new(Mutex::new(None));
    {
        let result = Arc::clone(&sender_result);
        kernel
            .create_task(
                Box::new(move || {
                    let outcome = kernel.send_wait(mb, &0x7u32.to_le_bytes());
                    *result.lock().unwrap() = Some(outcome);
                }),
                2000,
            )
            .unwrap();
    }

    common::start(kernel);
    common::tick(kernel, 2000);
    common::settle();

    assert_eq!(
        *sender_result.lock().unwrap(),
        Some(Err(KernelError::DeadlineReached))
    );
    assert_eq!(kernel.no_messages(mb), Ok(()), "orphaned slot must be reclaimed");
}

#[test]
fn no_wait_overflow_evicts_oldest() {
    let cfg = KernelConfig::builder().max_tasks(2).max_mailboxes(2).build();
    let kernel = common::boot(cfg);
    let mb = kernel.create_mailbox(2, 1).unwrap();

    let first = Arc::new(Mutex::new(None));
    let second = Arc::new(Mutex::new(None));
    {
        let first = Arc::clone(&first);
        let second = Arc::clone(&second);
        kernel
            .create_task(
                Box::new(move || {
                    kernel.send_no_wait(mb, &[1]).unwrap();
                    kernel.send_no_wait(mb, &[2]).unwrap();
                    kernel.send_no_wait(mb, &[3]).unwrap();

                    let mut a = [0u8; 1];
                    kernel.receive_no_wait(mb, &mut a).unwrap();
                    *first.lock().unwrap() = Some(a[0]);

                    let mut b = [0u8; 1];
                    kernel.receive_no_wait(mb, &mut b).unwrap();
                    *second.lock().unwrap() = Some(b[0]);

                    kernel.terminate();
                }),
                100,
            )
            .unwrap();
    }

    common::start(kernel);
    common::settle();

    assert_eq!(*first.lock().unwrap(), Some(2), "message 1 (A) was evicted as oldest");
    assert_eq!(*second.lock().unwrap(), Some(3));
    assert_eq!(kernel.no_messages(mb), Ok(()));
}

#[test]
fn wait_resumes_at_deadline_even_if_sleep_horizon_is_later() {
    let cfg = KernelConfig::builder().max_tasks(2).max_mailboxes(1).build();
    let kernel = common::boot(cfg);

    let result = Arc::new(Mutex::new(None));
    {
        let result = Arc::clone(&result);
        kernel
            .create_task(
                Box::new(move || {
                    let outcome = kernel.wait(100);
                    *result.lock().unwrap() = Some(outcome);
                }),
                50,
            )
            .unwrap();
    }

    common::start(kernel);
    common::tick(kernel, 50);
    common::settle();

    assert_eq!(*result.lock().unwrap(), Some(Err(KernelError::DeadlineReached)));
    assert_eq!(kernel.ticks(), 50);
}

#[test]
fn set_deadline_moves_caller_ahead_of_later_deadlines() {
    let cfg = KernelConfig::builder().max_tasks(4).max_mailboxes(1).build();
    let kernel = common::boot(cfg);

    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let mid_deadline_after_call = Arc::new(Mutex::new(None));

    {
        let log = Arc::clone(&log);
        kernel
            .create_task(
                Box::new(move || {
                    log.lock().unwrap().push("low");
                    kernel.wait(1000).ok();
                }),
                100,
            )
            .unwrap();
    }
    {
        let log = Arc::clone(&log);
        let observed = Arc::clone(&mid_deadline_after_call);
        kernel
            .create_task(
                Box::new(move || {
                    log.lock().unwrap().push("mid:before");
                    kernel.set_deadline(50);
                    *observed.lock().unwrap() = Some(kernel.deadline());
                    log.lock().unwrap().push("mid:after");
                    kernel.wait(1000).ok();
                }),
                200,
            )
            .unwrap();
    }
    {
        let log = Arc::clone(&log);
        kernel
            .create_task(
                Box::new(move || {
                    log.lock().unwrap().push("high");
                    kernel.wait(1000).ok();
                }),
                300,
            )
            .unwrap();
    }

    common::start(kernel);
    common::settle();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["low", "mid:before", "mid:after", "high"],
        "the middle task keeps running immediately after lowering its own deadline"
    );
    assert_eq!(*mid_deadline_after_call.lock().unwrap(), Some(50));
}
