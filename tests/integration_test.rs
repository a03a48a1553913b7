//! End-to-end scenarios against the public API, covering the eight concrete
//! cases from the component design: name validation, sync FIFO, async
//! fan-out with a wildcard, thread-local filtering, back-pressure,
//! stop-all, duplicate create, and cancel-then-send.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use bus::{is_valid_channel_name, stop_all_message_buses, running_message_bus_count, DispatchMode, MessageBus};

fn collector() -> (Arc<Mutex<Vec<String>>>, bus::Subscriber) {
    let store = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&store);
    let subscriber: bus::Subscriber = Arc::new(move |msg: &bus::Message| {
        if let Some(text) = msg.downcast_ref::<String>() {
            sink.lock().unwrap().push(text.clone());
        } else if let Some(n) = msg.downcast_ref::<i32>() {
            sink.lock().unwrap().push(n.to_string());
        }
    });
    (store, subscriber)
}

#[test]
fn name_validation() {
    for valid in ["foo", "foo.bar", "_x", "a.b.c.d"] {
        assert!(is_valid_channel_name(valid, '.'), "{valid}");
    }
    for invalid in ["..foo", "*", ".", "98", "top.98", "foo.", ".foo"] {
        assert!(!is_valid_channel_name(invalid, '.'), "{invalid}");
    }
}

#[test]
fn sync_fifo_delivery() {
    let bus = MessageBus::new();
    bus.start();
    let channel = bus.create_new_channel("chan").unwrap();
    let (store, subscriber) = collector();
    bus.subscribe("chan", subscriber, false, DispatchMode::Synchronous, None)
        .unwrap();

    for i in 0..200 {
        channel.send(bus::boxed_message(i));
    }

    let got: Vec<i32> = store.lock().unwrap().iter().map(|s| s.parse().unwrap()).collect();
    let expected: Vec<i32> = (0..200).collect();
    assert_eq!(got, expected);
    bus.stop();
}

#[test]
fn async_fan_out_with_wildcard() {
    let config = MessageBus::builder().dedicated_thread_mode(true).build();
    let bus = MessageBus::with_config(config);
    bus.start();
    bus.create_new_channel("a").unwrap();
    bus.create_new_channel("a.b").unwrap();
    let leaf = bus.create_new_channel("a.b.c").unwrap();

    let (w_store, w_sub) = collector();
    bus.subscribe("a", w_sub, true, DispatchMode::Asynchronous, None)
        .unwrap();
    let (l_store, l_sub) = collector();
    bus.subscribe("a.b.c", l_sub, false, DispatchMode::Asynchronous, None)
        .unwrap();

    leaf.send(bus::boxed_message("hi".to_string()));

    wait_until(Duration::from_secs(2), || {
        w_store.lock().unwrap().len() == 1 && l_store.lock().unwrap().len() == 1
    });

    assert_eq!(*l_store.lock().unwrap(), vec!["hi".to_string()]);
    assert_eq!(*w_store.lock().unwrap(), vec!["hi".to_string()]);
    bus.stop();
}

#[test]
fn thread_local_filtering() {
    let bus = MessageBus::new();
    bus.start();
    let channel = bus.create_new_channel("chan").unwrap();

    let this_thread = thread::current().id();
    let (store, subscriber) = collector();
    bus.subscribe(
        "chan",
        subscriber,
        false,
        DispatchMode::Synchronous,
        Some(this_thread),
    )
    .unwrap();

    channel.send(bus::boxed_message("from t1".to_string()));

    let other_channel = Arc::clone(&channel);
    thread::spawn(move || {
        other_channel.send(bus::boxed_message("from t2".to_string()));
    })
    .join()
    .unwrap();

    assert_eq!(*store.lock().unwrap(), vec!["from t1".to_string()]);
    assert_eq!(channel.message_count(), 2);
    bus.stop();
}

#[test]
fn back_pressure_blocks_publisher_until_drained() {
    let config = MessageBus::builder()
        .dedicated_thread_mode(true)
        .max_queue_size(1)
        .build();
    let bus = MessageBus::with_config(config);
    bus.start();
    let channel = bus.create_new_channel("chan").unwrap();

    let received = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&received);
    let subscriber: bus::Subscriber = Arc::new(move |_msg: &bus::Message| {
        thread::sleep(Duration::from_millis(20));
        sink.fetch_add(1, Ordering::SeqCst);
    });
    bus.subscribe("chan", subscriber, false, DispatchMode::Asynchronous, None)
        .unwrap();

    for i in 0..6 {
        channel.send(bus::boxed_message(i));
    }

    wait_until(Duration::from_secs(5), || {
        received.load(Ordering::SeqCst) == 6
    });
    assert_eq!(received.load(Ordering::SeqCst), 6);
    bus.stop();
}

#[test]
fn stop_all_message_buses_stops_every_bus() {
    let buses: Vec<MessageBus> = (0..20)
        .map(|_| {
            let config = MessageBus::builder().dedicated_thread_mode(true).build();
            let bus = MessageBus::with_config(config);
            bus.start();
            bus
        })
        .collect();

    assert!(running_message_bus_count() >= 20);
    stop_all_message_buses();
    for bus in &buses {
        assert!(!bus.is_running());
    }
}

#[test]
fn duplicate_create_fails_but_is_case_sensitive() {
    let bus = MessageBus::new();
    bus.start();
    bus.create_new_channel("X").unwrap();
    assert!(bus.create_new_channel("X").is_err());
    assert!(bus.create_new_channel("x").is_ok());
    bus.stop();
}

#[test]
fn cancel_then_send_drops_silently() {
    let bus = MessageBus::new();
    bus.start();
    let channel = bus.create_new_channel("chan").unwrap();
    let (store, subscriber) = collector();
    let subscription = bus
        .subscribe("chan", subscriber, false, DispatchMode::Synchronous, None)
        .unwrap();

    subscription.cancel();
    channel.send(bus::boxed_message("should not arrive".to_string()));

    assert!(store.lock().unwrap().is_empty());
    assert!(!subscription.is_active());
    assert_eq!(channel.message_count(), 1);
    bus.stop();
}

#[test]
fn log_message_delivered_once_to_a_callback_reachable_two_ways() {
    let bus = MessageBus::new();
    bus.start();

    let count = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&count);
    let callback: bus::Subscriber = Arc::new(move |_msg: &bus::Message| {
        sink.fetch_add(1, Ordering::SeqCst);
    });

    // Same callback reachable both via a wildcard on an ancestor of the
    // internal log channel and via a direct subscribe on the log channel
    // itself.
    bus.subscribe("root", Arc::clone(&callback), true, DispatchMode::Synchronous, None)
        .unwrap();
    bus.subscribe(
        "_internal_log",
        Arc::clone(&callback),
        false,
        DispatchMode::Synchronous,
        None,
    )
    .unwrap();

    bus.internal_log().info("hello");

    assert_eq!(count.load(Ordering::SeqCst), 1);
    bus.stop();
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = std::time::Instant::now() + timeout;
    while !condition() {
        if std::time::Instant::now() >= deadline {
            panic!("condition not met within timeout");
        }
        thread::sleep(Duration::from_millis(10));
    }
}
