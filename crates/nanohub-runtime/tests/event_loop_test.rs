// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod common;

use common::{runtime, run_until, Entry, Payload, TestApp};
use nanohub_core::event::{EVENT_FIRST_USER_VALUE, EVENT_TIMER};
use nanohub_core::{ApiError, InstanceId, TimerHandle};
use nanohub_runtime::event::release_callback;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const PING: u16 = EVENT_FIRST_USER_VALUE;
const NEWS: u16 = EVENT_FIRST_USER_VALUE + 1;

#[test]
fn timers_fire_in_expiry_order() {
    let (mut manager, _controls) = runtime();
    let (app, journal) = TestApp::new(0x10);
    let app = app.on_start(|chre| {
        chre.set_timer(Duration::from_millis(50), 50, true).unwrap();
        chre.set_timer(Duration::from_millis(10), 10, true).unwrap();
        chre.set_timer(Duration::from_millis(30), 30, true).unwrap();
        let doomed = chre.set_timer(Duration::from_millis(20), 20, true).unwrap();
        chre.cancel_timer(doomed).unwrap();
        true
    });
    manager.start_nanoapp(app.boxed()).unwrap();

    assert!(run_until(&mut manager, Duration::from_secs(2), || {
        journal.timer_cookies().len() == 3
    }));
    thread::sleep(Duration::from_millis(40));
    manager.run_until_idle();
    assert_eq!(journal.timer_cookies(), vec![10, 30, 50]);
    assert!(manager.event_loop().timer_pool().is_empty());
}

#[test]
fn cancelling_the_earliest_timer_keeps_the_rest_on_schedule() {
    let (mut manager, _controls) = runtime();
    let (app, journal) = TestApp::new(0x12);
    let app = app.on_start(|chre| {
        chre.set_timer(Duration::from_millis(5), 5, true).unwrap();
        let head = chre.set_timer(Duration::from_millis(1), 1, true).unwrap();
        chre.set_timer(Duration::from_millis(3), 3, true).unwrap();
        chre.cancel_timer(head).unwrap();
        true
    });
    manager.start_nanoapp(app.boxed()).unwrap();

    assert!(run_until(&mut manager, Duration::from_secs(2), || {
        journal.timer_cookies().len() == 2
    }));
    thread::sleep(Duration::from_millis(20));
    manager.run_until_idle();
    assert_eq!(journal.timer_cookies(), vec![3, 5]);
    assert!(manager.event_loop().timer_pool().is_empty());
}

#[test]
fn recurring_timer_keeps_firing_until_cancelled() {
    let (mut manager, _controls) = runtime();
    let handle_slot: Arc<Mutex<Option<TimerHandle>>> = Arc::default();
    let slot = Arc::clone(&handle_slot);
    let (app, journal) = TestApp::new(0x11);
    let app = app
        .on_start(move |chre| {
            *slot.lock().unwrap() = Some(chre.set_timer(Duration::from_millis(20), 7, false).unwrap());
            true
        })
        .on_event({
            let slot = Arc::clone(&handle_slot);
            let mut fired = 0;
            move |chre, _, event_type, _| {
                if event_type == EVENT_TIMER {
                    fired += 1;
                    if fired == 3 {
                        let handle = slot.lock().unwrap().unwrap();
                        chre.cancel_timer(handle).unwrap();
                    }
                }
            }
        });
    manager.start_nanoapp(app.boxed()).unwrap();

    assert!(run_until(&mut manager, Duration::from_secs(2), || {
        journal.timer_cookies().len() >= 3
    }));
    thread::sleep(Duration::from_millis(60));
    manager.run_until_idle();
    assert_eq!(journal.timer_cookies(), vec![7, 7, 7]);
}

#[test]
fn only_the_owner_may_cancel_a_timer() {
    let (mut manager, _controls) = runtime();
    let (owner, owner_journal) = TestApp::new(0x20);
    let (other, _) = TestApp::new(0x21);
    let owner_id = manager.start_nanoapp(owner.boxed()).unwrap();
    let other_id = manager.start_nanoapp(other.boxed()).unwrap();

    let handle = manager
        .invoke_as(owner_id, |chre| chre.set_timer(Duration::from_millis(10), 99, true))
        .unwrap()
        .unwrap();
    let result = manager
        .invoke_as(other_id, |chre| chre.cancel_timer(handle))
        .unwrap();
    assert!(matches!(result, Err(ApiError::InvalidArgument(_))));
    assert_eq!(manager.event_loop().timer_pool().pending(), vec![handle]);

    assert!(run_until(&mut manager, Duration::from_secs(2), || {
        owner_journal.timer_cookies() == vec![99]
    }));
}

#[test]
fn broadcast_reaches_every_subscriber_and_releases_once() {
    let (mut manager, _controls) = runtime();
    let mut journals = Vec::new();
    for app_id in 0..3 {
        let (app, journal) = TestApp::new(0x30 + app_id);
        manager.start_nanoapp(app.subscribed_to(NEWS).boxed()).unwrap();
        journals.push(journal);
    }
    let (bystander, bystander_journal) = TestApp::new(0x3f);
    manager.start_nanoapp(bystander.boxed()).unwrap();

    let released = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&released);
    manager
        .post_event(
            NEWS,
            Some(Box::new(5u32)),
            Some(release_callback(move |_, _, data| {
                assert!(data.is_some());
                counter.fetch_add(1, Ordering::SeqCst);
            })),
            InstanceId::SYSTEM,
            InstanceId::BROADCAST,
        )
        .unwrap();
    manager.run_until_idle();

    for journal in &journals {
        assert_eq!(journal.events_of(NEWS), vec![Payload::Cookie(5)]);
    }
    assert!(bystander_journal.events().is_empty());
    assert_eq!(released.load(Ordering::SeqCst), 1);
    assert_eq!(manager.handle().stats().live_events, 0);
}

#[test]
fn unicast_events_arrive_in_posting_order() {
    let (mut manager, _controls) = runtime();
    let (app, journal) = TestApp::new(0x40);
    let id = manager.start_nanoapp(app.boxed()).unwrap();
    let handle = manager.handle();
    for value in 0..5u32 {
        handle
            .post_event(PING, Some(Box::new(value)), None, InstanceId::SYSTEM, id)
            .unwrap();
    }
    manager.run_until_idle();
    let seen: Vec<Payload> = journal.events_of(PING);
    assert_eq!(seen, (0..5).map(Payload::Cookie).collect::<Vec<_>>());
}

#[test]
fn nanoapps_can_message_each_other() {
    let (mut manager, _controls) = runtime();
    let (listener, listener_journal) = TestApp::new(0x50);
    let listener_id = manager.start_nanoapp(listener.boxed()).unwrap();
    let (talker, _) = TestApp::new(0x51);
    let talker = talker.on_start(move |chre| {
        chre.send_event(PING, Some(Box::new(1u32)), None, listener_id)
            .is_ok()
    });
    let talker_id = manager.start_nanoapp(talker.boxed()).unwrap();
    manager.run_until_idle();

    assert_eq!(
        listener_journal.entries().last(),
        Some(&Entry::Event {
            sender: talker_id,
            event_type: PING,
            payload: Payload::Cookie(1),
        })
    );
}

#[test]
fn load_and_unload_through_the_handle() {
    let (mut manager, _controls) = runtime();
    let handle = manager.handle();
    let (app, journal) = TestApp::new(0x60);
    handle.load_nanoapp(app.boxed()).unwrap();
    manager.run_until_idle();

    let id = handle.find_nanoapp_instance_id_by_app_id(0x60).unwrap();
    let mut listed = Vec::new();
    handle.for_each_nanoapp(|descriptor| listed.push(descriptor.instance_id));
    assert_eq!(listed, vec![id]);

    handle.unload_nanoapp(0x60).unwrap();
    manager.run_until_idle();
    assert!(journal.ended());
    assert_eq!(handle.find_nanoapp_instance_id_by_app_id(0x60), None);
    assert_eq!(manager.event_loop().nanoapp_count(), 0);
}

#[test]
fn stop_delivers_queued_events_then_ends_nanoapps() {
    let (mut manager, _controls) = runtime();
    let (app, journal) = TestApp::new(0x70);
    let id = manager.start_nanoapp(app.boxed()).unwrap();
    let handle = manager.handle();

    let worker = thread::spawn(move || {
        manager.run();
        manager
    });
    for value in 0..3u32 {
        handle
            .post_event(PING, Some(Box::new(value)), None, InstanceId::SYSTEM, id)
            .unwrap();
    }
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while journal.events_of(PING).len() < 3 && std::time::Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
    }
    handle.stop();
    let manager = worker.join().unwrap();

    assert_eq!(journal.events_of(PING).len(), 3);
    assert!(journal.ended());
    assert_eq!(manager.event_loop().nanoapp_count(), 0);
    assert!(handle.post_event(PING, None, None, InstanceId::SYSTEM, id).is_err());
}

#[test]
fn event_pool_exhaustion_is_reported() {
    let config = nanohub_runtime::RuntimeConfig {
        max_event_count: 2,
        ..Default::default()
    };
    let (manager, _controls) = common::runtime_with(config);
    let handle = manager.handle();
    handle.post_event(PING, None, None, InstanceId::SYSTEM, InstanceId::BROADCAST).unwrap();
    handle.post_event(PING, None, None, InstanceId::SYSTEM, InstanceId::BROADCAST).unwrap();
    assert!(handle
        .post_event(PING, None, None, InstanceId::SYSTEM, InstanceId::BROADCAST)
        .is_err());
    assert_eq!(handle.stats().pool_exhausted, 1);
}
