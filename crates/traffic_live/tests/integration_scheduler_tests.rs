mod support;

use std::sync::Arc;
use std::time::Duration;

use support::{drain, test_service, FailingConnection, GatedConnection, PanicOnceConnection};
use tokio::time::sleep;
use traffic_core::Topic;
use traffic_live::{ChannelConnection, LiveConfig};

const SECS_5: Duration = Duration::from_secs(5);
const SECS_10: Duration = Duration::from_secs(10);

#[tokio::test(start_paused = true)]
async fn starting_twice_keeps_one_loop_with_the_new_interval() {
    let (service, pacer) = test_service(LiveConfig::default());
    let (conn, mut rx) = ChannelConnection::pair();
    service.subscribe(Topic::Statistics, conn).await.unwrap();

    service.start_scheduler(5.0).unwrap();
    service.start_scheduler(10.0).unwrap();
    assert_eq!(service.status().interval_secs, 10.0);

    sleep(Duration::from_secs(35)).await;
    assert_eq!(pacer.sleeps(), vec![SECS_10; 4]);
    assert_eq!(service.status().ticks, 4);

    let received = drain(&mut rx);
    assert_eq!(received.len(), 4);
    assert!(received
        .iter()
        .all(|m| m["data"]["districtData"].is_array() && m["timestamp"].is_i64()));
}

#[tokio::test(start_paused = true)]
async fn restart_after_stop_does_not_revive_the_old_loop() {
    let (service, pacer) = test_service(LiveConfig::default());

    service.start_scheduler(5.0).unwrap();
    sleep(Duration::from_secs(12)).await;
    assert_eq!(service.status().ticks, 3);

    // The first loop is asleep until t=15; the stop wakes it and it exits.
    service.stop_scheduler();
    assert!(!service.status().is_running);
    service.start_scheduler(5.0).unwrap();
    sleep(Duration::from_secs(6)).await;
    assert_eq!(service.status().ticks, 5);
    assert!(service.status().is_running);

    service.stop_scheduler();
    sleep(Duration::from_secs(20)).await;
    assert_eq!(service.status().ticks, 5);
    assert!(pacer.sleeps().iter().all(|d| *d == SECS_5));
}

#[tokio::test(start_paused = true)]
async fn failed_tick_backs_off_then_recovers() {
    let (service, pacer) = test_service(LiveConfig::default().with_recovery_secs(2.0));
    let simulator = Arc::clone(service.simulator());
    let poisoner = Arc::clone(&simulator);
    let _ = std::thread::spawn(move || {
        let _guard = poisoner.lock().unwrap();
        panic!("poisoning the simulator lock");
    })
    .join();
    assert!(simulator.is_poisoned());

    service.start_scheduler(5.0).unwrap();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(pacer.sleeps(), vec![Duration::from_secs(2)]);
    assert_eq!(service.status().ticks, 0);
    assert!(service.status().is_running);
    assert!(!simulator.is_poisoned());

    sleep(Duration::from_secs(2)).await;
    assert_eq!(pacer.sleeps(), vec![Duration::from_secs(2), SECS_5]);
    assert_eq!(service.status().ticks, 1);
    assert!(service.get_projection(Topic::Statistics).is_ok());
}

#[tokio::test(start_paused = true)]
async fn panicking_tick_does_not_end_the_loop() {
    let (service, pacer) = test_service(LiveConfig::default().with_recovery_secs(2.0));
    let flaky = PanicOnceConnection::new();
    service.subscribe(Topic::Statistics, flaky.clone()).await.unwrap();

    service.start_scheduler(5.0).unwrap();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(service.status().ticks, 0);
    assert!(service.status().is_running);

    sleep(Duration::from_secs(7)).await;
    assert_eq!(pacer.sleeps(), vec![Duration::from_secs(2), SECS_5, SECS_5]);
    assert_eq!(service.status().ticks, 2);
    assert_eq!(flaky.delivered(), 2);
    assert_eq!(service.simulator().lock().unwrap().tick(), 3);
    assert_eq!(service.broadcaster().subscriber_count(Topic::Statistics), 1);
}

#[tokio::test(start_paused = true)]
async fn restarted_loop_waits_for_the_in_flight_tick() {
    let (service, _pacer) = test_service(LiveConfig::default());
    let gated = GatedConnection::new();
    service.subscribe(Topic::RoadFlow, gated.clone()).await.unwrap();

    service.start_scheduler(5.0).unwrap();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(service.simulator().lock().unwrap().tick(), 1);

    // The first loop is stuck mid-broadcast; the new one must not advance yet.
    service.stop_scheduler();
    service.start_scheduler(5.0).unwrap();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(service.simulator().lock().unwrap().tick(), 1);
    assert_eq!(gated.delivered(), 0);

    gated.open();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(service.simulator().lock().unwrap().tick(), 2);
    assert_eq!(gated.delivered(), 2);
    assert_eq!(service.status().ticks, 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_after_stop_waits_for_the_in_flight_tick() {
    let (service, _pacer) = test_service(LiveConfig::default());
    let gated = GatedConnection::new();
    service.subscribe(Topic::RoadFlow, gated.clone()).await.unwrap();

    service.start_scheduler(5.0).unwrap();
    sleep(Duration::from_secs(1)).await;
    service.stop_scheduler();

    let opener = Arc::clone(&gated);
    tokio::spawn(async move {
        sleep(Duration::from_secs(3)).await;
        opener.open();
    });
    service.shutdown().await;
    assert_eq!(gated.delivered(), 1);
    assert_eq!(service.status().ticks, 1);
}

#[tokio::test(start_paused = true)]
async fn every_topic_in_a_tick_comes_from_one_snapshot() {
    let (service, _pacer) = test_service(LiveConfig::default());
    let (flow, mut rx_flow) = ChannelConnection::pair();
    let (all, mut rx_all) = ChannelConnection::pair();
    service.subscribe(Topic::RoadFlow, flow).await.unwrap();
    service.subscribe(Topic::AllData, all).await.unwrap();

    service.start_scheduler(5.0).unwrap();
    sleep(Duration::from_secs(1)).await;

    let flow = drain(&mut rx_flow);
    let all = drain(&mut rx_all);
    assert_eq!((flow.len(), all.len()), (1, 1));
    assert_eq!(flow[0]["data"], all[0]["flowData"]);
    assert_eq!(flow[0]["timestamp"], all[0]["timestamp"]);
    assert_eq!(flow[0]["data"]["type"], "FeatureCollection");
}

#[tokio::test(start_paused = true)]
async fn simulator_advances_without_subscribers() {
    let (service, _pacer) = test_service(LiveConfig::default());
    service.start_scheduler(5.0).unwrap();
    sleep(Duration::from_secs(11)).await;
    assert_eq!(service.simulator().lock().unwrap().tick(), 3);
}

#[tokio::test(start_paused = true)]
async fn on_demand_projection_does_not_advance() {
    let (service, _pacer) = test_service(LiveConfig::default());
    let value = service.get_projection(Topic::HotspotsData).unwrap();
    let hotspots = value["data"]["hotspots"].as_array().map(Vec::len).unwrap_or(0);
    assert!((5..=10).contains(&hotspots));
    assert_eq!(service.simulator().lock().unwrap().tick(), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_for_the_loop() {
    let (service, _pacer) = test_service(LiveConfig::default());
    service.start().unwrap();
    sleep(Duration::from_secs(1)).await;
    service.shutdown().await;
    assert!(!service.status().is_running);
    let ticks = service.status().ticks;
    sleep(Duration::from_secs(30)).await;
    assert_eq!(service.status().ticks, ticks);
}

#[tokio::test(start_paused = true)]
async fn heartbeat_pings_subscribers_and_prunes_dead_ones() {
    let (service, _pacer) = test_service(LiveConfig::default());
    let (alive, mut rx) = ChannelConnection::pair();
    service.subscribe(Topic::TrafficEvents, alive).await.unwrap();
    service
        .subscribe(Topic::TrafficEvents, FailingConnection::new())
        .await
        .unwrap();

    let heartbeat = service.spawn_heartbeat().unwrap();
    sleep(Duration::from_secs(29)).await;
    assert!(!heartbeat.is_finished());
    assert!(drain(&mut rx).is_empty());
    sleep(Duration::from_secs(2)).await;

    let beats = drain(&mut rx);
    assert_eq!(beats.len(), 1);
    assert_eq!(beats[0]["type"], "heartbeat");
    assert_eq!(service.broadcaster().subscriber_count(Topic::TrafficEvents), 1);
    heartbeat.stop();
}
