//! Contract Test: Get/Set Semantics
//!
//! Constraints verified:
//! - A set followed by a get returns the state that was set
//! - Bulk sets publish exactly one notification naming only the requested switches
//! - Notifications carry the state read back from the device, not the requested one
//! - Device failures never reach the caller
//!
//! If this test fails, someone has:
//! - Started propagating device errors to callers
//! - Started publishing requested instead of actual states
//! - Widened notifications to the whole device

mod common;

use common::*;
use std::sync::Arc;
use std::time::Duration;
use switch_core::{SwitchEvent, SwitchLogic};

#[tokio::test]
async fn set_then_get_returns_every_allowed_state() {
    let available = switch_core::AvailableStates::new([
        ("laser", vec!["Off", "On"]),
        ("shutter", vec!["Closed", "Half", "Open"]),
    ])
    .unwrap();
    let device = ScriptedDevice::new(available.clone());
    let (logic, _rx) =
        SwitchLogic::new(Arc::new(device), &config_with_interval(&available, 60.0)).unwrap();
    logic.activate().await;

    for (switch, states) in available.iter() {
        for state in states {
            logic.set_state(switch, state).await;
            assert_eq!(
                logic.get_state(switch).await.as_deref(),
                Some(state.as_str()),
                "switch {} should read back {}",
                switch,
                state
            );
        }
    }
}

#[tokio::test]
async fn bulk_set_publishes_only_requested_switches() {
    let available = off_on_switches(&["a", "b", "c"]);
    let device = ScriptedDevice::new(available.clone());
    let (logic, mut rx) =
        SwitchLogic::new(Arc::new(device), &config_with_interval(&available, 60.0)).unwrap();
    logic.activate().await;

    logic
        .set_all_states(&snapshot(&[("a", "On"), ("b", "Off")]))
        .await;

    assert_eq!(
        logic.get_all_states().await,
        snapshot(&[("a", "On"), ("b", "Off"), ("c", "Off")])
    );
    assert_eq!(
        next_event(&mut rx).await,
        SwitchEvent::SwitchesChanged(snapshot(&[("a", "On"), ("b", "Off")]))
    );
    assert_quiet(&mut rx, Duration::from_millis(50)).await;
}

#[tokio::test]
async fn bulk_set_reports_partial_application() {
    let available = off_on_switches(&["a", "b"]);
    let device = ScriptedDevice::new(available.clone());
    let (logic, mut rx) =
        SwitchLogic::new(Arc::new(device), &config_with_interval(&available, 60.0)).unwrap();
    logic.activate().await;

    // "a" is applied before "b" is rejected
    logic
        .set_all_states(&snapshot(&[("a", "On"), ("b", "Dimmed")]))
        .await;

    assert_eq!(
        next_event(&mut rx).await,
        SwitchEvent::SwitchesChanged(snapshot(&[("a", "On"), ("b", "Off")]))
    );
}

#[tokio::test]
async fn bulk_set_omits_switches_the_device_does_not_know() {
    let available = off_on_switches(&["a"]);
    let device = ScriptedDevice::new(available.clone());
    let (logic, mut rx) =
        SwitchLogic::new(Arc::new(device), &config_with_interval(&available, 60.0)).unwrap();
    logic.activate().await;

    logic
        .set_all_states(&snapshot(&[("a", "On"), ("zz", "On")]))
        .await;

    assert_eq!(
        next_event(&mut rx).await,
        SwitchEvent::SwitchesChanged(snapshot(&[("a", "On")]))
    );
}

#[tokio::test]
async fn failed_set_still_publishes_actual_state() {
    let available = off_on_switches(&["a"]);
    let device = ScriptedDevice::new(available.clone());
    let (logic, mut rx) = SwitchLogic::new(
        Arc::new(device.clone()),
        &config_with_interval(&available, 60.0),
    )
    .unwrap();
    logic.activate().await;

    device.fail_sets(true);
    logic.set_state("a", "On").await;

    assert_eq!(device.set_call_count(), 1);
    assert_eq!(
        next_event(&mut rx).await,
        SwitchEvent::SwitchesChanged(snapshot(&[("a", "Off")]))
    );
}

#[tokio::test]
async fn failed_get_returns_none_without_notification() {
    let available = off_on_switches(&["a"]);
    let device = ScriptedDevice::new(available.clone());
    let (logic, mut rx) = SwitchLogic::new(
        Arc::new(device.clone()),
        &config_with_interval(&available, 60.0),
    )
    .unwrap();
    logic.activate().await;

    device.fail_gets(true);
    assert_eq!(logic.get_state("a").await, None);
    assert!(logic.get_all_states().await.is_empty());

    // Set fails to re-query: nothing is published
    logic.set_state("a", "On").await;
    assert_quiet(&mut rx, Duration::from_millis(50)).await;

    device.fail_gets(false);
    assert_eq!(logic.get_state("a").await.as_deref(), Some("On"));
}

#[tokio::test]
async fn facade_forwards_device_identity() {
    let available = off_on_switches(&["b", "a"]);
    let device = ScriptedDevice::new(available.clone());
    let (logic, _rx) =
        SwitchLogic::new(Arc::new(device), &config_with_interval(&available, 60.0)).unwrap();

    assert_eq!(logic.device_name(), "scripted");
    assert_eq!(logic.number_of_switches(), 2);
    assert_eq!(logic.switch_names(), vec!["a", "b"]);
    assert_eq!(logic.available_states(), &available);
}
