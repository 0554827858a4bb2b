//! Display probe integration tests

use beacon_desk::display::Display;
use beacon_desk::hardware::{
    ConsoleDriver, ConsolePanel, ProbeOutcome, WiringProfile, default_candidates, select_wiring,
};

mod common;

use common::{Behavior, FakeDriver, profile};

#[test]
fn test_first_working_candidate_wins() {
    let mut driver = FakeDriver::new(&[
        ("A", Behavior::FailsOpen),
        ("B", Behavior::Works),
        ("C", Behavior::Works),
    ]);
    let candidates = [profile("A"), profile("B"), profile("C")];

    let outcome = select_wiring(&mut driver, &candidates);

    assert_eq!(outcome.profile().map(|p| p.label.as_str()), Some("B"));
    let log = driver.log.lock().unwrap();
    assert_eq!(log.opened, ["A", "B"]);
    assert_eq!(log.powered_on, ["B"]);
    assert_eq!(log.released, ["A"]);
}

#[test]
fn test_self_check_failure_moves_on() {
    let mut driver = FakeDriver::new(&[("A", Behavior::FailsSelfCheck), ("B", Behavior::Works)]);

    let outcome = select_wiring(&mut driver, &[profile("A"), profile("B")]);

    assert_eq!(outcome.profile().map(|p| p.label.as_str()), Some("B"));
    let log = driver.log.lock().unwrap();
    assert!(!log.held.contains("A"));
    // Only B's panel is alive
    assert_eq!(log.live_panels, 1);
}

#[test]
fn test_all_candidates_failing_leaves_nothing_behind() {
    let mut driver = FakeDriver::new(&[
        ("A", Behavior::FailsOpen),
        ("B", Behavior::FailsSelfCheck),
        ("C", Behavior::FailsSelfCheck),
    ]);
    let candidates = [profile("A"), profile("B"), profile("C")];

    let outcome = select_wiring(&mut driver, &candidates);
    assert!(matches!(outcome, ProbeOutcome::NotFound));

    {
        let log = driver.log.lock().unwrap();
        assert_eq!(log.opened, ["A", "B", "C"]);
        assert!(log.held.is_empty());
        assert_eq!(log.live_panels, 0);
        assert!(log.powered_on.is_empty());
    }

    // Probing again behaves the same
    let again = select_wiring(&mut driver, &candidates);
    assert!(matches!(again, ProbeOutcome::NotFound));
    let log = driver.log.lock().unwrap();
    assert_eq!(log.opened.len(), 6);
    assert!(log.held.is_empty());
    assert_eq!(log.live_panels, 0);
}

#[test]
fn test_each_candidate_tried_once() {
    let mut driver = FakeDriver::new(&[]);
    let candidates = [profile("A"), profile("B")];

    let outcome = select_wiring(&mut driver, &candidates);

    assert!(matches!(outcome, ProbeOutcome::NotFound));
    assert_eq!(driver.log.lock().unwrap().opened, ["A", "B"]);
}

#[test]
fn test_empty_candidate_list_is_headless() {
    let mut driver = FakeDriver::new(&[]);
    let (wiring, mut display) = select_wiring(&mut driver, &[]).into_display();

    assert!(wiring.is_none());
    // Headless display accepts every view
    display.draw_boot("ready");
    display.draw_chat("hi", "hello");
}

#[test]
fn test_host_probe_falls_back_to_console() {
    let mut driver = ConsoleDriver::new();
    let candidates = default_candidates();

    let outcome = select_wiring(&mut driver, &candidates);

    let selected = outcome.profile().cloned();
    assert_eq!(selected, candidates.last().cloned());
    assert!(selected.unwrap().pins().is_none());
}

#[test]
fn test_console_panel_renders_views() {
    let mut panel = ConsolePanel::new(Vec::new());
    panel.draw_boot("Beacon ready");
    panel.draw_chat("(wake)", "Yes? I'm listening.");

    let out = String::from_utf8(panel.into_inner()).unwrap();
    assert_eq!(out, "── Beacon ready ──\n  > (wake)\n  < Yes? I'm listening.\n");
}

#[test]
fn test_profile_display_names_pins() {
    let text = profile("A").to_string();
    assert!(text.starts_with("A (spi0"));
    assert!(text.contains("DC=3"));

    assert_eq!(WiringProfile::console("Term").to_string(), "Term (console)");
}
