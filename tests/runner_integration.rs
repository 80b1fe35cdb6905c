//! Integration tests for scenario execution against the mock browser

use std::fs;
use std::path::Path;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use ui_scenario::{
    MockBrowser, MockElement, MockPage, Observation, Runner, RunnerConfig, Scenario,
    ScenarioStatus, Session, Step, StepError, StepOutcome,
};

/// Site root with empty page files so navigation targets resolve
fn site(pages: &[&str]) -> TempDir {
    let dir = TempDir::new().expect("Failed to create site dir");
    for page in pages {
        fs::write(dir.path().join(page), "<html></html>").expect("Failed to write page");
    }
    dir
}

fn config(site_root: &Path) -> RunnerConfig {
    RunnerConfig::default()
        .site_root(site_root)
        .navigation_timeout(Duration::from_secs(5))
        .action_timeout(Duration::from_secs(2))
        .click_retry_backoff(Duration::from_millis(10))
        .strict_selectors(false)
}

fn register_page() -> MockPage {
    MockPage::new("Register")
        .element("input[name=name]", MockElement::input("name").required())
        .element("input[name=email]", MockElement::input("email").required())
        .element("input[type=submit]", MockElement::submit_button())
        .submit_alert("Registration successful")
}

fn browser() -> MockBrowser {
    MockBrowser::new()
        .viewport(64, 48)
        .page("register.html", register_page())
        .page(
            "enquiry.html",
            MockPage::new("Enquiry")
                .element("input[name=topic]", MockElement::input("topic"))
                .element("#send", MockElement::new("button").alert_on_click("Enquiry sent")),
        )
}

#[tokio::test]
async fn test_fill_then_assert_value_passes() {
    let site = site(&["register.html"]);
    let out = TempDir::new().unwrap();
    let session = Session::in_dir(out.path());
    let runner = Runner::new(&session, config(site.path()));
    let mut driver = browser();

    let scenario = Scenario::new(
        "fill-email",
        "register.html",
        vec![
            Step::navigate("register.html"),
            Step::fill("input[name=email]", "a@b.com"),
            Step::assert_value("input[name=email]", "a@b.com"),
        ],
    )
    .unwrap();

    let result = runner.run(&scenario, &mut driver).await;
    assert_eq!(result.status(), ScenarioStatus::Success, "{}", result);
    assert_eq!(result.steps().len(), 3);
    assert!(result.steps().iter().all(|s| s.outcome == StepOutcome::Success));
}

#[tokio::test]
async fn test_fill_replaces_existing_value() {
    let site = site(&["register.html"]);
    let out = TempDir::new().unwrap();
    let session = Session::in_dir(out.path());
    let runner = Runner::new(&session, config(site.path()));
    let mut driver = MockBrowser::new().page(
        "register.html",
        MockPage::new("Register")
            .element("input[name=email]", MockElement::input("email").value("old@x.org")),
    );

    let scenario = Scenario::new(
        "refill",
        "register.html",
        vec![
            Step::navigate("register.html"),
            Step::fill("input[name=email]", "new@x.org"),
            Step::assert_value("input[name=email]", "new@x.org"),
        ],
    )
    .unwrap();

    let result = runner.run(&scenario, &mut driver).await;
    assert!(result.is_success(), "{}", result);
}

#[tokio::test]
async fn test_missing_element_fails_and_skips_rest() {
    let site = site(&["register.html"]);
    let out = TempDir::new().unwrap();
    let session = Session::in_dir(out.path());
    let runner = Runner::new(&session, config(site.path()));
    let mut driver = browser();

    let scenario = Scenario::new(
        "missing-field",
        "register.html",
        vec![
            Step::navigate("register.html"),
            Step::fill("input[name=phone]", "555"),
            Step::click("input[type=submit]"),
            Step::screenshot("never"),
        ],
    )
    .unwrap();

    let result = runner.run(&scenario, &mut driver).await;
    assert_eq!(result.status(), ScenarioStatus::Failed);

    let failure = result.first_failure().expect("a failed step");
    assert_eq!(failure.index, 1);
    assert_eq!(
        failure.error(),
        Some(&StepError::ElementNotFound {
            selector: "input[name=phone]".to_string()
        })
    );
    for step in &result.steps()[2..] {
        assert!(matches!(step.outcome, StepOutcome::Skipped { .. }));
    }
    assert_eq!(driver.click_attempts("input[type=submit]"), 0);
    assert_eq!(session.list_captures().unwrap().len(), 0);
}

#[tokio::test]
async fn test_repeated_screenshot_labels_get_distinct_paths() {
    let site = site(&["register.html"]);
    let out = TempDir::new().unwrap();
    let session = Session::in_dir(out.path());
    let runner = Runner::new(&session, config(site.path()));
    let mut driver = browser();

    let scenario = Scenario::new(
        "shots",
        "register.html",
        vec![
            Step::navigate("register.html"),
            Step::screenshot("form"),
            Step::fill("input[name=name]", "Ada"),
            Step::screenshot("form"),
        ],
    )
    .unwrap();

    let result = runner.run(&scenario, &mut driver).await;
    assert!(result.is_success(), "{}", result);

    let artifacts: Vec<_> = result.artifacts().cloned().collect();
    assert_eq!(artifacts.len(), 2);
    assert_ne!(artifacts[0], artifacts[1]);
    for artifact in &artifacts {
        assert!(artifact.exists());
        let img = image::open(artifact).expect("artifact is a PNG");
        assert_eq!((img.width(), img.height()), (64, 48));
    }
    assert_eq!(session.list_captures().unwrap(), artifacts);
}

#[tokio::test]
async fn test_empty_submit_yields_exactly_one_observation() {
    let site = site(&["register.html"]);
    let out = TempDir::new().unwrap();
    let session = Session::in_dir(out.path());
    let runner = Runner::new(&session, config(site.path()));
    let mut driver = browser();

    let scenario = Scenario::new(
        "register-empty",
        "register.html",
        vec![
            Step::navigate("register.html"),
            Step::click("input[type=submit]"),
            Step::expect_dialog_or_validation(200),
            Step::screenshot("after-submit"),
        ],
    )
    .unwrap();

    let result = runner.run(&scenario, &mut driver).await;
    assert!(result.is_success(), "{}", result);
    assert_eq!(
        result.steps()[2].observation,
        Some(Observation::ValidationBlocked {
            first_invalid: Some("name".to_string())
        })
    );
    assert!(driver.accepted_dialogs().is_empty());
    assert_eq!(result.artifacts().count(), 1);
}

#[tokio::test]
async fn test_valid_submit_accepts_dialog() {
    let site = site(&["register.html"]);
    let out = TempDir::new().unwrap();
    let session = Session::in_dir(out.path());
    let runner = Runner::new(&session, config(site.path()));
    let mut driver = browser();

    let scenario = Scenario::new(
        "register-ok",
        "register.html",
        vec![
            Step::navigate("register.html"),
            Step::fill("input[name=name]", "Ada"),
            Step::fill("input[name=email]", "ada@example.org"),
            Step::click("input[type=submit]"),
            Step::expect_dialog_or_validation(1000),
        ],
    )
    .unwrap();

    let result = runner.run(&scenario, &mut driver).await;
    assert!(result.is_success(), "{}", result);
    assert_eq!(
        result.steps()[4].observation,
        Some(Observation::Dialog {
            message: "Registration successful".to_string()
        })
    );
    assert_eq!(driver.accepted_dialogs(), ["Registration successful".to_string()]);
}

#[tokio::test]
async fn test_second_dialog_check_sees_no_dialog() {
    let site = site(&["enquiry.html"]);
    let out = TempDir::new().unwrap();
    let session = Session::in_dir(out.path());
    let runner = Runner::new(&session, config(site.path()));
    let mut driver = browser();

    let scenario = Scenario::new(
        "enquiry-twice",
        "enquiry.html",
        vec![
            Step::navigate("enquiry.html"),
            Step::click("#send"),
            Step::expect_dialog_or_validation(500),
            Step::expect_dialog_or_validation(100),
        ],
    )
    .unwrap();

    let result = runner.run(&scenario, &mut driver).await;
    assert!(result.is_success(), "{}", result);
    assert!(matches!(
        result.steps()[2].observation,
        Some(Observation::Dialog { .. })
    ));
    // The dialog was accepted once; nothing is left to accept
    assert_eq!(
        result.steps()[3].observation,
        Some(Observation::ValidationBlocked { first_invalid: None })
    );
    assert_eq!(driver.accepted_dialogs().len(), 1);
}

#[tokio::test]
async fn test_ambiguous_selector_policy() {
    let site = site(&["list.html"]);
    let page = MockPage::new("List")
        .element(".item", MockElement::new("li"))
        .element(".item", MockElement::new("li"));
    let scenario = Scenario::new(
        "ambiguous",
        "list.html",
        vec![Step::navigate("list.html"), Step::click(".item")],
    )
    .unwrap();
    let out = TempDir::new().unwrap();
    let session = Session::in_dir(out.path());

    let lenient = Runner::new(&session, config(site.path()));
    let mut driver = MockBrowser::new().page("list.html", page.clone());
    let result = lenient.run(&scenario, &mut driver).await;
    assert!(result.is_success(), "{}", result);
    assert_eq!(driver.click_attempts(".item"), 1);

    let strict = Runner::new(&session, config(site.path()).strict_selectors(true));
    let mut driver = MockBrowser::new().page("list.html", page);
    let result = strict.run(&scenario, &mut driver).await;
    assert_eq!(
        result.first_failure().and_then(|s| s.error()),
        Some(&StepError::AmbiguousSelector {
            selector: ".item".to_string(),
            count: 2
        })
    );
    assert_eq!(driver.click_attempts(".item"), 0);
}

#[tokio::test]
async fn test_click_retries_once() {
    let site = site(&["overlay.html"]);
    let out = TempDir::new().unwrap();
    let session = Session::in_dir(out.path());
    let runner = Runner::new(&session, config(site.path()));
    let scenario = Scenario::new(
        "overlay",
        "overlay.html",
        vec![Step::navigate("overlay.html"), Step::click("#go")],
    )
    .unwrap();

    let mut driver = MockBrowser::new().page(
        "overlay.html",
        MockPage::new("Overlay").element("#go", MockElement::new("button").unclickable_for(1)),
    );
    let result = runner.run(&scenario, &mut driver).await;
    assert!(result.is_success(), "{}", result);
    assert_eq!(driver.click_attempts("#go"), 2);

    let mut driver = MockBrowser::new().page(
        "overlay.html",
        MockPage::new("Overlay").element("#go", MockElement::new("button").unclickable_for(3)),
    );
    let result = runner.run(&scenario, &mut driver).await;
    assert!(matches!(
        result.first_failure().and_then(|s| s.error()),
        Some(StepError::InteractionError { selector, .. }) if selector == "#go"
    ));
    assert_eq!(driver.click_attempts("#go"), 2);
}

#[tokio::test]
async fn test_missing_page_is_navigation_error() {
    let site = site(&[]);
    let out = TempDir::new().unwrap();
    let session = Session::in_dir(out.path());
    let runner = Runner::new(&session, config(site.path()));
    let mut driver = browser();

    let scenario = Scenario::new(
        "missing-page",
        "nope.html",
        vec![Step::navigate("nope.html"), Step::screenshot("x")],
    )
    .unwrap();

    let result = runner.run(&scenario, &mut driver).await;
    match result.steps()[0].error() {
        Some(StepError::NavigationError { target, reason }) => {
            assert_eq!(target, "nope.html");
            assert!(reason.starts_with("File not found"), "{}", reason);
        }
        other => panic!("expected NavigationError, got {:?}", other),
    }
    assert!(driver.navigations().is_empty());
    assert!(matches!(result.steps()[1].outcome, StepOutcome::Skipped { .. }));
}

#[tokio::test]
async fn test_page_that_never_loads_times_out_as_navigation_error() {
    let site = site(&["slow.html"]);
    let out = TempDir::new().unwrap();
    let session = Session::in_dir(out.path());
    let runner = Runner::new(
        &session,
        config(site.path()).navigation_timeout(Duration::from_millis(200)),
    );
    let mut driver = MockBrowser::new().page("slow.html", MockPage::new("Slow").never_ready());

    let scenario =
        Scenario::new("slow", "slow.html", vec![Step::navigate("slow.html")]).unwrap();
    let result = runner.run(&scenario, &mut driver).await;
    assert!(matches!(
        result.steps()[0].error(),
        Some(StepError::NavigationError { .. })
    ));
}

#[tokio::test]
async fn test_page_ready_after_polling() {
    let site = site(&["late.html"]);
    let out = TempDir::new().unwrap();
    let session = Session::in_dir(out.path());
    let runner = Runner::new(&session, config(site.path()));
    let mut driver = MockBrowser::new().page("late.html", MockPage::new("Late").ready_after(3));

    let scenario = Scenario::new(
        "late",
        "late.html",
        vec![Step::navigate("late.html"), Step::AssertTitle(Some("Late".into()))],
    )
    .unwrap();
    let result = runner.run(&scenario, &mut driver).await;
    assert!(result.is_success(), "{}", result);
    assert_eq!(
        result.steps()[1].observation,
        Some(Observation::Title {
            title: "Late".to_string()
        })
    );
}

#[tokio::test]
async fn test_hung_step_times_out() {
    let site = site(&["register.html"]);
    let out = TempDir::new().unwrap();
    let session = Session::in_dir(out.path());
    let runner = Runner::new(
        &session,
        config(site.path()).action_timeout(Duration::from_millis(100)),
    );
    let mut driver = browser().hang_on("#spinner");

    let scenario = Scenario::new(
        "hang",
        "register.html",
        vec![
            Step::navigate("register.html"),
            Step::click("#spinner"),
            Step::screenshot("after"),
        ],
    )
    .unwrap();

    let result = runner.run(&scenario, &mut driver).await;
    assert!(matches!(
        result.steps()[1].error(),
        Some(StepError::Timeout { .. })
    ));
    assert!(matches!(result.steps()[2].outcome, StepOutcome::Skipped { .. }));
}

#[tokio::test]
async fn test_assert_value_mismatch_reports_both_values() {
    let site = site(&["register.html"]);
    let out = TempDir::new().unwrap();
    let session = Session::in_dir(out.path());
    let runner = Runner::new(&session, config(site.path()));
    let mut driver = browser();

    let scenario = Scenario::new(
        "mismatch",
        "register.html",
        vec![
            Step::navigate("register.html"),
            Step::fill("input[name=email]", "a@b.com"),
            Step::assert_value("input[name=email]", "c@d.com"),
        ],
    )
    .unwrap();

    let result = runner.run(&scenario, &mut driver).await;
    assert_eq!(
        result.steps()[2].error(),
        Some(&StepError::AssertionFailed {
            subject: "value of 'input[name=email]'".to_string(),
            expected: "c@d.com".to_string(),
            actual: "a@b.com".to_string(),
        })
    );
}

#[tokio::test]
async fn test_batch_exit_code_and_manifest() {
    let site = site(&["register.html", "enquiry.html"]);
    let out = TempDir::new().unwrap();
    let session = Session::in_dir(out.path().join("run"));
    session.init().unwrap();
    let runner = Runner::new(&session, config(site.path()));
    let mut driver = browser();

    let passing = Scenario::new(
        "enquiry",
        "enquiry.html",
        vec![
            Step::navigate("enquiry.html"),
            Step::fill("input[name=topic]", "Pricing"),
            Step::screenshot("filled"),
        ],
    )
    .unwrap();
    let failing = Scenario::new(
        "broken",
        "register.html",
        vec![Step::navigate("register.html"), Step::click("#does-not-exist")],
    )
    .unwrap();

    let batch = runner
        .run_batch(&[passing.clone(), failing], &mut driver)
        .await;
    assert_eq!((batch.passed(), batch.failed()), (1, 1));
    assert_eq!(batch.exit_code(), 1);

    let manifest = session.write_manifest(&batch.results).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(manifest).unwrap()).unwrap();
    assert_eq!(json["scenarios"].as_array().unwrap().len(), 2);
    assert_eq!(json["scenarios"][1]["status"], "failed");

    let batch = runner.run_batch(&[passing], &mut driver).await;
    assert_eq!(batch.exit_code(), 0);
}

/// Scenario that screenshots once, then has a step that must be skipped on failure
fn screenshot_then_fill(name: &str) -> Scenario {
    Scenario::new(
        name,
        "register.html",
        vec![
            Step::navigate("register.html"),
            Step::screenshot("x"),
            Step::fill("input[name=email]", "a@b.com"),
        ],
    )
    .unwrap()
}

fn assert_artifact_failure(result: &ui_scenario::ScenarioResult, reason_part: &str) {
    let shot = &result.steps()[1];
    match shot.error() {
        Some(StepError::ArtifactError { reason }) => {
            assert!(reason.contains(reason_part), "{}", reason)
        }
        other => panic!("expected ArtifactError, got {:?}", other),
    }
    assert!(shot.artifacts.is_empty());
    assert!(matches!(result.steps()[2].outcome, StepOutcome::Skipped { .. }));
    assert_eq!(result.artifacts().count(), 0);
}

#[tokio::test]
async fn test_screenshot_capture_failure_is_artifact_error() {
    let site = site(&["register.html"]);
    let out = TempDir::new().unwrap();
    let session = Session::in_dir(out.path());
    let runner = Runner::new(&session, config(site.path()));
    let mut driver = browser().failing_screenshots();

    let result = runner.run(&screenshot_then_fill("capture-fails"), &mut driver).await;
    assert_artifact_failure(&result, "capture failed");
    assert!(session.list_captures().unwrap().is_empty());
}

#[tokio::test]
async fn test_screenshot_that_is_not_an_image_is_artifact_error() {
    let site = site(&["register.html"]);
    let out = TempDir::new().unwrap();
    let session = Session::in_dir(out.path());
    let runner = Runner::new(&session, config(site.path()));
    let mut driver = browser().screenshot_bytes(b"definitely not a png");

    let result = runner.run(&screenshot_then_fill("garbage"), &mut driver).await;
    assert_artifact_failure(&result, "not an image");
    assert!(session.list_captures().unwrap().is_empty());
}

#[tokio::test]
async fn test_screenshot_save_failure_is_artifact_error() {
    let site = site(&["register.html"]);
    let out = TempDir::new().unwrap();
    // The first artifact path of this session is already taken
    let occupied = out.path().join("occupied_0001_x.png");
    fs::write(&occupied, b"earlier run").unwrap();

    let session = Session::in_dir(out.path());
    let runner = Runner::new(&session, config(site.path()));
    let mut driver = browser();

    let result = runner.run(&screenshot_then_fill("occupied"), &mut driver).await;
    assert_artifact_failure(&result, "occupied_0001_x.png");
    assert_eq!(fs::read(&occupied).unwrap(), b"earlier run");
}

#[tokio::test]
async fn test_missing_file_url_is_navigation_error() {
    let site = site(&["register.html"]);
    let out = TempDir::new().unwrap();
    let session = Session::in_dir(out.path());
    let runner = Runner::new(&session, config(site.path()));
    // The browser would happily render an error page for this URL
    let mut driver = MockBrowser::new().page("gone.html", MockPage::new("Not found"));

    let gone = url::Url::from_file_path(site.path().join("gone.html")).unwrap();
    let scenario = Scenario::new("gone", gone.as_str(), vec![Step::navigate(gone.as_str())]).unwrap();

    let result = runner.run(&scenario, &mut driver).await;
    match result.steps()[0].error() {
        Some(StepError::NavigationError { reason, .. }) => {
            assert!(reason.starts_with("File not found"), "{}", reason)
        }
        other => panic!("expected NavigationError, got {:?}", other),
    }
    assert!(driver.navigations().is_empty());
}

#[tokio::test]
async fn test_relative_target_keeps_query() {
    let site = site(&["register.html"]);
    let out = TempDir::new().unwrap();
    let session = Session::in_dir(out.path());
    let runner = Runner::new(&session, config(site.path()));
    let mut driver = browser();

    let scenario = Scenario::new(
        "query",
        "register.html",
        vec![Step::navigate("register.html?ref=mail#form"), Step::AssertTitle(Some("Register".into()))],
    )
    .unwrap();

    let result = runner.run(&scenario, &mut driver).await;
    assert!(result.is_success(), "{}", result);
    assert!(driver.navigations()[0].ends_with("register.html?ref=mail#form"));
}

#[tokio::test]
async fn test_reset_clears_filled_fields() {
    let site = site(&["register.html"]);
    let out = TempDir::new().unwrap();
    let session = Session::in_dir(out.path());
    let runner = Runner::new(&session, config(site.path()));
    let mut driver = MockBrowser::new().page(
        "register.html",
        MockPage::new("Register")
            .element("script[src]", MockElement::new("script").property("src", "scripts/register.js"))
            .element("input[name=email]", MockElement::input("email"))
            .element("input[name=phone]", MockElement::input("phone"))
            .element("input[type=reset]", MockElement::reset_button()),
    );

    let scenario = Scenario::new(
        "reset",
        "register.html",
        vec![
            Step::navigate("register.html"),
            Step::AssertPresent("script[src]".into()),
            Step::fill("input[name=email]", "test@example.com"),
            Step::fill("input[name=phone]", "0400000000"),
            Step::screenshot("before-reset"),
            Step::click("input[type=reset]"),
            Step::screenshot("after-reset"),
            Step::assert_value("input[name=email]", ""),
            Step::assert_value("input[name=phone]", ""),
        ],
    )
    .unwrap();

    let result = runner.run(&scenario, &mut driver).await;
    assert!(result.is_success(), "{}", result);
    assert_eq!(result.artifacts().count(), 2);
}

#[tokio::test]
async fn test_assert_title_contains() {
    let site = site(&["index.html"]);
    let out = TempDir::new().unwrap();
    let session = Session::in_dir(out.path());
    let runner = Runner::new(&session, config(site.path()));
    let mut driver =
        MockBrowser::new().page("index.html", MockPage::new("Root Flowers | Home"));

    let passing = Scenario::new(
        "title",
        "index.html",
        vec![
            Step::navigate("index.html"),
            Step::AssertTitleContains("Root Flower".into()),
        ],
    )
    .unwrap();
    let result = runner.run(&passing, &mut driver).await;
    assert!(result.is_success(), "{}", result);
    assert_eq!(
        result.steps()[1].observation,
        Some(Observation::Title {
            title: "Root Flowers | Home".to_string()
        })
    );

    let failing = Scenario::new(
        "title-wrong",
        "index.html",
        vec![
            Step::navigate("index.html"),
            Step::AssertTitleContains("Garden".into()),
        ],
    )
    .unwrap();
    let result = runner.run(&failing, &mut driver).await;
    assert_eq!(
        result.steps()[1].error(),
        Some(&StepError::AssertionFailed {
            subject: "document title".to_string(),
            expected: "contains 'Garden'".to_string(),
            actual: "Root Flowers | Home".to_string(),
        })
    );
}

#[tokio::test]
async fn test_assert_present_accepts_many_matches_even_when_strict() {
    let site = site(&["index.html"]);
    let out = TempDir::new().unwrap();
    let session = Session::in_dir(out.path());
    let runner = Runner::new(&session, config(site.path()).strict_selectors(true));
    let mut driver = MockBrowser::new().page(
        "index.html",
        MockPage::new("Home")
            .element("a", MockElement::new("a"))
            .element("a", MockElement::new("a")),
    );

    let scenario = Scenario::new(
        "present",
        "index.html",
        vec![
            Step::navigate("index.html"),
            Step::AssertPresent("a".into()),
            Step::AssertPresent("nav".into()),
            Step::screenshot("never"),
        ],
    )
    .unwrap();

    let result = runner.run(&scenario, &mut driver).await;
    assert_eq!(result.steps()[1].outcome, StepOutcome::Success);
    assert_eq!(
        result.steps()[2].error(),
        Some(&StepError::ElementNotFound {
            selector: "nav".to_string()
        })
    );
    assert!(matches!(result.steps()[3].outcome, StepOutcome::Skipped { .. }));
}
