use oor_marker::{Capabilities, Engine, MarkerConfig};
use proptest::collection::vec;
use proptest::prelude::*;
use proptest::test_runner::TestCaseResult;

const DEFAULT_SCHEDULER_PROPTEST_CASES: u32 = 128;

fn scheduler_proptest_cases() -> u32 {
    std::env::var("OOR_MARKER_PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_SCHEDULER_PROPTEST_CASES)
}

#[derive(Clone, Debug)]
enum HostAction {
    RenderFinished,
    AjaxListing,
    AjaxUnrelated,
    Advance(i64),
    AppendFlaggedRow,
    AppendQuietRow,
    ManualRescan,
}

fn host_action_strategy() -> BoxedStrategy<HostAction> {
    prop_oneof![
        4 => Just(HostAction::RenderFinished),
        3 => Just(HostAction::AjaxListing),
        2 => Just(HostAction::AjaxUnrelated),
        6 => (0i64..300).prop_map(HostAction::Advance),
        2 => Just(HostAction::AppendFlaggedRow),
        2 => Just(HostAction::AppendQuietRow),
        1 => Just(HostAction::ManualRescan),
    ]
    .boxed()
}

fn listing_fixture() -> String {
    r#"
    <table class="listing">
      <thead><tr><th>Sample ID</th><th>Status</th></tr></thead>
      <tbody>
        <tr data-review-state="verified"><td>AP-0001</td><td>out of range</td></tr>
        <tr data-review-state="verified"><td>AP-0002</td><td>fine</td></tr>
      </tbody>
    </table>
    "#
    .to_string()
}

fn build_engine() -> oor_marker::Result<Engine> {
    let mut engine = Engine::new(MarkerConfig::relaxed(), Capabilities::default());
    engine.load_html(&listing_fixture())?;
    Ok(engine)
}

fn run_action(engine: &mut Engine, action: &HostAction, next_row: &mut usize) -> oor_marker::Result<()> {
    match action {
        HostAction::RenderFinished => engine.dispatch_render_finished(),
        HostAction::AjaxListing => {
            engine.notify_ajax_complete("https://lims.example/folderitems?b_start=0")
        }
        HostAction::AjaxUnrelated => {
            engine.notify_ajax_complete("https://lims.example/portal_catalog")
        }
        HostAction::Advance(delta) => engine.advance_time(*delta)?,
        HostAction::AppendFlaggedRow => {
            *next_row += 1;
            engine.insert_html(
                "table.listing > tbody",
                &format!(
                    r#"<tr id="gen-{next_row}" data-review-state="verified">
                         <td>AP-1{next_row:03}</td><td>out of range</td></tr>"#
                ),
            )?;
        }
        HostAction::AppendQuietRow => {
            *next_row += 1;
            engine.insert_html(
                "table.listing > tbody",
                &format!(
                    r#"<tr id="gen-{next_row}" data-review-state="verified">
                         <td>AP-1{next_row:03}</td><td>fine</td></tr>"#
                ),
            )?;
        }
        HostAction::ManualRescan => {
            engine.rescan();
        }
    }
    Ok(())
}

fn to_case_error(err: oor_marker::Error) -> proptest::test_runner::TestCaseError {
    proptest::test_runner::TestCaseError::fail(format!("{err:?}"))
}

/// Marks only ever accumulate, a settled document stays settled, and a
/// final quiesce leaves every data row processed.
fn assert_marking_is_monotonic_and_convergent(actions: &[HostAction]) -> TestCaseResult {
    let mut engine = build_engine().map_err(to_case_error)?;
    let mut next_row = 0usize;
    let mut high_water = 0usize;

    for action in actions {
        run_action(&mut engine, action, &mut next_row).map_err(to_case_error)?;
        let marked = engine.marked_row_count();
        prop_assert!(
            marked >= high_water,
            "marked rows regressed: {marked} < {high_water}"
        );
        high_water = high_water.max(marked);
    }

    // quiesce: let every pending debounce and settle pass run
    engine.flush().map_err(to_case_error)?;
    engine.rescan();
    let marked = engine.marked_row_count();
    prop_assert!(marked >= high_water);

    // a further scan on the unchanged document changes nothing
    let stats = engine.scan();
    prop_assert_eq!(stats.rows_marked, 0);
    prop_assert_eq!(stats.rows_processed, 0);
    prop_assert_eq!(engine.marked_row_count(), marked);
    Ok(())
}

/// However many triggers land inside one debounce window, exactly one
/// scan runs when the window elapses.
fn assert_trigger_bursts_coalesce(burst: usize) -> TestCaseResult {
    let mut engine = build_engine().map_err(to_case_error)?;
    for _ in 0..burst {
        engine.dispatch_render_finished();
    }
    engine.advance_time(100).map_err(to_case_error)?;
    prop_assert_eq!(engine.scan_count(), 1);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: scheduler_proptest_cases(),
        .. ProptestConfig::default()
    })]

    #[test]
    fn marking_is_monotonic_under_arbitrary_host_activity(
        actions in vec(host_action_strategy(), 1..=32)
    ) {
        assert_marking_is_monotonic_and_convergent(&actions)?;
    }

    #[test]
    fn trigger_bursts_always_coalesce_into_one_scan(burst in 1usize..=20) {
        assert_trigger_bursts_coalesce(burst)?;
    }
}
