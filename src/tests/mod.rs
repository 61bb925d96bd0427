use super::*;

mod classifier_heuristics;

/// Relaxed engine (no route gate) with `html` loaded and the initial
/// load-triggered scan not yet run.
pub(crate) fn engine_with(html: &str) -> Result<Engine> {
    let mut engine = Engine::new(MarkerConfig::relaxed(), Capabilities::default());
    engine.load_html(html)?;
    Ok(engine)
}

pub(crate) fn listing(rows: &str) -> String {
    format!(
        r#"
        <table class="listing">
          <thead>
            <tr><th>Sample ID</th><th>Status</th><th>Result</th></tr>
          </thead>
          <tbody>
            {rows}
          </tbody>
        </table>
        "#
    )
}
