use super::*;

#[test]
fn pre_existing_alert_class_wins_regardless_of_content() -> Result<()> {
    let html = listing(
        r#"<tr id="r1" class="row-flag-alert" data-review-state="verified">
             <td>AP-0001</td><td>Verified</td><td>value: 5 mg/dL</td>
           </tr>"#,
    );
    let engine = engine_with(&html)?;
    let classification = engine.classify_row("#r1")?;
    assert!(classification.relevant);
    assert!(classification.out_of_range);
    Ok(())
}

#[test]
fn pre_existing_alert_attribute_wins() -> Result<()> {
    let html = listing(
        r#"<tr id="r1" data-row-alert="1" data-review-state="verified">
             <td>AP-0001</td><td>Verified</td><td>all good</td>
           </tr>"#,
    );
    let engine = engine_with(&html)?;
    assert!(engine.classify_row("#r1")?.out_of_range);
    Ok(())
}

#[test]
fn explicit_data_flags_on_row_and_descendants_are_trusted() -> Result<()> {
    let html = listing(
        r#"<tr id="r1" data-has-oor="1" data-review-state="verified">
             <td>AP-0001</td><td>Verified</td><td>3</td>
           </tr>
           <tr id="r2" data-review-state="verified">
             <td>AP-0002</td><td>Verified</td><td><span data-oor="1">3</span></td>
           </tr>"#,
    );
    let engine = engine_with(&html)?;
    assert!(engine.classify_row("#r1")?.out_of_range);
    assert!(engine.classify_row("#r2")?.out_of_range);
    Ok(())
}

#[test]
fn class_hints_on_row_or_cell_are_detected() -> Result<()> {
    let html = listing(
        r#"<tr id="r1" class="state-active critical" data-review-state="verified">
             <td>AP-0001</td><td>Verified</td><td>3</td>
           </tr>
           <tr id="r2" data-review-state="verified">
             <td>AP-0002</td><td class="range-alert">Verified</td><td>3</td>
           </tr>"#,
    );
    let engine = engine_with(&html)?;
    assert!(engine.classify_row("#r1")?.out_of_range);
    assert!(engine.classify_row("#r2")?.out_of_range);
    Ok(())
}

#[test]
fn class_hints_match_whole_tokens_only() -> Result<()> {
    // "alerted" must not match the "alert" hint
    let html = listing(
        r#"<tr id="r1" class="alerted" data-review-state="verified">
             <td>AP-0001</td><td>Verified</td><td>3</td>
           </tr>"#,
    );
    let engine = engine_with(&html)?;
    assert!(!engine.classify_row("#r1")?.out_of_range);
    Ok(())
}

#[test]
fn icon_sources_alt_text_and_icon_fonts_are_hints() -> Result<()> {
    let html = listing(
        r##"<tr id="r1" data-review-state="verified">
             <td>AP-0001</td><td>Verified</td>
             <td><img src="/++resource++senaite/exclamation_red.svg"></td>
           </tr>
           <tr id="r2" data-review-state="verified">
             <td>AP-0002</td><td>Verified</td>
             <td><img src="/icons/flag.svg" alt="warning icon"></td>
           </tr>
           <tr id="r3" data-review-state="verified">
             <td>AP-0003</td><td>Verified</td>
             <td><svg><use href="#icon-warning"></use></svg></td>
           </tr>
           <tr id="r4" data-review-state="verified">
             <td>AP-0004</td><td>Verified</td>
             <td><i class="fas fa-exclamation-triangle"></i></td>
           </tr>"##,
    );
    let engine = engine_with(&html)?;
    for selector in ["#r1", "#r2", "#r3", "#r4"] {
        assert!(
            engine.classify_row(selector)?.out_of_range,
            "{selector} should hit an icon hint"
        );
    }
    Ok(())
}

#[test]
fn free_text_hints_match_in_any_language() -> Result<()> {
    let html = listing(
        r#"<tr id="r1" data-review-state="verified">
             <td>AP-0001</td><td>Verified</td><td>Glucose: fuera de rango</td>
           </tr>
           <tr id="r2" data-review-state="verified">
             <td>AP-0002</td><td>Verified</td><td>Result out of range</td>
           </tr>
           <tr id="r3" data-review-state="verified">
             <td>AP-0003</td><td>Verified</td><td>panic value</td>
           </tr>"#,
    );
    let engine = engine_with(&html)?;
    assert!(engine.classify_row("#r1")?.out_of_range);
    assert!(engine.classify_row("#r2")?.out_of_range);
    assert!(engine.classify_row("#r3")?.out_of_range);
    Ok(())
}

#[test]
fn status_column_fallback_finds_nested_hints_other_layers_miss() -> Result<()> {
    // the hint class sits on a span nested inside a status cell, out of
    // reach of the row/cell class layer
    let html = listing(
        r#"<tr id="r1" data-review-state="verified">
             <td>AP-0001</td>
             <td class="column-state"><span class="range-alert">check</span></td>
             <td>3</td>
           </tr>"#,
    );
    let engine = engine_with(&html)?;
    assert!(engine.classify_row("#r1")?.out_of_range);
    Ok(())
}

#[test]
fn nested_hint_outside_status_columns_stays_invisible() -> Result<()> {
    let html = listing(
        r#"<tr id="r1" data-review-state="verified">
             <td>AP-0001</td>
             <td class="column-client"><span class="range-alert">check</span></td>
             <td>3</td>
           </tr>"#,
    );
    let engine = engine_with(&html)?;
    assert!(!engine.classify_row("#r1")?.out_of_range);
    Ok(())
}

#[test]
fn irrelevant_review_state_short_circuits_before_markers() -> Result<()> {
    // scenario C: cancelled sample with an alert icon stays unflagged
    let html = listing(
        r#"<tr id="r1">
             <td>AP-0001</td><td>Cancelled</td>
             <td><img src="/icons/x.svg" alt="warning icon"></td>
           </tr>"#,
    );
    let engine = engine_with(&html)?;
    let classification = engine.classify_row("#r1")?;
    assert!(!classification.relevant);
    assert!(!classification.out_of_range);
    Ok(())
}

#[test]
fn relevance_comes_from_state_attribute_or_rendered_text() -> Result<()> {
    let html = listing(
        r#"<tr id="r1" data-review-state="to_be_verified">
             <td>AP-0001</td><td></td><td>3</td>
           </tr>
           <tr id="r2">
             <td>AP-0002</td><td>Pending verification</td><td>3</td>
           </tr>"#,
    );
    let engine = engine_with(&html)?;
    assert!(engine.classify_row("#r1")?.relevant);
    assert!(engine.classify_row("#r2")?.relevant);
    Ok(())
}

#[test]
fn quiet_relevant_row_classifies_negative() -> Result<()> {
    // scenario B: verified, no marker, no hint anywhere
    let html = listing(
        r#"<tr id="r1" data-review-state="verified">
             <td>AP-0001</td><td>Verified</td><td>value: 5 mg/dL</td>
           </tr>"#,
    );
    let engine = engine_with(&html)?;
    let classification = engine.classify_row("#r1")?;
    assert!(classification.relevant);
    assert!(!classification.out_of_range);
    Ok(())
}

#[test]
fn malformed_rows_degrade_to_negative() -> Result<()> {
    let html = listing(r#"<tr id="r1"></tr>"#);
    let engine = engine_with(&html)?;
    let classification = engine.classify_row("#r1")?;
    assert!(!classification.relevant);
    assert!(!classification.out_of_range);
    Ok(())
}
