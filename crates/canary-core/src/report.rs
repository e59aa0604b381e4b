use crate::payload::Response;

/// One line of the assessment table.
pub struct AssessmentRow {
    pub metric: String,
    pub met: bool,
    pub abort: bool,
    pub conclusions: String,
}

pub fn assessment_rows(response: &Response) -> Vec<AssessmentRow> {
    response
        .assessment
        .success_criteria
        .iter()
        .map(|c| AssessmentRow {
            metric: c.metric_name.clone(),
            met: c.success_criteria_met,
            abort: c.abort_experiment,
            conclusions: c.conclusions.join("; "),
        })
        .collect()
}

/// Print the traffic split and per-metric verdicts as an aligned table.
pub fn print_assessment(response: &Response) {
    println!(
        "traffic: baseline {:.1}%  candidate {:.1}%",
        response.baseline.traffic_percentage, response.candidate.traffic_percentage
    );
    let summary = &response.assessment.summary;
    println!(
        "summary: all criteria met: {}  abort: {}",
        yes_no(summary.all_success_criteria_met),
        yes_no(response.should_abort())
    );
    for line in &summary.conclusions {
        println!("  - {line}");
    }

    let rows = assessment_rows(response);
    if rows.is_empty() {
        println!("(no success criteria reported)");
        return;
    }
    let w_metric = rows.iter().map(|r| r.metric.len()).max().unwrap_or(6).max(6);
    println!("{:<w_metric$}  {:<3}  {:<5}  CONCLUSIONS", "METRIC", "MET", "ABORT");
    println!(
        "{:<w_metric$}  {:<3}  {:<5}  -----------",
        "-".repeat(w_metric),
        "---",
        "-----"
    );
    for r in &rows {
        println!(
            "{:<w_metric$}  {:<3}  {:<5}  {}",
            r.metric,
            yes_no(r.met),
            yes_no(r.abort),
            r.conclusions
        );
    }
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}
