use crate::recovery::RecoveredDocument;

/// Rendered in place of a report when the analysis stage produced nothing usable.
pub const THROTTLING_FALLBACK: &str = "Agent invoke error: An error occurred (throttlingException) \
when calling the InvokeAgent operation: Your request rate is too high. Reduce the frequency of \
requests. Check your model invocation quotas to find the acceptable frequency.";

const ANALYSIS_TEMPLATE: &str = r#"
You are an expert in Infrastructure as Code (IaC) drift analysis and remediation.
Combine the two drift analysis reports below into one report. The first proposes removing the
drifted source resources, the second proposes updating the IaC definitions. Keep every drift issue
from both reports, merge duplicates, and attach both remediation options to each issue so the
reader can choose between them.

Steps:
1. Read the remove-source remediation report.
2. Read the update-IaC remediation report.
3. Extract every drift issue from both reports without duplicates.
4. For each issue, list the update-IaC suggestion and the remove-source suggestion.
5. For each issue, show the offending configuration and link the terraform source from the
   knowledge base: IaC configuration lives under `iac_config/`, desired AWS state under
   `aws_state/` (ignore resources whose status is deleted).

Remove-source remediation report:
```
{remove_remediation}
```

Update-IaC remediation report:
```
{update_remediation}
```

Answer with JSON only, shaped like:
{
  "report_id": "drift-{date}",
  "total_drift": 5,
  "high_risk": 2,
  "drifted_resources": [
    {
      "resource_address": "aws_instance.example",
      "issue": "instance_type mismatch",
      "details": "Config: t3.micro -> t3.small | Source: main.tf#L12 | Desired: t3.micro",
      "remediation_update_iac": "Update instance_type = \"t3.micro\"",
      "remediation_remove_source": "N/A"
    }
  ],
  "summary": "5 drifts found, 2 high-risk",
  "content": "free-form narrative of the findings"
}

Never ask clarification questions. Start directly with the JSON, no delimiters.
"#;

const RENDER_TEMPLATE: &str = r#"
You are a web developer. Produce one self-contained HTML document presenting the drift analysis
report below as a landing page.

Design:
* Make it look polished, especially on mobile.
* Choose the layout or chart type that best presents the data.
* Use CSS only. Do not use JavaScript; the page must preview inside an email client.
* Theme: primary #246db5, secondary #5cadff, background #ffffff, text #1a1a1a,
  text on primary #ffffff.

Content:
* No placeholder content. Every value must come from the report.
* If the report is an "Agent invoke error" message, render that error prominently instead of a
  report.
* Return only the HTML document, with no surrounding commentary.

Drift analysis report:
```
{data}
```
"#;

pub fn analysis_prompt(update_remediation: &str, remove_remediation: &str, date: &str) -> String {
    fill_template(
        ANALYSIS_TEMPLATE,
        &[
            ("{date}", date),
            ("{remove_remediation}", remove_remediation),
            ("{update_remediation}", update_remediation),
        ],
    )
}

/// Text handed to the render stage: the recovered report, or the fallback
/// message when recovery came back empty.
pub fn report_payload(report: &RecoveredDocument) -> String {
    if report.is_empty() {
        THROTTLING_FALLBACK.to_string()
    } else {
        report.to_string()
    }
}

pub fn render_prompt(report_payload: &str) -> String {
    fill_template(RENDER_TEMPLATE, &[("{data}", report_payload)])
}

/// Substitutes placeholders in one pass over the template. Inserted values
/// are never scanned again.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        match values.iter().find(|(name, _)| tail.starts_with(name)) {
            Some((name, value)) => {
                out.push_str(value);
                rest = &tail[name.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::recover;

    #[test]
    fn analysis_prompt_embeds_inputs_and_date() {
        let prompt = analysis_prompt("UPDATE-TEXT", "REMOVE-TEXT", "2024-05-01 10:00:00");
        assert!(prompt.contains("UPDATE-TEXT"));
        assert!(prompt.contains("REMOVE-TEXT"));
        assert!(prompt.contains("drift-2024-05-01 10:00:00"));
        assert!(!prompt.contains("{update_remediation}"));
    }

    #[test]
    fn placeholder_text_in_inputs_is_left_alone() {
        let prompt = analysis_prompt(
            "UPDATE-TEXT",
            "see {update_remediation} and {date}",
            "2024-05-01 10:00:00",
        );
        assert!(prompt.contains("see {update_remediation} and {date}"));
        assert_eq!(prompt.matches("UPDATE-TEXT").count(), 1);
    }

    #[test]
    fn template_braces_survive_filling() {
        assert_eq!(
            fill_template(r#"{"a": {x}} {y"#, &[("{x}", "1")]),
            r#"{"a": 1} {y"#
        );
    }

    #[test]
    fn empty_report_becomes_fallback() {
        let payload = report_payload(&RecoveredDocument::empty());
        assert!(payload.to_lowercase().contains("throttling"));
    }

    #[test]
    fn structured_report_is_embedded_as_json() {
        let report = recover(r#"{"summary": "2 drifts"}"#);
        let prompt = render_prompt(&report_payload(&report));
        assert!(prompt.contains("\"summary\": \"2 drifts\""));
        assert!(prompt.contains("No placeholder content"));
    }
}
