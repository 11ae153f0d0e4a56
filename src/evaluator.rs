//! Response Evaluator (§4.5): validates the driver's response against the
//! step's expectations and runs variable extraction, in the fixed order
//! the specification lays out so the first failure produces a specific,
//! user-facing error message.

use regex::Regex;

use crate::errors::EvaluatorError;
use crate::model::VariableScope;
use crate::status_codes::StatusCodeList;
use crate::variables::process_variables;

pub struct EvaluationInputs<'a> {
    pub response_code: i64,
    pub body: &'a str,
    pub url: &'a str,
    pub status_codes: &'a StatusCodeList,
    /// The unparsed status-code spec string, kept alongside the parsed
    /// [`StatusCodeList`] purely so the mismatch error can echo it back
    /// verbatim (§4.5 item 1's message template).
    pub status_codes_raw: &'a str,
    pub required: &'a str,
    pub test_variables: &'a [(String, String)],
    pub step_variables: &'a [(String, String)],
}

/// Runs the four checks in order, writing extracted variables into the
/// corresponding scopes as it goes. Returns the first error encountered;
/// the caller (Scenario Runner) still has whatever stats the driver
/// gathered even when this returns `Err`.
pub fn evaluate(
    inputs: &EvaluationInputs,
    test_scope: &mut VariableScope,
    step_scope: &mut VariableScope,
) -> Result<(), EvaluatorError> {
    if !inputs.status_codes.is_empty() && !inputs.status_codes.contains(inputs.response_code) {
        return Err(EvaluatorError::StatusCodeMismatch {
            code: inputs.response_code,
            list: inputs.status_codes_raw.to_string(),
        });
    }

    if !inputs.required.is_empty() {
        let re = Regex::new(inputs.required).map_err(|e| EvaluatorError::RequiredPatternMissing {
            pattern: inputs.required.to_string(),
            url: format!("{} (invalid pattern: {e})", inputs.url),
        })?;
        if !re.is_match(inputs.body) {
            return Err(EvaluatorError::RequiredPatternMissing {
                pattern: inputs.required.to_string(),
                url: inputs.url.to_string(),
            });
        }
    }

    if !inputs.test_variables.is_empty() {
        process_variables(test_scope, inputs.test_variables, inputs.body).map_err(
            |(_, reason)| EvaluatorError::ScenarioVariableExtraction {
                pairs: format_definitions(inputs.test_variables),
                reason: reason.to_string(),
            },
        )?;
    }

    if !inputs.step_variables.is_empty() {
        process_variables(step_scope, inputs.step_variables, inputs.body).map_err(
            |(_, reason)| EvaluatorError::StepVariableExtraction {
                pairs: format_definitions(inputs.step_variables),
                reason: reason.to_string(),
            },
        )?;
    }

    Ok(())
}

fn format_definitions(defs: &[(String, String)]) -> String {
    defs.iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}
