//! Wire model for remote test commands.
//!
//! Each scenario step arrives as a JSON array of command objects in the body
//! of a response whose headers carry the script marker. Header and parameter
//! names are opaque string keys fixed by the orchestration protocol.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved `className` namespace for commands the rig handles itself.
pub const TEST_LIBRARY_CLASSNAME: &str = "TestLibrary";

/// Response header naming the test script whose body this response carries.
pub const TEST_SCRIPT_HEADER: &str = "Test-Script";
/// Response header carrying the request-path prefix for the current test.
pub const BASE_PATH_HEADER: &str = "Base-Path";
/// Response header marking the end of the whole test session.
pub const TEST_SESSION_END_HEADER: &str = "Test-Session-End";

/// `wait` parameter selecting a blocking wait on the control channel.
pub const WAIT_FOR_CONTROL: &str = "wait-for-control";
/// `wait` parameter selecting a timed pause, value in milliseconds.
pub const WAIT_FOR_SLEEP: &str = "wait-for-sleep";

/// Named argument lists attached to a command. A key may carry several
/// values; the built-in commands only consult the first.
pub type CommandParams = BTreeMap<String, Vec<String>>;

/// One unit of remote instruction, immutable once decoded.
///
/// A batch is an ordered sequence of these; execution order is array order,
/// never reordered or parallelized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCommand {
    #[serde(rename = "className")]
    pub class_name: String,
    #[serde(rename = "functionName")]
    pub function_name: String,
    #[serde(default)]
    pub params: CommandParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_batch_with_params() {
        let body = r#"[
            {"className":"TestLibrary","functionName":"wait",
             "params":{"wait-for-sleep":["50"]}},
            {"className":"Adjust","functionName":"trackEvent",
             "params":{"eventToken":["abc123","def456"]}}
        ]"#;
        let batch: Vec<TestCommand> = serde_json::from_str(body).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].class_name, TEST_LIBRARY_CLASSNAME);
        assert_eq!(batch[0].params[WAIT_FOR_SLEEP], vec!["50"]);
        assert_eq!(batch[1].function_name, "trackEvent");
        assert_eq!(batch[1].params["eventToken"].len(), 2);
    }

    #[test]
    fn missing_params_decode_as_empty() {
        let body = r#"[{"className":"TestLibrary","functionName":"exit"}]"#;
        let batch: Vec<TestCommand> = serde_json::from_str(body).unwrap();
        assert!(batch[0].params.is_empty());
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let command = TestCommand {
            class_name: "Adjust".to_string(),
            function_name: "resume".to_string(),
            params: CommandParams::new(),
        };
        let json = serde_json::to_string(&command).unwrap();
        assert!(json.contains("\"className\":\"Adjust\""));
        assert!(json.contains("\"functionName\":\"resume\""));
    }
}
