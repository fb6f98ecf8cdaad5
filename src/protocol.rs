//! Wire types shared by judge nodes and the dispatcher
//!
//! Field names follow the node contract (`Code`, `Input`, `Status`, ...), so the
//! Rust structs rename every field to PascalCase on the wire.

use serde::{Deserialize, Serialize};

/// Self-contained judging request consumed by a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JudgeRequest {
    /// Source text to compile (user code followed by the judge harness)
    pub code: String,
    /// Text fed to the program's standard input
    #[serde(rename = "Input", default)]
    pub stdin: String,
    /// CPU time ceiling in seconds
    #[serde(rename = "CpuLimit")]
    pub cpu_limit_secs: u32,
    /// Address space ceiling in KB
    #[serde(rename = "MemoryLimit")]
    pub memory_limit_kb: u64,
}

/// Self-contained judging response produced by a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JudgeResponse {
    /// Status taxonomy: negative = pre-execution failure, 0 = success, N > 0 = signal N
    #[serde(rename = "Status")]
    pub status_code: i32,
    pub reason: String,
    pub stdout: String,
    pub stderr: String,
}

/// Submission body accepted by the user-facing judge endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubmitRequest {
    pub code: String,
    #[serde(default)]
    pub input: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_uses_node_field_names() {
        let req = JudgeRequest {
            code: "int main(){}".into(),
            stdin: "1 2".into(),
            cpu_limit_secs: 1,
            memory_limit_kb: 30000,
        };
        let value = serde_json::to_value(&req).unwrap();

        assert_eq!(value["Code"], "int main(){}");
        assert_eq!(value["Input"], "1 2");
        assert_eq!(value["CpuLimit"], 1);
        assert_eq!(value["MemoryLimit"], 30000);
    }

    #[test]
    fn test_response_parses_node_body() {
        let body = r#"{"Status":-3,"Reason":"compile error:\n","Stdout":"","Stderr":""}"#;
        let resp: JudgeResponse = serde_json::from_str(body).unwrap();

        assert_eq!(resp.status_code, -3);
        assert_eq!(resp.reason, "compile error:\n");
    }

    #[test]
    fn test_submit_input_defaults_to_empty() {
        let req: SubmitRequest = serde_json::from_str(r#"{"Code":"x"}"#).unwrap();
        assert_eq!(req.code, "x");
        assert!(req.input.is_empty());
    }
}
