use serde::{Deserialize, Serialize};

/// End-of-line convention requested for a `format` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndOfLine {
    Lf,
    Crlf,
}

impl EndOfLine {
    pub fn as_str(self) -> &'static str {
        match self {
            EndOfLine::Lf => "\n",
            EndOfLine::Crlf => "\r\n",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Fatal,
    Recoverable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormattingOptions {
    #[serde(rename = "printWidth")]
    pub print_width: u32,
    #[serde(rename = "tabWidth")]
    pub tab_width: u32,
    #[serde(rename = "useTabs")]
    pub use_tabs: bool,
    #[serde(rename = "endOfLine")]
    pub end_of_line: EndOfLine,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        FormattingOptions {
            print_width: 80,
            tab_width: 2,
            use_tabs: false,
            end_of_line: EndOfLine::Lf,
        }
    }
}

impl FormattingOptions {
    /// Clamps every field into the ranges the host handler must enforce.
    pub fn clamped(&self) -> FormattingOptions {
        FormattingOptions {
            print_width: self.print_width.clamp(40, 240),
            tab_width: self.tab_width.clamp(1, 16),
            use_tabs: self.use_tabs,
            end_of_line: self.end_of_line,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Range {
    pub start: usize,
    pub end: usize,
}

impl Range {
    /// Validates the range against the data-model invariant
    /// `0 <= start < end <= content_len`.
    pub fn validate(&self, content_len: usize) -> bool {
        self.start < self.end && self.end <= content_len
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeOptions {
    #[serde(rename = "roslynLanguageVersion", skip_serializing_if = "Option::is_none")]
    pub roslyn_language_version: Option<String>,
    #[serde(rename = "msbuildSdksPath", skip_serializing_if = "Option::is_none")]
    pub msbuild_sdks_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeRequest {
    #[serde(rename = "clientVersion")]
    pub client_version: String,
    #[serde(rename = "hostBinaryVersion")]
    pub host_binary_version: String,
    pub platform: String,
    pub options: InitializeOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostCapabilities {
    #[serde(rename = "supportsRangeFormatting")]
    pub supports_range_formatting: bool,
    #[serde(rename = "supportsDiagnostics")]
    pub supports_diagnostics: bool,
    #[serde(rename = "supportsTelemetry")]
    pub supports_telemetry: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResponse {
    pub ok: bool,
    #[serde(rename = "hostVersion", skip_serializing_if = "Option::is_none")]
    pub host_version: Option<String>,
    #[serde(rename = "roslynLanguageVersion", skip_serializing_if = "Option::is_none")]
    pub roslyn_language_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<HostCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatRequest {
    #[serde(rename = "filePath", skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,
    pub options: FormattingOptions,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "traceToken", skip_serializing_if = "Option::is_none")]
    pub trace_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormatMetrics {
    #[serde(rename = "elapsedMs")]
    pub elapsed_ms: u64,
    #[serde(rename = "parseDiagnostics")]
    pub parse_diagnostics: u32,
    #[serde(rename = "managedMemoryMb", skip_serializing_if = "Option::is_none")]
    pub managed_memory_mb: Option<f64>,
    #[serde(rename = "workingSetMb", skip_serializing_if = "Option::is_none")]
    pub working_set_mb: Option<f64>,
    #[serde(rename = "workingSetDeltaMb", skip_serializing_if = "Option::is_none")]
    pub working_set_delta_mb: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatResponseDetails {
    #[serde(rename = "managedMemoryMb", skip_serializing_if = "Option::is_none")]
    pub managed_memory_mb: Option<f64>,
    #[serde(rename = "workingSetMb", skip_serializing_if = "Option::is_none")]
    pub working_set_mb: Option<f64>,
    #[serde(rename = "workingSetDeltaMb", skip_serializing_if = "Option::is_none")]
    pub working_set_delta_mb: Option<f64>,
    #[serde(rename = "budgetMb", skip_serializing_if = "Option::is_none")]
    pub budget_mb: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormatResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Vec<Diagnostic>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<FormatMetrics>,
    #[serde(rename = "errorCode", skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<FormatResponseDetails>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PingRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub ok: bool,
    pub timestamp: u64,
    #[serde(rename = "uptimeMs")]
    pub uptime_ms: u64,
    #[serde(rename = "activeRequests")]
    pub active_requests: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShutdownRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogNotification {
    pub level: LogLevel,
    pub message: String,
    #[serde(rename = "traceToken", skip_serializing_if = "Option::is_none")]
    pub trace_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorNotification {
    pub severity: ErrorSeverity,
    #[serde(rename = "errorCode", skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// The JSON object written into the shared response buffer by the worker
/// (§3/§4.4). Deliberately distinct from [`FormatResponse`]: this is the
/// worker-to-caller contract, decoupled from the wire schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BufferedResult {
    Ok {
        formatted: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        diagnostics: Option<Vec<Diagnostic>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        metrics: Option<FormatMetrics>,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(rename = "errorCode", skip_serializing_if = "Option::is_none")]
        error_code: Option<String>,
    },
}
