//! Shared constants for end-to-end tests

// ============================================================================
// Backend Credentials
// ============================================================================

pub const BACKEND_USER: &str = "DEVELOPER";

pub const BACKEND_PASS: &str = "secret";

pub const BACKEND_CLIENT: &str = "100";

// ============================================================================
// Repository Objects
// ============================================================================

/// Program used by the write scenarios
pub const PROGRAM_NAME: &str = "ZFOO";

pub const PROGRAM_OBJECT_URL: &str = "/sap/bc/adt/programs/programs/zfoo";

pub const PROGRAM_SOURCE_URL: &str = "/sap/bc/adt/programs/programs/zfoo/source/main";

pub const PROGRAM_SOURCE: &str = "REPORT ZFOO.";

/// Activation response carrying a single error message
pub const ACTIVATION_ERROR_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<chkl:messages xmlns:chkl="http://www.sap.com/abapxml/checklist">
  <msg objDescr="Program ZFOO" type="E" line="1" href="/sap/bc/adt/programs/programs/zfoo/source/main#start=1,0">
    <shortText><txt>Statement is not accessible</txt></shortText>
  </msg>
</chkl:messages>"#;

/// Class used by the metadata and documentation scenarios
pub const CLASS_NAME: &str = "ZCL_FOO";

pub const CLASS_OBJECT_URL: &str = "/sap/bc/adt/oo/classes/zcl_foo";

/// Worklist id handed out when an ATC worklist is created
pub const ATC_WORKLIST_ID: &str = "0A1B2C3D";

/// Keyword with documentation on the mock backend
pub const DOCU_KEYWORD: &str = "LOOP";

pub const DOCU_KEYWORD_HTML: &str =
    "<html><body><h2>LOOP AT itab</h2><p>Reads an internal table in a loop.</p></body></html>";

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;

/// Lock retry backoff used by test servers (milliseconds)
pub const TEST_LOCK_BACKOFF_MS: u64 = 10;

/// Event stream heartbeat used by test servers (milliseconds)
pub const TEST_HEARTBEAT_MS: u64 = 50;
