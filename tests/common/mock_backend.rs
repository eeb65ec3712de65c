//! Scriptable stand-in for the ADT REST endpoints
//!
//! Issues CSRF tokens from the discovery document, hands out lock handles,
//! serves and accepts program source (writes only under the held lock) and
//! answers activation requests. The repository, quality, data preview and
//! documentation services return canned payloads.
//!
//! Every request is recorded with its query and body. Any call kind can be
//! scripted to fail with a given status, e.g. expired tokens (403) and
//! foreign locks (423).

use super::constants::*;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const ADT_PREFIX: &str = "/sap/bc/adt/";
const DISCOVERY_PATH: &str = "/sap/bc/adt/core/discovery";
const ACTIVATION_PATH: &str = "/sap/bc/adt/activation";
const INACTIVE_OBJECTS_PATH: &str = "/sap/bc/adt/activation/inactiveobjects";
const SEARCH_PATH: &str = "/sap/bc/adt/repository/informationsystem/search";
const USAGE_REFERENCES_PATH: &str = "/sap/bc/adt/repository/informationsystem/usagereferences";
const CHECKRUNS_PATH: &str = "/sap/bc/adt/checkruns";
const UNIT_TEST_PATH: &str = "/sap/bc/adt/abapunit/testruns";
const ATC_WORKLISTS_PATH: &str = "/sap/bc/adt/atc/worklists";
const ATC_RUNS_PATH: &str = "/sap/bc/adt/atc/runs";
const FREESTYLE_PATH: &str = "/sap/bc/adt/datapreview/freestyle";
const DOCU_PATH: &str = "/sap/bc/adt/docu/abap/langu";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BackendCall {
    Discovery,
    Lock,
    Read,
    Write,
    Activate,
    Unlock,
    Search,
    Create,
    Structure,
    UsageReferences,
    InactiveObjects,
    SyntaxCheck,
    UnitTest,
    AtcWorklist,
    AtcRun,
    AtcResults,
    SqlQuery,
    Docu,
    Other(String),
}

/// A request as the backend saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub call: BackendCall,
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: String,
}

#[derive(Default)]
struct MockState {
    token_generation: AtomicUsize,
    lock_sequence: AtomicUsize,
    held_lock: Mutex<Option<String>>,
    released_locks: Mutex<Vec<String>>,
    scripts: Mutex<HashMap<BackendCall, VecDeque<u16>>>,
    activation_body: Mutex<String>,
    written_sources: Mutex<Vec<String>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockState {
    fn current_token(&self) -> String {
        format!("token-{}", self.token_generation.load(Ordering::SeqCst))
    }

    fn record(&self, request: RecordedRequest) {
        self.requests.lock().unwrap().push(request);
    }

    fn next_scripted(&self, call: &BackendCall) -> Option<u16> {
        self.scripts
            .lock()
            .unwrap()
            .get_mut(call)
            .and_then(VecDeque::pop_front)
    }
}

/// Mock ADT backend on a random port. Shut down when dropped.
pub struct MockBackend {
    pub base_url: String,
    state: Arc<MockState>,
    shutdown: CancellationToken,
}

impl MockBackend {
    pub async fn spawn() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock backend");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
                .expect("Mock backend failed");
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            state,
            shutdown,
        }
    }

    /// Statuses returned by the next calls of kind `call`, in order.
    /// Unscripted calls get the normal response.
    pub fn script_statuses(&self, call: BackendCall, statuses: &[u16]) {
        self.state
            .scripts
            .lock()
            .unwrap()
            .entry(call)
            .or_default()
            .extend(statuses.iter().copied());
    }

    pub fn script_lock_statuses(&self, statuses: &[u16]) {
        self.script_statuses(BackendCall::Lock, statuses);
    }

    pub fn script_write_statuses(&self, statuses: &[u16]) {
        self.script_statuses(BackendCall::Write, statuses);
    }

    pub fn set_activation_response(&self, body: &str) {
        *self.state.activation_body.lock().unwrap() = body.to_string();
    }

    /// Invalidates the token clients currently hold.
    pub fn expire_csrf_token(&self) {
        self.state.token_generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.state
            .requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.call.clone())
            .collect()
    }

    pub fn count(&self, call: &BackendCall) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    /// Calls other than discovery, in arrival order.
    pub fn object_calls(&self) -> Vec<BackendCall> {
        self.calls()
            .into_iter()
            .filter(|c| *c != BackendCall::Discovery)
            .collect()
    }

    /// Recorded requests of one kind, in arrival order.
    pub fn requests(&self, call: &BackendCall) -> Vec<RecordedRequest> {
        self.state
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.call == *call)
            .cloned()
            .collect()
    }

    /// The single request of kind `call`.
    ///
    /// # Panics
    ///
    /// Panics unless exactly one such request was made.
    pub fn only_request(&self, call: &BackendCall) -> RecordedRequest {
        let mut requests = self.requests(call);
        assert_eq!(requests.len(), 1, "expected one {:?} request", call);
        requests.remove(0)
    }

    pub fn written_sources(&self) -> Vec<String> {
        self.state.written_sources.lock().unwrap().clone()
    }

    pub fn held_lock(&self) -> Option<String> {
        self.state.held_lock.lock().unwrap().clone()
    }

    /// Handles released through UNLOCK, in order.
    pub fn released_locks(&self) -> Vec<String> {
        self.state.released_locks.lock().unwrap().clone()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn classify(method: &Method, path: &str, query: &HashMap<String, String>) -> BackendCall {
    let action = query.get("_action").map(String::as_str);
    match (method.as_str(), action) {
        ("GET", _) if path == DISCOVERY_PATH => BackendCall::Discovery,
        ("GET", _) if path.ends_with("/source/main") => BackendCall::Read,
        ("GET", _) if path == INACTIVE_OBJECTS_PATH => BackendCall::InactiveObjects,
        ("GET", _) if path == SEARCH_PATH => BackendCall::Search,
        ("GET", _) if path == DOCU_PATH => BackendCall::Docu,
        ("GET", _) if path.starts_with(&format!("{}/", ATC_WORKLISTS_PATH)) => {
            BackendCall::AtcResults
        }
        ("GET", _) if path.starts_with(ADT_PREFIX) => BackendCall::Structure,
        ("POST", Some("LOCK")) => BackendCall::Lock,
        ("POST", Some("UNLOCK")) => BackendCall::Unlock,
        ("POST", _) if path == ACTIVATION_PATH => BackendCall::Activate,
        ("POST", _) if path == USAGE_REFERENCES_PATH => BackendCall::UsageReferences,
        ("POST", _) if path == CHECKRUNS_PATH => BackendCall::SyntaxCheck,
        ("POST", _) if path == UNIT_TEST_PATH => BackendCall::UnitTest,
        ("POST", _) if path == ATC_WORKLISTS_PATH => BackendCall::AtcWorklist,
        ("POST", _) if path == ATC_RUNS_PATH => BackendCall::AtcRun,
        ("POST", _) if path == FREESTYLE_PATH => BackendCall::SqlQuery,
        ("POST", _) if path.starts_with(ADT_PREFIX) => BackendCall::Create,
        ("PUT", _) => BackendCall::Write,
        _ => BackendCall::Other(format!("{} {}", method, path)),
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or_default()
}

// ============================================================================
// Canned payloads
// ============================================================================

fn lock_result_xml(handle: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<asx:abap xmlns:asx="http://www.sap.com/abapxml" version="1.0">
  <asx:values>
    <DATA>
      <LOCK_HANDLE>{}</LOCK_HANDLE>
      <CORRNR/>
      <IS_LOCAL>X</IS_LOCAL>
    </DATA>
  </asx:values>
</asx:abap>"#,
        handle
    )
}

const SEARCH_RESULT_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<adtcore:objectReferences xmlns:adtcore="http://www.sap.com/adt/core">
  <adtcore:objectReference adtcore:uri="/sap/bc/adt/programs/programs/zfoo" adtcore:type="PROG/P"
      adtcore:name="ZFOO" adtcore:packageName="$TMP" adtcore:description="Demo report"/>
  <adtcore:objectReference adtcore:uri="/sap/bc/adt/oo/classes/zcl_foo" adtcore:type="CLAS/OC"
      adtcore:name="ZCL_FOO" adtcore:packageName="$TMP" adtcore:description="Demo class"/>
</adtcore:objectReferences>"#;

fn object_metadata_xml(name: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<class:abapClass xmlns:class="http://www.sap.com/adt/oo/classes" xmlns:adtcore="http://www.sap.com/adt/core"
    adtcore:name="{name}" adtcore:type="CLAS/OC" adtcore:description="Demo class"
    adtcore:createdBy="DEVELOPER" adtcore:changedBy="DEVELOPER" adtcore:masterLanguage="EN">
  <adtcore:packageRef adtcore:name="$TMP"/>
  <class:include class:includeType="main" adtcore:name="{name}" adtcore:type="CLAS/I">
    <atom:link xmlns:atom="http://www.w3.org/2005/Atom" rel="http://www.sap.com/adt/relations/source" href="source/main"/>
  </class:include>
</class:abapClass>"#,
        name = name.to_uppercase()
    )
}

const USAGE_REFERENCES_XML: &str = r#"<usageReferences:usageReferenceResult xmlns:usageReferences="http://www.sap.com/adt/ris/usageReferences" numberOfResults="1"/>"#;

const INACTIVE_OBJECTS_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<ioc:inactiveObjects xmlns:ioc="http://www.sap.com/abapxml/inactiveCtsObjects" xmlns:adtcore="http://www.sap.com/adt/core">
  <ioc:entry>
    <ioc:object ioc:user="DEVELOPER" ioc:deleted="false">
      <ioc:ref adtcore:uri="/sap/bc/adt/programs/programs/zfoo" adtcore:type="PROG/P" adtcore:name="ZFOO"/>
    </ioc:object>
  </ioc:entry>
</ioc:inactiveObjects>"#;

const SYNTAX_CHECK_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<chkrun:checkRunReports xmlns:chkrun="http://www.sap.com/adt/checkrun">
  <chkrun:checkReport chkrun:reporter="abapCheckRun">
    <chkrun:checkMessageList>
      <chkrun:checkMessage chkrun:uri="/sap/bc/adt/programs/programs/zfoo/source/main#start=2,0"
          chkrun:type="W" chkrun:shortText="Variable LV_X is not used"/>
    </chkrun:checkMessageList>
  </chkrun:checkReport>
</chkrun:checkRunReports>"#;

const UNIT_TEST_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<aunit:runResult xmlns:aunit="http://www.sap.com/adt/aunit" xmlns:adtcore="http://www.sap.com/adt/core">
  <program adtcore:name="ZFOO" adtcore:uri="/sap/bc/adt/programs/programs/zfoo">
    <testClasses>
      <testClass adtcore:name="LTCL_MAIN">
        <testMethods>
          <testMethod adtcore:name="ADDS_UP" executionTime="0.01"/>
          <testMethod adtcore:name="ROUNDS" executionTime="0.02">
            <alerts>
              <alert kind="failedAssertion" severity="critical">
                <title>Assertion failed</title>
                <details><detail>Expected 2, got 3</detail></details>
              </alert>
            </alerts>
          </testMethod>
        </testMethods>
      </testClass>
    </testClasses>
  </program>
</aunit:runResult>"#;

fn atc_worklist_xml(worklist_id: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<atcworklist:worklist xmlns:atcworklist="http://www.sap.com/adt/atc/worklist" xmlns:adtcore="http://www.sap.com/adt/core" atcworklist:id="{}">
  <atcworklist:objects>
    <atcobject:object xmlns:atcobject="http://www.sap.com/adt/atc/object" adtcore:name="ZFOO" adtcore:type="PROG/P"
        adtcore:uri="/sap/bc/adt/programs/programs/zfoo">
      <atcobject:findings>
        <atcfinding:finding xmlns:atcfinding="http://www.sap.com/adt/atc/finding" checkId="SLIN"
            checkTitle="Extended Program Check" messageId="0001" messageTitle="Unused variable LV_X"
            priority="2" location="/sap/bc/adt/programs/programs/zfoo/source/main#start=3,2"/>
      </atcobject:findings>
    </atcobject:object>
  </atcworklist:objects>
</atcworklist:worklist>"#,
        worklist_id
    )
}

const DATA_PREVIEW_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<dataPreview:tableData xmlns:dataPreview="http://www.sap.com/adt/dataPreview">
  <dataPreview:columns>
    <dataPreview:column dataPreview:name="MANDT" dataPreview:type="C" dataPreview:description="Client"/>
    <dataPreview:column dataPreview:name="MTEXT" dataPreview:type="C" dataPreview:description="Name"/>
  </dataPreview:columns>
  <dataPreview:row><dataPreview:value>000</dataPreview:value><dataPreview:value>SAP AG</dataPreview:value></dataPreview:row>
  <dataPreview:row><dataPreview:value>100</dataPreview:value><dataPreview:value>Development</dataPreview:value></dataPreview:row>
</dataPreview:tableData>"#;

// ============================================================================
// Handler
// ============================================================================

async fn handle(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("Basic "))
        .unwrap_or(false);
    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if query.get("sap-client").map(String::as_str) != Some(BACKEND_CLIENT) {
        return (StatusCode::BAD_REQUEST, "missing sap-client").into_response();
    }

    let path = uri.path().to_string();
    let call = classify(&method, &path, &query);
    state.record(RecordedRequest {
        call: call.clone(),
        path: path.clone(),
        query: query.clone(),
        body: body.clone(),
    });

    let csrf = headers
        .get("x-csrf-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if call == BackendCall::Discovery {
        let token = state.current_token();
        return (
            StatusCode::OK,
            [("x-csrf-token", token.as_str())],
            "<app:service xmlns:app=\"http://www.w3.org/2007/app\"/>",
        )
            .into_response();
    }

    if method != Method::GET && csrf != state.current_token() {
        return (
            StatusCode::FORBIDDEN,
            [("x-csrf-token", "Required")],
            "CSRF token validation failed",
        )
            .into_response();
    }

    if let Some(status) = state.next_scripted(&call) {
        return scripted(status);
    }

    match call {
        BackendCall::Lock => {
            let mut held = state.held_lock.lock().unwrap();
            if held.is_some() {
                return (StatusCode::LOCKED, "Object is already locked").into_response();
            }
            let handle = format!(
                "HANDLE{}",
                state.lock_sequence.fetch_add(1, Ordering::SeqCst) + 1
            );
            *held = Some(handle.clone());
            (StatusCode::OK, lock_result_xml(&handle)).into_response()
        }
        BackendCall::Write => {
            let held = state.held_lock.lock().unwrap().clone();
            if held.is_none() || held.as_ref() != query.get("lockHandle") {
                return (StatusCode::LOCKED, "Object is not locked").into_response();
            }
            state.written_sources.lock().unwrap().push(body);
            StatusCode::OK.into_response()
        }
        BackendCall::Unlock => {
            let mut held = state.held_lock.lock().unwrap();
            if held.as_ref() != query.get("lockHandle") {
                return (StatusCode::BAD_REQUEST, "Unknown lock handle").into_response();
            }
            if let Some(handle) = held.take() {
                state.released_locks.lock().unwrap().push(handle);
            }
            StatusCode::OK.into_response()
        }
        BackendCall::Read => {
            let source = state
                .written_sources
                .lock()
                .unwrap()
                .last()
                .cloned()
                .unwrap_or_else(|| PROGRAM_SOURCE.to_string());
            (StatusCode::OK, source).into_response()
        }
        BackendCall::Activate => {
            let body = state.activation_body.lock().unwrap().clone();
            (StatusCode::OK, body).into_response()
        }
        BackendCall::Search => (StatusCode::OK, SEARCH_RESULT_XML).into_response(),
        BackendCall::Create => StatusCode::CREATED.into_response(),
        BackendCall::Structure => {
            (StatusCode::OK, object_metadata_xml(last_segment(&path))).into_response()
        }
        BackendCall::UsageReferences => (StatusCode::OK, USAGE_REFERENCES_XML).into_response(),
        BackendCall::InactiveObjects => (StatusCode::OK, INACTIVE_OBJECTS_XML).into_response(),
        BackendCall::SyntaxCheck => (StatusCode::OK, SYNTAX_CHECK_XML).into_response(),
        BackendCall::UnitTest => (StatusCode::OK, UNIT_TEST_XML).into_response(),
        BackendCall::AtcWorklist => (StatusCode::OK, ATC_WORKLIST_ID).into_response(),
        BackendCall::AtcRun => {
            let worklist_id = query.get("worklistId").cloned().unwrap_or_default();
            let location = format!("{}/{}?timestamp=1", ATC_WORKLISTS_PATH, worklist_id);
            (StatusCode::OK, [("location", location.as_str())], "").into_response()
        }
        BackendCall::AtcResults => {
            (StatusCode::OK, atc_worklist_xml(last_segment(&path))).into_response()
        }
        BackendCall::SqlQuery => (StatusCode::OK, DATA_PREVIEW_XML).into_response(),
        BackendCall::Docu => {
            let keyword_lookup = !query.contains_key("type");
            if keyword_lookup && query.get("object").map(String::as_str) == Some(DOCU_KEYWORD) {
                (
                    StatusCode::OK,
                    [("content-type", "text/html")],
                    DOCU_KEYWORD_HTML,
                )
                    .into_response()
            } else {
                (StatusCode::NOT_FOUND, "No documentation").into_response()
            }
        }
        BackendCall::Discovery | BackendCall::Other(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

fn scripted(status: u16) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, format!("scripted {}", status.as_u16())).into_response()
}
