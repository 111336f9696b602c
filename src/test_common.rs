//! Fakes shared by unit tests.
use std::{
    cell::RefCell,
    collections::HashMap,
    sync::{Mutex, OnceLock},
};

use async_trait::async_trait;

use crate::{
    request_handler::{Request, RequestHandler, Response},
    Result,
};

type Respond = Box<dyn Fn(&Request) -> Result<Response> + Send + Sync>;

/// A [`RequestHandler`] that records every request and answers with `respond`.
pub(crate) struct FakeRequestHandler {
    respond: Respond,
    requests: Mutex<Vec<Request>>,
}

impl FakeRequestHandler {
    pub(crate) fn new(
        respond: impl Fn(&Request) -> Result<Response> + Send + Sync + 'static,
    ) -> FakeRequestHandler {
        FakeRequestHandler {
            respond: Box::new(respond),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with `status_code` and `body`.
    pub(crate) fn responding(status_code: u16, body: &str) -> FakeRequestHandler {
        let body = body.to_owned();
        FakeRequestHandler::new(move |_| {
            Ok(Response {
                status_code,
                body: body.clone(),
                ..Default::default()
            })
        })
    }

    pub(crate) fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RequestHandler for FakeRequestHandler {
    async fn make_request(&self, request: Request) -> Result<Response> {
        let response = (self.respond)(&request);
        self.requests.lock().unwrap().push(request);
        response
    }
}

/// A log record emitted under the `optimizely` target.
#[derive(Debug, Clone)]
pub(crate) struct CapturedRecord {
    pub level: log::Level,
    pub message: String,
    pub key_values: HashMap<String, String>,
}

thread_local! {
    static CAPTURED: RefCell<Vec<CapturedRecord>> = const { RefCell::new(Vec::new()) };
}

/// Keeps crate records per test thread and forwards everything to `env_logger`.
struct TestLogger {
    inner: env_logger::Logger,
}

#[derive(Default)]
struct KeyValues(HashMap<String, String>);

impl<'kvs> log::kv::VisitSource<'kvs> for KeyValues {
    fn visit_pair(
        &mut self,
        key: log::kv::Key<'kvs>,
        value: log::kv::Value<'kvs>,
    ) -> std::result::Result<(), log::kv::Error> {
        self.0.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

impl log::Log for TestLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if record.target() == "optimizely" {
            let mut key_values = KeyValues::default();
            let _ = record.key_values().visit(&mut key_values);
            let captured = CapturedRecord {
                level: record.level(),
                message: record.args().to_string(),
                key_values: key_values.0,
            };
            CAPTURED.with(|records| records.borrow_mut().push(captured));
        }

        if self.inner.matches(record) {
            self.inner.log(record);
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

static LOGGER: OnceLock<TestLogger> = OnceLock::new();

/// Install the test logger once per test binary. `RUST_LOG` still controls what is printed.
pub(crate) fn init_logger() {
    let logger = LOGGER.get_or_init(|| TestLogger {
        inner: env_logger::Builder::from_default_env()
            .is_test(true)
            .build(),
    });
    if log::set_logger(logger).is_ok() {
        log::set_max_level(log::LevelFilter::Trace);
    }
}

/// Drain the records captured on the current thread.
pub(crate) fn take_captured_logs() -> Vec<CapturedRecord> {
    CAPTURED.with(|records| records.take())
}
