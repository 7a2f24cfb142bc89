use crate::{cat::CatSelector, config::Config, reply::Reply, traits::Handler};
use anyhow::{Result, anyhow};
use log::{info, warn};
use rand::{Rng, rngs::ThreadRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::HashMap,
    net::{Ipv4Addr, SocketAddrV4},
};
use tiny_http::{Header, Method, Request, Server};

pub static FUNCTION_NAME: &str = "random_cat";

static FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum HeaderValues {
    One(String),
    Many(Vec<String>),
}

impl HeaderValues {
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::One(value) => Some(value.as_str()),
            Self::Many(values) => values.first().map(String::as_str),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Invocation {
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, HeaderValues>,
}

impl Invocation {
    pub fn new<M: Into<String>, U: Into<String>>(method: M, url: U) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            headers: HashMap::new(),
        }
    }

    pub fn with_header<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.headers
            .insert(name.into(), HeaderValues::One(value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, values)| values.first())
    }
}

/// Custom handler request envelope: `{"Data": {"req": ...}, "Metadata": ...}`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InvocationRequest {
    pub data: InvocationData,
    pub metadata: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InvocationData {
    pub req: Invocation,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    pub status_code: u16,
    pub body: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Outputs {
    pub res: Option<FunctionResponse>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InvocationResult {
    pub outputs: Outputs,
    pub logs: Vec<String>,
    pub return_value: Option<Value>,
}

#[derive(Debug, Default)]
pub struct FunctionContext {
    logs: Vec<String>,
    pub res: Option<FunctionResponse>,
}

impl FunctionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log<T: Into<String>>(&mut self, message: T) {
        let message = message.into();
        info!("{message}");
        self.logs.push(message);
    }

    /// Completes the invocation. Consumes the context so it can only happen once.
    pub fn done(self) -> InvocationResult {
        InvocationResult {
            outputs: Outputs { res: self.res },
            logs: self.logs,
            return_value: None,
        }
    }
}

pub struct FunctionHandler<R = ThreadRng> {
    selector: CatSelector<R>,
}

impl FunctionHandler {
    pub fn new() -> Self {
        Self::with_selector(CatSelector::new())
    }
}

impl Default for FunctionHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> FunctionHandler<R> {
    pub fn with_selector(selector: CatSelector<R>) -> Self {
        Self { selector }
    }
}

impl<R: Rng> Handler for FunctionHandler<R> {
    type Request = Invocation;
    type Response = InvocationResult;

    fn handle(&mut self, invocation: Invocation) -> InvocationResult {
        let mut context = FunctionContext::new();
        let url = self.selector.select_url();

        context.log(format!(
            "serving up cat at {url} From request: {}",
            invocation.header(FORWARDED_FOR).unwrap_or("unknown"),
        ));
        context.res = Some(FunctionResponse {
            status_code: 200,
            body: url.into(),
        });

        context.done()
    }
}

/// Azure Functions custom handler endpoint. `/api/random_cat` is the
/// HTTP-forwarding route.
pub struct FunctionHost<R = ThreadRng> {
    config: Config,
    handler: FunctionHandler<R>,
}

impl FunctionHost {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            handler: FunctionHandler::new(),
        }
    }
}

impl<R: Rng> FunctionHost<R> {
    pub fn with_handler(config: Config, handler: FunctionHandler<R>) -> Self {
        Self { config, handler }
    }

    pub fn bind(&self) -> Result<Server> {
        let port = self.config.port;

        Server::http(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port))
            .map_err(|error| anyhow!("Could not create function host on port {port}: {error}"))
    }

    pub fn start(&mut self) -> Result<()> {
        let server = self.bind()?;
        let port = self.bound_port(&server);

        info!("function {FUNCTION_NAME} listening on port {port}");

        for request in server.incoming_requests() {
            if let Err(error) = self.respond(request) {
                warn!("Error while processing invocation: {error}");
            }
        }

        Ok(())
    }

    pub fn bound_port(&self, server: &Server) -> u16 {
        server
            .server_addr()
            .to_ip()
            .map_or(self.config.port, |addr| addr.port())
    }

    pub fn respond(&mut self, mut request: Request) -> Result<()> {
        let mut body = Vec::new();
        request.as_reader().read_to_end(&mut body)?;

        let reply = self.dispatch(request.method(), request.url(), request.headers(), &body);
        request.respond(reply.into_response()?)?;

        Ok(())
    }

    pub fn dispatch(&mut self, method: &Method, url: &str, headers: &[Header], body: &[u8]) -> Reply {
        let path = url.split('?').next().unwrap_or_default().trim_end_matches('/');

        if path == format!("/{FUNCTION_NAME}") {
            if *method != Method::Post {
                return Reply::method_not_allowed("POST");
            }

            return self.invoke(body);
        }

        if path == format!("/api/{FUNCTION_NAME}") {
            if !matches!(method, Method::Get | Method::Head) {
                return Reply::method_not_allowed("GET, HEAD");
            }

            return self.forward(method, url, headers);
        }

        Reply::not_found()
    }

    fn invoke(&mut self, body: &[u8]) -> Reply {
        let envelope = match serde_json::from_slice::<InvocationRequest>(body) {
            Ok(envelope) => envelope,
            Err(error) => return Reply::text(400, error.to_string()),
        };

        let result = self.handler.handle(envelope.data.req);

        match serde_json::to_string(&result) {
            Ok(json) => Reply::json(json),
            Err(error) => Reply::text(500, error.to_string()),
        }
    }

    fn forward(&mut self, method: &Method, url: &str, headers: &[Header]) -> Reply {
        let invocation = headers.iter().fold(
            Invocation::new(method.to_string(), url),
            |invocation, header| {
                invocation.with_header(header.field.to_string(), header.value.as_str())
            },
        );

        match self.handler.handle(invocation).outputs.res {
            Some(res) => Reply::text(res.status_code, res.body),
            None => Reply::text(500, "Function produced no response"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cat::STATUS_CODES;
    use rand::{SeedableRng, rngs::StdRng};

    fn handler() -> FunctionHandler<StdRng> {
        FunctionHandler::with_selector(CatSelector::with_rng(StdRng::seed_from_u64(9)))
    }

    fn host() -> FunctionHost<StdRng> {
        FunctionHost::with_handler(Config { port: 0 }, handler())
    }

    fn is_cat_url(url: &str) -> bool {
        url.strip_prefix("https://http.cat/")
            .and_then(|rest| rest.strip_suffix(".jpg"))
            .and_then(|code| code.parse::<u16>().ok())
            .is_some_and(|code| STATUS_CODES.contains(&code))
    }

    #[test]
    fn handle_sets_ok_response_and_completes() {
        let result = handler().handle(Invocation::new("GET", "http://localhost/api/random_cat"));
        let res = result.outputs.res.unwrap();

        assert_eq!(res.status_code, 200);
        assert!(is_cat_url(&res.body));
        assert_eq!(result.logs.len(), 1);
        assert_eq!(result.return_value, None);
    }

    #[test]
    fn logs_forwarded_for() {
        let invocation = Invocation::new("GET", "/").with_header("X-Forwarded-For", "10.0.0.1");
        let result = handler().handle(invocation);

        assert!(result.logs[0].starts_with("serving up cat at https://http.cat/"));
        assert!(result.logs[0].ends_with("From request: 10.0.0.1"));
    }

    #[test]
    fn logs_unknown_without_forwarded_for() {
        let result = handler().handle(Invocation::default());
        assert!(result.logs[0].ends_with("From request: unknown"));
    }

    #[test]
    fn header_lookup_ignores_case() {
        let invocation = Invocation::new("GET", "/").with_header("x-FORWARDED-for", "1.2.3.4");
        assert_eq!(invocation.header("X-Forwarded-For"), Some("1.2.3.4"));
        assert_eq!(invocation.header("user-agent"), None);
    }

    #[test]
    fn context_without_response_completes_empty() {
        let mut context = FunctionContext::new();
        context.log("nothing to see");

        let result = context.done();
        assert_eq!(result.outputs.res, None);
        assert_eq!(result.logs, vec!["nothing to see".to_owned()]);
    }

    #[test]
    fn parses_custom_handler_envelope() {
        let body = r#"{
            "Data": {
                "req": {
                    "Url": "http://localhost:7071/api/random_cat",
                    "Method": "GET",
                    "Query": {},
                    "Headers": {
                        "X-Forwarded-For": ["203.0.113.7:51234"],
                        "Accept": ["*/*"]
                    },
                    "Params": {}
                }
            },
            "Metadata": {"sys": {"MethodName": "random_cat"}}
        }"#;

        let envelope: InvocationRequest = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.data.req.method, "GET");
        assert_eq!(
            envelope.data.req.header("x-forwarded-for"),
            Some("203.0.113.7:51234")
        );
    }

    #[test]
    fn invoke_returns_custom_handler_result() {
        let reply = host().dispatch(&Method::Post, "/random_cat", &[], br#"{"Data": {"req": {}}}"#);

        assert_eq!(reply.status, 200);
        assert_eq!(reply.content_type, "application/json");

        let json: Value = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(json["Outputs"]["res"]["statusCode"], 200);
        assert!(is_cat_url(json["Outputs"]["res"]["body"].as_str().unwrap()));
        assert_eq!(json["Logs"].as_array().unwrap().len(), 1);
        assert!(json["ReturnValue"].is_null());
    }

    #[test]
    fn invoke_tolerates_empty_envelope() {
        let reply = host().dispatch(&Method::Post, "/random_cat", &[], b"{}");
        assert_eq!(reply.status, 200);
    }

    #[test]
    fn invoke_rejects_malformed_json() {
        let reply = host().dispatch(&Method::Post, "/random_cat", &[], b"not json");
        assert_eq!(reply.status, 400);
    }

    #[test]
    fn invoke_rejects_invalid_utf8() {
        let reply = host().dispatch(&Method::Post, "/random_cat", &[], b"{\"Data\":\xff}");

        assert_eq!(reply.status, 400);
        assert!(!reply.body.is_empty());
    }

    #[test]
    fn forwarded_request_returns_plain_url() {
        let headers = [Header::from_bytes("X-Forwarded-For", "198.51.100.2").unwrap()];
        let reply = host().dispatch(&Method::Get, "/api/random_cat?x=1", &headers, b"");

        assert_eq!(reply.status, 200);
        assert!(reply.content_type.starts_with("text/plain"));
        assert!(is_cat_url(&reply.body));
    }

    #[test]
    fn reports_ephemeral_port_actually_bound() {
        let host = host();
        let server = host.bind().unwrap();

        assert_ne!(host.bound_port(&server), 0);
        assert_eq!(
            Some(host.bound_port(&server)),
            server.server_addr().to_ip().map(|addr| addr.port())
        );
    }

    #[test]
    fn routes_reject_wrong_method_and_path() {
        let mut host = host();

        assert_eq!(host.dispatch(&Method::Get, "/random_cat", &[], b"").status, 405);
        assert_eq!(host.dispatch(&Method::Post, "/api/random_cat", &[], b"").status, 405);
        assert_eq!(host.dispatch(&Method::Get, "/", &[], b"").status, 404);
    }
}
