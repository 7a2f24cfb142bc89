use crate::{cat::CatSelector, config::Config, reply::Reply, traits::Handler};
use anyhow::{Result, anyhow};
use log::{debug, info, warn};
use rand::{Rng, rngs::ThreadRng};
use std::net::{Ipv4Addr, SocketAddrV4};
use tiny_http::{Method, Request, Server};

static ALLOWED_METHODS: &str = "GET, HEAD";

#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
}

impl HttpRequest {
    pub fn new<T: Into<String>>(method: Method, url: T) -> Self {
        Self {
            method,
            url: url.into(),
        }
    }

    pub fn path(&self) -> &str {
        self.url.split('?').next().unwrap_or_default()
    }
}

/// Serves a random cat URL on `GET /`.
pub struct HttpHandler<R = ThreadRng> {
    selector: CatSelector<R>,
}

impl HttpHandler {
    pub fn new() -> Self {
        Self::with_selector(CatSelector::new())
    }
}

impl Default for HttpHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> HttpHandler<R> {
    pub fn with_selector(selector: CatSelector<R>) -> Self {
        Self { selector }
    }
}

impl<R: Rng> Handler for HttpHandler<R> {
    type Request = HttpRequest;
    type Response = Reply;

    fn handle(&mut self, request: HttpRequest) -> Reply {
        if request.path() != "/" {
            return Reply::not_found();
        }

        match request.method {
            // tiny_http drops the body of HEAD responses on its own
            Method::Get | Method::Head => {
                let url = self.selector.select_url();
                info!("serving up cat at {url}");
                Reply::text(200, url)
            }
            _ => Reply::method_not_allowed(ALLOWED_METHODS),
        }
    }
}

pub struct RandomCatServer {
    config: Config,
    handler: HttpHandler,
}

impl RandomCatServer {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            handler: HttpHandler::new(),
        }
    }

    pub fn bind(&self) -> Result<Server> {
        let port = self.config.port;

        Server::http(SocketAddrV4::new(Ipv4Addr::new(0, 0, 0, 0), port))
            .map_err(|error| anyhow!("Could not create server on port {port}: {error}"))
    }

    pub fn start(&mut self) -> Result<()> {
        let server = self.bind()?;
        let port = server
            .server_addr()
            .to_ip()
            .map_or(self.config.port, |addr| addr.port());

        info!("listening on port {port}");
        self.serve(&server);

        Ok(())
    }

    pub fn serve(&mut self, server: &Server) {
        for request in server.incoming_requests() {
            if let Err(error) = self.respond(request) {
                warn!("Error while processing request: {error}");
            }
        }
    }

    pub fn respond(&mut self, request: Request) -> Result<()> {
        let remote_addr = request
            .remote_addr()
            .map_or_else(|| "-".into(), |addr| addr.ip().to_string());
        let user_agent = request
            .headers()
            .iter()
            .find(|header| header.field.equiv("user-agent"))
            .map_or("-", |header| header.value.as_str())
            .to_owned();

        let http_request = HttpRequest::new(request.method().clone(), request.url());
        debug!("{http_request:?}");

        let reply = self.handler.handle(http_request);

        info!(
            r#"{remote_addr} "{} {}" {} "{user_agent}""#,
            request.method(),
            request.url(),
            reply.status,
        );

        request.respond(reply.into_response()?)?;

        Ok(())
    }
}
