use anyhow::{Error, Result};
use std::io::Cursor;
use tiny_http::{Header, Response};

static TEXT: &str = "text/plain; charset=utf-8";
static JSON: &str = "application/json";

/// Transport-neutral response produced by the handlers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
    pub allow: Option<&'static str>,
}

impl Reply {
    pub fn text<T: Into<String>>(status: u16, body: T) -> Self {
        Self {
            status,
            content_type: TEXT,
            body: body.into(),
            allow: None,
        }
    }

    pub fn json<T: Into<String>>(body: T) -> Self {
        Self {
            content_type: JSON,
            ..Self::text(200, body)
        }
    }

    pub fn not_found() -> Self {
        Self::text(404, "Not Found")
    }

    pub fn method_not_allowed(allow: &'static str) -> Self {
        Self {
            allow: Some(allow),
            ..Self::text(405, "Method Not Allowed")
        }
    }

    pub fn into_response(self) -> Result<Response<Cursor<Vec<u8>>>> {
        let mut response = Response::from_string(self.body)
            .with_status_code(self.status)
            .with_header(header("content-type", self.content_type)?)
            .with_header(header("access-control-allow-origin", "*")?);

        if let Some(allow) = self.allow {
            response = response.with_header(header("allow", allow)?);
        }

        Ok(response)
    }
}

fn header(field: &str, value: &str) -> Result<Header> {
    Header::from_bytes(field, value).map_err(|_| Error::msg("Could not create header"))
}
