use std::io::Read;
use std::net::ToSocketAddrs;

use log::warn;
use tiny_http::{Method, Response};

use crate::command::{Command, CommandInbox};
use crate::error::Error;
use crate::status::SharedStatus;

/// Largest command body accepted.
const MAX_BODY: u64 = 64;

pub struct Server(tiny_http::Server);

#[derive(Debug, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
    pub json: bool,
}

impl Reply {
    fn text(status: u16, body: &str) -> Self {
        Reply {
            status,
            body: body.to_string(),
            json: false,
        }
    }
}

/// Route one request. Commands are checked here so clients get a 400 for a
/// bad token, but they are executed by the control loop.
pub fn route(
    method: &Method,
    url: &str,
    body: &str,
    status: &SharedStatus,
    inbox: &CommandInbox,
) -> Reply {
    match (method, url) {
        (Method::Get, "/status.json") => match status.latest() {
            Some(body) => Reply {
                status: 200,
                body,
                json: true,
            },
            None => Reply::text(503, "Status not available yet"),
        },
        (Method::Post, "/command") => match body.parse::<Command>() {
            Ok(_) => match inbox.submit(body) {
                Ok(()) => Reply::text(202, "Accepted"),
                Err(err) => Reply::text(503, &err.to_string()),
            },
            Err(err) => Reply::text(400, &err.to_string()),
        },
        (_, "/status.json") | (_, "/command") => Reply::text(405, "Method not allowed"),
        _ => Reply::text(404, "Not found"),
    }
}

impl Server {
    pub fn new<A>(addr: A) -> Result<Server, Error>
    where
        A: ToSocketAddrs,
    {
        tiny_http::Server::http(addr)
            .map(Server)
            .map_err(Error::Http)
    }

    pub fn handle_requests(&self, status: SharedStatus, inbox: CommandInbox) {
        let json = "Content-type: application/json; charset=utf-8"
            .parse::<tiny_http::Header>()
            .ok();
        for mut request in self.0.incoming_requests() {
            let mut body = String::new();
            if let Err(err) = request.as_reader().take(MAX_BODY).read_to_string(&mut body) {
                warn!("unable to read request body: {}", err);
            }
            let reply = route(request.method(), request.url(), &body, &status, &inbox);
            let mut response = Response::from_string(reply.body).with_status_code(reply.status);
            if let (true, Some(header)) = (reply.json, &json) {
                response = response.with_header(header.clone());
            }

            // Ignoring I/O errors that occur here so that we don't take down the process if there
            // is an issue sending the response.
            let _ = request.respond(response);
        }
    }

    pub fn shutdown(&self) {
        self.0.unblock();
    }
}
