//! Finds a caller-supplied credential in one of several request locations.
//!
//! Locations are probed in a fixed order and the first non-empty value wins:
//! the `Authorization: Bearer` header, then a header, body field, path
//! parameter and query parameter all named by the configured field.

use std::collections::HashMap;

use actix_web::{http::header::AUTHORIZATION, web, HttpRequest};
use serde_json::{Map, Value};

pub const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Bearer,
    Header,
    Body,
    Path,
    Query,
}

impl Location {
    pub const PRIORITY: [Location; 5] = [
        Location::Bearer,
        Location::Header,
        Location::Body,
        Location::Path,
        Location::Query,
    ];

    /// The locations that can be read without touching the request body.
    pub const HEADERS: [Location; 2] = [Location::Bearer, Location::Header];

    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Bearer => "bearer",
            Location::Header => "header",
            Location::Body => "body",
            Location::Path => "path",
            Location::Query => "query",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub location: Location,
    pub token: String,
}

/// Read access to every place a credential may travel in.
pub trait CredentialSource {
    fn header(&self, name: &str) -> Option<&str>;
    fn body_field(&self, name: &str) -> Option<&str>;
    fn path_param(&self, name: &str) -> Option<&str>;
    fn query_param(&self, name: &str) -> Option<&str>;
}

/// Returns the highest priority non-empty credential, or `None` if there is none.
pub fn locate_credential<S>(source: &S, field: &str) -> Option<Credential>
where
    S: CredentialSource + ?Sized,
{
    locate_in(source, field, &Location::PRIORITY)
}

/// Like [`locate_credential`] but only probes `locations`, in the order given.
pub fn locate_in<S>(source: &S, field: &str, locations: &[Location]) -> Option<Credential>
where
    S: CredentialSource + ?Sized,
{
    locations.iter().find_map(|&location| {
        probe(source, location, field)
            .filter(|token| !token.is_empty())
            .map(|token| Credential {
                location,
                token: token.to_string(),
            })
    })
}

fn probe<'a, S>(source: &'a S, location: Location, field: &str) -> Option<&'a str>
where
    S: CredentialSource + ?Sized,
{
    match location {
        Location::Bearer => source
            .header(AUTHORIZATION.as_str())
            .and_then(bearer_token),
        Location::Header => source.header(field),
        Location::Body => source.body_field(field),
        Location::Path => source.path_param(field),
        Location::Query => source.query_param(field),
    }
}

fn bearer_token(value: &str) -> Option<&str> {
    value.strip_prefix(BEARER_PREFIX).map(str::trim)
}

/// [`CredentialSource`] over an actix request and its already parsed JSON body.
pub struct RequestCredentials<'a> {
    req: &'a HttpRequest,
    body: Option<&'a Map<String, Value>>,
    query: HashMap<String, String>,
}

impl<'a> RequestCredentials<'a> {
    pub fn new(req: &'a HttpRequest, body: Option<&'a Map<String, Value>>) -> Self {
        let query = web::Query::<HashMap<String, String>>::from_query(req.query_string())
            .map(web::Query::into_inner)
            .unwrap_or_default();

        Self { req, body, query }
    }
}

impl CredentialSource for RequestCredentials<'_> {
    fn header(&self, name: &str) -> Option<&str> {
        self.req
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
    }

    fn body_field(&self, name: &str) -> Option<&str> {
        self.body?.get(name)?.as_str()
    }

    fn path_param(&self, name: &str) -> Option<&str> {
        self.req.match_info().get(name)
    }

    fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}
