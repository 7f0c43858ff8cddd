//! List and set request handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse, Response};
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use dynflag::{Flag, ValueKind};

use crate::error::{EndpointError, EndpointResult};
use crate::FlagsEndpoint;

/// One row of the flag listing.
#[derive(Debug, Serialize)]
pub struct FlagInfo {
    pub name: String,
    pub kind: String,
    pub usage: String,
    pub default: String,
    pub current: String,
    pub dynamic: bool,
    pub changed: bool,
}

impl FlagInfo {
    fn from_flag(flag: &Flag) -> Self {
        Self {
            name: flag.name().to_string(),
            kind: flag.kind().label().to_string(),
            usage: flag.usage().to_string(),
            default: flag.default_value().to_string(),
            current: flag.current(),
            dynamic: flag.is_dynamic(),
            changed: flag.changed(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub format: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetForm {
    pub name: String,
    pub value: String,
}

pub async fn list_flags(
    State(endpoint): State<FlagsEndpoint>,
    Query(query): Query<ListQuery>,
) -> Response {
    let flags = endpoint.flags().flags();
    if query.format.as_deref() == Some("json") {
        let rows: Vec<FlagInfo> = flags.iter().map(|flag| FlagInfo::from_flag(flag)).collect();
        return Json(rows).into_response();
    }
    Html(render_list(&flags, endpoint.set_url())).into_response()
}

pub async fn set_flag(
    State(endpoint): State<FlagsEndpoint>,
    Form(form): Form<SetForm>,
) -> EndpointResult<Html<String>> {
    let flags = endpoint.flags();
    let flag = flags
        .lookup(&form.name)
        .ok_or_else(|| EndpointError::NotFound(form.name.clone()))?;
    if !flag.is_dynamic() {
        return Err(EndpointError::BadRequest(format!(
            "flag {:?} is not dynamic",
            form.name
        )));
    }
    flags
        .set(&form.name, &form.value)
        .map_err(|err| EndpointError::BadRequest(err.to_string()))?;
    info!(flag = form.name.as_str(), value = form.value.as_str(), "flag set via endpoint");
    Ok(Html(render_confirmation(
        &form.name,
        &flag.current(),
        endpoint.list_url(),
    )))
}

fn render_list(flags: &[Arc<Flag>], set_url: Option<&str>) -> String {
    let mut page = String::with_capacity(4096);
    page.push_str("<!DOCTYPE html>\n<html><head><title>Flags</title>\n");
    page.push_str(
        "<style>table{border-collapse:collapse}\
         td,th{border:1px solid #ccc;padding:4px 8px;text-align:left}</style>\n",
    );
    page.push_str("</head><body>\n<h1>Flags</h1>\n<table>\n");
    page.push_str(
        "<tr><th>Name</th><th>Kind</th><th>Usage</th>\
         <th>Default</th><th>Current</th><th>Dynamic</th>",
    );
    if set_url.is_some() {
        page.push_str("<th>Set</th>");
    }
    page.push_str("</tr>\n");

    for flag in flags {
        page.push_str("<tr><td>");
        page.push_str(&escape_html(flag.name()));
        page.push_str("</td><td>");
        page.push_str(flag.kind().label());
        page.push_str("</td><td>");
        page.push_str(&escape_html(flag.usage()));
        page.push_str("</td><td>");
        page.push_str(&escape_html(flag.default_value()));
        page.push_str("</td><td>");
        let current = flag.current();
        if flag.kind() == ValueKind::Json {
            // JSON values are already a structured rendering; shown as-is.
            page.push_str(&current);
        } else {
            page.push_str(&escape_html(&current));
        }
        page.push_str("</td><td>");
        page.push_str(if flag.is_dynamic() { "yes" } else { "no" });
        page.push_str("</td>");
        if let Some(url) = set_url {
            page.push_str("<td>");
            if flag.is_dynamic() {
                page.push_str(&format!(
                    "<form method=\"post\" action=\"{}\">\
                     <input type=\"hidden\" name=\"name\" value=\"{}\"/>\
                     <input name=\"value\" value=\"{}\"/>\
                     <input type=\"submit\" value=\"set\"/></form>",
                    escape_html(url),
                    escape_html(flag.name()),
                    escape_html(&current),
                ));
            }
            page.push_str("</td>");
        }
        page.push_str("</tr>\n");
    }

    page.push_str("</table>\n</body></html>\n");
    page
}

fn render_confirmation(name: &str, current: &str, list_url: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><title>Flag set</title></head><body>\n\
         <p>Flag <b>{}</b> is now <code>{}</code>.</p>\n\
         <p><a href=\"{}\">Back to the flag list</a></p>\n\
         </body></html>\n",
        escape_html(name),
        escape_html(current),
        escape_html(list_url),
    )
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
