//! Handler serving the class mappings attached to each regex.
//!
//! A mapping ties a regex to a `formula[.state_file]` class key. `POST`
//! replaces every mapping of one regex with a new set; `GET` lists them.
//! Mappings carry no scope of their own, so the environment check only gates
//! access.

use nodeclass_plugin::protocol::REGEX_ID_PARAM;
use nodeclass_plugin::{
    HandlerContext, HandlerError, HandlerResult, Preamble, ReplyEnvelope, RequestEnvelope,
    RequestHandler, decode_body,
};
use serde::Deserialize;

/// Body accepted by `POST`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ClassesBody {
    regex_id: i64,
    classes: Vec<String>,
}

/// Serves the `regex_sls_maps` table. `PUT` and `DELETE` are unsupported.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexMapsHandler;

impl RequestHandler for RegexMapsHandler {
    fn get(&self, context: &mut HandlerContext, request: &RequestEnvelope) -> HandlerResult {
        let Preamble { mut store, .. } = Preamble::run(context, request)?;
        let maps = match request.query_first(REGEX_ID_PARAM) {
            None => store.find_maps(None)?,
            Some(raw) => match raw.parse::<i64>() {
                Ok(regex_id) => store.find_maps(Some(regex_id))?,
                // No stored id can equal a non-numeric filter.
                Err(_) => Vec::new(),
            },
        };
        Ok(ReplyEnvelope::success_json(&maps))
    }

    fn post(&self, context: &mut HandlerContext, request: &RequestEnvelope) -> HandlerResult {
        let Preamble { mut store, .. } = Preamble::run(context, request)?;
        let body: ClassesBody = decode_body(request)?;
        store
            .replace_children(body.regex_id, body.classes.as_slice())
            .map_err(HandlerError::Update)?;
        Ok(ReplyEnvelope::success(""))
    }
}

#[cfg(test)]
mod tests;
