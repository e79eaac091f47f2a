//! Handler serving the node-matching regular expressions of an environment.
//!
//! Every verb is scoped to the data centre and environment the caller was
//! authorised for: reads only see that scope's regexes, writes stamp it onto
//! the record, and updates or deletes of records outside it report
//! "not found".

use nodeclass_plugin::store::Regex;
use nodeclass_plugin::{
    HandlerContext, HandlerError, HandlerResult, Preamble, ReplyEnvelope, RequestEnvelope,
    RequestHandler, decode_body, record_id,
};
use serde::Deserialize;

const KIND: &str = "Regex";

/// Body accepted by `POST` and `PUT`. Missing fields default to empty.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct RegexBody {
    id: i64,
    regex: String,
    name: String,
    desc: String,
}

/// Serves the `regexes` table.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexesHandler;

impl RequestHandler for RegexesHandler {
    fn get(&self, context: &mut HandlerContext, request: &RequestEnvelope) -> HandlerResult {
        let Preamble {
            environment,
            mut store,
        } = Preamble::run(context, request)?;
        let regexes = store.find_regexes(environment.scope())?;
        Ok(ReplyEnvelope::success_json(&regexes))
    }

    fn post(&self, context: &mut HandlerContext, request: &RequestEnvelope) -> HandlerResult {
        let Preamble {
            environment,
            mut store,
        } = Preamble::run(context, request)?;
        let body: RegexBody = decode_body(request)?;

        let regex = Regex {
            id: 0,
            regex: body.regex,
            dc: environment.dc_sys_name,
            env: environment.sys_name,
            name: body.name,
            desc: body.desc,
        };
        let saved = store.save_regex(regex).map_err(HandlerError::Update)?;
        Ok(ReplyEnvelope::success_json(&saved))
    }

    fn put(&self, context: &mut HandlerContext, request: &RequestEnvelope) -> HandlerResult {
        let Preamble {
            environment,
            mut store,
        } = Preamble::run(context, request)?;
        let body: RegexBody = decode_body(request)?;

        if store
            .find_regex_scoped(body.id, environment.scope())?
            .is_none()
        {
            return Err(HandlerError::not_found(KIND, body.id.to_string()));
        }

        let regex = Regex {
            id: body.id,
            regex: body.regex,
            dc: environment.dc_sys_name,
            env: environment.sys_name,
            name: body.name,
            desc: body.desc,
        };
        let saved = store.save_regex(regex).map_err(HandlerError::Update)?;
        Ok(ReplyEnvelope::success_json(&saved))
    }

    fn delete(&self, context: &mut HandlerContext, request: &RequestEnvelope) -> HandlerResult {
        let Preamble {
            environment,
            mut store,
        } = Preamble::run(context, request)?;
        let id = record_id(request, KIND)?;
        let scope = environment.scope();

        let Some(found) = store.find_regex_scoped(id, scope)? else {
            return Err(HandlerError::not_found(KIND, id.to_string()));
        };
        // Another handler may have removed it since the lookup.
        if !store
            .delete_regex_scoped(id, scope)
            .map_err(HandlerError::Update)?
        {
            return Err(HandlerError::not_found(KIND, id.to_string()));
        }
        Ok(ReplyEnvelope::success_json(&found))
    }
}

#[cfg(test)]
mod tests;
