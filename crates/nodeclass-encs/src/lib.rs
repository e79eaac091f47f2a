//! Handler serving node classification (`Enc`) records.
//!
//! Records are keyed by a unique salt id and scoped like regexes: each verb
//! only sees or changes the records of the caller's data centre and
//! environment.

use nodeclass_plugin::protocol::SALT_ID_PARAM;
use nodeclass_plugin::store::Enc;
use nodeclass_plugin::{
    Environment, HandlerContext, HandlerError, HandlerResult, Preamble, ReplyEnvelope,
    RequestEnvelope, RequestHandler, decode_body, record_id,
};
use serde::Deserialize;

const KIND: &str = "Enc";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct EncBody {
    id: i64,
    salt_id: String,
    formula: String,
    state_file: String,
}

impl EncBody {
    fn into_record(self, id: i64, environment: Environment) -> Enc {
        Enc {
            id,
            salt_id: self.salt_id,
            formula: self.formula,
            state_file: self.state_file,
            dc: environment.dc_sys_name,
            env: environment.sys_name,
        }
    }
}

/// Serves the `encs` table.
#[derive(Debug, Default, Clone, Copy)]
pub struct EncsHandler;

impl RequestHandler for EncsHandler {
    fn get(&self, context: &mut HandlerContext, request: &RequestEnvelope) -> HandlerResult {
        let Preamble {
            environment,
            mut store,
        } = Preamble::run(context, request)?;
        let encs = store.find_encs(environment.scope(), request.query_first(SALT_ID_PARAM))?;
        Ok(ReplyEnvelope::success_json(&encs))
    }

    fn post(&self, context: &mut HandlerContext, request: &RequestEnvelope) -> HandlerResult {
        let Preamble {
            environment,
            mut store,
        } = Preamble::run(context, request)?;
        let body: EncBody = decode_body(request)?;

        let saved = store
            .save_enc(body.into_record(0, environment))
            .map_err(HandlerError::Update)?;
        Ok(ReplyEnvelope::success_json(&saved))
    }

    fn put(&self, context: &mut HandlerContext, request: &RequestEnvelope) -> HandlerResult {
        let Preamble {
            environment,
            mut store,
        } = Preamble::run(context, request)?;
        let body: EncBody = decode_body(request)?;
        let id = body.id;

        if store.find_enc_scoped(id, environment.scope())?.is_none() {
            return Err(HandlerError::not_found(KIND, id.to_string()));
        }
        let saved = store
            .save_enc(body.into_record(id, environment))
            .map_err(HandlerError::Update)?;
        Ok(ReplyEnvelope::success_json(&saved))
    }

    fn delete(&self, context: &mut HandlerContext, request: &RequestEnvelope) -> HandlerResult {
        let Preamble {
            environment,
            mut store,
        } = Preamble::run(context, request)?;
        let id = record_id(request, KIND)?;
        let scope = environment.scope();

        let Some(found) = store.find_enc_scoped(id, scope)? else {
            return Err(HandlerError::not_found(KIND, id.to_string()));
        };
        if !store
            .delete_enc_scoped(id, scope)
            .map_err(HandlerError::Update)?
        {
            return Err(HandlerError::not_found(KIND, id.to_string()));
        }
        Ok(ReplyEnvelope::success_json(&found))
    }
}

#[cfg(test)]
mod tests;
