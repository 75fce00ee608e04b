//! Request dispatch.
//!
//! An explicit registration table maps `(payload tag, verb)` to a handler.
//! Unknown tags are rejected, handler outcomes become response envelopes,
//! and every response is written to the cache under its request id for the
//! messaging TTL.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{error, warn};

use crate::errors::LedgerResult;
use crate::services::Services;
use crate::types::{
    BlockMineVerifyRequest, ElementCreateRequest, ElementGetRequest, ElementMetadataRequest,
    Envelope, OperationStatus, Outcome, TransactionCreateRequest, TransactionGetRequest, Verb,
};

type Handler = Box<dyn Fn(&Services, Value) -> LedgerResult<Outcome> + Send + Sync>;

pub struct Dispatcher {
    services: Arc<Services>,
    registry: HashMap<String, Handler>,
}

fn registry_key(class_name: &str, verb: Verb) -> String {
    format!("{class_name}:{}", verb.as_str())
}

fn decode<T: DeserializeOwned>(payload: Value) -> Result<T, Outcome> {
    serde_json::from_value(payload)
        .map_err(|err| Outcome::message(OperationStatus::Error, format!("invalid payload: {err}")))
}

impl Dispatcher {
    pub fn new(services: Arc<Services>) -> Self {
        let mut dispatcher = Self {
            services,
            registry: HashMap::new(),
        };
        dispatcher.register("ElementCreate", Verb::Post, |services, payload| {
            match decode::<ElementCreateRequest>(payload) {
                Ok(request) => services.elements.create(&request),
                Err(outcome) => Ok(outcome),
            }
        });
        dispatcher.register("ElementGet", Verb::Get, |services, payload| {
            match decode::<ElementGetRequest>(payload) {
                Ok(request) => services.elements.get(&request),
                Err(outcome) => Ok(outcome),
            }
        });
        dispatcher.register("ElementMetadata", Verb::Put, |services, payload| {
            match decode::<ElementMetadataRequest>(payload) {
                Ok(request) => services.elements.set_metadata(&request),
                Err(outcome) => Ok(outcome),
            }
        });
        dispatcher.register("TransactionCreate", Verb::Post, |services, payload| {
            match decode::<TransactionCreateRequest>(payload) {
                Ok(request) => services.transfers.create(&request, None),
                Err(outcome) => Ok(outcome),
            }
        });
        dispatcher.register("TransactionGet", Verb::Get, |services, payload| {
            match decode::<TransactionGetRequest>(payload) {
                Ok(request) => services.transfers.get(&request),
                Err(outcome) => Ok(outcome),
            }
        });
        dispatcher.register("BlockMineVerify", Verb::Post, |services, payload| {
            match decode::<BlockMineVerifyRequest>(payload) {
                Ok(request) => match request.validate() {
                    Ok(()) => Ok(Outcome::ok(services.miner.verify_and_reward(&request)?)),
                    Err(message) => Ok(Outcome::message(OperationStatus::Error, message)),
                },
                Err(outcome) => Ok(outcome),
            }
        });
        dispatcher
    }

    fn register<F>(&mut self, class_name: &str, verb: Verb, handler: F)
    where
        F: Fn(&Services, Value) -> LedgerResult<Outcome> + Send + Sync + 'static,
    {
        self.registry
            .insert(registry_key(class_name, verb), Box::new(handler));
    }

    pub fn dispatch_json(&self, raw: &str) -> Envelope {
        match serde_json::from_str::<Envelope>(raw) {
            Ok(envelope) => self.dispatch(&envelope),
            Err(err) => {
                warn!(%err, "undecodable envelope");
                Envelope::response(
                    String::new(),
                    Outcome::message(OperationStatus::Internal, format!("invalid envelope: {err}")),
                )
            }
        }
    }

    /// Runs the registered handler and caches the response envelope under
    /// the request id. Infrastructure failures surface as `INTERNAL`; the
    /// worker keeps consuming.
    pub fn dispatch(&self, envelope: &Envelope) -> Envelope {
        let outcome = self.route(envelope);
        let response = Envelope::response(envelope.request_id.clone(), outcome);
        let ttl = self.services.config.defaults.messaging_ttl_ms;
        if let Err(err) = self
            .services
            .cache
            .save_json(&envelope.request_id, &response, ttl)
        {
            error!(%err, request_id = %envelope.request_id, "failed to cache response");
        }
        response
    }

    fn route(&self, envelope: &Envelope) -> Outcome {
        let (Some(class_name), Some(verb)) = (&envelope.request_class_name, envelope.method) else {
            return Outcome::message(OperationStatus::Internal, "envelope missing payload tag or method");
        };
        let key = registry_key(class_name, verb);
        let Some(handler) = self.registry.get(&key) else {
            warn!(%key, "no processor found");
            return Outcome::message(OperationStatus::Internal, format!("no processor found for: {key}"));
        };
        let payload = envelope.request_data.clone().unwrap_or(Value::Null);
        match handler(&self.services, payload) {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(%err, %key, request_id = %envelope.request_id, "request processing failed");
                Outcome::message(OperationStatus::Internal, err.to_string())
            }
        }
    }
}
