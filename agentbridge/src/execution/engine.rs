//! The execution engine: validate, authorize, invoke, envelope.
//!
//! Every entry point returns a [`ResultEnvelope`]; a missing capability, a
//! validation failure, or a handler fault is data, never a propagated error.
//! The coordinator sits on top of a transport that cannot represent a crash
//! as a protocol message, so this boundary is load-bearing.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::context::{ApplicationInfo, ContextSeed, ExecutionContext};
use super::envelope::{EnvelopeError, ExecutionMeta, ResultEnvelope};
use crate::errors::codes;
use crate::registry::{AuthLevel, CapabilityHandler, CapabilityRegistry};
use crate::schema::Shape;

pub struct ExecutionEngine {
    registry: Arc<RwLock<CapabilityRegistry>>,
    application: ApplicationInfo,
    detailed_errors: bool,
}

impl ExecutionEngine {
    pub fn new(registry: Arc<RwLock<CapabilityRegistry>>, application: ApplicationInfo) -> Self {
        Self {
            registry,
            application,
            detailed_errors: false,
        }
    }

    /// Include validator/handler `details` in error envelopes. Off by
    /// default so internals are not leaked to a remote agent.
    pub fn with_detailed_errors(mut self, enabled: bool) -> Self {
        self.detailed_errors = enabled;
        self
    }

    /// Invoke a registered function by name.
    pub async fn execute(&self, name: &str, raw_params: Value, seed: ContextSeed) -> ResultEnvelope {
        let implementation = {
            let registry = self.registry.read().await;
            registry.functions.get(name).cloned()
        };
        let implementation = match implementation {
            Some(implementation) => implementation,
            None => {
                debug!(name, "function not found");
                return ResultEnvelope::rejected(EnvelopeError::new(
                    codes::CAPABILITY_NOT_FOUND,
                    format!("no function registered under `{}`", name),
                ));
            }
        };

        self.run(
            &implementation.definition.parameters,
            implementation.definition.auth_level,
            implementation.handler,
            raw_params,
            seed,
        )
        .await
    }

    /// Apply a property update to a registered component.
    pub async fn execute_component_update(
        &self,
        component_id: &str,
        properties: Value,
        seed: ContextSeed,
    ) -> ResultEnvelope {
        let component = {
            let registry = self.registry.read().await;
            registry.components.get(component_id).cloned()
        };
        let component = match component {
            Some(component) => component,
            None => {
                debug!(component_id, "component not found");
                return ResultEnvelope::rejected(EnvelopeError::new(
                    codes::COMPONENT_NOT_FOUND,
                    format!("no component registered under `{}`", component_id),
                ));
            }
        };
        let handler = match component.update_handler {
            Some(handler) => handler,
            None => {
                return ResultEnvelope::rejected(EnvelopeError::new(
                    codes::UPDATE_NOT_SUPPORTED,
                    format!("component `{}` has no update handler", component_id),
                ));
            }
        };

        self.run(
            &component.definition.properties,
            component.definition.auth_level,
            handler,
            properties,
            seed,
        )
        .await
    }

    /// Invoke a named action on a registered component.
    pub async fn execute_component_action(
        &self,
        component_id: &str,
        action: &str,
        raw_params: Value,
        seed: ContextSeed,
    ) -> ResultEnvelope {
        let component = {
            let registry = self.registry.read().await;
            registry.components.get(component_id).cloned()
        };
        let component = match component {
            Some(component) => component,
            None => {
                debug!(component_id, "component not found");
                return ResultEnvelope::rejected(EnvelopeError::new(
                    codes::COMPONENT_NOT_FOUND,
                    format!("no component registered under `{}`", component_id),
                ));
            }
        };
        let handler = match component.action_handlers.get(action) {
            Some(handler) => handler.clone(),
            None => {
                return ResultEnvelope::rejected(EnvelopeError::new(
                    codes::ACTION_NOT_SUPPORTED,
                    format!(
                        "component `{}` does not support action `{}`",
                        component_id, action
                    ),
                ));
            }
        };
        // Registration guarantees a declared shape exists for every handler.
        let parameters = match component.definition.actions.get(action) {
            Some(definition) => definition.parameters.clone(),
            None => Shape::Any,
        };

        self.run(
            &parameters,
            component.definition.auth_level,
            handler,
            raw_params,
            seed,
        )
        .await
    }

    /// Shared tail of the pipeline: validate → authorize → context → invoke.
    async fn run(
        &self,
        parameters: &Shape,
        auth_level: AuthLevel,
        handler: CapabilityHandler,
        raw_params: Value,
        seed: ContextSeed,
    ) -> ResultEnvelope {
        if let Err(validation) = parameters.validate(&raw_params) {
            return ResultEnvelope::rejected(
                EnvelopeError::new(codes::INVALID_PARAMETERS, validation.to_string())
                    .with_details(self.gate_details(Some(validation.to_details()))),
            );
        }

        if let Some(error) = self.authorize(auth_level, &seed) {
            return ResultEnvelope::rejected(error);
        }

        let context = ExecutionContext::build(seed, self.application.clone());
        let request_id = context.request.id.clone();

        // Wall clock around handler invocation only.
        let started_at = Utc::now();
        let timer = Instant::now();
        let outcome = AssertUnwindSafe(handler(raw_params, context))
            .catch_unwind()
            .await;
        let meta = ExecutionMeta {
            duration_ms: timer.elapsed().as_millis() as u64,
            started_at,
            completed_at: Utc::now(),
        };

        match outcome {
            Ok(Ok(data)) => ResultEnvelope::ok(data, meta),
            Ok(Err(fault)) => {
                debug!(%request_id, error = %fault.message, "handler reported a fault");
                ResultEnvelope::err(
                    EnvelopeError::new(codes::EXECUTION_ERROR, fault.message)
                        .with_details(self.gate_details(fault.details)),
                    meta,
                )
            }
            Err(_) => {
                warn!(%request_id, "handler panicked");
                ResultEnvelope::err(
                    EnvelopeError::new(codes::EXECUTION_ERROR, "handler panicked"),
                    meta,
                )
            }
        }
    }

    fn authorize(&self, level: AuthLevel, seed: &ContextSeed) -> Option<EnvelopeError> {
        if level == AuthLevel::Public {
            return None;
        }
        let user = match &seed.user {
            Some(user) => user,
            None => {
                return Some(EnvelopeError::new(
                    codes::UNAUTHORIZED,
                    "capability requires an authenticated user",
                ))
            }
        };
        if level == AuthLevel::Admin && !user.has_role("admin") {
            return Some(EnvelopeError::new(
                codes::FORBIDDEN,
                "capability requires the admin role",
            ));
        }
        None
    }

    fn gate_details(&self, details: Option<Value>) -> Option<Value> {
        if self.detailed_errors {
            details
        } else {
            None
        }
    }
}
