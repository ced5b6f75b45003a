//! Shared mock server state: interaction slots, the observed-request log and
//! in-flight accounting.

use super::types::{
    InteractionDiagnostic, ObservedRequest, RequestOutcome, UnmatchedInteraction, VerificationError,
};
use crate::interaction::{GeneratedResponse, Interaction, InteractionRegistry};
use crate::matching::{match_request, match_route, HttpRequest, Mismatch};
use crate::pact::Pact;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// One registered interaction with its `matched` flag.
pub(crate) struct InteractionSlot {
    pub interaction: Interaction,
    matched: AtomicBool,
}

impl InteractionSlot {
    fn new(interaction: Interaction) -> Self {
        Self {
            interaction,
            matched: AtomicBool::new(false),
        }
    }

    pub fn is_matched(&self) -> bool {
        self.matched.load(Ordering::Acquire)
    }

    /// Returns true when this call flipped the flag.
    fn mark_matched(&self) -> bool {
        self.matched
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// State shared between the accept loop, the request handlers and the owner.
pub struct MockServerState {
    consumer: String,
    provider: String,
    slots: Vec<InteractionSlot>,
    /// Observed requests in arrival order
    log: Mutex<Vec<ObservedRequest>>,
    in_flight: AtomicUsize,
    incomplete: AtomicUsize,
    cors: bool,
}

/// Decrements the in-flight gauge when the handler finishes or is dropped.
pub(crate) struct InFlight(Arc<MockServerState>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

impl MockServerState {
    pub(crate) fn new(
        consumer: impl Into<String>,
        provider: impl Into<String>,
        registry: InteractionRegistry,
        cors: bool,
    ) -> Self {
        Self {
            consumer: consumer.into(),
            provider: provider.into(),
            slots: registry.into_vec().into_iter().map(InteractionSlot::new).collect(),
            log: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            incomplete: AtomicUsize::new(0),
            cors,
        }
    }

    pub fn interaction_count(&self) -> usize {
        self.slots.len()
    }

    pub fn matched_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_matched()).count()
    }

    pub(crate) fn begin_request(self: &Arc<Self>) -> InFlight {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        InFlight(Arc::clone(self))
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub(crate) fn set_incomplete(&self, count: usize) {
        self.incomplete.store(count, Ordering::Release);
    }

    /// Decide how to answer a request. Marks the selected interaction matched.
    pub(crate) fn evaluate(&self, request: &HttpRequest) -> RequestOutcome {
        let candidates: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| match_route(&slot.interaction.request, request).ok())
            .map(|(index, _)| index)
            .collect();

        let mut best: Option<(usize, Vec<Mismatch>)> = None;
        for &index in &candidates {
            let slot = &self.slots[index];
            let result = match_request(&slot.interaction.request, request);
            if result.ok() {
                if slot.mark_matched() {
                    debug!(
                        "Interaction '{}' matched for the first time",
                        slot.interaction.description
                    );
                }
                return RequestOutcome::Matched { interaction: index };
            }
            let fewer = best
                .as_ref()
                .is_none_or(|(_, mismatches)| result.len() < mismatches.len());
            if fewer {
                best = Some((index, result.mismatches));
            }
        }

        if self.cors && request.method.eq_ignore_ascii_case("OPTIONS") {
            return RequestOutcome::Preflight;
        }

        match best {
            Some((best_candidate, mismatches)) => RequestOutcome::Mismatched {
                best_candidate,
                mismatches,
            },
            None => RequestOutcome::Unexpected {
                diagnostics: self.diagnose(request),
            },
        }
    }

    /// Why each registered interaction rejected the request.
    fn diagnose(&self, request: &HttpRequest) -> Vec<InteractionDiagnostic> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, slot)| InteractionDiagnostic {
                index,
                description: slot.interaction.description.clone(),
                mismatches: match_request(&slot.interaction.request, request).mismatches,
            })
            .collect()
    }

    /// First interaction whose method and path fit, for attributing failures
    /// that happen before the request can be fully matched.
    pub(crate) fn route_candidate(&self, request: &HttpRequest) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| match_route(&slot.interaction.request, request).ok())
    }

    pub(crate) fn generate(&self, index: usize) -> Option<GeneratedResponse> {
        self.slots
            .get(index)
            .map(|slot| slot.interaction.response.generate())
    }

    pub(crate) fn description(&self, index: usize) -> Option<&str> {
        self.slots
            .get(index)
            .map(|slot| slot.interaction.description.as_str())
    }

    pub(crate) fn record(&self, request: &HttpRequest, outcome: RequestOutcome) {
        let observed = ObservedRequest {
            method: request.method.clone(),
            path: request.path.clone(),
            query: request.query.clone(),
            headers: request.headers.clone(),
            body: request.body_value(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            outcome,
        };
        self.log.lock().push(observed);
    }

    /// Snapshot of every observed request.
    pub fn requests(&self) -> Vec<ObservedRequest> {
        self.log.lock().clone()
    }

    /// Observed requests that were not served from an interaction.
    pub fn mismatches(&self) -> Vec<ObservedRequest> {
        self.log
            .lock()
            .iter()
            .filter(|r| !r.outcome.is_matched())
            .cloned()
            .collect()
    }

    /// Everything that failed during the session; empty when all is well.
    pub fn verification(&self) -> VerificationError {
        let log = self.log.lock();
        let unmatched_interactions = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.is_matched())
            .map(|(index, slot)| UnmatchedInteraction {
                index,
                description: slot.interaction.description.clone(),
                mismatches: log
                    .iter()
                    .filter(|r| !r.outcome.is_matched() && r.outcome.candidate() == Some(index))
                    .flat_map(|r| r.outcome.mismatches().into_iter().cloned())
                    .collect(),
            })
            .collect();

        let mut unexpected_requests = Vec::new();
        let mut timeouts = Vec::new();
        for request in log.iter() {
            match request.outcome {
                RequestOutcome::Mismatched { .. } | RequestOutcome::Unexpected { .. } => {
                    unexpected_requests.push(request.clone())
                }
                RequestOutcome::Failed { .. } => timeouts.push(request.clone()),
                RequestOutcome::Matched { .. } | RequestOutcome::Preflight => {}
            }
        }

        VerificationError {
            unmatched_interactions,
            unexpected_requests,
            timeouts,
            incomplete: self.incomplete.load(Ordering::Acquire),
        }
    }

    /// The matched interactions, in registration order.
    pub fn pact(&self) -> Pact {
        let mut pact = Pact::new(self.consumer.clone(), self.provider.clone());
        pact.interactions = self
            .slots
            .iter()
            .filter(|slot| slot.is_matched())
            .map(|slot| slot.interaction.clone())
            .collect();
        pact
    }
}
