//! One bounded engine call per credential spec.

use std::time::Duration;

use tokio::time::Instant;
use tracing::instrument;

use crate::credential::{CredentialSpec, SpecError, ValidatedSpec};
use crate::engine::{EngineSignal, SnmpEngine, UdpEngine};

/// Slack on top of the spec budget before the probe gives up on the engine.
/// Covers socket setup and key derivation, which the engine does not count.
const BUDGET_SLACK: Duration = Duration::from_millis(250);

/// Validates a spec and sends it through an engine.
///
/// The probe does not interpret what comes back. Invalid specs never reach
/// the engine.
#[derive(Debug, Clone, Default)]
pub struct CredentialProbe<E = UdpEngine> {
    engine: E,
}

impl<E: SnmpEngine> CredentialProbe<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Validate `spec`, then probe.
    pub async fn probe(&self, spec: &CredentialSpec) -> Result<EngineSignal, SpecError> {
        let validated = spec.validate().inspect_err(|e| {
            tracing::debug!(target: "snmp_credcheck::probe", { host = %spec.host, error = %e }, "spec rejected before sending");
        })?;
        Ok(self.probe_validated(&validated).await)
    }

    /// Probe an already validated spec. Never takes much longer than
    /// [`ValidatedSpec::budget`]; overruns surface as
    /// [`EngineSignal::Timeout`].
    #[instrument(
        level = "debug",
        skip_all,
        fields(snmp.target = %spec.target(), snmp.version = %spec.version())
    )]
    pub async fn probe_validated(&self, spec: &ValidatedSpec) -> EngineSignal {
        let start = Instant::now();
        let budget = spec.budget();
        let limit = budget.saturating_add(BUDGET_SLACK);
        let signal = match tokio::time::timeout(limit, self.engine.get(spec)).await {
            Ok(signal) => signal,
            Err(_) => {
                tracing::debug!(target: "snmp_credcheck::probe", { ?budget }, "engine overran its budget");
                EngineSignal::Timeout {
                    elapsed: start.elapsed(),
                }
            }
        };
        tracing::debug!(
            target: "snmp_credcheck::probe",
            signal = signal.kind(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "probe finished"
        );
        signal
    }
}
