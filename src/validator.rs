//! Probe plus classifier, with deadlines, cancellation and batching.

use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::classify::OutcomeClassifier;
use crate::credential::CredentialSpec;
use crate::engine::{EngineConfig, SnmpEngine, UdpEngine};
use crate::outcome::ValidationResult;
use crate::probe::CredentialProbe;

/// Batch and deadline settings.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Checks in flight at once in [`CredentialValidator::validate_many`].
    pub concurrency: usize,
    /// Added to each spec's budget to form the hard deadline.
    pub deadline_grace: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            concurrency: 32,
            deadline_grace: Duration::from_secs(1),
        }
    }
}

/// Entry point: turn credential specs into [`ValidationResult`]s.
///
/// ```rust,no_run
/// use snmp_credcheck::{CredentialSpec, CredentialValidator};
///
/// # async fn run() {
/// let validator = CredentialValidator::new();
/// let result = validator.validate(&CredentialSpec::v2c("192.0.2.1", "public")).await;
/// println!("{result}");
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CredentialValidator<E = UdpEngine> {
    probe: CredentialProbe<E>,
    config: ValidatorConfig,
}

impl CredentialValidator<UdpEngine> {
    /// Bundled UDP engine with default settings.
    pub fn new() -> Self {
        Self::with_engine(UdpEngine::default(), ValidatorConfig::default())
    }

    pub fn udp(engine: EngineConfig, config: ValidatorConfig) -> Self {
        Self::with_engine(UdpEngine::new(engine), config)
    }
}

impl Default for CredentialValidator<UdpEngine> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: SnmpEngine> CredentialValidator<E> {
    pub fn with_engine(engine: E, config: ValidatorConfig) -> Self {
        Self {
            probe: CredentialProbe::new(engine),
            config,
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Check one spec.
    pub async fn validate(&self, spec: &CredentialSpec) -> ValidationResult {
        self.validate_with_cancel(spec, CancellationToken::new()).await
    }

    /// Check one spec, giving up with [`ValidationResult::Timeout`] when
    /// `cancel` fires or the spec budget plus grace runs out. Giving up drops
    /// the engine call and its socket.
    #[instrument(
        level = "debug",
        skip_all,
        fields(snmp.host = %spec.host, snmp.port = spec.port)
    )]
    pub async fn validate_with_cancel(
        &self,
        spec: &CredentialSpec,
        cancel: CancellationToken,
    ) -> ValidationResult {
        let validated = match spec.validate() {
            Ok(validated) => validated,
            Err(e) => {
                tracing::debug!(target: "snmp_credcheck::probe", { error = %e }, "invalid credential spec");
                return ValidationResult::ConfigurationError {
                    detail: e.to_string(),
                };
            }
        };

        let deadline = validated.budget().saturating_add(self.config.deadline_grace);
        let signal = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(target: "snmp_credcheck::probe", "check cancelled");
                return ValidationResult::Timeout;
            }
            outcome = tokio::time::timeout(deadline, self.probe.probe_validated(&validated)) => match outcome {
                Ok(signal) => signal,
                Err(_) => {
                    tracing::debug!(target: "snmp_credcheck::probe", { ?deadline }, "check overran its deadline");
                    return ValidationResult::Timeout;
                }
            },
        };

        let result = OutcomeClassifier::classify(
            validated.version(),
            validated.security_level(),
            &signal,
        );
        tracing::debug!(target: "snmp_credcheck::probe", { outcome = result.category() }, "check classified");
        result
    }

    /// Check many specs concurrently. Results come back in input order and
    /// one failing check never stops the others.
    pub async fn validate_many<I>(&self, specs: I) -> Vec<ValidationResult>
    where
        I: IntoIterator<Item = CredentialSpec>,
    {
        self.validate_many_with_cancel(specs, CancellationToken::new())
            .await
    }

    /// [`validate_many`](Self::validate_many) under one cancellation token.
    pub async fn validate_many_with_cancel<I>(
        &self,
        specs: I,
        cancel: CancellationToken,
    ) -> Vec<ValidationResult>
    where
        I: IntoIterator<Item = CredentialSpec>,
    {
        futures::stream::iter(specs)
            .map(|spec| {
                let cancel = cancel.child_token();
                async move { self.validate_with_cancel(&spec, cancel).await }
            })
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await
    }
}
