
use crate::network::SignatureState;
use crate::submit::{ConfirmationPolicy, MAX_CONFIRMATION_ATTEMPTS};
use crate::swap::{SwapService, SwapSettings};
use crate::test_utils::{FakeAggregator, FakeCustody, FakeNetwork, FakePriorityFees};

use std::sync::Arc;
use std::time::Duration;

pub struct Harness {
    pub aggregator: Arc<FakeAggregator>,
    pub priofees: Arc<FakePriorityFees>,
    pub custody: Arc<FakeCustody>,
    pub network: Arc<FakeNetwork>,
    pub service: SwapService,
}

pub fn fast_settings() -> SwapSettings {
    SwapSettings {
        confirmation: ConfirmationPolicy {
            max_attempts: MAX_CONFIRMATION_ATTEMPTS,
            poll_delay: Duration::ZERO,
        },
        ..SwapSettings::default()
    }
}

pub fn harness_with(
    aggregator: FakeAggregator,
    priofees: FakePriorityFees,
    custody: FakeCustody,
    statuses: Vec<Result<Option<SignatureState>, String>>,
    settings: SwapSettings,
) -> Harness {
    let aggregator = Arc::new(aggregator);
    let priofees = Arc::new(priofees);
    let custody = Arc::new(custody);
    let network = Arc::new(FakeNetwork::with_statuses(statuses));
    let service = SwapService::new(
        aggregator.clone(),
        priofees.clone(),
        custody.clone(),
        network.clone(),
        settings,
    );
    Harness {
        aggregator,
        priofees,
        custody,
        network,
        service,
    }
}

/// A signing custody, a 50k lamport medium priority fee, confirmation on poll 2.
pub fn harness(aggregator: FakeAggregator) -> Harness {
    harness_with(
        aggregator,
        FakePriorityFees::medium(50_000.0),
        FakeCustody::with_signing_wallet(),
        vec![
            Ok(Some(SignatureState::pending())),
            Ok(Some(SignatureState::confirmed())),
        ],
        fast_settings(),
    )
}
