//! Shared state handed to every scenario.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use gauntlet_core::{ContractSpec, Direction, Exchange, Offset, OrderKind, OrderRequest};
use gauntlet_risk::RiskMonitor;
use gauntlet_session::{CancelOutcome, SessionDriver};

use crate::error::{CaseError, CaseResult};

const CONTRACT_WAIT_ATTEMPTS: u32 = 10;
const CONTRACT_WAIT_STEP: Duration = Duration::from_millis(100);

/// Knobs the scenarios read: which contract to trade, a price that rests
/// on the book, a price that fills, and the probe values for the error
/// cases. The symbol and the two prices are adjustable at runtime over
/// SET_TEST_CONFIG; the rest only change through the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestParams {
    #[serde(default = "default_test_symbol")]
    pub test_symbol: String,
    #[serde(default = "default_test_exchange")]
    pub exchange: Exchange,
    /// Far from the market; orders at this price rest until cancelled.
    #[serde(default = "default_safe_buy_price")]
    pub safe_buy_price: f64,
    /// Through the market; buys at this price fill immediately.
    #[serde(default = "default_deal_buy_price")]
    pub deal_buy_price: f64,
    /// Contract on another venue, used to provoke a market-state error.
    #[serde(default = "default_rest_test_symbol")]
    pub rest_test_symbol: String,
    #[serde(default = "default_rest_test_exchange")]
    pub rest_test_exchange: Exchange,
    #[serde(default = "default_rest_test_price")]
    pub rest_test_price: f64,
    /// Over the local volume ceiling; must be blocked before the gateway.
    #[serde(default = "default_oversize_volume")]
    pub oversize_volume: u32,
    /// Large enough that its notional exceeds the account balance.
    #[serde(default = "default_fund_probe_volume")]
    pub fund_probe_volume: u32,
}

fn default_test_symbol() -> String {
    "IF2601".to_string()
}

fn default_test_exchange() -> Exchange {
    Exchange::Cffex
}

fn default_safe_buy_price() -> f64 {
    4000.0
}

fn default_deal_buy_price() -> f64 {
    4660.0
}

fn default_rest_test_symbol() -> String {
    "LC2607".to_string()
}

fn default_rest_test_exchange() -> Exchange {
    Exchange::Gfex
}

fn default_rest_test_price() -> f64 {
    70000.0
}

fn default_oversize_volume() -> u32 {
    10_000
}

fn default_fund_probe_volume() -> u32 {
    50_000
}

impl Default for TestParams {
    fn default() -> Self {
        Self {
            test_symbol: default_test_symbol(),
            exchange: default_test_exchange(),
            safe_buy_price: default_safe_buy_price(),
            deal_buy_price: default_deal_buy_price(),
            rest_test_symbol: default_rest_test_symbol(),
            rest_test_exchange: default_rest_test_exchange(),
            rest_test_price: default_rest_test_price(),
            oversize_volume: default_oversize_volume(),
            fund_probe_volume: default_fund_probe_volume(),
        }
    }
}

/// Everything a scenario body needs. Built fresh for each accepted case
/// with a snapshot of the current test parameters.
pub struct CaseContext {
    driver: Arc<SessionDriver>,
    params: TestParams,
    settle: Duration,
}

impl CaseContext {
    #[must_use]
    pub fn new(driver: Arc<SessionDriver>, params: TestParams, settle: Duration) -> Self {
        Self {
            driver,
            params,
            settle,
        }
    }

    #[must_use]
    pub fn driver(&self) -> &SessionDriver {
        &self.driver
    }

    #[must_use]
    pub fn monitor(&self) -> &RiskMonitor {
        self.driver.monitor()
    }

    #[must_use]
    pub fn params(&self) -> &TestParams {
        &self.params
    }

    /// Blocks the case thread long enough for gateway callbacks to land.
    pub fn settle(&self, waiting_for: &str) {
        debug!(
            ms = self.settle.as_millis() as u64,
            waiting_for, "settling"
        );
        std::thread::sleep(self.settle);
    }

    /// One-lot limit buy to open on the test contract.
    #[must_use]
    pub fn open_order(&self, price: f64, reference: &str) -> OrderRequest {
        OrderRequest {
            symbol: self.params.test_symbol.clone(),
            exchange: self.params.exchange,
            direction: Direction::Long,
            offset: Offset::Open,
            kind: OrderKind::Limit,
            volume: 1,
            price,
            reference: reference.to_string(),
            volume_cap_exempt: false,
        }
    }

    /// One-lot limit sell to close on the test contract.
    #[must_use]
    pub fn close_order(&self, price: f64, reference: &str) -> OrderRequest {
        OrderRequest {
            direction: Direction::Short,
            offset: Offset::Close,
            ..self.open_order(price, reference)
        }
    }

    /// Waits for the contract definition the gateway pushes after login.
    /// Gives up after a bounded number of attempts so a case against a
    /// half-connected session fails fast instead of hanging.
    pub fn require_contract(&self) -> CaseResult<ContractSpec> {
        for _ in 0..CONTRACT_WAIT_ATTEMPTS {
            if let Some(spec) = self.driver.contract(&self.params.test_symbol) {
                return Ok(spec);
            }
            debug!(symbol = %self.params.test_symbol, "waiting for contract definition");
            std::thread::sleep(CONTRACT_WAIT_STEP);
        }
        Err(CaseError::MissingContract(self.params.test_symbol.clone()))
    }

    /// Best-effort sweep of every resting session order. Returns how many
    /// cancels went out.
    pub fn cancel_active_orders(&self) -> usize {
        let mut sent = 0;
        for order in self.driver.active_orders() {
            match self.driver.cancel(&order.to_cancel_request()) {
                Ok(CancelOutcome::Sent) => sent += 1,
                Ok(CancelOutcome::Blocked(reason)) => {
                    warn!(order_id = %order.order_id, reason = %reason, "cancel blocked");
                }
                Err(e) => {
                    warn!(order_id = %order.order_id, error = %e, "cancel failed");
                }
            }
        }
        sent
    }
}
