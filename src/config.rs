//! Minimal declarative construction of an [`Engine`](crate::engine::Engine):
//! starting account plus the instrument set it trades. See `SPEC_FULL.md`
//! §1 — file/CLI configuration loading is explicitly out of scope here;
//! this is the programmatic seam a surrounding CLI would build on.

use crate::{
    account::Account,
    engine::Engine,
    instrument::{Instrument, InstrumentRegistry},
    journal::Journal,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Declarative starting-account configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub id: String,
    pub currency: String,
    pub starting_balance: f64,
}

impl From<AccountConfig> for Account {
    fn from(value: AccountConfig) -> Self {
        Account::new(value.id, value.currency, value.starting_balance)
    }
}

/// Top-level configuration assembled into a running [`Engine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    pub account: AccountConfig,
    pub instruments: Vec<Instrument>,
}

impl SimulatorConfig {
    /// Builds an [`Engine`] from this configuration plus a caller-supplied
    /// [`Journal`] sink (the config layer never decides where journal rows
    /// land — that is the caller's resource to own and close).
    pub fn build(self, journal: Arc<dyn Journal>) -> Engine {
        let registry = InstrumentRegistry::new(self.instruments);
        let account = Account::from(self.account);
        Engine::new(account, registry, journal)
    }
}
