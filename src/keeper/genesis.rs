//! Module parameters and initial state

use tracing::info;

use super::{BlockContext, ProviderKeeper};
use crate::error::{ProviderError, Result};
use crate::store::keys::params_key;
use crate::types::{ProviderParams, PROVIDER_PORT_ID};

impl ProviderKeeper {
    /// Stored parameters, or the defaults before genesis ran.
    pub fn get_params(&self) -> Result<ProviderParams> {
        Ok(self.get_decoded(&params_key())?.unwrap_or_default())
    }

    pub fn set_params(&mut self, params: &ProviderParams) -> Result<()> {
        params.validate().map_err(ProviderError::InvalidParams)?;
        self.set_encoded(params_key(), params)
    }

    /// Seeds a fresh provider store.
    ///
    /// Binds the provider port, stores `params`, starts the valsetUpdateID
    /// counter at 1 and fills the slash meter.
    pub fn init_genesis(&mut self, ctx: &BlockContext, params: &ProviderParams) -> Result<()> {
        self.set_port(PROVIDER_PORT_ID);
        self.set_params(params)?;
        if self.get_validator_set_update_id()? == 0 {
            self.set_validator_set_update_id(1);
        }
        self.initialize_slash_meter(ctx)?;
        info!("Provider genesis initialized at height {}", ctx.height);
        Ok(())
    }
}
