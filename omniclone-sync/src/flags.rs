//! Flag-layer composition.
//!
//! Final order is `base ++ mode ++ filter arguments ++ target extras`. The
//! sync tool resolves repeated flags last-wins, so later layers override
//! earlier ones and the order is part of the contract.

use omniclone_core::{FlagLayers, Target};

use crate::error::SyncError;
use crate::filters::{filter_arguments, FilterResolver};

/// Concatenate the layers. No I/O; same inputs give the same output.
pub fn compose(
    base_flags: &[String],
    mode_flags: &[String],
    filter_args: &[String],
    extra_flags: &[String],
) -> Vec<String> {
    let mut args =
        Vec::with_capacity(base_flags.len() + mode_flags.len() + filter_args.len() + extra_flags.len());
    args.extend_from_slice(base_flags);
    args.extend_from_slice(mode_flags);
    args.extend_from_slice(filter_args);
    args.extend_from_slice(extra_flags);
    args
}

/// Binds the configured flag layers to a filter resolver.
#[derive(Debug, Clone, Copy)]
pub struct FlagComposer<'a> {
    layers: &'a FlagLayers,
    resolver: &'a FilterResolver,
}

impl<'a> FlagComposer<'a> {
    pub fn new(layers: &'a FlagLayers, resolver: &'a FilterResolver) -> Self {
        Self { layers, resolver }
    }

    /// Full flag list for one target, filter files included.
    pub fn compose_for(&self, target: &Target) -> Result<Vec<String>, SyncError> {
        let mode = target.mode();
        let filters = self.resolver.resolve(mode, target.name())?;
        Ok(compose(
            &self.layers.base,
            self.layers.for_mode(mode),
            &filter_arguments(&filters),
            &target.extra_flags,
        ))
    }
}
