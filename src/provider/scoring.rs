//! Signal engine for live vendor payloads.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::trace;

use super::traits::SignalEngine;
use super::types::{DataKind, EngineSignal, Payload};
use crate::config::FieldBinding;
use crate::schedule::Clock;

/// Scores a symbol by normalizing configured payload fields.
///
/// Each binding reads one field of one data kind and maps its absolute value
/// onto `[0, 1]` against `full_scale`. Records without the field are silent.
pub struct FieldSignalEngine {
    bindings: Vec<FieldBinding>,
    clock: Arc<dyn Clock>,
}

impl FieldSignalEngine {
    pub fn new(bindings: Vec<FieldBinding>, clock: Arc<dyn Clock>) -> Self {
        Self { bindings, clock }
    }

    fn normalize(value: Decimal, full_scale: Decimal) -> Decimal {
        if full_scale <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (value.abs() / full_scale).min(Decimal::ONE).round_dp(3)
    }
}

impl SignalEngine for FieldSignalEngine {
    fn evaluate(&self, symbol: &str, kind: DataKind, payload: &Payload) -> Vec<EngineSignal> {
        let observed_at = self.clock.now();
        self.bindings
            .iter()
            .filter(|b| b.data_kind == kind)
            .filter_map(|binding| {
                let value = payload.first_decimal(&binding.field)?;
                let score = Self::normalize(value, binding.full_scale);
                trace!(symbol = %symbol, engine = %binding.engine, %value, %score, "Scored field");
                Some(EngineSignal {
                    engine: binding.engine.clone(),
                    symbol: symbol.to_string(),
                    score,
                    observed_at,
                })
            })
            .collect()
    }
}
