//! Derived metric computation.
//!
//! Pure mapping from extracted bill fields to the four financial/energy
//! metrics. No side effects, no error conditions: absent optional inputs
//! default to zero.

use crate::models::{DerivedMetrics, ExtractedBill};

/// Derive the four metrics from an extracted bill.
///
/// `gd_economy` is the compensated-energy value as reported and may be
/// negative when the distributor represents compensation as a credit;
/// downstream reporting decides how to present that.
pub fn derive_metrics(extracted: &ExtractedBill) -> DerivedMetrics {
    let sceee_quantity = extracted.sceee_energy.map(|l| l.quantity).unwrap_or(0.0);
    let sceee_value = extracted.sceee_energy.map(|l| l.value).unwrap_or(0.0);
    let compensated_quantity = extracted
        .compensated_energy
        .map(|l| l.quantity)
        .unwrap_or(0.0);
    let compensated_value = extracted
        .compensated_energy
        .map(|l| l.value)
        .unwrap_or(0.0);
    let public_lighting = extracted.public_lighting_value.unwrap_or(0.0);

    DerivedMetrics {
        total_energy_consumption: extracted.electric_energy.quantity + sceee_quantity,
        compensated_energy_quantity: compensated_quantity,
        total_value_without_gd: extracted.electric_energy.value + sceee_value + public_lighting,
        gd_economy: compensated_value,
    }
}
