//! Lead derivation
//!
//! Lead III and the augmented limb leads follow from Lead I and Lead II with
//! the reference limb held at zero potential.

use ecg_core::{ChannelPair, LeadRecord};

/// The four leads computed from the two acquired channels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedLeads {
    pub lead3: f32,
    pub avr: f32,
    pub avl: f32,
    pub avf: f32,
}

/// Derive Lead III, aVR, aVL and aVF from calibrated Lead I and Lead II
#[inline]
pub fn derive(lead1: f32, lead2: f32) -> DerivedLeads {
    DerivedLeads {
        lead3: lead2 - lead1,
        avr: -(lead1 + lead2) / 2.0,
        avl: lead1 - lead2 / 2.0,
        avf: lead2 - lead1 / 2.0,
    }
}

/// Assemble the full six-lead record from calibrated channel values
pub fn lead_record(calibrated: ChannelPair<f32>) -> LeadRecord {
    let ChannelPair { lead1, lead2 } = calibrated;
    let derived = derive(lead1, lead2);
    LeadRecord {
        lead1,
        lead2,
        lead3: derived.lead3,
        avr: derived.avr,
        avl: derived.avl,
        avf: derived.avf,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> impl Iterator<Item = (f32, f32)> {
        // Dyadic values keep every intermediate exactly representable
        let values = [-1024.0, -3.5, -1.0, -0.25, 0.0, 0.5, 1.0, 2.75, 100.0, 4096.0];
        values
            .into_iter()
            .flat_map(move |a| values.into_iter().map(move |b| (a, b)))
    }

    #[test]
    fn test_einthoven_identity() {
        for (lead1, lead2) in grid() {
            assert_eq!(derive(lead1, lead2).lead3, lead2 - lead1);
        }
    }

    #[test]
    fn test_augmented_leads_sum_to_zero() {
        for (lead1, lead2) in grid() {
            let d = derive(lead1, lead2);
            assert_eq!(d.avr + d.avl + d.avf, 0.0, "lead1={lead1} lead2={lead2}");
        }
    }

    #[test]
    fn test_known_values() {
        let d = derive(1.0, 2.0);
        assert_eq!(d, DerivedLeads { lead3: 1.0, avr: -1.5, avl: 0.0, avf: 1.5 });
    }

    #[test]
    fn test_zero_input_gives_zero_record() {
        assert_eq!(lead_record(ChannelPair::splat(0.0)), LeadRecord::default());
    }

    #[test]
    fn test_record_keeps_acquired_leads() {
        let record = lead_record(ChannelPair::new(0.5, -1.0));
        assert_eq!(record.lead1, 0.5);
        assert_eq!(record.lead2, -1.0);
        assert_eq!(record.lead3, -1.5);
        assert_eq!(record.avr, 0.25);
        assert_eq!(record.avl, 1.0);
        assert_eq!(record.avf, -1.25);
    }
}
