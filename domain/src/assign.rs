//! Seller assignment strategies for new indications.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::schema::Seller;

/// Chooses which seller receives a new indication.
pub trait SellerPicker: Send + Sync {
    /// Returns the index of the chosen seller, or `None` for an empty slice.
    fn pick(&self, sellers: &[Seller]) -> Option<usize>;
}

/// Uniform random pick over the candidate list.
pub struct RandomSellerPicker {
    rng: Mutex<StdRng>,
}

impl RandomSellerPicker {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic picker for tests and reproducible demos.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomSellerPicker {
    fn default() -> Self {
        Self::new()
    }
}

impl SellerPicker for RandomSellerPicker {
    fn pick(&self, sellers: &[Seller]) -> Option<usize> {
        if sellers.is_empty() {
            return None;
        }
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Some(rng.gen_range(0..sellers.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seller(id: &str) -> Seller {
        Seller {
            id: id.into(),
            name: id.to_uppercase(),
            active: true,
            created_at: None,
        }
    }

    #[test]
    fn empty_list_has_no_pick() {
        assert_eq!(RandomSellerPicker::seeded(1).pick(&[]), None);
    }

    #[test]
    fn picks_stay_in_range_and_cover_all_sellers() {
        let picker = RandomSellerPicker::seeded(42);
        let sellers = [seller("a"), seller("b"), seller("c")];
        let mut seen = [0usize; 3];
        for _ in 0..300 {
            let i = picker.pick(&sellers).unwrap();
            seen[i] += 1;
        }
        assert!(seen.iter().all(|&n| n > 0));
    }

    #[test]
    fn single_seller_always_picked() {
        let picker = RandomSellerPicker::new();
        assert_eq!(picker.pick(&[seller("only")]), Some(0));
    }
}
