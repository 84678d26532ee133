// Payment-token acceptance metadata.
//
// A small set of blue-chip tokens is answered locally without a network
// call; everything else goes through the holder-verification oracle and is
// scored there. The score feeds a risk multiplier on the quoted fee.

use std::{collections::HashMap, str::FromStr};

use pyre_common::crypto::Pubkey;
use serde::{Deserialize, Serialize};
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AcceptanceTier {
    Diamond,
    Gold,
    Silver,
    Bronze,
    Rejected,
}

impl AcceptanceTier {
    pub fn accepted(&self) -> bool {
        !matches!(self, AcceptanceTier::Rejected)
    }

    pub fn for_score(score: u32) -> Self {
        match score {
            90.. => AcceptanceTier::Diamond,
            75..=89 => AcceptanceTier::Gold,
            60..=74 => AcceptanceTier::Silver,
            40..=59 => AcceptanceTier::Bronze,
            _ => AcceptanceTier::Rejected,
        }
    }
}

// Risky tokens pay a surcharge; blue chips pay none
pub fn score_multiplier(score: u32) -> f64 {
    match score {
        90.. => 1.0,
        75..=89 => 1.1,
        60..=74 => 1.25,
        _ => 1.5,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenInfo {
    pub mint: Pubkey,
    pub symbol: String,
    pub decimals: u8,
    pub tier: AcceptanceTier,
    pub score: u32,
}

/// Locally known tokens, accepted without consulting the oracle.
pub struct TokenRegistry {
    known: HashMap<Pubkey, TokenInfo>,
}

const DIAMOND_SET: [(&str, &str, u8); 3] = [
    ("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", "USDC", 6),
    ("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB", "USDT", 6),
    ("So11111111111111111111111111111111111111112", "wSOL", 9),
];

impl TokenRegistry {
    // The ecosystem token is always first-class
    pub fn new(ecotoken: Option<(Pubkey, String, u8)>) -> Self {
        let mut known = HashMap::new();
        for (mint, symbol, decimals) in DIAMOND_SET {
            let mint = Pubkey::from_str(mint).expect("valid diamond set mint");
            known.insert(
                mint,
                TokenInfo {
                    mint,
                    symbol: symbol.to_string(),
                    decimals,
                    tier: AcceptanceTier::Diamond,
                    score: 100,
                },
            );
        }
        if let Some((mint, symbol, decimals)) = ecotoken {
            known.insert(
                mint,
                TokenInfo {
                    mint,
                    symbol,
                    decimals,
                    tier: AcceptanceTier::Diamond,
                    score: 100,
                },
            );
        }
        Self { known }
    }

    pub fn lookup(&self, mint: &Pubkey) -> Option<&TokenInfo> {
        self.known.get(mint)
    }

    pub fn all(&self) -> impl Iterator<Item = &TokenInfo> {
        self.known.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diamond_set_is_local() {
        let registry = TokenRegistry::new(None);
        let usdc =
            Pubkey::from_str("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v").unwrap();
        let info = registry.lookup(&usdc).unwrap();
        assert_eq!(info.tier, AcceptanceTier::Diamond);
        assert_eq!(info.score, 100);
    }

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(AcceptanceTier::for_score(95), AcceptanceTier::Diamond);
        assert_eq!(AcceptanceTier::for_score(80), AcceptanceTier::Gold);
        assert_eq!(AcceptanceTier::for_score(60), AcceptanceTier::Silver);
        assert_eq!(AcceptanceTier::for_score(45), AcceptanceTier::Bronze);
        assert!(!AcceptanceTier::for_score(10).accepted());
    }

    #[test]
    fn test_score_multiplier_is_monotone() {
        assert_eq!(score_multiplier(100), 1.0);
        assert!(score_multiplier(80) > 1.0);
        assert!(score_multiplier(50) > score_multiplier(70));
    }
}
