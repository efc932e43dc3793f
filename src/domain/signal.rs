//! Signal type classification for trading opportunities.

use serde::{Deserialize, Serialize};

/// Direction of a position implied by its signal type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

/// Closed enumeration of buy/sell opportunity kinds.
///
/// Buy types open long positions, sell types open short positions. The
/// divergence subtypes distinguish consolidation exhaustion from trend
/// exhaustion. Wire labels (`1buy`, `l2sell`, `down_pz_bc_buy`, ...) are
/// what configuration files and reports use.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum SignalType {
    FirstBuy,
    SecondBuy,
    SecondLikeBuy,
    ThirdBuy,
    ThirdLikeBuy,
    ConsolidationDivergenceBuy,
    TrendDivergenceBuy,
    FirstSell,
    SecondSell,
    SecondLikeSell,
    ThirdSell,
    ThirdLikeSell,
    ConsolidationDivergenceSell,
    TrendDivergenceSell,
}

impl SignalType {
    pub const ALL: [SignalType; 14] = [
        SignalType::FirstBuy,
        SignalType::SecondBuy,
        SignalType::SecondLikeBuy,
        SignalType::ThirdBuy,
        SignalType::ThirdLikeBuy,
        SignalType::ConsolidationDivergenceBuy,
        SignalType::TrendDivergenceBuy,
        SignalType::FirstSell,
        SignalType::SecondSell,
        SignalType::SecondLikeSell,
        SignalType::ThirdSell,
        SignalType::ThirdLikeSell,
        SignalType::ConsolidationDivergenceSell,
        SignalType::TrendDivergenceSell,
    ];

    pub fn side(&self) -> Side {
        match self {
            SignalType::FirstBuy
            | SignalType::SecondBuy
            | SignalType::SecondLikeBuy
            | SignalType::ThirdBuy
            | SignalType::ThirdLikeBuy
            | SignalType::ConsolidationDivergenceBuy
            | SignalType::TrendDivergenceBuy => Side::Long,
            SignalType::FirstSell
            | SignalType::SecondSell
            | SignalType::SecondLikeSell
            | SignalType::ThirdSell
            | SignalType::ThirdLikeSell
            | SignalType::ConsolidationDivergenceSell
            | SignalType::TrendDivergenceSell => Side::Short,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SignalType::FirstBuy => "1buy",
            SignalType::SecondBuy => "2buy",
            SignalType::SecondLikeBuy => "l2buy",
            SignalType::ThirdBuy => "3buy",
            SignalType::ThirdLikeBuy => "l3buy",
            SignalType::ConsolidationDivergenceBuy => "down_pz_bc_buy",
            SignalType::TrendDivergenceBuy => "down_qs_bc_buy",
            SignalType::FirstSell => "1sell",
            SignalType::SecondSell => "2sell",
            SignalType::SecondLikeSell => "l2sell",
            SignalType::ThirdSell => "3sell",
            SignalType::ThirdLikeSell => "l3sell",
            SignalType::ConsolidationDivergenceSell => "up_pz_bc_sell",
            SignalType::TrendDivergenceSell => "up_qs_bc_sell",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SignalType::FirstBuy => "first-type buy",
            SignalType::SecondBuy => "second-type buy",
            SignalType::SecondLikeBuy => "second-like buy",
            SignalType::ThirdBuy => "third-type buy",
            SignalType::ThirdLikeBuy => "third-like buy",
            SignalType::ConsolidationDivergenceBuy => "consolidation divergence buy",
            SignalType::TrendDivergenceBuy => "trend divergence buy",
            SignalType::FirstSell => "first-type sell",
            SignalType::SecondSell => "second-type sell",
            SignalType::SecondLikeSell => "second-like sell",
            SignalType::ThirdSell => "third-type sell",
            SignalType::ThirdLikeSell => "third-like sell",
            SignalType::ConsolidationDivergenceSell => "consolidation divergence sell",
            SignalType::TrendDivergenceSell => "trend divergence sell",
        }
    }

    pub fn from_label(label: &str) -> Option<SignalType> {
        SignalType::ALL.iter().copied().find(|s| s.label() == label)
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_types_are_long() {
        assert_eq!(SignalType::FirstBuy.side(), Side::Long);
        assert_eq!(SignalType::SecondLikeBuy.side(), Side::Long);
        assert_eq!(SignalType::TrendDivergenceBuy.side(), Side::Long);
    }

    #[test]
    fn sell_types_are_short() {
        assert_eq!(SignalType::FirstSell.side(), Side::Short);
        assert_eq!(SignalType::ThirdLikeSell.side(), Side::Short);
        assert_eq!(SignalType::ConsolidationDivergenceSell.side(), Side::Short);
    }

    #[test]
    fn labels_round_trip() {
        for signal in SignalType::ALL {
            assert_eq!(SignalType::from_label(signal.label()), Some(signal));
        }
    }

    #[test]
    fn unknown_label_rejected() {
        assert_eq!(SignalType::from_label("4buy"), None);
        assert_eq!(SignalType::from_label(""), None);
    }

    #[test]
    fn all_covers_every_variant_once() {
        let mut labels: Vec<&str> = SignalType::ALL.iter().map(|s| s.label()).collect();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), 14);
    }
}
